//! Keys: access paths into a resource, optionally ending in a transform call.

use std::borrow::Cow;
use std::fmt;
use std::str::FromStr;

use crate::value::Value;

/// One step of an [`AccessPath`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Segment {
    /// A map field. Applied to a list, it is applied to every item.
    Field(String),
    /// A list index, `[n]`.
    Index(usize),
}

/// A sequence of field and index steps naming a location in a resource.
///
/// ```
/// use resource_filter::{AccessPath, Value};
/// use serde_json::json;
///
/// let path: AccessPath = "compound.number.array[2]".parse().unwrap();
/// let resource = Value::from(json!({"compound": {"number": {"array": [1, 2, 3.14]}}}));
/// assert_eq!(path.resolve(&resource).as_deref(), Some(&Value::Float(3.14)));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct AccessPath {
    segments: Vec<Segment>,
}

impl AccessPath {
    /// Creates a path from segments.
    pub fn new(segments: Vec<Segment>) -> Self {
        Self { segments }
    }

    /// A single-field path. Dots in `name` are not separators.
    pub fn field(name: impl Into<String>) -> Self {
        Self::new(vec![Segment::Field(name.into())])
    }

    /// The path's segments.
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Whether the path has no segments (the whole resource).
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// This path followed by `rest`.
    pub fn join(&self, rest: &[Segment]) -> AccessPath {
        let mut segments = self.segments.clone();
        segments.extend_from_slice(rest);
        Self::new(segments)
    }

    /// Looks the path up in `value`.
    ///
    /// Returns `None` when the path is absent. A field applied to a list is
    /// mapped over its items and the results are collected into a new list;
    /// items where the path is absent are skipped, and lists produced by
    /// nested mapping are flattened.
    pub fn resolve<'v>(&self, value: &'v Value) -> Option<Cow<'v, Value>> {
        resolve_segments(&self.segments, value)
    }
}

fn resolve_segments<'v>(segments: &[Segment], value: &'v Value) -> Option<Cow<'v, Value>> {
    let Some((first, rest)) = segments.split_first() else {
        return Some(Cow::Borrowed(value));
    };

    match (first, value) {
        (Segment::Field(name), Value::Map(map)) => resolve_segments(rest, map.get(name)?),
        (Segment::Field(_), Value::List(items)) => {
            let mut mapped = Vec::new();
            for item in items {
                match resolve_segments(segments, item) {
                    Some(Cow::Owned(Value::List(inner))) => mapped.extend(inner),
                    Some(found) => mapped.push(found.into_owned()),
                    None => {}
                }
            }
            if mapped.is_empty() {
                None
            } else {
                Some(Cow::Owned(Value::List(mapped)))
            }
        }
        (Segment::Index(index), Value::List(items)) => resolve_segments(rest, items.get(*index)?),
        (Segment::Index(index), Value::Map(map)) => {
            resolve_segments(rest, map.get(&index.to_string())?)
        }
        _ => None,
    }
}

impl FromStr for AccessPath {
    type Err = String;

    /// Parses `seg(.seg)*` where a segment is a field name or `[n]`.
    fn from_str(text: &str) -> Result<Self, Self::Err> {
        if text.is_empty() {
            return Err("empty key".to_string());
        }

        let mut segments = Vec::new();
        let mut field = String::new();
        let mut chars = text.chars();
        // A '.' was just read and a field name must follow.
        let mut after_dot = false;
        // An index was just closed; only '.' or '[' may follow.
        let mut after_index = false;

        while let Some(c) = chars.next() {
            match c {
                '.' => {
                    if !field.is_empty() {
                        segments.push(Segment::Field(std::mem::take(&mut field)));
                    } else if segments.is_empty() || after_dot {
                        return Err("expected a field name before '.'".to_string());
                    }
                    after_dot = true;
                    after_index = false;
                }
                '[' => {
                    if after_dot {
                        return Err("expected a field name after '.'".to_string());
                    }
                    if !field.is_empty() {
                        segments.push(Segment::Field(std::mem::take(&mut field)));
                    }
                    let mut digits = String::new();
                    loop {
                        match chars.next() {
                            Some(']') => break,
                            Some(d) => digits.push(d),
                            None => return Err("unterminated index".to_string()),
                        }
                    }
                    let index = digits
                        .trim()
                        .parse::<usize>()
                        .map_err(|_| format!("invalid index [{digits}]"))?;
                    segments.push(Segment::Index(index));
                    after_index = true;
                }
                ']' => return Err("unexpected ']'".to_string()),
                _ => {
                    if after_index {
                        return Err("expected '.' or '[' after an index".to_string());
                    }
                    field.push(c);
                    after_dot = false;
                }
            }
        }

        if after_dot {
            return Err("expected a field name after '.'".to_string());
        }
        if !field.is_empty() {
            segments.push(Segment::Field(field));
        }
        Ok(Self::new(segments))
    }
}

impl fmt::Display for AccessPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.segments.iter().enumerate() {
            match segment {
                Segment::Field(name) if i == 0 => write!(f, "{name}")?,
                Segment::Field(name) => write!(f, ".{name}")?,
                Segment::Index(index) => write!(f, "[{index}]")?,
            }
        }
        Ok(())
    }
}

/// How a transform call receives its input.
#[derive(Debug, Clone, PartialEq)]
pub enum CallForm {
    /// `a.b.name(args)`: applied to the value at the key's path.
    Method,
    /// `name(args)`: applied to the value at the first argument when that
    /// argument names a present key, otherwise to the whole resource.
    Function {
        /// The first argument parsed as a key, when it is one.
        arg_path: Option<AccessPath>,
    },
}

/// A transform invocation ending a key.
#[derive(Debug, Clone, PartialEq)]
pub struct TransformCall {
    /// The transform name.
    pub name: String,
    /// Literal arguments.
    pub args: Vec<Value>,
    /// Method or function form.
    pub form: CallForm,
}

/// The left side of a predicate.
#[derive(Debug, Clone, PartialEq)]
pub struct Key {
    /// The access path, after alias substitution.
    pub path: AccessPath,
    /// A transform applied to the value at `path`.
    pub call: Option<TransformCall>,
}

impl Key {
    /// A key with no transform.
    pub fn path(path: AccessPath) -> Self {
        Self { path, call: None }
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Some(call) = &self.call else {
            return write!(f, "{}", self.path);
        };
        let args: Vec<String> = call.args.iter().map(ToString::to_string).collect();
        match call.form {
            CallForm::Method if self.path.is_empty() => {
                write!(f, "{}({})", call.name, args.join(","))
            }
            CallForm::Method => write!(f, "{}.{}({})", self.path, call.name, args.join(",")),
            CallForm::Function { .. } => write!(f, "{}({})", call.name, args.join(",")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn path(text: &str) -> AccessPath {
        text.parse().unwrap()
    }

    #[test]
    fn test_parse_segments() {
        assert_eq!(
            path("a[0][1].b").segments(),
            &[
                Segment::Field("a".to_string()),
                Segment::Index(0),
                Segment::Index(1),
                Segment::Field("b".to_string()),
            ]
        );
        assert_eq!(path("networkInterfaces[2]").to_string(), "networkInterfaces[2]");
        assert_eq!(path("[3]").segments(), &[Segment::Index(3)]);
    }

    #[test]
    fn test_parse_rejects_empty_segments() {
        for bad in ["", ".", "..", ".foo", "foo.", "foo..bar", "a.[0]", "a[x]", "a[-1]", "a[0", "a]", "a[0]b"] {
            assert!(bad.parse::<AccessPath>().is_err(), "{bad:?} should fail");
        }
    }

    #[test]
    fn test_resolve_fields_and_indices() {
        let resource = Value::from(json!({
            "compound": {"string": {"array": ["abc", "Def"], "value": "Compound String"}},
            "none": null,
        }));
        assert_eq!(
            path("compound.string.value").resolve(&resource).as_deref(),
            Some(&Value::from("Compound String"))
        );
        assert_eq!(
            path("compound.string.array[1]").resolve(&resource).as_deref(),
            Some(&Value::from("Def"))
        );
        assert_eq!(path("none").resolve(&resource).as_deref(), Some(&Value::Null));
        assert_eq!(path("missing").resolve(&resource), None);
        assert_eq!(path("compound.string.array[9]").resolve(&resource), None);
        assert_eq!(path("none.deeper").resolve(&resource), None);
    }

    #[test]
    fn test_resolve_maps_fields_over_lists() {
        let resource = Value::from(json!({
            "disks": [
                {"name": "a", "tags": ["x", "y"]},
                {"name": "b"},
                {"name": "c", "tags": ["z"]},
            ]
        }));
        assert_eq!(
            path("disks.name").resolve(&resource).map(Cow::into_owned),
            Some(Value::from(json!(["a", "b", "c"])))
        );
        assert_eq!(
            path("disks.tags").resolve(&resource).map(Cow::into_owned),
            Some(Value::from(json!([["x", "y"], ["z"]])))
        );
        assert_eq!(path("disks.size").resolve(&resource), None);
    }

    #[test]
    fn test_resolve_flattens_nested_mapping() {
        let resource = Value::from(json!({
            "groups": [
                {"members": [{"id": 1}, {"id": 2}]},
                {"members": [{"id": 3}]},
            ]
        }));
        assert_eq!(
            path("groups.members.id").resolve(&resource).map(Cow::into_owned),
            Some(Value::from(json!([1, 2, 3])))
        );
    }

    #[test]
    fn test_resolve_index_on_map_uses_string_key() {
        let resource = Value::from(json!({"dictionary": {"1": "abc", "2": "Def"}}));
        assert_eq!(
            path("dictionary[2]").resolve(&resource).as_deref(),
            Some(&Value::from("Def"))
        );
    }

    #[test]
    fn test_join() {
        let alias = path("compound.string");
        let joined = alias.join(&[Segment::Field("value".to_string())]);
        assert_eq!(joined.to_string(), "compound.string.value");
    }

    #[test]
    fn test_key_display() {
        let key = Key {
            path: path("lower"),
            call: Some(TransformCall {
                name: "len".to_string(),
                args: vec![],
                form: CallForm::Method,
            }),
        };
        assert_eq!(key.to_string(), "lower.len()");

        let key = Key {
            path: AccessPath::default(),
            call: Some(TransformCall {
                name: "len".to_string(),
                args: vec![Value::from("junk")],
                form: CallForm::Function { arg_path: None },
            }),
        };
        assert_eq!(key.to_string(), "len(junk)");
    }
}
