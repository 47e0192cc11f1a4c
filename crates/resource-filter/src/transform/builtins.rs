//! Built-in transforms.
//!
//! Transforms are lenient about their input: a value of the wrong shape
//! yields an empty string (or an empty list for list-valued transforms)
//! rather than an error. Only `error()` and malformed `date()` arguments fail.

use std::cmp::Ordering;
use std::fmt::Write;

use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, FixedOffset};
use chrono_tz::Tz;
use regex::RegexBuilder;

use super::{arg_int, arg_text, TransformError};
use crate::filter::AccessPath;
use crate::times;
use crate::value::Value;

type TransformFn = fn(&Value, &[Value]) -> Result<Value, TransformError>;

/// The transforms every built-in environment registers.
pub(crate) const BUILTINS: &[(&str, TransformFn)] = &[
    ("basename", basename),
    ("date", date),
    ("error", error),
    ("extract", extract),
    ("firstof", firstof),
    ("join", join),
    ("len", len),
    ("notnull", notnull),
    ("segment", segment),
    ("slice", slice),
    ("sort", sort),
    ("split", split),
    ("sub", sub),
    ("yesno", yesno),
];

const DEFAULT_DATE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

fn undefined() -> Value {
    Value::String(String::new())
}

/// `basename()`: the last component of a `/` or `\` separated path.
fn basename(value: &Value, _args: &[Value]) -> Result<Value, TransformError> {
    let Some(path) = value.as_str() else {
        return Ok(undefined());
    };
    let base = path.rsplit(['/', '\\']).next().unwrap_or_default();
    Ok(Value::from(base))
}

/// `date(format, tz)`: formats a timestamp or epoch seconds with a strftime format.
fn date(value: &Value, args: &[Value]) -> Result<Value, TransformError> {
    let format = arg_text(args, 0)
        .filter(|f| !f.is_empty())
        .unwrap_or_else(|| DEFAULT_DATE_FORMAT.to_string());
    let zone = match arg_text(args, 1).filter(|z| !z.is_empty()) {
        Some(name) => Some(
            name.parse::<Tz>()
                .map_err(|_| TransformError::new(format!("unknown time zone [{name}]")))?,
        ),
        None => None,
    };

    let items: Vec<Item<'_>> = StrftimeItems::new(&format).collect();
    if items.iter().any(|item| matches!(item, Item::Error)) {
        return Err(TransformError::new(format!("invalid date format [{format}]")));
    }

    let Some(timestamp) = datetime_of(value) else {
        return Ok(undefined());
    };

    let mut text = String::new();
    let written = match zone {
        Some(zone) => write!(
            text,
            "{}",
            timestamp.with_timezone(&zone).format_with_items(items.iter())
        ),
        None => write!(text, "{}", timestamp.format_with_items(items.iter())),
    };
    written.map_err(|_| TransformError::new(format!("cannot format date with [{format}]")))?;
    Ok(Value::String(text))
}

fn datetime_of(value: &Value) -> Option<DateTime<FixedOffset>> {
    match value {
        Value::String(s) => times::parse_datetime(s),
        Value::Int(_) | Value::Float(_) => {
            times::from_epoch_seconds(value.as_f64()?).map(|dt| dt.fixed_offset())
        }
        _ => None,
    }
}

/// `error(message)`: always fails.
fn error(_value: &Value, args: &[Value]) -> Result<Value, TransformError> {
    let message = arg_text(args, 0).unwrap_or_else(|| "transform error".to_string());
    Err(TransformError::new(message))
}

/// `extract(keys...)`: the values of the named fields of a map, in argument order.
fn extract(value: &Value, args: &[Value]) -> Result<Value, TransformError> {
    let Some(map) = value.as_map() else {
        return Ok(Value::List(Vec::new()));
    };
    let values = args
        .iter()
        .filter_map(Value::scalar_text)
        .filter_map(|key| map.get(&key).cloned())
        .collect();
    Ok(Value::List(values))
}

/// `firstof(names...)`: the first named field of a map that is set.
fn firstof(value: &Value, args: &[Value]) -> Result<Value, TransformError> {
    let found = value.as_map().and_then(|map| {
        args.iter()
            .filter_map(Value::scalar_text)
            .find_map(|name| map.get(&name).filter(|v| !v.is_null()).cloned())
    });
    Ok(found.unwrap_or_else(undefined))
}

/// `join(sep)`: joins list items, or the characters of a string, with `sep` (default `/`).
fn join(value: &Value, args: &[Value]) -> Result<Value, TransformError> {
    let separator = arg_text(args, 0).unwrap_or_else(|| "/".to_string());
    let parts: Vec<String> = match value {
        Value::List(items) => items.iter().map(ToString::to_string).collect(),
        Value::String(s) => s.chars().map(String::from).collect(),
        _ => return Ok(undefined()),
    };
    Ok(Value::String(parts.join(&separator)))
}

/// `len()`: the length of the value, or of the first argument when one is given.
fn len(value: &Value, args: &[Value]) -> Result<Value, TransformError> {
    let length = match arg_text(args, 0) {
        Some(text) => text.chars().count(),
        None => value.len(),
    };
    Ok(Value::from(length))
}

/// `notnull()`: the non-null items of a list.
fn notnull(value: &Value, _args: &[Value]) -> Result<Value, TransformError> {
    let items = value
        .as_list()
        .map(|items| items.iter().filter(|v| !v.is_null()).cloned().collect())
        .unwrap_or_default();
    Ok(Value::List(items))
}

/// `segment(index)`: a `/` separated segment of a URL or path, the last by default.
fn segment(value: &Value, args: &[Value]) -> Result<Value, TransformError> {
    let Some(text) = value.as_str() else {
        return Ok(undefined());
    };
    if !text.contains('/') {
        return Ok(Value::from(text));
    }
    let parts: Vec<&str> = text.split('/').collect();
    let index = arg_int(args, 0).unwrap_or(-1);
    let found = normalize_index(index, parts.len()).and_then(|i| parts.get(i));
    Ok(found.map_or_else(undefined, |part| Value::from(*part)))
}

fn normalize_index(index: i64, len: usize) -> Option<usize> {
    let len = i64::try_from(len).ok()?;
    let index = if index < 0 { index + len } else { index };
    if (0..len).contains(&index) {
        usize::try_from(index).ok()
    } else {
        None
    }
}

/// `slice(op)`: a Python style `start:stop:step` slice of a list or string.
///
/// A single index selects one item. Results are lists; an empty or invalid
/// slice is undefined.
fn slice(value: &Value, args: &[Value]) -> Result<Value, TransformError> {
    let items: Vec<Value> = match value {
        Value::List(items) => items.clone(),
        Value::String(s) => s.chars().map(|c| Value::String(c.to_string())).collect(),
        _ => return Ok(undefined()),
    };
    let op = arg_text(args, 0).unwrap_or_default();
    let selected = slice_items(&items, &op).unwrap_or_default();
    if selected.is_empty() {
        return Ok(undefined());
    }
    Ok(Value::List(selected))
}

fn slice_items(items: &[Value], op: &str) -> Option<Vec<Value>> {
    let parts: Vec<&str> = op.split(':').map(str::trim).collect();
    if parts.len() > 3 || parts.iter().all(|p| p.is_empty()) && parts.len() == 1 {
        return None;
    }
    let number = |text: &str| -> Option<Option<i64>> {
        if text.is_empty() {
            Some(None)
        } else {
            text.parse::<i64>().ok().map(Some)
        }
    };

    if parts.len() == 1 {
        let index = number(parts[0])??;
        let index = normalize_index(index, items.len())?;
        return Some(vec![items[index].clone()]);
    }

    let start = number(parts[0])?;
    let stop = number(parts[1])?;
    let step = match parts.get(2) {
        Some(text) => number(text)?.unwrap_or(1),
        None => 1,
    };
    if step == 0 {
        return None;
    }

    let len = i64::try_from(items.len()).ok()?;
    let clamp = |bound: Option<i64>, default: i64| -> i64 {
        match bound {
            None => default,
            Some(i) if step > 0 => {
                let i = if i < 0 { i + len } else { i };
                i.clamp(0, len)
            }
            Some(i) => {
                let i = if i < 0 { i + len } else { i };
                i.clamp(-1, len - 1)
            }
        }
    };

    let mut selected = Vec::new();
    if step > 0 {
        let (mut i, stop) = (clamp(start, 0), clamp(stop, len));
        while i < stop {
            selected.push(items[usize::try_from(i).ok()?].clone());
            i += step;
        }
    } else {
        let (mut i, stop) = (clamp(start, len - 1), clamp(stop, -1));
        while i > stop {
            selected.push(items[usize::try_from(i).ok()?].clone());
            i += step;
        }
    }
    Some(selected)
}

/// `sort(key)`: sorts a list, by the value at `key` of each item when given.
fn sort(value: &Value, args: &[Value]) -> Result<Value, TransformError> {
    let Some(items) = value.as_list() else {
        return Ok(value.clone());
    };
    let key = match arg_text(args, 0).filter(|k| !k.is_empty()) {
        Some(text) => Some(
            text.parse::<AccessPath>()
                .map_err(|e| TransformError::new(format!("invalid sort key [{text}]: {e}")))?,
        ),
        None => None,
    };

    let mut sorted = items.to_vec();
    sorted.sort_by(|a, b| match &key {
        Some(key) => {
            let a = key.resolve(a);
            let b = key.resolve(b);
            compare_values(
                a.as_deref().unwrap_or(&Value::Null),
                b.as_deref().unwrap_or(&Value::Null),
            )
        }
        None => compare_values(a, b),
    });
    Ok(Value::List(sorted))
}

/// A total order over values: null, booleans, numbers, strings, lists, maps.
fn compare_values(a: &Value, b: &Value) -> Ordering {
    fn rank(value: &Value) -> u8 {
        match value {
            Value::Null => 0,
            Value::Bool(_) => 1,
            Value::Int(_) | Value::Float(_) => 2,
            Value::String(_) => 3,
            Value::List(_) => 4,
            Value::Map(_) => 5,
        }
    }

    match (a, b) {
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Int(_) | Value::Float(_), Value::Int(_) | Value::Float(_)) => {
            let x = a.as_f64().unwrap_or_default();
            let y = b.as_f64().unwrap_or_default();
            x.total_cmp(&y)
        }
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::List(x), Value::List(y)) => x
            .iter()
            .zip(y)
            .map(|(p, q)| compare_values(p, q))
            .find(|o| o.is_ne())
            .unwrap_or_else(|| x.len().cmp(&y.len())),
        _ => rank(a).cmp(&rank(b)),
    }
}

/// `split(sep)`: splits a string on `sep` (default `/`).
fn split(value: &Value, args: &[Value]) -> Result<Value, TransformError> {
    let separator = arg_text(args, 0).unwrap_or_else(|| "/".to_string());
    match value.as_str() {
        Some(text) if !text.is_empty() && !separator.is_empty() => Ok(Value::List(
            text.split(separator.as_str()).map(Value::from).collect(),
        )),
        _ => Ok(undefined()),
    }
}

/// `sub(pattern, replacement, count, ignorecase)`: regex substitution.
///
/// Matching is case-insensitive unless `ignorecase` is `0`/`false`, `^` and
/// `$` match at line boundaries and `.` matches newlines. A `count` of 0
/// replaces every match. An invalid pattern leaves the value unchanged.
fn sub(value: &Value, args: &[Value]) -> Result<Value, TransformError> {
    let Some(text) = value.scalar_text() else {
        return Ok(undefined());
    };
    let Some(pattern) = arg_text(args, 0) else {
        return Ok(Value::String(text));
    };
    let replacement = arg_text(args, 1).unwrap_or_default();
    let count = arg_int(args, 2).unwrap_or(0).max(0);
    let ignore_case = !matches!(
        arg_text(args, 3).as_deref().map(str::trim),
        Some("0") | Some("false") | Some("False")
    );

    let Ok(regex) = RegexBuilder::new(&pattern)
        .case_insensitive(ignore_case)
        .multi_line(true)
        .dot_matches_new_line(true)
        .build()
    else {
        return Ok(Value::String(text));
    };
    let limit = usize::try_from(count).unwrap_or(0);
    Ok(Value::String(
        regex
            .replacen(&text, limit, replacement.as_str())
            .into_owned(),
    ))
}

/// `yesno(yes, no)`: `yes` (or the value itself) when the value is set, `no` (default `No`) otherwise.
fn yesno(value: &Value, args: &[Value]) -> Result<Value, TransformError> {
    if value.is_truthy() {
        Ok(arg_text(args, 0).map_or_else(|| value.clone(), Value::String))
    } else {
        Ok(Value::String(
            arg_text(args, 1).unwrap_or_else(|| "No".to_string()),
        ))
    }
}
