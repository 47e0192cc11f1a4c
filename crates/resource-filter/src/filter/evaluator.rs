//! Filter evaluation against resource values.
//!
//! A [`FilterEvaluator`] evaluates one expression against one resource and
//! remembers the first deprecated match it saw. [`super::Filter::evaluate`]
//! creates a fresh evaluator per call, so nothing carries over between calls.
//!
//! Missing keys, nulls and type mismatches never fail: a restriction that
//! cannot match is false (true for `!=` and `!~`). The only evaluation errors
//! come from transforms.

use std::borrow::Cow;
use std::cmp::Ordering;

use chrono::{DateTime, Utc};

use super::ast::{Expr, Global, Operator, Predicate};
use super::error::{FilterError, FilterResult};
use super::key::{CallForm, Key};
use super::operand::{HasPattern, Pattern, Term};
use super::warning::Deprecation;
use crate::projection::ProjectionEnv;
use crate::times;
use crate::value::{parse_number, Value};

/// Evaluates expressions against resources.
pub struct FilterEvaluator<'a> {
    env: &'a ProjectionEnv,
    /// Captured once, for relative date operands.
    now: DateTime<Utc>,
    /// The first deprecated restriction of this evaluation.
    deprecation: Option<Deprecation>,
    /// Set while evaluating one predicate when a deprecated rule decided a match.
    deprecated: bool,
}

impl<'a> FilterEvaluator<'a> {
    /// Creates an evaluator, reading the current time from the environment's clock.
    pub fn new(env: &'a ProjectionEnv) -> Self {
        Self {
            env,
            now: env.now(),
            deprecation: None,
            deprecated: false,
        }
    }

    /// Returns the deprecation raised during evaluation, if any.
    pub fn into_deprecation(self) -> Option<Deprecation> {
        self.deprecation
    }

    /// Evaluates `expr` against `resource`.
    ///
    /// # Errors
    ///
    /// Returns [`FilterError::Transform`] when a transform fails and
    /// [`FilterError::UnresolvedTransform`] when one is not registered.
    pub fn evaluate(&mut self, expr: &Expr, resource: &Value) -> FilterResult<bool> {
        match expr {
            Expr::Predicate(predicate) => self.eval_predicate(predicate, resource),
            Expr::Global(global) => self.eval_global(global, resource),
            Expr::And(left, right) => {
                Ok(self.evaluate(left, resource)? && self.evaluate(right, resource)?)
            }
            Expr::Or(left, right) => {
                Ok(self.evaluate(left, resource)? || self.evaluate(right, resource)?)
            }
            Expr::Not(inner) => Ok(!self.evaluate(inner, resource)?),
        }
    }

    // ==================== Keys ====================

    /// Looks up a key, applying its transform if it has one.
    fn resolve<'v>(&self, key: &Key, resource: &'v Value) -> FilterResult<Option<Cow<'v, Value>>> {
        let Some(call) = &key.call else {
            return Ok(key.path.resolve(resource));
        };

        let transform =
            self.env
                .transform(&call.name)
                .ok_or_else(|| FilterError::UnresolvedTransform {
                    name: call.name.clone(),
                })?;

        let found = match &call.form {
            CallForm::Method => key.path.resolve(resource),
            CallForm::Function { arg_path } => arg_path
                .as_ref()
                .and_then(|path| path.resolve(resource))
                .filter(|_| !call.args.is_empty()),
        };
        let (input, args): (Cow<'_, Value>, &[Value]) = match (&call.form, found) {
            (CallForm::Method, Some(value)) => (value, &call.args),
            (CallForm::Method, None) => (Cow::Owned(Value::Null), &call.args),
            (CallForm::Function { .. }, Some(value)) => (value, &call.args[1..]),
            (CallForm::Function { .. }, None) => (Cow::Borrowed(resource), &call.args),
        };

        let result = transform
            .apply(&input, args)
            .map_err(|source| FilterError::Transform {
                key: key.to_string(),
                name: call.name.clone(),
                source,
            })?;
        Ok(Some(Cow::Owned(result)))
    }

    // ==================== Restrictions ====================

    fn eval_predicate(&mut self, predicate: &Predicate, resource: &Value) -> FilterResult<bool> {
        let value = self.resolve(&predicate.key, resource)?;
        let terms = predicate.operand.terms();
        self.deprecated = false;

        let matched = match (predicate.op, value.as_deref()) {
            (Operator::Ne, value) => !value.is_some_and(|v| {
                terms.iter().any(|term| self.equals(v, term))
            }),
            (Operator::NotMatch, value) => {
                !value.is_some_and(|v| terms.iter().any(|term| regex_matches(v, term)))
            }
            (_, None) => false,
            (op, Some(v)) => terms.iter().any(|term| self.apply(op, v, term)),
        };

        if self.deprecated && self.deprecation.is_none() {
            self.deprecation = Some(Deprecation {
                expression: predicate.source.clone(),
                operator: predicate.op,
            });
        }
        Ok(matched != predicate.negated)
    }

    fn eval_global(&mut self, global: &Global, resource: &Value) -> FilterResult<bool> {
        match global {
            Global::Any => Ok(!resource.is_null()),
            Global::Term(term) => Ok(contains_string(resource, term)),
            Global::Call(key) => Ok(self
                .resolve(key, resource)?
                .is_some_and(|value| value.is_truthy())),
        }
    }

    fn apply(&mut self, op: Operator, value: &Value, term: &Term) -> bool {
        match op {
            Operator::Has => self.has(value, term),
            Operator::Eq | Operator::Ne => self.equals(value, term),
            Operator::Match | Operator::NotMatch => regex_matches(value, term),
            Operator::Lt | Operator::Le | Operator::Gt | Operator::Ge => {
                self.compare(op, value, term)
            }
        }
    }

    // ==================== `:` ====================

    fn has(&mut self, value: &Value, term: &Term) -> bool {
        match value {
            Value::Null => false,
            Value::List(items) => items.iter().any(|item| self.has(item, term)),
            Value::Map(map) => map
                .iter()
                .any(|(key, item)| self.has_key(key, term) || self.has(item, term)),
            Value::String(s) => self.has_text(s, term),
            Value::Bool(_) => {
                matches!(term.pattern, Pattern::Has(HasPattern::Any)) || self.equals(value, term)
            }
            Value::Int(_) | Value::Float(_) => match (&term.pattern, term.number, value.as_f64()) {
                (Pattern::Has(HasPattern::Any), _, _) => true,
                (_, Some(operand), Some(number)) => {
                    let text = value.scalar_text().unwrap_or_default();
                    self.equal_number(number, operand, &text, term)
                }
                _ => {
                    let text = value.scalar_text().unwrap_or_default();
                    self.has_text(&text, term)
                }
            },
        }
    }

    fn has_key(&mut self, key: &str, term: &Term) -> bool {
        match (term.number, parse_number(key)) {
            (Some(operand), Some(number)) => self.equal_number(number, operand, key, term),
            _ => self.has_text(key, term),
        }
    }

    /// Returns the glob result, flagging a deprecation when the
    /// word-boundary reading disagrees.
    fn has_text(&mut self, text: &str, term: &Term) -> bool {
        match &term.pattern {
            Pattern::Has(HasPattern::Any) => !text.is_empty(),
            Pattern::Has(HasPattern::Glob { legacy, standard }) => {
                let matched = legacy.is_match(text);
                if matched != standard.is_match(text) {
                    self.deprecated = true;
                }
                matched
            }
            _ => false,
        }
    }

    // ==================== `=` ====================

    fn equals(&mut self, value: &Value, term: &Term) -> bool {
        match value {
            Value::Null => term.null,
            Value::List(items) => items.iter().any(|item| self.equals(item, term)),
            Value::Map(map) => map
                .iter()
                .any(|(key, item)| self.equal_str(key, term) || self.equals(item, term)),
            Value::Bool(b) => term.boolean == Some(*b),
            Value::Int(_) | Value::Float(_) => {
                let text = value.scalar_text().unwrap_or_default();
                match (term.number, value.as_f64()) {
                    (Some(operand), Some(number)) => {
                        self.equal_number(number, operand, &text, term)
                    }
                    _ => self.equal_text(&text, term),
                }
            }
            Value::String(s) => self.equal_str(s, term),
        }
    }

    fn equal_str(&mut self, s: &str, term: &Term) -> bool {
        match (term.number, parse_number(s)) {
            (Some(operand), Some(number)) => self.equal_number(number, operand, s, term),
            _ => self.equal_text(s, term),
        }
    }

    /// Numeric equality, flagging a deprecation when the operand would have
    /// matched a word of `text`.
    fn equal_number(&mut self, number: f64, operand: f64, text: &str, term: &Term) -> bool {
        let matched = number == operand;
        if !matched && word_matches(text, term) {
            self.deprecated = true;
        }
        matched
    }

    /// Whole-value case-insensitive equality, or a deprecated word match.
    fn equal_text(&mut self, text: &str, term: &Term) -> bool {
        if text.to_lowercase() == term.text().to_lowercase() {
            return true;
        }
        if word_matches(text, term) {
            self.deprecated = true;
            return true;
        }
        false
    }

    // ==================== `<`, `<=`, `>`, `>=` ====================

    fn compare(&mut self, op: Operator, value: &Value, term: &Term) -> bool {
        let ordering = match value {
            Value::List(items) => return items.iter().any(|item| self.compare(op, item, term)),
            Value::Null | Value::Bool(_) | Value::Map(_) => None,
            Value::Int(_) | Value::Float(_) => term
                .number
                .zip(value.as_f64())
                .and_then(|(operand, number)| number.partial_cmp(&operand)),
            // A numeric operand never orders a non-numeric string.
            Value::String(s) => self.compare_moment(s, term).or_else(|| {
                match (term.number, parse_number(s)) {
                    (Some(operand), Some(number)) => number.partial_cmp(&operand),
                    (Some(_), None) => None,
                    (None, _) => Some(s.as_str().cmp(term.text())),
                }
            }),
        };

        let Some(ordering) = ordering else {
            return false;
        };
        match op {
            Operator::Lt => ordering == Ordering::Less,
            Operator::Le => ordering != Ordering::Greater,
            Operator::Gt => ordering == Ordering::Greater,
            Operator::Ge => ordering != Ordering::Less,
            _ => false,
        }
    }

    /// Chronological ordering of a timestamp value against a date operand.
    fn compare_moment(&self, text: &str, term: &Term) -> Option<Ordering> {
        let moment = term.moment.as_ref()?;
        let timestamp = times::parse_datetime(text)?;
        let operand = moment.resolve(self.now)?;
        Some(timestamp.with_timezone(&Utc).cmp(&operand))
    }
}

// ==================== `~` ====================

fn regex_matches(value: &Value, term: &Term) -> bool {
    let Pattern::Regex(regex) = &term.pattern else {
        return false;
    };
    match value {
        Value::Null => false,
        Value::List(items) => items.iter().any(|item| regex_matches(item, term)),
        Value::Map(map) => map
            .iter()
            .any(|(key, item)| regex.is_match(key) || regex_matches(item, term)),
        scalar => scalar
            .scalar_text()
            .is_some_and(|text| regex.is_match(&text)),
    }
}

/// Whether the operand occurs in `text` delimited by word boundaries.
fn word_matches(text: &str, term: &Term) -> bool {
    match &term.pattern {
        Pattern::Equal { word } => word.as_ref().is_some_and(|w| w.is_match(text)),
        Pattern::Has(HasPattern::Glob { standard, .. }) => standard.is_match(text),
        _ => false,
    }
}

/// Global term matching: the legacy `:` rule against every string in the resource.
fn contains_string(value: &Value, term: &Term) -> bool {
    match value {
        Value::String(s) => match &term.pattern {
            Pattern::Has(HasPattern::Any) => !s.is_empty(),
            Pattern::Has(HasPattern::Glob { legacy, .. }) => legacy.is_match(s),
            _ => false,
        },
        Value::List(items) => items.iter().any(|item| contains_string(item, term)),
        Value::Map(map) => map.values().any(|item| contains_string(item, term)),
        _ => false,
    }
}
