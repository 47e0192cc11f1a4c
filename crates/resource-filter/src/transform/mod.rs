//! Transforms callable from filter expressions.
//!
//! A transform maps a value (and literal string arguments) to a new value.
//! Filters call them either on a key, `lower.len()`, or in function form,
//! `len(lower)`; the result replaces the left side of the predicate.
//!
//! Any `Fn(&Value, &[Value]) -> Result<Value, TransformError>` that is
//! `Send + Sync` is a [`Transform`], so registering a custom one is a closure:
//!
//! ```
//! use resource_filter::{ProjectionEnv, TransformError, Value};
//!
//! let env = ProjectionEnv::builder()
//!     .parent(ProjectionEnv::builtin())
//!     .transform("upper", |value: &Value, _args: &[Value]| {
//!         Ok::<_, TransformError>(Value::from(value.to_string().to_uppercase()))
//!     })
//!     .build();
//! assert!(env.transform("upper").is_some());
//! ```

mod builtins;

use thiserror::Error;

use crate::value::Value;

pub(crate) use builtins::BUILTINS;

/// Failure raised by a transform.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct TransformError {
    message: String,
}

impl TransformError {
    /// Creates a transform error with the given message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// Returns the error message.
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// A named function applied to resource values.
pub trait Transform: Send + Sync {
    /// Applies the transform to `value` with the literal arguments from the call.
    fn apply(&self, value: &Value, args: &[Value]) -> Result<Value, TransformError>;
}

impl<F> Transform for F
where
    F: Fn(&Value, &[Value]) -> Result<Value, TransformError> + Send + Sync,
{
    fn apply(&self, value: &Value, args: &[Value]) -> Result<Value, TransformError> {
        self(value, args)
    }
}

/// Returns the text of argument `index`, if given.
pub(crate) fn arg_text(args: &[Value], index: usize) -> Option<String> {
    args.get(index).and_then(Value::scalar_text)
}

/// Returns argument `index` as an integer, if given and numeric.
pub(crate) fn arg_int(args: &[Value], index: usize) -> Option<i64> {
    let text = arg_text(args, index)?;
    text.trim().parse::<i64>().ok()
}
