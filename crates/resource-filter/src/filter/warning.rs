//! Deprecation warnings raised while evaluating.

use std::fmt;

use tracing::warn;

use super::ast::Operator;

/// A restriction whose result depends on matching rules that are changing.
///
/// Raised when `:` matched a substring that is not a whole word (or only
/// matched as a glob), or when `=` matched only a word inside the value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Deprecation {
    /// Source text of the restriction.
    pub expression: String,
    /// Its operator.
    pub operator: Operator,
}

impl fmt::Display for Deprecation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} operator evaluation is changing: the result of [{}] will differ \
             once {} matches whole words only",
            self.operator, self.expression, self.operator
        )
    }
}

/// Receives the warnings of each evaluation.
///
/// [`crate::Filter::evaluate`] calls [`WarningSink::warn`] at most once per
/// call, after the result is known.
pub trait WarningSink {
    /// Records a warning.
    fn warn(&mut self, deprecation: Deprecation);
}

impl WarningSink for Vec<Deprecation> {
    fn warn(&mut self, deprecation: Deprecation) {
        self.push(deprecation);
    }
}

/// Discards warnings.
#[derive(Debug, Clone, Copy, Default)]
pub struct IgnoreWarnings;

impl WarningSink for IgnoreWarnings {
    fn warn(&mut self, _deprecation: Deprecation) {}
}

/// Forwards warnings to `tracing` at WARN level.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogWarnings;

impl WarningSink for LogWarnings {
    fn warn(&mut self, deprecation: Deprecation) {
        warn!(
            expression = %deprecation.expression,
            operator = %deprecation.operator,
            "{deprecation}"
        );
    }
}
