//! Error types for filter compilation and evaluation.

use thiserror::Error;

use crate::transform::TransformError;

/// A specialized Result type for filter operations.
pub type FilterResult<T> = Result<T, FilterError>;

/// Broad classification of a [`FilterError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FilterErrorKind {
    /// The expression is malformed. Raised by compilation.
    Syntax,
    /// A transform named by the expression is not registered.
    Resolution,
    /// A transform failed while the filter was evaluated.
    Transform,
}

/// Errors that can occur while compiling or evaluating a filter.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum FilterError {
    /// An unexpected token was encountered during parsing.
    #[error("unexpected token '{token}' at position {position}")]
    UnexpectedToken {
        /// The unexpected token that was encountered.
        token: String,
        /// Byte offset of the token.
        position: usize,
    },

    /// The expression ended where more input was required.
    #[error("unexpected end of expression, expected {expected}")]
    UnexpectedEndOfInput {
        /// What the parser was looking for.
        expected: String,
        /// Byte offset of the end of the expression.
        position: usize,
    },

    /// An opening parenthesis was never closed.
    #[error("unclosed parenthesis at position {position}")]
    UnclosedParenthesis {
        /// Byte offset of the opening parenthesis.
        position: usize,
    },

    /// A quoted string was never terminated.
    #[error("unterminated string at position {position}")]
    UnterminatedString {
        /// Byte offset of the opening quote.
        position: usize,
    },

    /// A run of operator characters is not one of the recognized operators.
    #[error("invalid operator '{operator}' at position {position}")]
    InvalidOperator {
        /// The offending character run.
        operator: String,
        /// Byte offset of the run.
        position: usize,
    },

    /// `AND` and `OR` were combined at one parenthesis level.
    #[error("parenthesis required when combining AND and OR (position {position})")]
    MixedConnectives {
        /// Byte offset of the second connective kind.
        position: usize,
    },

    /// A word used as a key is not a valid access path.
    #[error("invalid key '{key}' at position {position}: {reason}")]
    InvalidKey {
        /// The key text.
        key: String,
        /// Byte offset of the key.
        position: usize,
        /// Why it was rejected.
        reason: String,
    },

    /// An operand is not acceptable for its operator.
    #[error("invalid operand '{operand}' at position {position}: {reason}")]
    InvalidOperand {
        /// The operand text.
        operand: String,
        /// Byte offset of the operand.
        position: usize,
        /// Why it was rejected.
        reason: String,
    },

    /// The expression calls a transform no environment in the chain defines.
    #[error("unknown transform {name}() at position {position}{}", did_you_mean(.suggestion))]
    UnknownTransform {
        /// The transform name.
        name: String,
        /// Byte offset of the call.
        position: usize,
        /// Closest registered name, if any is close.
        suggestion: Option<String>,
    },

    /// A transform could not be resolved while evaluating.
    #[error("transform {name}() is not registered")]
    UnresolvedTransform {
        /// The transform name.
        name: String,
    },

    /// A transform failed while evaluating.
    #[error("transform {name}() failed on [{key}]: {source}")]
    Transform {
        /// The key the transform was applied to.
        key: String,
        /// The transform name.
        name: String,
        /// The underlying failure.
        #[source]
        source: TransformError,
    },
}

fn did_you_mean(suggestion: &Option<String>) -> String {
    match suggestion {
        Some(name) => format!(", did you mean {name}()?"),
        None => String::new(),
    }
}

impl FilterError {
    /// Creates an unexpected token error.
    pub fn unexpected_token(token: impl Into<String>, position: usize) -> Self {
        FilterError::UnexpectedToken {
            token: token.into(),
            position,
        }
    }

    /// Creates an unexpected end of input error.
    pub fn unexpected_end(expected: impl Into<String>, position: usize) -> Self {
        FilterError::UnexpectedEndOfInput {
            expected: expected.into(),
            position,
        }
    }

    /// Creates an invalid key error.
    pub fn invalid_key(key: impl Into<String>, position: usize, reason: impl Into<String>) -> Self {
        FilterError::InvalidKey {
            key: key.into(),
            position,
            reason: reason.into(),
        }
    }

    /// Creates an invalid operand error.
    pub fn invalid_operand(
        operand: impl Into<String>,
        position: usize,
        reason: impl Into<String>,
    ) -> Self {
        FilterError::InvalidOperand {
            operand: operand.into(),
            position,
            reason: reason.into(),
        }
    }

    /// Returns the broad classification of this error.
    pub fn kind(&self) -> FilterErrorKind {
        match self {
            FilterError::UnresolvedTransform { .. } => FilterErrorKind::Resolution,
            FilterError::Transform { .. } => FilterErrorKind::Transform,
            _ => FilterErrorKind::Syntax,
        }
    }

    /// Returns the byte offset of a syntax error.
    pub fn position(&self) -> Option<usize> {
        match self {
            FilterError::UnexpectedToken { position, .. }
            | FilterError::UnexpectedEndOfInput { position, .. }
            | FilterError::UnclosedParenthesis { position }
            | FilterError::UnterminatedString { position }
            | FilterError::InvalidOperator { position, .. }
            | FilterError::MixedConnectives { position }
            | FilterError::InvalidKey { position, .. }
            | FilterError::InvalidOperand { position, .. }
            | FilterError::UnknownTransform { position, .. } => Some(*position),
            FilterError::UnresolvedTransform { .. } | FilterError::Transform { .. } => None,
        }
    }

    /// Returns true for errors raised while compiling.
    pub fn is_syntax(&self) -> bool {
        self.kind() == FilterErrorKind::Syntax
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_classification() {
        assert_eq!(
            FilterError::unexpected_token(")", 3).kind(),
            FilterErrorKind::Syntax
        );
        assert_eq!(
            FilterError::UnresolvedTransform {
                name: "foo".to_string()
            }
            .kind(),
            FilterErrorKind::Resolution
        );
        let err = FilterError::Transform {
            key: "integer".to_string(),
            name: "error".to_string(),
            source: TransformError::new("boom"),
        };
        assert_eq!(err.kind(), FilterErrorKind::Transform);
        assert_eq!(err.position(), None);
    }

    #[test]
    fn test_position() {
        assert_eq!(
            FilterError::MixedConnectives { position: 17 }.position(),
            Some(17)
        );
        assert_eq!(
            FilterError::unexpected_end("operand", 4).position(),
            Some(4)
        );
    }

    #[test]
    fn test_unknown_transform_message_with_suggestion() {
        let err = FilterError::UnknownTransform {
            name: "lenn".to_string(),
            position: 2,
            suggestion: Some("len".to_string()),
        };
        assert_eq!(
            err.to_string(),
            "unknown transform lenn() at position 2, did you mean len()?"
        );

        let err = FilterError::UnknownTransform {
            name: "foo".to_string(),
            position: 2,
            suggestion: None,
        };
        assert_eq!(err.to_string(), "unknown transform foo() at position 2");
    }

    #[test]
    fn test_transform_message_includes_cause() {
        let err = FilterError::Transform {
            key: "integer".to_string(),
            name: "error".to_string(),
            source: TransformError::new("Transform function value error."),
        };
        assert_eq!(
            err.to_string(),
            "transform error() failed on [integer]: Transform function value error."
        );
    }
}
