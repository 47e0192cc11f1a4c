//! Operand classification.
//!
//! Each literal on the right of an operator is classified once, when the
//! filter is compiled: its numeric, boolean and date readings are parsed and
//! any pattern the operator needs is compiled into a [`Regex`] kept in the
//! AST, so evaluation never re-parses or recompiles.

use std::fmt;

use regex::{Regex, RegexBuilder};

use super::ast::Operator;
use super::error::{FilterError, FilterResult};
use crate::times::Moment;
use crate::value::parse_number;

/// A literal as written in the expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Literal {
    /// The text with quotes and escapes removed.
    pub text: String,
    /// Whether any part of it was quoted.
    pub quoted: bool,
    /// Byte offset in the expression.
    pub position: usize,
}

impl Literal {
    /// Creates an unquoted literal.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            quoted: false,
            position: 0,
        }
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.quoted || self.text.is_empty() {
            write!(f, "\"{}\"", self.text.replace('\\', "\\\\").replace('"', "\\\""))
        } else {
            write!(f, "{}", self.text)
        }
    }
}

/// The compiled matcher for a `:` operand.
#[derive(Debug, Clone)]
pub(crate) enum HasPattern {
    /// `*`: any present, non-empty value.
    Any,
    /// A substring or glob.
    Glob {
        /// The result that is returned: substring, `prefix*`, `*suffix`
        /// or `prefix*suffix` anchored at the ends of the value.
        legacy: Regex,
        /// The word-boundary reading; a difference from `legacy` is deprecated.
        standard: Regex,
    },
}

/// The operator-specific part of a [`Term`].
#[derive(Debug, Clone)]
pub(crate) enum Pattern {
    /// Ordering operators need no pattern.
    None,
    /// `:`.
    Has(HasPattern),
    /// `=` and `!=`: the operand as a whole word of the value.
    Equal {
        /// `None` for an empty operand.
        word: Option<Regex>,
    },
    /// `~` and `!~`.
    Regex(Regex),
}

/// A classified operand literal.
#[derive(Debug, Clone)]
pub struct Term {
    literal: Literal,
    pub(crate) number: Option<f64>,
    pub(crate) boolean: Option<bool>,
    pub(crate) null: bool,
    pub(crate) moment: Option<Moment>,
    pub(crate) pattern: Pattern,
}

impl Term {
    /// Classifies `literal` for use with `op`.
    ///
    /// # Errors
    ///
    /// Returns [`FilterError::InvalidOperand`] for a `:` pattern with more
    /// than one `*` and for a `~`/`!~` pattern that is not a valid regex.
    pub fn compile(literal: Literal, op: Operator) -> FilterResult<Self> {
        let text = literal.text.as_str();
        let pattern = match op {
            Operator::Has => Pattern::Has(has_pattern(&literal)?),
            Operator::Eq | Operator::Ne => Pattern::Equal {
                word: if text.is_empty() {
                    None
                } else {
                    Some(insensitive(&word_pattern(&regex::escape(text), text))?)
                },
            },
            Operator::Match | Operator::NotMatch => Pattern::Regex(
                Regex::new(text).map_err(|e| {
                    FilterError::invalid_operand(text, literal.position, e.to_string())
                })?,
            ),
            Operator::Lt | Operator::Le | Operator::Gt | Operator::Ge => Pattern::None,
        };

        let lower = text.to_ascii_lowercase();
        Ok(Self {
            number: parse_number(text),
            boolean: match lower.as_str() {
                "true" | "1" => Some(true),
                "false" | "0" => Some(false),
                _ => None,
            },
            null: !literal.quoted && lower == "null",
            moment: if op.is_ordering() {
                Moment::parse(text)
            } else {
                None
            },
            pattern,
            literal,
        })
    }

    /// The literal this term was compiled from.
    pub fn literal(&self) -> &Literal {
        &self.literal
    }

    /// The literal's text.
    pub fn text(&self) -> &str {
        &self.literal.text
    }
}

impl PartialEq for Term {
    fn eq(&self, other: &Self) -> bool {
        self.literal == other.literal
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.literal.fmt(f)
    }
}

/// The right side of a predicate.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    /// A single literal.
    Single(Term),
    /// A parenthesized set; matches if any member matches.
    Set(Vec<Term>),
}

impl Operand {
    /// The operand's terms in order.
    pub fn terms(&self) -> &[Term] {
        match self {
            Operand::Single(term) => std::slice::from_ref(term),
            Operand::Set(terms) => terms,
        }
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Single(term) => term.fmt(f),
            Operand::Set(terms) => {
                let parts: Vec<String> = terms.iter().map(ToString::to_string).collect();
                write!(f, "({})", parts.join(", "))
            }
        }
    }
}

fn insensitive(pattern: &str) -> FilterResult<Regex> {
    RegexBuilder::new(pattern)
        .case_insensitive(true)
        .dot_matches_new_line(true)
        .build()
        .map_err(|e| FilterError::invalid_operand(pattern, 0, e.to_string()))
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Wraps an escaped pattern in word boundaries where `raw` starts or ends
/// with a word character.
fn word_pattern(escaped: &str, raw: &str) -> String {
    let start = raw.chars().next().is_some_and(is_word_char);
    let end = raw.chars().last().is_some_and(is_word_char);
    format!(
        "{}{}{}",
        if start { r"\b" } else { "" },
        escaped,
        if end { r"\b" } else { "" }
    )
}

fn has_pattern(literal: &Literal) -> FilterResult<HasPattern> {
    let text = literal.text.as_str();
    if text == "*" {
        return Ok(HasPattern::Any);
    }

    let stars = text.matches('*').count();
    if stars > 1 {
        return Err(FilterError::invalid_operand(
            text,
            literal.position,
            "at most one '*' is allowed",
        ));
    }

    let legacy = match text.split_once('*') {
        None => regex::escape(text),
        Some((prefix, "")) => format!("^{}", regex::escape(prefix)),
        Some(("", suffix)) => format!("{}$", regex::escape(suffix)),
        Some((prefix, suffix)) => {
            format!("^{}.*{}$", regex::escape(prefix), regex::escape(suffix))
        }
    };
    let standard = match text.strip_suffix('*') {
        Some(prefix) => {
            let escaped = regex::escape(prefix);
            if prefix.chars().next().is_some_and(is_word_char) {
                format!(r"\b{escaped}")
            } else {
                escaped
            }
        }
        None => word_pattern(&regex::escape(text), text),
    };

    Ok(HasPattern::Glob {
        legacy: insensitive(&legacy)?,
        standard: insensitive(&standard)?,
    })
}
