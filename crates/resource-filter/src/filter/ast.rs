//! Abstract Syntax Tree (AST) for filter expressions.

use std::fmt;

use super::key::Key;
use super::operand::{Operand, Term};

/// A comparison operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    /// `:` has / contains.
    Has,
    /// `=` equals.
    Eq,
    /// `!=` does not equal.
    Ne,
    /// `<` less than.
    Lt,
    /// `<=` less than or equal.
    Le,
    /// `>` greater than.
    Gt,
    /// `>=` greater than or equal.
    Ge,
    /// `~` regex matches.
    Match,
    /// `!~` regex does not match.
    NotMatch,
}

impl Operator {
    /// All operators, in the order their symbols are documented.
    pub const ALL: [Operator; 9] = [
        Operator::Has,
        Operator::Eq,
        Operator::Ne,
        Operator::Lt,
        Operator::Le,
        Operator::Gt,
        Operator::Ge,
        Operator::Match,
        Operator::NotMatch,
    ];

    /// The operator's symbol as written in expressions.
    pub fn symbol(self) -> &'static str {
        match self {
            Operator::Has => ":",
            Operator::Eq => "=",
            Operator::Ne => "!=",
            Operator::Lt => "<",
            Operator::Le => "<=",
            Operator::Gt => ">",
            Operator::Ge => ">=",
            Operator::Match => "~",
            Operator::NotMatch => "!~",
        }
    }

    /// Looks up an operator by its exact symbol.
    pub fn from_symbol(symbol: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|op| op.symbol() == symbol)
    }

    /// Whether a parenthesized set may follow the operator.
    pub fn accepts_set(self) -> bool {
        matches!(self, Operator::Has | Operator::Eq | Operator::Ne)
    }

    /// Whether the operator orders its operands.
    pub fn is_ordering(self) -> bool {
        matches!(
            self,
            Operator::Lt | Operator::Le | Operator::Gt | Operator::Ge
        )
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// A `key op operand` restriction.
#[derive(Debug, Clone, PartialEq)]
pub struct Predicate {
    /// The left side.
    pub key: Key,
    /// The operator.
    pub op: Operator,
    /// The right side.
    pub operand: Operand,
    /// Set by a leading `NOT` or `-`.
    pub negated: bool,
    /// The predicate's source text, used to identify it in warnings.
    pub source: String,
}

impl Predicate {
    /// Creates a predicate, deriving its source text from its parts.
    pub fn new(key: Key, op: Operator, operand: Operand) -> Self {
        let source = format!("{key}{op}{operand}");
        Self {
            key,
            op,
            operand,
            negated: false,
            source,
        }
    }
}

/// A term with no operator.
#[derive(Debug, Clone, PartialEq)]
pub enum Global {
    /// Matches any string in the resource with `:` semantics.
    Term(Term),
    /// A transform call; true when its result is truthy.
    Call(Key),
    /// A bare `.`; true for any non-null resource.
    Any,
}

/// A parsed filter expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    // ==================== Restrictions ====================
    /// `key op operand`.
    Predicate(Predicate),

    /// A bare word or call.
    Global(Global),

    // ==================== Boolean Operators ====================
    /// Logical AND of two expressions.
    And(Box<Expr>, Box<Expr>),

    /// Logical OR of two expressions.
    Or(Box<Expr>, Box<Expr>),

    /// Logical NOT of an expression.
    Not(Box<Expr>),
}

impl Expr {
    /// Creates an AND expression from two expressions.
    pub fn and(left: Expr, right: Expr) -> Self {
        Expr::And(Box::new(left), Box::new(right))
    }

    /// Creates an OR expression from two expressions.
    pub fn or(left: Expr, right: Expr) -> Self {
        Expr::Or(Box::new(left), Box::new(right))
    }

    /// Negates an expression.
    ///
    /// A predicate absorbs the negation into its `negated` flag; anything
    /// else is wrapped in [`Expr::Not`].
    pub fn negate(inner: Expr) -> Self {
        match inner {
            Expr::Predicate(mut predicate) => {
                predicate.negated = !predicate.negated;
                Expr::Predicate(predicate)
            }
            other => Expr::Not(Box::new(other)),
        }
    }

    /// Calls `f` with every key the expression evaluates.
    pub(crate) fn visit_keys<'a>(&'a self, f: &mut impl FnMut(&'a Key)) {
        match self {
            Expr::Predicate(predicate) => f(&predicate.key),
            Expr::Global(Global::Call(key)) => f(key),
            Expr::Global(_) => {}
            Expr::And(left, right) | Expr::Or(left, right) => {
                left.visit_keys(f);
                right.visit_keys(f);
            }
            Expr::Not(inner) => inner.visit_keys(f),
        }
    }
}
