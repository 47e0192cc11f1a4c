//! Filter expression parser and evaluator for structured resources.
//!
//! A filter selects resources by comparing the values at access paths with
//! literal operands. Expressions are compiled once against a
//! [`ProjectionEnv`] and then evaluated against any number of [`Value`]s.
//!
//! # Supported Syntax
//!
//! ## Restrictions
//! - `key:value` - has: case-insensitive substring, `prefix*`, `*suffix`, `key:*`
//! - `key=value`, `key!=value` - equality, numeric when both sides are numbers
//! - `key<value`, `<=`, `>`, `>=` - numeric, chronological or lexicographic ordering
//! - `key~regex`, `key!~regex` - unanchored regex match
//! - `key:(a, b OR c)` - set operand, true if any member matches
//!
//! ## Keys
//! - `a.b.c`, `list[2].name` - access paths; a field applied to a list maps over it
//! - `key.len()`, `len(key)` - transform calls
//!
//! ## Boolean Operators
//! - `AND`, adjacency - conjunction
//! - `OR` - disjunction; may not be mixed with `AND` inside one pair of parentheses
//! - `NOT`, `-` - negation
//! - `()` - grouping
//!
//! ## Global Terms
//! - `word` - any string in the resource has `word`
//! - `len(key)` - the transform result is truthy
//!
//! # Example
//!
//! ```
//! use resource_filter::{Filter, IgnoreWarnings, ProjectionEnv, Value};
//! use serde_json::json;
//!
//! let env = ProjectionEnv::builtin();
//! let filter = Filter::compile("integer=2 OR floating=3.14", &env).unwrap();
//!
//! let resource = Value::from(json!({"integer": 2, "floating": 2.5}));
//! assert!(filter.evaluate(&resource, &mut IgnoreWarnings).unwrap());
//! ```

mod ast;
mod error;
mod evaluator;
mod key;
mod lexer;
mod operand;
mod parser;
mod warning;

pub use ast::{Expr, Global, Operator, Predicate};
pub use error::{FilterError, FilterErrorKind, FilterResult};
pub use evaluator::FilterEvaluator;
pub use key::{AccessPath, CallForm, Key, Segment, TransformCall};
pub use lexer::{FilterToken, Lexer, LexerError, LexerErrorKind, LexerResult, PositionedToken};
pub use operand::{Literal, Operand, Term};
pub use parser::FilterParser;
pub use warning::{Deprecation, IgnoreWarnings, LogWarnings, WarningSink};

use tracing::{debug, trace};

use crate::projection::ProjectionEnv;
use crate::value::Value;

/// A compiled filter expression.
///
/// Immutable once compiled; share it freely across threads. An empty
/// expression matches every resource.
#[derive(Debug, Clone)]
pub struct Filter {
    source: String,
    expr: Option<Expr>,
    env: ProjectionEnv,
}

impl Filter {
    /// Compiles `source` against `env`.
    ///
    /// # Errors
    ///
    /// Returns a syntax [`FilterError`] for malformed expressions, including
    /// calls to transforms `env` does not define.
    pub fn compile(source: &str, env: &ProjectionEnv) -> FilterResult<Self> {
        let expr = FilterParser::parse(source, env)?;
        debug!(filter = source, empty = expr.is_none(), "compiled filter");
        Ok(Self {
            source: source.to_string(),
            expr,
            env: env.clone(),
        })
    }

    /// Wraps an already built expression.
    ///
    /// Transforms it calls are looked up when it is evaluated, so an
    /// unregistered name surfaces as [`FilterError::UnresolvedTransform`].
    pub fn from_expr(expr: Expr, env: &ProjectionEnv) -> Self {
        Self {
            source: String::new(),
            expr: Some(expr),
            env: env.clone(),
        }
    }

    /// The expression text this filter was compiled from.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// The compiled expression, `None` for an empty filter.
    pub fn expr(&self) -> Option<&Expr> {
        self.expr.as_ref()
    }

    /// The environment the filter was compiled against.
    pub fn env(&self) -> &ProjectionEnv {
        &self.env
    }

    /// Every key the filter reads, in expression order, after alias substitution.
    pub fn keys(&self) -> Vec<&Key> {
        let mut keys = Vec::new();
        if let Some(expr) = &self.expr {
            expr.visit_keys(&mut |key| keys.push(key));
        }
        keys
    }

    /// Evaluates the filter against `resource`.
    ///
    /// At most one deprecation is passed to `warnings`, after the result is
    /// known. Calls share no state, so repeating a call repeats its result
    /// and its warning.
    ///
    /// # Errors
    ///
    /// Returns [`FilterError::Transform`] if a transform fails and
    /// [`FilterError::UnresolvedTransform`] if one is not registered.
    pub fn evaluate(&self, resource: &Value, warnings: &mut dyn WarningSink) -> FilterResult<bool> {
        let Some(expr) = &self.expr else {
            return Ok(true);
        };

        let mut evaluator = FilterEvaluator::new(&self.env);
        let matched = evaluator.evaluate(expr, resource)?;
        trace!(filter = %self.source, matched, "evaluated filter");

        if let Some(deprecation) = evaluator.into_deprecation() {
            warnings.warn(deprecation);
        }
        Ok(matched)
    }

    /// Evaluates the filter, logging deprecations through `tracing`.
    ///
    /// # Errors
    ///
    /// See [`Filter::evaluate`].
    pub fn matches(&self, resource: &Value) -> FilterResult<bool> {
        self.evaluate(resource, &mut LogWarnings)
    }

    /// Returns the resources the filter selects, in order.
    ///
    /// # Errors
    ///
    /// Stops at the first evaluation error.
    pub fn filter_values<'v>(
        &self,
        resources: &'v [Value],
        warnings: &mut dyn WarningSink,
    ) -> FilterResult<Vec<&'v Value>> {
        let mut selected = Vec::new();
        for resource in resources {
            if self.evaluate(resource, warnings)? {
                selected.push(resource);
            }
        }
        Ok(selected)
    }
}


#[cfg(test)]
mod evaluator_tests;
