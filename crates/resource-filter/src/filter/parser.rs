//! Recursive descent parser for filter expressions.

use super::ast::{Expr, Global, Operator, Predicate};
use super::error::{FilterError, FilterResult};
use super::key::{AccessPath, CallForm, Key, Segment, TransformCall};
use super::lexer::{FilterToken, Lexer, PositionedToken};
use super::operand::{Literal, Operand, Term};
use crate::projection::ProjectionEnv;
use crate::value::Value;

/// Parser for filter expressions.
///
/// Aliases are substituted and transform names checked against the
/// environment while parsing, so a parsed expression only refers to keys and
/// transforms that exist.
///
/// # Grammar
///
/// ```text
/// expr      ::= term ("OR" term)*
/// term      ::= factor (["AND"] factor)*     adjacency is AND
/// factor    ::= ("NOT" | "-") factor | atom
/// atom      ::= "(" expr ")" | key operator operand | global
/// key       ::= path | path "." name "(" args ")" | name "(" args ")"
/// operand   ::= word | "(" word ([","|"OR"] word)* ")"
/// global    ::= word | name "(" args ")"
/// ```
///
/// # Operator Precedence (highest to lowest)
///
/// 1. `NOT` and `-` - unary
/// 2. `AND` and adjacency - binary, left-associative
/// 3. `OR` - binary, left-associative
///
/// `AND` and `OR` may not both appear between the same pair of parentheses.
///
/// # Example
///
/// ```
/// use resource_filter::filter::{Expr, FilterParser};
/// use resource_filter::ProjectionEnv;
///
/// let env = ProjectionEnv::builtin();
/// let expr = FilterParser::parse("integer:2 (lower:string OR upper:string)", &env)
///     .unwrap()
///     .unwrap();
/// assert!(matches!(expr, Expr::And(_, _)));
///
/// assert!(FilterParser::parse("a:1 AND b:2 OR c:3", &env).is_err());
/// assert!(FilterParser::parse("", &env).unwrap().is_none());
/// ```
pub struct FilterParser<'a> {
    input: &'a str,
    tokens: Vec<PositionedToken>,
    position: usize,
    env: &'a ProjectionEnv,
}

/// Which connectives appeared at one parenthesis level.
#[derive(Default)]
struct Connectives {
    and: bool,
    or: bool,
}

/// A word token being parsed as a key or global term.
struct WordToken {
    text: String,
    quoted: bool,
    position: usize,
}

impl<'a> FilterParser<'a> {
    /// Parses a filter expression.
    ///
    /// Returns `Ok(None)` for an empty (or all-whitespace) expression.
    ///
    /// # Errors
    ///
    /// Returns a syntax [`FilterError`] carrying the byte offset of the
    /// offending token.
    pub fn parse(input: &'a str, env: &'a ProjectionEnv) -> FilterResult<Option<Expr>> {
        let result = Lexer::new(input).tokenize_with_errors();
        if let Some(err) = result.errors.into_iter().next() {
            return Err(err.into());
        }
        if result.tokens.is_empty() {
            return Ok(None);
        }

        let mut parser = Self {
            input,
            tokens: result.tokens,
            position: 0,
            env,
        };
        let expr = parser.parse_expression()?;

        if let Some(remaining) = parser.peek_positioned() {
            return Err(FilterError::unexpected_token(
                remaining.token.to_string(),
                remaining.position,
            ));
        }

        Ok(Some(expr))
    }

    /// Returns the current token without consuming it.
    fn peek(&self) -> Option<&FilterToken> {
        self.peek_positioned().map(|t| &t.token)
    }

    /// Returns the current token and its position without consuming it.
    fn peek_positioned(&self) -> Option<&PositionedToken> {
        self.tokens.get(self.position)
    }

    /// Consumes and returns the current token.
    fn advance(&mut self) -> Option<PositionedToken> {
        let token = self.tokens.get(self.position).cloned();
        if token.is_some() {
            self.position += 1;
        }
        token
    }

    /// Checks if the current token matches the expected token.
    fn check(&self, expected: &FilterToken) -> bool {
        self.peek() == Some(expected)
    }

    /// End offset of the last consumed token.
    fn consumed_end(&self) -> usize {
        self.position
            .checked_sub(1)
            .and_then(|i| self.tokens.get(i))
            .map_or(0, |t| t.end)
    }

    fn end_of_input(&self, expected: &str) -> FilterError {
        FilterError::unexpected_end(expected, self.input.len())
    }

    /// Parses OR expressions: `term ("OR" term)*`
    fn parse_expression(&mut self) -> FilterResult<Expr> {
        let mut seen = Connectives::default();
        let mut left = self.parse_term(&mut seen)?;

        while self.check(&FilterToken::Or) {
            let or = self.advance().map_or(0, |t| t.position);
            if seen.and {
                return Err(FilterError::MixedConnectives { position: or });
            }
            seen.or = true;
            let right = self.parse_term(&mut seen)?;
            left = Expr::or(left, right);
        }

        Ok(left)
    }

    /// Parses AND expressions: `factor (["AND"] factor)*`
    fn parse_term(&mut self, seen: &mut Connectives) -> FilterResult<Expr> {
        let mut left = self.parse_factor()?;

        loop {
            match self.peek() {
                Some(FilterToken::And) => {
                    let and = self.advance().map_or(0, |t| t.position);
                    if seen.or {
                        return Err(FilterError::MixedConnectives { position: and });
                    }
                    seen.and = true;
                }
                Some(FilterToken::Word { .. } | FilterToken::Not | FilterToken::OpenParen) => {}
                _ => break,
            }
            let right = self.parse_factor()?;
            left = Expr::and(left, right);
        }

        Ok(left)
    }

    /// Parses negations: `("NOT" | "-") factor | atom`
    fn parse_factor(&mut self) -> FilterResult<Expr> {
        if self.check(&FilterToken::Not) {
            self.advance();
            let inner = self.parse_factor()?;
            return Ok(Expr::negate(inner));
        }
        self.parse_atom()
    }

    /// Parses a parenthesized expression, restriction or global term.
    fn parse_atom(&mut self) -> FilterResult<Expr> {
        let token = self
            .advance()
            .ok_or_else(|| self.end_of_input("a term"))?;

        match token.token {
            FilterToken::OpenParen => {
                let inner = self.parse_expression()?;
                if !self.check(&FilterToken::CloseParen) {
                    return Err(match self.peek_positioned() {
                        Some(next) => {
                            FilterError::unexpected_token(next.token.to_string(), next.position)
                        }
                        None => FilterError::UnclosedParenthesis {
                            position: token.position,
                        },
                    });
                }
                self.advance();
                Ok(inner)
            }

            FilterToken::Word { text, quoted } => {
                if !quoted && text == "-" {
                    let inner = self.parse_factor()?;
                    return Ok(Expr::negate(inner));
                }
                if let (false, Some(rest)) = (quoted, text.strip_prefix('-')) {
                    let word = WordToken {
                        text: self.join_dotted(rest.to_string()),
                        quoted,
                        position: token.position + 1,
                    };
                    return Ok(Expr::negate(self.parse_restriction(word)?));
                }
                let text = if quoted { text } else { self.join_dotted(text) };
                self.parse_restriction(WordToken {
                    text,
                    quoted,
                    position: token.position,
                })
            }

            other => Err(FilterError::unexpected_token(
                other.to_string(),
                token.position,
            )),
        }
    }

    /// Joins a key written with spaces around its dots, as in `a . b:x`.
    ///
    /// Unquoted words continue the key while the text so far ends with `.` or
    /// the next word starts with one. The run is only taken when an operator
    /// or call follows it, so `.` and dotted global terms stay as they are.
    fn join_dotted(&mut self, text: String) -> String {
        if text == "." {
            return text;
        }
        let mut joined = text.clone();
        let mut end = self.position;
        while let Some(PositionedToken {
            token: FilterToken::Word {
                text: next,
                quoted: false,
            },
            ..
        }) = self.tokens.get(end)
        {
            if !joined.ends_with('.') && !next.starts_with('.') {
                break;
            }
            joined.push_str(next);
            end += 1;
        }
        if end == self.position {
            return text;
        }

        let keyed = self.tokens.get(end).is_some_and(|next| match next.token {
            FilterToken::Operator(_) => true,
            FilterToken::OpenParen => !next.spaced,
            _ => false,
        });
        if keyed {
            self.position = end;
            joined
        } else {
            text
        }
    }

    /// Parses `key op operand`, or a global term when no operator follows.
    fn parse_restriction(&mut self, word: WordToken) -> FilterResult<Expr> {
        let is_call = self
            .peek_positioned()
            .is_some_and(|next| next.token == FilterToken::OpenParen && !next.spaced);
        let call_args = if is_call {
            Some(self.parse_call_args()?)
        } else {
            None
        };

        let Some(FilterToken::Operator(op)) = self.peek().cloned() else {
            return Ok(Expr::Global(match call_args {
                Some(args) => Global::Call(self.parse_key(&word, Some(args))?),
                None if !word.quoted && word.text == "." => Global::Any,
                None => Global::Term(Term::compile(
                    Literal {
                        text: word.text,
                        quoted: word.quoted,
                        position: word.position,
                    },
                    Operator::Has,
                )?),
            }));
        };

        let key = self.parse_key(&word, call_args)?;
        self.advance();
        let operand = self.parse_operand(op)?;

        let mut predicate = Predicate::new(key, op, operand);
        if let Some(source) = self.input.get(word.position..self.consumed_end()) {
            predicate.source = source.trim().to_string();
        }
        Ok(Expr::Predicate(predicate))
    }

    /// Parses the arguments of a call: `"(" arg ("," arg)* ")"`.
    ///
    /// Tokens inside one argument are joined back into text, separated by a
    /// space where the expression had whitespace.
    fn parse_call_args(&mut self) -> FilterResult<Vec<String>> {
        let open = self.advance().map_or(0, |t| t.position);
        let mut args = Vec::new();
        let mut current: Option<String> = None;

        loop {
            let token = self
                .advance()
                .ok_or(FilterError::UnclosedParenthesis { position: open })?;
            let text = match token.token {
                FilterToken::CloseParen => {
                    if let Some(arg) = current.take() {
                        args.push(arg);
                    } else if !args.is_empty() {
                        args.push(String::new());
                    }
                    return Ok(args);
                }
                FilterToken::Comma => {
                    args.push(current.take().unwrap_or_default());
                    continue;
                }
                FilterToken::OpenParen => {
                    return Err(FilterError::unexpected_token("(", token.position));
                }
                FilterToken::Word { text, .. } => text,
                other => other.to_string(),
            };
            match current.as_mut() {
                Some(arg) => {
                    if token.spaced {
                        arg.push(' ');
                    }
                    arg.push_str(&text);
                }
                None => current = Some(text),
            }
        }
    }

    /// Parses the text of a key, with optional transform call arguments.
    fn parse_key(&self, word: &WordToken, call_args: Option<Vec<String>>) -> FilterResult<Key> {
        let Some(args) = call_args else {
            return Ok(Key::path(self.parse_path(
                &word.text,
                word.quoted,
                word.position,
            )?));
        };

        let (path_text, name) = match word.text.rsplit_once('.') {
            Some((path, name)) => (Some(path), name),
            None => (None, word.text.as_str()),
        };
        if name.is_empty() {
            return Err(FilterError::invalid_key(
                &word.text,
                word.position,
                "expected a transform name before '('",
            ));
        }
        if self.env.transform(name).is_none() {
            return Err(FilterError::UnknownTransform {
                name: name.to_string(),
                position: word.position,
                suggestion: self.env.suggest_transform(name),
            });
        }

        let (path, form) = match path_text {
            Some(path) => (self.parse_path(path, false, word.position)?, CallForm::Method),
            None => {
                let arg_path = args
                    .first()
                    .and_then(|arg| arg.parse::<AccessPath>().ok())
                    .map(|path| self.expand_alias(path));
                (AccessPath::default(), CallForm::Function { arg_path })
            }
        };

        Ok(Key {
            path,
            call: Some(TransformCall {
                name: name.to_string(),
                args: args.into_iter().map(Value::String).collect(),
                form,
            }),
        })
    }

    /// Parses an access path and substitutes an alias for its first segment.
    fn parse_path(&self, text: &str, quoted: bool, position: usize) -> FilterResult<AccessPath> {
        if quoted {
            return Ok(AccessPath::field(text));
        }
        let path = text
            .parse::<AccessPath>()
            .map_err(|reason| FilterError::invalid_key(text, position, reason))?;
        Ok(self.expand_alias(path))
    }

    fn expand_alias(&self, path: AccessPath) -> AccessPath {
        match path.segments().split_first() {
            Some((Segment::Field(name), rest)) => match self.env.alias(name) {
                Some(alias) => alias.join(rest),
                None => path,
            },
            _ => path,
        }
    }

    /// Parses the operand following `op`: a word or a parenthesized set.
    fn parse_operand(&mut self, op: Operator) -> FilterResult<Operand> {
        let token = self
            .advance()
            .ok_or_else(|| self.end_of_input("an operand"))?;

        match token.token {
            FilterToken::Word { text, quoted } => Ok(Operand::Single(Term::compile(
                Literal {
                    text,
                    quoted,
                    position: token.position,
                },
                op,
            )?)),

            FilterToken::OpenParen => {
                if !op.accepts_set() {
                    return Err(FilterError::invalid_operand(
                        "(",
                        token.position,
                        format!("a set operand is not allowed after {op}"),
                    ));
                }
                let mut terms = Vec::new();
                loop {
                    let member = self.advance().ok_or(FilterError::UnclosedParenthesis {
                        position: token.position,
                    })?;
                    match member.token {
                        FilterToken::CloseParen => break,
                        FilterToken::Comma | FilterToken::Or => {}
                        FilterToken::Word { text, quoted } => terms.push(Term::compile(
                            Literal {
                                text,
                                quoted,
                                position: member.position,
                            },
                            op,
                        )?),
                        other => {
                            return Err(FilterError::unexpected_token(
                                other.to_string(),
                                member.position,
                            ))
                        }
                    }
                }
                if terms.is_empty() {
                    return Err(FilterError::invalid_operand(
                        "()",
                        token.position,
                        "a set operand needs at least one member",
                    ));
                }
                Ok(Operand::Set(terms))
            }

            other => Err(FilterError::unexpected_token(
                other.to_string(),
                token.position,
            )),
        }
    }
}
