//! Lexer (tokenizer) for filter expressions.

use std::fmt;
use std::iter::Peekable;
use std::str::Chars;

use super::ast::Operator;
use super::error::FilterError;

/// Error encountered during lexical analysis.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LexerError {
    /// What went wrong.
    pub kind: LexerErrorKind,
    /// The position (0-indexed byte offset) where the error occurred.
    pub position: usize,
}

/// The kinds of lexical error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LexerErrorKind {
    /// A quote was opened and never closed.
    UnterminatedString,
    /// A run of operator characters that is not an operator.
    InvalidOperator(String),
}

impl fmt::Display for LexerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            LexerErrorKind::UnterminatedString => {
                write!(f, "unterminated string at position {}", self.position)
            }
            LexerErrorKind::InvalidOperator(run) => {
                write!(f, "invalid operator '{}' at position {}", run, self.position)
            }
        }
    }
}

impl std::error::Error for LexerError {}

impl From<LexerError> for FilterError {
    fn from(err: LexerError) -> Self {
        match err.kind {
            LexerErrorKind::UnterminatedString => FilterError::UnterminatedString {
                position: err.position,
            },
            LexerErrorKind::InvalidOperator(operator) => FilterError::InvalidOperator {
                operator,
                position: err.position,
            },
        }
    }
}

/// Result of tokenizing a filter expression.
#[derive(Debug, Clone, PartialEq)]
pub struct LexerResult {
    /// The tokens successfully parsed, with their positions.
    pub tokens: Vec<PositionedToken>,
    /// Any errors encountered.
    pub errors: Vec<LexerError>,
}

/// A token with its position in the input.
#[derive(Debug, Clone, PartialEq)]
pub struct PositionedToken {
    /// The token.
    pub token: FilterToken,
    /// The byte position where the token starts (0-indexed).
    pub position: usize,
    /// The byte position just past the token.
    pub end: usize,
    /// Whether whitespace (or the start of input) precedes the token.
    pub spaced: bool,
}

/// A token in a filter expression.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterToken {
    // ==================== Words ====================
    /// A key, operand or global term. Quoted parts are already unquoted.
    Word {
        /// The word with quotes and escapes removed.
        text: String,
        /// Whether any part of the word was quoted.
        quoted: bool,
    },

    // ==================== Operators ====================
    /// A comparison operator.
    Operator(Operator),

    /// The `AND` keyword.
    And,

    /// The `OR` keyword.
    Or,

    /// The `NOT` keyword.
    Not,

    // ==================== Delimiters ====================
    /// Opening parenthesis `(`.
    OpenParen,

    /// Closing parenthesis `)`.
    CloseParen,

    /// Argument or set separator `,`.
    Comma,
}

impl FilterToken {
    /// Creates an unquoted word token.
    pub fn word(text: impl Into<String>) -> Self {
        FilterToken::Word {
            text: text.into(),
            quoted: false,
        }
    }
}

impl fmt::Display for FilterToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterToken::Word { text, quoted: true } => write!(f, "\"{text}\""),
            FilterToken::Word { text, .. } => write!(f, "{text}"),
            FilterToken::Operator(op) => write!(f, "{op}"),
            FilterToken::And => write!(f, "AND"),
            FilterToken::Or => write!(f, "OR"),
            FilterToken::Not => write!(f, "NOT"),
            FilterToken::OpenParen => write!(f, "("),
            FilterToken::CloseParen => write!(f, ")"),
            FilterToken::Comma => write!(f, ","),
        }
    }
}

fn is_operator_char(c: char) -> bool {
    matches!(c, ':' | '=' | '<' | '>' | '!' | '~')
}

fn is_delimiter(c: char) -> bool {
    c.is_whitespace() || matches!(c, '(' | ')' | ',')
}

/// Lexer for tokenizing filter expressions.
///
/// Words are read shell-style: quoted segments and escapes concatenate with
/// the surrounding characters. After an operator the lexer is in operand
/// mode, where operator characters are part of the word
/// (`timestamp<2016-08-11T12:00:00`), and stays there through a set operand's
/// parentheses.
pub struct Lexer<'a> {
    chars: Peekable<Chars<'a>>,
    /// Current byte position in the input string.
    position: usize,
    /// Errors encountered during tokenization.
    errors: Vec<LexerError>,
    /// The previous token was an operator.
    after_operator: bool,
    /// Inside the parentheses of a set operand.
    in_set: bool,
}

impl<'a> Lexer<'a> {
    /// Creates a new lexer for the given input string.
    pub fn new(input: &'a str) -> Self {
        Self {
            chars: input.chars().peekable(),
            position: 0,
            errors: Vec::new(),
            after_operator: false,
            in_set: false,
        }
    }

    /// Peeks at the next character without consuming it.
    fn peek(&mut self) -> Option<&char> {
        self.chars.peek()
    }

    /// Consumes and returns the next character, updating position.
    fn next_char(&mut self) -> Option<char> {
        let c = self.chars.next();
        if let Some(ch) = c {
            self.position += ch.len_utf8();
        }
        c
    }

    /// Skips whitespace characters, returning true if any were skipped.
    fn skip_whitespace(&mut self) -> bool {
        let start = self.position;
        while let Some(&c) = self.peek() {
            if c.is_whitespace() {
                self.next_char();
            } else {
                break;
            }
        }
        self.position > start
    }

    /// Reads a run of operator characters.
    fn read_operator_run(&mut self) -> String {
        let mut run = String::new();
        while let Some(&c) = self.peek() {
            if !is_operator_char(c) {
                break;
            }
            run.push(c);
            self.next_char();
        }
        run
    }

    /// Reads the body of a quoted segment after its opening quote.
    ///
    /// Returns false if the input ends before the closing quote.
    fn read_quoted(&mut self, quote_char: char, out: &mut String) -> bool {
        while let Some(c) = self.next_char() {
            if c == quote_char {
                return true;
            }
            if c == '\\' {
                match self.peek() {
                    Some(&next) if next == '"' || next == '\'' || next == '\\' => {
                        out.push(next);
                        self.next_char();
                    }
                    _ => out.push(c),
                }
            } else {
                out.push(c);
            }
        }
        false
    }

    /// Reads a word, concatenating quoted and unquoted segments.
    fn read_word(&mut self, operand: bool) -> FilterToken {
        let mut text = String::new();
        let mut quoted = false;

        while let Some(&c) = self.peek() {
            if is_delimiter(c) || (!operand && is_operator_char(c)) {
                break;
            }
            match c {
                '"' | '\'' => {
                    let quote_start = self.position;
                    self.next_char();
                    quoted = true;
                    if !self.read_quoted(c, &mut text) {
                        self.errors.push(LexerError {
                            kind: LexerErrorKind::UnterminatedString,
                            position: quote_start,
                        });
                    }
                }
                '\\' => {
                    self.next_char();
                    match self.peek() {
                        Some(&next) if next == '"' || next == '\'' || next == '\\' => {
                            text.push(next);
                            self.next_char();
                        }
                        _ => text.push('\\'),
                    }
                }
                _ => {
                    text.push(c);
                    self.next_char();
                }
            }
        }

        if !quoted {
            match text.as_str() {
                "AND" => return FilterToken::And,
                "OR" => return FilterToken::Or,
                "NOT" => return FilterToken::Not,
                _ => {}
            }
        }
        FilterToken::Word { text, quoted }
    }

    /// Returns the next token with its position, or None if at end of input.
    pub fn next_token(&mut self) -> Option<PositionedToken> {
        let spaced = self.skip_whitespace() || self.position == 0;

        let c = *self.peek()?;
        let token_start = self.position;
        let operand = self.after_operator || self.in_set;

        let token = match c {
            '(' => {
                self.next_char();
                if self.after_operator {
                    self.in_set = true;
                }
                FilterToken::OpenParen
            }
            ')' => {
                self.next_char();
                self.in_set = false;
                FilterToken::CloseParen
            }
            ',' => {
                self.next_char();
                FilterToken::Comma
            }
            _ if is_operator_char(c) && !operand => {
                let run = self.read_operator_run();
                match Operator::from_symbol(&run) {
                    Some(op) => {
                        self.after_operator = true;
                        return Some(PositionedToken {
                            token: FilterToken::Operator(op),
                            position: token_start,
                            end: self.position,
                            spaced,
                        });
                    }
                    None => {
                        self.errors.push(LexerError {
                            kind: LexerErrorKind::InvalidOperator(run),
                            position: token_start,
                        });
                        return self.next_token();
                    }
                }
            }
            _ => self.read_word(operand),
        };

        self.after_operator = false;
        Some(PositionedToken {
            token,
            position: token_start,
            end: self.position,
            spaced,
        })
    }

    /// Collects all tokens into a vector (without positions).
    #[cfg(test)]
    pub fn tokenize(self) -> Vec<FilterToken> {
        self.tokenize_with_errors()
            .tokens
            .into_iter()
            .map(|pt| pt.token)
            .collect()
    }

    /// Collects all tokens and any errors encountered.
    pub fn tokenize_with_errors(mut self) -> LexerResult {
        let mut tokens = Vec::new();
        while let Some(positioned_token) = self.next_token() {
            tokens.push(positioned_token);
        }
        LexerResult {
            tokens,
            errors: self.errors,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn word(text: &str) -> FilterToken {
        FilterToken::word(text)
    }

    fn quoted(text: &str) -> FilterToken {
        FilterToken::Word {
            text: text.to_string(),
            quoted: true,
        }
    }

    fn op(symbol: &str) -> FilterToken {
        FilterToken::Operator(Operator::from_symbol(symbol).unwrap())
    }

    #[test]
    fn test_tokenize_predicate() {
        let tokens = Lexer::new("integer:2").tokenize();
        assert_eq!(tokens, vec![word("integer"), op(":"), word("2")]);
    }

    #[test]
    fn test_tokenize_all_operators() {
        for symbol in [":", "=", "!=", "<", "<=", ">", ">=", "~", "!~"] {
            let tokens = Lexer::new(&format!("a{symbol}b")).tokenize();
            assert_eq!(tokens, vec![word("a"), op(symbol), word("b")], "{symbol}");
        }
    }

    #[test]
    fn test_tokenize_spaces_around_operator() {
        let tokens = Lexer::new("  integer  :  2  ").tokenize();
        assert_eq!(tokens, vec![word("integer"), op(":"), word("2")]);
    }

    #[test]
    fn test_tokenize_keywords_are_case_sensitive() {
        let tokens = Lexer::new("a AND b OR NOT c and or not").tokenize();
        assert_eq!(
            tokens,
            vec![
                word("a"),
                FilterToken::And,
                word("b"),
                FilterToken::Or,
                FilterToken::Not,
                word("c"),
                word("and"),
                word("or"),
                word("not"),
            ]
        );
    }

    #[test]
    fn test_tokenize_quoted_keyword_is_word() {
        let tokens = Lexer::new("\"AND\"").tokenize();
        assert_eq!(tokens, vec![quoted("AND")]);
    }

    #[test]
    fn test_tokenize_quotes_concatenate() {
        let tokens = Lexer::new(r#"double=a\"" "\"z"#).tokenize();
        assert_eq!(tokens, vec![word("double"), op("="), quoted(r#"a" "z"#)]);

        let tokens = Lexer::new(r#"single=a\'' '\'z"#).tokenize();
        assert_eq!(tokens, vec![word("single"), op("="), quoted("a' 'z")]);

        let tokens = Lexer::new(r#"double='a" "z'"#).tokenize();
        assert_eq!(tokens, vec![word("double"), op("="), quoted(r#"a" "z"#)]);
    }

    #[test]
    fn test_tokenize_backslash_kept_before_other_characters() {
        let tokens = Lexer::new(r"v~\d+").tokenize();
        assert_eq!(tokens, vec![word("v"), op("~"), word(r"\d+")]);
    }

    #[test]
    fn test_tokenize_empty_quoted_string() {
        let tokens = Lexer::new(r#"v~"""#).tokenize();
        assert_eq!(tokens, vec![word("v"), op("~"), quoted("")]);
    }

    #[test]
    fn test_tokenize_operand_mode_keeps_operator_characters() {
        let tokens = Lexer::new("timestamp<2016-08-11T12:00:00 x:y").tokenize();
        assert_eq!(
            tokens,
            vec![
                word("timestamp"),
                op("<"),
                word("2016-08-11T12:00:00"),
                word("x"),
                op(":"),
                word("y"),
            ]
        );
    }

    #[test]
    fn test_tokenize_set_operand() {
        let tokens = Lexer::new("logical:(abc, X* OR a:b)").tokenize();
        assert_eq!(
            tokens,
            vec![
                word("logical"),
                op(":"),
                FilterToken::OpenParen,
                word("abc"),
                FilterToken::Comma,
                word("X*"),
                FilterToken::Or,
                word("a:b"),
                FilterToken::CloseParen,
            ]
        );
    }

    #[test]
    fn test_tokenize_call_positions_and_spacing() {
        let result = Lexer::new("len(junk) len (junk)").tokenize_with_errors();
        assert!(result.errors.is_empty());
        let spacing: Vec<(usize, bool)> = result
            .tokens
            .iter()
            .map(|t| (t.position, t.spaced))
            .collect();
        assert_eq!(
            spacing,
            vec![
                (0, true),
                (3, false),
                (4, false),
                (8, false),
                (10, true),
                (14, true),
                (15, false),
                (19, false),
            ]
        );
        assert_eq!(result.tokens[2].end, 8);
    }

    #[test]
    fn test_tokenize_invalid_operators() {
        for bad in ["::", ":=", "=<", "==", "><", "<>", "!!", "!", "=:", ":!", "~~", "<<"] {
            let result = Lexer::new(&format!("a{bad}b")).tokenize_with_errors();
            assert_eq!(
                result.errors,
                vec![LexerError {
                    kind: LexerErrorKind::InvalidOperator(bad.to_string()),
                    position: 1,
                }],
                "{bad}"
            );
        }
    }

    #[test]
    fn test_tokenize_unterminated_string() {
        let result = Lexer::new("a:'abc").tokenize_with_errors();
        assert_eq!(
            result.errors,
            vec![LexerError {
                kind: LexerErrorKind::UnterminatedString,
                position: 2,
            }]
        );
    }

    #[test]
    fn test_lexer_error_into_filter_error() {
        let err: FilterError = LexerError {
            kind: LexerErrorKind::InvalidOperator("::".to_string()),
            position: 7,
        }
        .into();
        assert_eq!(
            err,
            FilterError::InvalidOperator {
                operator: "::".to_string(),
                position: 7
            }
        );
    }

    #[test]
    fn test_token_display() {
        assert_eq!(quoted("a b").to_string(), "\"a b\"");
        assert_eq!(op("!~").to_string(), "!~");
        assert_eq!(FilterToken::Comma.to_string(), ",");
    }
}
