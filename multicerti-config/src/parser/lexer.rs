//! Lexer for nginx configuration files
//!
//! Tokenizes the block/directive grammar used by nginx.
//!
//! Key features:
//! - Whitespace (including newlines) only separates tokens
//! - `;` terminates a directive, `{ }` delimit blocks
//! - Quoted strings are kept verbatim, quotes included
//! - A quote opens a string only at the start of a token; `it's` is one word
//! - `#` starts a comment (skipped) only at the start of a token
//! - `${var}` inside a word does not open a block

use logos::{Logos, Span};
use std::fmt;

/// Source location for error reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Location {
    pub start: usize,
    pub end: usize,
}

impl From<Span> for Location {
    fn from(span: Span) -> Self {
        Self {
            start: span.start,
            end: span.end,
        }
    }
}

/// A token with its location in the source
#[derive(Debug, Clone, PartialEq)]
pub struct Spanned<T> {
    pub value: T,
    pub span: Location,
}

impl<T> Spanned<T> {
    pub fn new(value: T, span: impl Into<Location>) -> Self {
        Self {
            value,
            span: span.into(),
        }
    }
}

/// Token types for the nginx grammar
#[derive(Logos, Debug, Clone, PartialEq)]
pub enum Token {
    #[regex(r"[ \t\r\n\f]+", logos::skip)]
    Whitespace,

    #[regex(r"#[^\n]*", logos::skip)]
    Comment,

    // ============================================================
    // Structural
    // ============================================================
    #[token("{")]
    BlockOpen,

    #[token("}")]
    BlockClose,

    #[token(";")]
    Semicolon,

    // ============================================================
    // Values
    // ============================================================

    /// Quoted string literal, single or double quotes, kept verbatim
    #[regex(r#""([^"\\]|\\.)*""#, |lex| lex.slice().to_string())]
    #[regex(r#"'([^'\\]|\\.)*'"#, |lex| lex.slice().to_string())]
    Quoted(String),

    /// Bare word: directive names, paths, addresses, variables.
    /// May contain `#` and quotes after the first character and `${name}` anywhere.
    #[regex(
        r#"([^ \t\r\n\f;{}#"'$]|\$\{[^} \t\r\n\f]*\}|\$)([^ \t\r\n\f;{}$]|\$\{[^} \t\r\n\f]*\}|\$)*"#,
        |lex| lex.slice().to_string()
    )]
    Word(String),
}

impl Token {
    /// Raw text of a value token
    pub fn text(&self) -> Option<&str> {
        match self {
            Token::Word(s) | Token::Quoted(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::BlockOpen => write!(f, "'{{'"),
            Token::BlockClose => write!(f, "'}}'"),
            Token::Semicolon => write!(f, "';'"),
            Token::Quoted(s) | Token::Word(s) => write!(f, "{}", s),
            _ => write!(f, "{:?}", self),
        }
    }
}

/// Lexer result type
pub type LexResult = Result<Vec<Spanned<Token>>, LexError>;

/// Lexer error
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LexError {
    #[error("Unexpected character at position {position}")]
    UnexpectedChar { position: usize },

    #[error("Unterminated quoted string starting at position {position}")]
    UnterminatedString { position: usize },
}

impl LexError {
    pub fn position(&self) -> usize {
        match self {
            LexError::UnexpectedChar { position } | LexError::UnterminatedString { position } => {
                *position
            }
        }
    }
}

/// Tokenize an nginx configuration source string
pub fn tokenize(source: &str) -> LexResult {
    let lexer = Token::lexer(source);
    let mut tokens = Vec::new();

    for (result, span) in lexer.spanned() {
        match result {
            Ok(Token::Whitespace) | Ok(Token::Comment) => continue,
            Ok(token) => tokens.push(Spanned::new(token, span)),
            Err(()) => {
                let position = span.start;
                return Err(match source[position..].chars().next() {
                    Some('"') | Some('\'') => LexError::UnterminatedString { position },
                    _ => LexError::UnexpectedChar { position },
                });
            }
        }
    }

    Ok(tokens)
}
