//! The token definition for the tracker query language.

use std::borrow::Cow;

/// A token is a single unit of the language, with a specific kind and location.
#[derive(Debug, Clone, PartialEq)]
pub struct Token<'a> {
    pub kind: TokenKind<'a>,
    pub span: Span,
}

/// The kind of a token.
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind<'a> {
    // Reserved words
    And,     // "AND"
    Or,      // "OR"
    Not,     // "NOT"
    In,      // "IN"
    Between, // "BETWEEN"

    // Literals
    Identifier(&'a str),
    /// Quoted string content with escapes already resolved
    String(Cow<'a, str>),
    /// Raw numeric text, kept as written
    Number(&'a str),

    // Punctuation
    At,     // @
    LParen, // (
    RParen, // )
    Comma,  // ,
    Plus,   // +
    Minus,  // -

    // Operators
    Eq,    // =
    NotEq, // !=
    Gt,    // >
    Lt,    // <
    Gte,   // >=
    Lte,   // <=

    // Special
    /// A string whose closing quote is missing
    UnterminatedString,
    Illegal, // An illegal/unknown character
}

impl TokenKind<'_> {
    /// Human readable form used in syntax error messages.
    pub fn describe(&self) -> String {
        match self {
            TokenKind::And => "AND".to_string(),
            TokenKind::Or => "OR".to_string(),
            TokenKind::Not => "NOT".to_string(),
            TokenKind::In => "IN".to_string(),
            TokenKind::Between => "BETWEEN".to_string(),
            TokenKind::Identifier(name) => format!("'{name}'"),
            TokenKind::String(value) => format!("\"{value}\""),
            TokenKind::Number(value) => value.to_string(),
            TokenKind::At => "'@'".to_string(),
            TokenKind::LParen => "'('".to_string(),
            TokenKind::RParen => "')'".to_string(),
            TokenKind::Comma => "','".to_string(),
            TokenKind::Plus => "'+'".to_string(),
            TokenKind::Minus => "'-'".to_string(),
            TokenKind::Eq => "'='".to_string(),
            TokenKind::NotEq => "'!='".to_string(),
            TokenKind::Gt => "'>'".to_string(),
            TokenKind::Lt => "'<'".to_string(),
            TokenKind::Gte => "'>='".to_string(),
            TokenKind::Lte => "'<='".to_string(),
            TokenKind::UnterminatedString => "unterminated string".to_string(),
            TokenKind::Illegal => "illegal character".to_string(),
        }
    }
}

/// Represents a span in the source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Span {
    /// The starting byte offset.
    pub start: usize,
    /// The ending byte offset.
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }
}
