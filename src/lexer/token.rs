//! Token types for the query language.

use crate::ast::Span;
use smol_str::SmolStr;
use std::fmt;

/// The kind of a lexical token.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TokenKind {
    // Clause keywords
    Select,
    From,
    Where,
    Granularity,
    Document,
    Sentence,
    Order,
    By,
    Asc,
    Desc,
    Limit,
    As,

    // Predicate keywords
    And,
    Or,
    Not,
    Contains,
    Ner,
    Pos,
    Date,
    Dep,
    Between,
    Near,
    Radius,

    // Function keywords
    Snippet,
    Person,
    Count,
    Unique,
    Documents,

    // Values
    /// `?name`.
    Variable(SmolStr),
    Identifier(SmolStr),
    /// Double-quoted, escapes already resolved.
    StringLiteral(SmolStr),
    IntegerLiteral(SmolStr),
    /// Bare ISO date such as `2001-01-01` or `2001-03`, optionally with time.
    DateLiteral(SmolStr),
    /// Compact duration such as `30d`.
    DurationLiteral(SmolStr),

    // Operators
    Lt,   // <
    LtEq, // <=
    Gt,   // >
    GtEq, // >=
    Eq,   // =
    Star, // *

    // Punctuation
    LParen,
    RParen,
    LBracket,
    RBracket,
    Comma,

    Eof,
}

impl TokenKind {
    /// Returns true if this token kind is a keyword.
    pub fn is_keyword(&self) -> bool {
        matches!(
            self,
            TokenKind::Select
                | TokenKind::From
                | TokenKind::Where
                | TokenKind::Granularity
                | TokenKind::Document
                | TokenKind::Sentence
                | TokenKind::Order
                | TokenKind::By
                | TokenKind::Asc
                | TokenKind::Desc
                | TokenKind::Limit
                | TokenKind::As
                | TokenKind::And
                | TokenKind::Or
                | TokenKind::Not
                | TokenKind::Contains
                | TokenKind::Ner
                | TokenKind::Pos
                | TokenKind::Date
                | TokenKind::Dep
                | TokenKind::Between
                | TokenKind::Near
                | TokenKind::Radius
                | TokenKind::Snippet
                | TokenKind::Person
                | TokenKind::Count
                | TokenKind::Unique
                | TokenKind::Documents
        )
    }

    /// The word form of a keyword token, used where a keyword is accepted as
    /// a plain name (entity-type labels, aliases).
    pub fn keyword_text(&self) -> Option<&'static str> {
        if !self.is_keyword() {
            return None;
        }
        Some(match self {
            TokenKind::Select => "SELECT",
            TokenKind::From => "FROM",
            TokenKind::Where => "WHERE",
            TokenKind::Granularity => "GRANULARITY",
            TokenKind::Document => "DOCUMENT",
            TokenKind::Sentence => "SENTENCE",
            TokenKind::Order => "ORDER",
            TokenKind::By => "BY",
            TokenKind::Asc => "ASC",
            TokenKind::Desc => "DESC",
            TokenKind::Limit => "LIMIT",
            TokenKind::As => "AS",
            TokenKind::And => "AND",
            TokenKind::Or => "OR",
            TokenKind::Not => "NOT",
            TokenKind::Contains => "CONTAINS",
            TokenKind::Ner => "NER",
            TokenKind::Pos => "POS",
            TokenKind::Date => "DATE",
            TokenKind::Dep => "DEP",
            TokenKind::Between => "BETWEEN",
            TokenKind::Near => "NEAR",
            TokenKind::Radius => "RADIUS",
            TokenKind::Snippet => "SNIPPET",
            TokenKind::Person => "PERSON",
            TokenKind::Count => "COUNT",
            TokenKind::Unique => "UNIQUE",
            TokenKind::Documents => "DOCUMENTS",
            _ => unreachable!("covered by is_keyword"),
        })
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(word) = self.keyword_text() {
            return f.write_str(word);
        }
        match self {
            TokenKind::Variable(name) => write!(f, "?{name}"),
            TokenKind::Identifier(name) => write!(f, "{name}"),
            TokenKind::StringLiteral(s) => write!(f, "\"{s}\""),
            TokenKind::IntegerLiteral(n) => write!(f, "{n}"),
            TokenKind::DateLiteral(d) => write!(f, "{d}"),
            TokenKind::DurationLiteral(d) => write!(f, "{d}"),
            TokenKind::Lt => f.write_str("<"),
            TokenKind::LtEq => f.write_str("<="),
            TokenKind::Gt => f.write_str(">"),
            TokenKind::GtEq => f.write_str(">="),
            TokenKind::Eq => f.write_str("="),
            TokenKind::Star => f.write_str("*"),
            TokenKind::LParen => f.write_str("("),
            TokenKind::RParen => f.write_str(")"),
            TokenKind::LBracket => f.write_str("["),
            TokenKind::RBracket => f.write_str("]"),
            TokenKind::Comma => f.write_str(","),
            TokenKind::Eof => f.write_str("<EOF>"),
            _ => unreachable!("keywords handled above"),
        }
    }
}

/// A lexical token with its source span.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}

impl Token {
    /// Creates a new token.
    pub fn new(kind: TokenKind, span: Span) -> Self {
        Self { kind, span }
    }

    /// Returns the source slice covered by this token.
    pub fn slice<'a>(&self, source: &'a str) -> &'a str {
        &source[self.span.clone()]
    }
}
