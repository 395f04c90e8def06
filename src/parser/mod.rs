//! Parser: token stream to [`Query`] AST.
//!
//! The parser is a hand-written recursive descent over the grammar in the
//! crate docs. It fails fast on the first syntax error (with an accurate
//! position) but always carries the lexer's full diagnostic batch along.

mod condition;
mod query;
pub mod stream;

use crate::ast::Query;
use crate::diag::{Diag, render_reports};
use crate::lexer::token::{Token, TokenKind};
use miette::Report;
use stream::TokenStream;

/// Result of parsing a query.
#[derive(Debug)]
pub struct ParseResult {
    /// The parsed query, or `None` if any error was reported.
    pub ast: Option<Query>,
    /// All diagnostics rendered as miette reports against the source.
    pub diagnostics: Vec<Report>,
}

/// Query parser over a lexed token stream.
pub struct Parser<'source> {
    tokens: Vec<Token>,
    diagnostics: Vec<Diag>,
    source: &'source str,
}

impl<'source> Parser<'source> {
    /// Creates a new parser from a token stream, normalizing a missing EOF.
    pub fn new(mut tokens: Vec<Token>, source: &'source str) -> Self {
        if !matches!(tokens.last().map(|t| &t.kind), Some(TokenKind::Eof)) {
            let eof = tokens.last().map(|t| t.span.end).unwrap_or(0);
            tokens.push(Token::new(TokenKind::Eof, eof..eof));
        }
        Self {
            tokens,
            diagnostics: Vec::new(),
            source,
        }
    }

    /// Merges lexer diagnostics so they precede parser diagnostics.
    pub fn with_lexer_diagnostics(mut self, lex_diags: Vec<Diag>) -> Self {
        let mut all = lex_diags;
        all.append(&mut self.diagnostics);
        self.diagnostics = all;
        self
    }

    /// Parses the token stream into a query AST.
    pub fn parse(mut self) -> ParseResult {
        let mut stream = TokenStream::new(&self.tokens);
        let parsed = match query::parse_query(&mut stream) {
            Ok(query) => Some(query),
            Err(diag) => {
                self.diagnostics.push(*diag);
                None
            }
        };

        let has_error = self.diagnostics.iter().any(Diag::is_error);
        ParseResult {
            ast: if has_error { None } else { parsed },
            diagnostics: render_reports(&self.diagnostics, self.source),
        }
    }
}
