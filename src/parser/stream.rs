//! Token stream navigation shared by the parser modules.

use crate::ast::Span;
use crate::diag::Diag;
use crate::lexer::token::{Token, TokenKind};

/// Error type for parsing operations.
pub type ParseError = Box<Diag>;

/// Result type for parsing operations.
pub type PResult<T> = Result<T, ParseError>;

/// Cursor over a token slice with lookahead and matching helpers.
pub struct TokenStream<'a> {
    tokens: &'a [Token],
    pos: usize,
}

impl<'a> TokenStream<'a> {
    /// Creates a new stream. The slice must be non-empty and end with EOF.
    pub fn new(tokens: &'a [Token]) -> Self {
        debug_assert!(matches!(
            tokens.last().map(|t| &t.kind),
            Some(TokenKind::Eof)
        ));
        Self { tokens, pos: 0 }
    }

    /// Returns the current token; EOF once the stream is exhausted.
    pub fn current(&self) -> &Token {
        self.tokens
            .get(self.pos)
            .unwrap_or_else(|| self.tokens.last().expect("stream is non-empty"))
    }

    /// Returns the next token without consuming the current one.
    pub fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos + 1)
    }

    /// Advances to the next token; stays on EOF.
    pub fn advance(&mut self) {
        if self.pos < self.tokens.len().saturating_sub(1) {
            self.pos += 1;
        }
    }

    /// Checks whether the current token matches `kind`.
    pub fn check(&self, kind: &TokenKind) -> bool {
        &self.current().kind == kind
    }

    /// Consumes the current token if it matches `kind`.
    pub fn consume(&mut self, kind: &TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    /// Expects `kind` in `context`, returning its span or an error anchored
    /// at the current token.
    pub fn expect(&mut self, kind: TokenKind, context: &str) -> PResult<Span> {
        if self.check(&kind) {
            let span = self.current().span.clone();
            self.advance();
            Ok(span)
        } else {
            Err(self.error_here(format!(
                "expected {kind} in {context}, found {}",
                self.current().kind
            )))
        }
    }

    /// Creates a syntax error at the current token.
    pub fn error_here(&self, message: impl Into<String>) -> ParseError {
        Box::new(
            Diag::error(message.into())
                .with_label(self.current().span.clone(), "here")
                .with_code("Q002"),
        )
    }

    /// Returns the span of the most recently consumed token.
    pub fn previous_span(&self) -> Span {
        if self.pos > 0 {
            self.tokens[self.pos - 1].span.clone()
        } else {
            self.current().span.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_tokens() -> Vec<Token> {
        vec![
            Token::new(TokenKind::Select, 0..6),
            Token::new(TokenKind::Star, 7..8),
            Token::new(TokenKind::From, 9..13),
            Token::new(TokenKind::Identifier("c".into()), 14..15),
            Token::new(TokenKind::Eof, 15..15),
        ]
    }

    #[test]
    fn navigation() {
        let tokens = make_tokens();
        let mut stream = TokenStream::new(&tokens);

        assert_eq!(stream.current().kind, TokenKind::Select);
        assert_eq!(stream.peek().map(|t| &t.kind), Some(&TokenKind::Star));
        stream.advance();
        assert_eq!(stream.current().kind, TokenKind::Star);
    }

    #[test]
    fn check_and_consume() {
        let tokens = make_tokens();
        let mut stream = TokenStream::new(&tokens);

        assert!(stream.check(&TokenKind::Select));
        assert!(stream.consume(&TokenKind::Select));
        assert!(!stream.consume(&TokenKind::Select));
        assert_eq!(stream.current().kind, TokenKind::Star);
    }

    #[test]
    fn expect_success_and_failure() {
        let tokens = make_tokens();
        let mut stream = TokenStream::new(&tokens);

        assert_eq!(stream.expect(TokenKind::Select, "query").unwrap(), 0..6);
        let err = stream.expect(TokenKind::From, "query").unwrap_err();
        assert!(err.message.contains("expected FROM"));
        // Position unchanged on failure.
        assert_eq!(stream.current().kind, TokenKind::Star);
    }

    #[test]
    fn stays_on_eof() {
        let tokens = make_tokens();
        let mut stream = TokenStream::new(&tokens);
        for _ in 0..10 {
            stream.advance();
        }
        assert_eq!(stream.current().kind, TokenKind::Eof);
    }
}
