//! Lexical analysis for the query language.
//!
//! The lexer is hand-written and error-tolerant: it records a diagnostic for
//! every malformed construct and keeps scanning, so a single pass reports all
//! lexical problems in a query. The token stream always ends with EOF.

pub mod keywords;
pub mod token;

use crate::diag::Diag;
use token::{Token, TokenKind};

/// Result of lexical analysis: tokens plus any diagnostics encountered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LexerResult {
    /// The tokens produced, including a trailing EOF token.
    pub tokens: Vec<Token>,
    /// Errors encountered during scanning.
    pub diagnostics: Vec<Diag>,
}

/// A lexical analyzer over query source text.
pub struct Lexer<'a> {
    source: &'a str,
    pos: usize,
    tokens: Vec<Token>,
    diagnostics: Vec<Diag>,
}

impl<'a> Lexer<'a> {
    /// Creates a new lexer for the given source text.
    pub fn new(source: &'a str) -> Self {
        Self {
            source,
            pos: 0,
            tokens: Vec::new(),
            diagnostics: Vec::new(),
        }
    }

    /// Tokenizes the source text, consuming the lexer.
    pub fn tokenize(mut self) -> LexerResult {
        while !self.is_at_end() {
            self.skip_whitespace_and_comments();
            if self.is_at_end() {
                break;
            }
            self.scan_token();
        }

        let eof = self.source.len();
        self.tokens.push(Token::new(TokenKind::Eof, eof..eof));

        LexerResult {
            tokens: self.tokens,
            diagnostics: self.diagnostics,
        }
    }

    fn scan_token(&mut self) {
        let start = self.pos;
        let ch = self.advance();

        match ch {
            '(' => self.add_token(TokenKind::LParen, start),
            ')' => self.add_token(TokenKind::RParen, start),
            '[' => self.add_token(TokenKind::LBracket, start),
            ']' => self.add_token(TokenKind::RBracket, start),
            ',' => self.add_token(TokenKind::Comma, start),
            '*' => self.add_token(TokenKind::Star, start),
            '=' => self.add_token(TokenKind::Eq, start),
            '<' => {
                if self.match_char('=') {
                    self.add_token(TokenKind::LtEq, start);
                } else {
                    self.add_token(TokenKind::Lt, start);
                }
            }
            '>' => {
                if self.match_char('=') {
                    self.add_token(TokenKind::GtEq, start);
                } else {
                    self.add_token(TokenKind::Gt, start);
                }
            }
            '"' => self.scan_string_literal(start),
            '?' => self.scan_variable(start),
            '0'..='9' => self.scan_number(start),
            'a'..='z' | 'A'..='Z' | '_' => self.scan_identifier_or_keyword(start),
            _ => {
                self.error(start, &format!("invalid character `{ch}`"));
            }
        }
    }

    fn scan_identifier_or_keyword(&mut self, start: usize) {
        while self.is_identifier_continue(self.peek()) {
            self.advance();
        }

        let text = &self.source[start..self.pos];
        match keywords::lookup_keyword(text) {
            Some(kind) => self.add_token(kind, start),
            None => self.add_token(TokenKind::Identifier(text.into()), start),
        }
    }

    /// Scans a `?name` variable reference.
    fn scan_variable(&mut self, start: usize) {
        if !self.is_identifier_start(self.peek()) {
            self.error(start, "expected a variable name after `?`");
            return;
        }
        while self.is_identifier_continue(self.peek()) {
            self.advance();
        }
        let name = &self.source[start + 1..self.pos];
        self.add_token(TokenKind::Variable(name.into()), start);
    }

    /// Scans an integer, a bare ISO date, or a compact duration.
    ///
    /// `2001-01-01` and `2001-03` (optionally with `Thh:mm[:ss]`) become date
    /// literals; digits followed immediately by letters (`30d`) become
    /// duration literals; anything else is an integer. A bare four-digit year
    /// stays an integer — the parser accepts it where a date is expected.
    fn scan_number(&mut self, start: usize) {
        while self.peek().is_ascii_digit() {
            self.advance();
        }

        let digits = self.pos - start;
        if digits == 4 && self.peek() == '-' && self.peek_next().is_ascii_digit() {
            self.scan_date_tail();
            let text = &self.source[start..self.pos];
            self.add_token(TokenKind::DateLiteral(text.into()), start);
        } else if self.peek().is_ascii_alphabetic() {
            while self.peek().is_ascii_alphabetic() {
                self.advance();
            }
            let text = &self.source[start..self.pos];
            self.add_token(TokenKind::DurationLiteral(text.into()), start);
        } else {
            let text = &self.source[start..self.pos];
            self.add_token(TokenKind::IntegerLiteral(text.into()), start);
        }
    }

    /// Consumes the rest of a date after `YYYY` when a `-MM` part follows:
    /// the month, an optional `-DD`, and an optional `Thh:mm[:ss]`.
    fn scan_date_tail(&mut self) {
        self.advance(); // '-'
        while self.peek().is_ascii_digit() {
            self.advance();
        }

        if self.peek() == '-' && self.peek_next().is_ascii_digit() {
            self.advance();
            while self.peek().is_ascii_digit() {
                self.advance();
            }
        }

        if self.peek() == 'T' && self.peek_next().is_ascii_digit() {
            self.advance();
            while self.peek().is_ascii_digit() || self.peek() == ':' {
                self.advance();
            }
        }
    }

    fn scan_string_literal(&mut self, start: usize) {
        let mut value = String::new();

        while self.peek() != '"' && !self.is_at_end() {
            if self.peek() == '\\' {
                self.advance();
                if self.is_at_end() {
                    break;
                }
                let escaped = self.advance();
                match escaped {
                    'n' => value.push('\n'),
                    't' => value.push('\t'),
                    'r' => value.push('\r'),
                    '"' => value.push('"'),
                    '\\' => value.push('\\'),
                    'u' => self.scan_unicode_escape(&mut value),
                    _ => {
                        self.error(
                            self.pos - 1,
                            &format!("invalid escape sequence `\\{escaped}`"),
                        );
                        value.push(escaped);
                    }
                }
            } else {
                value.push(self.advance());
            }
        }

        if self.is_at_end() {
            self.error(start, "unclosed string literal");
        } else {
            self.advance(); // closing quote
        }

        self.add_token(TokenKind::StringLiteral(value.into()), start);
    }

    fn scan_unicode_escape(&mut self, value: &mut String) {
        let mut hex = String::new();
        for _ in 0..4 {
            if self.peek().is_ascii_hexdigit() {
                hex.push(self.advance());
            } else {
                self.error(self.pos - 1, "invalid unicode escape sequence");
                return;
            }
        }
        match u32::from_str_radix(&hex, 16).ok().and_then(char::from_u32) {
            Some(ch) => value.push(ch),
            None => self.error(self.pos - 1, "invalid unicode code point"),
        }
    }

    fn skip_whitespace_and_comments(&mut self) {
        loop {
            match self.peek() {
                ' ' | '\t' | '\r' | '\n' => {
                    self.advance();
                }
                '-' if self.peek_next() == '-' => {
                    while self.peek() != '\n' && !self.is_at_end() {
                        self.advance();
                    }
                }
                '/' => {
                    if self.peek_next() == '/' {
                        while self.peek() != '\n' && !self.is_at_end() {
                            self.advance();
                        }
                    } else if self.peek_next() == '*' {
                        self.skip_block_comment();
                    } else {
                        break;
                    }
                }
                _ => break,
            }
        }
    }

    fn skip_block_comment(&mut self) {
        let comment_start = self.pos;
        self.advance(); // '/'
        self.advance(); // '*'

        let mut depth = 1;
        while depth > 0 && !self.is_at_end() {
            if self.peek() == '/' && self.peek_next() == '*' {
                self.advance();
                self.advance();
                depth += 1;
            } else if self.peek() == '*' && self.peek_next() == '/' {
                self.advance();
                self.advance();
                depth -= 1;
            } else {
                self.advance();
            }
        }

        if depth > 0 {
            self.error(comment_start, "unclosed block comment");
        }
    }

    fn is_identifier_start(&self, ch: char) -> bool {
        ch.is_ascii_alphabetic() || ch == '_'
    }

    fn is_identifier_continue(&self, ch: char) -> bool {
        ch.is_ascii_alphanumeric() || ch == '_'
    }

    fn add_token(&mut self, kind: TokenKind, start: usize) {
        self.tokens.push(Token::new(kind, start..self.pos));
    }

    fn error(&mut self, pos: usize, message: &str) {
        let span = pos..pos.saturating_add(1).min(self.source.len()).max(pos);
        self.diagnostics.push(
            Diag::error(message)
                .with_label(span, "here")
                .with_code("Q001"),
        );
    }

    fn peek(&self) -> char {
        self.source[self.pos..].chars().next().unwrap_or('\0')
    }

    fn peek_next(&self) -> char {
        let mut chars = self.source[self.pos..].chars();
        chars.next();
        chars.next().unwrap_or('\0')
    }

    fn advance(&mut self) -> char {
        let ch = self.peek();
        if ch != '\0' {
            self.pos += ch.len_utf8();
        }
        ch
    }

    fn match_char(&mut self, expected: char) -> bool {
        if self.peek() == expected {
            self.advance();
            true
        } else {
            false
        }
    }

    fn is_at_end(&self) -> bool {
        self.pos >= self.source.len()
    }
}

/// Convenience function to tokenize a source string.
pub fn tokenize(source: &str) -> LexerResult {
    Lexer::new(source).tokenize()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        tokenize(source).tokens.into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn empty_input() {
        let result = tokenize("");
        assert_eq!(result.tokens.len(), 1);
        assert_eq!(result.tokens[0].kind, TokenKind::Eof);
        assert!(result.diagnostics.is_empty());
    }

    #[test]
    fn keywords_are_case_insensitive() {
        assert_eq!(
            kinds("select Select SELECT"),
            vec![
                TokenKind::Select,
                TokenKind::Select,
                TokenKind::Select,
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn variables() {
        assert_eq!(
            kinds("?person ?loc_2"),
            vec![
                TokenKind::Variable("person".into()),
                TokenKind::Variable("loc_2".into()),
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn variable_missing_name() {
        let result = tokenize("? x");
        assert_eq!(result.diagnostics.len(), 1);
        assert!(result.diagnostics[0].message.contains("variable name"));
    }

    #[test]
    fn string_literals_with_escapes() {
        assert_eq!(
            kinds(r#""Smith" "a\"b" "tab\there""#),
            vec![
                TokenKind::StringLiteral("Smith".into()),
                TokenKind::StringLiteral("a\"b".into()),
                TokenKind::StringLiteral("tab\there".into()),
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn unclosed_string_recovers() {
        let result = tokenize("\"open");
        assert_eq!(result.tokens.len(), 2);
        assert_eq!(
            result.tokens[0].kind,
            TokenKind::StringLiteral("open".into())
        );
        assert_eq!(result.diagnostics.len(), 1);
        assert!(result.diagnostics[0].message.contains("unclosed string"));
    }

    #[test]
    fn date_literals() {
        assert_eq!(
            kinds("2001-01-01 2005-03 2005-03-11T14:30:15"),
            vec![
                TokenKind::DateLiteral("2001-01-01".into()),
                TokenKind::DateLiteral("2005-03".into()),
                TokenKind::DateLiteral("2005-03-11T14:30:15".into()),
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn bare_year_is_an_integer() {
        assert_eq!(
            kinds("2005"),
            vec![TokenKind::IntegerLiteral("2005".into()), TokenKind::Eof]
        );
    }

    #[test]
    fn duration_literals() {
        assert_eq!(
            kinds("30d 12h 2w"),
            vec![
                TokenKind::DurationLiteral("30d".into()),
                TokenKind::DurationLiteral("12h".into()),
                TokenKind::DurationLiteral("2w".into()),
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn operators_and_punctuation() {
        assert_eq!(
            kinds("< <= > >= = * ( ) [ ] ,"),
            vec![
                TokenKind::Lt,
                TokenKind::LtEq,
                TokenKind::Gt,
                TokenKind::GtEq,
                TokenKind::Eq,
                TokenKind::Star,
                TokenKind::LParen,
                TokenKind::RParen,
                TokenKind::LBracket,
                TokenKind::RBracket,
                TokenKind::Comma,
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn comments_are_skipped() {
        let source = "SELECT -- trailing\n// another\n/* block /* nested */ */ *";
        assert_eq!(
            kinds(source),
            vec![TokenKind::Select, TokenKind::Star, TokenKind::Eof]
        );
    }

    #[test]
    fn unclosed_block_comment() {
        let result = tokenize("SELECT /* open");
        assert_eq!(result.diagnostics.len(), 1);
        assert!(result.diagnostics[0].message.contains("unclosed block"));
    }

    #[test]
    fn invalid_characters_recover() {
        let result = tokenize("@ SELECT #");
        assert_eq!(result.diagnostics.len(), 2);
        assert!(
            result
                .tokens
                .iter()
                .any(|t| t.kind == TokenKind::Select)
        );
    }

    #[test]
    fn full_query_lexes_clean() {
        let source = r#"SELECT ?person, SNIPPET(?person, 45) FROM corpus
            WHERE CONTAINS("Smith") AND NER(PERSON, ?person)
            ORDER BY ?person ASC LIMIT 50"#;
        let result = tokenize(source);
        assert!(result.diagnostics.is_empty());
        assert!(result.tokens.len() > 20);
    }

    #[test]
    fn spans_are_accurate() {
        let result = tokenize("SELECT ?p");
        assert_eq!(result.tokens[0].span, 0..6);
        assert_eq!(result.tokens[1].span, 7..9);
    }
}
