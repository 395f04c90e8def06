//! Top-level query parsing: SELECT, FROM, WHERE, GRANULARITY, ORDER BY, LIMIT.

use crate::ast::{
    CountSpec, FnKind, Granularity, OrderSpec, Query, SelectItem, SortDir, merge_spans,
};
use crate::lexer::token::TokenKind;
use crate::parser::condition::parse_condition;
use crate::parser::stream::{PResult, TokenStream};
use smol_str::SmolStr;

/// Parses a complete query, requiring EOF after the last clause.
pub(super) fn parse_query(stream: &mut TokenStream) -> PResult<Query> {
    let start = stream.expect(TokenKind::Select, "query")?;

    let mut select = vec![parse_select_item(stream)?];
    while stream.consume(&TokenKind::Comma) {
        select.push(parse_select_item(stream)?);
    }

    stream.expect(TokenKind::From, "query")?;
    let source = parse_name(stream, "corpus name")?;

    let condition = if stream.consume(&TokenKind::Where) {
        Some(parse_condition(stream)?)
    } else {
        None
    };

    let granularity = parse_granularity(stream)?;
    let order_by = parse_order_by(stream)?;
    let limit = parse_limit(stream)?;

    let span = merge_spans(&start, &stream.previous_span());
    stream.expect(TokenKind::Eof, "end of query")?;

    Ok(Query {
        source,
        select,
        condition,
        granularity,
        order_by,
        limit,
        span,
    })
}

fn parse_select_item(stream: &mut TokenStream) -> PResult<SelectItem> {
    let start = stream.current().span.clone();
    match stream.current().kind.clone() {
        TokenKind::Star => {
            stream.advance();
            Ok(SelectItem::Wildcard { span: start })
        }
        TokenKind::Variable(name) => {
            stream.advance();
            let alias = parse_alias(stream)?;
            let span = merge_spans(&start, &stream.previous_span());
            Ok(SelectItem::Variable { name, alias, span })
        }
        TokenKind::Snippet => {
            stream.advance();
            stream.expect(TokenKind::LParen, "SNIPPET")?;
            let var = parse_variable(stream, "SNIPPET argument")?;
            let length = if stream.consume(&TokenKind::Comma) {
                Some(parse_integer(stream, "SNIPPET length")? as u32)
            } else {
                None
            };
            stream.expect(TokenKind::RParen, "SNIPPET")?;
            let alias = parse_alias(stream)?;
            let span = merge_spans(&start, &stream.previous_span());
            Ok(SelectItem::Function {
                kind: FnKind::Snippet { var, length },
                alias,
                span,
            })
        }
        TokenKind::Date => {
            stream.advance();
            stream.expect(TokenKind::LParen, "DATE column")?;
            let var = parse_variable(stream, "DATE argument")?;
            stream.expect(TokenKind::RParen, "DATE column")?;
            let alias = parse_alias(stream)?;
            let span = merge_spans(&start, &stream.previous_span());
            Ok(SelectItem::Function {
                kind: FnKind::Date { var },
                alias,
                span,
            })
        }
        TokenKind::Person => {
            stream.advance();
            stream.expect(TokenKind::LParen, "PERSON column")?;
            let var = parse_variable(stream, "PERSON argument")?;
            stream.expect(TokenKind::RParen, "PERSON column")?;
            let alias = parse_alias(stream)?;
            let span = merge_spans(&start, &stream.previous_span());
            Ok(SelectItem::Function {
                kind: FnKind::Person { var },
                alias,
                span,
            })
        }
        TokenKind::Count => {
            stream.advance();
            stream.expect(TokenKind::LParen, "COUNT")?;
            let spec = parse_count_spec(stream)?;
            stream.expect(TokenKind::RParen, "COUNT")?;
            let alias = parse_alias(stream)?;
            let span = merge_spans(&start, &stream.previous_span());
            Ok(SelectItem::Function {
                kind: FnKind::Count(spec),
                alias,
                span,
            })
        }
        other => Err(stream.error_here(format!(
            "expected a select item (*, ?var, SNIPPET, DATE, PERSON, or COUNT), found {other}"
        ))),
    }
}

fn parse_count_spec(stream: &mut TokenStream) -> PResult<CountSpec> {
    match &stream.current().kind {
        TokenKind::Star => {
            stream.advance();
            Ok(CountSpec::Matches)
        }
        TokenKind::Documents => {
            stream.advance();
            Ok(CountSpec::Documents)
        }
        TokenKind::Unique => {
            stream.advance();
            let var = parse_variable(stream, "COUNT(UNIQUE ...)")?;
            Ok(CountSpec::Unique(var))
        }
        other => Err(stream.error_here(format!(
            "expected *, DOCUMENTS, or UNIQUE ?var inside COUNT, found {other}"
        ))),
    }
}

fn parse_granularity(stream: &mut TokenStream) -> PResult<Granularity> {
    if !stream.consume(&TokenKind::Granularity) {
        return Ok(Granularity::Document);
    }
    match &stream.current().kind {
        TokenKind::Document => {
            stream.advance();
            Ok(Granularity::Document)
        }
        TokenKind::Sentence => {
            stream.advance();
            let window = if matches!(stream.current().kind, TokenKind::IntegerLiteral(_)) {
                parse_integer(stream, "sentence window")? as u32
            } else {
                0
            };
            Ok(Granularity::Sentence { window })
        }
        other => Err(stream.error_here(format!(
            "expected DOCUMENT or SENTENCE after GRANULARITY, found {other}"
        ))),
    }
}

fn parse_order_by(stream: &mut TokenStream) -> PResult<Vec<OrderSpec>> {
    if !stream.consume(&TokenKind::Order) {
        return Ok(Vec::new());
    }
    stream.expect(TokenKind::By, "ORDER BY")?;

    let mut specs = vec![parse_order_spec(stream)?];
    while stream.consume(&TokenKind::Comma) {
        specs.push(parse_order_spec(stream)?);
    }
    Ok(specs)
}

fn parse_order_spec(stream: &mut TokenStream) -> PResult<OrderSpec> {
    let start = stream.current().span.clone();
    let field: SmolStr = match &stream.current().kind {
        TokenKind::Variable(name) => SmolStr::new(format!("?{name}")),
        TokenKind::Identifier(name) => name.clone(),
        other => {
            return Err(stream.error_here(format!(
                "expected a variable, alias, or document_id in ORDER BY, found {other}"
            )));
        }
    };
    stream.advance();

    let dir = if stream.consume(&TokenKind::Desc) {
        SortDir::Desc
    } else {
        stream.consume(&TokenKind::Asc);
        SortDir::Asc
    };

    let span = merge_spans(&start, &stream.previous_span());
    Ok(OrderSpec { field, dir, span })
}

fn parse_limit(stream: &mut TokenStream) -> PResult<Option<u64>> {
    if !stream.consume(&TokenKind::Limit) {
        return Ok(None);
    }
    Ok(Some(parse_integer(stream, "LIMIT")?))
}

fn parse_integer(stream: &mut TokenStream, context: &str) -> PResult<u64> {
    match &stream.current().kind {
        TokenKind::IntegerLiteral(text) => {
            let value = text
                .parse::<u64>()
                .map_err(|_| stream.error_here(format!("integer in {context} is out of range")))?;
            stream.advance();
            Ok(value)
        }
        other => Err(stream.error_here(format!(
            "expected an integer in {context}, found {other}"
        ))),
    }
}

fn parse_variable(stream: &mut TokenStream, context: &str) -> PResult<SmolStr> {
    match &stream.current().kind {
        TokenKind::Variable(name) => {
            let name = name.clone();
            stream.advance();
            Ok(name)
        }
        other => Err(stream.error_here(format!(
            "expected a variable in {context}, found {other}"
        ))),
    }
}

fn parse_name(stream: &mut TokenStream, context: &str) -> PResult<SmolStr> {
    match &stream.current().kind {
        TokenKind::Identifier(name) => {
            let name = name.clone();
            stream.advance();
            Ok(name)
        }
        other => Err(stream.error_here(format!(
            "expected an identifier as {context}, found {other}"
        ))),
    }
}

fn parse_alias(stream: &mut TokenStream) -> PResult<Option<SmolStr>> {
    if !stream.consume(&TokenKind::As) {
        return Ok(None);
    }
    parse_name(stream, "alias").map(Some)
}
