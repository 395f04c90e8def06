//! WHERE-clause parsing: the predicate grammar.
//!
//! ```text
//! expr     := orExpr
//! orExpr   := andExpr (OR andExpr)*
//! andExpr  := notExpr (AND notExpr)*
//! notExpr  := NOT? atom
//! atom     := contains | ner | pos | temporal | dep | ( expr )
//! contains := CONTAINS ( STRING (, STRING)* ) [AS VAR]
//! ner      := NER ( label (, (VAR|STRING))? )
//! pos      := POS ( tag (, (VAR|STRING))? )
//! temporal := DATE ( (VAR|STRING) , tempOp )
//! tempOp   := (< | <= | > | >= | =) dateVal
//!           | BETWEEN dateVal AND dateVal
//!           | CONTAINS [ dateVal , dateVal ]
//!           | NEAR dateVal RADIUS duration
//! dep      := DEP ( (VAR|STRING) , STRING , (VAR|STRING) )
//! ```

use crate::ast::{
    Condition, DateValue, DurationValue, Span, Target, TemporalOp, merge_spans,
};
use crate::diag::Diag;
use crate::lexer::token::TokenKind;
use crate::parser::stream::{PResult, TokenStream};
use smol_str::SmolStr;

/// Parses a full predicate expression.
pub(super) fn parse_condition(stream: &mut TokenStream) -> PResult<Condition> {
    parse_or(stream)
}

fn parse_or(stream: &mut TokenStream) -> PResult<Condition> {
    let first = parse_and(stream)?;
    if !stream.check(&TokenKind::Or) {
        return Ok(first);
    }

    let start = first.span().clone();
    let mut children = vec![first];
    while stream.consume(&TokenKind::Or) {
        children.push(parse_and(stream)?);
    }
    let span = merge_spans(&start, &stream.previous_span());
    Ok(Condition::Or { children, span })
}

fn parse_and(stream: &mut TokenStream) -> PResult<Condition> {
    let first = parse_not(stream)?;
    if !stream.check(&TokenKind::And) {
        return Ok(first);
    }

    let start = first.span().clone();
    let mut children = vec![first];
    while stream.consume(&TokenKind::And) {
        children.push(parse_not(stream)?);
    }
    let span = merge_spans(&start, &stream.previous_span());
    Ok(Condition::And { children, span })
}

fn parse_not(stream: &mut TokenStream) -> PResult<Condition> {
    if stream.check(&TokenKind::Not) {
        let start = stream.current().span.clone();
        stream.advance();
        let child = parse_not(stream)?;
        let span = merge_spans(&start, child.span());
        return Ok(Condition::Not {
            child: Box::new(child),
            span,
        });
    }
    parse_atom(stream)
}

fn parse_atom(stream: &mut TokenStream) -> PResult<Condition> {
    match &stream.current().kind {
        TokenKind::Contains => parse_contains(stream),
        TokenKind::Ner => parse_ner(stream),
        TokenKind::Pos => parse_pos(stream),
        TokenKind::Date => parse_temporal(stream),
        TokenKind::Dep => parse_dependency(stream),
        TokenKind::LParen => {
            stream.advance();
            let inner = parse_condition(stream)?;
            stream.expect(TokenKind::RParen, "parenthesized condition")?;
            Ok(inner)
        }
        other => Err(stream.error_here(format!(
            "expected a condition (CONTAINS, NER, POS, DATE, DEP, or `(`), found {other}"
        ))),
    }
}

fn parse_contains(stream: &mut TokenStream) -> PResult<Condition> {
    let start = stream.expect(TokenKind::Contains, "CONTAINS condition")?;
    stream.expect(TokenKind::LParen, "CONTAINS condition")?;

    let mut terms = vec![parse_string(stream, "CONTAINS term")?];
    while stream.consume(&TokenKind::Comma) {
        terms.push(parse_string(stream, "CONTAINS term")?);
    }
    stream.expect(TokenKind::RParen, "CONTAINS condition")?;

    let binds = if stream.consume(&TokenKind::As) {
        Some(parse_variable(stream, "CONTAINS binding")?)
    } else {
        None
    };

    let span = merge_spans(&start, &stream.previous_span());
    Ok(Condition::Contains { terms, binds, span })
}

fn parse_ner(stream: &mut TokenStream) -> PResult<Condition> {
    let start = stream.expect(TokenKind::Ner, "NER condition")?;
    stream.expect(TokenKind::LParen, "NER condition")?;
    let label = parse_label(stream, "entity type")?;
    let target = if stream.consume(&TokenKind::Comma) {
        Some(parse_target(stream, "NER target")?)
    } else {
        None
    };
    stream.expect(TokenKind::RParen, "NER condition")?;

    let span = merge_spans(&start, &stream.previous_span());
    Ok(Condition::Ner {
        label,
        target,
        span,
    })
}

fn parse_pos(stream: &mut TokenStream) -> PResult<Condition> {
    let start = stream.expect(TokenKind::Pos, "POS condition")?;
    stream.expect(TokenKind::LParen, "POS condition")?;
    let tag = match &stream.current().kind {
        TokenKind::StringLiteral(s) => {
            let tag = s.clone();
            stream.advance();
            tag
        }
        _ => parse_label(stream, "part-of-speech tag")?,
    };
    let target = if stream.consume(&TokenKind::Comma) {
        Some(parse_target(stream, "POS target")?)
    } else {
        None
    };
    stream.expect(TokenKind::RParen, "POS condition")?;

    let span = merge_spans(&start, &stream.previous_span());
    Ok(Condition::Pos { tag, target, span })
}

fn parse_temporal(stream: &mut TokenStream) -> PResult<Condition> {
    let start = stream.expect(TokenKind::Date, "DATE condition")?;
    stream.expect(TokenKind::LParen, "DATE condition")?;
    let target = parse_target(stream, "DATE target")?;
    stream.expect(TokenKind::Comma, "DATE condition")?;
    let op = parse_temporal_op(stream)?;
    stream.expect(TokenKind::RParen, "DATE condition")?;

    let span = merge_spans(&start, &stream.previous_span());
    Ok(Condition::Temporal { target, op, span })
}

fn parse_temporal_op(stream: &mut TokenStream) -> PResult<TemporalOp> {
    match &stream.current().kind {
        TokenKind::Lt => {
            stream.advance();
            let value = parse_date_value(stream, "date bound")?;
            Ok(TemporalOp::Before {
                value,
                inclusive: false,
            })
        }
        TokenKind::LtEq => {
            stream.advance();
            let value = parse_date_value(stream, "date bound")?;
            Ok(TemporalOp::Before {
                value,
                inclusive: true,
            })
        }
        TokenKind::Gt => {
            stream.advance();
            let value = parse_date_value(stream, "date bound")?;
            Ok(TemporalOp::After {
                value,
                inclusive: false,
            })
        }
        TokenKind::GtEq => {
            stream.advance();
            let value = parse_date_value(stream, "date bound")?;
            Ok(TemporalOp::After {
                value,
                inclusive: true,
            })
        }
        TokenKind::Eq => {
            stream.advance();
            let value = parse_date_value(stream, "date bound")?;
            Ok(TemporalOp::On { value })
        }
        TokenKind::Between => {
            stream.advance();
            let start = parse_date_value(stream, "BETWEEN start")?;
            stream.expect(TokenKind::And, "BETWEEN range")?;
            let end = parse_date_value(stream, "BETWEEN end")?;
            Ok(TemporalOp::Between { start, end })
        }
        // CONTAINS [a, b] is interval sugar for BETWEEN a AND b.
        TokenKind::Contains => {
            stream.advance();
            stream.expect(TokenKind::LBracket, "date interval")?;
            let start = parse_date_value(stream, "interval start")?;
            stream.expect(TokenKind::Comma, "date interval")?;
            let end = parse_date_value(stream, "interval end")?;
            stream.expect(TokenKind::RBracket, "date interval")?;
            Ok(TemporalOp::Between { start, end })
        }
        TokenKind::Near => {
            stream.advance();
            let anchor = parse_date_value(stream, "NEAR anchor")?;
            stream.expect(TokenKind::Radius, "NEAR radius")?;
            let radius = parse_duration(stream)?;
            Ok(TemporalOp::Near { anchor, radius })
        }
        other => Err(stream.error_here(format!(
            "expected a temporal relation (<, <=, >, >=, =, BETWEEN, CONTAINS, NEAR), found {other}"
        ))),
    }
}

fn parse_dependency(stream: &mut TokenStream) -> PResult<Condition> {
    let start = stream.expect(TokenKind::Dep, "DEP condition")?;
    stream.expect(TokenKind::LParen, "DEP condition")?;
    let governor = parse_target(stream, "DEP governor")?;
    stream.expect(TokenKind::Comma, "DEP condition")?;
    let relation = parse_string(stream, "DEP relation")?;
    stream.expect(TokenKind::Comma, "DEP condition")?;
    let dependent = parse_target(stream, "DEP dependent")?;
    stream.expect(TokenKind::RParen, "DEP condition")?;

    let span = merge_spans(&start, &stream.previous_span());
    Ok(Condition::Dependency {
        governor,
        relation,
        dependent,
        span,
    })
}

/// Parses a `?var` or `"literal"` predicate argument.
fn parse_target(stream: &mut TokenStream, context: &str) -> PResult<Target> {
    match &stream.current().kind {
        TokenKind::Variable(name) => {
            let target = Target::Variable(name.clone());
            stream.advance();
            Ok(target)
        }
        TokenKind::StringLiteral(s) => {
            let target = Target::Literal(s.clone());
            stream.advance();
            Ok(target)
        }
        other => Err(stream.error_here(format!(
            "expected a variable or string literal as {context}, found {other}"
        ))),
    }
}

fn parse_string(stream: &mut TokenStream, context: &str) -> PResult<SmolStr> {
    match &stream.current().kind {
        TokenKind::StringLiteral(s) => {
            let value = s.clone();
            stream.advance();
            Ok(value)
        }
        other => Err(stream.error_here(format!(
            "expected a string literal as {context}, found {other}"
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
            "expected a variable as {context}, found {other}"
        ))),
    }
}

/// Parses a bare name where keywords are allowed (entity labels, POS tags):
/// `PERSON` and `DATE` are keywords but also valid entity-type names.
fn parse_label(stream: &mut TokenStream, context: &str) -> PResult<SmolStr> {
    let kind = stream.current().kind.clone();
    let label = match &kind {
        TokenKind::Identifier(name) => name.clone(),
        other => match other.keyword_text() {
            Some(word) => SmolStr::new(word),
            None => {
                return Err(stream.error_here(format!(
                    "expected a name as {context}, found {other}"
                )));
            }
        },
    };
    stream.advance();
    Ok(label)
}

/// Parses a date value: a bare date literal, a four-digit year, or a quoted
/// ISO string. Malformed values are rejected with the offending span.
pub(super) fn parse_date_value(stream: &mut TokenStream, context: &str) -> PResult<DateValue> {
    let (text, span) = match &stream.current().kind {
        TokenKind::DateLiteral(text)
        | TokenKind::IntegerLiteral(text)
        | TokenKind::StringLiteral(text) => (text.clone(), stream.current().span.clone()),
        other => {
            return Err(stream.error_here(format!(
                "expected a date as {context}, found {other}"
            )));
        }
    };
    stream.advance();
    DateValue::parse(&text).map_err(|message| date_error(message, span))
}

fn parse_duration(stream: &mut TokenStream) -> PResult<DurationValue> {
    let (text, span) = match &stream.current().kind {
        TokenKind::DurationLiteral(text) | TokenKind::StringLiteral(text) => {
            (text.clone(), stream.current().span.clone())
        }
        other => {
            return Err(stream.error_here(format!(
                "expected a duration (such as 30d) after RADIUS, found {other}"
            )));
        }
    };
    stream.advance();
    DurationValue::parse(&text).map_err(|message| date_error(message, span))
}

fn date_error(message: String, span: Span) -> Box<Diag> {
    Box::new(
        Diag::error(message)
            .with_label(span, "here")
            .with_code("Q003"),
    )
}
