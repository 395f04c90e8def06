//! Structured query engine over linguistically annotated corpora.
//!
//! Queries combine textual, named-entity, part-of-speech,
//! syntactic-dependency, and temporal predicates in a SQL-like surface, are
//! evaluated against pre-built inverted indexes, and produce a tabular
//! result with configurable columns, ordering, and limit:
//!
//! ```text
//! SELECT ?person, ?location, SNIPPET(?person)
//! FROM corpus
//! WHERE CONTAINS("Smith") AND NER(PERSON, ?person) AND NER(LOCATION, ?location)
//! ORDER BY ?person ASC
//! LIMIT 50
//! ```
//!
//! # Parse
//!
//! ```
//! use corpusql::parse;
//!
//! let result = parse(r#"SELECT ?p FROM corpus WHERE NER(PERSON, ?p)"#);
//! assert!(result.ast.is_some());
//! ```
//!
//! # Execute
//!
//! ```
//! use corpusql::engine::QueryEngine;
//! use corpusql::index::memory::MemoryCorpus;
//! use corpusql::ast::NerType;
//! use std::sync::Arc;
//!
//! let corpus = MemoryCorpus::new("corpus")
//!     .with_sentence(1, 0, "Obama spoke in Hawaii.")
//!     .with_entity(NerType::Person, "Obama", 1, 0, 0, 5);
//!
//! let engine = QueryEngine::shared(Arc::new(corpus));
//! let table = engine
//!     .execute(r#"SELECT ?p FROM corpus WHERE NER(PERSON, ?p)"#)
//!     .unwrap();
//! assert_eq!(table.column("p"), vec!["Obama"]);
//! ```
//!
//! The engine consumes corpora through the read-only
//! [`IndexManager`](index::IndexManager) and
//! [`TextProvider`](index::TextProvider) contracts; annotation and index
//! construction happen elsewhere.

pub mod ast;
pub mod diag;
pub mod engine;
pub mod index;
pub mod lexer;
pub mod parser;
pub mod semantic;

pub use ast::{Condition, Granularity, NerType, Query, SelectItem};
pub use diag::{Diag, DiagSeverity};
pub use engine::{
    CancellationToken, EngineConfig, EngineError, QueryEngine, ResultTable,
};
pub use lexer::{Lexer, LexerResult, tokenize};
pub use parser::{ParseResult, Parser};
pub use semantic::{SemanticValidator, ValidationOutcome, VariableRegistry};

use miette::Report;

/// Parses query text end-to-end (lexing + parsing).
///
/// This is the front-end entry point; it feeds the parser from the lexer and
/// merges diagnostics from both phases.
pub fn parse(source: &str) -> ParseResult {
    let lexed = tokenize(source);
    Parser::new(lexed.tokens, source)
        .with_lexer_diagnostics(lexed.diagnostics)
        .parse()
}

/// Result of parsing plus semantic validation.
#[derive(Debug)]
pub struct ParseAndValidateResult {
    /// The validated query, if both phases succeeded.
    pub query: Option<Query>,
    /// The variable registry, present alongside `query`.
    pub registry: Option<VariableRegistry>,
    /// Combined diagnostics from both phases.
    pub diagnostics: Vec<Report>,
}

/// Parses and semantically validates query text.
///
/// Validation only runs when parsing succeeds; diagnostics from whichever
/// phase failed are rendered against the source.
pub fn parse_and_validate(source: &str) -> ParseAndValidateResult {
    let parsed = parse(source);
    let Some(query) = parsed.ast else {
        return ParseAndValidateResult {
            query: None,
            registry: None,
            diagnostics: parsed.diagnostics,
        };
    };

    let outcome = SemanticValidator::new().validate(&query);
    let diagnostics = diag::render_reports(&outcome.diagnostics, source);
    match outcome.registry {
        Some(registry) => ParseAndValidateResult {
            query: Some(query),
            registry: Some(registry),
            diagnostics,
        },
        None => ParseAndValidateResult {
            query: None,
            registry: None,
            diagnostics,
        },
    }
}
