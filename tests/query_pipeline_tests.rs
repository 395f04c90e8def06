//! End-to-end pipeline tests: parse, validate, evaluate, materialize.

mod common;

use common::{date, engine};
use corpusql::ast::NerType;
use corpusql::engine::{CancellationToken, EngineConfig, EngineError, QueryEngine};
use corpusql::index::memory::MemoryCorpus;
use std::sync::Arc;
use std::time::Duration;

// ----------------------------------------------------------------------
// Concrete scenarios
// ----------------------------------------------------------------------

#[test]
fn simple_contains() {
    let engine = engine(
        MemoryCorpus::new("c")
            .with_term("Obama", 1, 0, 0, 5)
            .with_term("Obama", 3, 0, 10, 15)
            .with_term("Bush", 2, 0, 0, 4),
    );
    let table = engine
        .execute(r#"SELECT * FROM c WHERE CONTAINS("Obama")"#)
        .unwrap();
    assert_eq!(table.column("document_id"), vec!["1", "3"]);
}

#[test]
fn ner_binding() {
    let engine = engine(
        MemoryCorpus::new("c")
            .with_entity(NerType::Person, "Obama", 1, 0, 0, 5)
            .with_entity(NerType::Person, "Bush", 2, 0, 0, 4),
    );
    let table = engine
        .execute("SELECT ?p FROM c WHERE NER(PERSON, ?p) ORDER BY ?p ASC")
        .unwrap();
    assert_eq!(table.column("p"), vec!["Bush", "Obama"]);
}

#[test]
fn and_with_shared_variable() {
    let engine = engine(
        MemoryCorpus::new("c")
            .with_entity(NerType::Person, "Obama", 1, 0, 0, 5)
            .with_term("president", 1, 0, 20, 29)
            .with_entity(NerType::Person, "Bush", 2, 0, 0, 4),
    );
    let table = engine
        .execute(r#"SELECT ?p FROM c WHERE NER(PERSON, ?p) AND CONTAINS("president")"#)
        .unwrap();
    assert_eq!(table.column("p"), vec!["Obama"]);
}

#[test]
fn temporal_between() {
    let engine = engine(
        MemoryCorpus::new("c")
            .with_date(date(1999, 3, 1), 1, 0, 0, 10)
            .with_date(date(2005, 6, 15), 2, 0, 0, 10)
            .with_date(date(2012, 1, 9), 3, 0, 0, 10),
    );
    let table = engine
        .execute("SELECT ?d FROM c WHERE DATE(?d, BETWEEN 2001-01-01 AND 2010-12-31)")
        .unwrap();
    assert_eq!(table.column("d"), vec!["2005-06-15"]);
}

#[test]
fn or_union_with_order_and_limit() {
    let engine = engine(
        MemoryCorpus::new("c")
            .with_entity(NerType::Person, "Zed", 1, 0, 0, 3)
            .with_entity(NerType::Person, "Amy", 2, 0, 0, 3)
            .with_entity(NerType::Organization, "Acme", 3, 0, 0, 4),
    );
    let table = engine
        .execute(
            "SELECT ?p FROM c WHERE NER(PERSON, ?p) OR NER(ORGANIZATION, ?p) \
             ORDER BY ?p ASC LIMIT 2",
        )
        .unwrap();
    assert_eq!(table.column("p"), vec!["Acme", "Amy"]);
}

#[test]
fn not_subtracts_within_conjunction() {
    let engine = engine(
        MemoryCorpus::new("c")
            .with_term("Obama", 1, 0, 0, 5)
            .with_term("Obama", 3, 0, 0, 5)
            .with_term("2009", 1, 0, 10, 14),
    );
    let table = engine
        .execute(r#"SELECT * FROM c WHERE CONTAINS("Obama") AND NOT CONTAINS("2009")"#)
        .unwrap();
    assert_eq!(table.column("document_id"), vec!["3"]);
}

// ----------------------------------------------------------------------
// Algebraic properties
// ----------------------------------------------------------------------

fn president_corpus() -> MemoryCorpus {
    MemoryCorpus::new("c")
        .with_entity(NerType::Person, "Obama", 1, 0, 0, 5)
        .with_entity(NerType::Person, "Bush", 2, 0, 0, 4)
        .with_term("president", 1, 0, 20, 29)
        .with_term("president", 2, 0, 18, 27)
        .with_term("Obama", 1, 0, 0, 5)
        .with_term("election", 1, 0, 32, 40)
}

#[test]
fn evaluator_is_deterministic() {
    let engine = engine(president_corpus());
    let query = r#"SELECT ?p FROM c WHERE NER(PERSON, ?p) AND CONTAINS("president")"#;
    let first = engine.execute(query).unwrap();
    let second = engine.execute(query).unwrap();
    assert_eq!(first.rows, second.rows);
}

#[test]
fn and_is_commutative_up_to_row_order() {
    let engine = engine(president_corpus());
    let mut ab = engine
        .execute(r#"SELECT ?p FROM c WHERE NER(PERSON, ?p) AND CONTAINS("Obama")"#)
        .unwrap()
        .column("p")
        .into_iter()
        .map(String::from)
        .collect::<Vec<_>>();
    let mut ba = engine
        .execute(r#"SELECT ?p FROM c WHERE CONTAINS("Obama") AND NER(PERSON, ?p)"#)
        .unwrap()
        .column("p")
        .into_iter()
        .map(String::from)
        .collect::<Vec<_>>();
    ab.sort();
    ba.sort();
    assert_eq!(ab, ba);
}

#[test]
fn not_complements_the_corpus() {
    let corpus = MemoryCorpus::new("c")
        .with_term("Obama", 1, 0, 0, 5)
        .with_term("Obama", 3, 0, 0, 5)
        .with_document(2)
        .with_document(4);
    let engine = engine(corpus);

    let positive = engine
        .execute(r#"SELECT * FROM c WHERE CONTAINS("Obama")"#)
        .unwrap();
    let negative = engine
        .execute(r#"SELECT * FROM c WHERE NOT CONTAINS("Obama")"#)
        .unwrap();
    let everything = engine.execute("SELECT * FROM c").unwrap();

    let mut union: Vec<&str> = positive
        .column("document_id")
        .into_iter()
        .chain(negative.column("document_id"))
        .collect();
    union.sort();
    let mut all = everything.column("document_id");
    all.sort();
    assert_eq!(union, all);

    for doc in positive.column("document_id") {
        assert!(!negative.column("document_id").contains(&doc));
    }
}

#[test]
fn bindings_narrow_across_conjunction() {
    // Two PERSON spans in the sentence, but only Obama governs "won".
    let engine = engine(
        MemoryCorpus::new("c")
            .with_entity(NerType::Person, "Obama", 1, 0, 0, 5)
            .with_entity(NerType::Person, "Biden", 1, 0, 10, 15)
            .with_dependency("nsubj", "Obama", "won", 1, 0, 0, 9),
    );
    let table = engine
        .execute(r#"SELECT ?p FROM c WHERE NER(PERSON, ?p) AND DEP(?p, "nsubj", "won")"#)
        .unwrap();
    assert_eq!(table.column("p"), vec!["Obama"]);
}

// ----------------------------------------------------------------------
// Granularity
// ----------------------------------------------------------------------

fn two_sentence_corpus() -> MemoryCorpus {
    MemoryCorpus::new("c")
        .with_sentence(1, 0, "Obama spoke first.")
        .with_sentence(1, 1, "The president answered.")
        .with_term("Obama", 1, 0, 0, 5)
        .with_term("president", 1, 1, 4, 13)
}

#[test]
fn document_granularity_joins_across_sentences() {
    let engine = engine(two_sentence_corpus());
    let table = engine
        .execute(r#"SELECT * FROM c WHERE CONTAINS("Obama") AND CONTAINS("president")"#)
        .unwrap();
    assert_eq!(table.column("document_id"), vec!["1"]);
}

#[test]
fn sentence_granularity_separates_sentences() {
    let engine = engine(two_sentence_corpus());
    let table = engine
        .execute(
            r#"SELECT * FROM c WHERE CONTAINS("Obama") AND CONTAINS("president") GRANULARITY SENTENCE"#,
        )
        .unwrap();
    assert!(table.is_empty());
}

#[test]
fn sentence_window_joins_adjacent_sentences() {
    let engine = engine(two_sentence_corpus());
    let table = engine
        .execute(
            r#"SELECT * FROM c WHERE CONTAINS("Obama") AND CONTAINS("president") GRANULARITY SENTENCE 1"#,
        )
        .unwrap();
    assert_eq!(table.column("document_id"), vec!["1"]);
    assert_eq!(table.column("sentence_id"), vec!["0"]);
}

// ----------------------------------------------------------------------
// Projection
// ----------------------------------------------------------------------

#[test]
fn snippet_projection_highlights_matches() {
    let engine = engine(
        MemoryCorpus::new("c")
            .with_sentence(1, 0, "Barack Obama won the election.")
            .with_entity(NerType::Person, "Obama", 1, 0, 7, 12),
    );
    let table = engine
        .execute(
            "SELECT ?p, SNIPPET(?p) AS snip FROM c WHERE NER(PERSON, ?p) GRANULARITY SENTENCE",
        )
        .unwrap();
    assert_eq!(table.column("p"), vec!["Obama"]);
    assert_eq!(table.column("snip"), vec!["Barack *Obama* won the election."]);
}

#[test]
fn count_aggregates() {
    let engine = engine(
        MemoryCorpus::new("c")
            .with_entity(NerType::Person, "Obama", 1, 0, 0, 5)
            .with_entity(NerType::Person, "Bush", 2, 0, 0, 4)
            .with_entity(NerType::Person, "Obama", 3, 0, 0, 5),
    );
    let table = engine
        .execute(
            "SELECT COUNT(*) AS matches, COUNT(DOCUMENTS) AS docs, \
             COUNT(UNIQUE ?p) AS people FROM c WHERE NER(PERSON, ?p)",
        )
        .unwrap();
    assert_eq!(table.len(), 1);
    assert_eq!(table.column("matches"), vec!["3"]);
    assert_eq!(table.column("docs"), vec!["3"]);
    assert_eq!(table.column("people"), vec!["2"]);
}

#[test]
fn dependency_wildcards_bind_both_ends() {
    let engine = engine(
        MemoryCorpus::new("c")
            .with_dependency("nsubj", "Obama", "won", 1, 0, 0, 9)
            .with_dependency("nsubj", "Bush", "lost", 2, 0, 0, 9),
    );
    let table = engine
        .execute(r#"SELECT ?g, ?d FROM c WHERE DEP(?g, "nsubj", ?d) ORDER BY ?g ASC"#)
        .unwrap();
    assert_eq!(table.column("g"), vec!["Bush", "Obama"]);
    assert_eq!(table.column("d"), vec!["lost", "won"]);
}

#[test]
fn dependency_pairs_stay_correlated_within_a_document() {
    // Two triples in the same document must not cross-combine.
    let engine = engine(
        MemoryCorpus::new("c")
            .with_dependency("nsubj", "Obama", "won", 1, 0, 0, 9)
            .with_dependency("nsubj", "Bush", "lost", 1, 0, 12, 20),
    );
    let table = engine
        .execute(r#"SELECT ?g, ?d FROM c WHERE DEP(?g, "nsubj", ?d) ORDER BY ?g ASC"#)
        .unwrap();
    assert_eq!(table.column("g"), vec!["Bush", "Obama"]);
    assert_eq!(table.column("d"), vec!["lost", "won"]);
}

#[test]
fn pos_predicate_binds_tokens() {
    let engine = engine(
        MemoryCorpus::new("c")
            .with_pos_tag("NNP", "Obama", 1, 0, 0, 5)
            .with_pos_tag("VBD", "won", 1, 0, 6, 9),
    );
    let table = engine
        .execute(r#"SELECT ?w FROM c WHERE POS("NNP", ?w)"#)
        .unwrap();
    assert_eq!(table.column("w"), vec!["Obama"]);
}

#[test]
fn temporal_near_with_radius() {
    let engine = engine(
        MemoryCorpus::new("c")
            .with_date(date(2005, 6, 20), 1, 0, 0, 10)
            .with_date(date(2005, 8, 1), 2, 0, 0, 10),
    );
    let table = engine
        .execute("SELECT ?d FROM c WHERE DATE(?d, NEAR 2005-06-15 RADIUS 30d)")
        .unwrap();
    assert_eq!(table.column("d"), vec!["2005-06-20"]);
}

#[test]
fn multiple_values_expand_to_rows() {
    // Two people and one location in the same document.
    let engine = engine(
        MemoryCorpus::new("c")
            .with_entity(NerType::Person, "Obama", 1, 0, 0, 5)
            .with_entity(NerType::Person, "Biden", 1, 0, 10, 15)
            .with_entity(NerType::Location, "Hawaii", 1, 0, 20, 26),
    );
    let table = engine
        .execute(
            "SELECT ?p, ?l FROM c WHERE NER(PERSON, ?p) AND NER(LOCATION, ?l) ORDER BY ?p ASC",
        )
        .unwrap();
    assert_eq!(table.column("p"), vec!["Biden", "Obama"]);
    assert_eq!(table.column("l"), vec!["Hawaii", "Hawaii"]);
}

#[test]
fn empty_results_are_not_errors() {
    let engine = engine(MemoryCorpus::new("c").with_term("Obama", 1, 0, 0, 5));
    let table = engine
        .execute(r#"SELECT * FROM c WHERE CONTAINS("missing")"#)
        .unwrap();
    assert!(table.is_empty());
}

#[test]
fn default_row_order_is_doc_then_sentence() {
    let engine = engine(
        MemoryCorpus::new("c")
            .with_term("x", 3, 0, 0, 1)
            .with_term("x", 1, 2, 0, 1)
            .with_term("x", 1, 0, 0, 1),
    );
    let table = engine
        .execute(r#"SELECT * FROM c WHERE CONTAINS("x") GRANULARITY SENTENCE"#)
        .unwrap();
    assert_eq!(table.column("document_id"), vec!["1", "1", "3"]);
    assert_eq!(table.column("sentence_id"), vec!["0", "2", "0"]);
}

#[test]
fn order_by_document_id_desc() {
    let engine = engine(
        MemoryCorpus::new("c")
            .with_term("x", 1, 0, 0, 1)
            .with_term("x", 2, 0, 0, 1)
            .with_term("x", 10, 0, 0, 1),
    );
    let table = engine
        .execute(r#"SELECT * FROM c WHERE CONTAINS("x") ORDER BY document_id DESC"#)
        .unwrap();
    // Numeric, not lexicographic: 10 before 2.
    assert_eq!(table.column("document_id"), vec!["10", "2", "1"]);
}

// ----------------------------------------------------------------------
// Failure modes
// ----------------------------------------------------------------------

#[test]
fn unknown_corpus_is_rejected() {
    let engine = engine(MemoryCorpus::new("c"));
    let err = engine.execute("SELECT * FROM other").unwrap_err();
    assert!(matches!(err, EngineError::UnknownCorpus { .. }));
}

#[test]
fn parse_errors_surface_as_engine_errors() {
    let engine = engine(MemoryCorpus::new("c"));
    let err = engine.execute("SELECT FROM c").unwrap_err();
    assert!(matches!(err, EngineError::Parse(_)));
}

#[test]
fn validation_errors_surface_as_engine_errors() {
    let engine = engine(MemoryCorpus::new("c"));
    let err = engine
        .execute("SELECT ?p FROM c WHERE NER(WIZARD, ?p)")
        .unwrap_err();
    assert!(matches!(err, EngineError::Validation(_)));
}

#[test]
fn cancellation_aborts_execution() {
    let engine = engine(MemoryCorpus::new("c").with_term("Obama", 1, 0, 0, 5));
    let token = CancellationToken::new();
    token.cancel();
    let err = engine
        .execute_with(r#"SELECT * FROM c WHERE CONTAINS("Obama")"#, &token)
        .unwrap_err();
    assert!(matches!(err, EngineError::Cancelled));
}

#[test]
fn timeout_aborts_execution() {
    let corpus = MemoryCorpus::new("c").with_term("Obama", 1, 0, 0, 5);
    let engine = QueryEngine::shared(Arc::new(corpus))
        .with_config(EngineConfig::default().with_timeout(Duration::from_nanos(1)));
    let err = engine
        .execute(r#"SELECT * FROM c WHERE CONTAINS("Obama")"#)
        .unwrap_err();
    assert!(matches!(err, EngineError::Timeout(_)));
}
