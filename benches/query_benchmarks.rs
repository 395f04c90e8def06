//! End-to-end query benchmarks.
//!
//! Measures the front-end (lexing + parsing + validation) and the full
//! pipeline over an in-memory corpus.
//!
//! ```bash
//! cargo bench
//! cargo bench front_end
//! cargo bench execution
//! ```

use corpusql::ast::NerType;
use corpusql::engine::QueryEngine;
use corpusql::index::memory::MemoryCorpus;
use corpusql::{parse, parse_and_validate};
use criterion::{Criterion, black_box, criterion_group, criterion_main};
use std::sync::Arc;

const SIMPLE: &str = r#"SELECT * FROM corpus WHERE CONTAINS("Obama")"#;
const COMPLEX: &str = r#"SELECT ?p, ?l, SNIPPET(?p) FROM corpus
    WHERE CONTAINS("president") AND NER(PERSON, ?p) AND NER(LOCATION, ?l)
      AND NOT CONTAINS("senate")
    ORDER BY ?p ASC LIMIT 50"#;
const TEMPORAL: &str = r#"SELECT ?d FROM corpus
    WHERE DATE(?d, BETWEEN 1990-01-01 AND 2010-12-31) AND CONTAINS("election")"#;

fn build_corpus() -> MemoryCorpus {
    let people = ["Obama", "Bush", "Clinton", "Merkel", "Macron"];
    let places = ["Hawaii", "Texas", "Berlin", "Paris", "Geneva"];

    let mut corpus = MemoryCorpus::new("corpus");
    for doc in 0..200u32 {
        let person = people[doc as usize % people.len()];
        let place = places[(doc as usize / 2) % places.len()];
        let sentence = format!("{person} spoke about the election in {place}.");
        let person_end = person.len() as u32;

        corpus = corpus
            .with_sentence(doc, 0, sentence)
            .with_term(person, doc, 0, 0, person_end)
            .with_term("election", doc, 0, person_end + 17, person_end + 25)
            .with_entity(NerType::Person, person, doc, 0, 0, person_end)
            .with_entity(NerType::Location, place, doc, 0, person_end + 29, person_end + 29 + place.len() as u32)
            .with_dependency("nsubj", person, "spoke", doc, 0, 0, person_end + 6);
        if doc % 3 == 0 {
            corpus = corpus.with_term("president", doc, 0, 0, 9);
        }
        if doc % 4 == 0 {
            let date = chrono::NaiveDate::from_ymd_opt(1980 + (doc as i32 % 40), 6, 15)
                .expect("valid fixture date");
            corpus = corpus.with_date(date, doc, 0, 0, 10);
        }
    }
    corpus
}

fn bench_front_end(c: &mut Criterion) {
    let mut group = c.benchmark_group("front_end");
    group.bench_function("parse_simple", |b| {
        b.iter(|| parse(black_box(SIMPLE)));
    });
    group.bench_function("parse_complex", |b| {
        b.iter(|| parse(black_box(COMPLEX)));
    });
    group.bench_function("parse_and_validate_complex", |b| {
        b.iter(|| parse_and_validate(black_box(COMPLEX)));
    });
    group.finish();
}

fn bench_execution(c: &mut Criterion) {
    let engine = QueryEngine::shared(Arc::new(build_corpus()));

    let mut group = c.benchmark_group("execution");
    group.bench_function("simple_contains", |b| {
        b.iter(|| engine.execute(black_box(SIMPLE)).unwrap());
    });
    group.bench_function("conjunction_with_bindings", |b| {
        b.iter(|| engine.execute(black_box(COMPLEX)).unwrap());
    });
    group.bench_function("temporal_range", |b| {
        b.iter(|| engine.execute(black_box(TEMPORAL)).unwrap());
    });
    group.finish();
}

criterion_group!(benches, bench_front_end, bench_execution);
criterion_main!(benches);
