//! Shared fixtures for the integration suites.

use chrono::NaiveDate;
use corpusql::engine::QueryEngine;
use corpusql::index::memory::MemoryCorpus;
use std::sync::Arc;

/// Builds an engine over an in-memory corpus.
pub fn engine(corpus: MemoryCorpus) -> QueryEngine {
    QueryEngine::shared(Arc::new(corpus))
}

/// Shorthand date constructor for fixture building.
pub fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).expect("fixture date is valid")
}
