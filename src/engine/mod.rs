//! Query execution: the engine facade and its supporting machinery.
//!
//! [`QueryEngine`] owns shared handles to a corpus's indexes and text and
//! runs the full pipeline per query: parse, validate, evaluate, materialize.
//! Each query executes synchronously on the calling task and owns all of its
//! intermediate state; the engine itself is safe to share across threads.

mod bindings;
mod error;
mod eval;
mod extract;
mod matches;
mod result;

pub use bindings::{BindingContext, Value};
pub use error::EngineError;
pub use matches::{DocSentenceMatch, MatchKey, MatchSet, SentenceRef};
pub use result::{ColumnSpec, ColumnType, ResultTable};

use crate::ast::Query;
use crate::index::{IndexManager, TextProvider};
use crate::semantic::{SemanticValidator, VariableRegistry};
use eval::Evaluator;
use result::ResultGenerator;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

/// Cooperative cancellation for an in-flight query.
///
/// The evaluator checks the token before every index access and after every
/// combinator step; a tripped token aborts with
/// [`EngineError::Cancelled`] and discards partial results.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    flag: Arc<AtomicBool>,
}

impl CancellationToken {
    /// Creates an untripped token.
    pub fn new() -> Self {
        Self::default()
    }

    /// Trips the token; all clones observe the cancellation.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    /// True once the token has been tripped.
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }
}

/// Engine-wide execution settings.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Wall-clock budget per query; expiry aborts with
    /// [`EngineError::Timeout`].
    pub timeout: Option<Duration>,
    /// Snippet context window when a query does not specify one.
    pub default_snippet_length: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            timeout: None,
            default_snippet_length: 30,
        }
    }
}

impl EngineConfig {
    /// Sets the per-query wall-clock budget.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Sets the default snippet context window.
    pub fn with_snippet_length(mut self, length: usize) -> Self {
        self.default_snippet_length = length;
        self
    }
}

/// The query engine: shared, read-only corpus handles plus configuration.
pub struct QueryEngine {
    indexes: Arc<dyn IndexManager>,
    text: Arc<dyn TextProvider>,
    config: EngineConfig,
}

impl QueryEngine {
    /// Creates an engine over separate index and text handles.
    pub fn new(indexes: Arc<dyn IndexManager>, text: Arc<dyn TextProvider>) -> Self {
        Self {
            indexes,
            text,
            config: EngineConfig::default(),
        }
    }

    /// Creates an engine over one object serving both contracts, such as
    /// [`MemoryCorpus`](crate::index::memory::MemoryCorpus).
    pub fn shared<C>(corpus: Arc<C>) -> Self
    where
        C: IndexManager + TextProvider + 'static,
    {
        Self::new(corpus.clone(), corpus)
    }

    /// Replaces the engine configuration.
    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Parses, validates, and executes a query.
    pub fn execute(&self, source: &str) -> Result<ResultTable, EngineError> {
        self.execute_with(source, &CancellationToken::new())
    }

    /// Like [`execute`](Self::execute) with an external cancellation token.
    pub fn execute_with(
        &self,
        source: &str,
        cancel: &CancellationToken,
    ) -> Result<ResultTable, EngineError> {
        let parsed = crate::parse(source);
        let Some(query) = parsed.ast else {
            return Err(EngineError::Parse(parsed.diagnostics));
        };
        tracing::debug!(corpus = %query.source, "query parsed");

        let outcome = SemanticValidator::new().validate(&query);
        let Some(registry) = outcome.registry else {
            return Err(EngineError::Validation(outcome.diagnostics));
        };
        tracing::debug!(variables = registry.len(), "query validated");

        self.execute_parsed(&query, &registry, cancel)
    }

    /// Executes an already-validated query against the engine's corpus.
    pub fn execute_parsed(
        &self,
        query: &Query,
        registry: &VariableRegistry,
        cancel: &CancellationToken,
    ) -> Result<ResultTable, EngineError> {
        if query.source != self.indexes.name() {
            return Err(EngineError::UnknownCorpus {
                requested: query.source.to_string(),
                available: self.indexes.name().to_string(),
            });
        }

        let deadline = self
            .config
            .timeout
            .map(|budget| (Instant::now() + budget, budget));
        let evaluator = Evaluator::new(self.indexes.as_ref(), query.granularity, cancel, deadline);
        let matches = evaluator.evaluate_root(query.condition.as_ref())?;
        tracing::debug!(matches = matches.len(), "condition evaluated");

        let generator = ResultGenerator::new(
            query,
            registry,
            self.text.as_ref(),
            self.config.default_snippet_length,
        );
        let table = generator.generate(&matches)?;
        tracing::debug!(rows = table.len(), "result materialized");
        Ok(table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancellation_token_propagates_to_clones() {
        let token = CancellationToken::new();
        let clone = token.clone();
        assert!(!clone.is_cancelled());
        token.cancel();
        assert!(clone.is_cancelled());
    }

    #[test]
    fn config_builders() {
        let config = EngineConfig::default()
            .with_timeout(Duration::from_secs(5))
            .with_snippet_length(45);
        assert_eq!(config.timeout, Some(Duration::from_secs(5)));
        assert_eq!(config.default_snippet_length, 45);
    }
}
