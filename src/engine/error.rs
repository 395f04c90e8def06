//! Runtime error taxonomy for query execution.

use crate::diag::Diag;
use crate::index::IndexKind;
use miette::Report;
use std::time::Duration;
use thiserror::Error;

/// Any failure surfaced by [`QueryEngine::execute`](crate::engine::QueryEngine::execute).
///
/// Syntax and semantic failures wrap the diagnostic batches from the
/// front-end; the remaining variants are runtime conditions. `Cancelled` and
/// `Timeout` are control-flow aborts, not faults, and are never logged at
/// error level.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The query text failed to parse.
    #[error("query failed to parse ({} diagnostic(s))", .0.len())]
    Parse(Vec<Report>),

    /// The query parsed but failed semantic validation.
    #[error("query failed validation ({} diagnostic(s))", .0.len())]
    Validation(Vec<Diag>),

    /// FROM names a corpus this engine does not serve.
    #[error("unknown corpus `{requested}` (this engine serves `{available}`)")]
    UnknownCorpus {
        requested: String,
        available: String,
    },

    /// A required index is not exposed by the index manager.
    #[error("index `{index}` is unavailable (required by condition at {path})")]
    MissingIndex { index: IndexKind, path: String },

    /// An index or text lookup failed.
    #[error("lookup against index `{index}` failed at condition {path}: {cause}")]
    Execution {
        index: IndexKind,
        path: String,
        cause: String,
    },

    /// The query was cancelled; partial results are discarded.
    #[error("query was cancelled")]
    Cancelled,

    /// The per-query wall-clock budget expired; partial results are discarded.
    #[error("query timed out after {0:?}")]
    Timeout(Duration),
}

impl EngineError {
    /// True for the control-flow aborts (`Cancelled`, `Timeout`).
    pub fn is_abort(&self) -> bool {
        matches!(self, EngineError::Cancelled | EngineError::Timeout(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_messages() {
        let err = EngineError::UnknownCorpus {
            requested: "news".into(),
            available: "corpus".into(),
        };
        assert!(err.to_string().contains("news"));
        assert!(err.to_string().contains("corpus"));

        let err = EngineError::MissingIndex {
            index: IndexKind::Ner,
            path: "0.1".into(),
        };
        assert!(err.to_string().contains("ner"));
        assert!(err.to_string().contains("0.1"));
    }

    #[test]
    fn abort_classification() {
        assert!(EngineError::Cancelled.is_abort());
        assert!(EngineError::Timeout(Duration::from_secs(1)).is_abort());
        assert!(!EngineError::Validation(Vec::new()).is_abort());
    }
}
