//! Read-only index and text contracts consumed by the engine.
//!
//! The engine never builds indexes; it consumes pre-built inverted indexes
//! through [`IndexManager`] and fetches raw text through [`TextProvider`].
//! Both traits are object-safe and must tolerate concurrent readers; one
//! process-wide instance serves all queries. [`MemoryCorpus`](memory::MemoryCorpus)
//! is the in-memory reference implementation used by tests and embedders.

pub mod memory;

use crate::ast::Span;
use chrono::NaiveDateTime;
use smol_str::SmolStr;
use std::fmt;
use thiserror::Error;

/// Identifier of a document within a corpus.
pub type DocId = u32;

/// Identifier of a sentence within a document.
pub type SentenceId = u32;

/// The inverted indexes a corpus exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndexKind {
    /// Term occurrences, keyed by lowercased term.
    Term,
    /// Named-entity spans, keyed by uppercase entity type.
    Ner,
    /// Part-of-speech-tagged tokens, keyed by uppercase tag.
    Pos,
    /// Dependency triples, keyed by lowercased relation.
    Dependency,
    /// Date-bearing positions; enumerated with [`IndexHandle::scan`].
    Temporal,
    /// Corpus membership; enumerated with [`IndexHandle::documents`].
    Metadata,
}

impl IndexKind {
    /// The conventional index name.
    pub fn as_str(self) -> &'static str {
        match self {
            IndexKind::Term => "term",
            IndexKind::Ner => "ner",
            IndexKind::Pos => "pos",
            IndexKind::Dependency => "dependency",
            IndexKind::Temporal => "temporal",
            IndexKind::Metadata => "metadata",
        }
    }
}

impl fmt::Display for IndexKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A span in a document with an optional associated temporal value.
///
/// `begin` and `end` are byte offsets into the sentence's text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Position {
    pub doc_id: DocId,
    pub sentence_id: SentenceId,
    pub begin: u32,
    pub end: u32,
    pub date: Option<NaiveDateTime>,
}

impl Position {
    /// Creates a position without a temporal value.
    pub fn new(doc_id: DocId, sentence_id: SentenceId, begin: u32, end: u32) -> Self {
        Self {
            doc_id,
            sentence_id,
            begin,
            end,
            date: None,
        }
    }

    /// The byte range of this position within its sentence.
    pub fn range(&self) -> Span {
        self.begin as usize..self.end as usize
    }
}

/// One entry of a posting list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Posting {
    /// Surface form of the indexed unit: the matched term, entity surface,
    /// tagged token, dependency governor, or normalized date string.
    pub term: SmolStr,
    /// The dependent term; set by the dependency index only.
    pub dependent: Option<SmolStr>,
    /// Where the unit occurs.
    pub position: Position,
}

/// Failure while reading an index.
#[derive(Debug, Clone, Error)]
#[error("{0}")]
pub struct IndexError(pub String);

/// A read handle over one inverted index.
///
/// `scan` and `documents` have empty defaults; the temporal index overrides
/// `scan` and the metadata index overrides `documents`.
pub trait IndexHandle: Send + Sync {
    /// All postings for `key`, in `(doc, sentence, begin)` order.
    fn lookup(&self, key: &str) -> Result<Vec<Posting>, IndexError>;

    /// Approximate posting count for `key`; the empty key estimates the
    /// whole index. Used only to order conjunction evaluation.
    fn estimate(&self, key: &str) -> u64;

    /// Enumerates every posting, in `(doc, sentence, begin)` order.
    fn scan(&self) -> Result<Vec<Posting>, IndexError> {
        Ok(Vec::new())
    }

    /// Enumerates the corpus's document ids, ascending.
    fn documents(&self) -> Result<Vec<DocId>, IndexError> {
        Ok(Vec::new())
    }
}

/// Process-wide access to a corpus's indexes. Implementations are shared
/// across concurrently executing queries.
pub trait IndexManager: Send + Sync {
    /// The corpus identifier that queries name in FROM.
    fn name(&self) -> &str;

    /// Returns the handle for `kind`, or `None` if this corpus lacks it.
    fn get_index(&self, kind: IndexKind) -> Option<&dyn IndexHandle>;
}

/// Raw text retrieval for snippet extraction.
pub trait TextProvider: Send + Sync {
    /// The text of one sentence.
    fn sentence(&self, doc: DocId, sentence: SentenceId) -> Option<String>;

    /// The full text of one document.
    fn document(&self, doc: DocId) -> Option<String>;
}
