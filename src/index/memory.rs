//! In-memory reference implementation of the index and text contracts.
//!
//! `MemoryCorpus` is a builder for small annotated corpora: tests and
//! embedders register sentences, term occurrences, entity spans, tagged
//! tokens, dependency triples, and date positions, then hand the corpus to
//! the engine. It implements both [`IndexManager`] and [`TextProvider`].

use super::{
    DocId, IndexError, IndexHandle, IndexKind, IndexManager, Position, Posting, SentenceId,
    TextProvider,
};
use crate::ast::NerType;
use chrono::NaiveDate;
use smol_str::SmolStr;
use std::collections::{BTreeMap, BTreeSet};

/// One keyed inverted index held in memory.
#[derive(Debug, Default)]
struct MemoryIndex {
    postings: BTreeMap<SmolStr, Vec<Posting>>,
}

impl MemoryIndex {
    fn insert(&mut self, key: SmolStr, posting: Posting) {
        let list = self.postings.entry(key).or_default();
        let at = list
            .binary_search_by(|p| p.position.cmp(&posting.position))
            .unwrap_or_else(|i| i);
        list.insert(at, posting);
    }
}

impl IndexHandle for MemoryIndex {
    fn lookup(&self, key: &str) -> Result<Vec<Posting>, IndexError> {
        Ok(self.postings.get(key).cloned().unwrap_or_default())
    }

    fn estimate(&self, key: &str) -> u64 {
        if key.is_empty() {
            self.postings.values().map(|list| list.len() as u64).sum()
        } else {
            self.postings.get(key).map_or(0, |list| list.len() as u64)
        }
    }

    fn scan(&self) -> Result<Vec<Posting>, IndexError> {
        let mut all: Vec<Posting> = self.postings.values().flatten().cloned().collect();
        all.sort_by(|a, b| a.position.cmp(&b.position));
        Ok(all)
    }
}

/// The metadata index: corpus membership only.
#[derive(Debug, Default)]
struct DocsIndex {
    docs: BTreeSet<DocId>,
}

impl IndexHandle for DocsIndex {
    fn lookup(&self, _key: &str) -> Result<Vec<Posting>, IndexError> {
        Ok(Vec::new())
    }

    fn estimate(&self, _key: &str) -> u64 {
        self.docs.len() as u64
    }

    fn documents(&self) -> Result<Vec<DocId>, IndexError> {
        Ok(self.docs.iter().copied().collect())
    }
}

/// An annotated corpus held entirely in memory.
#[derive(Debug, Default)]
pub struct MemoryCorpus {
    name: String,
    term: MemoryIndex,
    ner: MemoryIndex,
    pos: MemoryIndex,
    dependency: MemoryIndex,
    temporal: MemoryIndex,
    metadata: DocsIndex,
    sentences: BTreeMap<(DocId, SentenceId), String>,
}

impl MemoryCorpus {
    /// Creates an empty corpus with the given name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Registers a document with no annotations yet.
    pub fn with_document(mut self, doc: DocId) -> Self {
        self.metadata.docs.insert(doc);
        self
    }

    /// Registers a sentence's text, creating the document if needed.
    pub fn with_sentence(mut self, doc: DocId, sentence: SentenceId, text: impl Into<String>) -> Self {
        self.metadata.docs.insert(doc);
        self.sentences.insert((doc, sentence), text.into());
        self
    }

    /// Indexes a term occurrence.
    pub fn with_term(
        mut self,
        term: &str,
        doc: DocId,
        sentence: SentenceId,
        begin: u32,
        end: u32,
    ) -> Self {
        self.metadata.docs.insert(doc);
        self.term.insert(
            term.to_lowercase().into(),
            Posting {
                term: term.into(),
                dependent: None,
                position: Position::new(doc, sentence, begin, end),
            },
        );
        self
    }

    /// Indexes a named-entity span.
    pub fn with_entity(
        mut self,
        ty: NerType,
        surface: &str,
        doc: DocId,
        sentence: SentenceId,
        begin: u32,
        end: u32,
    ) -> Self {
        self.metadata.docs.insert(doc);
        self.ner.insert(
            ty.as_str().into(),
            Posting {
                term: surface.into(),
                dependent: None,
                position: Position::new(doc, sentence, begin, end),
            },
        );
        self
    }

    /// Indexes a part-of-speech-tagged token.
    pub fn with_pos_tag(
        mut self,
        tag: &str,
        token: &str,
        doc: DocId,
        sentence: SentenceId,
        begin: u32,
        end: u32,
    ) -> Self {
        self.metadata.docs.insert(doc);
        self.pos.insert(
            tag.to_uppercase().into(),
            Posting {
                term: token.into(),
                dependent: None,
                position: Position::new(doc, sentence, begin, end),
            },
        );
        self
    }

    /// Indexes a dependency triple under its relation.
    pub fn with_dependency(
        mut self,
        relation: &str,
        governor: &str,
        dependent: &str,
        doc: DocId,
        sentence: SentenceId,
        begin: u32,
        end: u32,
    ) -> Self {
        self.metadata.docs.insert(doc);
        self.dependency.insert(
            relation.to_lowercase().into(),
            Posting {
                term: governor.into(),
                dependent: Some(dependent.into()),
                position: Position::new(doc, sentence, begin, end),
            },
        );
        self
    }

    /// Indexes a date-bearing position. The posting's surface form is the
    /// ISO rendering of the date.
    pub fn with_date(
        mut self,
        date: NaiveDate,
        doc: DocId,
        sentence: SentenceId,
        begin: u32,
        end: u32,
    ) -> Self {
        self.metadata.docs.insert(doc);
        let mut position = Position::new(doc, sentence, begin, end);
        position.date = Some(date.and_hms_opt(0, 0, 0).expect("midnight is valid"));
        self.temporal.insert(
            SmolStr::new(date.to_string()),
            Posting {
                term: SmolStr::new(date.to_string()),
                dependent: None,
                position,
            },
        );
        self
    }
}

impl IndexManager for MemoryCorpus {
    fn name(&self) -> &str {
        &self.name
    }

    fn get_index(&self, kind: IndexKind) -> Option<&dyn IndexHandle> {
        Some(match kind {
            IndexKind::Term => &self.term,
            IndexKind::Ner => &self.ner,
            IndexKind::Pos => &self.pos,
            IndexKind::Dependency => &self.dependency,
            IndexKind::Temporal => &self.temporal,
            IndexKind::Metadata => &self.metadata,
        })
    }
}

impl TextProvider for MemoryCorpus {
    fn sentence(&self, doc: DocId, sentence: SentenceId) -> Option<String> {
        self.sentences.get(&(doc, sentence)).cloned()
    }

    fn document(&self, doc: DocId) -> Option<String> {
        let sentences: Vec<&str> = self
            .sentences
            .range((doc, 0)..=(doc, SentenceId::MAX))
            .map(|(_, text)| text.as_str())
            .collect();
        if sentences.is_empty() {
            None
        } else {
            Some(sentences.join(" "))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn term_lookup_is_case_insensitive_on_key() {
        let corpus = MemoryCorpus::new("c").with_term("Obama", 1, 0, 0, 5);
        let index = corpus.get_index(IndexKind::Term).unwrap();
        let postings = index.lookup("obama").unwrap();
        assert_eq!(postings.len(), 1);
        assert_eq!(postings[0].term, "Obama");
        assert!(index.lookup("Obama").unwrap().is_empty());
    }

    #[test]
    fn postings_stay_sorted_by_position() {
        let corpus = MemoryCorpus::new("c")
            .with_term("x", 2, 0, 0, 1)
            .with_term("x", 1, 3, 0, 1)
            .with_term("x", 1, 1, 0, 1);
        let postings = corpus
            .get_index(IndexKind::Term)
            .unwrap()
            .lookup("x")
            .unwrap();
        let locations: Vec<(DocId, SentenceId)> = postings
            .iter()
            .map(|p| (p.position.doc_id, p.position.sentence_id))
            .collect();
        assert_eq!(locations, vec![(1, 1), (1, 3), (2, 0)]);
    }

    #[test]
    fn estimates() {
        let corpus = MemoryCorpus::new("c")
            .with_term("a", 1, 0, 0, 1)
            .with_term("a", 2, 0, 0, 1)
            .with_term("b", 3, 0, 0, 1);
        let index = corpus.get_index(IndexKind::Term).unwrap();
        assert_eq!(index.estimate("a"), 2);
        assert_eq!(index.estimate("b"), 1);
        assert_eq!(index.estimate("missing"), 0);
        assert_eq!(index.estimate(""), 3);
    }

    #[test]
    fn metadata_tracks_every_registered_doc() {
        let corpus = MemoryCorpus::new("c")
            .with_document(7)
            .with_term("a", 1, 0, 0, 1)
            .with_entity(NerType::Person, "Obama", 3, 0, 0, 5);
        let docs = corpus
            .get_index(IndexKind::Metadata)
            .unwrap()
            .documents()
            .unwrap();
        assert_eq!(docs, vec![1, 3, 7]);
    }

    #[test]
    fn temporal_scan_carries_dates() {
        let corpus = MemoryCorpus::new("c")
            .with_date(date(2005, 3, 11), 1, 0, 0, 10)
            .with_date(date(1999, 1, 1), 2, 0, 0, 10);
        let postings = corpus
            .get_index(IndexKind::Temporal)
            .unwrap()
            .scan()
            .unwrap();
        assert_eq!(postings.len(), 2);
        assert!(postings.iter().all(|p| p.position.date.is_some()));
        assert_eq!(postings[0].position.doc_id, 1);
    }

    #[test]
    fn text_provider_sentences_and_documents() {
        let corpus = MemoryCorpus::new("c")
            .with_sentence(1, 0, "First sentence.")
            .with_sentence(1, 1, "Second sentence.");
        assert_eq!(corpus.sentence(1, 1).as_deref(), Some("Second sentence."));
        assert_eq!(
            corpus.document(1).as_deref(),
            Some("First sentence. Second sentence.")
        );
        assert_eq!(corpus.document(9), None);
    }

    #[test]
    fn dependency_postings_carry_both_ends() {
        let corpus = MemoryCorpus::new("c").with_dependency("nsubj", "Obama", "won", 1, 0, 0, 9);
        let postings = corpus
            .get_index(IndexKind::Dependency)
            .unwrap()
            .lookup("nsubj")
            .unwrap();
        assert_eq!(postings[0].term, "Obama");
        assert_eq!(postings[0].dependent.as_deref(), Some("won"));
    }
}
