//! Match units and the set algebra over them.
//!
//! A [`MatchSet`] holds [`DocSentenceMatch`]es keyed by `(document,
//! sentence)` in a B-tree, so iteration is always `(doc_id, sentence_id)`
//! ascending — the observable default row order. Several matches can share a
//! key when incompatible binding combinations survive side by side; they are
//! distinguished by their frozen bindings.

use crate::engine::bindings::{BindingContext, Value};
use crate::index::{DocId, Position, SentenceId};
use indexmap::IndexMap;
use smol_str::SmolStr;
use std::collections::BTreeMap;
use std::fmt;

/// Sentence coordinate of a match: a concrete sentence, or the whole
/// document at document granularity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SentenceRef {
    /// Document-level match; stands for every sentence.
    Wildcard,
    /// Sentence-level match.
    Id(SentenceId),
}

impl fmt::Display for SentenceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SentenceRef::Wildcard => f.write_str("*"),
            SentenceRef::Id(id) => write!(f, "{id}"),
        }
    }
}

/// The `(document, sentence)` coordinate a match is keyed by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MatchKey {
    pub doc: DocId,
    pub sentence: SentenceRef,
}

/// One match unit: a document or sentence satisfying a condition, together
/// with the positions that witnessed it and the variable bindings it
/// contributed.
#[derive(Debug, Clone)]
pub struct DocSentenceMatch {
    pub doc_id: DocId,
    pub sentence: SentenceRef,
    /// Origin corpus tag.
    pub source: SmolStr,
    /// Witnessing positions, one set per contributing condition key
    /// (variable name, term, or entity label).
    pub positions: IndexMap<SmolStr, Vec<Position>>,
    /// Values this match binds.
    pub bindings: BindingContext,
}

impl DocSentenceMatch {
    /// Creates an empty match at a coordinate.
    pub fn new(doc_id: DocId, sentence: SentenceRef, source: SmolStr) -> Self {
        Self {
            doc_id,
            sentence,
            source,
            positions: IndexMap::new(),
            bindings: BindingContext::new(),
        }
    }

    /// The coordinate this match is keyed by.
    pub fn key(&self) -> MatchKey {
        MatchKey {
            doc: self.doc_id,
            sentence: self.sentence,
        }
    }

    /// Records a witnessing position under a condition key.
    pub fn add_position(&mut self, key: &SmolStr, position: Position) {
        let list = self.positions.entry(key.clone()).or_default();
        if !list.contains(&position) {
            let at = list
                .binary_search(&position)
                .unwrap_or_else(|i| i);
            list.insert(at, position);
        }
    }

    /// Folds another match's positions into this one.
    fn absorb_positions(&mut self, other: &DocSentenceMatch) {
        for (key, positions) in &other.positions {
            for position in positions {
                self.add_position(key, *position);
            }
        }
    }

    /// Identity of a match: coordinate, source, and frozen bindings.
    /// Two matches with equal identity are the same result and merge.
    pub fn identity(&self) -> (DocId, SentenceRef, SmolStr, Vec<(SmolStr, Vec<String>)>) {
        (
            self.doc_id,
            self.sentence,
            self.source.clone(),
            self.bindings.frozen(),
        )
    }
}

impl PartialEq for DocSentenceMatch {
    fn eq(&self, other: &Self) -> bool {
        self.identity() == other.identity()
    }
}

impl Eq for DocSentenceMatch {}

/// Merges two matches joined at a coordinate, or rejects the pair.
///
/// Variables bound on both sides narrow to the values both agree on; a
/// shared variable with no common value makes the pair incompatible. The
/// surviving match keeps the more specific sentence coordinate and the union
/// of both position maps.
fn merge_compatible(a: &DocSentenceMatch, b: &DocSentenceMatch) -> Option<DocSentenceMatch> {
    let sentence = match (a.sentence, b.sentence) {
        (SentenceRef::Wildcard, s) => s,
        (s, _) => s,
    };

    let mut merged = DocSentenceMatch::new(a.doc_id, sentence, a.source.clone());

    for (name, a_values) in a.bindings.iter() {
        match b.bindings.get(name) {
            Some(b_values) => {
                let common: Vec<Value> = a_values
                    .iter()
                    .filter(|v| b_values.contains(v))
                    .cloned()
                    .collect();
                if common.is_empty() {
                    return None;
                }
                merged.bindings.set(name, common);
            }
            None => merged.bindings.set(name, a_values.clone()),
        }
    }
    for (name, b_values) in b.bindings.iter() {
        if !merged.bindings.has(name) {
            merged.bindings.set(name, b_values.clone());
        }
    }

    merged.absorb_positions(a);
    merged.absorb_positions(b);
    Some(merged)
}

/// True when two coordinates may join: same document, and sentences equal up
/// to the window. A wildcard joins any sentence of its document.
fn keys_join(a: MatchKey, b: MatchKey, window: u32) -> bool {
    if a.doc != b.doc {
        return false;
    }
    match (a.sentence, b.sentence) {
        (SentenceRef::Wildcard, _) | (_, SentenceRef::Wildcard) => true,
        (SentenceRef::Id(x), SentenceRef::Id(y)) => x.abs_diff(y) <= window,
    }
}

/// A collection of matches keyed by coordinate, iterated deterministically.
#[derive(Debug, Clone, Default)]
pub struct MatchSet {
    entries: BTreeMap<MatchKey, Vec<DocSentenceMatch>>,
}

impl MatchSet {
    /// Creates an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a match. A match with the same identity as an existing one
    /// merges position maps instead of duplicating.
    pub fn insert(&mut self, m: DocSentenceMatch) {
        let list = self.entries.entry(m.key()).or_default();
        match list.iter_mut().find(|existing| **existing == m) {
            Some(existing) => existing.absorb_positions(&m),
            None => list.push(m),
        }
    }

    /// Total number of matches.
    pub fn len(&self) -> usize {
        self.entries.values().map(Vec::len).sum()
    }

    /// True when there are no matches.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Matches in `(doc, sentence)` order; insertion order within a key.
    pub fn iter(&self) -> impl Iterator<Item = &DocSentenceMatch> {
        self.entries.values().flatten()
    }

    /// Distinct document ids, ascending.
    pub fn doc_ids(&self) -> Vec<DocId> {
        let mut ids: Vec<DocId> = self.entries.keys().map(|k| k.doc).collect();
        ids.dedup();
        ids
    }

    /// True when any match lives in `doc`.
    pub fn contains_doc(&self, doc: DocId) -> bool {
        self.entries
            .range(
                MatchKey {
                    doc,
                    sentence: SentenceRef::Wildcard,
                }..=MatchKey {
                    doc,
                    sentence: SentenceRef::Id(SentenceId::MAX),
                },
            )
            .next()
            .is_some()
    }

    fn keys_in_doc(&self, doc: DocId) -> impl Iterator<Item = MatchKey> + '_ {
        self.entries
            .range(
                MatchKey {
                    doc,
                    sentence: SentenceRef::Wildcard,
                }..=MatchKey {
                    doc,
                    sentence: SentenceRef::Id(SentenceId::MAX),
                },
            )
            .map(|(k, _)| *k)
    }

    /// Keyed intersection with binding merge.
    ///
    /// For every pair of matches whose coordinates join (same document,
    /// sentences within `window`), the merged match survives if all shared
    /// variables agree on at least one value; incompatible pairs are
    /// dropped.
    pub fn intersect(&self, other: &MatchSet, window: u32) -> MatchSet {
        let mut out = MatchSet::new();
        for (key, matches) in &self.entries {
            for other_key in other.keys_in_doc(key.doc) {
                if !keys_join(*key, other_key, window) {
                    continue;
                }
                let other_matches = &other.entries[&other_key];
                for a in matches {
                    for b in other_matches {
                        if let Some(merged) = merge_compatible(a, b) {
                            out.insert(merged);
                        }
                    }
                }
            }
        }
        out
    }

    /// Keyed union. Matches with equal identity merge; everything else is
    /// kept side by side.
    pub fn union(&self, other: &MatchSet) -> MatchSet {
        let mut out = self.clone();
        for m in other.iter() {
            out.insert(m.clone());
        }
        out
    }

    /// Matches of `self` whose coordinate joins no coordinate of `other`:
    /// the complement used by negation.
    pub fn subtract(&self, other: &MatchSet, window: u32) -> MatchSet {
        let mut out = MatchSet::new();
        for (key, matches) in &self.entries {
            let excluded = other
                .keys_in_doc(key.doc)
                .any(|other_key| keys_join(*key, other_key, window));
            if !excluded {
                for m in matches {
                    out.insert(m.clone());
                }
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn m(doc: DocId, sentence: SentenceRef) -> DocSentenceMatch {
        DocSentenceMatch::new(doc, sentence, "c".into())
    }

    fn m_bound(doc: DocId, sentence: SentenceRef, var: &str, value: &str) -> DocSentenceMatch {
        let mut out = m(doc, sentence);
        out.bindings
            .bind_one(&SmolStr::new(var), Value::Str(value.into()));
        out
    }

    fn set(matches: Vec<DocSentenceMatch>) -> MatchSet {
        let mut out = MatchSet::new();
        for m in matches {
            out.insert(m);
        }
        out
    }

    #[test]
    fn iteration_is_doc_sentence_ascending() {
        let s = set(vec![
            m(3, SentenceRef::Id(0)),
            m(1, SentenceRef::Id(2)),
            m(1, SentenceRef::Id(0)),
        ]);
        let keys: Vec<(DocId, SentenceRef)> =
            s.iter().map(|m| (m.doc_id, m.sentence)).collect();
        assert_eq!(
            keys,
            vec![
                (1, SentenceRef::Id(0)),
                (1, SentenceRef::Id(2)),
                (3, SentenceRef::Id(0))
            ]
        );
    }

    #[test]
    fn insert_merges_equal_identity() {
        let mut a = m(1, SentenceRef::Id(0));
        a.add_position(&"x".into(), Position::new(1, 0, 0, 3));
        let mut b = m(1, SentenceRef::Id(0));
        b.add_position(&"x".into(), Position::new(1, 0, 7, 9));

        let s = set(vec![a, b]);
        assert_eq!(s.len(), 1);
        let only = s.iter().next().unwrap();
        assert_eq!(only.positions["x"].len(), 2);
    }

    #[test]
    fn distinct_bindings_stay_separate() {
        let s = set(vec![
            m_bound(1, SentenceRef::Id(0), "p", "Obama"),
            m_bound(1, SentenceRef::Id(0), "p", "Bush"),
        ]);
        assert_eq!(s.len(), 2);
    }

    #[test]
    fn intersect_requires_shared_keys() {
        let a = set(vec![m(1, SentenceRef::Id(0)), m(2, SentenceRef::Id(0))]);
        let b = set(vec![m(2, SentenceRef::Id(0)), m(3, SentenceRef::Id(0))]);
        let out = a.intersect(&b, 0);
        assert_eq!(out.doc_ids(), vec![2]);
    }

    #[test]
    fn intersect_narrows_shared_variables() {
        let mut a = m(1, SentenceRef::Id(0));
        a.bindings.bind_many(
            &SmolStr::new("p"),
            [Value::Str("Obama".into()), Value::Str("Bush".into())],
        );
        let b = m_bound(1, SentenceRef::Id(0), "p", "Obama");

        let out = set(vec![a]).intersect(&set(vec![b]), 0);
        assert_eq!(out.len(), 1);
        let merged = out.iter().next().unwrap();
        assert_eq!(merged.bindings.get("p").unwrap().len(), 1);
        assert_eq!(merged.bindings.get("p").unwrap()[0].render(), "Obama");
    }

    #[test]
    fn intersect_drops_incompatible_bindings() {
        let a = m_bound(1, SentenceRef::Id(0), "p", "Obama");
        let b = m_bound(1, SentenceRef::Id(0), "p", "Bush");
        let out = set(vec![a]).intersect(&set(vec![b]), 0);
        assert!(out.is_empty());
    }

    #[test]
    fn intersect_unions_disjoint_variables() {
        let a = m_bound(1, SentenceRef::Id(0), "p", "Obama");
        let b = m_bound(1, SentenceRef::Id(0), "l", "Hawaii");
        let out = set(vec![a]).intersect(&set(vec![b]), 0);
        let merged = out.iter().next().unwrap();
        assert!(merged.bindings.has("p"));
        assert!(merged.bindings.has("l"));
    }

    #[test]
    fn sentence_window_joins_nearby_sentences() {
        let a = set(vec![m(1, SentenceRef::Id(2))]);
        let b = set(vec![m(1, SentenceRef::Id(4))]);
        assert!(a.intersect(&b, 0).is_empty());
        assert!(a.intersect(&b, 1).is_empty());
        assert_eq!(a.intersect(&b, 2).len(), 1);
    }

    #[test]
    fn wildcard_joins_any_sentence_of_its_doc() {
        let a = set(vec![m(1, SentenceRef::Wildcard)]);
        let b = set(vec![m(1, SentenceRef::Id(5))]);
        let out = a.intersect(&b, 0);
        assert_eq!(out.len(), 1);
        // The merged match keeps the specific sentence.
        assert_eq!(out.iter().next().unwrap().sentence, SentenceRef::Id(5));
    }

    #[test]
    fn union_merges_equal_and_keeps_distinct() {
        let a = set(vec![m_bound(1, SentenceRef::Id(0), "p", "Obama")]);
        let b = set(vec![
            m_bound(1, SentenceRef::Id(0), "p", "Obama"),
            m_bound(2, SentenceRef::Id(0), "p", "Bush"),
        ]);
        let out = a.union(&b);
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn subtract_removes_joined_docs() {
        let a = set(vec![m(1, SentenceRef::Wildcard), m(3, SentenceRef::Wildcard)]);
        let b = set(vec![m(1, SentenceRef::Id(4))]);
        let out = a.subtract(&b, 0);
        assert_eq!(out.doc_ids(), vec![3]);
    }

    #[test]
    fn subtract_is_sentence_precise_at_sentence_level() {
        let a = set(vec![m(1, SentenceRef::Id(0)), m(1, SentenceRef::Id(3))]);
        let b = set(vec![m(1, SentenceRef::Id(3))]);
        let out = a.subtract(&b, 0);
        assert_eq!(out.len(), 1);
        assert_eq!(out.iter().next().unwrap().sentence, SentenceRef::Id(0));
    }
}
