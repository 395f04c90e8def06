//! Condition evaluation against the inverted indexes.
//!
//! The evaluator walks the condition tree and produces a [`MatchSet`] per
//! node. Leaves consult one index each; conjunctions evaluate their children
//! cheapest-first (by index cardinality estimates) and intersect with
//! binding merge, disjunctions union in declared order, and negation
//! complements within the enclosing conjunction's candidates — or against
//! the whole corpus at the root. Candidate sets are also pushed down into
//! leaves as a document filter, so later children of a conjunction never
//! materialize postings outside the surviving documents.

use crate::ast::{AstPath, Condition, Granularity, NerType, Target, TemporalOp};
use crate::engine::bindings::Value;
use crate::engine::matches::{DocSentenceMatch, MatchKey, MatchSet, SentenceRef};
use crate::engine::{CancellationToken, EngineError};
use crate::index::{DocId, IndexHandle, IndexKind, IndexManager, Posting};
use smol_str::SmolStr;
use std::collections::BTreeMap;
use std::time::{Duration, Instant};

/// One query's evaluation pass over shared, read-only indexes.
pub(crate) struct Evaluator<'a> {
    indexes: &'a dyn IndexManager,
    granularity: Granularity,
    source: SmolStr,
    cancel: &'a CancellationToken,
    deadline: Option<(Instant, Duration)>,
}

impl<'a> Evaluator<'a> {
    pub(crate) fn new(
        indexes: &'a dyn IndexManager,
        granularity: Granularity,
        cancel: &'a CancellationToken,
        deadline: Option<(Instant, Duration)>,
    ) -> Self {
        Self {
            indexes,
            granularity,
            source: SmolStr::new(indexes.name()),
            cancel,
            deadline,
        }
    }

    /// Evaluates a query's root condition; no condition selects the corpus.
    pub(crate) fn evaluate_root(
        &self,
        condition: Option<&Condition>,
    ) -> Result<MatchSet, EngineError> {
        match condition {
            Some(condition) => self.eval(condition, &AstPath::root(), None),
            None => self.universe(),
        }
    }

    fn eval(
        &self,
        condition: &Condition,
        path: &AstPath,
        candidates: Option<&MatchSet>,
    ) -> Result<MatchSet, EngineError> {
        let docs = candidates.map(MatchSet::doc_ids);
        let docs = docs.as_deref();

        match condition {
            Condition::Contains { terms, binds, .. } => {
                self.eval_contains(terms, binds.as_ref(), path, docs)
            }
            Condition::Ner { label, target, .. } => {
                self.eval_ner(label, target.as_ref(), path, docs)
            }
            Condition::Pos { tag, target, .. } => {
                self.eval_pos(tag, target.as_ref(), path, docs)
            }
            Condition::Temporal { target, op, .. } => self.eval_temporal(target, op, path, docs),
            Condition::Dependency {
                governor,
                relation,
                dependent,
                ..
            } => self.eval_dependency(governor, relation, dependent, path, docs),
            Condition::And { children, .. } => self.eval_and(children, path, candidates),
            Condition::Or { children, .. } => self.eval_or(children, path, candidates),
            Condition::Not { child, .. } => self.eval_not(child, path, candidates),
        }
    }

    // ------------------------------------------------------------------
    // Combinators
    // ------------------------------------------------------------------

    fn eval_and(
        &self,
        children: &[Condition],
        path: &AstPath,
        candidates: Option<&MatchSet>,
    ) -> Result<MatchSet, EngineError> {
        // Cheapest child first; ties keep declaration order.
        let estimates: Vec<u64> = children.iter().map(|c| self.estimate(c)).collect();
        let mut order: Vec<usize> = (0..children.len()).collect();
        order.sort_by_key(|&i| (estimates[i], i));

        let window = self.granularity.window();
        let mut acc: Option<MatchSet> = None;

        for i in order {
            let constraint = acc.as_ref().or(candidates);
            let result = self.eval(&children[i], &path.child(i), constraint)?;
            let next = match acc {
                None => result,
                Some(prev) => prev.intersect(&result, window),
            };
            self.checkpoint()?;
            if next.is_empty() {
                return Ok(MatchSet::new());
            }
            acc = Some(next);
        }

        Ok(acc.unwrap_or_default())
    }

    fn eval_or(
        &self,
        children: &[Condition],
        path: &AstPath,
        candidates: Option<&MatchSet>,
    ) -> Result<MatchSet, EngineError> {
        let mut out = MatchSet::new();
        for (i, child) in children.iter().enumerate() {
            let result = self.eval(child, &path.child(i), candidates)?;
            out = out.union(&result);
            self.checkpoint()?;
        }
        Ok(out)
    }

    /// Complement within the enclosing conjunction's candidates; a root
    /// negation complements against the corpus's documents.
    fn eval_not(
        &self,
        child: &Condition,
        path: &AstPath,
        candidates: Option<&MatchSet>,
    ) -> Result<MatchSet, EngineError> {
        let excluded = self.eval(child, &path.child(0), candidates)?;
        let base = match candidates {
            Some(set) => set.clone(),
            None => self.universe()?,
        };
        self.checkpoint()?;
        Ok(base.subtract(&excluded, self.granularity.window()))
    }

    // ------------------------------------------------------------------
    // Leaves
    // ------------------------------------------------------------------

    fn eval_contains(
        &self,
        terms: &[SmolStr],
        binds: Option<&SmolStr>,
        path: &AstPath,
        docs: Option<&[DocId]>,
    ) -> Result<MatchSet, EngineError> {
        let mut builder = MatchBuilder::new(self);
        for term in terms {
            let key = SmolStr::new(term.to_lowercase());
            let postings = self.lookup(IndexKind::Term, &key, path, docs)?;
            for posting in postings {
                let value = binds.map(|_| Value::Str(posting.term.clone()));
                builder.add(binds.unwrap_or(&key), posting, binds, value);
            }
        }
        Ok(builder.finish())
    }

    fn eval_ner(
        &self,
        label: &SmolStr,
        target: Option<&Target>,
        path: &AstPath,
        docs: Option<&[DocId]>,
    ) -> Result<MatchSet, EngineError> {
        let key = SmolStr::new(label.to_ascii_uppercase());
        let ner_type = NerType::parse(label).ok_or_else(|| EngineError::Execution {
            index: IndexKind::Ner,
            path: path.to_string(),
            cause: format!("entity type `{label}` escaped validation"),
        })?;

        let postings = self.lookup(IndexKind::Ner, &key, path, docs)?;
        let mut builder = MatchBuilder::new(self);
        for posting in postings {
            match target {
                Some(Target::Literal(literal)) => {
                    if posting.term.eq_ignore_ascii_case(literal) {
                        builder.add(&key, posting, None, None);
                    }
                }
                Some(Target::Variable(var)) => {
                    let value = Value::Entity(ner_type, posting.term.clone());
                    builder.add(var, posting, Some(var), Some(value));
                }
                None => builder.add(&key, posting, None, None),
            }
        }
        Ok(builder.finish())
    }

    fn eval_pos(
        &self,
        tag: &SmolStr,
        target: Option<&Target>,
        path: &AstPath,
        docs: Option<&[DocId]>,
    ) -> Result<MatchSet, EngineError> {
        let key = SmolStr::new(tag.to_ascii_uppercase());
        let postings = self.lookup(IndexKind::Pos, &key, path, docs)?;
        let mut builder = MatchBuilder::new(self);
        for posting in postings {
            match target {
                Some(Target::Literal(literal)) => {
                    if posting.term.eq_ignore_ascii_case(literal) {
                        builder.add(&key, posting, None, None);
                    }
                }
                Some(Target::Variable(var)) => {
                    let value = Value::Str(posting.term.clone());
                    builder.add(var, posting, Some(var), Some(value));
                }
                None => builder.add(&key, posting, None, None),
            }
        }
        Ok(builder.finish())
    }

    fn eval_temporal(
        &self,
        target: &Target,
        op: &TemporalOp,
        path: &AstPath,
        docs: Option<&[DocId]>,
    ) -> Result<MatchSet, EngineError> {
        self.checkpoint()?;
        let handle = self.handle(IndexKind::Temporal, path)?;
        let postings = handle.scan().map_err(|e| EngineError::Execution {
            index: IndexKind::Temporal,
            path: path.to_string(),
            cause: e.to_string(),
        })?;

        let key = SmolStr::new("date");
        let mut builder = MatchBuilder::new(self);
        for posting in postings {
            if !doc_allowed(docs, posting.position.doc_id) {
                continue;
            }
            let Some(date) = posting.position.date else {
                continue;
            };
            if !op.matches(date) {
                continue;
            }
            match target {
                Target::Literal(literal) => {
                    if posting.term == *literal {
                        builder.add(&key, posting, None, None);
                    }
                }
                Target::Variable(var) => {
                    builder.add(var, posting, Some(var), Some(Value::Date(date)));
                }
            }
        }
        Ok(builder.finish())
    }

    fn eval_dependency(
        &self,
        governor: &Target,
        relation: &SmolStr,
        dependent: &Target,
        path: &AstPath,
        docs: Option<&[DocId]>,
    ) -> Result<MatchSet, EngineError> {
        let key = SmolStr::new(relation.to_lowercase());
        let postings = self.lookup(IndexKind::Dependency, &key, path, docs)?;

        // When both ends are variables, the pair of values is correlated per
        // triple: each triple becomes its own match, so two triples in one
        // sentence never cross-combine into rows that no triple witnessed.
        let correlated =
            governor.variable().is_some() && dependent.variable().is_some();

        let mut builder = MatchBuilder::new(self);
        let mut out = MatchSet::new();

        for posting in postings {
            let dependent_term = posting.dependent.clone().unwrap_or_default();

            if let Target::Literal(literal) = governor
                && !posting.term.eq_ignore_ascii_case(literal)
            {
                continue;
            }
            if let Target::Literal(literal) = dependent
                && !dependent_term.eq_ignore_ascii_case(literal)
            {
                continue;
            }

            // Unbound variables act as wildcards and bind; an already-bound
            // variable is narrowed later by the conjunction's binding merge.
            let mut bindings = Vec::new();
            if let Target::Variable(var) = governor {
                bindings.push((var.clone(), Value::Str(posting.term.clone())));
            }
            if let Target::Variable(var) = dependent {
                bindings.push((var.clone(), Value::Str(dependent_term.clone())));
            }

            if correlated {
                let sentence = self.sentence_ref(posting.position.sentence_id);
                let mut m = DocSentenceMatch::new(
                    posting.position.doc_id,
                    sentence,
                    self.source.clone(),
                );
                m.add_position(&key, posting.position);
                for (var, value) in bindings {
                    m.bindings.bind_one(&var, value);
                }
                out.insert(m);
            } else {
                builder.add_multi(&key, posting, bindings);
            }
        }

        if correlated {
            Ok(out)
        } else {
            Ok(builder.finish())
        }
    }

    // ------------------------------------------------------------------
    // Support
    // ------------------------------------------------------------------

    /// Every document of the corpus, as document-level matches.
    fn universe(&self) -> Result<MatchSet, EngineError> {
        self.checkpoint()?;
        let path = AstPath::root();
        let handle = self.handle(IndexKind::Metadata, &path)?;
        let docs = handle.documents().map_err(|e| EngineError::Execution {
            index: IndexKind::Metadata,
            path: path.to_string(),
            cause: e.to_string(),
        })?;

        let mut out = MatchSet::new();
        for doc in docs {
            out.insert(DocSentenceMatch::new(
                doc,
                SentenceRef::Wildcard,
                self.source.clone(),
            ));
        }
        Ok(out)
    }

    fn handle(
        &self,
        kind: IndexKind,
        path: &AstPath,
    ) -> Result<&'a dyn IndexHandle, EngineError> {
        self.indexes
            .get_index(kind)
            .ok_or_else(|| EngineError::MissingIndex {
                index: kind,
                path: path.to_string(),
            })
    }

    fn lookup(
        &self,
        kind: IndexKind,
        key: &str,
        path: &AstPath,
        docs: Option<&[DocId]>,
    ) -> Result<Vec<Posting>, EngineError> {
        self.checkpoint()?;
        let handle = self.handle(kind, path)?;
        let postings = handle.lookup(key).map_err(|e| EngineError::Execution {
            index: kind,
            path: path.to_string(),
            cause: e.to_string(),
        })?;
        Ok(postings
            .into_iter()
            .filter(|p| doc_allowed(docs, p.position.doc_id))
            .collect())
    }

    /// Checked before every index access and after every combinator step.
    fn checkpoint(&self) -> Result<(), EngineError> {
        if self.cancel.is_cancelled() {
            return Err(EngineError::Cancelled);
        }
        if let Some((deadline, budget)) = self.deadline
            && Instant::now() > deadline
        {
            return Err(EngineError::Timeout(budget));
        }
        Ok(())
    }

    fn sentence_ref(&self, sentence: crate::index::SentenceId) -> SentenceRef {
        match self.granularity {
            Granularity::Document => SentenceRef::Wildcard,
            Granularity::Sentence { .. } => SentenceRef::Id(sentence),
        }
    }

    /// Cardinality estimate used to order conjunction evaluation.
    fn estimate(&self, condition: &Condition) -> u64 {
        let by_key = |kind: IndexKind, key: &str| {
            self.indexes
                .get_index(kind)
                .map_or(0, |handle| handle.estimate(key))
        };

        match condition {
            Condition::Contains { terms, .. } => terms
                .iter()
                .map(|t| by_key(IndexKind::Term, &t.to_lowercase()))
                .sum(),
            Condition::Ner { label, .. } => {
                by_key(IndexKind::Ner, &label.to_ascii_uppercase())
            }
            Condition::Pos { tag, .. } => by_key(IndexKind::Pos, &tag.to_ascii_uppercase()),
            Condition::Temporal { .. } => by_key(IndexKind::Temporal, ""),
            Condition::Dependency { relation, .. } => {
                by_key(IndexKind::Dependency, &relation.to_lowercase())
            }
            Condition::And { children, .. } => children
                .iter()
                .map(|c| self.estimate(c))
                .min()
                .unwrap_or(0),
            Condition::Or { children, .. } => children
                .iter()
                .map(|c| self.estimate(c))
                .fold(0u64, u64::saturating_add),
            Condition::Not { .. } => by_key(IndexKind::Metadata, ""),
        }
    }
}

fn doc_allowed(docs: Option<&[DocId]>, doc: DocId) -> bool {
    match docs {
        Some(docs) => docs.binary_search(&doc).is_ok(),
        None => true,
    }
}

/// Accumulates postings into one match per `(doc, sentence)` coordinate, so
/// several spans in the same unit become one multi-valued match.
struct MatchBuilder<'a, 'b> {
    evaluator: &'b Evaluator<'a>,
    matches: BTreeMap<MatchKey, DocSentenceMatch>,
}

impl<'a, 'b> MatchBuilder<'a, 'b> {
    fn new(evaluator: &'b Evaluator<'a>) -> Self {
        Self {
            evaluator,
            matches: BTreeMap::new(),
        }
    }

    fn add(
        &mut self,
        position_key: &SmolStr,
        posting: Posting,
        var: Option<&SmolStr>,
        value: Option<Value>,
    ) {
        let bindings = match (var, value) {
            (Some(var), Some(value)) => vec![(var.clone(), value)],
            _ => Vec::new(),
        };
        self.add_multi(position_key, posting, bindings);
    }

    fn add_multi(
        &mut self,
        position_key: &SmolStr,
        posting: Posting,
        bindings: Vec<(SmolStr, Value)>,
    ) {
        let sentence = self.evaluator.sentence_ref(posting.position.sentence_id);
        let key = MatchKey {
            doc: posting.position.doc_id,
            sentence,
        };
        let entry = self.matches.entry(key).or_insert_with(|| {
            DocSentenceMatch::new(key.doc, sentence, self.evaluator.source.clone())
        });
        entry.add_position(position_key, posting.position);
        for (var, value) in bindings {
            entry.bindings.bind_one(&var, value);
        }
    }

    fn finish(self) -> MatchSet {
        let mut out = MatchSet::new();
        for (_, m) in self.matches {
            out.insert(m);
        }
        out
    }
}
