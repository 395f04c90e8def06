//! Per-query variable registry.
//!
//! The registry is the validator's symbol table: for every `?var` it records
//! the inferred domain type, the condition sites able to bind it, and the
//! sites that consume it. It is built once per query and discarded with the
//! rest of the per-query state.

use crate::ast::{AstPath, NerType};
use indexmap::IndexMap;
use smol_str::SmolStr;
use std::fmt;

/// Domain type of a query variable, inferred from its producers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VarType {
    /// Bound by a named-entity predicate.
    Entity,
    /// Bound by a temporal predicate.
    Date,
    /// Bound by a term, part-of-speech, or dependency predicate.
    Term,
}

impl fmt::Display for VarType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VarType::Entity => f.write_str("entity"),
            VarType::Date => f.write_str("date"),
            VarType::Term => f.write_str("term"),
        }
    }
}

/// A site that consumes a variable's bound value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsumerSite {
    /// SELECT item at the given index.
    Select(usize),
    /// ORDER BY key at the given index.
    OrderBy(usize),
    /// A condition that filters on an already-bound variable.
    Condition(AstPath),
}

/// Everything known about one query variable.
#[derive(Debug, Clone)]
pub struct VarInfo {
    pub name: SmolStr,
    pub ty: VarType,
    /// Entity labels seen across producers; meaningful for `Entity` only.
    pub ner_labels: Vec<NerType>,
    /// Condition sites able to bind this variable.
    pub producers: Vec<AstPath>,
    /// Sites that read the bound value.
    pub consumers: Vec<ConsumerSite>,
}

/// A producer declared a type that disagrees with an earlier producer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeConflict {
    pub name: SmolStr,
    pub expected: VarType,
    pub found: VarType,
}

/// Symbol table for one query's variables, in first-production order.
#[derive(Debug, Clone, Default)]
pub struct VariableRegistry {
    vars: IndexMap<SmolStr, VarInfo>,
}

impl VariableRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a condition that can bind `name` with the given type.
    ///
    /// Entity producers with different labels unify: the variable stays an
    /// entity and accumulates the labels. A producer whose type disagrees
    /// with the established one is a conflict.
    pub fn record_producer(
        &mut self,
        name: &SmolStr,
        ty: VarType,
        label: Option<NerType>,
        path: AstPath,
    ) -> Result<(), TypeConflict> {
        match self.vars.get_mut(name) {
            Some(info) => {
                if info.ty != ty {
                    return Err(TypeConflict {
                        name: name.clone(),
                        expected: info.ty,
                        found: ty,
                    });
                }
                if let Some(label) = label
                    && !info.ner_labels.contains(&label)
                {
                    info.ner_labels.push(label);
                }
                info.producers.push(path);
                Ok(())
            }
            None => {
                self.vars.insert(
                    name.clone(),
                    VarInfo {
                        name: name.clone(),
                        ty,
                        ner_labels: label.into_iter().collect(),
                        producers: vec![path],
                        consumers: Vec::new(),
                    },
                );
                Ok(())
            }
        }
    }

    /// Records a site that consumes `name`. Unknown names are ignored; the
    /// validator reports them separately.
    pub fn record_consumer(&mut self, name: &SmolStr, site: ConsumerSite) {
        if let Some(info) = self.vars.get_mut(name) {
            info.consumers.push(site);
        }
    }

    /// Looks up a variable.
    pub fn get(&self, name: &str) -> Option<&VarInfo> {
        self.vars.get(name)
    }

    /// True when the variable has at least one producer.
    pub fn contains(&self, name: &str) -> bool {
        self.vars.contains_key(name)
    }

    /// Variable names in first-production order.
    pub fn names(&self) -> impl Iterator<Item = &SmolStr> {
        self.vars.keys()
    }

    /// All entries in first-production order.
    pub fn iter(&self) -> impl Iterator<Item = &VarInfo> {
        self.vars.values()
    }

    /// Number of registered variables.
    pub fn len(&self) -> usize {
        self.vars.len()
    }

    /// True when no variables are registered.
    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }
}
