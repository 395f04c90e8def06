//! Variable bindings captured from matches.

use crate::ast::NerType;
use chrono::{NaiveDateTime, Timelike};
use indexmap::IndexMap;
use smol_str::SmolStr;

/// A value bound to a query variable.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// A plain term or surface string.
    Str(SmolStr),
    /// An entity surface form with its category.
    Entity(NerType, SmolStr),
    /// A temporal value.
    Date(NaiveDateTime),
}

impl Value {
    /// Renders the value for projection and comparison. Dates render as
    /// `YYYY-MM-DD` when they carry no time of day.
    pub fn render(&self) -> String {
        match self {
            Value::Str(s) => s.to_string(),
            Value::Entity(_, surface) => surface.to_string(),
            Value::Date(dt) => {
                if dt.hour() == 0 && dt.minute() == 0 && dt.second() == 0 {
                    dt.date().to_string()
                } else {
                    dt.format("%Y-%m-%dT%H:%M:%S").to_string()
                }
            }
        }
    }
}

/// Per-match map from variable name to bound values, in binding order.
///
/// A variable can hold several values within one match (two PERSON spans in
/// the same sentence); the result generator expands them into rows.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BindingContext {
    values: IndexMap<SmolStr, Vec<Value>>,
}

impl BindingContext {
    /// Creates an empty context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends one value to a variable, ignoring exact duplicates.
    pub fn bind_one(&mut self, name: &SmolStr, value: Value) {
        let list = self.values.entry(name.clone()).or_default();
        if !list.contains(&value) {
            list.push(value);
        }
    }

    /// Appends many values to a variable, ignoring exact duplicates.
    pub fn bind_many(&mut self, name: &SmolStr, values: impl IntoIterator<Item = Value>) {
        for value in values {
            self.bind_one(name, value);
        }
    }

    /// Replaces a variable's values outright.
    pub fn set(&mut self, name: &SmolStr, values: Vec<Value>) {
        self.values.insert(name.clone(), values);
    }

    /// The values bound to `name`.
    pub fn get(&self, name: &str) -> Option<&[Value]> {
        self.values.get(name).map(Vec::as_slice)
    }

    /// True when `name` has at least one value.
    pub fn has(&self, name: &str) -> bool {
        self.values.get(name).is_some_and(|v| !v.is_empty())
    }

    /// Merges another context into this one; `other` wins on conflict.
    pub fn merge(&mut self, other: &BindingContext) {
        for (name, values) in &other.values {
            self.values.insert(name.clone(), values.clone());
        }
    }

    /// Variable names in binding order.
    pub fn names(&self) -> impl Iterator<Item = &SmolStr> {
        self.values.keys()
    }

    /// All entries in binding order.
    pub fn iter(&self) -> impl Iterator<Item = (&SmolStr, &Vec<Value>)> {
        self.values.iter()
    }

    /// True when nothing is bound.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// A canonical, order-independent snapshot used for match equality and
    /// hashing: names sorted, values rendered and sorted.
    pub fn frozen(&self) -> Vec<(SmolStr, Vec<String>)> {
        let mut entries: Vec<(SmolStr, Vec<String>)> = self
            .values
            .iter()
            .map(|(name, values)| {
                let mut rendered: Vec<String> = values.iter().map(Value::render).collect();
                rendered.sort();
                (name.clone(), rendered)
            })
            .collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        entries
    }
}
