//! Abstract syntax tree for corpus queries.

mod condition;
mod fmt;
mod query;
mod span;

pub use condition::{
    AstPath, Condition, DateValue, DurationValue, NerType, Target, TemporalOp,
};
pub use query::{CountSpec, FnKind, Granularity, OrderSpec, Query, SelectItem, SortDir};
pub use span::{Span, merge_spans};
