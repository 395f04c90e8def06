//! Query AST: the root node produced by the parser.

use crate::ast::{Condition, Span};
use smol_str::SmolStr;

/// The unit of a match: whole documents, or individual sentences.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Granularity {
    /// Matches are keyed by document only.
    Document,
    /// Matches are keyed by `(document, sentence)`. `window` relaxes joins:
    /// two sentence matches in the same document combine when their sentence
    /// ids differ by at most `window`.
    Sentence { window: u32 },
}

impl Default for Granularity {
    fn default() -> Self {
        Granularity::Document
    }
}

impl Granularity {
    /// The sentence-join window; zero at document granularity.
    pub fn window(self) -> u32 {
        match self {
            Granularity::Document => 0,
            Granularity::Sentence { window } => window,
        }
    }
}

/// Sort direction for an ORDER BY key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDir {
    Asc,
    Desc,
}

/// One ORDER BY key: a field name and a direction.
///
/// The field is either a selected variable (written `?name`), a select-item
/// alias, or the pseudo-column `document_id`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderSpec {
    pub field: SmolStr,
    pub dir: SortDir,
    pub span: Span,
}

/// The COUNT aggregate's argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CountSpec {
    /// `COUNT(*)` — rows after filtering.
    Matches,
    /// `COUNT(DOCUMENTS)` — distinct document ids.
    Documents,
    /// `COUNT(UNIQUE ?v)` — distinct values bound to the variable.
    Unique(SmolStr),
}

/// A column function appearing in the SELECT list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FnKind {
    /// `SNIPPET(?v[, length])` — highlighted context window around matches.
    Snippet {
        var: SmolStr,
        length: Option<u32>,
    },
    /// `DATE(?v)` — the bound date rendered in ISO form.
    Date { var: SmolStr },
    /// `PERSON(?v)` — the bound entity's surface form.
    Person { var: SmolStr },
    /// `COUNT(...)` — aggregate over the final match set.
    Count(CountSpec),
}

impl FnKind {
    /// The variable consumed by this function, if any.
    pub fn consumed_variable(&self) -> Option<&SmolStr> {
        match self {
            FnKind::Snippet { var, .. } | FnKind::Date { var } | FnKind::Person { var } => {
                Some(var)
            }
            FnKind::Count(CountSpec::Unique(var)) => Some(var),
            FnKind::Count(_) => None,
        }
    }

    /// The canonical function name.
    pub fn name(&self) -> &'static str {
        match self {
            FnKind::Snippet { .. } => "SNIPPET",
            FnKind::Date { .. } => "DATE",
            FnKind::Person { .. } => "PERSON",
            FnKind::Count(_) => "COUNT",
        }
    }
}

/// One item of the SELECT list.
#[derive(Debug, Clone, PartialEq)]
pub enum SelectItem {
    /// `*` — expands to `document_id`, `sentence_id` at sentence granularity,
    /// and every variable the query produces.
    Wildcard { span: Span },
    /// A bare variable reference, projecting its bound value.
    Variable {
        name: SmolStr,
        alias: Option<SmolStr>,
        span: Span,
    },
    /// A column function.
    Function {
        kind: FnKind,
        alias: Option<SmolStr>,
        span: Span,
    },
}

impl SelectItem {
    /// Returns the source span of this item.
    pub fn span(&self) -> &Span {
        match self {
            SelectItem::Wildcard { span }
            | SelectItem::Variable { span, .. }
            | SelectItem::Function { span, .. } => span,
        }
    }

    /// The alias, if one was written with `AS`.
    pub fn alias(&self) -> Option<&SmolStr> {
        match self {
            SelectItem::Wildcard { .. } => None,
            SelectItem::Variable { alias, .. } | SelectItem::Function { alias, .. } => {
                alias.as_ref()
            }
        }
    }

    /// Variables this item consumes.
    pub fn consumed_variables(&self) -> Vec<&SmolStr> {
        match self {
            SelectItem::Wildcard { .. } => Vec::new(),
            SelectItem::Variable { name, .. } => vec![name],
            SelectItem::Function { kind, .. } => kind.consumed_variable().into_iter().collect(),
        }
    }

    /// True for COUNT items, which aggregate instead of projecting per row.
    pub fn is_aggregate(&self) -> bool {
        matches!(
            self,
            SelectItem::Function {
                kind: FnKind::Count(_),
                ..
            }
        )
    }
}

/// A parsed query: the AST root.
///
/// Everything the engine needs is here; the AST together with the variable
/// registry produced by validation is the complete execution plan input.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    /// The corpus named in FROM.
    pub source: SmolStr,
    /// SELECT items in declared order.
    pub select: Vec<SelectItem>,
    /// The WHERE predicate tree; `None` selects the whole corpus.
    pub condition: Option<Condition>,
    /// Match unit; document-level when not written.
    pub granularity: Granularity,
    /// ORDER BY keys in declared order.
    pub order_by: Vec<OrderSpec>,
    /// Row cap.
    pub limit: Option<u64>,
    /// Span of the whole query.
    pub span: Span,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn granularity_window() {
        assert_eq!(Granularity::Document.window(), 0);
        assert_eq!(Granularity::Sentence { window: 2 }.window(), 2);
    }

    #[test]
    fn select_item_consumed_variables() {
        let item = SelectItem::Function {
            kind: FnKind::Snippet {
                var: "p".into(),
                length: Some(45),
            },
            alias: None,
            span: 0..0,
        };
        assert_eq!(item.consumed_variables(), vec![&SmolStr::new("p")]);
        assert!(!item.is_aggregate());

        let count = SelectItem::Function {
            kind: FnKind::Count(CountSpec::Documents),
            alias: None,
            span: 0..0,
        };
        assert!(count.is_aggregate());
        assert!(count.consumed_variables().is_empty());
    }
}
