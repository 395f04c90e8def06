//! Value extractors: turning bound values and positions into column text.
//!
//! Extractors are registered per [`ColumnType`]; the result generator picks
//! one by the select item's inferred type. Most types project the bound
//! value's surface string; snippets fetch text from the [`TextProvider`] and
//! build a highlighted context window.

use crate::engine::EngineError;
use crate::engine::bindings::Value;
use crate::engine::matches::SentenceRef;
use crate::engine::result::ColumnType;
use crate::index::{DocId, Position, TextProvider};
use indexmap::IndexMap;
use std::collections::HashMap;

/// What an extractor reads from.
pub(crate) enum ExtractSource<'a> {
    /// One bound value of the projected variable.
    Value(&'a Value),
    /// The witnessing positions of the projected variable within one match.
    Spans {
        doc: DocId,
        sentence: SentenceRef,
        positions: &'a [Position],
    },
}

/// Extraction inputs handed to an extractor.
pub(crate) struct ExtractContext<'a> {
    pub source: ExtractSource<'a>,
    pub text: &'a dyn TextProvider,
    pub options: &'a IndexMap<String, String>,
}

/// Converts one extraction source into column text.
pub(crate) trait ValueExtractor: Send + Sync {
    fn extract(&self, ctx: &ExtractContext<'_>) -> Result<String, EngineError>;
}

/// Extractor registry keyed by column type.
pub(crate) struct ExtractorRegistry {
    extractors: HashMap<ColumnType, Box<dyn ValueExtractor>>,
}

impl ExtractorRegistry {
    /// Builds the default registry. `default_snippet_length` is the context
    /// window used when a snippet column does not specify one.
    pub(crate) fn with_defaults(default_snippet_length: usize) -> Self {
        let mut extractors: HashMap<ColumnType, Box<dyn ValueExtractor>> = HashMap::new();
        for ty in [
            ColumnType::Person,
            ColumnType::Location,
            ColumnType::Term,
            ColumnType::Relation,
            ColumnType::Category,
            ColumnType::Date,
        ] {
            extractors.insert(ty, Box::new(SurfaceExtractor));
        }
        extractors.insert(
            ColumnType::Snippet,
            Box::new(SnippetExtractor {
                default_length: default_snippet_length,
            }),
        );
        Self { extractors }
    }

    /// The extractor for a column type; COUNT aggregates are computed by the
    /// result generator and have no extractor.
    pub(crate) fn get(&self, ty: ColumnType) -> Option<&dyn ValueExtractor> {
        self.extractors.get(&ty).map(Box::as_ref)
    }
}

/// Projects the bound value's surface string; dates render in ISO form.
struct SurfaceExtractor;

impl ValueExtractor for SurfaceExtractor {
    fn extract(&self, ctx: &ExtractContext<'_>) -> Result<String, EngineError> {
        match &ctx.source {
            ExtractSource::Value(value) => Ok(value.render()),
            ExtractSource::Spans { .. } => Ok(String::new()),
        }
    }
}

/// Builds highlighted context windows around matched spans.
struct SnippetExtractor {
    default_length: usize,
}

impl ValueExtractor for SnippetExtractor {
    fn extract(&self, ctx: &ExtractContext<'_>) -> Result<String, EngineError> {
        let ExtractSource::Spans {
            doc,
            sentence,
            positions,
        } = &ctx.source
        else {
            return Ok(String::new());
        };

        let length = ctx
            .options
            .get("length")
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or(self.default_length);

        let text = match sentence {
            SentenceRef::Id(id) => ctx.text.sentence(*doc, *id),
            SentenceRef::Wildcard => ctx.text.document(*doc),
        };
        let Some(text) = text else {
            return Ok(String::new());
        };

        let snippets: Vec<String> = merge_spans(positions)
            .into_iter()
            .map(|(begin, end)| highlight(&text, begin, end, length))
            .collect();
        Ok(snippets.join(" ... "))
    }
}

/// Merges overlapping spans: `a` and `b` overlap when `a.end >= b.begin`
/// within the same unit. The merged span is the envelope of both.
fn merge_spans(positions: &[Position]) -> Vec<(usize, usize)> {
    let mut spans: Vec<(usize, usize)> = positions
        .iter()
        .map(|p| (p.begin as usize, p.end as usize))
        .collect();
    spans.sort_unstable();

    let mut merged: Vec<(usize, usize)> = Vec::new();
    for (begin, end) in spans {
        match merged.last_mut() {
            Some((_, last_end)) if *last_end >= begin => {
                *last_end = (*last_end).max(end);
            }
            _ => merged.push((begin, end)),
        }
    }
    merged
}

/// Extracts `[begin-length, end+length]` from `text`, wrapping the matched
/// span in `*…*` markers. Offsets snap outward to char boundaries.
fn highlight(text: &str, begin: usize, end: usize, length: usize) -> String {
    let begin = floor_char(text, begin.min(text.len()));
    let end = ceil_char(text, end.min(text.len()));
    let window_start = floor_char(text, begin.saturating_sub(length));
    let window_end = ceil_char(text, (end + length).min(text.len()));

    format!(
        "{}*{}*{}",
        &text[window_start..begin],
        &text[begin..end],
        &text[end..window_end]
    )
}

fn floor_char(text: &str, mut idx: usize) -> usize {
    while idx > 0 && !text.is_char_boundary(idx) {
        idx -= 1;
    }
    idx
}

fn ceil_char(text: &str, mut idx: usize) -> usize {
    while idx < text.len() && !text.is_char_boundary(idx) {
        idx += 1;
    }
    idx
}
