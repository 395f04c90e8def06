//! Diagnostic model for the syntax and validation phases.
//!
//! Lexer, parser, and validator all report through [`Diag`]: a severity, a
//! message, labeled source spans, and a stable code (`Q…` for syntax, `V…`
//! for validation). Diags are rendered into [`miette::Report`]s with source
//! context at the API boundary.

use crate::ast::Span;
use miette::{Diagnostic, LabeledSpan, Report, Severity};
use std::fmt;

/// Severity of a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagSeverity {
    /// Prevents the query from running.
    Error,
    /// Suspicious but non-fatal; also forwarded to the tracing sink.
    Warning,
}

impl fmt::Display for DiagSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiagSeverity::Error => f.write_str("error"),
            DiagSeverity::Warning => f.write_str("warning"),
        }
    }
}

/// A labeled span inside a diagnostic. The first label attached to a [`Diag`]
/// is rendered as the primary location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiagLabel {
    pub span: Span,
    pub message: String,
}

/// A structured diagnostic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diag {
    pub severity: DiagSeverity,
    pub message: String,
    pub code: Option<String>,
    pub labels: Vec<DiagLabel>,
    pub help: Option<String>,
}

impl Diag {
    /// Creates an error diagnostic.
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            severity: DiagSeverity::Error,
            message: message.into(),
            code: None,
            labels: Vec::new(),
            help: None,
        }
    }

    /// Creates a warning diagnostic.
    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            severity: DiagSeverity::Warning,
            ..Self::error(message)
        }
    }

    /// Attaches a labeled span. The first label is the primary one.
    pub fn with_label(mut self, span: Span, message: impl Into<String>) -> Self {
        self.labels.push(DiagLabel {
            span,
            message: message.into(),
        });
        self
    }

    /// Sets the stable diagnostic code.
    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    /// Sets the help text.
    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.help = Some(help.into());
        self
    }

    /// True when this diagnostic is an error.
    pub fn is_error(&self) -> bool {
        self.severity == DiagSeverity::Error
    }
}

/// Renders diagnostics as miette reports against the query text.
///
/// Spans are clamped to the source bounds so a buggy span can never panic
/// the renderer.
pub fn render_reports(diags: &[Diag], source: &str) -> Vec<Report> {
    diags.iter().map(|d| render_report(d, source)).collect()
}

/// Renders one diagnostic as a miette report with the query as source code.
pub fn render_report(diag: &Diag, source: &str) -> Report {
    let labels = diag
        .labels
        .iter()
        .enumerate()
        .map(|(i, label)| {
            let span = clamp(&label.span, source.len());
            let range = (span.start, span.end - span.start);
            if i == 0 {
                LabeledSpan::new_primary_with_span(Some(label.message.clone()), range)
            } else {
                LabeledSpan::new_with_span(Some(label.message.clone()), range)
            }
        })
        .collect();

    Report::new(Rendered {
        message: diag.message.clone(),
        severity: match diag.severity {
            DiagSeverity::Error => Severity::Error,
            DiagSeverity::Warning => Severity::Warning,
        },
        code: diag.code.clone(),
        help: diag.help.clone(),
        labels,
    })
    .with_source_code(source.to_string())
}

fn clamp(span: &Span, len: usize) -> Span {
    let start = span.start.min(len);
    start..span.end.min(len).max(start)
}

#[derive(Debug)]
struct Rendered {
    message: String,
    severity: Severity,
    code: Option<String>,
    help: Option<String>,
    labels: Vec<LabeledSpan>,
}

impl fmt::Display for Rendered {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for Rendered {}

impl Diagnostic for Rendered {
    fn severity(&self) -> Option<Severity> {
        Some(self.severity)
    }

    fn code<'a>(&'a self) -> Option<Box<dyn fmt::Display + 'a>> {
        self.code
            .as_ref()
            .map(|c| Box::new(c) as Box<dyn fmt::Display>)
    }

    fn help<'a>(&'a self) -> Option<Box<dyn fmt::Display + 'a>> {
        self.help
            .as_ref()
            .map(|h| Box::new(h) as Box<dyn fmt::Display>)
    }

    fn labels(&self) -> Option<Box<dyn Iterator<Item = LabeledSpan> + '_>> {
        if self.labels.is_empty() {
            None
        } else {
            Some(Box::new(self.labels.clone().into_iter()))
        }
    }
}
