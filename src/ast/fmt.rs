//! Canonical text rendering of the AST.
//!
//! `Display` for [`Query`] emits query text that parses back to an equal AST,
//! which is what the parser round-trip tests lean on. The rendering is
//! canonical, not source-preserving: sugar is normalized (a `CONTAINS [a, b]`
//! temporal becomes `BETWEEN`), default granularity is omitted, and literals
//! are always quoted.

use crate::ast::{
    Condition, CountSpec, FnKind, Granularity, OrderSpec, Query, SelectItem, SortDir, Target,
    TemporalOp,
};
use std::fmt;

fn write_string_literal(f: &mut fmt::Formatter<'_>, s: &str) -> fmt::Result {
    f.write_str("\"")?;
    for ch in s.chars() {
        match ch {
            '"' => f.write_str("\\\"")?,
            '\\' => f.write_str("\\\\")?,
            '\n' => f.write_str("\\n")?,
            '\t' => f.write_str("\\t")?,
            '\r' => f.write_str("\\r")?,
            _ => write!(f, "{ch}")?,
        }
    }
    f.write_str("\"")
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::Literal(s) => write_string_literal(f, s),
            Target::Variable(name) => write!(f, "?{name}"),
        }
    }
}

impl fmt::Display for TemporalOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TemporalOp::Before { value, inclusive } => {
                write!(f, "{} {}", if *inclusive { "<=" } else { "<" }, value.text)
            }
            TemporalOp::After { value, inclusive } => {
                write!(f, "{} {}", if *inclusive { ">=" } else { ">" }, value.text)
            }
            TemporalOp::On { value } => write!(f, "= {}", value.text),
            TemporalOp::Between { start, end } => {
                write!(f, "BETWEEN {} AND {}", start.text, end.text)
            }
            TemporalOp::Near { anchor, radius } => {
                write!(f, "NEAR {} RADIUS {}", anchor.text, radius.text)
            }
        }
    }
}

impl Condition {
    /// Binding strength used to decide parenthesization: higher binds tighter.
    fn precedence(&self) -> u8 {
        match self {
            Condition::Or { .. } => 0,
            Condition::And { .. } => 1,
            Condition::Not { .. } => 2,
            _ => 3,
        }
    }

    fn fmt_child(&self, child: &Condition, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if child.precedence() < self.precedence() {
            write!(f, "({child})")
        } else {
            write!(f, "{child}")
        }
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Condition::Contains { terms, binds, .. } => {
                f.write_str("CONTAINS(")?;
                for (i, term) in terms.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write_string_literal(f, term)?;
                }
                f.write_str(")")?;
                if let Some(var) = binds {
                    write!(f, " AS ?{var}")?;
                }
                Ok(())
            }
            Condition::Ner { label, target, .. } => {
                write!(f, "NER({}", label.to_ascii_uppercase())?;
                if let Some(target) = target {
                    write!(f, ", {target}")?;
                }
                f.write_str(")")
            }
            Condition::Pos { tag, target, .. } => {
                f.write_str("POS(")?;
                write_string_literal(f, tag)?;
                if let Some(target) = target {
                    write!(f, ", {target}")?;
                }
                f.write_str(")")
            }
            Condition::Temporal { target, op, .. } => write!(f, "DATE({target}, {op})"),
            Condition::Dependency {
                governor,
                relation,
                dependent,
                ..
            } => {
                write!(f, "DEP({governor}, ")?;
                write_string_literal(f, relation)?;
                write!(f, ", {dependent})")
            }
            Condition::And { children, .. } => {
                for (i, child) in children.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" AND ")?;
                    }
                    self.fmt_child(child, f)?;
                }
                Ok(())
            }
            Condition::Or { children, .. } => {
                for (i, child) in children.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" OR ")?;
                    }
                    self.fmt_child(child, f)?;
                }
                Ok(())
            }
            Condition::Not { child, .. } => {
                f.write_str("NOT ")?;
                self.fmt_child(child, f)
            }
        }
    }
}

impl fmt::Display for SelectItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SelectItem::Wildcard { .. } => f.write_str("*"),
            SelectItem::Variable { name, alias, .. } => {
                write!(f, "?{name}")?;
                if let Some(alias) = alias {
                    write!(f, " AS {alias}")?;
                }
                Ok(())
            }
            SelectItem::Function { kind, alias, .. } => {
                match kind {
                    FnKind::Snippet { var, length } => {
                        write!(f, "SNIPPET(?{var}")?;
                        if let Some(len) = length {
                            write!(f, ", {len}")?;
                        }
                        f.write_str(")")?;
                    }
                    FnKind::Date { var } => write!(f, "DATE(?{var})")?,
                    FnKind::Person { var } => write!(f, "PERSON(?{var})")?,
                    FnKind::Count(spec) => match spec {
                        CountSpec::Matches => f.write_str("COUNT(*)")?,
                        CountSpec::Documents => f.write_str("COUNT(DOCUMENTS)")?,
                        CountSpec::Unique(var) => write!(f, "COUNT(UNIQUE ?{var})")?,
                    },
                }
                if let Some(alias) = alias {
                    write!(f, " AS {alias}")?;
                }
                Ok(())
            }
        }
    }
}

impl fmt::Display for OrderSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let dir = match self.dir {
            SortDir::Asc => "ASC",
            SortDir::Desc => "DESC",
        };
        write!(f, "{} {dir}", self.field)
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SELECT ")?;
        for (i, item) in self.select.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{item}")?;
        }
        write!(f, " FROM {}", self.source)?;
        if let Some(condition) = &self.condition {
            write!(f, " WHERE {condition}")?;
        }
        match self.granularity {
            Granularity::Document => {}
            Granularity::Sentence { window: 0 } => f.write_str(" GRANULARITY SENTENCE")?,
            Granularity::Sentence { window } => {
                write!(f, " GRANULARITY SENTENCE {window}")?
            }
        }
        if !self.order_by.is_empty() {
            f.write_str(" ORDER BY ")?;
            for (i, spec) in self.order_by.iter().enumerate() {
                if i > 0 {
                    f.write_str(", ")?;
                }
                write!(f, "{spec}")?;
            }
        }
        if let Some(limit) = self.limit {
            write!(f, " LIMIT {limit}")?;
        }
        Ok(())
    }
}
