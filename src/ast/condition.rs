//! Condition AST: the WHERE-clause predicate tree.
//!
//! A condition is a tagged variant rather than a trait hierarchy: each leaf
//! kind (term containment, named entity, part of speech, temporal, syntactic
//! dependency) carries exactly the data its evaluator arm needs, and the
//! combinators (`And`, `Or`, `Not`) own their children directly. All nodes
//! carry the source span they were parsed from.

use crate::ast::Span;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use smol_str::SmolStr;
use std::fmt;

/// The closed set of named-entity categories understood by the engine.
///
/// Input is case-insensitive; the canonical form is uppercase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NerType {
    Person,
    Organization,
    Location,
    Date,
    Time,
    Money,
    Percent,
    Number,
    Ordinal,
    Duration,
    Set,
    Misc,
}

impl NerType {
    /// All members of the closed set, in canonical order.
    pub const ALL: [NerType; 12] = [
        NerType::Person,
        NerType::Organization,
        NerType::Location,
        NerType::Date,
        NerType::Time,
        NerType::Money,
        NerType::Percent,
        NerType::Number,
        NerType::Ordinal,
        NerType::Duration,
        NerType::Set,
        NerType::Misc,
    ];

    /// Parses an entity-type name case-insensitively.
    pub fn parse(name: &str) -> Option<NerType> {
        let upper = name.to_ascii_uppercase();
        NerType::ALL
            .iter()
            .copied()
            .find(|ty| ty.as_str() == upper)
    }

    /// Returns the canonical uppercase name.
    pub fn as_str(self) -> &'static str {
        match self {
            NerType::Person => "PERSON",
            NerType::Organization => "ORGANIZATION",
            NerType::Location => "LOCATION",
            NerType::Date => "DATE",
            NerType::Time => "TIME",
            NerType::Money => "MONEY",
            NerType::Percent => "PERCENT",
            NerType::Number => "NUMBER",
            NerType::Ordinal => "ORDINAL",
            NerType::Duration => "DURATION",
            NerType::Set => "SET",
            NerType::Misc => "MISC",
        }
    }
}

impl fmt::Display for NerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A predicate argument that is either a literal term or a query variable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// A quoted literal to match against.
    Literal(SmolStr),
    /// A `?name` variable to bind or filter.
    Variable(SmolStr),
}

impl Target {
    /// Returns the variable name if this target is a variable.
    pub fn variable(&self) -> Option<&SmolStr> {
        match self {
            Target::Variable(name) => Some(name),
            Target::Literal(_) => None,
        }
    }
}

/// A date value with partial precision, widened to an inclusive instant range.
///
/// `2005` covers the whole year, `2005-03` the whole month, `2005-03-11` the
/// whole day, and a value with a time component is a single instant. Temporal
/// relations are defined against the `[lo, hi]` range so that `ON 2005`
/// matches any instant inside that year.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DateValue {
    /// The literal text as written in the query.
    pub text: SmolStr,
    /// Earliest instant covered.
    pub lo: NaiveDateTime,
    /// Latest instant covered.
    pub hi: NaiveDateTime,
}

impl DateValue {
    /// Parses an ISO-8601 date with optional month, day, and time parts.
    ///
    /// Accepted shapes: `YYYY`, `YYYY-MM`, `YYYY-MM-DD`, each optionally
    /// followed by `Thh:mm` or `Thh:mm:ss`.
    pub fn parse(text: &str) -> Result<DateValue, String> {
        let (date_part, time_part) = match text.split_once('T') {
            Some((d, t)) => (d, Some(t)),
            None => (text, None),
        };

        let fields: Vec<&str> = date_part.split('-').collect();
        let parse_field = |s: &str, what: &str| -> Result<u32, String> {
            s.parse::<u32>()
                .map_err(|_| format!("invalid {what} `{s}` in date `{text}`"))
        };

        let (lo_date, hi_date) = match fields.as_slice() {
            [y] => {
                let year = parse_field(y, "year")? as i32;
                (ymd(year, 1, 1, text)?, ymd(year, 12, 31, text)?)
            }
            [y, m] => {
                let year = parse_field(y, "year")? as i32;
                let month = parse_field(m, "month")?;
                let first = ymd(year, month, 1, text)?;
                (first, last_day_of_month(year, month, text)?)
            }
            [y, m, d] => {
                let year = parse_field(y, "year")? as i32;
                let month = parse_field(m, "month")?;
                let day = parse_field(d, "day")?;
                let date = ymd(year, month, day, text)?;
                (date, date)
            }
            _ => return Err(format!("malformed date `{text}`")),
        };

        let (lo, hi) = match time_part {
            None => (
                lo_date.and_time(NaiveTime::MIN),
                hi_date.and_hms_opt(23, 59, 59).expect("valid end of day"),
            ),
            Some(time) => {
                if fields.len() != 3 {
                    return Err(format!(
                        "date `{text}` has a time component but no day component"
                    ));
                }
                let instant = parse_time(lo_date, time, text)?;
                (instant, instant)
            }
        };

        Ok(DateValue {
            text: SmolStr::new(text),
            lo,
            hi,
        })
    }
}

fn ymd(year: i32, month: u32, day: u32, text: &str) -> Result<NaiveDate, String> {
    NaiveDate::from_ymd_opt(year, month, day)
        .ok_or_else(|| format!("date `{text}` is out of range"))
}

fn last_day_of_month(year: i32, month: u32, text: &str) -> Result<NaiveDate, String> {
    let (next_y, next_m) = if month == 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    };
    let first_of_next = ymd(next_y, next_m, 1, text)?;
    Ok(first_of_next.pred_opt().expect("date has a predecessor"))
}

fn parse_time(date: NaiveDate, time: &str, text: &str) -> Result<NaiveDateTime, String> {
    let fields: Vec<&str> = time.split(':').collect();
    let parse_field = |s: &str| -> Result<u32, String> {
        s.parse::<u32>()
            .map_err(|_| format!("invalid time component `{s}` in date `{text}`"))
    };
    let (h, m, s) = match fields.as_slice() {
        [h, m] => (parse_field(h)?, parse_field(m)?, 0),
        [h, m, s] => (parse_field(h)?, parse_field(m)?, parse_field(s)?),
        _ => return Err(format!("malformed time in date `{text}`")),
    };
    date.and_hms_opt(h, m, s)
        .ok_or_else(|| format!("time in date `{text}` is out of range"))
}

/// A duration literal such as `30d`, used as the NEAR radius.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DurationValue {
    /// The literal text as written in the query.
    pub text: SmolStr,
    /// Magnitude in seconds.
    pub seconds: i64,
}

impl DurationValue {
    /// Parses a compact duration: an integer followed by a unit.
    ///
    /// Units: `h` hours, `d` days, `w` weeks, `m` months (30 days),
    /// `y` years (365 days).
    pub fn parse(text: &str) -> Result<DurationValue, String> {
        let split = text
            .find(|c: char| !c.is_ascii_digit())
            .ok_or_else(|| format!("duration `{text}` is missing a unit"))?;
        let (digits, unit) = text.split_at(split);
        let magnitude: i64 = digits
            .parse()
            .map_err(|_| format!("invalid duration magnitude in `{text}`"))?;
        let unit_seconds: i64 = match unit {
            "h" => 3_600,
            "d" => 86_400,
            "w" => 7 * 86_400,
            "m" => 30 * 86_400,
            "y" => 365 * 86_400,
            _ => return Err(format!("unknown duration unit `{unit}` in `{text}`")),
        };
        let seconds = magnitude
            .checked_mul(unit_seconds)
            .ok_or_else(|| format!("duration `{text}` overflows"))?;
        Ok(DurationValue {
            text: SmolStr::new(text),
            seconds,
        })
    }

    /// Returns this duration as a chrono duration.
    pub fn to_chrono(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.seconds)
    }
}

/// The temporal relation applied by a DATE predicate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemporalOp {
    /// Strictly before the value's range (`<`), or at/before its end (`<=`).
    Before { value: DateValue, inclusive: bool },
    /// Strictly after the value's range (`>`), or at/after its start (`>=`).
    After { value: DateValue, inclusive: bool },
    /// Inside the value's range (`=`).
    On { value: DateValue },
    /// Inside `[start.lo, end.hi]`.
    Between { start: DateValue, end: DateValue },
    /// Within `radius` of the anchor range.
    Near {
        anchor: DateValue,
        radius: DurationValue,
    },
}

impl TemporalOp {
    /// The inclusive instant range matched by this relation, where one side
    /// may be unbounded (`None`).
    pub fn bounds(&self) -> (Option<NaiveDateTime>, Option<NaiveDateTime>) {
        match self {
            TemporalOp::Before { value, inclusive } => {
                let hi = if *inclusive {
                    value.hi
                } else {
                    value.lo - chrono::Duration::seconds(1)
                };
                (None, Some(hi))
            }
            TemporalOp::After { value, inclusive } => {
                let lo = if *inclusive {
                    value.lo
                } else {
                    value.hi + chrono::Duration::seconds(1)
                };
                (Some(lo), None)
            }
            TemporalOp::On { value } => (Some(value.lo), Some(value.hi)),
            TemporalOp::Between { start, end } => (Some(start.lo), Some(end.hi)),
            TemporalOp::Near { anchor, radius } => (
                Some(anchor.lo - radius.to_chrono()),
                Some(anchor.hi + radius.to_chrono()),
            ),
        }
    }

    /// Returns true if `instant` satisfies this relation.
    pub fn matches(&self, instant: NaiveDateTime) -> bool {
        let (lo, hi) = self.bounds();
        lo.is_none_or(|lo| instant >= lo) && hi.is_none_or(|hi| instant <= hi)
    }

    /// Every date value mentioned by the relation, for validation sweeps.
    pub fn date_values(&self) -> Vec<&DateValue> {
        match self {
            TemporalOp::Before { value, .. }
            | TemporalOp::After { value, .. }
            | TemporalOp::On { value } => vec![value],
            TemporalOp::Between { start, end } => vec![start, end],
            TemporalOp::Near { anchor, .. } => vec![anchor],
        }
    }
}

/// A node in the WHERE-clause predicate tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    /// One or more literal terms that must appear, optionally binding the
    /// matched surface form to a variable (`CONTAINS("a", "b") AS ?t`).
    Contains {
        terms: Vec<SmolStr>,
        binds: Option<SmolStr>,
        span: Span,
    },
    /// A named-entity predicate. `label` is the entity-type name as written;
    /// the validator checks it against the closed set. A variable target
    /// binds matched surface forms, a literal target filters them, and no
    /// target at all just requires the entity type to occur.
    Ner {
        label: SmolStr,
        target: Option<Target>,
        span: Span,
    },
    /// A part-of-speech predicate over the POS-tagged position index.
    Pos {
        tag: SmolStr,
        target: Option<Target>,
        span: Span,
    },
    /// A temporal predicate over date-bearing positions.
    Temporal {
        target: Target,
        op: TemporalOp,
        span: Span,
    },
    /// A syntactic-dependency triple predicate. Variables act as wildcards
    /// when unbound and as filters once bound.
    Dependency {
        governor: Target,
        relation: SmolStr,
        dependent: Target,
        span: Span,
    },
    /// Conjunction of two or more conditions.
    And { children: Vec<Condition>, span: Span },
    /// Disjunction of two or more conditions.
    Or { children: Vec<Condition>, span: Span },
    /// Negation; complements within the enclosing conjunction's candidates.
    Not { child: Box<Condition>, span: Span },
}

impl Condition {
    /// Returns the source span of this node.
    pub fn span(&self) -> &Span {
        match self {
            Condition::Contains { span, .. }
            | Condition::Ner { span, .. }
            | Condition::Pos { span, .. }
            | Condition::Temporal { span, .. }
            | Condition::Dependency { span, .. }
            | Condition::And { span, .. }
            | Condition::Or { span, .. }
            | Condition::Not { span, .. } => span,
        }
    }

    /// Child conditions of a combinator node; empty for leaves.
    pub fn children(&self) -> &[Condition] {
        match self {
            Condition::And { children, .. } | Condition::Or { children, .. } => children,
            Condition::Not { child, .. } => std::slice::from_ref(child),
            _ => &[],
        }
    }

    /// A short lowercase name for the node kind, used in diagnostics.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Condition::Contains { .. } => "contains",
            Condition::Ner { .. } => "ner",
            Condition::Pos { .. } => "pos",
            Condition::Temporal { .. } => "temporal",
            Condition::Dependency { .. } => "dependency",
            Condition::And { .. } => "and",
            Condition::Or { .. } => "or",
            Condition::Not { .. } => "not",
        }
    }

    /// Variable names this condition can bind when it matches.
    pub fn bound_variables(&self) -> Vec<&SmolStr> {
        match self {
            Condition::Contains { binds, .. } => binds.iter().collect(),
            Condition::Ner { target, .. } | Condition::Pos { target, .. } => {
                target.iter().filter_map(Target::variable).collect()
            }
            Condition::Temporal { target, .. } => target.variable().into_iter().collect(),
            Condition::Dependency {
                governor,
                dependent,
                ..
            } => governor
                .variable()
                .into_iter()
                .chain(dependent.variable())
                .collect(),
            _ => Vec::new(),
        }
    }
}

/// A path from the condition root to a node, as child indexes.
///
/// Paths identify the condition a diagnostic or runtime failure refers to;
/// they render as dotted indexes (`0.1`) with `root` for the empty path.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AstPath(Vec<u16>);

impl AstPath {
    /// The root path.
    pub fn root() -> AstPath {
        AstPath(Vec::new())
    }

    /// Returns the path of this node's `index`-th child.
    pub fn child(&self, index: usize) -> AstPath {
        let mut next = self.0.clone();
        next.push(index as u16);
        AstPath(next)
    }
}

impl fmt::Display for AstPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return f.write_str("root");
        }
        for (i, seg) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(".")?;
            }
            write!(f, "{seg}")?;
        }
        Ok(())
    }
}
