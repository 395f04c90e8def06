//! Result materialization: matches to an ordered, limited table.
//!
//! The generator expands each match into rows (one per combination of the
//! multi-valued bindings the SELECT list consumes), projects columns through
//! the extractor registry, applies the ORDER BY comparison chain, and
//! truncates to LIMIT. Without ORDER BY, rows keep the match set's
//! `(doc_id, sentence_id)` order.

use crate::ast::{CountSpec, FnKind, Granularity, Query, SelectItem, SortDir};
use crate::engine::EngineError;
use crate::engine::bindings::Value;
use crate::engine::extract::{ExtractContext, ExtractSource, ExtractorRegistry};
use crate::engine::matches::{DocSentenceMatch, MatchSet, SentenceRef};
use crate::index::TextProvider;
use crate::semantic::{VarType, VariableRegistry};
use chrono::{NaiveDate, NaiveDateTime};
use indexmap::IndexMap;
use smol_str::SmolStr;
use std::cmp::Ordering;
use std::collections::{BTreeSet, HashMap};

/// Domain type of a result column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColumnType {
    Person,
    Date,
    Location,
    Term,
    Relation,
    Category,
    Snippet,
    Count,
}

/// One column of a result table.
#[derive(Debug, Clone)]
pub struct ColumnSpec {
    /// Effective column name: the alias when present, else canonical.
    pub name: String,
    pub ty: ColumnType,
    /// The alias as written, if any.
    pub alias: Option<String>,
    /// Per-column options, such as `length` for snippets.
    pub options: IndexMap<String, String>,
}

/// A materialized query result. The empty string denotes NULL.
#[derive(Debug, Clone, Default)]
pub struct ResultTable {
    pub columns: Vec<ColumnSpec>,
    pub rows: Vec<IndexMap<String, String>>,
}

impl ResultTable {
    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// True when there are no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Column names in declared order.
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    /// The values of one column, in row order.
    pub fn column(&self, name: &str) -> Vec<&str> {
        self.rows
            .iter()
            .map(|row| row.get(name).map(String::as_str).unwrap_or(""))
            .collect()
    }
}

/// Where a column's cell value comes from.
enum ColumnSource {
    DocId,
    SentenceId,
    /// The bound value of a variable for this row.
    Var(SmolStr),
    /// Snippet over the variable's witnessing positions.
    Snippet(SmolStr),
    Count(CountSpec),
}

struct Column {
    spec: ColumnSpec,
    source: ColumnSource,
}

/// A row under construction: cells plus the sort keys that are not cells.
struct RowBuild {
    cells: IndexMap<String, String>,
    doc_id: u32,
    /// Rendered per-row values for every expanded variable, for ORDER BY
    /// keys that name a variable not projected as its own column.
    var_values: HashMap<SmolStr, String>,
}

pub(crate) struct ResultGenerator<'a> {
    query: &'a Query,
    registry: &'a VariableRegistry,
    text: &'a dyn TextProvider,
    extractors: ExtractorRegistry,
}

impl<'a> ResultGenerator<'a> {
    pub(crate) fn new(
        query: &'a Query,
        registry: &'a VariableRegistry,
        text: &'a dyn TextProvider,
        default_snippet_length: usize,
    ) -> Self {
        Self {
            query,
            registry,
            text,
            extractors: ExtractorRegistry::with_defaults(default_snippet_length),
        }
    }

    pub(crate) fn generate(&self, matches: &MatchSet) -> Result<ResultTable, EngineError> {
        let columns = self.build_columns();

        if self.query.select.iter().any(SelectItem::is_aggregate) {
            return Ok(self.aggregate(columns, matches));
        }

        let mut rows = Vec::new();
        for m in matches.iter() {
            self.expand_match(m, &columns, &mut rows)?;
        }

        self.sort(&columns, &mut rows);

        if let Some(limit) = self.query.limit {
            rows.truncate(limit as usize);
        }

        Ok(ResultTable {
            columns: columns.into_iter().map(|c| c.spec).collect(),
            rows: rows.into_iter().map(|r| r.cells).collect(),
        })
    }

    // ------------------------------------------------------------------
    // Columns
    // ------------------------------------------------------------------

    fn build_columns(&self) -> Vec<Column> {
        let mut columns = Vec::new();
        for item in &self.query.select {
            match item {
                SelectItem::Wildcard { .. } => {
                    columns.push(plain_column("document_id", ColumnType::Term, ColumnSource::DocId));
                    if matches!(self.query.granularity, Granularity::Sentence { .. }) {
                        columns.push(plain_column(
                            "sentence_id",
                            ColumnType::Term,
                            ColumnSource::SentenceId,
                        ));
                    }
                    for info in self.registry.iter() {
                        columns.push(plain_column(
                            info.name.as_str(),
                            var_column_type(info.ty, &info.ner_labels),
                            ColumnSource::Var(info.name.clone()),
                        ));
                    }
                }
                SelectItem::Variable { name, alias, .. } => {
                    let ty = self
                        .registry
                        .get(name)
                        .map(|info| var_column_type(info.ty, &info.ner_labels))
                        .unwrap_or(ColumnType::Category);
                    columns.push(Column {
                        spec: ColumnSpec {
                            name: alias.as_deref().unwrap_or(name).to_string(),
                            ty,
                            alias: alias.as_deref().map(String::from),
                            options: IndexMap::new(),
                        },
                        source: ColumnSource::Var(name.clone()),
                    });
                }
                SelectItem::Function { kind, alias, .. } => {
                    columns.push(self.function_column(kind, alias.as_deref()));
                }
            }
        }
        columns
    }

    fn function_column(&self, kind: &FnKind, alias: Option<&str>) -> Column {
        let (canonical, ty, source, options) = match kind {
            FnKind::Snippet { var, length } => {
                let mut options = IndexMap::new();
                if let Some(length) = length {
                    options.insert("length".to_string(), length.to_string());
                }
                (
                    format!("snippet({var})"),
                    ColumnType::Snippet,
                    ColumnSource::Snippet(var.clone()),
                    options,
                )
            }
            FnKind::Date { var } => (
                format!("date({var})"),
                ColumnType::Date,
                ColumnSource::Var(var.clone()),
                IndexMap::new(),
            ),
            FnKind::Person { var } => (
                format!("person({var})"),
                ColumnType::Person,
                ColumnSource::Var(var.clone()),
                IndexMap::new(),
            ),
            FnKind::Count(spec) => {
                let canonical = match spec {
                    CountSpec::Matches => "count(*)".to_string(),
                    CountSpec::Documents => "count(documents)".to_string(),
                    CountSpec::Unique(var) => format!("count(unique {var})"),
                };
                (
                    canonical,
                    ColumnType::Count,
                    ColumnSource::Count(spec.clone()),
                    IndexMap::new(),
                )
            }
        };
        Column {
            spec: ColumnSpec {
                name: alias.map(String::from).unwrap_or(canonical),
                ty,
                alias: alias.map(String::from),
                options,
            },
            source,
        }
    }

    // ------------------------------------------------------------------
    // Rows
    // ------------------------------------------------------------------

    fn expand_match(
        &self,
        m: &DocSentenceMatch,
        columns: &[Column],
        rows: &mut Vec<RowBuild>,
    ) -> Result<(), EngineError> {
        // Variables that vary per row: those projected as values, plus any
        // ORDER BY variable, deduplicated in column order.
        let mut row_vars: Vec<SmolStr> = Vec::new();
        for column in columns {
            if let ColumnSource::Var(var) = &column.source
                && !row_vars.contains(var)
            {
                row_vars.push(var.clone());
            }
        }
        for spec in &self.query.order_by {
            if let Some(var) = spec.field.strip_prefix('?') {
                let var = SmolStr::new(var);
                if !row_vars.contains(&var) {
                    row_vars.push(var);
                }
            }
        }

        let value_lists: Vec<Vec<Option<&Value>>> = row_vars
            .iter()
            .map(|var| match m.bindings.get(var) {
                Some(values) if !values.is_empty() => values.iter().map(Some).collect(),
                _ => vec![None],
            })
            .collect();

        // Per-match cells are identical across the expansion.
        let snippet_cells: HashMap<SmolStr, String> = {
            let mut cells = HashMap::new();
            for column in columns {
                if let ColumnSource::Snippet(var) = &column.source {
                    cells.insert(var.clone(), self.snippet_cell(m, var, &column.spec)?);
                }
            }
            cells
        };

        let mut combo = vec![0usize; row_vars.len()];
        loop {
            let assignment: HashMap<&SmolStr, Option<&Value>> = row_vars
                .iter()
                .enumerate()
                .map(|(i, var)| (var, value_lists[i][combo[i]]))
                .collect();

            let mut cells = IndexMap::new();
            let mut var_values = HashMap::new();
            for (var, value) in &assignment {
                var_values.insert(
                    (*var).clone(),
                    value.map(Value::render).unwrap_or_default(),
                );
            }

            for column in columns {
                let cell = match &column.source {
                    ColumnSource::DocId => m.doc_id.to_string(),
                    ColumnSource::SentenceId => match m.sentence {
                        SentenceRef::Id(id) => id.to_string(),
                        SentenceRef::Wildcard => String::new(),
                    },
                    ColumnSource::Var(var) => match assignment.get(var).copied().flatten() {
                        Some(value) => self.project_value(value, &column.spec)?,
                        None => String::new(),
                    },
                    ColumnSource::Snippet(var) => {
                        snippet_cells.get(var).cloned().unwrap_or_default()
                    }
                    ColumnSource::Count(_) => String::new(),
                };
                cells.insert(column.spec.name.clone(), cell);
            }

            rows.push(RowBuild {
                cells,
                doc_id: m.doc_id,
                var_values,
            });

            // Odometer over the value lists.
            let mut advanced = false;
            for i in (0..combo.len()).rev() {
                if combo[i] + 1 < value_lists[i].len() {
                    combo[i] += 1;
                    combo[i + 1..].fill(0);
                    advanced = true;
                    break;
                }
            }
            if !advanced {
                break;
            }
        }
        Ok(())
    }

    fn project_value(&self, value: &Value, spec: &ColumnSpec) -> Result<String, EngineError> {
        match self.extractors.get(spec.ty) {
            Some(extractor) => extractor.extract(&ExtractContext {
                source: ExtractSource::Value(value),
                text: self.text,
                options: &spec.options,
            }),
            None => Ok(value.render()),
        }
    }

    fn snippet_cell(
        &self,
        m: &DocSentenceMatch,
        var: &SmolStr,
        spec: &ColumnSpec,
    ) -> Result<String, EngineError> {
        let Some(positions) = m.positions.get(var) else {
            return Ok(String::new());
        };
        let Some(extractor) = self.extractors.get(ColumnType::Snippet) else {
            return Ok(String::new());
        };
        extractor.extract(&ExtractContext {
            source: ExtractSource::Spans {
                doc: m.doc_id,
                sentence: m.sentence,
                positions,
            },
            text: self.text,
            options: &spec.options,
        })
    }

    // ------------------------------------------------------------------
    // Aggregates
    // ------------------------------------------------------------------

    fn aggregate(&self, columns: Vec<Column>, matches: &MatchSet) -> ResultTable {
        let mut cells = IndexMap::new();
        for column in &columns {
            let value = match &column.source {
                ColumnSource::Count(CountSpec::Matches) => matches.len().to_string(),
                ColumnSource::Count(CountSpec::Documents) => {
                    matches.doc_ids().len().to_string()
                }
                ColumnSource::Count(CountSpec::Unique(var)) => {
                    let distinct: BTreeSet<String> = matches
                        .iter()
                        .flat_map(|m| m.bindings.get(var).unwrap_or(&[]).iter())
                        .map(Value::render)
                        .collect();
                    distinct.len().to_string()
                }
                _ => String::new(),
            };
            cells.insert(column.spec.name.clone(), value);
        }

        ResultTable {
            columns: columns.into_iter().map(|c| c.spec).collect(),
            rows: vec![cells],
        }
    }

    // ------------------------------------------------------------------
    // Ordering
    // ------------------------------------------------------------------

    fn sort(&self, columns: &[Column], rows: &mut [RowBuild]) {
        if self.query.order_by.is_empty() {
            return;
        }

        // Resolve each key once: a `?var` key prefers the variable's own
        // column but falls back to the per-row variable value.
        let keys: Vec<(SortKey, SortDir)> = self
            .query
            .order_by
            .iter()
            .map(|spec| {
                let key = if let Some(var) = spec.field.strip_prefix('?') {
                    let var = SmolStr::new(var);
                    columns
                        .iter()
                        .find(|c| matches!(&c.source, ColumnSource::Var(v) if *v == var))
                        .map(|c| SortKey::Column(c.spec.name.clone()))
                        .unwrap_or(SortKey::Variable(var))
                } else if spec.field == "document_id" {
                    SortKey::DocId
                } else {
                    SortKey::Column(spec.field.to_string())
                };
                (key, spec.dir)
            })
            .collect();

        rows.sort_by(|a, b| {
            for (key, dir) in &keys {
                let ordering = compare_rows(key, *dir, a, b);
                if ordering != Ordering::Equal {
                    return ordering;
                }
            }
            Ordering::Equal
        });
    }
}

/// A resolved ORDER BY key.
enum SortKey {
    DocId,
    Column(String),
    Variable(SmolStr),
}

impl SortKey {
    fn cell<'a>(&self, row: &'a RowBuild) -> &'a str {
        match self {
            SortKey::DocId => "",
            SortKey::Column(name) => row.cells.get(name).map(String::as_str).unwrap_or(""),
            SortKey::Variable(var) => {
                row.var_values.get(var).map(String::as_str).unwrap_or("")
            }
        }
    }
}

/// Compares two rows under one key, keeping NULLs (empty cells) last
/// regardless of direction.
fn compare_rows(key: &SortKey, dir: SortDir, a: &RowBuild, b: &RowBuild) -> Ordering {
    if let SortKey::DocId = key {
        let ordering = a.doc_id.cmp(&b.doc_id);
        return match dir {
            SortDir::Asc => ordering,
            SortDir::Desc => ordering.reverse(),
        };
    }

    let a_cell = key.cell(a);
    let b_cell = key.cell(b);
    match (a_cell.is_empty(), b_cell.is_empty()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => {
            let ordering = compare_cells(a_cell, b_cell);
            match dir {
                SortDir::Asc => ordering,
                SortDir::Desc => ordering.reverse(),
            }
        }
    }
}

fn plain_column(name: &str, ty: ColumnType, source: ColumnSource) -> Column {
    Column {
        spec: ColumnSpec {
            name: name.to_string(),
            ty,
            alias: None,
            options: IndexMap::new(),
        },
        source,
    }
}

fn var_column_type(ty: VarType, labels: &[crate::ast::NerType]) -> ColumnType {
    use crate::ast::NerType;
    match ty {
        VarType::Date => ColumnType::Date,
        VarType::Term => ColumnType::Term,
        VarType::Entity => match labels {
            [NerType::Person] => ColumnType::Person,
            [NerType::Location] => ColumnType::Location,
            _ => ColumnType::Category,
        },
    }
}

/// Compares two non-empty cell strings: integers numerically, dates
/// chronologically, everything else lexicographically. NULL handling lives
/// in `compare_rows`.
fn compare_cells(a: &str, b: &str) -> Ordering {
    if let (Ok(x), Ok(y)) = (a.parse::<i64>(), b.parse::<i64>()) {
        return x.cmp(&y);
    }
    if let (Some(x), Some(y)) = (parse_date(a), parse_date(b)) {
        return x.cmp(&y);
    }
    a.cmp(b)
}

fn parse_date(s: &str) -> Option<NaiveDateTime> {
    if let Ok(dt) = s.parse::<NaiveDateTime>() {
        return Some(dt);
    }
    s.parse::<NaiveDate>()
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

