//! Semantic validation: scope, type, and domain-value checks on the AST.
//!
//! Validation runs entirely before any index access. It builds the
//! [`VariableRegistry`] while checking domain values (entity types, term
//! lists, temporal ranges), then verifies binding structure: a variable
//! consumed by SELECT or ORDER BY must be bound on every path through the
//! AND/OR tree, a variable keeps one domain type across all its producers,
//! and NOT can never introduce a variable. Errors carry stable `V…` codes;
//! warnings (such as future-dated temporal values) are non-fatal and also
//! forwarded to the tracing sink.

mod registry;

pub use registry::{ConsumerSite, TypeConflict, VarInfo, VarType, VariableRegistry};

use crate::ast::{
    AstPath, Condition, NerType, Query, SelectItem, Target, TemporalOp,
};
use crate::diag::Diag;
use smol_str::SmolStr;
use std::collections::HashSet;

/// Configuration for semantic validation.
#[derive(Debug, Clone)]
pub struct ValidationConfig {
    /// Warn when a temporal predicate mentions a date in the future.
    pub warn_future_dates: bool,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            warn_future_dates: true,
        }
    }
}

/// Result of validating a query.
#[derive(Debug)]
pub struct ValidationOutcome {
    /// The variable registry, present when no errors were found.
    pub registry: Option<VariableRegistry>,
    /// Errors and warnings, in discovery order.
    pub diagnostics: Vec<Diag>,
}

impl ValidationOutcome {
    /// True when validation produced a registry (warnings allowed).
    pub fn is_valid(&self) -> bool {
        self.registry.is_some()
    }
}

/// Semantic validator for parsed queries.
pub struct SemanticValidator {
    config: ValidationConfig,
}

impl SemanticValidator {
    /// Creates a validator with default configuration.
    pub fn new() -> Self {
        Self {
            config: ValidationConfig::default(),
        }
    }

    /// Creates a validator with custom configuration.
    pub fn with_config(config: ValidationConfig) -> Self {
        Self { config }
    }

    /// Validates a query, producing a registry or diagnostics.
    ///
    /// Validation continues after errors so one pass reports every issue.
    pub fn validate(&self, query: &Query) -> ValidationOutcome {
        let mut diagnostics = Vec::new();
        let mut registry = VariableRegistry::new();

        if let Some(condition) = &query.condition {
            self.check_condition(condition, &AstPath::root(), &mut registry, &mut diagnostics);
            check_negation_scope(condition, &mut diagnostics);
        }

        self.check_select(query, &mut registry, &mut diagnostics);
        check_order_by(query, &registry, &mut diagnostics);
        check_limit(query, &mut diagnostics);

        for diag in &diagnostics {
            if !diag.is_error() {
                tracing::warn!(message = %diag.message, "validation warning");
            }
        }

        let has_errors = diagnostics.iter().any(Diag::is_error);
        ValidationOutcome {
            registry: if has_errors { None } else { Some(registry) },
            diagnostics,
        }
    }

    fn check_condition(
        &self,
        condition: &Condition,
        path: &AstPath,
        registry: &mut VariableRegistry,
        diagnostics: &mut Vec<Diag>,
    ) {
        match condition {
            Condition::Contains { terms, binds, span } => {
                for term in terms {
                    if term.is_empty() {
                        diagnostics.push(
                            Diag::error("CONTAINS terms must be non-empty")
                                .with_label(span.clone(), "empty term here")
                                .with_code("V002"),
                        );
                    }
                }
                if let Some(var) = binds {
                    record(registry, var, VarType::Term, None, path, span, diagnostics);
                }
            }
            Condition::Ner {
                label,
                target,
                span,
            } => {
                let ner_type = NerType::parse(label);
                if ner_type.is_none() {
                    diagnostics.push(
                        Diag::error(format!("unknown entity type `{label}`"))
                            .with_label(span.clone(), "not a recognized entity type")
                            .with_code("V001")
                            .with_help(format!(
                                "expected one of: {}",
                                NerType::ALL.map(|t| t.as_str()).join(", ")
                            )),
                    );
                }
                if let Some(Target::Variable(var)) = target {
                    record(registry, var, VarType::Entity, ner_type, path, span, diagnostics);
                }
            }
            Condition::Pos { tag, target, span } => {
                if tag.is_empty() {
                    diagnostics.push(
                        Diag::error("POS tag must be non-empty")
                            .with_label(span.clone(), "empty tag here")
                            .with_code("V002"),
                    );
                }
                if let Some(Target::Variable(var)) = target {
                    record(registry, var, VarType::Term, None, path, span, diagnostics);
                }
            }
            Condition::Temporal { target, op, span } => {
                if let TemporalOp::Between { start, end } = op
                    && start.lo > end.hi
                {
                    diagnostics.push(
                        Diag::error(format!(
                            "temporal range is inverted: {} is after {}",
                            start.text, end.text
                        ))
                        .with_label(span.clone(), "start must not be after end")
                        .with_code("V003"),
                    );
                }
                if self.config.warn_future_dates {
                    let now = chrono::Utc::now().naive_utc();
                    for value in op.date_values() {
                        if value.lo > now {
                            diagnostics.push(
                                Diag::warning(format!(
                                    "temporal value {} lies in the future",
                                    value.text
                                ))
                                .with_label(span.clone(), "future date here"),
                            );
                        }
                    }
                }
                if let Target::Variable(var) = target {
                    record(registry, var, VarType::Date, None, path, span, diagnostics);
                }
            }
            Condition::Dependency {
                governor,
                relation,
                dependent,
                span,
            } => {
                if relation.is_empty() {
                    diagnostics.push(
                        Diag::error("DEP relation must be non-empty")
                            .with_label(span.clone(), "empty relation here")
                            .with_code("V002"),
                    );
                }
                for target in [governor, dependent] {
                    match target {
                        Target::Literal(term) if term.is_empty() => {
                            diagnostics.push(
                                Diag::error("DEP terms must be non-empty")
                                    .with_label(span.clone(), "empty term here")
                                    .with_code("V002"),
                            );
                        }
                        Target::Variable(var) => {
                            record(registry, var, VarType::Term, None, path, span, diagnostics);
                        }
                        Target::Literal(_) => {}
                    }
                }
            }
            Condition::And { children, .. } | Condition::Or { children, .. } => {
                for (i, child) in children.iter().enumerate() {
                    self.check_condition(child, &path.child(i), registry, diagnostics);
                }
            }
            Condition::Not { child, .. } => {
                self.check_condition(child, &path.child(0), registry, diagnostics);
            }
        }
    }

    fn check_select(
        &self,
        query: &Query,
        registry: &mut VariableRegistry,
        diagnostics: &mut Vec<Diag>,
    ) {
        let available = query
            .condition
            .as_ref()
            .map(produced_on_all_paths)
            .unwrap_or_default();

        let mut has_aggregate = false;
        let mut has_row_item = false;

        for (i, item) in query.select.iter().enumerate() {
            if item.is_aggregate() {
                has_aggregate = true;
            } else {
                has_row_item = true;
            }

            for var in item.consumed_variables() {
                registry.record_consumer(var, ConsumerSite::Select(i));
                if !available.contains(var.as_str()) {
                    let message = if registry.contains(var) {
                        format!("variable ?{var} is not bound on every path of the condition")
                    } else {
                        format!("variable ?{var} is never bound by the condition")
                    };
                    diagnostics.push(
                        Diag::error(message)
                            .with_label(item.span().clone(), "consumed here")
                            .with_code("V006"),
                    );
                }
            }
        }

        if has_aggregate && has_row_item {
            diagnostics.push(
                Diag::error("COUNT cannot be combined with per-row select items")
                    .with_label(query.span.clone(), "in this select list")
                    .with_code("V009"),
            );
        }
    }
}

impl Default for SemanticValidator {
    fn default() -> Self {
        Self::new()
    }
}

fn record(
    registry: &mut VariableRegistry,
    var: &SmolStr,
    ty: VarType,
    label: Option<NerType>,
    path: &AstPath,
    span: &crate::ast::Span,
    diagnostics: &mut Vec<Diag>,
) {
    // A later mention of an already-known variable is also a consumer: at
    // evaluation time it filters against the earlier binding.
    if registry.contains(var) {
        registry.record_consumer(var, ConsumerSite::Condition(path.clone()));
    }
    if let Err(conflict) = registry.record_producer(var, ty, label, path.clone()) {
        diagnostics.push(
            Diag::error(format!(
                "variable ?{} is bound as {} here but as {} elsewhere",
                conflict.name, conflict.found, conflict.expected
            ))
            .with_label(span.clone(), "conflicting binding here")
            .with_code("V004"),
        );
    }
}

/// The set of variables guaranteed bound by `condition` on every path:
/// a conjunction provides the union of its children, a disjunction only the
/// intersection, and a negation provides nothing.
fn produced_on_all_paths(condition: &Condition) -> HashSet<SmolStr> {
    match condition {
        Condition::And { children, .. } => children
            .iter()
            .flat_map(produced_on_all_paths)
            .collect(),
        Condition::Or { children, .. } => {
            let mut iter = children.iter().map(produced_on_all_paths);
            let first = iter.next().unwrap_or_default();
            iter.fold(first, |acc, set| acc.intersection(&set).cloned().collect())
        }
        Condition::Not { .. } => HashSet::new(),
        leaf => leaf.bound_variables().into_iter().cloned().collect(),
    }
}

/// All variables any leaf of `condition` could bind, negations included.
fn producible(condition: &Condition) -> HashSet<SmolStr> {
    let mut set: HashSet<SmolStr> = condition.bound_variables().into_iter().cloned().collect();
    for child in condition.children() {
        set.extend(producible(child));
    }
    set
}

/// Variables producible outside any NOT subtree.
fn producible_outside_not(condition: &Condition) -> HashSet<SmolStr> {
    match condition {
        Condition::Not { .. } => HashSet::new(),
        Condition::And { children, .. } | Condition::Or { children, .. } => children
            .iter()
            .flat_map(producible_outside_not)
            .collect(),
        leaf => leaf.bound_variables().into_iter().cloned().collect(),
    }
}

/// A negated condition must not introduce variables: anything bindable under
/// a NOT must also be bindable outside one.
fn check_negation_scope(root: &Condition, diagnostics: &mut Vec<Diag>) {
    let outside = producible_outside_not(root);
    check_negation_scope_inner(root, &outside, diagnostics);
}

fn check_negation_scope_inner(
    condition: &Condition,
    outside: &HashSet<SmolStr>,
    diagnostics: &mut Vec<Diag>,
) {
    if let Condition::Not { child, span } = condition {
        for var in producible(child) {
            if !outside.contains(&var) {
                diagnostics.push(
                    Diag::error(format!("NOT cannot introduce variable ?{var}"))
                        .with_label(span.clone(), "variable first bound under NOT")
                        .with_code("V005"),
                );
            }
        }
        // Nested NOTs inside this subtree are covered by the check above.
        return;
    }
    for child in condition.children() {
        check_negation_scope_inner(child, outside, diagnostics);
    }
}

fn check_order_by(query: &Query, registry: &VariableRegistry, diagnostics: &mut Vec<Diag>) {
    let aliases: HashSet<&SmolStr> = query.select.iter().filter_map(SelectItem::alias).collect();
    let selects_wildcard = query
        .select
        .iter()
        .any(|item| matches!(item, SelectItem::Wildcard { .. }));
    let selected_vars: HashSet<&SmolStr> = query
        .select
        .iter()
        .flat_map(SelectItem::consumed_variables)
        .collect();

    for spec in &query.order_by {
        if spec.field.is_empty() {
            diagnostics.push(
                Diag::error("ORDER BY field must be non-empty")
                    .with_label(spec.span.clone(), "here")
                    .with_code("V007"),
            );
            continue;
        }

        let valid = if let Some(var) = spec.field.strip_prefix('?') {
            let var = SmolStr::new(var);
            selected_vars.contains(&var) || (selects_wildcard && registry.contains(&var))
        } else {
            spec.field == "document_id" || aliases.contains(&spec.field)
        };

        if !valid {
            diagnostics.push(
                Diag::error(format!(
                    "ORDER BY field `{}` is not a selected variable, alias, or document_id",
                    spec.field
                ))
                .with_label(spec.span.clone(), "unknown sort field")
                .with_code("V007"),
            );
        }
    }
}

fn check_limit(query: &Query, diagnostics: &mut Vec<Diag>) {
    if query.limit == Some(0) {
        diagnostics.push(
            Diag::error("LIMIT must be positive")
                .with_label(query.span.clone(), "in this query")
                .with_code("V008"),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::tokenize;
    use crate::parser::Parser;

    fn validate(source: &str) -> ValidationOutcome {
        let lexed = tokenize(source);
        let parsed = Parser::new(lexed.tokens, source)
            .with_lexer_diagnostics(lexed.diagnostics)
            .parse();
        let query = parsed.ast.expect("query should parse");
        SemanticValidator::new().validate(&query)
    }

    fn error_codes(outcome: &ValidationOutcome) -> Vec<&str> {
        outcome
            .diagnostics
            .iter()
            .filter(|d| d.is_error())
            .filter_map(|d| d.code.as_deref())
            .collect()
    }

    #[test]
    fn valid_query_produces_registry() {
        let outcome = validate(
            r#"SELECT ?p FROM c WHERE NER(PERSON, ?p) AND CONTAINS("president")"#,
        );
        assert!(outcome.is_valid());
        let registry = outcome.registry.unwrap();
        let info = registry.get("p").unwrap();
        assert_eq!(info.ty, VarType::Entity);
        assert_eq!(info.ner_labels, vec![NerType::Person]);
        assert_eq!(info.consumers.len(), 1);
    }

    #[test]
    fn unknown_entity_type_is_rejected() {
        let outcome = validate("SELECT ?p FROM c WHERE NER(WIZARD, ?p)");
        assert!(!outcome.is_valid());
        assert!(error_codes(&outcome).contains(&"V001"));
    }

    #[test]
    fn entity_type_is_case_insensitive() {
        let outcome = validate("SELECT ?p FROM c WHERE NER(person, ?p)");
        assert!(outcome.is_valid());
    }

    #[test]
    fn empty_contains_term_is_rejected() {
        let outcome = validate(r#"SELECT * FROM c WHERE CONTAINS("")"#);
        assert!(!outcome.is_valid());
        assert!(error_codes(&outcome).contains(&"V002"));
    }

    #[test]
    fn inverted_between_is_rejected() {
        let outcome = validate("SELECT ?d FROM c WHERE DATE(?d, BETWEEN 2010 AND 2001)");
        assert!(!outcome.is_valid());
        assert!(error_codes(&outcome).contains(&"V003"));
    }

    #[test]
    fn conflicting_variable_types_are_rejected() {
        let outcome = validate(
            "SELECT ?x FROM c WHERE NER(PERSON, ?x) AND DATE(?x, = 2005)",
        );
        assert!(!outcome.is_valid());
        assert!(error_codes(&outcome).contains(&"V004"));
    }

    #[test]
    fn entity_labels_unify_across_producers() {
        let outcome = validate(
            "SELECT ?p FROM c WHERE NER(PERSON, ?p) OR NER(ORGANIZATION, ?p)",
        );
        assert!(outcome.is_valid());
        let registry = outcome.registry.unwrap();
        assert_eq!(
            registry.get("p").unwrap().ner_labels,
            vec![NerType::Person, NerType::Organization]
        );
    }

    #[test]
    fn not_cannot_introduce_variables() {
        let outcome = validate(r#"SELECT * FROM c WHERE NOT NER(PERSON, ?p)"#);
        assert!(!outcome.is_valid());
        assert!(error_codes(&outcome).contains(&"V005"));
    }

    #[test]
    fn not_may_reuse_outside_variables() {
        let outcome = validate(
            r#"SELECT ?p FROM c WHERE NER(PERSON, ?p) AND NOT NER(PERSON, ?p)"#,
        );
        assert!(outcome.is_valid());
    }

    #[test]
    fn variable_unbound_on_one_branch_is_rejected() {
        let outcome = validate(
            r#"SELECT ?p FROM c WHERE NER(PERSON, ?p) OR CONTAINS("president")"#,
        );
        assert!(!outcome.is_valid());
        assert!(error_codes(&outcome).contains(&"V006"));
    }

    #[test]
    fn undefined_select_variable_is_rejected() {
        let outcome = validate(r#"SELECT ?ghost FROM c WHERE CONTAINS("x")"#);
        assert!(!outcome.is_valid());
        assert!(error_codes(&outcome).contains(&"V006"));
    }

    #[test]
    fn order_by_accepts_selected_vars_aliases_and_document_id() {
        let outcome = validate(
            "SELECT ?p, SNIPPET(?p) AS snip FROM c WHERE NER(PERSON, ?p) \
             ORDER BY ?p ASC, snip DESC, document_id ASC",
        );
        assert!(outcome.is_valid());
    }

    #[test]
    fn order_by_unknown_field_is_rejected() {
        let outcome =
            validate("SELECT ?p FROM c WHERE NER(PERSON, ?p) ORDER BY ?other ASC");
        assert!(!outcome.is_valid());
        assert!(error_codes(&outcome).contains(&"V007"));
    }

    #[test]
    fn zero_limit_is_rejected() {
        let outcome = validate(r#"SELECT * FROM c WHERE CONTAINS("x") LIMIT 0"#);
        assert!(!outcome.is_valid());
        assert!(error_codes(&outcome).contains(&"V008"));
    }

    #[test]
    fn count_mixed_with_row_items_is_rejected() {
        let outcome = validate("SELECT ?p, COUNT(*) FROM c WHERE NER(PERSON, ?p)");
        assert!(!outcome.is_valid());
        assert!(error_codes(&outcome).contains(&"V009"));
    }

    #[test]
    fn future_date_is_a_warning_not_an_error() {
        let outcome = validate("SELECT ?d FROM c WHERE DATE(?d, = 2999)");
        assert!(outcome.is_valid());
        assert!(outcome.diagnostics.iter().any(|d| !d.is_error()));
    }

    #[test]
    fn dependency_variables_are_term_typed() {
        let outcome = validate(r#"SELECT ?g FROM c WHERE DEP(?g, "nsubj", "won")"#);
        assert!(outcome.is_valid());
        let registry = outcome.registry.unwrap();
        assert_eq!(registry.get("g").unwrap().ty, VarType::Term);
    }
}
