//! The Filter Evaluator: interprets a rule pattern's boolean filter expression tree against a
//! candidate match's metavariable bindings.

use crate::ast::{Node, SyntaxTree, STRING};
use crate::detection::DetectionStore;
use crate::rules::model::PatternFilter;
use crate::scope;
use std::collections::HashMap;

/// Everything a filter needs to evaluate: the file's AST and path, the Detection Store built
/// up so far by earlier (already-evaluated) rules, the current metavariable bindings, and —
/// when this evaluation is itself nested inside a Reference filter's evaluation of an inner
/// detection — that detection's own node, used to resolve the `result` scope.
pub struct EvalContext<'c, 's> {
    pub tree: &'c SyntaxTree,
    pub file: &'c str,
    pub store: &'s DetectionStore<'c>,
    pub bindings: &'s HashMap<String, Node<'c>>,
    pub result_anchor: Option<Node<'c>>,
}

/// Evaluates a single filter. All variants are total: a leaf predicate whose variable is
/// unbound, or whose bound text cannot be interpreted as required (e.g. non-numeric text for a
/// numeric predicate), evaluates to `false`, never an error — there is no `EvalError` category.
pub fn evaluate(filter: &PatternFilter, ctx: &EvalContext<'_, '_>) -> bool {
    match filter {
        PatternFilter::Not(inner) => !evaluate(inner, ctx),
        PatternFilter::Either(filters) => filters.iter().any(|f| evaluate(f, ctx)),
        PatternFilter::Reference(reference) => evaluate_reference(reference, ctx),
        PatternFilter::Regex { variable, regex } => bound_text(ctx, variable.as_str())
            .and_then(|text| regex::Regex::new(regex).ok().map(|re| re.is_match(text)))
            .unwrap_or(false),
        PatternFilter::StringRegex { variable, string_regex } => {
            bound_string_literal(ctx, variable.as_str())
                .and_then(|text| regex::Regex::new(string_regex).ok().map(|re| re.is_match(text)))
                .unwrap_or(false)
        }
        PatternFilter::Values { variable, values } => bound_text(ctx, variable.as_str())
            .map(|text| values.iter().any(|v| v == text))
            .unwrap_or(false),
        PatternFilter::LessThan { variable, less_than } => {
            bound_number(ctx, variable.as_str()).map(|n| n < *less_than).unwrap_or(false)
        }
        PatternFilter::LessThanOrEqual { variable, less_than_or_equal } => {
            bound_number(ctx, variable.as_str()).map(|n| n <= *less_than_or_equal).unwrap_or(false)
        }
        PatternFilter::GreaterThan { variable, greater_than } => {
            bound_number(ctx, variable.as_str()).map(|n| n > *greater_than).unwrap_or(false)
        }
        PatternFilter::GreaterThanOrEqual { variable, greater_than_or_equal } => {
            bound_number(ctx, variable.as_str())
                .map(|n| n >= *greater_than_or_equal)
                .unwrap_or(false)
        }
        PatternFilter::LengthLessThan { variable, length_less_than } => {
            bound_text(ctx, variable.as_str())
                .map(|text| text.chars().count() < *length_less_than)
                .unwrap_or(false)
        }
        PatternFilter::FilenameRegex { filename_regex } => {
            let path = ctx.file.replace('\\', "/");
            regex::Regex::new(filename_regex).map(|re| re.is_match(&path)).unwrap_or(false)
        }
    }
}

fn evaluate_reference(
    reference: &crate::rules::model::ReferenceFilter,
    ctx: &EvalContext<'_, '_>,
) -> bool {
    let Some(&variable_node) = ctx.bindings.get(reference.variable.as_str()) else {
        return false;
    };
    let scope_set =
        scope::candidate_nodes(ctx.tree, variable_node, reference.scope, ctx.result_anchor);
    let candidates = ctx.store.within(&reference.detection, &scope_set);

    candidates.iter().any(|inner_detection| {
        let mut inner_bindings = HashMap::new();
        for import in &reference.imports {
            if let Some(&node) = inner_detection.bindings.get(import.r#as.as_str()) {
                inner_bindings.insert(import.variable.as_str().to_string(), node);
            }
        }
        let inner_ctx = EvalContext {
            tree: ctx.tree,
            file: ctx.file,
            store: ctx.store,
            bindings: &inner_bindings,
            result_anchor: Some(inner_detection.node),
        };
        reference.filters.iter().all(|f| evaluate(f, &inner_ctx))
    })
}

fn bound_text<'c>(ctx: &EvalContext<'c, '_>, variable: &str) -> Option<&'c str> {
    ctx.bindings.get(variable).map(|n| n.text())
}

fn bound_number(ctx: &EvalContext<'_, '_>, variable: &str) -> Option<f64> {
    bound_text(ctx, variable).and_then(|t| t.parse::<f64>().ok())
}

/// Text of a string-literal node with its surrounding quotes stripped; `None` if the bound
/// node isn't a string literal at all (not a type mismatch error — the caller treats `None`
/// the same as any other predicate miss).
fn bound_string_literal<'c>(ctx: &EvalContext<'c, '_>, variable: &str) -> Option<&'c str> {
    let node = ctx.bindings.get(variable)?;
    if node.kind() != STRING {
        return None;
    }
    let text = node.text();
    text.strip_prefix('"').and_then(|t| t.strip_suffix('"'))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::parse;
    use crate::rules::model::{Import, ReferenceFilter, Scope};
    use crate::types::{Language, RuleId};

    fn ctx<'c>(
        tree: &'c SyntaxTree,
        store: &'c DetectionStore<'c>,
        bindings: &'c HashMap<String, Node<'c>>,
    ) -> EvalContext<'c, 'c> {
        EvalContext { tree, file: "f.rb", store, bindings, result_anchor: None }
    }

    #[test]
    fn not_inverts() {
        let tree = parse("sleep(5)", Language::Ruby).unwrap();
        let bindings = HashMap::new();
        let store = DetectionStore::new();
        let filter = PatternFilter::Not(Box::new(PatternFilter::FilenameRegex {
            filename_regex: "nonexistent".into(),
        }));
        assert!(evaluate(&filter, &ctx(&tree, &store, &bindings)));
    }

    #[test]
    fn either_empty_is_false() {
        let tree = parse("sleep(5)", Language::Ruby).unwrap();
        let bindings = HashMap::new();
        let store = DetectionStore::new();
        let filter = PatternFilter::Either(vec![]);
        assert!(!evaluate(&filter, &ctx(&tree, &store, &bindings)));
    }

    #[test]
    fn numeric_type_mismatch_is_false_not_error() {
        let tree = parse("sleep(x)", Language::Ruby).unwrap();
        let root = tree.pattern_root();
        let n_node = root.child(1).unwrap();
        let mut bindings = HashMap::new();
        bindings.insert("N".to_string(), n_node);
        let store = DetectionStore::new();
        let filter = PatternFilter::LessThan { variable: "N".into(), less_than: 10.0 };
        assert!(!evaluate(&filter, &ctx(&tree, &store, &bindings)));
    }

    #[test]
    fn numeric_less_than_matches() {
        let tree = parse("sleep(5)", Language::Ruby).unwrap();
        let root = tree.pattern_root();
        let n_node = root.child(1).unwrap();
        let mut bindings = HashMap::new();
        bindings.insert("N".to_string(), n_node);
        let store = DetectionStore::new();
        let filter = PatternFilter::LessThan { variable: "N".into(), less_than: 10.0 };
        assert!(evaluate(&filter, &ctx(&tree, &store, &bindings)));
    }

    #[test]
    fn reference_matches_when_inner_detection_in_scope() {
        let tree = parse(
            r#"Tracer.in_span("x", attributes: { "d" => DateTime.now }) do |s| end"#,
            Language::Ruby,
        )
        .unwrap();
        let root = tree.pattern_root();
        let keyword_arg = root.child(2).unwrap();
        let hash = keyword_arg.child(1).unwrap();
        let pair = hash.child(0).unwrap();
        let aux_node = pair.child(1).unwrap(); // DateTime.now

        let mut store = DetectionStore::new();
        let aux_id = RuleId::from("Aux");
        store.insert(crate::detection::Detection::new(
            aux_id.clone(),
            aux_node,
            "f.rb",
            HashMap::new(),
            0,
        ));

        let mut bindings = HashMap::new();
        bindings.insert("A".to_string(), keyword_arg.child(1).unwrap()); // the hash is $A

        let reference = ReferenceFilter {
            variable: "A".into(),
            detection: aux_id,
            scope: Scope::Nested,
            imports: vec![],
            filters: vec![],
        };
        let filter = PatternFilter::Reference(reference);
        assert!(evaluate(&filter, &ctx(&tree, &store, &bindings)));
    }

    #[test]
    fn reference_renames_bindings_via_imports() {
        let tree = parse("render(escape(user))", Language::Ruby).unwrap();
        let root = tree.pattern_root();
        let escape_call = root.child(1).unwrap();
        let user_node = escape_call.child(1).unwrap();

        let mut store = DetectionStore::new();
        let san_id = RuleId::from("San");
        let mut san_bindings = HashMap::new();
        san_bindings.insert("X".to_string(), user_node);
        store.insert(crate::detection::Detection::new(
            san_id.clone(),
            escape_call,
            "f.rb",
            san_bindings,
            0,
        ));

        let mut bindings = HashMap::new();
        bindings.insert("Y".to_string(), escape_call);

        let reference = ReferenceFilter {
            variable: "Y".into(),
            detection: san_id,
            scope: Scope::CursorStrict,
            imports: vec![Import { variable: "inner".into(), r#as: "X".into() }],
            filters: vec![PatternFilter::Values {
                variable: "inner".into(),
                values: vec!["user".to_string()],
            }],
        };
        let filter = PatternFilter::Reference(reference);
        assert!(evaluate(&filter, &ctx(&tree, &store, &bindings)));
    }
}
