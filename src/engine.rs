//! The Rule Engine Driver: ties the Pattern Compiler, Filter Evaluator, Scope Resolver and
//! Detection Store together into the `scan(rules, file, ast) -> Vec<Detection>` contract.

use crate::ast::SyntaxTree;
use crate::detection::{DataType, Detection, DetectionStore, Location};
use crate::error::EngineError;
use crate::filter::{self, EvalContext};
use crate::pattern;
use crate::rules::model::{Rule, Scope, TriggerMatchOn};
use crate::types::RuleId;
use std::collections::HashMap;

/// Scans one file's AST against an already-loaded, topologically-ordered rule set.
///
/// `rules` must already be in the order [`crate::rules::loader::RuleLoader::load`] produces
/// (topological layer, then rule id ascending) — the emission order this function guarantees
/// depends on it. `cancel` is polled between rules, never mid-rule; on cancellation nothing is
/// returned, matching the "no partial emission" contract.
pub fn scan<'c>(
    rules: &[Rule],
    file: &str,
    ast: &'c SyntaxTree,
    cancel: &dyn Fn() -> bool,
) -> Result<Vec<Detection<'c>>, EngineError> {
    let language = ast.language();
    let applicable: Vec<&Rule> = rules.iter().filter(|r| r.applies_to_language(language)).collect();
    let by_id: HashMap<&RuleId, &Rule> = rules.iter().map(|r| (&r.id, r)).collect();

    let mut store = DetectionStore::new();

    for rule in &applicable {
        if cancel() {
            return Err(EngineError::Cancelled);
        }
        collect_rule_detections(rule, language, file, ast, &mut store);
    }

    attach_data_types(&applicable, &by_id, ast, &mut store);

    Ok(apply_triggers(&applicable, file, ast, &store))
}

fn collect_rule_detections<'c>(
    rule: &Rule,
    language: crate::types::Language,
    file: &str,
    ast: &'c SyntaxTree,
    store: &mut DetectionStore<'c>,
) {
    for (pattern_index, rule_pattern) in rule.patterns.iter().enumerate() {
        let compiled = match pattern::compile(rule_pattern, language, &rule.id, pattern_index) {
            Ok(compiled) => compiled,
            // A rule that reached the engine already passed load-time compile validation
            // (`rules::loader::validate_patterns_compile`); a failure here would mean the rule
            // set given to `scan` skipped that step. Skip the pattern rather than fail the scan.
            Err(_) => continue,
        };

        for candidate in pattern::enumerate_matches(compiled.template_root(), ast) {
            let ctx = EvalContext {
                tree: ast,
                file,
                store,
                bindings: &candidate.bindings,
                result_anchor: None,
            };
            if !compiled.filters.iter().all(|f| filter::evaluate(f, &ctx)) {
                continue;
            }

            let focus_node = compiled
                .focus
                .as_ref()
                .and_then(|name| candidate.bindings.get(name))
                .copied()
                .unwrap_or(candidate.root);

            if let Some(sanitizer_id) = &rule.sanitizer {
                let dominated =
                    store.get(sanitizer_id).iter().any(|d| focus_node.is_descendant_of(&d.node));
                if dominated {
                    continue;
                }
            }

            let mut detection =
                Detection::new(rule.id.clone(), focus_node, file, candidate.bindings, pattern_index);
            detection.auxiliary = rule.auxiliary;
            store.insert(detection);
        }
    }
}

/// For every rule with a non-empty `detectors` list, attaches the `DataType`s produced by those
/// classifier rules' auxiliary detections that fall within (`nested` scope of) each of the
/// rule's own detections, honoring `only_data_types`/`skip_data_types` filtering.
fn attach_data_types<'c>(
    applicable: &[&Rule],
    by_id: &HashMap<&RuleId, &Rule>,
    ast: &'c SyntaxTree,
    store: &mut DetectionStore<'c>,
) {
    for rule in applicable {
        if rule.detectors.is_empty() {
            continue;
        }
        let nodes: Vec<_> = store.get(&rule.id).iter().map(|d| d.node).collect();
        let mut per_detection_types = Vec::with_capacity(nodes.len());
        for node in &nodes {
            let scope_set = crate::scope::candidate_nodes(ast, *node, Scope::Nested, None);
            let mut data_types = Vec::new();
            for detector_id in &rule.detectors {
                let detector_stores = rule.stored || by_id.get(detector_id).map(|r| r.stored).unwrap_or(false);
                for detection in store.within(detector_id, &scope_set) {
                    data_types.push(DataType {
                        name: detector_id.as_str().to_string(),
                        category_groups: Vec::new(),
                        stored: detector_stores,
                        locations: vec![Location { line: detection.line, column: detection.column }],
                    });
                }
            }
            if !rule.only_data_types.is_empty() {
                data_types.retain(|dt| rule.only_data_types.contains(&dt.name));
            }
            if !rule.skip_data_types.is_empty() {
                data_types.retain(|dt| !rule.skip_data_types.contains(&dt.name));
            }
            per_detection_types.push(data_types);
        }
        for (detection, data_types) in
            store.get_mut(&rule.id).iter_mut().zip(per_detection_types.into_iter())
        {
            detection.data_types = data_types;
        }
    }
}

fn apply_triggers<'c>(
    applicable: &[&Rule],
    file: &str,
    ast: &'c SyntaxTree,
    store: &DetectionStore<'c>,
) -> Vec<Detection<'c>> {
    let mut output = Vec::new();
    for rule in applicable {
        if rule.auxiliary {
            continue;
        }
        let detections = store.get(&rule.id);
        match rule.trigger.match_on {
            TriggerMatchOn::Presence => {
                let mut reported: Vec<&Detection<'c>> = detections.iter().collect();
                if rule.trigger.data_types_required {
                    reported.retain(|d| !d.data_types.is_empty());
                }
                reported.sort_by_key(|d| (d.node.pre_order_index(), d.pattern_index));
                output.extend(reported.into_iter().cloned());
            }
            TriggerMatchOn::Absence => {
                let target_count = match &rule.trigger.required_detection {
                    Some(target) => store.get(target).len(),
                    None => detections.len(),
                };
                if target_count == 0 {
                    output.push(Detection::new(
                        rule.id.clone(),
                        ast.pattern_root(),
                        file,
                        HashMap::new(),
                        0,
                    ));
                }
            }
            TriggerMatchOn::StoredDataTypes => {
                let mut reported: Vec<&Detection<'c>> =
                    detections.iter().filter(|d| d.data_types.iter().any(|dt| dt.stored)).collect();
                reported.sort_by_key(|d| (d.node.pre_order_index(), d.pattern_index));
                output.extend(reported.into_iter().cloned());
            }
        }
    }
    output
}
