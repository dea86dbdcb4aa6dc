//! The Detection Store: holds per-file detections keyed by rule id and AST node, consulted by
//! the Filter Evaluator to resolve inter-rule references without re-matching.

use crate::ast::{Node, NodeId};
use crate::rules::model::Rule;
use crate::types::{RuleId, Severity};
use serde::Serialize;
use std::collections::{HashMap, HashSet};

/// A tag attached to a detection by a classifier rule (Email Address, SSN, ...), propagated
/// along reference chains.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DataType {
    pub name: String,
    pub category_groups: Vec<String>,
    pub stored: bool,
    pub locations: Vec<Location>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Location {
    pub line: usize,
    pub column: usize,
}

/// A concrete match of a rule against an AST location, with bindings and metadata.
#[derive(Debug, Clone)]
pub struct Detection<'c> {
    pub rule_id: RuleId,
    pub node: Node<'c>,
    pub file: String,
    pub line: usize,
    pub column: usize,
    pub bindings: HashMap<String, Node<'c>>,
    pub data_types: Vec<DataType>,
    pub auxiliary: bool,
    /// Stable per-rule ordering key: (node pre-order index, pattern index within the rule).
    pub pattern_index: usize,
}

impl<'c> Detection<'c> {
    pub fn new(
        rule_id: RuleId,
        node: Node<'c>,
        file: impl Into<String>,
        bindings: HashMap<String, Node<'c>>,
        pattern_index: usize,
    ) -> Self {
        let (line, column) = node.start_position();
        Detection {
            rule_id,
            node,
            file: file.into(),
            line,
            column,
            bindings,
            data_types: Vec::new(),
            auxiliary: false,
            pattern_index,
        }
    }

    /// A serializable, report-facing snapshot of this detection. Requires the owning [`Rule`]
    /// for its severity and `has_detailed_context` flag, neither of which the detection itself
    /// carries.
    pub fn to_report(&self, rule: &Rule) -> DetectionReport {
        let parent_content = if rule.has_detailed_context {
            self.node.enclosing_binding_boundary().text().to_string()
        } else {
            self.node.line_text().to_string()
        };
        let category_groups =
            self.data_types.iter().flat_map(|dt| dt.category_groups.iter().cloned()).collect();
        DetectionReport {
            rule_id: self.rule_id.clone(),
            file: self.file.clone(),
            line: self.line,
            column: self.column,
            parent_content,
            severity: rule.severity,
            category_groups,
            data_types: self.data_types.clone(),
        }
    }
}

/// The shape a consuming report renders: everything a [`Detection`] carries, minus the borrowed
/// AST node and bindings, which have no meaning outside this crate's own process.
#[derive(Debug, Clone, Serialize)]
pub struct DetectionReport {
    pub rule_id: RuleId,
    pub file: String,
    pub line: usize,
    pub column: usize,
    pub parent_content: String,
    pub severity: Severity,
    pub category_groups: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub data_types: Vec<DataType>,
}

/// Append-only within a single file scan; never persists across files.
#[derive(Default)]
pub struct DetectionStore<'c> {
    by_rule: HashMap<RuleId, Vec<Detection<'c>>>,
    seen: HashSet<(RuleId, NodeId)>,
}

impl<'c> DetectionStore<'c> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Idempotent on `(rule_id, node_id)`: inserting the same detection twice is a no-op and
    /// returns `false` the second time.
    pub fn insert(&mut self, detection: Detection<'c>) -> bool {
        let key = (detection.rule_id.clone(), detection.node.id());
        if !self.seen.insert(key) {
            return false;
        }
        self.by_rule.entry(detection.rule_id.clone()).or_default().push(detection);
        true
    }

    pub fn get(&self, rule_id: &RuleId) -> &[Detection<'c>] {
        self.by_rule.get(rule_id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Detections of `rule_id` whose node falls within `scope_set`.
    pub fn within(&self, rule_id: &RuleId, scope_set: &HashSet<NodeId>) -> Vec<&Detection<'c>> {
        self.get(rule_id)
            .iter()
            .filter(|d| scope_set.contains(&d.node.id()))
            .collect()
    }

    pub fn all(&self) -> impl Iterator<Item = &Detection<'c>> {
        self.by_rule.values().flat_map(|v| v.iter())
    }

    pub fn get_mut(&mut self, rule_id: &RuleId) -> &mut Vec<Detection<'c>> {
        self.by_rule.entry(rule_id.clone()).or_default()
    }
}
