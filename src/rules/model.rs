//! The Rule data model: the typed shape of a loaded rule, independent of its YAML surface
//! (see [`crate::rules::yaml`] for the polymorphic deserialization forms).

use crate::types::{Language, MetaVarName, RuleId, Severity};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Classification of a rule, mirroring the upstream `type` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleType {
    Risk,
    Verifier,
    Shared,
}

/// When a rule's trigger fires, given the per-pattern detections collected during a scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerMatchOn {
    /// Report if at least one detection exists.
    Presence,
    /// Report if exactly zero detections exist.
    Absence,
    /// Report only detections whose propagated data types include a `stored = true` type.
    StoredDataTypes,
}

impl Default for TriggerMatchOn {
    fn default() -> Self {
        TriggerMatchOn::Presence
    }
}

/// Controls how per-pattern matches become reported detections.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Trigger {
    #[serde(default)]
    pub match_on: TriggerMatchOn,
    #[serde(default)]
    pub data_types_required: bool,
    #[serde(default)]
    pub required_detection: Option<RuleId>,
}

/// An external dependency a rule is conditioned on (e.g. only relevant if a gem/package of a
/// given name and minimum version is present). The dependency manifest itself is read by an
/// external collaborator; the rule engine only carries the declared requirement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DependencyRequirement {
    pub filename: String,
    pub name: String,
    pub min_version: Option<String>,
}

/// Rule metadata that does not affect matching but is carried through to the final report.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RuleMetadata {
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub remediation: Option<String>,
    #[serde(default)]
    pub cwe_ids: Vec<String>,
    #[serde(default)]
    pub recipe: Option<String>,
    #[serde(default)]
    pub documentation_url: Option<String>,
}

/// A named pattern definition: the unit the Rule Loader materializes and the Rule Engine
/// Driver evaluates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rule {
    pub id: RuleId,
    #[serde(rename = "type", default = "default_rule_type")]
    pub rule_type: RuleType,
    #[serde(default)]
    pub languages: Vec<Language>,
    pub patterns: Vec<RulePattern>,
    #[serde(default)]
    pub auxiliary: bool,
    #[serde(default)]
    pub severity: Severity,
    #[serde(default, flatten)]
    pub metadata: RuleMetadata,
    #[serde(default)]
    pub trigger: Trigger,
    #[serde(default)]
    pub stored: bool,
    #[serde(default)]
    pub detect_presence: bool,
    #[serde(default)]
    pub auto_encrypt_prefix: Option<String>,
    #[serde(default)]
    pub skip_data_types: Vec<String>,
    #[serde(default)]
    pub only_data_types: Vec<String>,
    #[serde(default)]
    pub has_detailed_context: bool,
    #[serde(default)]
    pub sanitizer: Option<RuleId>,
    #[serde(default)]
    pub dependency_check: bool,
    #[serde(default)]
    pub dependency: Option<DependencyRequirement>,
    /// Rules that must be evaluated before this one (it references their detections).
    #[serde(default)]
    pub imports: Vec<RuleId>,
    /// Classifier rules whose auxiliary detections supply this rule's data types.
    #[serde(default)]
    pub detectors: Vec<RuleId>,
}

fn default_rule_type() -> RuleType {
    RuleType::Risk
}

impl Rule {
    /// Every rule id this rule's patterns reference, by walking its filter trees plus the
    /// explicit `imports`/`detectors`/`sanitizer` fields. Used to build the reference graph for
    /// topological sort and cycle detection.
    pub fn referenced_rule_ids(&self) -> HashSet<RuleId> {
        let mut out: HashSet<RuleId> = self.imports.iter().cloned().collect();
        out.extend(self.detectors.iter().cloned());
        if let Some(san) = &self.sanitizer {
            out.insert(san.clone());
        }
        if let Some(req) = &self.trigger.required_detection {
            out.insert(req.clone());
        }
        for pattern in &self.patterns {
            for filter in &pattern.filters {
                collect_filter_references(filter, &mut out);
            }
        }
        out
    }

    /// Does this rule apply to a file in `language` (or is it a languages-agnostic rule)?
    pub fn applies_to_language(&self, language: Language) -> bool {
        self.languages.is_empty() || self.languages.contains(&language)
    }
}

fn collect_filter_references(filter: &PatternFilter, out: &mut HashSet<RuleId>) {
    match filter {
        PatternFilter::Not(inner) => collect_filter_references(inner, out),
        PatternFilter::Either(filters) => {
            for f in filters {
                collect_filter_references(f, out);
            }
        }
        PatternFilter::Reference(reference) => {
            out.insert(reference.detection.clone());
            for f in &reference.filters {
                collect_filter_references(f, out);
            }
        }
        _ => {}
    }
}

/// One pattern of a rule: a source fragment with metavariable placeholders plus the filters
/// that must all hold for a structural match to become a detection.
///
/// Deserialized via [`crate::rules::yaml`]: YAML accepts either a bare string shorthand
/// (`{pattern: <string>, filters: []}`) or the structured object below.
#[derive(Debug, Clone, Serialize)]
pub struct RulePattern {
    pub pattern: String,
    #[serde(default)]
    pub focus: Option<MetaVarName>,
    #[serde(default)]
    pub filters: Vec<PatternFilter>,
}

/// `cursor_strict ⊆ cursor ⊆ nested`, `nested_strict = nested \ {v}`, and `result` referring to
/// the chaining detection's own focus node. See [`crate::scope`] for the resolution algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scope {
    CursorStrict,
    Cursor,
    Nested,
    NestedStrict,
    Result,
}

impl Default for Scope {
    fn default() -> Self {
        Scope::Nested
    }
}

/// Renames an outer variable to an inner detection's binding when evaluating a Reference
/// filter's nested filters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Import {
    pub variable: MetaVarName,
    pub r#as: MetaVarName,
}

/// `{variable, detection: rule_id, scope, imports, filters}` — matches when some detection of
/// `detection` exists within `scope` of `variable`'s bound node.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReferenceFilter {
    pub variable: MetaVarName,
    pub detection: RuleId,
    #[serde(default)]
    pub scope: Scope,
    #[serde(default)]
    pub imports: Vec<Import>,
    #[serde(default)]
    pub filters: Vec<PatternFilter>,
}

/// A boolean filter expression evaluated against a candidate match's metavariable bindings.
///
/// Deliberately a flat tagged sum, not a class hierarchy: the evaluator's `match` over this
/// enum is exhaustive, so adding a variant is a compile error everywhere it must be handled.
/// `Deserialize` is implemented by hand in [`crate::rules::yaml`] since the real YAML surface
/// distinguishes variants by which keys are present, not by an explicit tag.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind")]
pub enum PatternFilter {
    Not(Box<PatternFilter>),
    Either(Vec<PatternFilter>),
    Reference(ReferenceFilter),
    Regex { variable: MetaVarName, regex: String },
    StringRegex { variable: MetaVarName, string_regex: String },
    Values { variable: MetaVarName, values: Vec<String> },
    LessThan { variable: MetaVarName, less_than: f64 },
    LessThanOrEqual { variable: MetaVarName, less_than_or_equal: f64 },
    GreaterThan { variable: MetaVarName, greater_than: f64 },
    GreaterThanOrEqual { variable: MetaVarName, greater_than_or_equal: f64 },
    LengthLessThan { variable: MetaVarName, length_less_than: usize },
    FilenameRegex { filename_regex: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn referenced_rule_ids_walks_nested_filters() {
        let rule = Rule {
            id: RuleId::from("r3"),
            rule_type: RuleType::Risk,
            languages: vec![],
            auxiliary: false,
            severity: Severity::Low,
            metadata: RuleMetadata::default(),
            trigger: Trigger::default(),
            stored: false,
            detect_presence: false,
            auto_encrypt_prefix: None,
            skip_data_types: vec![],
            only_data_types: vec![],
            has_detailed_context: false,
            sanitizer: Some(RuleId::from("san")),
            dependency_check: false,
            dependency: None,
            imports: vec![],
            detectors: vec![],
            patterns: vec![RulePattern {
                pattern: "Tracer.in_span($_, attributes: $A)".into(),
                focus: None,
                filters: vec![PatternFilter::Reference(ReferenceFilter {
                    variable: "A".into(),
                    detection: RuleId::from("aux"),
                    scope: Scope::Nested,
                    imports: vec![],
                    filters: vec![],
                })],
            }],
        };
        let refs = rule.referenced_rule_ids();
        assert!(refs.contains(&RuleId::from("aux")));
        assert!(refs.contains(&RuleId::from("san")));
    }

    #[test]
    fn scope_default_is_nested() {
        assert_eq!(Scope::default(), Scope::Nested);
    }
}
