#![forbid(unsafe_code)]

//! Core domain types shared across the rule engine.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Source languages a rule's patterns can target.
///
/// An empty `languages` set on a [`crate::rules::model::Rule`] means the rule applies to
/// every file regardless of language (secrets/text rules).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Ruby,
    Rust,
    TypeScript,
    JavaScript,
    Python,
    Go,
}

/// Rule severity, ordered least to most urgent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Warning,
    Low,
    Medium,
    High,
    Critical,
}

impl Default for Severity {
    fn default() -> Self {
        Severity::Low
    }
}

/// A validated rule identifier.
///
/// Rule IDs must be non-empty and contain only alphanumeric characters, hyphens, underscores,
/// and dots (dots separate rule groups, e.g. `ruby_lang.logger`).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RuleId(String);

impl RuleId {
    /// Creates a new `RuleId`, validating the input.
    ///
    /// Returns `None` if the input is empty or contains invalid characters.
    pub fn new(id: impl Into<String>) -> Option<Self> {
        let id = id.into();
        if id.is_empty() {
            return None;
        }
        if !id
            .chars()
            .all(|c| c.is_alphanumeric() || c == '-' || c == '_' || c == '.')
        {
            return None;
        }
        Some(RuleId(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for RuleId {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        RuleId::new(value.clone()).ok_or_else(|| format!("invalid rule id: {value:?}"))
    }
}

impl From<RuleId> for String {
    fn from(rule_id: RuleId) -> Self {
        rule_id.0
    }
}

impl From<&str> for RuleId {
    fn from(s: &str) -> Self {
        RuleId::new(s).unwrap_or_else(|| panic!("invalid rule id literal: {s:?}"))
    }
}

/// A metavariable name (`$NAME` without the sigil).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MetaVarName(String);

impl MetaVarName {
    pub fn new(name: impl Into<String>) -> Self {
        MetaVarName(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MetaVarName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "${}", self.0)
    }
}

impl From<&str> for MetaVarName {
    fn from(s: &str) -> Self {
        MetaVarName::new(s)
    }
}

impl From<String> for MetaVarName {
    fn from(s: String) -> Self {
        MetaVarName::new(s)
    }
}
