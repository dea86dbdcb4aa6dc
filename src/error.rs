//! Error types for the rule engine.
//!
//! Follows the taxonomy laid out for the engine: load-time errors are fatal and surface to the
//! caller with the offending rule id and path; per-rule compile errors are recoverable (the
//! loader drops the rule and records a diagnostic); there is no `EvalError` category, since
//! predicate evaluation on mismatched data yields `false`, never an error.

use crate::types::RuleId;
use std::path::PathBuf;

/// Errors that abort rule loading entirely.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("failed to parse rule file {path}: {detail}")]
    Parse { path: PathBuf, detail: String },

    #[error("duplicate rule id: {0}")]
    Duplicate(RuleId),

    #[error("rule {id} references undefined rule {target}")]
    UnresolvedReference { id: RuleId, target: RuleId },

    #[error("cyclic rule references: {}", render_cycle(.0))]
    Cycle(Vec<RuleId>),

    #[error("rule set requires version {required}, have {have}")]
    VersionMismatch { required: String, have: String },
}

fn render_cycle(ids: &[RuleId]) -> String {
    ids.iter()
        .map(RuleId::as_str)
        .collect::<Vec<_>>()
        .join(" -> ")
}

/// Errors compiling a single rule's patterns. Recoverable: the loader may drop the rule and
/// continue, recording the failure in [`crate::rules::loader::Diagnostics`].
#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum CompileError {
    #[error("rule {rule_id} pattern #{pattern_index} failed to parse")]
    ParseFailed { rule_id: RuleId, pattern_index: usize },

    #[error("unknown focus metavariable: ${0}")]
    UnknownFocus(String),

    #[error("duplicate metavariable name: ${0}")]
    DuplicateMetavar(String),
}

/// Errors that can occur while scanning a single file.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("scan cancelled")]
    Cancelled,

    /// Indicates a bug in the engine itself: an invariant that should be unreachable was
    /// violated (e.g. the Detection Store was asked to index an unknown rule id).
    #[error("internal invariant violation: {0}")]
    Invariant(String),
}

/// Top-level error type for the crate.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("load error: {0}")]
    Load(#[from] LoadError),

    #[error("engine error: {0}")]
    Engine(#[from] EngineError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
