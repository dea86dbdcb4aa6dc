#![forbid(unsafe_code)]

//! A rule engine core for a static code security and privacy scanner: structural pattern
//! matching, boolean filter evaluation, and scope-aware cross-rule references over an
//! AST-described source file.
//!
//! This crate is library-only. It has no opinion about where rule YAML comes from beyond an
//! optional external directory (see [`rules::LoaderConfig`]), how files are walked, or how
//! results are rendered; those are the concerns of a caller one layer up.

pub mod ast;
pub mod detection;
pub mod engine;
pub mod error;
pub mod filter;
pub mod pattern;
pub mod rules;
pub mod scope;
pub mod types;

pub use detection::{DataType, Detection, DetectionStore, Location};
pub use engine::scan;
pub use error::{CompileError, EngineError, Error, LoadError};
pub use rules::{LoadRulesResult, LoaderConfig, Rule, RuleLoader};
pub use types::{Language, RuleId, Severity};
