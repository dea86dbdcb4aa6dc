//! Rule data model, YAML deserialization surface, embedded built-ins, and the loader that ties
//! them into a validated, topologically-ordered rule set.

pub mod builtin;
pub mod loader;
pub mod model;
mod yaml;

pub use loader::{Diagnostics, LoadRulesResult, LoaderConfig, RuleLoader};
pub use model::{
    DependencyRequirement, Import, PatternFilter, ReferenceFilter, Rule, RuleMetadata,
    RulePattern, RuleType, Scope, Trigger, TriggerMatchOn,
};
