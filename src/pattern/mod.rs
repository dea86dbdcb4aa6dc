//! Pattern Compiler: turns a rule's textual patterns into matcher trees, and runs them against
//! a target AST.

pub mod compiler;
pub mod matcher;

pub use compiler::{compile, CompiledPattern};
pub use matcher::{enumerate_matches, try_match, Match, MetaVarEnv};
