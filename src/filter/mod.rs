//! Filter Evaluator: the boolean predicate layer consulted after a structural match, before a
//! detection is recorded.

pub mod evaluator;

pub use evaluator::{evaluate, EvalContext};
