//! Structural matching of a compiled template against a concrete AST.

use crate::ast::{Node, SyntaxTree, METAVARIABLE};
use std::collections::HashMap;

/// Bindings produced by a successful match: metavariable name to the concrete node it captured.
pub type MetaVarEnv<'c> = HashMap<String, Node<'c>>;

/// One successful match of a compiled pattern against the target AST.
#[derive(Debug)]
pub struct Match<'c> {
    pub root: Node<'c>,
    pub bindings: MetaVarEnv<'c>,
}

/// Attempts to match `template` against `candidate`, extending `env` with any metavariable
/// bindings made along the way. Two nodes match iff either the template node is a
/// metavariable wildcard (binds, or checks text-equality against a prior binding of the same
/// name), or their kinds agree and all children match in order. This minimal language has no
/// "insignificant" children (no whitespace/comment/paren nodes survive parsing), so no
/// additional skipping logic is needed here; a richer grammar would filter those out of
/// `children()` before the positional comparison below.
pub fn try_match<'t, 'c>(template: Node<'t>, candidate: Node<'c>, env: &mut MetaVarEnv<'c>) -> bool {
    if template.kind() == METAVARIABLE {
        let name = template.metavar_name().expect("metavariable node always carries a name");
        if let Some(existing) = env.get(name) {
            return existing.text() == candidate.text();
        }
        env.insert(name.to_string(), candidate);
        return true;
    }

    if template.kind() != candidate.kind() {
        return false;
    }

    let template_children: Vec<_> = template.children().collect();
    let candidate_children: Vec<_> = candidate.children().collect();
    if template_children.len() != candidate_children.len() {
        return false;
    }

    for (t, c) in template_children.iter().zip(candidate_children.iter()) {
        if !try_match(*t, *c, env) {
            return false;
        }
    }
    true
}

/// Enumerates every match of `template` against `ast`: matching is attempted at every node
/// whose kind equals the template root's kind, in pre-order, so matches come out in a stable
/// order keyed by the candidate's node id.
pub fn enumerate_matches<'t, 'c>(template: Node<'t>, ast: &'c SyntaxTree) -> Vec<Match<'c>> {
    let mut out = Vec::new();
    let root_kind = template.kind();
    let mut stack = vec![ast.root()];
    // Explicit stack, visiting children in order, to keep pre-order without relying on
    // recursion depth matching the target file's nesting.
    let mut ordered = Vec::new();
    while let Some(node) = stack.pop() {
        ordered.push(node);
        let children: Vec<_> = node.children().collect();
        for child in children.into_iter().rev() {
            stack.push(child);
        }
    }
    ordered.sort_by_key(|n| n.pre_order_index());

    for candidate in ordered {
        if candidate.kind() != root_kind {
            continue;
        }
        let mut env = MetaVarEnv::new();
        if try_match(template, candidate, &mut env) {
            out.push(Match { root: candidate, bindings: env });
        }
    }
    out
}
