//! The Scope Resolver: turns a variable's bound node plus a [`Scope`] tag into the set of
//! candidate inner node ids a Reference filter's detections may fall within.

use crate::ast::{Node, NodeId, SyntaxTree};
use crate::rules::model::Scope;
use std::collections::HashSet;

/// `S(v, scope)` from the component design: the set of node ids a detection must land in for
/// a Reference filter naming `scope` to consider it in-scope of `v`.
pub fn candidate_nodes<'c>(
    tree: &'c SyntaxTree,
    variable: Node<'c>,
    scope: Scope,
    result_anchor: Option<Node<'c>>,
) -> HashSet<NodeId> {
    match scope {
        Scope::CursorStrict => HashSet::from([variable.id()]),
        Scope::Cursor => cursor_set(tree, variable),
        Scope::Nested => nested_set(variable),
        Scope::NestedStrict => {
            let mut set = nested_set(variable);
            set.remove(&variable.id());
            set
        }
        Scope::Result => match result_anchor {
            Some(anchor) => HashSet::from([anchor.id()]),
            None => HashSet::new(),
        },
    }
}

/// `v` plus all descendants reachable without crossing into a new lexical binding boundary:
/// the boundary node itself is included (we haven't "entered" it yet), but its children are
/// not visited.
fn cursor_set(tree: &SyntaxTree, variable: Node<'_>) -> HashSet<NodeId> {
    let mut out = HashSet::new();
    let mut stack = vec![variable];
    while let Some(node) = stack.pop() {
        out.insert(node.id());
        if node.id() != variable.id() && tree.is_binding_boundary(&node) {
            continue;
        }
        stack.extend(node.children());
    }
    out
}

/// `v` and every descendant, ignoring binding boundaries entirely.
fn nested_set(variable: Node<'_>) -> HashSet<NodeId> {
    let mut out = HashSet::new();
    let mut stack = vec![variable];
    while let Some(node) = stack.pop() {
        out.insert(node.id());
        stack.extend(node.children());
    }
    out
}

/// Is `d_node` within `S(v, scope)`? Exposed for tests that want to check a single node rather
/// than materialize the whole set, and for the partial-order law checks in [`crate::ast`]
/// round-trip tests.
pub fn contains(
    tree: &SyntaxTree,
    variable: Node<'_>,
    scope: Scope,
    result_anchor: Option<Node<'_>>,
    d_node: NodeId,
) -> bool {
    candidate_nodes(tree, variable, scope, result_anchor).contains(&d_node)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::parse;
    use crate::types::Language;

    #[test]
    fn cursor_strict_is_singleton() {
        let tree = parse("sleep(5)", Language::Ruby).unwrap();
        let root = tree.pattern_root();
        let set = candidate_nodes(&tree, root, Scope::CursorStrict, None);
        assert_eq!(set, HashSet::from([root.id()]));
    }

    #[test]
    fn nested_includes_all_descendants() {
        let tree = parse("logger.info(user.email)", Language::Ruby).unwrap();
        let root = tree.pattern_root();
        let set = candidate_nodes(&tree, root, Scope::Nested, None);
        // root, member_access(logger.info), identifier(logger), identifier(info),
        // member_access(user.email), identifier(user), identifier(email)
        assert_eq!(set.len(), 7);
    }

    #[test]
    fn nested_strict_excludes_v() {
        let tree = parse("sleep(5)", Language::Ruby).unwrap();
        let root = tree.pattern_root();
        let nested = candidate_nodes(&tree, root, Scope::Nested, None);
        let strict = candidate_nodes(&tree, root, Scope::NestedStrict, None);
        assert!(!strict.contains(&root.id()));
        assert!(strict.is_subset(&nested));
        assert_eq!(strict.len() + 1, nested.len());
    }

    #[test]
    fn cursor_stops_at_binding_boundary() {
        let tree = parse("sleep(5) do sleep(10) end", Language::Ruby).unwrap();
        let root = tree.pattern_root();
        let cursor = candidate_nodes(&tree, root, Scope::Cursor, None);
        let nested = candidate_nodes(&tree, root, Scope::Nested, None);
        // cursor includes the block node itself but not the `sleep(10)` call inside it.
        let block = root.children().find(|c| tree.is_binding_boundary(c)).unwrap();
        assert!(cursor.contains(&block.id()));
        assert!(nested.len() > cursor.len());
    }

    #[test]
    fn scope_containment_is_a_partial_order() {
        let tree = parse("sleep(5) do sleep(10) end", Language::Ruby).unwrap();
        let root = tree.pattern_root();
        let strict = candidate_nodes(&tree, root, Scope::CursorStrict, None);
        let cursor = candidate_nodes(&tree, root, Scope::Cursor, None);
        let nested = candidate_nodes(&tree, root, Scope::Nested, None);
        assert!(strict.is_subset(&cursor));
        assert!(cursor.is_subset(&nested));
    }

    #[test]
    fn result_scope_is_empty_without_anchor() {
        let tree = parse("sleep(5)", Language::Ruby).unwrap();
        let root = tree.pattern_root();
        let set = candidate_nodes(&tree, root, Scope::Result, None);
        assert!(set.is_empty());
    }

    #[test]
    fn result_scope_is_anchor_when_chained() {
        let tree = parse("sleep(5)", Language::Ruby).unwrap();
        let root = tree.pattern_root();
        let set = candidate_nodes(&tree, root, Scope::Result, Some(root));
        assert_eq!(set, HashSet::from([root.id()]));
    }
}
