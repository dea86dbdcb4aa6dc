//! Compiles a rule's textual [`RulePattern`]s into matcher trees keyed against AST node shapes.

use crate::ast::{self, SyntaxTree, METAVARIABLE};
use crate::error::CompileError;
use crate::rules::model::{PatternFilter, RulePattern};
use crate::types::{Language, RuleId};
use std::collections::HashSet;

/// A pattern after compilation: its template AST, the focus metavariable (if any), and its
/// filters, unchanged from the rule definition.
pub struct CompiledPattern {
    pub rule_id: RuleId,
    pub pattern_index: usize,
    template: SyntaxTree,
    pub focus: Option<String>,
    pub filters: Vec<PatternFilter>,
}

impl CompiledPattern {
    /// The template's meaningful root node, the kind candidate roots in the target AST must
    /// match.
    pub fn template_root(&self) -> ast::Node<'_> {
        self.template.pattern_root()
    }
}

/// Compiles one [`RulePattern`] belonging to `rule_id` at `pattern_index` in the rule's pattern
/// list, for matching against `language` source.
pub fn compile(
    pattern: &RulePattern,
    language: Language,
    rule_id: &RuleId,
    pattern_index: usize,
) -> Result<CompiledPattern, CompileError> {
    let template = ast::parse(&pattern.pattern, language).map_err(|_| CompileError::ParseFailed {
        rule_id: rule_id.clone(),
        pattern_index,
    })?;

    let names = metavar_names(&template);
    let mut seen = HashSet::new();
    for name in &names {
        if !seen.insert(name.clone()) {
            return Err(CompileError::DuplicateMetavar(name.clone()));
        }
    }

    let focus = match &pattern.focus {
        Some(name) => {
            let name = name.as_str().to_string();
            if !names.contains(&name) {
                return Err(CompileError::UnknownFocus(name));
            }
            Some(name)
        }
        None => None,
    };

    Ok(CompiledPattern {
        rule_id: rule_id.clone(),
        pattern_index,
        template,
        focus,
        filters: pattern.filters.clone(),
    })
}

fn metavar_names(tree: &SyntaxTree) -> Vec<String> {
    let mut out = Vec::new();
    let mut stack = vec![tree.root()];
    while let Some(node) = stack.pop() {
        if node.kind() == METAVARIABLE {
            if let Some(name) = node.metavar_name() {
                out.push(name.to_string());
            }
        }
        stack.extend(node.children());
    }
    out
}
