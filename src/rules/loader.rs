//! The Rule Loader: reads built-in and external rule YAML, validates the reference graph, and
//! produces a topologically-ordered rule set ready for the engine.

use crate::error::LoadError;
use crate::rules::builtin;
use crate::rules::model::Rule;
use crate::types::RuleId;
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// The whole of the engine's configuration surface. No TOML project file, no CLI flags, no
/// environment variables: those belong to an external file-walker/CLI layer, not the core.
#[derive(Debug, Clone, Default)]
pub struct LoaderConfig {
    pub external_rules_dir: Option<PathBuf>,
    pub force_refresh: bool,
    pub required_version: &'static str,
}

/// Non-fatal conditions recorded during a successful `load()`: a rule dropped for a recoverable
/// compile error, or an external rule overriding a built-in one. Returned alongside the result
/// rather than logged, since this crate carries no `log`/`tracing` dependency.
#[derive(Debug, Default)]
pub struct Diagnostics {
    pub dropped_rules: Vec<(RuleId, String)>,
    pub overrides: Vec<RuleId>,
}

impl Diagnostics {
    fn warn_override(&mut self, id: RuleId) {
        eprintln!("warning: external rule overrides built-in rule {id}");
        self.overrides.push(id);
    }
}

pub struct LoadRulesResult {
    /// All rules, built-in plus external, in topological evaluation order (if rule A
    /// references rule B, B appears before A; same-layer ties broken by rule id ascending).
    pub rules: Vec<Rule>,
    pub built_in_rules: Vec<RuleId>,
    pub cache_used: bool,
    pub rules_version: String,
    pub diagnostics: Diagnostics,
}

#[derive(Default)]
struct ParseCache {
    entries: HashMap<PathBuf, (SystemTime, Vec<Rule>)>,
}

/// Loads and validates a rule set from embedded built-ins plus an optional external directory.
pub struct RuleLoader {
    config: LoaderConfig,
    cache: ParseCache,
}

impl RuleLoader {
    pub fn new(config: LoaderConfig) -> Self {
        RuleLoader { config, cache: ParseCache::default() }
    }

    pub fn load(&mut self) -> Result<LoadRulesResult, LoadError> {
        if !self.config.required_version.is_empty()
            && self.config.required_version != builtin::RULES_VERSION
        {
            return Err(LoadError::VersionMismatch {
                required: self.config.required_version.to_string(),
                have: builtin::RULES_VERSION.to_string(),
            });
        }

        let mut diagnostics = Diagnostics::default();
        let mut by_id: HashMap<RuleId, Rule> = HashMap::new();
        let mut built_in_ids = Vec::new();

        for (path, text) in builtin::sources() {
            for rule in parse_yaml_rules(Path::new(path), text, &mut diagnostics)? {
                built_in_ids.push(rule.id.clone());
                if by_id.insert(rule.id.clone(), rule).is_some() {
                    return Err(LoadError::Duplicate(built_in_ids.pop().unwrap()));
                }
            }
        }

        let mut cache_used = true;
        if let Some(dir) = self.config.external_rules_dir.clone() {
            for entry in collect_yaml_files(&dir)? {
                let rules = self.parse_external_file(&entry, &mut diagnostics)?;
                cache_used &= !self.config.force_refresh;
                for rule in rules {
                    match by_id.get(&rule.id) {
                        None => {
                            by_id.insert(rule.id.clone(), rule);
                        }
                        Some(existing) if built_in_ids.contains(&existing.id) => {
                            diagnostics.warn_override(rule.id.clone());
                            by_id.insert(rule.id.clone(), rule);
                        }
                        Some(_) => return Err(LoadError::Duplicate(rule.id)),
                    }
                }
            }
        } else {
            cache_used = false;
        }

        validate_references(&by_id)?;
        let ordered = topological_order(&by_id)?;

        Ok(LoadRulesResult {
            rules: ordered,
            built_in_rules: built_in_ids,
            cache_used,
            rules_version: builtin::RULES_VERSION.to_string(),
            diagnostics,
        })
    }

    fn parse_external_file(
        &mut self,
        path: &Path,
        diagnostics: &mut Diagnostics,
    ) -> Result<Vec<Rule>, LoadError> {
        let mtime = fs::metadata(path)
            .and_then(|m| m.modified())
            .map_err(|e| LoadError::Parse { path: path.to_path_buf(), detail: e.to_string() })?;

        if !self.config.force_refresh {
            if let Some((cached_mtime, rules)) = self.cache.entries.get(path) {
                if *cached_mtime == mtime {
                    return Ok(rules.clone());
                }
            }
        }

        let text = fs::read_to_string(path)
            .map_err(|e| LoadError::Parse { path: path.to_path_buf(), detail: e.to_string() })?;
        let rules = parse_yaml_rules(path, &text, diagnostics)?;
        self.cache.entries.insert(path.to_path_buf(), (mtime, rules.clone()));
        Ok(rules)
    }
}

fn parse_yaml_rules(
    path: &Path,
    text: &str,
    diagnostics: &mut Diagnostics,
) -> Result<Vec<Rule>, LoadError> {
    let raw: Vec<Rule> = serde_yaml::from_str(text).map_err(|e| LoadError::Parse {
        path: path.to_path_buf(),
        detail: e.to_string(),
    })?;

    let mut out = Vec::with_capacity(raw.len());
    for rule in raw {
        match validate_patterns_compile(&rule) {
            Ok(()) => out.push(rule),
            Err(detail) => diagnostics.dropped_rules.push((rule.id, detail)),
        }
    }
    Ok(out)
}

/// Eagerly compiles every pattern of `rule` against its declared languages (or a representative
/// language when language-agnostic) purely to surface a `CompileError` at load time; the
/// compiled templates themselves are discarded; the engine recompiles per-file since templates
/// are tied to the concrete AST lifetime of the file being scanned.
fn validate_patterns_compile(rule: &Rule) -> Result<(), String> {
    let language = rule.languages.first().copied().unwrap_or(crate::types::Language::Ruby);
    for (index, pattern) in rule.patterns.iter().enumerate() {
        crate::pattern::compile(pattern, language, &rule.id, index)
            .map_err(|e| e.to_string())?;
    }
    Ok(())
}

fn validate_references(by_id: &HashMap<RuleId, Rule>) -> Result<(), LoadError> {
    for rule in by_id.values() {
        for target in rule.referenced_rule_ids() {
            if !by_id.contains_key(&target) {
                return Err(LoadError::UnresolvedReference { id: rule.id.clone(), target });
            }
        }
    }
    Ok(())
}

/// Topologically sorts rules by their reference graph (if A references B, B comes first);
/// ties within a layer are broken by rule id ascending, so detections are reproducible.
fn topological_order(by_id: &HashMap<RuleId, Rule>) -> Result<Vec<Rule>, LoadError> {
    let mut remaining: HashSet<RuleId> = by_id.keys().cloned().collect();
    let mut ordered = Vec::with_capacity(by_id.len());

    while !remaining.is_empty() {
        let mut ready: Vec<RuleId> = remaining
            .iter()
            .filter(|id| {
                by_id[*id]
                    .referenced_rule_ids()
                    .iter()
                    .all(|dep| !remaining.contains(dep))
            })
            .cloned()
            .collect();

        if ready.is_empty() {
            let mut cycle: Vec<RuleId> = remaining.into_iter().collect();
            cycle.sort();
            return Err(LoadError::Cycle(cycle));
        }

        ready.sort();
        for id in ready {
            remaining.remove(&id);
            ordered.push(by_id[&id].clone());
        }
    }

    Ok(ordered)
}

fn collect_yaml_files(dir: &Path) -> Result<Vec<PathBuf>, LoadError> {
    let mut out = Vec::new();
    let entries = fs::read_dir(dir)
        .map_err(|e| LoadError::Parse { path: dir.to_path_buf(), detail: e.to_string() })?;
    for entry in entries {
        let entry =
            entry.map_err(|e| LoadError::Parse { path: dir.to_path_buf(), detail: e.to_string() })?;
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) == Some("yml")
            || path.extension().and_then(|e| e.to_str()) == Some("yaml")
        {
            out.push(path);
        } else if path.is_dir() {
            out.extend(collect_yaml_files(&path)?);
        }
    }
    out.sort();
    Ok(out)
}
