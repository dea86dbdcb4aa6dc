//! Exercises the full `RuleLoader::load` -> `engine::scan` pipeline end to end: rule YAML on
//! disk (built-in plus an external override), parsed source, and the detections that come out.

use custos::rules::{LoaderConfig, RuleLoader};
use custos::{ast, engine, Language, RuleId};
use std::io::Write;

fn write_rule(dir: &std::path::Path, name: &str, yaml: &str) {
    let path = dir.join(name);
    let mut file = std::fs::File::create(path).unwrap();
    file.write_all(yaml.as_bytes()).unwrap();
}

fn never_cancelled() -> bool {
    false
}

#[test]
fn built_in_rule_fires_against_a_matching_file() {
    let mut loader = RuleLoader::new(LoaderConfig::default());
    let loaded = loader.load().unwrap();

    let source = r#"logger.info("contact us at support@example.com")"#;
    let tree = ast::parse(source, Language::Ruby).unwrap();
    let detections =
        engine::scan(&loaded.rules, "app/models/user.rb", &tree, &never_cancelled).unwrap();

    assert!(detections.iter().any(|d| d.rule_id == RuleId::from("ruby_lang.logger_email_literal")));
}

#[test]
fn external_rules_directory_adds_a_custom_rule_to_the_loaded_set() {
    let dir = tempfile::tempdir().unwrap();
    write_rule(
        dir.path(),
        "custom.yml",
        r#"
- id: local.insecure_eval
  severity: critical
  patterns:
    - "eval($CODE)"
"#,
    );
    let mut loader = RuleLoader::new(LoaderConfig {
        external_rules_dir: Some(dir.path().to_path_buf()),
        ..Default::default()
    });
    let loaded = loader.load().unwrap();
    assert!(loaded.cache_used);

    let tree = ast::parse("eval(user_input)", Language::Ruby).unwrap();
    let detections =
        engine::scan(&loaded.rules, "app/lib/runner.rb", &tree, &never_cancelled).unwrap();

    assert_eq!(detections.len(), 1);
    assert_eq!(detections[0].rule_id, RuleId::from("local.insecure_eval"));
}

#[test]
fn a_rule_referencing_a_nonexistent_detection_fails_to_load() {
    let dir = tempfile::tempdir().unwrap();
    write_rule(
        dir.path(),
        "broken.yml",
        r#"
- id: local.broken
  patterns:
    - pattern: "render($Y)"
      filters:
        - kind: reference
          variable: Y
          detection: no_such_rule
"#,
    );
    let mut loader = RuleLoader::new(LoaderConfig {
        external_rules_dir: Some(dir.path().to_path_buf()),
        ..Default::default()
    });
    assert!(loader.load().is_err());
}

#[test]
fn a_dropped_pattern_does_not_abort_the_whole_load() {
    let dir = tempfile::tempdir().unwrap();
    write_rule(
        dir.path(),
        "mixed.yml",
        r#"
- id: local.unparseable
  patterns:
    - "((("
- id: local.fine
  patterns:
    - "sleep($N)"
"#,
    );
    let mut loader = RuleLoader::new(LoaderConfig {
        external_rules_dir: Some(dir.path().to_path_buf()),
        ..Default::default()
    });
    let loaded = loader.load().unwrap();
    assert!(loaded.rules.iter().any(|r| r.id == RuleId::from("local.fine")));
    assert!(loaded.rules.iter().all(|r| r.id != RuleId::from("local.unparseable")));
    assert_eq!(loaded.diagnostics.dropped_rules.len(), 1);
}
