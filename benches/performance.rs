//! Performance benchmarks for the rule engine core.
//!
//! These benchmarks measure the performance of key operations:
//! - Structural pattern matching over source files of varying size
//! - A full `scan()` pass with varying rule-set size
//! - Rule loading, with and without the external-file parse cache
//!
//! ## Running Benchmarks
//!
//! ```bash
//! cargo bench
//! cargo bench --bench performance scan_throughput
//! ```

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use custos::ast;
use custos::rules::model::{RulePattern, RuleType, Trigger};
use custos::rules::{LoaderConfig, RuleLoader};
use custos::types::{Language, RuleId, Severity};
use custos::{engine, pattern, Rule};
use std::io::Write;

fn never_cancelled() -> bool {
    false
}

fn make_rule(id: &str, pattern: &str) -> Rule {
    Rule {
        id: RuleId::from(id),
        rule_type: RuleType::Risk,
        languages: vec![Language::Ruby],
        patterns: vec![RulePattern { pattern: pattern.to_string(), focus: None, filters: vec![] }],
        auxiliary: false,
        severity: Severity::Low,
        metadata: Default::default(),
        trigger: Trigger::default(),
        stored: false,
        detect_presence: false,
        auto_encrypt_prefix: None,
        skip_data_types: vec![],
        only_data_types: vec![],
        has_detailed_context: false,
        sanitizer: None,
        dependency_check: false,
        dependency: None,
        imports: vec![],
        detectors: vec![],
    }
}

/// A synthetic Ruby file of roughly `lines` log calls, half of which match a rule pattern.
fn synthetic_source(lines: usize) -> String {
    let mut out = String::with_capacity(lines * 24);
    for i in 0..lines {
        if i % 2 == 0 {
            out.push_str("logger.info(user.email)\n");
        } else {
            out.push_str("logger.info(\"static message\")\n");
        }
    }
    out
}

// ============================================================================
// Pattern Matching Benchmarks
// ============================================================================

/// Measures `enumerate_matches` cost as source size grows, with compilation held outside the
/// timed loop since a pattern compiles once per rule, not once per file.
fn bench_pattern_matching(c: &mut Criterion) {
    let mut group = c.benchmark_group("pattern_matching");
    let rule_pattern = RulePattern {
        pattern: "logger.info($X)".to_string(),
        focus: None,
        filters: vec![],
    };
    let rule_id = RuleId::from("bench.logger");

    for lines in [50, 500, 5_000].iter() {
        let source = synthetic_source(*lines);
        let tree = ast::parse(&source, Language::Ruby).unwrap();
        let compiled = pattern::compile(&rule_pattern, Language::Ruby, &rule_id, 0).unwrap();

        group.throughput(Throughput::Bytes(source.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(lines), &tree, |b, tree| {
            b.iter(|| {
                let matches = pattern::enumerate_matches(compiled.template_root(), tree);
                black_box(matches)
            });
        });
    }

    group.finish();
}

// ============================================================================
// Full Scan Benchmarks
// ============================================================================

/// Measures `engine::scan` throughput as the active rule set grows, holding file size fixed.
fn bench_scan_rule_scaling(c: &mut Criterion) {
    let mut group = c.benchmark_group("scan_rule_scaling");
    let source = synthetic_source(200);
    let tree = ast::parse(&source, Language::Ruby).unwrap();

    for rule_count in [1, 10, 50].iter() {
        let rules: Vec<Rule> = (0..*rule_count)
            .map(|i| make_rule(&format!("bench.rule_{i}"), "logger.info($X)"))
            .collect();

        group.throughput(Throughput::Elements(*rule_count as u64));
        group.bench_with_input(BenchmarkId::from_parameter(rule_count), &rules, |b, rules| {
            b.iter(|| {
                let detections = engine::scan(rules, "bench.rb", &tree, &never_cancelled).unwrap();
                black_box(detections)
            });
        });
    }

    group.finish();
}

/// Measures `engine::scan` throughput as file size grows, holding the rule set fixed.
fn bench_scan_file_scaling(c: &mut Criterion) {
    let mut group = c.benchmark_group("scan_file_scaling");
    let rules = vec![make_rule("bench.rule", "logger.info($X)")];

    for lines in [50, 500, 5_000].iter() {
        let source = synthetic_source(*lines);
        let tree = ast::parse(&source, Language::Ruby).unwrap();

        group.throughput(Throughput::Bytes(source.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(lines), &tree, |b, tree| {
            b.iter(|| {
                let detections = engine::scan(&rules, "bench.rb", tree, &never_cancelled).unwrap();
                black_box(detections)
            });
        });
    }

    group.finish();
}

// ============================================================================
// Rule Loading Benchmarks
// ============================================================================

/// Measures loading the embedded built-in rule set with no external directory configured.
fn bench_load_builtin_rules(c: &mut Criterion) {
    c.bench_function("load_builtin_rules", |b| {
        b.iter(|| {
            let mut loader = RuleLoader::new(LoaderConfig::default());
            let result = loader.load().unwrap();
            black_box(result)
        });
    });
}

/// Measures the parse-cache benefit on repeated loads of the same external directory: the first
/// call is a cold parse, later calls on an unchanged file hit the mtime-keyed cache.
fn bench_external_rule_cache(c: &mut Criterion) {
    let mut group = c.benchmark_group("external_rule_cache");
    let dir = tempfile::tempdir().unwrap();
    for i in 0..20 {
        let mut file = std::fs::File::create(dir.path().join(format!("r{i}.yml"))).unwrap();
        writeln!(file, "- id: ext.rule_{i}\n  patterns: [\"sleep($N)\"]").unwrap();
    }

    group.bench_function("cold", |b| {
        b.iter(|| {
            let mut loader = RuleLoader::new(LoaderConfig {
                external_rules_dir: Some(dir.path().to_path_buf()),
                force_refresh: true,
                ..Default::default()
            });
            black_box(loader.load().unwrap())
        });
    });

    group.bench_function("warm_cache", |b| {
        let mut loader = RuleLoader::new(LoaderConfig {
            external_rules_dir: Some(dir.path().to_path_buf()),
            ..Default::default()
        });
        loader.load().unwrap();
        b.iter(|| black_box(loader.load().unwrap()));
    });

    group.finish();
}

criterion_group!(pattern_benches, bench_pattern_matching);
criterion_group!(scan_benches, bench_scan_rule_scaling, bench_scan_file_scaling);
criterion_group!(load_benches, bench_load_builtin_rules, bench_external_rule_cache);

criterion_main!(pattern_benches, scan_benches, load_benches);
