//! Integration tests that verify every example YAML rule in
//! `data/rules/examples/` loads and publishes as expected.

use std::sync::Arc;

use vigil_filter::Filter;
use vigil_rules::{LoadStatus, RuleLoader};

/// Integration tests run from the crate directory, so we go up two levels.
fn examples_dir() -> std::path::PathBuf {
    let manifest = std::path::Path::new(env!("CARGO_MANIFEST_DIR"));
    manifest.join("../../data/rules/examples")
}

fn load_examples() -> RuleLoader {
    let loader = RuleLoader::new(examples_dir(), Arc::new(Filter::new()));
    let results = loader.load_all().unwrap();
    for r in &results {
        if let LoadStatus::Failed { error } = &r.status {
            panic!("{} failed to load: {}", r.path.display(), error);
        }
    }
    loader
}

#[test]
fn every_example_loads() {
    let loader = load_examples();
    let ids: Vec<String> = loader.documents().iter().map(|d| d.id().to_string()).collect();
    assert_eq!(ids, vec!["api-latency", "host-cpu", "order-volume"]);
}

#[test]
fn api_latency_example() {
    let loader = load_examples();
    let doc = loader.get("api-latency").unwrap();

    assert_eq!(doc.api_version, "v1");
    assert_eq!(doc.kind, "MetricRule");
    assert!(doc.is_enabled());
    assert_eq!(
        doc.metadata.tags.as_deref(),
        Some(&["api".to_string(), "latency".to_string()][..])
    );

    let matched = loader.filter().matched_rules("timer.mean_90.api.login");
    assert_eq!(matched.len(), 1);
    assert_eq!(matched[0].id, "api-latency");
}

#[test]
fn host_cpu_example_needs_all_four_segments() {
    let loader = load_examples();
    let filter = loader.filter();

    assert_eq!(filter.matched_rules("stats.web01.cpu.0").len(), 1);
    assert!(filter.matched_rules("stats.web01.cpu").is_empty());
    assert!(filter.matched_rules("stats.web01.mem.0").is_empty());
}

#[test]
fn disabled_example_is_not_published() {
    let loader = load_examples();
    assert!(!loader.get("order-volume").unwrap().is_enabled());
    assert!(loader.filter().matched_rules("counter.orders.created").is_empty());
    assert_eq!(loader.filter().len(), 2);
}
