use super::*;
use preflight_driver_postgres::SslMode;
use pretty_assertions::assert_eq;
use std::io::Write;
use std::time::Duration;

const FULL_CONFIG: &str = r#"
explain_preset = "ci"
page_size_bytes = 16384
parallel_rules = true

[planner]
random_page_cost = 1.1
work_mem_mb = 256

[cost_model]
slope_a = 0.5
intercept_b = 3.0

[pool]
min_size = 0
max_size = 2
acquire_timeout_ms = 500

[thresholds]
missing_index_min_pages = 100
autovacuum_big_pages = 1000

[database]
host = "db.internal"
database = "shop"
user = "advisor"
ssl_mode = "require"
"#;

#[test]
fn test_empty_config_uses_defaults() {
    let config = AdvisorConfig::from_toml_str("").unwrap();
    assert_eq!(config, AdvisorConfig::default());
    assert_eq!(config.page_size_bytes, 8192);
    assert_eq!(config.explain_options(), ExplainOptions::advisor());
    assert!(config.database.is_none());
}

#[test]
fn test_full_config() {
    let config = AdvisorConfig::from_toml_str(FULL_CONFIG).unwrap();

    assert_eq!(config.explain_preset, ExplainPreset::Ci);
    assert!(config.parallel_rules);
    assert_eq!(config.planner.random_page_cost, 1.1);
    assert_eq!(config.planner.seq_page_cost, 1.0);
    assert_eq!(config.planner.work_mem_mb, 256);
    assert_eq!(config.cost_model, CostModel::new(0.5, 3.0));
    assert_eq!(config.pool.max_size(), 2);
    assert_eq!(config.pool.acquire_timeout(), Duration::from_millis(500));
    assert_eq!(config.thresholds.missing_index_min_pages, 100);
    assert_eq!(config.thresholds.bloat_min_width, 200);

    let database = config.database.as_ref().unwrap();
    assert_eq!(database.host, "db.internal");
    assert_eq!(database.port, 5432);
    assert_eq!(database.ssl_mode, SslMode::Require);
}

#[test]
fn test_page_size_applies_everywhere() {
    let config = AdvisorConfig::from_toml_str(FULL_CONFIG).unwrap();
    assert_eq!(config.estimator().page_size_bytes(), 16384);
    assert_eq!(config.effective_thresholds().page_size_bytes, 16384);
    assert_eq!(config.effective_thresholds().autovacuum_big_pages, 1000);
    assert_eq!(config.rule_engine().len(), 18);
}

#[test]
fn test_invalid_toml() {
    let err = AdvisorConfig::from_toml_str("page_size_bytes = \"big\"").unwrap_err();
    assert!(matches!(err, ConfigError::Toml(_)));
}

#[test]
fn test_load_from_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(FULL_CONFIG.as_bytes()).unwrap();
    file.flush().unwrap();

    let config = AdvisorConfig::load(file.path()).unwrap();
    assert_eq!(config.explain_preset, ExplainPreset::Ci);
}

#[test]
fn test_load_missing_file() {
    let err = AdvisorConfig::load("/nonexistent/preflight.toml").unwrap_err();
    assert!(matches!(err, ConfigError::Io { .. }));
    assert!(err.to_string().contains("/nonexistent/preflight.toml"));
}
