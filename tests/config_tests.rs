// Config loading and validation tests

use fleetstat::config::AppConfig;

const VALID_CONFIG: &str = r#"
[server]
port = 8081
host = "0.0.0.0"

[database]
path = "data/fleetstat.db"
max_pool_size = 10
flush_rate = 10
"#;

const FULL_CONFIG: &str = r#"
[server]
port = 8081
host = "0.0.0.0"

[database]
path = "data/fleetstat.db"
max_pool_size = 10
persist_enabled = false
flush_rate = 20
flush_interval_secs = 2

[cache]
history_capacity = 120

[retention]
raw_retention_days = 14
hourly_retention_days = 60
daily_retention_days = 730

[aggregation]
rollup_interval_secs = 1800
cleanup_interval_secs = 43200
cleanup_schedule = "0 0 3 * * *"
vacuum_after_cleanup = true
"#;

#[test]
fn test_config_loads_from_str() {
    let config = AppConfig::load_from_str(VALID_CONFIG).expect("load_from_str");
    assert_eq!(config.server.port, 8081);
    assert_eq!(config.server.host, "0.0.0.0");
    assert_eq!(config.database.path, "data/fleetstat.db");
    assert_eq!(config.database.flush_rate, 10);
}

#[test]
fn test_config_defaults_when_sections_omitted() {
    let config = AppConfig::load_from_str(VALID_CONFIG).expect("valid");
    assert!(config.database.persist_enabled);
    assert_eq!(config.database.flush_interval_secs, 5);
    assert_eq!(config.cache.history_capacity, 600);
    assert_eq!(config.retention.raw_retention_days, 30);
    assert_eq!(config.retention.hourly_retention_days, 90);
    assert_eq!(config.retention.daily_retention_days, 365);
    assert_eq!(config.aggregation.rollup_interval_secs, 3600);
    assert_eq!(config.aggregation.cleanup_interval_secs, 86_400);
    assert!(config.aggregation.cleanup_schedule.is_none());
    assert!(!config.aggregation.vacuum_after_cleanup);
}

#[test]
fn test_config_loads_all_sections() {
    let config = AppConfig::load_from_str(FULL_CONFIG).expect("valid");
    assert!(!config.database.persist_enabled);
    assert_eq!(config.cache.history_capacity, 120);

    let policy = config.retention_policy();
    assert_eq!(policy.raw_days, 14);
    assert_eq!(policy.hourly_days, 60);
    assert_eq!(policy.daily_days, 730);

    let writer = config.writer_config();
    assert_eq!(writer.flush_rate, 20);
    assert_eq!(writer.flush_interval_secs, 2);

    let worker = config.aggregation_worker_config();
    assert_eq!(worker.rollup_interval_secs, 1800);
    assert_eq!(worker.flush_grace_secs, 2);
    assert_eq!(worker.cleanup_schedule.as_deref(), Some("0 0 3 * * *"));
    assert!(worker.vacuum_after_cleanup);
    assert_eq!(worker.retention, policy);
}

#[test]
fn test_config_validation_rejects_invalid_port() {
    let bad = VALID_CONFIG.replace("port = 8081", "port = 0");
    let err = AppConfig::load_from_str(&bad).unwrap_err();
    assert!(err.to_string().contains("server.port"));
}

#[test]
fn test_config_validation_rejects_empty_db_path() {
    let bad = VALID_CONFIG.replace("path = \"data/fleetstat.db\"", "path = \"\"");
    let err = AppConfig::load_from_str(&bad).unwrap_err();
    assert!(err.to_string().contains("database.path"));
}

#[test]
fn test_config_validation_rejects_max_pool_size_zero() {
    let bad = VALID_CONFIG.replace("max_pool_size = 10", "max_pool_size = 0");
    let err = AppConfig::load_from_str(&bad).unwrap_err();
    assert!(err.to_string().contains("max_pool_size"));
}

#[test]
fn test_config_validation_rejects_flush_rate_zero() {
    let bad = VALID_CONFIG.replace("flush_rate = 10", "flush_rate = 0");
    let err = AppConfig::load_from_str(&bad).unwrap_err();
    assert!(err.to_string().contains("flush_rate"));
}

#[test]
fn test_config_validation_rejects_history_capacity_zero() {
    let bad = FULL_CONFIG.replace("history_capacity = 120", "history_capacity = 0");
    let err = AppConfig::load_from_str(&bad).unwrap_err();
    assert!(err.to_string().contains("history_capacity"));
}

#[test]
fn test_config_validation_rejects_raw_retention_zero() {
    let bad = FULL_CONFIG.replace("raw_retention_days = 14", "raw_retention_days = 0");
    let err = AppConfig::load_from_str(&bad).unwrap_err();
    assert!(err.to_string().contains("raw_retention_days"));
}

#[test]
fn test_config_validation_rejects_rollup_interval_zero() {
    let bad = FULL_CONFIG.replace("rollup_interval_secs = 1800", "rollup_interval_secs = 0");
    let err = AppConfig::load_from_str(&bad).unwrap_err();
    assert!(err.to_string().contains("rollup_interval_secs"));
}

#[test]
fn test_config_validation_rejects_invalid_cron() {
    let bad = FULL_CONFIG.replace("\"0 0 3 * * *\"", "\"every night\"");
    let err = AppConfig::load_from_str(&bad).unwrap_err();
    assert!(err.to_string().contains("cleanup_schedule"));
}

#[test]
fn test_config_validation_rejects_invalid_toml() {
    let err = AppConfig::load_from_str("not valid toml [[[").unwrap_err();
    assert!(!err.to_string().is_empty());
}

#[test]
fn test_config_load_from_file_via_env() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, VALID_CONFIG).unwrap();
    unsafe { std::env::set_var("CONFIG_FILE", path.to_str().unwrap()) };
    let result = AppConfig::load();
    unsafe { std::env::remove_var("CONFIG_FILE") };
    let config = result.expect("load from CONFIG_FILE");
    assert_eq!(config.server.port, 8081);
    assert_eq!(config.database.path, "data/fleetstat.db");
}
