// Config loading and validation tests

use dashsync::config::{AppConfig, DEFAULT_USER_AGENT};
use dashsync::models::ResourceKind;
use std::time::Duration;

const VALID_CONFIG: &str = r#"
[client]
connect_timeout_ms = 2000

[monitoring]
stats_log_interval_secs = 60

[[resources]]
name = "traffic"
kind = "traffic"
endpoint = "http://localhost:8080/api/traffic"
poll_interval_ms = 5000
max_entries = 100

[[resources]]
name = "anomalies"
kind = "anomalies"
endpoint = "http://localhost:8080/api/anomalies"
poll_interval_ms = 5000
"#;

#[test]
fn test_config_loads_from_str() {
    let config = AppConfig::load_from_str(VALID_CONFIG).expect("load_from_str");
    assert_eq!(config.resources.len(), 2);
    assert_eq!(config.monitoring.stats_log_interval_secs, 60);
    assert_eq!(config.client.connect_timeout(), Some(Duration::from_millis(2000)));

    let resources = config.resources().expect("resources");
    assert_eq!(resources[0].name, "traffic");
    assert_eq!(resources[0].kind, ResourceKind::Traffic);
    assert_eq!(resources[0].endpoint.path(), "/api/traffic");
    assert_eq!(resources[0].poll_interval, Duration::from_millis(5000));
    assert_eq!(resources[0].max_entries, Some(100));
    assert_eq!(resources[1].kind, ResourceKind::Anomalies);
    assert_eq!(resources[1].max_entries, None);
}

#[test]
fn test_config_defaults_when_sections_omitted() {
    let minimal = r#"
[[resources]]
name = "traffic"
kind = "traffic"
endpoint = "http://localhost:8080/api/traffic"
poll_interval_ms = 5000
"#;
    let config = AppConfig::load_from_str(minimal).expect("minimal");
    assert_eq!(config.monitoring.stats_log_interval_secs, 60);
    assert_eq!(config.client.connect_timeout(), None);
    assert_eq!(config.client.user_agent(), DEFAULT_USER_AGENT);
    assert!(DEFAULT_USER_AGENT.starts_with("dashsync/"));
}

#[test]
fn test_config_validation_rejects_poll_interval_zero() {
    let bad = VALID_CONFIG.replacen("poll_interval_ms = 5000", "poll_interval_ms = 0", 1);
    let err = AppConfig::load_from_str(&bad).unwrap_err();
    assert!(err.to_string().contains("poll_interval_ms"));
}

#[test]
fn test_config_validation_rejects_duplicate_names() {
    let bad = VALID_CONFIG.replace("name = \"anomalies\"", "name = \"traffic\"");
    let err = AppConfig::load_from_str(&bad).unwrap_err();
    assert!(err.to_string().contains("unique"));
}

#[test]
fn test_config_validation_rejects_empty_name() {
    let bad = VALID_CONFIG.replace("name = \"traffic\"", "name = \"\"");
    let err = AppConfig::load_from_str(&bad).unwrap_err();
    assert!(err.to_string().contains("resources.name"));
}

#[test]
fn test_config_validation_rejects_non_http_endpoint() {
    let bad = VALID_CONFIG.replace(
        "http://localhost:8080/api/traffic",
        "ftp://localhost/api/traffic",
    );
    let err = AppConfig::load_from_str(&bad).unwrap_err();
    assert!(err.to_string().contains("resources.endpoint"));
}

#[test]
fn test_config_validation_rejects_unparseable_endpoint() {
    let bad = VALID_CONFIG.replace("http://localhost:8080/api/traffic", "not a url");
    let err = AppConfig::load_from_str(&bad).unwrap_err();
    assert!(err.to_string().contains("resources.endpoint"));
}

#[test]
fn test_config_validation_rejects_max_entries_zero() {
    let bad = VALID_CONFIG.replace("max_entries = 100", "max_entries = 0");
    let err = AppConfig::load_from_str(&bad).unwrap_err();
    assert!(err.to_string().contains("max_entries"));
}

#[test]
fn test_config_validation_rejects_stats_log_interval_zero() {
    let bad = VALID_CONFIG.replace(
        "stats_log_interval_secs = 60",
        "stats_log_interval_secs = 0",
    );
    let err = AppConfig::load_from_str(&bad).unwrap_err();
    assert!(err.to_string().contains("stats_log_interval_secs"));
}

#[test]
fn test_config_validation_rejects_connect_timeout_zero() {
    let bad = VALID_CONFIG.replace("connect_timeout_ms = 2000", "connect_timeout_ms = 0");
    let err = AppConfig::load_from_str(&bad).unwrap_err();
    assert!(err.to_string().contains("connect_timeout_ms"));
}

#[test]
fn test_config_validation_rejects_no_resources() {
    let err = AppConfig::load_from_str("resources = []").unwrap_err();
    assert!(err.to_string().contains("at least one"));
}

#[test]
fn test_config_rejects_unknown_kind() {
    let bad = VALID_CONFIG.replace("kind = \"traffic\"", "kind = \"latency\"");
    assert!(AppConfig::load_from_str(&bad).is_err());
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
    assert_eq!(config.resources[0].name, "traffic");
}
