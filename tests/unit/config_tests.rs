//! Unit tests for client configuration parsing.

use std::path::PathBuf;
use std::time::Duration;

use netcore_client::config::{ClientConfig, ConnectionMode};
use netcore_client::AppError;

fn full_toml() -> &'static str {
    r#"
socket_path = "/tmp/netcore.sock"
mode = "shared"

[timeouts]
connect_ms = 250
request_ms = 5000
"#
}

#[test]
fn full_config_parses() {
    let config = ClientConfig::from_toml_str(full_toml()).expect("valid config");

    assert_eq!(config.socket_path, PathBuf::from("/tmp/netcore.sock"));
    assert_eq!(config.mode, ConnectionMode::Shared);
    assert_eq!(config.timeouts.connect(), Some(Duration::from_millis(250)));
    assert_eq!(config.timeouts.request(), Some(Duration::from_millis(5000)));
}

#[test]
fn minimal_config_uses_defaults() {
    let config = ClientConfig::from_toml_str(r#"socket_path = "/tmp/x.sock""#).unwrap();

    assert_eq!(config.mode, ConnectionMode::PerRequest);
    assert_eq!(config.timeouts.connect(), None);
    assert_eq!(config.timeouts.request(), None);
    assert_eq!(config, ClientConfig::new("/tmp/x.sock"));
}

#[test]
fn zero_timeouts_mean_no_deadline() {
    let config = ClientConfig::from_toml_str(
        r#"
socket_path = "/tmp/x.sock"

[timeouts]
connect_ms = 0
request_ms = 0
"#,
    )
    .unwrap();

    assert_eq!(config.timeouts.connect(), None);
    assert_eq!(config.timeouts.request(), None);
}

#[test]
fn empty_socket_path_is_rejected() {
    let result = ClientConfig::from_toml_str(r#"socket_path = """#);
    match result {
        Err(AppError::Config(msg)) => assert!(msg.contains("socket_path")),
        other => panic!("expected AppError::Config, got: {other:?}"),
    }
}

#[test]
fn missing_socket_path_is_rejected() {
    let result = ClientConfig::from_toml_str(r#"mode = "shared""#);
    assert!(matches!(result, Err(AppError::Config(_))));
}

#[test]
fn unknown_mode_is_rejected() {
    let result = ClientConfig::from_toml_str(
        r#"
socket_path = "/tmp/x.sock"
mode = "pooled"
"#,
    );
    assert!(matches!(result, Err(AppError::Config(_))));
}

#[test]
fn load_from_path_reads_file() {
    let dir = tempfile::tempdir().expect("tempdir");
    let file = dir.path().join("client.toml");
    std::fs::write(&file, full_toml()).expect("write config");

    let config = ClientConfig::load_from_path(&file).expect("load config");
    assert_eq!(config.mode, ConnectionMode::Shared);
}

#[test]
fn load_from_missing_path_is_config_error() {
    let dir = tempfile::tempdir().expect("tempdir");
    let result = ClientConfig::load_from_path(dir.path().join("absent.toml"));
    match result {
        Err(AppError::Config(msg)) => assert!(msg.contains("failed to read config")),
        other => panic!("expected AppError::Config, got: {other:?}"),
    }
}
