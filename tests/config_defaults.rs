use grpc_client_stream::config::{CompressionMode, Config};
use std::io::Write;

#[test]
fn test_default_config_values() {
    let config = Config::default();

    assert_eq!(config.call.buffer, 16);
    assert_eq!(config.call.timeout_seconds, None);
    assert_eq!(config.call.compression, CompressionMode::None);
    assert!(config.call.metadata.is_empty());
    assert!(!config.logging.enabled);
    assert_eq!(config.logging.filter, "grpc_client_stream=debug,warn");
}

#[test]
fn test_load_from_file() {
    let mut file = tempfile::NamedTempFile::new().expect("failed to create temp file");
    writeln!(
        file,
        r#"
[call]
buffer = 2
timeout_seconds = 5

[logging]
enabled = true
"#
    )
    .unwrap();

    let config = Config::load_from_file(file.path()).expect("failed to load config");
    assert_eq!(config.call.buffer, 2);
    assert_eq!(config.call.timeout_seconds, Some(5));
    assert_eq!(config.call.compression, CompressionMode::None);
    assert!(config.logging.enabled);
}

#[test]
fn test_load_from_missing_file() {
    let dir = tempfile::tempdir().expect("failed to create temp dir");
    assert!(Config::load_from_file(&dir.path().join("absent.toml")).is_none());
}
