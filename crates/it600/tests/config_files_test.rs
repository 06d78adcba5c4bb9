use std::fs;

use it600::config::LogLevel;
use it600::Config;
use it600::ConfigError;
use tempfile::TempDir;

#[test]
fn test_merge_base_and_secrets() {
    let temp_dir = TempDir::new().unwrap();
    let base_path = temp_dir.path().join("base.toml");
    let secrets_path = temp_dir.path().join("secrets.toml");

    fs::write(
        &base_path,
        r#"
[logging]
level = "warn"

[logging.overrides]
"it600::mirror" = "debug"
"#,
    )
    .unwrap();

    fs::write(
        &secrets_path,
        r#"
[logging]
level = "trace"

[logging.overrides]
"it600::mirror" = "error"
"it600::integration" = "info"

[gateways.home]
host = "192.168.1.20"
euid = "001E5E0D32906128"
"#,
    )
    .unwrap();

    let config = Config::from_files(&[base_path, secrets_path]).unwrap();

    // First file wins for scalar settings
    assert_eq!(config.logging.level, LogLevel::Warn);
    assert_eq!(
        config.logging.overrides.get("it600::mirror"),
        Some(&LogLevel::Debug)
    );
    assert_eq!(
        config.logging.overrides.get("it600::integration"),
        Some(&LogLevel::Info)
    );
    assert_eq!(config.gateways.len(), 1);
    assert_eq!(config.gateways["home"].port, 80);
}

#[test]
fn test_gateway_in_two_files_is_rejected() {
    let temp_dir = TempDir::new().unwrap();
    let first = temp_dir.path().join("first.toml");
    let second = temp_dir.path().join("second.toml");
    let gateway = r#"
[gateways.home]
host = "192.168.1.20"
euid = "abc"
"#;
    fs::write(&first, gateway).unwrap();
    fs::write(&second, gateway).unwrap();

    let err = Config::from_files(&[first, second]).unwrap_err();
    insta::assert_snapshot!(err.to_string(), @"gateway 'home': defined in more than one file");
}

#[test]
fn test_missing_file() {
    let temp_dir = TempDir::new().unwrap();
    let missing = temp_dir.path().join("missing.toml");

    let err = Config::from_file(&missing).unwrap_err();
    match err {
        ConfigError::Io { path, .. } => assert_eq!(path, missing),
        other => panic!("unexpected error: {:?}", other),
    }
}

#[test]
fn test_invalid_toml() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("broken.toml");
    fs::write(&path, "[gateways.home\nhost = ").unwrap();

    assert!(matches!(
        Config::from_file(&path),
        Err(ConfigError::Parse(_))
    ));
}
