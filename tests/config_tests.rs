//! Integration tests for configuration loading

use hera::config::{HeraConfig, StorageBackend};
use std::io::Write;
use tempfile::NamedTempFile;

fn write_config(yaml: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("temp file");
    file.write_all(yaml.as_bytes()).expect("write config");
    file
}

#[test]
fn test_load_full_file() {
    let file = write_config(
        r#"
server:
  bind: "0.0.0.0:8088"
  max_rows: 50
  permissive_cors: false
storage:
  backend: mock
auth:
  allow_org_header: true
  tokens:
    - token: dev-token
      user_id: 7f3a1d2c-1111-4c6e-9a55-0d4b2f6f0a01
      organization_id: 0b9c5e4a-2222-4f10-8b7d-5a1c3e9d7b02
      roles: [admin]
procedures:
  disabled: [hera_entity_delete_v1]
p2p:
  match_tolerance_pct: 5.0
seed:
  on_startup: true
  organization_code: ACME
"#,
    );

    let config = HeraConfig::from_yaml_file(file.path().to_str().unwrap()).unwrap();

    assert_eq!(config.server.bind, "0.0.0.0:8088");
    assert_eq!(config.server.max_rows, 50);
    assert!(!config.server.permissive_cors);
    assert_eq!(config.storage.backend, StorageBackend::Mock);
    assert!(config.auth.allow_org_header);
    assert_eq!(config.auth.tokens.len(), 1);
    assert_eq!(config.auth.tokens[0].roles, vec!["admin".to_string()]);
    assert_eq!(config.procedures.disabled, vec!["hera_entity_delete_v1"]);
    assert_eq!(config.p2p.match_tolerance_pct, 5.0);
    assert!(config.seed.on_startup);
    assert_eq!(config.seed.organization_code, "ACME");
}

#[test]
fn test_empty_file_uses_defaults() {
    let file = write_config("{}\n");

    let config = HeraConfig::from_yaml_file(file.path().to_str().unwrap()).unwrap();

    assert_eq!(config.storage.backend, StorageBackend::Memory);
    assert_eq!(config.server.max_rows, 100);
    assert!(config.auth.tokens.is_empty());
    assert!(config.p2p.edge_function_url.is_none());
}

#[test]
fn test_missing_file_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("absent.yaml");

    let err = HeraConfig::from_yaml_file(path.to_str().unwrap()).unwrap_err();
    assert!(err.to_string().contains("failed to read config file"));
}

#[test]
fn test_unknown_backend_is_an_error() {
    let file = write_config("storage:\n  backend: cassandra\n");

    assert!(HeraConfig::from_yaml_file(file.path().to_str().unwrap()).is_err());
}

#[test]
fn test_bad_env_override_is_an_error() {
    let result = HeraConfig::default().with_env_overrides(|key| {
        (key == "HERA_MAX_ROWS").then(|| "lots".to_string())
    });
    assert!(result.is_err());
}
