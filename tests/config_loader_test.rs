//! Configuration Loading Integration Tests
//!
//! YAML parsing, environment expansion and validation through the public
//! loader. Tests that touch the process environment run serially.

use serial_test::serial;
use std::io::Write;
use tubely::config::{Config, ConfigError, ConfigLoader, DEFAULT_TOKEN_ISSUER};

const MINIMAL: &str = r#"
server:
  address: "127.0.0.1:8091"
database:
  path: "tubely.db"
auth:
  jwt_secret: "secret"
s3:
  bucket: "tubely-videos"
  region: "us-east-1"
"#;

#[test]
fn test_minimal_config_uses_defaults() {
    let config = ConfigLoader::from_yaml(MINIMAL).unwrap();

    assert_eq!(config.auth.issuer, DEFAULT_TOKEN_ISSUER);
    assert_eq!(config.server.public_base_url(), "http://localhost:8091");
    assert_eq!(config.assets.root, std::path::PathBuf::from("./assets"));
    assert!(config.metrics.enabled);
    assert_eq!(config.metrics.address, "127.0.0.1:9090");
    assert!(config.s3.endpoint.is_none());
}

#[test]
fn test_load_from_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(MINIMAL.as_bytes()).unwrap();

    let config = Config::load(file.path()).unwrap();
    assert_eq!(config.s3.bucket, "tubely-videos");
}

#[test]
fn test_missing_file() {
    let result = Config::load("/definitely/not/here/config.yaml");
    assert!(matches!(result, Err(ConfigError::IoError(_))));
}

#[test]
fn test_malformed_yaml() {
    let result = ConfigLoader::from_yaml("server: [unclosed");
    assert!(matches!(result, Err(ConfigError::ParseError(_))));
}

#[test]
fn test_missing_section() {
    let result = ConfigLoader::from_yaml("server:\n  address: \"127.0.0.1:1\"\n");
    assert!(matches!(result, Err(ConfigError::ParseError(_))));
}

#[test]
fn test_invalid_endpoint_rejected() {
    let yaml = format!("{}  endpoint: \"localhost:9000\"\n", MINIMAL);
    let result = ConfigLoader::from_yaml(&yaml);
    assert!(matches!(result, Err(ConfigError::ValidationError(_))));
}

#[test]
#[serial]
fn test_env_expansion() {
    std::env::set_var("TUBELY_TEST_JWT_SECRET", "from-env");
    std::env::set_var("TUBELY_TEST_BUCKET", "env-bucket");

    let yaml = r#"
server:
  address: "127.0.0.1:8091"
database:
  path: "tubely.db"
auth:
  jwt_secret: "${TUBELY_TEST_JWT_SECRET}"
s3:
  bucket: "${TUBELY_TEST_BUCKET}"
  region: "${TUBELY_TEST_REGION:-eu-west-1}"
"#;
    let config = ConfigLoader::from_yaml(yaml).unwrap();

    std::env::remove_var("TUBELY_TEST_JWT_SECRET");
    std::env::remove_var("TUBELY_TEST_BUCKET");

    assert_eq!(config.auth.jwt_secret, "from-env");
    assert_eq!(config.s3.bucket, "env-bucket");
    assert_eq!(config.s3.region, "eu-west-1");
}

#[test]
#[serial]
fn test_empty_env_secret_fails_validation() {
    std::env::set_var("TUBELY_TEST_EMPTY_SECRET", "");

    let yaml = MINIMAL.replace("\"secret\"", "\"${TUBELY_TEST_EMPTY_SECRET}\"");
    let result = ConfigLoader::from_yaml(&yaml);

    std::env::remove_var("TUBELY_TEST_EMPTY_SECRET");

    assert!(matches!(result, Err(ConfigError::ValidationError(_))));
}

#[test]
#[serial]
fn test_unset_secret_placeholder_rejected() {
    std::env::remove_var("TUBELY_TEST_UNSET_JWT_SECRET");

    let yaml = MINIMAL.replace("\"secret\"", "\"${TUBELY_TEST_UNSET_JWT_SECRET}\"");
    let result = ConfigLoader::from_yaml(&yaml);

    match result {
        Err(ConfigError::ValidationError(msg)) => {
            assert!(msg.contains("TUBELY_TEST_UNSET_JWT_SECRET"))
        }
        other => panic!("expected validation error, got {:?}", other.map(|c| c.auth.jwt_secret)),
    }
}

#[test]
#[serial]
fn test_example_config_needs_its_variables() {
    std::env::remove_var("JWT_SECRET");
    std::env::remove_var("S3_BUCKET");

    let example = include_str!("../config.example.yaml");
    assert!(matches!(
        ConfigLoader::from_yaml(example),
        Err(ConfigError::ValidationError(_))
    ));

    std::env::set_var("JWT_SECRET", "example-secret");
    std::env::set_var("S3_BUCKET", "example-bucket");
    let result = ConfigLoader::from_yaml(example);
    std::env::remove_var("JWT_SECRET");
    std::env::remove_var("S3_BUCKET");

    let config = result.unwrap();
    assert_eq!(config.auth.jwt_secret, "example-secret");
    assert!(config.s3.access_key.is_none());
}
