// tests/config_tests.rs

use cv_keypool::config::{load_config, AppConfig, ConfigValidator, QuotaResetPolicy};
use cv_keypool::AppError;
use secrecy::{ExposeSecret, Secret};
use serial_test::serial;
use std::io::Write;
use tempfile::NamedTempFile;

fn write_config(yaml: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(yaml.as_bytes()).unwrap();
    file
}

fn clear_env() {
    for var in ["PORT", "REDIS_URL", "KEYPOOL_API_KEYS"] {
        std::env::remove_var(var);
    }
}

#[test]
#[serial]
fn loads_yaml_with_defaults() {
    clear_env();
    let file = write_config(
        r#"
server:
  port: 9090
pool:
  base_cooldown_secs: 10
  quota_reset:
    kind: fixed
    window_secs: 3600
credentials:
  - id: primary
    key: AIza-primary
  - id: backup
    key: AIza-backup
"#,
    );

    let config = load_config(file.path()).unwrap();

    assert_eq!(config.server.port, 9090);
    assert_eq!(config.pool.base_cooldown_secs, 10);
    assert_eq!(config.pool.max_cooldown_secs, 900);
    assert_eq!(config.pool.quota_reset, QuotaResetPolicy::Fixed { window_secs: 3600 });
    assert_eq!(config.provider.model, "gemini-1.5-flash");
    assert!(config.prober.enabled);
    assert_eq!(config.credentials.len(), 2);
    assert_eq!(config.credentials[1].id, "backup");
    assert_eq!(config.credentials[1].key.expose_secret(), "AIza-backup");
}

#[test]
#[serial]
fn missing_file_falls_back_to_defaults() {
    clear_env();
    let dir = tempfile::tempdir().unwrap();

    let config = load_config(&dir.path().join("absent.yaml")).unwrap();

    assert_eq!(config.server.port, 8080);
    assert!(config.credentials.is_empty());
    assert_eq!(config.pool.quota_reset, QuotaResetPolicy::Daily { hour_utc: 8 });
}

#[test]
#[serial]
fn environment_overrides_and_adds_credentials() {
    clear_env();
    let file = write_config(
        r#"
credentials:
  - id: primary
    key: AIza-primary
"#,
    );
    std::env::set_var("PORT", "7070");
    std::env::set_var("KEYPOOL_API_KEYS", "extra=AIza-extra, AIza-bare");

    let config = load_config(file.path()).unwrap();
    clear_env();

    assert_eq!(config.server.port, 7070);
    let ids: Vec<&str> = config.credentials.iter().map(|c| c.id.as_str()).collect();
    assert_eq!(ids, vec!["primary", "extra", "key-3"]);
}

#[test]
#[serial]
fn malformed_yaml_reports_parse_error() {
    clear_env();
    let file = write_config("credentials: [ {id: a, key: ");

    let err = load_config(file.path()).unwrap_err();
    assert!(matches!(err, AppError::ConfigParse { .. }));
}

#[test]
#[serial]
fn duplicate_credential_ids_are_rejected() {
    clear_env();
    let file = write_config(
        r#"
credentials:
  - id: same
    key: AIza-one
  - id: same
    key: AIza-two
"#,
    );

    let err = load_config(file.path()).unwrap_err();
    assert!(matches!(err, AppError::ConfigValidation { .. }));
}

#[test]
fn validator_rejects_inverted_cooldowns() {
    let mut config = AppConfig::default();
    config.pool.base_cooldown_secs = 1000;
    config.pool.max_cooldown_secs = 10;

    assert!(ConfigValidator::validate(&config).is_err());
}

#[test]
fn validator_rejects_duplicate_secrets() {
    let mut config = AppConfig::default();
    for id in ["a", "b"] {
        config.credentials.push(cv_keypool::config::CredentialConfig {
            id: id.to_string(),
            key: Secret::new("AIza-shared".to_string()),
        });
    }

    assert!(ConfigValidator::validate(&config).is_err());
}

#[test]
fn validator_rejects_bad_provider_url_and_reset_hour() {
    let mut config = AppConfig::default();
    config.provider.base_url = "not a url".to_string();
    assert!(ConfigValidator::validate(&config).is_err());

    let mut config = AppConfig::default();
    config.pool.quota_reset = QuotaResetPolicy::Daily { hour_utc: 24 };
    assert!(ConfigValidator::validate(&config).is_err());
}

#[test]
fn default_config_is_valid() {
    assert!(ConfigValidator::validate(&AppConfig::default()).is_ok());
}

#[test]
fn validator_rejects_cooldowns_longer_than_a_year() {
    let mut config = AppConfig::default();
    config.pool.max_cooldown_secs = u64::MAX;
    let err = ConfigValidator::validate(&config).unwrap_err();
    assert!(matches!(
        err,
        AppError::ConfigValidation { field: Some(ref f), .. } if f == "pool.max_cooldown_secs"
    ));

    let mut config = AppConfig::default();
    config.pool.quota_reset = QuotaResetPolicy::Fixed { window_secs: u64::MAX };
    let err = ConfigValidator::validate(&config).unwrap_err();
    assert!(matches!(
        err,
        AppError::ConfigValidation { field: Some(ref f), .. } if f == "pool.quota_reset.window_secs"
    ));

    let mut config = AppConfig::default();
    config.pool.max_cooldown_secs = cv_keypool::core::MAX_COOLDOWN_SECS;
    config.pool.quota_reset = QuotaResetPolicy::Fixed {
        window_secs: cv_keypool::core::MAX_COOLDOWN_SECS,
    };
    assert!(ConfigValidator::validate(&config).is_ok());
}
