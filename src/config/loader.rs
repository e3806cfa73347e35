// src/config/loader.rs

use crate::config::{AppConfig, ConfigValidator, CredentialConfig};
use crate::error::{AppError, Result};
use secrecy::Secret;
use std::path::Path;
use tracing::{debug, info, warn};

const ENV_API_KEYS: &str = "KEYPOOL_API_KEYS";

/// Load configuration from file, apply environment overrides and validate.
pub fn load_config(config_path: &Path) -> Result<AppConfig> {
    let mut config = if config_path.exists() {
        info!("Loading configuration from file: {}", config_path.display());
        load_from_file(config_path)?
    } else {
        info!("Configuration file not found, using defaults");
        AppConfig::default()
    };

    override_with_env(&mut config);

    ConfigValidator::validate(&config)?;

    debug!("Configuration loaded and validated successfully");
    Ok(config)
}

fn load_from_file(config_path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(config_path).map_err(|_| AppError::ConfigNotFound {
        path: config_path.display().to_string(),
    })?;

    if content.trim().is_empty() {
        warn!("Config file '{}' is empty. Using defaults.", config_path.display());
        return Ok(AppConfig::default());
    }

    serde_yaml::from_str(&content).map_err(|e| AppError::ConfigParse {
        message: format!("Failed to parse config file: {e}"),
        line: e.location().map(|loc| loc.line()),
    })
}

fn override_with_env(config: &mut AppConfig) {
    if let Ok(redis_url) = std::env::var("REDIS_URL") {
        info!("Overriding Redis URL from environment variable");
        config.redis_url = Some(redis_url);
    }

    if let Ok(port_str) = std::env::var("PORT") {
        if let Ok(port) = port_str.parse::<u16>() {
            info!("Overriding server port from environment variable: {}", port);
            config.server.port = port;
        } else {
            warn!("Invalid PORT environment variable: {}", port_str);
        }
    }

    if let Ok(raw) = std::env::var(ENV_API_KEYS) {
        let parsed = parse_env_credentials(&raw, config.credentials.len());
        info!(count = parsed.len(), "Adding credentials from {}", ENV_API_KEYS);
        for credential in parsed {
            if config.credentials.iter().any(|c| c.id == credential.id) {
                warn!(credential.id = %credential.id, "Credential id from environment already configured, skipping");
                continue;
            }
            config.credentials.push(credential);
        }
    }
}

/// Parses `id=secret,id=secret` or bare `secret,secret` lists.
/// Bare secrets get positional ids (`key-1`, `key-2`, ...).
pub(crate) fn parse_env_credentials(raw: &str, offset: usize) -> Vec<CredentialConfig> {
    raw.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .enumerate()
        .map(|(i, entry)| match entry.split_once('=') {
            Some((id, key)) if !id.trim().is_empty() => CredentialConfig {
                id: id.trim().to_string(),
                key: Secret::new(key.trim().to_string()),
            },
            _ => CredentialConfig {
                id: format!("key-{}", offset + i + 1),
                key: Secret::new(entry.to_string()),
            },
        })
        .collect()
}
