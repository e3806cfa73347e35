// src/config/validation.rs

use crate::config::AppConfig;
use crate::core::MAX_COOLDOWN_SECS;
use crate::error::{AppError, Result};
use secrecy::ExposeSecret;
use std::collections::HashSet;
use tracing::{debug, warn};
use url::Url;

pub struct ConfigValidator;

impl ConfigValidator {
    pub fn validate(config: &AppConfig) -> Result<()> {
        debug!("Starting configuration validation");

        if let Err(e) = Self::validate_credentials(config) {
            warn!("Credential validation failed: {}", e);
            return Err(e);
        }

        if let Err(e) = Self::validate_provider(config) {
            warn!("Provider config validation failed: {}", e);
            return Err(e);
        }

        if let Err(e) = Self::validate_pool(config) {
            warn!("Pool config validation failed: {}", e);
            return Err(e);
        }

        if let Some(redis_url) = &config.redis_url {
            Self::validate_url(redis_url, "redis_url")?;
        }

        if config.server.port == 0 && !config.server.test_mode {
            return Err(AppError::config_validation(
                "Server port cannot be 0 (except in test mode)",
                Some("server.port"),
            ));
        }

        debug!("Configuration validation completed successfully");
        Ok(())
    }

    fn validate_credentials(config: &AppConfig) -> Result<()> {
        if config.credentials.is_empty() {
            warn!("No credentials configured; every acquire will report unavailable");
        }

        let mut ids = HashSet::new();
        let mut secrets = HashSet::new();

        for credential in &config.credentials {
            if credential.id.trim().is_empty() {
                return Err(AppError::config_validation(
                    "Credential id cannot be empty",
                    Some("credentials.id"),
                ));
            }
            if !ids.insert(credential.id.as_str()) {
                return Err(AppError::config_validation(
                    format!("Duplicate credential id: {}", credential.id),
                    Some("credentials.id"),
                ));
            }
            let secret = credential.key.expose_secret();
            if secret.trim().is_empty() {
                return Err(AppError::config_validation(
                    format!("Credential '{}' has an empty key", credential.id),
                    Some("credentials.key"),
                ));
            }
            if !secrets.insert(secret.as_str()) {
                return Err(AppError::config_validation(
                    format!("Credential '{}' duplicates another credential's key", credential.id),
                    Some("credentials.key"),
                ));
            }
        }

        debug!("Validated {} credentials", ids.len());
        Ok(())
    }

    fn validate_provider(config: &AppConfig) -> Result<()> {
        Self::validate_url(&config.provider.base_url, "provider.base_url")?;

        if config.provider.model.trim().is_empty() {
            return Err(AppError::config_validation(
                "Model name cannot be empty",
                Some("provider.model"),
            ));
        }

        for (value, field) in [
            (config.provider.connect_timeout_secs, "provider.connect_timeout_secs"),
            (config.provider.request_timeout_secs, "provider.request_timeout_secs"),
            (config.provider.probe_timeout_secs, "provider.probe_timeout_secs"),
        ] {
            if value == 0 {
                return Err(AppError::config_validation(
                    format!("{field} cannot be 0"),
                    Some(field),
                ));
            }
        }
        Ok(())
    }

    fn validate_pool(config: &AppConfig) -> Result<()> {
        let pool = &config.pool;

        if pool.base_cooldown_secs == 0 {
            return Err(AppError::config_validation(
                "Base cooldown cannot be 0",
                Some("pool.base_cooldown_secs"),
            ));
        }

        if pool.base_cooldown_secs > pool.max_cooldown_secs {
            return Err(AppError::config_validation(
                "Base cooldown cannot exceed the maximum cooldown",
                Some("pool.max_cooldown_secs"),
            ));
        }

        if pool.max_cooldown_secs > MAX_COOLDOWN_SECS {
            return Err(AppError::config_validation(
                format!("Maximum cooldown cannot exceed {MAX_COOLDOWN_SECS} seconds"),
                Some("pool.max_cooldown_secs"),
            ));
        }

        match pool.quota_reset {
            crate::config::QuotaResetPolicy::Fixed { window_secs: 0 } => {
                return Err(AppError::config_validation(
                    "Quota reset window cannot be 0",
                    Some("pool.quota_reset.window_secs"),
                ));
            }
            crate::config::QuotaResetPolicy::Fixed { window_secs } if window_secs > MAX_COOLDOWN_SECS => {
                return Err(AppError::config_validation(
                    format!("Quota reset window cannot exceed {MAX_COOLDOWN_SECS} seconds"),
                    Some("pool.quota_reset.window_secs"),
                ));
            }
            crate::config::QuotaResetPolicy::Daily { hour_utc } if hour_utc > 23 => {
                return Err(AppError::config_validation(
                    format!("Quota reset hour must be 0-23, got {hour_utc}"),
                    Some("pool.quota_reset.hour_utc"),
                ));
            }
            _ => {}
        }

        if config.prober.enabled && config.prober.interval_secs == 0 {
            return Err(AppError::config_validation(
                "Probe interval cannot be 0 while probing is enabled",
                Some("prober.interval_secs"),
            ));
        }

        if config.generation.max_attempts == 0 {
            return Err(AppError::config_validation(
                "max_attempts must be at least 1",
                Some("generation.max_attempts"),
            ));
        }

        Ok(())
    }

    fn validate_url(url_str: &str, field_name: &str) -> Result<()> {
        let url = Url::parse(url_str).map_err(|e| {
            AppError::config_validation(format!("Invalid {field_name}: {e}"), Some(field_name))
        })?;

        if url.host_str().is_none() {
            return Err(AppError::config_validation(
                format!("{field_name} must include a host"),
                Some(field_name),
            ));
        }
        Ok(())
    }
}
