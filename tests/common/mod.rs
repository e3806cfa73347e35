//! Common test utilities and fixtures
#![allow(dead_code)]

use chrono::{DateTime, TimeZone, Utc};
use cv_keypool::config::{
    AppConfig, CredentialConfig, PoolConfig, ProviderConfig, QuotaResetPolicy,
};
use cv_keypool::{InMemoryStore, KeyPool, ManualClock};
use secrecy::Secret;
use std::sync::Arc;

/// Fixed start instant for simulated-time tests.
pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
}

pub fn credential(id: &str) -> CredentialConfig {
    CredentialConfig {
        id: id.to_string(),
        key: Secret::new(format!("secret-{id}")),
    }
}

/// Pool config with a 60s base cooldown and a one-hour fixed quota window.
pub fn pool_config() -> PoolConfig {
    PoolConfig {
        base_cooldown_secs: 60,
        max_cooldown_secs: 600,
        probe_after_failures: 3,
        quota_reset: QuotaResetPolicy::Fixed { window_secs: 3600 },
    }
}

pub fn provider_config(base_url: &str) -> ProviderConfig {
    ProviderConfig {
        base_url: base_url.to_string(),
        connect_timeout_secs: 1,
        request_timeout_secs: 2,
        probe_timeout_secs: 2,
        ..ProviderConfig::default()
    }
}

/// In-memory pool on a manual clock, credentials registered in the given order.
pub async fn test_pool(ids: &[&str]) -> (Arc<KeyPool>, Arc<ManualClock>) {
    test_pool_with(ids, &pool_config()).await
}

pub async fn test_pool_with(ids: &[&str], config: &PoolConfig) -> (Arc<KeyPool>, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new(t0()));
    let pool = KeyPool::new(Arc::new(InMemoryStore::new()), config, clock.clone());
    let credentials: Vec<CredentialConfig> = ids.iter().map(|id| credential(id)).collect();
    pool.register_all(&credentials)
        .await
        .expect("Failed to register credentials");
    (Arc::new(pool), clock)
}

/// Test configuration builder
pub struct TestConfigBuilder {
    config: AppConfig,
}

impl TestConfigBuilder {
    pub fn new() -> Self {
        let mut config = AppConfig::default();
        config.server.test_mode = true;
        config.prober.enabled = false;
        config.pool = pool_config();
        Self { config }
    }

    pub fn with_credential(mut self, id: &str) -> Self {
        self.config.credentials.push(credential(id));
        self
    }

    pub fn with_provider(mut self, base_url: &str) -> Self {
        self.config.provider = provider_config(base_url);
        self
    }

    pub fn with_admin_token(mut self, token: &str) -> Self {
        self.config.server.admin_token = Some(token.to_string());
        self
    }

    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.config.generation.max_attempts = attempts;
        self
    }

    pub fn build(self) -> AppConfig {
        self.config
    }
}

impl Default for TestConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
