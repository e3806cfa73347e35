// src/config/app.rs

use secrecy::Secret;
use serde::{Deserialize, Serialize};

/// One provider credential as it appears in configuration.
#[derive(Debug, Deserialize, Clone)]
pub struct CredentialConfig {
    pub id: String,
    pub key: Secret<String>,
}

#[derive(Debug, Deserialize, Clone, PartialEq, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub admin_token: Option<String>,
    #[serde(default)]
    pub test_mode: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            admin_token: None,
            test_mode: false,
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq, Serialize)]
pub struct ProviderConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_probe_timeout")]
    pub probe_timeout_secs: u64,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            model: default_model(),
            connect_timeout_secs: default_connect_timeout(),
            request_timeout_secs: default_request_timeout(),
            probe_timeout_secs: default_probe_timeout(),
        }
    }
}

/// When an `exhausted` credential becomes eligible again without a probe.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum QuotaResetPolicy {
    /// Fixed window measured from the moment exhaustion was observed.
    Fixed { window_secs: u64 },
    /// Next occurrence of the given UTC hour (provider daily quota reset).
    Daily { hour_utc: u32 },
}

impl Default for QuotaResetPolicy {
    fn default() -> Self {
        Self::Daily { hour_utc: 8 }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq, Serialize)]
pub struct PoolConfig {
    /// Cooldown applied on the first rate-limit; doubles with each further failure.
    #[serde(default = "default_base_cooldown")]
    pub base_cooldown_secs: u64,
    #[serde(default = "default_max_cooldown")]
    pub max_cooldown_secs: u64,
    /// Consecutive failures after which an out-of-band probe is requested.
    #[serde(default = "default_probe_after_failures")]
    pub probe_after_failures: u32,
    #[serde(default)]
    pub quota_reset: QuotaResetPolicy,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            base_cooldown_secs: default_base_cooldown(),
            max_cooldown_secs: default_max_cooldown(),
            probe_after_failures: default_probe_after_failures(),
            quota_reset: QuotaResetPolicy::default(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq, Serialize)]
pub struct ProberConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_probe_interval")]
    pub interval_secs: u64,
}

impl Default for ProberConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: default_probe_interval(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq, Serialize)]
pub struct GenerationConfig {
    /// Distinct credentials tried for one generation before giving up.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub provider: ProviderConfig,
    #[serde(default)]
    pub pool: PoolConfig,
    #[serde(default)]
    pub prober: ProberConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
    #[serde(default)]
    pub credentials: Vec<CredentialConfig>,
    #[serde(default)]
    pub redis_url: Option<String>,
    #[serde(default)]
    pub redis_key_prefix: Option<String>,
    /// Re-read the config file on this interval and register new credentials.
    #[serde(default)]
    pub refresh_interval_secs: Option<u64>,
}

// Default value functions
fn default_port() -> u16 {
    8080
}

fn default_base_url() -> String {
    "https://generativelanguage.googleapis.com".to_string()
}

fn default_model() -> String {
    "gemini-1.5-flash".to_string()
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_request_timeout() -> u64 {
    60
}

fn default_probe_timeout() -> u64 {
    15
}

fn default_base_cooldown() -> u64 {
    30
}

fn default_max_cooldown() -> u64 {
    900
}

fn default_probe_after_failures() -> u32 {
    3
}

fn default_probe_interval() -> u64 {
    300
}

fn default_max_attempts() -> u32 {
    3
}

fn default_true() -> bool {
    true
}

impl AppConfig {
    pub fn redis_prefix(&self) -> &str {
        self.redis_key_prefix.as_deref().unwrap_or("keypool:")
    }
}
