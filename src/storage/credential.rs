// src/storage/credential.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Last-observed health of a credential.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CredentialStatus {
    Unknown,
    Healthy,
    RateLimited,
    Exhausted,
    /// Rejected by the provider. Never leaves this state.
    Invalid,
}

impl CredentialStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::Healthy => "healthy",
            Self::RateLimited => "rate_limited",
            Self::Exhausted => "exhausted",
            Self::Invalid => "invalid",
        }
    }
}

impl fmt::Display for CredentialStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Health record of a single credential. The secret itself is not part of
/// the record and is never persisted.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct Credential {
    pub id: String,
    /// Order in which the credential was first registered.
    pub registration_seq: u64,
    pub status: CredentialStatus,
    pub last_checked_at: Option<DateTime<Utc>>,
    pub last_success_at: Option<DateTime<Utc>>,
    pub last_failure_at: Option<DateTime<Utc>>,
    pub cooldown_until: Option<DateTime<Utc>>,
    pub consecutive_failures: u32,
}

impl Credential {
    pub fn new(id: impl Into<String>, registration_seq: u64) -> Self {
        Self {
            id: id.into(),
            registration_seq,
            status: CredentialStatus::Unknown,
            last_checked_at: None,
            last_success_at: None,
            last_failure_at: None,
            cooldown_until: None,
            consecutive_failures: 0,
        }
    }

    pub fn is_invalid(&self) -> bool {
        self.status == CredentialStatus::Invalid
    }

    pub fn is_cooling_down(&self, now: DateTime<Utc>) -> bool {
        self.cooldown_until.is_some_and(|until| until > now)
    }

    /// Whether `acquire` may hand this credential out at `now`.
    pub fn is_eligible(&self, now: DateTime<Utc>) -> bool {
        !self.is_invalid() && !self.is_cooling_down(now)
    }
}
