// src/core/policy.rs

use crate::config::{PoolConfig, QuotaResetPolicy};
use crate::core::Outcome;
use crate::storage::{Credential, CredentialStatus};
use chrono::{DateTime, Duration, TimeZone, Utc};

/// Longest cooldown or quota window the policy will ever apply (365 days).
pub const MAX_COOLDOWN_SECS: u64 = 365 * 24 * 60 * 60;

/// Where an observation came from. Probes additionally stamp `last_checked_at`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Observation {
    Call,
    Probe,
}

/// The single state machine shared by call reports and probe results.
#[derive(Debug, Clone)]
pub struct HealthPolicy {
    base_cooldown_secs: u64,
    max_cooldown_secs: u64,
    quota_reset: QuotaResetPolicy,
}

impl HealthPolicy {
    pub fn new(base_cooldown_secs: u64, max_cooldown_secs: u64, quota_reset: QuotaResetPolicy) -> Self {
        Self {
            base_cooldown_secs,
            max_cooldown_secs,
            quota_reset,
        }
    }

    pub fn from_config(config: &PoolConfig) -> Self {
        Self::new(
            config.base_cooldown_secs,
            config.max_cooldown_secs,
            config.quota_reset,
        )
    }

    /// Exponential backoff for the n-th consecutive failure, capped.
    pub fn backoff(&self, consecutive_failures: u32) -> Duration {
        let exponent = consecutive_failures.saturating_sub(1);
        let factor = 1u64.checked_shl(exponent).unwrap_or(u64::MAX);
        let secs = self
            .base_cooldown_secs
            .saturating_mul(factor)
            .min(self.max_cooldown_secs);
        Self::capped_seconds(secs)
    }

    /// Instant at which an exhausted credential becomes eligible again.
    pub fn quota_reset_at(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        match self.quota_reset {
            QuotaResetPolicy::Fixed { window_secs } => {
                Self::later_by(now, Self::capped_seconds(window_secs))
            }
            QuotaResetPolicy::Daily { hour_utc } => {
                let today = now
                    .date_naive()
                    .and_hms_opt(hour_utc, 0, 0)
                    .map(|naive| Utc.from_utc_datetime(&naive));
                match today {
                    Some(reset) if reset > now => reset,
                    Some(reset) => Self::later_by(reset, Duration::days(1)),
                    None => Self::later_by(now, Duration::days(1)),
                }
            }
        }
    }

    /// Applies one observation to a record. `invalid` records are left untouched.
    pub fn apply(
        &self,
        credential: &mut Credential,
        outcome: Outcome,
        observation: Observation,
        now: DateTime<Utc>,
    ) {
        if credential.is_invalid() {
            return;
        }
        if observation == Observation::Probe {
            credential.last_checked_at = Some(now);
        }

        match outcome {
            Outcome::Success => {
                credential.status = CredentialStatus::Healthy;
                credential.cooldown_until = None;
                credential.consecutive_failures = 0;
                credential.last_success_at = Some(now);
            }
            Outcome::RateLimited => {
                Self::record_failure(credential, now);
                let until = Self::later_by(now, self.backoff(credential.consecutive_failures));
                credential.status = CredentialStatus::RateLimited;
                credential.cooldown_until = Some(Self::later(credential.cooldown_until, until));
            }
            Outcome::Exhausted => {
                Self::record_failure(credential, now);
                let until = self.quota_reset_at(now);
                credential.status = CredentialStatus::Exhausted;
                credential.cooldown_until = Some(Self::later(credential.cooldown_until, until));
            }
            Outcome::Invalid => {
                Self::record_failure(credential, now);
                credential.status = CredentialStatus::Invalid;
                credential.cooldown_until = None;
            }
            Outcome::OtherFailure => {
                Self::record_failure(credential, now);
            }
        }
    }

    fn record_failure(credential: &mut Credential, now: DateTime<Utc>) {
        credential.consecutive_failures = credential.consecutive_failures.saturating_add(1);
        credential.last_failure_at = Some(now);
    }

    /// Whole seconds as a duration, never longer than [`MAX_COOLDOWN_SECS`].
    fn capped_seconds(secs: u64) -> Duration {
        let secs = i64::try_from(secs.min(MAX_COOLDOWN_SECS)).unwrap_or(i64::MAX);
        Duration::try_seconds(secs).unwrap_or(Duration::MAX)
    }

    /// `at + by`, saturating at the latest representable instant.
    fn later_by(at: DateTime<Utc>, by: Duration) -> DateTime<Utc> {
        at.checked_add_signed(by).unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    fn later(existing: Option<DateTime<Utc>>, candidate: DateTime<Utc>) -> DateTime<Utc> {
        existing.map_or(candidate, |current| current.max(candidate))
    }
}

impl Default for HealthPolicy {
    fn default() -> Self {
        Self::from_config(&PoolConfig::default())
    }
}
