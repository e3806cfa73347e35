// src/core/selection.rs

use crate::storage::{Credential, CredentialStatus};
use chrono::{DateTime, Utc};
use tracing::debug;

/// Strategy for picking one credential out of a store snapshot.
pub trait SelectionStrategy: Send + Sync {
    fn select<'a>(&self, candidates: &'a [Credential], now: DateTime<Utc>) -> Option<&'a Credential>;

    fn name(&self) -> &'static str;
}

/// Prefers proven credentials, then spreads load by picking the one whose
/// last success is oldest. Never-used credentials come first; registration
/// order breaks remaining ties.
#[derive(Debug, Default, Clone, Copy)]
pub struct LeastRecentlyUsedStrategy;

impl LeastRecentlyUsedStrategy {
    /// Lower is better. Cooled-down and reset-elapsed credentials are usable
    /// but only after everything with a clean record.
    fn status_rank(status: CredentialStatus) -> u8 {
        match status {
            CredentialStatus::Healthy => 0,
            CredentialStatus::Unknown => 1,
            CredentialStatus::RateLimited => 2,
            CredentialStatus::Exhausted => 3,
            CredentialStatus::Invalid => u8::MAX,
        }
    }
}

impl SelectionStrategy for LeastRecentlyUsedStrategy {
    fn select<'a>(&self, candidates: &'a [Credential], now: DateTime<Utc>) -> Option<&'a Credential> {
        let selected = candidates
            .iter()
            .filter(|credential| credential.is_eligible(now))
            .min_by_key(|credential| {
                (
                    Self::status_rank(credential.status),
                    credential.last_success_at,
                    credential.registration_seq,
                )
            });

        if let Some(credential) = selected {
            debug!(
                credential.id = %credential.id,
                status = %credential.status,
                total_candidates = candidates.len(),
                strategy = self.name(),
                "Credential selected"
            );
        }
        selected
    }

    fn name(&self) -> &'static str {
        "least_recently_used"
    }
}
