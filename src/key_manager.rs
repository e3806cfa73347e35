// src/key_manager.rs

use crate::clock::Clock;
use crate::config::{CredentialConfig, PoolConfig};
use crate::core::{HealthPolicy, LeastRecentlyUsedStrategy, Observation, Outcome, SelectionStrategy};
use crate::error::Result;
use crate::metrics;
use crate::storage::{Credential, CredentialStatus, CredentialStore};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::Mutex;
use secrecy::Secret;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info, instrument, warn};

/// Pending out-of-band probe requests. Requests beyond this are dropped.
const PROBE_REQUEST_CAPACITY: usize = 64;

/// Selects credentials for provider calls and records call outcomes.
///
/// Consumers follow a two-call contract: [`KeyPool::acquire`] before a
/// provider call, [`KeyPool::report`] after it. `acquire` returning `None`
/// is definitive: nothing is eligible right now and callers should back off
/// rather than spin.
pub struct KeyPool {
    store: Arc<dyn CredentialStore>,
    secrets: DashMap<String, Secret<String>>,
    policy: HealthPolicy,
    strategy: Box<dyn SelectionStrategy>,
    clock: Arc<dyn Clock>,
    probe_after_failures: u32,
    probe_tx: mpsc::Sender<String>,
    probe_rx: Mutex<Option<mpsc::Receiver<String>>>,
}

impl KeyPool {
    pub fn new(store: Arc<dyn CredentialStore>, config: &PoolConfig, clock: Arc<dyn Clock>) -> Self {
        let (probe_tx, probe_rx) = mpsc::channel(PROBE_REQUEST_CAPACITY);
        Self {
            store,
            secrets: DashMap::new(),
            policy: HealthPolicy::from_config(config),
            strategy: Box::new(LeastRecentlyUsedStrategy),
            clock,
            probe_after_failures: config.probe_after_failures,
            probe_tx,
            probe_rx: Mutex::new(Some(probe_rx)),
        }
    }

    pub fn with_strategy(mut self, strategy: Box<dyn SelectionStrategy>) -> Self {
        self.strategy = strategy;
        self
    }

    /// Registers one credential. Existing records keep their state; the
    /// secret is (re)bound in memory.
    #[instrument(level = "debug", skip(self, credential), fields(credential.id = %credential.id))]
    pub async fn register(&self, credential: &CredentialConfig) -> Result<Credential> {
        let record = self.store.register(&credential.id).await?;
        self.secrets
            .insert(credential.id.clone(), credential.key.clone());
        debug!(status = %record.status, "Credential registered");
        Ok(record)
    }

    /// Registers every credential and returns how many were not known before.
    pub async fn register_all(&self, credentials: &[CredentialConfig]) -> Result<usize> {
        let mut added = 0;
        for credential in credentials {
            let known = self.secrets.contains_key(&credential.id);
            self.register(credential).await?;
            if !known {
                added += 1;
            }
        }
        if added > 0 {
            info!(added, total = self.secrets.len(), "Credentials registered");
        }
        Ok(added)
    }

    /// Picks the best eligible credential, or `None` when nothing qualifies.
    pub async fn acquire(&self) -> Result<Option<String>> {
        self.acquire_excluding(&HashSet::new()).await
    }

    /// Same as [`KeyPool::acquire`] but never returns an identifier in `exclude`.
    #[instrument(level = "debug", skip(self))]
    pub async fn acquire_excluding(&self, exclude: &HashSet<String>) -> Result<Option<String>> {
        let now = self.clock.now();
        let bound: Vec<Credential> = self
            .store
            .list()
            .await?
            .into_iter()
            .filter(|credential| self.secrets.contains_key(&credential.id))
            .collect();
        Self::record_pool_size(&bound, now);

        let candidates: Vec<Credential> = bound
            .into_iter()
            .filter(|credential| !exclude.contains(&credential.id))
            .collect();

        match self.strategy.select(&candidates, now) {
            Some(credential) => {
                metrics::record_acquire("acquired");
                Ok(Some(credential.id.clone()))
            }
            None => {
                metrics::record_acquire("unavailable");
                warn!(
                    total_candidates = candidates.len(),
                    "No credential is currently eligible"
                );
                Ok(None)
            }
        }
    }

    /// Records the outcome of a provider call made with `id`.
    #[instrument(level = "debug", skip_all, fields(credential.id = %id, outcome = %outcome))]
    pub async fn report(&self, id: &str, outcome: Outcome) -> Result<Credential> {
        metrics::record_report(outcome.as_str());
        self.observe(id, outcome, Observation::Call).await
    }

    /// Like [`KeyPool::report`] for outcome names coming from outside the
    /// crate. Unrecognized names count as `other_failure`.
    pub async fn report_named(&self, id: &str, outcome: &str) -> Result<Credential> {
        self.report(id, Outcome::from(outcome)).await
    }

    /// Applies a probe result through the same policy as call reports.
    pub(crate) async fn record_probe(&self, id: &str, outcome: Outcome) -> Result<Credential> {
        metrics::record_probe(outcome.as_str());
        self.observe(id, outcome, Observation::Probe).await
    }

    async fn observe(&self, id: &str, outcome: Outcome, observation: Observation) -> Result<Credential> {
        let now = self.clock.now();
        let policy = self.policy.clone();
        let updated = self
            .store
            .update(
                id,
                Box::new(move |credential: &mut Credential| {
                    policy.apply(credential, outcome, observation, now)
                }),
            )
            .await?;

        match updated.status {
            CredentialStatus::Invalid if outcome == Outcome::Invalid => {
                error!(
                    credential.id = %id,
                    alert = "operator",
                    "Credential rejected by provider and removed from rotation; check configuration"
                );
            }
            CredentialStatus::RateLimited | CredentialStatus::Exhausted if !outcome.is_success() => {
                warn!(
                    credential.id = %id,
                    status = %updated.status,
                    cooldown_until = ?updated.cooldown_until,
                    failures = updated.consecutive_failures,
                    "Credential placed in cooldown"
                );
            }
            _ => {
                debug!(
                    credential.id = %id,
                    status = %updated.status,
                    failures = updated.consecutive_failures,
                    "Credential state updated"
                );
            }
        }

        if observation == Observation::Call
            && !outcome.is_success()
            && !updated.is_invalid()
            && updated.consecutive_failures >= self.probe_after_failures
        {
            self.request_probe(id);
        }

        Ok(updated)
    }

    /// Asks the prober to check `id` soon. Dropped when the queue is full.
    pub fn request_probe(&self, id: &str) {
        match self.probe_tx.try_send(id.to_string()) {
            Ok(()) => debug!(credential.id = %id, "Out-of-band probe requested"),
            Err(mpsc::error::TrySendError::Full(_)) => {
                debug!(credential.id = %id, "Probe queue full, request dropped")
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {}
        }
    }

    /// Hands the probe request queue to the prober. Only the first caller gets it.
    pub(crate) fn take_probe_requests(&self) -> Option<mpsc::Receiver<String>> {
        self.probe_rx.lock().take()
    }

    pub(crate) fn secret(&self, id: &str) -> Option<Secret<String>> {
        self.secrets.get(id).map(|entry| entry.value().clone())
    }

    pub async fn get(&self, id: &str) -> Result<Credential> {
        self.store.get(id).await
    }

    /// All records known to this process, in registration order.
    pub async fn snapshot(&self) -> Result<Vec<Credential>> {
        let mut records: Vec<Credential> = self
            .store
            .list()
            .await?
            .into_iter()
            .filter(|credential| self.secrets.contains_key(&credential.id))
            .collect();
        records.sort_by_key(|credential| credential.registration_seq);
        Self::record_pool_size(&records, self.clock.now());
        Ok(records)
    }

    fn record_pool_size(records: &[Credential], now: DateTime<Utc>) {
        let eligible = records.iter().filter(|c| c.is_eligible(now)).count();
        metrics::set_pool_size(records.len(), eligible);
    }

    pub fn ids(&self) -> Vec<String> {
        self.secrets.iter().map(|entry| entry.key().clone()).collect()
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    pub fn policy(&self) -> &HealthPolicy {
        &self.policy
    }
}

impl std::fmt::Debug for KeyPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyPool")
            .field("credentials", &self.secrets.len())
            .field("strategy", &self.strategy.name())
            .field("probe_after_failures", &self.probe_after_failures)
            .finish()
    }
}
