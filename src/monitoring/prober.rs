// src/monitoring/prober.rs

use crate::config::{ProberConfig, ProviderConfig};
use crate::core::Outcome;
use crate::error::Result;
use crate::key_manager::KeyPool;
use crate::provider::ProviderAdapter;
use dashmap::{DashMap, DashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info, instrument, warn};

/// Removes the in-flight marker when a probe finishes or is cancelled.
struct InFlightGuard<'a> {
    in_flight: &'a DashSet<String>,
    id: String,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.in_flight.remove(&self.id);
    }
}

/// Background health checks for every credential in a pool.
///
/// One task per credential probes on a fixed interval; a separate listener
/// serves on-demand requests from the pool. At most one probe per credential
/// is in flight; overlapping requests are dropped.
pub struct HealthProber {
    pool: Arc<KeyPool>,
    adapter: Arc<dyn ProviderAdapter>,
    interval: Duration,
    probe_timeout: Duration,
    in_flight: DashSet<String>,
    tasks: DashMap<String, JoinHandle<()>>,
    listener: parking_lot::Mutex<Option<JoinHandle<()>>>,
}

impl HealthProber {
    pub fn new(
        pool: Arc<KeyPool>,
        adapter: Arc<dyn ProviderAdapter>,
        interval: Duration,
        probe_timeout: Duration,
    ) -> Self {
        Self {
            pool,
            adapter,
            interval,
            probe_timeout,
            in_flight: DashSet::new(),
            tasks: DashMap::new(),
            listener: parking_lot::Mutex::new(None),
        }
    }

    pub fn from_config(
        pool: Arc<KeyPool>,
        adapter: Arc<dyn ProviderAdapter>,
        prober: &ProberConfig,
        provider: &ProviderConfig,
    ) -> Self {
        Self::new(
            pool,
            adapter,
            Duration::from_secs(prober.interval_secs),
            Duration::from_secs(provider.probe_timeout_secs),
        )
    }

    /// Probes one credential now.
    ///
    /// Returns `None` without calling the provider when a probe for `id` is
    /// already running, the credential is `invalid`, or no secret is bound.
    #[instrument(level = "debug", skip(self), fields(credential.id = %id))]
    pub async fn probe(&self, id: &str) -> Result<Option<Outcome>> {
        if !self.in_flight.insert(id.to_string()) {
            debug!("Probe already in flight, skipping");
            return Ok(None);
        }
        let _guard = InFlightGuard {
            in_flight: &self.in_flight,
            id: id.to_string(),
        };

        if self.pool.get(id).await?.is_invalid() {
            return Ok(None);
        }
        let Some(secret) = self.pool.secret(id) else {
            warn!("No secret bound for credential, skipping probe");
            return Ok(None);
        };

        let outcome = match tokio::time::timeout(self.probe_timeout, self.adapter.probe(&secret)).await {
            Ok(outcome) => outcome,
            Err(_) => {
                warn!(timeout_secs = self.probe_timeout.as_secs(), "Probe timed out");
                Outcome::OtherFailure
            }
        };

        let updated = self.pool.record_probe(id, outcome).await?;
        info!(
            outcome = %outcome,
            status = %updated.status,
            failures = updated.consecutive_failures,
            "Probe completed"
        );
        Ok(Some(outcome))
    }

    /// Starts scheduled probing for every registered credential and the
    /// on-demand listener. Safe to call again; running tasks are kept.
    pub fn start(self: &Arc<Self>) {
        for id in self.pool.ids() {
            self.watch(&id);
        }

        let mut listener = self.listener.lock();
        if listener.is_none() {
            if let Some(mut requests) = self.pool.take_probe_requests() {
                let prober = Arc::clone(self);
                *listener = Some(tokio::spawn(async move {
                    while let Some(id) = requests.recv().await {
                        let prober = Arc::clone(&prober);
                        tokio::spawn(async move {
                            if let Err(e) = prober.probe(&id).await {
                                error!(credential.id = %id, error = %e, "On-demand probe failed");
                            }
                        });
                    }
                }));
            }
        }
        info!(
            credentials = self.tasks.len(),
            interval_secs = self.interval.as_secs(),
            "Health prober started"
        );
    }

    /// Starts the scheduled probe loop for one credential if none is running.
    pub fn watch(self: &Arc<Self>, id: &str) {
        if self
            .tasks
            .get(id)
            .is_some_and(|task| !task.value().is_finished())
        {
            return;
        }

        let prober = Arc::clone(self);
        let task_id = id.to_string();
        let handle = tokio::spawn(async move {
            let mut ticker = interval(prober.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                match prober.probe(&task_id).await {
                    Ok(Some(Outcome::Invalid)) => {
                        info!(credential.id = %task_id, "Credential invalid, probing stopped");
                        break;
                    }
                    Ok(_) => {}
                    Err(e) => error!(credential.id = %task_id, error = %e, "Scheduled probe failed"),
                }
                if prober.pool.get(&task_id).await.is_ok_and(|c| c.is_invalid()) {
                    info!(credential.id = %task_id, "Credential invalid, probing stopped");
                    break;
                }
            }
        });
        self.tasks.insert(id.to_string(), handle);
    }

    /// Number of credentials with a live scheduled probe loop.
    pub fn active_tasks(&self) -> usize {
        self.tasks
            .iter()
            .filter(|task| !task.value().is_finished())
            .count()
    }

    pub fn shutdown(&self) {
        for task in self.tasks.iter() {
            task.value().abort();
        }
        self.tasks.clear();
        if let Some(listener) = self.listener.lock().take() {
            listener.abort();
        }
        info!("Health prober stopped");
    }
}
