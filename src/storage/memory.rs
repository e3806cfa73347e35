// src/storage/memory.rs

use crate::error::{AppError, Result};
use crate::storage::traits::apply_mutation;
use crate::storage::{Credential, CredentialStore, Mutation};
use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::trace;

/// In-memory credential store. Each record sits behind its own lock, so
/// updates to one credential never wait on another.
#[derive(Default)]
pub struct InMemoryStore {
    records: DashMap<String, Arc<Mutex<Credential>>>,
    next_seq: AtomicU64,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn record(&self, id: &str) -> Result<Arc<Mutex<Credential>>> {
        self.records
            .get(id)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| AppError::not_found(id))
    }
}

#[async_trait]
impl CredentialStore for InMemoryStore {
    async fn register(&self, id: &str) -> Result<Credential> {
        let record = self
            .records
            .entry(id.to_string())
            .or_insert_with(|| {
                let seq = self.next_seq.fetch_add(1, Ordering::SeqCst);
                trace!(credential.id = %id, seq, "Registering credential in memory");
                Arc::new(Mutex::new(Credential::new(id, seq)))
            })
            .value()
            .clone();
        let snapshot = record.lock().clone();
        Ok(snapshot)
    }

    async fn list(&self) -> Result<Vec<Credential>> {
        let records: Vec<Arc<Mutex<Credential>>> =
            self.records.iter().map(|entry| Arc::clone(entry.value())).collect();
        Ok(records.iter().map(|record| record.lock().clone()).collect())
    }

    async fn get(&self, id: &str) -> Result<Credential> {
        let record = self.record(id)?;
        let snapshot = record.lock().clone();
        Ok(snapshot)
    }

    async fn update(&self, id: &str, mutation: Mutation) -> Result<Credential> {
        let record = self.record(id)?;
        let mut guard = record.lock();
        let next = apply_mutation(&guard, mutation);
        *guard = next.clone();
        Ok(next)
    }
}
