// src/storage/redis.rs

use crate::error::{AppError, Result};
use crate::storage::traits::apply_mutation;
use crate::storage::{Credential, CredentialStore, Mutation};
use async_trait::async_trait;
use dashmap::DashMap;
use deadpool_redis::{Config, Pool, Runtime};
use redis::AsyncCommands;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument};

const CREDENTIAL_SET_KEY: &str = "credential_ids";
const REGISTRATION_SEQ_KEY: &str = "registration_seq";

fn credential_key(id: &str) -> String {
    format!("credential:{id}")
}

/// Creates a connection pool for the given Redis URL.
pub fn create_pool(redis_url: &str) -> Result<Pool> {
    let pool = Config::from_url(redis_url).create_pool(Some(Runtime::Tokio1))?;
    info!("Redis connection pool created");
    Ok(pool)
}

/// Redis-backed credential store.
///
/// Records are JSON values keyed by identifier. This process is the only
/// writer, so the read-modify-write in `update` is serialized with a local
/// per-identifier lock.
pub struct RedisStore {
    pool: Pool,
    key_prefix: String,
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl RedisStore {
    pub fn new(pool: Pool, key_prefix: impl Into<String>) -> Self {
        Self {
            pool,
            key_prefix: key_prefix.into(),
            locks: DashMap::new(),
        }
    }

    fn prefix_key(&self, key: &str) -> String {
        format!("{}{}", self.key_prefix, key)
    }

    fn lock_for(&self, id: &str) -> Arc<Mutex<()>> {
        self.locks
            .entry(id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .value()
            .clone()
    }

    async fn read(&self, conn: &mut deadpool_redis::Connection, id: &str) -> Result<Credential> {
        let raw: Option<String> = conn.get(self.prefix_key(&credential_key(id))).await?;
        let raw = raw.ok_or_else(|| AppError::not_found(id))?;
        Ok(serde_json::from_str(&raw)?)
    }
}

#[async_trait]
impl CredentialStore for RedisStore {
    #[instrument(level = "debug", skip(self))]
    async fn register(&self, id: &str) -> Result<Credential> {
        let lock = self.lock_for(id);
        let _guard = lock.lock().await;
        let mut conn = self.pool.get().await?;

        let record_key = self.prefix_key(&credential_key(id));
        let exists: bool = conn.exists(&record_key).await?;
        if !exists {
            let seq: u64 = conn.incr(self.prefix_key(REGISTRATION_SEQ_KEY), 1).await?;
            let record = Credential::new(id, seq);
            let created: bool = conn.set_nx(&record_key, serde_json::to_string(&record)?).await?;
            let _: () = conn.sadd(self.prefix_key(CREDENTIAL_SET_KEY), id).await?;
            if created {
                debug!(credential.id = %id, seq, "Registered credential in Redis");
                return Ok(record);
            }
        }
        self.read(&mut conn, id).await
    }

    async fn list(&self) -> Result<Vec<Credential>> {
        let mut conn = self.pool.get().await?;
        let ids: Vec<String> = conn.smembers(self.prefix_key(CREDENTIAL_SET_KEY)).await?;
        let mut records = Vec::with_capacity(ids.len());
        for id in ids {
            match self.read(&mut conn, &id).await {
                Ok(record) => records.push(record),
                Err(AppError::CredentialNotFound { .. }) => continue,
                Err(e) => return Err(e),
            }
        }
        Ok(records)
    }

    async fn get(&self, id: &str) -> Result<Credential> {
        let mut conn = self.pool.get().await?;
        self.read(&mut conn, id).await
    }

    #[instrument(level = "debug", skip(self, mutation))]
    async fn update(&self, id: &str, mutation: Mutation) -> Result<Credential> {
        let lock = self.lock_for(id);
        let _guard = lock.lock().await;
        let mut conn = self.pool.get().await?;

        let current = self.read(&mut conn, id).await?;
        let next = apply_mutation(&current, mutation);
        let _: () = conn
            .set(self.prefix_key(&credential_key(id)), serde_json::to_string(&next)?)
            .await?;
        Ok(next)
    }
}
