// src/state.rs

use crate::clock::{Clock, SystemClock};
use crate::config::AppConfig;
use crate::error::Result;
use crate::key_manager::KeyPool;
use crate::monitoring::HealthProber;
use crate::provider::{GeminiAdapter, ProviderAdapter};
use crate::service::GenerationService;
use crate::storage::{CredentialStore, InMemoryStore};
use std::sync::Arc;
use tracing::info;

/// Shared application state, handed to axum handlers and to consumers.
pub struct AppState {
    pub config: AppConfig,
    pub pool: Arc<KeyPool>,
    pub generation: GenerationService,
    pub prober: Arc<HealthProber>,
}

impl AppState {
    /// Builds the state against the real provider and wall clock.
    pub async fn new(config: &AppConfig) -> Result<Self> {
        let adapter: Arc<dyn ProviderAdapter> = Arc::new(GeminiAdapter::new(&config.provider)?);
        Self::build(config, adapter, Arc::new(SystemClock)).await
    }

    /// Builds the state with an explicit adapter and clock. Nothing is
    /// spawned; call [`HealthProber::start`] to begin probing.
    pub async fn build(
        config: &AppConfig,
        adapter: Arc<dyn ProviderAdapter>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        info!("Creating shared AppState: initializing credential store and key pool...");
        let store = create_store(config)?;

        let pool = Arc::new(KeyPool::new(store, &config.pool, clock));
        pool.register_all(&config.credentials).await?;

        let prober = Arc::new(HealthProber::from_config(
            Arc::clone(&pool),
            Arc::clone(&adapter),
            &config.prober,
            &config.provider,
        ));
        let generation = GenerationService::new(Arc::clone(&pool), adapter, &config.generation);

        Ok(Self {
            config: config.clone(),
            pool,
            generation,
            prober,
        })
    }
}

fn create_store(config: &AppConfig) -> Result<Arc<dyn CredentialStore>> {
    match config.redis_url.as_deref() {
        #[cfg(feature = "redis")]
        Some(redis_url) => {
            let pool = crate::storage::redis::create_pool(redis_url)?;
            info!("Redis persistence is enabled.");
            Ok(Arc::new(crate::storage::RedisStore::new(
                pool,
                config.redis_prefix(),
            )))
        }
        #[cfg(not(feature = "redis"))]
        Some(_) => {
            tracing::warn!("redis_url is set but the `redis` feature is disabled; using in-memory store");
            Ok(Arc::new(InMemoryStore::new()))
        }
        None => {
            info!("Running without Redis persistence.");
            Ok(Arc::new(InMemoryStore::new()))
        }
    }
}
