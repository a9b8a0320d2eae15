use std::sync::{Arc, Mutex};

use tracing::{info, warn};

use catalog_infra::db;
use catalog_infra::store::{CatalogStore, InMemoryCatalogStore, StoreError};
use catalog_infra::{CatalogService, RatingSweepWorker, WorkerHandle};

use crate::config::{Environment, ServerConfig};

/// Everything the handlers need, shared behind an `Arc`.
pub struct AppServices {
    pub catalog: CatalogService<dyn CatalogStore>,
    pub environment: Environment,
    sweep: Mutex<Option<WorkerHandle>>,
}

impl AppServices {
    /// Postgres when `DATABASE_URL` is configured, the in-memory store otherwise.
    /// Starts the rating sweep when an interval is configured.
    pub async fn build(config: &ServerConfig) -> Result<Self, StoreError> {
        let store: Arc<dyn CatalogStore> = match config.pool_settings() {
            Some(settings) => Arc::new(db::open_store(&settings).await?),
            None => {
                warn!("using in-memory catalog store; data is lost on restart");
                Arc::new(InMemoryCatalogStore::new())
            }
        };

        let catalog = CatalogService::new(store);
        let sweep = config
            .rating_sweep_interval
            .map(|interval| RatingSweepWorker::spawn(catalog.ratings().clone(), interval));

        Ok(Self {
            catalog,
            environment: config.environment,
            sweep: Mutex::new(sweep),
        })
    }

    /// In-memory services without background workers (tests, local tooling).
    pub fn in_memory(environment: Environment) -> Self {
        let store: Arc<dyn CatalogStore> = Arc::new(InMemoryCatalogStore::new());
        Self {
            catalog: CatalogService::new(store),
            environment,
            sweep: Mutex::new(None),
        }
    }

    /// Stop background workers.
    pub async fn shutdown(&self) {
        let sweep = self.sweep.lock().ok().and_then(|mut guard| guard.take());
        if let Some(handle) = sweep {
            handle.shutdown().await;
            info!("rating sweep worker stopped");
        }
    }
}
