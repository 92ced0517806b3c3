//! Store manager that builds the configured backend and owns its lifecycle.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::store::memory::MemoryStore;
use crate::store::redis::RedisStore;
use crate::store::unavailable::UnavailableStore;
use crate::store::{CoordinationStore, StoreError};
use crate::config::settings::{StoreBackend, StoreConfig};

/// Owns the coordination store connection.
///
/// Connect/disconnect belongs here; the coordination core only ever sees the
/// backend through [`CoordinationStore::is_available`].
pub struct StoreManager {
    backend: Arc<dyn CoordinationStore>,
    config: StoreConfig,
    cancel: CancellationToken,
    monitor: Option<JoinHandle<()>>,
}

impl StoreManager {
    /// Create the backend selected by configuration.
    pub async fn new(config: StoreConfig) -> Result<Self, StoreError> {
        let cancel = CancellationToken::new();
        let mut monitor = None;

        let backend: Arc<dyn CoordinationStore> = match config.backend {
            StoreBackend::Memory => Arc::new(MemoryStore::new()),
            StoreBackend::None => Arc::new(UnavailableStore::new()),
            StoreBackend::Redis => {
                let store = RedisStore::connect(&config.redis).await?;
                monitor = Some(store.spawn_health_monitor(
                    Duration::from_secs(config.redis.health_check_interval),
                    cancel.child_token(),
                ));
                Arc::new(store)
            }
        };

        tracing::debug!(backend = ?config.backend, "Coordination store initialized");

        Ok(Self {
            backend,
            config,
            cancel,
            monitor,
        })
    }

    /// Wrap an already-built backend. Used by tests sharing one store
    /// between several simulated instances.
    pub fn from_backend(backend: Arc<dyn CoordinationStore>, config: StoreConfig) -> Self {
        Self {
            backend,
            config,
            cancel: CancellationToken::new(),
            monitor: None,
        }
    }

    /// Get a handle to the store backend.
    pub fn backend(&self) -> Arc<dyn CoordinationStore> {
        Arc::clone(&self.backend)
    }

    /// Get the store configuration.
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Stop background connection monitoring.
    pub async fn shutdown(mut self) {
        self.cancel.cancel();
        if let Some(handle) = self.monitor.take()
            && let Err(e) = handle.await
        {
            tracing::warn!(error = %e, "Store health monitor ended abnormally");
        }
    }
}
