//! Startup orchestration.
//!
//! # Responsibilities
//! - Validate configuration
//! - Initialize all subsystems in dependency order
//! - Start background tasks (health checks, config reload)
//! - Stop them and persist the cache on shutdown

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use notify::RecommendedWatcher;
use thiserror::Error;
use tokio::task::JoinHandle;

use crate::cache::response_cache::ResponseCache;
use crate::cache::store::MemoryCacheStore;
use crate::config::validation::validate_config;
use crate::config::watcher::ConfigWatcher;
use crate::config::{ConfigError, GatewayConfig};
use crate::costs::ledger::CostLedger;
use crate::costs::pricing::CostEstimates;
use crate::costs::store::MemoryCostStore;
use crate::error::GatewayError;
use crate::health::active::HealthMonitor;
use crate::health::passive::HealthTracker;
use crate::lifecycle::shutdown::Shutdown;
use crate::providers::registry::ProviderRegistry;
use crate::providers::Provider;
use crate::rate_limit::registry::RateLimiterRegistry;
use crate::resilience::circuit_breaker::CircuitBreakerRegistry;
use crate::routing::router::RequestRouter;

const TASK_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Error)]
pub enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("provider registration failed: {0}")]
    Provider(#[from] GatewayError),

    #[error("failed to restore cache snapshot: {0}")]
    Cache(#[source] std::io::Error),

    #[error("failed to watch config file: {0}")]
    Watch(#[from] notify::Error),
}

/// A running gateway: the router plus its background tasks.
pub struct Gateway {
    router: Arc<RequestRouter>,
    cache_store: Arc<MemoryCacheStore>,
    persistence_path: Option<PathBuf>,
    shutdown: Shutdown,
    tasks: Vec<JoinHandle<()>>,
    watcher: Option<RecommendedWatcher>,
}

impl Gateway {
    /// Build every subsystem from `config` and start background tasks.
    pub async fn start(
        config: GatewayConfig,
        providers: Vec<Arc<dyn Provider>>,
    ) -> Result<Self, StartupError> {
        validate_config(&config).map_err(ConfigError::Validation)?;

        let registry = Arc::new(ProviderRegistry::new());
        for provider in providers {
            registry.register(provider)?;
        }

        let persistence_path = config.cache.persistence_path.as_ref().map(PathBuf::from);
        let cache_store = match &persistence_path {
            Some(path) => {
                let path = path.clone();
                let load = move || MemoryCacheStore::load_from_file(path);
                let store = tokio::task::spawn_blocking(load)
                    .await
                    .map_err(|e| StartupError::Cache(std::io::Error::other(e)))?
                    .map_err(StartupError::Cache)?;
                Arc::new(store)
            }
            None => Arc::new(MemoryCacheStore::new()),
        };

        let cache = ResponseCache::new(cache_store.clone(), config.cache.freshness.clone());
        let ledger = CostLedger::new(
            Arc::new(MemoryCostStore::new()),
            CostEstimates::from_config(&config.costs),
        )
        .with_budgets(config.budgets.iter().cloned());
        let tracker = Arc::new(HealthTracker::new(registry.clone(), config.health_check.clone()));

        let router = Arc::new(
            RequestRouter::builder(registry.clone())
                .config(config.router.clone())
                .circuit_breakers(Arc::new(CircuitBreakerRegistry::new(
                    config.circuit_breaker.clone(),
                )))
                .rate_limiters(Arc::new(RateLimiterRegistry::new(config.rate_limit.clone())))
                .cache(Arc::new(cache))
                .ledger(Arc::new(ledger))
                .health_tracker(tracker.clone())
                .build(),
        );

        let shutdown = Shutdown::new();
        let mut tasks = Vec::new();

        if config.health_check.enabled {
            let monitor =
                HealthMonitor::new(registry.clone(), tracker, config.health_check.clone());
            tasks.push(tokio::spawn(monitor.run(shutdown.subscribe())));
        }

        tracing::info!(
            providers = registry.len(),
            budgets = config.budgets.len(),
            health_checks = config.health_check.enabled,
            cache_snapshot = ?persistence_path,
            "Gateway started"
        );

        Ok(Self {
            router,
            cache_store,
            persistence_path,
            shutdown,
            tasks,
            watcher: None,
        })
    }

    pub fn router(&self) -> &Arc<RequestRouter> {
        &self.router
    }

    /// Reload router settings whenever `path` changes.
    ///
    /// Only the `[router]` section is applied live; other sections need a
    /// restart.
    pub fn watch_config(&mut self, path: &Path) -> Result<(), StartupError> {
        let current = self.router.config().as_ref().clone();
        let (watcher, mut updates) = ConfigWatcher::new(path, current);
        self.watcher = Some(watcher.run()?);

        let router = self.router.clone();
        let mut shutdown = self.shutdown.subscribe();
        self.tasks.push(tokio::spawn(async move {
            loop {
                tokio::select! {
                    update = updates.recv() => match update {
                        Some(config) => router.apply_config(config),
                        None => break,
                    },
                    _ = shutdown.recv() => break,
                }
            }
            tracing::debug!("Config applier stopped");
        }));
        Ok(())
    }

    /// Stop background tasks and write the cache snapshot.
    pub async fn shutdown(mut self) -> std::io::Result<()> {
        self.shutdown.trigger();
        self.watcher.take();

        for task in self.tasks.drain(..) {
            match tokio::time::timeout(TASK_DRAIN_TIMEOUT, task).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => tracing::error!(error = %e, "Background task failed"),
                Err(_) => tracing::warn!("Background task did not stop in time"),
            }
        }

        if let Some(path) = self.persistence_path.take() {
            let store = self.cache_store.clone();
            tokio::task::spawn_blocking(move || store.save_to_file(path))
                .await
                .map_err(std::io::Error::other)??;
        }

        tracing::info!("Shutdown complete");
        Ok(())
    }
}

impl std::fmt::Debug for Gateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Gateway")
            .field("router", &self.router)
            .field("persistence_path", &self.persistence_path)
            .field("tasks", &self.tasks.len())
            .finish_non_exhaustive()
    }
}
