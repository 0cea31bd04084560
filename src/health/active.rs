//! Active health checking.
//!
//! # Responsibilities
//! - Periodically probe every registered provider
//! - Publish probe results through the health tracker

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::time;

use crate::config::HealthCheckConfig;
use crate::health::passive::HealthTracker;
use crate::providers::registry::ProviderRegistry;

pub struct HealthMonitor {
    registry: Arc<ProviderRegistry>,
    tracker: Arc<HealthTracker>,
    config: HealthCheckConfig,
}

impl HealthMonitor {
    pub fn new(
        registry: Arc<ProviderRegistry>,
        tracker: Arc<HealthTracker>,
        config: HealthCheckConfig,
    ) -> Self {
        Self {
            registry,
            tracker,
            config,
        }
    }

    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        if !self.config.enabled {
            tracing::info!("Active health checks disabled");
            return;
        }

        tracing::info!(
            interval = self.config.interval_secs,
            timeout = self.config.timeout_secs,
            "Health monitor starting"
        );

        let interval = Duration::from_secs(self.config.interval_secs.max(1));
        let mut ticker = time::interval(interval);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.check_all().await;
                }
                _ = shutdown.recv() => {
                    tracing::info!("Health monitor received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }

    /// Probe every provider once.
    pub async fn check_all(&self) {
        let timeout = Duration::from_secs(self.config.timeout_secs);

        for provider in self.registry.providers() {
            let id = provider.id().to_string();
            let result = match time::timeout(timeout, provider.health_check()).await {
                Ok(result) => {
                    if !result.status.is_routable() {
                        tracing::warn!(
                            provider = %id,
                            status = ?result.status,
                            "Health check reported provider not routable"
                        );
                    }
                    Some(result)
                }
                Err(_) => {
                    tracing::warn!(provider = %id, "Health check failed: timeout");
                    None
                }
            };

            self.tracker.record_probe(&id, result);
        }
    }
}
