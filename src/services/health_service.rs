use crate::adapters::directory::RecipientDirectory;
use crate::adapters::store::ContentStore;
use crate::config::HealthConfig;
use opentelemetry::{KeyValue, global, metrics::Gauge};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;

#[derive(Clone, Debug)]
pub struct Metrics {
    pub status: Gauge<i64>,
}

impl Metrics {
    #[must_use]
    pub(crate) fn new() -> Self {
        let meter = global::meter("market-ephemera");
        Self {
            status: meter
                .i64_gauge("market_health_status")
                .with_description("Status of health checks (1 for ok, 0 for error)")
                .build(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct HealthService {
    store: Arc<dyn ContentStore>,
    directory: Arc<dyn RecipientDirectory>,
    config: HealthConfig,
    metrics: Metrics,
}

impl HealthService {
    #[must_use]
    pub fn new(store: Arc<dyn ContentStore>, directory: Arc<dyn RecipientDirectory>, config: HealthConfig) -> Self {
        Self { store, directory, config, metrics: Metrics::new() }
    }

    /// Checks content store connectivity.
    ///
    /// # Errors
    /// Returns a string describing the failure if the store is unreachable.
    pub async fn check_store(&self) -> Result<(), String> {
        let store_timeout = Duration::from_millis(self.config.store_timeout_ms);

        match timeout(store_timeout, self.store.ping()).await {
            Ok(Ok(())) => {
                self.metrics.status.record(1, &[KeyValue::new("component", "content_store")]);
                Ok(())
            }
            Ok(Err(e)) => {
                self.metrics.status.record(0, &[KeyValue::new("component", "content_store")]);
                Err(format!("Content store check failed: {e}"))
            }
            Err(_) => {
                self.metrics.status.record(0, &[KeyValue::new("component", "content_store")]);
                Err("Content store check timed out".to_string())
            }
        }
    }

    /// Checks recipient directory connectivity.
    ///
    /// # Errors
    /// Returns a string describing the failure if the directory is unreachable.
    pub async fn check_directory(&self) -> Result<(), String> {
        let directory_timeout = Duration::from_millis(self.config.directory_timeout_ms);

        match timeout(directory_timeout, self.directory.ping()).await {
            Ok(Ok(())) => {
                self.metrics.status.record(1, &[KeyValue::new("component", "directory")]);
                Ok(())
            }
            Ok(Err(e)) => {
                self.metrics.status.record(0, &[KeyValue::new("component", "directory")]);
                Err(format!("Recipient directory check failed: {e}"))
            }
            Err(_) => {
                self.metrics.status.record(0, &[KeyValue::new("component", "directory")]);
                Err("Recipient directory check timed out".to_string())
            }
        }
    }
}
