use crate::adapters::directory::RecipientDirectory;
use crate::config::PushConfig;
use opentelemetry::{global, metrics::Counter};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

#[derive(Clone, Debug)]
struct Metrics {
    pruned: Counter<u64>,
}

impl Metrics {
    fn new() -> Self {
        let meter = global::meter("market-ephemera");
        Self {
            pruned: meter
                .u64_counter("market_push_tokens_pruned_total")
                .with_description("Total number of push tokens removed due to being unregistered")
                .build(),
        }
    }
}

/// Collects tokens the push provider reported as unregistered and prunes them in batches.
#[derive(Debug)]
pub struct TokenJanitor {
    directory: Arc<dyn RecipientDirectory>,
    rx: mpsc::Receiver<String>,
    batch_size: usize,
    flush_interval_secs: u64,
    metrics: Metrics,
}

impl TokenJanitor {
    /// Creates the janitor together with the sender the dispatcher reports into.
    #[must_use]
    pub fn new(directory: Arc<dyn RecipientDirectory>, config: &PushConfig) -> (Self, mpsc::Sender<String>) {
        let (tx, rx) = mpsc::channel(config.janitor_channel_capacity.max(1));
        let janitor = Self {
            directory,
            rx,
            batch_size: config.janitor_batch_size.max(1),
            flush_interval_secs: config.janitor_interval_secs.max(1),
            metrics: Metrics::new(),
        };
        (janitor, tx)
    }

    pub async fn run(mut self, mut shutdown: tokio::sync::watch::Receiver<bool>) {
        let mut batch = Vec::new();
        let mut flush_interval = tokio::time::interval(Duration::from_secs(self.flush_interval_secs));

        loop {
            tokio::select! {
                res = self.rx.recv() => {
                    if let Some(token) = res {
                        batch.push(token);
                        if batch.len() >= self.batch_size {
                            self.flush(&mut batch).await;
                        }
                    } else {
                        // Every sender is gone
                        break;
                    }
                }
                _ = flush_interval.tick() => {
                    self.flush(&mut batch).await;
                }
                _ = shutdown.changed() => {
                    while let Ok(token) = self.rx.try_recv() {
                        batch.push(token);
                    }
                    break;
                }
            }
        }

        self.flush(&mut batch).await;
        tracing::info!("Token janitor shutting down...");
    }

    #[tracing::instrument(level = "debug", skip(self, batch), fields(count = batch.len()))]
    async fn flush(&self, batch: &mut Vec<String>) {
        if batch.is_empty() {
            return;
        }

        match self.directory.invalidate_tokens(batch).await {
            Ok(removed) => {
                tracing::info!(removed, "Deleted invalid push tokens");
                self.metrics.pruned.add(removed, &[]);
                batch.clear();
            }
            Err(e) => tracing::error!(error = %e, "Failed to delete invalid token batch"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::InMemoryDirectory;
    use crate::domain::user::UserId;
    use clap::Parser;
    use tokio::sync::watch;

    #[tokio::test]
    async fn test_pending_tokens_are_flushed_on_shutdown() {
        let directory = Arc::new(InMemoryDirectory::new());
        directory.set_token(UserId::parse("ann").unwrap(), "tok-ann");
        directory.set_token(UserId::parse("ben").unwrap(), "tok-ben");

        let config = crate::config::Config::parse_from(["market-ephemera", "--janitor-interval-secs", "3600"]).push;
        let (janitor, tx) = TokenJanitor::new(Arc::clone(&directory) as Arc<dyn RecipientDirectory>, &config);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(janitor.run(shutdown_rx));

        tx.send("tok-ann".to_string()).await.unwrap();
        shutdown_tx.send(true).unwrap();
        task.await.unwrap();

        assert!(!directory.has_token("tok-ann"));
        assert!(directory.has_token("tok-ben"));
    }
}
