use crate::config::SweeperConfig;
use crate::services::sweeper::ExpirySweeper;
use std::time::Duration;
use tracing::Instrument;

/// Runs the expiry sweep on a fixed schedule.
#[derive(Debug)]
pub struct SweeperWorker {
    sweeper: ExpirySweeper,
    interval_secs: u64,
}

impl SweeperWorker {
    #[must_use]
    pub const fn new(sweeper: ExpirySweeper, config: &SweeperConfig) -> Self {
        Self { sweeper, interval_secs: config.sweep_interval_secs }
    }

    pub async fn run(self, mut shutdown: tokio::sync::watch::Receiver<bool>) {
        if self.interval_secs == 0 {
            tracing::info!("Scheduled sweep disabled");
            return;
        }
        let mut interval = tokio::time::interval(Duration::from_secs(self.interval_secs));
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        while !*shutdown.borrow() {
            tokio::select! {
                _ = interval.tick() => {
                    let outcome = self.sweeper.sweep()
                        .instrument(tracing::info_span!("expiry_sweep_iteration"))
                        .await;
                    match outcome {
                        Some(report) if !report.errors.is_empty() => {
                            tracing::warn!(swept = report.total(), failed = report.errors.len(), "Scheduled sweep finished with errors");
                        }
                        Some(_) => {}
                        None => tracing::debug!("Previous sweep still running, tick skipped"),
                    }
                }
                _ = shutdown.changed() => {}
            }
        }
        tracing::info!("Expiry sweeper shutting down...");
    }
}
