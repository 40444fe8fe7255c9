use crate::domain::sweep::SweepReport;
use crate::domain::user::UserId;
use crate::services::sweeper::ExpirySweeper;
use opentelemetry::{global, metrics::Counter};

#[derive(Clone, Debug)]
struct Metrics {
    purges: Counter<u64>,
}

impl Metrics {
    fn new() -> Self {
        let meter = global::meter("market-ephemera");
        Self {
            purges: meter
                .u64_counter("market_account_purges_total")
                .with_description("Total number of account content purges")
                .build(),
        }
    }
}

/// Account-deletion cascade over ephemeral content.
#[derive(Clone, Debug)]
pub struct AccountService {
    sweeper: ExpirySweeper,
    metrics: Metrics,
}

impl AccountService {
    #[must_use]
    pub fn new(sweeper: ExpirySweeper) -> Self {
        Self { sweeper, metrics: Metrics::new() }
    }

    /// Deletes everything the user owns or participates in, regardless of expiry.
    ///
    /// Runs to completion before returning. Failed pages are listed in the report
    /// rather than aborting the purge.
    #[tracing::instrument(skip(self), fields(user_id = %user_id))]
    pub async fn purge_all_content_for(&self, user_id: &UserId) -> SweepReport {
        let report = self.sweeper.purge_user(user_id).await;
        self.metrics.purges.add(1, &[]);
        if report.errors.is_empty() {
            tracing::info!(purged = report.total(), "Account content purged");
        } else {
            tracing::warn!(purged = report.total(), failed = report.errors.len(), "Account content purge incomplete");
        }
        report
    }
}
