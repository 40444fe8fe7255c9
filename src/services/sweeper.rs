use crate::adapters::store::ContentStore;
use crate::config::SweeperConfig;
use crate::domain::clock::Clock;
use crate::domain::content::{ContentKind, ContentRecord};
use crate::domain::query::{ContentFilter, ContentQuery, SortOrder};
use crate::domain::sweep::SweepReport;
use crate::domain::user::UserId;
use opentelemetry::{KeyValue, global, metrics::Counter};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use uuid::Uuid;

#[derive(Clone, Debug)]
struct Metrics {
    swept: Counter<u64>,
    errors: Counter<u64>,
}

impl Metrics {
    fn new() -> Self {
        let meter = global::meter("market-ephemera");
        Self {
            swept: meter
                .u64_counter("market_content_swept_total")
                .with_description("Total number of expired records physically deleted")
                .build(),
            errors: meter
                .u64_counter("market_sweep_errors_total")
                .with_description("Total number of sweep pages that failed")
                .build(),
        }
    }
}

/// Clears the in-flight flag when a sweep finishes, however it finishes.
struct InFlight<'a>(&'a AtomicBool);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Physically removes expired content in bounded atomic batches.
///
/// Only this component turns "expired" into "gone". A page that fails to
/// delete is logged and recorded, and the sweep moves on to the next kind.
#[derive(Clone, Debug)]
pub struct ExpirySweeper {
    store: Arc<dyn ContentStore>,
    clock: Arc<dyn Clock>,
    batch_size: usize,
    in_flight: Arc<AtomicBool>,
    metrics: Metrics,
}

impl ExpirySweeper {
    #[must_use]
    pub fn new(store: Arc<dyn ContentStore>, clock: Arc<dyn Clock>, config: &SweeperConfig) -> Self {
        let batch_size = config.sweep_batch_size.clamp(1, store.max_batch_size());
        Self { store, clock, batch_size, in_flight: Arc::new(AtomicBool::new(false)), metrics: Metrics::new() }
    }

    /// Deletes every record with `expires_at <= now` across all kinds.
    ///
    /// Returns `None` without doing anything if another sweep is already running.
    #[tracing::instrument(skip(self), fields(swept = tracing::field::Empty, failed_pages = tracing::field::Empty))]
    pub async fn sweep(&self) -> Option<SweepReport> {
        if self.in_flight.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire).is_err() {
            tracing::debug!("Sweep already in flight, skipping");
            return None;
        }
        let _in_flight = InFlight(&self.in_flight);

        let now = self.clock.now();
        let mut report = SweepReport::default();
        for kind in ContentKind::ALL {
            let query = ContentQuery::new(kind)
                .filter(ContentFilter::default().expired_by(now))
                .order(SortOrder::ExpiringFirst)
                .limit(self.batch_size);
            self.drain(query, &mut report).await;
        }

        tracing::Span::current().record("swept", report.total());
        tracing::Span::current().record("failed_pages", report.errors.len());
        if report.total() > 0 {
            tracing::info!(count = report.total(), "Deleted expired content");
        }
        Some(report)
    }

    /// Deletes all content the user owns or participates in, live or expired.
    #[tracing::instrument(skip(self), fields(user_id = %user_id, purged = tracing::field::Empty))]
    pub async fn purge_user(&self, user_id: &UserId) -> SweepReport {
        let mut report = SweepReport::default();
        for kind in ContentKind::ALL {
            let query = ContentQuery::new(kind)
                .filter(ContentFilter::default().involving(user_id.clone()))
                .order(SortOrder::ExpiringFirst)
                .limit(self.batch_size);
            self.drain(query, &mut report).await;
        }
        tracing::Span::current().record("purged", report.total());
        report
    }

    /// Deletes pages matching `query` until a page comes back empty.
    ///
    /// A page that deletes nothing was raced by another deleter and is re-queried.
    async fn drain(&self, query: ContentQuery, report: &mut SweepReport) {
        let kind = query.kind;
        report.add(kind, 0);
        // Ids of a page that deleted nothing; seeing it again means the store is stuck.
        let mut stalled: Option<Vec<Uuid>> = None;

        loop {
            let page = match self.store.query(&query).await {
                Ok(page) => page,
                Err(e) => {
                    tracing::error!(error = %e, kind = %kind, "Sweep query failed, skipping kind");
                    self.metrics.errors.add(1, &[KeyValue::new("kind", kind.as_str())]);
                    report.fail(kind, e.to_string());
                    return;
                }
            };
            if page.is_empty() {
                return;
            }

            let ids: Vec<Uuid> = page.iter().map(ContentRecord::id).collect();
            match self.store.batch_delete(kind, &ids).await {
                Ok(0) if stalled.as_ref() == Some(&ids) => {
                    tracing::error!(kind = %kind, batch = ids.len(), "Sweep page keeps deleting nothing, skipping kind");
                    self.metrics.errors.add(1, &[KeyValue::new("kind", kind.as_str())]);
                    report.fail(kind, "page could not be deleted".to_string());
                    return;
                }
                Ok(0) => {
                    tracing::debug!(kind = %kind, "Sweep page already removed elsewhere, re-querying");
                    stalled = Some(ids);
                }
                Ok(deleted) => {
                    stalled = None;
                    tracing::debug!(kind = %kind, deleted, "Deleted content batch");
                    self.metrics.swept.add(deleted, &[KeyValue::new("kind", kind.as_str())]);
                    report.add(kind, deleted);
                }
                Err(e) => {
                    tracing::error!(error = %e, kind = %kind, batch = ids.len(), "Sweep batch delete failed, skipping kind");
                    self.metrics.errors.add(1, &[KeyValue::new("kind", kind.as_str())]);
                    report.fail(kind, e.to_string());
                    return;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::InMemoryContentStore;
    use crate::adapters::store::{ContentStream, FieldUpdate, StoreError};
    use crate::domain::clock::ManualClock;
    use crate::domain::content::Payload;
    use async_trait::async_trait;
    use clap::Parser;
    use time::macros::datetime;

    fn id(raw: &str) -> UserId {
        UserId::parse(raw).unwrap()
    }

    fn config(batch: usize) -> SweeperConfig {
        crate::config::Config::parse_from(["market-ephemera", "--sweep-batch-size", batch.to_string().as_str()]).sweeper
    }

    async fn seed(store: &dyn ContentStore, clock: &ManualClock, messages: usize, stories: usize) {
        for i in 0..messages {
            let record = ContentRecord::new_message(Uuid::now_v7(), id("amy"), id("bob"), format!("m{i}"), clock.now());
            store.create(record).await.unwrap();
        }
        for i in 0..stories {
            let record = ContentRecord::new_story(Uuid::now_v7(), id("farm"), Payload::Text { text: format!("s{i}") }, clock.now());
            store.create(record).await.unwrap();
        }
    }

    #[derive(Debug)]
    enum Fault {
        /// Every delete of this kind fails.
        Reject(ContentKind),
        /// The first delete finds its page already removed by someone else.
        RaceFirst(AtomicBool),
        /// Deletes never remove anything.
        Stall,
    }

    #[derive(Clone, Debug)]
    struct FaultyDeletes {
        inner: InMemoryContentStore,
        fault: Arc<Fault>,
    }

    impl FaultyDeletes {
        fn new(inner: &InMemoryContentStore, fault: Fault) -> Self {
            Self { inner: inner.clone(), fault: Arc::new(fault) }
        }
    }

    #[async_trait]
    impl ContentStore for FaultyDeletes {
        async fn create(&self, record: ContentRecord) -> Result<Uuid, StoreError> {
            self.inner.create(record).await
        }
        async fn get_by_id(&self, kind: ContentKind, id: Uuid) -> Result<Option<ContentRecord>, StoreError> {
            self.inner.get_by_id(kind, id).await
        }
        async fn query(&self, query: &ContentQuery) -> Result<Vec<ContentRecord>, StoreError> {
            self.inner.query(query).await
        }
        fn subscribe(&self, query: ContentQuery) -> ContentStream {
            self.inner.subscribe(query)
        }
        async fn update_field(&self, kind: ContentKind, id: Uuid, update: FieldUpdate) -> Result<(), StoreError> {
            self.inner.update_field(kind, id, update).await
        }
        async fn batch_delete(&self, kind: ContentKind, ids: &[Uuid]) -> Result<u64, StoreError> {
            match self.fault.as_ref() {
                Fault::Reject(failing) if *failing == kind => Err(StoreError::Unavailable("write rejected".into())),
                Fault::RaceFirst(raced) if !raced.swap(true, Ordering::AcqRel) => {
                    self.inner.batch_delete(kind, ids).await?;
                    self.inner.batch_delete(kind, ids).await
                }
                Fault::Stall => Ok(0),
                _ => self.inner.batch_delete(kind, ids).await,
            }
        }
        async fn ping(&self) -> Result<(), StoreError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_sweep_removes_only_expired_in_batches() {
        let clock = ManualClock::new(datetime!(2026-06-01 08:00 UTC));
        let store = InMemoryContentStore::new();
        seed(&store, &clock, 7, 3).await;
        clock.advance(time::Duration::hours(12));
        seed(&store, &clock, 2, 1).await;
        clock.advance(time::Duration::hours(12));

        let sweeper = ExpirySweeper::new(Arc::new(store.clone()), Arc::new(clock.clone()), &config(3));
        let report = sweeper.sweep().await.unwrap();

        assert_eq!(report.count(ContentKind::Message), 7);
        assert_eq!(report.count(ContentKind::Story), 3);
        assert!(report.errors.is_empty());
        assert_eq!(store.len(), 3);

        let again = sweeper.sweep().await.unwrap();
        assert_eq!(again.total(), 0);
        assert_eq!(again.counts_by_kind.len(), 2);
    }

    #[tokio::test]
    async fn test_failing_kind_does_not_stop_the_sweep() {
        let clock = ManualClock::new(datetime!(2026-06-01 08:00 UTC));
        let inner = InMemoryContentStore::new();
        seed(&inner, &clock, 4, 2).await;
        clock.advance(time::Duration::days(2));

        let store = FaultyDeletes::new(&inner, Fault::Reject(ContentKind::Message));
        let sweeper = ExpirySweeper::new(Arc::new(store), Arc::new(clock), &config(500));
        let report = sweeper.sweep().await.unwrap();

        assert_eq!(report.count(ContentKind::Message), 0);
        assert_eq!(report.count(ContentKind::Story), 2);
        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.errors[0].kind, ContentKind::Message);
        assert_eq!(inner.len(), 4);
    }

    #[tokio::test]
    async fn test_concurrent_sweep_is_skipped() {
        let clock = ManualClock::new(datetime!(2026-06-01 08:00 UTC));
        let sweeper = ExpirySweeper::new(Arc::new(InMemoryContentStore::new()), Arc::new(clock), &config(500));

        sweeper.in_flight.store(true, Ordering::Release);
        assert!(sweeper.sweep().await.is_none());

        sweeper.in_flight.store(false, Ordering::Release);
        assert!(sweeper.sweep().await.is_some());
        assert!(!sweeper.in_flight.load(Ordering::Acquire));
    }

    #[tokio::test]
    async fn test_purge_user_removes_live_content() {
        let clock = ManualClock::new(datetime!(2026-06-01 08:00 UTC));
        let store = InMemoryContentStore::new();
        seed(&store, &clock, 3, 2).await;
        let other = ContentRecord::new_message(Uuid::now_v7(), id("cal"), id("dan"), "hey".into(), clock.now());
        store.create(other).await.unwrap();

        let sweeper = ExpirySweeper::new(Arc::new(store.clone()), Arc::new(clock), &config(500));
        let report = sweeper.purge_user(&id("bob")).await;

        assert_eq!(report.count(ContentKind::Message), 3);
        assert_eq!(report.count(ContentKind::Story), 0);
        assert_eq!(store.len(), 3);
    }

    #[tokio::test]
    async fn test_purge_requeries_when_a_page_was_already_deleted() {
        let clock = ManualClock::new(datetime!(2026-06-01 08:00 UTC));
        let inner = InMemoryContentStore::new();
        seed(&inner, &clock, 2, 0).await;
        clock.advance(time::Duration::hours(25));
        seed(&inner, &clock, 1, 0).await;

        let store = FaultyDeletes::new(&inner, Fault::RaceFirst(AtomicBool::new(false)));
        let sweeper = ExpirySweeper::new(Arc::new(store), Arc::new(clock), &config(2));
        let report = sweeper.purge_user(&id("amy")).await;

        assert!(report.errors.is_empty());
        assert_eq!(report.count(ContentKind::Message), 1);
        assert!(inner.is_empty());
    }

    #[tokio::test]
    async fn test_page_that_never_deletes_is_reported() {
        let clock = ManualClock::new(datetime!(2026-06-01 08:00 UTC));
        let inner = InMemoryContentStore::new();
        seed(&inner, &clock, 1, 0).await;
        clock.advance(time::Duration::days(2));

        let store = FaultyDeletes::new(&inner, Fault::Stall);
        let sweeper = ExpirySweeper::new(Arc::new(store), Arc::new(clock), &config(500));
        let report = sweeper.sweep().await.unwrap();

        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.errors[0].kind, ContentKind::Message);
        assert_eq!(inner.len(), 1);
    }
}
