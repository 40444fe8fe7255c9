//! Read paths over ephemeral content.
//!
//! Every read re-applies the TTL predicate against the injected clock, so an
//! expired record is indistinguishable from a deleted or never-created one.
//!
//! Continuous subscriptions run one task each. The task re-evaluates expiry
//! whenever the store emits a new snapshot and, independently of the store, at
//! the earlier of the refresh interval and the next expiry among the records it
//! holds. Expired content therefore disappears from an open subscription
//! without waiting for an unrelated write. Dropping the subscription cancels
//! the task, which stops both the store stream and the timer.

use crate::adapters::store::ContentStore;
use crate::config::{LiveViewConfig, MessagingConfig};
use crate::domain::clock::Clock;
use crate::domain::content::{ContentKind, ContentRecord};
use crate::domain::conversation::ConversationId;
use crate::domain::query::{ContentFilter, ContentQuery, SortOrder};
use crate::domain::user::UserId;
use crate::error::{AppError, Result};
use futures::{Stream, StreamExt};
use opentelemetry::{KeyValue, global, metrics::UpDownCounter};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;
use time::OffsetDateTime;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::Instrument;
use uuid::Uuid;

/// Lower bound on the re-tick delay so a record on the boundary cannot spin the timer.
const MIN_REFRESH: Duration = Duration::from_millis(5);

#[derive(Clone, Debug)]
struct Metrics {
    active_subscriptions: UpDownCounter<i64>,
}

impl Metrics {
    fn new() -> Self {
        let meter = global::meter("market-ephemera");
        Self {
            active_subscriptions: meter
                .i64_up_down_counter("market_live_subscriptions")
                .with_description("Number of open live-view subscriptions")
                .build(),
        }
    }
}

/// A continuously updated view. Dropping it cancels the underlying task.
#[derive(Debug)]
pub struct LiveSubscription<T> {
    inner: ReceiverStream<T>,
    _cancel: DropGuard,
}

impl<T> LiveSubscription<T> {
    /// Stops the subscription immediately.
    pub fn cancel(self) {
        drop(self);
    }
}

impl<T> Stream for LiveSubscription<T> {
    type Item = T;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<T>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }
}

#[derive(Clone, Debug)]
pub struct LiveView {
    store: Arc<dyn ContentStore>,
    clock: Arc<dyn Clock>,
    refresh_interval: Duration,
    buffer_size: usize,
    paging: MessagingConfig,
    metrics: Metrics,
}

impl LiveView {
    #[must_use]
    pub fn new(
        store: Arc<dyn ContentStore>,
        clock: Arc<dyn Clock>,
        config: &LiveViewConfig,
        paging: MessagingConfig,
    ) -> Self {
        Self {
            store,
            clock,
            refresh_interval: Duration::from_millis(config.refresh_interval_ms).max(MIN_REFRESH),
            buffer_size: config.subscription_buffer_size.max(1),
            paging,
            metrics: Metrics::new(),
        }
    }

    /// Fetches a live message by id.
    ///
    /// # Errors
    /// Returns `AppError::NotFound` if the message never existed, was deleted, or has expired.
    pub async fn get_message(&self, id: Uuid) -> Result<ContentRecord> {
        self.get_live(ContentKind::Message, id).await
    }

    /// Fetches a live story by id.
    ///
    /// # Errors
    /// Returns `AppError::NotFound` if the story never existed, was deleted, or has expired.
    pub async fn get_story(&self, id: Uuid) -> Result<ContentRecord> {
        self.get_live(ContentKind::Story, id).await
    }

    #[tracing::instrument(err(level = "debug"), skip(self), fields(content.kind = %kind, content.id = %id))]
    pub(crate) async fn get_live(&self, kind: ContentKind, id: Uuid) -> Result<ContentRecord> {
        let record = self.store.get_by_id(kind, id).await?;
        let now = self.clock.now();
        record.filter(|r| r.is_live_at(now)).ok_or(AppError::NotFound)
    }

    /// Live messages between two users, newest first.
    #[must_use]
    pub fn subscribe_conversation(
        &self,
        user_a: &UserId,
        user_b: &UserId,
        page_size: Option<usize>,
    ) -> LiveSubscription<Vec<ContentRecord>> {
        let conversation_id = ConversationId::between(user_a, user_b);
        let query = self.page(ContentKind::Message, ContentFilter::default().conversation(conversation_id), page_size);
        self.spawn_view("conversation", query, |records| records)
    }

    /// Live messages in any conversation the user takes part in, newest first.
    #[must_use]
    pub fn subscribe_user_conversations(
        &self,
        user_id: &UserId,
        page_size: Option<usize>,
    ) -> LiveSubscription<Vec<ContentRecord>> {
        let query = self.page(ContentKind::Message, ContentFilter::default().participant(user_id.clone()), page_size);
        self.spawn_view("user_conversations", query, |records| records)
    }

    /// Number of live, unread messages addressed to the user.
    #[must_use]
    pub fn subscribe_unread_count(&self, user_id: &UserId) -> LiveSubscription<usize> {
        let filter = ContentFilter::default().target(user_id.clone()).read(false);
        let query = ContentQuery::new(ContentKind::Message).filter(filter);
        self.spawn_view("unread_count", query, |records| records.len())
    }

    /// Live stories from every vendor, newest first.
    #[must_use]
    pub fn subscribe_feed(&self, page_size: Option<usize>) -> LiveSubscription<Vec<ContentRecord>> {
        let query = self.page(ContentKind::Story, ContentFilter::default(), page_size);
        self.spawn_view("feed", query, |records| records)
    }

    /// Live stories posted by one vendor, newest first.
    #[must_use]
    pub fn subscribe_vendor_stories(
        &self,
        owner_id: &UserId,
        page_size: Option<usize>,
    ) -> LiveSubscription<Vec<ContentRecord>> {
        let query = self.page(ContentKind::Story, ContentFilter::default().owner(owner_id.clone()), page_size);
        self.spawn_view("vendor_stories", query, |records| records)
    }

    fn page(&self, kind: ContentKind, filter: ContentFilter, page_size: Option<usize>) -> ContentQuery {
        // All records of a kind share one TTL, so in newest-first order the expired
        // records always trail the live ones and never crowd a page.
        ContentQuery::new(kind).filter(filter).order(SortOrder::NewestFirst).limit(self.paging.page_size(page_size))
    }

    fn spawn_view<T, F>(&self, view: &'static str, mut query: ContentQuery, project: F) -> LiveSubscription<T>
    where
        T: Clone + PartialEq + Send + 'static,
        F: Fn(Vec<ContentRecord>) -> T + Send + 'static,
    {
        let now = self.clock.now();
        query.filter.expires_after = Some(now);

        let (tx, rx) = mpsc::channel(self.buffer_size);
        let cancel = CancellationToken::new();
        let task_cancel = cancel.clone();
        let mut upstream = self.store.subscribe(query);
        let clock = Arc::clone(&self.clock);
        let refresh_interval = self.refresh_interval;
        let metrics = self.metrics.clone();
        let labels = [KeyValue::new("view", view)];

        metrics.active_subscriptions.add(1, &labels);
        tokio::spawn(
            async move {
                let mut held: Vec<ContentRecord> = Vec::new();
                let mut primed = false;
                let mut last: Option<T> = None;

                loop {
                    let wake = next_wake(&held, clock.now(), refresh_interval);
                    tokio::select! {
                        () = task_cancel.cancelled() => break,
                        () = tx.closed() => break,
                        snapshot = upstream.next() => match snapshot {
                            Some(Ok(records)) => {
                                held = records;
                                primed = true;
                            }
                            Some(Err(e)) => {
                                tracing::warn!(error = %e, "Live view store snapshot failed, keeping previous");
                                continue;
                            }
                            None => {
                                tracing::debug!("Store subscription ended");
                                break;
                            }
                        },
                        () = tokio::time::sleep(wake) => {}
                    }

                    if !primed {
                        continue;
                    }

                    let now = clock.now();
                    held.retain(|r| r.is_live_at(now));
                    let value = project(held.clone());
                    if last.as_ref() != Some(&value) {
                        if tx.send(value.clone()).await.is_err() {
                            break;
                        }
                        last = Some(value);
                    }
                }

                metrics.active_subscriptions.add(-1, &labels);
                tracing::debug!("Live view subscription closed");
            }
            .instrument(tracing::debug_span!("live_view", view)),
        );

        LiveSubscription { inner: ReceiverStream::new(rx), _cancel: cancel.drop_guard() }
    }
}

/// Delay until the next expiry re-evaluation.
fn next_wake(held: &[ContentRecord], now: OffsetDateTime, refresh_interval: Duration) -> Duration {
    held.iter()
        .map(|r| Duration::try_from(r.expires_at() - now).unwrap_or(Duration::ZERO))
        .min()
        .map_or(refresh_interval, |until_expiry| until_expiry.min(refresh_interval))
        .max(MIN_REFRESH)
}
