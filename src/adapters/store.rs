use crate::domain::content::{ContentKind, ContentRecord};
use crate::domain::query::ContentQuery;
use async_trait::async_trait;
use futures::stream::{BoxStream, StreamExt};
use thiserror::Error;
use tokio::sync::broadcast;
use uuid::Uuid;

/// Largest id list a single `batch_delete` accepts.
pub const MAX_BATCH_SIZE: usize = 500;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Batch of {0} ids exceeds the maximum of {MAX_BATCH_SIZE}")]
    BatchTooLarge(usize),
    #[error("Record id {0} has already been used")]
    DuplicateId(Uuid),
    #[error("Stored record is malformed: {0}")]
    Corrupt(String),
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

/// Snapshots of a query, re-emitted whenever the queried kind changes.
pub type ContentStream = BoxStream<'static, Result<Vec<ContentRecord>, StoreError>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldUpdate {
    Read(bool),
}

/// Document store holding ephemeral content.
#[async_trait]
pub trait ContentStore: Send + Sync + std::fmt::Debug {
    /// Persists a new record. Ids are never reused.
    async fn create(&self, record: ContentRecord) -> Result<Uuid, StoreError>;

    async fn get_by_id(&self, kind: ContentKind, id: Uuid) -> Result<Option<ContentRecord>, StoreError>;

    async fn query(&self, query: &ContentQuery) -> Result<Vec<ContentRecord>, StoreError>;

    /// Emits the query result now and again after every write to `query.kind`.
    fn subscribe(&self, query: ContentQuery) -> ContentStream;

    /// Updating a missing record is a no-op.
    async fn update_field(&self, kind: ContentKind, id: Uuid, update: FieldUpdate) -> Result<(), StoreError>;

    /// Deletes all ids atomically, returning how many existed.
    ///
    /// Rejects batches larger than [`ContentStore::max_batch_size`].
    async fn batch_delete(&self, kind: ContentKind, ids: &[Uuid]) -> Result<u64, StoreError>;

    fn max_batch_size(&self) -> usize {
        MAX_BATCH_SIZE
    }

    async fn ping(&self) -> Result<(), StoreError>;
}

/// Builds a [`ContentStream`] that re-runs `query` each time `changes` reports its kind.
pub(crate) fn requery_on_change<S>(store: S, changes: broadcast::Receiver<ContentKind>, query: ContentQuery) -> ContentStream
where
    S: ContentStore + Clone + 'static,
{
    futures::stream::unfold((store, changes, query, true), |(store, mut changes, query, first)| async move {
        if !first {
            loop {
                match changes.recv().await {
                    Ok(kind) if kind == query.kind => break,
                    Ok(_) => {}
                    Err(broadcast::error::RecvError::Lagged(missed)) => {
                        tracing::debug!(missed, "Content change feed lagged, re-querying");
                        break;
                    }
                    Err(broadcast::error::RecvError::Closed) => return None,
                }
            }
        }
        let snapshot = store.query(&query).await;
        Some((snapshot, (store, changes, query, false)))
    })
    .boxed()
}
