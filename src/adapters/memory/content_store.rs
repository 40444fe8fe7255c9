use crate::adapters::store::{ContentStore, ContentStream, FieldUpdate, MAX_BATCH_SIZE, StoreError, requery_on_change};
use crate::domain::content::{ContentKind, ContentRecord};
use crate::domain::query::ContentQuery;
use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::{DashMap, DashSet};
use std::sync::Arc;
use tokio::sync::broadcast;
use uuid::Uuid;

const CHANGE_FEED_CAPACITY: usize = 256;

/// Process-local content store.
///
/// Deleted ids are remembered so they can never be recreated.
#[derive(Clone, Debug)]
pub struct InMemoryContentStore {
    records: Arc<DashMap<(ContentKind, Uuid), ContentRecord>>,
    retired_ids: Arc<DashSet<Uuid>>,
    changes: broadcast::Sender<ContentKind>,
}

impl Default for InMemoryContentStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryContentStore {
    #[must_use]
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(CHANGE_FEED_CAPACITY);
        Self { records: Arc::new(DashMap::new()), retired_ids: Arc::new(DashSet::new()), changes }
    }

    /// Number of records physically present, live or not.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Open change-feed subscriptions.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.changes.receiver_count()
    }

    fn publish(&self, kind: ContentKind) {
        // No receivers just means nobody is subscribed.
        let _ = self.changes.send(kind);
    }
}

#[async_trait]
impl ContentStore for InMemoryContentStore {
    async fn create(&self, record: ContentRecord) -> Result<Uuid, StoreError> {
        let id = record.id();
        let kind = record.kind();
        if self.retired_ids.contains(&id) {
            return Err(StoreError::DuplicateId(id));
        }
        match self.records.entry((kind, id)) {
            Entry::Occupied(_) => return Err(StoreError::DuplicateId(id)),
            Entry::Vacant(slot) => {
                slot.insert(record);
            }
        }
        self.publish(kind);
        Ok(id)
    }

    async fn get_by_id(&self, kind: ContentKind, id: Uuid) -> Result<Option<ContentRecord>, StoreError> {
        Ok(self.records.get(&(kind, id)).map(|r| r.value().clone()))
    }

    async fn query(&self, query: &ContentQuery) -> Result<Vec<ContentRecord>, StoreError> {
        let candidates: Vec<ContentRecord> =
            self.records.iter().filter(|e| e.key().0 == query.kind).map(|e| e.value().clone()).collect();
        Ok(query.apply(candidates))
    }

    fn subscribe(&self, query: ContentQuery) -> ContentStream {
        requery_on_change(self.clone(), self.changes.subscribe(), query)
    }

    async fn update_field(&self, kind: ContentKind, id: Uuid, update: FieldUpdate) -> Result<(), StoreError> {
        let changed = self.records.get_mut(&(kind, id)).is_some_and(|mut record| {
            let FieldUpdate::Read(read) = update;
            record.set_read(read);
            true
        });
        if changed {
            self.publish(kind);
        }
        Ok(())
    }

    async fn batch_delete(&self, kind: ContentKind, ids: &[Uuid]) -> Result<u64, StoreError> {
        if ids.len() > MAX_BATCH_SIZE {
            return Err(StoreError::BatchTooLarge(ids.len()));
        }
        if ids.is_empty() {
            return Ok(0);
        }
        let mut deleted = 0;
        for id in ids {
            if self.records.remove(&(kind, *id)).is_some() {
                deleted += 1;
            }
            self.retired_ids.insert(*id);
        }
        if deleted > 0 {
            self.publish(kind);
        }
        Ok(deleted)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::query::ContentFilter;
    use crate::domain::user::UserId;
    use futures::StreamExt;
    use time::macros::datetime;

    fn message(from: &str, to: &str, text: &str) -> ContentRecord {
        ContentRecord::new_message(
            Uuid::now_v7(),
            UserId::parse(from).unwrap(),
            UserId::parse(to).unwrap(),
            text.into(),
            datetime!(2026-06-01 09:00 UTC),
        )
    }

    #[tokio::test]
    async fn test_deleted_ids_are_never_reused() {
        let store = InMemoryContentStore::new();
        let record = message("a", "b", "hello");
        let id = store.create(record.clone()).await.unwrap();

        assert!(matches!(store.create(record.clone()).await, Err(StoreError::DuplicateId(_))));
        assert_eq!(store.batch_delete(ContentKind::Message, &[id]).await.unwrap(), 1);
        assert!(matches!(store.create(record).await, Err(StoreError::DuplicateId(dup)) if dup == id));
    }

    #[tokio::test]
    async fn test_batch_delete_rejects_oversized_batches() {
        let store = InMemoryContentStore::new();
        let ids: Vec<Uuid> = (0..=MAX_BATCH_SIZE).map(|_| Uuid::now_v7()).collect();
        assert!(matches!(
            store.batch_delete(ContentKind::Message, &ids).await,
            Err(StoreError::BatchTooLarge(n)) if n == MAX_BATCH_SIZE + 1
        ));
    }

    #[tokio::test]
    async fn test_update_field_sets_read_state() {
        let store = InMemoryContentStore::new();
        let id = store.create(message("a", "b", "hi")).await.unwrap();
        store.update_field(ContentKind::Message, id, FieldUpdate::Read(true)).await.unwrap();
        assert!(store.get_by_id(ContentKind::Message, id).await.unwrap().unwrap().is_read());
        store.update_field(ContentKind::Message, Uuid::now_v7(), FieldUpdate::Read(true)).await.unwrap();
    }

    #[tokio::test]
    async fn test_subscribe_reemits_on_write() {
        let store = InMemoryContentStore::new();
        let query = ContentQuery::new(ContentKind::Message)
            .filter(ContentFilter::default().participant(UserId::parse("a").unwrap()));
        let mut stream = store.subscribe(query);

        assert!(stream.next().await.unwrap().unwrap().is_empty());
        store.create(message("a", "b", "first")).await.unwrap();
        let snapshot = stream.next().await.unwrap().unwrap();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].text(), Some("first"));
    }
}
