use crate::adapters::database::DbPool;
use crate::adapters::database::records::ContentRow;
use crate::adapters::store::{ContentStore, ContentStream, FieldUpdate, MAX_BATCH_SIZE, StoreError, requery_on_change};
use crate::domain::content::{ContentKind, ContentRecord};
use crate::domain::query::{ContentFilter, ContentQuery, SortOrder};
use async_trait::async_trait;
use sqlx::types::Json;
use sqlx::{Postgres, QueryBuilder};
use tokio::sync::broadcast;
use uuid::Uuid;

const SELECT_CONTENT: &str = "SELECT id, kind, owner_id, target_id, participants, conversation_id, payload, \
     created_at, expires_at, read FROM ephemeral_content";

const CHANGE_FEED_CAPACITY: usize = 256;

/// `ephemeral_content` table adapter.
///
/// Subscriptions re-query after writes made through this handle; writes from
/// other processes become visible on the next local write or live-view tick.
#[derive(Clone, Debug)]
pub struct PostgresContentStore {
    pool: DbPool,
    changes: broadcast::Sender<ContentKind>,
}

impl PostgresContentStore {
    #[must_use]
    pub fn new(pool: DbPool) -> Self {
        let (changes, _) = broadcast::channel(CHANGE_FEED_CAPACITY);
        Self { pool, changes }
    }

    fn publish(&self, kind: ContentKind) {
        let _ = self.changes.send(kind);
    }
}

fn push_filter(builder: &mut QueryBuilder<'static, Postgres>, kind: ContentKind, filter: &ContentFilter) {
    builder.push(" WHERE kind = ").push_bind(kind.as_str());
    if let Some(conversation_id) = &filter.conversation_id {
        builder.push(" AND conversation_id = ").push_bind(conversation_id.as_str().to_owned());
    }
    if let Some(participant) = &filter.participant {
        builder.push(" AND ").push_bind(participant.as_str().to_owned()).push(" = ANY(participants)");
    }
    if let Some(owner_id) = &filter.owner_id {
        builder.push(" AND owner_id = ").push_bind(owner_id.as_str().to_owned());
    }
    if let Some(target_id) = &filter.target_id {
        builder.push(" AND target_id = ").push_bind(target_id.as_str().to_owned());
    }
    if let Some(read) = filter.read {
        builder.push(" AND read = ").push_bind(read);
    }
    if let Some(user_id) = &filter.involving {
        builder
            .push(" AND (owner_id = ")
            .push_bind(user_id.as_str().to_owned())
            .push(" OR ")
            .push_bind(user_id.as_str().to_owned())
            .push(" = ANY(participants))");
    }
    if let Some(after) = filter.expires_after {
        builder.push(" AND expires_at > ").push_bind(after);
    }
    if let Some(by) = filter.expired_by {
        builder.push(" AND expires_at <= ").push_bind(by);
    }
}

#[async_trait]
impl ContentStore for PostgresContentStore {
    #[tracing::instrument(level = "debug", skip(self, record), fields(content.id = %record.id(), content.kind = %record.kind()))]
    async fn create(&self, record: ContentRecord) -> Result<Uuid, StoreError> {
        let kind = record.kind();
        let participants: Option<Vec<String>> =
            record.participants().map(|pair| pair.iter().map(|p| p.as_str().to_owned()).collect());

        let result = sqlx::query(
            r"
            INSERT INTO ephemeral_content
                (id, kind, owner_id, target_id, participants, conversation_id, payload, created_at, expires_at, read)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            ",
        )
        .bind(record.id())
        .bind(kind.as_str())
        .bind(record.owner_id().as_str())
        .bind(record.target_id().map(|t| t.as_str().to_owned()))
        .bind(participants)
        .bind(record.conversation_id().map(|c| c.as_str().to_owned()))
        .bind(Json(record.payload()))
        .bind(record.created_at())
        .bind(record.expires_at())
        .bind(record.is_read())
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => {
                self.publish(kind);
                Ok(record.id())
            }
            Err(sqlx::Error::Database(e)) if e.code().as_deref() == Some("23505") => {
                Err(StoreError::DuplicateId(record.id()))
            }
            Err(e) => Err(StoreError::Database(e)),
        }
    }

    #[tracing::instrument(level = "debug", skip(self))]
    async fn get_by_id(&self, kind: ContentKind, id: Uuid) -> Result<Option<ContentRecord>, StoreError> {
        let row = sqlx::query_as::<_, ContentRow>(&format!("{SELECT_CONTENT} WHERE kind = $1 AND id = $2"))
            .bind(kind.as_str())
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(ContentRecord::try_from).transpose()
    }

    #[tracing::instrument(level = "debug", skip(self, query), fields(content.kind = %query.kind))]
    async fn query(&self, query: &ContentQuery) -> Result<Vec<ContentRecord>, StoreError> {
        let mut builder = QueryBuilder::<Postgres>::new(SELECT_CONTENT);
        push_filter(&mut builder, query.kind, &query.filter);
        builder.push(match query.order {
            SortOrder::NewestFirst => " ORDER BY created_at DESC, id ASC",
            SortOrder::ExpiringFirst => " ORDER BY expires_at ASC, id ASC",
        });
        if let Some(limit) = query.limit {
            builder.push(" LIMIT ").push_bind(i64::try_from(limit).unwrap_or(i64::MAX));
        }

        let rows = builder.build_query_as::<ContentRow>().fetch_all(&self.pool).await?;
        rows.into_iter().map(ContentRecord::try_from).collect()
    }

    fn subscribe(&self, query: ContentQuery) -> ContentStream {
        requery_on_change(self.clone(), self.changes.subscribe(), query)
    }

    #[tracing::instrument(level = "debug", skip(self))]
    async fn update_field(&self, kind: ContentKind, id: Uuid, update: FieldUpdate) -> Result<(), StoreError> {
        let FieldUpdate::Read(read) = update;
        let result = sqlx::query("UPDATE ephemeral_content SET read = $1 WHERE kind = $2 AND id = $3")
            .bind(read)
            .bind(kind.as_str())
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() > 0 {
            self.publish(kind);
        }
        Ok(())
    }

    #[tracing::instrument(level = "debug", skip(self, ids), fields(batch_count = ids.len()))]
    async fn batch_delete(&self, kind: ContentKind, ids: &[Uuid]) -> Result<u64, StoreError> {
        if ids.len() > MAX_BATCH_SIZE {
            return Err(StoreError::BatchTooLarge(ids.len()));
        }
        if ids.is_empty() {
            return Ok(0);
        }

        let result = sqlx::query("DELETE FROM ephemeral_content WHERE kind = $1 AND id = ANY($2)")
            .bind(kind.as_str())
            .bind(ids)
            .execute(&self.pool)
            .await?;

        let deleted = result.rows_affected();
        if deleted > 0 {
            self.publish(kind);
        }
        Ok(deleted)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
