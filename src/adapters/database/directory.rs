use crate::adapters::database::DbPool;
use crate::adapters::database::records::FollowerRow;
use crate::adapters::directory::{DirectoryError, Follower, RecipientDirectory};
use crate::domain::user::UserId;
use async_trait::async_trait;

/// Reads the `follows` and `push_tokens` tables.
#[derive(Clone, Debug)]
pub struct PostgresDirectory {
    pool: DbPool,
}

impl PostgresDirectory {
    #[must_use]
    pub const fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RecipientDirectory for PostgresDirectory {
    #[tracing::instrument(level = "debug", skip(self), fields(owner_id = %owner_id))]
    async fn get_followers(&self, owner_id: &UserId) -> Result<Vec<Follower>, DirectoryError> {
        let rows = sqlx::query_as::<_, FollowerRow>(
            r"
            SELECT f.follower_id, t.token
            FROM follows f
            LEFT JOIN push_tokens t ON t.user_id = f.follower_id
            WHERE f.vendor_id = $1
            ORDER BY f.follower_id ASC
            ",
        )
        .bind(owner_id.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Follower::try_from).collect()
    }

    #[tracing::instrument(level = "debug", skip(self), fields(user_id = %user_id))]
    async fn get_token(&self, user_id: &UserId) -> Result<Option<String>, DirectoryError> {
        let token = sqlx::query_scalar::<_, String>("SELECT token FROM push_tokens WHERE user_id = $1")
            .bind(user_id.as_str())
            .fetch_optional(&self.pool)
            .await?;
        Ok(token)
    }

    #[tracing::instrument(level = "debug", skip(self, tokens), fields(batch_count = tokens.len()))]
    async fn invalidate_tokens(&self, tokens: &[String]) -> Result<u64, DirectoryError> {
        if tokens.is_empty() {
            return Ok(0);
        }
        let result = sqlx::query("DELETE FROM push_tokens WHERE token = ANY($1)").bind(tokens).execute(&self.pool).await?;
        Ok(result.rows_affected())
    }

    async fn ping(&self) -> Result<(), DirectoryError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
