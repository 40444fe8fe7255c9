use crate::adapters::directory::{DirectoryError, Follower};
use crate::domain::user::UserId;

#[derive(Debug, sqlx::FromRow)]
pub struct FollowerRow {
    pub(crate) follower_id: String,
    pub(crate) token: Option<String>,
}

impl TryFrom<FollowerRow> for Follower {
    type Error = DirectoryError;

    fn try_from(row: FollowerRow) -> Result<Self, Self::Error> {
        let user_id = UserId::parse(row.follower_id).map_err(|e| DirectoryError::Corrupt(e.to_string()))?;
        Ok(Self { user_id, token: row.token })
    }
}
