use crate::domain::user::UserId;
use async_trait::async_trait;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DirectoryError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("Stored identity is malformed: {0}")]
    Corrupt(String),
    #[error("Directory unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Follower {
    pub user_id: UserId,
    pub token: Option<String>,
}

/// Follower graph and push token registry of the identity provider.
#[async_trait]
pub trait RecipientDirectory: Send + Sync + std::fmt::Debug {
    async fn get_followers(&self, owner_id: &UserId) -> Result<Vec<Follower>, DirectoryError>;

    async fn get_token(&self, user_id: &UserId) -> Result<Option<String>, DirectoryError>;

    /// Removes tokens the push provider reported as unregistered.
    async fn invalidate_tokens(&self, tokens: &[String]) -> Result<u64, DirectoryError>;

    async fn ping(&self) -> Result<(), DirectoryError>;
}
