use crate::adapters::directory::{DirectoryError, Follower, RecipientDirectory};
use crate::domain::user::UserId;
use async_trait::async_trait;
use dashmap::DashMap;
use std::collections::BTreeSet;
use std::sync::Arc;

/// Process-local follower graph and token registry.
#[derive(Clone, Debug, Default)]
pub struct InMemoryDirectory {
    followers: Arc<DashMap<UserId, BTreeSet<UserId>>>,
    tokens: Arc<DashMap<UserId, String>>,
}

impl InMemoryDirectory {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn follow(&self, follower_id: UserId, vendor_id: UserId) {
        self.followers.entry(vendor_id).or_default().insert(follower_id);
    }

    pub fn set_token(&self, user_id: UserId, token: impl Into<String>) {
        self.tokens.insert(user_id, token.into());
    }

    #[must_use]
    pub fn has_token(&self, token: &str) -> bool {
        self.tokens.iter().any(|entry| entry.value() == token)
    }
}

#[async_trait]
impl RecipientDirectory for InMemoryDirectory {
    async fn get_followers(&self, owner_id: &UserId) -> Result<Vec<Follower>, DirectoryError> {
        let Some(followers) = self.followers.get(owner_id) else {
            return Ok(Vec::new());
        };
        Ok(followers
            .iter()
            .map(|user_id| Follower {
                user_id: user_id.clone(),
                token: self.tokens.get(user_id).map(|t| t.value().clone()),
            })
            .collect())
    }

    async fn get_token(&self, user_id: &UserId) -> Result<Option<String>, DirectoryError> {
        Ok(self.tokens.get(user_id).map(|t| t.value().clone()))
    }

    async fn invalidate_tokens(&self, tokens: &[String]) -> Result<u64, DirectoryError> {
        let before = self.tokens.len();
        self.tokens.retain(|_, token| !tokens.contains(token));
        Ok((before - self.tokens.len()) as u64)
    }

    async fn ping(&self) -> Result<(), DirectoryError> {
        Ok(())
    }
}
