use crate::adapters::directory::RecipientDirectory;
use crate::domain::user::UserId;
use crate::error::Result;
use std::collections::HashSet;
use std::sync::Arc;

/// Outcome of resolving the single recipient of a direct message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DirectRecipient {
    Token(String),
    /// The recipient has no token; the message stands but nobody is notified.
    Unreachable,
}

#[derive(Clone, Debug)]
pub struct RecipientResolver {
    directory: Arc<dyn RecipientDirectory>,
}

impl RecipientResolver {
    #[must_use]
    pub fn new(directory: Arc<dyn RecipientDirectory>) -> Self {
        Self { directory }
    }

    /// Resolves the deduplicated push tokens of everyone following `owner_id`.
    ///
    /// Followers without a token are skipped. Zero followers is an empty list, not an error.
    ///
    /// # Errors
    /// Returns `AppError::Directory` if the follower lookup fails.
    #[tracing::instrument(err(level = "warn"), skip(self), fields(owner_id = %owner_id, recipients = tracing::field::Empty))]
    pub async fn followers_of(&self, owner_id: &UserId) -> Result<Vec<String>> {
        let followers = self.directory.get_followers(owner_id).await?;

        let mut seen = HashSet::new();
        let mut tokens = Vec::with_capacity(followers.len());
        for follower in followers {
            match follower.token {
                Some(token) => {
                    if seen.insert(token.clone()) {
                        tokens.push(token);
                    }
                }
                None => tracing::debug!(follower_id = %follower.user_id, "Follower has no push token, skipping"),
            }
        }

        tracing::Span::current().record("recipients", tokens.len());
        Ok(tokens)
    }

    /// Resolves the token of a direct message recipient.
    ///
    /// # Errors
    /// Returns `AppError::Directory` if the token lookup fails.
    #[tracing::instrument(err(level = "warn"), skip(self), fields(to_id = %to_id))]
    pub async fn direct(&self, to_id: &UserId) -> Result<DirectRecipient> {
        match self.directory.get_token(to_id).await? {
            Some(token) => Ok(DirectRecipient::Token(token)),
            None => {
                tracing::debug!("Recipient has no push token, cannot notify");
                Ok(DirectRecipient::Unreachable)
            }
        }
    }
}
