use crate::domain::user::UserId;
use crate::error::Result;
use serde::Serialize;
use std::fmt;

/// Joins the two sorted participant ids of a conversation key.
pub const SEPARATOR: char = '_';

/// Symmetric key of the pairwise thread between two users.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct ConversationId(String);

impl ConversationId {
    /// Derives the key for the pair, independent of argument order.
    #[must_use]
    pub fn between(a: &UserId, b: &UserId) -> Self {
        let [first, second] = sorted_pair(a, b);
        Self(format!("{first}{SEPARATOR}{second}"))
    }

    /// Derives the key from raw identifiers.
    ///
    /// # Errors
    /// Returns `AppError::InvalidArgument` if either id is empty or malformed.
    pub fn derive(a: &str, b: &str) -> Result<Self> {
        Ok(Self::between(&UserId::parse(a)?, &UserId::parse(b)?))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Rebuilds a key read back from storage.
    pub(crate) const fn from_stored(raw: String) -> Self {
        Self(raw)
    }
}

impl fmt::Display for ConversationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Orders the pair lexicographically, the layout `participants` is stored in.
#[must_use]
pub fn sorted_pair(a: &UserId, b: &UserId) -> [UserId; 2] {
    if a <= b { [a.clone(), b.clone()] } else { [b.clone(), a.clone()] }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;

    fn id(raw: &str) -> UserId {
        UserId::parse(raw).unwrap()
    }

    #[test]
    fn test_conversation_id_is_symmetric() {
        let pairs = [("alice", "bob"), ("zed", "amy"), ("farm-7", "farm-10"), ("same", "same")];
        for (a, b) in pairs {
            assert_eq!(ConversationId::between(&id(a), &id(b)), ConversationId::between(&id(b), &id(a)));
        }
    }

    #[test]
    fn test_conversation_id_is_sorted_and_joined() {
        assert_eq!(ConversationId::between(&id("bob"), &id("alice")).as_str(), "alice_bob");
    }

    #[test]
    fn test_distinct_peers_yield_distinct_keys() {
        let a = id("alice");
        assert_ne!(ConversationId::between(&a, &id("bob")), ConversationId::between(&a, &id("carol")));
        assert_ne!(ConversationId::between(&id("ab"), &id("c")), ConversationId::between(&id("a"), &id("bc")));
    }

    #[test]
    fn test_derive_rejects_empty_ids() {
        assert!(matches!(ConversationId::derive("", "bob"), Err(AppError::InvalidArgument(_))));
        assert!(matches!(ConversationId::derive("alice", ""), Err(AppError::InvalidArgument(_))));
    }

    #[test]
    fn test_sorted_pair() {
        assert_eq!(sorted_pair(&id("m"), &id("c")), [id("c"), id("m")]);
    }
}
