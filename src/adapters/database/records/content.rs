use crate::adapters::store::StoreError;
use crate::domain::content::{ContentKind, ContentRecord, Payload};
use crate::domain::conversation::ConversationId;
use crate::domain::user::UserId;
use sqlx::types::Json;
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, sqlx::FromRow)]
pub struct ContentRow {
    pub(crate) id: Uuid,
    pub(crate) kind: String,
    pub(crate) owner_id: String,
    pub(crate) target_id: Option<String>,
    pub(crate) participants: Option<Vec<String>>,
    pub(crate) conversation_id: Option<String>,
    pub(crate) payload: Json<Payload>,
    pub(crate) created_at: OffsetDateTime,
    pub(crate) expires_at: OffsetDateTime,
    pub(crate) read: bool,
}

fn stored_user(raw: String) -> Result<UserId, StoreError> {
    UserId::parse(raw).map_err(|e| StoreError::Corrupt(e.to_string()))
}

impl TryFrom<ContentRow> for ContentRecord {
    type Error = StoreError;

    fn try_from(row: ContentRow) -> Result<Self, Self::Error> {
        let kind: ContentKind = row.kind.parse().map_err(StoreError::Corrupt)?;
        let participants = match row.participants {
            None => None,
            Some(ids) => {
                let [first, second]: [String; 2] = ids
                    .try_into()
                    .map_err(|ids: Vec<String>| StoreError::Corrupt(format!("expected 2 participants, got {}", ids.len())))?;
                Some([stored_user(first)?, stored_user(second)?])
            }
        };

        Ok(Self::from_stored(
            row.id,
            kind,
            stored_user(row.owner_id)?,
            row.target_id.map(stored_user).transpose()?,
            participants,
            row.conversation_id.map(ConversationId::from_stored),
            row.payload.0,
            row.created_at,
            row.expires_at,
            row.read,
        ))
    }
}
