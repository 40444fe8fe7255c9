use crate::domain::conversation::{ConversationId, sorted_pair};
use crate::domain::ttl;
use crate::domain::user::UserId;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentKind {
    Message,
    Story,
}

impl ContentKind {
    pub const ALL: [Self; 2] = [Self::Message, Self::Story];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Message => "message",
            Self::Story => "story",
        }
    }
}

impl fmt::Display for ContentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContentKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "message" => Ok(Self::Message),
            "story" => Ok(Self::Story),
            other => Err(format!("unknown content kind '{other}'")),
        }
    }
}

/// Kind-specific body of a record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Payload {
    Text { text: String },
    Media { media_ref: String, caption: Option<String> },
}

impl Payload {
    /// Short human-readable form used in notification bodies.
    #[must_use]
    pub fn preview(&self, max_chars: usize) -> String {
        let source = match self {
            Self::Text { text } => text.as_str(),
            Self::Media { caption: Some(caption), .. } if !caption.trim().is_empty() => caption.as_str(),
            Self::Media { .. } => "Shared a new photo",
        };
        let mut preview: String = source.chars().take(max_chars).collect();
        if source.chars().count() > max_chars {
            preview.push('…');
        }
        preview
    }
}

/// A message or story with a fixed lifetime.
///
/// Derived fields (`expires_at`, `conversation_id`, `participants`) are only
/// ever computed by the constructors, never set independently.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContentRecord {
    id: Uuid,
    kind: ContentKind,
    owner_id: UserId,
    #[serde(skip_serializing_if = "Option::is_none")]
    target_id: Option<UserId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    participants: Option<[UserId; 2]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    conversation_id: Option<ConversationId>,
    payload: Payload,
    #[serde(with = "time::serde::rfc3339")]
    created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    expires_at: OffsetDateTime,
    read: bool,
}

impl ContentRecord {
    #[must_use]
    pub fn new_message(id: Uuid, from_id: UserId, to_id: UserId, text: String, created_at: OffsetDateTime) -> Self {
        let conversation_id = ConversationId::between(&from_id, &to_id);
        let participants = sorted_pair(&from_id, &to_id);
        Self {
            id,
            kind: ContentKind::Message,
            owner_id: from_id,
            target_id: Some(to_id),
            participants: Some(participants),
            conversation_id: Some(conversation_id),
            payload: Payload::Text { text },
            created_at,
            expires_at: ttl::stamp(ContentKind::Message, created_at),
            read: false,
        }
    }

    #[must_use]
    pub fn new_story(id: Uuid, owner_id: UserId, payload: Payload, created_at: OffsetDateTime) -> Self {
        Self {
            id,
            kind: ContentKind::Story,
            owner_id,
            target_id: None,
            participants: None,
            conversation_id: None,
            payload,
            created_at,
            expires_at: ttl::stamp(ContentKind::Story, created_at),
            read: false,
        }
    }

    /// Rebuilds a record exactly as persisted, trusting the stored derived fields.
    #[allow(clippy::too_many_arguments)]
    pub(crate) const fn from_stored(
        id: Uuid,
        kind: ContentKind,
        owner_id: UserId,
        target_id: Option<UserId>,
        participants: Option<[UserId; 2]>,
        conversation_id: Option<ConversationId>,
        payload: Payload,
        created_at: OffsetDateTime,
        expires_at: OffsetDateTime,
        read: bool,
    ) -> Self {
        Self { id, kind, owner_id, target_id, participants, conversation_id, payload, created_at, expires_at, read }
    }

    #[must_use]
    pub const fn id(&self) -> Uuid {
        self.id
    }

    #[must_use]
    pub const fn kind(&self) -> ContentKind {
        self.kind
    }

    #[must_use]
    pub const fn owner_id(&self) -> &UserId {
        &self.owner_id
    }

    #[must_use]
    pub const fn target_id(&self) -> Option<&UserId> {
        self.target_id.as_ref()
    }

    #[must_use]
    pub const fn participants(&self) -> Option<&[UserId; 2]> {
        self.participants.as_ref()
    }

    #[must_use]
    pub const fn conversation_id(&self) -> Option<&ConversationId> {
        self.conversation_id.as_ref()
    }

    #[must_use]
    pub const fn payload(&self) -> &Payload {
        &self.payload
    }

    #[must_use]
    pub const fn created_at(&self) -> OffsetDateTime {
        self.created_at
    }

    #[must_use]
    pub const fn expires_at(&self) -> OffsetDateTime {
        self.expires_at
    }

    #[must_use]
    pub const fn is_read(&self) -> bool {
        self.read
    }

    /// Text body of a message, if it has one.
    #[must_use]
    pub fn text(&self) -> Option<&str> {
        match &self.payload {
            Payload::Text { text } => Some(text),
            Payload::Media { .. } => None,
        }
    }

    #[must_use]
    pub fn is_live_at(&self, now: OffsetDateTime) -> bool {
        !ttl::has_expired(now, self.expires_at)
    }

    /// True if the user created the record or is one of its participants.
    #[must_use]
    pub fn involves(&self, user_id: &UserId) -> bool {
        &self.owner_id == user_id || self.participants.as_ref().is_some_and(|p| p.contains(user_id))
    }

    pub(crate) const fn set_read(&mut self, read: bool) {
        self.read = read;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    fn id(raw: &str) -> UserId {
        UserId::parse(raw).unwrap()
    }

    #[test]
    fn test_message_derives_pair_fields() {
        let created = datetime!(2026-06-01 12:00 UTC);
        let msg = ContentRecord::new_message(Uuid::now_v7(), id("zoe"), id("abe"), "fresh eggs?".into(), created);

        assert_eq!(msg.participants(), Some(&[id("abe"), id("zoe")]));
        assert_eq!(msg.conversation_id(), Some(&ConversationId::between(&id("abe"), &id("zoe"))));
        assert_eq!(msg.expires_at(), created + ttl::MESSAGE_TTL);
        assert!(!msg.is_read());
        assert!(msg.involves(&id("abe")));
        assert!(!msg.involves(&id("cat")));
    }

    #[test]
    fn test_story_has_no_target() {
        let created = datetime!(2026-06-01 12:00 UTC);
        let story = ContentRecord::new_story(
            Uuid::now_v7(),
            id("farm"),
            Payload::Media { media_ref: "media/abc.jpg".into(), caption: None },
            created,
        );
        assert_eq!(story.target_id(), None);
        assert_eq!(story.participants(), None);
        assert_eq!(story.expires_at(), created + ttl::STORY_TTL);
        assert!(story.is_live_at(created));
        assert!(!story.is_live_at(story.expires_at()));
    }

    #[test]
    fn test_preview_truncates() {
        let payload = Payload::Text { text: "Heirloom tomatoes just arrived".into() };
        assert_eq!(payload.preview(9), "Heirloom …");
        let media = Payload::Media { media_ref: "m".into(), caption: Some("  ".into()) };
        assert_eq!(media.preview(40), "Shared a new photo");
    }

    #[test]
    fn test_kind_parses() {
        for kind in ContentKind::ALL {
            assert_eq!(kind.as_str().parse::<ContentKind>().unwrap(), kind);
        }
        assert!("snap".parse::<ContentKind>().is_err());
    }
}
