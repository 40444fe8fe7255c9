use crate::domain::content::{ContentKind, ContentRecord};
use crate::domain::conversation::ConversationId;
use crate::domain::user::UserId;
use std::cmp::Ordering;
use time::OffsetDateTime;

/// Conjunction of optional predicates over content records.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContentFilter {
    pub conversation_id: Option<ConversationId>,
    pub participant: Option<UserId>,
    pub owner_id: Option<UserId>,
    pub target_id: Option<UserId>,
    pub read: Option<bool>,
    /// Owner or participant.
    pub involving: Option<UserId>,
    /// `expires_at > t`
    pub expires_after: Option<OffsetDateTime>,
    /// `expires_at <= t`
    pub expired_by: Option<OffsetDateTime>,
}

impl ContentFilter {
    #[must_use]
    pub fn conversation(mut self, conversation_id: ConversationId) -> Self {
        self.conversation_id = Some(conversation_id);
        self
    }

    #[must_use]
    pub fn participant(mut self, user_id: UserId) -> Self {
        self.participant = Some(user_id);
        self
    }

    #[must_use]
    pub fn owner(mut self, user_id: UserId) -> Self {
        self.owner_id = Some(user_id);
        self
    }

    #[must_use]
    pub fn target(mut self, user_id: UserId) -> Self {
        self.target_id = Some(user_id);
        self
    }

    #[must_use]
    pub const fn read(mut self, read: bool) -> Self {
        self.read = Some(read);
        self
    }

    #[must_use]
    pub fn involving(mut self, user_id: UserId) -> Self {
        self.involving = Some(user_id);
        self
    }

    #[must_use]
    pub const fn live_at(mut self, now: OffsetDateTime) -> Self {
        self.expires_after = Some(now);
        self
    }

    #[must_use]
    pub const fn expired_by(mut self, now: OffsetDateTime) -> Self {
        self.expired_by = Some(now);
        self
    }

    #[must_use]
    pub fn matches(&self, record: &ContentRecord) -> bool {
        self.conversation_id.as_ref().is_none_or(|c| record.conversation_id() == Some(c))
            && self.participant.as_ref().is_none_or(|p| record.participants().is_some_and(|ps| ps.contains(p)))
            && self.owner_id.as_ref().is_none_or(|o| record.owner_id() == o)
            && self.target_id.as_ref().is_none_or(|t| record.target_id() == Some(t))
            && self.read.is_none_or(|r| record.is_read() == r)
            && self.involving.as_ref().is_none_or(|u| record.involves(u))
            && self.expires_after.is_none_or(|t| record.expires_at() > t)
            && self.expired_by.is_none_or(|t| record.expires_at() <= t)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortOrder {
    /// Descending `created_at`, ties broken by ascending id.
    #[default]
    NewestFirst,
    /// Ascending `expires_at`, ties broken by ascending id.
    ExpiringFirst,
}

impl SortOrder {
    #[must_use]
    pub fn compare(self, a: &ContentRecord, b: &ContentRecord) -> Ordering {
        match self {
            Self::NewestFirst => b.created_at().cmp(&a.created_at()).then_with(|| a.id().cmp(&b.id())),
            Self::ExpiringFirst => a.expires_at().cmp(&b.expires_at()).then_with(|| a.id().cmp(&b.id())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentQuery {
    pub kind: ContentKind,
    pub filter: ContentFilter,
    pub order: SortOrder,
    pub limit: Option<usize>,
}

impl ContentQuery {
    #[must_use]
    pub fn new(kind: ContentKind) -> Self {
        Self { kind, filter: ContentFilter::default(), order: SortOrder::default(), limit: None }
    }

    #[must_use]
    pub fn filter(mut self, filter: ContentFilter) -> Self {
        self.filter = filter;
        self
    }

    #[must_use]
    pub const fn order(mut self, order: SortOrder) -> Self {
        self.order = order;
        self
    }

    #[must_use]
    pub const fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Applies filter, order and limit to an unordered candidate set.
    #[must_use]
    pub fn apply<I>(&self, records: I) -> Vec<ContentRecord>
    where
        I: IntoIterator<Item = ContentRecord>,
    {
        let mut matched: Vec<ContentRecord> =
            records.into_iter().filter(|r| r.kind() == self.kind && self.filter.matches(r)).collect();
        matched.sort_by(|a, b| self.order.compare(a, b));
        if let Some(limit) = self.limit {
            matched.truncate(limit);
        }
        matched
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::content::Payload;
    use time::Duration;
    use time::macros::datetime;
    use uuid::Uuid;

    fn id(raw: &str) -> UserId {
        UserId::parse(raw).unwrap()
    }

    #[test]
    fn test_newest_first_breaks_ties_by_id() {
        let at = datetime!(2026-06-01 09:00 UTC);
        let low = Uuid::from_u128(1);
        let high = Uuid::from_u128(2);
        let older = ContentRecord::new_message(Uuid::from_u128(3), id("a"), id("b"), "1".into(), at - Duration::hours(1));
        let tie_high = ContentRecord::new_message(high, id("a"), id("b"), "2".into(), at);
        let tie_low = ContentRecord::new_message(low, id("b"), id("a"), "3".into(), at);

        let ordered = ContentQuery::new(ContentKind::Message).apply(vec![older, tie_high, tie_low]);
        let ids: Vec<Uuid> = ordered.iter().map(ContentRecord::id).collect();
        assert_eq!(ids, vec![low, high, Uuid::from_u128(3)]);
    }

    #[test]
    fn test_filters_combine() {
        let at = datetime!(2026-06-01 09:00 UTC);
        let to_bob = ContentRecord::new_message(Uuid::now_v7(), id("a"), id("bob"), "hi".into(), at);
        let to_amy = ContentRecord::new_message(Uuid::now_v7(), id("bob"), id("amy"), "yo".into(), at);
        let story = ContentRecord::new_story(Uuid::now_v7(), id("bob"), Payload::Text { text: "open".into() }, at);

        let unread_for_bob = ContentFilter::default().target(id("bob")).read(false);
        assert!(unread_for_bob.matches(&to_bob));
        assert!(!unread_for_bob.matches(&to_amy));

        let involving_bob = ContentFilter::default().involving(id("bob"));
        assert!(involving_bob.matches(&to_bob));
        assert!(involving_bob.matches(&to_amy));
        assert!(involving_bob.matches(&story));

        let expired = ContentFilter::default().expired_by(at + Duration::hours(24));
        assert!(expired.matches(&to_bob));
        assert!(!ContentFilter::default().live_at(at + Duration::hours(24)).matches(&to_bob));
    }

    #[test]
    fn test_apply_limits_and_scopes_kind() {
        let at = datetime!(2026-06-01 09:00 UTC);
        let records: Vec<ContentRecord> = (0..5)
            .map(|i| ContentRecord::new_message(Uuid::now_v7(), id("a"), id("b"), format!("{i}"), at + Duration::minutes(i)))
            .chain(std::iter::once(ContentRecord::new_story(
                Uuid::now_v7(),
                id("a"),
                Payload::Text { text: "s".into() },
                at,
            )))
            .collect();

        let page = ContentQuery::new(ContentKind::Message).limit(2).apply(records);
        assert_eq!(page.len(), 2);
        assert_eq!(page[0].text(), Some("4"));
        assert_eq!(page[1].text(), Some("3"));
    }
}
