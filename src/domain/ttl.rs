//! Fixed time-to-live policy for ephemeral content.
//!
//! A record is live while `now < expires_at`. Equality counts as expired so
//! read paths and the sweeper never disagree about a record on the boundary.

use crate::domain::content::ContentKind;
use std::fmt;
use time::{Duration, OffsetDateTime};

/// Lifetime of a direct message.
pub const MESSAGE_TTL: Duration = Duration::hours(24);

/// Lifetime of a story or snap.
pub const STORY_TTL: Duration = Duration::hours(24);

#[must_use]
pub const fn ttl_for(kind: ContentKind) -> Duration {
    match kind {
        ContentKind::Message => MESSAGE_TTL,
        ContentKind::Story => STORY_TTL,
    }
}

/// Computes the expiry instant persisted alongside a new record.
#[must_use]
pub fn stamp(kind: ContentKind, created_at: OffsetDateTime) -> OffsetDateTime {
    created_at + ttl_for(kind)
}

#[must_use]
pub fn has_expired(now: OffsetDateTime, expires_at: OffsetDateTime) -> bool {
    now >= expires_at
}

/// Signed time left; negative once the record has expired.
#[must_use]
pub fn time_remaining(now: OffsetDateTime, expires_at: OffsetDateTime) -> Duration {
    expires_at - now
}

/// Display form of the remaining lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Remaining {
    Live(Duration),
    Expired,
}

impl Remaining {
    #[must_use]
    pub fn at(now: OffsetDateTime, expires_at: OffsetDateTime) -> Self {
        if has_expired(now, expires_at) { Self::Expired } else { Self::Live(time_remaining(now, expires_at)) }
    }
}

impl fmt::Display for Remaining {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Expired => f.write_str("Expired"),
            Self::Live(left) => {
                let hours = left.whole_hours();
                let minutes = left.whole_minutes() - hours * 60;
                if hours > 0 { write!(f, "{hours}h {minutes}m") } else { write!(f, "{minutes}m") }
            }
        }
    }
}
