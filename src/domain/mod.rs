pub mod clock;
pub mod content;
pub mod conversation;
pub mod notification;
pub mod query;
pub mod sweep;
pub mod ttl;
pub mod user;
