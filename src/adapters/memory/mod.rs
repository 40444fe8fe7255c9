//! In-process adapters used by tests and single-node development runs.

pub mod content_store;
pub mod directory;

pub use content_store::InMemoryContentStore;
pub use directory::InMemoryDirectory;
