pub mod database;
pub mod directory;
pub mod memory;
pub mod push;
pub mod store;
