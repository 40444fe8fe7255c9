pub mod sweeper;
pub mod token_janitor;

pub use sweeper::SweeperWorker;
pub use token_janitor::TokenJanitor;
