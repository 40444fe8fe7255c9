pub mod content;
pub mod follower;

pub use content::ContentRow;
pub use follower::FollowerRow;
