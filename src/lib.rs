pub mod app;
pub mod shutdown;

pub use app::{AppMode, Application, FollowupServices};
pub use shutdown::ShutdownManager;
