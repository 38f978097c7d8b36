//! SQLite persistence, outbox notifications and observability for the
//! follow-up services.

pub mod database;
pub mod error_handling;
pub mod notifications;
pub mod observability;

pub use database::*;
pub use notifications::*;
pub use observability::*;
