//! # Followup Testing Utils
//!
//! Shared testing utilities for the lead follow-up workspace.
//!
//! - **InMemoryStore**: in-memory implementation of every persistence port,
//!   with injectable failure points
//! - **RecordingNotifier**: notification dispatcher that records what was sent
//! - **FixedClock**: manually advanced clock
//! - **Builders**: `LeadBuilder`, `TaskBuilder`
//!
//! ```toml
//! [dev-dependencies]
//! followup-testing-utils = { path = "../testing-utils" }
//! ```

pub mod builders;
pub mod helpers;
pub mod mocks;

// Re-export commonly used items
pub use builders::*;
pub use helpers::*;
pub use mocks::*;
