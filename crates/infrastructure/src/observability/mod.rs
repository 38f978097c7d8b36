//! Observability module
//!
//! - Structured logging of follow-up domain events
//! - Prometheus counters
//! - Subscriber and recorder setup

pub mod metrics_collector;
pub mod structured_logger;
pub mod telemetry_setup;

pub use metrics_collector::FollowupMetrics;
pub use structured_logger::StructuredLogger;
pub use telemetry_setup::{init_logging, init_metrics};
