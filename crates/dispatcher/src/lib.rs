//! 线索跟进调度核心
//!
//! 重试状态机、状态变更处理、回调安排与提醒、延迟作业以及周期调度循环。

pub mod callback_service;
pub mod cron_utils;
pub mod deferred_jobs;
pub mod lead_service;
pub mod retry_service;
pub mod scheduler;
pub mod status_handler;
pub mod templates;

pub use callback_service::{CallbackService, ScheduledCallback};
pub use cron_utils::CronScheduler;
pub use deferred_jobs::DeferredJobRunner;
pub use lead_service::{LeadIntake, LeadService};
pub use retry_service::{LeadRetryService, RetryRequest, RetryService};
pub use scheduler::{PeriodicJob, SweepScheduler};
pub use status_handler::{StatusChangeResult, TaskStatusHandler};
