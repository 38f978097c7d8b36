#![allow(dead_code)]

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use followup_config::{CallbackConfig, RetryConfig, StatusFlowConfig};
use followup_dispatcher::{CallbackService, LeadRetryService, LeadService, TaskStatusHandler};
use followup_domain::entities::{Lead, Task, TaskStatus};
use followup_domain::ports::Clock;
use followup_testing_utils::{
    at, date, FixedClock, InMemoryStore, LeadBuilder, RecordingNotifier, TaskBuilder,
};

pub const AGENT: &str = "agent@example.com";

/// 固定在 2024-03-01 09:00 UTC 的测试环境
pub struct Harness {
    pub store: Arc<InMemoryStore>,
    pub notifier: Arc<RecordingNotifier>,
    pub clock: Arc<FixedClock>,
}

impl Harness {
    pub fn new() -> Self {
        Self {
            store: Arc::new(InMemoryStore::new()),
            notifier: Arc::new(RecordingNotifier::new()),
            clock: Arc::new(FixedClock::new(at(2024, 3, 1, 9, 0))),
        }
    }

    pub fn with_notifier(notifier: RecordingNotifier) -> Self {
        Self {
            notifier: Arc::new(notifier),
            ..Self::new()
        }
    }

    pub fn today(&self) -> NaiveDate {
        date(2024, 3, 1)
    }

    pub fn clock_now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub fn retry_service(&self) -> LeadRetryService {
        LeadRetryService::new(
            self.store.clone(),
            self.store.clone(),
            self.store.clone(),
            self.clock.clone(),
            RetryConfig::default(),
        )
    }

    pub fn status_handler(&self) -> TaskStatusHandler {
        TaskStatusHandler::new(
            self.store.clone(),
            self.store.clone(),
            self.store.clone(),
            self.store.clone(),
            self.store.clone(),
            self.notifier.clone(),
            self.clock.clone(),
            StatusFlowConfig::default(),
        )
    }

    pub fn callback_service(&self) -> CallbackService {
        CallbackService::new(
            self.store.clone(),
            self.store.clone(),
            self.store.clone(),
            self.store.clone(),
            self.notifier.clone(),
            self.clock.clone(),
            &CallbackConfig::default(),
        )
    }

    pub fn lead_service(&self) -> LeadService {
        LeadService::new(
            self.store.clone(),
            self.store.clone(),
            self.store.clone(),
            self.clock.clone(),
            RetryConfig::default(),
        )
    }

    pub fn seed_lead(&self, id: i64) -> Lead {
        self.store.insert_lead(
            LeadBuilder::new()
                .with_id(id)
                .with_name(&format!("LEAD-{id:04}"))
                .with_owner(Some(AGENT))
                .build(),
        )
    }

    /// 已到期的 Call Not Connected 任务
    pub fn seed_unreached_task(&self, id: i64, lead_id: i64, attempt: i32) -> Task {
        self.store.insert_task(
            TaskBuilder::new()
                .with_id(id)
                .with_title(&format!("Retry Call - Attempt {attempt}"))
                .with_lead(Some(lead_id))
                .with_status(TaskStatus::CallNotConnected)
                .with_attempt(attempt, 10)
                .with_due_date(self.today())
                .build(),
        )
    }
}
