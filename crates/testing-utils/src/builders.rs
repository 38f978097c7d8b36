//! Test data builders for creating test entities
//!
//! Defaults mirror a freshly created first-contact task on lead 1.

use chrono::{DateTime, NaiveDate, Utc};
use followup_domain::entities::{
    Lead, LeadStatus, NewLead, Task, TaskPriority, TaskStatus, DEFAULT_MAX_ATTEMPTS,
    DEFAULT_RETRY_INTERVAL_DAYS,
};

use crate::helpers::date;

/// Builder for creating test Lead entities
pub struct LeadBuilder {
    lead: Lead,
}

impl LeadBuilder {
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            lead: Lead {
                id: 1,
                name: "LEAD-0001".to_string(),
                first_name: Some("Asha".to_string()),
                email: Some("asha@example.com".to_string()),
                owner: Some("agent@example.com".to_string()),
                status: LeadStatus::New,
                created_at: now,
                updated_at: now,
            },
        }
    }

    pub fn with_id(mut self, id: i64) -> Self {
        self.lead.id = id;
        self
    }

    pub fn with_name(mut self, name: &str) -> Self {
        self.lead.name = name.to_string();
        self
    }

    pub fn with_first_name(mut self, first_name: Option<&str>) -> Self {
        self.lead.first_name = first_name.map(str::to_string);
        self
    }

    pub fn with_email(mut self, email: Option<&str>) -> Self {
        self.lead.email = email.map(str::to_string);
        self
    }

    pub fn with_owner(mut self, owner: Option<&str>) -> Self {
        self.lead.owner = owner.map(str::to_string);
        self
    }

    pub fn with_status(mut self, status: LeadStatus) -> Self {
        self.lead.status = status;
        self
    }

    pub fn build(self) -> Lead {
        self.lead
    }

    pub fn build_new(self) -> NewLead {
        NewLead {
            name: self.lead.name,
            first_name: self.lead.first_name,
            email: self.lead.email,
            owner: self.lead.owner,
        }
    }
}

impl Default for LeadBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for creating test Task entities
pub struct TaskBuilder {
    task: Task,
}

impl TaskBuilder {
    pub fn new() -> Self {
        let now = Utc::now();
        let today = date(2024, 3, 1);
        Self {
            task: Task {
                id: 1,
                title: "Make First Contact".to_string(),
                description: "Task auto-created for lead 1".to_string(),
                assigned_to: Some("agent@example.com".to_string()),
                status: TaskStatus::Todo,
                priority: TaskPriority::Medium,
                start_date: today,
                due_date: today,
                attempt_number: 1,
                max_attempts: DEFAULT_MAX_ATTEMPTS,
                retry_interval_days: DEFAULT_RETRY_INTERVAL_DAYS,
                lead_id: Some(1),
                previous_task_id: None,
                retry_created: false,
                callback_at: None,
                callback_notification_sent: false,
                requested_callback_at: None,
                version: 1,
                created_at: now,
                updated_at: now,
            },
        }
    }

    pub fn with_id(mut self, id: i64) -> Self {
        self.task.id = id;
        self
    }

    pub fn with_title(mut self, title: &str) -> Self {
        self.task.title = title.to_string();
        self
    }

    pub fn with_status(mut self, status: TaskStatus) -> Self {
        self.task.status = status;
        self
    }

    pub fn with_priority(mut self, priority: TaskPriority) -> Self {
        self.task.priority = priority;
        self
    }

    pub fn with_assignee(mut self, assignee: Option<&str>) -> Self {
        self.task.assigned_to = assignee.map(str::to_string);
        self
    }

    pub fn with_lead(mut self, lead_id: Option<i64>) -> Self {
        self.task.lead_id = lead_id;
        self
    }

    pub fn with_attempt(mut self, attempt_number: i32, max_attempts: i32) -> Self {
        self.task.attempt_number = attempt_number;
        self.task.max_attempts = max_attempts;
        self
    }

    pub fn with_due_date(mut self, due_date: NaiveDate) -> Self {
        self.task.start_date = due_date;
        self.task.due_date = due_date;
        self
    }

    pub fn with_previous_task(mut self, previous_task_id: Option<i64>) -> Self {
        self.task.previous_task_id = previous_task_id;
        self
    }

    pub fn with_retry_created(mut self, retry_created: bool) -> Self {
        self.task.retry_created = retry_created;
        self
    }

    pub fn with_callback_at(mut self, callback_at: Option<DateTime<Utc>>) -> Self {
        self.task.callback_at = callback_at;
        self
    }

    pub fn with_callback_notification_sent(mut self, sent: bool) -> Self {
        self.task.callback_notification_sent = sent;
        self
    }

    pub fn build(self) -> Task {
        self.task
    }
}

impl Default for TaskBuilder {
    fn default() -> Self {
        Self::new()
    }
}
