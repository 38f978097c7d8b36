//! 新线索登记与首次联系任务

use std::sync::Arc;

use followup_config::RetryConfig;
use followup_domain::{
    entities::{Lead, NewAssignment, NewLead, NewTask, Task, TaskPriority, TaskStatus},
    ports::Clock,
    repositories::{AssignmentRepository, LeadRepository, TaskRepository},
};
use followup_errors::{FollowupError, FollowupResult};
use followup_infrastructure::observability::StructuredLogger;
use serde::Serialize;
use tracing::instrument;

pub const FIRST_CONTACT_TITLE: &str = "Make First Contact";

#[derive(Debug, Clone, Serialize)]
pub struct LeadIntake {
    pub lead: Lead,
    pub first_task: Task,
}

pub struct LeadService {
    leads: Arc<dyn LeadRepository>,
    tasks: Arc<dyn TaskRepository>,
    assignments: Arc<dyn AssignmentRepository>,
    clock: Arc<dyn Clock>,
    config: RetryConfig,
}

impl LeadService {
    pub fn new(
        leads: Arc<dyn LeadRepository>,
        tasks: Arc<dyn TaskRepository>,
        assignments: Arc<dyn AssignmentRepository>,
        clock: Arc<dyn Clock>,
        config: RetryConfig,
    ) -> Self {
        Self {
            leads,
            tasks,
            assignments,
            clock,
            config,
        }
    }

    #[instrument(skip(self, new_lead), fields(lead.name = %new_lead.name))]
    pub async fn create_lead(&self, new_lead: &NewLead) -> FollowupResult<LeadIntake> {
        if new_lead.name.trim().is_empty() {
            return Err(FollowupError::validation_error("线索名称不能为空"));
        }
        let lead = self.leads.create(new_lead).await?;
        let first_task = self.on_lead_created(&lead).await?;
        Ok(LeadIntake { lead, first_task })
    }

    /// 为新线索创建首次联系任务，线索有负责人时同时分配
    #[instrument(skip(self, lead), fields(lead.id = lead.id))]
    pub async fn on_lead_created(&self, lead: &Lead) -> FollowupResult<Task> {
        let mut task = NewTask::new(
            FIRST_CONTACT_TITLE,
            self.clock.today(),
            self.clock
                .days_from_today(self.config.first_contact_due_days as i64),
        );
        task.description = format!("Task auto-created for lead {}", lead.id);
        task.assigned_to = lead
            .owner
            .as_deref()
            .filter(|owner| !owner.trim().is_empty())
            .map(str::to_string);
        task.status = TaskStatus::Todo;
        task.priority = TaskPriority::Medium;
        task.attempt_number = 1;
        task.max_attempts = self.config.max_attempts;
        task.retry_interval_days = self.config.retry_interval_days;
        task.lead_id = Some(lead.id);

        let created = self.tasks.create(&task).await?;
        if let Some(assignment) =
            NewAssignment::for_task(&created, format!("Task assigned: {}", created.title))
        {
            self.assignments.create(&assignment).await?;
        }

        StructuredLogger::log_lead_created(lead.id, created.id, created.assignee());
        Ok(created)
    }
}
