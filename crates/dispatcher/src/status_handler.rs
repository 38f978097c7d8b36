//! 任务状态变更入口与状态分支处理
//!
//! 状态先保存，再派发事件；分支处理失败只记录日志，不回滚状态。

use std::sync::Arc;

use chrono::{Duration, NaiveDate};
use followup_config::StatusFlowConfig;
use followup_domain::{
    entities::{
        EmailMessage, Lead, LeadStatus, NewAssignment, NewDeferredJob, NewTask, RecordRef, Task,
        TaskPriority, TaskStatus,
    },
    events::TaskStatusChanged,
    ports::{start_of_day, Clock, NotificationDispatcher},
    repositories::{
        AssignmentRepository, DeferredJobRepository, LeadCommentRepository, LeadRepository,
        TaskRepository,
    },
};
use followup_errors::{FollowupError, FollowupResult};
use followup_infrastructure::observability::StructuredLogger;
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use crate::templates;

/// 状态变更结果；状态未变化时没有事件
#[derive(Debug, Clone, Serialize)]
pub struct StatusChangeResult {
    pub task: Task,
    pub event: Option<TaskStatusChanged>,
}

impl StatusChangeResult {
    pub fn changed(&self) -> bool {
        self.event.is_some()
    }
}

pub struct TaskStatusHandler {
    tasks: Arc<dyn TaskRepository>,
    leads: Arc<dyn LeadRepository>,
    assignments: Arc<dyn AssignmentRepository>,
    comments: Arc<dyn LeadCommentRepository>,
    jobs: Arc<dyn DeferredJobRepository>,
    notifier: Arc<dyn NotificationDispatcher>,
    clock: Arc<dyn Clock>,
    config: StatusFlowConfig,
}

impl TaskStatusHandler {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        tasks: Arc<dyn TaskRepository>,
        leads: Arc<dyn LeadRepository>,
        assignments: Arc<dyn AssignmentRepository>,
        comments: Arc<dyn LeadCommentRepository>,
        jobs: Arc<dyn DeferredJobRepository>,
        notifier: Arc<dyn NotificationDispatcher>,
        clock: Arc<dyn Clock>,
        config: StatusFlowConfig,
    ) -> Self {
        Self {
            tasks,
            leads,
            assignments,
            comments,
            jobs,
            notifier,
            clock,
            config,
        }
    }

    /// 保存新状态，状态值确实变化时派发一次状态变更事件
    #[instrument(skip(self), fields(task.id = task_id, status.to = %new_status))]
    pub async fn change_task_status(
        &self,
        task_id: i64,
        new_status: TaskStatus,
    ) -> FollowupResult<StatusChangeResult> {
        let mut task = self
            .tasks
            .find_by_id(task_id)
            .await?
            .ok_or(FollowupError::TaskNotFound { id: task_id })?;
        let old_status = task.status;

        if old_status != new_status && !old_status.can_transition_to(new_status) {
            return Err(FollowupError::InvalidTransition {
                from: old_status.to_string(),
                to: new_status.to_string(),
            });
        }

        task.status = new_status;
        let saved = self.tasks.update(&task).await?;

        if old_status == new_status {
            debug!("任务 {} 状态未变化，仅保存", task_id);
            return Ok(StatusChangeResult {
                task: saved,
                event: None,
            });
        }

        StructuredLogger::log_status_changed(saved.id, old_status.as_str(), new_status.as_str());
        let event = TaskStatusChanged::new(saved.clone(), old_status, self.clock.now());
        self.dispatch(&event).await;

        Ok(StatusChangeResult {
            task: saved,
            event: Some(event),
        })
    }

    /// 按新状态派发分支处理
    pub async fn dispatch(&self, event: &TaskStatusChanged) {
        let (handler, result) = match event.new_status {
            TaskStatus::NotInterested => (
                "not_interested",
                self.handle_not_interested(&event.task).await,
            ),
            TaskStatus::Interested => ("interested", self.handle_interested(&event.task).await),
            TaskStatus::CallNotConnected => (
                "call_not_connected",
                self.handle_call_not_connected(&event.task).await,
            ),
            _ => return,
        };

        if let Err(e) = result {
            StructuredLogger::log_handler_failure(event.task.id, handler, &e);
        }
    }

    async fn load_lead(&self, task: &Task) -> FollowupResult<Option<Lead>> {
        let Some(lead_id) = task.lead_id else {
            debug!("任务 {} 未关联线索，跳过分支处理", task.id);
            return Ok(None);
        };
        self.leads
            .find_by_id(lead_id)
            .await?
            .map(Some)
            .ok_or(FollowupError::LeadNotFound { id: lead_id })
    }

    #[instrument(skip(self, task), fields(task.id = task.id, lead.id = ?task.lead_id))]
    pub async fn handle_not_interested(&self, task: &Task) -> FollowupResult<()> {
        let Some(lead) = self.load_lead(task).await? else {
            return Ok(());
        };
        let now = self.clock.now();
        let email_at = now + Duration::days(self.config.not_interested_email_days);
        let followup_days = self.config.not_interested_followup_days;

        self.send_lead_email(
            &lead,
            templates::REENGAGEMENT_SUBJECT,
            templates::reengagement_email(&lead),
            Some(email_at),
        )
        .await;

        let followup = self
            .schedule_followup_task(
                task,
                &lead,
                "Re-engage Not Interested Lead",
                followup_days,
                format!(
                    "Follow-up with lead who was 'Not Interested' {followup_days} days ago. Previous task: {}",
                    task.id
                ),
            )
            .await?;

        self.leads
            .update_status(lead.id, LeadStatus::NotInterested)
            .await?;
        self.comments
            .append(
                lead.id,
                &format!(
                    "Lead marked as 'Not Interested'. Email scheduled for {}, Follow-up task scheduled for {}",
                    email_at.date_naive(),
                    followup.due_date
                ),
                now,
            )
            .await?;

        info!(
            task.id = task.id,
            lead.id = lead.id,
            followup.task_id = followup.id,
            "Not Interested workflow triggered"
        );
        Ok(())
    }

    #[instrument(skip(self, task), fields(task.id = task.id, lead.id = ?task.lead_id))]
    pub async fn handle_interested(&self, task: &Task) -> FollowupResult<()> {
        let Some(lead) = self.load_lead(task).await? else {
            return Ok(());
        };
        let followup_days = self.config.interested_followup_days;

        self.send_lead_email(
            &lead,
            templates::INTERESTED_SUBJECT,
            templates::interested_email(&lead, followup_days),
            None,
        )
        .await;

        let followup = self
            .schedule_followup_task(
                task,
                &lead,
                "Follow-up with Interested Lead",
                followup_days,
                format!("Follow-up with interested lead. Previous task: {}", task.id),
            )
            .await?;

        self.leads
            .update_status(lead.id, LeadStatus::Interested)
            .await?;
        self.comments
            .append(
                lead.id,
                &format!(
                    "Lead marked as 'Interested'. Welcome email sent, Follow-up task scheduled for {}",
                    followup.due_date
                ),
                self.clock.now(),
            )
            .await?;

        info!(
            task.id = task.id,
            lead.id = lead.id,
            followup.task_id = followup.id,
            "Interested workflow triggered"
        );
        Ok(())
    }

    /// 按任务到期日入队重试检查作业
    #[instrument(skip(self, task), fields(task.id = task.id, lead.id = ?task.lead_id))]
    pub async fn handle_call_not_connected(&self, task: &Task) -> FollowupResult<()> {
        let Some(lead_id) = task.lead_id else {
            return Ok(());
        };
        let job = NewDeferredJob::retry_check(task, lead_id, start_of_day(task.due_date));
        let armed = self.jobs.enqueue(&job).await?;
        debug!(job.key = %job.dedupe_key, armed = armed, "重试检查作业已入队");
        Ok(())
    }

    /// 邮件失败只记录日志，不影响后续的跟进任务
    async fn send_lead_email(
        &self,
        lead: &Lead,
        subject: &str,
        html_body: String,
        send_after: Option<chrono::DateTime<chrono::Utc>>,
    ) {
        let Some(email) = lead.email.as_deref().filter(|e| !e.trim().is_empty()) else {
            warn!(lead.id = lead.id, "线索没有邮箱，跳过邮件: {}", subject);
            return;
        };

        let message = EmailMessage {
            recipients: vec![email.to_string()],
            subject: subject.to_string(),
            html_body,
            reference: Some(RecordRef::lead(lead.id)),
            send_after,
        };
        if let Err(e) = self.notifier.send_email(&message).await {
            warn!(lead.id = lead.id, error = %e, "邮件发送失败: {}", subject);
        }
    }

    async fn schedule_followup_task(
        &self,
        task: &Task,
        lead: &Lead,
        title: &str,
        days_after: i64,
        description: String,
    ) -> FollowupResult<Task> {
        let date: NaiveDate = self.clock.days_from_today(days_after);
        let mut followup = NewTask::new(title, date, date);
        followup.description = description;
        followup.assigned_to = task.assignee().map(str::to_string);
        followup.status = TaskStatus::Todo;
        followup.priority = TaskPriority::High;
        followup.lead_id = Some(lead.id);
        followup.previous_task_id = Some(task.id);

        let created = self.tasks.create(&followup).await?;
        if let Some(assignment) = NewAssignment::for_task(
            &created,
            format!("Follow-up task assigned: {}", created.title),
        ) {
            self.assignments.create(&assignment).await?;
        }

        debug!(
            task.id = created.id,
            task.due_date = %created.due_date,
            "跟进任务已创建"
        );
        Ok(created)
    }
}
