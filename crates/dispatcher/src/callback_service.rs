//! 回调任务与回调前提醒

use std::sync::Arc;

use chrono::{DateTime, Utc};
use followup_config::CallbackConfig;
use followup_domain::{
    entities::{EmailMessage, NewAlert, NewTask, RecordRef, Task, TaskPriority, TaskStatus},
    ports::{Clock, NotificationDispatcher},
    repositories::{FollowupUnitOfWork, LeadRepository, TaskRepository, UserDirectory},
    value_objects::{CallbackSweepReport, ReminderWindow},
};
use followup_errors::{FollowupError, FollowupResult};
use followup_infrastructure::observability::{FollowupMetrics, StructuredLogger};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use crate::templates;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduledCallback {
    pub task_id: i64,
    pub callback_at: DateTime<Utc>,
}

pub struct CallbackService {
    tasks: Arc<dyn TaskRepository>,
    leads: Arc<dyn LeadRepository>,
    unit_of_work: Arc<dyn FollowupUnitOfWork>,
    users: Arc<dyn UserDirectory>,
    notifier: Arc<dyn NotificationDispatcher>,
    clock: Arc<dyn Clock>,
    window: ReminderWindow,
}

impl CallbackService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        tasks: Arc<dyn TaskRepository>,
        leads: Arc<dyn LeadRepository>,
        unit_of_work: Arc<dyn FollowupUnitOfWork>,
        users: Arc<dyn UserDirectory>,
        notifier: Arc<dyn NotificationDispatcher>,
        clock: Arc<dyn Clock>,
        config: &CallbackConfig,
    ) -> Self {
        Self {
            tasks,
            leads,
            unit_of_work,
            users,
            notifier,
            clock,
            window: ReminderWindow::from_minutes(
                config.reminder_lead_minutes,
                config.reminder_window_minutes,
            ),
        }
    }

    pub fn window(&self) -> ReminderWindow {
        self.window
    }

    /// 为原任务安排回调：在一个事务内记录原任务的回调请求并创建高优先级回调任务。
    /// 提醒扫描只会命中新建的回调任务
    #[instrument(skip(self, notes), fields(task.id = task_id, callback.at = %callback_at))]
    pub async fn schedule_callback(
        &self,
        task_id: i64,
        callback_at: DateTime<Utc>,
        notes: Option<&str>,
    ) -> FollowupResult<ScheduledCallback> {
        let original = self
            .tasks
            .find_by_id(task_id)
            .await?
            .ok_or(FollowupError::TaskNotFound { id: task_id })?;

        let callback_date = callback_at.date_naive();
        let notes = notes
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .unwrap_or("No additional notes");

        let mut callback = NewTask::new(
            format!("Scheduled Callback - {}", original.title),
            callback_date,
            callback_date,
        );
        callback.description = format!(
            "Scheduled callback task.\n\nOriginal task: {}\n\nNotes: {}",
            original.id, notes
        );
        callback.assigned_to = original.assignee().map(str::to_string);
        callback.status = TaskStatus::Todo;
        callback.priority = TaskPriority::High;
        callback.lead_id = original.lead_id;
        callback.previous_task_id = Some(original.id);
        callback.callback_at = Some(callback_at);

        let time = templates::format_callback_time(callback_at);
        let comment = |created: &Task| format!("Callback scheduled for {time}. Task: {}", created.id);
        let created = self
            .unit_of_work
            .commit_callback(
                &original,
                &callback,
                &format!("Scheduled callback at {time}"),
                &comment,
                self.clock.now(),
            )
            .await?;

        StructuredLogger::log_callback_scheduled(original.id, created.id, callback_at);
        Ok(ScheduledCallback {
            task_id: created.id,
            callback_at,
        })
    }

    /// 扫描提醒窗口内的回调，先认领标志再发送提醒
    #[instrument(skip(self))]
    pub async fn notify_upcoming_callbacks(&self) -> FollowupResult<CallbackSweepReport> {
        let now = self.clock.now();
        let (from, to) = self.window.bounds(now);
        let upcoming = self.tasks.find_upcoming_callbacks(from, to).await?;
        debug!("提醒窗口 [{}, {}) 内有 {} 个回调", from, to, upcoming.len());

        let mut report = CallbackSweepReport {
            scanned: upcoming.len(),
            ..CallbackSweepReport::default()
        };

        for task in &upcoming {
            match self.tasks.mark_callback_notified(task.id).await {
                Ok(true) => {}
                Ok(false) => {
                    report.already_claimed += 1;
                    continue;
                }
                Err(e) => {
                    report.failed += 1;
                    FollowupMetrics::record_sweep_failure("callback_sweep");
                    StructuredLogger::log_sweep_item_failed("claim_callback", task.id, &e);
                    continue;
                }
            }

            match self.send_reminder(task).await {
                Ok(()) => {
                    report.notified += 1;
                    FollowupMetrics::record_callback_reminder();
                }
                Err(e) => {
                    report.failed += 1;
                    FollowupMetrics::record_sweep_failure("callback_sweep");
                    StructuredLogger::log_sweep_item_failed("send_callback_reminder", task.id, &e);
                }
            }
        }

        StructuredLogger::log_callback_sweep_completed(&report);
        Ok(report)
    }

    async fn lead_label(&self, task: &Task) -> String {
        match task.lead_id {
            Some(lead_id) => match self.leads.find_by_id(lead_id).await {
                Ok(Some(lead)) => lead.name,
                _ => lead_id.to_string(),
            },
            None => "N/A".to_string(),
        }
    }

    /// 负责人邮箱：先查用户目录，用户 ID 本身是邮箱时直接使用
    async fn resolve_email(&self, assignee: &str) -> FollowupResult<Option<String>> {
        if let Some(email) = self.users.email_for(assignee).await? {
            return Ok(Some(email));
        }
        Ok(assignee.contains('@').then(|| assignee.to_string()))
    }

    async fn send_reminder(&self, task: &Task) -> FollowupResult<()> {
        let Some(assignee) = task.assignee() else {
            warn!(task.id = task.id, "回调任务没有负责人，跳过提醒");
            return Ok(());
        };
        let Some(callback_at) = task.callback_at else {
            return Ok(());
        };

        let time = templates::format_callback_time(callback_at);
        let lead = self.lead_label(task).await;

        self.notifier
            .create_alert(&NewAlert {
                for_user: assignee.to_string(),
                subject: templates::callback_alert_subject(&task.title),
                body: templates::callback_alert_body(&time, &task.title, &lead),
                reference: Some(RecordRef::task(task.id)),
            })
            .await?;

        let email = self.resolve_email(assignee).await?;
        if let Some(address) = &email {
            self.notifier
                .send_email(&EmailMessage {
                    recipients: vec![address.clone()],
                    subject: templates::callback_email_subject(&task.title),
                    html_body: templates::callback_email_body(&time, &task.title, &lead),
                    reference: Some(RecordRef::task(task.id)),
                    send_after: None,
                })
                .await?;
        }

        StructuredLogger::log_callback_reminder_sent(task.id, assignee, email.is_some());
        Ok(())
    }
}
