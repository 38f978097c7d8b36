//! Structured logging utilities
//!
//! Every follow-up domain event is logged with an `event` field so logs can
//! be filtered by event type.

use chrono::{DateTime, NaiveDate, Utc};
use followup_domain::value_objects::{CallbackSweepReport, JobRunReport, SweepReport};
use tracing::{debug, error, info, warn};

pub struct StructuredLogger;

impl StructuredLogger {
    pub fn log_lead_created(lead_id: i64, first_task_id: i64, owner: Option<&str>) {
        info!(
            event = "lead_created",
            lead.id = lead_id,
            task.id = first_task_id,
            lead.owner = owner.unwrap_or(""),
            "Lead created with first contact task"
        );
    }

    pub fn log_retry_created(
        parent_task_id: i64,
        retry_task_id: i64,
        lead_id: i64,
        attempt: i32,
        due_date: NaiveDate,
    ) {
        info!(
            event = "retry_created",
            task.id = parent_task_id,
            retry.task_id = retry_task_id,
            lead.id = lead_id,
            attempt = attempt,
            task.due_date = %due_date,
            "Retry task created"
        );
    }

    pub fn log_lead_escalated(task_id: i64, lead_id: i64, max_attempts: i32) {
        warn!(
            event = "lead_escalated",
            task.id = task_id,
            lead.id = lead_id,
            max_attempts = max_attempts,
            "Lead dropped after exhausting contact attempts"
        );
    }

    pub fn log_retry_skipped(task_id: i64, reason: &str) {
        debug!(
            event = "retry_skipped",
            task.id = task_id,
            reason = reason,
            "Retry evaluation skipped"
        );
    }

    pub fn log_status_changed(task_id: i64, from: &str, to: &str) {
        info!(
            event = "task_status_changed",
            task.id = task_id,
            status.from = from,
            status.to = to,
            "Task status changed"
        );
    }

    pub fn log_handler_failure(task_id: i64, handler: &str, error: &dyn std::fmt::Display) {
        error!(
            event = "status_handler_failed",
            task.id = task_id,
            handler = handler,
            error = %error,
            "Status handler failed after status was saved"
        );
    }

    pub fn log_callback_scheduled(task_id: i64, callback_task_id: i64, callback_at: DateTime<Utc>) {
        info!(
            event = "callback_scheduled",
            task.id = task_id,
            callback.task_id = callback_task_id,
            callback.at = %callback_at,
            "Callback scheduled"
        );
    }

    pub fn log_callback_reminder_sent(task_id: i64, assignee: &str, email_sent: bool) {
        info!(
            event = "callback_reminder_sent",
            task.id = task_id,
            assignee = assignee,
            email_sent = email_sent,
            "Callback reminder dispatched"
        );
    }

    pub fn log_sweep_item_failed(operation: &str, task_id: i64, error: &dyn std::fmt::Display) {
        error!(
            event = "sweep_item_failed",
            operation = operation,
            task.id = task_id,
            error = %error,
            "Sweep item failed, continuing with next task"
        );
    }

    pub fn log_retry_sweep_completed(report: &SweepReport, duration_ms: u64) {
        info!(
            event = "retry_sweep_completed",
            scanned = report.scanned,
            retried = report.retried,
            escalated = report.escalated,
            skipped = report.skipped,
            failed = report.failed,
            duration_ms = duration_ms,
            "Daily retry sweep completed"
        );
    }

    pub fn log_callback_sweep_completed(report: &CallbackSweepReport) {
        info!(
            event = "callback_sweep_completed",
            scanned = report.scanned,
            notified = report.notified,
            already_claimed = report.already_claimed,
            failed = report.failed,
            "Callback notification sweep completed"
        );
    }

    pub fn log_jobs_processed(report: &JobRunReport) {
        if report.claimed > 0 {
            info!(
                event = "deferred_jobs_processed",
                claimed = report.claimed,
                completed = report.completed,
                failed = report.failed,
                "Deferred jobs processed"
            );
        }
    }

    pub fn log_email_sent(email_id: i64, transport: &str, recipients: usize) {
        info!(
            event = "email_sent",
            email.id = email_id,
            transport = transport,
            recipients = recipients,
            "Outbox email delivered"
        );
    }

    pub fn log_email_failed(email_id: i64, transport: &str, error: &dyn std::fmt::Display) {
        warn!(
            event = "email_failed",
            email.id = email_id,
            transport = transport,
            error = %error,
            "Outbox email delivery failed"
        );
    }
}
