//! 行映射工具
//!
//! 时间戳统一以定宽 UTC 文本存储，保证 SQLite 中的字符串比较与时间顺序一致。

use chrono::{DateTime, Utc};
use followup_domain::entities::{
    Alert, Assignment, DeferredJob, Lead, LeadComment, RecordRef, ScheduledEmail, Task,
    UserProfile,
};
use followup_errors::{FollowupError, FollowupResult};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

pub struct MappingHelpers;

impl MappingHelpers {
    pub fn timestamp(at: DateTime<Utc>) -> String {
        at.format("%Y-%m-%dT%H:%M:%S%.6fZ").to_string()
    }

    pub fn optional_timestamp(at: Option<DateTime<Utc>>) -> Option<String> {
        at.map(Self::timestamp)
    }

    pub fn parse_recipients(row: &SqliteRow, field_name: &str) -> FollowupResult<Vec<String>> {
        let json_str: String = row.try_get(field_name)?;
        serde_json::from_str(&json_str)
            .map_err(|e| FollowupError::Serialization(format!("解析收件人失败: {e}")))
    }

    pub fn encode_recipients(recipients: &[String]) -> FollowupResult<String> {
        Ok(serde_json::to_string(recipients)?)
    }

    pub fn parse_reference(row: &SqliteRow) -> FollowupResult<Option<RecordRef>> {
        let doctype: Option<String> = row.try_get("reference_type")?;
        let id: Option<i64> = row.try_get("reference_id")?;
        Ok(match (doctype, id) {
            (Some(doctype), Some(id)) => Some(RecordRef { doctype, id }),
            _ => None,
        })
    }

    pub fn split_reference(reference: Option<&RecordRef>) -> (Option<String>, Option<i64>) {
        match reference {
            Some(r) => (Some(r.doctype.clone()), Some(r.id)),
            None => (None, None),
        }
    }
}

pub fn row_to_lead(row: &SqliteRow) -> FollowupResult<Lead> {
    Ok(Lead {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        first_name: row.try_get("first_name")?,
        email: row.try_get("email")?,
        owner: row.try_get("owner")?,
        status: row.try_get("status")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

pub fn row_to_task(row: &SqliteRow) -> FollowupResult<Task> {
    Ok(Task {
        id: row.try_get("id")?,
        title: row.try_get("title")?,
        description: row.try_get("description")?,
        assigned_to: row.try_get("assigned_to")?,
        status: row.try_get("status")?,
        priority: row.try_get("priority")?,
        start_date: row.try_get("start_date")?,
        due_date: row.try_get("due_date")?,
        attempt_number: row.try_get("attempt_number")?,
        max_attempts: row.try_get("max_attempts")?,
        retry_interval_days: row.try_get("retry_interval_days")?,
        lead_id: row.try_get("lead_id")?,
        previous_task_id: row.try_get("previous_task_id")?,
        retry_created: row.try_get("retry_created")?,
        callback_at: row.try_get("callback_at")?,
        callback_notification_sent: row.try_get("callback_notification_sent")?,
        requested_callback_at: row.try_get("requested_callback_at")?,
        version: row.try_get("version")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

pub fn row_to_assignment(row: &SqliteRow) -> FollowupResult<Assignment> {
    Ok(Assignment {
        id: row.try_get("id")?,
        task_id: row.try_get("task_id")?,
        allocated_to: row.try_get("allocated_to")?,
        description: row.try_get("description")?,
        priority: row.try_get("priority")?,
        status: row.try_get("status")?,
        date: row.try_get("date")?,
    })
}

pub fn row_to_comment(row: &SqliteRow) -> FollowupResult<LeadComment> {
    Ok(LeadComment {
        id: row.try_get("id")?,
        lead_id: row.try_get("lead_id")?,
        body: row.try_get("body")?,
        created_at: row.try_get("created_at")?,
    })
}

pub fn row_to_job(row: &SqliteRow) -> FollowupResult<DeferredJob> {
    Ok(DeferredJob {
        id: row.try_get("id")?,
        kind: row.try_get("kind")?,
        task_id: row.try_get("task_id")?,
        dedupe_key: row.try_get("dedupe_key")?,
        run_after: row.try_get("run_after")?,
        status: row.try_get("status")?,
        attempts: row.try_get("attempts")?,
        last_error: row.try_get("last_error")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

pub fn row_to_email(row: &SqliteRow) -> FollowupResult<ScheduledEmail> {
    Ok(ScheduledEmail {
        id: row.try_get("id")?,
        recipients: MappingHelpers::parse_recipients(row, "recipients")?,
        subject: row.try_get("subject")?,
        html_body: row.try_get("html_body")?,
        reference: MappingHelpers::parse_reference(row)?,
        send_after: row.try_get("send_after")?,
        status: row.try_get("status")?,
        sent_at: row.try_get("sent_at")?,
        error: row.try_get("error")?,
        created_at: row.try_get("created_at")?,
    })
}

pub fn row_to_alert(row: &SqliteRow) -> FollowupResult<Alert> {
    Ok(Alert {
        id: row.try_get("id")?,
        for_user: row.try_get("for_user")?,
        subject: row.try_get("subject")?,
        body: row.try_get("body")?,
        reference: MappingHelpers::parse_reference(row)?,
        created_at: row.try_get("created_at")?,
        read: row.try_get("read")?,
    })
}

pub fn row_to_user(row: &SqliteRow) -> FollowupResult<UserProfile> {
    Ok(UserProfile {
        id: row.try_get("id")?,
        full_name: row.try_get("full_name")?,
        email: row.try_get("email")?,
    })
}
