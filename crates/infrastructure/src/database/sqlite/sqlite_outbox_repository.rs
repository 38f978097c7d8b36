use async_trait::async_trait;
use chrono::{DateTime, Utc};
use followup_domain::{
    entities::{Alert, EmailMessage, EmailStatus, NewAlert, ScheduledEmail},
    repositories::{AlertRepository, EmailOutboxRepository},
};
use followup_errors::{FollowupError, FollowupResult};
use sqlx::SqlitePool;
use tracing::instrument;

use crate::{
    database::mapping::{row_to_alert, row_to_email, MappingHelpers},
    error_handling::{EntityKind, RepositoryErrorHelpers, RepositoryOperation},
    repo_context,
};

/// 邮件发件箱与站内提醒表
pub struct SqliteOutboxRepository {
    pool: SqlitePool,
}

impl SqliteOutboxRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn set_status(
        &self,
        id: i64,
        status: EmailStatus,
        sent_at: Option<DateTime<Utc>>,
        error: Option<&str>,
    ) -> FollowupResult<()> {
        let context =
            repo_context!(RepositoryOperation::Update, EntityKind::ScheduledEmail, id = id);
        let result = sqlx::query(
            "UPDATE scheduled_emails SET status = ?, sent_at = ?, error = ? WHERE id = ?",
        )
        .bind(status)
        .bind(MappingHelpers::optional_timestamp(sent_at))
        .bind(error)
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(|e| RepositoryErrorHelpers::database_error(&context, e))?;

        if result.rows_affected() == 0 {
            return Err(FollowupError::Internal(format!("待发邮件 {id} 不存在")));
        }
        Ok(())
    }
}

#[async_trait]
impl EmailOutboxRepository for SqliteOutboxRepository {
    #[instrument(skip(self, email), fields(email.subject = %email.subject))]
    async fn insert(
        &self,
        email: &EmailMessage,
        send_after: DateTime<Utc>,
    ) -> FollowupResult<ScheduledEmail> {
        let context = repo_context!(RepositoryOperation::Create, EntityKind::ScheduledEmail)
            .with_additional_info(email.subject.clone());
        let recipients = MappingHelpers::encode_recipients(&email.recipients)
            .map_err(|e| RepositoryErrorHelpers::serialization_error(&context, e))?;
        let (reference_type, reference_id) =
            MappingHelpers::split_reference(email.reference.as_ref());

        let row = sqlx::query(
            r#"
            INSERT INTO scheduled_emails (
                recipients, subject, html_body, reference_type, reference_id,
                send_after, status, created_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            RETURNING *
            "#,
        )
        .bind(recipients)
        .bind(&email.subject)
        .bind(&email.html_body)
        .bind(reference_type)
        .bind(reference_id)
        .bind(MappingHelpers::timestamp(send_after))
        .bind(EmailStatus::NotSent)
        .bind(MappingHelpers::timestamp(Utc::now()))
        .fetch_one(&self.pool)
        .await
        .map_err(|e| RepositoryErrorHelpers::database_error(&context, e))?;

        row_to_email(&row)
    }

    async fn find_due(&self, now: DateTime<Utc>, limit: usize) -> FollowupResult<Vec<ScheduledEmail>> {
        let context = repo_context!(RepositoryOperation::Query, EntityKind::ScheduledEmail);
        let rows = sqlx::query(
            r#"
            SELECT * FROM scheduled_emails
            WHERE status = ? AND send_after <= ?
            ORDER BY send_after, id
            LIMIT ?
            "#,
        )
        .bind(EmailStatus::NotSent)
        .bind(MappingHelpers::timestamp(now))
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| RepositoryErrorHelpers::database_error(&context, e))?;

        rows.iter().map(row_to_email).collect()
    }

    async fn mark_sent(&self, id: i64, at: DateTime<Utc>) -> FollowupResult<()> {
        self.set_status(id, EmailStatus::Sent, Some(at), None).await
    }

    async fn mark_error(&self, id: i64, error: &str) -> FollowupResult<()> {
        self.set_status(id, EmailStatus::Error, None, Some(error))
            .await
    }
}

#[async_trait]
impl AlertRepository for SqliteOutboxRepository {
    #[instrument(skip(self, alert), fields(alert.for_user = %alert.for_user))]
    async fn create(&self, alert: &NewAlert, at: DateTime<Utc>) -> FollowupResult<Alert> {
        let context = repo_context!(RepositoryOperation::Create, EntityKind::Alert)
            .with_additional_info(alert.subject.clone());
        let (reference_type, reference_id) =
            MappingHelpers::split_reference(alert.reference.as_ref());

        let row = sqlx::query(
            r#"
            INSERT INTO alerts (for_user, subject, body, reference_type, reference_id, created_at, read)
            VALUES (?, ?, ?, ?, ?, ?, 0)
            RETURNING *
            "#,
        )
        .bind(&alert.for_user)
        .bind(&alert.subject)
        .bind(&alert.body)
        .bind(reference_type)
        .bind(reference_id)
        .bind(MappingHelpers::timestamp(at))
        .fetch_one(&self.pool)
        .await
        .map_err(|e| RepositoryErrorHelpers::database_error(&context, e))?;

        row_to_alert(&row)
    }

    async fn find_for_user(&self, user: &str) -> FollowupResult<Vec<Alert>> {
        let context = repo_context!(RepositoryOperation::Query, EntityKind::Alert)
            .with_additional_info(user.to_string());
        let rows = sqlx::query("SELECT * FROM alerts WHERE for_user = ? ORDER BY id")
            .bind(user)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| RepositoryErrorHelpers::database_error(&context, e))?;

        rows.iter().map(row_to_alert).collect()
    }
}
