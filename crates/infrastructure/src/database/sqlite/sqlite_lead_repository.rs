use async_trait::async_trait;
use chrono::{DateTime, Utc};
use followup_domain::{
    entities::{Lead, LeadComment, LeadStatus, NewLead},
    repositories::{LeadCommentRepository, LeadRepository},
};
use followup_errors::{FollowupError, FollowupResult};
use sqlx::SqlitePool;
use tracing::{debug, instrument};

use crate::{
    database::mapping::{row_to_comment, row_to_lead, MappingHelpers},
    error_handling::{EntityKind, RepositoryErrorHelpers, RepositoryOperation},
    repo_context,
};

pub struct SqliteLeadRepository {
    pool: SqlitePool,
}

impl SqliteLeadRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl LeadRepository for SqliteLeadRepository {
    #[instrument(skip(self, lead), fields(lead.name = %lead.name))]
    async fn create(&self, lead: &NewLead) -> FollowupResult<Lead> {
        let context = repo_context!(RepositoryOperation::Create, EntityKind::Lead)
            .with_additional_info(format!("名称: {}", lead.name));
        let now = MappingHelpers::timestamp(Utc::now());

        let row = sqlx::query(
            r#"
            INSERT INTO leads (name, first_name, email, owner, status, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            RETURNING *
            "#,
        )
        .bind(&lead.name)
        .bind(&lead.first_name)
        .bind(&lead.email)
        .bind(&lead.owner)
        .bind(LeadStatus::New)
        .bind(&now)
        .bind(&now)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| RepositoryErrorHelpers::database_error(&context, e))?;

        let created = row_to_lead(&row)?;
        RepositoryErrorHelpers::log_operation_success(&context.with_id(created.id), None);
        Ok(created)
    }

    #[instrument(skip(self), fields(lead.id = id))]
    async fn find_by_id(&self, id: i64) -> FollowupResult<Option<Lead>> {
        let context = repo_context!(RepositoryOperation::Read, EntityKind::Lead, id = id);
        let row = sqlx::query("SELECT * FROM leads WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| RepositoryErrorHelpers::database_error(&context, e))?;

        row.as_ref().map(row_to_lead).transpose()
    }

    #[instrument(skip(self), fields(lead.id = id, lead.status = %status))]
    async fn update_status(&self, id: i64, status: LeadStatus) -> FollowupResult<()> {
        let context = repo_context!(RepositoryOperation::Update, EntityKind::Lead, id = id);
        let result = sqlx::query("UPDATE leads SET status = ?, updated_at = ? WHERE id = ?")
            .bind(status)
            .bind(MappingHelpers::timestamp(Utc::now()))
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| RepositoryErrorHelpers::database_error(&context, e))?;

        if result.rows_affected() == 0 {
            return Err(FollowupError::lead_not_found(id));
        }
        debug!("线索 {} 状态已更新为 {}", id, status);
        Ok(())
    }
}

pub struct SqliteLeadCommentRepository {
    pool: SqlitePool,
}

impl SqliteLeadCommentRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl LeadCommentRepository for SqliteLeadCommentRepository {
    #[instrument(skip(self, body), fields(lead.id = lead_id))]
    async fn append(
        &self,
        lead_id: i64,
        body: &str,
        at: DateTime<Utc>,
    ) -> FollowupResult<LeadComment> {
        let context = repo_context!(RepositoryOperation::Create, EntityKind::LeadComment)
            .with_additional_info(format!("线索: {lead_id}"));
        let row = sqlx::query(
            "INSERT INTO lead_comments (lead_id, body, created_at) VALUES (?, ?, ?) RETURNING *",
        )
        .bind(lead_id)
        .bind(body)
        .bind(MappingHelpers::timestamp(at))
        .fetch_one(&self.pool)
        .await
        .map_err(|e| RepositoryErrorHelpers::database_error(&context, e))?;

        row_to_comment(&row)
    }

    async fn find_by_lead(&self, lead_id: i64) -> FollowupResult<Vec<LeadComment>> {
        let context = repo_context!(RepositoryOperation::Query, EntityKind::LeadComment)
            .with_additional_info(format!("线索: {lead_id}"));
        let rows = sqlx::query("SELECT * FROM lead_comments WHERE lead_id = ? ORDER BY id")
            .bind(lead_id)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| RepositoryErrorHelpers::database_error(&context, e))?;

        rows.iter().map(row_to_comment).collect()
    }
}
