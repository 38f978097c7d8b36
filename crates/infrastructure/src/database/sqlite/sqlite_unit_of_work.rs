//! 重试、升级与回调安排的事务提交
//!
//! 父任务的 `retry_created` 置位带版本条件，0 行受影响即回滚并返回 `GuardLost`。

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use followup_domain::{
    entities::{LeadStatus, NewAssignment, NewTask, Task},
    repositories::{CallbackCommentFn, FollowupUnitOfWork},
    value_objects::CommitOutcome,
};
use followup_errors::{FollowupError, FollowupResult};
use sqlx::{Sqlite, SqlitePool, Transaction};
use tracing::{debug, instrument};

use super::sqlite_task_repository::{bind_new_assignment, bind_new_task};
use crate::{
    database::mapping::{row_to_task, MappingHelpers},
    error_handling::{EntityKind, RepositoryErrorHelpers, RepositoryOperation},
    repo_context,
};

pub struct SqliteUnitOfWork {
    pool: SqlitePool,
}

impl SqliteUnitOfWork {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// 条件置位父任务的 `retry_created`，返回是否成功
    async fn claim_retry_guard(
        tx: &mut Transaction<'_, Sqlite>,
        task: &Task,
        at: &str,
    ) -> FollowupResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE tasks
            SET retry_created = 1, version = version + 1, updated_at = ?
            WHERE id = ? AND version = ? AND retry_created = 0
            "#,
        )
        .bind(at)
        .bind(task.id)
        .bind(task.version)
        .execute(&mut **tx)
        .await?;

        Ok(result.rows_affected() == 1)
    }
}

#[async_trait]
impl FollowupUnitOfWork for SqliteUnitOfWork {
    #[instrument(skip(self, parent, retry, assignment_description), fields(
        task.id = parent.id,
        task.version = parent.version,
        attempt = retry.attempt_number,
    ))]
    async fn commit_retry(
        &self,
        parent: &Task,
        retry: &NewTask,
        assignment_description: &str,
    ) -> FollowupResult<CommitOutcome<Task>> {
        let context = repo_context!(RepositoryOperation::Commit, EntityKind::Task, id = parent.id)
            .with_additional_info("创建重试任务");
        let now = MappingHelpers::timestamp(Utc::now());

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| RepositoryErrorHelpers::database_error(&context, e))?;

        if !Self::claim_retry_guard(&mut tx, parent, &now).await? {
            tx.rollback().await?;
            debug!("任务 {} 的重试标志已被占用或版本已变化", parent.id);
            return Ok(CommitOutcome::GuardLost);
        }

        let row = bind_new_task(retry, &now)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| RepositoryErrorHelpers::database_error(&context, e))?;
        let created = row_to_task(&row)?;

        if let Some(assignment) = NewAssignment::for_task(&created, assignment_description) {
            bind_new_assignment(&assignment)
                .execute(&mut *tx)
                .await
                .map_err(|e| RepositoryErrorHelpers::database_error(&context, e))?;
        }

        tx.commit()
            .await
            .map_err(|e| RepositoryErrorHelpers::database_error(&context, e))?;

        RepositoryErrorHelpers::log_operation_success(
            &context,
            Some(&format!("新任务 ID: {}", created.id)),
        );
        Ok(CommitOutcome::Committed(created))
    }

    #[instrument(skip(self, task, comment), fields(task.id = task.id, lead.id = lead_id))]
    async fn commit_escalation(
        &self,
        task: &Task,
        lead_id: i64,
        comment: &str,
        at: DateTime<Utc>,
    ) -> FollowupResult<CommitOutcome<()>> {
        let context = repo_context!(RepositoryOperation::Commit, EntityKind::Lead, id = lead_id)
            .with_additional_info("线索升级");
        let at = MappingHelpers::timestamp(at);

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| RepositoryErrorHelpers::database_error(&context, e))?;

        if !Self::claim_retry_guard(&mut tx, task, &at).await? {
            tx.rollback().await?;
            return Ok(CommitOutcome::GuardLost);
        }

        let updated = sqlx::query("UPDATE leads SET status = ?, updated_at = ? WHERE id = ?")
            .bind(LeadStatus::InactiveDropped)
            .bind(&at)
            .bind(lead_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| RepositoryErrorHelpers::database_error(&context, e))?;
        if updated.rows_affected() == 0 {
            tx.rollback().await?;
            return Err(FollowupError::lead_not_found(lead_id));
        }

        sqlx::query("INSERT INTO lead_comments (lead_id, body, created_at) VALUES (?, ?, ?)")
            .bind(lead_id)
            .bind(comment)
            .bind(&at)
            .execute(&mut *tx)
            .await
            .map_err(|e| RepositoryErrorHelpers::database_error(&context, e))?;

        tx.commit()
            .await
            .map_err(|e| RepositoryErrorHelpers::database_error(&context, e))?;

        RepositoryErrorHelpers::log_operation_success(&context, None);
        Ok(CommitOutcome::Committed(()))
    }

    #[instrument(skip_all, fields(task.id = original.id, task.version = original.version))]
    async fn commit_callback(
        &self,
        original: &Task,
        callback: &NewTask,
        assignment_description: &str,
        comment: CallbackCommentFn<'_>,
        at: DateTime<Utc>,
    ) -> FollowupResult<Task> {
        let context = repo_context!(RepositoryOperation::Commit, EntityKind::Task, id = original.id)
            .with_additional_info("安排回调");
        let at_text = MappingHelpers::timestamp(at);

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| RepositoryErrorHelpers::database_error(&context, e))?;

        let stamped = sqlx::query(
            r#"
            UPDATE tasks
            SET requested_callback_at = ?, version = version + 1, updated_at = ?
            WHERE id = ? AND version = ?
            "#,
        )
        .bind(MappingHelpers::optional_timestamp(callback.callback_at))
        .bind(&at_text)
        .bind(original.id)
        .bind(original.version)
        .execute(&mut *tx)
        .await
        .map_err(|e| RepositoryErrorHelpers::database_error(&context, e))?;
        if stamped.rows_affected() == 0 {
            tx.rollback().await?;
            RepositoryErrorHelpers::log_operation_warning(&context, "版本检查未通过");
            return Err(FollowupError::conflict(original.id));
        }

        let row = bind_new_task(callback, &at_text)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| RepositoryErrorHelpers::database_error(&context, e))?;
        let created = row_to_task(&row)?;

        if let Some(assignment) = NewAssignment::for_task(&created, assignment_description) {
            bind_new_assignment(&assignment)
                .execute(&mut *tx)
                .await
                .map_err(|e| RepositoryErrorHelpers::database_error(&context, e))?;
        }

        if let Some(lead_id) = original.lead_id {
            sqlx::query("INSERT INTO lead_comments (lead_id, body, created_at) VALUES (?, ?, ?)")
                .bind(lead_id)
                .bind(comment(&created))
                .bind(&at_text)
                .execute(&mut *tx)
                .await
                .map_err(|e| RepositoryErrorHelpers::database_error(&context, e))?;
        }

        tx.commit()
            .await
            .map_err(|e| RepositoryErrorHelpers::database_error(&context, e))?;

        RepositoryErrorHelpers::log_operation_success(
            &context,
            Some(&format!("回调任务 ID: {}", created.id)),
        );
        Ok(created)
    }
}
