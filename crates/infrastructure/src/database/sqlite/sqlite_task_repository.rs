use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use followup_domain::{
    entities::{
        Assignment, AssignmentStatus, NewAssignment, NewTask, Task, TaskStatus,
        DEFAULT_MAX_ATTEMPTS,
    },
    repositories::{AssignmentRepository, TaskRepository},
};
use followup_errors::{FollowupError, FollowupResult};
use sqlx::{Sqlite, SqlitePool};
use tracing::{debug, instrument};

use crate::{
    database::mapping::{row_to_assignment, row_to_task, MappingHelpers},
    error_handling::{EntityKind, RepositoryErrorHelpers, RepositoryOperation},
    repo_context,
};

pub(crate) const INSERT_TASK_SQL: &str = r#"
    INSERT INTO tasks (
        title, description, assigned_to, status, priority, start_date, due_date,
        attempt_number, max_attempts, retry_interval_days, lead_id, previous_task_id,
        retry_created, callback_at, callback_notification_sent, version, created_at, updated_at
    )
    VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 0, ?, 0, 1, ?, ?)
    RETURNING *
"#;

pub(crate) const INSERT_ASSIGNMENT_SQL: &str = r#"
    INSERT INTO assignments (task_id, allocated_to, description, priority, status, date)
    VALUES (?, ?, ?, ?, ?, ?)
    RETURNING *
"#;

/// 绑定插入任务所需的全部参数
pub(crate) fn bind_new_task<'q>(
    task: &'q NewTask,
    now: &'q str,
) -> sqlx::query::Query<'q, Sqlite, sqlx::sqlite::SqliteArguments<'q>> {
    sqlx::query(INSERT_TASK_SQL)
        .bind(&task.title)
        .bind(&task.description)
        .bind(&task.assigned_to)
        .bind(task.status)
        .bind(task.priority)
        .bind(task.start_date)
        .bind(task.due_date)
        .bind(task.attempt_number)
        .bind(task.max_attempts)
        .bind(task.retry_interval_days)
        .bind(task.lead_id)
        .bind(task.previous_task_id)
        .bind(MappingHelpers::optional_timestamp(task.callback_at))
        .bind(now)
        .bind(now)
}

pub(crate) fn bind_new_assignment(
    assignment: &NewAssignment,
) -> sqlx::query::Query<'_, Sqlite, sqlx::sqlite::SqliteArguments<'_>> {
    sqlx::query(INSERT_ASSIGNMENT_SQL)
        .bind(assignment.task_id)
        .bind(&assignment.allocated_to)
        .bind(&assignment.description)
        .bind(assignment.priority)
        .bind(AssignmentStatus::Open)
        .bind(assignment.date)
}

pub struct SqliteTaskRepository {
    pool: SqlitePool,
}

impl SqliteTaskRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn exists(&self, id: i64) -> FollowupResult<bool> {
        let found: Option<i64> = sqlx::query_scalar("SELECT id FROM tasks WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(found.is_some())
    }
}

#[async_trait]
impl TaskRepository for SqliteTaskRepository {
    #[instrument(skip(self, task), fields(task.title = %task.title, lead.id = ?task.lead_id))]
    async fn create(&self, task: &NewTask) -> FollowupResult<Task> {
        let context = repo_context!(RepositoryOperation::Create, EntityKind::Task)
            .with_additional_info(format!("标题: {}", task.title));
        let now = MappingHelpers::timestamp(Utc::now());

        let row = bind_new_task(task, &now)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| RepositoryErrorHelpers::database_error(&context, e))?;

        let created = row_to_task(&row)?;
        RepositoryErrorHelpers::log_operation_success(&context.with_id(created.id), None);
        Ok(created)
    }

    #[instrument(skip(self), fields(task.id = id))]
    async fn find_by_id(&self, id: i64) -> FollowupResult<Option<Task>> {
        let context = repo_context!(RepositoryOperation::Read, EntityKind::Task, id = id);
        let row = sqlx::query("SELECT * FROM tasks WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| RepositoryErrorHelpers::database_error(&context, e))?;

        row.as_ref().map(row_to_task).transpose()
    }

    #[instrument(skip(self, task), fields(task.id = task.id, task.version = task.version))]
    async fn update(&self, task: &Task) -> FollowupResult<Task> {
        let context = repo_context!(RepositoryOperation::Update, EntityKind::Task, id = task.id);

        let row = sqlx::query(
            r#"
            UPDATE tasks
            SET title = ?, description = ?, assigned_to = ?, status = ?, priority = ?,
                start_date = ?, due_date = ?, attempt_number = ?, max_attempts = ?,
                retry_interval_days = ?, lead_id = ?, previous_task_id = ?,
                retry_created = MAX(retry_created, ?),
                callback_at = ?,
                callback_notification_sent = MAX(callback_notification_sent, ?),
                requested_callback_at = ?,
                version = version + 1, updated_at = ?
            WHERE id = ? AND version = ?
            RETURNING *
            "#,
        )
        .bind(&task.title)
        .bind(&task.description)
        .bind(&task.assigned_to)
        .bind(task.status)
        .bind(task.priority)
        .bind(task.start_date)
        .bind(task.due_date)
        .bind(task.attempt_number)
        .bind(task.max_attempts)
        .bind(task.retry_interval_days)
        .bind(task.lead_id)
        .bind(task.previous_task_id)
        .bind(task.retry_created)
        .bind(MappingHelpers::optional_timestamp(task.callback_at))
        .bind(task.callback_notification_sent)
        .bind(MappingHelpers::optional_timestamp(task.requested_callback_at))
        .bind(MappingHelpers::timestamp(Utc::now()))
        .bind(task.id)
        .bind(task.version)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| RepositoryErrorHelpers::database_error(&context, e))?;

        match row {
            Some(row) => row_to_task(&row),
            None if self.exists(task.id).await? => {
                RepositoryErrorHelpers::log_operation_warning(&context, "版本检查未通过");
                Err(FollowupError::conflict(task.id))
            }
            None => Err(FollowupError::task_not_found(task.id)),
        }
    }

    async fn find_by_lead(&self, lead_id: i64) -> FollowupResult<Vec<Task>> {
        let context = repo_context!(RepositoryOperation::Query, EntityKind::Task)
            .with_additional_info(format!("线索: {lead_id}"));
        let rows = sqlx::query("SELECT * FROM tasks WHERE lead_id = ? ORDER BY id")
            .bind(lead_id)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| RepositoryErrorHelpers::database_error(&context, e))?;

        rows.iter().map(row_to_task).collect()
    }

    #[instrument(skip(self))]
    async fn find_due_retries(&self, today: NaiveDate) -> FollowupResult<Vec<Task>> {
        let context = repo_context!(RepositoryOperation::Query, EntityKind::Task)
            .with_additional_info(format!("到期重试扫描: {today}"));

        let rows = sqlx::query(
            r#"
            SELECT * FROM tasks
            WHERE status = ?
              AND due_date <= ?
              AND retry_created = 0
              AND MAX(attempt_number, 1) <=
                  CASE WHEN max_attempts > 0 THEN max_attempts ELSE ? END
            ORDER BY due_date, id
            "#,
        )
        .bind(TaskStatus::CallNotConnected)
        .bind(today)
        .bind(DEFAULT_MAX_ATTEMPTS)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| RepositoryErrorHelpers::database_error(&context, e))?;

        debug!("到期重试扫描命中 {} 个任务", rows.len());
        rows.iter().map(row_to_task).collect()
    }

    #[instrument(skip(self))]
    async fn find_upcoming_callbacks(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> FollowupResult<Vec<Task>> {
        let context = repo_context!(RepositoryOperation::Query, EntityKind::Task)
            .with_additional_info("回调提醒扫描");

        let rows = sqlx::query(
            r#"
            SELECT * FROM tasks
            WHERE callback_at IS NOT NULL
              AND callback_at >= ?
              AND callback_at < ?
              AND callback_notification_sent = 0
              AND status NOT IN (?, ?)
            ORDER BY callback_at, id
            "#,
        )
        .bind(MappingHelpers::timestamp(from))
        .bind(MappingHelpers::timestamp(to))
        .bind(TaskStatus::Completed)
        .bind(TaskStatus::Canceled)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| RepositoryErrorHelpers::database_error(&context, e))?;

        rows.iter().map(row_to_task).collect()
    }

    #[instrument(skip(self), fields(task.id = task_id))]
    async fn mark_callback_notified(&self, task_id: i64) -> FollowupResult<bool> {
        let context = repo_context!(RepositoryOperation::Claim, EntityKind::Task, id = task_id);
        let result = sqlx::query(
            r#"
            UPDATE tasks
            SET callback_notification_sent = 1, version = version + 1, updated_at = ?
            WHERE id = ? AND callback_notification_sent = 0
            "#,
        )
        .bind(MappingHelpers::timestamp(Utc::now()))
        .bind(task_id)
        .execute(&self.pool)
        .await
        .map_err(|e| RepositoryErrorHelpers::database_error(&context, e))?;

        if result.rows_affected() > 0 {
            return Ok(true);
        }
        if self.exists(task_id).await? {
            Ok(false)
        } else {
            Err(FollowupError::task_not_found(task_id))
        }
    }
}

pub struct SqliteAssignmentRepository {
    pool: SqlitePool,
}

impl SqliteAssignmentRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AssignmentRepository for SqliteAssignmentRepository {
    #[instrument(skip(self, assignment), fields(task.id = assignment.task_id))]
    async fn create(&self, assignment: &NewAssignment) -> FollowupResult<Assignment> {
        let context = repo_context!(RepositoryOperation::Create, EntityKind::Assignment)
            .with_additional_info(format!("任务: {}", assignment.task_id));
        let row = bind_new_assignment(assignment)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| RepositoryErrorHelpers::database_error(&context, e))?;

        row_to_assignment(&row)
    }

    async fn find_by_task(&self, task_id: i64) -> FollowupResult<Vec<Assignment>> {
        let context = repo_context!(RepositoryOperation::Query, EntityKind::Assignment)
            .with_additional_info(format!("任务: {task_id}"));
        let rows = sqlx::query("SELECT * FROM assignments WHERE task_id = ? ORDER BY id")
            .bind(task_id)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| RepositoryErrorHelpers::database_error(&context, e))?;

        rows.iter().map(row_to_assignment).collect()
    }
}
