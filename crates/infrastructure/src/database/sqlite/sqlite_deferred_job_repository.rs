use async_trait::async_trait;
use chrono::{DateTime, Utc};
use followup_domain::{
    entities::{DeferredJob, JobStatus, NewDeferredJob},
    repositories::DeferredJobRepository,
};
use followup_errors::{FollowupError, FollowupResult};
use sqlx::SqlitePool;
use tracing::{debug, instrument, warn};

use crate::{
    database::mapping::{row_to_job, MappingHelpers},
    error_handling::{EntityKind, RepositoryErrorHelpers, RepositoryOperation},
    repo_context,
};

pub struct SqliteDeferredJobRepository {
    pool: SqlitePool,
}

impl SqliteDeferredJobRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn finish(&self, id: i64, status: JobStatus, error: Option<&str>) -> FollowupResult<()> {
        let context = repo_context!(RepositoryOperation::Update, EntityKind::DeferredJob, id = id);
        let result = sqlx::query(
            "UPDATE deferred_jobs SET status = ?, last_error = ?, updated_at = ? WHERE id = ?",
        )
        .bind(status)
        .bind(error)
        .bind(MappingHelpers::timestamp(Utc::now()))
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(|e| RepositoryErrorHelpers::database_error(&context, e))?;

        if result.rows_affected() == 0 {
            return Err(FollowupError::JobNotFound { id });
        }
        Ok(())
    }
}

#[async_trait]
impl DeferredJobRepository for SqliteDeferredJobRepository {
    #[instrument(skip(self, job), fields(job.key = %job.dedupe_key, task.id = job.task_id))]
    async fn enqueue(&self, job: &NewDeferredJob) -> FollowupResult<bool> {
        let context = repo_context!(RepositoryOperation::Create, EntityKind::DeferredJob)
            .with_additional_info(job.dedupe_key.clone());
        let now = MappingHelpers::timestamp(Utc::now());

        // 已结束的同键作业重新挂起，挂起或执行中的保持不变
        let result = sqlx::query(
            r#"
            INSERT INTO deferred_jobs (kind, task_id, dedupe_key, run_after, status, attempts, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, 0, ?, ?)
            ON CONFLICT(dedupe_key) DO UPDATE SET
                task_id = excluded.task_id,
                run_after = excluded.run_after,
                status = excluded.status,
                last_error = NULL,
                updated_at = excluded.updated_at
            WHERE deferred_jobs.status IN (?, ?)
            "#,
        )
        .bind(job.kind)
        .bind(job.task_id)
        .bind(&job.dedupe_key)
        .bind(MappingHelpers::timestamp(job.run_after))
        .bind(JobStatus::Pending)
        .bind(&now)
        .bind(&now)
        .bind(JobStatus::Done)
        .bind(JobStatus::Failed)
        .execute(&self.pool)
        .await
        .map_err(|e| RepositoryErrorHelpers::database_error(&context, e))?;

        let armed = result.rows_affected() > 0;
        debug!("延迟作业 {} 入队结果: {}", job.dedupe_key, armed);
        Ok(armed)
    }

    #[instrument(skip(self))]
    async fn claim_due(
        &self,
        now: DateTime<Utc>,
        stale_before: DateTime<Utc>,
        limit: usize,
    ) -> FollowupResult<Vec<DeferredJob>> {
        let context = repo_context!(RepositoryOperation::Claim, EntityKind::DeferredJob);
        let now_text = MappingHelpers::timestamp(now);
        let stale_text = MappingHelpers::timestamp(stale_before);

        let candidates: Vec<(i64, JobStatus, String)> = sqlx::query_as(
            r#"
            SELECT id, status, updated_at FROM deferred_jobs
            WHERE (status = ? AND run_after <= ?) OR (status = ? AND updated_at < ?)
            ORDER BY run_after, id
            LIMIT ?
            "#,
        )
        .bind(JobStatus::Pending)
        .bind(&now_text)
        .bind(JobStatus::Running)
        .bind(&stale_text)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| RepositoryErrorHelpers::database_error(&context, e))?;

        let mut claimed = Vec::with_capacity(candidates.len());
        for (id, seen_status, seen_updated_at) in candidates {
            if seen_status == JobStatus::Running {
                warn!(job.id = id, "回收超时未结束的延迟作业");
            }
            // 按读取时的状态与时间戳条件更新，输掉竞争的作业直接跳过
            let row = sqlx::query(
                r#"
                UPDATE deferred_jobs
                SET status = ?, attempts = attempts + 1, updated_at = ?
                WHERE id = ? AND status = ? AND updated_at = ?
                RETURNING *
                "#,
            )
            .bind(JobStatus::Running)
            .bind(&now_text)
            .bind(id)
            .bind(seen_status)
            .bind(&seen_updated_at)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| RepositoryErrorHelpers::database_error(&context, e))?;

            if let Some(row) = row {
                claimed.push(row_to_job(&row)?);
            }
        }
        Ok(claimed)
    }

    async fn complete(&self, id: i64) -> FollowupResult<()> {
        self.finish(id, JobStatus::Done, None).await
    }

    async fn fail(&self, id: i64, error: &str) -> FollowupResult<()> {
        self.finish(id, JobStatus::Failed, Some(error)).await
    }

    async fn find_by_key(&self, dedupe_key: &str) -> FollowupResult<Option<DeferredJob>> {
        let context = repo_context!(RepositoryOperation::Read, EntityKind::DeferredJob)
            .with_additional_info(dedupe_key.to_string());
        let row = sqlx::query("SELECT * FROM deferred_jobs WHERE dedupe_key = ?")
            .bind(dedupe_key)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| RepositoryErrorHelpers::database_error(&context, e))?;

        row.as_ref().map(row_to_job).transpose()
    }
}
