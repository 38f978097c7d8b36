//! 延迟作业执行器
//!
//! 作业行由状态处理器和重试服务写入，这里按 `run_after` 认领并执行。
//! 超过租约仍处于 Running 的作业会被重新认领，重试判定本身是幂等的。

use std::sync::Arc;

use chrono::Duration;
use followup_domain::{
    entities::{DeferredJob, JobKind},
    ports::Clock,
    repositories::{DeferredJobRepository, TaskRepository},
    value_objects::{JobRunReport, RetryOutcome},
};
use followup_errors::{FollowupError, FollowupResult};
use followup_infrastructure::observability::{FollowupMetrics, StructuredLogger};
use tracing::{debug, instrument, warn};

use crate::retry_service::{RetryRequest, RetryService};

pub struct DeferredJobRunner {
    jobs: Arc<dyn DeferredJobRepository>,
    tasks: Arc<dyn TaskRepository>,
    retry: Arc<dyn RetryService>,
    clock: Arc<dyn Clock>,
    batch_size: usize,
    lease: Duration,
}

pub const DEFAULT_JOB_LEASE_MINUTES: i64 = 30;

impl DeferredJobRunner {
    pub fn new(
        jobs: Arc<dyn DeferredJobRepository>,
        tasks: Arc<dyn TaskRepository>,
        retry: Arc<dyn RetryService>,
        clock: Arc<dyn Clock>,
        batch_size: usize,
    ) -> Self {
        Self {
            jobs,
            tasks,
            retry,
            clock,
            batch_size: batch_size.max(1),
            lease: Duration::minutes(DEFAULT_JOB_LEASE_MINUTES),
        }
    }

    pub fn with_lease(mut self, lease: Duration) -> Self {
        self.lease = lease;
        self
    }

    #[instrument(skip(self))]
    pub async fn run_due_jobs(&self) -> FollowupResult<JobRunReport> {
        let now = self.clock.now();
        let claimed = self
            .jobs
            .claim_due(now, now - self.lease, self.batch_size)
            .await?;
        let mut report = JobRunReport {
            claimed: claimed.len(),
            ..JobRunReport::default()
        };

        for job in &claimed {
            let recorded = match self.execute(job).await {
                Ok(outcome) => {
                    debug!(job.id = job.id, outcome = outcome.as_label(), "作业执行完成");
                    self.jobs.complete(job.id).await.map(|()| true)
                }
                Err(e) => {
                    warn!(job.id = job.id, task.id = job.task_id, error = %e, "作业执行失败");
                    self.jobs.fail(job.id, &e.to_string()).await.map(|()| false)
                }
            };

            // 结果回写失败只影响本作业，租约到期后会被重新认领
            match recorded {
                Ok(true) => report.completed += 1,
                Ok(false) => report.failed += 1,
                Err(e) => {
                    report.failed += 1;
                    FollowupMetrics::record_sweep_failure("deferred_jobs");
                    StructuredLogger::log_sweep_item_failed("record_job_result", job.task_id, &e);
                }
            }
        }

        if report.claimed > 0 {
            StructuredLogger::log_jobs_processed(&report);
        }
        Ok(report)
    }

    async fn execute(&self, job: &DeferredJob) -> FollowupResult<RetryOutcome> {
        match job.kind {
            JobKind::RetryCheck => {
                let task = self
                    .tasks
                    .find_by_id(job.task_id)
                    .await?
                    .ok_or(FollowupError::TaskNotFound { id: job.task_id })?;
                self.retry
                    .evaluate_retry(&RetryRequest::for_task(&task))
                    .await
            }
        }
    }
}
