//! 重试与升级状态机
//!
//! 每次评估都重新读取任务；`retry_created` 与版本号共同保证同一任务
//! 最多产生一个重试任务或一次升级。

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use followup_config::RetryConfig;
use followup_domain::{
    entities::{NewDeferredJob, NewTask, Task, TaskPriority, TaskStatus},
    ports::{start_of_day, Clock},
    repositories::{DeferredJobRepository, FollowupUnitOfWork, TaskRepository},
    value_objects::{CommitOutcome, RetryOutcome, SkipReason, SweepReport},
};
use followup_errors::{FollowupError, FollowupResult};
use followup_infrastructure::observability::{FollowupMetrics, StructuredLogger};
use tracing::{debug, instrument, warn};

/// 一次重试评估的输入，通常由任务快照生成
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryRequest {
    pub task_id: i64,
    pub lead_id: Option<i64>,
    pub attempt_number: i32,
    pub assignee: Option<String>,
    pub max_attempts: i32,
}

impl RetryRequest {
    pub fn for_task(task: &Task) -> Self {
        Self {
            task_id: task.id,
            lead_id: task.lead_id,
            attempt_number: task.effective_attempt(),
            assignee: task.assignee().map(str::to_string),
            max_attempts: task.effective_max_attempts(),
        }
    }
}

pub fn escalation_comment(max_attempts: i32) -> String {
    format!(
        "Lead status automatically changed to 'Inactive / Dropped' after {max_attempts} unsuccessful contact attempts"
    )
}

#[async_trait]
pub trait RetryService: Send + Sync {
    /// 评估单个任务：跳过、创建重试任务或升级线索
    async fn evaluate_retry(&self, request: &RetryRequest) -> FollowupResult<RetryOutcome>;

    /// 每日批量扫描，单个任务失败不影响其余任务
    async fn scan_and_process_due_retries(&self) -> FollowupResult<SweepReport>;
}

pub struct LeadRetryService {
    tasks: Arc<dyn TaskRepository>,
    unit_of_work: Arc<dyn FollowupUnitOfWork>,
    jobs: Arc<dyn DeferredJobRepository>,
    clock: Arc<dyn Clock>,
    config: RetryConfig,
}

impl LeadRetryService {
    pub fn new(
        tasks: Arc<dyn TaskRepository>,
        unit_of_work: Arc<dyn FollowupUnitOfWork>,
        jobs: Arc<dyn DeferredJobRepository>,
        clock: Arc<dyn Clock>,
        config: RetryConfig,
    ) -> Self {
        Self {
            tasks,
            unit_of_work,
            jobs,
            clock,
            config,
        }
    }

    async fn load_task(&self, task_id: i64) -> FollowupResult<Task> {
        self.tasks
            .find_by_id(task_id)
            .await?
            .ok_or(FollowupError::TaskNotFound { id: task_id })
    }

    fn effective_max_attempts(&self, request: &RetryRequest) -> i32 {
        if request.max_attempts > 0 {
            request.max_attempts
        } else {
            self.config.max_attempts
        }
    }

    fn build_retry_task(&self, parent: &Task, request: &RetryRequest, lead_id: i64) -> NewTask {
        let next_attempt = request.attempt_number.max(1) + 1;
        let max_attempts = self.effective_max_attempts(request);
        let interval = parent.effective_retry_interval();
        let today = self.clock.today();

        let mut retry = NewTask::new(
            format!("Retry Call - Attempt {next_attempt}"),
            today,
            self.clock.days_from_today(interval as i64),
        );
        retry.description = format!(
            "Retry task auto-created for lead {lead_id} - Attempt {next_attempt}/{max_attempts}"
        );
        retry.assigned_to = request.assignee.clone();
        retry.status = TaskStatus::Todo;
        retry.priority = TaskPriority::Medium;
        retry.attempt_number = next_attempt;
        retry.max_attempts = max_attempts;
        retry.retry_interval_days = interval;
        retry.lead_id = Some(lead_id);
        retry.previous_task_id = Some(parent.id);
        retry
    }

    /// 守卫写入失败后重读一次：已处理则跳过，否则报告冲突
    async fn resolve_lost_guard(&self, task_id: i64) -> FollowupResult<RetryOutcome> {
        let reread = self.load_task(task_id).await?;
        if reread.retry_created {
            StructuredLogger::log_retry_skipped(task_id, "already_processed");
            return Ok(RetryOutcome::Skipped {
                reason: SkipReason::AlreadyProcessed,
            });
        }
        warn!(task.id = task_id, "重试守卫写入失败且任务未被处理，报告并发冲突");
        Err(FollowupError::conflict(task_id))
    }

    async fn escalate(
        &self,
        task: &Task,
        lead_id: i64,
        max_attempts: i32,
    ) -> FollowupResult<RetryOutcome> {
        let comment = escalation_comment(max_attempts);
        match self
            .unit_of_work
            .commit_escalation(task, lead_id, &comment, self.clock.now())
            .await?
        {
            CommitOutcome::Committed(()) => {
                FollowupMetrics::record_lead_escalated();
                StructuredLogger::log_lead_escalated(task.id, lead_id, max_attempts);
                Ok(RetryOutcome::Escalated { lead_id })
            }
            CommitOutcome::GuardLost => self.resolve_lost_guard(task.id).await,
        }
    }

    async fn create_retry(
        &self,
        task: &Task,
        request: &RetryRequest,
        lead_id: i64,
    ) -> FollowupResult<RetryOutcome> {
        let retry = self.build_retry_task(task, request, lead_id);
        let assignment_description = format!("Retry task assigned: {}", retry.title);

        let created = match self
            .unit_of_work
            .commit_retry(task, &retry, &assignment_description)
            .await?
        {
            CommitOutcome::Committed(created) => created,
            CommitOutcome::GuardLost => return self.resolve_lost_guard(task.id).await,
        };

        FollowupMetrics::record_retry_created();
        StructuredLogger::log_retry_created(
            task.id,
            created.id,
            lead_id,
            created.attempt_number,
            created.due_date,
        );

        // 入队失败不回滚已提交的重试任务，每日扫描会再次发现它
        let job = NewDeferredJob::retry_check(&created, lead_id, start_of_day(created.due_date));
        if let Err(e) = self.jobs.enqueue(&job).await {
            warn!(
                task.id = created.id,
                job.key = %job.dedupe_key,
                error = %e,
                "重试检查作业入队失败"
            );
        }

        Ok(RetryOutcome::RetryCreated {
            task_id: created.id,
            attempt_number: created.attempt_number,
        })
    }
}

#[async_trait]
impl RetryService for LeadRetryService {
    #[instrument(skip(self, request), fields(
        task.id = request.task_id,
        lead.id = ?request.lead_id,
        attempt = request.attempt_number,
    ))]
    async fn evaluate_retry(&self, request: &RetryRequest) -> FollowupResult<RetryOutcome> {
        let task = self.load_task(request.task_id).await?;

        if task.retry_created {
            StructuredLogger::log_retry_skipped(task.id, "already_processed");
            return Ok(RetryOutcome::Skipped {
                reason: SkipReason::AlreadyProcessed,
            });
        }

        if task.status != TaskStatus::CallNotConnected {
            StructuredLogger::log_retry_skipped(task.id, "status_changed");
            return Ok(RetryOutcome::Skipped {
                reason: SkipReason::StatusChanged,
            });
        }

        let lead_id = request.lead_id.ok_or_else(|| {
            FollowupError::validation_error(format!("任务 {} 未关联线索，无法重试", task.id))
        })?;

        let max_attempts = self.effective_max_attempts(request);
        if request.attempt_number.max(1) >= max_attempts {
            self.escalate(&task, lead_id, max_attempts).await
        } else {
            self.create_retry(&task, request, lead_id).await
        }
    }

    #[instrument(skip(self))]
    async fn scan_and_process_due_retries(&self) -> FollowupResult<SweepReport> {
        let started = Instant::now();
        let today = self.clock.today();
        let due = self.tasks.find_due_retries(today).await?;
        debug!("发现 {} 个到期的重试候选任务", due.len());

        let mut report = SweepReport {
            scanned: due.len(),
            ..SweepReport::default()
        };

        for task in &due {
            match self.evaluate_retry(&RetryRequest::for_task(task)).await {
                Ok(outcome) => report.record(&outcome),
                Err(e) => {
                    report.failed += 1;
                    FollowupMetrics::record_sweep_failure("retry_sweep");
                    StructuredLogger::log_sweep_item_failed("evaluate_retry", task.id, &e);
                }
            }
        }

        StructuredLogger::log_retry_sweep_completed(&report, started.elapsed().as_millis() as u64);
        Ok(report)
    }
}
