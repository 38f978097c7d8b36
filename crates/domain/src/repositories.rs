//! 领域仓储抽象
//!
//! 定义记录存储的抽象接口，SQLite 与内存实现分别位于基础设施与测试工具 crate

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use followup_errors::FollowupResult;

use crate::entities::{
    Alert, Assignment, DeferredJob, EmailMessage, Lead, LeadComment, LeadStatus, NewAlert,
    NewAssignment, NewDeferredJob, NewLead, NewTask, ScheduledEmail, Task, UserProfile,
};
use crate::value_objects::CommitOutcome;

/// 线索仓储抽象
#[async_trait]
pub trait LeadRepository: Send + Sync {
    async fn create(&self, lead: &NewLead) -> FollowupResult<Lead>;
    async fn find_by_id(&self, id: i64) -> FollowupResult<Option<Lead>>;
    /// 最后写入者生效
    async fn update_status(&self, id: i64, status: LeadStatus) -> FollowupResult<()>;
}

/// 跟进任务仓储抽象
#[async_trait]
pub trait TaskRepository: Send + Sync {
    async fn create(&self, task: &NewTask) -> FollowupResult<Task>;
    async fn find_by_id(&self, id: i64) -> FollowupResult<Option<Task>>;
    /// 带版本检查的保存；版本不一致时返回 `ConcurrentModification`。
    /// `retry_created` 只会被置位，不会被写回 false
    async fn update(&self, task: &Task) -> FollowupResult<Task>;
    async fn find_by_lead(&self, lead_id: i64) -> FollowupResult<Vec<Task>>;
    /// 统一的到期重试筛选条件
    async fn find_due_retries(&self, today: NaiveDate) -> FollowupResult<Vec<Task>>;
    /// `callback_at` 位于 `[from, to)` 且未提醒、非终态的任务
    async fn find_upcoming_callbacks(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> FollowupResult<Vec<Task>>;
    /// 条件置位提醒标志，返回是否由本次调用认领
    async fn mark_callback_notified(&self, task_id: i64) -> FollowupResult<bool>;
}

#[async_trait]
pub trait AssignmentRepository: Send + Sync {
    async fn create(&self, assignment: &NewAssignment) -> FollowupResult<Assignment>;
    async fn find_by_task(&self, task_id: i64) -> FollowupResult<Vec<Assignment>>;
}

#[async_trait]
pub trait LeadCommentRepository: Send + Sync {
    async fn append(
        &self,
        lead_id: i64,
        body: &str,
        at: DateTime<Utc>,
    ) -> FollowupResult<LeadComment>;
    async fn find_by_lead(&self, lead_id: i64) -> FollowupResult<Vec<LeadComment>>;
}

/// 生成回调备注，参数为新建的回调任务
pub type CallbackCommentFn<'a> = &'a (dyn Fn(&Task) -> String + Send + Sync);

/// 重试、升级与回调安排的原子提交
#[async_trait]
pub trait FollowupUnitOfWork: Send + Sync {
    /// 一个事务内：插入重试任务、按需创建分配、条件置位父任务的 `retry_created`
    async fn commit_retry(
        &self,
        parent: &Task,
        retry: &NewTask,
        assignment_description: &str,
    ) -> FollowupResult<CommitOutcome<Task>>;

    /// 一个事务内：条件置位 `retry_created`、线索状态改为 Inactive / Dropped、追加备注
    async fn commit_escalation(
        &self,
        task: &Task,
        lead_id: i64,
        comment: &str,
        at: DateTime<Utc>,
    ) -> FollowupResult<CommitOutcome<()>>;

    /// 一个事务内：带版本检查地记录原任务的 `requested_callback_at`、插入回调任务、
    /// 按需创建分配、原任务关联线索时追加备注。版本不一致时返回 `ConcurrentModification`
    async fn commit_callback(
        &self,
        original: &Task,
        callback: &NewTask,
        assignment_description: &str,
        comment: CallbackCommentFn<'_>,
        at: DateTime<Utc>,
    ) -> FollowupResult<Task>;
}

/// 延迟作业仓储
#[async_trait]
pub trait DeferredJobRepository: Send + Sync {
    /// 按去重键入队；已结束的同键作业会被重新挂起，挂起中的作业保持不变。
    /// 返回本次调用是否使作业进入待执行状态
    async fn enqueue(&self, job: &NewDeferredJob) -> FollowupResult<bool>;
    /// 认领到期的 Pending 作业，以及 `updated_at` 早于 `stale_before` 的 Running 作业
    /// （执行方崩溃或未能回写结果时遗留）。认领为条件更新，状态置为 Running
    async fn claim_due(
        &self,
        now: DateTime<Utc>,
        stale_before: DateTime<Utc>,
        limit: usize,
    ) -> FollowupResult<Vec<DeferredJob>>;
    async fn complete(&self, id: i64) -> FollowupResult<()>;
    async fn fail(&self, id: i64, error: &str) -> FollowupResult<()>;
    async fn find_by_key(&self, dedupe_key: &str) -> FollowupResult<Option<DeferredJob>>;
}

/// 邮件发件箱
#[async_trait]
pub trait EmailOutboxRepository: Send + Sync {
    async fn insert(
        &self,
        email: &EmailMessage,
        send_after: DateTime<Utc>,
    ) -> FollowupResult<ScheduledEmail>;
    async fn find_due(&self, now: DateTime<Utc>, limit: usize) -> FollowupResult<Vec<ScheduledEmail>>;
    async fn mark_sent(&self, id: i64, at: DateTime<Utc>) -> FollowupResult<()>;
    async fn mark_error(&self, id: i64, error: &str) -> FollowupResult<()>;
}

#[async_trait]
pub trait AlertRepository: Send + Sync {
    async fn create(&self, alert: &NewAlert, at: DateTime<Utc>) -> FollowupResult<Alert>;
    async fn find_for_user(&self, user: &str) -> FollowupResult<Vec<Alert>>;
}

/// 用户目录，用于解析负责人邮箱
#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn find_user(&self, id: &str) -> FollowupResult<Option<UserProfile>>;

    async fn email_for(&self, id: &str) -> FollowupResult<Option<String>> {
        Ok(self
            .find_user(id)
            .await?
            .and_then(|user| user.email)
            .filter(|email| !email.trim().is_empty()))
    }
}
