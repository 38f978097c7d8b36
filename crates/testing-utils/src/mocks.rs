//! Mock implementations for all repository and service traits
//!
//! `InMemoryStore` keeps every record behind one mutex so unit-of-work
//! commits are atomic the same way a database transaction is.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use followup_domain::entities::{
    Alert, Assignment, AssignmentStatus, DeferredJob, EmailMessage, EmailStatus, JobStatus, Lead,
    LeadComment, LeadStatus, NewAlert, NewAssignment, NewDeferredJob, NewLead, NewTask,
    ScheduledEmail, Task, TaskStatus, UserProfile,
};
use followup_domain::ports::{Clock, NotificationDispatcher};
use followup_domain::repositories::{
    AlertRepository, AssignmentRepository, CallbackCommentFn, DeferredJobRepository,
    EmailOutboxRepository, FollowupUnitOfWork, LeadCommentRepository, LeadRepository, TaskRepository, UserDirectory,
};
use followup_domain::value_objects::CommitOutcome;
use followup_errors::{FollowupError, FollowupResult};

/// 注入的故障点
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailPoint {
    TaskCreate,
    AssignmentCreate,
    CommentAppend,
    LeadStatusUpdate,
    FindDueRetries,
    /// 提交前模拟另一调度方抢先置位 retry_created
    StealRetryGuard,
    /// 提交前模拟另一写入方递增版本
    BumpVersionBeforeCommit,
    JobEnqueue,
    JobComplete,
}

#[derive(Debug, Clone, Default)]
pub struct StoreState {
    pub leads: HashMap<i64, Lead>,
    pub tasks: HashMap<i64, Task>,
    pub assignments: Vec<Assignment>,
    pub comments: Vec<LeadComment>,
    pub jobs: Vec<DeferredJob>,
    pub emails: Vec<ScheduledEmail>,
    pub alerts: Vec<Alert>,
    pub users: HashMap<String, UserProfile>,
    next_id: i64,
    fail_points: HashSet<FailPoint>,
}

impl StoreState {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn check(&self, point: FailPoint) -> FollowupResult<()> {
        if self.fail_points.contains(&point) {
            return Err(FollowupError::database_error(format!(
                "injected failure at {point:?}"
            )));
        }
        Ok(())
    }

    fn insert_task(&mut self, task: &NewTask) -> FollowupResult<Task> {
        self.check(FailPoint::TaskCreate)?;
        let id = self.next_id();
        let created = task.clone().into_task(id, Utc::now());
        self.tasks.insert(id, created.clone());
        Ok(created)
    }

    fn insert_assignment(&mut self, assignment: &NewAssignment) -> FollowupResult<Assignment> {
        self.check(FailPoint::AssignmentCreate)?;
        let created = Assignment {
            id: self.next_id(),
            task_id: assignment.task_id,
            allocated_to: assignment.allocated_to.clone(),
            description: assignment.description.clone(),
            priority: assignment.priority,
            status: AssignmentStatus::Open,
            date: assignment.date,
        };
        self.assignments.push(created.clone());
        Ok(created)
    }

    fn insert_comment(
        &mut self,
        lead_id: i64,
        body: &str,
        at: DateTime<Utc>,
    ) -> FollowupResult<LeadComment> {
        self.check(FailPoint::CommentAppend)?;
        let comment = LeadComment {
            id: self.next_id(),
            lead_id,
            body: body.to_string(),
            created_at: at,
        };
        self.comments.push(comment.clone());
        Ok(comment)
    }

    /// 与 SQL 中 `WHERE id = ? AND version = ? AND retry_created = 0` 等价
    fn guard_holds(&self, task: &Task) -> bool {
        self.tasks
            .get(&task.id)
            .map(|stored| stored.version == task.version && !stored.retry_created)
            .unwrap_or(false)
    }

    fn apply_pre_commit_interference(&mut self, task_id: i64) {
        let steal = self.fail_points.contains(&FailPoint::StealRetryGuard);
        let bump = self.fail_points.contains(&FailPoint::BumpVersionBeforeCommit);
        if let Some(stored) = self.tasks.get_mut(&task_id) {
            if steal {
                stored.retry_created = true;
                stored.version += 1;
            } else if bump {
                stored.version += 1;
            }
        }
    }
}

/// In-memory record store implementing every persistence port
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    state: Arc<Mutex<StoreState>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_on(&self, point: FailPoint) {
        self.state.lock().unwrap().fail_points.insert(point);
    }

    pub fn clear_failures(&self) {
        self.state.lock().unwrap().fail_points.clear();
    }

    pub fn add_user(&self, id: &str, email: Option<&str>) {
        self.state.lock().unwrap().users.insert(
            id.to_string(),
            UserProfile {
                id: id.to_string(),
                full_name: None,
                email: email.map(str::to_string),
            },
        );
    }

    /// 直接写入线索，保留给定 ID
    pub fn insert_lead(&self, lead: Lead) -> Lead {
        let mut state = self.state.lock().unwrap();
        state.next_id = state.next_id.max(lead.id);
        state.leads.insert(lead.id, lead.clone());
        lead
    }

    /// 直接写入任务，保留给定 ID 与标志位
    pub fn insert_task(&self, task: Task) -> Task {
        let mut state = self.state.lock().unwrap();
        state.next_id = state.next_id.max(task.id);
        state.tasks.insert(task.id, task.clone());
        task
    }

    /// 模拟外部写入：直接修改状态并递增版本
    pub fn set_task_status(&self, task_id: i64, status: TaskStatus) {
        let mut state = self.state.lock().unwrap();
        if let Some(task) = state.tasks.get_mut(&task_id) {
            task.status = status;
            task.version += 1;
        }
    }

    pub fn task(&self, id: i64) -> Option<Task> {
        self.state.lock().unwrap().tasks.get(&id).cloned()
    }

    pub fn lead(&self, id: i64) -> Option<Lead> {
        self.state.lock().unwrap().leads.get(&id).cloned()
    }

    pub fn all_tasks(&self) -> Vec<Task> {
        let mut tasks: Vec<Task> = self.state.lock().unwrap().tasks.values().cloned().collect();
        tasks.sort_by_key(|task| task.id);
        tasks
    }

    pub fn tasks_for_lead(&self, lead_id: i64) -> Vec<Task> {
        self.all_tasks()
            .into_iter()
            .filter(|task| task.lead_id == Some(lead_id))
            .collect()
    }

    pub fn children_of(&self, task_id: i64) -> Vec<Task> {
        self.all_tasks()
            .into_iter()
            .filter(|task| task.previous_task_id == Some(task_id))
            .collect()
    }

    pub fn assignments(&self) -> Vec<Assignment> {
        self.state.lock().unwrap().assignments.clone()
    }

    pub fn comments_for(&self, lead_id: i64) -> Vec<LeadComment> {
        self.state
            .lock()
            .unwrap()
            .comments
            .iter()
            .filter(|comment| comment.lead_id == lead_id)
            .cloned()
            .collect()
    }

    pub fn jobs(&self) -> Vec<DeferredJob> {
        self.state.lock().unwrap().jobs.clone()
    }

    pub fn emails(&self) -> Vec<ScheduledEmail> {
        self.state.lock().unwrap().emails.clone()
    }

    pub fn alerts(&self) -> Vec<Alert> {
        self.state.lock().unwrap().alerts.clone()
    }
}

#[async_trait]
impl LeadRepository for InMemoryStore {
    async fn create(&self, lead: &NewLead) -> FollowupResult<Lead> {
        let mut state = self.state.lock().unwrap();
        let now = Utc::now();
        let created = Lead {
            id: state.next_id(),
            name: lead.name.clone(),
            first_name: lead.first_name.clone(),
            email: lead.email.clone(),
            owner: lead.owner.clone(),
            status: LeadStatus::New,
            created_at: now,
            updated_at: now,
        };
        state.leads.insert(created.id, created.clone());
        Ok(created)
    }

    async fn find_by_id(&self, id: i64) -> FollowupResult<Option<Lead>> {
        Ok(self.state.lock().unwrap().leads.get(&id).cloned())
    }

    async fn update_status(&self, id: i64, status: LeadStatus) -> FollowupResult<()> {
        let mut state = self.state.lock().unwrap();
        state.check(FailPoint::LeadStatusUpdate)?;
        let lead = state
            .leads
            .get_mut(&id)
            .ok_or(FollowupError::LeadNotFound { id })?;
        lead.status = status;
        lead.updated_at = Utc::now();
        Ok(())
    }
}

#[async_trait]
impl TaskRepository for InMemoryStore {
    async fn create(&self, task: &NewTask) -> FollowupResult<Task> {
        self.state.lock().unwrap().insert_task(task)
    }

    async fn find_by_id(&self, id: i64) -> FollowupResult<Option<Task>> {
        Ok(self.state.lock().unwrap().tasks.get(&id).cloned())
    }

    async fn update(&self, task: &Task) -> FollowupResult<Task> {
        let mut state = self.state.lock().unwrap();
        let stored = state
            .tasks
            .get_mut(&task.id)
            .ok_or(FollowupError::TaskNotFound { id: task.id })?;
        if stored.version != task.version {
            return Err(FollowupError::conflict(task.id));
        }
        let mut updated = task.clone();
        updated.retry_created = stored.retry_created || task.retry_created;
        updated.callback_notification_sent =
            stored.callback_notification_sent || task.callback_notification_sent;
        updated.version = stored.version + 1;
        updated.updated_at = Utc::now();
        *stored = updated.clone();
        Ok(updated)
    }

    async fn find_by_lead(&self, lead_id: i64) -> FollowupResult<Vec<Task>> {
        Ok(self.tasks_for_lead(lead_id))
    }

    async fn find_due_retries(&self, today: NaiveDate) -> FollowupResult<Vec<Task>> {
        self.state.lock().unwrap().check(FailPoint::FindDueRetries)?;
        Ok(self
            .all_tasks()
            .into_iter()
            .filter(|task| {
                task.status == TaskStatus::CallNotConnected
                    && task.due_date <= today
                    && !task.retry_created
                    && task.effective_attempt() <= task.effective_max_attempts()
            })
            .collect())
    }

    async fn find_upcoming_callbacks(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> FollowupResult<Vec<Task>> {
        Ok(self
            .all_tasks()
            .into_iter()
            .filter(|task| {
                task.callback_at
                    .map(|at| at >= from && at < to)
                    .unwrap_or(false)
                    && !task.callback_notification_sent
                    && !task.status.is_terminal()
            })
            .collect())
    }

    async fn mark_callback_notified(&self, task_id: i64) -> FollowupResult<bool> {
        let mut state = self.state.lock().unwrap();
        match state.tasks.get_mut(&task_id) {
            Some(task) if !task.callback_notification_sent => {
                task.callback_notification_sent = true;
                task.version += 1;
                Ok(true)
            }
            Some(_) => Ok(false),
            None => Err(FollowupError::TaskNotFound { id: task_id }),
        }
    }
}

#[async_trait]
impl AssignmentRepository for InMemoryStore {
    async fn create(&self, assignment: &NewAssignment) -> FollowupResult<Assignment> {
        self.state.lock().unwrap().insert_assignment(assignment)
    }

    async fn find_by_task(&self, task_id: i64) -> FollowupResult<Vec<Assignment>> {
        Ok(self
            .assignments()
            .into_iter()
            .filter(|assignment| assignment.task_id == task_id)
            .collect())
    }
}

#[async_trait]
impl LeadCommentRepository for InMemoryStore {
    async fn append(
        &self,
        lead_id: i64,
        body: &str,
        at: DateTime<Utc>,
    ) -> FollowupResult<LeadComment> {
        self.state.lock().unwrap().insert_comment(lead_id, body, at)
    }

    async fn find_by_lead(&self, lead_id: i64) -> FollowupResult<Vec<LeadComment>> {
        Ok(self.comments_for(lead_id))
    }
}

#[async_trait]
impl FollowupUnitOfWork for InMemoryStore {
    async fn commit_retry(
        &self,
        parent: &Task,
        retry: &NewTask,
        assignment_description: &str,
    ) -> FollowupResult<CommitOutcome<Task>> {
        let mut guard = self.state.lock().unwrap();
        guard.apply_pre_commit_interference(parent.id);
        if !guard.guard_holds(parent) {
            return Ok(CommitOutcome::GuardLost);
        }

        // 在副本上执行全部写入，成功后整体替换，失败则原状态不变
        let mut staged = guard.clone();
        let created = staged.insert_task(retry)?;
        if let Some(assignment) = NewAssignment::for_task(&created, assignment_description) {
            staged.insert_assignment(&assignment)?;
        }
        if let Some(stored) = staged.tasks.get_mut(&parent.id) {
            stored.retry_created = true;
            stored.version += 1;
            stored.updated_at = Utc::now();
        }
        *guard = staged;
        Ok(CommitOutcome::Committed(created))
    }

    async fn commit_escalation(
        &self,
        task: &Task,
        lead_id: i64,
        comment: &str,
        at: DateTime<Utc>,
    ) -> FollowupResult<CommitOutcome<()>> {
        let mut state = self.state.lock().unwrap();
        state.apply_pre_commit_interference(task.id);
        if !state.guard_holds(task) {
            return Ok(CommitOutcome::GuardLost);
        }
        if !state.leads.contains_key(&lead_id) {
            return Err(FollowupError::LeadNotFound { id: lead_id });
        }
        state.check(FailPoint::LeadStatusUpdate)?;
        state.check(FailPoint::CommentAppend)?;

        if let Some(stored) = state.tasks.get_mut(&task.id) {
            stored.retry_created = true;
            stored.version += 1;
            stored.updated_at = at;
        }
        if let Some(lead) = state.leads.get_mut(&lead_id) {
            lead.status = LeadStatus::InactiveDropped;
            lead.updated_at = at;
        }
        state.insert_comment(lead_id, comment, at)?;
        Ok(CommitOutcome::Committed(()))
    }

    async fn commit_callback(
        &self,
        original: &Task,
        callback: &NewTask,
        assignment_description: &str,
        comment: CallbackCommentFn<'_>,
        at: DateTime<Utc>,
    ) -> FollowupResult<Task> {
        let mut guard = self.state.lock().unwrap();
        guard.apply_pre_commit_interference(original.id);
        let mut staged = guard.clone();
        let stored = staged
            .tasks
            .get_mut(&original.id)
            .ok_or(FollowupError::TaskNotFound { id: original.id })?;
        if stored.version != original.version {
            return Err(FollowupError::conflict(original.id));
        }
        stored.requested_callback_at = callback.callback_at;
        stored.version += 1;
        stored.updated_at = at;

        let created = staged.insert_task(callback)?;
        if let Some(assignment) = NewAssignment::for_task(&created, assignment_description) {
            staged.insert_assignment(&assignment)?;
        }
        if let Some(lead_id) = original.lead_id {
            staged.insert_comment(lead_id, &comment(&created), at)?;
        }
        *guard = staged;
        Ok(created)
    }
}

#[async_trait]
impl DeferredJobRepository for InMemoryStore {
    async fn enqueue(&self, job: &NewDeferredJob) -> FollowupResult<bool> {
        let mut state = self.state.lock().unwrap();
        state.check(FailPoint::JobEnqueue)?;
        let now = Utc::now();
        if let Some(existing) = state
            .jobs
            .iter_mut()
            .find(|existing| existing.dedupe_key == job.dedupe_key)
        {
            if !existing.status.is_finished() {
                return Ok(false);
            }
            existing.task_id = job.task_id;
            existing.run_after = job.run_after;
            existing.status = JobStatus::Pending;
            existing.updated_at = now;
            return Ok(true);
        }
        let id = state.next_id();
        state.jobs.push(DeferredJob {
            id,
            kind: job.kind,
            task_id: job.task_id,
            dedupe_key: job.dedupe_key.clone(),
            run_after: job.run_after,
            status: JobStatus::Pending,
            attempts: 0,
            last_error: None,
            created_at: now,
            updated_at: now,
        });
        Ok(true)
    }

    async fn claim_due(
        &self,
        now: DateTime<Utc>,
        stale_before: DateTime<Utc>,
        limit: usize,
    ) -> FollowupResult<Vec<DeferredJob>> {
        let mut state = self.state.lock().unwrap();
        let mut due: Vec<&mut DeferredJob> = state
            .jobs
            .iter_mut()
            .filter(|job| match job.status {
                JobStatus::Pending => job.run_after <= now,
                JobStatus::Running => job.updated_at < stale_before,
                _ => false,
            })
            .collect();
        due.sort_by_key(|job| (job.run_after, job.id));
        Ok(due
            .into_iter()
            .take(limit)
            .map(|job| {
                job.status = JobStatus::Running;
                job.attempts += 1;
                job.updated_at = now;
                job.clone()
            })
            .collect())
    }

    async fn complete(&self, id: i64) -> FollowupResult<()> {
        let mut state = self.state.lock().unwrap();
        state.check(FailPoint::JobComplete)?;
        let job = state
            .jobs
            .iter_mut()
            .find(|job| job.id == id)
            .ok_or(FollowupError::JobNotFound { id })?;
        job.status = JobStatus::Done;
        job.updated_at = Utc::now();
        Ok(())
    }

    async fn fail(&self, id: i64, error: &str) -> FollowupResult<()> {
        let mut state = self.state.lock().unwrap();
        let job = state
            .jobs
            .iter_mut()
            .find(|job| job.id == id)
            .ok_or(FollowupError::JobNotFound { id })?;
        job.status = JobStatus::Failed;
        job.last_error = Some(error.to_string());
        job.updated_at = Utc::now();
        Ok(())
    }

    async fn find_by_key(&self, dedupe_key: &str) -> FollowupResult<Option<DeferredJob>> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .jobs
            .iter()
            .find(|job| job.dedupe_key == dedupe_key)
            .cloned())
    }
}

#[async_trait]
impl EmailOutboxRepository for InMemoryStore {
    async fn insert(
        &self,
        email: &EmailMessage,
        send_after: DateTime<Utc>,
    ) -> FollowupResult<ScheduledEmail> {
        let mut state = self.state.lock().unwrap();
        let row = ScheduledEmail {
            id: state.next_id(),
            recipients: email.recipients.clone(),
            subject: email.subject.clone(),
            html_body: email.html_body.clone(),
            reference: email.reference.clone(),
            send_after,
            status: EmailStatus::NotSent,
            sent_at: None,
            error: None,
            created_at: Utc::now(),
        };
        state.emails.push(row.clone());
        Ok(row)
    }

    async fn find_due(&self, now: DateTime<Utc>, limit: usize) -> FollowupResult<Vec<ScheduledEmail>> {
        let state = self.state.lock().unwrap();
        let mut due: Vec<ScheduledEmail> = state
            .emails
            .iter()
            .filter(|email| email.is_due(now))
            .cloned()
            .collect();
        due.sort_by_key(|email| (email.send_after, email.id));
        due.truncate(limit);
        Ok(due)
    }

    async fn mark_sent(&self, id: i64, at: DateTime<Utc>) -> FollowupResult<()> {
        let mut state = self.state.lock().unwrap();
        if let Some(email) = state.emails.iter_mut().find(|email| email.id == id) {
            email.status = EmailStatus::Sent;
            email.sent_at = Some(at);
            email.error = None;
        }
        Ok(())
    }

    async fn mark_error(&self, id: i64, error: &str) -> FollowupResult<()> {
        let mut state = self.state.lock().unwrap();
        if let Some(email) = state.emails.iter_mut().find(|email| email.id == id) {
            email.status = EmailStatus::Error;
            email.error = Some(error.to_string());
        }
        Ok(())
    }
}

#[async_trait]
impl AlertRepository for InMemoryStore {
    async fn create(&self, alert: &NewAlert, at: DateTime<Utc>) -> FollowupResult<Alert> {
        let mut state = self.state.lock().unwrap();
        let row = Alert {
            id: state.next_id(),
            for_user: alert.for_user.clone(),
            subject: alert.subject.clone(),
            body: alert.body.clone(),
            reference: alert.reference.clone(),
            created_at: at,
            read: false,
        };
        state.alerts.push(row.clone());
        Ok(row)
    }

    async fn find_for_user(&self, user: &str) -> FollowupResult<Vec<Alert>> {
        Ok(self
            .alerts()
            .into_iter()
            .filter(|alert| alert.for_user == user)
            .collect())
    }
}

#[async_trait]
impl UserDirectory for InMemoryStore {
    async fn find_user(&self, id: &str) -> FollowupResult<Option<UserProfile>> {
        Ok(self.state.lock().unwrap().users.get(id).cloned())
    }
}

/// 记录所有通知的分发器，可注入发送失败
#[derive(Debug, Clone, Default)]
pub struct RecordingNotifier {
    emails: Arc<Mutex<Vec<EmailMessage>>>,
    alerts: Arc<Mutex<Vec<NewAlert>>>,
    fail_emails: Arc<Mutex<bool>>,
    fail_alerts: Arc<Mutex<bool>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_emails() -> Self {
        let notifier = Self::default();
        *notifier.fail_emails.lock().unwrap() = true;
        notifier
    }

    pub fn fail_alerts(&self, fail: bool) {
        *self.fail_alerts.lock().unwrap() = fail;
    }

    pub fn emails(&self) -> Vec<EmailMessage> {
        self.emails.lock().unwrap().clone()
    }

    pub fn alerts(&self) -> Vec<NewAlert> {
        self.alerts.lock().unwrap().clone()
    }

    pub fn emails_with_subject(&self, subject: &str) -> Vec<EmailMessage> {
        self.emails()
            .into_iter()
            .filter(|email| email.subject == subject)
            .collect()
    }
}

#[async_trait]
impl NotificationDispatcher for RecordingNotifier {
    async fn send_email(&self, email: &EmailMessage) -> FollowupResult<i64> {
        if *self.fail_emails.lock().unwrap() {
            return Err(FollowupError::notification("mail relay unavailable"));
        }
        let mut emails = self.emails.lock().unwrap();
        emails.push(email.clone());
        Ok(emails.len() as i64)
    }

    async fn create_alert(&self, alert: &NewAlert) -> FollowupResult<i64> {
        if *self.fail_alerts.lock().unwrap() {
            return Err(FollowupError::notification("alert store unavailable"));
        }
        let mut alerts = self.alerts.lock().unwrap();
        alerts.push(alert.clone());
        Ok(alerts.len() as i64)
    }
}

/// 可手动推进的时钟
#[derive(Debug, Clone)]
pub struct FixedClock {
    now: Arc<Mutex<DateTime<Utc>>>,
}

impl FixedClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: Arc::new(Mutex::new(now)),
        }
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.lock().unwrap() = now;
    }

    pub fn advance(&self, by: chrono::Duration) {
        let mut now = self.now.lock().unwrap();
        *now += by;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }
}
