use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use followup_errors::FollowupError;
use serde::{Deserialize, Serialize};

pub const DEFAULT_MAX_ATTEMPTS: i32 = 10;
pub const DEFAULT_RETRY_INTERVAL_DAYS: i32 = 2;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Lead {
    pub id: i64,
    pub name: String,
    pub first_name: Option<String>,
    pub email: Option<String>,
    pub owner: Option<String>,
    pub status: LeadStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Lead {
    /// 邮件称呼，缺省为 "Valued Customer"
    pub fn salutation(&self) -> &str {
        self.first_name
            .as_deref()
            .filter(|name| !name.trim().is_empty())
            .unwrap_or("Valued Customer")
    }

    pub fn entity_description(&self) -> String {
        format!("线索 '{}' (ID: {}, 状态: {})", self.name, self.id, self.status)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewLead {
    pub name: String,
    pub first_name: Option<String>,
    pub email: Option<String>,
    pub owner: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum LeadStatus {
    #[serde(rename = "New")]
    New,
    #[serde(rename = "Active")]
    Active,
    #[serde(rename = "Interested")]
    Interested,
    #[serde(rename = "Not Interested")]
    NotInterested,
    #[serde(rename = "Inactive / Dropped")]
    InactiveDropped,
    #[serde(rename = "Converted")]
    Converted,
}

impl LeadStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LeadStatus::New => "New",
            LeadStatus::Active => "Active",
            LeadStatus::Interested => "Interested",
            LeadStatus::NotInterested => "Not Interested",
            LeadStatus::InactiveDropped => "Inactive / Dropped",
            LeadStatus::Converted => "Converted",
        }
    }
}

impl fmt::Display for LeadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LeadStatus {
    type Err = FollowupError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "New" => Ok(LeadStatus::New),
            "Active" => Ok(LeadStatus::Active),
            "Interested" => Ok(LeadStatus::Interested),
            "Not Interested" | "NotInterested" => Ok(LeadStatus::NotInterested),
            "Inactive / Dropped" | "InactiveDropped" => Ok(LeadStatus::InactiveDropped),
            "Converted" => Ok(LeadStatus::Converted),
            other => Err(FollowupError::InvalidStatus(format!("未知的线索状态: {other}"))),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum TaskStatus {
    #[serde(rename = "Backlog")]
    Backlog,
    #[serde(rename = "Todo")]
    Todo,
    #[serde(rename = "In Progress")]
    InProgress,
    #[serde(rename = "Call Not Connected")]
    CallNotConnected,
    #[serde(rename = "Interested")]
    Interested,
    #[serde(rename = "Not Interested")]
    NotInterested,
    #[serde(rename = "Completed")]
    Completed,
    #[serde(rename = "Canceled")]
    Canceled,
}

impl TaskStatus {
    pub const ALL: [TaskStatus; 8] = [
        TaskStatus::Backlog,
        TaskStatus::Todo,
        TaskStatus::InProgress,
        TaskStatus::CallNotConnected,
        TaskStatus::Interested,
        TaskStatus::NotInterested,
        TaskStatus::Completed,
        TaskStatus::Canceled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Backlog => "Backlog",
            TaskStatus::Todo => "Todo",
            TaskStatus::InProgress => "In Progress",
            TaskStatus::CallNotConnected => "Call Not Connected",
            TaskStatus::Interested => "Interested",
            TaskStatus::NotInterested => "Not Interested",
            TaskStatus::Completed => "Completed",
            TaskStatus::Canceled => "Canceled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Canceled)
    }

    /// 状态迁移表：终态不可再迁移，其余状态可迁移到任意不同状态
    pub fn can_transition_to(&self, next: TaskStatus) -> bool {
        !self.is_terminal() && *self != next
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskStatus {
    type Err = FollowupError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "Backlog" => Ok(TaskStatus::Backlog),
            "Todo" => Ok(TaskStatus::Todo),
            "In Progress" | "InProgress" => Ok(TaskStatus::InProgress),
            "Call Not Connected" | "CallNotConnected" => Ok(TaskStatus::CallNotConnected),
            "Interested" => Ok(TaskStatus::Interested),
            "Not Interested" | "NotInterested" => Ok(TaskStatus::NotInterested),
            "Completed" => Ok(TaskStatus::Completed),
            "Canceled" | "Cancelled" => Ok(TaskStatus::Canceled),
            other => Err(FollowupError::InvalidStatus(format!("未知的任务状态: {other}"))),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TaskPriority {
    Low,
    Medium,
    High,
}

impl TaskPriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskPriority::Low => "Low",
            TaskPriority::Medium => "Medium",
            TaskPriority::High => "High",
        }
    }
}

impl fmt::Display for TaskPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskPriority {
    type Err = FollowupError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "Low" => Ok(TaskPriority::Low),
            "Medium" => Ok(TaskPriority::Medium),
            "High" => Ok(TaskPriority::High),
            other => Err(FollowupError::validation_error(format!("未知的优先级: {other}"))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Task {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub assigned_to: Option<String>,
    pub status: TaskStatus,
    pub priority: TaskPriority,
    pub start_date: NaiveDate,
    pub due_date: NaiveDate,
    pub attempt_number: i32,
    pub max_attempts: i32,
    pub retry_interval_days: i32,
    pub lead_id: Option<i64>,
    pub previous_task_id: Option<i64>,
    pub retry_created: bool,
    /// 提醒扫描只读取此字段
    pub callback_at: Option<DateTime<Utc>>,
    pub callback_notification_sent: bool,
    /// 在原任务上记录的回调请求时间，不参与提醒扫描
    pub requested_callback_at: Option<DateTime<Utc>>,
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Task {
    /// 空值或 0 视为第一次尝试
    pub fn effective_attempt(&self) -> i32 {
        self.attempt_number.max(1)
    }

    pub fn effective_max_attempts(&self) -> i32 {
        if self.max_attempts > 0 {
            self.max_attempts
        } else {
            DEFAULT_MAX_ATTEMPTS
        }
    }

    pub fn effective_retry_interval(&self) -> i32 {
        if self.retry_interval_days > 0 {
            self.retry_interval_days
        } else {
            DEFAULT_RETRY_INTERVAL_DAYS
        }
    }

    pub fn assignee(&self) -> Option<&str> {
        self.assigned_to
            .as_deref()
            .filter(|user| !user.trim().is_empty())
    }

    pub fn entity_description(&self) -> String {
        format!(
            "跟进任务 '{}' (ID: {}, 状态: {}, 尝试: {}/{})",
            self.title,
            self.id,
            self.status,
            self.effective_attempt(),
            self.effective_max_attempts()
        )
    }
}

/// 待插入的任务，`id`/`version` 由存储分配
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewTask {
    pub title: String,
    pub description: String,
    pub assigned_to: Option<String>,
    pub status: TaskStatus,
    pub priority: TaskPriority,
    pub start_date: NaiveDate,
    pub due_date: NaiveDate,
    pub attempt_number: i32,
    pub max_attempts: i32,
    pub retry_interval_days: i32,
    pub lead_id: Option<i64>,
    pub previous_task_id: Option<i64>,
    pub callback_at: Option<DateTime<Utc>>,
}

impl NewTask {
    pub fn new<S: Into<String>>(title: S, start_date: NaiveDate, due_date: NaiveDate) -> Self {
        Self {
            title: title.into(),
            description: String::new(),
            assigned_to: None,
            status: TaskStatus::Todo,
            priority: TaskPriority::Medium,
            start_date,
            due_date,
            attempt_number: 1,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            retry_interval_days: DEFAULT_RETRY_INTERVAL_DAYS,
            lead_id: None,
            previous_task_id: None,
            callback_at: None,
        }
    }

    /// 按插入结果组装完整任务
    pub fn into_task(self, id: i64, now: DateTime<Utc>) -> Task {
        Task {
            id,
            title: self.title,
            description: self.description,
            assigned_to: self.assigned_to,
            status: self.status,
            priority: self.priority,
            start_date: self.start_date,
            due_date: self.due_date,
            attempt_number: self.attempt_number,
            max_attempts: self.max_attempts,
            retry_interval_days: self.retry_interval_days,
            lead_id: self.lead_id,
            previous_task_id: self.previous_task_id,
            retry_created: false,
            callback_at: self.callback_at,
            callback_notification_sent: false,
            requested_callback_at: None,
            version: 1,
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Assignment {
    pub id: i64,
    pub task_id: i64,
    pub allocated_to: String,
    pub description: String,
    pub priority: TaskPriority,
    pub status: AssignmentStatus,
    pub date: NaiveDate,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum AssignmentStatus {
    Open,
    Closed,
}

impl AssignmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssignmentStatus::Open => "Open",
            AssignmentStatus::Closed => "Closed",
        }
    }
}

impl FromStr for AssignmentStatus {
    type Err = FollowupError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Open" => Ok(AssignmentStatus::Open),
            "Closed" => Ok(AssignmentStatus::Closed),
            other => Err(FollowupError::InvalidStatus(format!("未知的分配状态: {other}"))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewAssignment {
    pub task_id: i64,
    pub allocated_to: String,
    pub description: String,
    pub priority: TaskPriority,
    pub date: NaiveDate,
}

impl NewAssignment {
    /// 任务有负责人时才生成分配记录
    pub fn for_task<S: Into<String>>(task: &Task, description: S) -> Option<Self> {
        task.assignee().map(|user| Self {
            task_id: task.id,
            allocated_to: user.to_string(),
            description: description.into(),
            priority: task.priority,
            date: task.start_date,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LeadComment {
    pub id: i64,
    pub lead_id: i64,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum EmailStatus {
    #[serde(rename = "Not Sent")]
    NotSent,
    #[serde(rename = "Sent")]
    Sent,
    #[serde(rename = "Error")]
    Error,
}

impl EmailStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EmailStatus::NotSent => "Not Sent",
            EmailStatus::Sent => "Sent",
            EmailStatus::Error => "Error",
        }
    }
}

impl FromStr for EmailStatus {
    type Err = FollowupError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Not Sent" => Ok(EmailStatus::NotSent),
            "Sent" => Ok(EmailStatus::Sent),
            "Error" => Ok(EmailStatus::Error),
            other => Err(FollowupError::InvalidStatus(format!("未知的邮件状态: {other}"))),
        }
    }
}

/// 记录引用，如 ("Lead", 12)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RecordRef {
    pub doctype: String,
    pub id: i64,
}

impl RecordRef {
    pub fn lead(id: i64) -> Self {
        Self {
            doctype: "Lead".to_string(),
            id,
        }
    }

    pub fn task(id: i64) -> Self {
        Self {
            doctype: "Task".to_string(),
            id,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EmailMessage {
    pub recipients: Vec<String>,
    pub subject: String,
    pub html_body: String,
    pub reference: Option<RecordRef>,
    /// None 表示立即发送
    pub send_after: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScheduledEmail {
    pub id: i64,
    pub recipients: Vec<String>,
    pub subject: String,
    pub html_body: String,
    pub reference: Option<RecordRef>,
    pub send_after: DateTime<Utc>,
    pub status: EmailStatus,
    pub sent_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl ScheduledEmail {
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.status == EmailStatus::NotSent && self.send_after <= now
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewAlert {
    pub for_user: String,
    pub subject: String,
    pub body: String,
    pub reference: Option<RecordRef>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Alert {
    pub id: i64,
    pub for_user: String,
    pub subject: String,
    pub body: String,
    pub reference: Option<RecordRef>,
    pub created_at: DateTime<Utc>,
    pub read: bool,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum JobKind {
    RetryCheck,
}

impl JobKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobKind::RetryCheck => "RetryCheck",
        }
    }
}

impl FromStr for JobKind {
    type Err = FollowupError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "RetryCheck" => Ok(JobKind::RetryCheck),
            other => Err(FollowupError::InvalidStatus(format!("未知的作业类型: {other}"))),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum JobStatus {
    Pending,
    Running,
    Done,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "Pending",
            JobStatus::Running => "Running",
            JobStatus::Done => "Done",
            JobStatus::Failed => "Failed",
        }
    }

    pub fn is_finished(&self) -> bool {
        matches!(self, JobStatus::Done | JobStatus::Failed)
    }
}

impl FromStr for JobStatus {
    type Err = FollowupError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Pending" => Ok(JobStatus::Pending),
            "Running" => Ok(JobStatus::Running),
            "Done" => Ok(JobStatus::Done),
            "Failed" => Ok(JobStatus::Failed),
            other => Err(FollowupError::InvalidStatus(format!("未知的作业状态: {other}"))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewDeferredJob {
    pub kind: JobKind,
    pub task_id: i64,
    pub dedupe_key: String,
    pub run_after: DateTime<Utc>,
}

impl NewDeferredJob {
    /// 重试检查作业，按 (线索, 尝试次数) 去重
    pub fn retry_check(task: &Task, lead_id: i64, run_after: DateTime<Utc>) -> Self {
        Self {
            kind: JobKind::RetryCheck,
            task_id: task.id,
            dedupe_key: retry_check_key(lead_id, task.effective_attempt()),
            run_after,
        }
    }
}

pub fn retry_check_key(lead_id: i64, attempt_number: i32) -> String {
    format!("retry-check:{lead_id}:{attempt_number}")
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DeferredJob {
    pub id: i64,
    pub kind: JobKind,
    pub task_id: i64,
    pub dedupe_key: String,
    pub run_after: DateTime<Utc>,
    pub status: JobStatus,
    pub attempts: i32,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserProfile {
    pub id: String,
    pub full_name: Option<String>,
    pub email: Option<String>,
}
