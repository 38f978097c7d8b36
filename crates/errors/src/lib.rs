use thiserror::Error;

#[derive(Debug, Error, Clone)]
pub enum FollowupError {
    #[error("数据库操作错误: {0}")]
    DatabaseOperation(String),
    #[error("线索未找到: {id}")]
    LeadNotFound { id: i64 },
    #[error("跟进任务未找到: {id}")]
    TaskNotFound { id: i64 },
    #[error("延迟作业未找到: {id}")]
    JobNotFound { id: i64 },
    #[error("并发修改冲突: 任务 {task_id} 已被其他调度修改")]
    ConcurrentModification { task_id: i64 },
    #[error("无效的任务状态: {0}")]
    InvalidStatus(String),
    #[error("不允许的状态迁移: {from} -> {to}")]
    InvalidTransition { from: String, to: String },
    #[error("通知发送失败: {0}")]
    Notification(String),
    #[error("序列化错误: {0}")]
    Serialization(String),
    #[error("配置错误: {0}")]
    Configuration(String),
    #[error("数据验证失败: {0}")]
    ValidationError(String),
    #[error("内部错误: {0}")]
    Internal(String),
}

pub type FollowupResult<T> = Result<T, FollowupError>;

impl FollowupError {
    pub fn database_error<S: Into<String>>(msg: S) -> Self {
        Self::DatabaseOperation(msg.into())
    }
    pub fn lead_not_found(id: i64) -> Self {
        Self::LeadNotFound { id }
    }
    pub fn task_not_found(id: i64) -> Self {
        Self::TaskNotFound { id }
    }
    pub fn conflict(task_id: i64) -> Self {
        Self::ConcurrentModification { task_id }
    }
    pub fn notification<S: Into<String>>(msg: S) -> Self {
        Self::Notification(msg.into())
    }
    pub fn config_error<S: Into<String>>(msg: S) -> Self {
        Self::Configuration(msg.into())
    }
    pub fn validation_error<S: Into<String>>(msg: S) -> Self {
        Self::ValidationError(msg.into())
    }
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            FollowupError::LeadNotFound { .. }
                | FollowupError::TaskNotFound { .. }
                | FollowupError::JobNotFound { .. }
        )
    }
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            FollowupError::Internal(_) | FollowupError::Configuration(_)
        )
    }
    /// 下一轮扫描可能自行恢复的错误
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            FollowupError::DatabaseOperation(_)
                | FollowupError::ConcurrentModification { .. }
                | FollowupError::Notification(_)
        )
    }
    /// 指标与日志使用的稳定标签
    pub fn as_label(&self) -> &'static str {
        match self {
            FollowupError::DatabaseOperation(_) => "persistence_failure",
            FollowupError::LeadNotFound { .. } | FollowupError::TaskNotFound { .. } => {
                "not_found"
            }
            FollowupError::JobNotFound { .. } => "job_not_found",
            FollowupError::ConcurrentModification { .. } => "conflict",
            FollowupError::InvalidStatus(_) => "invalid_status",
            FollowupError::InvalidTransition { .. } => "invalid_transition",
            FollowupError::Notification(_) => "notification_failure",
            FollowupError::Serialization(_) => "serialization",
            FollowupError::Configuration(_) => "configuration",
            FollowupError::ValidationError(_) => "validation",
            FollowupError::Internal(_) => "internal",
        }
    }
    pub fn user_message(&self) -> &str {
        match self {
            FollowupError::LeadNotFound { .. } => "请求的线索不存在",
            FollowupError::TaskNotFound { .. } => "请求的跟进任务不存在",
            FollowupError::InvalidStatus(_) => "任务状态无效",
            FollowupError::InvalidTransition { .. } => "当前状态不允许此操作",
            FollowupError::ValidationError(_) => "输入数据验证失败",
            FollowupError::ConcurrentModification { .. } => "记录已被修改，请刷新后重试",
            _ => "系统繁忙，请稍后重试",
        }
    }
}

impl From<sqlx::Error> for FollowupError {
    fn from(err: sqlx::Error) -> Self {
        FollowupError::DatabaseOperation(err.to_string())
    }
}

impl From<serde_json::Error> for FollowupError {
    fn from(err: serde_json::Error) -> Self {
        FollowupError::Serialization(err.to_string())
    }
}

impl From<anyhow::Error> for FollowupError {
    fn from(err: anyhow::Error) -> Self {
        FollowupError::Internal(err.to_string())
    }
}
