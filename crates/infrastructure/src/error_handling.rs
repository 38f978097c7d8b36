//! Error handling for repository operations with rich context
//!
//! Every SQLite repository builds an `OperationContext` before touching the
//! pool and turns driver errors into `FollowupError` through
//! `RepositoryErrorHelpers`, so logs always carry entity and operation.

use chrono::{DateTime, Utc};
use followup_errors::FollowupError;
use sqlx::Error as SqlxError;
use std::fmt;
use tracing::{debug, error, instrument, warn};

/// Operation context for repository operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepositoryOperation {
    Create,
    Read,
    Update,
    Query,
    Claim,
    Commit,
}

impl fmt::Display for RepositoryOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RepositoryOperation::Create => write!(f, "创建"),
            RepositoryOperation::Read => write!(f, "查询"),
            RepositoryOperation::Update => write!(f, "更新"),
            RepositoryOperation::Query => write!(f, "批量查询"),
            RepositoryOperation::Claim => write!(f, "认领"),
            RepositoryOperation::Commit => write!(f, "事务提交"),
        }
    }
}

/// 仓储涉及的记录类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Lead,
    Task,
    Assignment,
    LeadComment,
    DeferredJob,
    ScheduledEmail,
    Alert,
    User,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EntityKind::Lead => "线索",
            EntityKind::Task => "跟进任务",
            EntityKind::Assignment => "任务分配",
            EntityKind::LeadComment => "线索备注",
            EntityKind::DeferredJob => "延迟作业",
            EntityKind::ScheduledEmail => "待发邮件",
            EntityKind::Alert => "站内提醒",
            EntityKind::User => "用户",
        };
        f.write_str(name)
    }
}

/// Context information for repository operations
#[derive(Debug, Clone)]
pub struct OperationContext {
    pub operation: RepositoryOperation,
    pub entity: EntityKind,
    pub entity_id: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub additional_info: Option<String>,
}

impl OperationContext {
    pub fn new(operation: RepositoryOperation, entity: EntityKind) -> Self {
        Self {
            operation,
            entity,
            entity_id: None,
            timestamp: Utc::now(),
            additional_info: None,
        }
    }

    pub fn with_id(mut self, id: impl fmt::Display) -> Self {
        self.entity_id = Some(id.to_string());
        self
    }

    pub fn with_additional_info(mut self, info: impl Into<String>) -> Self {
        self.additional_info = Some(info.into());
        self
    }

    pub fn entity_description(&self) -> String {
        match &self.entity_id {
            Some(id) => format!("{} (ID: {})", self.entity, id),
            None => self.entity.to_string(),
        }
    }
}

/// Enhanced error helpers for repository operations
pub struct RepositoryErrorHelpers;

impl RepositoryErrorHelpers {
    #[instrument(skip_all, fields(
        operation = %context.operation,
        entity = %context.entity,
        entity_id = ?context.entity_id,
        timestamp = %context.timestamp,
    ))]
    pub fn database_error(context: &OperationContext, error: SqlxError) -> FollowupError {
        let entity_desc = context.entity_description();
        let operation_desc = context.operation.to_string();

        let error_msg = match &error {
            SqlxError::Database(db_error) => {
                if db_error.is_unique_violation() {
                    format!(
                        "{}{}时发生唯一约束冲突: {}",
                        operation_desc, entity_desc, db_error
                    )
                } else if db_error.is_foreign_key_violation() {
                    format!(
                        "{}{}时引用的记录不存在: {}",
                        operation_desc, entity_desc, db_error
                    )
                } else {
                    format!("{}{}时发生数据库错误: {}", operation_desc, entity_desc, db_error)
                }
            }
            SqlxError::PoolClosed => {
                format!("{}{}时数据库连接池已关闭", operation_desc, entity_desc)
            }
            SqlxError::PoolTimedOut => {
                format!("{}{}时数据库连接池超时", operation_desc, entity_desc)
            }
            SqlxError::Io(io_error) => {
                format!("{}{}时发生I/O错误: {}", operation_desc, entity_desc, io_error)
            }
            _ => {
                format!("{}{}时发生未知数据库错误: {}", operation_desc, entity_desc, error)
            }
        };

        error!(error = %error, "{}", error_msg);
        FollowupError::database_error(error_msg)
    }

    pub fn serialization_error(context: &OperationContext, error: impl fmt::Display) -> FollowupError {
        let error_msg = format!(
            "{}{}时序列化失败: {}",
            context.operation,
            context.entity_description(),
            error
        );
        error!("{}", error_msg);
        FollowupError::Serialization(error_msg)
    }

    pub fn log_operation_success(context: &OperationContext, additional_info: Option<&str>) {
        let base_msg = format!("{}{}成功", context.operation, context.entity_description());
        match additional_info.or(context.additional_info.as_deref()) {
            Some(info) => debug!("{}: {}", base_msg, info),
            None => debug!("{}", base_msg),
        }
    }

    pub fn log_operation_warning(context: &OperationContext, message: &str) {
        warn!(
            operation = %context.operation,
            entity = %context.entity,
            entity_id = ?context.entity_id,
            "{}{}: {}",
            context.operation,
            context.entity_description(),
            message
        );
    }
}

/// Macro for creating operation context easily
#[macro_export]
macro_rules! repo_context {
    ($operation:expr, $entity:expr) => {
        $crate::error_handling::OperationContext::new($operation, $entity)
    };
    ($operation:expr, $entity:expr, id = $id:expr) => {
        $crate::error_handling::OperationContext::new($operation, $entity).with_id($id)
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_description() {
        let context = repo_context!(RepositoryOperation::Read, EntityKind::Task, id = 42);
        assert_eq!(context.entity_description(), "跟进任务 (ID: 42)");

        let context = repo_context!(RepositoryOperation::Query, EntityKind::DeferredJob);
        assert_eq!(context.entity_description(), "延迟作业");
    }

    #[test]
    fn test_database_error_message() {
        let context = repo_context!(RepositoryOperation::Update, EntityKind::Lead, id = 7);
        let err = RepositoryErrorHelpers::database_error(&context, SqlxError::PoolTimedOut);
        assert!(matches!(err, FollowupError::DatabaseOperation(_)));
        assert!(err.to_string().contains("更新线索 (ID: 7)时数据库连接池超时"));
    }
}
