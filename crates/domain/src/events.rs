//! 领域事件
//!
//! 状态保存后由状态处理器派发

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::entities::{Task, TaskStatus};

/// 领域事件基础trait
pub trait DomainEvent: Send + Sync {
    fn event_id(&self) -> Uuid;
    fn event_type(&self) -> &str;
    fn occurred_at(&self) -> DateTime<Utc>;
    fn aggregate_id(&self) -> String;
}

/// 任务状态变更事件，只在状态值确实改变时产生
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskStatusChanged {
    pub id: Uuid,
    pub task: Task,
    pub old_status: TaskStatus,
    pub new_status: TaskStatus,
    pub occurred_at: DateTime<Utc>,
}

impl TaskStatusChanged {
    pub fn new(task: Task, old_status: TaskStatus, occurred_at: DateTime<Utc>) -> Self {
        let new_status = task.status;
        Self {
            id: Uuid::new_v4(),
            task,
            old_status,
            new_status,
            occurred_at,
        }
    }
}

impl DomainEvent for TaskStatusChanged {
    fn event_id(&self) -> Uuid {
        self.id
    }

    fn event_type(&self) -> &str {
        "TaskStatusChanged"
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        self.occurred_at
    }

    fn aggregate_id(&self) -> String {
        self.task.id.to_string()
    }
}
