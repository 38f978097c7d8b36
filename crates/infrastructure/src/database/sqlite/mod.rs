pub mod sqlite_deferred_job_repository;
pub mod sqlite_lead_repository;
pub mod sqlite_outbox_repository;
pub mod sqlite_task_repository;
pub mod sqlite_unit_of_work;
pub mod sqlite_user_directory;

pub use sqlite_deferred_job_repository::SqliteDeferredJobRepository;
pub use sqlite_lead_repository::{SqliteLeadCommentRepository, SqliteLeadRepository};
pub use sqlite_outbox_repository::SqliteOutboxRepository;
pub use sqlite_task_repository::{SqliteAssignmentRepository, SqliteTaskRepository};
pub use sqlite_unit_of_work::SqliteUnitOfWork;
pub use sqlite_user_directory::SqliteUserDirectory;

use std::sync::Arc;

use sqlx::SqlitePool;

/// 共享同一连接池的全部 SQLite 仓储
#[derive(Clone)]
pub struct SqliteStore {
    pub leads: Arc<SqliteLeadRepository>,
    pub tasks: Arc<SqliteTaskRepository>,
    pub assignments: Arc<SqliteAssignmentRepository>,
    pub comments: Arc<SqliteLeadCommentRepository>,
    pub unit_of_work: Arc<SqliteUnitOfWork>,
    pub jobs: Arc<SqliteDeferredJobRepository>,
    pub outbox: Arc<SqliteOutboxRepository>,
    pub users: Arc<SqliteUserDirectory>,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            leads: Arc::new(SqliteLeadRepository::new(pool.clone())),
            tasks: Arc::new(SqliteTaskRepository::new(pool.clone())),
            assignments: Arc::new(SqliteAssignmentRepository::new(pool.clone())),
            comments: Arc::new(SqliteLeadCommentRepository::new(pool.clone())),
            unit_of_work: Arc::new(SqliteUnitOfWork::new(pool.clone())),
            jobs: Arc::new(SqliteDeferredJobRepository::new(pool.clone())),
            outbox: Arc::new(SqliteOutboxRepository::new(pool.clone())),
            users: Arc::new(SqliteUserDirectory::new(pool)),
        }
    }
}
