use async_trait::async_trait;
use followup_domain::{entities::UserProfile, repositories::UserDirectory};
use followup_errors::FollowupResult;
use sqlx::SqlitePool;

use crate::{
    database::mapping::row_to_user,
    error_handling::{EntityKind, RepositoryErrorHelpers, RepositoryOperation},
    repo_context,
};

pub struct SqliteUserDirectory {
    pool: SqlitePool,
}

impl SqliteUserDirectory {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn upsert_user(&self, user: &UserProfile) -> FollowupResult<()> {
        let context = repo_context!(RepositoryOperation::Update, EntityKind::User, id = &user.id);
        sqlx::query(
            r#"
            INSERT INTO users (id, full_name, email) VALUES (?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET full_name = excluded.full_name, email = excluded.email
            "#,
        )
        .bind(&user.id)
        .bind(&user.full_name)
        .bind(&user.email)
        .execute(&self.pool)
        .await
        .map_err(|e| RepositoryErrorHelpers::database_error(&context, e))?;
        Ok(())
    }
}

#[async_trait]
impl UserDirectory for SqliteUserDirectory {
    async fn find_user(&self, id: &str) -> FollowupResult<Option<UserProfile>> {
        let context = repo_context!(RepositoryOperation::Read, EntityKind::User, id = id);
        let row = sqlx::query("SELECT * FROM users WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| RepositoryErrorHelpers::database_error(&context, e))?;

        row.as_ref().map(row_to_user).transpose()
    }
}
