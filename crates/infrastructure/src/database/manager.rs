use std::str::FromStr;
use std::time::Duration;

use followup_config::DatabaseConfig;
use followup_errors::FollowupResult;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use tracing::{debug, info};

use super::migrations;

pub struct DatabaseManager {
    pool: SqlitePool,
}

impl DatabaseManager {
    pub async fn new(config: &DatabaseConfig) -> FollowupResult<Self> {
        let in_memory = config.url.contains(":memory:");
        let connect_options = SqliteConnectOptions::from_str(&config.url)?
            .create_if_missing(true)
            .foreign_keys(true)
            .busy_timeout(Duration::from_secs(config.connection_timeout_seconds));
        let connect_options = if in_memory {
            connect_options
        } else {
            connect_options.journal_mode(SqliteJournalMode::Wal)
        };

        // 内存库的每个连接都是独立数据库，只能使用单连接
        let max_connections = if in_memory { 1 } else { config.max_connections };
        let min_connections = config.min_connections.min(max_connections);

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .min_connections(min_connections)
            .acquire_timeout(Duration::from_secs(config.connection_timeout_seconds))
            .idle_timeout(Duration::from_secs(config.idle_timeout_seconds))
            .max_lifetime(Duration::from_secs(1800))
            .connect_with(connect_options)
            .await?;

        info!(
            database.url = %config.url,
            database.max_connections = max_connections,
            "SQLite 连接池已创建"
        );
        Ok(Self { pool })
    }

    /// 打开指定路径的嵌入式数据库并执行迁移
    pub async fn open_embedded(path: &str) -> FollowupResult<Self> {
        debug!("Creating embedded SQLite database at: {}", path);
        let config = DatabaseConfig {
            url: format!("sqlite://{path}"),
            ..DatabaseConfig::default()
        };
        let manager = Self::new(&config).await?;
        manager.migrate().await?;
        Ok(manager)
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn migrate(&self) -> FollowupResult<()> {
        migrations::run_migrations(&self.pool).await
    }

    pub async fn health_check(&self) -> FollowupResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}
