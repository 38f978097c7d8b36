use followup_errors::FollowupResult;
use sqlx::SqlitePool;
use tracing::debug;

const TABLES: [&str; 8] = [
    r#"
    CREATE TABLE IF NOT EXISTS leads (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL,
        first_name TEXT,
        email TEXT,
        owner TEXT,
        status TEXT NOT NULL DEFAULT 'New',
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS tasks (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        title TEXT NOT NULL,
        description TEXT NOT NULL DEFAULT '',
        assigned_to TEXT,
        status TEXT NOT NULL DEFAULT 'Todo',
        priority TEXT NOT NULL DEFAULT 'Medium',
        start_date TEXT NOT NULL,
        due_date TEXT NOT NULL,
        attempt_number INTEGER NOT NULL DEFAULT 1,
        max_attempts INTEGER NOT NULL DEFAULT 10,
        retry_interval_days INTEGER NOT NULL DEFAULT 2,
        lead_id INTEGER REFERENCES leads(id),
        previous_task_id INTEGER REFERENCES tasks(id),
        retry_created INTEGER NOT NULL DEFAULT 0,
        callback_at TEXT,
        callback_notification_sent INTEGER NOT NULL DEFAULT 0,
        requested_callback_at TEXT,
        version INTEGER NOT NULL DEFAULT 1,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS assignments (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        task_id INTEGER NOT NULL REFERENCES tasks(id),
        allocated_to TEXT NOT NULL,
        description TEXT NOT NULL,
        priority TEXT NOT NULL,
        status TEXT NOT NULL DEFAULT 'Open',
        date TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS lead_comments (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        lead_id INTEGER NOT NULL REFERENCES leads(id),
        body TEXT NOT NULL,
        created_at TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS deferred_jobs (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        kind TEXT NOT NULL,
        task_id INTEGER NOT NULL,
        dedupe_key TEXT NOT NULL UNIQUE,
        run_after TEXT NOT NULL,
        status TEXT NOT NULL DEFAULT 'Pending',
        attempts INTEGER NOT NULL DEFAULT 0,
        last_error TEXT,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS scheduled_emails (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        recipients TEXT NOT NULL,
        subject TEXT NOT NULL,
        html_body TEXT NOT NULL,
        reference_type TEXT,
        reference_id INTEGER,
        send_after TEXT NOT NULL,
        status TEXT NOT NULL DEFAULT 'Not Sent',
        sent_at TEXT,
        error TEXT,
        created_at TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS alerts (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        for_user TEXT NOT NULL,
        subject TEXT NOT NULL,
        body TEXT NOT NULL,
        reference_type TEXT,
        reference_id INTEGER,
        created_at TEXT NOT NULL,
        read INTEGER NOT NULL DEFAULT 0
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS users (
        id TEXT PRIMARY KEY,
        full_name TEXT,
        email TEXT
    )
    "#,
];

const INDEXES: [&str; 7] = [
    "CREATE INDEX IF NOT EXISTS idx_tasks_retry_scan ON tasks(status, due_date, retry_created)",
    "CREATE INDEX IF NOT EXISTS idx_tasks_callback_at ON tasks(callback_at)",
    "CREATE INDEX IF NOT EXISTS idx_tasks_lead_id ON tasks(lead_id)",
    "CREATE INDEX IF NOT EXISTS idx_assignments_task_id ON assignments(task_id)",
    "CREATE INDEX IF NOT EXISTS idx_lead_comments_lead_id ON lead_comments(lead_id)",
    "CREATE INDEX IF NOT EXISTS idx_deferred_jobs_due ON deferred_jobs(status, run_after)",
    "CREATE INDEX IF NOT EXISTS idx_scheduled_emails_due ON scheduled_emails(status, send_after)",
];

/// 运行数据库迁移，可重复执行
pub async fn run_migrations(pool: &SqlitePool) -> FollowupResult<()> {
    debug!("Running SQLite database migrations");

    for table_sql in TABLES {
        sqlx::query(table_sql).execute(pool).await?;
    }

    for index_sql in INDEXES {
        sqlx::query(index_sql).execute(pool).await?;
    }

    debug!("Successfully completed SQLite database migrations");
    Ok(())
}
