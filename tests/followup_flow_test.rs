use std::sync::Arc;
use std::time::Duration;

use followup_config::AppConfig;
use followup_domain::{
    entities::{LeadStatus, TaskStatus, UserProfile},
    repositories::*,
};
use followup_infrastructure::{DatabaseManager, SqliteStore};
use followup_testing_utils::{at, date, FixedClock, LeadBuilder};
use lead_followup::{AppMode, Application, FollowupServices, ShutdownManager};
use tempfile::TempDir;

struct TestSystem {
    _dir: TempDir,
    services: FollowupServices,
    clock: Arc<FixedClock>,
}

async fn setup() -> TestSystem {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("followup.db");
    let manager = DatabaseManager::open_embedded(path.to_str().unwrap())
        .await
        .unwrap();
    let clock = Arc::new(FixedClock::new(at(2024, 3, 1, 9, 0)));
    let services = FollowupServices::build(
        SqliteStore::new(manager.pool().clone()),
        &AppConfig::default(),
        clock.clone(),
    )
    .unwrap();

    TestSystem {
        _dir: dir,
        services,
        clock,
    }
}

fn temp_config(dir: &TempDir) -> AppConfig {
    let mut config = AppConfig::default();
    config.database.url = format!("sqlite:{}", dir.path().join("app.db").display());
    config.api.enabled = false;
    config
}

#[tokio::test]
async fn test_unreached_lead_is_retried_through_deferred_job() {
    let system = setup().await;
    let services = &system.services;

    let intake = services
        .leads
        .create_lead(&LeadBuilder::new().build_new())
        .await
        .unwrap();
    let first = intake.first_task;
    assert_eq!(first.due_date, date(2024, 3, 3));

    services
        .status_handler
        .change_task_status(first.id, TaskStatus::CallNotConnected)
        .await
        .unwrap();

    // 到期前作业不可认领
    let report = services.jobs.run_due_jobs().await.unwrap();
    assert_eq!(report.claimed, 0);

    system.clock.set(at(2024, 3, 3, 1, 0));
    let report = services.jobs.run_due_jobs().await.unwrap();
    assert_eq!(report.claimed, 1);
    assert_eq!(report.completed, 1);

    let tasks = services.store.tasks.find_by_lead(intake.lead.id).await.unwrap();
    assert_eq!(tasks.len(), 2);
    let retry = tasks.iter().find(|t| t.id != first.id).unwrap();
    assert_eq!(retry.attempt_number, 2);
    assert_eq!(retry.previous_task_id, Some(first.id));
    assert_eq!(retry.due_date, date(2024, 3, 5));
    assert_eq!(retry.title, "Retry Call - Attempt 2");

    // 同一日的扫描不会重复重试
    let sweep = services.retry.scan_and_process_due_retries().await.unwrap();
    assert_eq!(sweep.retried, 0);
}

#[tokio::test]
async fn test_interested_flow_delivers_email_via_outbox() {
    let system = setup().await;
    let services = &system.services;

    let intake = services
        .leads
        .create_lead(&LeadBuilder::new().build_new())
        .await
        .unwrap();
    services
        .status_handler
        .change_task_status(intake.first_task.id, TaskStatus::Interested)
        .await
        .unwrap();

    let lead = services
        .store
        .leads
        .find_by_id(intake.lead.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(lead.status, LeadStatus::Interested);

    let report = services.outbox.flush_due_emails(50).await.unwrap();
    assert_eq!(report.sent, 1);
    assert_eq!(report.failed, 0);

    let report = services.outbox.flush_due_emails(50).await.unwrap();
    assert_eq!(report.sent, 0);
}

#[tokio::test]
async fn test_not_interested_email_waits_until_send_after() {
    let system = setup().await;
    let services = &system.services;

    let intake = services
        .leads
        .create_lead(&LeadBuilder::new().build_new())
        .await
        .unwrap();
    services
        .status_handler
        .change_task_status(intake.first_task.id, TaskStatus::NotInterested)
        .await
        .unwrap();

    assert_eq!(services.outbox.flush_due_emails(50).await.unwrap().sent, 0);

    system.clock.set(at(2024, 3, 16, 9, 0));
    assert_eq!(services.outbox.flush_due_emails(50).await.unwrap().sent, 1);
}

#[tokio::test]
async fn test_callback_reminder_sent_once() {
    let system = setup().await;
    let services = &system.services;
    services
        .store
        .users
        .upsert_user(&UserProfile {
            id: "agent@example.com".to_string(),
            full_name: Some("Field Agent".to_string()),
            email: Some("agent@example.com".to_string()),
        })
        .await
        .unwrap();

    let intake = services
        .leads
        .create_lead(&LeadBuilder::new().build_new())
        .await
        .unwrap();
    let scheduled = services
        .callbacks
        .schedule_callback(intake.first_task.id, at(2024, 3, 1, 10, 15), None)
        .await
        .unwrap();

    // 09:20 时窗口为 [09:50, 10:20)，只有回调任务参与扫描
    system.clock.set(at(2024, 3, 1, 9, 20));
    let report = services.callbacks.notify_upcoming_callbacks().await.unwrap();
    assert_eq!(report.scanned, 1);
    assert_eq!(report.notified, 1);

    system.clock.advance(chrono::Duration::minutes(5));
    let report = services.callbacks.notify_upcoming_callbacks().await.unwrap();
    assert_eq!(report.notified, 0);

    let alerts = services
        .store
        .outbox
        .find_for_user("agent@example.com")
        .await
        .unwrap();
    assert_eq!(alerts.len(), 1);

    let original = services
        .store
        .tasks
        .find_by_id(intake.first_task.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(original.requested_callback_at, Some(at(2024, 3, 1, 10, 15)));
    assert!(!original.callback_notification_sent);

    let task = services
        .store
        .tasks
        .find_by_id(scheduled.task_id)
        .await
        .unwrap()
        .unwrap();
    assert!(task.callback_notification_sent);
    assert_eq!(services.outbox.flush_due_emails(50).await.unwrap().sent, 1);
}

#[tokio::test]
async fn test_one_shot_retry_sweep_mode() {
    let dir = tempfile::tempdir().unwrap();
    let app = Application::new(temp_config(&dir), AppMode::RetrySweep, None)
        .await
        .unwrap();
    app.run_once().await.unwrap();
}

#[tokio::test]
async fn test_worker_mode_stops_on_shutdown() {
    let dir = tempfile::tempdir().unwrap();
    let app = Application::new(temp_config(&dir), AppMode::Worker, None)
        .await
        .unwrap();

    let shutdown = ShutdownManager::new();
    let handle = {
        let shutdown = shutdown.clone();
        tokio::spawn(async move { app.run(&shutdown).await })
    };

    tokio::time::sleep(Duration::from_millis(50)).await;
    shutdown.shutdown();

    let result = tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("worker did not stop")
        .unwrap();
    assert!(result.is_ok());
}
