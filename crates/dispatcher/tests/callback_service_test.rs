mod common;

use chrono::Duration;
use followup_dispatcher::templates::callback_email_subject;
use followup_domain::entities::{RecordRef, TaskPriority, TaskStatus};
use followup_errors::FollowupError;
use followup_testing_utils::{at, date, FailPoint, TaskBuilder};

use common::{Harness, AGENT};

fn seed_callback(h: &Harness, id: i64, assignee: Option<&str>, status: TaskStatus) {
    h.store.insert_task(
        TaskBuilder::new()
            .with_id(id)
            .with_title("Scheduled Callback - Make First Contact")
            .with_lead(Some(1))
            .with_assignee(assignee)
            .with_status(status)
            .with_callback_at(Some(at(2024, 3, 1, 10, 10)))
            .build(),
    );
}

#[tokio::test]
async fn test_schedule_callback_creates_linked_task() {
    let h = Harness::new();
    h.seed_lead(1);
    h.store.insert_task(TaskBuilder::new().with_id(10).with_lead(Some(1)).build());
    let callback_at = at(2024, 3, 2, 15, 30);

    let scheduled = h
        .callback_service()
        .schedule_callback(10, callback_at, Some("Asked to call after lunch"))
        .await
        .unwrap();

    let original = h.store.task(10).unwrap();
    assert_eq!(original.requested_callback_at, Some(callback_at));
    assert_eq!(original.callback_at, None);

    let callback = h.store.task(scheduled.task_id).unwrap();
    assert_eq!(callback.title, "Scheduled Callback - Make First Contact");
    assert_eq!(callback.status, TaskStatus::Todo);
    assert_eq!(callback.priority, TaskPriority::High);
    assert_eq!(callback.start_date, date(2024, 3, 2));
    assert_eq!(callback.due_date, date(2024, 3, 2));
    assert_eq!(callback.callback_at, Some(callback_at));
    assert!(!callback.callback_notification_sent);
    assert_eq!(callback.previous_task_id, Some(10));
    assert_eq!(callback.lead_id, Some(1));
    assert_eq!(
        callback.description,
        "Scheduled callback task.\n\nOriginal task: 10\n\nNotes: Asked to call after lunch"
    );

    let assignments = h.store.assignments();
    assert_eq!(assignments.len(), 1);
    assert_eq!(assignments[0].allocated_to, AGENT);
    assert_eq!(
        assignments[0].description,
        "Scheduled callback at 02 Mar 2024, 03:30 PM"
    );

    assert_eq!(
        h.store.comments_for(1)[0].body,
        format!(
            "Callback scheduled for 02 Mar 2024, 03:30 PM. Task: {}",
            scheduled.task_id
        )
    );
}

#[tokio::test]
async fn test_schedule_callback_defaults_notes() {
    let h = Harness::new();
    h.store.insert_task(
        TaskBuilder::new()
            .with_id(10)
            .with_lead(None)
            .with_assignee(None)
            .build(),
    );

    let scheduled = h
        .callback_service()
        .schedule_callback(10, at(2024, 3, 2, 15, 30), Some("  "))
        .await
        .unwrap();

    let callback = h.store.task(scheduled.task_id).unwrap();
    assert!(callback.description.ends_with("Notes: No additional notes"));
    assert!(h.store.assignments().is_empty());
}

#[tokio::test]
async fn test_schedule_callback_for_unknown_task() {
    let h = Harness::new();
    let err = h
        .callback_service()
        .schedule_callback(404, at(2024, 3, 2, 15, 30), None)
        .await
        .unwrap_err();
    assert!(err.is_not_found());
    assert!(h.store.all_tasks().is_empty());
}

#[tokio::test]
async fn test_scheduled_callback_produces_single_reminder() {
    let h = Harness::new();
    h.seed_lead(1);
    h.store.insert_task(TaskBuilder::new().with_id(10).with_lead(Some(1)).build());
    let service = h.callback_service();

    let scheduled = service
        .schedule_callback(10, at(2024, 3, 1, 10, 15), None)
        .await
        .unwrap();

    // 窗口 [09:50, 10:20)
    h.clock.set(at(2024, 3, 1, 9, 20));
    let report = service.notify_upcoming_callbacks().await.unwrap();
    assert_eq!(report.scanned, 1);
    assert_eq!(report.notified, 1);

    let alerts = h.notifier.alerts();
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].reference, Some(RecordRef::task(scheduled.task_id)));
    assert_eq!(h.notifier.emails().len(), 1);
    assert!(!h.store.task(10).unwrap().callback_notification_sent);
}

#[tokio::test]
async fn test_schedule_callback_rolls_back_on_failure() {
    for point in [
        FailPoint::TaskCreate,
        FailPoint::AssignmentCreate,
        FailPoint::CommentAppend,
    ] {
        let h = Harness::new();
        h.seed_lead(1);
        let original = h
            .store
            .insert_task(TaskBuilder::new().with_id(10).with_lead(Some(1)).build());
        h.store.fail_on(point);

        let result = h
            .callback_service()
            .schedule_callback(10, at(2024, 3, 2, 15, 30), None)
            .await;
        assert!(result.is_err(), "{point:?}");

        assert_eq!(h.store.task(10), Some(original), "{point:?}");
        assert_eq!(h.store.all_tasks().len(), 1, "{point:?}");
        assert!(h.store.assignments().is_empty(), "{point:?}");
        assert!(h.store.comments_for(1).is_empty(), "{point:?}");
    }
}

#[tokio::test]
async fn test_schedule_callback_conflicts_with_concurrent_write() {
    let h = Harness::new();
    h.seed_lead(1);
    h.store.insert_task(TaskBuilder::new().with_id(10).with_lead(Some(1)).build());
    h.store.fail_on(FailPoint::BumpVersionBeforeCommit);

    let err = h
        .callback_service()
        .schedule_callback(10, at(2024, 3, 2, 15, 30), None)
        .await
        .unwrap_err();

    assert!(matches!(err, FollowupError::ConcurrentModification { .. }));
    assert_eq!(h.store.task(10).unwrap().requested_callback_at, None);
    assert!(h.store.children_of(10).is_empty());
    assert!(h.store.comments_for(1).is_empty());
}

#[tokio::test]
async fn test_reminder_sent_once_inside_window() {
    let h = Harness::new();
    h.seed_lead(1);
    seed_callback(&h, 10, Some(AGENT), TaskStatus::Todo);
    let service = h.callback_service();

    // T - 70 分钟
    let report = service.notify_upcoming_callbacks().await.unwrap();
    assert_eq!(report.scanned, 0);
    assert!(h.notifier.alerts().is_empty());

    // T - 55 分钟
    h.clock.advance(Duration::minutes(15));
    let report = service.notify_upcoming_callbacks().await.unwrap();
    assert_eq!(report.notified, 1);
    assert!(h.store.task(10).unwrap().callback_notification_sent);

    let alerts = h.notifier.alerts();
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].for_user, AGENT);
    assert_eq!(alerts[0].reference, Some(RecordRef::task(10)));
    assert!(alerts[0].body.contains("01 Mar 2024, 10:10 AM"));
    assert!(alerts[0].body.contains("LEAD-0001"));

    let emails = h.notifier.emails();
    assert_eq!(emails.len(), 1);
    assert_eq!(emails[0].recipients, vec![AGENT.to_string()]);
    assert_eq!(
        emails[0].subject,
        callback_email_subject("Scheduled Callback - Make First Contact")
    );

    // T - 40 分钟
    h.clock.advance(Duration::minutes(15));
    let report = service.notify_upcoming_callbacks().await.unwrap();
    assert_eq!(report.notified, 0);
    assert_eq!(h.notifier.alerts().len(), 1);
    assert_eq!(h.notifier.emails().len(), 1);
}

#[tokio::test]
async fn test_window_end_is_exclusive() {
    let h = Harness::new();
    h.seed_lead(1);
    seed_callback(&h, 10, Some(AGENT), TaskStatus::Todo);
    // now + 60 分钟 == T
    h.clock.set(at(2024, 3, 1, 9, 10));

    let report = h.callback_service().notify_upcoming_callbacks().await.unwrap();
    assert_eq!(report.scanned, 0);

    h.clock.set(at(2024, 3, 1, 9, 11));
    let report = h.callback_service().notify_upcoming_callbacks().await.unwrap();
    assert_eq!(report.notified, 1);
}

#[tokio::test]
async fn test_email_resolved_through_directory() {
    let h = Harness::new();
    h.seed_lead(1);
    h.store.add_user("jdoe", Some("jdoe@corp.example"));
    h.store.add_user("nomail", None);
    seed_callback(&h, 10, Some("jdoe"), TaskStatus::Todo);
    seed_callback(&h, 11, Some("nomail"), TaskStatus::InProgress);
    h.clock.set(at(2024, 3, 1, 9, 15));

    let report = h.callback_service().notify_upcoming_callbacks().await.unwrap();

    assert_eq!(report.notified, 2);
    assert_eq!(h.notifier.alerts().len(), 2);
    let emails = h.notifier.emails();
    assert_eq!(emails.len(), 1);
    assert_eq!(emails[0].recipients, vec!["jdoe@corp.example".to_string()]);
}

#[tokio::test]
async fn test_terminal_and_unassigned_callbacks() {
    let h = Harness::new();
    h.seed_lead(1);
    seed_callback(&h, 10, Some(AGENT), TaskStatus::Completed);
    seed_callback(&h, 11, None, TaskStatus::Todo);
    h.clock.set(at(2024, 3, 1, 9, 15));

    let report = h.callback_service().notify_upcoming_callbacks().await.unwrap();

    assert_eq!(report.scanned, 1);
    assert!(h.notifier.alerts().is_empty());
    assert!(!h.store.task(10).unwrap().callback_notification_sent);
    assert!(h.store.task(11).unwrap().callback_notification_sent);
}

#[tokio::test]
async fn test_notification_failure_is_counted_and_not_repeated() {
    let h = Harness::new();
    h.seed_lead(1);
    seed_callback(&h, 10, Some(AGENT), TaskStatus::Todo);
    h.clock.set(at(2024, 3, 1, 9, 15));
    h.notifier.fail_alerts(true);
    let service = h.callback_service();

    let report = service.notify_upcoming_callbacks().await.unwrap();
    assert_eq!(report.failed, 1);
    assert_eq!(report.notified, 0);
    assert!(h.store.task(10).unwrap().callback_notification_sent);

    h.notifier.fail_alerts(false);
    let report = service.notify_upcoming_callbacks().await.unwrap();
    assert_eq!(report.scanned, 0);
    assert!(h.notifier.alerts().is_empty());
}
