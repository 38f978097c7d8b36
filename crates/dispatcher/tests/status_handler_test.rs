mod common;

use chrono::Duration;
use followup_dispatcher::templates::{INTERESTED_SUBJECT, REENGAGEMENT_SUBJECT};
use followup_domain::entities::{retry_check_key, LeadStatus, RecordRef, TaskPriority, TaskStatus};
use followup_errors::FollowupError;
use followup_testing_utils::{date, FailPoint, LeadBuilder, RecordingNotifier, TaskBuilder};

use common::{Harness, AGENT};

fn seed_open_task(h: &Harness, status: TaskStatus) {
    h.seed_lead(1);
    h.store.insert_task(
        TaskBuilder::new()
            .with_id(10)
            .with_lead(Some(1))
            .with_status(status)
            .build(),
    );
}

#[tokio::test]
async fn test_interested_sends_one_email_and_schedules_followup() {
    let h = Harness::new();
    seed_open_task(&h, TaskStatus::Todo);

    let result = h
        .status_handler()
        .change_task_status(10, TaskStatus::Interested)
        .await
        .unwrap();
    assert!(result.changed());
    assert_eq!(result.task.status, TaskStatus::Interested);

    let emails = h.notifier.emails();
    assert_eq!(emails.len(), 1);
    assert_eq!(emails[0].subject, INTERESTED_SUBJECT);
    assert_eq!(emails[0].recipients, vec!["asha@example.com".to_string()]);
    assert_eq!(emails[0].send_after, None);
    assert_eq!(emails[0].reference, Some(RecordRef::lead(1)));

    let followups = h.store.children_of(10);
    assert_eq!(followups.len(), 1);
    let followup = &followups[0];
    assert_eq!(followup.title, "Follow-up with Interested Lead");
    assert_eq!(followup.due_date, date(2024, 3, 3));
    assert_eq!(followup.priority, TaskPriority::High);
    assert_eq!(followup.status, TaskStatus::Todo);
    assert_eq!(followup.assigned_to.as_deref(), Some(AGENT));

    let assignments = h.store.assignments();
    assert_eq!(assignments.len(), 1);
    assert_eq!(
        assignments[0].description,
        "Follow-up task assigned: Follow-up with Interested Lead"
    );

    assert_eq!(h.store.lead(1).unwrap().status, LeadStatus::Interested);
    let comments = h.store.comments_for(1);
    assert_eq!(
        comments[0].body,
        "Lead marked as 'Interested'. Welcome email sent, Follow-up task scheduled for 2024-03-03"
    );
    assert!(!h.store.task(10).unwrap().retry_created);
}

#[tokio::test]
async fn test_not_interested_defers_email_and_schedules_reengagement() {
    let h = Harness::new();
    seed_open_task(&h, TaskStatus::CallNotConnected);

    h.status_handler()
        .change_task_status(10, TaskStatus::NotInterested)
        .await
        .unwrap();

    let emails = h.notifier.emails_with_subject(REENGAGEMENT_SUBJECT);
    assert_eq!(emails.len(), 1);
    assert_eq!(
        emails[0].send_after,
        Some(h.clock_now() + Duration::days(15))
    );

    let followup = &h.store.children_of(10)[0];
    assert_eq!(followup.title, "Re-engage Not Interested Lead");
    assert_eq!(followup.due_date, date(2024, 3, 31));
    assert_eq!(followup.priority, TaskPriority::High);
    assert_eq!(followup.previous_task_id, Some(10));

    assert_eq!(h.store.lead(1).unwrap().status, LeadStatus::NotInterested);
    assert_eq!(
        h.store.comments_for(1)[0].body,
        "Lead marked as 'Not Interested'. Email scheduled for 2024-03-16, Follow-up task scheduled for 2024-03-31"
    );
}

#[tokio::test]
async fn test_call_not_connected_enqueues_retry_check() {
    let h = Harness::new();
    seed_open_task(&h, TaskStatus::InProgress);

    h.status_handler()
        .change_task_status(10, TaskStatus::CallNotConnected)
        .await
        .unwrap();

    let jobs = h.store.jobs();
    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0].dedupe_key, retry_check_key(1, 1));
    assert_eq!(jobs[0].task_id, 10);
    assert_eq!(jobs[0].run_after.date_naive(), date(2024, 3, 1));
    assert!(h.store.children_of(10).is_empty());
    assert!(!h.store.task(10).unwrap().retry_created);
}

#[tokio::test]
async fn test_same_status_saves_without_event() {
    let h = Harness::new();
    seed_open_task(&h, TaskStatus::Interested);

    let result = h
        .status_handler()
        .change_task_status(10, TaskStatus::Interested)
        .await
        .unwrap();

    assert!(!result.changed());
    assert_eq!(result.task.version, 2);
    assert!(h.notifier.emails().is_empty());
    assert!(h.store.children_of(10).is_empty());
}

#[tokio::test]
async fn test_terminal_status_rejects_transition() {
    let h = Harness::new();
    seed_open_task(&h, TaskStatus::Completed);

    let err = h
        .status_handler()
        .change_task_status(10, TaskStatus::Interested)
        .await
        .unwrap_err();

    assert!(matches!(err, FollowupError::InvalidTransition { .. }));
    assert_eq!(h.store.task(10).unwrap().status, TaskStatus::Completed);
}

#[tokio::test]
async fn test_unknown_task() {
    let h = Harness::new();
    let err = h
        .status_handler()
        .change_task_status(77, TaskStatus::Interested)
        .await
        .unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn test_task_without_lead_only_saves_status() {
    let h = Harness::new();
    h.store
        .insert_task(TaskBuilder::new().with_id(10).with_lead(None).build());

    let result = h
        .status_handler()
        .change_task_status(10, TaskStatus::Interested)
        .await
        .unwrap();

    assert!(result.changed());
    assert!(h.notifier.emails().is_empty());
    assert!(h.store.children_of(10).is_empty());
}

#[tokio::test]
async fn test_email_failure_keeps_followup() {
    let h = Harness::with_notifier(RecordingNotifier::failing_emails());
    seed_open_task(&h, TaskStatus::Todo);

    h.status_handler()
        .change_task_status(10, TaskStatus::Interested)
        .await
        .unwrap();

    assert_eq!(h.store.children_of(10).len(), 1);
    assert_eq!(h.store.lead(1).unwrap().status, LeadStatus::Interested);
}

#[tokio::test]
async fn test_lead_without_email_still_gets_followup() {
    let h = Harness::new();
    h.store.insert_lead(
        LeadBuilder::new()
            .with_id(1)
            .with_email(None)
            .build(),
    );
    h.store
        .insert_task(TaskBuilder::new().with_id(10).with_lead(Some(1)).build());

    h.status_handler()
        .change_task_status(10, TaskStatus::Interested)
        .await
        .unwrap();

    assert!(h.notifier.emails().is_empty());
    assert_eq!(h.store.children_of(10).len(), 1);
}

#[tokio::test]
async fn test_handler_failure_does_not_undo_status() {
    let h = Harness::new();
    seed_open_task(&h, TaskStatus::Todo);
    h.store.fail_on(FailPoint::TaskCreate);

    let result = h
        .status_handler()
        .change_task_status(10, TaskStatus::Interested)
        .await
        .unwrap();

    assert!(result.changed());
    assert_eq!(h.store.task(10).unwrap().status, TaskStatus::Interested);
    assert!(h.store.children_of(10).is_empty());
}

#[tokio::test]
async fn test_status_result_serializes_event() {
    let h = Harness::new();
    seed_open_task(&h, TaskStatus::Todo);

    let result = h
        .status_handler()
        .change_task_status(10, TaskStatus::InProgress)
        .await
        .unwrap();

    let json = serde_json::to_value(&result).unwrap();
    assert_eq!(json["task"]["status"], "In Progress");
    assert_eq!(json["event"]["old_status"], "Todo");
    assert_eq!(json["event"]["new_status"], "In Progress");
}
