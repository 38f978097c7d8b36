use std::sync::Arc;

use async_trait::async_trait;
use chrono::Duration;
use followup_domain::{
    entities::{EmailMessage, EmailStatus, RecordRef, ScheduledEmail},
    ports::{Clock, EmailTransport, NotificationDispatcher},
    repositories::EmailOutboxRepository,
    FollowupError, FollowupResult,
};
use followup_infrastructure::{LogTransport, OutboxDispatcher};
use followup_testing_utils::{at, FixedClock, InMemoryStore};

struct RejectingTransport;

#[async_trait]
impl EmailTransport for RejectingTransport {
    async fn deliver(&self, _email: &ScheduledEmail) -> FollowupResult<()> {
        Err(FollowupError::notification("relay unavailable"))
    }

    fn name(&self) -> &'static str {
        "rejecting"
    }
}

fn message(send_after: Option<chrono::DateTime<chrono::Utc>>) -> EmailMessage {
    EmailMessage {
        recipients: vec!["asha@example.com".to_string()],
        subject: "Thank You for Your Interest!".to_string(),
        html_body: "<p>Dear Asha,</p>".to_string(),
        reference: Some(RecordRef::lead(1)),
        send_after,
    }
}

fn dispatcher(
    store: &InMemoryStore,
    transport: Arc<dyn EmailTransport>,
    clock: Arc<FixedClock>,
) -> OutboxDispatcher {
    let store = Arc::new(store.clone());
    OutboxDispatcher::new(store.clone(), store, transport, clock)
}

#[tokio::test]
async fn test_immediate_email_is_flushed() {
    let store = InMemoryStore::new();
    let clock = Arc::new(FixedClock::new(at(2024, 3, 1, 9, 0)));
    let dispatcher = dispatcher(&store, Arc::new(LogTransport::new("noreply@example.com")), clock);

    dispatcher.send_email(&message(None)).await.unwrap();
    let report = dispatcher.flush_due_emails(10).await.unwrap();
    assert_eq!(report.sent, 1);
    assert_eq!(report.failed, 0);

    let emails = store.emails();
    assert_eq!(emails[0].status, EmailStatus::Sent);
    assert_eq!(emails[0].sent_at, Some(at(2024, 3, 1, 9, 0)));
}

#[tokio::test]
async fn test_scheduled_email_waits_for_send_after() {
    let store = InMemoryStore::new();
    let clock = Arc::new(FixedClock::new(at(2024, 3, 1, 9, 0)));
    let dispatcher = dispatcher(
        &store,
        Arc::new(LogTransport::new("noreply@example.com")),
        clock.clone(),
    );

    dispatcher
        .send_email(&message(Some(at(2024, 3, 16, 9, 0))))
        .await
        .unwrap();
    assert_eq!(dispatcher.flush_due_emails(10).await.unwrap().sent, 0);

    clock.advance(Duration::days(15));
    assert_eq!(dispatcher.flush_due_emails(10).await.unwrap().sent, 1);
    assert!(store.find_due(clock.now(), 10).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_transport_failure_marks_row_as_error() {
    let store = InMemoryStore::new();
    let clock = Arc::new(FixedClock::new(at(2024, 3, 1, 9, 0)));
    let dispatcher = dispatcher(&store, Arc::new(RejectingTransport), clock);

    dispatcher.send_email(&message(None)).await.unwrap();
    let report = dispatcher.flush_due_emails(10).await.unwrap();
    assert_eq!(report.sent, 0);
    assert_eq!(report.failed, 1);

    let emails = store.emails();
    assert_eq!(emails[0].status, EmailStatus::Error);
    assert!(emails[0].error.as_deref().unwrap().contains("relay unavailable"));

    // 失败的邮件不会被重复投递
    assert_eq!(dispatcher.flush_due_emails(10).await.unwrap().failed, 0);
}

#[tokio::test]
async fn test_alert_is_stored() {
    let store = InMemoryStore::new();
    let clock = Arc::new(FixedClock::new(at(2024, 3, 1, 9, 0)));
    let dispatcher = dispatcher(&store, Arc::new(LogTransport::new("noreply@example.com")), clock);

    let alert = followup_domain::entities::NewAlert {
        for_user: "agent@example.com".to_string(),
        subject: "🔔 Callback Reminder: Call".to_string(),
        body: "<p>Please prepare for the callback.</p>".to_string(),
        reference: Some(RecordRef::task(4)),
    };
    dispatcher.create_alert(&alert).await.unwrap();
    let alerts = store.alerts();
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].created_at, at(2024, 3, 1, 9, 0));
}
