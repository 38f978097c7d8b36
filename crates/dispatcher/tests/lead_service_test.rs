mod common;

use followup_domain::entities::{NewLead, TaskPriority, TaskStatus};
use followup_errors::FollowupError;
use followup_testing_utils::{date, LeadBuilder};

use common::{Harness, AGENT};

#[tokio::test]
async fn test_new_lead_gets_first_contact_task() {
    let h = Harness::new();

    let intake = h
        .lead_service()
        .create_lead(&LeadBuilder::new().build_new())
        .await
        .unwrap();

    let task = &intake.first_task;
    assert_eq!(task.title, "Make First Contact");
    assert_eq!(
        task.description,
        format!("Task auto-created for lead {}", intake.lead.id)
    );
    assert_eq!(task.status, TaskStatus::Todo);
    assert_eq!(task.priority, TaskPriority::Medium);
    assert_eq!(task.start_date, date(2024, 3, 1));
    assert_eq!(task.due_date, date(2024, 3, 3));
    assert_eq!(task.attempt_number, 1);
    assert_eq!(task.max_attempts, 10);
    assert_eq!(task.retry_interval_days, 2);
    assert_eq!(task.lead_id, Some(intake.lead.id));
    assert_eq!(task.assigned_to.as_deref(), Some(AGENT));

    let assignments = h.store.assignments();
    assert_eq!(assignments.len(), 1);
    assert_eq!(assignments[0].description, "Task assigned: Make First Contact");
}

#[tokio::test]
async fn test_lead_without_owner_is_unassigned() {
    let h = Harness::new();
    let new_lead = NewLead {
        name: "LEAD-0099".to_string(),
        first_name: None,
        email: None,
        owner: None,
    };

    let intake = h.lead_service().create_lead(&new_lead).await.unwrap();

    assert_eq!(intake.first_task.assigned_to, None);
    assert!(h.store.assignments().is_empty());
}

#[tokio::test]
async fn test_blank_name_is_rejected() {
    let h = Harness::new();
    let new_lead = NewLead {
        name: "   ".to_string(),
        first_name: None,
        email: None,
        owner: None,
    };

    let err = h.lead_service().create_lead(&new_lead).await.unwrap_err();
    assert!(matches!(err, FollowupError::ValidationError(_)));
    assert!(h.store.all_tasks().is_empty());
}
