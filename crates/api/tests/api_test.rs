use std::sync::Arc;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use followup_api::{create_routes, AppState};
use followup_config::{CallbackConfig, RetryConfig, StatusFlowConfig};
use followup_dispatcher::{
    CallbackService, LeadRetryService, LeadService, RetryService, TaskStatusHandler,
};
use followup_domain::entities::{LeadStatus, TaskStatus};
use followup_testing_utils::{
    at, FixedClock, InMemoryStore, LeadBuilder, RecordingNotifier, TaskBuilder,
};
use serde_json::{json, Value};
use tower::ServiceExt;

struct TestApp {
    router: Router,
    store: Arc<InMemoryStore>,
    notifier: Arc<RecordingNotifier>,
}

fn create_test_app() -> TestApp {
    let store = Arc::new(InMemoryStore::new());
    let notifier = Arc::new(RecordingNotifier::new());
    let clock = Arc::new(FixedClock::new(at(2024, 3, 1, 9, 0)));

    let retry: Arc<dyn RetryService> = Arc::new(LeadRetryService::new(
        store.clone(),
        store.clone(),
        store.clone(),
        clock.clone(),
        RetryConfig::default(),
    ));
    let state = AppState {
        leads: Arc::new(LeadService::new(
            store.clone(),
            store.clone(),
            store.clone(),
            clock.clone(),
            RetryConfig::default(),
        )),
        status_handler: Arc::new(TaskStatusHandler::new(
            store.clone(),
            store.clone(),
            store.clone(),
            store.clone(),
            store.clone(),
            notifier.clone(),
            clock.clone(),
            StatusFlowConfig::default(),
        )),
        callbacks: Arc::new(CallbackService::new(
            store.clone(),
            store.clone(),
            store.clone(),
            store.clone(),
            notifier.clone(),
            clock.clone(),
            &CallbackConfig::default(),
        )),
        retry,
        lead_repo: store.clone(),
        task_repo: store.clone(),
        comment_repo: store.clone(),
        metrics: None,
    };

    TestApp {
        router: create_routes(state),
        store,
        notifier,
    }
}

async fn send(
    router: &Router,
    method: &str,
    uri: &str,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, json)
}

#[tokio::test]
async fn test_health_check() {
    let app = create_test_app();
    let (status, body) = send(&app.router, "GET", "/health", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_metrics_without_recorder() {
    let app = create_test_app();
    let (status, _) = send(&app.router, "GET", "/metrics", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_create_and_get_lead() {
    let app = create_test_app();
    let (status, body) = send(
        &app.router,
        "POST",
        "/api/leads",
        Some(json!({
            "name": "LEAD-0042",
            "first_name": "Ravi",
            "email": "ravi@example.com",
            "owner": "agent@example.com"
        })),
    )
    .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["success"], true);
    assert_eq!(body["message"], "线索已创建，首次联系任务已生成");
    assert_eq!(body["data"]["first_task"]["title"], "Make First Contact");
    let lead_id = body["data"]["lead"]["id"].as_i64().unwrap();

    let (status, body) = send(&app.router, "GET", &format!("/api/leads/{lead_id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["lead"]["name"], "LEAD-0042");
    assert_eq!(body["data"]["tasks"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_blank_lead_name_is_bad_request() {
    let app = create_test_app();
    let (status, body) = send(
        &app.router,
        "POST",
        "/api/leads",
        Some(json!({ "name": " " })),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    assert_eq!(body["error_type"], "validation");
}

#[tokio::test]
async fn test_missing_records_are_not_found() {
    let app = create_test_app();

    let (status, body) = send(&app.router, "GET", "/api/tasks/999", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "请求的跟进任务不存在");

    let (status, _) = send(&app.router, "GET", "/api/leads/999", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_change_status_runs_interested_flow() {
    let app = create_test_app();
    app.store.insert_lead(LeadBuilder::new().with_id(1).build());
    app.store
        .insert_task(TaskBuilder::new().with_id(10).with_lead(Some(1)).build());

    let (status, body) = send(
        &app.router,
        "POST",
        "/api/tasks/10/status",
        Some(json!({ "status": "Interested" })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["changed"], true);
    assert_eq!(body["data"]["task"]["status"], "Interested");
    assert_eq!(app.notifier.emails().len(), 1);
    assert_eq!(app.store.lead(1).unwrap().status, LeadStatus::Interested);
}

#[tokio::test]
async fn test_change_status_rejects_unknown_and_terminal() {
    let app = create_test_app();
    app.store.insert_task(
        TaskBuilder::new()
            .with_id(10)
            .with_status(TaskStatus::Completed)
            .build(),
    );

    let (status, body) = send(
        &app.router,
        "POST",
        "/api/tasks/10/status",
        Some(json!({ "status": "Sleeping" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error_type"], "invalid_status");

    let (status, _) = send(
        &app.router,
        "POST",
        "/api/tasks/10/status",
        Some(json!({ "status": "Todo" })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_schedule_callback_endpoint() {
    let app = create_test_app();
    app.store.insert_lead(LeadBuilder::new().with_id(1).build());
    app.store
        .insert_task(TaskBuilder::new().with_id(10).with_lead(Some(1)).build());

    let (status, body) = send(
        &app.router,
        "POST",
        "/api/tasks/10/callback",
        Some(json!({ "callback_at": "2024-03-02T15:30:00Z", "notes": "after lunch" })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    let task_id = body["task_id"].as_i64().unwrap();
    assert_eq!(app.store.task(task_id).unwrap().previous_task_id, Some(10));

    let (status, body) = send(
        &app.router,
        "POST",
        "/api/tasks/404/callback",
        Some(json!({ "callback_at": "2024-03-02T15:30:00Z" })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["success"], false);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn test_manual_sweeps() {
    let app = create_test_app();
    app.store.insert_lead(LeadBuilder::new().with_id(1).build());
    app.store.insert_task(
        TaskBuilder::new()
            .with_id(10)
            .with_lead(Some(1))
            .with_status(TaskStatus::CallNotConnected)
            .build(),
    );

    let (status, body) = send(&app.router, "POST", "/api/sweeps/retry", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["retried"], 1);

    let (status, body) = send(&app.router, "POST", "/api/sweeps/callbacks", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["scanned"], 0);
}
