use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use followup_dispatcher::{CallbackService, LeadService, RetryService, TaskStatusHandler};
use followup_domain::repositories::{LeadCommentRepository, LeadRepository, TaskRepository};
use metrics_exporter_prometheus::PrometheusHandle;

use crate::handlers::{
    health::health_check,
    leads::{create_lead, get_lead},
    metrics::render_metrics,
    sweeps::{run_callback_sweep, run_retry_sweep},
    tasks::{change_status, get_task, schedule_callback},
};

/// API应用状态
#[derive(Clone)]
pub struct AppState {
    pub leads: Arc<LeadService>,
    pub status_handler: Arc<TaskStatusHandler>,
    pub callbacks: Arc<CallbackService>,
    pub retry: Arc<dyn RetryService>,
    pub lead_repo: Arc<dyn LeadRepository>,
    pub task_repo: Arc<dyn TaskRepository>,
    pub comment_repo: Arc<dyn LeadCommentRepository>,
    pub metrics: Option<PrometheusHandle>,
}

/// 创建API路由
pub fn create_routes(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/metrics", get(render_metrics))
        // 线索
        .route("/api/leads", post(create_lead))
        .route("/api/leads/{id}", get(get_lead))
        // 跟进任务
        .route("/api/tasks/{id}", get(get_task))
        .route("/api/tasks/{id}/status", post(change_status))
        .route("/api/tasks/{id}/callback", post(schedule_callback))
        // 手动触发扫描
        .route("/api/sweeps/retry", post(run_retry_sweep))
        .route("/api/sweeps/callbacks", post(run_callback_sweep))
        .with_state(state)
}
