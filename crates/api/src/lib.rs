//! # Followup API
//!
//! 线索跟进系统的 HTTP 接口，基于 Axum。
//!
//! - `POST /api/leads`、`GET /api/leads/{id}`
//! - `GET /api/tasks/{id}`、`POST /api/tasks/{id}/status`、`POST /api/tasks/{id}/callback`
//! - `POST /api/sweeps/retry`、`POST /api/sweeps/callbacks`
//! - `GET /health`、`GET /metrics`
//!
//! 错误统一返回 `{"success": false, "error": ...}`，具体原因只写入日志。

pub mod error;
pub mod handlers;
pub mod middleware;
pub mod response;
pub mod routes;

use std::time::Duration;

use axum::Router;
use followup_config::ApiConfig;
use tower::ServiceBuilder;
use tower_http::timeout::TimeoutLayer;

use middleware::{cors_layer, request_logging, trace_layer};
pub use routes::{create_routes, AppState};

/// 创建完整的API应用
pub fn create_app(state: AppState, api_config: &ApiConfig) -> Router {
    let router = create_routes(state).layer(
        ServiceBuilder::new()
            .layer(trace_layer())
            .layer(TimeoutLayer::new(Duration::from_secs(
                api_config.request_timeout_seconds,
            )))
            .layer(axum::middleware::from_fn(request_logging)),
    );

    if api_config.cors_enabled {
        router.layer(cors_layer(&api_config.cors_origins))
    } else {
        router
    }
}
