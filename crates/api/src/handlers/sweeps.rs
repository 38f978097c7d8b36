use axum::{extract::State, response::IntoResponse};

use crate::{error::ApiResult, response::success, routes::AppState};

/// 手动触发每日重试扫描
pub async fn run_retry_sweep(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    let report = state.retry.scan_and_process_due_retries().await?;
    Ok(success(report))
}

/// 手动触发回调提醒扫描
pub async fn run_callback_sweep(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    let report = state.callbacks.notify_upcoming_callbacks().await?;
    Ok(success(report))
}
