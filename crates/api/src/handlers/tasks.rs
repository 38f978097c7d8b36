use axum::{
    extract::{Path, State},
    response::IntoResponse,
    Json,
};
use chrono::{DateTime, Utc};
use followup_domain::entities::TaskStatus;
use followup_errors::FollowupError;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::{error::ApiResult, response::success, routes::AppState};

#[derive(Debug, Deserialize)]
pub struct ChangeStatusRequest {
    pub status: String,
}

#[derive(Debug, Deserialize)]
pub struct ScheduleCallbackRequest {
    pub callback_at: DateTime<Utc>,
    pub notes: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CallbackResponse {
    pub success: bool,
    pub task_id: i64,
    pub callback_at: DateTime<Utc>,
}

pub async fn get_task(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<impl IntoResponse> {
    let task = state
        .task_repo
        .find_by_id(id)
        .await?
        .ok_or(FollowupError::TaskNotFound { id })?;
    Ok(success(task))
}

/// 修改任务状态；状态值变化时触发对应分支处理
pub async fn change_status(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(request): Json<ChangeStatusRequest>,
) -> ApiResult<impl IntoResponse> {
    let status: TaskStatus = request.status.parse()?;
    let result = state.status_handler.change_task_status(id, status).await?;
    Ok(success(json!({
        "task": result.task,
        "changed": result.changed(),
    })))
}

/// 安排回调，返回 `{success, task_id}`
pub async fn schedule_callback(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(request): Json<ScheduleCallbackRequest>,
) -> ApiResult<Json<CallbackResponse>> {
    let scheduled = state
        .callbacks
        .schedule_callback(id, request.callback_at, request.notes.as_deref())
        .await?;
    Ok(Json(CallbackResponse {
        success: true,
        task_id: scheduled.task_id,
        callback_at: scheduled.callback_at,
    }))
}
