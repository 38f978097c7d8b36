use axum::{
    extract::{Path, State},
    response::IntoResponse,
    Json,
};
use followup_domain::entities::{Lead, LeadComment, NewLead, Task};
use followup_errors::FollowupError;
use serde::{Deserialize, Serialize};

use crate::{
    error::ApiResult,
    response::{created, success},
    routes::AppState,
};

#[derive(Debug, Deserialize)]
pub struct CreateLeadRequest {
    pub name: String,
    pub first_name: Option<String>,
    pub email: Option<String>,
    pub owner: Option<String>,
}

impl From<CreateLeadRequest> for NewLead {
    fn from(request: CreateLeadRequest) -> Self {
        NewLead {
            name: request.name.trim().to_string(),
            first_name: request.first_name,
            email: request.email,
            owner: request.owner,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct LeadDetail {
    pub lead: Lead,
    pub tasks: Vec<Task>,
    pub comments: Vec<LeadComment>,
}

/// 登记线索并创建首次联系任务
pub async fn create_lead(
    State(state): State<AppState>,
    Json(request): Json<CreateLeadRequest>,
) -> ApiResult<impl IntoResponse> {
    let intake = state.leads.create_lead(&request.into()).await?;
    Ok(created(intake, "线索已创建，首次联系任务已生成"))
}

pub async fn get_lead(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<impl IntoResponse> {
    let lead = state
        .lead_repo
        .find_by_id(id)
        .await?
        .ok_or(FollowupError::LeadNotFound { id })?;
    let tasks = state.task_repo.find_by_lead(id).await?;
    let comments = state.comment_repo.find_by_lead(id).await?;

    Ok(success(LeadDetail {
        lead,
        tasks,
        comments,
    }))
}
