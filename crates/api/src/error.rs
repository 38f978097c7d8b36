use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use followup_errors::FollowupError;
use serde_json::json;
use tracing::{error, warn};

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("业务错误: {0}")]
    Followup(#[from] FollowupError),
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Followup(err) => match err {
                FollowupError::LeadNotFound { .. }
                | FollowupError::TaskNotFound { .. }
                | FollowupError::JobNotFound { .. } => StatusCode::NOT_FOUND,
                FollowupError::InvalidStatus(_) | FollowupError::ValidationError(_) => {
                    StatusCode::BAD_REQUEST
                }
                FollowupError::InvalidTransition { .. }
                | FollowupError::ConcurrentModification { .. } => StatusCode::CONFLICT,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }

    fn error_type(&self) -> &'static str {
        match self {
            ApiError::Followup(err) => err.as_label(),
        }
    }

    /// 返回给调用方的通用描述，细节只进日志
    fn public_message(&self) -> String {
        match self {
            ApiError::Followup(err) => err.user_message().to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!(error = %self, error_type = self.error_type(), "请求处理失败");
        } else {
            warn!(error = %self, error_type = self.error_type(), "请求被拒绝");
        }

        let body = Json(json!({
            "success": false,
            "error": self.public_message(),
            "error_type": self.error_type(),
            "code": status.as_u16(),
            "timestamp": chrono::Utc::now().to_rfc3339(),
        }));

        (status, body).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
