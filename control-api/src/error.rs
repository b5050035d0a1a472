use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use stage_control::{StateTransitionError, TopologyError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error(transparent)]
    Topology(#[from] TopologyError),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<tokio::task::JoinError> for ApiError {
    fn from(e: tokio::task::JoinError) -> Self {
        ApiError::Internal(e.to_string())
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) | ApiError::Topology(TopologyError::Property(_)) => {
                StatusCode::BAD_REQUEST
            }
            ApiError::Topology(TopologyError::State(StateTransitionError::Timeout { .. })) => {
                StatusCode::GATEWAY_TIMEOUT
            }
            ApiError::Topology(_) | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Error response wrapper for ApiError
pub struct ApiErrorResponse(ApiError);

impl<E: Into<ApiError>> From<E> for ApiErrorResponse {
    fn from(e: E) -> Self {
        ApiErrorResponse(e.into())
    }
}

impl IntoResponse for ApiErrorResponse {
    fn into_response(self) -> Response {
        let status = self.0.status();
        if status.is_server_error() {
            tracing::error!("API error: {}", self.0);
        } else {
            tracing::warn!("API error: {}", self.0);
        }

        let message = match &self.0 {
            ApiError::Topology(e) => e.to_string(),
            other => other.to_string(),
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}
