//! API errors, rendered as `{"error", "status"}` JSON.
//!
//! Only request problems and a crashed run task surface here. A pipeline
//! that fails on the LLM or the device is still a 200 whose state carries
//! the error.

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use np_agent::pipeline::QueryError;
use serde_json::json;
use tokio::task::JoinError;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The request body or query text was unusable.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// The run task died before producing a state.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<QueryError> for ApiError {
    fn from(e: QueryError) -> Self {
        Self::BadRequest(e.to_string())
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::BadRequest(format!("invalid query body: {}", rejection.body_text()))
    }
}

impl From<JoinError> for ApiError {
    fn from(e: JoinError) -> Self {
        let reason = if e.is_panic() { "panicked" } else { "was cancelled" };
        tracing::error!(error = %e, "pipeline task ended without a result");
        Self::Internal(format!("pipeline run {reason}"))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match self {
            Self::BadRequest(msg) | Self::Internal(msg) => msg,
        };
        let body = json!({ "error": message, "status": status.as_u16() });
        (status, axum::Json(body)).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
