use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::error;

use common::Error;

/// Error returned by route handlers, rendered as `{"error": "..."}`.
#[derive(Debug)]
pub enum ApiError {
    Core(Error),
    NotFound(String),
    Unauthorized,
}

impl From<Error> for ApiError {
    fn from(e: Error) -> Self {
        ApiError::Core(e)
    }
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::Core(Error::InvalidInput(_)) => StatusCode::BAD_REQUEST,
            ApiError::Core(Error::FeedUnavailable(_)) => StatusCode::BAD_GATEWAY,
            ApiError::Core(e) if e.is_store_unavailable() => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Core(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            ApiError::Core(e) => e.to_string(),
            ApiError::NotFound(what) => format!("{what} not found"),
            ApiError::Unauthorized => "missing or invalid API token".to_string(),
        };
        if status.is_server_error() {
            error!(%status, error = %message, "Request failed");
        }
        (status, Json(json!({ "error": message }))).into_response()
    }
}
