use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::debug;

/// Failures surfaced to HTTP clients as `{"success": false, "error": ...}`.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Missing or malformed required field.
    #[error("{0}")]
    Validation(String),
    /// Unknown session, or a lookup that produced nothing.
    #[error("{0}")]
    NotFound(String),
    /// Request body was not valid JSON for the endpoint.
    #[error("{}", .0.body_text())]
    MalformedBody(#[from] JsonRejection),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) | ApiError::MalformedBody(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        debug!("Request failed with {}: {}", status, self);
        let body = Json(json!({
            "success": false,
            "error": self.to_string(),
        }));
        (status, body).into_response()
    }
}
