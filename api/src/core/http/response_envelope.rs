use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use serde_json::Value;

/// Error body shared by every failing response.
///
/// `error` is a message string, or the upstream payload when one was
/// returned (provider failures); `code` is stable and machine-readable.
#[derive(Debug, Serialize)]
pub struct ApiErrorBody {
    pub error: Value,
    pub code: &'static str,
}

impl ApiErrorBody {
    pub fn new(code: &'static str, error: impl Into<Value>) -> Self {
        Self {
            error: error.into(),
            code,
        }
    }

    /// Convert to axum Response.
    pub fn into_response_with_status(self, status: StatusCode) -> Response {
        (status, Json(self)).into_response()
    }
}
