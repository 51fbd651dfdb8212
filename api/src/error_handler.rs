use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use embedding_service::EmbeddingError;
use row_store::StoreError;
use serde_json::Value;
use thiserror::Error;

use crate::core::http::response_envelope::ApiErrorBody;

/// Public application error type.
#[derive(Debug, Error)]
pub enum AppError {
    // --- Boot / server ---
    #[error("failed to bind listener on {addr}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("server error")]
    Server(#[source] std::io::Error),

    // --- Request guards ---
    /// Required process configuration is absent or invalid.
    #[error("{0}")]
    ConfigMissing(String),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("{0}")]
    InvalidRequest(String),

    #[error("table target {0} is not allowed")]
    TargetNotAllowed(String),

    #[error("limit must be between 1 and {max}, got {limit}")]
    LimitOutOfRange { limit: u64, max: u32 },

    // --- Pipeline stages ---
    #[error("{0}")]
    StoreRead(#[source] StoreError),

    #[error("{0}")]
    Provider(#[source] EmbeddingError),

    #[error("{0}")]
    StoreWrite(#[source] StoreError),

    #[error("{0}")]
    Internal(String),
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            // 4xx
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::InvalidRequest(_)
            | AppError::TargetNotAllowed(_)
            | AppError::LimitOutOfRange { .. } => StatusCode::BAD_REQUEST,

            // 5xx
            AppError::ConfigMissing(_)
            | AppError::StoreRead(_)
            | AppError::Provider(_)
            | AppError::StoreWrite(_)
            | AppError::Internal(_)
            | AppError::Bind { .. }
            | AppError::Server(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            AppError::Bind { .. } => "BIND_ERROR",
            AppError::Server(_) => "SERVER_ERROR",
            AppError::ConfigMissing(_) => "CONFIG_MISSING",
            AppError::Unauthorized => "UNAUTHORIZED",
            AppError::InvalidRequest(_) => "INVALID_REQUEST",
            AppError::TargetNotAllowed(_) => "TARGET_NOT_ALLOWED",
            AppError::LimitOutOfRange { .. } => "LIMIT_OUT_OF_RANGE",
            AppError::StoreRead(_) => "STORE_READ_FAILED",
            AppError::Provider(_) => "PROVIDER_FAILED",
            AppError::StoreWrite(_) => "STORE_WRITE_FAILED",
            AppError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Value placed under `error` in the response body.
    ///
    /// Provider failures keep the provider's own payload; everything else is
    /// its message.
    fn error_value(&self) -> Value {
        match self {
            AppError::Provider(err) => err.payload(),
            other => Value::String(other.to_string()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        ApiErrorBody::new(self.error_code(), self.error_value())
            .into_response_with_status(self.status_code())
    }
}

/// Handy result alias used across handlers.
pub type AppResult<T> = Result<T, AppError>;
