//! Unified error type for the row-store crate.

use reqwest::StatusCode;
use thiserror::Error;

/// Errors produced while configuring or talking to the PostgREST endpoint.
#[derive(Debug, Error)]
pub enum StoreError {
    // ── Configuration / environment ──────────────────────────────────────────
    /// Required environment variable is missing or empty.
    #[error("missing env variable: {0}")]
    MissingVar(&'static str),

    /// Environment value had the wrong format.
    #[error("invalid value in {var}: {reason}")]
    InvalidFormat { var: &'static str, reason: String },

    /// Table or column name is not a plain SQL identifier.
    #[error("invalid identifier '{value}': {reason}")]
    InvalidIdentifier { value: String, reason: &'static str },

    // ── HTTP ────────────────────────────────────────────────────────────────
    /// Network / client failure before a response was received.
    #[error("{0}")]
    Transport(#[from] reqwest::Error),

    /// PostgREST answered with a non-success status.
    #[error("{message}")]
    Rejected { status: StatusCode, message: String },

    // ── Payload ─────────────────────────────────────────────────────────────
    /// Response payload did not have the expected shape.
    #[error("decode error: {0}")]
    Decode(String),
}

impl StoreError {
    /// Builds a [`StoreError::Rejected`] from a PostgREST error body.
    ///
    /// PostgREST reports `{ "message", "code", "details", "hint" }`; the
    /// `message` field is used when present, otherwise the raw body.
    pub(crate) fn rejected(status: StatusCode, body: &str) -> Self {
        let message = serde_json::from_str::<serde_json::Value>(body)
            .ok()
            .and_then(|v| v.get("message").and_then(|m| m.as_str()).map(str::to_owned))
            .unwrap_or_else(|| {
                let trimmed = body.trim();
                if trimmed.is_empty() {
                    format!("store returned {status}")
                } else {
                    trimmed.to_owned()
                }
            });
        StoreError::Rejected { status, message }
    }
}
