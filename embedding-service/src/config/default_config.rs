//! Default embedding config loaded from environment variables.
//!
//! # Environment variables
//!
//! - `OPENAI_API_KEY`              = provider key (mandatory)
//! - `OPENAI_BASE_URL`             = API base (default `https://api.openai.com`)
//! - `OPENAI_EMBEDDING_MODEL`      = model (default `text-embedding-3-small`)
//! - `OPENAI_EMBEDDING_DIMENSIONS` = requested vector size (optional)
//! - `OPENAI_TIMEOUT_SECS`         = request timeout (optional, default 60)

use crate::{
    config::embedding_model_config::EmbeddingModelConfig,
    error_handler::{EmbeddingError, must_var, opt_u32, opt_u64, opt_var, validate_http_endpoint},
};

/// Model used when `OPENAI_EMBEDDING_MODEL` is not set.
pub const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-3-small";

/// API base used when `OPENAI_BASE_URL` is not set.
pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com";

/// Constructs the OpenAI embedding config through `lookup`.
///
/// # Errors
///
/// - [`crate::error_handler::ConfigError::MissingVar`] if `OPENAI_API_KEY` is absent
/// - [`crate::error_handler::ConfigError::InvalidFormat`] if `OPENAI_BASE_URL` has no http(s) scheme
/// - [`crate::error_handler::ConfigError::InvalidNumber`] for bad dimensions/timeout
pub fn config_openai_embedding_from<F>(lookup: F) -> Result<EmbeddingModelConfig, EmbeddingError>
where
    F: Fn(&str) -> Option<String>,
{
    let api_key = must_var(&lookup, "OPENAI_API_KEY")?;

    let endpoint = opt_var(&lookup, "OPENAI_BASE_URL")
        .unwrap_or_else(|| DEFAULT_OPENAI_BASE_URL.to_string());
    validate_http_endpoint("OPENAI_BASE_URL", &endpoint)?;

    let model = opt_var(&lookup, "OPENAI_EMBEDDING_MODEL")
        .unwrap_or_else(|| DEFAULT_EMBEDDING_MODEL.to_string());

    Ok(EmbeddingModelConfig {
        model,
        endpoint,
        api_key,
        dimensions: opt_u32(&lookup, "OPENAI_EMBEDDING_DIMENSIONS")?,
        timeout_secs: opt_u64(&lookup, "OPENAI_TIMEOUT_SECS")?,
    })
}
