//! Embedding provider client used by the backfill API.
//!
//! - [`services::open_ai_service::OpenAiService`]: batch `/v1/embeddings` calls
//! - [`config::default_config`]: env-driven [`EmbeddingModelConfig`] construction
//! - [`error_handler`]: unified [`EmbeddingError`] and config helpers

pub mod config;
pub mod error_handler;
pub mod services;

pub use config::embedding_model_config::EmbeddingModelConfig;
pub use error_handler::{ConfigError, EmbeddingError};
pub use services::open_ai_service::OpenAiService;
