//! Process-wide configuration and the shared state handed to handlers.
//!
//! # Environment variables
//! - `SUPABASE_URL` (or `NEXT_PUBLIC_SUPABASE_URL`), `SUPABASE_SERVICE_ROLE_KEY`,
//!   `OPENAI_API_KEY`, `EMBED_ADMIN_TOKEN`: required
//! - `EMBED_ALLOWED_TARGETS`: `table:id:text:embed[,..]`, default
//!   `legal_docs:id:chunk:embedding`
//! - `EMBED_MAX_LIMIT`: upper bound for a request's `limit`, default 2048
//! - store/provider tuning variables, see `row_store::config` and
//!   `embedding_service::config::default_config`

use embedding_service::{
    EmbeddingError, EmbeddingModelConfig, OpenAiService,
    config::default_config::config_openai_embedding_from,
};
use row_store::{RestRowStore, StoreConfig, StoreError, TargetAllowList};
use thiserror::Error;
use tracing::{error, info};

use crate::error_handler::{AppError, AppResult};

/// Allow-list used when `EMBED_ALLOWED_TARGETS` is unset.
pub const DEFAULT_ALLOWED_TARGETS: &str = "legal_docs:id:chunk:embedding";

/// Request limit cap used when `EMBED_MAX_LIMIT` is unset. Matches the
/// provider's per-request input cap.
pub const DEFAULT_MAX_LIMIT: u32 = 2048;

/// Startup configuration failures.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variables: {}", .0.join(", "))]
    MissingVars(Vec<&'static str>),

    #[error("invalid value in {var}: {reason}")]
    Invalid { var: &'static str, reason: String },

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Embedding(#[from] EmbeddingError),
}

/// Everything the backfill endpoint needs, validated once at startup.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Expected value of the `x-embed-token` header.
    pub guard_token: String,
    pub store: StoreConfig,
    pub embedding: EmbeddingModelConfig,
    pub allowed_targets: TargetAllowList,
    pub max_limit: u32,
}

impl AppConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through `lookup` (name → value).
    ///
    /// Every missing required variable is named in the error.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let present = |name: &str| lookup(name).is_some_and(|v| !v.trim().is_empty());

        let mut missing = Vec::new();
        if !present("SUPABASE_URL") && !present("NEXT_PUBLIC_SUPABASE_URL") {
            missing.push("SUPABASE_URL");
        }
        for name in ["SUPABASE_SERVICE_ROLE_KEY", "OPENAI_API_KEY", "EMBED_ADMIN_TOKEN"] {
            if !present(name) {
                missing.push(name);
            }
        }
        if !missing.is_empty() {
            return Err(ConfigError::MissingVars(missing));
        }

        let store = StoreConfig::from_lookup(&lookup)?;
        let embedding = config_openai_embedding_from(&lookup)?;
        let guard_token = lookup("EMBED_ADMIN_TOKEN")
            .map(|v| v.trim().to_string())
            .unwrap_or_default();

        let allowed_raw = lookup("EMBED_ALLOWED_TARGETS")
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_ALLOWED_TARGETS.to_string());
        let allowed_targets = TargetAllowList::parse("EMBED_ALLOWED_TARGETS", &allowed_raw)?;

        let max_limit = match lookup("EMBED_MAX_LIMIT").filter(|v| !v.trim().is_empty()) {
            Some(v) => match v.trim().parse::<u32>() {
                Ok(n) if n > 0 => n,
                _ => {
                    return Err(ConfigError::Invalid {
                        var: "EMBED_MAX_LIMIT",
                        reason: format!("expected a positive integer, got '{v}'"),
                    });
                }
            },
            None => DEFAULT_MAX_LIMIT,
        };

        Ok(Self {
            guard_token,
            store,
            embedding,
            allowed_targets,
            max_limit,
        })
    }
}

/// Clients and settings used by the backfill pipeline.
#[derive(Debug)]
pub struct Services {
    pub guard_token: String,
    pub store: RestRowStore,
    pub embedder: OpenAiService,
    pub allowed_targets: TargetAllowList,
    pub max_limit: u32,
}

impl Services {
    pub fn new(cfg: AppConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            guard_token: cfg.guard_token,
            store: RestRowStore::new(cfg.store)?,
            embedder: OpenAiService::new(cfg.embedding)?,
            allowed_targets: cfg.allowed_targets,
            max_limit: cfg.max_limit,
        })
    }
}

/// Shared state for all HTTP handlers.
///
/// A configuration failure does not stop the server: it is logged once at
/// startup and every request is answered with `CONFIG_MISSING`.
#[derive(Debug)]
pub enum AppState {
    Ready(Services),
    Misconfigured { reason: String },
}

impl AppState {
    /// Load shared state from environment variables.
    pub fn from_env() -> Self {
        Self::from_config(AppConfig::from_env())
    }

    pub fn from_config(cfg: Result<AppConfig, ConfigError>) -> Self {
        match cfg.and_then(Services::new) {
            Ok(services) => {
                let targets: Vec<String> = services
                    .allowed_targets
                    .targets()
                    .iter()
                    .map(ToString::to_string)
                    .collect();
                info!(
                    targets = ?targets,
                    max_limit = services.max_limit,
                    model = services.embedder.model(),
                    "embedding backfill configured"
                );
                AppState::Ready(services)
            }
            Err(err) => {
                error!(error = %err, "embedding backfill is not configured; requests will fail");
                AppState::Misconfigured {
                    reason: err.to_string(),
                }
            }
        }
    }

    pub fn services(&self) -> AppResult<&Services> {
        match self {
            AppState::Ready(services) => Ok(services),
            AppState::Misconfigured { reason } => Err(AppError::ConfigMissing(reason.clone())),
        }
    }
}
