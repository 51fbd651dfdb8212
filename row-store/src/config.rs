//! Connection settings for the PostgREST endpoint.
//!
//! # Environment variables
//! - `SUPABASE_URL` or `NEXT_PUBLIC_SUPABASE_URL` = project URL (mandatory)
//! - `SUPABASE_SERVICE_ROLE_KEY`                  = key with write access (mandatory)
//! - `SUPABASE_TIMEOUT_SECS`                      = request timeout (optional, default 60)

use crate::errors::StoreError;

/// Default request timeout for store calls.
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Settings for [`crate::RestRowStore`].
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Project base URL, e.g. `https://abc.supabase.co`. `/rest/v1` is appended.
    pub base_url: String,
    /// Service role key, sent as both `apikey` and bearer token.
    pub service_key: String,
    /// Request timeout (in seconds).
    pub timeout_secs: Option<u64>,
}

impl StoreConfig {
    /// Loads the config through `lookup`, which maps a variable name to its
    /// value. Blank values count as missing.
    ///
    /// # Errors
    /// - [`StoreError::MissingVar`] for an absent URL or key
    /// - [`StoreError::InvalidFormat`] for a non-http(s) URL or a bad timeout
    pub fn from_lookup<F>(lookup: F) -> Result<Self, StoreError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let base_url = get("SUPABASE_URL")
            .or_else(|| get("NEXT_PUBLIC_SUPABASE_URL"))
            .ok_or(StoreError::MissingVar("SUPABASE_URL or NEXT_PUBLIC_SUPABASE_URL"))?;
        let base_url = base_url.trim().trim_end_matches('/').to_string();
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(StoreError::InvalidFormat {
                var: "SUPABASE_URL",
                reason: "must start with http:// or https://".into(),
            });
        }

        let service_key = get("SUPABASE_SERVICE_ROLE_KEY")
            .ok_or(StoreError::MissingVar("SUPABASE_SERVICE_ROLE_KEY"))?
            .trim()
            .to_string();

        let timeout_secs = match get("SUPABASE_TIMEOUT_SECS") {
            Some(v) => Some(v.trim().parse::<u64>().map_err(|_| StoreError::InvalidFormat {
                var: "SUPABASE_TIMEOUT_SECS",
                reason: "expected u64".into(),
            })?),
            None => None,
        };

        Ok(Self {
            base_url,
            service_key,
            timeout_secs,
        })
    }
}
