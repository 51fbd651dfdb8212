use row_store::{TableTarget, TargetAllowList};
use serde::{Deserialize, Deserializer, de};
use serde_json::error::Category;
use tracing::warn;

use crate::error_handler::AppError;

pub const DEFAULT_TABLE: &str = "legal_docs";
pub const DEFAULT_ID_COLUMN: &str = "id";
pub const DEFAULT_TEXT_COLUMN: &str = "chunk";
pub const DEFAULT_EMBED_COLUMN: &str = "embedding";
pub const DEFAULT_LIMIT: u64 = 500;

/// Optional request body for a backfill run.
///
/// Every field falls back to its default; unknown fields are ignored.
#[derive(Debug, Default, Deserialize)]
pub struct EmbedBackfillRequest {
    #[serde(default)]
    pub table: Option<String>,
    #[serde(default)]
    pub id_column: Option<String>,
    #[serde(default)]
    pub text_column: Option<String>,
    #[serde(default)]
    pub embed_column: Option<String>,
    #[serde(default, deserialize_with = "whole_number")]
    pub limit: Option<u64>,
}

/// Accepts `500` as well as `500.0`; fractions and negatives are rejected.
fn whole_number<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    let Some(n) = Option::<serde_json::Number>::deserialize(deserializer)? else {
        return Ok(None);
    };
    if let Some(v) = n.as_u64() {
        return Ok(Some(v));
    }
    match n.as_f64() {
        // Saturates above u64::MAX, which the range check then rejects.
        Some(f) if f >= 0.0 && f.fract() == 0.0 => Ok(Some(f as u64)),
        _ => Err(de::Error::custom(format!(
            "limit must be a non-negative whole number, got {n}"
        ))),
    }
}

/// A request resolved against the allow-list and limit cap.
#[derive(Debug, Clone, PartialEq)]
pub struct BackfillJob {
    pub target: TableTarget,
    pub limit: u32,
}

impl EmbedBackfillRequest {
    /// Parses the raw body.
    ///
    /// An empty body, `null`, or bytes that are not valid JSON resolve to all
    /// defaults. Valid JSON of the wrong shape is rejected.
    pub fn from_body(body: &[u8]) -> Result<Self, AppError> {
        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(Self::default());
        }

        match serde_json::from_slice::<Option<Self>>(body) {
            Ok(parsed) => Ok(parsed.unwrap_or_default()),
            Err(e) if matches!(e.classify(), Category::Syntax | Category::Eof) => {
                warn!(error = %e, "request body is not valid JSON; using defaults");
                Ok(Self::default())
            }
            Err(e) => Err(AppError::InvalidRequest(format!("invalid request body: {e}"))),
        }
    }

    /// Applies defaults, then checks the target against `allowed` and the
    /// limit against `1..=max_limit`. An omitted limit is capped at
    /// `max_limit` instead of being rejected.
    pub fn resolve(self, allowed: &TargetAllowList, max_limit: u32) -> Result<BackfillJob, AppError> {
        let table = self.table.as_deref().unwrap_or(DEFAULT_TABLE);
        let id_column = self.id_column.as_deref().unwrap_or(DEFAULT_ID_COLUMN);
        let text_column = self.text_column.as_deref().unwrap_or(DEFAULT_TEXT_COLUMN);
        let embed_column = self.embed_column.as_deref().unwrap_or(DEFAULT_EMBED_COLUMN);

        let target = allowed
            .find(table, id_column, text_column, embed_column)
            .cloned()
            .ok_or_else(|| {
                AppError::TargetNotAllowed(format!(
                    "{table}:{id_column}:{text_column}:{embed_column}"
                ))
            })?;

        let limit = match self.limit {
            Some(limit) if limit == 0 || limit > u64::from(max_limit) => {
                return Err(AppError::LimitOutOfRange {
                    limit,
                    max: max_limit,
                });
            }
            Some(limit) => limit as u32,
            None => DEFAULT_LIMIT.min(u64::from(max_limit)) as u32,
        };

        Ok(BackfillJob { target, limit })
    }
}
