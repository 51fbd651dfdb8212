//! PostgREST client for the two table operations the backfill needs.
//!
//! Endpoints are derived from [`StoreConfig::base_url`]:
//! - GET  {base}/rest/v1/{table}?select={id},{text}&{embed}=is.null&limit={n}
//! - POST {base}/rest/v1/{table}?on_conflict={id}   (upsert, merge duplicates)
//!
//! Both calls authenticate with the service role key as `apikey` and bearer
//! token. Names in the URL come from a validated [`TableTarget`].

use std::time::{Duration, Instant};

use reqwest::header::{self, HeaderMap, HeaderValue};
use serde::ser::{Serialize, SerializeMap, Serializer};
use serde_json::{Map, Value};
use tracing::{debug, error, info, warn};

use crate::{
    config::{DEFAULT_TIMEOUT_SECS, StoreConfig},
    errors::StoreError,
    target::TableTarget,
};

/// One row selected for embedding.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    /// Primary key value, echoed back untouched on upsert.
    pub id: Value,
    /// Content to embed.
    pub text: String,
}

/// Identifier plus the vector computed for it.
#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddingUpdate {
    pub id: Value,
    pub embedding: Vec<f32>,
}

/// Thin async client around the PostgREST endpoint of one project.
#[derive(Debug, Clone)]
pub struct RestRowStore {
    client: reqwest::Client,
    rest_base: String,
}

impl RestRowStore {
    /// Builds the client with auth headers and the configured timeout.
    ///
    /// # Errors
    /// - [`StoreError::InvalidFormat`] if the key is not a valid header value
    /// - [`StoreError::Transport`] if the HTTP client cannot be built
    pub fn new(cfg: StoreConfig) -> Result<Self, StoreError> {
        let invalid_key = |_| StoreError::InvalidFormat {
            var: "SUPABASE_SERVICE_ROLE_KEY",
            reason: "not a valid header value".into(),
        };

        let mut headers = HeaderMap::new();
        headers.insert("apikey", HeaderValue::from_str(&cfg.service_key).map_err(invalid_key)?);
        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", cfg.service_key)).map_err(invalid_key)?,
        );

        let timeout = Duration::from_secs(cfg.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS));
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .build()?;

        let rest_base = format!("{}/rest/v1", cfg.base_url.trim_end_matches('/'));

        info!(
            rest_base = %rest_base,
            timeout_secs = timeout.as_secs(),
            "RestRowStore initialized"
        );

        Ok(Self { client, rest_base })
    }

    fn table_url(&self, target: &TableTarget) -> String {
        format!("{}/{}", self.rest_base, target.table())
    }

    /// Selects up to `limit` rows whose embedding column is null, projecting
    /// only the id and text columns.
    ///
    /// # Errors
    /// - [`StoreError::Transport`] for network failures
    /// - [`StoreError::Rejected`] for non-2xx responses
    /// - [`StoreError::Decode`] if a row lacks an id or has no string text
    pub async fn select_unembedded(
        &self,
        target: &TableTarget,
        limit: u32,
    ) -> Result<Vec<Row>, StoreError> {
        let started = Instant::now();
        let url = self.table_url(target);
        let select = format!("{},{}", target.id_column(), target.text_column());

        debug!(%url, %select, embed_column = target.embed_column(), limit, "GET rows missing embeddings");

        let resp = self
            .client
            .get(&url)
            .query(&[
                ("select", select.as_str()),
                (target.embed_column(), "is.null"),
            ])
            .query(&[("limit", limit)])
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = body_or_empty(resp.text().await, &url);
            let err = StoreError::rejected(status, &body);
            error!(
                %status,
                %url,
                error = %err,
                latency_ms = started.elapsed().as_millis(),
                "store select returned non-success status"
            );
            return Err(err);
        }

        let raw: Vec<Map<String, Value>> = resp
            .json()
            .await
            .map_err(|e| StoreError::Decode(format!("select response: {e}")))?;

        let rows = raw
            .into_iter()
            .map(|record| decode_row(target, record))
            .collect::<Result<Vec<_>, _>>()?;

        info!(
            table = target.table(),
            rows = rows.len(),
            latency_ms = started.elapsed().as_millis(),
            "selected rows missing embeddings"
        );

        Ok(rows)
    }

    /// Upserts `updates` in one request, keyed by the id column.
    ///
    /// # Errors
    /// - [`StoreError::Transport`] for network failures
    /// - [`StoreError::Rejected`] for non-2xx responses
    pub async fn upsert_embeddings(
        &self,
        target: &TableTarget,
        updates: &[EmbeddingUpdate],
    ) -> Result<(), StoreError> {
        if updates.is_empty() {
            return Ok(());
        }

        let started = Instant::now();
        let url = self.table_url(target);
        let body: Vec<UpsertRow<'_>> = updates
            .iter()
            .map(|update| UpsertRow { target, update })
            .collect();

        debug!(%url, rows = body.len(), "POST upsert embeddings");

        let resp = self
            .client
            .post(&url)
            .query(&[("on_conflict", target.id_column())])
            .header("Prefer", "resolution=merge-duplicates,return=minimal")
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let text = body_or_empty(resp.text().await, &url);
            let err = StoreError::rejected(status, &text);
            error!(
                %status,
                %url,
                error = %err,
                rows = updates.len(),
                latency_ms = started.elapsed().as_millis(),
                "store upsert returned non-success status"
            );
            return Err(err);
        }

        info!(
            table = target.table(),
            rows = updates.len(),
            latency_ms = started.elapsed().as_millis(),
            "upserted embeddings"
        );

        Ok(())
    }
}

fn decode_row(target: &TableTarget, mut record: Map<String, Value>) -> Result<Row, StoreError> {
    let id = match record.remove(target.id_column()) {
        Some(Value::Null) | None => {
            return Err(StoreError::Decode(format!(
                "row without a value in id column '{}'",
                target.id_column()
            )));
        }
        Some(id) => id,
    };

    let text = match record.remove(target.text_column()) {
        Some(Value::String(text)) => text,
        other => {
            return Err(StoreError::Decode(format!(
                "row {id} has {} in text column '{}', expected a string",
                json_kind(other.as_ref()),
                target.text_column()
            )));
        }
    };

    Ok(Row { id, text })
}

/// Body of a non-success response; a read failure is logged and treated as empty.
fn body_or_empty(body: Result<String, reqwest::Error>, url: &str) -> String {
    body.unwrap_or_else(|e| {
        warn!(error = %e, %url, "failed to read store error body");
        String::new()
    })
}

fn json_kind(value: Option<&Value>) -> &'static str {
    match value {
        None | Some(Value::Null) => "null",
        Some(Value::Bool(_)) => "a boolean",
        Some(Value::Number(_)) => "a number",
        Some(Value::String(_)) => "a string",
        Some(Value::Array(_)) => "an array",
        Some(Value::Object(_)) => "an object",
    }
}

/// Serializes one update as `{ <id_column>: id, <embed_column>: [..] }`.
struct UpsertRow<'a> {
    target: &'a TableTarget,
    update: &'a EmbeddingUpdate,
}

impl Serialize for UpsertRow<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(2))?;
        map.serialize_entry(self.target.id_column(), &self.update.id)?;
        map.serialize_entry(self.target.embed_column(), &self.update.embedding)?;
        map.end()
    }
}
