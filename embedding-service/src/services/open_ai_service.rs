//! OpenAI embeddings service.
//!
//! Minimal client around the OpenAI REST API. The endpoint is derived from
//! `EmbeddingModelConfig::endpoint`:
//! - POST {endpoint}/v1/embeddings: batch embeddings retrieval
//!
//! Constructor validation:
//! - `cfg.api_key` must be non-empty
//! - `cfg.model` must be non-empty
//! - `cfg.endpoint` must start with http:// or https://
//!
//! Errors are normalized via the unified types in `error_handler`.

use std::time::{Duration, Instant};

use reqwest::header;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::{
    config::embedding_model_config::EmbeddingModelConfig,
    error_handler::{ConfigError, EmbeddingError, HttpError, validate_http_endpoint},
};

/// Timeout used when the config does not set one.
const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Thin client for the OpenAI embeddings API.
///
/// Constructed from a complete [`EmbeddingModelConfig`]. Internally keeps a
/// preconfigured `reqwest::Client` (with timeout and default headers).
#[derive(Debug)]
pub struct OpenAiService {
    client: reqwest::Client,
    cfg: EmbeddingModelConfig,
    url_embeddings: String,
}

impl OpenAiService {
    /// Creates a new [`OpenAiService`] from the given config.
    ///
    /// # Errors
    /// - [`ConfigError::MissingVar`] if `cfg.api_key` is blank
    /// - [`ConfigError::EmptyModel`] if `cfg.model` is blank
    /// - [`ConfigError::InvalidFormat`] if `cfg.endpoint` has no http(s) scheme
    ///   or the key is not a valid header value
    /// - [`EmbeddingError::HttpTransport`] if the HTTP client cannot be built
    pub fn new(cfg: EmbeddingModelConfig) -> Result<Self, EmbeddingError> {
        // 1) API key and model must be present.
        if cfg.api_key.trim().is_empty() {
            return Err(ConfigError::MissingVar("OPENAI_API_KEY").into());
        }
        if cfg.model.trim().is_empty() {
            return Err(ConfigError::EmptyModel.into());
        }

        // 2) Endpoint must use http/https.
        let endpoint = cfg.endpoint.trim();
        validate_http_endpoint("OPENAI_BASE_URL", endpoint)?;

        // 3) HTTP client: timeout + default headers.
        let timeout = Duration::from_secs(cfg.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS));

        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            header::HeaderValue::from_str(&format!("Bearer {}", cfg.api_key.trim())).map_err(
                |_| ConfigError::InvalidFormat {
                    var: "OPENAI_API_KEY",
                    reason: "not a valid header value",
                },
            )?,
        );
        headers.insert(
            header::CONTENT_TYPE,
            header::HeaderValue::from_static("application/json"),
        );

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .build()?;

        let url_embeddings = format!("{}/v1/embeddings", endpoint.trim_end_matches('/'));

        info!(
            model = %cfg.model,
            endpoint = %cfg.endpoint,
            dimensions = ?cfg.dimensions,
            timeout_secs = timeout.as_secs(),
            "OpenAiService initialized"
        );

        Ok(Self {
            client,
            cfg,
            url_embeddings,
        })
    }

    /// Model identifier sent with every request.
    pub fn model(&self) -> &str {
        &self.cfg.model
    }

    /// Embeds `inputs` in one `/v1/embeddings` request.
    ///
    /// The returned vectors are positionally aligned with `inputs`: when the
    /// provider tags items with `index`, they are ordered by it; the count
    /// must equal `inputs.len()`. An empty batch makes no request.
    ///
    /// # Errors
    /// - [`EmbeddingError::HttpStatus`] for non-2xx responses (keeps the payload)
    /// - [`EmbeddingError::HttpTransport`] for client/network failures
    /// - [`EmbeddingError::Decode`] if the JSON cannot be parsed
    /// - [`EmbeddingError::ShapeMismatch`] if the vector count differs
    /// - [`EmbeddingError::DimensionMismatch`] if a vector has the wrong size
    pub async fn embed_batch(&self, inputs: &[&str]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        if inputs.is_empty() {
            return Ok(Vec::new());
        }

        let started = Instant::now();
        let body = EmbeddingsRequest {
            model: &self.cfg.model,
            input: inputs,
            dimensions: self.cfg.dimensions,
        };

        debug!(
            model = %self.cfg.model,
            batch = inputs.len(),
            input_chars = inputs.iter().map(|s| s.len()).sum::<usize>(),
            "POST {}", self.url_embeddings
        );

        let resp = self
            .client
            .post(&self.url_embeddings)
            .json(&body)
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let url = self.url_embeddings.clone();
            let text = body_or_empty(resp.text().await, &url);
            let http = HttpError::from_body(status, url, text);

            error!(
                %status,
                url = %http.url,
                snippet = %http.snippet,
                model = %self.cfg.model,
                latency_ms = started.elapsed().as_millis(),
                "OpenAI /v1/embeddings returned non-success status"
            );

            return Err(EmbeddingError::HttpStatus(http));
        }

        let out: EmbeddingsResponse = match resp.json().await {
            Ok(v) => v,
            Err(e) => {
                error!(
                    error = %e,
                    model = %self.cfg.model,
                    latency_ms = started.elapsed().as_millis(),
                    "failed to decode /v1/embeddings response"
                );
                return Err(EmbeddingError::Decode(format!(
                    "serde error: {e}; expected `data[].embedding`"
                )));
            }
        };

        let vectors = align(out.data, inputs.len(), self.cfg.dimensions)?;

        info!(
            model = %self.cfg.model,
            batch = vectors.len(),
            latency_ms = started.elapsed().as_millis(),
            "embeddings completed"
        );

        Ok(vectors)
    }
}

/// Body of a non-success response; a read failure is logged and treated as empty.
fn body_or_empty(body: Result<String, reqwest::Error>, url: &str) -> String {
    body.unwrap_or_else(|e| {
        warn!(error = %e, %url, "failed to read provider error body");
        String::new()
    })
}

/// Orders items by `index` when every item carries one, then checks count
/// and (optionally) dimensions.
fn align(
    mut data: Vec<EmbeddingItem>,
    expected: usize,
    dimensions: Option<u32>,
) -> Result<Vec<Vec<f32>>, EmbeddingError> {
    if data.len() != expected {
        return Err(EmbeddingError::ShapeMismatch {
            expected,
            got: data.len(),
        });
    }

    if data.iter().all(|item| item.index.is_some()) {
        data.sort_by_key(|item| item.index);
        // Sorted indices must be exactly 0..expected.
        if let Some((pos, got)) = data
            .iter()
            .enumerate()
            .find_map(|(pos, item)| item.index.filter(|&i| i != pos).map(|i| (pos, i)))
        {
            return Err(EmbeddingError::Decode(format!(
                "provider returned index {got} where {pos} was expected"
            )));
        }
    }

    let vectors: Vec<Vec<f32>> = data.into_iter().map(|item| item.embedding).collect();

    if let Some(dim) = dimensions {
        let dim = dim as usize;
        if let Some((index, v)) = vectors.iter().enumerate().find(|(_, v)| v.len() != dim) {
            return Err(EmbeddingError::DimensionMismatch {
                index,
                expected: dim,
                got: v.len(),
            });
        }
    }

    Ok(vectors)
}

/* ===========================================================================
HTTP payloads
======================================================================== */

/// Request body for `/v1/embeddings`.
#[derive(Debug, Serialize)]
struct EmbeddingsRequest<'a> {
    model: &'a str,
    input: &'a [&'a str],
    #[serde(skip_serializing_if = "Option::is_none")]
    dimensions: Option<u32>,
}

/// Response body for `/v1/embeddings`.
#[derive(Debug, Deserialize)]
struct EmbeddingsResponse {
    data: Vec<EmbeddingItem>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingItem {
    embedding: Vec<f32>,
    #[serde(default)]
    index: Option<usize>,
}
