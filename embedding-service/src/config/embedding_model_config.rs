/// Configuration for an embeddings endpoint.
///
/// # Fields
///
/// - `model`: Model identifier (e.g., `"text-embedding-3-small"`).
/// - `endpoint`: API base URL; `/v1/embeddings` is appended.
/// - `api_key`: Bearer token for the provider.
/// - `dimensions`: Optional output size; sent to the provider and checked on
///   every returned vector.
/// - `timeout_secs`: Optional request timeout in seconds.
///
/// # Examples
///
/// ```
/// use embedding_service::config::embedding_model_config::EmbeddingModelConfig;
///
/// let cfg = EmbeddingModelConfig {
///     model: "text-embedding-3-small".to_string(),
///     endpoint: "https://api.openai.com".to_string(),
///     api_key: "sk-...".to_string(),
///     dimensions: None,
///     timeout_secs: Some(30),
/// };
/// assert_eq!(cfg.model, "text-embedding-3-small");
/// ```
#[derive(Debug, Clone)]
pub struct EmbeddingModelConfig {
    /// Model identifier string.
    pub model: String,

    /// Remote API base URL.
    pub endpoint: String,

    /// API key for authentication.
    pub api_key: String,

    /// Requested vector size (models that support shortening only).
    pub dimensions: Option<u32>,

    /// Optional request timeout (in seconds).
    pub timeout_secs: Option<u64>,
}
