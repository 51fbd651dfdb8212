use serde::Serialize;

/// Response body returned after a backfill run.
#[derive(Debug, Serialize)]
pub struct EmbedBackfillResponse {
    /// Number of rows that received an embedding (0 when nothing was missing).
    pub updated: usize,
}
