//! The backfill pipeline: select → embed → pair → upsert.
//!
//! Stages run strictly in sequence; each one's result gates the next. No
//! retries: a failing stage ends the run with its own error.

use embedding_service::EmbeddingError;
use row_store::{EmbeddingUpdate, Row, TableTarget};
use tracing::{info, warn};

use crate::{
    core::app_state::Services,
    error_handler::{AppError, AppResult},
};

/// Runs one backfill pass over `target` and returns the number of rows
/// updated.
///
/// An empty selection returns `0` without calling the provider.
pub async fn run_backfill(services: &Services, target: &TableTarget, limit: u32) -> AppResult<usize> {
    let rows = services
        .store
        .select_unembedded(target, limit)
        .await
        .map_err(AppError::StoreRead)?;

    if rows.is_empty() {
        info!(table = target.table(), "no rows missing embeddings");
        return Ok(0);
    }

    let texts: Vec<&str> = rows.iter().map(|row| row.text.as_str()).collect();
    let vectors = services
        .embedder
        .embed_batch(&texts)
        .await
        .map_err(AppError::Provider)?;

    let updates = pair_updates(rows, vectors)?;

    if let Err(err) = services.store.upsert_embeddings(target, &updates).await {
        warn!(
            table = target.table(),
            rows = updates.len(),
            "embeddings were computed but not stored"
        );
        return Err(AppError::StoreWrite(err));
    }

    info!(
        table = target.table(),
        updated = updates.len(),
        "backfill completed"
    );

    Ok(updates.len())
}

/// Pairs each row's id with the vector at the same position.
pub fn pair_updates(rows: Vec<Row>, vectors: Vec<Vec<f32>>) -> AppResult<Vec<EmbeddingUpdate>> {
    if rows.len() != vectors.len() {
        return Err(AppError::Provider(EmbeddingError::ShapeMismatch {
            expected: rows.len(),
            got: vectors.len(),
        }));
    }

    Ok(rows
        .into_iter()
        .zip(vectors)
        .map(|(row, embedding)| EmbeddingUpdate {
            id: row.id,
            embedding,
        })
        .collect())
}
