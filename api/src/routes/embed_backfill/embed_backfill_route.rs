use std::sync::Arc;

use axum::{
    Json,
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use tracing::{Span, debug, error, info, instrument, warn};

use crate::{
    core::{app_state::AppState, backfill::run_backfill},
    error_handler::{AppError, AppResult},
    middleware_layer::request_id::REQUEST_ID_HEADER,
    routes::embed_backfill::{
        embed_backfill_request::EmbedBackfillRequest,
        embed_backfill_response::EmbedBackfillResponse,
    },
};

/// Header carrying the shared guard token.
pub const EMBED_TOKEN_HEADER: &str = "x-embed-token";

/// POST /api/embed-legal
///
/// Fills the embedding column of up to `limit` rows that have none. The
/// `x-embed-token` header must match the configured guard token; the optional
/// JSON body picks an allow-listed table target and the batch size.
#[instrument(
    name = "embed_backfill_route",
    skip(state, headers, body),
    fields(request_id = tracing::field::Empty)
)]
pub async fn embed_backfill_route(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if let Some(id) = headers.get(REQUEST_ID_HEADER).and_then(|h| h.to_str().ok()) {
        Span::current().record("request_id", id);
    }

    match handle(&state, &headers, &body).await {
        Ok(updated) => {
            info!(updated, "embed_backfill_route: success");
            (StatusCode::OK, Json(EmbedBackfillResponse { updated })).into_response()
        }
        Err(err) => {
            if err.status_code().is_server_error() {
                error!(code = err.error_code(), error = %err, "embed_backfill_route: failed");
            } else {
                warn!(code = err.error_code(), error = %err, "embed_backfill_route: rejected");
            }
            err.into_response()
        }
    }
}

async fn handle(state: &AppState, headers: &HeaderMap, body: &[u8]) -> AppResult<usize> {
    // Configuration first: a misconfigured server answers the same for everyone.
    let services = state.services()?;

    // --- Validate guard token ---------------------------------------------------
    let provided = headers
        .get(EMBED_TOKEN_HEADER)
        .and_then(|h| h.to_str().ok());
    if provided != Some(services.guard_token.as_str()) {
        return Err(AppError::Unauthorized);
    }

    // --- Resolve request --------------------------------------------------------
    let job = EmbedBackfillRequest::from_body(body)?
        .resolve(&services.allowed_targets, services.max_limit)?;

    debug!(table_target = %job.target, limit = job.limit, "starting backfill");

    run_backfill(services, &job.target, job.limit).await
}
