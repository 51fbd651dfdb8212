use std::{any::Any, env, sync::Arc};

pub mod core;
pub mod error_handler;
mod middleware_layer;
pub mod routes;

use axum::{
    Router, middleware,
    response::{IntoResponse, Response},
    routing::post,
};
use tokio::signal;
use tower_http::{catch_panic::CatchPanicLayer, trace::TraceLayer};
use tracing::{error, info};

use crate::{
    core::app_state::AppState,
    error_handler::AppError,
    routes::embed_backfill::embed_backfill_route::embed_backfill_route,
};

pub use middleware_layer::request_id::REQUEST_ID_HEADER;

/// Address used when `API_ADDRESS` is unset.
pub const DEFAULT_API_ADDRESS: &str = "0.0.0.0:3000";

/// Path of the backfill endpoint.
pub const EMBED_BACKFILL_PATH: &str = "/api/embed-legal";

/// Builds the application router around `state`.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route(EMBED_BACKFILL_PATH, post(embed_backfill_route))
        .layer(CatchPanicLayer::custom(panic_response))
        .layer(middleware::from_fn(middleware_layer::request_id::request_id))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn start() -> Result<(), AppError> {
    let host_url = env::var("API_ADDRESS")
        .ok()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_API_ADDRESS.to_string());

    // Configuration is validated here, once, before any request arrives.
    let state = Arc::new(AppState::from_env());
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(&host_url)
        .await
        .map_err(|source| AppError::Bind {
            addr: host_url.clone(),
            source,
        })?;

    info!(address = %host_url, path = EMBED_BACKFILL_PATH, "listening");

    // Start server with graceful shutdown on Ctrl+C
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(AppError::Server)?;

    Ok(())
}

/// Turns a handler panic into an `INTERNAL_ERROR` response.
fn panic_response(err: Box<dyn Any + Send + 'static>) -> Response {
    let message = if let Some(s) = err.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        (*s).to_string()
    } else {
        "handler panicked".to_string()
    };
    error!(%message, "handler panicked");
    AppError::Internal(message).into_response()
}

/// Returns a future that resolves when Ctrl+C is pressed
async fn shutdown_signal() {
    match signal::ctrl_c().await {
        Ok(()) => info!("shutdown signal received"),
        Err(e) => {
            // Without a signal handler, keep serving until the process is killed.
            error!(error = %e, "failed to listen for shutdown signal");
            std::future::pending::<()>().await;
        }
    }
}
