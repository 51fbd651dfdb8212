mod telemetry;

use anyhow::Context;
use tracing::debug;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file if present.
    let dotenv = dotenvy::dotenv();

    telemetry::init("info").context("failed to install tracing subscriber")?;

    if let Err(err) = dotenv {
        debug!(error = %err, "no .env file loaded");
    }

    api::start().await.context("embedding backfill server failed")?;

    Ok(())
}
