use anyhow::{Context, Result};
use tracing_subscriber::EnvFilter;

use gh_assistant::api;
use gh_assistant::config::Config;
use gh_assistant::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::from_env();
    let bind_addr = config.bind_addr.clone();

    let state = AppState::new(config).context("Failed to initialize application state")?;
    let app = api::app(state);

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("Failed to bind {bind_addr}"))?;
    tracing::info!("gh-assistant listening on {bind_addr}");

    axum::serve(listener, app)
        .await
        .context("Server error")?;
    Ok(())
}
