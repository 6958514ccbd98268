//! Gateway service binary.

use anyhow::Result;
use gateway::{build_router, AppState, Config};
use tracing::{info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::default();
    let port = config.port;

    let platforms: Vec<String> = config
        .enabled_platforms()
        .iter()
        .map(ToString::to_string)
        .collect();
    if platforms.is_empty() {
        warn!("No platform credentials configured; all login routes will return 503");
    } else {
        info!(platforms = ?platforms, "Enabled platforms");
    }
    if !config.ai_configured() {
        warn!("GOOGLE_API_KEY not set; chat and instruction routes will return 503");
    }

    let state = AppState::new(config);
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port)).await?;
    info!(port, "Gateway listening");
    axum::serve(listener, app).await?;

    Ok(())
}
