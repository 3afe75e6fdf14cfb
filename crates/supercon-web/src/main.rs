//! supercon - superconductor lookup server
//!
//! Run with: cargo run -p supercon-web

use tracing::info;
use tracing_subscriber::EnvFilter;

use supercon_web::config::Config;
use supercon_web::router::build_router;
use supercon_web::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // .env is optional
    let _ = dotenvy::dotenv();

    // Initialise structured logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("supercon=debug,info")),
        )
        .init();

    info!("Starting supercon {}", env!("CARGO_PKG_VERSION"));

    let config = Config::load()?;
    info!(
        provider = ?config.llm.provider,
        model = %config.llm.model,
        normalize_temperatures = config.query.normalize_temperatures,
        "Configuration loaded"
    );

    let state = AppState::from_config(&config)?;
    let app = build_router(state);

    let addr = config.server.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Server listening on http://{}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
