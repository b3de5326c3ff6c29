use std::sync::Arc;

use aegis_server::{build_router, config, state::AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_env_filter("info").init();

    let cfg = config::load_config().unwrap_or_else(|err| {
        tracing::warn!("failed to load config.toml, using defaults: {err:#}");
        config::AppConfig::default()
    });

    let state = Arc::new(AppState::init(&cfg).await?);
    let app = build_router(state);

    let addr = cfg.server.bind.clone();
    tracing::info!("aegis-server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
