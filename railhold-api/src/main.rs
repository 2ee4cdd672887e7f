use anyhow::Context;
use railhold_api::{app, AppState};
use std::net::SocketAddr;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "railhold_api=debug,railhold_booking=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = railhold_store::Config::load().context("Failed to load config")?;
    tracing::info!("Starting Railhold API on port {}", config.server.port);
    tracing::info!(
        delay_min_ms = config.retry.delay_min_ms,
        delay_max_ms = config.retry.delay_max_ms,
        session_reset_every = config.retry.session_reset_every,
        "Retry policy"
    );

    let app_state = AppState::from_config(&config);
    let restored = app_state.desk.restore_sessions().await;
    if !restored.is_empty() {
        tracing::info!("Restored stored logins for {:?}", restored);
    }

    let app = app(app_state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}
