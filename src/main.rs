use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use courier_match::api;
use courier_match::config::Config;
use courier_match::engine::sweeper::run_expiration_sweeper;
use courier_match::error::AppError;
use courier_match::state::AppState;

#[tokio::main]
async fn main() -> Result<(), AppError> {
    let config = Config::from_env()?;

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(config.log_level.clone()))
        .with_target(false);
    if config.log_json {
        subscriber.json().init();
    } else {
        subscriber.compact().init();
    }

    let shared_state = Arc::new(AppState::new(&config));

    let app = api::rest::router(shared_state.clone());

    let sweeper = tokio::spawn(run_expiration_sweeper(
        shared_state.offers.clone(),
        config.sweep_interval(),
    ));

    let bind_addr = format!("0.0.0.0:{}", config.http_port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .map_err(|err| AppError::Internal(format!("failed to bind {bind_addr}: {err}")))?;

    tracing::info!(
        http_port = config.http_port,
        auto_accept_delay_ms = config.auto_accept_delay_ms,
        sweep_interval_secs = config.sweep_interval_secs,
        "http server started"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|err| AppError::Internal(format!("server error: {err}")))?;

    sweeper.abort();
    tracing::info!("http server stopped");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for shutdown signal");
    }
}
