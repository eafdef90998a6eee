use super::handlers::{
    handle_enqueue, handle_get_result, handle_health, handle_pending_all,
    handle_pending_for_server, handle_status, handle_submit_result,
};
use super::store::{CommandStore, spawn_expiry_sweeper};
use super::{AppState, MAX_BODY_SIZE, REQUEST_TIMEOUT_SECS};

use crate::config::Config;
use anyhow::{Context, Result};
use axum::{
    Router,
    http::StatusCode,
    routing::{get, post},
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;

/// Bind `relay.host:relay.port` and serve until shutdown is requested.
pub async fn run_relay(config: Arc<Config>) -> Result<()> {
    let addr: SocketAddr = format!("{}:{}", config.relay.host, config.relay.port)
        .parse()
        .context("parse relay bind address")?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("bind relay socket {addr}"))?;

    run_relay_with_listener(listener, config).await
}

/// Run the relay from a pre-bound listener.
pub async fn run_relay_with_listener(
    listener: tokio::net::TcpListener,
    config: Arc<Config>,
) -> Result<()> {
    let local_addr = listener
        .local_addr()
        .context("get relay listener local address")?;

    let store = Arc::new(CommandStore::new(Duration::from_secs(
        config.relay.command_ttl_secs,
    )));
    let sweeper = spawn_expiry_sweeper(
        Arc::clone(&store),
        Duration::from_secs(config.relay.sweep_interval_secs),
    );

    print_relay_banner(&local_addr, &config);

    let app = build_app(AppState::new(store));
    let served = axum::serve(listener, app)
        .with_graceful_shutdown(crate::daemon::shutdown_signal())
        .await
        .context("serve HTTP relay");

    sweeper.abort();
    tracing::info!("relay stopped");
    served
}

fn print_relay_banner(addr: &SocketAddr, config: &Config) {
    tracing::info!(
        %addr,
        ttl_secs = config.relay.command_ttl_secs,
        sweep_secs = config.relay.sweep_interval_secs,
        "relay listening"
    );
    println!("Bridge relay running on {addr}");
    println!("  POST /api/command");
    println!("  GET  /api/commands/{{serverId}}");
    println!("  POST /api/result");
    println!("  GET  /api/result/{{commandId}}");
    println!("  GET  /health");
}

pub fn build_app(state: AppState) -> Router {
    Router::new()
        .route("/", get(handle_status))
        .route("/health", get(handle_health))
        .route("/api/command", post(handle_enqueue))
        .route("/api/commands", get(handle_pending_all))
        .route("/api/commands/{server_id}", get(handle_pending_for_server))
        .route("/api/result", post(handle_submit_result))
        .route("/api/result/{command_id}", get(handle_get_result))
        .with_state(state)
        .layer(RequestBodyLimitLayer::new(MAX_BODY_SIZE))
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            Duration::from_secs(REQUEST_TIMEOUT_SECS),
        ))
        .layer(CorsLayer::permissive())
}
