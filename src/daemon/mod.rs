//! Single-process mode: the relay and the Discord bot side by side.

use crate::bridge::RelayClient;
use crate::config::Config;
use crate::transport::discord::bot_from_config;
use anyhow::{Context, Result};
use std::future::Future;
use std::sync::Arc;
use tokio::task::JoinHandle;

mod supervisor;

use supervisor::spawn_component_supervisor;

const RELAY_INITIAL_BACKOFF_SECS: u64 = 1;
const RELAY_MAX_BACKOFF_SECS: u64 = 30;
const RELAY_MAX_RESTARTS: u32 = 10;

/// Resolves on Ctrl-C, or SIGTERM on unix.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
    tracing::info!("shutdown requested");
}

/// Relay under a restart supervisor, bot in the foreground. A bot failure
/// (exhausted login, fatal close) or a relay whose restarts ran out ends the
/// process with an error.
pub async fn run(config: Arc<Config>) -> Result<()> {
    let relay = RelayClient::from_config(&config).context("build relay client")?;
    let bot = Arc::new(bot_from_config(&config, Arc::new(relay))?);

    let relay_cfg = Arc::clone(&config);
    let relay_handle = spawn_component_supervisor(
        "relay",
        RELAY_INITIAL_BACKOFF_SECS,
        RELAY_MAX_BACKOFF_SECS,
        RELAY_MAX_RESTARTS,
        move || {
            let cfg = Arc::clone(&relay_cfg);
            async move { crate::transport::relay::run_relay(cfg).await }
        },
    );

    println!("◆ cmdr-bridge started");
    println!(
        "   relay on {}:{}",
        config.relay.host, config.relay.port
    );
    println!("   Ctrl+C to stop");

    supervise_until_exit(relay_handle, bot.run(), shutdown_signal()).await
}

/// Wait for the first of: the bot ending, the relay supervisor giving up, or
/// a shutdown request. The relay is aborted on the way out.
async fn supervise_until_exit(
    mut relay_handle: JoinHandle<()>,
    bot: impl Future<Output = Result<()>>,
    shutdown: impl Future<Output = ()>,
) -> Result<()> {
    let outcome = tokio::select! {
        result = bot => result,
        joined = &mut relay_handle => match joined {
            Ok(()) => Err(anyhow::anyhow!("relay stopped; shutting down bot")),
            Err(e) => Err(anyhow::anyhow!("relay supervisor task failed: {e}")),
        },
        () = shutdown => Ok(()),
    };

    relay_handle.abort();
    let _ = relay_handle.await;
    outcome
}
