use crate::cli::commands::{Cli, Commands};
use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::info;

use cmdr_bridge::Config;
use cmdr_bridge::bridge::RelayClient;
use cmdr_bridge::transport::discord::bot_from_config;

pub async fn dispatch(cli: Cli, mut config: Config) -> Result<()> {
    match cli.command {
        Commands::Relay { port, host } => {
            if let Some(port) = port {
                config.relay.port = port;
            }
            if let Some(host) = host {
                config.relay.host = host;
            }
            if config.relay.port == 0 {
                info!("Starting relay on {} (random port)", config.relay.host);
            } else {
                info!(
                    "Starting relay on {}:{}",
                    config.relay.host, config.relay.port
                );
            }
            cmdr_bridge::transport::relay::run_relay(Arc::new(config)).await
        }

        Commands::Bot => {
            let relay = RelayClient::from_config(&config).context("build relay client")?;
            let bot = Arc::new(bot_from_config(&config, Arc::new(relay))?);
            info!(server_url = %config.bot.server_url, "Starting Discord bot");
            tokio::select! {
                result = bot.run() => result,
                () = cmdr_bridge::daemon::shutdown_signal() => Ok(()),
            }
        }

        Commands::Run => {
            config.validate_bot()?;
            info!("Starting relay and Discord bot");
            cmdr_bridge::daemon::run(Arc::new(config)).await
        }
    }
}
