use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// `cmdr-bridge` - Discord slash commands for polling Roblox game servers.
#[derive(Parser, Debug)]
#[command(name = "cmdr-bridge")]
#[command(version)]
#[command(about = "Relay Discord slash commands to Roblox game servers.", long_about = None)]
pub struct Cli {
    /// Log at DEBUG instead of INFO
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Config file (default: ~/.cmdr-bridge/config.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the HTTP relay that game servers poll
    Relay {
        /// Port to listen on (use 0 for random available port)
        #[arg(short, long)]
        port: Option<u16>,

        /// Host to bind to
        #[arg(long)]
        host: Option<String>,
    },

    /// Start the Discord bot against an existing relay
    Bot,

    /// Start relay and bot in one process
    Run,
}
