use crate::error::ConfigError;
use anyhow::{Context, Result};
use directories::UserDirs;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

// ── Top-level config ─────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Where this config was loaded from (not serialized).
    #[serde(skip)]
    pub config_path: PathBuf,

    #[serde(default)]
    pub relay: RelayConfig,

    #[serde(default)]
    pub bot: BotConfig,

    #[serde(default)]
    pub links: LinksConfig,
}

// ── Relay ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayConfig {
    /// Relay host (default: 0.0.0.0)
    #[serde(default = "default_relay_host")]
    pub host: String,
    /// Relay port (default: 10000)
    #[serde(default = "default_relay_port")]
    pub port: u16,
    /// How long a command and its result stay addressable (default: 300)
    #[serde(default = "default_command_ttl_secs")]
    pub command_ttl_secs: u64,
    /// Interval between expiry sweeps (default: 5)
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
}

fn default_relay_host() -> String {
    "0.0.0.0".into()
}

fn default_relay_port() -> u16 {
    10000
}

fn default_command_ttl_secs() -> u64 {
    300
}

fn default_sweep_interval_secs() -> u64 {
    5
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            host: default_relay_host(),
            port: default_relay_port(),
            command_ttl_secs: default_command_ttl_secs(),
            sweep_interval_secs: default_sweep_interval_secs(),
        }
    }
}

// ── Discord bot ──────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotConfig {
    #[serde(default)]
    pub bot_token: String,
    #[serde(default)]
    pub guild_id: Option<String>,
    /// Falls back to the bot user id reported by READY.
    #[serde(default)]
    pub application_id: Option<String>,
    /// Base URL of the relay the bot submits to.
    #[serde(default = "default_server_url")]
    pub server_url: String,
    #[serde(default = "default_result_timeout_secs")]
    pub result_timeout_secs: u64,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_max_login_attempts")]
    pub max_login_attempts: u32,
}

fn default_server_url() -> String {
    "http://127.0.0.1:10000".into()
}

fn default_result_timeout_secs() -> u64 {
    10
}

fn default_poll_interval_ms() -> u64 {
    1000
}

fn default_max_login_attempts() -> u32 {
    3
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            bot_token: String::new(),
            guild_id: None,
            application_id: None,
            server_url: default_server_url(),
            result_timeout_secs: default_result_timeout_secs(),
            poll_interval_ms: default_poll_interval_ms(),
            max_login_attempts: default_max_login_attempts(),
        }
    }
}

// ── Account and server links ─────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinksConfig {
    /// Discord user id -> Roblox user id
    #[serde(default = "default_user_links")]
    pub users: HashMap<String, u64>,
    /// Discord channel id -> target server id
    #[serde(default = "default_channel_links")]
    pub channels: HashMap<String, String>,
    #[serde(default = "default_server_id")]
    pub default_server: String,
}

fn default_user_links() -> HashMap<String, u64> {
    HashMap::from([("1252626721522454574".to_string(), 1_346_667_455)])
}

fn default_channel_links() -> HashMap<String, String> {
    HashMap::from([(
        "1395135448522821632".to_string(),
        default_server_id(),
    )])
}

fn default_server_id() -> String {
    "main_server".into()
}

impl Default for LinksConfig {
    fn default() -> Self {
        Self {
            users: default_user_links(),
            channels: default_channel_links(),
            default_server: default_server_id(),
        }
    }
}

// ── Loading ──────────────────────────────────────────────────────

impl Config {
    /// `~/.cmdr-bridge/config.toml`, when a home directory is known.
    pub fn default_config_path() -> Option<PathBuf> {
        UserDirs::new().map(|u| u.home_dir().join(".cmdr-bridge").join("config.toml"))
    }

    /// Load from `path` (must exist) or the default location (may be absent),
    /// then apply environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(explicit) => Self::from_file(explicit)?,
            None => match Self::default_config_path() {
                Some(default) if default.exists() => Self::from_file(&default)?,
                _ => Self::default(),
            },
        };
        config.apply_env_overrides();
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .map_err(ConfigError::Io)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let mut config: Config = toml::from_str(&contents)
            .map_err(|e| ConfigError::Load(e.to_string()))
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        config.config_path = path.to_path_buf();
        Ok(config)
    }

    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|key| std::env::var(key).ok());
    }

    /// Variable names match the deployed bot (`DISCORD_TOKEN`,
    /// `GUILD_ID`, `SERVER_URL`, `PORT`) with `CMDR_*` aliases taking priority.
    pub fn apply_overrides_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let get = |primary: &str, fallback: &str| {
            lookup(primary)
                .or_else(|| lookup(fallback))
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        if let Some(url) = get("CMDR_SERVER_URL", "SERVER_URL") {
            self.bot.server_url = url;
        }

        if let Some(token) = get("CMDR_DISCORD_TOKEN", "DISCORD_TOKEN") {
            self.bot.bot_token = token;
        }

        if let Some(guild) = get("CMDR_GUILD_ID", "GUILD_ID") {
            self.bot.guild_id = Some(guild);
        }

        if let Some(app_id) = get("CLIENT_ID", "APPLICATION_ID") {
            self.bot.application_id = Some(app_id);
        }

        if let Some(port_str) = get("CMDR_RELAY_PORT", "PORT") {
            if let Ok(port) = port_str.parse::<u16>() {
                self.relay.port = port;
            } else {
                tracing::warn!(value = %port_str, "ignoring unparsable relay port override");
            }
        }

        if let Some(host) = get("CMDR_RELAY_HOST", "HOST") {
            self.relay.host = host;
        }
    }

    /// The bot cannot start without a token and a guild to register in.
    pub fn validate_bot(&self) -> std::result::Result<(), ConfigError> {
        if self.bot.bot_token.trim().is_empty() {
            return Err(ConfigError::Missing("DISCORD_TOKEN"));
        }
        if self
            .bot
            .guild_id
            .as_deref()
            .is_none_or(|guild| guild.trim().is_empty())
        {
            return Err(ConfigError::Missing("GUILD_ID"));
        }
        Ok(())
    }
}
