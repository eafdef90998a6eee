use crate::config::LinksConfig;
use crate::error::BridgeError;
use std::collections::HashMap;

/// Static Discord → Roblox account table plus channel → server routing.
#[derive(Debug, Clone)]
pub struct AccountLinks {
    users: HashMap<String, u64>,
    channels: HashMap<String, String>,
    default_server: String,
}

impl AccountLinks {
    pub fn new(
        users: HashMap<String, u64>,
        channels: HashMap<String, String>,
        default_server: impl Into<String>,
    ) -> Self {
        Self {
            users,
            channels,
            default_server: default_server.into(),
        }
    }

    pub fn from_config(config: &LinksConfig) -> Self {
        Self::new(
            config.users.clone(),
            config.channels.clone(),
            config.default_server.clone(),
        )
    }

    pub fn roblox_user_id(&self, discord_user_id: &str) -> Result<u64, BridgeError> {
        self.users
            .get(discord_user_id)
            .copied()
            .ok_or_else(|| BridgeError::UnlinkedAccount {
                user_id: discord_user_id.to_string(),
            })
    }

    /// Explicit choice, then the channel's server, then the default.
    pub fn target_server(&self, explicit: Option<&str>, channel_id: &str) -> String {
        explicit
            .map(str::trim)
            .filter(|server| !server.is_empty())
            .map(str::to_string)
            .or_else(|| self.channels.get(channel_id).cloned())
            .unwrap_or_else(|| self.default_server.clone())
    }
}
