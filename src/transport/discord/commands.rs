use anyhow::Result;
use serde_json::json;

use super::http_client::DiscordHttpClient;
use super::types::InteractionCallbackType;

pub const ROBLOX_COMMAND: &str = "roblox";

/// Options of one `/roblox` invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RobloxInvocation {
    pub command: String,
    pub args: Option<String>,
    pub server: Option<String>,
}

impl RobloxInvocation {
    /// `command args` as the user typed it.
    pub fn display(&self) -> String {
        match self.args.as_deref() {
            Some(args) if !args.is_empty() => format!("{} {args}", self.command),
            _ => self.command.clone(),
        }
    }
}

pub fn build_guild_commands() -> Vec<serde_json::Value> {
    vec![json!({
        "name": ROBLOX_COMMAND,
        "description": "Execute a Roblox command",
        "type": 1,
        "options": [
            {
                "name": "command",
                "description": "The command to execute",
                "type": 3,
                "required": true
            },
            {
                "name": "args",
                "description": "Command arguments (space-separated)",
                "type": 3,
                "required": false
            },
            {
                "name": "server",
                "description": "Target server",
                "type": 3,
                "required": false
            }
        ]
    })]
}

fn string_option(data: &serde_json::Value, name: &str) -> Option<String> {
    data.get("options")
        .and_then(|opts| opts.as_array())
        .and_then(|opts| {
            opts.iter().find_map(|opt| {
                if opt.get("name")?.as_str()? == name {
                    opt.get("value")?.as_str().map(String::from)
                } else {
                    None
                }
            })
        })
}

pub fn extract_roblox_invocation(data: &serde_json::Value) -> Option<RobloxInvocation> {
    if data.get("name")?.as_str()? != ROBLOX_COMMAND {
        return None;
    }

    let command = string_option(data, "command")?;
    Some(RobloxInvocation {
        command,
        args: string_option(data, "args"),
        server: string_option(data, "server"),
    })
}

pub async fn defer_interaction(
    http: &DiscordHttpClient,
    interaction_id: &str,
    interaction_token: &str,
) -> Result<()> {
    http.create_interaction_response(
        interaction_id,
        interaction_token,
        InteractionCallbackType::DeferredChannelMessageWithSource as u8,
        None,
    )
    .await
}
