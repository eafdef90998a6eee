//! Wire types shared by the relay server and its clients.
//!
//! Field names are camelCase on the wire; the Roblox game script and the
//! Discord bot both depend on them.

use serde::{Deserialize, Serialize};
use std::borrow::Cow;

/// A queued command as stored by the relay and handed to the game client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Command {
    pub id: String,
    #[serde(default)]
    pub discord_user_id: Option<String>,
    pub roblox_user_id: RobloxUserId,
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub server_id: Option<String>,
    /// Creation time, epoch milliseconds.
    pub timestamp: i64,
    /// Set once the command has been pulled by a game server.
    pub executed: bool,
}

/// Roblox ids arrive as JSON numbers from the bot, but hand-written clients
/// sometimes send them as strings. Both are preserved as sent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RobloxUserId {
    Numeric(u64),
    Text(String),
}

impl RobloxUserId {
    /// Zero and empty strings count as missing.
    pub fn is_blank(&self) -> bool {
        match self {
            Self::Numeric(id) => *id == 0,
            Self::Text(text) => text.trim().is_empty(),
        }
    }
}

impl std::fmt::Display for RobloxUserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Numeric(id) => write!(f, "{id}"),
            Self::Text(id) => f.write_str(id),
        }
    }
}

/// Body of `POST /api/command`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnqueueRequest {
    #[serde(default)]
    pub discord_user_id: Option<String>,
    #[serde(default)]
    pub roblox_user_id: Option<RobloxUserId>,
    #[serde(default)]
    pub command: Option<String>,
    #[serde(default)]
    pub args: Option<Vec<String>>,
    #[serde(default)]
    pub server_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnqueueResponse {
    pub command_id: String,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingCommands {
    pub commands: Vec<Command>,
}

/// Body of `POST /api/result`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultSubmission {
    #[serde(default)]
    pub command_id: Option<String>,
    #[serde(default)]
    pub success: bool,
    /// Any JSON the executor sends; tables and numbers are kept as-is.
    #[serde(default)]
    pub result: Option<serde_json::Value>,
    #[serde(default)]
    pub error: Option<serde_json::Value>,
}

/// A stored execution result, as returned by `GET /api/result/{id}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandResult {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<serde_json::Value>,
    /// Time the result was reported, epoch milliseconds.
    pub timestamp: i64,
}

impl CommandResult {
    /// Text shown to the Discord user: the result, else the error, else
    /// "No output". Non-string JSON is rendered compactly.
    pub fn display_text(&self) -> Cow<'_, str> {
        [self.result.as_ref(), self.error.as_ref()]
            .into_iter()
            .flatten()
            .find_map(|value| match value {
                serde_json::Value::Null => None,
                serde_json::Value::String(text) if text.is_empty() => None,
                serde_json::Value::String(text) => Some(Cow::Borrowed(text.as_str())),
                other => Some(Cow::Owned(other.to_string())),
            })
            .unwrap_or(Cow::Borrowed("No output"))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}
