//! Discord API constants and type definitions.

/// Discord API base URL (v10).
pub const API_BASE: &str = "https://discord.com/api/v10";

/// Default Gateway intents bitmask.
///
/// GUILDS (1) | `GUILD_MESSAGES` (512) = 513. No privileged intents.
pub const DEFAULT_INTENTS: u64 = 513;

/// Default heartbeat interval when server does not provide one (ms).
pub const DEFAULT_HEARTBEAT_INTERVAL_MS: u64 = 41250;

/// How long a fresh connection may take to deliver READY.
pub const READY_TIMEOUT_SECS: u64 = 30;

/// Discord limit on a single embed field value.
pub const MAX_EMBED_FIELD_LENGTH: usize = 1024;

/// Close code: the bot token was rejected.
pub const CLOSE_AUTHENTICATION_FAILED: u16 = 4004;
/// Close code: the session requested intents the application may not use.
pub const CLOSE_DISALLOWED_INTENTS: u16 = 4014;
/// Close code: intents bitmask is malformed.
pub const CLOSE_INVALID_INTENTS: u16 = 4013;

/// Close codes after which reconnecting cannot succeed.
pub fn is_fatal_close_code(code: u16) -> bool {
    matches!(
        code,
        CLOSE_AUTHENTICATION_FAILED | CLOSE_INVALID_INTENTS | CLOSE_DISALLOWED_INTENTS
    )
}

/// Gateway opcodes used in the Discord WebSocket protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum GatewayOpcode {
    /// An event was dispatched (server → client).
    Dispatch = 0,
    /// Fired periodically to keep the connection alive.
    Heartbeat = 1,
    /// Starts a new session during the initial handshake.
    Identify = 2,
    /// Resume a previous session that was disconnected.
    Resume = 6,
    /// Server is telling the client to reconnect.
    Reconnect = 7,
    /// The session has been invalidated.
    InvalidSession = 9,
    /// Sent immediately after connecting; contains heartbeat interval.
    Hello = 10,
    /// Acknowledges a received heartbeat.
    HeartbeatAck = 11,
}

impl GatewayOpcode {
    pub fn from_u64(value: u64) -> Option<Self> {
        match value {
            0 => Some(Self::Dispatch),
            1 => Some(Self::Heartbeat),
            2 => Some(Self::Identify),
            6 => Some(Self::Resume),
            7 => Some(Self::Reconnect),
            9 => Some(Self::InvalidSession),
            10 => Some(Self::Hello),
            11 => Some(Self::HeartbeatAck),
            _ => None,
        }
    }
}

/// Discord interaction types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum InteractionType {
    Ping = 1,
    ApplicationCommand = 2,
    MessageComponent = 3,
    ApplicationCommandAutocomplete = 4,
    ModalSubmit = 5,
}

impl InteractionType {
    pub fn from_u64(value: u64) -> Option<Self> {
        match value {
            1 => Some(Self::Ping),
            2 => Some(Self::ApplicationCommand),
            3 => Some(Self::MessageComponent),
            4 => Some(Self::ApplicationCommandAutocomplete),
            5 => Some(Self::ModalSubmit),
            _ => None,
        }
    }
}

/// Interaction callback types for responding to interactions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum InteractionCallbackType {
    ChannelMessageWithSource = 4,
    /// ACK an interaction and edit a response later (shows "thinking...").
    DeferredChannelMessageWithSource = 5,
}

/// Embed accent colors.
pub mod colors {
    pub const PENDING: u32 = 0xFF_AA00;
    pub const SUCCESS: u32 = 0x00_FF00;
    pub const FAILURE: u32 = 0xFF_0000;
    pub const TIMEOUT: u32 = 0xFF_9900;
}
