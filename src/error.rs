use std::time::Duration;
use thiserror::Error;

// ─── Top-level error hierarchy ───────────────────────────────────────────────

/// Structured error hierarchy for the bridge.
///
/// Each documented failure condition of the submit/poll path has its own
/// variant so the Discord front-end can render it. Startup and transport
/// plumbing continue to use `anyhow::Result` for ad-hoc context chains.
#[derive(Debug, Error)]
pub enum BridgeError {
    // ── Identity ────────────────────────────────────────────────────────
    #[error("Discord account {user_id} is not linked to a Roblox account")]
    UnlinkedAccount { user_id: String },

    // ── Relay validation ────────────────────────────────────────────────
    #[error("validation failed: {0}")]
    Validation(String),

    // ── Relay delivery ──────────────────────────────────────────────────
    #[error("failed to reach relay ({context}): {message}")]
    Delivery { context: String, message: String },

    #[error("relay returned {status} ({context}): {body}")]
    DeliveryStatus {
        context: String,
        status: u16,
        body: String,
    },

    // ── Polling ─────────────────────────────────────────────────────────
    #[error("command {command_id} produced no result within {}s", waited.as_secs())]
    CommandTimeout {
        command_id: String,
        waited: Duration,
    },

    #[error("not found: {0}")]
    NotFound(String),

    // ── Config ──────────────────────────────────────────────────────────
    #[error("config: {0}")]
    Config(#[from] ConfigError),
}

impl BridgeError {
    pub fn delivery(context: impl Into<String>, error: &reqwest::Error) -> Self {
        Self::Delivery {
            context: context.into(),
            message: error.to_string(),
        }
    }

    /// True for the two delivery variants (network and non-2xx).
    pub fn is_delivery(&self) -> bool {
        matches!(self, Self::Delivery { .. } | Self::DeliveryStatus { .. })
    }
}

// ─── Config errors ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load config: {0}")]
    Load(String),

    #[error("{0} is not set")]
    Missing(&'static str),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

/// Shorthand result type for the bridge submit/poll surface.
pub type Result<T> = std::result::Result<T, BridgeError>;
