use super::identity::AccountLinks;
use crate::config::Config;
use crate::error::{BridgeError, Result};
use crate::transport::relay::{CommandResult, EnqueueRequest, EnqueueResponse, RobloxUserId};
use anyhow::Context;
use async_trait::async_trait;
use reqwest::StatusCode;
use std::time::Duration;
use tokio::time::Instant;

const SUBMIT_TIMEOUT: Duration = Duration::from_secs(15);
const POLL_REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// A command as typed by a Discord user.
#[derive(Debug, Clone, Copy)]
pub struct Submission<'a> {
    pub discord_user_id: &'a str,
    pub verb: &'a str,
    pub args: Option<&'a str>,
    pub server_id: Option<&'a str>,
}

/// The relay operations the Discord front-end depends on.
#[async_trait]
pub trait CommandRelay: Send + Sync {
    /// Queue a command; returns the relay-assigned command id.
    async fn submit(&self, submission: Submission<'_>) -> Result<String>;

    /// Wait for the result of a previously submitted command.
    async fn await_result(&self, command_id: &str) -> Result<CommandResult>;
}

#[derive(Debug, Clone, Copy)]
pub struct PollSettings {
    pub interval: Duration,
    pub timeout: Duration,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(1),
            timeout: Duration::from_secs(10),
        }
    }
}

pub struct RelayClient {
    client: reqwest::Client,
    base_url: String,
    links: AccountLinks,
    poll: PollSettings,
}

/// Whitespace-separated arguments; absent or blank input yields no arguments.
pub fn split_args(args: Option<&str>) -> Vec<String> {
    args.map(|raw| raw.split_whitespace().map(str::to_string).collect())
        .unwrap_or_default()
}

impl RelayClient {
    pub fn new(
        base_url: impl Into<String>,
        links: AccountLinks,
        poll: PollSettings,
    ) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("cmdr-bridge/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("build relay HTTP client")?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            links,
            poll,
        })
    }

    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        Self::new(
            config.bot.server_url.clone(),
            AccountLinks::from_config(&config.links),
            PollSettings {
                interval: Duration::from_millis(config.bot.poll_interval_ms.max(1)),
                timeout: Duration::from_secs(config.bot.result_timeout_secs),
            },
        )
    }

    pub fn links(&self) -> &AccountLinks {
        &self.links
    }

    async fn error_from_status(context: &str, response: reqwest::Response) -> BridgeError {
        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .unwrap_or_else(|error| format!("<failed to read response body: {error}>"));
        BridgeError::DeliveryStatus {
            context: context.to_string(),
            status,
            body,
        }
    }

    /// One lookup. `Ok(None)` means the relay has no result yet.
    async fn fetch_result(&self, command_id: &str) -> Result<Option<CommandResult>> {
        let url = format!("{}/api/result/{command_id}", self.base_url);
        let response = self
            .client
            .get(&url)
            .timeout(POLL_REQUEST_TIMEOUT)
            .send()
            .await
            .map_err(|error| BridgeError::delivery("fetch command result", &error))?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(Self::error_from_status("fetch command result", response).await);
        }

        response
            .json::<CommandResult>()
            .await
            .map(Some)
            .map_err(|error| BridgeError::delivery("parse command result", &error))
    }
}

#[async_trait]
impl CommandRelay for RelayClient {
    async fn submit(&self, submission: Submission<'_>) -> Result<String> {
        let roblox_user_id = self.links.roblox_user_id(submission.discord_user_id)?;

        let payload = EnqueueRequest {
            discord_user_id: Some(submission.discord_user_id.to_string()),
            roblox_user_id: Some(RobloxUserId::Numeric(roblox_user_id)),
            command: Some(submission.verb.to_string()),
            args: Some(split_args(submission.args)),
            server_id: submission.server_id.map(str::to_string),
        };
        tracing::info!(
            discord_user_id = submission.discord_user_id,
            roblox_user_id,
            verb = submission.verb,
            server_id = submission.server_id.unwrap_or("*"),
            "bridge.submit"
        );

        let url = format!("{}/api/command", self.base_url);
        let response = self
            .client
            .post(&url)
            .timeout(SUBMIT_TIMEOUT)
            .json(&payload)
            .send()
            .await
            .map_err(|error| BridgeError::delivery("send command", &error))?;

        if !response.status().is_success() {
            let error = Self::error_from_status("send command", response).await;
            tracing::error!(error = %error, "bridge.submit_failed");
            return Err(error);
        }

        let queued: EnqueueResponse = response
            .json()
            .await
            .map_err(|error| BridgeError::delivery("parse enqueue response", &error))?;
        tracing::info!(command_id = %queued.command_id, "bridge.submitted");
        Ok(queued.command_id)
    }

    async fn await_result(&self, command_id: &str) -> Result<CommandResult> {
        tracing::debug!(command_id, "bridge.await_result");
        let deadline = Instant::now() + self.poll.timeout;

        loop {
            if let Some(result) = self.fetch_result(command_id).await? {
                tracing::info!(command_id, success = result.success, "bridge.result");
                return Ok(result);
            }

            let now = Instant::now();
            if now >= deadline {
                break;
            }
            tokio::time::sleep(self.poll.interval.min(deadline - now)).await;
        }

        tracing::warn!(command_id, "bridge.result_timeout");
        Err(BridgeError::CommandTimeout {
            command_id: command_id.to_string(),
            waited: self.poll.timeout,
        })
    }
}
