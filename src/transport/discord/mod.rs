//! Discord front-end: a gateway session that turns `/roblox` slash commands
//! into relay submissions and reports the outcome back as embeds.

pub mod commands;
pub mod embeds;
pub mod gateway;
pub mod http_client;
pub mod types;

use crate::bridge::{AccountLinks, CommandRelay, Submission};
use crate::config::BotConfig;
use crate::error::ConfigError;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use self::commands::{build_guild_commands, defer_interaction, extract_roblox_invocation};
use self::gateway::{
    DiscordGateway, DiscordGatewayState, FatalGatewayClose, GatewayEvent, SessionEnd,
};
use self::http_client::DiscordHttpClient;
use self::types::{DEFAULT_INTENTS, InteractionType};

const LOGIN_BACKOFF_STEP_SECS: u64 = 10;
const LOGIN_BACKOFF_CAP_SECS: u64 = 30;
const RECONNECT_DELAY: Duration = Duration::from_secs(1);

/// Delay before login attempt `attempt + 1`, given `attempt` failures so far.
pub fn login_backoff(attempt: u32) -> Duration {
    Duration::from_secs((LOGIN_BACKOFF_STEP_SECS * u64::from(attempt)).min(LOGIN_BACKOFF_CAP_SECS))
}

/// One slash-command interaction, owned so it can move into its own task.
#[derive(Debug, Clone)]
pub struct Interaction {
    pub id: String,
    pub token: String,
    pub kind: u64,
    pub channel_id: String,
    pub user_id: String,
    pub guild_id: Option<String>,
    pub data: serde_json::Value,
}

pub struct DiscordBot {
    http: Arc<DiscordHttpClient>,
    gateway_state: Arc<DiscordGatewayState>,
    config: BotConfig,
    relay: Arc<dyn CommandRelay>,
    links: AccountLinks,
    application_id: std::sync::Mutex<Option<String>>,
}

impl DiscordBot {
    pub fn new(config: BotConfig, relay: Arc<dyn CommandRelay>, links: AccountLinks) -> Self {
        let http = DiscordHttpClient::new(&config.bot_token);
        Self::with_http(config, relay, links, http)
    }

    pub fn with_http(
        config: BotConfig,
        relay: Arc<dyn CommandRelay>,
        links: AccountLinks,
        http: DiscordHttpClient,
    ) -> Self {
        Self {
            http: Arc::new(http),
            gateway_state: Arc::new(DiscordGatewayState::default()),
            application_id: std::sync::Mutex::new(config.application_id.clone()),
            config,
            relay,
            links,
        }
    }

    fn application_id(&self) -> Option<String> {
        self.application_id
            .lock()
            .ok()
            .and_then(|guard| guard.clone())
    }

    fn matches_guild_filter(&self, guild_id: Option<&str>) -> bool {
        match &self.config.guild_id {
            Some(gid) => guild_id.is_some_and(|g| g == gid),
            None => true,
        }
    }

    /// Run until the gateway gives up. Errors when login is exhausted or
    /// Discord closes the session with a fatal code.
    pub async fn run(self: Arc<Self>) -> anyhow::Result<()> {
        let gateway = DiscordGateway::new(
            self.config.bot_token.clone(),
            DEFAULT_INTENTS,
            Arc::clone(&self.gateway_state),
        );
        let (event_tx, mut event_rx) = tokio::sync::mpsc::channel::<GatewayEvent>(100);

        let mut gateway_handle = {
            let http = Arc::clone(&self.http);
            let max_attempts = self.config.max_login_attempts.max(1);
            tokio::spawn(async move {
                run_gateway_with_retry(&gateway, &http, &event_tx, max_attempts).await
            })
        };

        loop {
            tokio::select! {
                event = event_rx.recv() => {
                    let Some(event) = event else {
                        break;
                    };
                    Arc::clone(&self).handle_gateway_event(event).await;
                }
                result = &mut gateway_handle => {
                    return match result {
                        Ok(outcome) => outcome,
                        Err(e) => anyhow::bail!("Discord gateway task panicked: {e}"),
                    };
                }
            }
        }

        Ok(())
    }

    async fn handle_gateway_event(self: Arc<Self>, event: GatewayEvent) {
        match event {
            GatewayEvent::Ready {
                user_id,
                username,
                guild_count,
                ..
            } => {
                self.handle_ready(&user_id, &username, guild_count).await;
            }
            GatewayEvent::InteractionCreate {
                interaction_id,
                interaction_token,
                interaction_type,
                channel_id,
                user_id,
                guild_id,
                data,
            } => {
                let interaction = Interaction {
                    id: interaction_id,
                    token: interaction_token,
                    kind: interaction_type,
                    channel_id,
                    user_id,
                    guild_id,
                    data,
                };
                tokio::spawn(async move { self.handle_interaction(interaction).await });
            }
        }
    }

    async fn handle_ready(&self, user_id: &str, username: &str, guild_count: usize) {
        tracing::info!(user_id, username, guild_count, "discord.ready");

        let app_id = {
            let Ok(mut guard) = self.application_id.lock() else {
                return;
            };
            guard.get_or_insert_with(|| user_id.to_string()).clone()
        };

        let Some(guild_id) = self.config.guild_id.as_deref() else {
            tracing::warn!("discord.register_skipped: no guild configured");
            return;
        };

        match self
            .http
            .register_guild_commands(&app_id, guild_id, &build_guild_commands())
            .await
        {
            Ok(()) => tracing::info!(application_id = %app_id, guild_id, "discord.commands_registered"),
            Err(e) => tracing::error!(error = %format!("{e:#}"), "discord.register_failed"),
        }
    }

    /// Full lifecycle of one `/roblox` use: defer, submit, acknowledge, wait,
    /// report. Failures after the defer end up in the reply, never in the caller.
    pub async fn handle_interaction(&self, interaction: Interaction) {
        if InteractionType::from_u64(interaction.kind) != Some(InteractionType::ApplicationCommand)
        {
            return;
        }
        if !self.matches_guild_filter(interaction.guild_id.as_deref()) {
            return;
        }
        let Some(invocation) = extract_roblox_invocation(&interaction.data) else {
            return;
        };

        if let Err(e) = defer_interaction(&self.http, &interaction.id, &interaction.token).await {
            tracing::warn!(error = %format!("{e:#}"), "discord.defer_failed");
            return;
        }
        let Some(app_id) = self.application_id() else {
            tracing::warn!("discord.reply_skipped: application id unknown");
            return;
        };

        let invocation_text = invocation.display();
        let server = self
            .links
            .target_server(invocation.server.as_deref(), &interaction.channel_id);
        tracing::info!(
            user_id = %interaction.user_id,
            command = %invocation_text,
            server = %server,
            "discord.command"
        );

        let submission = Submission {
            discord_user_id: &interaction.user_id,
            verb: &invocation.command,
            args: invocation.args.as_deref(),
            server_id: Some(server.as_str()),
        };
        let command_id = match self.relay.submit(submission).await {
            Ok(id) => id,
            Err(e) => {
                tracing::error!(error = %e, "discord.submit_failed");
                self.edit_reply(&app_id, &interaction.token, embeds::error(&e.to_string()))
                    .await;
                return;
            }
        };

        self.edit_reply(
            &app_id,
            &interaction.token,
            embeds::command_sent(&invocation_text, &command_id, &server),
        )
        .await;

        let follow_up = match self.relay.await_result(&command_id).await {
            Ok(result) => embeds::command_result(&invocation_text, &result),
            Err(e) => {
                tracing::warn!(command_id = %command_id, error = %e, "discord.result_missing");
                embeds::command_timeout(self.config.result_timeout_secs)
            }
        };
        if let Err(e) = self
            .http
            .create_followup(&app_id, &interaction.token, follow_up)
            .await
        {
            tracing::warn!(error = %format!("{e:#}"), "discord.followup_failed");
        }
    }

    async fn edit_reply(&self, app_id: &str, token: &str, embed: serde_json::Value) {
        if let Err(e) = self.http.edit_original_response(app_id, token, embed).await {
            tracing::warn!(error = %format!("{e:#}"), "discord.edit_failed");
        }
    }
}

/// Reconnect loop around single gateway connections.
async fn run_gateway_with_retry(
    gateway: &DiscordGateway,
    http: &DiscordHttpClient,
    tx: &tokio::sync::mpsc::Sender<GatewayEvent>,
    max_attempts: u32,
) -> anyhow::Result<()> {
    retry_gateway_sessions(
        max_attempts,
        move || tx.is_closed(),
        move || gateway.connect_and_listen(http, tx),
    )
    .await
}

/// Connections that never reach READY count as failed logins; an
/// established session that drops is reconnected without touching the
/// budget. A [`FatalGatewayClose`] ends the loop at once.
async fn retry_gateway_sessions<C, F, Fut>(
    max_attempts: u32,
    is_closed: C,
    mut connect: F,
) -> anyhow::Result<()>
where
    C: Fn() -> bool,
    F: FnMut() -> Fut,
    Fut: Future<Output = anyhow::Result<SessionEnd>>,
{
    let mut failures: u32 = 0;

    loop {
        if is_closed() {
            return Ok(());
        }

        match connect().await {
            Ok(end) if end.established => {
                failures = 0;
                tokio::time::sleep(RECONNECT_DELAY).await;
                continue;
            }
            Ok(_) => {
                failures += 1;
                tracing::warn!(attempt = failures, "discord.login_failed: closed before READY");
            }
            Err(e) => {
                if let Some(fatal) = e.downcast_ref::<FatalGatewayClose>() {
                    tracing::error!(code = fatal.code, reason = %fatal.reason, "discord.login_fatal");
                    return Err(e);
                }
                failures += 1;
                tracing::warn!(attempt = failures, error = %format!("{e:#}"), "discord.login_failed");
            }
        }

        if failures >= max_attempts {
            anyhow::bail!("Discord login failed after {max_attempts} attempts");
        }
        let delay = login_backoff(failures);
        tracing::info!(delay_secs = delay.as_secs(), "discord.login_retry");
        tokio::time::sleep(delay).await;
    }
}

/// Build a bot from config, failing early if the token or guild is missing.
pub fn bot_from_config(
    config: &crate::config::Config,
    relay: Arc<dyn CommandRelay>,
) -> Result<DiscordBot, ConfigError> {
    config.validate_bot()?;
    Ok(DiscordBot::new(
        config.bot.clone(),
        relay,
        AccountLinks::from_config(&config.links),
    ))
}
