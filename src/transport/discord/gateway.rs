use anyhow::{Context, Result};
use futures_util::{Sink, SinkExt, Stream, StreamExt};
use serde_json::json;
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::sync::Mutex;
use tokio::time::{Instant, interval};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;

use super::http_client::DiscordHttpClient;
use super::types::{
    DEFAULT_HEARTBEAT_INTERVAL_MS, GatewayOpcode, READY_TIMEOUT_SECS, is_fatal_close_code,
};

/// The gateway closed with a code that makes reconnecting pointless
/// (bad token, disallowed intents).
#[derive(Debug, thiserror::Error)]
#[error("Discord gateway closed with fatal code {code}: {reason}")]
pub struct FatalGatewayClose {
    pub code: u16,
    pub reason: String,
}

/// Session data kept across reconnects so the gateway can resume.
#[derive(Debug)]
pub struct DiscordGatewayState {
    pub session_id: Mutex<Option<String>>,
    pub sequence: AtomicI64,
    pub resume_gateway_url: Mutex<Option<String>>,
}

impl Default for DiscordGatewayState {
    fn default() -> Self {
        Self {
            session_id: Mutex::new(None),
            sequence: AtomicI64::new(-1),
            resume_gateway_url: Mutex::new(None),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum GatewayEvent {
    Ready {
        session_id: String,
        resume_gateway_url: String,
        user_id: String,
        username: String,
        guild_count: usize,
    },
    InteractionCreate {
        interaction_id: String,
        interaction_token: String,
        interaction_type: u64,
        channel_id: String,
        user_id: String,
        guild_id: Option<String>,
        data: serde_json::Value,
    },
}

/// How a single gateway connection ended without a hard error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionEnd {
    /// READY or RESUMED was received on this connection.
    pub established: bool,
}

struct Heartbeat {
    interval_ms: u64,
    acked: bool,
    ack_deadline: Option<Instant>,
}

pub struct DiscordGateway {
    bot_token: String,
    intents: u64,
    state: Arc<DiscordGatewayState>,
}

impl DiscordGateway {
    pub fn new(bot_token: String, intents: u64, state: Arc<DiscordGatewayState>) -> Self {
        Self {
            bot_token,
            intents,
            state,
        }
    }

    /// Run one connection until Discord asks us to reconnect, the socket
    /// drops, or a fatal close code arrives (returned as [`FatalGatewayClose`]).
    pub async fn connect_and_listen(
        &self,
        http: &DiscordHttpClient,
        tx: &tokio::sync::mpsc::Sender<GatewayEvent>,
    ) -> Result<SessionEnd> {
        let gateway_url = self.resolve_gateway_url(http).await?;
        let ws_url = build_gateway_ws_url(&gateway_url);

        let (ws_stream, _) = tokio_tungstenite::connect_async(&ws_url)
            .await
            .with_context(|| format!("connect Discord gateway websocket: {ws_url}"))?;
        let (mut write, mut read) = ws_stream.split();

        let mut heartbeat = Heartbeat {
            interval_ms: read_hello_heartbeat_interval(&mut read).await?,
            acked: true,
            ack_deadline: None,
        };
        self.send_identify_or_resume(&mut write).await?;

        let mut ticker = interval(Duration::from_millis(heartbeat.interval_ms));
        let ready_deadline = Instant::now() + Duration::from_secs(READY_TIMEOUT_SECS);
        let mut established = false;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if !self.send_heartbeat_if_healthy(&mut write, &mut heartbeat).await? {
                        tracing::warn!("Discord gateway heartbeat ACK missing; reconnecting");
                        return Ok(SessionEnd { established });
                    }
                }
                () = wait_for_deadline(heartbeat.ack_deadline) => {
                    if !heartbeat.acked {
                        tracing::warn!("Discord gateway heartbeat ACK timeout; reconnecting");
                        return Ok(SessionEnd { established });
                    }
                    heartbeat.ack_deadline = None;
                }
                () = tokio::time::sleep_until(ready_deadline), if !established => {
                    anyhow::bail!("Discord READY not received within {READY_TIMEOUT_SECS}s");
                }
                message = read.next() => {
                    let Some(message) = message else {
                        tracing::warn!("Discord gateway socket closed; reconnecting");
                        return Ok(SessionEnd { established });
                    };

                    let message = message.context("read Discord gateway message")?;
                    if !self
                        .handle_gateway_message(message, tx, &mut write, &mut heartbeat, &mut established)
                        .await?
                    {
                        return Ok(SessionEnd { established });
                    }
                }
            }
        }
    }

    async fn resolve_gateway_url(&self, http: &DiscordHttpClient) -> Result<String> {
        if let Some(url) = self.state.resume_gateway_url.lock().await.clone()
            && !url.is_empty()
        {
            return Ok(url);
        }

        let gw_resp = http
            .get_gateway_bot()
            .await
            .context("fetch Discord gateway/bot URL")?;
        Ok(gw_resp
            .get("url")
            .and_then(|u| u.as_str())
            .unwrap_or("wss://gateway.discord.gg")
            .to_string())
    }

    async fn send_identify_or_resume<WsSink>(&self, write: &mut WsSink) -> Result<()>
    where
        WsSink: Sink<Message, Error = tokio_tungstenite::tungstenite::Error> + Unpin,
    {
        let payload = if let Some(session_id) = self.state.session_id.lock().await.clone() {
            json!({
                "op": GatewayOpcode::Resume as u8,
                "d": {
                    "token": self.bot_token,
                    "session_id": session_id,
                    "seq": self.state.sequence.load(Ordering::SeqCst),
                }
            })
        } else {
            json!({
                "op": GatewayOpcode::Identify as u8,
                "d": {
                    "token": self.bot_token,
                    "intents": self.intents,
                    "properties": {
                        "os": std::env::consts::OS,
                        "browser": "cmdr-bridge",
                        "device": "cmdr-bridge"
                    }
                }
            })
        };

        write
            .send(Message::Text(payload.to_string().into()))
            .await
            .context("send Discord gateway identify/resume")
    }

    async fn send_heartbeat_if_healthy<WsSink>(
        &self,
        write: &mut WsSink,
        heartbeat: &mut Heartbeat,
    ) -> Result<bool>
    where
        WsSink: Sink<Message, Error = tokio_tungstenite::tungstenite::Error> + Unpin,
    {
        if !heartbeat.acked {
            return Ok(false);
        }

        let payload = json!({
            "op": GatewayOpcode::Heartbeat as u8,
            "d": self.current_sequence(),
        });

        write
            .send(Message::Text(payload.to_string().into()))
            .await
            .context("send Discord gateway heartbeat")?;

        heartbeat.acked = false;
        heartbeat.ack_deadline =
            Some(Instant::now() + Duration::from_millis(heartbeat.interval_ms));
        Ok(true)
    }

    async fn handle_gateway_message<WsSink>(
        &self,
        message: Message,
        tx: &tokio::sync::mpsc::Sender<GatewayEvent>,
        write: &mut WsSink,
        heartbeat: &mut Heartbeat,
        established: &mut bool,
    ) -> Result<bool>
    where
        WsSink: Sink<Message, Error = tokio_tungstenite::tungstenite::Error> + Unpin,
    {
        if let Message::Close(frame) = &message {
            check_close_frame(frame.as_ref())?;
            return Ok(false);
        }

        let Some(raw) = websocket_message_to_text(message) else {
            return Ok(true);
        };

        let payload: serde_json::Value =
            serde_json::from_str(&raw).context("parse Discord gateway payload")?;

        if let Some(sequence) = payload.get("s").and_then(serde_json::Value::as_i64) {
            self.state.sequence.store(sequence, Ordering::SeqCst);
        }

        let op = payload
            .get("op")
            .and_then(serde_json::Value::as_u64)
            .and_then(GatewayOpcode::from_u64);

        match op {
            Some(GatewayOpcode::Heartbeat) => self.send_heartbeat_if_healthy(write, heartbeat).await,
            Some(GatewayOpcode::HeartbeatAck) => {
                heartbeat.acked = true;
                heartbeat.ack_deadline = None;
                Ok(true)
            }
            Some(GatewayOpcode::Reconnect) => {
                tracing::info!("Discord gateway requested reconnect");
                Ok(false)
            }
            Some(GatewayOpcode::InvalidSession) => {
                self.handle_invalid_session(&payload).await;
                Ok(false)
            }
            Some(GatewayOpcode::Dispatch) => {
                if self.handle_dispatch_payload(&payload, tx).await? {
                    *established = true;
                }
                Ok(true)
            }
            _ => Ok(true),
        }
    }

    /// Returns true when the payload was READY or RESUMED.
    async fn handle_dispatch_payload(
        &self,
        payload: &serde_json::Value,
        tx: &tokio::sync::mpsc::Sender<GatewayEvent>,
    ) -> Result<bool> {
        let event_type = payload
            .get("t")
            .and_then(serde_json::Value::as_str)
            .unwrap_or("");
        if event_type == "RESUMED" {
            tracing::info!("Discord gateway session resumed");
            return Ok(true);
        }
        let Some(data) = payload.get("d") else {
            return Ok(false);
        };

        let Some(event) = parse_dispatch_event(event_type, data) else {
            return Ok(false);
        };
        let is_ready = if let GatewayEvent::Ready {
            session_id,
            resume_gateway_url,
            ..
        } = &event
        {
            *self.state.session_id.lock().await = Some(session_id.clone());
            *self.state.resume_gateway_url.lock().await = Some(resume_gateway_url.clone());
            true
        } else {
            false
        };

        tx.send(event)
            .await
            .context("dispatch parsed Discord gateway event")?;
        Ok(is_ready)
    }

    async fn handle_invalid_session(&self, payload: &serde_json::Value) {
        let can_resume = payload
            .get("d")
            .and_then(serde_json::Value::as_bool)
            .unwrap_or(false);

        self.state.sequence.store(-1, Ordering::SeqCst);
        *self.state.session_id.lock().await = None;

        if can_resume {
            let wait_secs = invalid_session_backoff_secs();
            tracing::warn!(
                "Discord gateway invalid session (resume allowed), waiting {wait_secs}s before reconnect"
            );
            tokio::time::sleep(Duration::from_secs(wait_secs)).await;
            return;
        }

        tracing::warn!("Discord gateway invalid session (resume denied), clearing resume URL");
        *self.state.resume_gateway_url.lock().await = None;
    }

    fn current_sequence(&self) -> serde_json::Value {
        let sequence = self.state.sequence.load(Ordering::SeqCst);
        if sequence < 0 {
            serde_json::Value::Null
        } else {
            json!(sequence)
        }
    }
}

fn check_close_frame(frame: Option<&CloseFrame>) -> Result<()> {
    let Some(frame) = frame else {
        tracing::warn!("Discord gateway closed without a close frame");
        return Ok(());
    };
    let code = u16::from(frame.code);
    if is_fatal_close_code(code) {
        return Err(FatalGatewayClose {
            code,
            reason: frame.reason.as_str().to_string(),
        }
        .into());
    }
    tracing::warn!(code, reason = frame.reason.as_str(), "Discord gateway closed; reconnecting");
    Ok(())
}

pub fn parse_dispatch_event(event_type: &str, d: &serde_json::Value) -> Option<GatewayEvent> {
    match event_type {
        "READY" => parse_ready_event(d),
        "INTERACTION_CREATE" => parse_interaction_create_event(d),
        _ => None,
    }
}

fn parse_ready_event(d: &serde_json::Value) -> Option<GatewayEvent> {
    let session_id = d.get("session_id")?.as_str()?.to_string();
    let resume_gateway_url = d.get("resume_gateway_url")?.as_str()?.to_string();
    let user = d.get("user")?;
    let user_id = user.get("id")?.as_str()?.to_string();
    let username = user
        .get("username")
        .and_then(serde_json::Value::as_str)
        .unwrap_or("unknown")
        .to_string();
    let guild_count = d
        .get("guilds")
        .and_then(serde_json::Value::as_array)
        .map_or(0, Vec::len);

    Some(GatewayEvent::Ready {
        session_id,
        resume_gateway_url,
        user_id,
        username,
        guild_count,
    })
}

fn parse_interaction_create_event(d: &serde_json::Value) -> Option<GatewayEvent> {
    let interaction_id = d.get("id")?.as_str()?.to_string();
    let interaction_token = d.get("token")?.as_str()?.to_string();
    let interaction_type = d.get("type")?.as_u64()?;
    let channel_id = d
        .get("channel_id")
        .and_then(serde_json::Value::as_str)
        .unwrap_or_default()
        .to_string();
    let guild_id = d
        .get("guild_id")
        .and_then(serde_json::Value::as_str)
        .map(str::to_string);

    let user_id = d
        .get("member")
        .and_then(|member| member.get("user"))
        .and_then(|user| user.get("id"))
        .and_then(serde_json::Value::as_str)
        .or_else(|| {
            d.get("user")
                .and_then(|user| user.get("id"))
                .and_then(serde_json::Value::as_str)
        })?
        .to_string();

    Some(GatewayEvent::InteractionCreate {
        interaction_id,
        interaction_token,
        interaction_type,
        channel_id,
        user_id,
        guild_id,
        data: d.get("data").cloned().unwrap_or(serde_json::Value::Null),
    })
}

async fn wait_for_deadline(deadline: Option<Instant>) {
    if let Some(deadline) = deadline {
        tokio::time::sleep_until(deadline).await;
    } else {
        futures_util::future::pending::<()>().await;
    }
}

async fn read_hello_heartbeat_interval<WsRead>(read: &mut WsRead) -> Result<u64>
where
    WsRead:
        Stream<Item = std::result::Result<Message, tokio_tungstenite::tungstenite::Error>> + Unpin,
{
    while let Some(message) = read.next().await {
        let message = message.context("read Discord gateway hello payload")?;
        if let Message::Close(frame) = &message {
            check_close_frame(frame.as_ref())?;
            break;
        }
        let Some(raw) = websocket_message_to_text(message) else {
            continue;
        };

        let payload: serde_json::Value =
            serde_json::from_str(&raw).context("parse Discord gateway hello JSON")?;

        let op = payload
            .get("op")
            .and_then(serde_json::Value::as_u64)
            .and_then(GatewayOpcode::from_u64);

        if op == Some(GatewayOpcode::Hello) {
            return Ok(payload
                .get("d")
                .and_then(|d| d.get("heartbeat_interval"))
                .and_then(serde_json::Value::as_u64)
                .unwrap_or(DEFAULT_HEARTBEAT_INTERVAL_MS));
        }
    }

    Err(anyhow::anyhow!("Discord gateway closed before Hello"))
}

fn websocket_message_to_text(message: Message) -> Option<String> {
    match message {
        Message::Text(text) => Some(text.to_string()),
        Message::Binary(bytes) => String::from_utf8(bytes.to_vec()).ok(),
        _ => None,
    }
}

fn build_gateway_ws_url(base_url: &str) -> String {
    let trimmed = base_url.trim_end_matches('/');
    format!("{trimmed}/?v=10&encoding=json")
}

fn invalid_session_backoff_secs() -> u64 {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|duration| duration.subsec_nanos())
        .unwrap_or(0);
    1 + u64::from(nanos % 5)
}
