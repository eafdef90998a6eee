use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::{Method, Response, header::HeaderMap};
use serde_json::json;
use tokio::time::sleep;

use super::types::API_BASE;

const MAX_RATE_LIMIT_RETRIES: u8 = 3;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Minimal Discord REST client: gateway discovery, command registration and
/// interaction responses.
pub struct DiscordHttpClient {
    client: reqwest::Client,
    api_base: String,
    bot_token: String,
}

impl DiscordHttpClient {
    #[must_use]
    pub fn new(bot_token: impl Into<String>) -> Self {
        Self::with_api_base(bot_token, API_BASE)
    }

    #[must_use]
    pub fn with_api_base(bot_token: impl Into<String>, api_base: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_base: api_base.into().trim_end_matches('/').to_string(),
            bot_token: bot_token.into(),
        }
    }

    pub async fn get_gateway_bot(&self) -> Result<serde_json::Value> {
        let url = format!("{}/gateway/bot", self.api_base);
        let response = self
            .request(Method::GET, &url, None)
            .await
            .context("fetch Discord gateway bot data")?;
        response
            .json()
            .await
            .context("parse Discord gateway bot JSON")
    }

    pub async fn register_guild_commands(
        &self,
        application_id: &str,
        guild_id: &str,
        commands: &[serde_json::Value],
    ) -> Result<()> {
        let url = format!(
            "{}/applications/{application_id}/guilds/{guild_id}/commands",
            self.api_base
        );
        self.request(Method::PUT, &url, Some(json!(commands)))
            .await
            .context("register Discord guild commands")?;
        Ok(())
    }

    pub async fn create_interaction_response(
        &self,
        interaction_id: &str,
        interaction_token: &str,
        response_type: u8,
        data: Option<serde_json::Value>,
    ) -> Result<()> {
        let url = format!(
            "{}/interactions/{interaction_id}/{interaction_token}/callback",
            self.api_base
        );
        let mut body = json!({ "type": response_type });
        if let Some(payload) = data {
            body["data"] = payload;
        }
        self.request(Method::POST, &url, Some(body))
            .await
            .context("create Discord interaction response")?;
        Ok(())
    }

    pub async fn edit_original_response(
        &self,
        application_id: &str,
        interaction_token: &str,
        embed: serde_json::Value,
    ) -> Result<()> {
        let url = format!(
            "{}/webhooks/{application_id}/{interaction_token}/messages/@original",
            self.api_base
        );
        self.request(Method::PATCH, &url, Some(json!({ "embeds": [embed] })))
            .await
            .context("edit original Discord interaction response")?;
        Ok(())
    }

    pub async fn create_followup(
        &self,
        application_id: &str,
        interaction_token: &str,
        embed: serde_json::Value,
    ) -> Result<()> {
        let url = format!(
            "{}/webhooks/{application_id}/{interaction_token}",
            self.api_base
        );
        self.request(Method::POST, &url, Some(json!({ "embeds": [embed] })))
            .await
            .context("send Discord interaction follow-up")?;
        Ok(())
    }

    async fn request(
        &self,
        method: Method,
        url: &str,
        body: Option<serde_json::Value>,
    ) -> Result<Response> {
        for attempt in 0..=MAX_RATE_LIMIT_RETRIES {
            let mut request_builder = self
                .client
                .request(method.clone(), url)
                .timeout(REQUEST_TIMEOUT)
                .header("Authorization", format!("Bot {}", self.bot_token));
            if let Some(payload) = body.as_ref() {
                request_builder = request_builder.json(payload);
            }

            let response = request_builder
                .send()
                .await
                .with_context(|| format!("send Discord request {} {}", method.as_str(), url))?;

            if response.status().as_u16() == 429 {
                if attempt == MAX_RATE_LIMIT_RETRIES {
                    break;
                }
                let retry_after = Self::parse_retry_after(response.headers())
                    .unwrap_or_else(|| Duration::from_secs(1));
                tracing::warn!(
                    method = method.as_str(),
                    retry_after_ms = u64::try_from(retry_after.as_millis()).unwrap_or(u64::MAX),
                    "Discord rate limit hit"
                );
                sleep(retry_after).await;
                continue;
            }

            if !response.status().is_success() {
                let status = response.status();
                let body_text = response
                    .text()
                    .await
                    .unwrap_or_else(|error| format!("<failed to read response body: {error}>"));
                anyhow::bail!(
                    "Discord request {} {} failed ({status}): {body_text}",
                    method.as_str(),
                    url
                );
            }

            return Ok(response);
        }

        anyhow::bail!(
            "Discord request {} {} exceeded rate limit after {} retries",
            method.as_str(),
            url,
            MAX_RATE_LIMIT_RETRIES
        )
    }

    fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
        let seconds = headers
            .get("Retry-After")
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.parse::<f64>().ok())?;
        if seconds <= 0.0 {
            return Some(Duration::from_secs(0));
        }
        Some(Duration::from_secs_f64(seconds))
    }
}

#[cfg(test)]
mod tests {
    use super::DiscordHttpClient;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn parses_retry_after_float_seconds() {
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            "Retry-After",
            reqwest::header::HeaderValue::from_static("1.75"),
        );

        let duration = DiscordHttpClient::parse_retry_after(&headers).unwrap_or_default();
        assert_eq!(duration.as_secs(), 1);
        assert_eq!(duration.subsec_millis(), 750);
    }

    #[test]
    fn constructor_trims_api_base() {
        let client = DiscordHttpClient::with_api_base("token", "http://localhost:1/api/");
        assert_eq!(client.api_base, "http://localhost:1/api");
        assert_eq!(client.bot_token, "token");
    }

    #[tokio::test]
    async fn registers_guild_commands_with_bot_auth() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/applications/app-1/guilds/guild-1/commands"))
            .and(header("authorization", "Bot secret"))
            .and(body_json(json!([{"name": "roblox"}])))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .expect(1)
            .mount(&server)
            .await;

        let client = DiscordHttpClient::with_api_base("secret", server.uri());
        client
            .register_guild_commands("app-1", "guild-1", &[json!({"name": "roblox"})])
            .await
            .unwrap();
        server.verify().await;
    }

    #[tokio::test]
    async fn retries_after_rate_limit() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/webhooks/app/tok"))
            .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "0.01"))
            .up_to_n_times(1)
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/webhooks/app/tok"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "m"})))
            .expect(1)
            .mount(&server)
            .await;

        let client = DiscordHttpClient::with_api_base("secret", server.uri());
        client
            .create_followup("app", "tok", json!({"title": "hi"}))
            .await
            .unwrap();
        server.verify().await;
    }

    #[tokio::test]
    async fn non_success_status_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/gateway/bot"))
            .respond_with(ResponseTemplate::new(401).set_body_string("401: Unauthorized"))
            .mount(&server)
            .await;

        let client = DiscordHttpClient::with_api_base("bad", server.uri());
        let err = client.get_gateway_bot().await.unwrap_err();
        assert!(format!("{err:#}").contains("401"));
    }
}
