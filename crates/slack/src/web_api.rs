//! Slack Web API client for `chat.postMessage`, `chat.update` and `auth.test`, plus
//! `response_url` replies to interactive payloads.

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{error, trace};

use ghrelay_core::config::SlackConfig;

use crate::blocks::MessageTemplate;
use crate::messaging::{
    BotIdentity, BotIdentityProvider, InteractionResponder, MessagingError, SlackMessenger,
};

#[derive(Debug, Serialize)]
struct PostMessageRequest<'a> {
    channel: &'a str,
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    thread_ts: Option<&'a str>,
}

#[derive(Debug, Serialize)]
struct UpdateMessageRequest<'a> {
    channel: &'a str,
    ts: &'a str,
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    ok: bool,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    ts: Option<String>,
    #[serde(default)]
    user_id: Option<String>,
    #[serde(default)]
    bot_id: Option<String>,
}

pub struct SlackWebClient {
    client: Client,
    base_url: String,
    bot_token: SecretString,
    identity: RwLock<Option<BotIdentity>>,
}

impl SlackWebClient {
    pub fn new(config: &SlackConfig) -> Self {
        Self::with_client(Client::new(), config)
    }

    pub fn with_client(client: Client, config: &SlackConfig) -> Self {
        Self {
            client,
            base_url: config.api_base_url.trim_end_matches('/').to_owned(),
            bot_token: config.bot_token.clone(),
            identity: RwLock::new(None),
        }
    }

    fn endpoint(&self, method: &str) -> String {
        format!("{}/{method}", self.base_url)
    }

    async fn call<T>(&self, method: &'static str, body: &T) -> Result<ApiResponse, MessagingError>
    where
        T: Serialize + Sync,
    {
        trace!(event_name = "egress.slack.request", method, "calling slack web api");

        let response = self
            .client
            .post(self.endpoint(method))
            .bearer_auth(self.bot_token.expose_secret())
            .json(body)
            .send()
            .await
            .map_err(|e| MessagingError::Transport(e.to_string()))?;

        let status = response.status();
        let body = response.text().await.map_err(|e| MessagingError::Transport(e.to_string()))?;
        let parsed: ApiResponse = decode_response(method, &body)?;

        if !parsed.ok {
            let api_error = parsed.error.unwrap_or_else(|| "unknown".to_owned());
            error!(
                event_name = "egress.slack.api_error",
                method,
                status = %status,
                error = %api_error,
                "slack web api call failed"
            );
            return Err(MessagingError::Api { method, error: api_error });
        }

        Ok(parsed)
    }

    async fn resolve_identity(&self) -> Result<BotIdentity, MessagingError> {
        let response = self.call("auth.test", &serde_json::json!({})).await?;
        let bot_id = response.bot_id.ok_or_else(|| MessagingError::Decode {
            method: "auth.test",
            detail: "token does not belong to a bot user".to_owned(),
        })?;
        Ok(BotIdentity { bot_id, user_id: response.user_id })
    }
}

fn decode_response<T: DeserializeOwned>(method: &'static str, body: &str) -> Result<T, MessagingError> {
    serde_json::from_str(body)
        .map_err(|e| MessagingError::Decode { method, detail: e.to_string() })
}

#[async_trait]
impl SlackMessenger for SlackWebClient {
    async fn send_message(
        &self,
        channel: &str,
        text: &str,
        thread_ts: Option<&str>,
    ) -> Result<String, MessagingError> {
        let response = self
            .call("chat.postMessage", &PostMessageRequest { channel, text, thread_ts })
            .await?;
        response.ts.ok_or_else(|| MessagingError::Decode {
            method: "chat.postMessage",
            detail: "response is missing `ts`".to_owned(),
        })
    }

    async fn update_message(
        &self,
        channel: &str,
        ts: &str,
        text: &str,
    ) -> Result<(), MessagingError> {
        self.call("chat.update", &UpdateMessageRequest { channel, ts, text }).await?;
        Ok(())
    }
}

#[async_trait]
impl InteractionResponder for SlackWebClient {
    async fn respond(
        &self,
        response_url: &str,
        message: &MessageTemplate,
    ) -> Result<(), MessagingError> {
        trace!(event_name = "egress.slack.respond", "posting to response_url");

        let response = self
            .client
            .post(response_url)
            .json(message)
            .send()
            .await
            .map_err(|e| MessagingError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!(
                event_name = "egress.slack.respond_failed",
                status = %status,
                body = %body,
                "response_url rejected interaction reply"
            );
            return Err(MessagingError::Api { method: "response_url", error: status.to_string() });
        }
        Ok(())
    }
}

#[async_trait]
impl BotIdentityProvider for SlackWebClient {
    async fn current_bot(&self) -> Option<BotIdentity> {
        if let Some(identity) = self.identity.read().await.clone() {
            return Some(identity);
        }

        match self.resolve_identity().await {
            Ok(identity) => {
                *self.identity.write().await = Some(identity.clone());
                Some(identity)
            }
            Err(error) => {
                error!(
                    event_name = "egress.slack.identity_unresolved",
                    error = %error,
                    "could not resolve bot identity"
                );
                None
            }
        }
    }
}
