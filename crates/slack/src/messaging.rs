//! Ports through which the relay talks to Slack.

use async_trait::async_trait;
use thiserror::Error;
#[cfg(any(test, feature = "test-util"))]
use tokio::sync::Mutex;

use crate::blocks::MessageTemplate;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MessagingError {
    #[error("slack request failed: {0}")]
    Transport(String),
    #[error("slack `{method}` returned error `{error}`")]
    Api { method: &'static str, error: String },
    #[error("slack `{method}` response could not be decoded: {detail}")]
    Decode { method: &'static str, detail: String },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BotIdentity {
    pub bot_id: String,
    pub user_id: Option<String>,
}

#[async_trait]
pub trait SlackMessenger: Send + Sync {
    /// Posts a message, threaded under `thread_ts` when given, and returns its timestamp.
    async fn send_message(
        &self,
        channel: &str,
        text: &str,
        thread_ts: Option<&str>,
    ) -> Result<String, MessagingError>;

    async fn update_message(&self, channel: &str, ts: &str, text: &str)
        -> Result<(), MessagingError>;
}

/// Answers an interactive payload through its `response_url`.
#[async_trait]
pub trait InteractionResponder: Send + Sync {
    async fn respond(
        &self,
        response_url: &str,
        message: &MessageTemplate,
    ) -> Result<(), MessagingError>;
}

#[async_trait]
pub trait BotIdentityProvider: Send + Sync {
    /// `None` when the bot's own identity cannot be resolved.
    async fn current_bot(&self) -> Option<BotIdentity>;
}

/// Identity fixed at construction time.
#[derive(Clone, Debug, Default)]
pub struct StaticBotIdentity {
    identity: Option<BotIdentity>,
}

impl StaticBotIdentity {
    pub fn new(bot_id: impl Into<String>, user_id: impl Into<String>) -> Self {
        Self { identity: Some(BotIdentity { bot_id: bot_id.into(), user_id: Some(user_id.into()) }) }
    }

    pub fn unresolved() -> Self {
        Self { identity: None }
    }
}

#[async_trait]
impl BotIdentityProvider for StaticBotIdentity {
    async fn current_bot(&self) -> Option<BotIdentity> {
        self.identity.clone()
    }
}

#[cfg(any(test, feature = "test-util"))]
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MessengerCall {
    Send { channel: String, text: String, thread_ts: Option<String> },
    Update { channel: String, ts: String, text: String },
    Respond { response_url: String, message: MessageTemplate },
}

/// In-process messenger that records every call and hands out sequential timestamps.
#[cfg(any(test, feature = "test-util"))]
#[derive(Default)]
pub struct RecordingMessenger {
    calls: Mutex<Vec<MessengerCall>>,
    failing_channels: Mutex<Vec<String>>,
    fail_updates: Mutex<bool>,
}

#[cfg(any(test, feature = "test-util"))]
impl RecordingMessenger {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn calls(&self) -> Vec<MessengerCall> {
        self.calls.lock().await.clone()
    }

    pub async fn sent_texts(&self) -> Vec<String> {
        self.calls
            .lock()
            .await
            .iter()
            .filter_map(|call| match call {
                MessengerCall::Send { text, .. } => Some(text.clone()),
                MessengerCall::Update { .. } | MessengerCall::Respond { .. } => None,
            })
            .collect()
    }

    /// Every send or update targeting `channel` fails with an API error.
    pub async fn fail_channel(&self, channel: impl Into<String>) {
        self.failing_channels.lock().await.push(channel.into());
    }

    pub async fn fail_updates(&self) {
        *self.fail_updates.lock().await = true;
    }

    async fn check_channel(&self, method: &'static str, channel: &str) -> Result<(), MessagingError> {
        if self.failing_channels.lock().await.iter().any(|failing| failing == channel) {
            return Err(MessagingError::Api { method, error: "channel_not_found".to_owned() });
        }
        Ok(())
    }
}

#[cfg(any(test, feature = "test-util"))]
#[async_trait]
impl SlackMessenger for RecordingMessenger {
    async fn send_message(
        &self,
        channel: &str,
        text: &str,
        thread_ts: Option<&str>,
    ) -> Result<String, MessagingError> {
        self.check_channel("chat.postMessage", channel).await?;
        let mut calls = self.calls.lock().await;
        calls.push(MessengerCall::Send {
            channel: channel.to_owned(),
            text: text.to_owned(),
            thread_ts: thread_ts.map(str::to_owned),
        });
        Ok(format!("1700000000.{:06}", calls.len()))
    }

    async fn update_message(
        &self,
        channel: &str,
        ts: &str,
        text: &str,
    ) -> Result<(), MessagingError> {
        self.check_channel("chat.update", channel).await?;
        if *self.fail_updates.lock().await {
            return Err(MessagingError::Api {
                method: "chat.update",
                error: "message_not_found".to_owned(),
            });
        }
        self.calls.lock().await.push(MessengerCall::Update {
            channel: channel.to_owned(),
            ts: ts.to_owned(),
            text: text.to_owned(),
        });
        Ok(())
    }
}

#[cfg(any(test, feature = "test-util"))]
#[async_trait]
impl InteractionResponder for RecordingMessenger {
    async fn respond(
        &self,
        response_url: &str,
        message: &MessageTemplate,
    ) -> Result<(), MessagingError> {
        self.calls.lock().await.push(MessengerCall::Respond {
            response_url: response_url.to_owned(),
            message: message.clone(),
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{
        BotIdentityProvider, MessagingError, MessengerCall, RecordingMessenger, SlackMessenger,
        StaticBotIdentity,
    };

    #[tokio::test]
    async fn recording_messenger_returns_distinct_timestamps() {
        let messenger = RecordingMessenger::new();
        let first = messenger.send_message("C1", "one", None).await.expect("send");
        let second = messenger.send_message("C1", "two", Some(&first)).await.expect("send");

        assert_ne!(first, second);
        assert_eq!(
            messenger.calls().await[1],
            MessengerCall::Send {
                channel: "C1".to_owned(),
                text: "two".to_owned(),
                thread_ts: Some(first),
            }
        );
    }

    #[tokio::test]
    async fn recording_messenger_fails_configured_channels() {
        let messenger = RecordingMessenger::new();
        messenger.fail_channel("C-broken").await;

        let error = messenger.send_message("C-broken", "hi", None).await.expect_err("must fail");
        assert!(matches!(error, MessagingError::Api { method: "chat.postMessage", .. }));
        assert!(messenger.calls().await.is_empty());
    }

    #[tokio::test]
    async fn static_identity_can_be_unresolved() {
        assert_eq!(StaticBotIdentity::unresolved().current_bot().await, None);
        let identity = StaticBotIdentity::new("B1", "U1").current_bot().await.expect("identity");
        assert_eq!(identity.bot_id, "B1");
        assert_eq!(identity.user_id.as_deref(), Some("U1"));
    }
}
