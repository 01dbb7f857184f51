use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info};

use crate::{
    blocks::{self, MessageTemplate},
    commands::{BlockActionEvent, CommandRouteError, EmojiCommandService, SlashCommandPayload},
    membership::{ChannelMembershipService, MembershipChange, MembershipOutcome},
    messaging::{InteractionResponder, MessagingError},
};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SlackEnvelope {
    pub envelope_id: String,
    pub event: SlackEvent,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SlackEvent {
    SlashCommand(SlashCommandPayload),
    BlockAction(BlockActionEvent),
    ChannelMembership(MembershipChange),
    Unsupported { event_type: String },
}

impl SlackEvent {
    pub fn event_type(&self) -> SlackEventType {
        match self {
            Self::SlashCommand(_) => SlackEventType::SlashCommand,
            Self::BlockAction(_) => SlackEventType::BlockAction,
            Self::ChannelMembership(_) => SlackEventType::ChannelMembership,
            Self::Unsupported { .. } => SlackEventType::Unsupported,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum SlackEventType {
    SlashCommand,
    BlockAction,
    ChannelMembership,
    Unsupported,
}

/// A decoded Events API request body.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EventsApiRequest {
    UrlVerification { challenge: String },
    Callback(SlackEnvelope),
}

#[derive(Debug, Error)]
pub enum EventParseError {
    #[error("slack payload is not valid json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("slack `{event}` event is missing `{field}`")]
    MissingField { event: String, field: &'static str },
}

#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum EventsApiBody {
    UrlVerification {
        challenge: String,
    },
    EventCallback {
        #[serde(default)]
        event_id: String,
        event: InnerEvent,
    },
    #[serde(other)]
    Other,
}

#[derive(Deserialize)]
struct InnerEvent {
    #[serde(rename = "type")]
    event_type: String,
    #[serde(default)]
    user: Option<String>,
    #[serde(default)]
    channel: Option<String>,
    #[serde(default)]
    event_ts: Option<String>,
}

impl InnerEvent {
    fn require(&self, value: &Option<String>, field: &'static str) -> Result<String, EventParseError> {
        value
            .clone()
            .ok_or_else(|| EventParseError::MissingField { event: self.event_type.clone(), field })
    }

    fn into_event(self) -> Result<SlackEvent, EventParseError> {
        let change = match self.event_type.as_str() {
            "member_joined_channel" => MembershipChange::Joined {
                channel_id: self.require(&self.channel, "channel")?,
                user_id: self.require(&self.user, "user")?,
                event_ts: self.require(&self.event_ts, "event_ts")?,
            },
            "channel_left" | "group_left" => MembershipChange::Left {
                channel_id: self.require(&self.channel, "channel")?,
                event_ts: self.require(&self.event_ts, "event_ts")?,
            },
            _ => return Ok(SlackEvent::Unsupported { event_type: self.event_type }),
        };
        Ok(SlackEvent::ChannelMembership(change))
    }
}

pub fn parse_events_api(body: &[u8]) -> Result<EventsApiRequest, EventParseError> {
    match serde_json::from_slice::<EventsApiBody>(body)? {
        EventsApiBody::UrlVerification { challenge } => {
            Ok(EventsApiRequest::UrlVerification { challenge })
        }
        EventsApiBody::EventCallback { event_id, event } => Ok(EventsApiRequest::Callback(
            SlackEnvelope { envelope_id: event_id, event: event.into_event()? },
        )),
        EventsApiBody::Other => Ok(EventsApiRequest::Callback(SlackEnvelope {
            envelope_id: String::new(),
            event: SlackEvent::Unsupported { event_type: "unknown".to_owned() },
        })),
    }
}

#[derive(Deserialize)]
struct InteractionPayload {
    #[serde(rename = "type")]
    interaction_type: String,
    #[serde(default)]
    trigger_id: Option<String>,
    #[serde(default)]
    response_url: Option<String>,
    #[serde(default)]
    user: Option<InteractionUser>,
    #[serde(default)]
    actions: Vec<InteractionAction>,
}

#[derive(Deserialize)]
struct InteractionUser {
    id: String,
}

#[derive(Deserialize)]
struct InteractionAction {
    #[serde(rename = "type")]
    action_type: String,
    action_id: String,
    #[serde(default)]
    block_id: String,
    #[serde(default)]
    selected_option: Option<SelectedOption>,
}

#[derive(Deserialize)]
struct SelectedOption {
    value: String,
}

/// Decodes the JSON carried in the `payload` form field of an interactive request.
///
/// A `block_actions` payload yields one envelope per action.
pub fn parse_interaction(payload: &str) -> Result<Vec<SlackEnvelope>, EventParseError> {
    let payload: InteractionPayload = serde_json::from_str(payload)?;
    let envelope_id = payload.trigger_id.unwrap_or_default();

    if payload.interaction_type != "block_actions" {
        return Ok(vec![SlackEnvelope {
            envelope_id,
            event: SlackEvent::Unsupported { event_type: payload.interaction_type },
        }]);
    }

    let user_id = payload.user.map(|user| user.id).unwrap_or_default();
    Ok(payload
        .actions
        .into_iter()
        .map(|action| SlackEnvelope {
            envelope_id: envelope_id.clone(),
            event: SlackEvent::BlockAction(BlockActionEvent {
                action_type: action.action_type,
                action_id: action.action_id,
                block_id: action.block_id,
                selected_value: action.selected_option.map(|option| option.value),
                response_url: payload.response_url.clone(),
                user_id: user_id.clone(),
            }),
        })
        .collect())
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EventContext {
    pub correlation_id: String,
}

impl Default for EventContext {
    fn default() -> Self {
        Self { correlation_id: "unknown-correlation-id".to_owned() }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HandlerResult {
    Responded(MessageTemplate),
    Processed,
    Ignored,
}

#[derive(Debug, Error)]
pub enum EventHandlerError {
    #[error(transparent)]
    Route(#[from] CommandRouteError),
    #[error("interaction reply failed: {0}")]
    Respond(#[from] MessagingError),
    #[error("membership handler failure: {0}")]
    Membership(String),
}

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error(transparent)]
    Handler(#[from] EventHandlerError),
}

#[async_trait]
pub trait EventHandler: Send + Sync {
    fn event_type(&self) -> SlackEventType;
    async fn handle(
        &self,
        envelope: &SlackEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError>;
}

#[derive(Default)]
pub struct EventDispatcher {
    handlers: HashMap<SlackEventType, Arc<dyn EventHandler>>,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<H>(&mut self, handler: H)
    where
        H: EventHandler + 'static,
    {
        self.handlers.insert(handler.event_type(), Arc::new(handler));
    }

    pub async fn dispatch(
        &self,
        envelope: &SlackEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerResult, DispatchError> {
        let Some(handler) = self.handlers.get(&envelope.event.event_type()) else {
            debug!(
                event_name = "slack.dispatch.unhandled",
                correlation_id = %ctx.correlation_id,
                event_type = ?envelope.event.event_type(),
                "no handler registered for slack event"
            );
            return Ok(HandlerResult::Ignored);
        };

        handler.handle(envelope, ctx).await.map_err(DispatchError::from)
    }

    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }
}

/// Dispatcher with the emoji command, interactive action and membership handlers registered.
pub fn relay_dispatcher(
    commands: EmojiCommandService,
    responder: Arc<dyn InteractionResponder>,
    membership: Arc<ChannelMembershipService>,
) -> EventDispatcher {
    let mut dispatcher = EventDispatcher::new();
    dispatcher.register(SlashCommandHandler::new(commands.clone()));
    dispatcher.register(BlockActionHandler::new(commands, responder));
    dispatcher.register(MembershipHandler::new(membership));
    dispatcher
}

pub struct SlashCommandHandler {
    service: EmojiCommandService,
}

impl SlashCommandHandler {
    pub fn new(service: EmojiCommandService) -> Self {
        Self { service }
    }
}

#[async_trait]
impl EventHandler for SlashCommandHandler {
    fn event_type(&self) -> SlackEventType {
        SlackEventType::SlashCommand
    }

    async fn handle(
        &self,
        envelope: &SlackEnvelope,
        _ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        let SlackEvent::SlashCommand(payload) = &envelope.event else {
            return Ok(HandlerResult::Ignored);
        };

        let message = self.service.handle_slash_command(payload).await?;
        Ok(HandlerResult::Responded(message))
    }
}

/// Replies through `response_url` when the action carries one, otherwise returns the reply.
pub struct BlockActionHandler {
    service: EmojiCommandService,
    responder: Arc<dyn InteractionResponder>,
}

impl BlockActionHandler {
    pub fn new(service: EmojiCommandService, responder: Arc<dyn InteractionResponder>) -> Self {
        Self { service, responder }
    }
}

#[async_trait]
impl EventHandler for BlockActionHandler {
    fn event_type(&self) -> SlackEventType {
        SlackEventType::BlockAction
    }

    async fn handle(
        &self,
        envelope: &SlackEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        let SlackEvent::BlockAction(action) = &envelope.event else {
            return Ok(HandlerResult::Ignored);
        };

        let message = self
            .service
            .handle_block_action(action)
            .await?
            .unwrap_or_else(blocks::uncertain_action_message);

        match action.response_url.as_deref() {
            Some(response_url) => {
                self.responder.respond(response_url, &message).await?;
                info!(
                    event_name = "slack.action.responded",
                    correlation_id = %ctx.correlation_id,
                    action_id = %action.action_id,
                    "replied to interactive action"
                );
                Ok(HandlerResult::Processed)
            }
            None => Ok(HandlerResult::Responded(message)),
        }
    }
}

pub struct MembershipHandler {
    service: Arc<ChannelMembershipService>,
}

impl MembershipHandler {
    pub fn new(service: Arc<ChannelMembershipService>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl EventHandler for MembershipHandler {
    fn event_type(&self) -> SlackEventType {
        SlackEventType::ChannelMembership
    }

    async fn handle(
        &self,
        envelope: &SlackEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        let SlackEvent::ChannelMembership(change) = &envelope.event else {
            return Ok(HandlerResult::Ignored);
        };

        let outcome = self
            .service
            .apply(change, &ctx.correlation_id)
            .await
            .map_err(|e| EventHandlerError::Membership(e.to_string()))?;
        Ok(match outcome {
            MembershipOutcome::Added | MembershipOutcome::Removed => HandlerResult::Processed,
            MembershipOutcome::AlreadyMember
            | MembershipOutcome::NotMember
            | MembershipOutcome::AlreadyHandled
            | MembershipOutcome::OtherUser
            | MembershipOutcome::IdentityUnavailable => HandlerResult::Ignored,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use ghrelay_core::domain::emoji::EmojiKey;
    use ghrelay_db::repositories::{
        ChannelMembershipRepository, InMemoryChannelEventRepository,
        InMemoryChannelMembershipRepository, InMemoryEmojiRepository,
    };

    use super::{
        parse_events_api, parse_interaction, relay_dispatcher, EventContext, EventDispatcher,
        EventParseError, EventsApiRequest, HandlerResult, SlackEnvelope, SlackEvent,
    };
    use crate::commands::{BlockActionEvent, EmojiCommandService, SlashCommandPayload};
    use crate::emoji::EmojiCatalog;
    use crate::membership::{ChannelMembershipService, MembershipChange};
    use crate::messaging::{MessengerCall, RecordingMessenger, StaticBotIdentity};

    struct Harness {
        dispatcher: EventDispatcher,
        catalog: EmojiCatalog,
        responder: Arc<RecordingMessenger>,
        memberships: Arc<InMemoryChannelMembershipRepository>,
    }

    fn harness() -> Harness {
        let catalog = EmojiCatalog::new(Arc::new(InMemoryEmojiRepository::default()));
        let responder = Arc::new(RecordingMessenger::new());
        let memberships = Arc::new(InMemoryChannelMembershipRepository::default());
        let membership = Arc::new(ChannelMembershipService::new(
            Arc::new(StaticBotIdentity::new("B1", "U-BOT")),
            memberships.clone(),
            Arc::new(InMemoryChannelEventRepository::default()),
        ));
        let dispatcher = relay_dispatcher(
            EmojiCommandService::new(catalog.clone()),
            responder.clone(),
            membership,
        );
        Harness { dispatcher, catalog, responder, memberships }
    }

    fn envelope(event: SlackEvent) -> SlackEnvelope {
        SlackEnvelope { envelope_id: "env-1".to_owned(), event }
    }

    #[test]
    fn url_verification_carries_challenge() {
        let request = parse_events_api(
            br#"{"token":"t","challenge":"3eZbrw1aB","type":"url_verification"}"#,
        )
        .expect("parse");

        assert_eq!(request, EventsApiRequest::UrlVerification { challenge: "3eZbrw1aB".to_owned() });
    }

    #[test]
    fn membership_events_are_decoded() {
        let joined = parse_events_api(
            br#"{"type":"event_callback","event_id":"Ev1","event":{"type":"member_joined_channel","user":"U-BOT","channel":"C1","event_ts":"1700000000.000100"}}"#,
        )
        .expect("parse");
        let left = parse_events_api(
            br#"{"type":"event_callback","event_id":"Ev2","event":{"type":"group_left","channel":"G1","event_ts":"1700000001.000100"}}"#,
        )
        .expect("parse");

        assert_eq!(
            joined,
            EventsApiRequest::Callback(SlackEnvelope {
                envelope_id: "Ev1".to_owned(),
                event: SlackEvent::ChannelMembership(MembershipChange::Joined {
                    channel_id: "C1".to_owned(),
                    user_id: "U-BOT".to_owned(),
                    event_ts: "1700000000.000100".to_owned(),
                }),
            })
        );
        assert!(matches!(
            left,
            EventsApiRequest::Callback(SlackEnvelope {
                event: SlackEvent::ChannelMembership(MembershipChange::Left { ref channel_id, .. }),
                ..
            }) if channel_id == "G1"
        ));
    }

    #[test]
    fn other_callbacks_are_unsupported_and_incomplete_ones_fail() {
        let message = parse_events_api(
            br#"{"type":"event_callback","event_id":"Ev3","event":{"type":"message","channel":"C1"}}"#,
        )
        .expect("parse");
        assert!(matches!(
            message,
            EventsApiRequest::Callback(SlackEnvelope { event: SlackEvent::Unsupported { ref event_type }, .. })
                if event_type == "message"
        ));

        let error = parse_events_api(
            br#"{"type":"event_callback","event":{"type":"channel_left","channel":"C1"}}"#,
        )
        .expect_err("event_ts is required");
        assert!(matches!(error, EventParseError::MissingField { field: "event_ts", .. }));
    }

    #[test]
    fn block_actions_yield_one_envelope_per_action() {
        let envelopes = parse_interaction(
            r#"{"type":"block_actions","trigger_id":"T1","user":{"id":"U1"},"response_url":"https://hooks.slack.test/r/1","actions":[{"type":"static_select","action_id":"configure_emoji","block_id":":foo:","selected_option":{"value":"pr_merged"}},{"type":"button","action_id":"noop","block_id":"b2"}]}"#,
        )
        .expect("parse");

        assert_eq!(envelopes.len(), 2);
        assert_eq!(
            envelopes[0].event,
            SlackEvent::BlockAction(BlockActionEvent {
                action_type: "static_select".to_owned(),
                action_id: "configure_emoji".to_owned(),
                block_id: ":foo:".to_owned(),
                selected_value: Some("pr_merged".to_owned()),
                response_url: Some("https://hooks.slack.test/r/1".to_owned()),
                user_id: "U1".to_owned(),
            })
        );
        assert!(matches!(
            &envelopes[1].event,
            SlackEvent::BlockAction(BlockActionEvent { selected_value: None, .. })
        ));
    }

    #[tokio::test]
    async fn dispatcher_routes_slash_commands() {
        let harness = harness();
        let result = harness
            .dispatcher
            .dispatch(
                &envelope(SlackEvent::SlashCommand(SlashCommandPayload {
                    command: "/github".to_owned(),
                    text: "emoji :foo:".to_owned(),
                    channel_id: "C1".to_owned(),
                    user_id: "U1".to_owned(),
                })),
                &EventContext::default(),
            )
            .await
            .expect("dispatch");

        let HandlerResult::Responded(message) = result else {
            panic!("expected a response, got {result:?}");
        };
        assert!(message.fallback_text.contains(":foo:"));
    }

    #[tokio::test]
    async fn configure_action_replies_through_response_url() {
        let harness = harness();
        let action = BlockActionEvent {
            action_type: "static_select".to_owned(),
            action_id: "configure_emoji".to_owned(),
            block_id: ":shipit:".to_owned(),
            selected_value: Some("pr_closed".to_owned()),
            response_url: Some("https://hooks.slack.test/r/2".to_owned()),
            user_id: "U1".to_owned(),
        };

        let result = harness
            .dispatcher
            .dispatch(&envelope(SlackEvent::BlockAction(action)), &EventContext::default())
            .await
            .expect("dispatch");

        assert_eq!(result, HandlerResult::Processed);
        assert_eq!(harness.catalog.emoji_for(EmojiKey::PrClosed).await.expect("lookup"), ":shipit:");
        let calls = harness.responder.calls().await;
        assert!(matches!(
            calls.as_slice(),
            [MessengerCall::Respond { response_url, message }]
                if response_url == "https://hooks.slack.test/r/2" && message.replace_original == Some(true)
        ));
    }

    #[tokio::test]
    async fn unknown_action_gets_uncertainty_reply() {
        let harness = harness();
        let action = BlockActionEvent {
            action_type: "button".to_owned(),
            action_id: "approve".to_owned(),
            block_id: "b1".to_owned(),
            selected_value: None,
            response_url: None,
            user_id: "U1".to_owned(),
        };

        let result = harness
            .dispatcher
            .dispatch(&envelope(SlackEvent::BlockAction(action)), &EventContext::default())
            .await
            .expect("dispatch");

        let HandlerResult::Responded(message) = result else {
            panic!("expected a response, got {result:?}");
        };
        assert!(message.fallback_text.starts_with("There may have been an error"));
        assert!(harness.responder.calls().await.is_empty());
    }

    #[tokio::test]
    async fn membership_events_update_channel_list() {
        let harness = harness();
        let joined = envelope(SlackEvent::ChannelMembership(MembershipChange::Joined {
            channel_id: "C1".to_owned(),
            user_id: "U-BOT".to_owned(),
            event_ts: "1700000000.000100".to_owned(),
        }));

        let result =
            harness.dispatcher.dispatch(&joined, &EventContext::default()).await.expect("dispatch");
        assert_eq!(result, HandlerResult::Processed);
        assert_eq!(harness.memberships.list_channels("B1").await.expect("list"), vec!["C1"]);

        let replay =
            harness.dispatcher.dispatch(&joined, &EventContext::default()).await.expect("dispatch");
        assert_eq!(replay, HandlerResult::Ignored);
    }

    #[tokio::test]
    async fn unsupported_events_are_ignored() {
        let harness = harness();
        assert_eq!(harness.dispatcher.handler_count(), 3);

        let result = harness
            .dispatcher
            .dispatch(
                &envelope(SlackEvent::Unsupported { event_type: "app_mention".to_owned() }),
                &EventContext::default(),
            )
            .await
            .expect("dispatch");
        assert_eq!(result, HandlerResult::Ignored);
    }
}
