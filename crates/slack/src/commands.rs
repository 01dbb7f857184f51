use thiserror::Error;
use tracing::{info, warn};

use ghrelay_core::domain::emoji::EmojiKey;

use crate::blocks::{self, MessageTemplate, CONFIGURE_EMOJI_ACTION_ID};
use crate::emoji::EmojiCatalog;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SlashCommandPayload {
    /// The command as invoked, e.g. `/github`. Only echoed back in help text.
    pub command: String,
    pub text: String,
    pub channel_id: String,
    pub user_id: String,
}

/// One interactive element acted on in a `block_actions` payload.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BlockActionEvent {
    pub action_type: String,
    pub action_id: String,
    pub block_id: String,
    pub selected_value: Option<String>,
    pub response_url: Option<String>,
    pub user_id: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EmojiCommand {
    Describe,
    Configure { image: String },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SlashCommand {
    Emoji(EmojiCommand),
    Unrecognized,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandParseError {
    #[error("Command may contain one optional `:image:`, and nothing else.")]
    UnexpectedContent,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandRouteError {
    #[error("emoji store failed: {0}")]
    Store(String),
}

pub fn parse_slash_command(text: &str) -> Result<SlashCommand, CommandParseError> {
    if !starts_with_emoji_word(text) {
        return Ok(SlashCommand::Unrecognized);
    }
    parse_emoji_command(text).map(SlashCommand::Emoji)
}

fn starts_with_emoji_word(text: &str) -> bool {
    let Some(rest) = text.strip_prefix("emoji") else {
        return false;
    };
    rest.chars().next().map_or(true, |next| !(next.is_alphanumeric() || next == '_'))
}

/// Parses `emoji`, optionally followed by a single `:image:` literal and nothing else.
///
/// Anything glued to `emoji` without whitespace is not an argument and leaves the
/// command as a plain describe request.
pub fn parse_emoji_command(text: &str) -> Result<EmojiCommand, CommandParseError> {
    let Some(rest) = text.strip_prefix("emoji") else {
        return Ok(EmojiCommand::Describe);
    };
    if !rest.starts_with(char::is_whitespace) {
        return Ok(EmojiCommand::Describe);
    }

    let rest = rest.trim_start();
    let (image, remainder) = match split_image(rest) {
        Some((image, remainder)) => (Some(image), remainder.trim_start()),
        None => (None, rest),
    };

    let extra = remainder.split('\n').next().unwrap_or_default();
    if !extra.is_empty() {
        return Err(CommandParseError::UnexpectedContent);
    }

    Ok(match image {
        Some(image) => EmojiCommand::Configure { image: image.to_owned() },
        None => EmojiCommand::Describe,
    })
}

/// Splits a leading `:name:` literal (at least one character between the colons).
fn split_image(text: &str) -> Option<(&str, &str)> {
    let inner = text.strip_prefix(':')?;
    let close = inner.find(':')?;
    if close == 0 {
        return None;
    }
    let end = close + 2;
    Some((&text[..end], &text[end..]))
}

/// Handles the `emoji` slash command and the `configure_emoji` select it produces.
#[derive(Clone)]
pub struct EmojiCommandService {
    catalog: EmojiCatalog,
}

impl EmojiCommandService {
    pub fn new(catalog: EmojiCatalog) -> Self {
        Self { catalog }
    }

    pub async fn handle_slash_command(
        &self,
        payload: &SlashCommandPayload,
    ) -> Result<MessageTemplate, CommandRouteError> {
        match parse_slash_command(&payload.text) {
            Ok(SlashCommand::Emoji(EmojiCommand::Describe)) => {
                let current = self
                    .catalog
                    .current()
                    .await
                    .map_err(|e| CommandRouteError::Store(e.to_string()))?;
                Ok(blocks::emoji_listing_message(&current, &payload.command))
            }
            Ok(SlashCommand::Emoji(EmojiCommand::Configure { image })) => {
                Ok(blocks::emoji_configure_prompt(&image))
            }
            Ok(SlashCommand::Unrecognized) => Ok(blocks::unrecognized_command_message(&payload.command)),
            Err(CommandParseError::UnexpectedContent) => Ok(blocks::emoji_syntax_error_message()),
        }
    }

    /// Returns `None` for actions this service does not understand; nothing is stored for them.
    pub async fn handle_block_action(
        &self,
        action: &BlockActionEvent,
    ) -> Result<Option<MessageTemplate>, CommandRouteError> {
        if action.action_type != "static_select" || action.action_id != CONFIGURE_EMOJI_ACTION_ID {
            info!(
                event_name = "slack.action.unknown",
                action_type = %action.action_type,
                action_id = %action.action_id,
                "ignoring unknown interactive action"
            );
            return Ok(None);
        }

        let Some(selected) = action.selected_value.as_deref() else {
            warn!(
                event_name = "slack.action.missing_selection",
                block_id = %action.block_id,
                "configure_emoji action without a selected option"
            );
            return Ok(None);
        };
        let key = match selected.parse::<EmojiKey>() {
            Ok(key) => key,
            Err(error) => {
                warn!(
                    event_name = "slack.action.unknown_emoji_key",
                    selected,
                    error = %error,
                    "configure_emoji action selected an unknown event"
                );
                return Ok(None);
            }
        };

        let image = action.block_id.as_str();
        self.catalog.set(key, image).await.map_err(|e| CommandRouteError::Store(e.to_string()))?;
        info!(
            event_name = "slack.action.emoji_configured",
            emoji_key = %key,
            emoji = image,
            user_id = %action.user_id,
            "emoji configured"
        );
        Ok(Some(blocks::emoji_configured_message(image)))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use ghrelay_core::domain::emoji::EmojiKey;
    use ghrelay_db::repositories::InMemoryEmojiRepository;

    use super::{
        parse_emoji_command, parse_slash_command, BlockActionEvent, CommandParseError,
        EmojiCommand, EmojiCommandService, SlashCommand, SlashCommandPayload,
    };
    use crate::blocks::{Block, TextObject};
    use crate::emoji::EmojiCatalog;

    fn service() -> (EmojiCommandService, EmojiCatalog) {
        let catalog = EmojiCatalog::new(Arc::new(InMemoryEmojiRepository::default()));
        (EmojiCommandService::new(catalog.clone()), catalog)
    }

    fn payload(text: &str) -> SlashCommandPayload {
        SlashCommandPayload {
            command: "/github".to_owned(),
            text: text.to_owned(),
            channel_id: "C1".to_owned(),
            user_id: "U1".to_owned(),
        }
    }

    fn select(block_id: &str, value: Option<&str>) -> BlockActionEvent {
        BlockActionEvent {
            action_type: "static_select".to_owned(),
            action_id: "configure_emoji".to_owned(),
            block_id: block_id.to_owned(),
            selected_value: value.map(str::to_owned),
            response_url: None,
            user_id: "U1".to_owned(),
        }
    }

    #[test]
    fn bare_emoji_describes() {
        assert_eq!(parse_emoji_command("emoji"), Ok(EmojiCommand::Describe));
        assert_eq!(parse_emoji_command("emoji   "), Ok(EmojiCommand::Describe));
    }

    #[test]
    fn single_image_configures() {
        assert_eq!(
            parse_emoji_command("emoji :foo:"),
            Ok(EmojiCommand::Configure { image: ":foo:".to_owned() })
        );
        assert_eq!(
            parse_emoji_command("emoji\t:party-parrot:  "),
            Ok(EmojiCommand::Configure { image: ":party-parrot:".to_owned() })
        );
    }

    #[test]
    fn trailing_content_is_rejected() {
        for text in ["emoji :foo: :bar:", "emoji junk", "emoji :foo: :bar: junk", "emoji ::"] {
            assert_eq!(
                parse_emoji_command(text),
                Err(CommandParseError::UnexpectedContent),
                "`{text}` should be rejected"
            );
        }
    }

    #[test]
    fn only_the_emoji_word_routes_to_the_emoji_command() {
        assert_eq!(parse_slash_command("emojis"), Ok(SlashCommand::Unrecognized));
        assert_eq!(parse_slash_command("help"), Ok(SlashCommand::Unrecognized));
        assert_eq!(parse_slash_command(""), Ok(SlashCommand::Unrecognized));
        assert_eq!(parse_slash_command("emoji"), Ok(SlashCommand::Emoji(EmojiCommand::Describe)));
    }

    #[tokio::test]
    async fn describe_lists_current_emoji() {
        let (service, catalog) = service();
        catalog.set(EmojiKey::PrMerged, ":tada:").await.expect("set");

        let message = service.handle_slash_command(&payload("emoji")).await.expect("handle");

        assert!(message.fallback_text.starts_with("*Current emoji:*\n\n"));
        assert!(message.fallback_text.contains(":tada: Pull request merged\n"));
        assert!(message.fallback_text.ends_with("To change one, do: `/github emoji :new-emoji:`"));
    }

    #[tokio::test]
    async fn malformed_command_returns_plain_error_text() {
        let (service, _) = service();
        let message = service.handle_slash_command(&payload("emoji junk")).await.expect("handle");

        assert_eq!(message.fallback_text, "Command may contain one optional `:image:`, and nothing else.");
        assert_eq!(message.mrkdwn, Some(false));
    }

    #[tokio::test]
    async fn unrecognized_command_returns_help() {
        let (service, _) = service();
        let message = service.handle_slash_command(&payload("deploy")).await.expect("handle");

        assert!(message.fallback_text.starts_with("Unrecognized command.\nTry `/github emoji :<emoji>:`"));
    }

    #[tokio::test]
    async fn configure_returns_select_prompt_keyed_by_image() {
        let (service, _) = service();
        let message = service.handle_slash_command(&payload("emoji :foo:")).await.expect("handle");

        assert!(matches!(
            &message.blocks[0],
            Block::Section { block_id, text: TextObject::Mrkdwn { text }, accessory: Some(_) }
                if block_id == ":foo:" && text == "Set which GitHub event to use for :foo:"
        ));
    }

    #[tokio::test]
    async fn configure_action_stores_image_for_selected_key() {
        let (service, catalog) = service();

        let reply = service
            .handle_block_action(&select(":shipit:", Some("pr_merged")))
            .await
            .expect("handle")
            .expect("configured");

        assert_eq!(catalog.emoji_for(EmojiKey::PrMerged).await.expect("lookup"), ":shipit:");
        assert_eq!(reply.replace_original, Some(true));
    }

    #[tokio::test]
    async fn unknown_actions_change_nothing() {
        let (service, catalog) = service();
        let mut button = select(":shipit:", Some("pr_merged"));
        button.action_type = "button".to_owned();
        let mut other_select = select(":shipit:", Some("pr_merged"));
        other_select.action_id = "something_else".to_owned();

        for action in [button, other_select, select(":shipit:", Some("pr_reopened")), select(":shipit:", None)] {
            assert_eq!(service.handle_block_action(&action).await.expect("handle"), None);
        }
        assert_eq!(catalog.emoji_for(EmojiKey::PrMerged).await.expect("lookup"), ":rocket:");
    }
}
