use serde::Serialize;

use ghrelay_core::domain::emoji::EmojiKey;

pub const CONFIGURE_EMOJI_ACTION_ID: &str = "configure_emoji";
pub const CONFIGURE_EMOJI_RESULT_BLOCK_ID: &str = "configure_emoji_result";

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TextObject {
    #[serde(rename = "plain_text")]
    Plain { text: String },
    Mrkdwn { text: String },
}

impl TextObject {
    pub fn plain(text: impl Into<String>) -> Self {
        Self::Plain { text: text.into() }
    }

    pub fn mrkdwn(text: impl Into<String>) -> Self {
        Self::Mrkdwn { text: text.into() }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SelectOption {
    pub text: TextObject,
    pub value: String,
}

impl SelectOption {
    pub fn new(label: impl Into<String>, value: impl Into<String>) -> Self {
        Self { text: TextObject::plain(label), value: value.into() }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Accessory {
    StaticSelect { action_id: String, placeholder: TextObject, options: Vec<SelectOption> },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Block {
    Section {
        block_id: String,
        text: TextObject,
        #[serde(skip_serializing_if = "Option::is_none")]
        accessory: Option<Accessory>,
    },
    Context {
        block_id: String,
        elements: Vec<TextObject>,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseType {
    Ephemeral,
    InChannel,
}

/// A Slack response body: fallback text plus optional blocks and delivery flags.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct MessageTemplate {
    #[serde(rename = "text")]
    pub fallback_text: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub blocks: Vec<Block>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mrkdwn: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub replace_original: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_type: Option<ResponseType>,
}

pub struct MessageBuilder {
    template: MessageTemplate,
}

impl MessageBuilder {
    pub fn new(fallback_text: impl Into<String>) -> Self {
        Self {
            template: MessageTemplate {
                fallback_text: fallback_text.into(),
                blocks: Vec::new(),
                mrkdwn: None,
                replace_original: None,
                response_type: None,
            },
        }
    }

    pub fn section<F>(mut self, block_id: impl Into<String>, build: F) -> Self
    where
        F: FnOnce(&mut SectionBuilder),
    {
        let mut builder = SectionBuilder::default();
        build(&mut builder);
        let (text, accessory) = builder.build();
        self.template.blocks.push(Block::Section { block_id: block_id.into(), text, accessory });
        self
    }

    pub fn context<F>(mut self, block_id: impl Into<String>, build: F) -> Self
    where
        F: FnOnce(&mut ContextBuilder),
    {
        let mut builder = ContextBuilder::default();
        build(&mut builder);
        self.template.blocks.push(Block::Context { block_id: block_id.into(), elements: builder.build() });
        self
    }

    /// Render the fallback text literally instead of as mrkdwn.
    pub fn plain_text(mut self) -> Self {
        self.template.mrkdwn = Some(false);
        self
    }

    pub fn replace_original(mut self) -> Self {
        self.template.replace_original = Some(true);
        self
    }

    pub fn ephemeral(mut self) -> Self {
        self.template.response_type = Some(ResponseType::Ephemeral);
        self
    }

    pub fn build(self) -> MessageTemplate {
        self.template
    }
}

#[derive(Default)]
pub struct SectionBuilder {
    text: Option<TextObject>,
    accessory: Option<Accessory>,
}

impl SectionBuilder {
    pub fn plain(&mut self, text: impl Into<String>) -> &mut Self {
        self.text = Some(TextObject::plain(text));
        self
    }

    pub fn mrkdwn(&mut self, text: impl Into<String>) -> &mut Self {
        self.text = Some(TextObject::mrkdwn(text));
        self
    }

    pub fn static_select(
        &mut self,
        action_id: impl Into<String>,
        placeholder: impl Into<String>,
        options: Vec<SelectOption>,
    ) -> &mut Self {
        self.accessory = Some(Accessory::StaticSelect {
            action_id: action_id.into(),
            placeholder: TextObject::plain(placeholder),
            options,
        });
        self
    }

    fn build(self) -> (TextObject, Option<Accessory>) {
        (self.text.unwrap_or_else(|| TextObject::plain("")), self.accessory)
    }
}

#[derive(Default)]
pub struct ContextBuilder {
    elements: Vec<TextObject>,
}

impl ContextBuilder {
    pub fn plain(&mut self, text: impl Into<String>) -> &mut Self {
        self.elements.push(TextObject::plain(text));
        self
    }

    pub fn mrkdwn(&mut self, text: impl Into<String>) -> &mut Self {
        self.elements.push(TextObject::mrkdwn(text));
        self
    }

    fn build(self) -> Vec<TextObject> {
        self.elements
    }
}

/// Current emoji for every key, in [`EmojiKey::ALL`] order.
pub fn emoji_listing_message(current: &[(EmojiKey, String)], command: &str) -> MessageTemplate {
    let mut text = String::from("*Current emoji:*\n\n");
    for (key, emoji) in current {
        text.push_str(&format!("{emoji} {}\n", key.description()));
    }
    text.push_str(&format!("\nTo change one, do: `{command} emoji :new-emoji:`"));
    MessageBuilder::new(text).build()
}

fn configure_prompt(builder: MessageBuilder, image: &str) -> MessageBuilder {
    let options = EmojiKey::ALL
        .into_iter()
        .map(|key| SelectOption::new(key.description(), key.as_str()))
        .collect();

    builder.section(image, |section| {
        section.mrkdwn(format!("Set which GitHub event to use for {image}")).static_select(
            CONFIGURE_EMOJI_ACTION_ID,
            "Select an event",
            options,
        );
    })
}

pub fn emoji_configure_prompt(image: &str) -> MessageTemplate {
    configure_prompt(MessageBuilder::new(format!("Set which GitHub event to use for {image}")), image)
        .build()
}

/// Confirmation replacing the prompt once a choice was stored; the select is dropped.
pub fn emoji_configured_message(image: &str) -> MessageTemplate {
    let prompt = format!("Set which GitHub event to use for {image}");
    MessageBuilder::new(prompt.clone())
        .section(image, |section| {
            section.mrkdwn(prompt);
        })
        .context(CONFIGURE_EMOJI_RESULT_BLOCK_ID, |context| {
            context.plain("Success");
        })
        .replace_original()
        .build()
}

pub fn emoji_syntax_error_message() -> MessageTemplate {
    MessageBuilder::new("Command may contain one optional `:image:`, and nothing else.")
        .plain_text()
        .build()
}

pub fn unrecognized_command_message(command: &str) -> MessageTemplate {
    MessageBuilder::new(format!(
        "Unrecognized command.\nTry `{command} emoji :<emoji>:` to configure the emoji for GitHub actions.\nFor example:\n>{command} emoji :rocket:"
    ))
    .build()
}

pub fn uncertain_action_message() -> MessageTemplate {
    MessageBuilder::new(
        "There may have been an error, but I'm not sure. Try to confirm whether your action took effect.",
    )
    .ephemeral()
    .build()
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use ghrelay_core::domain::emoji::EmojiKey;

    use super::{
        emoji_configure_prompt, emoji_configured_message, emoji_listing_message,
        emoji_syntax_error_message, uncertain_action_message, unrecognized_command_message, Block,
        MessageBuilder, TextObject,
    };

    #[test]
    fn message_builder_creates_typed_block_structure() {
        let message = MessageBuilder::new("fallback")
            .section("summary", |section| {
                section.mrkdwn("*Summary*");
            })
            .context("footer", |context| {
                context.plain("done");
            })
            .build();

        assert_eq!(message.blocks.len(), 2);
        assert!(matches!(
            &message.blocks[0],
            Block::Section { block_id, text: TextObject::Mrkdwn { .. }, accessory: None }
                if block_id == "summary"
        ));
        assert!(matches!(
            &message.blocks[1],
            Block::Context { block_id, elements } if block_id == "footer" && elements.len() == 1
        ));
    }

    #[test]
    fn listing_renders_every_key_in_order() {
        let current: Vec<_> =
            EmojiKey::ALL.into_iter().map(|key| (key, key.default_emoji().to_owned())).collect();
        let message = emoji_listing_message(&current, "/github");

        assert_eq!(
            message.fallback_text,
            "*Current emoji:*\n\n\
             :eight_pointed_black_star: Pull request opened\n\
             :rocket: Pull request merged\n\
             :x: Pull request closed without merging\n\
             :see_no_evil: Pull request converted to draft\n\
             :white_check_mark: Pull request approved\n\
             :exclamation: Pull request had changes requested\n\
             :speech_balloon: Pull request had comments\n\
             \nTo change one, do: `/github emoji :new-emoji:`"
        );
        assert!(message.blocks.is_empty());
    }

    #[test]
    fn configure_prompt_serializes_to_block_kit() {
        let value = serde_json::to_value(emoji_configure_prompt(":tada:")).expect("serialize");
        let options: Vec<_> = EmojiKey::ALL
            .into_iter()
            .map(|key| {
                json!({
                    "text": { "type": "plain_text", "text": key.description() },
                    "value": key.as_str()
                })
            })
            .collect();

        assert_eq!(
            value,
            json!({
                "text": "Set which GitHub event to use for :tada:",
                "blocks": [{
                    "type": "section",
                    "block_id": ":tada:",
                    "text": { "type": "mrkdwn", "text": "Set which GitHub event to use for :tada:" },
                    "accessory": {
                        "type": "static_select",
                        "action_id": "configure_emoji",
                        "placeholder": { "type": "plain_text", "text": "Select an event" },
                        "options": options
                    }
                }]
            })
        );
    }

    #[test]
    fn configured_message_replaces_original_with_success_context() {
        let message = emoji_configured_message(":tada:");

        assert_eq!(message.replace_original, Some(true));
        assert_eq!(message.blocks.len(), 2);
        assert!(matches!(
            &message.blocks[0],
            Block::Section { block_id, accessory: None, .. } if block_id == ":tada:"
        ));
        assert!(matches!(
            &message.blocks[1],
            Block::Context { elements, .. }
                if elements == &vec![TextObject::plain("Success")]
        ));
    }

    #[test]
    fn syntax_error_is_plain_text() {
        let value = serde_json::to_value(emoji_syntax_error_message()).expect("serialize");
        assert_eq!(
            value,
            json!({
                "text": "Command may contain one optional `:image:`, and nothing else.",
                "mrkdwn": false
            })
        );
    }

    #[test]
    fn help_echoes_the_invoked_command() {
        assert_eq!(
            unrecognized_command_message("/gh").fallback_text,
            "Unrecognized command.\nTry `/gh emoji :<emoji>:` to configure the emoji for GitHub actions.\nFor example:\n>/gh emoji :rocket:"
        );
    }

    #[test]
    fn uncertain_action_reply_is_ephemeral() {
        let value = serde_json::to_value(uncertain_action_message()).expect("serialize");
        assert_eq!(value["response_type"], "ephemeral");
    }
}
