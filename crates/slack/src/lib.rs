//! Slack side of ghrelay.
//!
//! - **Notifier** (`notifier`) - turns one GitHub event into thread messages for one channel
//! - **Relay** (`relay`) - fans a webhook out to every channel the bot belongs to
//! - **Commands** (`commands`) - the `emoji` slash command and its configure select
//! - **Events** (`events`) - Events API and interactive payload decoding, handler dispatch
//! - **Membership** (`membership`) - tracks channel joins and leaves of the bot
//! - **Block Kit** (`blocks`) - response message builders
//! - **Web API** (`web_api`) - `reqwest` client behind the messaging ports
//!
//! # Architecture
//!
//! ```text
//! GitHub webhook → GithubRelay → Notifier (per channel) → SlackMessenger
//! Slack request  → EventDispatcher → Handlers → EmojiCatalog / ChannelMembershipService
//! ```

pub mod blocks;
pub mod commands;
pub mod emoji;
pub mod events;
pub mod membership;
pub mod messaging;
pub mod notifier;
pub mod relay;
pub mod web_api;
