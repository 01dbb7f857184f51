use async_trait::async_trait;
use thiserror::Error;

use ghrelay_core::domain::emoji::EmojiKey;
use ghrelay_core::domain::pull_request::PrThreadKey;

pub mod channel;
pub mod emoji;
pub mod memory;
pub mod pr_thread;

pub use channel::{SqlChannelEventRepository, SqlChannelMembershipRepository};
pub use emoji::SqlEmojiRepository;
pub use memory::{
    InMemoryChannelEventRepository, InMemoryChannelMembershipRepository, InMemoryEmojiRepository,
    InMemoryLastCommenterRepository, InMemoryPrThreadRepository,
};
pub use pr_thread::{SqlLastCommenterRepository, SqlPrThreadRepository};

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
}

/// Slack timestamp of the top-level message announcing a pull request in a channel.
#[async_trait]
pub trait PrThreadRepository: Send + Sync {
    async fn find_thread(&self, key: &PrThreadKey) -> Result<Option<String>, RepositoryError>;
    async fn save_thread(&self, key: &PrThreadKey, thread_ts: &str) -> Result<(), RepositoryError>;
}

/// Login of the most recent commenter on a thread. An empty string means cleared.
#[async_trait]
pub trait LastCommenterRepository: Send + Sync {
    async fn find_last_commenter(&self, key: &PrThreadKey)
        -> Result<Option<String>, RepositoryError>;
    async fn save_last_commenter(&self, key: &PrThreadKey, login: &str)
        -> Result<(), RepositoryError>;

    async fn clear_last_commenter(&self, key: &PrThreadKey) -> Result<(), RepositoryError> {
        self.save_last_commenter(key, "").await
    }
}

#[async_trait]
pub trait EmojiRepository: Send + Sync {
    async fn find_override(&self, key: EmojiKey) -> Result<Option<String>, RepositoryError>;
    async fn save_override(&self, key: EmojiKey, emoji: &str) -> Result<(), RepositoryError>;
}

/// Channels a bot identity belongs to, in join order.
#[async_trait]
pub trait ChannelMembershipRepository: Send + Sync {
    async fn list_channels(&self, bot_id: &str) -> Result<Vec<String>, RepositoryError>;
    /// Returns `false` when the bot was already a member.
    async fn add_channel(&self, bot_id: &str, channel: &str) -> Result<bool, RepositoryError>;
    /// Returns `false` when the bot was not a member.
    async fn remove_channel(&self, bot_id: &str, channel: &str) -> Result<bool, RepositoryError>;
}

/// Last handled membership-event timestamp per channel.
#[async_trait]
pub trait ChannelEventRepository: Send + Sync {
    /// Stores `event_ts` only if it is strictly newer than the stored value.
    /// Returns whether the event should be handled.
    async fn record_if_newer(&self, channel: &str, event_ts: f64) -> Result<bool, RepositoryError>;
}
