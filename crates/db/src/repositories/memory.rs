use std::collections::HashMap;

use tokio::sync::RwLock;

use ghrelay_core::domain::emoji::EmojiKey;
use ghrelay_core::domain::pull_request::PrThreadKey;

use super::{
    ChannelEventRepository, ChannelMembershipRepository, EmojiRepository,
    LastCommenterRepository, PrThreadRepository, RepositoryError,
};

#[derive(Default)]
pub struct InMemoryPrThreadRepository {
    threads: RwLock<HashMap<PrThreadKey, String>>,
}

#[async_trait::async_trait]
impl PrThreadRepository for InMemoryPrThreadRepository {
    async fn find_thread(&self, key: &PrThreadKey) -> Result<Option<String>, RepositoryError> {
        let threads = self.threads.read().await;
        Ok(threads.get(key).cloned())
    }

    async fn save_thread(&self, key: &PrThreadKey, thread_ts: &str) -> Result<(), RepositoryError> {
        let mut threads = self.threads.write().await;
        threads.insert(key.clone(), thread_ts.to_owned());
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryLastCommenterRepository {
    commenters: RwLock<HashMap<PrThreadKey, String>>,
}

#[async_trait::async_trait]
impl LastCommenterRepository for InMemoryLastCommenterRepository {
    async fn find_last_commenter(
        &self,
        key: &PrThreadKey,
    ) -> Result<Option<String>, RepositoryError> {
        let commenters = self.commenters.read().await;
        Ok(commenters.get(key).cloned())
    }

    async fn save_last_commenter(
        &self,
        key: &PrThreadKey,
        login: &str,
    ) -> Result<(), RepositoryError> {
        let mut commenters = self.commenters.write().await;
        commenters.insert(key.clone(), login.to_owned());
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryEmojiRepository {
    overrides: RwLock<HashMap<EmojiKey, String>>,
}

#[async_trait::async_trait]
impl EmojiRepository for InMemoryEmojiRepository {
    async fn find_override(&self, key: EmojiKey) -> Result<Option<String>, RepositoryError> {
        let overrides = self.overrides.read().await;
        Ok(overrides.get(&key).cloned())
    }

    async fn save_override(&self, key: EmojiKey, emoji: &str) -> Result<(), RepositoryError> {
        let mut overrides = self.overrides.write().await;
        overrides.insert(key, emoji.to_owned());
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryChannelMembershipRepository {
    memberships: RwLock<HashMap<String, Vec<String>>>,
}

#[async_trait::async_trait]
impl ChannelMembershipRepository for InMemoryChannelMembershipRepository {
    async fn list_channels(&self, bot_id: &str) -> Result<Vec<String>, RepositoryError> {
        let memberships = self.memberships.read().await;
        Ok(memberships.get(bot_id).cloned().unwrap_or_default())
    }

    async fn add_channel(&self, bot_id: &str, channel: &str) -> Result<bool, RepositoryError> {
        let mut memberships = self.memberships.write().await;
        let channels = memberships.entry(bot_id.to_owned()).or_default();
        if channels.iter().any(|existing| existing == channel) {
            return Ok(false);
        }
        channels.push(channel.to_owned());
        Ok(true)
    }

    async fn remove_channel(&self, bot_id: &str, channel: &str) -> Result<bool, RepositoryError> {
        let mut memberships = self.memberships.write().await;
        let Some(channels) = memberships.get_mut(bot_id) else {
            return Ok(false);
        };
        let before = channels.len();
        channels.retain(|existing| existing != channel);
        Ok(channels.len() != before)
    }
}

#[derive(Default)]
pub struct InMemoryChannelEventRepository {
    last_seen: RwLock<HashMap<String, f64>>,
}

#[async_trait::async_trait]
impl ChannelEventRepository for InMemoryChannelEventRepository {
    async fn record_if_newer(&self, channel: &str, event_ts: f64) -> Result<bool, RepositoryError> {
        let mut last_seen = self.last_seen.write().await;
        match last_seen.get(channel) {
            Some(previous) if event_ts <= *previous => Ok(false),
            _ => {
                last_seen.insert(channel.to_owned(), event_ts);
                Ok(true)
            }
        }
    }
}
