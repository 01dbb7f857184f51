use std::sync::Arc;

use crate::repositories::{
    ChannelEventRepository, ChannelMembershipRepository, EmojiRepository,
    InMemoryChannelEventRepository, InMemoryChannelMembershipRepository, InMemoryEmojiRepository,
    InMemoryLastCommenterRepository, InMemoryPrThreadRepository, LastCommenterRepository,
    PrThreadRepository, SqlChannelEventRepository, SqlChannelMembershipRepository,
    SqlEmojiRepository, SqlLastCommenterRepository, SqlPrThreadRepository,
};
use crate::DbPool;

/// The relay's durable state, constructed once per process (or per test).
#[derive(Clone)]
pub struct Stores {
    pub threads: Arc<dyn PrThreadRepository>,
    pub last_commenters: Arc<dyn LastCommenterRepository>,
    pub emoji: Arc<dyn EmojiRepository>,
    pub memberships: Arc<dyn ChannelMembershipRepository>,
    pub channel_events: Arc<dyn ChannelEventRepository>,
}

impl Stores {
    pub fn in_memory() -> Self {
        Self {
            threads: Arc::new(InMemoryPrThreadRepository::default()),
            last_commenters: Arc::new(InMemoryLastCommenterRepository::default()),
            emoji: Arc::new(InMemoryEmojiRepository::default()),
            memberships: Arc::new(InMemoryChannelMembershipRepository::default()),
            channel_events: Arc::new(InMemoryChannelEventRepository::default()),
        }
    }

    pub fn sqlite(pool: DbPool) -> Self {
        Self {
            threads: Arc::new(SqlPrThreadRepository::new(pool.clone())),
            last_commenters: Arc::new(SqlLastCommenterRepository::new(pool.clone())),
            emoji: Arc::new(SqlEmojiRepository::new(pool.clone())),
            memberships: Arc::new(SqlChannelMembershipRepository::new(pool.clone())),
            channel_events: Arc::new(SqlChannelEventRepository::new(pool)),
        }
    }
}

#[cfg(test)]
mod tests {
    use ghrelay_core::domain::emoji::EmojiKey;

    use super::Stores;
    use crate::{connect_with_settings, migrations};

    #[tokio::test]
    async fn sqlite_stores_share_one_pool() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        let stores = Stores::sqlite(pool);

        stores.emoji.save_override(EmojiKey::PrDraft, ":construction:").await.expect("save");
        stores.memberships.add_channel("B1", "C1").await.expect("join");

        assert_eq!(
            stores.emoji.find_override(EmojiKey::PrDraft).await.expect("find").as_deref(),
            Some(":construction:")
        );
        assert_eq!(stores.memberships.list_channels("B1").await.expect("list"), vec!["C1"]);
    }
}
