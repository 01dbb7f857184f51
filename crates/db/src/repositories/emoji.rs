use sqlx::Row;

use ghrelay_core::domain::emoji::EmojiKey;

use super::{EmojiRepository, RepositoryError};
use crate::DbPool;

pub struct SqlEmojiRepository {
    pool: DbPool,
}

impl SqlEmojiRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl EmojiRepository for SqlEmojiRepository {
    async fn find_override(&self, key: EmojiKey) -> Result<Option<String>, RepositoryError> {
        let row = sqlx::query("SELECT emoji FROM emoji_override WHERE emoji_key = ?")
            .bind(key.as_str())
            .fetch_optional(&self.pool)
            .await?;

        row.map(|row| row.try_get("emoji").map_err(|e| RepositoryError::Decode(e.to_string())))
            .transpose()
    }

    async fn save_override(&self, key: EmojiKey, emoji: &str) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO emoji_override (emoji_key, emoji)
             VALUES (?, ?)
             ON CONFLICT(emoji_key) DO UPDATE SET
                 emoji = excluded.emoji,
                 updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')",
        )
        .bind(key.as_str())
        .bind(emoji)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
