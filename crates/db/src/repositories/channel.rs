use sqlx::Row;

use super::{ChannelEventRepository, ChannelMembershipRepository, RepositoryError};
use crate::DbPool;

pub struct SqlChannelMembershipRepository {
    pool: DbPool,
}

impl SqlChannelMembershipRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl ChannelMembershipRepository for SqlChannelMembershipRepository {
    async fn list_channels(&self, bot_id: &str) -> Result<Vec<String>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT channel FROM bot_channel_membership WHERE bot_id = ? ORDER BY rowid ASC",
        )
        .bind(bot_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| row.try_get("channel").map_err(|e| RepositoryError::Decode(e.to_string())))
            .collect()
    }

    async fn add_channel(&self, bot_id: &str, channel: &str) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            "INSERT OR IGNORE INTO bot_channel_membership (bot_id, channel) VALUES (?, ?)",
        )
        .bind(bot_id)
        .bind(channel)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn remove_channel(&self, bot_id: &str, channel: &str) -> Result<bool, RepositoryError> {
        let result =
            sqlx::query("DELETE FROM bot_channel_membership WHERE bot_id = ? AND channel = ?")
                .bind(bot_id)
                .bind(channel)
                .execute(&self.pool)
                .await?;

        Ok(result.rows_affected() > 0)
    }
}

pub struct SqlChannelEventRepository {
    pool: DbPool,
}

impl SqlChannelEventRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl ChannelEventRepository for SqlChannelEventRepository {
    async fn record_if_newer(&self, channel: &str, event_ts: f64) -> Result<bool, RepositoryError> {
        // Single statement so concurrent deliveries for one channel cannot both win.
        let result = sqlx::query(
            "INSERT INTO channel_event_ledger (channel, last_event_ts)
             VALUES (?, ?)
             ON CONFLICT(channel) DO UPDATE SET
                 last_event_ts = excluded.last_event_ts
             WHERE excluded.last_event_ts > channel_event_ledger.last_event_ts",
        )
        .bind(channel)
        .bind(event_ts)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}
