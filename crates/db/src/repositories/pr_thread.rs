use sqlx::Row;

use ghrelay_core::domain::pull_request::PrThreadKey;

use super::{LastCommenterRepository, PrThreadRepository, RepositoryError};
use crate::DbPool;

pub struct SqlPrThreadRepository {
    pool: DbPool,
}

impl SqlPrThreadRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl PrThreadRepository for SqlPrThreadRepository {
    async fn find_thread(&self, key: &PrThreadKey) -> Result<Option<String>, RepositoryError> {
        let row = sqlx::query("SELECT thread_ts FROM pr_thread WHERE channel = ? AND pr_url = ?")
            .bind(&key.channel)
            .bind(&key.pr_url)
            .fetch_optional(&self.pool)
            .await?;

        row.map(|row| row.try_get("thread_ts").map_err(|e| RepositoryError::Decode(e.to_string())))
            .transpose()
    }

    async fn save_thread(&self, key: &PrThreadKey, thread_ts: &str) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO pr_thread (channel, pr_url, thread_ts)
             VALUES (?, ?, ?)
             ON CONFLICT(channel, pr_url) DO UPDATE SET
                 thread_ts = excluded.thread_ts,
                 updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')",
        )
        .bind(&key.channel)
        .bind(&key.pr_url)
        .bind(thread_ts)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

pub struct SqlLastCommenterRepository {
    pool: DbPool,
}

impl SqlLastCommenterRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl LastCommenterRepository for SqlLastCommenterRepository {
    async fn find_last_commenter(
        &self,
        key: &PrThreadKey,
    ) -> Result<Option<String>, RepositoryError> {
        let row =
            sqlx::query("SELECT login FROM pr_last_commenter WHERE channel = ? AND pr_url = ?")
                .bind(&key.channel)
                .bind(&key.pr_url)
                .fetch_optional(&self.pool)
                .await?;

        row.map(|row| row.try_get("login").map_err(|e| RepositoryError::Decode(e.to_string())))
            .transpose()
    }

    async fn save_last_commenter(
        &self,
        key: &PrThreadKey,
        login: &str,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO pr_last_commenter (channel, pr_url, login)
             VALUES (?, ?, ?)
             ON CONFLICT(channel, pr_url) DO UPDATE SET
                 login = excluded.login,
                 updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')",
        )
        .bind(&key.channel)
        .bind(&key.pr_url)
        .bind(login)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
