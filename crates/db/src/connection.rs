use std::{str::FromStr, time::Duration};

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};

pub type DbPool = sqlx::SqlitePool;

pub async fn connect(database_url: &str) -> Result<DbPool, sqlx::Error> {
    connect_with_settings(database_url, 5, 30).await
}

fn is_in_memory(database_url: &str) -> bool {
    database_url.contains(":memory:") || database_url.contains("mode=memory")
}

/// Opens a pool, creating the database file if it does not exist yet.
///
/// An in-memory database lives only as long as its connection, so it is pinned to one
/// connection that never idles out.
pub async fn connect_with_settings(
    database_url: &str,
    max_connections: u32,
    timeout_secs: u64,
) -> Result<DbPool, sqlx::Error> {
    let in_memory = is_in_memory(database_url);
    let mut options = SqliteConnectOptions::from_str(database_url)?
        .create_if_missing(true)
        .foreign_keys(true)
        .busy_timeout(Duration::from_secs(5));
    if !in_memory {
        options = options.journal_mode(SqliteJournalMode::Wal);
    }

    let pool = SqlitePoolOptions::new()
        .acquire_timeout(Duration::from_secs(timeout_secs.max(1)));
    let pool = if in_memory {
        pool.max_connections(1).idle_timeout(None).max_lifetime(None)
    } else {
        pool.max_connections(max_connections.max(1))
    };

    pool.connect_with(options).await
}

#[cfg(test)]
mod tests {
    use super::{connect, connect_with_settings, is_in_memory};

    #[test]
    fn recognises_in_memory_urls() {
        assert!(is_in_memory("sqlite::memory:"));
        assert!(is_in_memory("sqlite://relay?mode=memory&cache=shared"));
        assert!(!is_in_memory("sqlite://ghrelay.db"));
    }

    #[tokio::test]
    async fn in_memory_pool_keeps_one_connection() {
        let pool = connect_with_settings("sqlite::memory:", 8, 5).await.expect("connect");
        sqlx::query("CREATE TABLE probe (id INTEGER)").execute(&pool).await.expect("create");
        sqlx::query("INSERT INTO probe (id) VALUES (1)").execute(&pool).await.expect("insert");

        let (count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM probe").fetch_one(&pool).await.expect("count");
        assert_eq!(count, 1);
        assert_eq!(pool.options().get_max_connections(), 1);
    }

    #[tokio::test]
    async fn file_database_is_created_on_first_connect() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("relay.db");

        let pool = connect(&format!("sqlite://{}", path.display())).await.expect("connect");
        let (foreign_keys,): (i64,) =
            sqlx::query_as("PRAGMA foreign_keys").fetch_one(&pool).await.expect("pragma");

        assert!(path.exists());
        assert_eq!(foreign_keys, 1);
        pool.close().await;
    }
}
