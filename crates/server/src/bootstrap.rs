use std::sync::Arc;

use ghrelay_core::config::{AppConfig, ConfigError, LoadOptions};
use ghrelay_db::{connect_with_settings, migrations, DbPool, Stores};
use ghrelay_slack::web_api::SlackWebClient;
use thiserror::Error;
use tracing::info;

use crate::routes::{AppState, SlackPorts};

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub state: AppState,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
}

pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting application bootstrap"
    );

    let db_pool = connect_with_settings(
        &config.database.url,
        config.database.max_connections,
        config.database.timeout_secs,
    )
    .await
    .map_err(BootstrapError::DatabaseConnect)?;
    info!(
        event_name = "system.bootstrap.database_connected",
        correlation_id = "bootstrap",
        "database connection established"
    );

    migrations::run_pending(&db_pool).await.map_err(BootstrapError::Migration)?;
    info!(
        event_name = "system.bootstrap.migrations_applied",
        correlation_id = "bootstrap",
        "database migrations applied"
    );

    let slack = Arc::new(SlackWebClient::new(&config.slack));
    let ports = SlackPorts { messenger: slack.clone(), identity: slack.clone(), responder: slack };
    let state = AppState::assemble(
        Stores::sqlite(db_pool.clone()),
        ports,
        config.github.blocked_logins.clone(),
    )
    .with_github_webhook_secret(config.github.webhook_secret.clone())
    .with_slack_signing_secret(config.slack.signing_secret.clone());

    info!(
        event_name = "system.bootstrap.ready",
        correlation_id = "bootstrap",
        github_signature_check = config.github.webhook_secret.is_some(),
        slack_signature_check = config.slack.signing_secret.is_some(),
        blocked_logins = config.github.blocked_logins.len(),
        "relay wired"
    );

    Ok(Application { config, db_pool, state })
}
