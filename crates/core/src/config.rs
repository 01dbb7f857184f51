//! Layered configuration: compiled defaults, then an optional TOML file, then `GHRELAY_*`
//! environment variables, then programmatic overrides. Every layer is a [`ConfigPatch`].

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_BLOCKED_LOGINS: &[&str] = &["github-actions[bot]"];

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub slack: SlackConfig,
    pub github: GithubConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct SlackConfig {
    pub bot_token: SecretString,
    /// When absent, inbound Slack requests are accepted without signature checks.
    pub signing_secret: Option<SecretString>,
    pub api_base_url: String,
}

#[derive(Clone, Debug)]
pub struct GithubConfig {
    /// When absent, webhook deliveries are accepted without `X-Hub-Signature-256`.
    pub webhook_secret: Option<SecretString>,
    /// Senders whose events are never relayed.
    pub blocked_logins: Vec<String>,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
    pub graceful_shutdown_secs: u64,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub database_url: Option<String>,
    pub log_level: Option<String>,
    pub slack_bot_token: Option<String>,
    pub slack_signing_secret: Option<String>,
    pub slack_api_base_url: Option<String>,
    pub github_webhook_secret: Option<String>,
    pub github_blocked_logins: Option<Vec<String>>,
    pub server_port: Option<u16>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: "sqlite://ghrelay.db?mode=rwc".to_owned(),
                max_connections: 5,
                timeout_secs: 30,
            },
            slack: SlackConfig {
                bot_token: String::new().into(),
                signing_secret: None,
                api_base_url: "https://slack.com/api".to_owned(),
            },
            github: GithubConfig {
                webhook_secret: None,
                blocked_logins: DEFAULT_BLOCKED_LOGINS.iter().map(|login| (*login).to_owned()).collect(),
            },
            server: ServerConfig {
                bind_address: "127.0.0.1".to_owned(),
                port: 3000,
                graceful_shutdown_secs: 15,
            },
            logging: LoggingConfig { level: "info".to_owned(), format: LogFormat::Compact },
        }
    }
}

impl FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        match resolve_config_path(options.config_path.as_deref()) {
            Some(path) => {
                tracing::debug!(
                    event_name = "system.config.file_loaded",
                    path = %path.display(),
                    "loading configuration file"
                );
                config.merge(read_patch(&path)?);
            }
            None if options.require_file => {
                let expected = options.config_path.unwrap_or_else(|| PathBuf::from("ghrelay.toml"));
                return Err(ConfigError::MissingConfigFile(expected));
            }
            None => {}
        }

        config.merge(ConfigPatch::from_env()?);
        config.merge(options.overrides.into());
        config.validate()?;

        Ok(config)
    }

    fn merge(&mut self, patch: ConfigPatch) {
        let ConfigPatch { database, slack, github, server, logging } = patch;

        let database = database.unwrap_or_default();
        replace(&mut self.database.url, database.url);
        replace(&mut self.database.max_connections, database.max_connections);
        replace(&mut self.database.timeout_secs, database.timeout_secs);

        let slack = slack.unwrap_or_default();
        replace(&mut self.slack.bot_token, slack.bot_token.map(SecretString::from));
        if let Some(signing_secret) = slack.signing_secret {
            self.slack.signing_secret = Some(signing_secret.into());
        }
        replace(&mut self.slack.api_base_url, slack.api_base_url);

        let github = github.unwrap_or_default();
        if let Some(webhook_secret) = github.webhook_secret {
            self.github.webhook_secret = Some(webhook_secret.into());
        }
        replace(&mut self.github.blocked_logins, github.blocked_logins);

        let server = server.unwrap_or_default();
        replace(&mut self.server.bind_address, server.bind_address);
        replace(&mut self.server.port, server.port);
        replace(&mut self.server.graceful_shutdown_secs, server.graceful_shutdown_secs);

        let logging = logging.unwrap_or_default();
        replace(&mut self.logging.level, logging.level);
        replace(&mut self.logging.format, logging.format);
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_database(&self.database)?;
        validate_slack(&self.slack)?;
        validate_github(&self.github)?;
        validate_server(&self.server)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn replace<T>(slot: &mut T, value: Option<T>) {
    if let Some(value) = value {
        *slot = value;
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("ghrelay.toml"), PathBuf::from("config/ghrelay.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

/// Expands `${VAR}` references; a missing variable is an error rather than an empty string.
fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(start) = rest.find("${") {
        output.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let end = after.find('}').ok_or(ConfigError::UnterminatedInterpolation)?;
        let var = &after[..end];
        let value = env::var(var)
            .map_err(|_| ConfigError::MissingEnvInterpolation { var: var.to_owned() })?;
        output.push_str(&value);
        rest = &after[end + 1..];
    }
    output.push_str(rest);

    Ok(output)
}

fn validate_database(database: &DatabaseConfig) -> Result<(), ConfigError> {
    let url = database.url.trim();
    let sqlite_url =
        url.starts_with("sqlite://") || url.starts_with("sqlite::") || url == ":memory:";
    if !sqlite_url {
        return Err(ConfigError::Validation(
            "database.url must be a sqlite URL (`sqlite://...`, `sqlite::...`, or `:memory:`)"
                .to_owned(),
        ));
    }
    if database.max_connections == 0 {
        return Err(ConfigError::Validation(
            "database.max_connections must be greater than zero".to_owned(),
        ));
    }
    if !(1..=300).contains(&database.timeout_secs) {
        return Err(ConfigError::Validation("database.timeout_secs must be in range 1..=300".to_owned()));
    }
    Ok(())
}

fn validate_slack(slack: &SlackConfig) -> Result<(), ConfigError> {
    let bot_token = slack.bot_token.expose_secret();
    if bot_token.is_empty() {
        return Err(ConfigError::Validation(
            "slack.bot_token is required. Get it from https://api.slack.com/apps > Your App > OAuth & Permissions > Bot User OAuth Token".to_owned()
        ));
    }
    if !bot_token.starts_with("xoxb-") {
        let hint = if bot_token.starts_with("xapp-") {
            " (hint: you may have used an app-level token instead of the bot token)"
        } else {
            ""
        };
        return Err(ConfigError::Validation(format!(
            "slack.bot_token must start with `xoxb-`{hint}. Get it from https://api.slack.com/apps"
        )));
    }
    if is_blank(slack.signing_secret.as_ref()) {
        return Err(ConfigError::Validation(
            "slack.signing_secret must not be blank when provided".to_owned(),
        ));
    }

    let base_url = slack.api_base_url.trim();
    if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
        return Err(ConfigError::Validation(
            "slack.api_base_url must start with http:// or https://".to_owned(),
        ));
    }
    Ok(())
}

fn validate_github(github: &GithubConfig) -> Result<(), ConfigError> {
    if is_blank(github.webhook_secret.as_ref()) {
        return Err(ConfigError::Validation(
            "github.webhook_secret must not be blank when provided".to_owned(),
        ));
    }
    if github.blocked_logins.iter().any(|login| login.trim().is_empty()) {
        return Err(ConfigError::Validation(
            "github.blocked_logins must not contain empty logins".to_owned(),
        ));
    }
    Ok(())
}

fn validate_server(server: &ServerConfig) -> Result<(), ConfigError> {
    if server.port == 0 {
        return Err(ConfigError::Validation("server.port must be greater than zero".to_owned()));
    }
    if server.graceful_shutdown_secs == 0 {
        return Err(ConfigError::Validation(
            "server.graceful_shutdown_secs must be greater than zero".to_owned(),
        ));
    }
    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    match logging.level.trim().to_ascii_lowercase().as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_owned(),
        )),
    }
}

fn is_blank(secret: Option<&SecretString>) -> bool {
    secret.is_some_and(|secret| secret.expose_secret().trim().is_empty())
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

/// First non-blank value among `keys`, in order.
fn read_env_any(keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| read_env(key))
}

fn parse_env<T: FromStr>(key: &str) -> Result<Option<T>, ConfigError> {
    read_env(key)
        .map(|value| {
            value
                .trim()
                .parse::<T>()
                .map_err(|_| ConfigError::InvalidEnvOverride { key: key.to_owned(), value })
        })
        .transpose()
}

fn parse_list(value: &str) -> Vec<String> {
    value.split(',').map(str::trim).filter(|item| !item.is_empty()).map(str::to_owned).collect()
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    database: Option<DatabasePatch>,
    slack: Option<SlackPatch>,
    github: Option<GithubPatch>,
    server: Option<ServerPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct DatabasePatch {
    url: Option<String>,
    max_connections: Option<u32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct SlackPatch {
    bot_token: Option<String>,
    signing_secret: Option<String>,
    api_base_url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct GithubPatch {
    webhook_secret: Option<String>,
    blocked_logins: Option<Vec<String>>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    port: Option<u16>,
    graceful_shutdown_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}

impl ConfigPatch {
    fn from_env() -> Result<Self, ConfigError> {
        let format = read_env_any(&["GHRELAY_LOGGING_FORMAT", "GHRELAY_LOG_FORMAT"])
            .map(|value| value.parse::<LogFormat>())
            .transpose()?;

        Ok(Self {
            database: Some(DatabasePatch {
                url: read_env("GHRELAY_DATABASE_URL"),
                max_connections: parse_env("GHRELAY_DATABASE_MAX_CONNECTIONS")?,
                timeout_secs: parse_env("GHRELAY_DATABASE_TIMEOUT_SECS")?,
            }),
            slack: Some(SlackPatch {
                bot_token: read_env("GHRELAY_SLACK_BOT_TOKEN"),
                signing_secret: read_env("GHRELAY_SLACK_SIGNING_SECRET"),
                api_base_url: read_env("GHRELAY_SLACK_API_BASE_URL"),
            }),
            github: Some(GithubPatch {
                webhook_secret: read_env("GHRELAY_GITHUB_WEBHOOK_SECRET"),
                blocked_logins: read_env("GHRELAY_GITHUB_BLOCKED_LOGINS").map(|value| parse_list(&value)),
            }),
            server: Some(ServerPatch {
                bind_address: read_env("GHRELAY_SERVER_BIND_ADDRESS"),
                port: parse_env("GHRELAY_SERVER_PORT")?,
                graceful_shutdown_secs: parse_env("GHRELAY_SERVER_GRACEFUL_SHUTDOWN_SECS")?,
            }),
            logging: Some(LoggingPatch {
                level: read_env_any(&["GHRELAY_LOGGING_LEVEL", "GHRELAY_LOG_LEVEL"]),
                format,
            }),
        })
    }
}

impl From<ConfigOverrides> for ConfigPatch {
    fn from(overrides: ConfigOverrides) -> Self {
        Self {
            database: Some(DatabasePatch { url: overrides.database_url, ..DatabasePatch::default() }),
            slack: Some(SlackPatch {
                bot_token: overrides.slack_bot_token,
                signing_secret: overrides.slack_signing_secret,
                api_base_url: overrides.slack_api_base_url,
            }),
            github: Some(GithubPatch {
                webhook_secret: overrides.github_webhook_secret,
                blocked_logins: overrides.github_blocked_logins,
            }),
            server: Some(ServerPatch { port: overrides.server_port, ..ServerPatch::default() }),
            logging: Some(LoggingPatch { level: overrides.log_level, format: None }),
        }
    }
}
