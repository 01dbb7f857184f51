pub mod config;
pub mod domain;
pub mod errors;
pub mod format;

pub use config::{AppConfig, ConfigError, ConfigOverrides, LoadOptions, LogFormat};
pub use domain::emoji::{EmojiKey, FALLBACK_EMOJI};
pub use domain::github::{EventDecodeError, GithubEvent, PullRequest, User};
pub use domain::pull_request::{CommentAction, PrThreadKey};
pub use errors::{ApplicationError, DomainError, InterfaceError};
