use std::sync::Arc;

use thiserror::Error;
use tokio::task::{JoinError, JoinSet};
use tracing::{error, info};

use ghrelay_core::domain::github::GithubEvent;
use ghrelay_db::repositories::{ChannelMembershipRepository, RepositoryError};

use crate::messaging::BotIdentityProvider;
use crate::notifier::{Notifier, NotifyError};

#[derive(Debug, Error)]
pub enum RelayError {
    #[error(transparent)]
    Membership(#[from] RepositoryError),
    #[error("{} channel(s) failed: {}", .0.len(), render_channel_failures(.0))]
    Channels(Vec<(String, NotifyError)>),
    #[error("channel task aborted: {0}")]
    Join(#[from] JoinError),
}

fn render_channel_failures(failures: &[(String, NotifyError)]) -> String {
    failures
        .iter()
        .map(|(channel, error)| format!("{channel}: {error}"))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Fans a GitHub event out to every channel the bot currently belongs to.
pub struct GithubRelay {
    notifier: Arc<Notifier>,
    identity: Arc<dyn BotIdentityProvider>,
    memberships: Arc<dyn ChannelMembershipRepository>,
}

impl GithubRelay {
    pub fn new(
        notifier: Arc<Notifier>,
        identity: Arc<dyn BotIdentityProvider>,
        memberships: Arc<dyn ChannelMembershipRepository>,
    ) -> Self {
        Self { notifier, identity, memberships }
    }

    /// Returns the number of channels the event was relayed to.
    pub async fn relay(&self, event: GithubEvent, correlation_id: &str) -> Result<usize, RelayError> {
        let Some(bot) = self.identity.current_bot().await else {
            error!(
                event_name = "github.relay.identity_unavailable",
                correlation_id,
                kind = %event.kind(),
                "bot identity unavailable; cannot look up channels"
            );
            return Ok(0);
        };

        let channels = self.memberships.list_channels(&bot.bot_id).await?;
        info!(
            event_name = "github.relay.fan_out",
            correlation_id,
            bot_id = %bot.bot_id,
            kind = %event.kind(),
            channel_count = channels.len(),
            "relaying github event"
        );

        let event = Arc::new(event);
        let mut tasks = JoinSet::new();
        for channel in channels.iter().cloned() {
            let notifier = Arc::clone(&self.notifier);
            let event = Arc::clone(&event);
            tasks.spawn(async move {
                let outcome = notifier.handle(&channel, &event).await;
                (channel, outcome)
            });
        }

        let mut failures = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            let (channel, outcome) = joined?;
            if let Err(notify_error) = outcome {
                error!(
                    event_name = "github.relay.channel_failed",
                    correlation_id,
                    channel = %channel,
                    error = %notify_error,
                    "failed to relay github event to channel"
                );
                failures.push((channel, notify_error));
            }
        }

        if failures.is_empty() {
            Ok(channels.len())
        } else {
            Err(RelayError::Channels(failures))
        }
    }
}
