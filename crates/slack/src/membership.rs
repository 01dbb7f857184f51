use std::sync::Arc;

use tracing::{error, info, warn};

use ghrelay_db::repositories::{
    ChannelEventRepository, ChannelMembershipRepository, RepositoryError,
};

use crate::messaging::BotIdentityProvider;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MembershipChange {
    /// `member_joined_channel`; only relevant when `user_id` is the bot itself.
    Joined { channel_id: String, user_id: String, event_ts: String },
    /// `channel_left` or `group_left`.
    Left { channel_id: String, event_ts: String },
}

impl MembershipChange {
    pub fn channel_id(&self) -> &str {
        match self {
            Self::Joined { channel_id, .. } | Self::Left { channel_id, .. } => channel_id,
        }
    }

    pub fn event_ts(&self) -> &str {
        match self {
            Self::Joined { event_ts, .. } | Self::Left { event_ts, .. } => event_ts,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MembershipOutcome {
    Added,
    AlreadyMember,
    Removed,
    NotMember,
    AlreadyHandled,
    OtherUser,
    IdentityUnavailable,
}

/// Tracks which channels the bot belongs to from Slack membership events.
pub struct ChannelMembershipService {
    identity: Arc<dyn BotIdentityProvider>,
    memberships: Arc<dyn ChannelMembershipRepository>,
    channel_events: Arc<dyn ChannelEventRepository>,
}

impl ChannelMembershipService {
    pub fn new(
        identity: Arc<dyn BotIdentityProvider>,
        memberships: Arc<dyn ChannelMembershipRepository>,
        channel_events: Arc<dyn ChannelEventRepository>,
    ) -> Self {
        Self { identity, memberships, channel_events }
    }

    pub async fn apply(
        &self,
        change: &MembershipChange,
        correlation_id: &str,
    ) -> Result<MembershipOutcome, RepositoryError> {
        let channel = change.channel_id();
        if self.already_handled(channel, change.event_ts(), correlation_id).await? {
            return Ok(MembershipOutcome::AlreadyHandled);
        }

        let Some(bot) = self.identity.current_bot().await else {
            error!(
                event_name = "slack.membership.identity_unavailable",
                correlation_id,
                channel,
                "bot identity unavailable; ignoring membership event"
            );
            return Ok(MembershipOutcome::IdentityUnavailable);
        };

        match change {
            MembershipChange::Joined { user_id, .. } => {
                if bot.user_id.as_deref() != Some(user_id.as_str()) {
                    return Ok(MembershipOutcome::OtherUser);
                }
                if self.memberships.add_channel(&bot.bot_id, channel).await? {
                    info!(
                        event_name = "slack.membership.joined",
                        correlation_id,
                        bot_id = %bot.bot_id,
                        channel,
                        "bot joined channel"
                    );
                    Ok(MembershipOutcome::Added)
                } else {
                    info!(
                        event_name = "slack.membership.already_member",
                        correlation_id,
                        bot_id = %bot.bot_id,
                        channel,
                        "bot already recorded as member"
                    );
                    Ok(MembershipOutcome::AlreadyMember)
                }
            }
            MembershipChange::Left { .. } => {
                if self.memberships.remove_channel(&bot.bot_id, channel).await? {
                    info!(
                        event_name = "slack.membership.left",
                        correlation_id,
                        bot_id = %bot.bot_id,
                        channel,
                        "bot left channel"
                    );
                    Ok(MembershipOutcome::Removed)
                } else {
                    Ok(MembershipOutcome::NotMember)
                }
            }
        }
    }

    async fn already_handled(
        &self,
        channel: &str,
        event_ts: &str,
        correlation_id: &str,
    ) -> Result<bool, RepositoryError> {
        let Some(event_time) = parse_event_ts(event_ts) else {
            warn!(
                event_name = "slack.membership.unparseable_ts",
                correlation_id,
                channel,
                event_ts,
                "could not parse event time; assuming it was already handled"
            );
            return Ok(true);
        };

        let fresh = self.channel_events.record_if_newer(channel, event_time).await?;
        if !fresh {
            info!(
                event_name = "slack.membership.duplicate",
                correlation_id,
                channel,
                event_ts,
                "membership event already handled"
            );
        }
        Ok(!fresh)
    }
}

fn parse_event_ts(event_ts: &str) -> Option<f64> {
    event_ts.trim().parse::<f64>().ok().filter(|value| value.is_finite())
}
