//! Turns GitHub webhook events into a threaded Slack narrative per pull request.
//!
//! Each pull request gets one top-level message per channel. Later lifecycle
//! events either rewrite that message, reply under it, or both. Independent
//! side effects are launched together and every failure is reported.

use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info, warn};

use ghrelay_core::domain::emoji::EmojiKey;
use ghrelay_core::domain::github::{
    GithubEvent, IssueCommentEvent, PullRequestEvent, ReviewSubmittedEvent, SynchronizeEvent,
};
use ghrelay_core::domain::pull_request::{CommentAction, PrThreadKey};
use ghrelay_core::format;
use ghrelay_db::repositories::RepositoryError;
use ghrelay_db::Stores;

use crate::emoji::EmojiCatalog;
use crate::messaging::{MessagingError, SlackMessenger};

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error(transparent)]
    Messaging(#[from] MessagingError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error("{} concurrent operations failed: {}", .0.len(), render_failures(.0))]
    Concurrent(Vec<NotifyError>),
}

fn render_failures(failures: &[NotifyError]) -> String {
    failures.iter().map(ToString::to_string).collect::<Vec<_>>().join("; ")
}

/// Folds the outcomes of sibling operations, keeping every failure.
fn settle<const N: usize>(results: [Result<(), NotifyError>; N]) -> Result<(), NotifyError> {
    let mut failures: Vec<NotifyError> = results.into_iter().filter_map(Result::err).collect();
    match failures.len() {
        0 => Ok(()),
        1 => Err(failures.remove(0)),
        _ => Err(NotifyError::Concurrent(failures)),
    }
}

/// Key under which the last commenter is tracked, if the action makes it unambiguous.
pub fn last_commenter_key(channel: &str, pr_url: &str, action: &str) -> Option<PrThreadKey> {
    match action {
        "edited" => None,
        _ => Some(PrThreadKey::new(channel, pr_url)),
    }
}

pub struct Notifier {
    messenger: Arc<dyn SlackMessenger>,
    stores: Stores,
    emoji: EmojiCatalog,
    blocked_logins: Vec<String>,
}

impl Notifier {
    pub fn new(messenger: Arc<dyn SlackMessenger>, stores: Stores, blocked_logins: Vec<String>) -> Self {
        let emoji = EmojiCatalog::new(stores.emoji.clone());
        Self { messenger, stores, emoji, blocked_logins }
    }

    pub fn is_blocked(&self, login: &str) -> bool {
        self.blocked_logins.iter().any(|blocked| blocked == login)
    }

    pub async fn handle(&self, channel: &str, event: &GithubEvent) -> Result<(), NotifyError> {
        if let Some(login) = event.sender_login() {
            if self.is_blocked(login) {
                debug!(
                    event_name = "github.notifier.sender_blocked",
                    channel,
                    sender = login,
                    kind = %event.kind(),
                    "dropping event from blocked sender"
                );
                return Ok(());
            }
        }

        match event {
            GithubEvent::PullRequestOpened(event) => self.pull_request_opened(channel, event).await,
            GithubEvent::PullRequestConvertedToDraft(event) => {
                self.converted_to_draft(channel, event).await
            }
            GithubEvent::PullRequestReadyForReview(event) => {
                self.ready_for_review(channel, event).await
            }
            GithubEvent::PullRequestClosed(event) => self.pull_request_closed(channel, event).await,
            GithubEvent::PullRequestSynchronized(event) => self.synchronized(channel, event).await,
            GithubEvent::ReviewSubmitted(event) => self.review_submitted(channel, event).await,
            GithubEvent::IssueCommentCreated(event) => self.issue_comment(channel, event).await,
            GithubEvent::ReviewCommentCreated(_) => {
                debug!(
                    event_name = "github.notifier.review_comment_skipped",
                    channel,
                    "review comments are not relayed"
                );
                Ok(())
            }
            GithubEvent::Ping(ping) => {
                debug!(
                    event_name = "github.notifier.ping",
                    channel,
                    zen = ping.zen.as_deref().unwrap_or(""),
                    "received ping"
                );
                Ok(())
            }
            GithubEvent::Unsupported(_) => {
                info!(
                    event_name = "github.notifier.unsupported_event",
                    channel,
                    kind = %event.kind(),
                    "ignoring unsupported github event"
                );
                Ok(())
            }
        }
    }

    async fn reply(&self, channel: &str, thread_ts: &str, text: &str) -> Result<(), NotifyError> {
        self.messenger.send_message(channel, text, Some(thread_ts)).await?;
        Ok(())
    }

    async fn rewrite(&self, channel: &str, thread_ts: &str, text: &str) -> Result<(), NotifyError> {
        self.messenger.update_message(channel, thread_ts, text).await?;
        Ok(())
    }

    async fn thread_for(&self, key: &PrThreadKey, kind: &str) -> Result<Option<String>, NotifyError> {
        let thread = self.stores.threads.find_thread(key).await?;
        if thread.is_none() {
            warn!(
                event_name = "github.notifier.thread_missing",
                channel = %key.channel,
                pr_url = %key.pr_url,
                kind,
                "no top-level message for pull request; ignoring event"
            );
        }
        Ok(thread)
    }

    async fn pull_request_opened(&self, channel: &str, event: &PullRequestEvent) -> Result<(), NotifyError> {
        let pull_request = &event.pull_request;
        let headline = if pull_request.draft {
            let emoji = self.emoji.emoji_for(EmojiKey::PrDraft).await?;
            format::draft_headline(&emoji, pull_request, &event.sender.login)
        } else {
            let emoji = self.emoji.emoji_for(EmojiKey::PrOpened).await?;
            format::open_headline(&emoji, pull_request, &event.sender.login)
        };

        let thread_ts = self.messenger.send_message(channel, &headline, None).await?;
        let key = PrThreadKey::new(channel, &pull_request.url);
        self.stores.threads.save_thread(&key, &thread_ts).await?;
        info!(
            event_name = "github.notifier.thread_created",
            channel,
            pr_url = %pull_request.url,
            thread_ts = %thread_ts,
            "announced pull request"
        );

        let description = format::description_reply(pull_request.body.as_deref());
        self.reply(channel, &thread_ts, &description).await
    }

    async fn converted_to_draft(&self, channel: &str, event: &PullRequestEvent) -> Result<(), NotifyError> {
        let key = PrThreadKey::new(channel, &event.pull_request.url);
        let Some(thread_ts) = self.thread_for(&key, "converted_to_draft").await? else {
            return Ok(());
        };

        let emoji = self.emoji.emoji_for(EmojiKey::PrDraft).await?;
        let headline = format::draft_headline(&emoji, &event.pull_request, &event.sender.login);
        let reply = format!("{emoji} PR has been converted to draft.");

        let (updated, replied) = tokio::join!(
            self.rewrite(channel, &thread_ts, &headline),
            self.reply(channel, &thread_ts, &reply),
        );
        settle([updated, replied])
    }

    async fn ready_for_review(&self, channel: &str, event: &PullRequestEvent) -> Result<(), NotifyError> {
        let key = PrThreadKey::new(channel, &event.pull_request.url);
        let Some(thread_ts) = self.thread_for(&key, "ready_for_review").await? else {
            return Ok(());
        };

        let emoji = self.emoji.emoji_for(EmojiKey::PrOpened).await?;
        let headline = format::open_headline(&emoji, &event.pull_request, &event.sender.login);
        let reply = format!("{emoji} PR is ready for review");

        let (updated, replied, cleared) = tokio::join!(
            self.rewrite(channel, &thread_ts, &headline),
            self.reply(channel, &thread_ts, &reply),
            async { self.stores.last_commenters.clear_last_commenter(&key).await.map_err(NotifyError::from) },
        );
        settle([updated, replied, cleared])
    }

    async fn pull_request_closed(&self, channel: &str, event: &PullRequestEvent) -> Result<(), NotifyError> {
        let key = PrThreadKey::new(channel, &event.pull_request.url);
        let Some(thread_ts) = self.thread_for(&key, "closed").await? else {
            return Ok(());
        };

        let (emoji_key, verb) = if event.pull_request.is_merged() {
            (EmojiKey::PrMerged, "merged")
        } else {
            (EmojiKey::PrClosed, "closed")
        };
        let emoji = self.emoji.emoji_for(emoji_key).await?;
        let headline = format::closed_headline(&emoji, &event.pull_request, &event.sender.login);
        let reply = format!("{emoji} PR was {verb} by {}.", event.sender.login);

        let (updated, replied) = tokio::join!(
            self.rewrite(channel, &thread_ts, &headline),
            self.reply(channel, &thread_ts, &reply),
        );
        settle([updated, replied])
    }

    async fn synchronized(&self, channel: &str, event: &SynchronizeEvent) -> Result<(), NotifyError> {
        if event.pull_request.draft {
            debug!(
                event_name = "github.notifier.draft_skipped",
                channel,
                pr_url = %event.pull_request.url,
                "not announcing pushes to a draft"
            );
            return Ok(());
        }

        let key = PrThreadKey::new(channel, &event.pull_request.url);
        let Some(thread_ts) = self.thread_for(&key, "synchronize").await? else {
            return Ok(());
        };

        let reply =
            format::synchronize_reply(&event.pull_request.html_url, &event.before, &event.after);
        self.reply(channel, &thread_ts, &reply).await
    }

    async fn review_submitted(&self, channel: &str, event: &ReviewSubmittedEvent) -> Result<(), NotifyError> {
        let Some(action) = event.review.comment_action() else {
            info!(
                event_name = "github.notifier.review_state_ignored",
                channel,
                pr_url = %event.pull_request.url,
                state = %event.review.state,
                "ignoring review state"
            );
            return Ok(());
        };

        self.comment_submitted(
            channel,
            &event.pull_request.url,
            event.pull_request.draft,
            &event.action,
            &event.sender.login,
            action,
        )
        .await
    }

    async fn issue_comment(&self, channel: &str, event: &IssueCommentEvent) -> Result<(), NotifyError> {
        let Some(pull_request) = &event.issue.pull_request else {
            debug!(
                event_name = "github.notifier.issue_comment_skipped",
                channel,
                "comment is not on a pull request"
            );
            return Ok(());
        };

        self.comment_submitted(
            channel,
            &pull_request.url,
            event.issue.draft.unwrap_or(false),
            &event.action,
            &event.sender.login,
            CommentAction::Comment,
        )
        .await
    }

    async fn comment_submitted(
        &self,
        channel: &str,
        pr_url: &str,
        draft: bool,
        event_action: &str,
        login: &str,
        action: CommentAction,
    ) -> Result<(), NotifyError> {
        if draft {
            debug!(
                event_name = "github.notifier.draft_skipped",
                channel,
                pr_url,
                "not announcing comments on a draft"
            );
            return Ok(());
        }

        let key = PrThreadKey::new(channel, pr_url);
        let Some(thread_ts) = self.thread_for(&key, "comment").await? else {
            return Ok(());
        };

        let commenter_key = last_commenter_key(channel, pr_url, event_action);
        if commenter_key.is_none() {
            warn!(
                event_name = "github.notifier.commenter_key_ambiguous",
                channel,
                pr_url,
                action = event_action,
                "cannot derive last-commenter key"
            );
        }

        let text = match action {
            CommentAction::Approve => {
                let emoji = self.emoji.emoji_for(EmojiKey::CommentApproved).await?;
                format!("{emoji} {login} approved the PR (possibly with comments).")
            }
            CommentAction::RequestChanges => {
                let emoji = self.emoji.emoji_for(EmojiKey::CommentChangesRequested).await?;
                format!("{emoji} {login} requested changes.")
            }
            CommentAction::Comment => {
                let Some(commenter_key) = &commenter_key else {
                    return Ok(());
                };
                let previous = self.stores.last_commenters.find_last_commenter(commenter_key).await?;
                if previous.as_deref() == Some(login) {
                    debug!(
                        event_name = "github.notifier.comment_deduplicated",
                        channel,
                        pr_url,
                        sender = login,
                        "same author commented again"
                    );
                    return Ok(());
                }
                let emoji = self.emoji.emoji_for(EmojiKey::CommentPosted).await?;
                format!("{emoji} {login} commented on the PR.")
            }
        };

        self.reply(channel, &thread_ts, &text).await?;

        match &commenter_key {
            Some(commenter_key) => {
                self.stores.last_commenters.save_last_commenter(commenter_key, login).await?;
            }
            None => warn!(
                event_name = "github.notifier.commenter_dedup_impaired",
                channel,
                pr_url,
                sender = login,
                "last commenter not recorded; repeat comments may be announced"
            ),
        }
        Ok(())
    }
}
