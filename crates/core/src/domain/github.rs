//! GitHub webhook payloads, decoded into a closed set of events.
//!
//! Only the fields the notifier acts on are modelled. Everything outside the
//! pull-request, review, comment, and ping families decodes to
//! [`GithubEvent::Unsupported`] so callers can log and move on.

use serde::Deserialize;
use thiserror::Error;

use crate::domain::pull_request::CommentAction;

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct User {
    pub login: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct PullRequest {
    /// API URL; the identity of the pull request.
    pub url: String,
    #[serde(default)]
    pub html_url: String,
    #[serde(default)]
    pub number: u64,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub additions: u64,
    #[serde(default)]
    pub deletions: u64,
    #[serde(default)]
    pub draft: bool,
    #[serde(default)]
    pub merged: Option<bool>,
}

impl PullRequest {
    pub fn is_merged(&self) -> bool {
        self.merged.unwrap_or(false)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct PullRequestLink {
    pub url: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct Issue {
    #[serde(default)]
    pub pull_request: Option<PullRequestLink>,
    #[serde(default)]
    pub draft: Option<bool>,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct Review {
    pub state: String,
}

impl Review {
    pub fn comment_action(&self) -> Option<CommentAction> {
        match self.state.to_ascii_lowercase().as_str() {
            "approved" => Some(CommentAction::Approve),
            "commented" => Some(CommentAction::Comment),
            "changes_requested" => Some(CommentAction::RequestChanges),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PullRequestEvent {
    pub action: String,
    pub pull_request: PullRequest,
    pub sender: User,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SynchronizeEvent {
    pub pull_request: PullRequest,
    pub sender: User,
    pub before: String,
    pub after: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReviewSubmittedEvent {
    pub action: String,
    pub pull_request: PullRequest,
    pub review: Review,
    pub sender: User,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IssueCommentEvent {
    pub action: String,
    pub issue: Issue,
    pub sender: User,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReviewCommentEvent {
    pub action: String,
    pub pull_request: PullRequest,
    pub sender: User,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PingEvent {
    pub zen: Option<String>,
    pub sender: Option<User>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UnsupportedEvent {
    pub event_name: String,
    pub action: Option<String>,
    pub sender: Option<User>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GithubEvent {
    PullRequestOpened(PullRequestEvent),
    PullRequestConvertedToDraft(PullRequestEvent),
    PullRequestReadyForReview(PullRequestEvent),
    PullRequestClosed(PullRequestEvent),
    PullRequestSynchronized(SynchronizeEvent),
    ReviewSubmitted(ReviewSubmittedEvent),
    IssueCommentCreated(IssueCommentEvent),
    ReviewCommentCreated(ReviewCommentEvent),
    Ping(PingEvent),
    Unsupported(UnsupportedEvent),
}

#[derive(Debug, Error)]
pub enum EventDecodeError {
    #[error("payload is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("`{event}` payload is missing `{field}`")]
    MissingField { event: &'static str, field: &'static str },
}

impl GithubEvent {
    /// Decodes a webhook body. `event_name` is the `X-GitHub-Event` header;
    /// without it the family is inferred from the payload shape.
    pub fn from_webhook(event_name: Option<&str>, body: &[u8]) -> Result<Self, EventDecodeError> {
        let payload: WebhookPayload = serde_json::from_slice(body)?;
        let event_name = event_name
            .map(|name| name.trim().to_ascii_lowercase())
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| payload.infer_event_name().to_owned());
        payload.classify(event_name)
    }

    pub fn sender_login(&self) -> Option<&str> {
        match self {
            Self::PullRequestOpened(event)
            | Self::PullRequestConvertedToDraft(event)
            | Self::PullRequestReadyForReview(event)
            | Self::PullRequestClosed(event) => Some(&event.sender.login),
            Self::PullRequestSynchronized(event) => Some(&event.sender.login),
            Self::ReviewSubmitted(event) => Some(&event.sender.login),
            Self::IssueCommentCreated(event) => Some(&event.sender.login),
            Self::ReviewCommentCreated(event) => Some(&event.sender.login),
            Self::Ping(event) => event.sender.as_ref().map(|user| user.login.as_str()),
            Self::Unsupported(event) => event.sender.as_ref().map(|user| user.login.as_str()),
        }
    }

    /// Stable `family.action` label used in logs.
    pub fn kind(&self) -> String {
        match self {
            Self::PullRequestOpened(_) => "pull_request.opened".to_owned(),
            Self::PullRequestConvertedToDraft(_) => "pull_request.converted_to_draft".to_owned(),
            Self::PullRequestReadyForReview(_) => "pull_request.ready_for_review".to_owned(),
            Self::PullRequestClosed(_) => "pull_request.closed".to_owned(),
            Self::PullRequestSynchronized(_) => "pull_request.synchronize".to_owned(),
            Self::ReviewSubmitted(_) => "pull_request_review.submitted".to_owned(),
            Self::IssueCommentCreated(_) => "issue_comment.created".to_owned(),
            Self::ReviewCommentCreated(_) => "pull_request_review_comment.created".to_owned(),
            Self::Ping(_) => "ping".to_owned(),
            Self::Unsupported(event) => match &event.action {
                Some(action) => format!("{}.{action}", event.event_name),
                None => event.event_name.clone(),
            },
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct WebhookPayload {
    action: Option<String>,
    pull_request: Option<PullRequest>,
    review: Option<Review>,
    issue: Option<Issue>,
    comment: Option<serde_json::Value>,
    sender: Option<User>,
    before: Option<String>,
    after: Option<String>,
    zen: Option<String>,
    hook_id: Option<u64>,
}

impl WebhookPayload {
    fn infer_event_name(&self) -> &'static str {
        if self.zen.is_some() || self.hook_id.is_some() {
            "ping"
        } else if self.review.is_some() {
            "pull_request_review"
        } else if self.comment.is_some() && self.issue.is_some() {
            "issue_comment"
        } else if self.comment.is_some() {
            "pull_request_review_comment"
        } else if self.pull_request.is_some() {
            "pull_request"
        } else {
            "unknown"
        }
    }

    fn classify(self, event_name: String) -> Result<GithubEvent, EventDecodeError> {
        match (event_name.as_str(), self.action.as_deref()) {
            ("ping", _) => Ok(GithubEvent::Ping(PingEvent { zen: self.zen, sender: self.sender })),
            ("pull_request", Some("synchronize")) => {
                Ok(GithubEvent::PullRequestSynchronized(SynchronizeEvent {
                    pull_request: require(self.pull_request, "pull_request", "pull_request")?,
                    sender: require(self.sender, "pull_request", "sender")?,
                    before: require(self.before, "pull_request", "before")?,
                    after: require(self.after, "pull_request", "after")?,
                }))
            }
            (
                "pull_request",
                Some(action @ ("opened" | "converted_to_draft" | "ready_for_review" | "closed")),
            ) => {
                let event = PullRequestEvent {
                    action: action.to_owned(),
                    pull_request: require(self.pull_request, "pull_request", "pull_request")?,
                    sender: require(self.sender, "pull_request", "sender")?,
                };
                Ok(match action {
                    "opened" => GithubEvent::PullRequestOpened(event),
                    "converted_to_draft" => GithubEvent::PullRequestConvertedToDraft(event),
                    "ready_for_review" => GithubEvent::PullRequestReadyForReview(event),
                    _ => GithubEvent::PullRequestClosed(event),
                })
            }
            ("pull_request_review", Some("submitted")) => {
                Ok(GithubEvent::ReviewSubmitted(ReviewSubmittedEvent {
                    action: "submitted".to_owned(),
                    pull_request: require(self.pull_request, "pull_request_review", "pull_request")?,
                    review: require(self.review, "pull_request_review", "review")?,
                    sender: require(self.sender, "pull_request_review", "sender")?,
                }))
            }
            ("issue_comment", Some("created")) => {
                Ok(GithubEvent::IssueCommentCreated(IssueCommentEvent {
                    action: "created".to_owned(),
                    issue: require(self.issue, "issue_comment", "issue")?,
                    sender: require(self.sender, "issue_comment", "sender")?,
                }))
            }
            ("pull_request_review_comment", Some("created")) => {
                Ok(GithubEvent::ReviewCommentCreated(ReviewCommentEvent {
                    action: "created".to_owned(),
                    pull_request: require(
                        self.pull_request,
                        "pull_request_review_comment",
                        "pull_request",
                    )?,
                    sender: require(self.sender, "pull_request_review_comment", "sender")?,
                }))
            }
            _ => Ok(GithubEvent::Unsupported(UnsupportedEvent {
                event_name,
                action: self.action,
                sender: self.sender,
            })),
        }
    }
}

fn require<T>(value: Option<T>, event: &'static str, field: &'static str) -> Result<T, EventDecodeError> {
    value.ok_or(EventDecodeError::MissingField { event, field })
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{EventDecodeError, GithubEvent};
    use crate::domain::pull_request::CommentAction;

    fn decode(event_name: Option<&str>, body: serde_json::Value) -> GithubEvent {
        GithubEvent::from_webhook(event_name, body.to_string().as_bytes()).expect("decode event")
    }

    fn pull_request() -> serde_json::Value {
        json!({
            "url": "https://api.github.com/repos/acme/widgets/pulls/123",
            "html_url": "https://github.com/acme/widgets/pull/123",
            "number": 123,
            "title": "Make widgets faster",
            "body": null,
            "additions": 111,
            "deletions": 222,
            "draft": false,
            "merged": null
        })
    }

    #[test]
    fn decodes_opened_pull_request_with_header() {
        let event = decode(
            Some("pull_request"),
            json!({ "action": "opened", "pull_request": pull_request(), "sender": { "login": "eagle" } }),
        );

        let GithubEvent::PullRequestOpened(event) = event else {
            panic!("expected opened event, got {event:?}");
        };
        assert_eq!(event.pull_request.number, 123);
        assert_eq!(event.pull_request.body, None);
        assert!(!event.pull_request.is_merged());
        assert_eq!(event.sender.login, "eagle");
    }

    #[test]
    fn decodes_synchronize_with_commit_hashes() {
        let event = decode(
            Some("pull_request"),
            json!({
                "action": "synchronize",
                "pull_request": pull_request(),
                "sender": { "login": "eagle" },
                "before": "abcdef1234567890",
                "after": "1234567890abcdef"
            }),
        );

        assert!(matches!(
            event,
            GithubEvent::PullRequestSynchronized(ref sync)
                if sync.before == "abcdef1234567890" && sync.after == "1234567890abcdef"
        ));
    }

    #[test]
    fn infers_issue_comment_from_shape_without_header() {
        let event = decode(
            None,
            json!({
                "action": "created",
                "issue": {
                    "pull_request": { "url": "https://api.github.com/repos/acme/widgets/pulls/123" },
                    "draft": true
                },
                "comment": { "body": "looks good" },
                "sender": { "login": "eagle" }
            }),
        );

        let GithubEvent::IssueCommentCreated(event) = event else {
            panic!("expected issue comment, got {event:?}");
        };
        assert_eq!(event.issue.draft, Some(true));
        assert_eq!(
            event.issue.pull_request.map(|link| link.url).as_deref(),
            Some("https://api.github.com/repos/acme/widgets/pulls/123")
        );
    }

    #[test]
    fn infers_review_comment_and_ping_from_shape() {
        let review_comment = decode(
            None,
            json!({
                "action": "created",
                "comment": { "body": "nit" },
                "pull_request": pull_request(),
                "sender": { "login": "eagle" }
            }),
        );
        assert!(matches!(review_comment, GithubEvent::ReviewCommentCreated(_)));

        let ping = decode(None, json!({ "zen": "Keep it logically awesome.", "hook_id": 1 }));
        assert!(matches!(ping, GithubEvent::Ping(_)));
        assert_eq!(ping.sender_login(), None);
    }

    #[test]
    fn review_states_map_to_comment_actions() {
        let event = decode(
            Some("pull_request_review"),
            json!({
                "action": "submitted",
                "review": { "state": "CHANGES_REQUESTED" },
                "pull_request": pull_request(),
                "sender": { "login": "eagle" }
            }),
        );

        let GithubEvent::ReviewSubmitted(event) = event else {
            panic!("expected review event, got {event:?}");
        };
        assert_eq!(event.review.comment_action(), Some(CommentAction::RequestChanges));
        assert_eq!(
            super::Review { state: "dismissed".to_owned() }.comment_action(),
            None,
            "dismissed reviews carry no comment action"
        );
    }

    #[test]
    fn unknown_actions_decode_as_unsupported() {
        let event = decode(
            Some("pull_request"),
            json!({ "action": "auto_merge_enabled", "pull_request": pull_request(), "sender": { "login": "eagle" } }),
        );

        assert_eq!(event.kind(), "pull_request.auto_merge_enabled");
        assert_eq!(event.sender_login(), Some("eagle"));
        assert!(matches!(event, GithubEvent::Unsupported(_)));
    }

    #[test]
    fn missing_required_field_is_reported() {
        let error = GithubEvent::from_webhook(
            Some("pull_request"),
            json!({ "action": "closed", "sender": { "login": "eagle" } }).to_string().as_bytes(),
        )
        .expect_err("closed without pull_request must fail");

        assert!(matches!(
            error,
            EventDecodeError::MissingField { event: "pull_request", field: "pull_request" }
        ));
    }

    #[test]
    fn malformed_json_is_rejected() {
        let error = GithubEvent::from_webhook(Some("pull_request"), b"{not json")
            .expect_err("invalid json must fail");
        assert!(matches!(error, EventDecodeError::Json(_)));
    }
}
