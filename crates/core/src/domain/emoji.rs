use std::fmt;
use std::str::FromStr;

use crate::errors::DomainError;

/// Token used when neither an override nor a default resolves.
pub const FALLBACK_EMOJI: &str = ":robot_face:";

/// GitHub activity that can be decorated with a configurable emoji.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EmojiKey {
    PrOpened,
    PrMerged,
    PrClosed,
    PrDraft,
    CommentApproved,
    CommentChangesRequested,
    CommentPosted,
}

impl EmojiKey {
    /// Display order for the describe listing and the configure prompt.
    pub const ALL: [EmojiKey; 7] = [
        Self::PrOpened,
        Self::PrMerged,
        Self::PrClosed,
        Self::PrDraft,
        Self::CommentApproved,
        Self::CommentChangesRequested,
        Self::CommentPosted,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::PrOpened => "pr_opened",
            Self::PrMerged => "pr_merged",
            Self::PrClosed => "pr_closed",
            Self::PrDraft => "pr_draft",
            Self::CommentApproved => "comment_approved",
            Self::CommentChangesRequested => "comment_changes_requested",
            Self::CommentPosted => "comment_posted",
        }
    }

    pub fn default_emoji(self) -> &'static str {
        match self {
            Self::PrOpened => ":eight_pointed_black_star:",
            Self::PrMerged => ":rocket:",
            Self::PrClosed => ":x:",
            Self::PrDraft => ":see_no_evil:",
            Self::CommentApproved => ":white_check_mark:",
            Self::CommentChangesRequested => ":exclamation:",
            Self::CommentPosted => ":speech_balloon:",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Self::PrOpened => "Pull request opened",
            Self::PrMerged => "Pull request merged",
            Self::PrClosed => "Pull request closed without merging",
            Self::PrDraft => "Pull request converted to draft",
            Self::CommentApproved => "Pull request approved",
            Self::CommentChangesRequested => "Pull request had changes requested",
            Self::CommentPosted => "Pull request had comments",
        }
    }
}

impl fmt::Display for EmojiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EmojiKey {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|key| key.as_str() == value.trim())
            .ok_or_else(|| DomainError::UnknownEmojiKey(value.to_owned()))
    }
}
