use std::fmt;

/// Identity of one pull request's thread inside one channel.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct PrThreadKey {
    pub channel: String,
    pub pr_url: String,
}

impl PrThreadKey {
    pub fn new(channel: impl Into<String>, pr_url: impl Into<String>) -> Self {
        Self { channel: channel.into(), pr_url: pr_url.into() }
    }
}

impl fmt::Display for PrThreadKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}|{}", self.channel, self.pr_url)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CommentAction {
    Approve,
    Comment,
    RequestChanges,
}

impl CommentAction {
    /// Approvals and change requests are always relayed, even from a repeat author.
    pub fn is_deduplicated(self) -> bool {
        matches!(self, Self::Comment)
    }
}
