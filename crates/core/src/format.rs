//! Slack mrkdwn renderings of pull-request activity.

use crate::domain::github::PullRequest;

/// Commit hashes are never shortened below this many characters.
pub const MIN_COMMIT_PREFIX: usize = 7;

/// Prefixes every line, blank ones included, with `> `.
pub fn blockquote(text: &str) -> String {
    text.split('\n').map(|line| format!("> {line}")).collect::<Vec<_>>().join("\n")
}

/// Shortest prefixes (at least [`MIN_COMMIT_PREFIX`] long) that tell two hashes apart.
///
/// If either input is already at or below the minimum, both come back whole.
pub fn shortest_unique_prefixes<'a>(left: &'a str, right: &'a str) -> (&'a str, &'a str) {
    let left_len = left.chars().count();
    let right_len = right.chars().count();
    if left_len <= MIN_COMMIT_PREFIX || right_len <= MIN_COMMIT_PREFIX {
        return (left, right);
    }

    let limit = left_len.min(right_len);
    let mut length = MIN_COMMIT_PREFIX;
    while length < limit && char_prefix(left, length) == char_prefix(right, length) {
        length += 1;
    }
    (char_prefix(left, length), char_prefix(right, length))
}

fn char_prefix(value: &str, chars: usize) -> &str {
    match value.char_indices().nth(chars) {
        Some((offset, _)) => &value[..offset],
        None => value,
    }
}

fn link_and_size(pull_request: &PullRequest) -> String {
    format!(
        "<{}|#{}: {}> (+{}/-{})",
        pull_request.html_url,
        pull_request.number,
        pull_request.title,
        pull_request.additions,
        pull_request.deletions
    )
}

pub fn open_headline(emoji: &str, pull_request: &PullRequest, login: &str) -> String {
    format!("{emoji} PR {} by {login}", link_and_size(pull_request))
}

pub fn draft_headline(emoji: &str, pull_request: &PullRequest, login: &str) -> String {
    format!("{emoji} DRAFT PR {} by {login}", link_and_size(pull_request))
}

pub fn closed_headline(emoji: &str, pull_request: &PullRequest, login: &str) -> String {
    format!("{emoji} ~PR {} by {login}~", link_and_size(pull_request))
}

pub fn description_reply(body: Option<&str>) -> String {
    match body {
        None => "No description provided".to_owned(),
        Some(body) => format!("PR description:\n{}", blockquote(body)),
    }
}

pub fn synchronize_reply(html_url: &str, before: &str, after: &str) -> String {
    let (short_before, short_after) = shortest_unique_prefixes(before, after);
    format!("PR updated: <{html_url}/files/{before}..{after}|{short_before}..{short_after}>")
}
