pub mod emoji;
pub mod github;
pub mod pull_request;
