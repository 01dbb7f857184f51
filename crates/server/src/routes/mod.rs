pub mod github;
pub mod slack;

use std::sync::Arc;

use axum::{http::StatusCode, routing::post, Json, Router};
use secrecy::SecretString;
use serde::Serialize;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use ghrelay_core::errors::InterfaceError;
use ghrelay_db::{DbPool, Stores};
use ghrelay_slack::{
    commands::EmojiCommandService,
    emoji::EmojiCatalog,
    events::{relay_dispatcher, EventDispatcher},
    membership::ChannelMembershipService,
    messaging::{BotIdentityProvider, InteractionResponder, SlackMessenger},
    notifier::Notifier,
    relay::GithubRelay,
};

use crate::health;

/// The three Slack-facing ports the HTTP routes drive.
#[derive(Clone)]
pub struct SlackPorts {
    pub messenger: Arc<dyn SlackMessenger>,
    pub identity: Arc<dyn BotIdentityProvider>,
    pub responder: Arc<dyn InteractionResponder>,
}

#[derive(Clone)]
pub struct AppState {
    pub relay: Arc<GithubRelay>,
    pub dispatcher: Arc<EventDispatcher>,
    pub github_webhook_secret: Option<SecretString>,
    pub slack_signing_secret: Option<SecretString>,
}

impl AppState {
    pub fn assemble(stores: Stores, ports: SlackPorts, blocked_logins: Vec<String>) -> Self {
        let notifier = Arc::new(Notifier::new(ports.messenger, stores.clone(), blocked_logins));
        let relay = GithubRelay::new(notifier, ports.identity.clone(), stores.memberships.clone());
        let membership = ChannelMembershipService::new(
            ports.identity,
            stores.memberships.clone(),
            stores.channel_events.clone(),
        );
        let commands = EmojiCommandService::new(EmojiCatalog::new(stores.emoji));
        let dispatcher = relay_dispatcher(commands, ports.responder, Arc::new(membership));

        Self {
            relay: Arc::new(relay),
            dispatcher: Arc::new(dispatcher),
            github_webhook_secret: None,
            slack_signing_secret: None,
        }
    }

    pub fn with_github_webhook_secret(mut self, secret: Option<SecretString>) -> Self {
        self.github_webhook_secret = secret;
        self
    }

    pub fn with_slack_signing_secret(mut self, secret: Option<SecretString>) -> Self {
        self.slack_signing_secret = secret;
        self
    }
}

pub fn router(state: AppState, db_pool: DbPool) -> Router {
    Router::new()
        .route("/github", post(github::webhook))
        .route("/slack", post(slack::events))
        .with_state(state)
        .merge(health::router(db_pool))
        .layer(TraceLayer::new_for_http())
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ErrorBody {
    pub error: &'static str,
    pub correlation_id: String,
}

pub type RouteError = (StatusCode, Json<ErrorBody>);

pub fn interface_error(error: InterfaceError) -> RouteError {
    let status = match &error {
        InterfaceError::BadRequest { .. } => StatusCode::BAD_REQUEST,
        InterfaceError::Unauthorized { .. } => StatusCode::UNAUTHORIZED,
        InterfaceError::ServiceUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
        InterfaceError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (
        status,
        Json(ErrorBody {
            error: error.user_message(),
            correlation_id: error.correlation_id().to_owned(),
        }),
    )
}

pub fn new_correlation_id() -> String {
    Uuid::new_v4().to_string()
}
