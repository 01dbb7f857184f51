use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
};
use tracing::{error, info, warn};

use ghrelay_core::{
    domain::github::GithubEvent,
    errors::{ApplicationError, DomainError, InterfaceError},
};

use super::{interface_error, new_correlation_id, AppState, RouteError};
use crate::signature;

const EVENT_HEADER: &str = "x-github-event";
const DELIVERY_HEADER: &str = "x-github-delivery";
const SIGNATURE_HEADER: &str = "x-hub-signature-256";

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|value| value.to_str().ok())
}

/// Receives one GitHub webhook delivery and relays it to every channel the bot is in.
///
/// A non-2xx answer makes GitHub keep the delivery for redelivery.
pub async fn webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<(StatusCode, &'static str), RouteError> {
    let correlation_id =
        header(&headers, DELIVERY_HEADER).map(str::to_owned).unwrap_or_else(new_correlation_id);

    if let Some(secret) = &state.github_webhook_secret {
        if !signature::verify_github(secret, &body, header(&headers, SIGNATURE_HEADER)) {
            warn!(
                event_name = "ingress.github.signature_rejected",
                correlation_id = %correlation_id,
                "webhook signature did not verify"
            );
            return Err(interface_error(InterfaceError::Unauthorized {
                message: "invalid X-Hub-Signature-256".to_owned(),
                correlation_id,
            }));
        }
    }

    let event_name = header(&headers, EVENT_HEADER);
    let event = GithubEvent::from_webhook(event_name, &body).map_err(|decode| {
        warn!(
            event_name = "ingress.github.decode_failed",
            correlation_id = %correlation_id,
            github_event = event_name.unwrap_or("unknown"),
            error = %decode,
            "could not decode webhook payload"
        );
        interface_error(
            ApplicationError::from(DomainError::from(decode)).into_interface(correlation_id.clone()),
        )
    })?;

    if let GithubEvent::Ping(ping) = &event {
        info!(
            event_name = "ingress.github.ping",
            correlation_id = %correlation_id,
            zen = ping.zen.as_deref().unwrap_or_default(),
            "webhook ping received"
        );
        return Ok((StatusCode::OK, "pong"));
    }

    let kind = event.kind();
    match state.relay.relay(event, &correlation_id).await {
        Ok(channels) => {
            info!(
                event_name = "ingress.github.relayed",
                correlation_id = %correlation_id,
                kind = %kind,
                channels,
                "webhook relayed"
            );
            Ok((StatusCode::OK, "ok"))
        }
        Err(relay_error) => {
            error!(
                event_name = "ingress.github.relay_failed",
                correlation_id = %correlation_id,
                kind = %kind,
                error = %relay_error,
                "webhook relay failed"
            );
            Err(interface_error(InterfaceError::Internal {
                message: relay_error.to_string(),
                correlation_id,
            }))
        }
    }
}
