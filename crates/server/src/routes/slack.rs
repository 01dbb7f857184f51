use std::collections::HashMap;

use axum::{
    body::Bytes,
    extract::State,
    http::{header::CONTENT_TYPE, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use serde_json::json;
use tracing::{error, info, warn};

use ghrelay_core::errors::InterfaceError;
use ghrelay_slack::{
    commands::SlashCommandPayload,
    events::{
        parse_events_api, parse_interaction, EventContext, EventParseError, EventsApiRequest,
        HandlerResult, SlackEnvelope, SlackEvent,
    },
};

use super::{interface_error, new_correlation_id, AppState, RouteError};
use crate::signature;

const TIMESTAMP_HEADER: &str = "x-slack-request-timestamp";
const SIGNATURE_HEADER: &str = "x-slack-signature";
const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|value| value.to_str().ok())
}

/// Single Slack endpoint: Events API callbacks (JSON), slash commands and interactive
/// payloads (both form encoded).
pub async fn events(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, RouteError> {
    let ctx = EventContext { correlation_id: new_correlation_id() };

    if let Some(secret) = &state.slack_signing_secret {
        let verified = signature::verify_slack(
            secret,
            &body,
            header(&headers, TIMESTAMP_HEADER),
            header(&headers, SIGNATURE_HEADER),
            Utc::now().timestamp(),
        );
        if !verified {
            warn!(
                event_name = "ingress.slack.signature_rejected",
                correlation_id = %ctx.correlation_id,
                "slack request signature did not verify"
            );
            return Err(interface_error(InterfaceError::Unauthorized {
                message: "invalid X-Slack-Signature".to_owned(),
                correlation_id: ctx.correlation_id,
            }));
        }
    }

    let is_form = header(&headers, CONTENT_TYPE.as_str())
        .is_some_and(|value| value.starts_with(FORM_CONTENT_TYPE));
    let envelopes = if is_form {
        let fields: HashMap<String, String> = url::form_urlencoded::parse(&body).into_owned().collect();
        match fields.get("payload") {
            Some(payload) => parse_interaction(payload).map_err(|e| bad_request(&ctx, e))?,
            None => vec![slash_command_envelope(fields)],
        }
    } else {
        match parse_events_api(&body).map_err(|e| bad_request(&ctx, e))? {
            EventsApiRequest::UrlVerification { challenge } => {
                info!(
                    event_name = "ingress.slack.url_verification",
                    correlation_id = %ctx.correlation_id,
                    "responding to url verification challenge"
                );
                return Ok(Json(json!({ "challenge": challenge })).into_response());
            }
            EventsApiRequest::Callback(envelope) => vec![envelope],
        }
    };

    let mut reply = None;
    for envelope in &envelopes {
        match state.dispatcher.dispatch(envelope, &ctx).await {
            Ok(HandlerResult::Responded(message)) => reply = Some(message),
            Ok(HandlerResult::Processed | HandlerResult::Ignored) => {}
            Err(dispatch_error) => {
                error!(
                    event_name = "ingress.slack.dispatch_failed",
                    correlation_id = %ctx.correlation_id,
                    envelope_id = %envelope.envelope_id,
                    error = %dispatch_error,
                    "slack event handler failed"
                );
                return Err(interface_error(InterfaceError::Internal {
                    message: dispatch_error.to_string(),
                    correlation_id: ctx.correlation_id,
                }));
            }
        }
    }

    Ok(match reply {
        Some(message) => Json(message).into_response(),
        None => StatusCode::OK.into_response(),
    })
}

fn slash_command_envelope(mut fields: HashMap<String, String>) -> SlackEnvelope {
    let mut take = |key: &str| fields.remove(key).unwrap_or_default();
    let envelope_id = take("trigger_id");
    SlackEnvelope {
        envelope_id,
        event: SlackEvent::SlashCommand(SlashCommandPayload {
            command: take("command"),
            text: take("text"),
            channel_id: take("channel_id"),
            user_id: take("user_id"),
        }),
    }
}

fn bad_request(ctx: &EventContext, parse_error: EventParseError) -> RouteError {
    warn!(
        event_name = "ingress.slack.decode_failed",
        correlation_id = %ctx.correlation_id,
        error = %parse_error,
        "could not decode slack request"
    );
    interface_error(InterfaceError::BadRequest {
        message: parse_error.to_string(),
        correlation_id: ctx.correlation_id.clone(),
    })
}
