//! Events API ingress — POST /slack/events.
//!
//! Check order is load-bearing:
//! 1. Redelivery guard. Slack redelivers any event not acknowledged within
//!    its deadline; a slow completion therefore looks like a failure to
//!    Slack. Answering redeliveries 200 up front, before any other work,
//!    is what keeps the bot from replying twice to the same mention.
//! 2. Signature verification over the raw body.
//! 3. Envelope decode and dispatch. Mentions are processed in a spawned
//!    task so the acknowledgment goes out immediately.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::{debug, info, warn};

use confab_slack::event::{CallbackEvent, EventEnvelope};
use confab_slack::signature;

use crate::app::AppState;

/// Redelivery counter header; absent on first delivery.
pub const RETRY_NUM_HEADER: &str = "x-slack-retry-num";
pub const TIMESTAMP_HEADER: &str = "x-slack-request-timestamp";
pub const SIGNATURE_HEADER: &str = "x-slack-signature";

pub async fn events_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if is_retry_delivery(&headers) {
        info!("redelivered event acknowledged without processing");
        return (StatusCode::OK, "Retry request ignored").into_response();
    }

    let timestamp = header_str(&headers, TIMESTAMP_HEADER);
    let sig = header_str(&headers, SIGNATURE_HEADER);
    let (Some(timestamp), Some(sig)) = (timestamp, sig) else {
        warn!("request missing signature headers");
        return unauthorized();
    };

    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0);
    if let Err(e) = signature::verify(
        &state.config.slack.signing_secret,
        timestamp,
        &body,
        sig,
        now,
    ) {
        warn!(reason = %e, "request signature rejected");
        return unauthorized();
    }

    let envelope: EventEnvelope = match serde_json::from_slice(&body) {
        Ok(envelope) => envelope,
        Err(e) => {
            warn!(error = %e, "invalid JSON in event body");
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({"error": "invalid JSON body"})),
            )
                .into_response();
        }
    };

    match envelope {
        EventEnvelope::UrlVerification { challenge } => {
            info!("answering url_verification handshake");
            Json(json!({"challenge": challenge})).into_response()
        }
        EventEnvelope::EventCallback { event } => {
            match event {
                CallbackEvent::AppMention(mention) => {
                    debug!(channel = %mention.channel, ts = %mention.event_ts, "app_mention accepted");
                    let state = Arc::clone(&state);
                    tokio::spawn(async move {
                        if let Err(e) = state.bridge.handle_mention(&mention).await {
                            warn!(error = %e, channel = %mention.channel, "mention pipeline failed");
                        }
                    });
                }
                CallbackEvent::Other => debug!("callback event type ignored"),
            }
            StatusCode::OK.into_response()
        }
        EventEnvelope::Other => {
            debug!("envelope type ignored");
            StatusCode::OK.into_response()
        }
    }
}

/// True when the platform marked this delivery as a retry.
fn is_retry_delivery(headers: &HeaderMap) -> bool {
    headers
        .get(RETRY_NUM_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u32>().ok())
        .map(|n| n > 0)
        .unwrap_or(false)
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

fn unauthorized() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({"error": "signature verification failed"})),
    )
        .into_response()
}
