use axum::{body::Bytes, extract::State, http::HeaderMap};

use crate::AppState;
use crate::api::error::AppError;
use crate::line::events::WebhookRequest;
use crate::line::signature::verify_signature;

/// `POST /webhook` (and `/callback`).
///
/// Signature verification happens over the raw body before anything is
/// decoded. Once it passes, the response is always `200 "OK"`: delivery of
/// the per-event replies is decoupled from acknowledging the webhook.
pub async fn callback(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<&'static str, AppError> {
    let signature = headers
        .get("x-line-signature")
        .and_then(|v| v.to_str().ok())
        .ok_or(AppError::SignatureInvalid)?;

    if !verify_signature(&state.config.channel_secret, &body, signature) {
        tracing::warn!("webhook rejected: signature mismatch");
        return Err(AppError::SignatureInvalid);
    }

    let request: WebhookRequest = serde_json::from_slice(&body)
        .map_err(|e| AppError::BadRequest(format!("undecodable event batch: {e}")))?;

    tracing::info!(events = request.events.len(), "webhook accepted");

    // Events are handled independently; dispatch never fails, so one bad
    // event cannot take down the rest of the batch.
    for event in request.events {
        state.pipeline.dispatch(event).await;
    }

    Ok("OK")
}
