//! Bot API webhook endpoint

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};
use tracing::warn;

use crate::telegram::Update;
use crate::web::AppState;

pub const SECRET_TOKEN_HEADER: &str = "x-telegram-bot-api-secret-token";

/// Accepts one update and hands it to a tracked background task.
///
/// Everything except a secret mismatch is answered with 200 so the platform
/// does not redeliver updates that can never be handled.
pub async fn receive_update(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> impl IntoResponse {
    if let Some(expected) = state.config.web.webhook_secret.as_deref() {
        let presented = headers
            .get(SECRET_TOKEN_HEADER)
            .and_then(|value| value.to_str().ok());
        if presented != Some(expected) {
            warn!("Webhook call with missing or wrong secret token");
            return StatusCode::FORBIDDEN;
        }
    }

    let update: Update = match serde_json::from_slice(&body) {
        Ok(update) => update,
        Err(e) => {
            warn!("Discarding undecodable webhook payload: {}", e);
            return StatusCode::OK;
        }
    };

    state.pipeline.spawn_update(update);

    StatusCode::OK
}
