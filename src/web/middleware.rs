//! HTTP middleware
//!
//! Request logging for every route and bearer-token auth for the
//! operator API.

use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, Method, Uri},
    middleware::Next,
    response::Response,
};
use std::time::Instant;
use tracing::{info, warn};

use super::{responses::forbidden, AppState};

/// Logs all incoming requests with timing information
pub async fn request_logging_middleware(
    method: Method,
    uri: Uri,
    request: Request,
    next: Next,
) -> Response {
    let start = Instant::now();
    let request_id = uuid::Uuid::new_v4().to_string();

    let response = next.run(request).await;
    let status = response.status().as_u16();
    let duration = start.elapsed();

    if status >= 400 {
        warn!(
            method = %method,
            uri = %uri,
            status = status,
            request_id = %request_id,
            duration_ms = duration.as_millis(),
            "HTTP request completed with error"
        );
    } else {
        info!(
            method = %method,
            uri = %uri,
            status = status,
            request_id = %request_id,
            duration_ms = duration.as_millis(),
            "HTTP request completed"
        );
    }

    response
}

/// Requires `Authorization: Bearer <web.operator_token>`.
///
/// With no token configured the operator API refuses every request.
pub async fn operator_auth_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let Some(expected) = state.config.web.operator_token.as_deref().filter(|t| !t.is_empty()) else {
        return forbidden("operator API is disabled");
    };

    let authorized = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .is_some_and(|token| token == expected);

    if !authorized {
        warn!("Rejected operator API request to {}", request.uri().path());
        return forbidden("invalid operator token");
    }
    next.run(request).await
}
