//! Provider-facing webhook endpoints.
//!
//! The POST handler always fast-acks once the payload passes validation;
//! downstream failures surface only in logs, never as a resend signal to
//! the provider.

use {
    axum::{
        body::Bytes,
        extract::{Query, State},
        http::{HeaderMap, StatusCode},
        response::{IntoResponse, Response},
    },
    serde::Deserialize,
    tracing::{error, warn},
};

use confab_dispatch::Error as DispatchError;

use crate::server::AppState;

const SIGNATURE_HEADER: &str = "X-Hub-Signature-256";

#[derive(Debug, Deserialize)]
pub struct VerifyParams {
    #[serde(rename = "hub.mode")]
    mode: Option<String>,
    #[serde(rename = "hub.verify_token")]
    verify_token: Option<String>,
    #[serde(rename = "hub.challenge")]
    challenge: Option<String>,
}

/// GET `/webhook` — subscription verification.
pub async fn verify_handler(
    State(state): State<AppState>,
    Query(params): Query<VerifyParams>,
) -> Response {
    match state.coordinator.verify_subscription(
        params.mode.as_deref(),
        params.verify_token.as_deref(),
        params.challenge.as_deref(),
    ) {
        Ok(challenge) => (StatusCode::OK, challenge).into_response(),
        Err(e) => {
            warn!(error = %e, "webhook verification refused");
            StatusCode::FORBIDDEN.into_response()
        },
    }
}

/// POST `/webhook` — signed event delivery.
pub async fn deliver_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok());

    match state.coordinator.handle_delivery(&body, signature).await {
        Ok(_) => (StatusCode::OK, "EVENT_RECEIVED").into_response(),
        Err(e @ DispatchError::Auth(_)) => {
            warn!(error = %e, "webhook delivery rejected");
            StatusCode::UNAUTHORIZED.into_response()
        },
        Err(e @ DispatchError::Validation(_)) => {
            warn!(error = %e, "webhook delivery malformed");
            StatusCode::BAD_REQUEST.into_response()
        },
        Err(e) => {
            error!(error = %e, "webhook delivery failed");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        },
    }
}
