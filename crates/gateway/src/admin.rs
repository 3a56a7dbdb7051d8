//! Operator and administrative routes.

use {
    axum::{
        Json,
        extract::{Path, Query, State},
        http::StatusCode,
        response::{IntoResponse, Response},
    },
    serde::Deserialize,
    serde_json::json,
    tracing::error,
};

use confab_live::{ClaimOutcome, Error as LiveError, TicketStatus};

use crate::server::AppState;

fn live_error_response(e: LiveError) -> Response {
    match e {
        LiveError::TicketNotFound(_) => {
            (StatusCode::NOT_FOUND, Json(json!({ "error": e.to_string() }))).into_response()
        },
        LiveError::TicketNotOpen(_) => {
            (StatusCode::CONFLICT, Json(json!({ "error": e.to_string() }))).into_response()
        },
        _ => {
            error!(error = %e, "operator action failed");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        },
    }
}

#[derive(Debug, Deserialize)]
pub struct ClaimBody {
    pub agent: String,
}

/// POST `/api/tickets/{ticket_ref}/claim`
pub async fn claim_handler(
    State(state): State<AppState>,
    Path(ticket_ref): Path<String>,
    Json(body): Json<ClaimBody>,
) -> Response {
    match state.live.claim(&ticket_ref, &body.agent).await {
        Ok(ClaimOutcome::Claimed) => {
            Json(json!({ "ticket_ref": ticket_ref, "outcome": "claimed" })).into_response()
        },
        Ok(ClaimOutcome::Reassigned { previous }) => Json(
            json!({ "ticket_ref": ticket_ref, "outcome": "reassigned", "previous": previous }),
        )
        .into_response(),
        Err(e) => live_error_response(e),
    }
}

#[derive(Debug, Deserialize)]
pub struct CloseBody {
    pub agent: String,
    /// Close as resolved instead of plain closed.
    #[serde(default)]
    pub resolved: bool,
}

/// POST `/api/tickets/{ticket_ref}/close` — ends live mode for the user.
pub async fn close_handler(
    State(state): State<AppState>,
    Path(ticket_ref): Path<String>,
    Json(body): Json<CloseBody>,
) -> Response {
    let status = if body.resolved {
        TicketStatus::Resolved
    } else {
        TicketStatus::Closed
    };
    match state.live.close_ticket(&ticket_ref, &body.agent, status).await {
        Ok(()) => Json(json!({ "ticket_ref": ticket_ref, "status": status })).into_response(),
        Err(e) => live_error_response(e),
    }
}

#[derive(Debug, Deserialize)]
pub struct ReplyBody {
    pub author: String,
    pub body: String,
}

/// POST `/api/tickets/{ticket_ref}/reply` — relay an operator note to the
/// user. `relayed: false` means it was suppressed (closed ticket,
/// non-assignee author, or a tagged audit note).
pub async fn reply_handler(
    State(state): State<AppState>,
    Path(ticket_ref): Path<String>,
    Json(body): Json<ReplyBody>,
) -> Response {
    match state.live.operator_reply(&ticket_ref, &body.author, &body.body).await {
        Ok(relayed) => Json(json!({ "ticket_ref": ticket_ref, "relayed": relayed })).into_response(),
        Err(e) => live_error_response(e),
    }
}

#[derive(Debug, Deserialize)]
pub struct NotesParams {
    #[serde(default = "default_notes_limit")]
    pub limit: usize,
}

fn default_notes_limit() -> usize {
    50
}

/// GET `/api/tickets/{ticket_ref}/notes`
pub async fn notes_handler(
    State(state): State<AppState>,
    Path(ticket_ref): Path<String>,
    Query(params): Query<NotesParams>,
) -> Response {
    match state.live.ticket_notes(&ticket_ref, params.limit).await {
        Ok(notes) => Json(notes).into_response(),
        Err(e) => live_error_response(e),
    }
}

#[derive(Debug, Deserialize)]
pub struct ClearParams {
    /// Comma-separated key names to keep.
    pub retain: Option<String>,
}

/// DELETE `/api/sessions/{user_id}` — administrative session clear.
pub async fn clear_session_handler(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Query(params): Query<ClearParams>,
) -> Response {
    let session = state.sessions.session(&user_id);
    let result = match &params.retain {
        Some(retain) => {
            let keep: Vec<&str> = retain.split(',').filter(|k| !k.is_empty()).collect();
            session.clear_retaining(&keep).await
        },
        None => session.clear().await,
    };

    match result {
        Ok(evicted) => Json(json!({ "user_id": user_id, "evicted": evicted })).into_response(),
        Err(e) => {
            error!(user_id, error = %e, "session clear failed");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        },
    }
}
