//! Session lifecycle API endpoints.
//!
//! Opening a session issues a short code from the registry and puts it on
//! the air; closing a session stops the broadcast and retires the code.
//! Broadcasting is best-effort: a radio failure never blocks session
//! creation, it is reported in the response so the presenter can share the
//! code manually instead.

use axum::extract::{Path, State};
use axum::Json;
use rollcall_core::{RollcallError, SessionId};
use rollcall_core::registry::{KnownSession, SessionRegistry};
use serde::{Deserialize, Serialize};
use tracing::warn;
use utoipa::ToSchema;

use crate::api::error::{ApiError, ApiResult};
use crate::state::SharedState;

// ============================================================================
// Request/Response Types
// ============================================================================

/// Request to open a session.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({ "presenter": "Rivera" }))]
pub struct OpenSessionRequest {
    /// Presenter display name.
    #[schema(example = "Rivera")]
    pub presenter: String,
}

/// Response to opening a session.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "session": {
        "identifier": "482913",
        "presenter": "Rivera",
        "started_at": "2025-01-15T09:00:00Z"
    },
    "broadcasting": true,
    "broadcast_error": null
}))]
pub struct OpenSessionResponse {
    /// The opened session.
    pub session: KnownSession,

    /// Whether the session code is on the air.
    #[schema(example = true)]
    pub broadcasting: bool,

    /// Error code when broadcasting could not start.
    #[schema(nullable, example = json!(null))]
    pub broadcast_error: Option<String>,
}

/// Response to closing a session.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "session": {
        "identifier": "482913",
        "presenter": "Rivera",
        "started_at": "2025-01-15T09:00:00Z"
    },
    "closed_at_utc": "2025-01-15T10:30:00Z"
}))]
pub struct CloseSessionResponse {
    /// The closed session.
    pub session: KnownSession,

    /// When the session was closed.
    #[schema(example = "2025-01-15T10:30:00Z")]
    pub closed_at_utc: String,
}

/// List of active sessions.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct KnownSessionList {
    /// Active sessions, oldest first.
    pub sessions: Vec<KnownSession>,
}

// ============================================================================
// Handlers
// ============================================================================

/// Open a session and start broadcasting its code.
#[utoipa::path(
    post,
    path = "/sessions",
    tag = "sessions",
    operation_id = "openSession",
    summary = "Open a session",
    description = "Issues a fresh session code and starts broadcasting it over \
        BLE. The session is created even when the radio fails; in that case \
        `broadcasting` is false and `broadcast_error` names the failure so the \
        presenter can share the code manually.",
    request_body = OpenSessionRequest,
    responses(
        (status = 200, description = "Session opened", body = OpenSessionResponse),
        (status = 400, description = "Presenter name is empty", body = ErrorResponse)
    )
)]
pub async fn open_session(
    State(state): State<SharedState>,
    Json(request): Json<OpenSessionRequest>,
) -> ApiResult<Json<OpenSessionResponse>> {
    let presenter = request.presenter.trim();
    if presenter.is_empty() {
        return Err(ApiError::BadRequest {
            error_code: "empty_presenter".to_string(),
            message: "Presenter name cannot be empty".to_string(),
        });
    }

    let session = state.registry().open_session(presenter).await;
    state.watcher().refresh().await;

    let broadcast_result = match state.ensure_broadcaster().await {
        Ok(mut guard) => match guard.as_mut() {
            Some(broadcaster) => broadcaster
                .start(session.identifier.as_str())
                .await
                .map_err(RollcallError::from),
            None => Ok(()),
        },
        Err(err) => Err(err),
    };

    let broadcast_error = match broadcast_result {
        Ok(()) => None,
        Err(err) => {
            warn!(identifier = %session.identifier, error = %err, "session opened without broadcast");
            Some(err.error_code().to_ascii_lowercase())
        }
    };

    Ok(Json(OpenSessionResponse {
        session,
        broadcasting: broadcast_error.is_none(),
        broadcast_error,
    }))
}

/// Close a session and stop broadcasting its code.
#[utoipa::path(
    delete,
    path = "/sessions/{id}",
    tag = "sessions",
    operation_id = "closeSession",
    summary = "Close a session",
    description = "Removes the session from the active list and takes its code \
        off the air. Stopping the broadcast never fails the close.",
    params(
        ("id" = String, Path, description = "Session identifier")
    ),
    responses(
        (status = 200, description = "Session closed", body = CloseSessionResponse),
        (status = 400, description = "Malformed identifier", body = ErrorResponse),
        (status = 404, description = "No such active session", body = ErrorResponse)
    )
)]
pub async fn close_session(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> ApiResult<Json<CloseSessionResponse>> {
    let identifier = SessionId::new(&id)?;
    let session = state.registry().close_session(&identifier).await?;
    state.watcher().refresh().await;

    // Stop the broadcast only if this session's code is on the air.
    let mut guard = state.broadcaster_mut().await;
    if let Some(broadcaster) = guard.as_mut() {
        if broadcaster.current_identifier() == Some(&identifier) {
            broadcaster.stop().await;
        }
    }

    Ok(Json(CloseSessionResponse {
        session,
        closed_at_utc: chrono::Utc::now().to_rfc3339(),
    }))
}

/// List active sessions.
#[utoipa::path(
    get,
    path = "/sessions",
    tag = "sessions",
    operation_id = "listSessions",
    summary = "List active sessions",
    responses(
        (status = 200, description = "Active sessions", body = KnownSessionList)
    )
)]
pub async fn list_sessions(
    State(state): State<SharedState>,
) -> ApiResult<Json<KnownSessionList>> {
    let sessions = state.registry().list_active_sessions().await?;
    Ok(Json(KnownSessionList { sessions }))
}

// Referenced from utoipa path annotations.
#[allow(unused_imports)]
use crate::api::error::ErrorResponse;
