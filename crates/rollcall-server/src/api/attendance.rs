//! Attendance API endpoints.
//!
//! The radio-gated claim path, the manual fallback, and per-claimant
//! eligibility. The proximity gate lives here: a claim is refused unless the
//! session's code is currently detected nearby, was entered manually, or was
//! already claimed.

use axum::extract::{Path, State};
use axum::Json;
use chrono::Utc;
use rollcall_core::matcher::{reconcile, submit_manual, SessionEligibility};
use rollcall_core::registry::{AttendanceAck, KnownSession, SessionRegistry};
use rollcall_core::SessionId;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::api::error::{ApiError, ApiResult};
use crate::state::SharedState;

// ============================================================================
// Request/Response Types
// ============================================================================

/// Radio-gated attendance claim.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({ "identifier": "482913", "claimant": "mchen" }))]
pub struct ClaimRequest {
    /// Session identifier to claim.
    #[schema(example = "482913")]
    pub identifier: String,

    /// Who is claiming.
    #[schema(example = "mchen")]
    pub claimant: String,
}

/// Manual fallback attendance claim.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({ "code": "482913", "claimant": "mchen" }))]
pub struct ManualClaimRequest {
    /// Session code as shared by the presenter.
    #[schema(example = "482913")]
    pub code: String,

    /// Who is claiming.
    #[schema(example = "mchen")]
    pub claimant: String,
}

/// Recorded attendance.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ClaimResponse {
    /// The recorded attendance.
    pub attendance: AttendanceAck,
}

/// Recorded attendance via the manual fallback.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ManualClaimResponse {
    /// The session the code matched.
    pub session: KnownSession,

    /// The recorded attendance.
    pub attendance: AttendanceAck,
}

/// Presenter-side override: record an attendee without the radio gate.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({ "claimant": "mchen" }))]
pub struct MarkPresentRequest {
    /// Who to record as present.
    #[schema(example = "mchen")]
    pub claimant: String,
}

/// Everyone recorded present for one session.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RosterResponse {
    /// The session this roster belongs to.
    #[schema(example = "482913")]
    pub identifier: String,

    /// Recorded claims, oldest first.
    pub attendees: Vec<AttendanceAck>,
}

/// Per-session eligibility for one claimant.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct EligibilityResponse {
    /// The claimant this view is for.
    #[schema(example = "mchen")]
    pub claimant: String,

    /// Each active session paired with the claimant's eligibility for it.
    pub sessions: Vec<SessionEligibility>,

    /// When this view was computed.
    #[schema(example = "2025-01-15T09:05:00Z")]
    pub checked_at_utc: String,
}

fn validated_claimant(raw: &str) -> ApiResult<&str> {
    let claimant = raw.trim();
    if claimant.is_empty() {
        return Err(ApiError::BadRequest {
            error_code: "empty_claimant".to_string(),
            message: "Claimant cannot be empty".to_string(),
        });
    }
    Ok(claimant)
}

// ============================================================================
// Handlers
// ============================================================================

/// Per-claimant eligibility across all active sessions.
#[utoipa::path(
    get,
    path = "/eligibility/{claimant}",
    tag = "attendance",
    operation_id = "getEligibility",
    summary = "Eligibility per session",
    description = "Reconciles the active-session list against the detected set \
        and this claimant's claim history. Claimed beats detected, detected \
        beats absent.",
    params(
        ("claimant" = String, Path, description = "Claimant name")
    ),
    responses(
        (status = 200, description = "Eligibility computed", body = EligibilityResponse),
        (status = 400, description = "Empty claimant", body = ErrorResponse)
    )
)]
pub async fn get_eligibility(
    State(state): State<SharedState>,
    Path(claimant): Path<String>,
) -> ApiResult<Json<EligibilityResponse>> {
    let claimant = validated_claimant(&claimant)?.to_string();

    let known = state.watcher().sessions().await;
    let claimed = state.registry().claims_for(&claimant).await;
    let detected = match state.scanner().await.as_ref() {
        Some(scanner) => scanner.detected().await,
        None => std::collections::HashSet::new(),
    };

    let sessions = reconcile(&known, &detected, &claimed);
    Ok(Json(EligibilityResponse {
        claimant,
        sessions,
        checked_at_utc: Utc::now().to_rfc3339(),
    }))
}

/// Radio-gated attendance claim.
#[utoipa::path(
    post,
    path = "/attendance",
    tag = "attendance",
    operation_id = "claimAttendance",
    summary = "Claim attendance (proximity-gated)",
    description = "Records attendance for a session whose code is currently \
        detected nearby. Refused with 403 when the code has not been detected; \
        use the manual fallback in that case.",
    request_body = ClaimRequest,
    responses(
        (status = 200, description = "Attendance recorded", body = ClaimResponse),
        (status = 403, description = "Session not detected nearby", body = ErrorResponse),
        (status = 404, description = "Unknown session", body = ErrorResponse),
        (status = 409, description = "Already claimed", body = ErrorResponse)
    )
)]
pub async fn claim(
    State(state): State<SharedState>,
    Json(request): Json<ClaimRequest>,
) -> ApiResult<Json<ClaimResponse>> {
    let claimant = validated_claimant(&request.claimant)?;
    let identifier = SessionId::new(&request.identifier)?;

    // A repeat claim skips the gate so it surfaces as 409, not 403.
    let already_claimed = state
        .registry()
        .claims_for(claimant)
        .await
        .contains(&identifier);
    if !already_claimed {
        let detected = match state.scanner().await.as_ref() {
            Some(scanner) => scanner.detected().await.contains(&identifier),
            None => false,
        };
        if !detected {
            return Err(ApiError::Forbidden {
                error_code: "proximity_not_satisfied".to_string(),
                message: format!(
                    "Session '{identifier}' has not been detected nearby. \
                     Enter the code manually if the presenter shared it."
                ),
            });
        }
    }

    let attendance = state
        .registry()
        .submit_attendance(&identifier, claimant)
        .await?;
    Ok(Json(ClaimResponse { attendance }))
}

/// Manual fallback attendance claim.
#[utoipa::path(
    post,
    path = "/attendance/manual",
    tag = "attendance",
    operation_id = "claimAttendanceManual",
    summary = "Claim attendance by code",
    description = "Records attendance for a session whose code was shared out \
        of band. The code is normalized exactly like a scanned one; an \
        unmatched code is reported back verbatim.",
    request_body = ManualClaimRequest,
    responses(
        (status = 200, description = "Attendance recorded", body = ManualClaimResponse),
        (status = 404, description = "No active session matches the code", body = ErrorResponse),
        (status = 409, description = "Already claimed", body = ErrorResponse)
    )
)]
pub async fn claim_manual(
    State(state): State<SharedState>,
    Json(request): Json<ManualClaimRequest>,
) -> ApiResult<Json<ManualClaimResponse>> {
    let claimant = validated_claimant(&request.claimant)?;

    let known = state.registry().list_active_sessions().await?;
    let session = submit_manual(&request.code, &known)?.clone();

    let attendance = state
        .registry()
        .submit_attendance(&session.identifier, claimant)
        .await?;
    Ok(Json(ManualClaimResponse {
        session,
        attendance,
    }))
}

/// Attendance roster for one session.
#[utoipa::path(
    get,
    path = "/sessions/{id}/attendance",
    tag = "attendance",
    operation_id = "getRoster",
    summary = "Attendance roster",
    description = "Everyone recorded present for the session, oldest claim \
        first. The presenter's view of who has claimed so far.",
    params(
        ("id" = String, Path, description = "Session identifier")
    ),
    responses(
        (status = 200, description = "Roster returned", body = RosterResponse),
        (status = 404, description = "Unknown session", body = ErrorResponse)
    )
)]
pub async fn get_roster(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> ApiResult<Json<RosterResponse>> {
    let identifier = SessionId::new(&id)?;
    let attendees = state.registry().attendance_for(&identifier).await?;
    Ok(Json(RosterResponse {
        identifier: identifier.to_string(),
        attendees,
    }))
}

/// Presenter-side attendance override.
#[utoipa::path(
    post,
    path = "/sessions/{id}/attendance",
    tag = "attendance",
    operation_id = "markPresent",
    summary = "Mark an attendee present",
    description = "Records attendance on the presenter's say-so, skipping the \
        radio gate. For attendees whose device cannot scan and who did not \
        enter the code themselves.",
    params(
        ("id" = String, Path, description = "Session identifier")
    ),
    request_body = MarkPresentRequest,
    responses(
        (status = 200, description = "Attendance recorded", body = ClaimResponse),
        (status = 400, description = "Empty claimant", body = ErrorResponse),
        (status = 404, description = "Unknown session", body = ErrorResponse),
        (status = 409, description = "Already claimed", body = ErrorResponse)
    )
)]
pub async fn mark_present(
    State(state): State<SharedState>,
    Path(id): Path<String>,
    Json(request): Json<MarkPresentRequest>,
) -> ApiResult<Json<ClaimResponse>> {
    let claimant = validated_claimant(&request.claimant)?;
    let identifier = SessionId::new(&id)?;

    let attendance = state
        .registry()
        .submit_attendance(&identifier, claimant)
        .await?;
    Ok(Json(ClaimResponse { attendance }))
}

// Referenced from utoipa path annotations.
#[allow(unused_imports)]
use crate::api::error::ErrorResponse;
