//! OpenAPI specification generation for the rollcall API.
//!
//! This module generates an OpenAPI 3.0 specification consumed by client
//! generators and API tooling. Descriptions are written for both human
//! developers and automated agents.

use axum::Json;
use utoipa::OpenApi;

// Import all the handler modules to reference their types
use super::attendance::{
    ClaimRequest, ClaimResponse, EligibilityResponse, ManualClaimRequest, ManualClaimResponse,
    MarkPresentRequest, RosterResponse,
};
use super::error::ErrorResponse;
use super::health::HealthResponse;
use super::scan::{DetectedResponse, DetectedSession, ScanStateResponse};
use super::sessions::{
    CloseSessionResponse, KnownSessionList, OpenSessionRequest, OpenSessionResponse,
};
use rollcall_core::matcher::{Eligibility, SessionEligibility};
use rollcall_core::registry::{AttendanceAck, KnownSession};
use rollcall_core::{ScanStatsSnapshot, SessionId};

/// Serve the OpenAPI specification as JSON.
///
/// This endpoint is available at `/api/openapi.json` and returns the complete
/// OpenAPI 3.0 specification for the rollcall API.
pub async fn get_openapi_spec() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

/// Returns the OpenAPI specification as a string (for writing to file).
/// Used by the gen-openapi binary.
#[allow(dead_code)]
pub fn get_openapi_json() -> String {
    ApiDoc::openapi()
        .to_pretty_json()
        .expect("Failed to serialize OpenAPI spec")
}

/// Main OpenAPI document structure for rollcall.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "rollcall API",
        version = "0.1.0",
        description = r#"
# rollcall API

rollcall records attendance for in-person sessions using BLE proximity.

## Overview

This API runs on the classroom host and provides:

1. **Sessions**: A presenter opens a session; its short code is broadcast
   over BLE advertisements for as long as the session is active.
2. **Scanning**: Attendee devices scan passively and maintain the set of
   session codes currently detected nearby.
3. **Attendance**: A claim is accepted only for a session that is detected
   nearby, already claimed, or whose code was entered manually.

## Design Philosophy

- **Proximity as evidence**: Detecting the broadcast is the claim's
  precondition, not a location record.
- **Manual fallback**: A shared code bypasses only the radio gate; every
  server-side check still applies.
- **Best-effort radio**: Session creation never fails because broadcasting
  failed; the failure is reported so the presenter can share the code.
"#,
        license(name = "MIT", url = "https://opensource.org/licenses/MIT")
    ),
    servers(
        (url = "/", description = "Local rollcall server")
    ),
    tags(
        (
            name = "system",
            description = "Health checks and system status"
        ),
        (
            name = "sessions",
            description = "Session lifecycle and BLE broadcasting"
        ),
        (
            name = "scan",
            description = "Passive scanning and the detected set"
        ),
        (
            name = "attendance",
            description = "Proximity-gated and manual attendance claims"
        )
    ),
    paths(
        // Health endpoints
        super::health::health_check,
        // Session endpoints
        super::sessions::open_session,
        super::sessions::close_session,
        super::sessions::list_sessions,
        // Scan endpoints
        super::scan::start_scan,
        super::scan::stop_scan,
        super::scan::get_detected,
        // Attendance endpoints
        super::attendance::get_eligibility,
        super::attendance::claim,
        super::attendance::claim_manual,
        super::attendance::get_roster,
        super::attendance::mark_present,
    ),
    components(
        schemas(
            // Error types
            ErrorResponse,
            // Health types
            HealthResponse,
            // Session types
            OpenSessionRequest,
            OpenSessionResponse,
            CloseSessionResponse,
            KnownSessionList,
            KnownSession,
            SessionId,
            // Scan types
            ScanStateResponse,
            DetectedSession,
            DetectedResponse,
            ScanStatsSnapshot,
            // Attendance types
            ClaimRequest,
            ClaimResponse,
            ManualClaimRequest,
            ManualClaimResponse,
            MarkPresentRequest,
            RosterResponse,
            EligibilityResponse,
            SessionEligibility,
            Eligibility,
            AttendanceAck,
        )
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openapi_spec_generation() {
        let spec = ApiDoc::openapi();
        assert_eq!(spec.info.title, "rollcall API");
        assert!(!spec.paths.paths.is_empty());
    }

    #[test]
    fn test_openapi_json_serialization() {
        let json = get_openapi_json();
        assert!(json.contains("\"openapi\":"));
        assert!(json.contains("\"rollcall API\""));
    }
}
