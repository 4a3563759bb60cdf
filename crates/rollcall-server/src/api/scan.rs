//! Scanning API endpoints.
//!
//! Start and stop the passive scan, and read back the detected-set snapshot
//! together with scan diagnostics.

use axum::extract::State;
use axum::Json;
use chrono::Utc;
use rollcall_core::ScanStatsSnapshot;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::api::error::ApiResult;
use crate::state::SharedState;

// ============================================================================
// Request/Response Types
// ============================================================================

/// Scan lifecycle response.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({ "scanning": true, "window_secs": null }))]
pub struct ScanStateResponse {
    /// Whether a scan is running.
    #[schema(example = true)]
    pub scanning: bool,

    /// Configured fixed window, if any.
    #[schema(nullable, example = json!(null))]
    pub window_secs: Option<u64>,
}

/// One currently detected session.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({ "identifier": "482913", "last_seen_secs_ago": 3 }))]
pub struct DetectedSession {
    /// The decoded session identifier.
    #[schema(example = "482913")]
    pub identifier: String,

    /// Seconds since this identifier was last seen.
    #[schema(example = 3)]
    pub last_seen_secs_ago: u64,
}

/// Detected-set snapshot plus diagnostics.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "detected": [
        { "identifier": "482913", "last_seen_secs_ago": 3 }
    ],
    "scanning": true,
    "stats": {
        "advertisements_seen": 240,
        "marker_matches": 31,
        "decoded": 30,
        "decode_failures": 1
    },
    "checked_at_utc": "2025-01-15T09:05:00Z"
}))]
pub struct DetectedResponse {
    /// Currently detected sessions, freshest first.
    pub detected: Vec<DetectedSession>,

    /// Whether a scan is running right now.
    #[schema(example = true)]
    pub scanning: bool,

    /// Scan diagnostics since the scanner was created.
    pub stats: ScanStatsSnapshot,

    /// When this snapshot was taken.
    #[schema(example = "2025-01-15T09:05:00Z")]
    pub checked_at_utc: String,
}

// ============================================================================
// Handlers
// ============================================================================

/// Start scanning for nearby session codes.
#[utoipa::path(
    post,
    path = "/scan",
    tag = "scan",
    operation_id = "startScan",
    summary = "Start scanning",
    description = "Opens a passive BLE scan for session advertisements. \
        Idempotent: starting an already running scan is a no-op.",
    responses(
        (status = 200, description = "Scan running", body = ScanStateResponse),
        (status = 503, description = "Radio unavailable", body = ErrorResponse)
    )
)]
pub async fn start_scan(State(state): State<SharedState>) -> ApiResult<Json<ScanStateResponse>> {
    let mut guard = state.ensure_scanner().await?;
    if let Some(scanner) = guard.as_mut() {
        scanner.start_scan().await?;
    }
    Ok(Json(ScanStateResponse {
        scanning: true,
        window_secs: state.config().scan.window_secs,
    }))
}

/// Stop scanning.
#[utoipa::path(
    delete,
    path = "/scan",
    tag = "scan",
    operation_id = "stopScan",
    summary = "Stop scanning",
    description = "Stops the passive scan. Idempotent: stopping when no scan \
        is running is a no-op. Detections are kept until they go stale.",
    responses(
        (status = 200, description = "Scan stopped", body = ScanStateResponse)
    )
)]
pub async fn stop_scan(State(state): State<SharedState>) -> Json<ScanStateResponse> {
    let mut guard = state.scanner_mut().await;
    if let Some(scanner) = guard.as_mut() {
        scanner.stop_scan();
    }
    Json(ScanStateResponse {
        scanning: false,
        window_secs: state.config().scan.window_secs,
    })
}

/// Detected-set snapshot.
#[utoipa::path(
    get,
    path = "/detected",
    tag = "scan",
    operation_id = "getDetected",
    summary = "List detected sessions",
    description = "Returns the deduplicated set of session codes currently \
        detected nearby, with how long ago each was last seen, plus scan \
        diagnostics.",
    responses(
        (status = 200, description = "Snapshot taken", body = DetectedResponse)
    )
)]
pub async fn get_detected(State(state): State<SharedState>) -> Json<DetectedResponse> {
    let guard = state.scanner().await;
    let (detected, scanning, stats) = match guard.as_ref() {
        Some(scanner) => {
            let detections = scanner
                .snapshot()
                .await
                .into_iter()
                .map(|d| DetectedSession {
                    identifier: d.identifier.to_string(),
                    last_seen_secs_ago: d.age.as_secs(),
                })
                .collect();
            let scanning = scanner.state() == rollcall_core::ScannerState::Scanning;
            (detections, scanning, scanner.stats())
        }
        None => (Vec::new(), false, ScanStatsSnapshot::default()),
    };

    Json(DetectedResponse {
        detected,
        scanning,
        stats,
        checked_at_utc: Utc::now().to_rfc3339(),
    })
}

// Referenced from utoipa path annotations.
#[allow(unused_imports)]
use crate::api::error::ErrorResponse;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::create_router;
    use crate::state::AppState;
    use axum::http::StatusCode;
    use axum_test::TestServer;
    use rollcall_core::RollcallConfig;

    #[tokio::test]
    async fn detected_is_empty_before_any_scan() {
        let state = AppState::new(RollcallConfig::default());
        let server = TestServer::new(create_router(state)).unwrap();

        let response = server.get("/api/detected").await;
        assert_eq!(response.status_code(), StatusCode::OK);
        let body: DetectedResponse = response.json();
        assert!(body.detected.is_empty());
        assert!(!body.scanning);
        assert_eq!(body.stats.advertisements_seen, 0);
    }

    #[tokio::test]
    async fn stop_without_scan_is_a_noop() {
        let state = AppState::new(RollcallConfig::default());
        let server = TestServer::new(create_router(state)).unwrap();

        let response = server.delete("/api/scan").await;
        assert_eq!(response.status_code(), StatusCode::OK);
        let body: ScanStateResponse = response.json();
        assert!(!body.scanning);
    }
}
