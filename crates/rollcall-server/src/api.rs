//! HTTP API routes and handlers.
//!
//! This module contains all HTTP endpoint implementations organized by domain:
//! - `sessions` - Session lifecycle and BLE broadcasting
//! - `scan` - Passive scanning and the detected set
//! - `attendance` - Proximity-gated and manual attendance claims
//! - `health` - Service health checks
//! - `error` - API error types
//! - `openapi` - OpenAPI specification generation

use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::state::SharedState;

pub mod attendance;
pub mod error;
pub mod health;
pub mod openapi;
pub mod scan;
pub mod sessions;

// Re-export commonly used types
#[allow(unused_imports)]
pub use error::{ApiError, ApiResult, ErrorResponse};

// Re-export OpenAPI utilities for the gen-openapi binary
#[allow(unused_imports)]
pub use openapi::get_openapi_json;

/// Creates the combined API router with all endpoints.
///
/// # Route Structure
///
/// ```text
/// /health                          - Health check
/// /api
/// ├── /sessions                    - Open/list sessions
/// ├── /sessions/{id}               - Close a session
/// ├── /sessions/{id}/attendance    - Roster / presenter mark-present
/// ├── /scan                        - Start/stop scanning
/// ├── /detected                    - Detected-set snapshot
/// ├── /eligibility/{claimant}      - Per-claimant eligibility
/// ├── /attendance                  - Proximity-gated claim
/// ├── /attendance/manual           - Manual fallback claim
/// └── /openapi.json                - OpenAPI specification
/// ```
pub fn create_router(state: SharedState) -> Router {
    Router::new()
        .nest("/health", health::router())
        .nest(
            "/api",
            Router::new()
                .route(
                    "/sessions",
                    post(sessions::open_session).get(sessions::list_sessions),
                )
                .route("/sessions/{id}", axum::routing::delete(sessions::close_session))
                .route(
                    "/sessions/{id}/attendance",
                    get(attendance::get_roster).post(attendance::mark_present),
                )
                .route("/scan", post(scan::start_scan).delete(scan::stop_scan))
                .route("/detected", get(scan::get_detected))
                .route("/eligibility/{claimant}", get(attendance::get_eligibility))
                .route("/attendance", post(attendance::claim))
                .route("/attendance/manual", post(attendance::claim_manual))
                .route("/openapi.json", get(openapi::get_openapi_spec)),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
