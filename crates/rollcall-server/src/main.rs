//! # rollcall-server
//!
//! HTTP server for the rollcall proximity attendance system.
//!
//! This binary provides:
//! - REST API for session broadcasting, scanning, and attendance claims
//! - An in-memory session registry for single-host deployments
//! - Structured logging to file and stdout
//!
//! ## Running
//!
//! ```bash
//! # Development
//! cargo run --package rollcall-server
//!
//! # Production (on a classroom host)
//! ./rollcall-server
//! ```

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]

use std::net::SocketAddr;

use rollcall_core::RollcallConfig;
use tokio::net::TcpListener;
use tracing::info;

use rollcall_server::{api, logging, state::AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let is_production = std::env::var("ROLLCALL_ENV")
        .map(|env| env == "production")
        .unwrap_or(!cfg!(debug_assertions));
    logging::init(is_production)?;

    info!("Starting rollcall-server");

    let config = RollcallConfig::load_or_default()?;
    let listen_port = config.server.listen_port;
    let state = AppState::new(config);

    // Background refresh of the known-session list
    let watcher = state.watcher().clone();
    tokio::spawn(async move { watcher.run().await });

    let app = api::create_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], listen_port));
    let listener = TcpListener::bind(addr).await?;

    info!("Listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
