//! # rollcall-core
//!
//! Core logic for the rollcall proximity attendance system.
//!
//! Presenters broadcast a short session identifier over BLE advertisements;
//! attendees scan for those identifiers and may claim attendance only for
//! sessions detected nearby (or entered manually as a fallback).
//!
//! This crate provides:
//! - The advertisement wire codec (service UUID marker plus manufacturer data)
//! - The broadcaster and scanner state machines over a pluggable radio seam
//! - Proximity matching and the manual code fallback
//! - The session registry seam and a polled known-session watcher
//! - Configuration management and unified error types
//!
//! ## Architecture
//!
//! The crate is organized into the following modules:
//!
//! - [`codec`] - Session identifier validation and advertisement payload codec
//! - [`broadcast`] - Advertising lifecycle state machine
//! - [`scan`] - Scanning, detection dedup, and staleness tracking
//! - [`matcher`] - Eligibility reconciliation and manual code entry
//! - [`registry`] - Session registry trait and known-session watcher
//! - [`radio`] - BlueZ and mock radio backends
//! - [`config`] - Application configuration loading, saving, and validation
//! - [`error`] - Unified error types for the crate

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![warn(missing_docs)]

pub mod broadcast;
pub mod codec;
pub mod config;
pub mod error;
pub mod matcher;
pub mod radio;
pub mod registry;
pub mod scan;

// Re-export primary types for convenience
pub use broadcast::{AdvertisingRadio, BroadcastError, Broadcaster, BroadcasterState};
pub use codec::{
    decode, encode, payload_for, AdvertisementPayload, CodecError, SessionId, COMPANY_ID,
    MAX_IDENTIFIER_LEN, MAX_PAYLOAD_LEN, SERVICE_UUID,
};
pub use config::{ConfigError, RollcallConfig};
pub use error::{Result, RollcallError};
pub use matcher::{reconcile, submit_manual, Eligibility, MatchError, SessionEligibility};
#[cfg(any(test, feature = "mock-radio", not(feature = "bluetooth")))]
pub use radio::MockRadio;
pub use radio::{default_radio, DefaultRadio};
pub use registry::{
    AttendanceAck, KnownSession, RegistryError, SessionRegistry, SessionWatcher,
};
pub use scan::{
    Detection, RawAdvertisement, ScanError, ScanPolicy, ScanStats, ScanStatsSnapshot, ScanStream,
    Scanner, ScannerState, ScanningRadio, DEFAULT_STALENESS,
};
