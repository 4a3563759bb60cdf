//! Session broadcasting over BLE advertisements.
//!
//! The [`Broadcaster`] owns the advertising lifecycle: it acquires the radio
//! capability, encodes the active session identifier once, hands the payload
//! to the radio for continuous retransmission, and guarantees stop is always
//! safe to call. The radio itself sits behind [`AdvertisingRadio`] so the
//! state machine is testable without BlueZ.

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::codec::{self, AdvertisementPayload, CodecError, SessionId};

/// Errors from the broadcast path.
#[derive(Debug, Error)]
pub enum BroadcastError {
    /// The platform refused use of the radio (permission or radio off).
    /// Recoverable: retry after the user grants access or powers on.
    #[error("radio capability denied: {reason}")]
    CapabilityDenied {
        /// Platform-supplied denial reason.
        reason: String,
    },

    /// No Bluetooth adapter is present on this system.
    #[error("no Bluetooth adapter found; ensure hardware is present and drivers are loaded")]
    AdapterNotFound,

    /// The adapter exists but is powered off.
    #[error("Bluetooth adapter is powered off; run 'bluetoothctl power on' to enable")]
    AdapterPoweredOff,

    /// The session identifier could not be encoded. A registry bug: the
    /// registry must never issue identifiers over the payload budget.
    #[error(transparent)]
    Payload(#[from] CodecError),

    /// Platform-level advertising fault. Surfaced once per operation; the
    /// caller decides whether to retry or fall back to manual code entry.
    #[error("broadcast failed: {0}")]
    Platform(String),
}

/// Broadcaster lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BroadcasterState {
    /// Nothing on the air.
    Idle,
    /// Waiting on the platform capability grant.
    RequestingCapability,
    /// Advertisement on the air, retransmitted by the radio stack.
    Advertising,
    /// The last start attempt failed. Does not poison future attempts.
    Failed,
}

/// Radio seam for advertising. One advertising session at most; implementors
/// make `stop_advertising` idempotent.
#[async_trait]
pub trait AdvertisingRadio: Send + Sync {
    /// Request use of the radio for advertising.
    async fn acquire(&mut self) -> Result<(), BroadcastError>;

    /// Put the payload on the air for continuous retransmission. The
    /// advertisement carries only the service UUID and manufacturer data;
    /// local name and TX power are omitted to preserve the byte budget.
    async fn start_advertising(&mut self, payload: &AdvertisementPayload)
        -> Result<(), BroadcastError>;

    /// Take the current advertisement off the air. No-op when idle.
    async fn stop_advertising(&mut self) -> Result<(), BroadcastError>;
}

/// State machine driving one advertising session.
pub struct Broadcaster<R: AdvertisingRadio> {
    radio: R,
    state: BroadcasterState,
    current: Option<SessionId>,
}

impl<R: AdvertisingRadio> Broadcaster<R> {
    /// Create an idle broadcaster over the given radio.
    pub fn new(radio: R) -> Self {
        Self {
            radio,
            state: BroadcasterState::Idle,
            current: None,
        }
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> BroadcasterState {
        self.state
    }

    /// The identifier currently on the air, if any.
    #[must_use]
    pub fn current_identifier(&self) -> Option<&SessionId> {
        self.current.as_ref()
    }

    /// Start broadcasting the given identifier.
    ///
    /// Idempotent for the identifier already on the air. A different
    /// identifier restarts the underlying broadcast atomically
    /// (stop-then-start) so a stale identifier is never left advertising.
    ///
    /// # Errors
    ///
    /// [`BroadcastError::CapabilityDenied`] when the platform refuses the
    /// radio, [`BroadcastError::Payload`] when the identifier does not fit
    /// the budget, or a platform error. A failed start leaves the
    /// broadcaster in [`BroadcasterState::Failed`] with nothing on the air;
    /// a later `start` may still succeed.
    pub async fn start(&mut self, identifier: &str) -> Result<(), BroadcastError> {
        let id = SessionId::new(identifier)?;

        if self.state == BroadcasterState::Advertising && self.current.as_ref() == Some(&id) {
            debug!(identifier = %id, "already advertising this session");
            return Ok(());
        }

        if self.state == BroadcasterState::Advertising {
            debug!(identifier = %id, "replacing advertised session");
            self.radio.stop_advertising().await?;
            self.current = None;
            self.state = BroadcasterState::Idle;
        }

        self.state = BroadcasterState::RequestingCapability;
        if let Err(err) = self.radio.acquire().await {
            self.state = BroadcasterState::Failed;
            return Err(err);
        }

        let payload = codec::payload_for(&id);
        match self.radio.start_advertising(&payload).await {
            Ok(()) => {
                info!(identifier = %id, bytes = payload.len(), "broadcast started");
                self.current = Some(id);
                self.state = BroadcasterState::Advertising;
                Ok(())
            }
            Err(err) => {
                self.state = BroadcasterState::Failed;
                Err(err)
            }
        }
    }

    /// Stop broadcasting.
    ///
    /// Idempotent and infallible: session-close logic must never itself
    /// fail. Platform errors on the stop path are logged and swallowed.
    pub async fn stop(&mut self) {
        if self.state == BroadcasterState::Idle && self.current.is_none() {
            return;
        }
        if let Err(err) = self.radio.stop_advertising().await {
            warn!(error = %err, "error while stopping broadcast; treating as stopped");
        } else if self.current.is_some() {
            info!("broadcast stopped");
        }
        self.current = None;
        self.state = BroadcasterState::Idle;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::radio::MockRadio;

    #[tokio::test]
    async fn start_stop_lifecycle() {
        let radio = MockRadio::new();
        let mut broadcaster = Broadcaster::new(radio.clone());
        assert_eq!(broadcaster.state(), BroadcasterState::Idle);

        broadcaster.start("482913").await.unwrap();
        assert_eq!(broadcaster.state(), BroadcasterState::Advertising);
        assert_eq!(
            radio.advertised().unwrap().identifier_bytes(),
            b"482913"
        );

        broadcaster.stop().await;
        assert_eq!(broadcaster.state(), BroadcasterState::Idle);
        assert!(radio.advertised().is_none());
    }

    #[tokio::test]
    async fn start_same_identifier_is_noop() {
        let radio = MockRadio::new();
        let mut broadcaster = Broadcaster::new(radio.clone());
        broadcaster.start("42").await.unwrap();
        broadcaster.start("42").await.unwrap();
        assert_eq!(radio.advertise_starts(), 1);
    }

    #[tokio::test]
    async fn start_with_new_identifier_restarts_atomically() {
        let radio = MockRadio::new();
        let mut broadcaster = Broadcaster::new(radio.clone());
        broadcaster.start("42").await.unwrap();
        broadcaster.start("77").await.unwrap();
        assert_eq!(radio.advertise_stops(), 1);
        assert_eq!(radio.advertise_starts(), 2);
        assert_eq!(radio.advertised().unwrap().identifier_bytes(), b"77");
        assert_eq!(broadcaster.current_identifier().unwrap().as_str(), "77");
    }

    #[tokio::test]
    async fn capability_denial_is_typed_not_fatal() {
        let radio = MockRadio::new();
        radio.deny_capability(true);
        let mut broadcaster = Broadcaster::new(radio.clone());

        let err = broadcaster.start("42").await.unwrap_err();
        assert!(matches!(err, BroadcastError::CapabilityDenied { .. }));
        assert_eq!(broadcaster.state(), BroadcasterState::Failed);

        // A later attempt succeeds once the capability is granted.
        radio.deny_capability(false);
        broadcaster.start("42").await.unwrap();
        assert_eq!(broadcaster.state(), BroadcasterState::Advertising);
    }

    #[tokio::test]
    async fn stop_is_idempotent_even_after_failed_start() {
        let radio = MockRadio::new();
        radio.deny_capability(true);
        let mut broadcaster = Broadcaster::new(radio.clone());
        let _ = broadcaster.start("42").await;

        broadcaster.stop().await;
        broadcaster.stop().await;
        assert_eq!(broadcaster.state(), BroadcasterState::Idle);
    }

    #[tokio::test]
    async fn oversized_identifier_is_a_payload_error() {
        let radio = MockRadio::new();
        let mut broadcaster = Broadcaster::new(radio);
        let err = broadcaster.start(&"9".repeat(19)).await.unwrap_err();
        assert!(matches!(
            err,
            BroadcastError::Payload(CodecError::TooLong { .. })
        ));
    }
}
