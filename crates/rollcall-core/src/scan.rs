//! Passive scanning for session advertisements.
//!
//! The [`Scanner`] opens a scan through a [`ScanningRadio`], filters raw
//! advertisements down to the rollcall service UUID, decodes their
//! manufacturer data, and maintains the deduplicated, time-bounded set of
//! currently detected session identifiers. All of the protocol's
//! noise-handling lives here: unrelated traffic is dropped on the marker
//! check, undecodable payloads are counted and discarded, and re-detections
//! update a timestamp instead of growing the set.
//!
//! Scan window policy: continuous until stopped by default; an optional
//! fixed window can be configured and is constant for the scanner's
//! lifetime. Entries not re-detected within the staleness window are swept
//! on every snapshot.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::codec::{self, SessionId, SERVICE_UUID};

/// Default staleness window: one full scan cycle.
pub const DEFAULT_STALENESS: Duration = Duration::from_secs(30);

/// Errors from the scan path.
#[derive(Debug, Error)]
pub enum ScanError {
    /// The platform refused use of the radio (permission or radio off).
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

    /// Platform-level scanning fault. Surfaced once per operation; retry is
    /// the caller's decision.
    #[error("scan failed: {0}")]
    Platform(String),
}

/// Scanner lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScannerState {
    /// No scan in progress.
    Idle,
    /// Waiting on the platform capability grant.
    RequestingCapability,
    /// Receiving advertisements.
    Scanning,
}

/// One raw advertisement as delivered by the radio backend, before any
/// protocol filtering.
#[derive(Debug, Clone)]
pub struct RawAdvertisement {
    /// Transmitter address, when the backend exposes one.
    pub address: Option<String>,
    /// Service UUIDs carried in the advertisement.
    pub service_uuids: Vec<Uuid>,
    /// Full manufacturer-data payload, company marker included.
    pub manufacturer_data: Option<Vec<u8>>,
    /// Received signal strength. Diagnostic only; proximity decisions are
    /// made on decoded identifiers, never on RSSI.
    pub rssi: Option<i16>,
}

/// Read-only scan diagnostics.
///
/// Counters are observability outputs, never control inputs.
#[derive(Debug, Default)]
pub struct ScanStats {
    seen: AtomicU64,
    marked: AtomicU64,
    decoded: AtomicU64,
    decode_failures: AtomicU64,
}

impl ScanStats {
    fn record_seen(&self) {
        self.seen.fetch_add(1, Ordering::Relaxed);
    }

    fn record_marked(&self) {
        self.marked.fetch_add(1, Ordering::Relaxed);
    }

    fn record_decoded(&self) {
        self.decoded.fetch_add(1, Ordering::Relaxed);
    }

    fn record_decode_failure(&self) {
        self.decode_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Consistent-enough point-in-time copy of the counters.
    #[must_use]
    pub fn snapshot(&self) -> ScanStatsSnapshot {
        ScanStatsSnapshot {
            advertisements_seen: self.seen.load(Ordering::Relaxed),
            marker_matches: self.marked.load(Ordering::Relaxed),
            decoded: self.decoded.load(Ordering::Relaxed),
            decode_failures: self.decode_failures.load(Ordering::Relaxed),
        }
    }
}

/// Serializable copy of [`ScanStats`].
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, ToSchema)]
pub struct ScanStatsSnapshot {
    /// Advertisements received, related or not.
    #[schema(example = 240)]
    pub advertisements_seen: u64,
    /// Advertisements carrying the rollcall service UUID.
    #[schema(example = 31)]
    pub marker_matches: u64,
    /// Payloads successfully decoded to a session identifier.
    #[schema(example = 30)]
    pub decoded: u64,
    /// Marker-matching payloads that failed to decode.
    #[schema(example = 1)]
    pub decode_failures: u64,
}

/// Scan window policy, fixed at scanner construction.
#[derive(Debug, Clone, Copy)]
pub struct ScanPolicy {
    /// `None` scans continuously until stopped; `Some` closes the scan after
    /// the window elapses.
    pub window: Option<Duration>,
    /// Detections older than this are dropped on each snapshot.
    pub staleness: Duration,
}

impl Default for ScanPolicy {
    fn default() -> Self {
        Self {
            window: None,
            staleness: DEFAULT_STALENESS,
        }
    }
}

/// A live scan opened by a radio backend.
///
/// Dropping the stream tells the backend to end discovery, which is how
/// both explicit stops and window expiry release the radio.
pub struct ScanStream {
    events: mpsc::Receiver<RawAdvertisement>,
    _stop: oneshot::Sender<()>,
}

impl ScanStream {
    /// Pair a raw-advertisement channel with a stop signal. The backend
    /// should end discovery when the held sender is dropped.
    #[must_use]
    pub fn new(events: mpsc::Receiver<RawAdvertisement>, stop: oneshot::Sender<()>) -> Self {
        Self {
            events,
            _stop: stop,
        }
    }

    /// Next raw advertisement, or `None` once the backend has closed.
    pub async fn next(&mut self) -> Option<RawAdvertisement> {
        self.events.recv().await
    }
}

/// Radio seam for scanning. One scan at most per radio.
#[async_trait]
pub trait ScanningRadio: Send + Sync {
    /// Request use of the radio for scanning.
    async fn acquire(&mut self) -> Result<(), ScanError>;

    /// Open discovery and stream raw advertisements until the returned
    /// [`ScanStream`] is dropped.
    async fn start_scan(&mut self) -> Result<ScanStream, ScanError>;
}

/// One currently detected session.
#[derive(Debug, Clone)]
pub struct Detection {
    /// The decoded identifier.
    pub identifier: SessionId,
    /// How long ago it was last seen.
    pub age: Duration,
}

/// State machine driving one scan session.
///
/// Scan callbacks arrive on a pump task that is the single writer of the
/// detected set; callers only ever read snapshots.
pub struct Scanner<R: ScanningRadio> {
    radio: R,
    policy: ScanPolicy,
    state: ScannerState,
    detected: Arc<Mutex<HashMap<SessionId, Instant>>>,
    stats: Arc<ScanStats>,
    pump: Option<JoinHandle<()>>,
}

impl<R: ScanningRadio> Scanner<R> {
    /// Create an idle scanner with the given window policy.
    pub fn new(radio: R, policy: ScanPolicy) -> Self {
        Self {
            radio,
            policy,
            state: ScannerState::Idle,
            detected: Arc::new(Mutex::new(HashMap::new())),
            stats: Arc::new(ScanStats::default()),
            pump: None,
        }
    }

    /// Current lifecycle state. A scan whose window has elapsed reads as
    /// [`ScannerState::Idle`] without requiring an explicit stop.
    #[must_use]
    pub fn state(&self) -> ScannerState {
        match self.state {
            ScannerState::Scanning
                if self.pump.as_ref().map_or(true, JoinHandle::is_finished) =>
            {
                ScannerState::Idle
            }
            state => state,
        }
    }

    /// Diagnostic counters for this scanner.
    #[must_use]
    pub fn stats(&self) -> ScanStatsSnapshot {
        self.stats.snapshot()
    }

    /// Start scanning. No-op if a scan is already running.
    ///
    /// # Errors
    ///
    /// [`ScanError::CapabilityDenied`] when the platform refuses the radio,
    /// or a platform error from opening discovery. Either way the scanner
    /// returns to [`ScannerState::Idle`] and may be started again.
    pub async fn start_scan(&mut self) -> Result<(), ScanError> {
        if self.state() == ScannerState::Scanning {
            debug!("scan already running");
            return Ok(());
        }

        self.state = ScannerState::RequestingCapability;
        if let Err(err) = self.radio.acquire().await {
            self.state = ScannerState::Idle;
            return Err(err);
        }

        let mut stream = match self.radio.start_scan().await {
            Ok(stream) => stream,
            Err(err) => {
                self.state = ScannerState::Idle;
                return Err(err);
            }
        };

        let detected = Arc::clone(&self.detected);
        let stats = Arc::clone(&self.stats);
        let window = self.policy.window;
        self.pump = Some(tokio::spawn(async move {
            let deadline = window.map(|w| tokio::time::Instant::now() + w);
            loop {
                let next = match deadline {
                    Some(at) => match tokio::time::timeout_at(at, stream.next()).await {
                        Ok(event) => event,
                        Err(_) => {
                            debug!("scan window elapsed");
                            break;
                        }
                    },
                    None => stream.next().await,
                };
                let Some(raw) = next else { break };
                ingest(&raw, &detected, &stats).await;
            }
        }));
        self.state = ScannerState::Scanning;
        info!(window = ?window, "scan started");
        Ok(())
    }

    /// Stop scanning. Idempotent; safe to race with window expiry, since
    /// whichever fires first wins and the other is a no-op.
    pub fn stop_scan(&mut self) {
        if let Some(pump) = self.pump.take() {
            pump.abort();
            info!("scan stopped");
        }
        self.state = ScannerState::Idle;
    }

    /// Identifiers currently considered detected, after sweeping stale
    /// entries.
    pub async fn detected(&self) -> HashSet<SessionId> {
        self.sweep().await;
        self.detected.lock().await.keys().cloned().collect()
    }

    /// Detected identifiers with their last-seen age, freshest first.
    pub async fn snapshot(&self) -> Vec<Detection> {
        self.sweep().await;
        let now = Instant::now();
        let mut detections: Vec<Detection> = self
            .detected
            .lock()
            .await
            .iter()
            .map(|(identifier, seen)| Detection {
                identifier: identifier.clone(),
                age: now.saturating_duration_since(*seen),
            })
            .collect();
        detections.sort_by_key(|d| d.age);
        detections
    }

    /// Drop entries older than the staleness window, so a presenter that
    /// stopped broadcasting eventually disappears from detected state.
    async fn sweep(&self) {
        let staleness = self.policy.staleness;
        let now = Instant::now();
        self.detected
            .lock()
            .await
            .retain(|_, seen| now.saturating_duration_since(*seen) <= staleness);
    }
}

impl<R: ScanningRadio> Drop for Scanner<R> {
    fn drop(&mut self) {
        if let Some(pump) = self.pump.take() {
            pump.abort();
        }
    }
}

/// Filter, decode and record one raw advertisement. Decode failures are
/// counted and logged at debug; they never abort the scan.
async fn ingest(
    raw: &RawAdvertisement,
    detected: &Mutex<HashMap<SessionId, Instant>>,
    stats: &ScanStats,
) {
    stats.record_seen();
    if !raw.service_uuids.iter().any(|uuid| *uuid == SERVICE_UUID) {
        return;
    }
    stats.record_marked();

    let Some(payload) = raw.manufacturer_data.as_deref() else {
        stats.record_decode_failure();
        debug!(address = ?raw.address, "marker match without manufacturer data");
        return;
    };

    match codec::decode(payload) {
        Ok(identifier) => {
            stats.record_decoded();
            debug!(%identifier, rssi = ?raw.rssi, "session detected");
            detected.lock().await.insert(identifier, Instant::now());
        }
        Err(err) => {
            stats.record_decode_failure();
            debug!(error = %err, address = ?raw.address, "discarding undecodable advertisement");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::radio::MockRadio;

    fn marked(payload: &[u8]) -> RawAdvertisement {
        RawAdvertisement {
            address: Some("AA:BB:CC:DD:EE:FF".into()),
            service_uuids: vec![SERVICE_UUID],
            manufacturer_data: Some(payload.to_vec()),
            rssi: Some(-48),
        }
    }

    async fn settle() {
        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    #[tokio::test]
    async fn detects_and_deduplicates() {
        let radio = MockRadio::new();
        let mut scanner = Scanner::new(radio.clone(), ScanPolicy::default());
        scanner.start_scan().await.unwrap();

        radio.inject(marked(&[0xE0, 0x00, b'4', b'2'])).await;
        radio.inject(marked(&[0xE0, 0x00, b'4', b'2'])).await;
        settle().await;

        let detected = scanner.detected().await;
        assert_eq!(detected.len(), 1);
        assert!(detected.contains(&SessionId::new("42").unwrap()));

        let stats = scanner.stats();
        assert_eq!(stats.advertisements_seen, 2);
        assert_eq!(stats.marker_matches, 2);
        assert_eq!(stats.decoded, 2);
    }

    #[tokio::test]
    async fn ignores_unmarked_traffic() {
        let radio = MockRadio::new();
        let mut scanner = Scanner::new(radio.clone(), ScanPolicy::default());
        scanner.start_scan().await.unwrap();

        radio
            .inject(RawAdvertisement {
                address: None,
                service_uuids: vec![Uuid::nil()],
                manufacturer_data: Some(vec![0xE0, 0x00, b'9', b'9']),
                rssi: None,
            })
            .await;
        settle().await;

        assert!(scanner.detected().await.is_empty());
        let stats = scanner.stats();
        assert_eq!(stats.advertisements_seen, 1);
        assert_eq!(stats.marker_matches, 0);
    }

    #[tokio::test]
    async fn malformed_payload_is_counted_not_fatal() {
        let radio = MockRadio::new();
        let mut scanner = Scanner::new(radio.clone(), ScanPolicy::default());
        scanner.start_scan().await.unwrap();

        radio.inject(marked(&[0xE0])).await;
        radio.inject(marked(&[0xE0, 0x00, 0xFF, 0xFE])).await;
        radio.inject(marked(&[0xE0, 0x00, b'7'])).await;
        settle().await;

        let detected = scanner.detected().await;
        assert_eq!(detected.len(), 1);
        let stats = scanner.stats();
        assert_eq!(stats.marker_matches, 3);
        assert_eq!(stats.decoded, 1);
        assert_eq!(stats.decode_failures, 2);
    }

    #[tokio::test]
    async fn stale_detections_age_out() {
        let radio = MockRadio::new();
        let policy = ScanPolicy {
            window: None,
            staleness: Duration::from_millis(80),
        };
        let mut scanner = Scanner::new(radio.clone(), policy);
        scanner.start_scan().await.unwrap();

        radio.inject(marked(&[0xE0, 0x00, b'4', b'2'])).await;
        settle().await;
        assert_eq!(scanner.detected().await.len(), 1);

        tokio::time::sleep(Duration::from_millis(120)).await;
        assert!(scanner.detected().await.is_empty());
    }

    #[tokio::test]
    async fn redetection_refreshes_instead_of_aging_out() {
        let radio = MockRadio::new();
        let policy = ScanPolicy {
            window: None,
            staleness: Duration::from_millis(150),
        };
        let mut scanner = Scanner::new(radio.clone(), policy);
        scanner.start_scan().await.unwrap();

        radio.inject(marked(&[0xE0, 0x00, b'4', b'2'])).await;
        settle().await;
        tokio::time::sleep(Duration::from_millis(80)).await;
        radio.inject(marked(&[0xE0, 0x00, b'4', b'2'])).await;
        settle().await;
        tokio::time::sleep(Duration::from_millis(80)).await;

        // Still fresh: the second sighting reset the clock.
        assert_eq!(scanner.detected().await.len(), 1);
    }

    #[tokio::test]
    async fn start_scan_is_idempotent() {
        let radio = MockRadio::new();
        let mut scanner = Scanner::new(radio.clone(), ScanPolicy::default());
        scanner.start_scan().await.unwrap();
        scanner.start_scan().await.unwrap();
        assert_eq!(radio.scan_starts(), 1);
        assert_eq!(scanner.state(), ScannerState::Scanning);
    }

    #[tokio::test]
    async fn stop_scan_twice_is_safe() {
        let radio = MockRadio::new();
        let mut scanner = Scanner::new(radio, ScanPolicy::default());
        scanner.start_scan().await.unwrap();
        scanner.stop_scan();
        scanner.stop_scan();
        assert_eq!(scanner.state(), ScannerState::Idle);
    }

    #[tokio::test]
    async fn capability_denial_returns_scanner_to_idle() {
        let radio = MockRadio::new();
        radio.deny_capability(true);
        let mut scanner = Scanner::new(radio.clone(), ScanPolicy::default());
        let err = scanner.start_scan().await.unwrap_err();
        assert!(matches!(err, ScanError::CapabilityDenied { .. }));
        assert_eq!(scanner.state(), ScannerState::Idle);

        radio.deny_capability(false);
        scanner.start_scan().await.unwrap();
        assert_eq!(scanner.state(), ScannerState::Scanning);
    }

    #[tokio::test]
    async fn fixed_window_closes_scan_by_itself() {
        let radio = MockRadio::new();
        let policy = ScanPolicy {
            window: Some(Duration::from_millis(60)),
            staleness: DEFAULT_STALENESS,
        };
        let mut scanner = Scanner::new(radio.clone(), policy);
        scanner.start_scan().await.unwrap();
        assert_eq!(scanner.state(), ScannerState::Scanning);

        radio.inject(marked(&[0xE0, 0x00, b'4', b'2'])).await;
        tokio::time::sleep(Duration::from_millis(120)).await;
        assert_eq!(scanner.state(), ScannerState::Idle);
        // Detections survive the window close until they go stale.
        assert_eq!(scanner.detected().await.len(), 1);

        // Stop after the window already fired is a harmless no-op.
        scanner.stop_scan();
        assert_eq!(scanner.state(), ScannerState::Idle);
    }
}
