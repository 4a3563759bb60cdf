//! Radio backends behind the [`AdvertisingRadio`] and [`ScanningRadio`]
//! seams.
//!
//! The radio capability is an explicit object handed to the broadcaster and
//! scanner constructors, owned for the process lifetime and released
//! deterministically when dropped. On Linux with the `bluetooth` feature the
//! backend is BlueZ via bluer; everywhere else (and in tests) [`MockRadio`]
//! stands in.

use crate::broadcast::AdvertisingRadio;
use crate::scan::ScanningRadio;

#[cfg(feature = "bluetooth")]
pub use ble::BleRadio;

#[cfg(any(test, feature = "mock-radio", not(feature = "bluetooth")))]
pub use mock::MockRadio;

/// The radio backend selected by the crate's features.
#[cfg(feature = "bluetooth")]
pub type DefaultRadio = BleRadio;

/// The radio backend selected by the crate's features.
#[cfg(not(feature = "bluetooth"))]
pub type DefaultRadio = MockRadio;

/// Construct the default radio backend for this build.
///
/// # Errors
///
/// [`crate::error::RollcallError::RadioUnavailable`] when the platform radio
/// stack cannot be reached.
#[cfg(feature = "bluetooth")]
pub async fn default_radio(
    adapter_name: Option<String>,
) -> crate::error::Result<DefaultRadio> {
    BleRadio::new(adapter_name).await
}

/// Construct the default radio backend for this build.
///
/// # Errors
///
/// Never fails for the mock backend.
#[cfg(not(feature = "bluetooth"))]
pub async fn default_radio(
    _adapter_name: Option<String>,
) -> crate::error::Result<DefaultRadio> {
    Ok(MockRadio::new())
}

#[cfg(feature = "bluetooth")]
mod ble {
    use async_trait::async_trait;
    use futures::StreamExt;
    use tokio::sync::{mpsc, oneshot};
    use tracing::{debug, trace, warn};
    use uuid::Uuid;

    use crate::broadcast::{AdvertisingRadio, BroadcastError};
    use crate::codec::{AdvertisementPayload, SERVICE_UUID};
    use crate::error::{Result, RollcallError};
    use crate::scan::{RawAdvertisement, ScanError, ScanStream, ScanningRadio};

    /// BlueZ-backed radio. One advertising session and one scan at most.
    pub struct BleRadio {
        session: bluer::Session,
        adapter_name: Option<String>,
        adv_handle: Option<bluer::adv::AdvertisementHandle>,
    }

    impl BleRadio {
        /// Connect to the BlueZ daemon.
        ///
        /// # Errors
        ///
        /// [`RollcallError::RadioUnavailable`] when the D-Bus session to
        /// bluetoothd cannot be established.
        pub async fn new(adapter_name: Option<String>) -> Result<Self> {
            let session = bluer::Session::new()
                .await
                .map_err(|err| RollcallError::RadioUnavailable(err.to_string()))?;
            Ok(Self {
                session,
                adapter_name,
                adv_handle: None,
            })
        }

        async fn adapter(&self) -> bluer::Result<bluer::Adapter> {
            match &self.adapter_name {
                Some(name) => self.session.adapter(name),
                None => self.session.default_adapter().await,
            }
        }

        /// Shared capability check: adapter present and powered.
        async fn powered_adapter(&self) -> std::result::Result<bluer::Adapter, CapabilityFault> {
            let adapter = self
                .adapter()
                .await
                .map_err(|_| CapabilityFault::AdapterNotFound)?;
            let powered = adapter
                .is_powered()
                .await
                .map_err(|err| CapabilityFault::Platform(err.to_string()))?;
            if powered {
                Ok(adapter)
            } else {
                Err(CapabilityFault::AdapterPoweredOff)
            }
        }
    }

    /// Capability failure before it is mapped into a path-specific error.
    enum CapabilityFault {
        AdapterNotFound,
        AdapterPoweredOff,
        Platform(String),
    }

    impl From<CapabilityFault> for BroadcastError {
        fn from(fault: CapabilityFault) -> Self {
            match fault {
                CapabilityFault::AdapterNotFound => Self::AdapterNotFound,
                CapabilityFault::AdapterPoweredOff => Self::AdapterPoweredOff,
                CapabilityFault::Platform(message) => Self::Platform(message),
            }
        }
    }

    impl From<CapabilityFault> for ScanError {
        fn from(fault: CapabilityFault) -> Self {
            match fault {
                CapabilityFault::AdapterNotFound => Self::AdapterNotFound,
                CapabilityFault::AdapterPoweredOff => Self::AdapterPoweredOff,
                CapabilityFault::Platform(message) => Self::Platform(message),
            }
        }
    }

    #[async_trait]
    impl AdvertisingRadio for BleRadio {
        async fn acquire(&mut self) -> std::result::Result<(), BroadcastError> {
            self.powered_adapter().await.map(|_| ()).map_err(Into::into)
        }

        async fn start_advertising(
            &mut self,
            payload: &AdvertisementPayload,
        ) -> std::result::Result<(), BroadcastError> {
            let adapter = self.powered_adapter().await?;
            // No local name, no TX power: every spare byte goes to the
            // identifier.
            let advertisement = bluer::adv::Advertisement {
                advertisement_type: bluer::adv::Type::Broadcast,
                service_uuids: std::iter::once(SERVICE_UUID).collect(),
                manufacturer_data: std::iter::once((
                    payload.company_id(),
                    payload.identifier_bytes().to_vec(),
                ))
                .collect(),
                discoverable: Some(true),
                ..Default::default()
            };
            let handle = adapter
                .advertise(advertisement)
                .await
                .map_err(|err| BroadcastError::Platform(err.to_string()))?;
            self.adv_handle = Some(handle);
            debug!(adapter = %adapter.name(), "advertisement registered with bluetoothd");
            Ok(())
        }

        async fn stop_advertising(&mut self) -> std::result::Result<(), BroadcastError> {
            // Dropping the handle unregisters the advertisement.
            self.adv_handle.take();
            Ok(())
        }
    }

    #[async_trait]
    impl ScanningRadio for BleRadio {
        async fn acquire(&mut self) -> std::result::Result<(), ScanError> {
            self.powered_adapter().await.map(|_| ()).map_err(Into::into)
        }

        async fn start_scan(&mut self) -> std::result::Result<ScanStream, ScanError> {
            let adapter = self.powered_adapter().await?;
            // with_changes so a presenter re-advertising the same session
            // shows up again and refreshes its last-seen timestamp.
            let discovery = adapter
                .discover_devices_with_changes()
                .await
                .map_err(|err| ScanError::Platform(err.to_string()))?;
            let mut discovery = Box::pin(discovery);

            let (event_tx, event_rx) = mpsc::channel(64);
            let (stop_tx, mut stop_rx) = oneshot::channel::<()>();
            tokio::spawn(async move {
                loop {
                    tokio::select! {
                        _ = &mut stop_rx => break,
                        event = discovery.next() => {
                            let Some(event) = event else { break };
                            let bluer::AdapterEvent::DeviceAdded(address) = event else {
                                continue;
                            };
                            match read_device(&adapter, address).await {
                                Ok(raw) => {
                                    if event_tx.send(raw).await.is_err() {
                                        break;
                                    }
                                }
                                Err(err) => {
                                    trace!(%address, error = %err, "failed to read device properties");
                                }
                            }
                        }
                    }
                }
                debug!("discovery forwarder stopped");
            });
            Ok(ScanStream::new(event_rx, stop_tx))
        }
    }

    /// Read one discovered device's advertisement-relevant properties.
    async fn read_device(
        adapter: &bluer::Adapter,
        address: bluer::Address,
    ) -> bluer::Result<RawAdvertisement> {
        let device = adapter.device(address)?;
        let service_uuids: Vec<Uuid> = device
            .uuids()
            .await?
            .map(|uuids| uuids.into_iter().collect())
            .unwrap_or_default();
        let manufacturer_data = device.manufacturer_data().await?.and_then(|data| {
            // Reassemble the full wire payload: BlueZ splits off the
            // company id, the codec expects it back in front.
            data.into_iter().next().map(|(company_id, bytes)| {
                let mut payload = company_id.to_le_bytes().to_vec();
                payload.extend(bytes);
                payload
            })
        });
        let rssi = match device.rssi().await {
            Ok(rssi) => rssi,
            Err(err) => {
                warn!(%address, error = %err, "rssi unavailable");
                None
            }
        };
        Ok(RawAdvertisement {
            address: Some(address.to_string()),
            service_uuids,
            manufacturer_data,
            rssi,
        })
    }
}

#[cfg(any(test, feature = "mock-radio", not(feature = "bluetooth")))]
mod mock {
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use tokio::sync::{mpsc, oneshot};

    use crate::broadcast::{AdvertisingRadio, BroadcastError};
    use crate::codec::AdvertisementPayload;
    use crate::scan::{RawAdvertisement, ScanError, ScanStream, ScanningRadio};

    #[derive(Default)]
    struct MockState {
        deny_capability: bool,
        advertised: Option<AdvertisementPayload>,
        advertise_starts: u32,
        advertise_stops: u32,
        scan_starts: u32,
        injector: Option<mpsc::Sender<RawAdvertisement>>,
    }

    /// In-memory radio test double.
    ///
    /// Clones share state, so tests keep a clone for introspection and
    /// injection after handing the radio to a broadcaster or scanner.
    #[derive(Clone, Default)]
    pub struct MockRadio {
        state: Arc<Mutex<MockState>>,
    }

    impl MockRadio {
        /// A fresh mock with the capability granted.
        #[must_use]
        pub fn new() -> Self {
            Self::default()
        }

        fn lock(&self) -> std::sync::MutexGuard<'_, MockState> {
            self.state.lock().expect("mock radio state poisoned")
        }

        /// Make subsequent `acquire` calls fail with a capability denial.
        pub fn deny_capability(&self, deny: bool) {
            self.lock().deny_capability = deny;
        }

        /// The payload currently "on the air", if any.
        #[must_use]
        pub fn advertised(&self) -> Option<AdvertisementPayload> {
            self.lock().advertised.clone()
        }

        /// How many times advertising was started.
        #[must_use]
        pub fn advertise_starts(&self) -> u32 {
            self.lock().advertise_starts
        }

        /// How many times advertising was stopped while something was on
        /// the air.
        #[must_use]
        pub fn advertise_stops(&self) -> u32 {
            self.lock().advertise_stops
        }

        /// How many scans were opened.
        #[must_use]
        pub fn scan_starts(&self) -> u32 {
            self.lock().scan_starts
        }

        /// Deliver a raw advertisement into the active scan.
        ///
        /// # Panics
        ///
        /// Panics when no scan is active; that is a test bug.
        pub async fn inject(&self, raw: RawAdvertisement) {
            let injector = self
                .lock()
                .injector
                .clone()
                .expect("inject called without an active scan");
            injector
                .send(raw)
                .await
                .expect("active scan dropped its receiver");
        }

        fn check_capability<E>(&self, denied: impl FnOnce(String) -> E) -> Result<(), E> {
            if self.lock().deny_capability {
                Err(denied("denied by test double".to_string()))
            } else {
                Ok(())
            }
        }
    }

    #[async_trait]
    impl AdvertisingRadio for MockRadio {
        async fn acquire(&mut self) -> Result<(), BroadcastError> {
            self.check_capability(|reason| BroadcastError::CapabilityDenied { reason })
        }

        async fn start_advertising(
            &mut self,
            payload: &AdvertisementPayload,
        ) -> Result<(), BroadcastError> {
            let mut state = self.lock();
            state.advertised = Some(payload.clone());
            state.advertise_starts += 1;
            Ok(())
        }

        async fn stop_advertising(&mut self) -> Result<(), BroadcastError> {
            let mut state = self.lock();
            if state.advertised.take().is_some() {
                state.advertise_stops += 1;
            }
            Ok(())
        }
    }

    #[async_trait]
    impl ScanningRadio for MockRadio {
        async fn acquire(&mut self) -> Result<(), ScanError> {
            self.check_capability(|reason| ScanError::CapabilityDenied { reason })
        }

        async fn start_scan(&mut self) -> Result<ScanStream, ScanError> {
            let (event_tx, event_rx) = mpsc::channel(64);
            let (stop_tx, _stop_rx) = oneshot::channel();
            let mut state = self.lock();
            state.scan_starts += 1;
            state.injector = Some(event_tx);
            Ok(ScanStream::new(event_rx, stop_tx))
        }
    }
}

// Compile-time check that both backends satisfy both seams.
#[allow(dead_code)]
fn assert_radio_impls<R: AdvertisingRadio + ScanningRadio>() {}

#[allow(dead_code)]
fn assert_default_radio() {
    assert_radio_impls::<DefaultRadio>();
}
