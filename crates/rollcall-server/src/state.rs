//! Application state shared across handlers.

use std::sync::Arc;

use rollcall_core::radio::{default_radio, DefaultRadio};
use rollcall_core::registry::SessionWatcher;
use rollcall_core::{Broadcaster, RollcallConfig, Scanner};
use tokio::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::registry::InMemoryRegistry;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

/// Alias used by handlers and routers.
pub type SharedState = AppState;

struct AppStateInner {
    config: RollcallConfig,
    registry: Arc<InMemoryRegistry>,
    watcher: SessionWatcher<InMemoryRegistry>,
    // Created lazily on first use so a host without a working radio can
    // still serve the registry and manual-fallback endpoints.
    broadcaster: RwLock<Option<Broadcaster<DefaultRadio>>>,
    scanner: RwLock<Option<Scanner<DefaultRadio>>>,
}

impl AppState {
    /// Create new application state over a fresh in-memory registry.
    #[must_use]
    pub fn new(config: RollcallConfig) -> Self {
        let registry = Arc::new(InMemoryRegistry::new());
        let watcher = SessionWatcher::new(Arc::clone(&registry), config.poll_interval());
        Self {
            inner: Arc::new(AppStateInner {
                config,
                registry,
                watcher,
                broadcaster: RwLock::new(None),
                scanner: RwLock::new(None),
            }),
        }
    }

    /// Server configuration.
    #[must_use]
    pub fn config(&self) -> &RollcallConfig {
        &self.inner.config
    }

    /// The session registry.
    #[must_use]
    pub fn registry(&self) -> &Arc<InMemoryRegistry> {
        &self.inner.registry
    }

    /// The known-session watcher.
    #[must_use]
    pub fn watcher(&self) -> &SessionWatcher<InMemoryRegistry> {
        &self.inner.watcher
    }

    /// Write access to the broadcaster, creating it on first use.
    ///
    /// # Errors
    ///
    /// Returns a radio error when the backend cannot be initialized; the
    /// slot stays empty and a later call may succeed.
    pub async fn ensure_broadcaster(
        &self,
    ) -> rollcall_core::Result<RwLockWriteGuard<'_, Option<Broadcaster<DefaultRadio>>>> {
        let mut guard = self.inner.broadcaster.write().await;
        if guard.is_none() {
            let radio = default_radio(self.config().radio.adapter.clone()).await?;
            *guard = Some(Broadcaster::new(radio));
        }
        Ok(guard)
    }

    /// Write access to the broadcaster without creating it.
    pub async fn broadcaster_mut(
        &self,
    ) -> RwLockWriteGuard<'_, Option<Broadcaster<DefaultRadio>>> {
        self.inner.broadcaster.write().await
    }

    /// Write access to the scanner, creating it on first use with the
    /// configured scan policy.
    ///
    /// # Errors
    ///
    /// Returns a radio error when the backend cannot be initialized; the
    /// slot stays empty and a later call may succeed.
    pub async fn ensure_scanner(
        &self,
    ) -> rollcall_core::Result<RwLockWriteGuard<'_, Option<Scanner<DefaultRadio>>>> {
        let mut guard = self.inner.scanner.write().await;
        if guard.is_none() {
            let radio = default_radio(self.config().radio.adapter.clone()).await?;
            *guard = Some(Scanner::new(radio, self.config().scan_policy()));
        }
        Ok(guard)
    }

    /// Write access to the scanner without creating it.
    pub async fn scanner_mut(&self) -> RwLockWriteGuard<'_, Option<Scanner<DefaultRadio>>> {
        self.inner.scanner.write().await
    }

    /// Read access to the scanner.
    pub async fn scanner(&self) -> RwLockReadGuard<'_, Option<Scanner<DefaultRadio>>> {
        self.inner.scanner.read().await
    }
}
