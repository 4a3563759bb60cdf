//! Session registry seam and the known-session watcher.
//!
//! The registry is an external collaborator: it issues and closes sessions
//! and records attendance. This core only consumes it through
//! [`SessionRegistry`]. The [`SessionWatcher`] keeps a periodically
//! refreshed snapshot of the active-session list for the matcher, fully
//! decoupled from scan timing.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, warn};
use utoipa::ToSchema;

use crate::codec::SessionId;

/// A server-known active session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct KnownSession {
    /// The broadcastable identifier issued by the registry.
    pub identifier: SessionId,
    /// Presenter display name.
    #[schema(example = "Rivera")]
    pub presenter: String,
    /// When the session was opened (UTC).
    pub started_at: DateTime<Utc>,
}

/// Acknowledgement of a recorded attendance claim.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AttendanceAck {
    /// Session the claim was recorded against.
    pub identifier: SessionId,
    /// Who claimed.
    #[schema(example = "mchen")]
    pub claimant: String,
    /// When the registry recorded the claim (UTC).
    pub recorded_at: DateTime<Utc>,
}

/// Registry-side failures.
#[derive(Debug, Clone, Error)]
pub enum RegistryError {
    /// The registry could not be reached or answered abnormally.
    #[error("session registry unavailable: {0}")]
    Unavailable(String),

    /// The session is not known to the registry (never existed or closed).
    #[error("unknown session '{0}'")]
    UnknownSession(String),

    /// Attendance was already recorded for this claimant and session.
    /// An expected operational state, not a system failure.
    #[error("attendance already recorded for '{claimant}' in session '{identifier}'")]
    AlreadyClaimed {
        /// Session identifier.
        identifier: String,
        /// Claimant whose repeat claim was refused.
        claimant: String,
    },
}

/// External session registry, consumed but never implemented by this core.
#[async_trait]
pub trait SessionRegistry: Send + Sync {
    /// The registry's current list of active sessions.
    async fn list_active_sessions(&self) -> Result<Vec<KnownSession>, RegistryError>;

    /// Record an attendance claim for the given session.
    async fn submit_attendance(
        &self,
        identifier: &SessionId,
        claimant: &str,
    ) -> Result<AttendanceAck, RegistryError>;
}

/// Periodically refreshed snapshot of the active-session list.
///
/// A failed refresh keeps the previous list; the matcher must always have
/// something coherent to reconcile against.
pub struct SessionWatcher<R> {
    registry: Arc<R>,
    sessions: Arc<RwLock<Vec<KnownSession>>>,
    poll_interval: Duration,
}

impl<R> Clone for SessionWatcher<R> {
    fn clone(&self) -> Self {
        Self {
            registry: Arc::clone(&self.registry),
            sessions: Arc::clone(&self.sessions),
            poll_interval: self.poll_interval,
        }
    }
}

impl<R: SessionRegistry> SessionWatcher<R> {
    /// Create a watcher over the given registry. The list starts empty
    /// until the first refresh.
    pub fn new(registry: Arc<R>, poll_interval: Duration) -> Self {
        Self {
            registry,
            sessions: Arc::new(RwLock::new(Vec::new())),
            poll_interval,
        }
    }

    /// Refresh the snapshot once. Failures are logged and leave the
    /// previous list in place.
    pub async fn refresh(&self) {
        match self.registry.list_active_sessions().await {
            Ok(list) => {
                debug!(sessions = list.len(), "session list refreshed");
                *self.sessions.write().await = list;
            }
            Err(err) => {
                warn!(error = %err, "session refresh failed; keeping previous list");
            }
        }
    }

    /// The most recent snapshot.
    pub async fn sessions(&self) -> Vec<KnownSession> {
        self.sessions.read().await.clone()
    }

    /// Poll loop: refresh on the configured interval until the task is
    /// dropped.
    pub async fn run(&self) {
        let mut ticker = tokio::time::interval(self.poll_interval);
        loop {
            ticker.tick().await;
            self.refresh().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    struct FlakyRegistry {
        fail: AtomicBool,
    }

    #[async_trait]
    impl SessionRegistry for FlakyRegistry {
        async fn list_active_sessions(&self) -> Result<Vec<KnownSession>, RegistryError> {
            if self.fail.load(Ordering::Relaxed) {
                return Err(RegistryError::Unavailable("connection refused".into()));
            }
            Ok(vec![KnownSession {
                identifier: SessionId::new("42").unwrap(),
                presenter: "Rivera".into(),
                started_at: Utc::now(),
            }])
        }

        async fn submit_attendance(
            &self,
            identifier: &SessionId,
            claimant: &str,
        ) -> Result<AttendanceAck, RegistryError> {
            Ok(AttendanceAck {
                identifier: identifier.clone(),
                claimant: claimant.to_string(),
                recorded_at: Utc::now(),
            })
        }
    }

    #[tokio::test]
    async fn refresh_replaces_snapshot() {
        let registry = Arc::new(FlakyRegistry {
            fail: AtomicBool::new(false),
        });
        let watcher = SessionWatcher::new(registry, Duration::from_secs(5));
        assert!(watcher.sessions().await.is_empty());
        watcher.refresh().await;
        assert_eq!(watcher.sessions().await.len(), 1);
    }

    #[tokio::test]
    async fn failed_refresh_keeps_previous_list() {
        let registry = Arc::new(FlakyRegistry {
            fail: AtomicBool::new(false),
        });
        let watcher = SessionWatcher::new(Arc::clone(&registry), Duration::from_secs(5));
        watcher.refresh().await;
        assert_eq!(watcher.sessions().await.len(), 1);

        registry.fail.store(true, Ordering::Relaxed);
        watcher.refresh().await;
        assert_eq!(watcher.sessions().await.len(), 1);
    }
}
