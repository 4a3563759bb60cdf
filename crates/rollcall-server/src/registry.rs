//! In-memory session registry for single-host deployments.
//!
//! The classroom host that runs the broadcaster is usually also the source
//! of truth for sessions and attendance. [`InMemoryRegistry`] plays that
//! role: it issues short numeric session codes, tracks the active list, and
//! records each (session, claimant) attendance exactly once.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rollcall_core::registry::{AttendanceAck, KnownSession, RegistryError, SessionRegistry};
use rollcall_core::SessionId;
use tokio::sync::Mutex;
use tracing::info;
use uuid::Uuid;

/// Length of issued session codes.
const CODE_DIGITS: u32 = 6;

#[derive(Default)]
struct RegistryInner {
    sessions: HashMap<SessionId, KnownSession>,
    // claimant -> session -> recorded_at
    claims: HashMap<String, HashMap<SessionId, DateTime<Utc>>>,
}

/// Session registry backed by process memory.
#[derive(Default)]
pub struct InMemoryRegistry {
    inner: Mutex<RegistryInner>,
}

impl InMemoryRegistry {
    /// An empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a session for the given presenter, issuing a fresh zero-padded
    /// numeric code that no other active session holds.
    pub async fn open_session(&self, presenter: &str) -> KnownSession {
        let mut inner = self.inner.lock().await;
        let identifier = loop {
            let digits = Uuid::new_v4().as_u128() % 10u128.pow(CODE_DIGITS);
            let Ok(candidate) = SessionId::new(&format!("{digits:06}")) else {
                continue;
            };
            if !inner.sessions.contains_key(&candidate) {
                break candidate;
            }
        };
        let session = KnownSession {
            identifier: identifier.clone(),
            presenter: presenter.to_string(),
            started_at: Utc::now(),
        };
        inner.sessions.insert(identifier.clone(), session.clone());
        info!(%identifier, presenter, "session opened");
        session
    }

    /// Close a session, removing it from the active list. Recorded claims
    /// are kept.
    ///
    /// # Errors
    ///
    /// [`RegistryError::UnknownSession`] when no active session has this
    /// identifier.
    pub async fn close_session(&self, identifier: &SessionId) -> Result<KnownSession, RegistryError> {
        let mut inner = self.inner.lock().await;
        let session = inner
            .sessions
            .remove(identifier)
            .ok_or_else(|| RegistryError::UnknownSession(identifier.to_string()))?;
        info!(%identifier, "session closed");
        Ok(session)
    }

    /// Everyone recorded present for a session, oldest claim first.
    ///
    /// # Errors
    ///
    /// [`RegistryError::UnknownSession`] when no active session has this
    /// identifier.
    pub async fn attendance_for(
        &self,
        identifier: &SessionId,
    ) -> Result<Vec<AttendanceAck>, RegistryError> {
        let inner = self.inner.lock().await;
        if !inner.sessions.contains_key(identifier) {
            return Err(RegistryError::UnknownSession(identifier.to_string()));
        }
        let mut attendees: Vec<AttendanceAck> = inner
            .claims
            .iter()
            .filter_map(|(claimant, claims)| {
                claims.get(identifier).map(|recorded_at| AttendanceAck {
                    identifier: identifier.clone(),
                    claimant: claimant.clone(),
                    recorded_at: *recorded_at,
                })
            })
            .collect();
        attendees.sort_by_key(|ack| ack.recorded_at);
        Ok(attendees)
    }

    /// Sessions this claimant has already recorded attendance for.
    pub async fn claims_for(&self, claimant: &str) -> HashSet<SessionId> {
        self.inner
            .lock()
            .await
            .claims
            .get(claimant)
            .map(|claims| claims.keys().cloned().collect())
            .unwrap_or_default()
    }
}

#[async_trait]
impl SessionRegistry for InMemoryRegistry {
    async fn list_active_sessions(&self) -> Result<Vec<KnownSession>, RegistryError> {
        let inner = self.inner.lock().await;
        let mut sessions: Vec<KnownSession> = inner.sessions.values().cloned().collect();
        sessions.sort_by_key(|session| session.started_at);
        Ok(sessions)
    }

    async fn submit_attendance(
        &self,
        identifier: &SessionId,
        claimant: &str,
    ) -> Result<AttendanceAck, RegistryError> {
        let mut inner = self.inner.lock().await;
        if !inner.sessions.contains_key(identifier) {
            return Err(RegistryError::UnknownSession(identifier.to_string()));
        }

        let claims = inner.claims.entry(claimant.to_string()).or_default();
        if claims.contains_key(identifier) {
            return Err(RegistryError::AlreadyClaimed {
                identifier: identifier.to_string(),
                claimant: claimant.to_string(),
            });
        }

        let recorded_at = Utc::now();
        claims.insert(identifier.clone(), recorded_at);
        info!(%identifier, claimant, "attendance recorded");
        Ok(AttendanceAck {
            identifier: identifier.clone(),
            claimant: claimant.to_string(),
            recorded_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn open_issues_six_digit_codes() {
        let registry = InMemoryRegistry::new();
        let session = registry.open_session("Rivera").await;
        assert_eq!(session.identifier.as_str().len(), 6);
        assert!(session
            .identifier
            .as_str()
            .chars()
            .all(|c| c.is_ascii_digit()));
    }

    #[tokio::test]
    async fn open_and_close_round_trip() {
        let registry = InMemoryRegistry::new();
        let session = registry.open_session("Rivera").await;
        assert_eq!(registry.list_active_sessions().await.unwrap().len(), 1);

        registry.close_session(&session.identifier).await.unwrap();
        assert!(registry.list_active_sessions().await.unwrap().is_empty());

        let err = registry.close_session(&session.identifier).await.unwrap_err();
        assert!(matches!(err, RegistryError::UnknownSession(_)));
    }

    #[tokio::test]
    async fn attendance_records_exactly_once() {
        let registry = InMemoryRegistry::new();
        let session = registry.open_session("Rivera").await;

        let ack = registry
            .submit_attendance(&session.identifier, "mchen")
            .await
            .unwrap();
        assert_eq!(ack.claimant, "mchen");

        let err = registry
            .submit_attendance(&session.identifier, "mchen")
            .await
            .unwrap_err();
        assert!(matches!(err, RegistryError::AlreadyClaimed { .. }));

        // A different claimant is unaffected.
        registry
            .submit_attendance(&session.identifier, "jlee")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn attendance_for_unknown_session_is_rejected() {
        let registry = InMemoryRegistry::new();
        let err = registry
            .submit_attendance(&SessionId::new("999999").unwrap(), "mchen")
            .await
            .unwrap_err();
        assert!(matches!(err, RegistryError::UnknownSession(_)));
    }

    #[tokio::test]
    async fn attendance_for_lists_claimants_oldest_first() {
        let registry = InMemoryRegistry::new();
        let a = registry.open_session("Rivera").await;
        let b = registry.open_session("Chen").await;

        registry.submit_attendance(&a.identifier, "mchen").await.unwrap();
        registry.submit_attendance(&a.identifier, "jlee").await.unwrap();
        registry.submit_attendance(&b.identifier, "priya").await.unwrap();

        let roster = registry.attendance_for(&a.identifier).await.unwrap();
        let claimants: Vec<&str> = roster.iter().map(|ack| ack.claimant.as_str()).collect();
        assert_eq!(claimants, ["mchen", "jlee"]);
        assert!(roster.iter().all(|ack| ack.identifier == a.identifier));

        let err = registry
            .attendance_for(&SessionId::new("999999").unwrap())
            .await
            .unwrap_err();
        assert!(matches!(err, RegistryError::UnknownSession(_)));
    }

    #[tokio::test]
    async fn claims_for_reflects_recorded_attendance() {
        let registry = InMemoryRegistry::new();
        let a = registry.open_session("Rivera").await;
        let b = registry.open_session("Chen").await;

        registry.submit_attendance(&a.identifier, "mchen").await.unwrap();

        let claims = registry.claims_for("mchen").await;
        assert!(claims.contains(&a.identifier));
        assert!(!claims.contains(&b.identifier));
        assert!(registry.claims_for("jlee").await.is_empty());
    }
}
