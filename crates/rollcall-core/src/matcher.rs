//! Proximity matching and the manual fallback path.
//!
//! Pure, synchronous reconciliation of the scanner's detected set against
//! the server-known session list. This is where the proximity gate lives:
//! only a session whose identifier was detected (or manually entered) may
//! proceed to a claim attempt.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

use crate::codec::{CodecError, SessionId};
use crate::registry::KnownSession;

/// Per-session eligibility, derived on every reconciliation, never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Eligibility {
    /// The session's identifier has not been detected nearby. No attendance
    /// action may be offered for it.
    NotDetected,
    /// Detected nearby and not yet claimed: a claim attempt is allowed.
    DetectedEligible,
    /// Attendance already recorded. Re-detection never reverts this.
    Claimed,
}

/// A known session paired with the caller's eligibility for it.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SessionEligibility {
    /// The server-known session.
    pub session: KnownSession,
    /// Eligibility derived from detection and claim history.
    pub state: Eligibility,
}

/// Manual fallback failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MatchError {
    /// No active session matches the entered code. Carries the literal
    /// candidate for user-facing display.
    #[error("no active session matches code '{candidate}'")]
    NotFound {
        /// The code exactly as the user entered it.
        candidate: String,
    },
}

/// Reconcile the known-session list against the detected set and the
/// caller's claim history.
///
/// Claim history wins over detection, detection wins over absence. The
/// output preserves the order of `known`.
#[must_use]
pub fn reconcile(
    known: &[KnownSession],
    detected: &HashSet<SessionId>,
    claimed: &HashSet<SessionId>,
) -> Vec<SessionEligibility> {
    known
        .iter()
        .map(|session| {
            let state = if claimed.contains(&session.identifier) {
                Eligibility::Claimed
            } else if detected.contains(&session.identifier) {
                Eligibility::DetectedEligible
            } else {
                Eligibility::NotDetected
            };
            SessionEligibility {
                session: session.clone(),
                state,
            }
        })
        .collect()
}

/// Validate a human-entered session code against the known-session list.
///
/// Normalizes the candidate exactly as the codec would, then matches by
/// identifier equality. A match behaves downstream exactly like a radio
/// detection; it bypasses only the client-side radio gate, never any
/// server-side validation.
///
/// # Errors
///
/// [`MatchError::NotFound`] with the candidate verbatim when it does not
/// normalize to a valid identifier or matches no known session.
pub fn submit_manual<'a>(
    candidate: &str,
    known: &'a [KnownSession],
) -> Result<&'a KnownSession, MatchError> {
    let not_found = || MatchError::NotFound {
        candidate: candidate.to_string(),
    };
    let id = SessionId::new(candidate).map_err(|_: CodecError| not_found())?;
    known
        .iter()
        .find(|session| session.identifier == id)
        .ok_or_else(not_found)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn session(id: &str, presenter: &str) -> KnownSession {
        KnownSession {
            identifier: SessionId::new(id).unwrap(),
            presenter: presenter.to_string(),
            started_at: Utc::now(),
        }
    }

    fn ids(raw: &[&str]) -> HashSet<SessionId> {
        raw.iter().map(|s| SessionId::new(s).unwrap()).collect()
    }

    #[test]
    fn gates_on_detection() {
        let known = vec![session("A1", "Rivera"), session("B2", "Chen")];
        let states = reconcile(&known, &ids(&["A1"]), &HashSet::new());
        assert_eq!(states[0].state, Eligibility::DetectedEligible);
        assert_eq!(states[1].state, Eligibility::NotDetected);
    }

    #[test]
    fn claim_beats_detection_and_is_stable() {
        let known = vec![session("A1", "Rivera")];
        // Claimed and still being detected: stays claimed.
        let states = reconcile(&known, &ids(&["A1"]), &ids(&["A1"]));
        assert_eq!(states[0].state, Eligibility::Claimed);
        // Claimed and no longer detected: still claimed.
        let states = reconcile(&known, &HashSet::new(), &ids(&["A1"]));
        assert_eq!(states[0].state, Eligibility::Claimed);
    }

    #[test]
    fn detection_of_unknown_session_is_ignored() {
        let known = vec![session("A1", "Rivera")];
        let states = reconcile(&known, &ids(&["ZZ"]), &HashSet::new());
        assert_eq!(states.len(), 1);
        assert_eq!(states[0].state, Eligibility::NotDetected);
    }

    #[test]
    fn manual_match_normalizes_like_the_codec() {
        let known = vec![session("482913", "Rivera")];
        let found = submit_manual(" 482913 ", &known).unwrap();
        assert_eq!(found.identifier.as_str(), "482913");
        let known = vec![session("ABC", "Chen")];
        let found = submit_manual("abc", &known).unwrap();
        assert_eq!(found.identifier.as_str(), "ABC");
    }

    #[test]
    fn manual_miss_carries_candidate_verbatim() {
        let known = vec![session("42", "Rivera")];
        let err = submit_manual("99", &known).unwrap_err();
        assert_eq!(
            err,
            MatchError::NotFound {
                candidate: "99".to_string()
            }
        );
    }

    #[test]
    fn manual_garbage_is_not_found_not_a_panic() {
        let err = submit_manual("not a code!", &[]).unwrap_err();
        assert_eq!(
            err,
            MatchError::NotFound {
                candidate: "not a code!".to_string()
            }
        );
    }
}
