//! Session identifier codec and advertisement wire format.
//!
//! A session identifier travels inside the manufacturer-data field of a BLE
//! advertisement: a 2-byte company marker followed by the identifier's ASCII
//! bytes, 20 bytes total at most. Advertisements are tagged with a fixed
//! 128-bit service UUID so scanners can separate them from ambient traffic.
//!
//! This module is the only place identifier bytes are produced or
//! interpreted. Decoding never panics; a malformed payload is a recoverable
//! [`CodecError::Malformed`], counted by the scanner and otherwise ignored.

use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;
use uuid::{uuid, Uuid};

/// Service UUID marking an advertisement as a rollcall session broadcast.
///
/// Comparison always goes through the parsed [`Uuid`], never through string
/// comparison, so marker casing from the platform radio stack is irrelevant.
pub const SERVICE_UUID: Uuid = uuid!("12345678-1234-1234-1234-123456789abc");

/// Company identifier prefixed to the manufacturer-data payload.
pub const COMPANY_ID: u16 = 0x00E0;

/// Size of the company marker at the front of the payload.
pub const MARKER_LEN: usize = 2;

/// Maximum encoded identifier length in bytes (one byte per character).
pub const MAX_IDENTIFIER_LEN: usize = 18;

/// Maximum total payload size: marker plus identifier.
pub const MAX_PAYLOAD_LEN: usize = MARKER_LEN + MAX_IDENTIFIER_LEN;

static IDENTIFIER_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new("^[0-9A-Z]+$").expect("identifier pattern is valid"));

/// Errors produced while encoding or decoding session identifiers.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    /// The identifier does not fit the advertisement payload budget.
    #[error("session identifier exceeds the {max}-byte payload budget (got {actual})")]
    TooLong {
        /// Maximum encoded identifier length.
        max: usize,
        /// Actual encoded length of the rejected identifier.
        actual: usize,
    },

    /// The payload cannot be interpreted as a session identifier.
    #[error("advertisement payload is malformed")]
    Malformed,

    /// The identifier contains characters outside the digits/uppercase space.
    #[error("session identifier '{candidate}' contains characters outside 0-9 and A-Z")]
    InvalidCharacters {
        /// The rejected identifier, after normalization.
        candidate: String,
    },
}

/// A normalized session identifier.
///
/// Equality is byte-exact after normalization: surrounding whitespace is
/// trimmed, embedded NUL padding stripped, and ASCII letters uppercased.
/// Construction through [`SessionId::new`] is the only way to obtain one, so
/// every held value satisfies the charset and length bounds.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ToSchema)]
#[serde(try_from = "String", into = "String")]
#[schema(example = "482913")]
pub struct SessionId(String);

impl SessionId {
    /// Normalize and validate a raw identifier.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::Malformed`] if nothing remains after
    /// normalization, [`CodecError::InvalidCharacters`] for out-of-charset
    /// input, and [`CodecError::TooLong`] past the payload budget.
    pub fn new(raw: &str) -> Result<Self, CodecError> {
        let normalized = normalize(raw);
        if normalized.is_empty() {
            return Err(CodecError::Malformed);
        }
        if !IDENTIFIER_PATTERN.is_match(&normalized) {
            return Err(CodecError::InvalidCharacters {
                candidate: normalized,
            });
        }
        if normalized.len() > MAX_IDENTIFIER_LEN {
            return Err(CodecError::TooLong {
                max: MAX_IDENTIFIER_LEN,
                actual: normalized.len(),
            });
        }
        Ok(Self(normalized))
    }

    /// The normalized identifier text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for SessionId {
    type Error = CodecError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(&value)
    }
}

impl From<SessionId> for String {
    fn from(id: SessionId) -> Self {
        id.0
    }
}

/// Normalization applied to every identifier entering the system, whether
/// decoded off the air or typed by a person.
fn normalize(raw: &str) -> String {
    raw.chars()
        .filter(|c| *c != '\0')
        .collect::<String>()
        .trim()
        .to_ascii_uppercase()
}

/// The full manufacturer-data payload of one advertisement.
///
/// Layout: `[company marker, little-endian u16] [identifier ASCII bytes]`.
/// No checksum, no length prefix; the identifier length is the payload
/// length minus the marker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdvertisementPayload(Vec<u8>);

impl AdvertisementPayload {
    /// The complete wire bytes, marker included.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// The company marker carried in the first two bytes.
    #[must_use]
    pub fn company_id(&self) -> u16 {
        u16::from_le_bytes([self.0[0], self.0[1]])
    }

    /// The identifier bytes following the marker.
    #[must_use]
    pub fn identifier_bytes(&self) -> &[u8] {
        &self.0[MARKER_LEN..]
    }

    /// Total payload length in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the payload is empty. Never true for encoded payloads.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Encode a raw identifier into an advertisement payload.
///
/// Deterministic: the same input always yields the same bytes.
///
/// # Errors
///
/// Fails with the underlying [`CodecError`] when the identifier is empty,
/// out of charset, or longer than [`MAX_IDENTIFIER_LEN`] bytes.
pub fn encode(identifier: &str) -> Result<AdvertisementPayload, CodecError> {
    let id = SessionId::new(identifier)?;
    Ok(payload_for(&id))
}

/// Assemble the payload for an already-validated identifier.
#[must_use]
pub fn payload_for(id: &SessionId) -> AdvertisementPayload {
    let mut bytes = Vec::with_capacity(MARKER_LEN + id.as_str().len());
    bytes.extend_from_slice(&COMPANY_ID.to_le_bytes());
    bytes.extend_from_slice(id.as_str().as_bytes());
    AdvertisementPayload(bytes)
}

/// Decode a raw manufacturer-data payload back into a session identifier.
///
/// Strips exactly [`MARKER_LEN`] marker bytes, then normalizes the rest.
/// The marker value is not checked: it is a vendor tag, not a checksum, and
/// scanners have already filtered on the service UUID.
///
/// # Errors
///
/// Returns [`CodecError::Malformed`] for anything that does not yield a
/// valid identifier: too short, non-UTF-8, empty after normalization, out of
/// charset, or over budget. Noise from unrelated devices lands here and is
/// expected.
pub fn decode(payload: &[u8]) -> Result<SessionId, CodecError> {
    if payload.len() < MARKER_LEN {
        return Err(CodecError::Malformed);
    }
    let body = std::str::from_utf8(&payload[MARKER_LEN..]).map_err(|_| CodecError::Malformed)?;
    SessionId::new(body).map_err(|_| CodecError::Malformed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_preserves_identifier() {
        for id in ["42", "482913", "ABC123", "A", "999999999999999999"] {
            let payload = encode(id).unwrap();
            assert_eq!(decode(payload.as_bytes()).unwrap().as_str(), id);
        }
    }

    #[test]
    fn round_trip_normalizes() {
        let payload = encode("  ab12\0 ").unwrap();
        assert_eq!(decode(payload.as_bytes()).unwrap().as_str(), "AB12");
    }

    #[test]
    fn encode_succeeds_at_exact_budget() {
        let id = "9".repeat(MAX_IDENTIFIER_LEN);
        let payload = encode(&id).unwrap();
        assert_eq!(payload.len(), MAX_PAYLOAD_LEN);
    }

    #[test]
    fn encode_fails_one_past_budget() {
        let id = "9".repeat(MAX_IDENTIFIER_LEN + 1);
        assert_eq!(
            encode(&id),
            Err(CodecError::TooLong {
                max: MAX_IDENTIFIER_LEN,
                actual: MAX_IDENTIFIER_LEN + 1
            })
        );
    }

    #[test]
    fn encode_rejects_empty_and_padding_only() {
        assert_eq!(encode(""), Err(CodecError::Malformed));
        assert_eq!(encode(" \0\0 "), Err(CodecError::Malformed));
    }

    #[test]
    fn encode_rejects_out_of_charset() {
        assert!(matches!(
            encode("AB_12"),
            Err(CodecError::InvalidCharacters { .. })
        ));
    }

    #[test]
    fn payload_carries_marker_then_ascii() {
        let payload = encode("42").unwrap();
        assert_eq!(payload.as_bytes(), &[0xE0, 0x00, b'4', b'2']);
        assert_eq!(payload.company_id(), COMPANY_ID);
        assert_eq!(payload.identifier_bytes(), b"42");
    }

    #[test]
    fn decode_strips_marker_never_leaks_it() {
        let decoded = decode(&[0xE0, 0x00, b'7', b'7']).unwrap();
        assert_eq!(decoded.as_str(), "77");
    }

    #[test]
    fn decode_strips_nul_padding() {
        let decoded = decode(&[0xE0, 0x00, b'7', b'7', 0, 0, 0]).unwrap();
        assert_eq!(decoded.as_str(), "77");
    }

    #[test]
    fn decode_rejects_short_input() {
        assert_eq!(decode(&[]), Err(CodecError::Malformed));
        assert_eq!(decode(&[0xE0]), Err(CodecError::Malformed));
        assert_eq!(decode(&[0xE0, 0x00]), Err(CodecError::Malformed));
    }

    #[test]
    fn decode_rejects_non_utf8_noise() {
        assert_eq!(decode(&[0x4C, 0x00, 0xFF, 0xFE, 0x80]), Err(CodecError::Malformed));
    }

    #[test]
    fn decode_rejects_over_budget_noise() {
        let mut payload = vec![0xE0, 0x00];
        payload.extend(std::iter::repeat(b'1').take(MAX_IDENTIFIER_LEN + 5));
        assert_eq!(decode(&payload), Err(CodecError::Malformed));
    }

    #[test]
    fn session_id_equality_is_normalized() {
        assert_eq!(
            SessionId::new(" 42 ").unwrap(),
            SessionId::new("42\0").unwrap()
        );
        assert_eq!(SessionId::new("abc").unwrap(), SessionId::new("ABC").unwrap());
    }

    #[test]
    fn session_id_serde_round_trip() {
        let id = SessionId::new("482913").unwrap();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"482913\"");
        let back: SessionId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn session_id_deserialization_rejects_garbage() {
        assert!(serde_json::from_str::<SessionId>("\"!!\"").is_err());
        assert!(serde_json::from_str::<SessionId>("\"\"").is_err());
    }
}
