//! Unified error types for the rollcall core library.
//!
//! This module provides a unified error type [`RollcallError`] that covers all
//! failure modes across the rollcall system. Each module also has its own
//! specific error types (CodecError, BroadcastError, ScanError, MatchError,
//! RegistryError, ConfigError) for internal use.
//!
//! # Design Principles
//!
//! - **Specific variants**: Each error variant captures exactly one failure mode
//! - **Actionable messages**: Error messages guide users toward resolution
//! - **Context preservation**: Wrapped errors maintain their original context
//! - **HTTP-ready**: Error types include HTTP status codes and error codes

use std::path::PathBuf;
use thiserror::Error;

/// The unified error type for all rollcall operations.
#[derive(Debug, Error)]
pub enum RollcallError {
    // =========================================================================
    // RADIO ERRORS
    // =========================================================================
    /// No Bluetooth adapter was found on this system.
    #[error(
        "No Bluetooth adapter found. Ensure Bluetooth hardware is present and drivers are loaded."
    )]
    AdapterNotFound,

    /// The Bluetooth adapter exists but is powered off.
    #[error("Bluetooth adapter is powered off. Run 'bluetoothctl power on' to enable.")]
    AdapterPoweredOff,

    /// The platform refused use of the radio.
    #[error("Radio capability denied: {0}. Retry after granting access.")]
    CapabilityDenied(String),

    /// The radio stack itself could not be reached.
    #[error("Radio unavailable: {0}")]
    RadioUnavailable(String),

    /// Advertising failed at the platform level.
    #[error("Broadcast failed: {0}")]
    BroadcastFailed(String),

    /// Scanning failed at the platform level.
    #[error("Scan failed: {0}")]
    ScanFailed(String),

    // =========================================================================
    // IDENTIFIER ERRORS
    // =========================================================================
    /// The session identifier exceeds the advertisement payload budget.
    #[error("Session identifier exceeds maximum length of {max} bytes (got {actual})")]
    IdentifierTooLong {
        /// Maximum allowed length in bytes.
        max: usize,
        /// Actual length provided.
        actual: usize,
    },

    /// The session identifier contains characters outside its alphabet.
    #[error("Session identifier '{0}' contains invalid characters")]
    IdentifierInvalidCharacters(String),

    /// The byte sequence is not a well-formed session identifier.
    #[error("Malformed session identifier payload")]
    IdentifierMalformed,

    // =========================================================================
    // MATCHING & REGISTRY ERRORS
    // =========================================================================
    /// No active session matches the manually entered code.
    #[error("No active session matches code '{0}'. Check the code with the presenter.")]
    SessionCodeNotFound(String),

    /// The session is not known to the registry.
    #[error("Unknown session '{0}'. It may have ended.")]
    UnknownSession(String),

    /// Attendance was already recorded for this claimant and session.
    #[error("Attendance already recorded for '{claimant}' in session '{identifier}'")]
    AlreadyClaimed {
        /// Session identifier.
        identifier: String,
        /// Claimant whose repeat claim was refused.
        claimant: String,
    },

    /// The session registry could not be reached.
    #[error("Session registry unavailable: {0}")]
    RegistryUnavailable(String),

    // =========================================================================
    // CONFIGURATION ERRORS
    // =========================================================================
    /// The configuration file was not found at the expected path.
    #[error("Configuration file not found at: {}", .0.display())]
    ConfigNotFound(PathBuf),

    /// The configuration file exists but could not be parsed.
    #[error("Failed to parse configuration: {0}")]
    ConfigParseError(String),

    /// The configuration was parsed but contains invalid values.
    #[error("Configuration validation failed: {0}")]
    ConfigValidationError(String),

    // =========================================================================
    // PERSISTENCE & I/O ERRORS
    // =========================================================================
    /// An error occurred while persisting or reading data.
    #[error("Persistence error: {0}")]
    PersistenceError(String),

    /// A low-level I/O error occurred.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

/// A specialized [`Result`] type for rollcall operations.
pub type Result<T> = std::result::Result<T, RollcallError>;

impl RollcallError {
    /// Returns `true` if this error is related to the radio.
    #[inline]
    #[must_use]
    pub fn is_radio_error(&self) -> bool {
        matches!(
            self,
            Self::AdapterNotFound
                | Self::AdapterPoweredOff
                | Self::CapabilityDenied(_)
                | Self::RadioUnavailable(_)
                | Self::BroadcastFailed(_)
                | Self::ScanFailed(_)
        )
    }

    /// Returns `true` if this error is related to identifier encoding.
    #[inline]
    #[must_use]
    pub fn is_identifier_error(&self) -> bool {
        matches!(
            self,
            Self::IdentifierTooLong { .. }
                | Self::IdentifierInvalidCharacters(_)
                | Self::IdentifierMalformed
        )
    }

    /// Returns `true` if this error is related to the session registry.
    #[inline]
    #[must_use]
    pub fn is_registry_error(&self) -> bool {
        matches!(
            self,
            Self::UnknownSession(_) | Self::AlreadyClaimed { .. } | Self::RegistryUnavailable(_)
        )
    }

    /// Returns `true` if this error is related to configuration.
    #[inline]
    #[must_use]
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            Self::ConfigNotFound(_) | Self::ConfigParseError(_) | Self::ConfigValidationError(_)
        )
    }

    /// Returns `true` if this error is related to I/O or persistence.
    #[inline]
    #[must_use]
    pub fn is_io_error(&self) -> bool {
        matches!(self, Self::PersistenceError(_) | Self::IoError(_))
    }

    /// Returns `true` if this error represents an expected operational state.
    ///
    /// A duplicate claim or an unmatched manual code is a normal part of
    /// operation, not a system failure.
    #[inline]
    #[must_use]
    pub fn is_expected_state(&self) -> bool {
        matches!(self, Self::AlreadyClaimed { .. } | Self::SessionCodeNotFound(_))
    }

    /// Returns `true` if this error is likely recoverable by retrying.
    #[inline]
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::CapabilityDenied(_)
                | Self::AdapterPoweredOff
                | Self::RegistryUnavailable(_)
        )
    }

    /// Returns an HTTP-appropriate status code for this error.
    #[inline]
    #[must_use]
    pub fn http_status_code(&self) -> u16 {
        match self {
            // 400 Bad Request - malformed input
            Self::IdentifierTooLong { .. }
            | Self::IdentifierInvalidCharacters(_)
            | Self::IdentifierMalformed => 400,

            // 404 Not Found
            Self::SessionCodeNotFound(_) | Self::UnknownSession(_) | Self::ConfigNotFound(_) => 404,

            // 409 Conflict - duplicate claim
            Self::AlreadyClaimed { .. } => 409,

            // 422 Unprocessable Entity - semantic errors
            Self::ConfigParseError(_) | Self::ConfigValidationError(_) => 422,

            // 500 Internal Server Error - server-side issues
            Self::PersistenceError(_) | Self::IoError(_) => 500,

            // 503 Service Unavailable - radio or registry down
            Self::AdapterNotFound
            | Self::AdapterPoweredOff
            | Self::CapabilityDenied(_)
            | Self::RadioUnavailable(_)
            | Self::BroadcastFailed(_)
            | Self::ScanFailed(_)
            | Self::RegistryUnavailable(_) => 503,
        }
    }

    /// Returns a machine-readable error code for API responses.
    #[inline]
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::AdapterNotFound => "ADAPTER_NOT_FOUND",
            Self::AdapterPoweredOff => "ADAPTER_POWERED_OFF",
            Self::CapabilityDenied(_) => "CAPABILITY_DENIED",
            Self::RadioUnavailable(_) => "RADIO_UNAVAILABLE",
            Self::BroadcastFailed(_) => "BROADCAST_FAILED",
            Self::ScanFailed(_) => "SCAN_FAILED",
            Self::IdentifierTooLong { .. } => "IDENTIFIER_TOO_LONG",
            Self::IdentifierInvalidCharacters(_) => "IDENTIFIER_INVALID_CHARACTERS",
            Self::IdentifierMalformed => "IDENTIFIER_MALFORMED",
            Self::SessionCodeNotFound(_) => "SESSION_CODE_NOT_FOUND",
            Self::UnknownSession(_) => "UNKNOWN_SESSION",
            Self::AlreadyClaimed { .. } => "ALREADY_CLAIMED",
            Self::RegistryUnavailable(_) => "REGISTRY_UNAVAILABLE",
            Self::ConfigNotFound(_) => "CONFIG_NOT_FOUND",
            Self::ConfigParseError(_) => "CONFIG_PARSE_ERROR",
            Self::ConfigValidationError(_) => "CONFIG_VALIDATION_ERROR",
            Self::PersistenceError(_) => "PERSISTENCE_ERROR",
            Self::IoError(_) => "IO_ERROR",
        }
    }
}

// =============================================================================
// CONVERSIONS FROM MODULE-SPECIFIC ERRORS
// =============================================================================

impl From<crate::codec::CodecError> for RollcallError {
    fn from(err: crate::codec::CodecError) -> Self {
        use crate::codec::CodecError;
        match err {
            CodecError::TooLong { max, actual } => Self::IdentifierTooLong { max, actual },
            CodecError::InvalidCharacters { candidate } => {
                Self::IdentifierInvalidCharacters(candidate)
            }
            CodecError::Malformed => Self::IdentifierMalformed,
        }
    }
}

impl From<crate::broadcast::BroadcastError> for RollcallError {
    fn from(err: crate::broadcast::BroadcastError) -> Self {
        use crate::broadcast::BroadcastError;
        match err {
            BroadcastError::CapabilityDenied { reason } => Self::CapabilityDenied(reason),
            BroadcastError::AdapterNotFound => Self::AdapterNotFound,
            BroadcastError::AdapterPoweredOff => Self::AdapterPoweredOff,
            BroadcastError::Payload(e) => e.into(),
            BroadcastError::Platform(message) => Self::BroadcastFailed(message),
        }
    }
}

impl From<crate::scan::ScanError> for RollcallError {
    fn from(err: crate::scan::ScanError) -> Self {
        use crate::scan::ScanError;
        match err {
            ScanError::CapabilityDenied { reason } => Self::CapabilityDenied(reason),
            ScanError::AdapterNotFound => Self::AdapterNotFound,
            ScanError::AdapterPoweredOff => Self::AdapterPoweredOff,
            ScanError::Platform(message) => Self::ScanFailed(message),
        }
    }
}

impl From<crate::matcher::MatchError> for RollcallError {
    fn from(err: crate::matcher::MatchError) -> Self {
        use crate::matcher::MatchError;
        match err {
            MatchError::NotFound { candidate } => Self::SessionCodeNotFound(candidate),
        }
    }
}

impl From<crate::registry::RegistryError> for RollcallError {
    fn from(err: crate::registry::RegistryError) -> Self {
        use crate::registry::RegistryError;
        match err {
            RegistryError::Unavailable(message) => Self::RegistryUnavailable(message),
            RegistryError::UnknownSession(identifier) => Self::UnknownSession(identifier),
            RegistryError::AlreadyClaimed {
                identifier,
                claimant,
            } => Self::AlreadyClaimed {
                identifier,
                claimant,
            },
        }
    }
}

impl From<crate::config::ConfigError> for RollcallError {
    fn from(err: crate::config::ConfigError) -> Self {
        use crate::config::ConfigError;
        match err {
            ConfigError::NotFound(path) => Self::ConfigNotFound(path),
            ConfigError::Read { path, source } => {
                Self::PersistenceError(format!("failed to read {}: {}", path.display(), source))
            }
            ConfigError::Write { path, source } => {
                Self::PersistenceError(format!("failed to write {}: {}", path.display(), source))
            }
            ConfigError::Parse(e) => Self::ConfigParseError(e.to_string()),
            ConfigError::Serialize(e) => Self::ConfigParseError(e.to_string()),
            ConfigError::Validation { field, message } => {
                Self::ConfigValidationError(format!("{field}: {message}"))
            }
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Error as IoErr, ErrorKind};

    #[test]
    fn radio_error_classification() {
        assert!(RollcallError::AdapterNotFound.is_radio_error());
        assert!(RollcallError::AdapterPoweredOff.is_radio_error());
        assert!(RollcallError::CapabilityDenied("denied".into()).is_radio_error());
        assert!(RollcallError::ScanFailed("test".into()).is_radio_error());

        assert!(!RollcallError::IdentifierMalformed.is_radio_error());
    }

    #[test]
    fn identifier_error_classification() {
        assert!(RollcallError::IdentifierTooLong { max: 18, actual: 19 }.is_identifier_error());
        assert!(RollcallError::IdentifierInvalidCharacters("a b".into()).is_identifier_error());
        assert!(RollcallError::IdentifierMalformed.is_identifier_error());

        assert!(!RollcallError::AdapterNotFound.is_identifier_error());
    }

    #[test]
    fn registry_error_classification() {
        assert!(RollcallError::UnknownSession("42".into()).is_registry_error());
        assert!(RollcallError::AlreadyClaimed {
            identifier: "42".into(),
            claimant: "mchen".into()
        }
        .is_registry_error());
        assert!(RollcallError::RegistryUnavailable("down".into()).is_registry_error());

        assert!(!RollcallError::AdapterNotFound.is_registry_error());
    }

    #[test]
    fn expected_states() {
        assert!(RollcallError::AlreadyClaimed {
            identifier: "42".into(),
            claimant: "mchen".into()
        }
        .is_expected_state());
        assert!(RollcallError::SessionCodeNotFound("99".into()).is_expected_state());
        assert!(!RollcallError::AdapterNotFound.is_expected_state());
    }

    #[test]
    fn recoverable_errors() {
        assert!(RollcallError::CapabilityDenied("denied".into()).is_recoverable());
        assert!(RollcallError::AdapterPoweredOff.is_recoverable());
        assert!(RollcallError::RegistryUnavailable("down".into()).is_recoverable());
        assert!(!RollcallError::AdapterNotFound.is_recoverable());
    }

    #[test]
    fn http_status_codes() {
        assert_eq!(
            RollcallError::IdentifierTooLong { max: 18, actual: 19 }.http_status_code(),
            400
        );
        assert_eq!(
            RollcallError::SessionCodeNotFound("99".into()).http_status_code(),
            404
        );
        assert_eq!(
            RollcallError::AlreadyClaimed {
                identifier: "42".into(),
                claimant: "mchen".into()
            }
            .http_status_code(),
            409
        );
        assert_eq!(
            RollcallError::ConfigParseError("bad".into()).http_status_code(),
            422
        );
        assert_eq!(
            RollcallError::PersistenceError("disk".into()).http_status_code(),
            500
        );
        assert_eq!(RollcallError::AdapterNotFound.http_status_code(), 503);
    }

    #[test]
    fn error_codes() {
        assert_eq!(
            RollcallError::AdapterNotFound.error_code(),
            "ADAPTER_NOT_FOUND"
        );
        assert_eq!(
            RollcallError::SessionCodeNotFound("99".into()).error_code(),
            "SESSION_CODE_NOT_FOUND"
        );
        assert_eq!(
            RollcallError::IdentifierMalformed.error_code(),
            "IDENTIFIER_MALFORMED"
        );
    }

    #[test]
    fn from_module_errors() {
        let err: RollcallError = crate::codec::CodecError::Malformed.into();
        assert!(matches!(err, RollcallError::IdentifierMalformed));

        let err: RollcallError = crate::broadcast::BroadcastError::AdapterPoweredOff.into();
        assert!(matches!(err, RollcallError::AdapterPoweredOff));

        let err: RollcallError = crate::matcher::MatchError::NotFound {
            candidate: "99".into(),
        }
        .into();
        assert!(matches!(err, RollcallError::SessionCodeNotFound(_)));

        let err: RollcallError = crate::registry::RegistryError::Unavailable("down".into()).into();
        assert_eq!(err.error_code(), "REGISTRY_UNAVAILABLE");
    }

    #[test]
    fn from_io_error() {
        let io_err = IoErr::new(ErrorKind::NotFound, "file not found");
        let err: RollcallError = io_err.into();
        assert!(matches!(err, RollcallError::IoError(_)));
        assert!(err.is_io_error());
    }

    #[test]
    fn error_is_send_and_sync() {
        fn assert_send<T: Send>() {}
        fn assert_sync<T: Sync>() {}

        assert_send::<RollcallError>();
        assert_sync::<RollcallError>();
    }
}
