//! Relay error taxonomy.
//!
//! [`RelayError`] covers everything that rejects a single request. It is
//! surfaced to the originating client only and never affects other
//! connections. [`DeliveryError`] is the per-target outcome of a fan-out and
//! is recorded, never propagated to the sender.

use thiserror::Error;

use crate::codec::CodecError;
use crate::ids::ConnectionId;

// ── Error code constants ────────────────────────────────────────────

/// Empty content or payload.
pub const VALIDATION_ERROR: &str = "VALIDATION_ERROR";
/// Payload exceeds the configured ceiling.
pub const PAYLOAD_TOO_LARGE: &str = "PAYLOAD_TOO_LARGE";
/// Malformed encoded payload.
pub const CODEC_ERROR: &str = "CODEC_ERROR";
/// Connection id already registered.
pub const DUPLICATE_CONNECTION: &str = "DUPLICATE_CONNECTION";

/// Errors that reject one relay request.
#[derive(Debug, Error)]
pub enum RelayError {
    /// Empty text content, empty file payload, or a missing required field.
    #[error("{message}")]
    Validation {
        /// What was wrong with the request.
        message: String,
    },

    /// Decoded payload exceeds the configured ceiling.
    #[error("payload of {size} bytes exceeds the {limit}-byte limit")]
    PayloadTooLarge {
        /// Raw (decoded) size in bytes.
        size: usize,
        /// Configured ceiling in bytes.
        limit: usize,
    },

    /// Encoded payload could not be decoded.
    #[error(transparent)]
    Codec(#[from] CodecError),

    /// A connection with this id is already registered.
    #[error("connection {0} is already registered")]
    DuplicateConnection(ConnectionId),
}

impl RelayError {
    /// Build a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Machine-readable error code for this variant.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation { .. } => VALIDATION_ERROR,
            Self::PayloadTooLarge { .. } => PAYLOAD_TOO_LARGE,
            Self::Codec(_) => CODEC_ERROR,
            Self::DuplicateConnection(_) => DUPLICATE_CONNECTION,
        }
    }
}

/// Result type for relay operations.
pub type Result<T> = std::result::Result<T, RelayError>;

/// Why a single target did not receive an envelope.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum DeliveryError {
    /// The target's outbound queue was saturated; the frame was dropped.
    #[error("outbound queue full")]
    Full,
    /// The target's outbound queue is closed (the session has ended).
    #[error("outbound queue closed")]
    Closed,
}

impl DeliveryError {
    /// Short label for metrics and logs.
    pub fn reason(self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::Closed => "closed",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn validation_display_is_message() {
        let err = RelayError::validation("content must not be empty");
        assert_eq!(err.to_string(), "content must not be empty");
        assert_eq!(err.code(), VALIDATION_ERROR);
    }

    #[test]
    fn payload_too_large_display() {
        let err = RelayError::PayloadTooLarge { size: 11, limit: 10 };
        assert_eq!(err.to_string(), "payload of 11 bytes exceeds the 10-byte limit");
        assert_eq!(err.code(), PAYLOAD_TOO_LARGE);
    }

    #[test]
    fn codec_error_converts() {
        let codec_err = crate::codec::decode("!!!!").unwrap_err();
        let err: RelayError = codec_err.into();
        assert_matches!(err, RelayError::Codec(_));
        assert_eq!(err.code(), CODEC_ERROR);
        assert!(err.to_string().contains("invalid base64"));
    }

    #[test]
    fn duplicate_connection_code() {
        let err = RelayError::DuplicateConnection(ConnectionId::from("c1"));
        assert_eq!(err.code(), DUPLICATE_CONNECTION);
        assert!(err.to_string().contains("c1"));
    }

    #[test]
    fn codes_are_screaming_snake_case() {
        for code in [VALIDATION_ERROR, PAYLOAD_TOO_LARGE, CODEC_ERROR, DUPLICATE_CONNECTION] {
            assert!(code.chars().all(|c| c.is_ascii_uppercase() || c == '_'));
        }
    }

    #[test]
    fn delivery_error_reasons() {
        assert_eq!(DeliveryError::Full.reason(), "full");
        assert_eq!(DeliveryError::Closed.reason(), "closed");
        assert_eq!(DeliveryError::Full.to_string(), "outbound queue full");
    }
}
