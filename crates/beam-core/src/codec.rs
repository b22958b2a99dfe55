//! Payload codec: raw file bytes to and from transport-safe base64 text.
//!
//! Uses the standard alphabet with canonical padding. Decoding rejects
//! non-alphabet characters, missing or extra padding, and non-zero trailing
//! bits, so every accepted input is exactly `encode(decode(input))`.
//!
//! The codec imposes no size limit; ceilings are enforced by [`Stamper`].
//!
//! [`Stamper`]: crate::envelope::Stamper

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use thiserror::Error;

/// Malformed encoded payload.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("invalid base64 payload: {0}")]
pub struct CodecError(String);

impl From<base64::DecodeError> for CodecError {
    fn from(e: base64::DecodeError) -> Self {
        Self(e.to_string())
    }
}

/// Encode raw bytes as base64 text.
pub fn encode(raw: &[u8]) -> String {
    STANDARD.encode(raw)
}

/// Decode base64 text back into raw bytes.
pub fn decode(text: &str) -> Result<Vec<u8>, CodecError> {
    Ok(STANDARD.decode(text)?)
}

/// Upper bound on the decoded length of `text`, computed without decoding.
///
/// Lets callers reject oversized payloads before allocating for them.
pub fn decoded_len_estimate(text: &str) -> usize {
    base64::decoded_len_estimate(text.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn encode_known_vector() {
        assert_eq!(encode(b"hello"), "aGVsbG8=");
    }

    #[test]
    fn decode_known_vector() {
        assert_eq!(decode("aGVsbG8=").unwrap(), b"hello");
    }

    #[test]
    fn empty_round_trip() {
        assert_eq!(encode(&[]), "");
        assert!(decode("").unwrap().is_empty());
    }

    #[test]
    fn rejects_non_alphabet_characters() {
        let err = decode("aGVs*G8=").unwrap_err();
        assert!(err.to_string().contains("invalid base64"));
    }

    #[test]
    fn rejects_missing_padding() {
        assert!(decode("aGVsbG8").is_err());
    }

    #[test]
    fn rejects_excess_padding() {
        assert!(decode("aGVsbG8==").is_err());
    }

    #[test]
    fn rejects_non_canonical_trailing_bits() {
        // "aGVsbG9=" decodes "hello" only if trailing bits are ignored.
        assert!(decode("aGVsbG9=").is_err());
    }

    #[test]
    fn rejects_embedded_whitespace() {
        assert!(decode("aGVs bG8=").is_err());
    }

    #[test]
    fn encoded_length_differs_from_raw_length() {
        let raw = [0u8; 10];
        assert_eq!(encode(&raw).len(), 16);
    }

    #[test]
    fn estimate_bounds_actual_length() {
        let raw = vec![7u8; 1234];
        let text = encode(&raw);
        assert!(decoded_len_estimate(&text) >= raw.len());
        assert!(decoded_len_estimate(&text) < raw.len() + 4);
    }

    proptest! {
        #[test]
        fn round_trip(bytes in proptest::collection::vec(any::<u8>(), 0..4096)) {
            prop_assert_eq!(decode(&encode(&bytes)).unwrap(), bytes);
        }

        #[test]
        fn accepted_input_is_canonical(text in "[A-Za-z0-9+/]{0,64}={0,2}") {
            if let Ok(bytes) = decode(&text) {
                prop_assert_eq!(encode(&bytes), text);
            }
        }
    }
}
