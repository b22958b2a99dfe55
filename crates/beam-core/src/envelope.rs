//! Envelope model: the immutable unit of relayed content.
//!
//! An [`Envelope`] is either a [`TextEnvelope`] or a [`FileEnvelope`]. Fields
//! are private and only readable through accessors; text and payload bodies
//! are `Arc<str>` so one envelope can be shared read-only by every recipient.
//!
//! Envelopes are only built by a [`Stamper`], which validates the input and
//! assigns a fresh [`EnvelopeId`] plus a relay-side timestamp. Timestamps are
//! milliseconds since the Unix epoch and never decrease for a given stamper,
//! even if the wall clock steps backwards.

use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};

use serde::{Deserialize, Serialize};

use crate::codec;
use crate::errors::{RelayError, Result};
use crate::ids::{EnvelopeId, ShortId};

/// Default ceiling for raw file payloads (50 MiB).
pub const DEFAULT_MAX_FILE_BYTES: usize = 50 * 1024 * 1024;

/// Default ceiling for text content (1 MiB).
pub const DEFAULT_MAX_TEXT_BYTES: usize = 1024 * 1024;

/// MIME type used when the uploader does not supply one.
pub const FALLBACK_MIME_TYPE: &str = "application/octet-stream";

/// Wire discriminator carried in the `type` field of text envelopes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TextKind {
    /// Always serialized as `"text"`.
    #[serde(rename = "text")]
    Text,
}

/// A relayed text snippet, attributed to the sending connection.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextEnvelope {
    id: EnvelopeId,
    #[serde(rename = "type")]
    kind: TextKind,
    content: Arc<str>,
    timestamp: i64,
    sender: ShortId,
}

impl TextEnvelope {
    /// Envelope id.
    pub fn id(&self) -> &EnvelopeId {
        &self.id
    }

    /// Text as submitted (not trimmed).
    pub fn content(&self) -> &str {
        &self.content
    }

    /// Relay receipt time, ms since the Unix epoch.
    pub fn timestamp(&self) -> i64 {
        self.timestamp
    }

    /// Short id of the sending connection.
    pub fn sender(&self) -> &ShortId {
        &self.sender
    }
}

/// A relayed file with its base64-encoded payload.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEnvelope {
    id: EnvelopeId,
    name: String,
    #[serde(rename = "size")]
    size_bytes: usize,
    #[serde(rename = "type")]
    mime_type: String,
    #[serde(rename = "data")]
    payload: Arc<str>,
    timestamp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    sender: Option<ShortId>,
}

impl FileEnvelope {
    /// Envelope id.
    pub fn id(&self) -> &EnvelopeId {
        &self.id
    }

    /// Original file name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Raw (decoded) payload length in bytes.
    pub fn size_bytes(&self) -> usize {
        self.size_bytes
    }

    /// MIME type reported by the uploader.
    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    /// Base64-encoded payload.
    pub fn payload(&self) -> &str {
        &self.payload
    }

    /// Relay receipt time, ms since the Unix epoch.
    pub fn timestamp(&self) -> i64 {
        self.timestamp
    }

    /// Short id of the sending connection, when the file arrived over a socket.
    pub fn sender(&self) -> Option<&ShortId> {
        self.sender.as_ref()
    }

    /// Decode the payload back into raw bytes.
    pub fn decode_payload(&self) -> std::result::Result<Vec<u8>, codec::CodecError> {
        codec::decode(&self.payload)
    }
}

/// Discriminant of an [`Envelope`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EnvelopeKind {
    /// Text snippet.
    Text,
    /// File payload.
    File,
}

impl EnvelopeKind {
    /// Lowercase label for logs and metrics.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::File => "file",
        }
    }
}

/// The unit of relayed content.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Envelope {
    /// A text snippet.
    Text(TextEnvelope),
    /// A file.
    File(FileEnvelope),
}

impl Envelope {
    /// Envelope id.
    pub fn id(&self) -> &EnvelopeId {
        match self {
            Self::Text(t) => t.id(),
            Self::File(f) => f.id(),
        }
    }

    /// Relay receipt time, ms since the Unix epoch.
    pub fn timestamp(&self) -> i64 {
        match self {
            Self::Text(t) => t.timestamp(),
            Self::File(f) => f.timestamp(),
        }
    }

    /// Which variant this is.
    pub fn kind(&self) -> EnvelopeKind {
        match self {
            Self::Text(_) => EnvelopeKind::Text,
            Self::File(_) => EnvelopeKind::File,
        }
    }

    /// Short id of the sender, if attributed.
    pub fn sender(&self) -> Option<&ShortId> {
        match self {
            Self::Text(t) => Some(t.sender()),
            Self::File(f) => f.sender(),
        }
    }

    /// Borrow as a text envelope.
    pub fn as_text(&self) -> Option<&TextEnvelope> {
        match self {
            Self::Text(t) => Some(t),
            Self::File(_) => None,
        }
    }

    /// Borrow as a file envelope.
    pub fn as_file(&self) -> Option<&FileEnvelope> {
        match self {
            Self::File(f) => Some(f),
            Self::Text(_) => None,
        }
    }
}

impl From<TextEnvelope> for Envelope {
    fn from(t: TextEnvelope) -> Self {
        Self::Text(t)
    }
}

impl From<FileEnvelope> for Envelope {
    fn from(f: FileEnvelope) -> Self {
        Self::File(f)
    }
}

/// Size ceilings applied at envelope construction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EnvelopeLimits {
    /// Maximum raw file payload in bytes (inclusive).
    pub max_file_bytes: usize,
    /// Maximum text content in bytes (inclusive).
    pub max_text_bytes: usize,
}

impl Default for EnvelopeLimits {
    fn default() -> Self {
        Self {
            max_file_bytes: DEFAULT_MAX_FILE_BYTES,
            max_text_bytes: DEFAULT_MAX_TEXT_BYTES,
        }
    }
}

/// Validates input and stamps new envelopes with an id and timestamp.
#[derive(Debug)]
pub struct Stamper {
    limits: EnvelopeLimits,
    last_timestamp: AtomicI64,
}

impl Stamper {
    /// Create a stamper enforcing `limits`.
    pub fn new(limits: EnvelopeLimits) -> Self {
        Self {
            limits,
            last_timestamp: AtomicI64::new(i64::MIN),
        }
    }

    /// Current time in ms, clamped so it never goes below a previous stamp.
    fn now(&self) -> i64 {
        let now = chrono::Utc::now().timestamp_millis();
        let prev = self.last_timestamp.fetch_max(now, Ordering::AcqRel);
        prev.max(now)
    }

    /// Build a text envelope.
    ///
    /// Fails with `Validation` if `content` is empty after trimming, or
    /// `PayloadTooLarge` if it exceeds the text ceiling.
    pub fn text(&self, content: &str, sender: &ShortId) -> Result<TextEnvelope> {
        if content.trim().is_empty() {
            return Err(RelayError::validation("text content must not be empty"));
        }
        if content.len() > self.limits.max_text_bytes {
            return Err(RelayError::PayloadTooLarge {
                size: content.len(),
                limit: self.limits.max_text_bytes,
            });
        }
        Ok(TextEnvelope {
            id: EnvelopeId::new(),
            kind: TextKind::Text,
            content: Arc::from(content),
            timestamp: self.now(),
            sender: sender.clone(),
        })
    }

    /// Build a file envelope from raw bytes.
    pub fn file(
        &self,
        name: &str,
        mime_type: &str,
        raw: &[u8],
        sender: Option<ShortId>,
    ) -> Result<FileEnvelope> {
        self.check_file(name, raw.len())?;
        Ok(self.build_file(name, mime_type, raw.len(), codec::encode(raw), sender))
    }

    /// Build a file envelope from an already-encoded payload.
    ///
    /// The ceiling is checked against the decoded-length estimate before
    /// decoding and against the exact length after. `size_bytes` is always
    /// the decoded length.
    pub fn file_from_encoded(
        &self,
        name: &str,
        mime_type: &str,
        encoded: &str,
        sender: Option<ShortId>,
    ) -> Result<FileEnvelope> {
        let estimate = codec::decoded_len_estimate(encoded);
        if estimate > self.limits.max_file_bytes.saturating_add(2) {
            return Err(RelayError::PayloadTooLarge {
                size: estimate,
                limit: self.limits.max_file_bytes,
            });
        }
        let raw = codec::decode(encoded)?;
        self.check_file(name, raw.len())?;
        // Canonical decoding guarantees the input is the canonical encoding.
        Ok(self.build_file(name, mime_type, raw.len(), encoded.to_owned(), sender))
    }

    fn check_file(&self, name: &str, size: usize) -> Result<()> {
        if name.trim().is_empty() {
            return Err(RelayError::validation("file name must not be empty"));
        }
        if size == 0 {
            return Err(RelayError::validation("file payload must not be empty"));
        }
        if size > self.limits.max_file_bytes {
            return Err(RelayError::PayloadTooLarge {
                size,
                limit: self.limits.max_file_bytes,
            });
        }
        Ok(())
    }

    fn build_file(
        &self,
        name: &str,
        mime_type: &str,
        size_bytes: usize,
        payload: String,
        sender: Option<ShortId>,
    ) -> FileEnvelope {
        let mime_type = if mime_type.trim().is_empty() {
            FALLBACK_MIME_TYPE
        } else {
            mime_type
        };
        FileEnvelope {
            id: EnvelopeId::new(),
            name: name.to_owned(),
            size_bytes,
            mime_type: mime_type.to_owned(),
            payload: Arc::from(payload),
            timestamp: self.now(),
            sender,
        }
    }
}

impl Default for Stamper {
    fn default() -> Self {
        Self::new(EnvelopeLimits::default())
    }
}
