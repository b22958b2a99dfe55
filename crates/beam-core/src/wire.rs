//! WebSocket JSON frames.
//!
//! Every frame is `{"event": <name>, "data": <payload>}`. Event names are kept
//! byte-for-byte compatible with existing clients: `share-text` and
//! `file-upload` inbound, `text-shared` and `file-shared` outbound.

use serde::{Deserialize, Serialize};

use crate::envelope::{Envelope, FileEnvelope, TextEnvelope};
use crate::errors::RelayError;
use crate::ids::{ConnectionId, ShortId};

/// Frames sent by a client.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ClientEvent {
    /// Share a text snippet with everyone.
    ShareText {
        /// The snippet.
        content: String,
    },
    /// Re-broadcast a file record the client already holds.
    FileUpload {
        /// File name.
        name: String,
        /// MIME type.
        #[serde(rename = "type", default)]
        mime_type: String,
        /// Base64 payload.
        data: String,
        /// Client-reported size; ignored in favour of the decoded length.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        size: Option<u64>,
    },
}

/// Frames sent by the relay.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ServerEvent {
    /// Handshake sent once when the connection opens.
    Connected {
        /// Full connection id.
        id: ConnectionId,
        /// Short id used for `sender` attribution.
        #[serde(rename = "shortId")]
        short_id: ShortId,
        /// Registered connections, including this one.
        peers: usize,
    },
    /// A relayed text envelope.
    TextShared(TextEnvelope),
    /// A relayed file envelope.
    FileShared(FileEnvelope),
    /// Rejection of this client's own request.
    Error {
        /// Machine-readable code.
        code: String,
        /// Human-readable message.
        message: String,
    },
}

/// Code for frames that are not valid JSON or name an unknown event.
pub const INVALID_FRAME: &str = "INVALID_FRAME";

impl ServerEvent {
    /// Error frame for an unparseable inbound frame.
    pub fn invalid_frame(message: impl Into<String>) -> Self {
        Self::Error {
            code: INVALID_FRAME.to_owned(),
            message: message.into(),
        }
    }

    /// Serialize to a JSON text frame.
    pub fn to_frame(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

impl From<Envelope> for ServerEvent {
    fn from(envelope: Envelope) -> Self {
        match envelope {
            Envelope::Text(t) => Self::TextShared(t),
            Envelope::File(f) => Self::FileShared(f),
        }
    }
}

impl From<&RelayError> for ServerEvent {
    fn from(err: &RelayError) -> Self {
        Self::Error {
            code: err.code().to_owned(),
            message: err.to_string(),
        }
    }
}

/// Parse an inbound text frame.
pub fn parse_client_frame(frame: &str) -> serde_json::Result<ClientEvent> {
    serde_json::from_str(frame)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envelope::Stamper;
    use serde_json::{Value, json};

    #[test]
    fn parse_share_text() {
        let ev = parse_client_frame(r#"{"event":"share-text","data":{"content":"hi"}}"#).unwrap();
        assert_eq!(ev, ClientEvent::ShareText { content: "hi".into() });
    }

    #[test]
    fn parse_file_upload_without_size() {
        let ev = parse_client_frame(
            r#"{"event":"file-upload","data":{"name":"a.bin","type":"image/png","data":"YWJj"}}"#,
        )
        .unwrap();
        assert_eq!(
            ev,
            ClientEvent::FileUpload {
                name: "a.bin".into(),
                mime_type: "image/png".into(),
                data: "YWJj".into(),
                size: None,
            }
        );
    }

    #[test]
    fn unknown_event_is_error() {
        assert!(parse_client_frame(r#"{"event":"nope","data":{}}"#).is_err());
    }

    #[test]
    fn missing_content_is_error() {
        assert!(parse_client_frame(r#"{"event":"share-text","data":{}}"#).is_err());
    }

    #[test]
    fn text_shared_frame_shape() {
        let sender = ShortId::of(&ConnectionId::from("0123456789"));
        let env = Stamper::default().text("hello", &sender).unwrap();
        let frame = ServerEvent::from(Envelope::Text(env)).to_frame().unwrap();
        let v: Value = serde_json::from_str(&frame).unwrap();
        assert_eq!(v["event"], "text-shared");
        assert_eq!(v["data"]["type"], "text");
        assert_eq!(v["data"]["content"], "hello");
        assert_eq!(v["data"]["sender"], "01234567");
    }

    #[test]
    fn file_shared_frame_shape() {
        let env = Stamper::default().file("a.bin", "image/png", b"abc", None).unwrap();
        let frame = ServerEvent::from(Envelope::File(env)).to_frame().unwrap();
        let v: Value = serde_json::from_str(&frame).unwrap();
        assert_eq!(v["event"], "file-shared");
        assert_eq!(v["data"]["size"], 3);
        assert_eq!(v["data"]["data"], "YWJj");
    }

    #[test]
    fn connected_frame_shape() {
        let id = ConnectionId::from("0123456789");
        let ev = ServerEvent::Connected {
            short_id: ShortId::of(&id),
            id,
            peers: 3,
        };
        let v: Value = serde_json::to_value(&ev).unwrap();
        assert_eq!(
            v,
            json!({"event":"connected","data":{"id":"0123456789","shortId":"01234567","peers":3}})
        );
    }

    #[test]
    fn error_frame_from_relay_error() {
        let err = RelayError::validation("text content must not be empty");
        let v: Value = serde_json::to_value(ServerEvent::from(&err)).unwrap();
        assert_eq!(v["event"], "error");
        assert_eq!(v["data"]["code"], "VALIDATION_ERROR");
        assert_eq!(v["data"]["message"], "text content must not be empty");
    }

    #[test]
    fn server_frames_round_trip_for_clients() {
        let env = Stamper::default().file("a.bin", "", b"abc", None).unwrap();
        let ev = ServerEvent::FileShared(env);
        let back: ServerEvent = serde_json::from_str(&ev.to_frame().unwrap()).unwrap();
        assert_eq!(back, ev);
    }
}
