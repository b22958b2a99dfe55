//! Inbound frame dispatch: parses a client frame and routes it to the relay.

use beam_core::wire::{ClientEvent, ServerEvent, parse_client_frame};
use beam_relay::{Connection, Relay};
use tracing::{debug, warn};

/// Handle one inbound text frame from `origin`.
///
/// Returns the `error` frame to send back to the origin when the frame is
/// unparseable or the relay rejects it. Accepted submissions have already
/// been broadcast (origin included) when this returns `None`.
pub fn handle_frame(relay: &Relay, origin: &Connection, frame: &str) -> Option<ServerEvent> {
    let event = match parse_client_frame(frame) {
        Ok(event) => event,
        Err(e) => {
            warn!(conn_id = %origin.id(), error = %e, "invalid frame received");
            return Some(ServerEvent::invalid_frame(format!("invalid frame: {e}")));
        }
    };

    let result = match event {
        ClientEvent::ShareText { content } => relay.submit_text(origin, &content),
        ClientEvent::FileUpload {
            name,
            mime_type,
            data,
            size,
        } => {
            let result = relay.submit_encoded_file(origin, &name, &mime_type, &data);
            if let (Ok(broadcast), Some(claimed)) = (&result, size) {
                let actual = broadcast.envelope.as_file().map_or(0, |f| f.size_bytes());
                if usize::try_from(claimed).ok() != Some(actual) {
                    debug!(claimed, actual, "client-reported file size ignored");
                }
            }
            result
        }
    };

    match result {
        Ok(broadcast) => {
            debug!(
                conn_id = %origin.id(),
                envelope_id = %broadcast.envelope.id(),
                "submission accepted"
            );
            None
        }
        Err(e) => Some(ServerEvent::from(&e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use beam_core::wire::INVALID_FRAME;
    use serde_json::{Value, json};
    use std::sync::Arc;
    use tokio::sync::mpsc;

    fn open(relay: &Relay) -> (Arc<Connection>, mpsc::Receiver<Arc<str>>) {
        let (conn, mut rx) = relay.open();
        let _handshake = rx.try_recv().unwrap();
        (conn, rx)
    }

    fn next(rx: &mut mpsc::Receiver<Arc<str>>) -> Value {
        serde_json::from_str(&rx.try_recv().unwrap()).unwrap()
    }

    #[test]
    fn share_text_broadcasts() {
        let relay = Relay::default();
        let (origin, mut rx) = open(&relay);
        let (_other, mut rx_other) = open(&relay);
        let frame = json!({"event": "share-text", "data": {"content": "hi"}}).to_string();

        assert!(handle_frame(&relay, &origin, &frame).is_none());
        assert_eq!(next(&mut rx)["data"]["content"], "hi");
        assert_eq!(next(&mut rx_other)["data"]["sender"], origin.short_id().as_str());
    }

    #[test]
    fn file_upload_recomputes_size() {
        let relay = Relay::default();
        let (origin, mut rx) = open(&relay);
        let frame = json!({
            "event": "file-upload",
            "data": {"name": "a.txt", "type": "text/plain", "data": "YWJj", "size": 999}
        })
        .to_string();

        assert!(handle_frame(&relay, &origin, &frame).is_none());
        let shared = next(&mut rx);
        assert_eq!(shared["event"], "file-shared");
        assert_eq!(shared["data"]["size"], 3);
        assert_eq!(shared["data"]["sender"], origin.short_id().as_str());
    }

    #[test]
    fn empty_text_returns_error_to_origin_only() {
        let relay = Relay::default();
        let (origin, mut rx) = open(&relay);
        let (_other, mut rx_other) = open(&relay);
        let frame = json!({"event": "share-text", "data": {"content": "  "}}).to_string();

        let reply = handle_frame(&relay, &origin, &frame).unwrap();
        assert_matches!(reply, ServerEvent::Error { ref code, .. } if code == "VALIDATION_ERROR");
        assert!(rx.try_recv().is_err());
        assert!(rx_other.try_recv().is_err());
    }

    #[test]
    fn malformed_base64_is_codec_error() {
        let relay = Relay::default();
        let (origin, _rx) = open(&relay);
        let frame = json!({
            "event": "file-upload",
            "data": {"name": "a.bin", "type": "", "data": "%%%"}
        })
        .to_string();
        let reply = handle_frame(&relay, &origin, &frame).unwrap();
        assert_matches!(reply, ServerEvent::Error { ref code, .. } if code == "CODEC_ERROR");
    }

    #[test]
    fn garbage_is_invalid_frame() {
        let relay = Relay::default();
        let (origin, _rx) = open(&relay);
        for frame in ["not json", r#"{"event":"launch-missiles","data":{}}"#] {
            let reply = handle_frame(&relay, &origin, frame).unwrap();
            assert_matches!(reply, ServerEvent::Error { ref code, .. } if code == INVALID_FRAME);
        }
    }
}
