//! Parsing of text frames received from the host event bus.
//!
//! Frames are JSON envelopes `{"type": ..., "data": ...}`. Only the review
//! request and queue status messages matter here; everything else is ignored.

use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::models::{ReviewBatch, ReviewRequest};

pub const REVIEW_REQUEST_TYPE: &str = "nf_preview_request";
pub const STATUS_TYPE: &str = "status";

/// Something the UI thread needs to react to.
#[derive(Debug, Clone, PartialEq)]
pub enum HostEvent {
    ReviewRequest(ReviewBatch),
    /// The host reports queued work; an open review must give way.
    QueueStarted,
    QueueIdle,
    Connected,
    Disconnected,
}

#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    data: Value,
}

/// Turn one text frame into an event, or `None` if it is irrelevant or malformed.
pub fn parse_frame(text: &str) -> Option<HostEvent> {
    let envelope: Envelope = match serde_json::from_str(text) {
        Ok(envelope) => envelope,
        Err(err) => {
            warn!(error = ?err, "Ignoring malformed host frame");
            return None;
        }
    };

    match envelope.kind.as_str() {
        REVIEW_REQUEST_TYPE => match serde_json::from_value::<ReviewRequest>(envelope.data) {
            Ok(request) => Some(HostEvent::ReviewRequest(request.into())),
            Err(err) => {
                warn!(error = ?err, "Ignoring malformed review request");
                None
            }
        },
        STATUS_TYPE => {
            if queue_remaining(&envelope.data) > 0 {
                Some(HostEvent::QueueStarted)
            } else {
                Some(HostEvent::QueueIdle)
            }
        }
        other => {
            debug!("ignoring host message of type {:?}", other);
            None
        }
    }
}

fn queue_remaining(data: &Value) -> u64 {
    data.pointer("/status/exec_info/queue_remaining")
        .and_then(Value::as_u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ImageKind, OpaqueId};

    #[test]
    fn review_request_becomes_batch() {
        let frame = r#"{
            "type": "nf_preview_request",
            "data": {
                "review_id": "abc",
                "unique_id": "17",
                "images": [
                    {"filename": "NFPreview_00001_.png", "subfolder": "", "type": "temp"},
                    {"filename": "NFPreview_00002_.png", "type": "output"}
                ],
                "count": 2,
                "timeout": 45
            }
        }"#;
        let Some(HostEvent::ReviewRequest(batch)) = parse_frame(frame) else {
            panic!("expected review request");
        };
        assert_eq!(batch.review_id, OpaqueId::new("abc"));
        assert_eq!(batch.len(), 2);
        assert_eq!(batch.images[1].kind, ImageKind::Output);
        assert_eq!(batch.timeout_secs, 45);
    }

    #[test]
    fn status_with_remaining_work_is_queue_start() {
        let busy = r#"{"type":"status","data":{"status":{"exec_info":{"queue_remaining":2}},"sid":"x"}}"#;
        let idle = r#"{"type":"status","data":{"status":{"exec_info":{"queue_remaining":0}}}}"#;
        assert_eq!(parse_frame(busy), Some(HostEvent::QueueStarted));
        assert_eq!(parse_frame(idle), Some(HostEvent::QueueIdle));
        assert_eq!(
            parse_frame(r#"{"type":"status","data":{}}"#),
            Some(HostEvent::QueueIdle)
        );
    }

    #[test]
    fn unrelated_and_malformed_frames_are_ignored() {
        assert_eq!(parse_frame(r#"{"type":"progress","data":{"value":1}}"#), None);
        assert_eq!(parse_frame("not json"), None);
        assert_eq!(parse_frame(r#"{"data":{}}"#), None);
    }

    #[test]
    fn request_with_unknown_image_type_is_dropped() {
        let frame = r#"{"type":"nf_preview_request","data":{"review_id":"a","unique_id":"b",
            "images":[{"filename":"x.png","type":"cache"}]}}"#;
        assert_eq!(parse_frame(frame), None);
    }
}
