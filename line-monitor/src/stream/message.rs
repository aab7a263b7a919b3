//! Push-channel message envelope and decoding.
//!
//! Every frame is one JSON record `{ type, payload, timestamp }`. The `type`
//! discriminant selects how the payload is read; unknown types decode fine
//! and are left for the router to ignore.

use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::domain::{ExitEvent, LineSnapshot, LinkStatus, StationUpdate};

use super::error::StreamError;

/// Raw wire envelope.
#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(rename = "type")]
    kind: String,

    #[serde(default)]
    payload: serde_json::Value,

    timestamp: DateTime<Utc>,
}

/// Decoded payload, by message type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageKind {
    /// Whole-line state.
    LineState(LineSnapshot),
    /// One station changed.
    StationUpdate(StationUpdate),
    /// A carrier left the line.
    CarrierExit(ExitEvent),
    /// Heartbeat with upstream link health.
    Status(LinkStatus),
    /// A type this monitor does not handle.
    Unknown(String),
}

/// One decoded push message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamMessage {
    pub kind: MessageKind,

    /// Envelope timestamp.
    pub timestamp: DateTime<Utc>,
}

impl StreamMessage {
    /// Decode a text frame.
    pub fn decode(text: &str) -> Result<Self, StreamError> {
        let envelope: Envelope = serde_json::from_str(text).map_err(decode_error)?;

        let kind = match envelope.kind.as_str() {
            "line_state" | "snapshot" => {
                MessageKind::LineState(serde_json::from_value(envelope.payload).map_err(decode_error)?)
            }
            "station_update" => MessageKind::StationUpdate(
                serde_json::from_value(envelope.payload).map_err(decode_error)?,
            ),
            "carrier_exit" | "hanger_exit" => MessageKind::CarrierExit(
                serde_json::from_value(envelope.payload).map_err(decode_error)?,
            ),
            "status" | "heartbeat" => {
                MessageKind::Status(serde_json::from_value(envelope.payload).map_err(decode_error)?)
            }
            _ => MessageKind::Unknown(envelope.kind),
        };

        Ok(Self {
            kind,
            timestamp: envelope.timestamp,
        })
    }

    /// Wire name of the message type, for logging.
    pub fn type_name(&self) -> &str {
        match &self.kind {
            MessageKind::LineState(_) => "line_state",
            MessageKind::StationUpdate(_) => "station_update",
            MessageKind::CarrierExit(_) => "carrier_exit",
            MessageKind::Status(_) => "status",
            MessageKind::Unknown(name) => name,
        }
    }
}

fn decode_error(err: serde_json::Error) -> StreamError {
    StreamError::Decode {
        message: err.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{CarrierId, StationNumber};

    #[test]
    fn decode_line_state() {
        let frame = r#"{
            "type": "line_state",
            "payload": {
                "timestamp": "2024-03-15T10:00:00Z",
                "linkHealthy": true,
                "stations": [{"stationNumber": 30, "occupied": true, "carrierId": 4}]
            },
            "timestamp": "2024-03-15T10:00:01Z"
        }"#;
        let msg = StreamMessage::decode(frame).unwrap();

        let MessageKind::LineState(snapshot) = &msg.kind else {
            panic!("expected line state, got {:?}", msg.kind);
        };
        assert_eq!(snapshot.stations.len(), 1);
        assert_eq!(snapshot.stations[0].carrier(), Some(CarrierId::new(4)));
        assert_eq!(msg.type_name(), "line_state");
    }

    #[test]
    fn decode_exit_alias() {
        let frame = r#"{
            "type": "hanger_exit",
            "payload": {"carrierId": 12, "stationNumber": 40},
            "timestamp": "2024-03-15T10:00:01Z"
        }"#;
        let msg = StreamMessage::decode(frame).unwrap();

        assert_eq!(
            msg.kind,
            MessageKind::CarrierExit(ExitEvent {
                carrier_id: CarrierId::new(12),
                station_number: Some(StationNumber::new(40)),
                exited_at: None,
            })
        );
    }

    #[test]
    fn decode_heartbeat() {
        let frame = r#"{"type": "heartbeat", "payload": {"linkHealthy": false}, "timestamp": "2024-03-15T10:00:01Z"}"#;
        let msg = StreamMessage::decode(frame).unwrap();

        assert_eq!(msg.kind, MessageKind::Status(LinkStatus { link_healthy: false }));
    }

    #[test]
    fn unknown_type_is_not_an_error() {
        let frame = r#"{"type": "profile_changed", "payload": {"id": 1}, "timestamp": "2024-03-15T10:00:01Z"}"#;
        let msg = StreamMessage::decode(frame).unwrap();

        assert_eq!(msg.kind, MessageKind::Unknown("profile_changed".into()));
        assert_eq!(msg.type_name(), "profile_changed");
    }

    #[test]
    fn unknown_type_without_payload() {
        let frame = r#"{"type": "ping", "timestamp": "2024-03-15T10:00:01Z"}"#;
        assert!(StreamMessage::decode(frame).is_ok());
    }

    #[test]
    fn malformed_frames_are_decode_errors() {
        for frame in [
            "",
            "not json",
            r#"{"payload": {}, "timestamp": "2024-03-15T10:00:01Z"}"#,
            r#"{"type": "status", "payload": {"linkHealthy": true}}"#,
            r#"{"type": "status", "payload": {"linkHealthy": true}, "timestamp": "yesterday"}"#,
            r#"{"type": "line_state", "payload": {"stations": "none"}, "timestamp": "2024-03-15T10:00:01Z"}"#,
        ] {
            assert!(
                matches!(StreamMessage::decode(frame), Err(StreamError::Decode { .. })),
                "frame should not decode: {frame:?}"
            );
        }
    }
}
