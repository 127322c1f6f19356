//! Telemetry codec
//!
//! Decodes inbound JSON telemetry payloads into [`Telemetry`] records and
//! serializes the outbound control messages. Decoding is validating: a
//! payload that is structurally broken, lacks a required field, or names a
//! node outside the configured roster is rejected without touching any
//! protocol state.

use bytes::Bytes;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::types::{NodeId, Position, Telemetry};

/// Prefix of a poll request payload: `REQ:<node>`
pub const REQUEST_PREFIX: &str = "REQ:";

/// Broadcast alert payload, no body
pub const BROADCAST_ALERT: &str = "BROADCAST:ALERT";

/// Decode failure taxonomy
///
/// All variants are recoverable: the offending payload is discarded and the
/// polling loop carries on.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// Payload is not a recognized message shape
    #[error("malformed payload: {0}")]
    MalformedPayload(String),

    /// A required key is absent or has the wrong type
    #[error("missing required field: {0}")]
    MissingField(&'static str),

    /// The reported identity is not in the node roster
    #[error("unknown node identity: {0}")]
    UnknownNode(String),
}

/// Validating decoder bound to the fixed node roster
#[derive(Debug, Clone)]
pub struct TelemetryCodec {
    known: Vec<NodeId>,
}

impl TelemetryCodec {
    pub fn new(known: impl IntoIterator<Item = NodeId>) -> Self {
        Self {
            known: known.into_iter().collect(),
        }
    }

    /// Decode one telemetry reply payload.
    pub fn decode(&self, frame: &[u8]) -> Result<Telemetry, DecodeError> {
        let text = std::str::from_utf8(frame)
            .map_err(|_| DecodeError::MalformedPayload("payload is not valid UTF-8".to_string()))?;

        let value: Value = serde_json::from_str(text.trim())
            .map_err(|e| DecodeError::MalformedPayload(e.to_string()))?;

        let obj = value
            .as_object()
            .ok_or_else(|| DecodeError::MalformedPayload("payload is not a JSON object".to_string()))?;

        let label = obj
            .get("node")
            .and_then(Value::as_str)
            .ok_or(DecodeError::MissingField("node"))?;

        let node = self
            .known
            .iter()
            .find(|id| id.as_str() == label)
            .cloned()
            .ok_or_else(|| DecodeError::UnknownNode(label.to_string()))?;

        let telemetry = Telemetry {
            node,
            temperature: required_f64(obj, "temp")?,
            pressure: required_f64(obj, "pres")?,
            altitude: required_f64(obj, "alt")?,
            battery: required_f64(obj, "bat")?,
            alert: alert_flag(obj)?,
            position: position(obj),
        };

        Ok(telemetry)
    }
}

fn required_f64(obj: &Map<String, Value>, key: &'static str) -> Result<f64, DecodeError> {
    obj.get(key)
        .and_then(Value::as_f64)
        .ok_or(DecodeError::MissingField(key))
}

/// The alert flag is 0/1 on the wire; some node firmware revisions emit a
/// JSON boolean instead, so both encodings are accepted.
fn alert_flag(obj: &Map<String, Value>) -> Result<bool, DecodeError> {
    match obj.get("alert") {
        None => Err(DecodeError::MissingField("alert")),
        Some(Value::Bool(flag)) => Ok(*flag),
        Some(value) => match value.as_i64() {
            Some(0) => Ok(false),
            Some(1) => Ok(true),
            _ => Err(DecodeError::MalformedPayload(format!(
                "alert flag must be 0 or 1, got {value}"
            ))),
        },
    }
}

/// A position is reported only when both coordinates are present.
fn position(obj: &Map<String, Value>) -> Option<Position> {
    let lat = obj.get("lat").and_then(Value::as_f64)?;
    let lon = obj.get("lon").and_then(Value::as_f64)?;
    Some(Position { lat, lon })
}

/// Format a poll request addressed to one node.
pub fn encode_request(node: &NodeId) -> Bytes {
    Bytes::from(format!("{REQUEST_PREFIX}{node}"))
}

/// Format the alert broadcast sent to all nodes.
pub fn encode_broadcast_alert() -> Bytes {
    Bytes::from_static(BROADCAST_ALERT.as_bytes())
}

/// Format a telemetry reply the way node firmware does.
///
/// Used by the channel simulator and by tests; the master itself never
/// sends telemetry.
pub fn encode_reply(telemetry: &Telemetry) -> Bytes {
    let mut obj = serde_json::json!({
        "node": telemetry.node.as_str(),
        "temp": telemetry.temperature,
        "pres": telemetry.pressure,
        "alt": telemetry.altitude,
        "bat": telemetry.battery,
        "alert": i32::from(telemetry.alert),
    });
    if let Some(pos) = &telemetry.position {
        obj["lat"] = pos.lat.into();
        obj["lon"] = pos.lon.into();
    }
    Bytes::from(obj.to_string())
}
