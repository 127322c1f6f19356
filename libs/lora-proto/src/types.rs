//! Telemetry data types

use std::fmt;
use std::sync::Arc;

/// Identity of a remote sensor node (e.g. "NODE1")
///
/// Cheap to clone; the label is immutable for the process lifetime.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NodeId(Arc<str>);

impl NodeId {
    pub fn new(label: impl AsRef<str>) -> Self {
        Self(Arc::from(label.as_ref()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NodeId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for NodeId {
    fn from(s: String) -> Self {
        Self(Arc::from(s.as_str()))
    }
}

impl PartialEq<&str> for NodeId {
    fn eq(&self, other: &&str) -> bool {
        self.as_str() == *other
    }
}

/// GPS position reported by a node
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Position {
    /// Latitude in degrees
    pub lat: f64,
    /// Longitude in degrees
    pub lon: f64,
}

/// One decoded telemetry reply
///
/// Link quality is NOT part of this record: it is attached by the channel
/// adapter at receipt time, never parsed from the payload.
#[derive(Debug, Clone, PartialEq)]
pub struct Telemetry {
    /// Reporting node
    pub node: NodeId,
    /// Temperature in °C
    pub temperature: f64,
    /// Barometric pressure in hPa
    pub pressure: f64,
    /// Altitude in metres
    pub altitude: f64,
    /// Battery level in percent
    pub battery: f64,
    /// One-shot alert flag (wire encoding is 0/1)
    pub alert: bool,
    /// GPS fix, when the node has one
    pub position: Option<Position>,
}

/// Reception quality metrics attached by the channel adapter
///
/// Values describe link condition, not payload content. Either field may
/// be absent when the transport does not report it.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LinkQuality {
    /// Received signal strength in dBm
    pub rssi: Option<i16>,
    /// Signal-to-noise ratio in dB
    pub snr: Option<f32>,
}
