//! Wire types and telemetry codec for the LoRa sensor network
//!
//! The master station exchanges three logical message kinds with the
//! remote nodes:
//!
//! - `REQ:<node>`: poll request, master to one node
//! - JSON telemetry reply: node to master
//! - `BROADCAST:ALERT`: master to all nodes
//!
//! Physical framing (preambles, sync words, radio headers) is owned by the
//! channel layer; this crate only deals with payload bytes.

pub mod codec;
pub mod types;

pub use codec::{encode_broadcast_alert, encode_reply, encode_request, DecodeError, TelemetryCodec};
pub use types::{LinkQuality, NodeId, Position, Telemetry};
