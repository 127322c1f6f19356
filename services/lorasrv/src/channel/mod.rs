//! Radio channel layer
//!
//! The poll engine consumes the [`ChannelLink`] seam and never blocks on
//! it: `try_send` refuses rather than waits, `try_receive` polls rather
//! than awaits. Delivery is never assumed from a `try_send` acceptance;
//! the only confirmation is a matching reply within the timeout window.

pub mod mock;
pub mod serial;
pub mod sim;

use async_trait::async_trait;
use bytes::Bytes;

use lora_proto::LinkQuality;

use crate::error::Result;

pub use mock::MockLink;
pub use serial::SerialModemLink;
pub use sim::{SimProfile, SimulatedLink};

/// Half-duplex payload transport
#[async_trait]
pub trait ChannelLink: Send {
    /// Bring the link up (open ports, spawn pump tasks).
    async fn open(&mut self) -> Result<()>;

    /// Hand one payload to the transmitter. Returns false when the
    /// transmit could not start; never blocks waiting for an ack.
    fn try_send(&mut self, frame: Bytes) -> bool;

    /// Non-blocking poll for inbound data. At most one buffered message
    /// per call, with whatever quality metrics the transport reported.
    fn try_receive(&mut self) -> Option<(Bytes, LinkQuality)>;

    /// Tear the link down.
    async fn shutdown(&mut self) -> Result<()>;
}
