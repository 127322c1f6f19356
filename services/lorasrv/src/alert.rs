//! Alert dispatcher
//!
//! A single pending flag, not a queue: however many alert-bearing replies
//! arrive between two scheduling passes, the drain step sends exactly one
//! `BROADCAST:ALERT`. The broadcast is never sent from inside the receive
//! path; it happens in its own step of the cooperative loop.

use tracing::{debug, info};

use crate::channel::ChannelLink;

/// One-shot broadcast scheduler
#[derive(Debug, Default)]
pub struct AlertDispatcher {
    pending: bool,
    broadcasts_sent: u64,
}

impl AlertDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule a broadcast. Idempotent: triggering while one is already
    /// pending queues nothing extra.
    pub fn trigger(&mut self) {
        if !self.pending {
            debug!("alert broadcast scheduled");
        }
        self.pending = true;
    }

    pub fn is_pending(&self) -> bool {
        self.pending
    }

    pub fn broadcasts_sent(&self) -> u64 {
        self.broadcasts_sent
    }

    /// Invoked once per scheduling pass. The flag is cleared only when the
    /// channel accepts the frame; a refused transmit leaves it set for the
    /// next pass.
    pub fn drain(&mut self, link: &mut dyn ChannelLink) {
        if !self.pending {
            return;
        }
        if link.try_send(lora_proto::encode_broadcast_alert()) {
            self.pending = false;
            self.broadcasts_sent += 1;
            info!("alert broadcast sent to all nodes");
        } else {
            debug!("alert broadcast deferred: transmit refused");
        }
    }
}
