//! Deterministic channel double for tests
//!
//! Records every outbound frame and replays scripted inbound frames.

use std::collections::VecDeque;

use async_trait::async_trait;
use bytes::Bytes;

use lora_proto::LinkQuality;

use crate::error::Result;

use super::ChannelLink;

/// Scripted channel: outbound frames are recorded, inbound frames are
/// whatever the test pushed.
#[derive(Debug, Default)]
pub struct MockLink {
    sent: Vec<Bytes>,
    inbound: VecDeque<(Bytes, LinkQuality)>,
    refuse: bool,
}

impl MockLink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `try_send` refuse every frame (jammed transmitter).
    pub fn refuse_sends(&mut self, refuse: bool) {
        self.refuse = refuse;
    }

    pub fn push_inbound(&mut self, frame: impl Into<Bytes>, quality: LinkQuality) {
        self.inbound.push_back((frame.into(), quality));
    }

    pub fn sent(&self) -> &[Bytes] {
        &self.sent
    }

    pub fn sent_text(&self) -> Vec<String> {
        self.sent
            .iter()
            .map(|frame| String::from_utf8_lossy(frame).into_owned())
            .collect()
    }
}

#[async_trait]
impl ChannelLink for MockLink {
    async fn open(&mut self) -> Result<()> {
        Ok(())
    }

    fn try_send(&mut self, frame: Bytes) -> bool {
        if self.refuse {
            return false;
        }
        self.sent.push(frame);
        true
    }

    fn try_receive(&mut self) -> Option<(Bytes, LinkQuality)> {
        self.inbound.pop_front()
    }

    async fn shutdown(&mut self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_records_and_replays() {
        let mut link = MockLink::new();
        assert!(link.try_send(Bytes::from_static(b"REQ:NODE1")));
        assert_eq!(link.sent_text(), ["REQ:NODE1"]);

        link.push_inbound(
            Bytes::from_static(b"payload"),
            LinkQuality {
                rssi: Some(-70),
                snr: None,
            },
        );
        let (frame, quality) = link.try_receive().unwrap();
        assert_eq!(&frame[..], b"payload");
        assert_eq!(quality.rssi, Some(-70));
        assert!(link.try_receive().is_none());
    }

    #[test]
    fn test_refusal() {
        let mut link = MockLink::new();
        link.refuse_sends(true);
        assert!(!link.try_send(Bytes::from_static(b"x")));
        assert!(link.sent().is_empty());
    }
}
