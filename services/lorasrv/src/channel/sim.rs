//! Simulated radio channel
//!
//! In-process stand-in for the radio network so the service runs without
//! hardware: every configured node answers poll requests with synthesized
//! readings after a configurable latency, with a configurable loss rate.
//! Useful for demos and for exercising the full loop under packet loss.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use bytes::Bytes;
use rand::Rng;
use tracing::{debug, info};

use lora_proto::{
    codec::{BROADCAST_ALERT, REQUEST_PREFIX},
    encode_reply, LinkQuality, NodeId, Position, Telemetry,
};

use crate::error::Result;

use super::ChannelLink;

/// Fallback coordinates the simulated GPS fixes scatter around
const BASE_LAT: f64 = 12.9716;
const BASE_LON: f64 = 77.5946;

/// Behavior of the simulated network
#[derive(Debug, Clone)]
pub struct SimProfile {
    /// Probability that a poll request gets no reply
    pub drop_rate: f64,
    /// Probability that a reply carries the alert flag
    pub alert_rate: f64,
    /// Latency between request and reply
    pub reply_delay: Duration,
}

impl Default for SimProfile {
    fn default() -> Self {
        Self {
            drop_rate: 0.1,
            alert_rate: 0.02,
            reply_delay: Duration::from_millis(150),
        }
    }
}

/// Simulated half-duplex channel over the configured roster
pub struct SimulatedLink {
    nodes: Vec<NodeId>,
    profile: SimProfile,
    pending: VecDeque<(Instant, Bytes, LinkQuality)>,
}

impl SimulatedLink {
    pub fn new(nodes: Vec<NodeId>, profile: SimProfile) -> Self {
        Self {
            nodes,
            profile,
            pending: VecDeque::new(),
        }
    }

    fn synthesize_reply(&self, node: NodeId) -> (Bytes, LinkQuality) {
        let mut rng = rand::thread_rng();
        let telemetry = Telemetry {
            node,
            temperature: rng.gen_range(15.0..35.0),
            pressure: rng.gen_range(980.0..1030.0),
            altitude: rng.gen_range(800.0..950.0),
            battery: rng.gen_range(20.0..100.0),
            alert: rng.gen::<f64>() < self.profile.alert_rate,
            position: Some(Position {
                lat: BASE_LAT + rng.gen_range(-0.01..0.01),
                lon: BASE_LON + rng.gen_range(-0.01..0.01),
            }),
        };
        let quality = LinkQuality {
            rssi: Some(rng.gen_range(-120..-60)),
            snr: Some(rng.gen_range(-10.0..10.0)),
        };
        (encode_reply(&telemetry), quality)
    }
}

#[async_trait]
impl ChannelLink for SimulatedLink {
    async fn open(&mut self) -> Result<()> {
        info!(
            "simulated channel up: {} nodes, {:.0}% loss",
            self.nodes.len(),
            self.profile.drop_rate * 100.0
        );
        Ok(())
    }

    fn try_send(&mut self, frame: Bytes) -> bool {
        let text = String::from_utf8_lossy(&frame);
        if let Some(label) = text.strip_prefix(REQUEST_PREFIX) {
            let Some(node) = self.nodes.iter().find(|id| id.as_str() == label).cloned() else {
                debug!("simulated network ignoring request for unknown {label}");
                return true;
            };
            if rand::thread_rng().gen::<f64>() < self.profile.drop_rate {
                debug!("simulated network dropped request for {node}");
                return true;
            }
            let due = Instant::now() + self.profile.reply_delay;
            let (payload, quality) = self.synthesize_reply(node);
            self.pending.push_back((due, payload, quality));
        } else if text == BROADCAST_ALERT {
            debug!(
                "simulated broadcast delivered to {} nodes",
                self.nodes.len()
            );
        }
        true
    }

    fn try_receive(&mut self) -> Option<(Bytes, LinkQuality)> {
        let (due, _, _) = self.pending.front()?;
        if Instant::now() < *due {
            return None;
        }
        self.pending
            .pop_front()
            .map(|(_, payload, quality)| (payload, quality))
    }

    async fn shutdown(&mut self) -> Result<()> {
        self.pending.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lora_proto::TelemetryCodec;

    fn nodes() -> Vec<NodeId> {
        ["NODE1", "NODE2"].map(NodeId::from).to_vec()
    }

    fn lossless() -> SimProfile {
        SimProfile {
            drop_rate: 0.0,
            alert_rate: 0.0,
            reply_delay: Duration::ZERO,
        }
    }

    #[test]
    fn test_request_produces_decodable_reply() {
        let mut link = SimulatedLink::new(nodes(), lossless());
        assert!(link.try_send(lora_proto::encode_request(&NodeId::from("NODE1"))));

        let (payload, quality) = link.try_receive().expect("reply due immediately");
        let telemetry = TelemetryCodec::new(nodes()).decode(&payload).unwrap();
        assert_eq!(telemetry.node, "NODE1");
        assert!(!telemetry.alert);
        assert!(quality.rssi.is_some());
        assert!(quality.snr.is_some());
    }

    #[test]
    fn test_full_loss_yields_nothing() {
        let profile = SimProfile {
            drop_rate: 1.0,
            ..lossless()
        };
        let mut link = SimulatedLink::new(nodes(), profile);
        for _ in 0..10 {
            assert!(link.try_send(lora_proto::encode_request(&NodeId::from("NODE1"))));
        }
        assert!(link.try_receive().is_none());
    }

    #[test]
    fn test_alert_rate_one_always_alerts() {
        let profile = SimProfile {
            alert_rate: 1.0,
            ..lossless()
        };
        let mut link = SimulatedLink::new(nodes(), profile);
        link.try_send(lora_proto::encode_request(&NodeId::from("NODE2")));
        let (payload, _) = link.try_receive().unwrap();
        let telemetry = TelemetryCodec::new(nodes()).decode(&payload).unwrap();
        assert!(telemetry.alert);
    }

    #[test]
    fn test_unknown_target_and_broadcast_produce_no_reply() {
        let mut link = SimulatedLink::new(nodes(), lossless());
        assert!(link.try_send(lora_proto::encode_request(&NodeId::from("GHOST"))));
        assert!(link.try_send(lora_proto::encode_broadcast_alert()));
        assert!(link.try_receive().is_none());
    }

    #[test]
    fn test_reply_respects_latency() {
        let profile = SimProfile {
            reply_delay: Duration::from_secs(60),
            ..lossless()
        };
        let mut link = SimulatedLink::new(nodes(), profile);
        link.try_send(lora_proto::encode_request(&NodeId::from("NODE1")));
        assert!(link.try_receive().is_none());
    }
}
