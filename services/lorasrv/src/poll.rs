//! Poll engine
//!
//! Round-robin polling state machine for the half-duplex radio channel.
//! One request is outstanding at any time; the cursor advances only on a
//! matching reply or on retry exhaustion, so every node gets a bounded,
//! fair share of airtime and a dead node cannot starve the roster.
//!
//! The engine is synchronous and deterministic: all waiting is expressed
//! as comparisons against the `now` instant handed to [`PollEngine::tick`],
//! which the runtime samples once per pass.

use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use lora_proto::{LinkQuality, NodeId, TelemetryCodec};

use crate::alert::AlertDispatcher;
use crate::channel::ChannelLink;
use crate::registry::NodeRegistry;
use crate::sink::Sink;

/// Polling policy, fixed at startup
#[derive(Debug, Clone)]
pub struct PollPolicy {
    /// Minimum gap between two poll starts
    pub poll_interval: Duration,
    /// Maximum wait for a reply before a timeout transition
    pub response_timeout: Duration,
    /// Timeout budget per request; the Nth timeout gives up instead of
    /// re-sending, so a node sees at most `max_retries` transmissions per
    /// cycle
    pub max_retries: u32,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(5000),
            response_timeout: Duration::from_millis(1500),
            max_retries: 2,
        }
    }
}

/// Counters for everything the engine does
#[derive(Debug, Default, Clone)]
pub struct PollStats {
    /// Initial requests transmitted
    pub requests_sent: u64,
    /// Re-sends after a timeout
    pub retries_sent: u64,
    /// Replies that resolved an outstanding request
    pub replies_accepted: u64,
    /// Replies for nodes that were not awaiting (late or duplicate)
    pub late_replies: u64,
    /// Retry exhaustions, one per `on_timeout` event
    pub timeouts: u64,
    /// Frames discarded by the codec
    pub decode_errors: u64,
    /// Transmissions the channel refused to start
    pub send_refusals: u64,
}

impl PollStats {
    pub fn log_summary(&self) {
        info!(
            "Poll statistics: {} requests, {} retries, {} replies ({} late), {} nodes timed out, {} decode errors, {} refused sends",
            self.requests_sent,
            self.retries_sent,
            self.replies_accepted,
            self.late_replies,
            self.timeouts,
            self.decode_errors,
            self.send_refusals,
        );
    }
}

/// Master-side polling state machine
pub struct PollEngine {
    codec: TelemetryCodec,
    registry: NodeRegistry,
    policy: PollPolicy,
    alerts: AlertDispatcher,
    last_poll_started: Option<Instant>,
    stats: PollStats,
}

impl PollEngine {
    pub fn new(nodes: Vec<NodeId>, policy: PollPolicy) -> Self {
        Self {
            codec: TelemetryCodec::new(nodes.iter().cloned()),
            registry: NodeRegistry::new(nodes),
            policy,
            alerts: AlertDispatcher::new(),
            last_poll_started: None,
            stats: PollStats::default(),
        }
    }

    /// One scheduling pass: start the next poll when it is due, then apply
    /// timeout transitions to the outstanding request.
    pub fn tick(&mut self, now: Instant, link: &mut dyn ChannelLink, sink: &mut dyn Sink) {
        if self.registry.is_empty() {
            return;
        }
        self.maybe_poll_next(now, link);
        self.check_timeouts(now, link, sink);
    }

    /// Handle one received frame.
    ///
    /// Decode failures stop here: logged, counted, and the state machine
    /// never sees them. A reply for a node that is not awaiting (late or
    /// duplicate) is still delivered to the sink but is a protocol no-op:
    /// it does not re-arm the slot and it does not move the cursor again.
    pub fn on_frame(&mut self, frame: &[u8], quality: LinkQuality, sink: &mut dyn Sink) {
        let telemetry = match self.codec.decode(frame) {
            Ok(telemetry) => telemetry,
            Err(e) => {
                self.stats.decode_errors += 1;
                debug!("discarding inbound frame: {e}");
                return;
            },
        };

        let node = telemetry.node.clone();
        if let Some(slot) = self.registry.slot_mut(&node) {
            if slot.awaiting {
                slot.awaiting = false;
                slot.retry_count = 0;
                self.registry.advance();
                self.stats.replies_accepted += 1;
                debug!("reply from {node} accepted, cursor advanced");
            } else {
                self.stats.late_replies += 1;
                debug!("late reply from {node}, accepted as data only");
            }
        }

        sink.on_telemetry(&telemetry, quality);

        if telemetry.alert {
            warn!("node {node} reported an alert");
            self.alerts.trigger();
        }
    }

    /// Send the pending alert broadcast, if any. Invoked once per pass.
    pub fn drain_alerts(&mut self, link: &mut dyn ChannelLink) {
        self.alerts.drain(link);
    }

    pub fn stats(&self) -> &PollStats {
        &self.stats
    }

    pub fn alerts(&self) -> &AlertDispatcher {
        &self.alerts
    }

    pub fn registry(&self) -> &NodeRegistry {
        &self.registry
    }

    fn maybe_poll_next(&mut self, now: Instant, link: &mut dyn ChannelLink) {
        // Half-duplex: never send while a request is outstanding.
        if self.registry.any_awaiting() {
            return;
        }
        if let Some(started) = self.last_poll_started {
            if now.duration_since(started) < self.policy.poll_interval {
                return;
            }
        }

        let node = self.registry.current().id.clone();
        if link.try_send(lora_proto::encode_request(&node)) {
            let slot = self.registry.current_mut();
            slot.awaiting = true;
            slot.last_send = Some(now);
            self.last_poll_started = Some(now);
            self.stats.requests_sent += 1;
            debug!("polling {node}");
        } else {
            // Nothing was transmitted, so nothing is stamped; the next
            // pass re-attempts the same node.
            self.stats.send_refusals += 1;
            debug!("transmit refused for {node}, re-attempting next pass");
        }
    }

    fn check_timeouts(&mut self, now: Instant, link: &mut dyn ChannelLink, sink: &mut dyn Sink) {
        for idx in 0..self.registry.len() {
            let (expired, node) = {
                let slot = &self.registry.slots()[idx];
                let expired = slot.awaiting
                    && slot
                        .last_send
                        .is_some_and(|sent| now.duration_since(sent) > self.policy.response_timeout);
                (expired, slot.id.clone())
            };
            if !expired {
                continue;
            }

            if self.registry.slots()[idx].retry_count + 1 < self.policy.max_retries {
                // Retry: the slot stays armed and the timeout window
                // restarts. The timestamp is refreshed even when the
                // transmit is refused so the retry budget still bounds the
                // total attempts for this cycle.
                {
                    let slot = &mut self.registry.slots_mut()[idx];
                    slot.retry_count += 1;
                    slot.last_send = Some(now);
                }
                let retry = self.registry.slots()[idx].retry_count;
                if link.try_send(lora_proto::encode_request(&node)) {
                    self.stats.retries_sent += 1;
                    debug!(
                        "no reply from {node}, retry {retry}/{}",
                        self.policy.max_retries
                    );
                } else {
                    self.stats.send_refusals += 1;
                    debug!("retry transmit refused for {node}");
                }
            } else {
                // Exhausted: back to idle, hand the turn to the next node.
                // State self-heals on this node's next successful reply.
                {
                    let slot = &mut self.registry.slots_mut()[idx];
                    slot.awaiting = false;
                    slot.retry_count = 0;
                }
                self.registry.advance();
                self.stats.timeouts += 1;
                warn!(
                    "node {node} unreachable after {} transmissions",
                    self.policy.max_retries
                );
                sink.on_timeout(&node);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::mock::MockLink;
    use crate::sink::{RecordingSink, SinkEvent};
    use lora_proto::{encode_reply, Telemetry};

    fn policy() -> PollPolicy {
        PollPolicy {
            poll_interval: Duration::from_millis(5000),
            response_timeout: Duration::from_millis(1500),
            max_retries: 2,
        }
    }

    fn engine() -> PollEngine {
        PollEngine::new(
            ["NODE1", "NODE2", "NODE3"].map(NodeId::from).to_vec(),
            policy(),
        )
    }

    fn reply(node: &str, alert: bool) -> Vec<u8> {
        let telemetry = Telemetry {
            node: NodeId::from(node),
            temperature: 22.0,
            pressure: 1011.0,
            altitude: 840.0,
            battery: 76.0,
            alert,
            position: None,
        };
        encode_reply(&telemetry).to_vec()
    }

    #[test]
    fn test_round_robin_order() {
        let mut engine = engine();
        let mut link = MockLink::new();
        let mut sink = RecordingSink::new();
        let t0 = Instant::now();

        for step in 0..4u64 {
            let now = t0 + Duration::from_millis(step * 5000);
            engine.tick(now, &mut link, &mut sink);
            let polled = ["NODE1", "NODE2", "NODE3", "NODE1"][step as usize];
            engine.on_frame(&reply(polled, false), LinkQuality::default(), &mut sink);
        }

        assert_eq!(
            link.sent_text(),
            ["REQ:NODE1", "REQ:NODE2", "REQ:NODE3", "REQ:NODE1"]
        );
        assert_eq!(engine.stats().replies_accepted, 4);
        // a full cycle completed before NODE1 was revisited
        assert_eq!(engine.registry().cursor(), 1);
    }

    #[test]
    fn test_silent_node_retry_then_unreachable() {
        // 3 nodes, max_retries = 2, timeout = 1500 ms, the node at the
        // cursor never replies. Two transmissions total, one timeout
        // event, cursor advances.
        let mut engine = engine();
        let mut link = MockLink::new();
        let mut sink = RecordingSink::new();
        let t0 = Instant::now();

        engine.tick(t0, &mut link, &mut sink);
        assert_eq!(link.sent_text(), ["REQ:NODE1"]);

        // first timeout: one retry is sent
        engine.tick(t0 + Duration::from_millis(1600), &mut link, &mut sink);
        assert_eq!(link.sent_text(), ["REQ:NODE1", "REQ:NODE1"]);
        assert_eq!(engine.registry().slots()[0].retry_count, 1);
        assert!(sink.timeout_nodes().is_empty());

        // second timeout: budget exhausted, no third transmission
        engine.tick(t0 + Duration::from_millis(3200), &mut link, &mut sink);
        assert_eq!(link.sent().len(), 2);
        assert_eq!(sink.timeout_nodes(), ["NODE1"]);
        assert_eq!(engine.stats().timeouts, 1);
        assert_eq!(engine.registry().cursor(), 1);
        assert!(!engine.registry().slots()[0].awaiting);
        assert_eq!(engine.registry().slots()[0].retry_count, 0);

        // next due poll goes to NODE2
        engine.tick(t0 + Duration::from_millis(5100), &mut link, &mut sink);
        assert_eq!(link.sent_text().last().unwrap(), "REQ:NODE2");
    }

    #[test]
    fn test_reply_resolves_and_advances() {
        let mut engine = engine();
        let mut link = MockLink::new();
        let mut sink = RecordingSink::new();
        let t0 = Instant::now();

        engine.tick(t0, &mut link, &mut sink);
        let quality = LinkQuality {
            rssi: Some(-88),
            snr: Some(6.5),
        };
        engine.on_frame(&reply("NODE1", false), quality, &mut sink);

        assert_eq!(engine.registry().cursor(), 1);
        assert!(!engine.registry().slots()[0].awaiting);
        assert_eq!(
            sink.events(),
            [SinkEvent::Telemetry {
                node: "NODE1".to_string(),
                alert: false,
                rssi: Some(-88),
            }]
        );
    }

    #[test]
    fn test_late_reply_is_data_only() {
        let mut engine = engine();
        let mut link = MockLink::new();
        let mut sink = RecordingSink::new();
        let t0 = Instant::now();

        // exhaust NODE1
        engine.tick(t0, &mut link, &mut sink);
        engine.tick(t0 + Duration::from_millis(1600), &mut link, &mut sink);
        engine.tick(t0 + Duration::from_millis(3200), &mut link, &mut sink);
        assert_eq!(engine.registry().cursor(), 1);

        // the original packet belatedly arrives
        engine.on_frame(&reply("NODE1", false), LinkQuality::default(), &mut sink);

        // delivered to the sink, but no state replay
        assert_eq!(sink.telemetry_nodes(), ["NODE1"]);
        assert_eq!(engine.registry().cursor(), 1);
        assert!(!engine.registry().slots()[0].awaiting);
        assert_eq!(engine.stats().late_replies, 1);
        assert_eq!(engine.stats().replies_accepted, 0);
    }

    #[test]
    fn test_alert_replies_collapse_into_one_broadcast() {
        let mut engine = engine();
        let mut link = MockLink::new();
        let mut sink = RecordingSink::new();
        let t0 = Instant::now();

        engine.tick(t0, &mut link, &mut sink);
        engine.on_frame(&reply("NODE1", true), LinkQuality::default(), &mut sink);
        // a late duplicate also carrying the alert bit, same pass
        engine.on_frame(&reply("NODE1", true), LinkQuality::default(), &mut sink);

        engine.drain_alerts(&mut link);
        engine.drain_alerts(&mut link);

        let broadcasts = link
            .sent_text()
            .iter()
            .filter(|frame| *frame == "BROADCAST:ALERT")
            .count();
        assert_eq!(broadcasts, 1);
        assert!(!engine.alerts().is_pending());
        assert_eq!(engine.alerts().broadcasts_sent(), 1);
    }

    #[test]
    fn test_decode_error_leaves_state_untouched() {
        let mut engine = engine();
        let mut link = MockLink::new();
        let mut sink = RecordingSink::new();
        let t0 = Instant::now();

        engine.tick(t0, &mut link, &mut sink);
        let cursor_before = engine.registry().cursor();

        engine.on_frame(br#"{"temp":1}"#, LinkQuality::default(), &mut sink);

        assert!(sink.events().is_empty());
        assert_eq!(engine.registry().cursor(), cursor_before);
        assert!(engine.registry().slots()[0].awaiting);
        assert_eq!(engine.stats().decode_errors, 1);
    }

    #[test]
    fn test_unknown_node_reply_is_discarded() {
        let mut engine = engine();
        let mut link = MockLink::new();
        let mut sink = RecordingSink::new();
        let t0 = Instant::now();

        engine.tick(t0, &mut link, &mut sink);
        engine.on_frame(
            br#"{"node":"GHOST","temp":20,"pres":1000,"alt":10,"bat":50,"alert":1}"#,
            LinkQuality::default(),
            &mut sink,
        );

        assert!(sink.events().is_empty());
        assert!(!engine.alerts().is_pending());
        assert!(engine.registry().slots()[0].awaiting);
        assert_eq!(engine.stats().decode_errors, 1);
    }

    #[test]
    fn test_refused_send_leaves_node_idle() {
        let mut engine = engine();
        let mut link = MockLink::new();
        let mut sink = RecordingSink::new();
        let t0 = Instant::now();

        link.refuse_sends(true);
        engine.tick(t0, &mut link, &mut sink);
        assert!(!engine.registry().any_awaiting());
        assert_eq!(engine.stats().send_refusals, 1);

        // transmitter recovers; the very next pass polls the same node
        link.refuse_sends(false);
        engine.tick(t0 + Duration::from_millis(50), &mut link, &mut sink);
        assert_eq!(link.sent_text(), ["REQ:NODE1"]);
        assert!(engine.registry().slots()[0].awaiting);
    }

    #[test]
    fn test_refused_retry_still_consumes_budget() {
        let mut engine = engine();
        let mut link = MockLink::new();
        let mut sink = RecordingSink::new();
        let t0 = Instant::now();

        engine.tick(t0, &mut link, &mut sink);
        link.refuse_sends(true);

        // first timeout: the retry transmit is refused but the slot is
        // consumed, so the node still exhausts after max_retries windows
        engine.tick(t0 + Duration::from_millis(1600), &mut link, &mut sink);
        assert_eq!(engine.registry().slots()[0].retry_count, 1);
        engine.tick(t0 + Duration::from_millis(3200), &mut link, &mut sink);

        assert_eq!(sink.timeout_nodes(), ["NODE1"]);
        assert_eq!(engine.registry().cursor(), 1);
        assert_eq!(link.sent().len(), 1);
    }

    #[test]
    fn test_retry_count_bounded_while_awaiting() {
        let mut engine = engine();
        let mut link = MockLink::new();
        let mut sink = RecordingSink::new();
        let t0 = Instant::now();

        // run many passes over silent nodes and check the invariant at
        // every step: an armed slot always has budget left
        for step in 0..200u64 {
            let now = t0 + Duration::from_millis(step * 100);
            engine.tick(now, &mut link, &mut sink);
            for slot in engine.registry().slots() {
                if slot.awaiting {
                    assert!(slot.retry_count < engine.policy.max_retries);
                }
            }
        }
        // every exhaustion produced exactly one timeout event
        assert_eq!(engine.stats().timeouts as usize, sink.timeout_nodes().len());
    }
}
