//! Node registry
//!
//! Fixed, ordered roster of remote nodes plus the per-node protocol state
//! the poll engine drives. The engine is the sole owner; nothing else
//! mutates these slots.

use std::time::Instant;

use lora_proto::NodeId;

/// Protocol state for one remote node
#[derive(Debug, Clone)]
pub struct NodeSlot {
    /// Node identity, fixed at startup
    pub id: NodeId,
    /// True between request-sent and reply-received / retries-exhausted
    pub awaiting: bool,
    /// Stamped on every request transmission to this node
    pub last_send: Option<Instant>,
    /// Timeouts consumed for the in-flight request
    pub retry_count: u32,
}

impl NodeSlot {
    fn new(id: NodeId) -> Self {
        Self {
            id,
            awaiting: false,
            last_send: None,
            retry_count: 0,
        }
    }
}

/// Ordered node roster with the round-robin cursor
///
/// The cursor identifies whose turn is next and advances only on resolved
/// outcomes (matching reply, or retries exhausted), never on a bare send.
#[derive(Debug)]
pub struct NodeRegistry {
    slots: Vec<NodeSlot>,
    cursor: usize,
}

impl NodeRegistry {
    /// Build the registry from the configured roster. Order is preserved
    /// for the process lifetime.
    pub fn new(ids: impl IntoIterator<Item = NodeId>) -> Self {
        Self {
            slots: ids.into_iter().map(NodeSlot::new).collect(),
            cursor: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Slot whose turn it currently is.
    pub fn current(&self) -> &NodeSlot {
        &self.slots[self.cursor]
    }

    pub fn current_mut(&mut self) -> &mut NodeSlot {
        &mut self.slots[self.cursor]
    }

    /// Move the cursor to the next node, wrapping at the end of the roster.
    pub fn advance(&mut self) {
        self.cursor = (self.cursor + 1) % self.slots.len();
    }

    pub fn slots(&self) -> &[NodeSlot] {
        &self.slots
    }

    pub fn slots_mut(&mut self) -> &mut [NodeSlot] {
        &mut self.slots
    }

    pub fn slot_mut(&mut self, id: &NodeId) -> Option<&mut NodeSlot> {
        self.slots.iter_mut().find(|slot| &slot.id == id)
    }

    /// Half-duplex discipline: at most one request is ever outstanding.
    pub fn any_awaiting(&self) -> bool {
        self.slots.iter().any(|slot| slot.awaiting)
    }
}
