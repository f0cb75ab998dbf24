//! Delivered user messages.

use std::sync::Arc;

use dashmap::DashMap;
use serde::Serialize;
use tokio::sync::mpsc;

use routersim_core::NodeId;

/// A user message that reached its destination.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Delivery {
    pub msg_id: String,
    /// Node that originated the message.
    pub origin: NodeId,
    /// Neighbor that handed us the last copy.
    pub relayed_by: NodeId,
    pub text: String,
    pub received_at_ms: u64,
}

pub type DeliverySender = mpsc::UnboundedSender<Delivery>;
pub type DeliveryReceiver = mpsc::UnboundedReceiver<Delivery>;

/// In-memory inbox, keyed by origin.
#[derive(Clone, Default)]
pub struct Inbox {
    messages: Arc<DashMap<NodeId, Vec<Delivery>>>,
}

impl Inbox {
    pub fn new() -> Self {
        Self {
            messages: Arc::new(DashMap::new()),
        }
    }

    pub fn add(&self, delivery: Delivery) {
        self.messages
            .entry(delivery.origin.clone())
            .or_default()
            .push(delivery);
    }

    /// Messages from one origin, oldest first.
    pub fn get(&self, origin: &str) -> Vec<Delivery> {
        self.messages
            .get(origin)
            .map(|msgs| msgs.clone())
            .unwrap_or_default()
    }

    /// Every message, oldest first.
    pub fn all(&self) -> Vec<Delivery> {
        let mut all: Vec<Delivery> = self
            .messages
            .iter()
            .flat_map(|entry| entry.value().clone())
            .collect();
        all.sort_by_key(|d| d.received_at_ms);
        all
    }

    pub fn count(&self) -> usize {
        self.messages.iter().map(|entry| entry.value().len()).sum()
    }

    pub fn clear(&self) {
        self.messages.clear();
    }
}
