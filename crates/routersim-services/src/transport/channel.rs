//! In-process pub/sub transport.
//!
//! Every node subscribes to one channel name on a shared broker and
//! publishes to the channel of the destination node. Used to run a whole
//! topology inside one process, and by the tests.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use dashmap::DashMap;

use routersim_core::{Names, NodeId};

use super::{InboundFrame, InboundSender, Transport};

/// Channel name -> subscriber queue.
pub type ChannelBroker = Arc<DashMap<String, InboundSender>>;

pub fn new_broker() -> ChannelBroker {
    Arc::new(DashMap::new())
}

pub struct ChannelTransport {
    node_id: NodeId,
    channel: String,
    names: Names,
    broker: ChannelBroker,
    started: AtomicBool,
}

impl ChannelTransport {
    pub fn new(node_id: impl Into<NodeId>, names: Names, broker: ChannelBroker) -> Self {
        let node_id = node_id.into();
        let channel = names.channel_of(&node_id);
        Self {
            node_id,
            channel,
            names,
            broker,
            started: AtomicBool::new(false),
        }
    }

    /// Transport whose channels are just the node ids.
    pub fn unnamed(node_id: impl Into<NodeId>, broker: ChannelBroker) -> Self {
        Self::new(node_id, Names::from_map(BTreeMap::new()), broker)
    }

    pub fn channel(&self) -> &str {
        &self.channel
    }
}

impl Transport for ChannelTransport {
    fn start(&self, inbound: InboundSender) -> anyhow::Result<()> {
        if self.started.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        if self.broker.insert(self.channel.clone(), inbound).is_some() {
            tracing::warn!(channel = %self.channel, "channel already had a subscriber, replaced");
        }
        tracing::info!(node = %self.node_id, channel = %self.channel, "subscribed");
        Ok(())
    }

    fn stop(&self) {
        if !self.started.swap(false, Ordering::SeqCst) {
            return;
        }
        self.broker.remove(&self.channel);
        tracing::info!(node = %self.node_id, channel = %self.channel, "unsubscribed");
    }

    fn send(&self, to: &str, bytes: Bytes) {
        let channel = self.names.channel_of(to);
        let Some(subscriber) = self.broker.get(&channel) else {
            tracing::warn!(to = %to, channel = %channel, "no subscriber on channel");
            return;
        };
        let frame = InboundFrame {
            from: self.node_id.clone(),
            bytes,
        };
        if subscriber.send(frame).is_err() {
            tracing::warn!(to = %to, channel = %channel, "subscriber queue closed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    #[test]
    fn publish_reaches_subscriber() {
        let broker = new_broker();
        let a = ChannelTransport::unnamed("A", broker.clone());
        let b = ChannelTransport::unnamed("B", broker.clone());
        let (tx, mut rx) = mpsc::unbounded_channel();
        b.start(tx).unwrap();

        a.send("B", Bytes::from_static(b"{}"));
        let frame = rx.try_recv().unwrap();
        assert_eq!(frame.from, "A");
        assert_eq!(&frame.bytes[..], b"{}");
    }

    #[test]
    fn names_map_ids_to_channels() {
        let broker = new_broker();
        let mut map = BTreeMap::new();
        map.insert("B".to_string(), "sec.b".to_string());
        let names = Names::from_map(map);

        let a = ChannelTransport::new("A", names.clone(), broker.clone());
        let b = ChannelTransport::new("B", names, broker.clone());
        assert_eq!(b.channel(), "sec.b");

        let (tx, mut rx) = mpsc::unbounded_channel();
        b.start(tx).unwrap();
        assert!(broker.contains_key("sec.b"));
        a.send("B", Bytes::from_static(b"x"));
        assert!(rx.try_recv().is_ok());
    }

    #[test]
    fn start_and_stop_are_idempotent() {
        let broker = new_broker();
        let b = ChannelTransport::unnamed("B", broker.clone());
        let (tx, _rx) = mpsc::unbounded_channel();
        b.start(tx.clone()).unwrap();
        b.start(tx).unwrap();
        assert_eq!(broker.len(), 1);
        b.stop();
        b.stop();
        assert!(broker.is_empty());
    }

    #[test]
    fn send_without_subscriber_is_dropped() {
        let broker = new_broker();
        let a = ChannelTransport::unnamed("A", broker);
        a.send("nobody", Bytes::from_static(b"x"));
    }
}
