//! Transport backends.
//!
//! A transport moves opaque packet bytes between nodes. It never parses
//! them beyond peeking at the sender for logs. Sends are fire-and-forget:
//! failures are logged and never reach the caller.

use bytes::Bytes;
use tokio::sync::mpsc;

use routersim_core::NodeId;

pub mod channel;
pub mod tcp;

pub use channel::{new_broker, ChannelBroker, ChannelTransport};
pub use tcp::{port_for_id, AddressBook, TcpTransport};

/// One received packet, as handed to the dispatch queue.
#[derive(Debug, Clone)]
pub struct InboundFrame {
    pub from: NodeId,
    pub bytes: Bytes,
}

pub type InboundSender = mpsc::UnboundedSender<InboundFrame>;
pub type InboundReceiver = mpsc::UnboundedReceiver<InboundFrame>;

pub trait Transport: Send + Sync {
    /// Begin receiving; every inbound packet is pushed onto `inbound`.
    /// Calling it on a started transport does nothing.
    fn start(&self, inbound: InboundSender) -> anyhow::Result<()>;

    /// Stop receiving. Idempotent.
    fn stop(&self);

    /// Best-effort send of one encoded packet to node `to`.
    fn send(&self, to: &str, bytes: Bytes);
}

/// The `from` field of an encoded packet, or `"?"` if it has none.
pub(crate) fn sender_of(bytes: &[u8]) -> NodeId {
    #[derive(serde::Deserialize)]
    struct Peek {
        from: NodeId,
    }
    serde_json::from_slice::<Peek>(bytes)
        .map(|f| f.from)
        .unwrap_or_else(|_| "?".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sender_is_peeked_from_json() {
        assert_eq!(sender_of(br#"{"from":"B","to":"A","ttl":3}"#), "B");
        assert_eq!(sender_of(b"not json"), "?");
    }
}
