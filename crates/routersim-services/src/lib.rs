//! routersim-services — the async side of a router node.
//!
//! [`NodeEngine`] runs the hello timer, the info timer and the dispatch loop
//! over a [`Transport`]. Delivered user messages leave through a channel of
//! [`Delivery`] values; the daemon keeps them in an [`Inbox`].

pub mod delivery;
pub mod engine;
pub mod transport;

pub use delivery::{Delivery, DeliveryReceiver, DeliverySender, Inbox};
pub use engine::{EngineConfig, NeighborStatus, NodeEngine, NodeHandle, NodeTasks, StatsSnapshot};
pub use transport::{
    new_broker, AddressBook, ChannelBroker, ChannelTransport, InboundFrame, InboundSender,
    TcpTransport, Transport,
};
