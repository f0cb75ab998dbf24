//! routersim-core — shared types, packet wire format, and configuration.
//! All other routersim crates depend on this one.

pub mod config;
pub mod packet;
pub mod topology;

pub use config::{Algorithm, RouterConfig, TransportKind};
pub use packet::{derive_msg_id, now_ms, Headers, NodeId, Packet, PacketError, PacketKind};
pub use topology::{Names, Topology, TopologyError};
