//! Routersim wire format: one JSON object per packet.
//!
//! ```text
//! {"proto": "lsr", "type": "hello", "from": "A", "to": "B", "ttl": 8,
//!  "headers": {"msg_id": "9f3c...", "ts": 1712345678901}, "payload": {}}
//! ```
//!
//! Field names are part of the protocol and must not change. Unknown header
//! fields are carried through untouched so that nodes running a newer build
//! can still relay packets they do not fully understand.
//!
//! A packet is immutable once handed to a transport. Forwarding never edits
//! the inbound packet; it builds a new one with [`Packet::relay`].

use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

/// Opaque, globally unique node identifier.
pub type NodeId = String;

/// Packet type discriminator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PacketKind {
    /// Neighbor probe carrying a send timestamp.
    Hello,
    /// Reply to a hello, echoing its timestamp back for RTT measurement.
    Echo,
    /// Routing advertisement (distance vector or LSP).
    Info,
    /// User data.
    Message,
}

impl PacketKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Hello => "hello",
            Self::Echo => "echo",
            Self::Info => "info",
            Self::Message => "message",
        }
    }
}

/// Packet headers.
///
/// `msg_id` identifies a packet for deduplication, `ts` carries the hello
/// send time in milliseconds, and `origin` names the node that originated a
/// user message (`from` is rewritten at every hop).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Headers {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub msg_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ts: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin: Option<NodeId>,

    /// Anything else a peer put in the headers.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// A routersim packet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Packet {
    /// Routing protocol tag of the sender ("flooding", "dvr", "lsr").
    pub proto: String,

    #[serde(rename = "type")]
    pub kind: PacketKind,

    /// The node that put this copy on the wire (the last hop).
    pub from: NodeId,

    /// Destination. For hello/echo/info this is the neighbor; for user
    /// messages it is the final destination and never changes en route.
    pub to: NodeId,

    /// Remaining hop budget.
    pub ttl: u32,

    #[serde(default)]
    pub headers: Headers,

    #[serde(default)]
    pub payload: serde_json::Value,
}

impl Packet {
    pub fn new(
        proto: impl Into<String>,
        kind: PacketKind,
        from: impl Into<NodeId>,
        to: impl Into<NodeId>,
        ttl: u32,
    ) -> Self {
        Self {
            proto: proto.into(),
            kind,
            from: from.into(),
            to: to.into(),
            ttl,
            headers: Headers::default(),
            payload: serde_json::Value::Null,
        }
    }

    pub fn with_headers(mut self, headers: Headers) -> Self {
        self.headers = headers;
        self
    }

    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = payload;
        self
    }

    /// Build the copy handed to the next hop.
    ///
    /// `ttl` is the budget left after this node's decrement; headers and
    /// payload are carried over unchanged.
    pub fn relay(&self, via: &str, to: &str, ttl: u32) -> Packet {
        Packet {
            proto: self.proto.clone(),
            kind: self.kind,
            from: via.to_string(),
            to: to.to_string(),
            ttl,
            headers: self.headers.clone(),
            payload: self.payload.clone(),
        }
    }

    /// The node that originated this packet.
    pub fn origin(&self) -> &str {
        self.headers.origin.as_deref().unwrap_or(&self.from)
    }

    /// Human-readable body of a user message.
    ///
    /// Accepts a bare JSON string, an object with a `text` field, or falls
    /// back to the compact JSON encoding of whatever the payload is.
    pub fn text(&self) -> String {
        match &self.payload {
            serde_json::Value::String(s) => s.clone(),
            serde_json::Value::Object(map) => match map.get("text") {
                Some(serde_json::Value::String(s)) => s.clone(),
                _ => self.payload.to_string(),
            },
            other => other.to_string(),
        }
    }

    pub fn encode(&self) -> Result<Vec<u8>, PacketError> {
        serde_json::to_vec(self).map_err(PacketError::Encode)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, PacketError> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

/// Derive a message id: `hex(blake3(from || timestamp_le || counter_le || body))`.
///
/// The per-node counter keeps two identical messages sent in the same
/// millisecond distinct.
pub fn derive_msg_id(from: &str, timestamp_ms: u64, counter: u64, body: &[u8]) -> String {
    let mut h = blake3::Hasher::new();
    h.update(from.as_bytes());
    h.update(&timestamp_ms.to_le_bytes());
    h.update(&counter.to_le_bytes());
    h.update(body);
    hex::encode(&h.finalize().as_bytes()[..16])
}

/// Wall-clock time in milliseconds since the Unix epoch.
pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

// ── Errors ────────────────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum PacketError {
    #[error("malformed packet: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("failed to encode packet: {0}")]
    Encode(serde_json::Error),
}
