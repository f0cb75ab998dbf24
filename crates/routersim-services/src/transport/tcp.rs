//! TCP transport: one packet per connection.
//!
//! The sender connects, writes the encoded packet, and shuts the write half
//! down. The receiver reads to EOF. No framing, no connection reuse.

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Context;
use bytes::Bytes;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

use routersim_core::{Names, NodeId};

use super::{sender_of, InboundFrame, InboundSender, Transport};

/// Largest packet a listener will accept.
pub const MAX_PACKET_BYTES: u64 = 64 * 1024;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(1);

/// Port derived from the node id: `base + blake3(id) mod 1000`.
pub fn port_for_id(id: &str, base_port: u16) -> u16 {
    let hash = blake3::hash(id.as_bytes());
    let mut head = [0u8; 8];
    head.copy_from_slice(&hash.as_bytes()[..8]);
    let offset = (u64::from_le_bytes(head) % 1000) as u16;
    base_port.saturating_add(offset)
}

/// Resolves node ids to socket addresses.
#[derive(Debug, Clone)]
pub struct AddressBook {
    host: String,
    base_port: u16,
    explicit: BTreeMap<NodeId, SocketAddr>,
}

impl AddressBook {
    /// Names entries that parse as socket addresses are used verbatim;
    /// everything else falls back to the derived port on `host`.
    pub fn new(host: impl Into<String>, base_port: u16, names: &Names) -> Self {
        let explicit = names
            .as_map()
            .iter()
            .filter_map(|(id, addr)| addr.parse().ok().map(|a| (id.clone(), a)))
            .collect();
        Self {
            host: host.into(),
            base_port,
            explicit,
        }
    }

    pub fn resolve(&self, id: &str) -> String {
        match self.explicit.get(id) {
            Some(addr) => addr.to_string(),
            None => format!("{}:{}", self.host, port_for_id(id, self.base_port)),
        }
    }
}

pub struct TcpTransport {
    node_id: NodeId,
    book: Arc<AddressBook>,
    accept_task: Mutex<Option<JoinHandle<()>>>,
}

impl TcpTransport {
    pub fn new(node_id: impl Into<NodeId>, book: AddressBook) -> Self {
        Self {
            node_id: node_id.into(),
            book: Arc::new(book),
            accept_task: Mutex::new(None),
        }
    }

    pub fn listen_addr(&self) -> String {
        self.book.resolve(&self.node_id)
    }
}

impl Transport for TcpTransport {
    fn start(&self, inbound: InboundSender) -> anyhow::Result<()> {
        let mut task = self.accept_task.lock().unwrap_or_else(|e| e.into_inner());
        if task.is_some() {
            return Ok(());
        }

        let addr = self.listen_addr();
        let std_listener = std::net::TcpListener::bind(&addr)
            .with_context(|| format!("failed to bind {addr}"))?;
        std_listener
            .set_nonblocking(true)
            .context("failed to set listener nonblocking")?;
        let listener =
            TcpListener::from_std(std_listener).context("failed to convert to tokio TcpListener")?;

        tracing::info!(node = %self.node_id, addr = %addr, "tcp transport listening");
        *task = Some(tokio::spawn(accept_loop(listener, inbound)));
        Ok(())
    }

    fn stop(&self) {
        let mut task = self.accept_task.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(handle) = task.take() {
            handle.abort();
            tracing::info!(node = %self.node_id, "tcp transport stopped");
        }
    }

    fn send(&self, to: &str, bytes: Bytes) {
        let addr = self.book.resolve(to);
        let to = to.to_string();
        tokio::spawn(async move {
            match tokio::time::timeout(CONNECT_TIMEOUT, TcpStream::connect(&addr)).await {
                Ok(Ok(mut stream)) => {
                    if let Err(e) = stream.write_all(&bytes).await {
                        tracing::warn!(to = %to, addr = %addr, error = %e, "send failed");
                        return;
                    }
                    let _ = stream.shutdown().await;
                }
                Ok(Err(e)) => {
                    tracing::warn!(to = %to, addr = %addr, error = %e, "connect failed");
                }
                Err(_) => {
                    tracing::warn!(to = %to, addr = %addr, "connect timed out");
                }
            }
        });
    }
}

impl Drop for TcpTransport {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn accept_loop(listener: TcpListener, inbound: InboundSender) {
    loop {
        let (stream, peer) = match listener.accept().await {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!(error = %e, "accept failed");
                continue;
            }
        };
        if inbound.is_closed() {
            return;
        }
        let inbound = inbound.clone();
        tokio::spawn(async move {
            let mut buf = Vec::new();
            let mut limited = stream.take(MAX_PACKET_BYTES + 1);
            if let Err(e) = limited.read_to_end(&mut buf).await {
                tracing::warn!(peer = %peer, error = %e, "read failed");
                return;
            }
            if buf.len() as u64 > MAX_PACKET_BYTES {
                tracing::warn!(peer = %peer, "packet too large, dropped");
                return;
            }
            let frame = InboundFrame {
                from: sender_of(&buf),
                bytes: Bytes::from(buf),
            };
            let _ = inbound.send(frame);
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    #[test]
    fn derived_ports_are_stable_and_in_range() {
        let a = port_for_id("A", 50_000);
        assert_eq!(a, port_for_id("A", 50_000));
        assert!((50_000..51_000).contains(&a));
    }

    #[test]
    fn explicit_address_wins() {
        let mut map = BTreeMap::new();
        map.insert("A".to_string(), "127.0.0.1:41001".to_string());
        map.insert("B".to_string(), "chan-b".to_string());
        let book = AddressBook::new("127.0.0.1", 50_000, &Names::from_map(map));
        assert_eq!(book.resolve("A"), "127.0.0.1:41001");
        assert_eq!(
            book.resolve("B"),
            format!("127.0.0.1:{}", port_for_id("B", 50_000))
        );
    }

    #[tokio::test]
    async fn packet_crosses_loopback() {
        let probe = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = probe.local_addr().unwrap().port();
        drop(probe);

        let mut map = BTreeMap::new();
        map.insert("B".to_string(), format!("127.0.0.1:{port}"));
        let book = AddressBook::new("127.0.0.1", 50_000, &Names::from_map(map));

        let a = TcpTransport::new("A", book.clone());
        let b = TcpTransport::new("B", book);
        let (tx, mut rx) = mpsc::unbounded_channel();
        b.start(tx).unwrap();

        a.send("B", Bytes::from_static(br#"{"from":"A"}"#));
        let frame = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(frame.from, "A");
        b.stop();
    }
}
