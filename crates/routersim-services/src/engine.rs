//! Node engine: hello timer, info timer and the dispatch loop.
//!
//! All three activities share one [`NodeState`] behind an async mutex. Every
//! routing mutation and every next-hop lookup happens with the lock held, so
//! a reader never sees a half-finished recompute. Outbound packets are
//! collected while the lock is held and handed to the transport after it is
//! released.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use serde::Serialize;
use tokio::sync::{broadcast, mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio::time::Instant;

use routersim_core::{
    derive_msg_id, now_ms, Algorithm, Headers, NodeId, Packet, PacketKind, RouterConfig,
};
use routersim_routing::{
    FloodSeenSet, InfoPayload, Reaction, RoutingStrategy, RoutingTable, StrategyLimits,
};

use crate::delivery::{Delivery, DeliverySender};
use crate::transport::{InboundReceiver, Transport};

// ── Configuration ────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub node_id: NodeId,
    pub algorithm: Algorithm,
    pub hello_interval: Duration,
    pub info_interval: Duration,
    /// None disables liveness expiry.
    pub neighbor_timeout: Option<Duration>,
    /// TTL of hello, echo and info packets.
    pub control_ttl: u32,
    /// TTL of user messages.
    pub message_ttl: u32,
    pub limits: StrategyLimits,
}

impl EngineConfig {
    pub fn new(node_id: impl Into<NodeId>, algorithm: Algorithm) -> Self {
        Self {
            node_id: node_id.into(),
            algorithm,
            hello_interval: Duration::from_secs(2),
            info_interval: Duration::from_secs(3),
            neighbor_timeout: None,
            control_ttl: 8,
            message_ttl: 16,
            limits: StrategyLimits::default(),
        }
    }

    pub fn from_router_config(config: &RouterConfig) -> Self {
        Self {
            node_id: config.node.id.clone(),
            algorithm: config.node.algorithm,
            hello_interval: config.timers.hello_interval(),
            info_interval: config.timers.info_interval(),
            neighbor_timeout: config.timers.neighbor_timeout(),
            control_ttl: config.packets.control_ttl,
            message_ttl: config.packets.message_ttl,
            limits: StrategyLimits {
                flood_seen_capacity: config.limits.flood_seen_capacity,
                lsp_seen_capacity: config.limits.lsp_seen_capacity,
                lsp_seen_window: Duration::from_secs(config.limits.lsp_seen_window_secs),
            },
        }
    }
}

// ── Counters ─────────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
struct EngineStats {
    packets_received: AtomicU64,
    packets_dropped_ttl: AtomicU64,
    packets_malformed: AtomicU64,
    messages_delivered: AtomicU64,
    messages_forwarded: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub packets_received: u64,
    pub packets_dropped_ttl: u64,
    pub packets_malformed: u64,
    pub messages_delivered: u64,
    pub messages_forwarded: u64,
}

impl EngineStats {
    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            packets_received: self.packets_received.load(Ordering::Relaxed),
            packets_dropped_ttl: self.packets_dropped_ttl.load(Ordering::Relaxed),
            packets_malformed: self.packets_malformed.load(Ordering::Relaxed),
            messages_delivered: self.messages_delivered.load(Ordering::Relaxed),
            messages_forwarded: self.messages_forwarded.load(Ordering::Relaxed),
        }
    }
}

/// One neighbor as reported by [`NodeHandle::neighbors`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NeighborStatus {
    pub id: NodeId,
    pub up: bool,
    /// Current link cost. None while the neighbor is down.
    pub cost: Option<f64>,
}

// ── Shared state ─────────────────────────────────────────────────────────────

type Outbound = Vec<(NodeId, Packet)>;

struct NodeState {
    strategy: RoutingStrategy,
    /// Neighbors from the topology. Hellos always go to all of them.
    configured: BTreeSet<NodeId>,
    /// Configured neighbors whose echoes stopped arriving.
    down: BTreeSet<NodeId>,
    last_heard: HashMap<NodeId, Instant>,
    /// Message ids already handed to the delivery sink.
    delivered: FloodSeenSet,
}

impl NodeState {
    fn live_neighbors(&self) -> Vec<NodeId> {
        self.configured
            .iter()
            .filter(|n| !self.down.contains(*n))
            .cloned()
            .collect()
    }
}

struct Shared {
    config: EngineConfig,
    state: Mutex<NodeState>,
    transport: Arc<dyn Transport>,
    delivery: DeliverySender,
    stats: EngineStats,
    msg_counter: AtomicU64,
}

impl Shared {
    fn node_id(&self) -> &str {
        &self.config.node_id
    }

    fn proto(&self) -> &'static str {
        self.config.algorithm.tag()
    }

    fn next_msg_id(&self, timestamp_ms: u64, body: &[u8]) -> String {
        let counter = self.msg_counter.fetch_add(1, Ordering::Relaxed);
        derive_msg_id(self.node_id(), timestamp_ms, counter, body)
    }

    fn control_packet(&self, kind: PacketKind, to: &str, headers: Headers) -> Packet {
        Packet::new(self.proto(), kind, self.node_id(), to, self.config.control_ttl)
            .with_headers(headers)
    }

    fn send_all(&self, outbound: Outbound) {
        for (to, packet) in outbound {
            match packet.encode() {
                Ok(bytes) => {
                    tracing::trace!(
                        node = %self.node_id(),
                        to = %to,
                        kind = packet.kind.as_str(),
                        ttl = packet.ttl,
                        "send"
                    );
                    self.transport.send(&to, Bytes::from(bytes));
                }
                Err(e) => tracing::warn!(node = %self.node_id(), error = %e, "encode failed"),
            }
        }
    }

    // ── Dispatch ─────────────────────────────────────────────────────────────

    async fn dispatch(&self, bytes: &[u8]) {
        EngineStats::bump(&self.stats.packets_received);

        let packet = match Packet::decode(bytes) {
            Ok(p) => p,
            Err(e) => {
                EngineStats::bump(&self.stats.packets_malformed);
                tracing::warn!(node = %self.node_id(), error = %e, "dropping malformed packet");
                return;
            }
        };

        let Some(ttl) = packet.ttl.checked_sub(1) else {
            EngineStats::bump(&self.stats.packets_dropped_ttl);
            tracing::debug!(
                node = %self.node_id(),
                from = %packet.from,
                kind = packet.kind.as_str(),
                "ttl exhausted, dropped"
            );
            return;
        };

        tracing::trace!(
            node = %self.node_id(),
            from = %packet.from,
            kind = packet.kind.as_str(),
            ttl = packet.ttl,
            "recv"
        );

        let outbound = match packet.kind {
            PacketKind::Hello => self.on_hello(&packet),
            PacketKind::Echo => self.on_echo(&packet).await,
            PacketKind::Info => self.on_info(&packet, ttl).await,
            PacketKind::Message => self.on_message(&packet, ttl).await,
        };
        self.send_all(outbound);
    }

    fn on_hello(&self, packet: &Packet) -> Outbound {
        let headers = Headers {
            msg_id: packet.headers.msg_id.clone(),
            ts: packet.headers.ts,
            ..Headers::default()
        };
        vec![(
            packet.from.clone(),
            self.control_packet(PacketKind::Echo, &packet.from, headers),
        )]
    }

    async fn on_echo(&self, packet: &Packet) -> Outbound {
        let Some(ts) = packet.headers.ts else {
            tracing::debug!(node = %self.node_id(), from = %packet.from, "echo without timestamp");
            return Vec::new();
        };
        let rtt_ms = now_ms().saturating_sub(ts) as f64;
        let from = &packet.from;

        let mut state = self.state.lock().await;
        if !state.configured.contains(from) {
            tracing::debug!(node = %self.node_id(), from = %from, "echo from non-neighbor ignored");
            return Vec::new();
        }
        let before = state.strategy.routing_table();
        state.last_heard.insert(from.clone(), Instant::now());

        let mut readvertise = false;
        if state.down.remove(from) {
            tracing::info!(node = %self.node_id(), neighbor = %from, "neighbor back up");
            let live = state.live_neighbors();
            readvertise |= state.strategy.on_neighbor_set_changed(live) == Reaction::Readvertise;
        }
        readvertise |=
            state.strategy.on_neighbor_rtt_sample(from, rtt_ms) == Reaction::Readvertise;
        self.log_table_change(&before, &state);

        if readvertise {
            self.advertisements(&mut state)
        } else {
            Vec::new()
        }
    }

    async fn on_info(&self, packet: &Packet, ttl: u32) -> Outbound {
        let payload = match InfoPayload::from_value(&packet.payload) {
            Ok(p) => p,
            Err(e) => {
                EngineStats::bump(&self.stats.packets_malformed);
                tracing::warn!(
                    node = %self.node_id(),
                    from = %packet.from,
                    error = %e,
                    "dropping malformed info payload"
                );
                return Vec::new();
            }
        };

        let mut state = self.state.lock().await;
        let before = state.strategy.routing_table();
        let reaction = state.strategy.on_advertisement(&packet.from, payload);
        self.log_table_change(&before, &state);

        match reaction {
            Reaction::None => Vec::new(),
            Reaction::Readvertise => self.advertisements(&mut state),
            Reaction::Reflood => state
                .live_neighbors()
                .into_iter()
                .filter(|n| *n != packet.from)
                .map(|n| {
                    let copy = packet.relay(self.node_id(), &n, ttl);
                    (n, copy)
                })
                .collect(),
        }
    }

    async fn on_message(&self, packet: &Packet, ttl: u32) -> Outbound {
        let mut state = self.state.lock().await;
        if packet.to == self.node_id() {
            self.deliver(&mut state, packet);
            return Vec::new();
        }

        let mut copy = packet.relay(self.node_id(), &packet.to, ttl);
        let outbound = if self.config.algorithm == Algorithm::Flooding {
            let msg_id = match &packet.headers.msg_id {
                Some(id) => id.clone(),
                None => {
                    let id = content_msg_id(packet);
                    copy.headers.msg_id = Some(id.clone());
                    id
                }
            };
            if !state.strategy.should_forward(&msg_id) {
                tracing::debug!(node = %self.node_id(), msg_id = %msg_id, "duplicate, not forwarded");
                return Vec::new();
            }
            fan_out(&state, &copy, Some(packet.from.as_str()))
        } else {
            match state.strategy.choose_next_hop(&packet.to) {
                Some(hop) => vec![(hop, copy)],
                None => {
                    tracing::debug!(
                        node = %self.node_id(),
                        to = %packet.to,
                        "no route, flooding"
                    );
                    fan_out(&state, &copy, Some(packet.from.as_str()))
                }
            }
        };

        self.stats
            .messages_forwarded
            .fetch_add(outbound.len() as u64, Ordering::Relaxed);
        outbound
    }

    fn deliver(&self, state: &mut NodeState, packet: &Packet) {
        if let Some(id) = &packet.headers.msg_id {
            if !state.delivered.insert(id) {
                tracing::debug!(node = %self.node_id(), msg_id = %id, "duplicate delivery suppressed");
                return;
            }
        }
        EngineStats::bump(&self.stats.messages_delivered);

        let delivery = Delivery {
            msg_id: packet.headers.msg_id.clone().unwrap_or_default(),
            origin: packet.origin().to_string(),
            relayed_by: packet.from.clone(),
            text: packet.text(),
            received_at_ms: now_ms(),
        };
        tracing::info!(
            node = %self.node_id(),
            origin = %delivery.origin,
            via = %delivery.relayed_by,
            text = %delivery.text,
            "message delivered"
        );
        if self.delivery.send(delivery).is_err() {
            tracing::debug!(node = %self.node_id(), "delivery sink closed");
        }
    }

    // ── Timers ───────────────────────────────────────────────────────────────

    async fn hello_tick(&self) {
        let mut outbound = Vec::new();
        {
            let mut state = self.state.lock().await;
            outbound.extend(self.expire_neighbors(&mut state));

            let ts = now_ms();
            let configured: Vec<NodeId> = state.configured.iter().cloned().collect();
            for n in configured {
                let headers = Headers {
                    msg_id: Some(self.next_msg_id(ts, n.as_bytes())),
                    ts: Some(ts),
                    ..Headers::default()
                };
                let hello = self.control_packet(PacketKind::Hello, &n, headers);
                outbound.push((n, hello));
            }
        }
        self.send_all(outbound);
    }

    async fn info_tick(&self) {
        let outbound = {
            let mut state = self.state.lock().await;
            self.advertisements(&mut state)
        };
        self.send_all(outbound);
    }

    /// Mark silent neighbors down. Returns advertisements if the live set shrank.
    fn expire_neighbors(&self, state: &mut NodeState) -> Outbound {
        let Some(timeout) = self.config.neighbor_timeout else {
            return Vec::new();
        };
        let now = Instant::now();
        let expired: Vec<NodeId> = state
            .configured
            .iter()
            .filter(|n| !state.down.contains(*n))
            .filter(|n| {
                state
                    .last_heard
                    .get(*n)
                    .is_some_and(|at| now.saturating_duration_since(*at) > timeout)
            })
            .cloned()
            .collect();
        if expired.is_empty() {
            return Vec::new();
        }

        for n in &expired {
            tracing::warn!(node = %self.node_id(), neighbor = %n, "neighbor timed out");
        }
        state.down.extend(expired);

        let before = state.strategy.routing_table();
        let live = state.live_neighbors();
        let reaction = state.strategy.on_neighbor_set_changed(live);
        self.log_table_change(&before, state);
        if reaction == Reaction::Readvertise {
            self.advertisements(state)
        } else {
            Vec::new()
        }
    }

    /// Info packets for every live neighbor. Empty under flooding.
    fn advertisements(&self, state: &mut NodeState) -> Outbound {
        let advertisement = state.strategy.build_advertisement();
        let ts = now_ms();
        state
            .live_neighbors()
            .into_iter()
            .filter_map(|n| {
                let payload = advertisement.for_neighbor(&n)?;
                let headers = Headers {
                    msg_id: Some(self.next_msg_id(ts, payload.kind().as_bytes())),
                    ts: Some(ts),
                    ..Headers::default()
                };
                let info = self
                    .control_packet(PacketKind::Info, &n, headers)
                    .with_payload(payload.to_value());
                Some((n, info))
            })
            .collect()
    }

    fn log_table_change(&self, before: &Arc<RoutingTable>, state: &NodeState) {
        let after = state.strategy.routing_table();
        if **before != *after {
            tracing::info!(
                node = %self.node_id(),
                routes = after.len(),
                "routing table updated\n{after}"
            );
        }
    }

    // ── Origination ──────────────────────────────────────────────────────────

    async fn send_user_message(&self, to: &str, text: &str) -> String {
        let ts = now_ms();
        let msg_id = self.next_msg_id(ts, text.as_bytes());
        let headers = Headers {
            msg_id: Some(msg_id.clone()),
            ts: Some(ts),
            origin: Some(self.node_id().to_string()),
            ..Headers::default()
        };
        let packet = Packet::new(
            self.proto(),
            PacketKind::Message,
            self.node_id(),
            to,
            self.config.message_ttl,
        )
        .with_headers(headers)
        .with_payload(serde_json::Value::String(text.to_string()));

        let outbound = {
            let mut state = self.state.lock().await;
            if to == self.node_id() {
                self.deliver(&mut state, &packet);
                Vec::new()
            } else if self.config.algorithm == Algorithm::Flooding {
                state.strategy.should_forward(&msg_id);
                fan_out(&state, &packet, None)
            } else {
                match state.strategy.choose_next_hop(to) {
                    Some(hop) => vec![(hop, packet)],
                    None => fan_out(&state, &packet, None),
                }
            }
        };

        tracing::info!(
            node = %self.node_id(),
            to = %to,
            msg_id = %msg_id,
            copies = outbound.len(),
            "message sent"
        );
        self.send_all(outbound);
        msg_id
    }
}

/// Copies of `packet` for every live neighbor except `except`.
fn fan_out(state: &NodeState, packet: &Packet, except: Option<&str>) -> Outbound {
    state
        .live_neighbors()
        .into_iter()
        .filter(|n| Some(n.as_str()) != except)
        .map(|n| (n, packet.clone()))
        .collect()
}

/// Stable id for a message that arrived without one, so every node that
/// sees it derives the same key.
fn content_msg_id(packet: &Packet) -> String {
    let body = packet.payload.to_string();
    derive_msg_id(
        packet.origin(),
        packet.headers.ts.unwrap_or(0),
        0,
        format!("{}|{}", packet.to, body).as_bytes(),
    )
}

// ── Tasks ────────────────────────────────────────────────────────────────────

struct HelloTimer {
    shared: Arc<Shared>,
    shutdown: broadcast::Receiver<()>,
}

impl HelloTimer {
    async fn run(mut self) -> anyhow::Result<()> {
        let mut interval = tokio::time::interval(self.shared.config.hello_interval);
        loop {
            tokio::select! {
                _ = self.shutdown.recv() => {
                    tracing::info!(node = %self.shared.node_id(), "hello timer shutting down");
                    return Ok(());
                }

                _ = interval.tick() => {
                    self.shared.hello_tick().await;
                }
            }
        }
    }
}

struct InfoTimer {
    shared: Arc<Shared>,
    shutdown: broadcast::Receiver<()>,
}

impl InfoTimer {
    async fn run(mut self) -> anyhow::Result<()> {
        let mut interval = tokio::time::interval(self.shared.config.info_interval);
        loop {
            tokio::select! {
                _ = self.shutdown.recv() => {
                    tracing::info!(node = %self.shared.node_id(), "info timer shutting down");
                    return Ok(());
                }

                _ = interval.tick() => {
                    self.shared.info_tick().await;
                }
            }
        }
    }
}

struct Dispatcher {
    shared: Arc<Shared>,
    inbound: InboundReceiver,
    shutdown: broadcast::Receiver<()>,
}

impl Dispatcher {
    async fn run(mut self) -> anyhow::Result<()> {
        loop {
            tokio::select! {
                _ = self.shutdown.recv() => {
                    tracing::info!(node = %self.shared.node_id(), "dispatcher shutting down");
                    return Ok(());
                }

                frame = self.inbound.recv() => {
                    let Some(frame) = frame else {
                        tracing::info!(node = %self.shared.node_id(), "inbound queue closed, dispatcher exiting");
                        return Ok(());
                    };
                    self.shared.dispatch(&frame.bytes).await;
                }
            }
        }
    }
}

// ── Public surface ───────────────────────────────────────────────────────────

/// One router node.
pub struct NodeEngine {
    shared: Arc<Shared>,
}

impl NodeEngine {
    /// `neighbors` maps each configured neighbor to its initial cost.
    pub fn new(
        config: EngineConfig,
        neighbors: BTreeMap<NodeId, f64>,
        transport: Arc<dyn Transport>,
        delivery: DeliverySender,
    ) -> Self {
        let strategy = RoutingStrategy::new(
            config.algorithm,
            config.node_id.clone(),
            &neighbors,
            config.limits,
        );
        let state = NodeState {
            strategy,
            configured: neighbors.keys().cloned().collect(),
            down: BTreeSet::new(),
            last_heard: HashMap::new(),
            delivered: FloodSeenSet::new(config.limits.flood_seen_capacity),
        };
        Self {
            shared: Arc::new(Shared {
                config,
                state: Mutex::new(state),
                transport,
                delivery,
                stats: EngineStats::default(),
                msg_counter: AtomicU64::new(0),
            }),
        }
    }

    pub fn handle(&self) -> NodeHandle {
        NodeHandle {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Start the transport and spawn the three node tasks.
    pub fn start(&self, shutdown: &broadcast::Sender<()>) -> anyhow::Result<NodeTasks> {
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        self.shared.transport.start(inbound_tx)?;

        tracing::info!(
            node = %self.shared.node_id(),
            algorithm = %self.shared.config.algorithm,
            "node starting"
        );

        let hello = tokio::spawn(
            HelloTimer {
                shared: Arc::clone(&self.shared),
                shutdown: shutdown.subscribe(),
            }
            .run(),
        );
        let info = tokio::spawn(
            InfoTimer {
                shared: Arc::clone(&self.shared),
                shutdown: shutdown.subscribe(),
            }
            .run(),
        );
        let dispatcher = tokio::spawn(
            Dispatcher {
                shared: Arc::clone(&self.shared),
                inbound: inbound_rx,
                shutdown: shutdown.subscribe(),
            }
            .run(),
        );

        Ok(NodeTasks {
            node_id: self.shared.config.node_id.clone(),
            hello,
            info,
            dispatcher,
            transport: Arc::clone(&self.shared.transport),
        })
    }
}

/// Join handles of a running node.
pub struct NodeTasks {
    node_id: NodeId,
    hello: JoinHandle<anyhow::Result<()>>,
    info: JoinHandle<anyhow::Result<()>>,
    dispatcher: JoinHandle<anyhow::Result<()>>,
    transport: Arc<dyn Transport>,
}

impl NodeTasks {
    /// Wait for every task to exit, then stop the transport.
    pub async fn wait(self) -> anyhow::Result<()> {
        let (hello, info, dispatcher) = tokio::join!(self.hello, self.info, self.dispatcher);
        self.transport.stop();
        tracing::info!(node = %self.node_id, "node stopped");
        hello??;
        info??;
        dispatcher??;
        Ok(())
    }
}

/// Cloneable read/control handle on a running node.
#[derive(Clone)]
pub struct NodeHandle {
    shared: Arc<Shared>,
}

impl NodeHandle {
    pub fn node_id(&self) -> &str {
        self.shared.node_id()
    }

    pub fn algorithm(&self) -> Algorithm {
        self.shared.config.algorithm
    }

    pub async fn routing_table(&self) -> Arc<RoutingTable> {
        self.shared.state.lock().await.strategy.routing_table()
    }

    pub async fn neighbors(&self) -> Vec<NeighborStatus> {
        let state = self.shared.state.lock().await;
        state
            .configured
            .iter()
            .map(|id| {
                let up = !state.down.contains(id);
                NeighborStatus {
                    id: id.clone(),
                    up,
                    cost: if up { state.strategy.neighbors().cost(id) } else { None },
                }
            })
            .collect()
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.shared.stats.snapshot()
    }

    /// Originate a user message. Returns its id.
    pub async fn send_user_message(&self, to: &str, text: &str) -> String {
        self.shared.send_user_message(to, text).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::delivery::DeliveryReceiver;
    use std::sync::Mutex as StdMutex;

    #[derive(Default)]
    struct RecordingTransport {
        sent: StdMutex<Vec<(NodeId, Packet)>>,
    }

    impl RecordingTransport {
        fn take(&self) -> Vec<(NodeId, Packet)> {
            std::mem::take(&mut *self.sent.lock().unwrap())
        }
    }

    impl Transport for RecordingTransport {
        fn start(&self, _inbound: crate::transport::InboundSender) -> anyhow::Result<()> {
            Ok(())
        }

        fn stop(&self) {}

        fn send(&self, to: &str, bytes: Bytes) {
            let packet = Packet::decode(&bytes).unwrap();
            self.sent.lock().unwrap().push((to.to_string(), packet));
        }
    }

    fn engine(
        algorithm: Algorithm,
        neighbors: &[&str],
    ) -> (NodeEngine, Arc<RecordingTransport>, DeliveryReceiver) {
        let mut config = EngineConfig::new("A", algorithm);
        config.neighbor_timeout = Some(Duration::from_secs(5));
        let neighbors = neighbors.iter().map(|n| (n.to_string(), 1.0)).collect();
        let transport = Arc::new(RecordingTransport::default());
        let (tx, rx) = mpsc::unbounded_channel();
        let engine = NodeEngine::new(config, neighbors, transport.clone(), tx);
        (engine, transport, rx)
    }

    fn bytes(packet: &Packet) -> Vec<u8> {
        packet.encode().unwrap()
    }

    fn message(from: &str, to: &str, ttl: u32, msg_id: &str) -> Packet {
        Packet::new("dvr", PacketKind::Message, from, to, ttl)
            .with_headers(Headers {
                msg_id: Some(msg_id.to_string()),
                origin: Some("S".to_string()),
                ..Headers::default()
            })
            .with_payload(serde_json::json!("hi"))
    }

    #[tokio::test]
    async fn ttl_zero_is_dropped_before_forwarding() {
        let (engine, transport, _rx) = engine(Algorithm::DistanceVector, &["B", "C"]);
        engine.shared.dispatch(&bytes(&message("B", "C", 0, "m1"))).await;
        assert!(transport.take().is_empty());
        assert_eq!(engine.handle().stats().packets_dropped_ttl, 1);
    }

    #[tokio::test]
    async fn ttl_one_is_forwarded_with_zero() {
        let (engine, transport, _rx) = engine(Algorithm::DistanceVector, &["B", "C"]);
        engine.shared.dispatch(&bytes(&message("B", "C", 1, "m1"))).await;
        let sent = transport.take();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, "C");
        assert_eq!(sent[0].1.ttl, 0);
        assert_eq!(sent[0].1.from, "A");
        assert_eq!(sent[0].1.to, "C");
        assert_eq!(sent[0].1.origin(), "S");
    }

    #[tokio::test]
    async fn hello_is_answered_with_echo() {
        let (engine, transport, _rx) = engine(Algorithm::LinkState, &["B"]);
        let hello = Packet::new("lsr", PacketKind::Hello, "B", "A", 8).with_headers(Headers {
            msg_id: Some("h1".into()),
            ts: Some(12345),
            ..Headers::default()
        });
        engine.shared.dispatch(&bytes(&hello)).await;
        let sent = transport.take();
        assert_eq!(sent.len(), 1);
        let (to, echo) = &sent[0];
        assert_eq!(to, "B");
        assert_eq!(echo.kind, PacketKind::Echo);
        assert_eq!(echo.headers.ts, Some(12345));
        assert_eq!(echo.headers.msg_id.as_deref(), Some("h1"));
    }

    #[tokio::test]
    async fn message_for_self_is_delivered_once() {
        let (engine, transport, mut rx) = engine(Algorithm::LinkState, &["B", "C"]);
        engine.shared.dispatch(&bytes(&message("B", "A", 5, "m1"))).await;
        engine.shared.dispatch(&bytes(&message("C", "A", 5, "m1"))).await;

        let delivery = rx.try_recv().unwrap();
        assert_eq!(delivery.origin, "S");
        assert_eq!(delivery.relayed_by, "B");
        assert_eq!(delivery.text, "hi");
        assert!(rx.try_recv().is_err());
        assert!(transport.take().is_empty());
        assert_eq!(engine.handle().stats().messages_delivered, 1);
    }

    #[tokio::test]
    async fn unknown_destination_falls_back_to_flooding() {
        let (engine, transport, _rx) = engine(Algorithm::LinkState, &["B", "C", "D"]);
        engine.shared.dispatch(&bytes(&message("B", "Z", 5, "m1"))).await;
        let mut targets: Vec<NodeId> = transport.take().into_iter().map(|(to, _)| to).collect();
        targets.sort();
        assert_eq!(targets, vec!["C", "D"]);
    }

    #[tokio::test]
    async fn flooding_forwards_each_message_once() {
        let (engine, transport, _rx) = engine(Algorithm::Flooding, &["B", "C", "D"]);
        engine.shared.dispatch(&bytes(&message("B", "Z", 5, "m1"))).await;
        assert_eq!(transport.take().len(), 2);
        engine.shared.dispatch(&bytes(&message("C", "Z", 5, "m1"))).await;
        assert!(transport.take().is_empty());
    }

    #[tokio::test]
    async fn malformed_packets_are_counted_and_dropped() {
        let (engine, transport, _rx) = engine(Algorithm::DistanceVector, &["B"]);
        engine.shared.dispatch(b"{not json").await;
        let bad_info = Packet::new("dvr", PacketKind::Info, "B", "A", 8)
            .with_payload(serde_json::json!({"kind": "nope"}));
        engine.shared.dispatch(&bytes(&bad_info)).await;
        assert!(transport.take().is_empty());
        assert_eq!(engine.handle().stats().packets_malformed, 2);
    }

    #[tokio::test]
    async fn echo_cost_change_readvertises_link_state() {
        let (engine, transport, _rx) = engine(Algorithm::LinkState, &["B"]);
        let echo = Packet::new("lsr", PacketKind::Echo, "B", "A", 8).with_headers(Headers {
            ts: Some(now_ms().saturating_sub(50)),
            ..Headers::default()
        });
        engine.shared.dispatch(&bytes(&echo)).await;

        let sent = transport.take();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].1.kind, PacketKind::Info);
        let cost = engine.handle().routing_table().await.get("B").map(|r| r.cost);
        assert!(cost.is_some_and(|c| c >= 50.0));
    }

    #[tokio::test]
    async fn dv_vector_change_readvertises() {
        let (engine, transport, _rx) = engine(Algorithm::DistanceVector, &["B"]);
        let info = Packet::new("dvr", PacketKind::Info, "B", "A", 8).with_payload(
            serde_json::json!({"kind": "DV", "vector": {"B": 0, "C": 1}}),
        );
        engine.shared.dispatch(&bytes(&info)).await;

        let sent = transport.take();
        assert_eq!(sent.len(), 1);
        let payload = InfoPayload::from_value(&sent[0].1.payload).unwrap();
        match payload {
            InfoPayload::DistanceVector { vector } => assert!(vector["C"].is_infinite()),
            other => panic!("unexpected payload {other:?}"),
        }
        let table = engine.handle().routing_table().await;
        assert_eq!(table.next_hop("C").map(String::as_str), Some("B"));
    }

    #[tokio::test]
    async fn accepted_lsp_is_reflooded_with_inbound_ttl() {
        let (engine, transport, _rx) = engine(Algorithm::LinkState, &["B", "C"]);
        let info = Packet::new("lsr", PacketKind::Info, "B", "A", 6).with_payload(
            serde_json::json!({"kind": "LSP", "origin": "B", "seq": 1, "links": {"A": 1, "Z": 1}}),
        );
        engine.shared.dispatch(&bytes(&info)).await;
        let sent = transport.take();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, "C");
        assert_eq!(sent[0].1.ttl, 5);

        engine.shared.dispatch(&bytes(&info)).await;
        assert!(transport.take().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn silent_neighbor_goes_down_and_comes_back() {
        let (engine, transport, _rx) = engine(Algorithm::DistanceVector, &["B", "C"]);
        let echo = |from: &str| {
            Packet::new("dvr", PacketKind::Echo, from, "A", 8).with_headers(Headers {
                ts: Some(now_ms()),
                ..Headers::default()
            })
        };
        engine.shared.dispatch(&bytes(&echo("B"))).await;
        engine.shared.dispatch(&bytes(&echo("C"))).await;
        transport.take();

        tokio::time::advance(Duration::from_secs(3)).await;
        engine.shared.dispatch(&bytes(&echo("C"))).await;
        tokio::time::advance(Duration::from_secs(3)).await;
        engine.shared.hello_tick().await;

        let handle = engine.handle();
        let neighbors = handle.neighbors().await;
        assert!(!neighbors.iter().find(|n| n.id == "B").unwrap().up);
        assert!(neighbors.iter().find(|n| n.id == "C").unwrap().up);
        assert!(handle.routing_table().await.next_hop("B").is_none());

        let sent = transport.take();
        // hellos still reach the dead neighbor, advertisements do not
        assert!(sent
            .iter()
            .any(|(to, p)| to == "B" && p.kind == PacketKind::Hello));
        assert!(!sent
            .iter()
            .any(|(to, p)| to == "B" && p.kind == PacketKind::Info));

        engine.shared.dispatch(&bytes(&echo("B"))).await;
        assert!(handle.neighbors().await.iter().all(|n| n.up));
        assert_eq!(
            handle.routing_table().await.next_hop("B").map(String::as_str),
            Some("B")
        );
    }

    #[tokio::test]
    async fn user_message_uses_next_hop() {
        let (engine, transport, _rx) = engine(Algorithm::DistanceVector, &["B", "C"]);
        let msg_id = engine.handle().send_user_message("C", "hello").await;
        let sent = transport.take();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, "C");
        let packet = &sent[0].1;
        assert_eq!(packet.ttl, 16);
        assert_eq!(packet.headers.msg_id.as_deref(), Some(msg_id.as_str()));
        assert_eq!(packet.origin(), "A");
        assert_eq!(packet.text(), "hello");
    }

    #[tokio::test]
    async fn flooded_user_message_is_not_forwarded_when_it_returns() {
        let (engine, transport, _rx) = engine(Algorithm::Flooding, &["B", "C"]);
        let msg_id = engine.handle().send_user_message("Z", "x").await;
        assert_eq!(transport.take().len(), 2);

        let back = message("B", "Z", 10, &msg_id);
        engine.shared.dispatch(&bytes(&back)).await;
        assert!(transport.take().is_empty());
    }
}
