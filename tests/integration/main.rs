//! Multi-node integration tests.
//!
//! Every node runs its real timers and dispatcher, wired together over
//! the in-process channel broker. Tests use paused tokio time, so a
//! 20 second settle period costs nothing.
//!
//!   cargo test --test integration

mod convergence;
mod failures;
mod forwarding;

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::sync::{broadcast, mpsc};

use routersim_core::{Algorithm, Topology};
use routersim_services::{
    new_broker, ChannelTransport, Delivery, DeliveryReceiver, EngineConfig, NodeEngine,
    NodeHandle, NodeTasks,
};

// ── Harness ───────────────────────────────────────────────────────────────────

/// A → B → C → D, unit costs.
pub const LINE: &str =
    r#"{"type":"topo","config":{"A":["B"],"B":["A","C"],"C":["B","D"],"D":["C"]}}"#;

/// A - B - C - D - A, unit costs.
pub const SQUARE: &str = r#"{"type":"topo","config":{
    "A":["B","D"],"B":["A","C"],"C":["B","D"],"D":["A","C"]}}"#;

pub struct TestNode {
    pub handle: NodeHandle,
    shutdown: broadcast::Sender<()>,
    tasks: Option<NodeTasks>,
}

impl TestNode {
    /// Stop this node and drop it from the broker.
    pub async fn stop(&mut self) -> Result<()> {
        let _ = self.shutdown.send(());
        if let Some(tasks) = self.tasks.take() {
            tasks.wait().await?;
        }
        Ok(())
    }
}

pub struct TestNetwork {
    pub nodes: BTreeMap<String, TestNode>,
    pub deliveries: DeliveryReceiver,
}

impl TestNetwork {
    /// Start every node of `topo` with 1s hellos and 2s infos.
    pub fn start(
        topo: &str,
        algorithm: Algorithm,
        neighbor_timeout: Option<Duration>,
    ) -> Result<Self> {
        let topology = Topology::from_json(topo, "test")?;
        let broker = new_broker();
        let (delivery_tx, deliveries) = mpsc::unbounded_channel::<Delivery>();

        let mut nodes = BTreeMap::new();
        for id in topology.node_ids() {
            let mut config = EngineConfig::new(id.clone(), algorithm);
            config.hello_interval = Duration::from_secs(1);
            config.info_interval = Duration::from_secs(2);
            config.neighbor_timeout = neighbor_timeout;

            let transport = Arc::new(ChannelTransport::unnamed(id.clone(), broker.clone()));
            let engine = NodeEngine::new(
                config,
                topology.neighbors_of(&id),
                transport,
                delivery_tx.clone(),
            );
            let (shutdown, _) = broadcast::channel::<()>(1);
            let tasks = engine.start(&shutdown)?;
            nodes.insert(
                id,
                TestNode {
                    handle: engine.handle(),
                    shutdown,
                    tasks: Some(tasks),
                },
            );
        }
        Ok(Self { nodes, deliveries })
    }

    pub fn node(&self, id: &str) -> &NodeHandle {
        &self.nodes[id].handle
    }

    pub async fn stop_node(&mut self, id: &str) -> Result<()> {
        if let Some(node) = self.nodes.get_mut(id) {
            node.stop().await?;
        }
        Ok(())
    }

    pub async fn shutdown(mut self) -> Result<()> {
        for node in self.nodes.values_mut() {
            node.stop().await?;
        }
        Ok(())
    }

    /// Everything delivered so far, in arrival order.
    pub fn drain_deliveries(&mut self) -> Vec<Delivery> {
        let mut out = Vec::new();
        while let Ok(d) = self.deliveries.try_recv() {
            out.push(d);
        }
        out
    }
}

pub async fn settle(secs: u64) {
    tokio::time::sleep(Duration::from_secs(secs)).await;
}
