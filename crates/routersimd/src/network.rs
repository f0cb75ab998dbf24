//! Topology resolution and node construction.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};

use routersim_core::{Names, RouterConfig, Topology, TopologyError, TransportKind};
use routersim_services::{
    new_broker, AddressBook, ChannelTransport, DeliverySender, EngineConfig, NodeEngine,
    TcpTransport,
};

/// Topology plus names, as loaded from disk.
pub struct NetworkPlan {
    pub topology: Topology,
    pub names: Names,
}

/// First of: the CLI path, the configured path, `default` if it exists.
pub fn pick_path(cli: Option<&Path>, configured: &Path, default: PathBuf) -> Option<PathBuf> {
    if let Some(p) = cli {
        return Some(p.to_path_buf());
    }
    if !configured.as_os_str().is_empty() {
        return Some(configured.to_path_buf());
    }
    default.exists().then_some(default)
}

impl NetworkPlan {
    pub fn load(topo: Option<PathBuf>, names: Option<PathBuf>) -> Result<Self> {
        let topo = topo.context("no topology file (use --topo or [topology] topo_path)")?;
        let topology = Topology::load(&topo)?;
        let names = match names {
            Some(path) => Names::load(&path)?,
            None => Names::default(),
        };
        tracing::info!(
            topo = %topo.display(),
            nodes = topology.node_ids().len(),
            "topology loaded"
        );
        Ok(Self { topology, names })
    }

    fn check_known(&self, id: &str) -> Result<(), TopologyError> {
        if self.topology.contains(id) || self.names.address_of(id).is_some() {
            Ok(())
        } else {
            Err(TopologyError::UnknownNode(id.to_string()))
        }
    }
}

/// Build the engines this process runs.
///
/// TCP runs the one configured node. Channel runs every node of the
/// topology on a shared in-process broker.
pub fn build_nodes(
    config: &RouterConfig,
    plan: &NetworkPlan,
    delivery: &DeliverySender,
) -> Result<Vec<NodeEngine>> {
    match config.transport.kind {
        TransportKind::Tcp => {
            let id = config.node.id.as_str();
            anyhow::ensure!(!id.is_empty(), "node id required for tcp transport (use --id)");
            plan.check_known(id)?;

            let book = AddressBook::new(
                config.transport.host.clone(),
                config.transport.base_port,
                &plan.names,
            );
            let transport = Arc::new(TcpTransport::new(id, book));
            let engine = NodeEngine::new(
                EngineConfig::from_router_config(config),
                plan.topology.neighbors_of(id),
                transport,
                delivery.clone(),
            );
            Ok(vec![engine])
        }
        TransportKind::Channel => {
            if !config.node.id.is_empty() {
                plan.check_known(&config.node.id)?;
            }
            let broker = new_broker();
            let engines = plan
                .topology
                .node_ids()
                .into_iter()
                .map(|id| {
                    let mut engine_config = EngineConfig::from_router_config(config);
                    engine_config.node_id = id.clone();
                    let transport = Arc::new(ChannelTransport::new(
                        id.clone(),
                        plan.names.clone(),
                        broker.clone(),
                    ));
                    NodeEngine::new(
                        engine_config,
                        plan.topology.neighbors_of(&id),
                        transport,
                        delivery.clone(),
                    )
                })
                .collect();
            Ok(engines)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    fn plan() -> NetworkPlan {
        NetworkPlan {
            topology: Topology::from_json(
                r#"{"type":"topo","config":{"A":["B"],"B":["A","C"],"C":["B"]}}"#,
                "test",
            )
            .unwrap(),
            names: Names::default(),
        }
    }

    #[test]
    fn cli_path_wins_over_config() {
        let picked = pick_path(
            Some(Path::new("/cli/topo.json")),
            Path::new("/cfg/topo.json"),
            PathBuf::from("/nonexistent/topo.json"),
        );
        assert_eq!(picked, Some(PathBuf::from("/cli/topo.json")));

        let picked = pick_path(None, Path::new(""), PathBuf::from("/nonexistent/topo.json"));
        assert!(picked.is_none());
    }

    #[test]
    fn channel_transport_builds_every_node() {
        let mut config = RouterConfig::default();
        config.transport.kind = TransportKind::Channel;
        let (tx, _rx) = mpsc::unbounded_channel();
        let nodes = build_nodes(&config, &plan(), &tx).unwrap();
        let ids: Vec<String> = nodes.iter().map(|n| n.handle().node_id().to_string()).collect();
        assert_eq!(ids, vec!["A", "B", "C"]);
    }

    #[test]
    fn tcp_transport_needs_a_known_id() {
        let mut config = RouterConfig::default();
        let (tx, _rx) = mpsc::unbounded_channel();
        assert!(build_nodes(&config, &plan(), &tx).is_err());

        config.node.id = "Z".to_string();
        assert!(build_nodes(&config, &plan(), &tx).is_err());

        config.node.id = "B".to_string();
        assert_eq!(build_nodes(&config, &plan(), &tx).unwrap().len(), 1);
    }
}
