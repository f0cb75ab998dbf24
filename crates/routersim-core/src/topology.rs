//! Topology and names files.
//!
//! Both are JSON documents with a `type` tag and a `config` body:
//!
//! ```text
//! {"type": "topo",  "config": {"A": ["B", "C"], "B": ["A"], "C": ["A"]}}
//! {"type": "topo",  "config": {"A": {"B": 1, "C": 5}}}
//! {"type": "names", "config": {"A": "127.0.0.1:50001", "B": "chan-b"}}
//! ```
//!
//! Neighbor lists without costs get unit cost. The routing core only ever
//! sees the resolved `neighbor -> initial cost` map of its own node.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::packet::NodeId;

#[derive(Deserialize)]
struct TaggedFile<T> {
    #[serde(rename = "type")]
    kind: String,
    config: T,
}

/// One node's neighbors, with or without explicit costs.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum NeighborSpec {
    Unit(Vec<NodeId>),
    Weighted(BTreeMap<NodeId, f64>),
}

/// The whole network's adjacency as written in the topology file.
#[derive(Debug, Clone, Default)]
pub struct Topology {
    nodes: BTreeMap<NodeId, NeighborSpec>,
}

impl Topology {
    pub fn load(path: &Path) -> Result<Self, TopologyError> {
        let text = read(path)?;
        Self::from_json(&text, &path.display().to_string())
    }

    pub fn from_json(text: &str, source: &str) -> Result<Self, TopologyError> {
        let file: TaggedFile<BTreeMap<NodeId, NeighborSpec>> = serde_json::from_str(text)
            .map_err(|e| TopologyError::Parse(source.to_string(), e))?;
        check_kind("topo", &file.kind)?;
        Ok(Self { nodes: file.config })
    }

    /// Neighbors of `id` with their initial costs. Unknown node = no neighbors.
    pub fn neighbors_of(&self, id: &str) -> BTreeMap<NodeId, f64> {
        match self.nodes.get(id) {
            Some(NeighborSpec::Unit(ids)) => ids
                .iter()
                .filter(|n| n.as_str() != id)
                .map(|n| (n.clone(), 1.0))
                .collect(),
            Some(NeighborSpec::Weighted(costs)) => costs
                .iter()
                .filter(|(n, _)| n.as_str() != id)
                .map(|(n, c)| (n.clone(), *c))
                .collect(),
            None => BTreeMap::new(),
        }
    }

    pub fn contains(&self, id: &str) -> bool {
        self.nodes.contains_key(id)
    }

    /// Every node named in the file, as a key or as someone's neighbor.
    pub fn node_ids(&self) -> Vec<NodeId> {
        let mut ids: Vec<NodeId> = self.nodes.keys().cloned().collect();
        for id in self.nodes.keys() {
            ids.extend(self.neighbors_of(id).into_keys());
        }
        ids.sort();
        ids.dedup();
        ids
    }
}

/// Node id → transport address or channel name.
#[derive(Debug, Clone, Default)]
pub struct Names {
    names: BTreeMap<NodeId, String>,
}

impl Names {
    pub fn load(path: &Path) -> Result<Self, TopologyError> {
        let text = read(path)?;
        Self::from_json(&text, &path.display().to_string())
    }

    pub fn from_json(text: &str, source: &str) -> Result<Self, TopologyError> {
        let file: TaggedFile<BTreeMap<NodeId, String>> = serde_json::from_str(text)
            .map_err(|e| TopologyError::Parse(source.to_string(), e))?;
        check_kind("names", &file.kind)?;
        Ok(Self { names: file.config })
    }

    pub fn from_map(names: BTreeMap<NodeId, String>) -> Self {
        Self { names }
    }

    pub fn address_of(&self, id: &str) -> Option<&str> {
        self.names.get(id).map(String::as_str)
    }

    /// Channel a node listens on. Defaults to the node id itself.
    pub fn channel_of(&self, id: &str) -> String {
        self.address_of(id).unwrap_or(id).to_string()
    }

    pub fn ids(&self) -> impl Iterator<Item = &NodeId> {
        self.names.keys()
    }

    pub fn as_map(&self) -> &BTreeMap<NodeId, String> {
        &self.names
    }
}

fn read(path: &Path) -> Result<String, TopologyError> {
    std::fs::read_to_string(path).map_err(|e| TopologyError::Read(path.to_path_buf(), e))
}

fn check_kind(expected: &'static str, found: &str) -> Result<(), TopologyError> {
    if found == expected {
        Ok(())
    } else {
        Err(TopologyError::WrongKind {
            expected,
            found: found.to_string(),
        })
    }
}

// ── Errors ────────────────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum TopologyError {
    #[error("failed to read {0}: {1}")]
    Read(PathBuf, std::io::Error),
    #[error("failed to parse {0}: {1}")]
    Parse(String, serde_json::Error),
    #[error("expected a \"{expected}\" file, found \"{found}\"")]
    WrongKind {
        expected: &'static str,
        found: String,
    },
    #[error("node {0} is not part of the topology")]
    UnknownNode(NodeId),
}
