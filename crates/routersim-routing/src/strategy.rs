//! `RoutingStrategy`: the one interface the engine talks to.
//!
//! The variant is picked once, at construction, from the configured
//! [`Algorithm`]. Every operation takes `&mut self` so the caller decides how
//! the state is shared; the engine keeps it behind a single async mutex.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use routersim_core::{Algorithm, NodeId};

use crate::advertisement::InfoPayload;
use crate::distance_vector::DistanceVectorAlgorithm;
use crate::flooding::{FloodingAlgorithm, DEFAULT_FLOOD_SEEN_CAPACITY};
use crate::link_state::{
    LinkStateAlgorithm, SeenAdvertisements, DEFAULT_LSP_SEEN_CAPACITY, DEFAULT_LSP_SEEN_WINDOW,
};
use crate::neighbor::NeighborCostTracker;
use crate::table::RoutingTable;

/// What the engine should do after feeding the strategy an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reaction {
    None,
    /// Send our own advertisement to every live neighbor now.
    Readvertise,
    /// Relay the inbound advertisement to every live neighbor but the sender.
    Reflood,
}

/// Output of `build_advertisement`.
#[derive(Debug, Clone, PartialEq)]
pub enum Advertisement {
    /// Flooding has nothing to advertise.
    None,
    /// Distance vector: one poisoned vector per neighbor.
    PerNeighbor(BTreeMap<NodeId, InfoPayload>),
    /// Link state: the same LSP for everyone.
    Shared(InfoPayload),
}

impl Advertisement {
    /// Payload for `neighbor`, if any.
    pub fn for_neighbor(&self, neighbor: &str) -> Option<&InfoPayload> {
        match self {
            Advertisement::None => None,
            Advertisement::PerNeighbor(map) => map.get(neighbor),
            Advertisement::Shared(payload) => Some(payload),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct StrategyLimits {
    pub flood_seen_capacity: usize,
    pub lsp_seen_capacity: usize,
    pub lsp_seen_window: Duration,
}

impl Default for StrategyLimits {
    fn default() -> Self {
        Self {
            flood_seen_capacity: DEFAULT_FLOOD_SEEN_CAPACITY,
            lsp_seen_capacity: DEFAULT_LSP_SEEN_CAPACITY,
            lsp_seen_window: DEFAULT_LSP_SEEN_WINDOW,
        }
    }
}

#[derive(Debug, Clone)]
enum StrategyKind {
    Flooding(FloodingAlgorithm),
    DistanceVector(DistanceVectorAlgorithm),
    LinkState(LinkStateAlgorithm),
}

#[derive(Debug, Clone)]
pub struct RoutingStrategy {
    node_id: NodeId,
    neighbors: NeighborCostTracker,
    kind: StrategyKind,
}

impl RoutingStrategy {
    pub fn new(
        algorithm: Algorithm,
        node_id: impl Into<NodeId>,
        initial_costs: &BTreeMap<NodeId, f64>,
        limits: StrategyLimits,
    ) -> Self {
        let node_id = node_id.into();
        let neighbors = NeighborCostTracker::with_costs(initial_costs);
        let kind = match algorithm {
            Algorithm::Flooding => {
                StrategyKind::Flooding(FloodingAlgorithm::new(limits.flood_seen_capacity))
            }
            Algorithm::DistanceVector => {
                let mut dv = DistanceVectorAlgorithm::new(node_id.clone());
                dv.recompute(&neighbors);
                StrategyKind::DistanceVector(dv)
            }
            Algorithm::LinkState => {
                let seen = SeenAdvertisements::new(limits.lsp_seen_capacity, limits.lsp_seen_window);
                let mut ls = LinkStateAlgorithm::new(node_id.clone(), seen);
                ls.recompute(&neighbors);
                StrategyKind::LinkState(ls)
            }
        };
        Self {
            node_id,
            neighbors,
            kind,
        }
    }

    pub fn algorithm(&self) -> Algorithm {
        match self.kind {
            StrategyKind::Flooding(_) => Algorithm::Flooding,
            StrategyKind::DistanceVector(_) => Algorithm::DistanceVector,
            StrategyKind::LinkState(_) => Algorithm::LinkState,
        }
    }

    pub fn node_id(&self) -> &str {
        &self.node_id
    }

    /// Next hop toward `destination`. Always None under flooding.
    pub fn choose_next_hop(&self, destination: &str) -> Option<NodeId> {
        match &self.kind {
            StrategyKind::Flooding(_) => None,
            StrategyKind::DistanceVector(dv) => dv.table().next_hop(destination).cloned(),
            StrategyKind::LinkState(ls) => ls.table().next_hop(destination).cloned(),
        }
    }

    /// Payload(s) for the info timer. Link state originates a fresh LSP.
    pub fn build_advertisement(&mut self) -> Advertisement {
        match &mut self.kind {
            StrategyKind::Flooding(_) => Advertisement::None,
            StrategyKind::DistanceVector(dv) => Advertisement::PerNeighbor(
                dv.advertisements(&self.neighbors)
                    .into_iter()
                    .map(|(n, vector)| (n, InfoPayload::DistanceVector { vector }))
                    .collect(),
            ),
            StrategyKind::LinkState(ls) => {
                Advertisement::Shared(InfoPayload::LinkState(ls.originate(&self.neighbors)))
            }
        }
    }

    /// Feed an inbound advertisement from `from`.
    pub fn on_advertisement(&mut self, from: &str, payload: InfoPayload) -> Reaction {
        match (&mut self.kind, payload) {
            (StrategyKind::DistanceVector(dv), InfoPayload::DistanceVector { vector }) => {
                if !self.neighbors.contains(from) {
                    tracing::debug!(from = %from, "ignoring vector from non-neighbor");
                    return Reaction::None;
                }
                if dv.on_advertisement(&self.neighbors, from, vector) {
                    tracing::debug!(node = %self.node_id, from = %from, "distance vector changed");
                    Reaction::Readvertise
                } else {
                    Reaction::None
                }
            }
            (StrategyKind::LinkState(ls), InfoPayload::LinkState(record)) => {
                if ls.on_advertisement(&self.neighbors, record) {
                    Reaction::Reflood
                } else {
                    Reaction::None
                }
            }
            (_, payload) => {
                tracing::debug!(
                    node = %self.node_id,
                    kind = payload.kind(),
                    "ignoring advertisement for another algorithm"
                );
                Reaction::None
            }
        }
    }

    /// Feed an RTT measurement for `neighbor`.
    pub fn on_neighbor_rtt_sample(&mut self, neighbor: &str, rtt_ms: f64) -> Reaction {
        let cost_changed = self.neighbors.record_rtt_sample(neighbor, rtt_ms);
        match &mut self.kind {
            StrategyKind::Flooding(_) => Reaction::None,
            StrategyKind::DistanceVector(dv) => {
                if dv.recompute(&self.neighbors) {
                    Reaction::Readvertise
                } else {
                    Reaction::None
                }
            }
            StrategyKind::LinkState(ls) => {
                if cost_changed {
                    ls.recompute(&self.neighbors);
                    Reaction::Readvertise
                } else {
                    Reaction::None
                }
            }
        }
    }

    /// Replace the live neighbor set.
    pub fn on_neighbor_set_changed<I>(&mut self, ids: I) -> Reaction
    where
        I: IntoIterator<Item = NodeId>,
    {
        if !self.neighbors.set_neighbor_set(ids) {
            return Reaction::None;
        }
        match &mut self.kind {
            StrategyKind::Flooding(_) => Reaction::None,
            StrategyKind::DistanceVector(dv) => {
                dv.forget_neighbors_not_in(&self.neighbors);
                dv.recompute(&self.neighbors);
                Reaction::Readvertise
            }
            StrategyKind::LinkState(ls) => {
                ls.recompute(&self.neighbors);
                Reaction::Readvertise
            }
        }
    }

    /// Flood dedup. Table strategies forward everything they are handed.
    pub fn should_forward(&mut self, msg_id: &str) -> bool {
        match &mut self.kind {
            StrategyKind::Flooding(f) => f.should_forward(msg_id),
            _ => true,
        }
    }

    /// Current table snapshot. Empty under flooding.
    pub fn routing_table(&self) -> Arc<RoutingTable> {
        match &self.kind {
            StrategyKind::Flooding(_) => Arc::new(RoutingTable::new()),
            StrategyKind::DistanceVector(dv) => dv.table(),
            StrategyKind::LinkState(ls) => ls.table(),
        }
    }

    pub fn neighbors(&self) -> &NeighborCostTracker {
        &self.neighbors
    }
}
