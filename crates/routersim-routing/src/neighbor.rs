//! Neighbor cost tracking.
//!
//! Costs come from two places: the initial topology, and round-trip times
//! measured by hello/echo probes. Every cost is clamped to at least one unit
//! so that RTT noise or clock skew can never produce a zero or negative link.

use std::collections::BTreeMap;
use std::time::Instant;

use routersim_core::NodeId;

use crate::cost_differs;

/// Cost given to a neighbor before anything has been measured.
pub const DEFAULT_NEIGHBOR_COST: f64 = 1.0;

/// Smallest cost a link can have.
pub const MIN_LINK_COST: f64 = 1.0;

#[derive(Debug, Clone, PartialEq)]
pub struct NeighborEntry {
    pub cost: f64,
    /// Time of the last RTT sample. None until the first echo arrives.
    pub last_seen_at: Option<Instant>,
}

impl NeighborEntry {
    fn with_cost(cost: f64) -> Self {
        Self {
            cost: clamp_cost(cost),
            last_seen_at: None,
        }
    }
}

/// Per-neighbor cost map. Iteration is always in sorted id order.
#[derive(Debug, Clone, Default)]
pub struct NeighborCostTracker {
    entries: BTreeMap<NodeId, NeighborEntry>,
}

impl NeighborCostTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed from the topology's initial costs.
    pub fn with_costs(initial: &BTreeMap<NodeId, f64>) -> Self {
        Self {
            entries: initial
                .iter()
                .map(|(id, cost)| (id.clone(), NeighborEntry::with_cost(*cost)))
                .collect(),
        }
    }

    /// Reconcile tracked neighbors with `ids`.
    ///
    /// Drops neighbors that are gone, adds new ones at the default cost, and
    /// leaves existing costs alone. Returns true if membership changed.
    pub fn set_neighbor_set<I>(&mut self, ids: I) -> bool
    where
        I: IntoIterator<Item = NodeId>,
    {
        let wanted: BTreeMap<NodeId, ()> = ids.into_iter().map(|id| (id, ())).collect();
        let before = self.entries.len();
        self.entries.retain(|id, _| wanted.contains_key(id));
        let mut changed = self.entries.len() != before;

        for id in wanted.into_keys() {
            if !self.entries.contains_key(&id) {
                self.entries
                    .insert(id, NeighborEntry::with_cost(DEFAULT_NEIGHBOR_COST));
                changed = true;
            }
        }
        changed
    }

    /// Record an RTT sample: cost = max(1, rtt). Returns true if the cost changed.
    pub fn record_rtt_sample(&mut self, neighbor: &str, rtt_ms: f64) -> bool {
        let cost = clamp_cost(rtt_ms);
        let now = Instant::now();
        match self.entries.get_mut(neighbor) {
            Some(entry) => {
                let changed = cost_differs(entry.cost, cost);
                entry.cost = cost;
                entry.last_seen_at = Some(now);
                changed
            }
            None => {
                self.entries.insert(
                    neighbor.to_string(),
                    NeighborEntry {
                        cost,
                        last_seen_at: Some(now),
                    },
                );
                true
            }
        }
    }

    pub fn cost(&self, neighbor: &str) -> Option<f64> {
        self.entries.get(neighbor).map(|e| e.cost)
    }

    pub fn entry(&self, neighbor: &str) -> Option<&NeighborEntry> {
        self.entries.get(neighbor)
    }

    pub fn contains(&self, neighbor: &str) -> bool {
        self.entries.contains_key(neighbor)
    }

    pub fn ids(&self) -> impl Iterator<Item = &NodeId> {
        self.entries.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&NodeId, &NeighborEntry)> {
        self.entries.iter()
    }

    /// Snapshot of `neighbor -> cost`.
    pub fn costs(&self) -> BTreeMap<NodeId, f64> {
        self.entries
            .iter()
            .map(|(id, e)| (id.clone(), e.cost))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn clamp_cost(cost: f64) -> f64 {
    if cost.is_nan() {
        MIN_LINK_COST
    } else {
        cost.max(MIN_LINK_COST)
    }
}
