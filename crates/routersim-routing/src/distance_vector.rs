//! Distance-vector routing (Bellman-Ford).
//!
//! Each node keeps the last vector every neighbor advertised and recomputes
//! its own vector from scratch whenever a vector or a link cost changes:
//!
//! ```text
//! D(self, self) = 0
//! D(self, d)    = min over neighbors n of  c(self, n) + D_n(d)
//! ```
//!
//! where `D_n(n) = 0` always. Advertisements use split horizon with poison
//! reverse: a route learned through `n` is advertised back to `n` as +inf.
//!
//! Destinations that lose every path stay in the vector at +inf with no next
//! hop, so they are advertised as unreachable instead of silently vanishing.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use routersim_core::NodeId;

use crate::neighbor::NeighborCostTracker;
use crate::table::{Route, RoutingTable};
use crate::{cost_differs, INFINITY};

#[derive(Debug, Clone, PartialEq)]
pub struct DistanceEntry {
    pub cost: f64,
    pub next_hop: Option<NodeId>,
}

impl DistanceEntry {
    fn unreachable() -> Self {
        Self {
            cost: INFINITY,
            next_hop: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct DistanceVectorAlgorithm {
    node_id: NodeId,
    vector: BTreeMap<NodeId, DistanceEntry>,
    neighbor_vectors: BTreeMap<NodeId, BTreeMap<NodeId, f64>>,
    table: Arc<RoutingTable>,
}

impl DistanceVectorAlgorithm {
    pub fn new(node_id: impl Into<NodeId>) -> Self {
        let node_id = node_id.into();
        let mut vector = BTreeMap::new();
        vector.insert(
            node_id.clone(),
            DistanceEntry {
                cost: 0.0,
                next_hop: None,
            },
        );
        Self {
            node_id,
            vector,
            neighbor_vectors: BTreeMap::new(),
            table: Arc::new(RoutingTable::new()),
        }
    }

    /// Store `from`'s vector verbatim and recompute. Returns true if our own
    /// vector changed.
    pub fn on_advertisement(
        &mut self,
        tracker: &NeighborCostTracker,
        from: &str,
        vector: BTreeMap<NodeId, f64>,
    ) -> bool {
        self.neighbor_vectors.insert(from.to_string(), vector);
        self.recompute(tracker)
    }

    /// Drop stored vectors of nodes that are no longer neighbors.
    pub fn forget_neighbors_not_in(&mut self, tracker: &NeighborCostTracker) {
        self.neighbor_vectors.retain(|id, _| tracker.contains(id));
    }

    /// Rebuild the whole vector. Returns true if any cost or next hop moved.
    pub fn recompute(&mut self, tracker: &NeighborCostTracker) -> bool {
        let mut destinations: BTreeSet<NodeId> = self.vector.keys().cloned().collect();
        destinations.insert(self.node_id.clone());
        for (neighbor, _) in tracker.iter() {
            destinations.insert(neighbor.clone());
            if let Some(advertised) = self.neighbor_vectors.get(neighbor) {
                destinations.extend(advertised.keys().cloned());
            }
        }

        let mut next = BTreeMap::new();
        for dest in destinations {
            let entry = if dest == self.node_id {
                DistanceEntry {
                    cost: 0.0,
                    next_hop: None,
                }
            } else {
                self.best_path(tracker, &dest)
            };
            next.insert(dest, entry);
        }

        let changed = next.len() != self.vector.len()
            || next.iter().any(|(dest, entry)| match self.vector.get(dest) {
                Some(old) => cost_differs(old.cost, entry.cost) || old.next_hop != entry.next_hop,
                None => true,
            });

        self.vector = next;
        self.table = Arc::new(self.build_table());
        changed
    }

    fn best_path(&self, tracker: &NeighborCostTracker, dest: &str) -> DistanceEntry {
        let mut best = DistanceEntry::unreachable();
        // Sorted iteration, strict improvement: ties keep the smallest id.
        for (neighbor, entry) in tracker.iter() {
            let tail = if neighbor == dest {
                0.0
            } else {
                self.neighbor_vectors
                    .get(neighbor)
                    .and_then(|v| v.get(dest))
                    .copied()
                    .unwrap_or(INFINITY)
            };
            let candidate = entry.cost + tail;
            if candidate.is_finite() && candidate < best.cost {
                best = DistanceEntry {
                    cost: candidate,
                    next_hop: Some(neighbor.clone()),
                };
            }
        }
        best
    }

    fn build_table(&self) -> RoutingTable {
        self.vector
            .iter()
            .filter_map(|(dest, entry)| {
                let hop = entry.next_hop.as_ref()?;
                entry.cost.is_finite().then(|| {
                    (
                        dest.clone(),
                        Route {
                            next_hop: hop.clone(),
                            cost: entry.cost,
                        },
                    )
                })
            })
            .collect()
    }

    /// Our vector as seen by `neighbor`: routes through it are poisoned.
    pub fn advertisement_for(&self, neighbor: &str) -> BTreeMap<NodeId, f64> {
        self.vector
            .iter()
            .map(|(dest, entry)| {
                let cost = match &entry.next_hop {
                    Some(hop) if hop == neighbor => INFINITY,
                    _ => entry.cost,
                };
                (dest.clone(), cost)
            })
            .collect()
    }

    /// One poisoned vector per tracked neighbor.
    pub fn advertisements(
        &self,
        tracker: &NeighborCostTracker,
    ) -> BTreeMap<NodeId, BTreeMap<NodeId, f64>> {
        tracker
            .ids()
            .map(|n| (n.clone(), self.advertisement_for(n)))
            .collect()
    }

    pub fn vector(&self) -> &BTreeMap<NodeId, DistanceEntry> {
        &self.vector
    }

    pub fn neighbor_vector(&self, neighbor: &str) -> Option<&BTreeMap<NodeId, f64>> {
        self.neighbor_vectors.get(neighbor)
    }

    pub fn table(&self) -> Arc<RoutingTable> {
        Arc::clone(&self.table)
    }

    pub fn node_id(&self) -> &str {
        &self.node_id
    }
}
