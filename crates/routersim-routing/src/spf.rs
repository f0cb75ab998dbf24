//! Shortest-path-first over a weighted graph.
//!
//! Dijkstra with a binary heap and lazy deletion: stale heap entries are
//! skipped on pop instead of being decreased in place. Ties in distance are
//! broken on node id so the result does not depend on map iteration order.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BinaryHeap};

use routersim_core::NodeId;

/// `node -> (neighbor -> cost)`. Costs are finite and non-negative.
pub type Graph = BTreeMap<NodeId, BTreeMap<NodeId, f64>>;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SpfResult {
    /// Reachable destinations only. The source maps to 0.
    pub distance: BTreeMap<NodeId, f64>,
    /// First hop from the source toward each reachable destination.
    pub next_hop: BTreeMap<NodeId, NodeId>,
}

#[derive(Debug, PartialEq)]
struct HeapEntry {
    distance: f64,
    node: NodeId,
}

impl Eq for HeapEntry {}

// Reversed so that BinaryHeap (a max-heap) pops the smallest distance.
impl Ord for HeapEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .distance
            .total_cmp(&self.distance)
            .then_with(|| other.node.cmp(&self.node))
    }
}

impl PartialOrd for HeapEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

pub fn shortest_paths(graph: &Graph, source: &str) -> SpfResult {
    let mut distance: BTreeMap<NodeId, f64> = BTreeMap::new();
    let mut previous: BTreeMap<NodeId, NodeId> = BTreeMap::new();
    let mut heap = BinaryHeap::new();

    distance.insert(source.to_string(), 0.0);
    heap.push(HeapEntry {
        distance: 0.0,
        node: source.to_string(),
    });

    while let Some(HeapEntry { distance: d, node }) = heap.pop() {
        match distance.get(&node) {
            Some(best) if *best < d => continue,
            _ => {}
        }
        let Some(edges) = graph.get(&node) else {
            continue;
        };
        for (neighbor, weight) in edges {
            if !weight.is_finite() || *weight < 0.0 {
                continue;
            }
            let candidate = d + weight;
            let better = match distance.get(neighbor) {
                Some(existing) => candidate < *existing,
                None => true,
            };
            if better {
                distance.insert(neighbor.clone(), candidate);
                previous.insert(neighbor.clone(), node.clone());
                heap.push(HeapEntry {
                    distance: candidate,
                    node: neighbor.clone(),
                });
            }
        }
    }

    let mut next_hop = BTreeMap::new();
    for dest in distance.keys() {
        if dest == source {
            continue;
        }
        if let Some(hop) = first_hop(&previous, source, dest, distance.len()) {
            next_hop.insert(dest.clone(), hop);
        }
    }

    SpfResult { distance, next_hop }
}

/// Walk predecessors back from `dest` until the node whose predecessor is
/// `source`. Bounded by `limit` steps.
fn first_hop(
    previous: &BTreeMap<NodeId, NodeId>,
    source: &str,
    dest: &str,
    limit: usize,
) -> Option<NodeId> {
    let mut current = dest;
    for _ in 0..=limit {
        let prev = previous.get(current)?;
        if prev == source {
            return Some(current.to_string());
        }
        current = prev;
    }
    None
}
