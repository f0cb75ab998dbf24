//! Link-state routing.
//!
//! Every node originates a link-state packet (LSP) listing its direct link
//! costs, floods it, and keeps the newest LSP it has received from every
//! other origin in its link-state database (LSDB). The routing table is the
//! result of SPF over the graph the LSDB describes.
//!
//! Duplicate suppression is by `(origin, seq)`. A record is stored whenever
//! its key is new, even if its sequence number is lower than the stored one:
//! an origin that restarts from seq 1 is believed immediately.

use std::collections::{BTreeMap, HashSet, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};

use routersim_core::NodeId;
use serde::{Deserialize, Serialize};

use crate::advertisement::cost_map;
use crate::neighbor::NeighborCostTracker;
use crate::spf::{shortest_paths, Graph};
use crate::table::{Route, RoutingTable};

pub const DEFAULT_LSP_SEEN_CAPACITY: usize = 10_000;
pub const DEFAULT_LSP_SEEN_WINDOW: Duration = Duration::from_secs(300);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkStateRecord {
    pub origin: NodeId,
    pub seq: u64,
    #[serde(with = "cost_map")]
    pub links: BTreeMap<NodeId, f64>,
}

type LspKey = (NodeId, u64);

/// `(origin, seq)` keys seen recently. Bounded by count and by age.
#[derive(Debug, Clone)]
pub struct SeenAdvertisements {
    capacity: usize,
    window: Duration,
    order: VecDeque<(LspKey, Instant)>,
    members: HashSet<LspKey>,
}

impl SeenAdvertisements {
    pub fn new(capacity: usize, window: Duration) -> Self {
        Self {
            capacity: capacity.max(1),
            window,
            order: VecDeque::new(),
            members: HashSet::new(),
        }
    }

    pub fn insert(&mut self, origin: &str, seq: u64) -> bool {
        self.insert_at((origin.to_string(), seq), Instant::now())
    }

    /// Returns true if the key was new.
    pub fn insert_at(&mut self, key: LspKey, now: Instant) -> bool {
        self.prune(now);
        if self.members.contains(&key) {
            return false;
        }
        self.members.insert(key.clone());
        self.order.push_back((key, now));
        while self.order.len() > self.capacity {
            if let Some((old, _)) = self.order.pop_front() {
                self.members.remove(&old);
            }
        }
        true
    }

    fn prune(&mut self, now: Instant) {
        while let Some((key, at)) = self.order.front() {
            if now.saturating_duration_since(*at) <= self.window {
                break;
            }
            self.members.remove(key);
            self.order.pop_front();
        }
    }

    pub fn contains(&self, origin: &str, seq: u64) -> bool {
        self.members.contains(&(origin.to_string(), seq))
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

impl Default for SeenAdvertisements {
    fn default() -> Self {
        Self::new(DEFAULT_LSP_SEEN_CAPACITY, DEFAULT_LSP_SEEN_WINDOW)
    }
}

#[derive(Debug, Clone)]
pub struct LinkStateAlgorithm {
    node_id: NodeId,
    seq: u64,
    lsdb: BTreeMap<NodeId, LinkStateRecord>,
    seen: SeenAdvertisements,
    table: Arc<RoutingTable>,
    spf_runs: u64,
}

impl LinkStateAlgorithm {
    pub fn new(node_id: impl Into<NodeId>, seen: SeenAdvertisements) -> Self {
        Self {
            node_id: node_id.into(),
            seq: 0,
            lsdb: BTreeMap::new(),
            seen,
            table: Arc::new(RoutingTable::new()),
            spf_runs: 0,
        }
    }

    /// New LSP for our current links. Bumps seq, stores it in our own LSDB
    /// and seen set, and reruns SPF.
    pub fn originate(&mut self, tracker: &NeighborCostTracker) -> LinkStateRecord {
        self.seq += 1;
        let record = LinkStateRecord {
            origin: self.node_id.clone(),
            seq: self.seq,
            links: tracker.costs(),
        };
        self.seen.insert(&record.origin, record.seq);
        self.lsdb.insert(self.node_id.clone(), record.clone());
        self.recompute(tracker);
        record
    }

    /// Accept an LSP from the network. Returns true if it was new, in which
    /// case the caller should reflood it. Duplicates do not trigger SPF.
    pub fn on_advertisement(
        &mut self,
        tracker: &NeighborCostTracker,
        record: LinkStateRecord,
    ) -> bool {
        if !self.seen.insert(&record.origin, record.seq) {
            return false;
        }
        if record.origin == self.node_id {
            // Someone is reflooding one of ours; our own links are authoritative.
            return true;
        }
        if let Some(stored) = self.lsdb.get(&record.origin) {
            if record.seq < stored.seq {
                tracing::debug!(
                    origin = %record.origin,
                    stored = stored.seq,
                    received = record.seq,
                    "accepting LSP with lower seq"
                );
            }
        }
        self.lsdb.insert(record.origin.clone(), record);
        self.recompute(tracker);
        true
    }

    /// Rerun SPF over the LSDB and our live links.
    pub fn recompute(&mut self, tracker: &NeighborCostTracker) {
        let graph = self.graph(tracker);
        let result = shortest_paths(&graph, &self.node_id);
        self.spf_runs += 1;

        self.table = Arc::new(
            result
                .next_hop
                .into_iter()
                .filter_map(|(dest, hop)| {
                    let cost = *result.distance.get(&dest)?;
                    Some((dest, Route { next_hop: hop, cost }))
                })
                .collect(),
        );
    }

    /// Undirected graph from every LSP except ours, plus our tracker's links.
    ///
    /// A link reported only by one side is still usable in both directions.
    /// When both sides report it, each direction keeps its own reported cost.
    /// Records are never aged out of the LSDB, so a dead node whose last LSP
    /// is still stored stays reachable through the edges that LSP reported.
    pub fn graph(&self, tracker: &NeighborCostTracker) -> Graph {
        let mut graph = Graph::new();
        for (origin, record) in &self.lsdb {
            if *origin == self.node_id {
                continue;
            }
            for (neighbor, cost) in &record.links {
                if !cost.is_finite() || *cost < 0.0 || neighbor == origin {
                    continue;
                }
                graph
                    .entry(origin.clone())
                    .or_default()
                    .insert(neighbor.clone(), *cost);
                graph
                    .entry(neighbor.clone())
                    .or_default()
                    .entry(origin.clone())
                    .or_insert(*cost);
            }
        }

        let own = tracker.costs();
        for (neighbor, cost) in &own {
            graph
                .entry(neighbor.clone())
                .or_default()
                .entry(self.node_id.clone())
                .or_insert(*cost);
        }
        graph.insert(self.node_id.clone(), own);
        graph
    }

    pub fn seq(&self) -> u64 {
        self.seq
    }

    pub fn spf_runs(&self) -> u64 {
        self.spf_runs
    }

    pub fn lsdb(&self) -> &BTreeMap<NodeId, LinkStateRecord> {
        &self.lsdb
    }

    pub fn own_record(&self) -> Option<&LinkStateRecord> {
        self.lsdb.get(&self.node_id)
    }

    pub fn table(&self) -> Arc<RoutingTable> {
        Arc::clone(&self.table)
    }
}
