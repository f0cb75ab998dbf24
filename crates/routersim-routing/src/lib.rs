//! Per-node routing state.
//!
//! Everything in here is synchronous and owned by a single node. The engine
//! in `routersim-services` wraps a [`RoutingStrategy`] in a lock and drives
//! it from the hello timer, the info timer and the dispatch loop.

pub mod advertisement;
pub mod distance_vector;
pub mod flooding;
pub mod link_state;
pub mod neighbor;
pub mod spf;
pub mod strategy;
pub mod table;

pub use advertisement::InfoPayload;
pub use distance_vector::{DistanceEntry, DistanceVectorAlgorithm};
pub use flooding::{FloodSeenSet, FloodingAlgorithm};
pub use link_state::{LinkStateAlgorithm, LinkStateRecord, SeenAdvertisements};
pub use neighbor::{NeighborCostTracker, NeighborEntry};
pub use strategy::{Advertisement, Reaction, RoutingStrategy, StrategyLimits};
pub use table::{Route, RoutingTable};

/// Cost of an unreachable destination.
pub const INFINITY: f64 = f64::INFINITY;

/// Costs closer than this are the same cost.
pub const COST_EPSILON: f64 = 1e-9;

/// True if two costs differ. Two infinities are equal.
pub fn cost_differs(a: f64, b: f64) -> bool {
    match (a.is_finite(), b.is_finite()) {
        (false, false) => false,
        (true, true) => (a - b).abs() > COST_EPSILON,
        _ => true,
    }
}
