//! Routing table: destination to next hop, derived by DV or SPF.
//!
//! Tables are built whole and published as an `Arc` snapshot. Nothing ever
//! edits a published table in place.

use std::collections::BTreeMap;
use std::fmt;

use routersim_core::NodeId;

#[derive(Debug, Clone, PartialEq)]
pub struct Route {
    pub next_hop: NodeId,
    pub cost: f64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RoutingTable {
    routes: BTreeMap<NodeId, Route>,
}

impl RoutingTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_hop(&self, destination: &str) -> Option<&NodeId> {
        self.routes.get(destination).map(|r| &r.next_hop)
    }

    pub fn get(&self, destination: &str) -> Option<&Route> {
        self.routes.get(destination)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&NodeId, &Route)> {
        self.routes.iter()
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

impl FromIterator<(NodeId, Route)> for RoutingTable {
    fn from_iter<I: IntoIterator<Item = (NodeId, Route)>>(iter: I) -> Self {
        Self {
            routes: iter.into_iter().collect(),
        }
    }
}

impl fmt::Display for RoutingTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{:<12} {:>10}  next", "dest", "cost")?;
        for (dest, route) in &self.routes {
            writeln!(f, "{:<12} {:>10.1}  {}", dest, route.cost, route.next_hop)?;
        }
        Ok(())
    }
}
