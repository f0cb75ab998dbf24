//! Node status and routing table commands.

use anyhow::Result;
use serde::Deserialize;

use super::http::{base_url, get_json};

// ── Response types ────────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct StatusResponse {
    node_id: String,
    algorithm: String,
    neighbors: Vec<NeighborInfo>,
    routes: usize,
    counters: Counters,
}

#[derive(Deserialize)]
struct NeighborInfo {
    id: String,
    up: bool,
    cost: Option<f64>,
}

#[derive(Deserialize)]
struct Counters {
    packets_received: u64,
    packets_dropped_ttl: u64,
    packets_malformed: u64,
    messages_delivered: u64,
    messages_forwarded: u64,
}

#[derive(Deserialize)]
struct RoutesResponse {
    routes: Vec<RouteRow>,
}

#[derive(Deserialize)]
struct RouteRow {
    destination: String,
    next_hop: String,
    cost: f64,
}

// ── Commands ──────────────────────────────────────────────────────────────────

pub async fn cmd_status(port: u16) -> Result<()> {
    let resp: StatusResponse = get_json(&format!("{}/status", base_url(port))).await?;

    println!("═══════════════════════════════════════");
    println!("  Node {} ({})", resp.node_id, resp.algorithm);
    println!("═══════════════════════════════════════");
    println!("  Routes             : {}", resp.routes);
    println!("  Packets received   : {}", resp.counters.packets_received);
    println!("  Dropped (ttl)      : {}", resp.counters.packets_dropped_ttl);
    println!("  Malformed          : {}", resp.counters.packets_malformed);
    println!("  Messages delivered : {}", resp.counters.messages_delivered);
    println!("  Messages forwarded : {}", resp.counters.messages_forwarded);

    if resp.neighbors.is_empty() {
        println!("\n  No neighbors configured.");
        return Ok(());
    }

    println!("\n  Neighbors:");
    for n in &resp.neighbors {
        let cost = match n.cost {
            Some(c) => format!("{:.1}", c),
            None => "-".to_string(),
        };
        let state = if n.up { "up" } else { "down" };
        println!("  {:<12} {:<5} {:>8}", n.id, state, cost);
    }

    Ok(())
}

pub async fn cmd_routes(port: u16) -> Result<()> {
    let resp: RoutesResponse = get_json(&format!("{}/routes", base_url(port))).await?;

    if resp.routes.is_empty() {
        println!("No routes.");
        return Ok(());
    }

    println!("═══════════════════════════════════════");
    println!("  Routing table ({})", resp.routes.len());
    println!("═══════════════════════════════════════");
    println!("  {:<12} {:>10}  next", "dest", "cost");
    for r in &resp.routes {
        println!("  {:<12} {:>10.1}  {}", r.destination, r.cost, r.next_hop);
    }

    Ok(())
}
