//! routersimd — router node simulator daemon.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

use routersim_core::config::config_dir;
use routersim_core::{Algorithm, RouterConfig, TransportKind};
use routersim_services::{Delivery, Inbox, NodeHandle};

mod network;

use network::{build_nodes, pick_path, NetworkPlan};

#[derive(Parser, Debug)]
#[command(name = "routersimd")]
#[command(about = "Packet-switched router node simulator")]
struct Args {
    /// Node id. With --transport channel, the node that serves the API and --send.
    #[arg(long)]
    id: Option<String>,

    /// Routing algorithm: flooding, dvr or lsr
    #[arg(long)]
    algo: Option<Algorithm>,

    /// Directory holding config.toml, topo.json and names.json
    #[arg(long)]
    config_dir: Option<PathBuf>,

    /// Topology JSON file
    #[arg(long)]
    topo: Option<PathBuf>,

    /// Names JSON file
    #[arg(long)]
    names: Option<PathBuf>,

    /// Transport: tcp or channel
    #[arg(long)]
    transport: Option<TransportKind>,

    /// Hello interval in milliseconds
    #[arg(long, value_name = "MS")]
    hello_interval: Option<u64>,

    /// Info interval in milliseconds
    #[arg(long, value_name = "MS")]
    info_interval: Option<u64>,

    /// Local HTTP API port (0 = off)
    #[arg(long)]
    api_port: Option<u16>,

    /// Log filter, e.g. "debug" or "routersim_services=trace"
    #[arg(long)]
    log: Option<String>,

    /// Send one message once routes settle, then exit
    #[arg(long, num_args = 2, value_names = ["DEST", "TEXT"])]
    send: Option<Vec<String>>,
}

impl Args {
    fn apply(&self, config: &mut RouterConfig) {
        if let Some(id) = &self.id {
            config.node.id = id.clone();
        }
        if let Some(algo) = self.algo {
            config.node.algorithm = algo;
        }
        if let Some(kind) = self.transport {
            config.transport.kind = kind;
        }
        if let Some(ms) = self.hello_interval {
            config.timers.hello_interval_ms = ms;
        }
        if let Some(ms) = self.info_interval {
            config.timers.info_interval_ms = ms;
        }
        if let Some(port) = self.api_port {
            config.api.port = port;
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let filter = match &args.log {
        Some(level) => EnvFilter::new(level),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    // Load config
    let dir = args.config_dir.clone().unwrap_or_else(config_dir);
    let config_path = match &args.config_dir {
        Some(d) => d.join("config.toml"),
        None => RouterConfig::file_path(),
    };
    if let Err(e) = RouterConfig::write_default_if_missing(&config_path) {
        tracing::warn!(error = %e, "failed to write default config");
    }
    let mut config = RouterConfig::load_at(&config_path).unwrap_or_else(|e| {
        tracing::warn!(error = %e, "failed to load config, using defaults");
        RouterConfig::default()
    });
    args.apply(&mut config);

    let topo = pick_path(
        args.topo.as_deref(),
        &config.topology.topo_path,
        dir.join("topo.json"),
    );
    let names = pick_path(
        args.names.as_deref(),
        &config.topology.names_path,
        dir.join("names.json"),
    );
    let plan = NetworkPlan::load(topo, names)?;

    tracing::info!(
        id = %config.node.id,
        algorithm = %config.node.algorithm,
        transport = ?config.transport.kind,
        "routersimd starting"
    );

    // ── Shutdown channel ─────────────────────────────────────────────────────
    let (shutdown_tx, _) = tokio::sync::broadcast::channel::<()>(1);

    {
        let shutdown = shutdown_tx.clone();
        tokio::spawn(async move {
            tokio::signal::ctrl_c().await.ok();
            tracing::info!("shutdown signal received");
            let _ = shutdown.send(());
        });
    }

    // ── Nodes ────────────────────────────────────────────────────────────────

    let (delivery_tx, delivery_rx) = mpsc::unbounded_channel::<Delivery>();
    let engines = build_nodes(&config, &plan, &delivery_tx)?;
    drop(delivery_tx);

    let handles: Vec<NodeHandle> = engines.iter().map(|e| e.handle()).collect();
    let primary = handles
        .iter()
        .find(|h| config.node.id.is_empty() || h.node_id() == config.node.id)
        .cloned()
        .with_context(|| format!("node {:?} is not part of the topology", config.node.id))?;

    let mut node_tasks = Vec::with_capacity(engines.len());
    for engine in &engines {
        node_tasks.push(engine.start(&shutdown_tx)?);
    }

    // ── Spawn tasks ──────────────────────────────────────────────────────────

    let inbox = Inbox::new();
    let delivery_task = {
        let inbox = inbox.clone();
        let mut rx = delivery_rx;
        tokio::spawn(async move {
            while let Some(delivery) = rx.recv().await {
                inbox.add(delivery);
            }
        })
    };

    if let Some(interval) = config.timers.table_print_interval() {
        let handles = handles.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(interval);
            loop {
                interval.tick().await;
                for handle in &handles {
                    let table = handle.routing_table().await;
                    tracing::info!(node = %handle.node_id(), "routing table\n{table}");
                }
            }
        });
    }

    if config.api.port != 0 {
        let state = routersim_api::ApiState {
            node: primary.clone(),
            inbox: inbox.clone(),
        };
        let port = config.api.port;
        tokio::spawn(async move {
            if let Err(e) = routersim_api::serve(state, port).await {
                tracing::error!(error = %e, "API server failed");
            }
        });
    }

    if let Some([dest, text]) = args.send.as_deref() {
        let settle = config.timers.info_interval() * 3;
        let (dest, text) = (dest.clone(), text.clone());
        let shutdown = shutdown_tx.clone();
        let node = primary.clone();
        tokio::spawn(async move {
            tokio::time::sleep(settle).await;
            let msg_id = node.send_user_message(&dest, &text).await;
            tracing::info!(to = %dest, msg_id = %msg_id, "sent");
            tokio::time::sleep(Duration::from_secs(1)).await;
            let _ = shutdown.send(());
        });
    }

    // ── Wait for exit ────────────────────────────────────────────────────────

    let mut shutdown_rx = shutdown_tx.subscribe();

    tokio::select! {
        _ = shutdown_rx.recv() => tracing::info!("shutting down"),
        r = delivery_task      => tracing::error!("delivery sink exited: {:?}", r),
    }
    let _ = shutdown_tx.send(());

    for tasks in node_tasks {
        if let Err(e) = tasks.wait().await {
            tracing::error!(error = %e, "node task failed");
        }
    }
    tracing::info!(delivered = inbox.count(), "routersimd stopped");
    Ok(())
}
