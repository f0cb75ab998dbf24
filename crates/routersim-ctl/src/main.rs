//! routersim-ctl — command-line interface for a running routersimd.

mod cmd;

use anyhow::{Context, Result};

use cmd::messages::{cmd_inbox, cmd_send};
use cmd::status::{cmd_routes, cmd_status};

const DEFAULT_PORT: u16 = 9101;

fn print_usage() {
    println!("Usage: routersim-ctl [--port <port>] <command>");
    println!();
    println!("Commands:");
    println!("  status              Show node status, neighbors, and counters");
    println!("  routes              Show the routing table");
    println!("  inbox               List delivered messages");
    println!("  send <dest> <text>  Send a message from this node");
    println!();
    println!("Options:");
    println!("  --port <port>   API port of routersimd (default: {})", DEFAULT_PORT);
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();

    // Parse --port option
    let mut port = DEFAULT_PORT;
    let mut remaining: Vec<&str> = Vec::new();
    let mut i = 0;
    while i < args.len() {
        if args[i] == "--port" {
            i += 1;
            port = args
                .get(i)
                .context("--port requires a value")?
                .parse()
                .context("--port must be a number")?;
        } else {
            remaining.push(&args[i]);
        }
        i += 1;
    }

    match remaining.as_slice() {
        ["status"] | [] => cmd_status(port).await,
        ["routes"] => cmd_routes(port).await,
        ["inbox"] => cmd_inbox(port).await,
        ["send", to, text @ ..] if !text.is_empty() => cmd_send(port, to, &text.join(" ")).await,
        ["help"] | ["--help"] | ["-h"] => {
            print_usage();
            Ok(())
        }
        other => {
            eprintln!("Unknown command: {}", other.join(" "));
            eprintln!();
            print_usage();
            std::process::exit(1);
        }
    }
}
