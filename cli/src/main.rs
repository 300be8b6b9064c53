//! tmrpc CLI: query a Tendermint2 node from the terminal.
//!
//! Usage:
//! ```bash
//! # Node status over HTTP
//! tmrpc status --url tcp://127.0.0.1:26657
//!
//! # Any method, named params as a JSON object, over WebSocket
//! tmrpc call block --params '{"height": 10}' --url ws://127.0.0.1:26657 --ws
//!
//! # Several parameterless methods in one batch
//! tmrpc batch status net_info health --url 127.0.0.1:26657
//! ```
//!
//! Log verbosity follows `RUST_LOG` (default `warn`).

use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use serde_json::Value;
use tracing_subscriber::EnvFilter;

use tmrpc::{RpcClient, RpcParams};

#[derive(Parser)]
#[command(name = "tmrpc", about = "Query a Tendermint2 node over JSON-RPC", version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct Target {
    /// Node address: http(s)://, ws(s)://, tcp:// or host:port
    #[arg(long, default_value = "tcp://127.0.0.1:26657")]
    url: String,
    /// Use a WebSocket connection instead of HTTP
    #[arg(long)]
    ws: bool,
    /// Per-request timeout in seconds
    #[arg(long, default_value_t = 60)]
    timeout: u64,
}

#[derive(Subcommand)]
enum Commands {
    /// Show node status and round-trip latency
    Status {
        #[command(flatten)]
        target: Target,
    },
    /// Call any method and print the raw result
    Call {
        method: String,
        /// Named params as a JSON object
        #[arg(long, default_value = "{}")]
        params: String,
        #[command(flatten)]
        target: Target,
    },
    /// Send several parameterless methods as one batch
    Batch {
        #[arg(required = true)]
        methods: Vec<String>,
        #[command(flatten)]
        target: Target,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Status { target } => cmd_status(&target).await,
        Commands::Call {
            method,
            params,
            target,
        } => cmd_call(&target, &method, &params).await,
        Commands::Batch { methods, target } => cmd_batch(&target, &methods).await,
    }
}

async fn connect(target: &Target) -> Result<RpcClient> {
    let client = if target.ws {
        RpcClient::ws(&target.url).await
    } else {
        RpcClient::http(&target.url)
    }
    .with_context(|| format!("connecting to {}", target.url))?;
    Ok(client.with_request_timeout(Duration::from_secs(target.timeout)))
}

fn print_json(value: &Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn cmd_status(target: &Target) -> Result<()> {
    let client = connect(target).await?;
    println!("Querying {}...", client.url());

    let start = Instant::now();
    let status: Value = client.status().await.context("status")?;
    let latency = start.elapsed();

    let sync = &status["sync_info"];
    println!("  Network:      {}", status["node_info"]["network"]);
    println!("  Latest block: {}", sync["latest_block_height"]);
    println!("  Catching up:  {}", sync["catching_up"]);
    println!("  Latency:      {}ms", latency.as_millis());
    println!("  Transport:    {}", client.transport_health());

    client.close().await?;
    Ok(())
}

async fn cmd_call(target: &Target, method: &str, params: &str) -> Result<()> {
    let params: Value = serde_json::from_str(params).context("--params is not valid JSON")?;
    let params = RpcParams::from_serialize(&params)?;

    let client = connect(target).await?;
    let result: Value = client
        .call(method, params)
        .await
        .with_context(|| format!("calling {method}"))?;
    print_json(&result)?;

    client.close().await?;
    Ok(())
}

async fn cmd_batch(target: &Target, methods: &[String]) -> Result<()> {
    if methods.is_empty() {
        bail!("at least one method is required");
    }
    let client = connect(target).await?;
    let mut batch = client.new_batch();
    let slots: Vec<_> = methods
        .iter()
        .map(|m| batch.call::<Value>(m, RpcParams::new()))
        .collect();

    let mut results = batch.send().await.context("sending batch")?;
    for (method, slot) in methods.iter().zip(&slots) {
        match results.take(slot) {
            Ok(value) => {
                println!("{method}:");
                print_json(&value)?;
            }
            Err(e) => println!("{method}: error: {e}"),
        }
    }

    client.close().await?;
    Ok(())
}
