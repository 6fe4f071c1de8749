//! chainwatch CLI — follow confirmed blocks across redundant RPC endpoints.
//!
//! Usage:
//! ```bash
//! # Race endpoints for the current head and confirmed height
//! chainwatch head --url https://rpc.ankr.com/eth --url https://eth.llamarpc.com
//!
//! # Print every newly confirmed block as a JSON line until Ctrl-C
//! chainwatch watch --url https://rpc.ankr.com/eth --confirmations 12 --interval-ms 5000
//!
//! # Same, from a config file
//! chainwatch watch --config listener.json
//! ```

use std::env;
use std::process;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde_json::json;
use tracing_subscriber::EnvFilter;

use chainwatch_core::{BlockExecutor, BlockListener, HeightTracker, ListenerConfig, WatchError};
use chainwatch_http::{EvmBlock, HttpChainClient};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        print_usage();
        process::exit(1);
    }

    let result = match args[1].as_str() {
        "head" => cmd_head(&args[2..]).await,
        "watch" => cmd_watch(&args[2..]).await,
        "version" | "--version" | "-V" => {
            println!("chainwatch {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        "help" | "--help" | "-h" => {
            print_usage();
            Ok(())
        }
        other => {
            eprintln!("Unknown command: {other}");
            print_usage();
            process::exit(1);
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}

fn print_usage() {
    println!("chainwatch {}", env!("CARGO_PKG_VERSION"));
    println!("Deliver confirmed blocks from redundant RPC endpoints\n");
    println!("USAGE:");
    println!("    chainwatch <COMMAND>\n");
    println!("COMMANDS:");
    println!("    head     Race endpoints for the chain head and confirmed height");
    println!("    watch    Print each newly confirmed block as a JSON line");
    println!("    version  Print version");
    println!("    help     Print this help\n");
    println!("FLAGS:");
    println!("    --url <URL>           RPC endpoint URL, repeatable");
    println!("    --confirmations <N>   Confirmation depth  [default: 12]");
    println!("    --interval-ms <MS>    Poll interval (watch)  [default: 5000]");
    println!("    --config <FILE>       JSON listener config (watch)");
    println!("\nSet RUST_LOG to adjust logging (default: info).");
}

/// Prints each confirmed block as one JSON line on stdout.
struct PrintExecutor;

#[async_trait]
impl BlockExecutor<EvmBlock> for PrintExecutor {
    async fn execute(&self, height: u64, block: EvmBlock) -> Result<(), WatchError> {
        let line = json!({
            "number": height,
            "hash": block.hash,
            "parent_hash": block.parent_hash,
            "timestamp": block.timestamp,
            "tx_count": block.transactions.len(),
        });
        println!("{line}");
        Ok(())
    }
}

async fn cmd_head(args: &[String]) -> Result<()> {
    let config = load_config(args)?;
    let endpoints = HttpChainClient::from_config(&config)?;
    let listener = BlockListener::new(&config, endpoints, Arc::new(PrintExecutor))?;

    let head = listener.chain_head().await?;
    let confirmed = HeightTracker::new(config.confirmation_depth).compute_confirmed(head);

    println!("  Endpoints:     {}", config.endpoints.len());
    println!("  Head:          {head}");
    println!("  Confirmations: {}", config.confirmation_depth);
    println!("  Confirmed:     {confirmed}");
    Ok(())
}

async fn cmd_watch(args: &[String]) -> Result<()> {
    let config = load_config(args)?;
    let endpoints = HttpChainClient::from_config(&config)?;
    let listener = BlockListener::new(&config, endpoints, Arc::new(PrintExecutor))?;

    listener.start()?;
    tracing::info!(endpoints = ?config.endpoints, "watching for confirmed blocks, Ctrl-C to stop");
    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for Ctrl-C")?;

    tracing::info!("shutting down");
    listener.stop();
    listener.dispose();
    eprintln!("{}", serde_json::to_string_pretty(&listener.snapshot())?);
    Ok(())
}

fn load_config(args: &[String]) -> Result<ListenerConfig> {
    let mut config = match parse_flag(args, "--config") {
        Some(path) => {
            let text = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read config file {path}"))?;
            serde_json::from_str::<ListenerConfig>(&text)
                .with_context(|| format!("invalid config file {path}"))?
        }
        None => ListenerConfig::default(),
    };

    let urls = parse_all(args, "--url");
    if !urls.is_empty() {
        config.endpoints = urls;
    }
    if let Some(n) = parse_flag(args, "--confirmations") {
        config.confirmation_depth = n.parse().context("--confirmations must be an integer")?;
    }
    if let Some(ms) = parse_flag(args, "--interval-ms") {
        config.poll_interval_ms = ms.parse().context("--interval-ms must be an integer")?;
    }

    if config.endpoints.is_empty() {
        bail!("at least one --url (or a config file with endpoints) is required");
    }
    config.validate()?;
    Ok(config)
}

fn parse_flag(args: &[String], flag: &str) -> Option<String> {
    let pos = args.iter().position(|a| a == flag)?;
    args.get(pos + 1).cloned()
}

fn parse_all(args: &[String], flag: &str) -> Vec<String> {
    args.windows(2)
        .filter(|w| w[0] == flag)
        .map(|w| w[1].clone())
        .collect()
}
