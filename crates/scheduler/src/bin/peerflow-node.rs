//! peerflow-node: run one scheduling peer over a batch of workflows.
//!
//! Loads membership from `peerflow.toml` (or `PEERFLOW_*` env vars), schedules
//! every workflow from a JSON file, and prints each outcome plus the final
//! status as JSON lines on stdout.
//!
//! # Usage
//!
//! ```bash
//! peerflow-node --peer-id peer1 --peer peer2 --peer peer3 --workflows jobs.json --drain
//!
//! # Merge a clock snapshot received from another peer first
//! peerflow-node --config peerflow.toml --workflows jobs.json --remote-clock peer2-clock.json
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::{info, warn};

use peerflow_core::{load_dotenv, NodeConfig, WorkflowDefinition};
use peerflow_scheduler::{ClockSnapshot, Scheduler, SystemTime};

// ── CLI ─────────────────────────────────────────────────────────────

/// Decentralized workflow scheduler node.
#[derive(Parser, Debug)]
#[command(name = "peerflow-node", version, about)]
struct Cli {
    /// Path to peerflow.toml config file.
    #[arg(long, env = "PEERFLOW_CONFIG", default_value = "config/peerflow.toml")]
    config: PathBuf,

    /// Local peer id (overrides config).
    #[arg(long)]
    peer_id: Option<String>,

    /// Additional known peer. Repeatable.
    #[arg(long = "peer")]
    peers: Vec<String>,

    /// JSON file containing an array of workflow definitions.
    #[arg(long)]
    workflows: Option<PathBuf>,

    /// JSON file containing a clock snapshot from another peer.
    #[arg(long)]
    remote_clock: Option<PathBuf>,

    /// Pop every locally assigned workflow in priority order before exiting.
    #[arg(long)]
    drain: bool,
}

fn load_config(cli: &Cli) -> anyhow::Result<NodeConfig> {
    let from_file = NodeConfig::from_file_if_present(&cli.config)
        .with_context(|| format!("invalid config file {}", cli.config.display()))?;
    let mut config = match from_file {
        Some(cfg) => cfg,
        None => match NodeConfig::from_env() {
            Ok(cfg) => cfg,
            Err(env_err) => {
                let peer_id = cli.peer_id.clone().with_context(|| {
                    format!(
                        "{} not found, env config unusable ({env_err}), and no --peer-id",
                        cli.config.display()
                    )
                })?;
                NodeConfig::local(peer_id)
            }
        },
    };
    if let Some(peer_id) = &cli.peer_id {
        config.peer_id = peer_id.clone();
    }
    config.peers.extend(cli.peers.iter().cloned());
    config.validate()?;
    Ok(config)
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> anyhow::Result<T> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("failed to parse {}", path.display()))
}

// ── main ────────────────────────────────────────────────────────────

fn main() -> anyhow::Result<()> {
    load_dotenv();
    let cli = Cli::parse();
    let config = load_config(&cli)?;

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log_filter)),
        )
        .with_writer(std::io::stderr)
        .init();
    config.log_summary();

    let mut scheduler = Scheduler::from_config(&config, Arc::new(SystemTime));

    if let Some(path) = &cli.remote_clock {
        let snapshot: ClockSnapshot = read_json(path)?;
        let fingerprint = scheduler.merge_remote_snapshot(snapshot)?;
        info!(%fingerprint, "starting from merged clock");
    }

    let workflows: Vec<WorkflowDefinition> = match &cli.workflows {
        Some(path) => read_json(path)?,
        None => {
            warn!("no --workflows given, nothing to schedule");
            Vec::new()
        }
    };

    for workflow in workflows {
        let outcome = scheduler.schedule(workflow);
        println!("{}", serde_json::to_string(&outcome)?);
    }

    if cli.drain {
        while let Some(workflow) = scheduler.next_local_item() {
            info!(workflow = %workflow.id, priority = workflow.priority, "next local workflow");
            println!("{}", serde_json::to_string(&*workflow)?);
        }
    }

    println!("{}", serde_json::to_string(&scheduler.status())?);
    println!("{}", serde_json::to_string(&scheduler.clock_snapshot())?);
    Ok(())
}
