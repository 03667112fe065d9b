//! Process entry point: one router plus all of its shards in a single
//! tokio runtime. Mirrors `original_source/myKVServer.py`'s `__main__`
//! driver, which spawns N KV-store processes plus one distributor — here
//! they are tasks in one process instead of separate OS processes, since
//! spec.md's cross-process contract is identical over loopback HTTP either
//! way (SPEC_FULL.md §5).

use std::path::PathBuf;

use clap::Parser;
use ringkv_common::ClusterConfig;
use tracing_subscriber::EnvFilter;

/// Sharded in-memory key-value cluster: a consistent-hashing router in
/// front of N independent shards.
#[derive(Debug, Parser)]
#[command(name = "ringkv-cluster", version, about)]
struct Args {
    /// Path to a cluster config TOML file. When absent, starts a
    /// single-process development cluster on loopback.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Number of shards for the development cluster (ignored if --config
    /// is given).
    #[arg(long, default_value_t = 3)]
    dev_shards: u16,

    /// Base port for the development cluster's shards; the router binds to
    /// `base_port - 1` (ignored if --config is given).
    #[arg(long, default_value_t = 5001)]
    dev_base_port: u16,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let args = Args::parse();
    let config = match &args.config {
        Some(path) => ClusterConfig::from_toml_file(path)?,
        None => ClusterConfig::local(args.dev_base_port, args.dev_shards),
    };

    tracing::info!(
        router_addr = %config.router_addr,
        shards = config.shards.len(),
        "starting cluster"
    );

    let state = ringkv_router::RouterState::bootstrap(&config).await?;
    let router_addr = config.router_addr.parse()?;
    ringkv_router::serve(router_addr, state).await?;

    Ok(())
}
