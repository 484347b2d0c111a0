//! # ECM Staking Simulator CLI
//!
//! Runs a seeded operation-sequence simulation against the staking engine
//! and prints the resulting report as JSON.
//!
//! ## Usage
//!
//! ```bash
//! # Default scenario
//! ecmstake-sim
//!
//! # Longer weekly-emission soak with a fixed seed
//! ecmstake-sim --ops 100000 --strategy weekly --seed 42
//! ```

use clap::Parser;
use tracing::error;
use tracing_subscriber::EnvFilter;

use ecmstake_sim::{SimConfig, Simulator, StrategyKind};

#[derive(Parser)]
#[command(name = "ecmstake-sim")]
#[command(about = "Invariant-auditing simulator for the ECM staking engine", long_about = None)]
struct Cli {
    /// RNG seed (identical seeds replay identical runs)
    #[arg(short, long, default_value = "1")]
    seed: u64,

    /// Number of operations to attempt
    #[arg(short, long, default_value = "10000")]
    ops: u64,

    /// Number of simulated users
    #[arg(short, long, default_value = "16")]
    users: u8,

    /// Maximum clock advance between operations, in seconds
    #[arg(long, default_value = "21600")]
    max_wait: u64,

    /// Emission strategy: linear, periodic, or weekly
    #[arg(long, default_value = "linear")]
    strategy: StrategyKind,

    /// Route rewards through the vesting collaborator
    #[arg(long)]
    vest: bool,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

fn main() {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()))
        .init();

    let config = SimConfig {
        seed: cli.seed,
        ops: cli.ops,
        users: cli.users.max(1),
        max_wait_secs: cli.max_wait,
        strategy: cli.strategy,
        vest_rewards: cli.vest,
        ..Default::default()
    };

    match Simulator::new(config).run() {
        Ok(report) => {
            println!(
                "{}",
                serde_json::to_string_pretty(&report).expect("report serializes")
            );
        }
        Err(violation) => {
            error!("{}", violation);
            std::process::exit(1);
        }
    }
}
