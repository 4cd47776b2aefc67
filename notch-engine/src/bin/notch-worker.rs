//! notch-worker: batch scoring and operator queries for the Notch engine.
//!
//! Runs one command against the configured store and exits. Output is JSON
//! on stdout; logs go to stderr.

use anyhow::Context;
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::info;

use notch_core::{Category, Fid};
use notch_engine::{EngineConfig, NotchEngine};

#[derive(Parser)]
#[command(name = "notch-worker")]
#[command(about = "Batch scoring and queries for the Notch engine")]
struct Cli {
    /// Path to a YAML configuration file
    #[arg(short, long, env = "NOTCH_CONFIG")]
    config: Option<String>,

    /// Social provider API key (overrides config file)
    #[arg(long, env = "NOTCH_SOCIAL_API_KEY", hide_env_values = true)]
    social_api_key: Option<String>,

    /// Chain provider API key (overrides config file)
    #[arg(long, env = "NOTCH_CHAIN_API_KEY", hide_env_values = true)]
    chain_api_key: Option<String>,

    /// Emit logs as JSON
    #[arg(long)]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Score provider signals for the given users, or every known user
    Sweep {
        fids: Vec<Fid>,
    },
    /// Print a leaderboard
    Leaderboard {
        /// Category board; global when omitted
        #[arg(short, long)]
        category: Option<Category>,
        #[arg(short, long, default_value_t = 100)]
        limit: usize,
    },
    /// Print a user's profile
    Score {
        fid: Fid,
    },
    /// List active tasks
    Tasks,
    /// Pay completions whose rewards were never applied
    Reconcile {
        fid: Fid,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = tracing_subscriber::EnvFilter::from_default_env()
        .add_directive("notch=info".parse()?);
    if cli.json_logs {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }

    let mut config = match &cli.config {
        Some(path) => {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("reading config {path}"))?;
            EngineConfig::from_yaml(&content).with_context(|| format!("parsing config {path}"))?
        }
        None => {
            info!("No config file given, using defaults");
            EngineConfig::default()
        }
    };
    if let Some(key) = cli.social_api_key {
        config.providers.social_api_key = Some(key);
    }
    if let Some(key) = cli.chain_api_key {
        config.providers.chain_api_key = Some(key);
    }

    let engine = NotchEngine::with_config(config).context("starting engine")?;

    match cli.command {
        Command::Sweep { fids } => {
            let report = if fids.is_empty() {
                engine.sweep_all().await?
            } else {
                engine.sweep(&fids).await
            };
            print_json(&report)
        }
        Command::Leaderboard { category, limit } => {
            print_json(&engine.leaderboard(category, limit).await?)
        }
        Command::Score { fid } => print_json(&engine.profile(fid).await?),
        Command::Tasks => print_json(&engine.active_tasks().await),
        Command::Reconcile { fid } => print_json(&engine.reconcile_unpaid(fid).await?),
    }
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
