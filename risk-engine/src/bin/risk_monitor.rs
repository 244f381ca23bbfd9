//! Risk monitor: batch scoring of a billing export

use anyhow::{anyhow, Context};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::{Path, PathBuf};
use subscriber_risk::{
    analyze, portfolio_stats, risky_subscribers, Dataset, RiskConfig, RiskEngine, RiskTier,
    UserHistory,
};
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "risk-monitor")]
#[command(about = "Flag subscribers likely to churn or default", long_about = None)]
struct Cli {
    /// JSON export with users, subscriptions and payments
    #[arg(short, long, global = true, default_value = "billing.json")]
    dataset: PathBuf,

    /// TOML risk configuration (defaults to RISK_* environment variables)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Evaluation time, RFC 3339 (defaults to now)
    #[arg(long, global = true)]
    as_of: Option<String>,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List risky subscribers, highest score first
    Risky {
        /// Minimum score (defaults to the high risk threshold)
        #[arg(long)]
        min_score: Option<f64>,

        /// Maximum number of entries
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Detailed analysis of one subscriber
    Analyze {
        /// User ID
        #[arg(long)]
        user: Uuid,
    },
    /// Portfolio statistics
    Stats,
    /// Print the effective configuration
    Config,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.json_logs);

    let config = match &cli.config {
        Some(path) => RiskConfig::from_file(path)
            .with_context(|| format!("Failed to load risk configuration from {}", path.display()))?,
        None => RiskConfig::from_env().context("Failed to load risk configuration from environment")?,
    };
    let engine = RiskEngine::new(config)?;
    tracing::info!(
        high = engine.config().high_risk_threshold,
        critical = engine.config().critical_risk_threshold,
        "Risk configuration loaded"
    );

    let as_of = match &cli.as_of {
        Some(raw) => DateTime::parse_from_rfc3339(raw)
            .with_context(|| format!("Invalid --as-of timestamp {:?}", raw))?
            .with_timezone(&Utc),
        None => Utc::now(),
    };

    match cli.command {
        Commands::Config => print_json(engine.config()),
        Commands::Risky { min_score, limit } => {
            let histories = load_histories(&cli.dataset)?;
            let report = risky_subscribers(&engine, &histories, min_score, limit, as_of)?;
            let critical = report
                .subscribers
                .iter()
                .filter(|s| s.tier == RiskTier::Critical)
                .count();
            if critical > 0 {
                tracing::warn!(critical, "Critical subscribers need immediate follow-up");
            }
            print_json(&report)
        }
        Commands::Analyze { user } => {
            let histories = load_histories(&cli.dataset)?;
            let history = histories
                .iter()
                .find(|h| h.user.id == user)
                .ok_or_else(|| anyhow!("User {} not found in dataset", user))?;
            print_json(&analyze(&engine, history, as_of)?)
        }
        Commands::Stats => {
            let histories = load_histories(&cli.dataset)?;
            print_json(&portfolio_stats(&engine, &histories, as_of)?)
        }
    }
}

fn load_histories(path: &Path) -> anyhow::Result<Vec<UserHistory>> {
    let grouped = Dataset::from_file(path)
        .with_context(|| format!("Failed to load dataset {}", path.display()))?
        .into_histories()?;
    tracing::info!(
        users = grouped.histories.len(),
        orphan_subscriptions = grouped.orphan_subscriptions,
        orphan_payments = grouped.orphan_payments,
        "Dataset loaded"
    );
    Ok(grouped.histories)
}

fn init_tracing(json: bool) {
    let filter = tracing_subscriber::EnvFilter::from_default_env()
        .add_directive(tracing::Level::INFO.into());
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
