// seasoncast entry point.
//
// Startup sequence:
// 1. Parse the command line
// 2. Initialize tracing (log to file, stdout carries JSON output)
// 3. Load config
// 4. Open the artifact store and database
// 5. Dispatch the subcommand

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use seasoncast_app::pipeline::{PairOutcome, Pipeline, RunReport};
use seasoncast_app::query;
use seasoncast_baseball::seasons::CsvSeasonSource;
use seasoncast_core::artifacts::FsArtifactStore;
use seasoncast_core::config;
use seasoncast_core::db::Database;
use serde_json::json;
use tracing::{error, info};

#[derive(Debug, Parser)]
#[command(name = "seasoncast", version, about = "Next-season batting projections")]
struct Cli {
    /// Project root holding `config/`, `defaults/` and the season data.
    #[arg(long, default_value = ".")]
    base_dir: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Train, evaluate, and publish every estimator for the target statistics.
    Train {
        /// Target statistic (repeatable). Defaults to `run.targets`.
        #[arg(long = "stat")]
        stats: Vec<String>,
    },
    /// List the (stat, model) combinations that can be queried.
    Meta,
    /// Held-out predictions for one (stat, model) pair.
    Predictions {
        #[arg(long)]
        stat: String,
        #[arg(long)]
        model: String,
        #[arg(long, default_value_t = query::DEFAULT_LIMIT)]
        limit: usize,
    },
    /// Latest prediction per pair for a player (case-insensitive substring).
    Player { name: String },
}

fn main() -> anyhow::Result<()> {
    // 1. Parse the command line
    let cli = Cli::parse();

    // 2. Initialize tracing
    init_tracing(&cli.base_dir)?;
    info!("seasoncast starting up");

    // 3. Load config
    let config = config::load_config(&cli.base_dir).context("failed to load configuration")?;
    info!(
        "Config loaded: seasons={}, artifacts={}",
        config.data.seasons,
        config.artifacts.root.display()
    );

    // 4. Open the artifact store and database
    std::fs::create_dir_all(&config.artifacts.root).with_context(|| {
        format!(
            "failed to create artifact root {}",
            config.artifacts.root.display()
        )
    })?;
    if let Some(parent) = config.artifacts.database.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    let store = FsArtifactStore::new(config.artifacts.root.clone());
    let db = Database::open(&config.artifacts.database.to_string_lossy())
        .context("failed to open database")?;
    info!("Database opened at {}", config.artifacts.database.display());

    // 5. Dispatch
    match cli.command {
        Command::Train { stats } => {
            let targets = if stats.is_empty() {
                config.run.targets.clone()
            } else {
                stats
            };
            let source = CsvSeasonSource::new(config.data.seasons.clone());
            let pipeline = Pipeline::from_config(&config, &source, &store, &db)
                .context("invalid feature overrides")?;
            let report = pipeline.run(&targets).context("pipeline run failed")?;
            print_json(&report_json(&report))?;
            if !report.is_success() {
                error!(
                    "{} pairs failed, {} partially published",
                    report.failed(),
                    report.outcomes.len() - report.published() - report.failed()
                );
                anyhow::bail!(
                    "{} of {} pairs were not fully published",
                    report.outcomes.len() - report.published(),
                    report.outcomes.len()
                );
            }
        }
        Command::Meta => print_json(&query::meta())?,
        Command::Predictions { stat, model, limit } => {
            print_json(&query::predictions(&db, &stat, &model, limit)?)?
        }
        Command::Player { name } => print_json(&query::player(&db, &name)?)?,
    }

    info!("seasoncast finished");
    Ok(())
}

fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
    let text = serde_json::to_string_pretty(value).context("failed to serialize output")?;
    println!("{text}");
    Ok(())
}

fn report_json(report: &RunReport) -> serde_json::Value {
    let pairs: Vec<serde_json::Value> = report
        .outcomes
        .iter()
        .map(|((stat, model), outcome)| {
            let mut entry = json!({ "stat": stat.key(), "model": model.name() });
            match outcome {
                PairOutcome::Published(metrics) => {
                    entry["status"] = json!("published");
                    entry["metrics"] = json!(metrics);
                }
                PairOutcome::PartiallyPublished { metrics, failures } => {
                    entry["status"] = json!("partially_published");
                    entry["metrics"] = json!(metrics);
                    entry["failures"] =
                        json!(failures.iter().map(|f| f.to_string()).collect::<Vec<_>>());
                }
                PairOutcome::Failed(e) => {
                    entry["status"] = json!("failed");
                    entry["error"] = json!(e.to_string());
                }
            }
            entry
        })
        .collect();
    json!({
        "training_rows": report.training_rows,
        "unresolved_teams": report.unresolved_teams,
        "pairs": pairs,
    })
}

/// Initialize tracing to log to `<base_dir>/logs/seasoncast.log`.
fn init_tracing(base_dir: &Path) -> anyhow::Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    let log_dir = base_dir.join("logs");
    std::fs::create_dir_all(&log_dir)?;

    let log_file = std::fs::File::create(log_dir.join("seasoncast.log"))?;

    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("seasoncast=info,warn")),
        )
        .with_writer(log_file)
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(true)
        .with_line_number(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("failed to set tracing subscriber")?;

    Ok(())
}
