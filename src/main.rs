use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use jobsync::config::{self, Config};
use jobsync::db;
use jobsync::model::RawJobRecord;
use jobsync::pipeline::{run_ingestion, RunGuard};
use jobsync::platform::{JobBoard, PlatformClient};
use jobsync::sync;
use jobsync::validate::validate_all;

#[derive(Debug, Parser)]
#[command(author, version, about = "Stage scraped job postings and sync them to the job board")]
struct Args {
    /// Path to YAML config file
    #[arg(long, default_value = "config.yaml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Validate, stage and sync a JSON array of scraped postings
    Ingest {
        file: PathBuf,
        /// Label for the scrape run (defaults to the records' common source)
        #[arg(long)]
        source: Option<String>,
        /// Stage only; leave syncing to a later `sync` or the syncer
        #[arg(long)]
        no_sync: bool,
    },
    /// Report validation findings for a JSON file without touching the store
    Validate { file: PathBuf },
    /// Push staged postings that have not reached the platform yet
    Sync {
        /// Maximum rows to push in this pass (0 = no limit)
        #[arg(long)]
        limit: Option<usize>,
    },
    /// List recent scrape runs
    Runs {
        #[arg(long, default_value = "10")]
        limit: i64,
    },
    /// Staged counts per source plus platform statistics
    Stats,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .compact()
        .init();

    let args = Args::parse();
    let cfg = config::load(Some(&args.config))?;
    cfg.ensure_dirs()?;

    match args.command {
        Command::Validate { file } => {
            let records = read_records(&file).await?;
            let report = validate_all(&records);
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Command::Ingest {
            file,
            source,
            no_sync,
        } => {
            // Build the client first so a missing token fails before any work.
            let client = if no_sync || !cfg.sync.enabled {
                None
            } else {
                Some(PlatformClient::from_config(&cfg)?)
            };
            let records = read_records(&file).await?;
            let pool = open_store(&cfg).await?;
            let label = source.unwrap_or_else(|| run_label(&cfg, &records));
            let guard = RunGuard::new();
            let report = run_ingestion(
                &pool,
                &guard,
                client.as_ref().map(|c| c as &dyn JobBoard),
                &cfg.sync,
                &label,
                &records,
            )
            .await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Command::Sync { limit } => {
            let client = PlatformClient::from_config(&cfg)?;
            let pool = open_store(&cfg).await?;
            let mut settings = cfg.sync.clone();
            if let Some(limit) = limit {
                settings.batch_limit = limit;
            }
            let stats = sync::sync_pending(&pool, &client, &settings).await?;
            println!("{}", serde_json::to_string_pretty(&stats)?);
        }
        Command::Runs { limit } => {
            let pool = open_store(&cfg).await?;
            let runs = db::recent_scrape_runs(&pool, limit).await?;
            println!("{}", serde_json::to_string_pretty(&runs)?);
        }
        Command::Stats => {
            let pool = open_store(&cfg).await?;
            let staged = db::count_by_source(&pool).await?;
            let platform = match PlatformClient::from_config(&cfg) {
                Ok(client) => match client.job_stats().await {
                    Ok(stats) => Some(stats),
                    Err(err) => {
                        warn!(?err, "failed to fetch platform statistics");
                        None
                    }
                },
                Err(err) => {
                    info!(%err, "platform statistics unavailable");
                    None
                }
            };
            let out = serde_json::json!({ "staged": staged, "platform": platform });
            println!("{}", serde_json::to_string_pretty(&out)?);
        }
    }

    Ok(())
}

async fn open_store(cfg: &Config) -> Result<db::Pool> {
    let pool = db::init_pool(&cfg.database_url()).await?;
    db::run_migrations(&pool).await?;
    Ok(pool)
}

async fn read_records(path: &Path) -> Result<Vec<RawJobRecord>> {
    let content = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("{} is not a JSON array of job records", path.display()))
}

/// The shared source when every record agrees, otherwise the configured label.
fn run_label(cfg: &Config, records: &[RawJobRecord]) -> String {
    match records.first() {
        Some(first)
            if !first.source.is_empty() && records.iter().all(|r| r.source == first.source) =>
        {
            first.source.clone()
        }
        _ => cfg.app.default_source.clone(),
    }
}
