use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tracing::{info, warn};

use jobsync::config;
use jobsync::db;
use jobsync::platform::PlatformClient;
use jobsync::sync;

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Push all pending staged jobs to the job board and exit when complete"
)]
struct Args {
    /// Path to YAML config file
    #[arg(long, default_value = "config.yaml")]
    config: PathBuf,

    /// Override `sync.concurrency`
    #[arg(long)]
    concurrency: Option<usize>,

    /// Stop after this many passes even if jobs remain (default: 20)
    #[arg(long, default_value = "20")]
    max_passes: usize,
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

    let client = PlatformClient::from_config(&cfg)?;
    let pool = db::init_pool(&cfg.database_url()).await?;
    db::run_migrations(&pool).await?;

    let mut settings = cfg.sync.clone();
    if let Some(concurrency) = args.concurrency {
        settings.concurrency = concurrency.max(1);
    }

    info!(base_url = %client.base_url(), "starting platform sync");

    let mut created = 0;
    let mut skipped = 0;
    let mut failed = 0;
    for pass in 1..=args.max_passes {
        let stats = sync::sync_pending(&pool, &client, &settings).await?;
        if stats.total == 0 {
            break;
        }
        created += stats.successful;
        skipped += stats.skipped;
        failed += stats.failed;
        info!(
            pass,
            created = stats.successful,
            skipped = stats.skipped,
            failed = stats.failed,
            "sync pass finished"
        );

        // Failed rows sink behind untried ones. Once nothing settles and every
        // pending row has already failed, another pass would only retry them.
        if stats.successful + stats.skipped == 0 && db::count_untried(&pool).await? == 0 {
            warn!(remaining = stats.failed, "only failing jobs remain, giving up");
            break;
        }
        if stats.failed > 0 {
            warn!(failed = stats.failed, "some jobs failed and stay pending");
        }
        // A pass smaller than the limit drained everything that can sync.
        if settings.limit().map_or(true, |limit| stats.total < limit) {
            break;
        }
    }

    let pending: i64 = db::count_by_source(&pool)
        .await?
        .iter()
        .map(|c| c.pending())
        .sum();
    info!(created, skipped, failed, pending, "platform sync completed");
    Ok(())
}
