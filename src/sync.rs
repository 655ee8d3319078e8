//! Pushes staged postings to the job board, one independent state machine per
//! posting. A failure is recorded against that posting and the batch moves on.

use anyhow::Result;
use futures::stream::{self, StreamExt};
use serde::Serialize;
use tracing::{info, instrument, warn};

use crate::config::SyncSettings;
use crate::db::{self, Pool};
use crate::model::{RawJobRecord, StagedJob};
use crate::platform::{build_company, build_job, JobBoard, PlatformError, RemoteId};
use crate::validate::validate;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", content = "reason", rename_all = "snake_case")]
pub enum SyncOutcome {
    Created,
    AlreadyExists,
    Failed(String),
}

impl SyncOutcome {
    /// The platform holds this posting, so the staged row is done.
    pub fn is_settled(&self) -> bool {
        matches!(self, SyncOutcome::Created | SyncOutcome::AlreadyExists)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SyncDetail {
    pub staged_id: i64,
    pub source: String,
    pub external_id: String,
    pub title: String,
    pub remote_id: Option<RemoteId>,
    pub outcome: SyncOutcome,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SyncStats {
    pub total: usize,
    pub successful: usize,
    pub skipped: usize,
    pub failed: usize,
    pub details: Vec<SyncDetail>,
}

impl SyncStats {
    fn record(&mut self, detail: SyncDetail) {
        match detail.outcome {
            SyncOutcome::Created => self.successful += 1,
            SyncOutcome::AlreadyExists => self.skipped += 1,
            SyncOutcome::Failed(_) => self.failed += 1,
        }
        self.details.push(detail);
    }
}

/// Sync one staged posting. Once the platform holds it the row is flagged so
/// later passes leave it alone; a failure is counted against the row.
#[instrument(skip_all, fields(staged_id = staged.id))]
pub async fn sync_job(pool: &Pool, board: &dyn JobBoard, staged: &StagedJob) -> SyncDetail {
    let record = staged.to_record();
    let (outcome, remote_id) = match push_record(board, &record).await {
        Ok((outcome, remote_id)) => (outcome, remote_id),
        Err(reason) => {
            warn!(title = %record.title, %reason, "failed to sync job");
            (SyncOutcome::Failed(reason), None)
        }
    };

    match &outcome {
        SyncOutcome::Failed(reason) => {
            if let Err(err) = db::record_sync_failure(pool, staged.id, reason).await {
                warn!(?err, staged_id = staged.id, "sync failure could not be recorded");
            }
        }
        _ => {
            if let Err(err) = db::mark_imported(pool, staged.id).await {
                // The existence check skips it next time.
                warn!(?err, staged_id = staged.id, "synced job could not be flagged");
            }
        }
    }

    SyncDetail {
        staged_id: staged.id,
        source: staged.source.clone(),
        external_id: staged.external_id.clone(),
        title: record.title,
        remote_id,
        outcome,
    }
}

async fn push_record(
    board: &dyn JobBoard,
    record: &RawJobRecord,
) -> Result<(SyncOutcome, Option<RemoteId>), String> {
    let checked = validate(record);
    if !checked.is_valid {
        return Err(checked.errors.join(", "));
    }
    let job = checked.job;

    match board.find_job(&job.source, &job.external_id).await {
        Ok(Some(existing)) => {
            info!(title = %job.title, "job already on platform");
            return Ok((SyncOutcome::AlreadyExists, existing.id));
        }
        Ok(None) | Err(PlatformError::NotFound) => {}
        Err(err) => return Err(format!("existence check failed: {}", err)),
    }

    let company_id = resolve_company(board, &job)
        .await
        .map_err(|err| format!("company {}: {}", job.company_name, err))?;

    let created = board
        .create_job(&build_job(&job, &company_id))
        .await
        .map_err(|err| format!("job creation failed: {}", err))?;
    Ok((SyncOutcome::Created, created.id))
}

/// First search hit wins; otherwise the company is created. Companies are
/// never updated.
async fn resolve_company(
    board: &dyn JobBoard,
    job: &RawJobRecord,
) -> Result<RemoteId, PlatformError> {
    if let Some(found) = board
        .search_companies(&job.company_name)
        .await?
        .into_iter()
        .next()
    {
        return Ok(found.id);
    }
    let created = board.create_company(&build_company(job)).await?;
    Ok(created.id)
}

/// Run `sync_job` over `jobs` with at most `concurrency` in flight. Details
/// keep the input order.
#[instrument(skip_all, fields(jobs = jobs.len(), concurrency = concurrency))]
pub async fn sync_batch(
    pool: &Pool,
    board: &dyn JobBoard,
    jobs: &[StagedJob],
    concurrency: usize,
) -> SyncStats {
    info!("starting sync");
    let details: Vec<SyncDetail> = stream::iter(jobs)
        .map(|staged| sync_job(pool, board, staged))
        .buffered(concurrency.max(1))
        .collect()
        .await;

    let mut stats = SyncStats {
        total: jobs.len(),
        ..Default::default()
    };
    for detail in details {
        stats.record(detail);
    }
    info!(
        successful = stats.successful,
        skipped = stats.skipped,
        failed = stats.failed,
        "sync complete"
    );
    stats
}

/// Load staged rows that have not reached the platform yet and sync them.
/// Rows with fewer failed attempts go first.
pub async fn sync_pending(
    pool: &Pool,
    board: &dyn JobBoard,
    settings: &SyncSettings,
) -> Result<SyncStats> {
    let pending = db::fetch_unsynced(pool, settings.limit()).await?;
    if pending.is_empty() {
        info!("no staged jobs waiting for sync");
        return Ok(SyncStats::default());
    }
    Ok(sync_batch(pool, board, &pending, settings.concurrency).await)
}
