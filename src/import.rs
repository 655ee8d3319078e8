//! Deduplicating import of validated postings into the staging store.

use anyhow::Result;
use serde::Serialize;
use std::time::Duration;
use tracing::{error, info, instrument, warn};

use crate::db::{self, Pool};
use crate::model::RawJobRecord;

const CLOSE_RETRY_DELAY: Duration = Duration::from_millis(200);

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ImportStats {
    pub total: usize,
    pub imported: usize,
    pub duplicates: usize,
    pub errors: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upserted {
    Inserted(i64),
    Updated(i64),
}

/// Insert a first sighting or refresh the existing staged row in place.
pub async fn upsert_job(pool: &Pool, job: &RawJobRecord) -> Result<Upserted> {
    match db::find_staged_id(pool, &job.source, &job.external_id).await? {
        Some(id) => {
            db::update_staged_job(pool, id, job).await?;
            Ok(Upserted::Updated(id))
        }
        None => Ok(Upserted::Inserted(db::insert_staged_job(pool, job).await?)),
    }
}

/// Stage a batch under a fresh scrape run. Per-job failures are counted and
/// skipped; losing the store itself aborts the batch and marks the run as
/// failed.
#[instrument(skip_all, fields(source = source_label, jobs = jobs.len()))]
pub async fn import_batch(
    pool: &Pool,
    source_label: &str,
    jobs: &[RawJobRecord],
) -> Result<ImportStats> {
    let run_id = db::open_scrape_run(pool, source_label, jobs.len() as i64).await?;
    let mut stats = ImportStats {
        total: jobs.len(),
        ..Default::default()
    };

    for job in jobs {
        match upsert_job(pool, job).await {
            Ok(Upserted::Inserted(_)) => stats.imported += 1,
            Ok(Upserted::Updated(_)) => stats.duplicates += 1,
            Err(err) if is_store_unavailable(&err) => {
                error!(?err, run_id, "staging store unavailable; aborting import");
                if let Err(close_err) = abandon_run(pool, run_id, stats.imported, &err).await {
                    warn!(?close_err, run_id, "could not record failed scrape run");
                }
                return Err(err);
            }
            Err(err) => {
                warn!(
                    ?err,
                    title = %job.title,
                    external_id = %job.external_id,
                    "failed to stage job"
                );
                stats.errors += 1;
            }
        }
    }

    db::complete_scrape_run(pool, run_id, stats.imported as i64).await?;
    info!(
        run_id,
        total = stats.total,
        imported = stats.imported,
        duplicates = stats.duplicates,
        errors = stats.errors,
        "import complete"
    );
    Ok(stats)
}

/// Mark an aborted run as `error`. The store has just failed, so the close is
/// tried twice with a short pause in between.
pub async fn abandon_run(
    pool: &Pool,
    run_id: i64,
    jobs_imported: usize,
    cause: &anyhow::Error,
) -> Result<()> {
    let message = format!("{:#}", cause);
    if let Err(err) = db::fail_scrape_run(pool, run_id, jobs_imported as i64, &message).await {
        warn!(?err, run_id, "closing failed scrape run, retrying once");
        tokio::time::sleep(CLOSE_RETRY_DELAY).await;
        db::fail_scrape_run(pool, run_id, jobs_imported as i64, &message).await?;
    }
    Ok(())
}

/// True when the failure is about reaching the database rather than one row.
pub fn is_store_unavailable(err: &anyhow::Error) -> bool {
    err.chain().any(|cause| {
        matches!(
            cause.downcast_ref::<sqlx::Error>(),
            Some(sqlx::Error::PoolClosed | sqlx::Error::PoolTimedOut | sqlx::Error::Io(_))
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    #[test]
    fn pool_failures_abort_the_batch() {
        let err = Err::<(), _>(sqlx::Error::PoolClosed)
            .context("failed to insert staged job")
            .unwrap_err();
        assert!(is_store_unavailable(&err));
        assert!(is_store_unavailable(&anyhow::Error::new(sqlx::Error::PoolTimedOut)));
    }

    #[test]
    fn row_failures_do_not() {
        assert!(!is_store_unavailable(&anyhow::Error::new(sqlx::Error::RowNotFound)));
        assert!(!is_store_unavailable(&anyhow::anyhow!("bad record")));
    }
}
