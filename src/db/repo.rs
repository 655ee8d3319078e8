use super::model::SourceCount;
use crate::model::{RawJobRecord, RunStatus, ScrapeRun, StagedJob};
use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteRow, SqliteSynchronous,
};
use sqlx::{Row, SqlitePool};
use std::path::Path;
use std::str::FromStr;
use tracing::instrument;

pub type Pool = SqlitePool;

const STAGED_COLUMNS: &str = "id, external_id, source, title, description, company_name, \
     location, job_type, salary_min, salary_max, salary_currency, skills, experience, \
     education, url, imported, sync_attempts, last_sync_error, created_at, updated_at";

const RUN_COLUMNS: &str =
    "id, source, start_time, end_time, jobs_found, jobs_imported, status, error";

pub async fn init_pool(database_url: &str) -> Result<Pool> {
    let in_memory = database_url.starts_with("sqlite::memory");
    let normalized = prepare_sqlite_url(database_url);
    let options = SqliteConnectOptions::from_str(&normalized)
        .with_context(|| format!("invalid database url {}", database_url))?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .synchronous(SqliteSynchronous::Full);
    // Every in-memory connection is its own database.
    let max_connections = if in_memory { 1 } else { 5 };
    let pool = SqlitePoolOptions::new()
        .max_connections(max_connections)
        .connect_with(options)
        .await
        .context("failed to open staging database")?;
    Ok(pool)
}

/// Expand a leading `~/` in file-backed SQLite URLs and create the parent
/// directory. In-memory and non-sqlite URLs pass through unchanged.
fn prepare_sqlite_url(url: &str) -> String {
    let Some(rest) = url.strip_prefix("sqlite:") else {
        return url.to_string();
    };
    if rest.starts_with(":memory") {
        return url.to_string();
    }
    let rest = rest.strip_prefix("//").unwrap_or(rest);
    let (path, query) = match rest.split_once('?') {
        Some((p, q)) => (p, Some(q)),
        None => (rest, None),
    };
    if path.is_empty() {
        return url.to_string();
    }

    let path = match (path.strip_prefix("~/"), std::env::var("HOME")) {
        (Some(tail), Ok(home)) => format!("{}/{}", home.trim_end_matches('/'), tail),
        _ => path.to_string(),
    };
    if let Some(parent) = Path::new(&path).parent() {
        if !parent.as_os_str().is_empty() {
            let _ = std::fs::create_dir_all(parent);
        }
    }

    match query {
        Some(q) => format!("sqlite://{}?{}", path, q),
        None => format!("sqlite://{}", path),
    }
}

pub async fn run_migrations(pool: &Pool) -> Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

// ---- scrape runs ----

#[instrument(skip_all)]
pub async fn open_scrape_run(pool: &Pool, source: &str, jobs_found: i64) -> Result<i64> {
    let rec = sqlx::query(
        "INSERT INTO scrape_runs (source, start_time, jobs_found, jobs_imported, status) \
         VALUES (?, ?, ?, 0, ?) RETURNING id",
    )
    .bind(source)
    .bind(Utc::now())
    .bind(jobs_found)
    .bind(RunStatus::Running.as_str())
    .fetch_one(pool)
    .await
    .context("failed to open scrape run")?;
    Ok(rec.get("id"))
}

#[instrument(skip_all)]
pub async fn complete_scrape_run(pool: &Pool, run_id: i64, jobs_imported: i64) -> Result<()> {
    close_scrape_run(pool, run_id, RunStatus::Completed, jobs_imported, None).await
}

#[instrument(skip_all)]
pub async fn fail_scrape_run(
    pool: &Pool,
    run_id: i64,
    jobs_imported: i64,
    error: &str,
) -> Result<()> {
    close_scrape_run(pool, run_id, RunStatus::Error, jobs_imported, Some(error)).await
}

/// Only a `running` row can be closed, so a run ends exactly once.
async fn close_scrape_run(
    pool: &Pool,
    run_id: i64,
    status: RunStatus,
    jobs_imported: i64,
    error: Option<&str>,
) -> Result<()> {
    let done = sqlx::query(
        "UPDATE scrape_runs SET status = ?, end_time = ?, jobs_imported = ?, error = ? \
         WHERE id = ? AND status = ?",
    )
    .bind(status.as_str())
    .bind(Utc::now())
    .bind(jobs_imported)
    .bind(error)
    .bind(run_id)
    .bind(RunStatus::Running.as_str())
    .execute(pool)
    .await
    .context("failed to close scrape run")?;
    if done.rows_affected() == 0 {
        return Err(anyhow!("scrape run {} is not running", run_id));
    }
    Ok(())
}

pub async fn fetch_scrape_run(pool: &Pool, run_id: i64) -> Result<ScrapeRun> {
    let sql = format!("SELECT {} FROM scrape_runs WHERE id = ?", RUN_COLUMNS);
    let row = sqlx::query(&sql)
        .bind(run_id)
        .fetch_optional(pool)
        .await?;
    let Some(row) = row else {
        return Err(anyhow!("scrape run {} not found", run_id));
    };
    run_from_row(&row)
}

/// Newest first.
pub async fn recent_scrape_runs(pool: &Pool, limit: i64) -> Result<Vec<ScrapeRun>> {
    let sql = format!(
        "SELECT {} FROM scrape_runs ORDER BY id DESC LIMIT ?",
        RUN_COLUMNS
    );
    let rows = sqlx::query(&sql).bind(limit).fetch_all(pool).await?;
    rows.iter().map(run_from_row).collect()
}

fn run_from_row(row: &SqliteRow) -> Result<ScrapeRun> {
    let id: i64 = row.get("id");
    let status: String = row.get("status");
    let status = RunStatus::parse_status(&status)
        .ok_or_else(|| anyhow!("scrape run {} has unknown status {}", id, status))?;
    Ok(ScrapeRun {
        id,
        source: row.get("source"),
        start_time: row.get("start_time"),
        end_time: row.try_get::<Option<DateTime<Utc>>, _>("end_time")?,
        jobs_found: row.get("jobs_found"),
        jobs_imported: row.get("jobs_imported"),
        status,
        error: row.try_get::<Option<String>, _>("error")?,
    })
}

// ---- staged jobs ----

#[instrument(skip_all)]
pub async fn find_staged_id(pool: &Pool, source: &str, external_id: &str) -> Result<Option<i64>> {
    let id = sqlx::query_scalar::<_, i64>(
        "SELECT id FROM scraped_jobs WHERE source = ? AND external_id = ?",
    )
    .bind(source)
    .bind(external_id)
    .fetch_optional(pool)
    .await?;
    Ok(id)
}

#[instrument(skip_all)]
pub async fn insert_staged_job(pool: &Pool, job: &RawJobRecord) -> Result<i64> {
    let now = Utc::now();
    let rec = sqlx::query(
        "INSERT INTO scraped_jobs (external_id, source, title, description, company_name, \
         location, job_type, salary_min, salary_max, salary_currency, skills, experience, \
         education, url, imported, created_at, updated_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 0, ?, ?) RETURNING id",
    )
    .bind(&job.external_id)
    .bind(&job.source)
    .bind(&job.title)
    .bind(&job.description)
    .bind(&job.company_name)
    .bind(&job.location)
    .bind(&job.job_type)
    .bind(job.salary_min)
    .bind(job.salary_max)
    .bind(&job.salary_currency)
    .bind(encode_skills(job.skills.as_deref())?)
    .bind(&job.experience)
    .bind(&job.education)
    .bind(&job.url)
    .bind(now)
    .bind(now)
    .fetch_one(pool)
    .await
    .with_context(|| format!("failed to insert staged job {}/{}", job.source, job.external_id))?;
    Ok(rec.get("id"))
}

/// Overwrites every mutable column with the latest sighting. Sync state and
/// `created_at` are left alone.
#[instrument(skip_all)]
pub async fn update_staged_job(pool: &Pool, id: i64, job: &RawJobRecord) -> Result<()> {
    sqlx::query(
        "UPDATE scraped_jobs SET title = ?, description = ?, company_name = ?, location = ?, \
         job_type = ?, salary_min = ?, salary_max = ?, salary_currency = ?, skills = ?, \
         experience = ?, education = ?, url = ?, updated_at = ? WHERE id = ?",
    )
    .bind(&job.title)
    .bind(&job.description)
    .bind(&job.company_name)
    .bind(&job.location)
    .bind(&job.job_type)
    .bind(job.salary_min)
    .bind(job.salary_max)
    .bind(&job.salary_currency)
    .bind(encode_skills(job.skills.as_deref())?)
    .bind(&job.experience)
    .bind(&job.education)
    .bind(&job.url)
    .bind(Utc::now())
    .bind(id)
    .execute(pool)
    .await
    .with_context(|| format!("failed to update staged job {}", id))?;
    Ok(())
}

pub async fn fetch_staged_job(pool: &Pool, id: i64) -> Result<StagedJob> {
    let sql = format!("SELECT {} FROM scraped_jobs WHERE id = ?", STAGED_COLUMNS);
    let row = sqlx::query(&sql).bind(id).fetch_optional(pool).await?;
    let Some(row) = row else {
        return Err(anyhow!("staged job {} not found", id));
    };
    staged_from_row(&row)
}

/// Rows not yet pushed downstream. Fewest failed attempts first, then oldest,
/// so rows that keep failing cannot hold back newer ones.
#[instrument(skip_all)]
pub async fn fetch_unsynced(pool: &Pool, limit: Option<usize>) -> Result<Vec<StagedJob>> {
    let sql = format!(
        "SELECT {} FROM scraped_jobs WHERE imported = 0 \
         ORDER BY sync_attempts ASC, id ASC LIMIT ?",
        STAGED_COLUMNS
    );
    // SQLite treats a negative limit as "no limit".
    let limit = limit.map(|l| l as i64).unwrap_or(-1);
    let rows = sqlx::query(&sql).bind(limit).fetch_all(pool).await?;
    rows.iter().map(staged_from_row).collect()
}

pub async fn mark_imported(pool: &Pool, id: i64) -> Result<()> {
    sqlx::query(
        "UPDATE scraped_jobs SET imported = 1, last_sync_error = NULL, updated_at = ? \
         WHERE id = ?",
    )
    .bind(Utc::now())
    .bind(id)
    .execute(pool)
    .await
    .context("failed to persist sync state")?;
    Ok(())
}

/// Count a failed push against the row and keep the reason.
pub async fn record_sync_failure(pool: &Pool, id: i64, reason: &str) -> Result<()> {
    sqlx::query(
        "UPDATE scraped_jobs SET sync_attempts = sync_attempts + 1, last_sync_error = ? \
         WHERE id = ?",
    )
    .bind(reason)
    .bind(id)
    .execute(pool)
    .await
    .context("failed to record sync failure")?;
    Ok(())
}

/// Pending rows that no sync pass has tried yet.
pub async fn count_untried(pool: &Pool) -> Result<i64> {
    let count = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM scraped_jobs WHERE imported = 0 AND sync_attempts = 0",
    )
    .fetch_one(pool)
    .await?;
    Ok(count)
}

pub async fn count_by_source(pool: &Pool) -> Result<Vec<SourceCount>> {
    let rows = sqlx::query(
        "SELECT source, COUNT(*) AS total, COALESCE(SUM(imported), 0) AS imported \
         FROM scraped_jobs GROUP BY source ORDER BY source",
    )
    .fetch_all(pool)
    .await?;
    Ok(rows
        .into_iter()
        .map(|row| SourceCount {
            source: row.get("source"),
            total: row.get("total"),
            imported: row.get("imported"),
        })
        .collect())
}

fn encode_skills(skills: Option<&[String]>) -> Result<Option<String>> {
    skills
        .map(|s| serde_json::to_string(s).context("failed to encode skills"))
        .transpose()
}

fn staged_from_row(row: &SqliteRow) -> Result<StagedJob> {
    let id: i64 = row.get("id");
    let skills = row
        .try_get::<Option<String>, _>("skills")?
        .filter(|s| !s.trim().is_empty())
        .map(|s| serde_json::from_str::<Vec<String>>(&s))
        .transpose()
        .with_context(|| format!("staged job {} has malformed skills", id))?;
    Ok(StagedJob {
        id,
        external_id: row.get("external_id"),
        source: row.get("source"),
        title: row.get("title"),
        description: row.try_get("description")?,
        company_name: row.try_get("company_name")?,
        location: row.try_get("location")?,
        job_type: row.try_get("job_type")?,
        salary_min: row.try_get("salary_min")?,
        salary_max: row.try_get("salary_max")?,
        salary_currency: row.try_get("salary_currency")?,
        skills,
        experience: row.try_get("experience")?,
        education: row.try_get("education")?,
        url: row.try_get("url")?,
        imported: row.get("imported"),
        sync_attempts: row.get("sync_attempts"),
        last_sync_error: row.try_get("last_sync_error")?,
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_urls_pass_through() {
        assert_eq!(prepare_sqlite_url("sqlite::memory:"), "sqlite::memory:");
        assert_eq!(
            prepare_sqlite_url("postgres://localhost/jobs"),
            "postgres://localhost/jobs"
        );
    }

    #[test]
    fn file_urls_get_parent_dir() {
        let td = tempfile::tempdir().unwrap();
        let db = td.path().join("nested").join("jobsync.db");
        let url = format!("sqlite://{}?mode=rwc", db.display());
        let prepared = prepare_sqlite_url(&url);
        assert_eq!(prepared, url);
        assert!(td.path().join("nested").is_dir());
    }
}
