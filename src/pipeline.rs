//! End-to-end ingestion: validate a scraped batch, stage it, then push
//! whatever is pending to the job board.

use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use thiserror::Error;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::config::SyncSettings;
use crate::db::Pool;
use crate::import::{import_batch, ImportStats};
use crate::model::RawJobRecord;
use crate::platform::{JobBoard, PlatformError};
use crate::sync::{sync_pending, SyncStats};
use crate::validate::{validate_all, InvalidJob};

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("an ingestion run is already in progress")]
    AlreadyRunning,
    #[error("import failed")]
    Import(#[source] anyhow::Error),
    #[error("staging store error")]
    Store(#[source] anyhow::Error),
    #[error(transparent)]
    Platform(#[from] PlatformError),
}

/// Allows one ingestion at a time. Owned by the caller and shared with
/// whoever may trigger a run.
#[derive(Debug, Default)]
pub struct RunGuard {
    busy: AtomicBool,
}

/// Held for the duration of a run; releases the guard on drop.
#[derive(Debug)]
pub struct RunPermit<'a> {
    guard: &'a RunGuard,
    token: Uuid,
}

impl RunGuard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn try_acquire(&self) -> Option<RunPermit<'_>> {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| RunPermit {
                guard: self,
                token: Uuid::new_v4(),
            })
    }

    pub fn is_running(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }
}

impl RunPermit<'_> {
    pub fn token(&self) -> Uuid {
        self.token
    }
}

impl Drop for RunPermit<'_> {
    fn drop(&mut self) {
        self.guard.busy.store(false, Ordering::Release);
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ValidationSummary {
    pub valid: usize,
    pub warned: usize,
    pub invalid: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct IngestionReport {
    pub run_token: Uuid,
    pub validation: ValidationSummary,
    pub rejected: Vec<InvalidJob>,
    pub import: ImportStats,
    /// `None` when sync is disabled.
    pub sync: Option<SyncStats>,
}

/// Validate, stage and optionally sync one scraped batch.
///
/// Rejected records never reach the store. The sync step covers every staged
/// row still pending, not only this batch. With sync enabled a job board is
/// required; without one the run fails before anything is staged.
#[instrument(skip_all, fields(source = source_label, records = records.len()))]
pub async fn run_ingestion(
    pool: &Pool,
    guard: &RunGuard,
    board: Option<&dyn JobBoard>,
    settings: &SyncSettings,
    source_label: &str,
    records: &[RawJobRecord],
) -> Result<IngestionReport, PipelineError> {
    let board = match board {
        Some(board) => settings.enabled.then_some(board),
        None if settings.enabled => return Err(PlatformError::MissingCredential.into()),
        None => None,
    };
    let permit = guard.try_acquire().ok_or(PipelineError::AlreadyRunning)?;
    info!(run = %permit.token(), "ingestion started");

    let report = validate_all(records);
    let validation = ValidationSummary {
        valid: report.valid.len(),
        warned: report.warned.len(),
        invalid: report.invalid.len(),
    };
    let usable = report.usable();

    let import = import_batch(pool, source_label, &usable)
        .await
        .map_err(PipelineError::Import)?;

    let sync = match board {
        Some(board) => Some(
            sync_pending(pool, board, settings)
                .await
                .map_err(PipelineError::Store)?,
        ),
        None => {
            info!("sync disabled; jobs left staged");
            None
        }
    };

    info!(run = %permit.token(), "ingestion finished");
    Ok(IngestionReport {
        run_token: permit.token(),
        validation,
        rejected: report.invalid,
        import,
        sync,
    })
}
