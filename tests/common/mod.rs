#![allow(dead_code)]

use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::Mutex;

use jobsync::db;
use jobsync::model::RawJobRecord;
use jobsync::platform::{
    Company, JobBoard, NewCompany, NewJob, PlatformError, RemoteId, RemoteJob,
};

pub async fn setup_pool() -> db::Pool {
    let pool = db::init_pool("sqlite::memory:").await.unwrap();
    db::run_migrations(&pool).await.unwrap();
    pool
}

pub fn job(external_id: &str, title: &str, company: &str) -> RawJobRecord {
    RawJobRecord {
        title: title.into(),
        description: format!(
            "{} wanted to join a busy team. Duties include daily reporting, planning and \
             coordination with other departments across the island.",
            title
        ),
        company_name: company.into(),
        location: "Kingston".into(),
        job_type: Some("Full-time".into()),
        salary_min: Some(1_200_000.0),
        salary_max: Some(1_800_000.0),
        salary_currency: Some("JMD".into()),
        external_id: external_id.into(),
        source: "caribbeanjobs".into(),
        url: Some(format!("https://example.com/jobs/{}", external_id)),
        ..Default::default()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    FindJob { source: String, external_id: String },
    SearchCompanies(String),
    CreateCompany(NewCompany),
    CreateJob(NewJob),
    Stats,
}

impl Call {
    pub fn is_write(&self) -> bool {
        matches!(self, Call::CreateCompany(_) | Call::CreateJob(_))
    }
}

type Queue<T> = Arc<Mutex<VecDeque<Result<T, PlatformError>>>>;

/// Job board double: scripted responses per endpoint, every call recorded.
/// Unscripted calls succeed (nothing found, creations get fresh ids).
#[derive(Clone, Default)]
pub struct RecordingBoard {
    find: Queue<Option<RemoteJob>>,
    search: Queue<Vec<Company>>,
    company: Queue<Company>,
    create: Queue<RemoteJob>,
    calls: Arc<Mutex<Vec<Call>>>,
}

impl RecordingBoard {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn script_find(&self, response: Result<Option<RemoteJob>, PlatformError>) {
        self.find.lock().await.push_back(response);
    }

    pub async fn script_search(&self, response: Result<Vec<Company>, PlatformError>) {
        self.search.lock().await.push_back(response);
    }

    pub async fn script_company(&self, response: Result<Company, PlatformError>) {
        self.company.lock().await.push_back(response);
    }

    pub async fn script_create(&self, response: Result<RemoteJob, PlatformError>) {
        self.create.lock().await.push_back(response);
    }

    pub async fn calls(&self) -> Vec<Call> {
        self.calls.lock().await.clone()
    }

    pub async fn writes(&self) -> Vec<Call> {
        self.calls().await.into_iter().filter(Call::is_write).collect()
    }

    async fn record(&self, call: Call) -> usize {
        let mut calls = self.calls.lock().await;
        calls.push(call);
        calls.len()
    }
}

pub fn existing(id: &str) -> RemoteJob {
    RemoteJob {
        id: Some(RemoteId::from(id)),
        title: None,
    }
}

pub fn company(id: &str, name: &str) -> Company {
    Company {
        id: RemoteId::from(id),
        name: name.into(),
    }
}

pub fn server_error() -> PlatformError {
    PlatformError::Status {
        status: 500,
        body: "internal error".into(),
    }
}

#[async_trait::async_trait]
impl JobBoard for RecordingBoard {
    async fn find_job(
        &self,
        source: &str,
        external_id: &str,
    ) -> Result<Option<RemoteJob>, PlatformError> {
        self.record(Call::FindJob {
            source: source.into(),
            external_id: external_id.into(),
        })
        .await;
        self.find.lock().await.pop_front().unwrap_or(Ok(None))
    }

    async fn search_companies(&self, name: &str) -> Result<Vec<Company>, PlatformError> {
        self.record(Call::SearchCompanies(name.into())).await;
        self.search.lock().await.pop_front().unwrap_or(Ok(Vec::new()))
    }

    async fn create_company(&self, new: &NewCompany) -> Result<Company, PlatformError> {
        let n = self.record(Call::CreateCompany(new.clone())).await;
        self.company
            .lock()
            .await
            .pop_front()
            .unwrap_or_else(|| Ok(company(&format!("company-{}", n), &new.name)))
    }

    async fn create_job(&self, new: &NewJob) -> Result<RemoteJob, PlatformError> {
        let n = self.record(Call::CreateJob(new.clone())).await;
        self.create
            .lock()
            .await
            .pop_front()
            .unwrap_or_else(|| Ok(existing(&format!("job-{}", n))))
    }

    async fn job_stats(&self) -> Result<Value, PlatformError> {
        self.record(Call::Stats).await;
        Ok(json!({ "total": 0 }))
    }
}
