use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::enrich::{
    classify_industry, convert_job_type, estimate_salary, extract_skills, normalize_location,
};
use crate::model::{Currency, RawJobRecord};

pub mod model;

pub use model::{Company, NewCompany, NewJob, RemoteId, RemoteJob};

const DEFAULT_EXPERIENCE: &str = "MID_LEVEL";
const DEFAULT_EDUCATION: &str = "BACHELORS";

#[derive(Debug, Error)]
pub enum PlatformError {
    #[error("platform API token is not configured")]
    MissingCredential,
    #[error("resource not found")]
    NotFound,
    #[error("platform returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("invalid endpoint: {0}")]
    Url(String),
    #[error("unexpected response body: {0}")]
    Decode(#[from] serde_json::Error),
}

/// The downstream job board, as far as the sync pipeline needs it.
#[async_trait]
pub trait JobBoard: Send + Sync {
    /// `Ok(None)` when the platform has never seen this posting.
    async fn find_job(
        &self,
        source: &str,
        external_id: &str,
    ) -> Result<Option<RemoteJob>, PlatformError>;

    async fn search_companies(&self, name: &str) -> Result<Vec<Company>, PlatformError>;

    async fn create_company(&self, company: &NewCompany) -> Result<Company, PlatformError>;

    async fn create_job(&self, job: &NewJob) -> Result<RemoteJob, PlatformError>;

    async fn job_stats(&self) -> Result<Value, PlatformError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDisposition {
    Retryable,
    NonRetryable,
}

pub fn classify_status(status: StatusCode) -> RetryDisposition {
    if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
        RetryDisposition::Retryable
    } else {
        RetryDisposition::NonRetryable
    }
}

pub fn classify_reqwest_error(err: &reqwest::Error) -> RetryDisposition {
    if err.is_timeout() || err.is_connect() {
        RetryDisposition::Retryable
    } else {
        RetryDisposition::NonRetryable
    }
}

/// Capped exponential backoff for idempotent reads.
#[derive(Debug, Clone, Copy)]
pub struct BackoffPolicy {
    pub max_retries: usize,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            base_delay: Duration::from_millis(250),
            max_delay: Duration::from_secs(4),
        }
    }
}

impl BackoffPolicy {
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    pub fn delay_for_attempt(&self, attempt: usize) -> Duration {
        let factor = 1u32.checked_shl(attempt as u32).unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }
}

#[derive(Clone)]
pub struct PlatformClient {
    http: Client,
    base_url: Url,
    token: String,
    backoff: BackoffPolicy,
}

impl fmt::Debug for PlatformClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlatformClient")
            .field("base_url", &self.base_url)
            .field("backoff", &self.backoff)
            .finish_non_exhaustive()
    }
}

impl PlatformClient {
    /// Fails with `MissingCredential` before any request can be made.
    pub fn from_config(cfg: &Config) -> Result<Self, PlatformError> {
        Self::new(
            &cfg.platform.base_url,
            cfg.platform.token.clone(),
            cfg.timeout(),
            &cfg.platform.user_agent,
        )
    }

    pub fn new(
        base_url: &str,
        token: String,
        timeout: Duration,
        user_agent: &str,
    ) -> Result<Self, PlatformError> {
        if token.trim().is_empty() {
            return Err(PlatformError::MissingCredential);
        }
        // `Url::join` drops the last segment unless the base ends in a slash.
        let base = if base_url.ends_with('/') {
            base_url.to_string()
        } else {
            format!("{}/", base_url)
        };
        let base_url = Url::parse(&base).map_err(|e| PlatformError::Url(e.to_string()))?;
        let http = Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .build()?;
        Ok(Self {
            http,
            base_url,
            token,
            backoff: BackoffPolicy::default(),
        })
    }

    pub fn with_backoff(mut self, backoff: BackoffPolicy) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> Result<Url, PlatformError> {
        self.base_url
            .join(path)
            .map_err(|e| PlatformError::Url(e.to_string()))
    }

    /// `jobs/external/{source}/{external_id}` with both segments percent-encoded.
    pub fn external_job_url(&self, source: &str, external_id: &str) -> Result<Url, PlatformError> {
        let mut url = self.endpoint("jobs/external/")?;
        url.path_segments_mut()
            .map_err(|_| PlatformError::Url(self.base_url.to_string()))?
            .pop_if_empty()
            .push(source)
            .push(external_id);
        Ok(url)
    }

    pub fn company_search_url(&self, name: &str) -> Result<Url, PlatformError> {
        let mut url = self.endpoint("companies/search")?;
        url.query_pairs_mut().append_pair("name", name);
        Ok(url)
    }

    pub fn build_get(&self, url: Url) -> Result<reqwest::Request, PlatformError> {
        Ok(self
            .http
            .get(url)
            .bearer_auth(&self.token)
            .header("Accept", "application/json")
            .build()?)
    }

    pub fn build_post<T: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &T,
    ) -> Result<reqwest::Request, PlatformError> {
        let url = self.endpoint(path)?;
        Ok(self
            .http
            .post(url)
            .bearer_auth(&self.token)
            .header("Accept", "application/json")
            .json(body)
            .build()?)
    }

    /// GETs are idempotent, so transient failures are retried with backoff.
    async fn get(&self, url: Url) -> Result<Response, PlatformError> {
        let mut attempt = 0;
        loop {
            let request = self.build_get(url.clone())?;
            debug!(url = %request.url(), attempt, "platform GET");
            match self.http.execute(request).await {
                Ok(res) => {
                    let status = res.status();
                    if classify_status(status) == RetryDisposition::Retryable
                        && attempt < self.backoff.max_retries
                    {
                        warn!(%url, %status, attempt, "transient platform status; retrying");
                        tokio::time::sleep(self.backoff.delay_for_attempt(attempt)).await;
                        attempt += 1;
                        continue;
                    }
                    return Ok(res);
                }
                Err(err) => {
                    if classify_reqwest_error(&err) == RetryDisposition::Retryable
                        && attempt < self.backoff.max_retries
                    {
                        warn!(%url, ?err, attempt, "platform unreachable; retrying");
                        tokio::time::sleep(self.backoff.delay_for_attempt(attempt)).await;
                        attempt += 1;
                        continue;
                    }
                    return Err(PlatformError::Request(err));
                }
            }
        }
    }

    /// Writes are sent once.
    async fn post<T, R>(&self, path: &str, body: &T) -> Result<R, PlatformError>
    where
        T: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let request = self.build_post(path, body)?;
        debug!(url = %request.url(), "platform POST");
        let res = self.http.execute(request).await?;
        read_json(res).await
    }
}

async fn read_json<R: DeserializeOwned>(res: Response) -> Result<R, PlatformError> {
    let status = res.status();
    if status == StatusCode::NOT_FOUND {
        return Err(PlatformError::NotFound);
    }
    if !status.is_success() {
        let body = res.text().await.unwrap_or_default();
        warn!(%status, body = %body, "platform API error");
        return Err(PlatformError::Status {
            status: status.as_u16(),
            body,
        });
    }
    let text = res.text().await?;
    Ok(serde_json::from_str(&text)?)
}

#[async_trait]
impl JobBoard for PlatformClient {
    async fn find_job(
        &self,
        source: &str,
        external_id: &str,
    ) -> Result<Option<RemoteJob>, PlatformError> {
        let url = self.external_job_url(source, external_id)?;
        let res = self.get(url).await?;
        match read_json::<RemoteJob>(res).await {
            Ok(job) if job.id.is_some() => Ok(Some(job)),
            Ok(_) | Err(PlatformError::NotFound) => Ok(None),
            Err(err) => Err(err),
        }
    }

    async fn search_companies(&self, name: &str) -> Result<Vec<Company>, PlatformError> {
        let url = self.company_search_url(name)?;
        let res = self.get(url).await?;
        read_json(res).await
    }

    async fn create_company(&self, company: &NewCompany) -> Result<Company, PlatformError> {
        let created: Company = self.post("companies", company).await?;
        info!(name = %company.name, id = %created.id, "created company");
        Ok(created)
    }

    async fn create_job(&self, job: &NewJob) -> Result<RemoteJob, PlatformError> {
        let created: RemoteJob = self.post("jobs", job).await?;
        info!(
            title = %job.title,
            id = %created.id.as_ref().map(|id| id.0.as_str()).unwrap_or("?"),
            "created job posting"
        );
        Ok(created)
    }

    async fn job_stats(&self) -> Result<Value, PlatformError> {
        let url = self.endpoint("jobs/stats")?;
        let res = self.get(url).await?;
        read_json(res).await
    }
}

/// Company payload for a posting whose employer the platform does not know yet.
pub fn build_company(job: &RawJobRecord) -> NewCompany {
    let location = normalize_location(&job.location);
    NewCompany {
        name: job.company_name.clone(),
        description: format!("Employer in {}", location),
        website: String::new(),
        location,
        logo_url: String::new(),
        industry: classify_industry(&job.title, &job.description)
            .label()
            .to_string(),
    }
}

pub fn build_job(job: &RawJobRecord, company_id: &RemoteId) -> NewJob {
    let industry = classify_industry(&job.title, &job.description);
    let skills = match &job.skills {
        Some(skills) if !skills.is_empty() => skills.clone(),
        _ => extract_skills(&job.description),
    };
    let salary_currency = job
        .salary_currency
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(str::to_ascii_uppercase)
        .unwrap_or_else(|| Currency::Jmd.as_str().to_string());
    let estimated_salary = (job.salary_min.is_none() && job.salary_max.is_none())
        .then(|| estimate_salary(&job.title, industry));

    NewJob {
        title: job.title.clone(),
        description: job.description.clone(),
        company_id: company_id.clone(),
        location: normalize_location(&job.location),
        job_type: convert_job_type(job.job_type.as_deref()).as_str().to_string(),
        salary_min: job.salary_min,
        salary_max: job.salary_max,
        salary_currency,
        skills,
        experience_level: non_blank(job.experience.as_deref())
            .unwrap_or(DEFAULT_EXPERIENCE)
            .to_string(),
        education_level: non_blank(job.education.as_deref())
            .unwrap_or(DEFAULT_EDUCATION)
            .to_string(),
        application_url: job.url.clone().unwrap_or_default(),
        external_id: job.external_id.clone(),
        external_source: job.source.clone(),
        is_active: true,
        industry: industry.label().to_string(),
        estimated_salary,
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn client() -> PlatformClient {
        PlatformClient::new(
            "http://api:3000/api",
            "secret-token".into(),
            Duration::from_secs(10),
            "jobsync-test",
        )
        .unwrap()
    }

    fn sample_job() -> RawJobRecord {
        RawJobRecord {
            title: "Software Developer".into(),
            description: "Build web applications. Proficient in PostgreSQL. Experience with Rust services."
                .into(),
            company_name: "Island Tech".into(),
            location: "Kgn".into(),
            job_type: Some("Contract".into()),
            external_id: "cj-42".into(),
            source: "caribbeanjobs".into(),
            url: Some("https://example.com/jobs/42".into()),
            ..Default::default()
        }
    }

    #[test]
    fn blank_token_is_rejected_up_front() {
        let err = PlatformClient::new(
            "http://api:3000/api/",
            "  ".into(),
            Duration::from_secs(1),
            "ua",
        )
        .unwrap_err();
        assert!(matches!(err, PlatformError::MissingCredential));
    }

    #[test]
    fn debug_output_hides_token() {
        let rendered = format!("{:?}", client());
        assert!(!rendered.contains("secret-token"));
        assert!(rendered.contains("api:3000"));
    }

    #[test]
    fn get_request_carries_bearer_token() {
        let c = client();
        let req = c.build_get(c.company_search_url("Acme & Sons").unwrap()).unwrap();
        assert_eq!(req.method(), reqwest::Method::GET);
        assert_eq!(
            req.headers().get("authorization").unwrap(),
            "Bearer secret-token"
        );
        assert_eq!(req.url().path(), "/api/companies/search");
        assert_eq!(req.url().query(), Some("name=Acme+%26+Sons"));
    }

    #[test]
    fn external_job_segments_are_encoded() {
        let url = client().external_job_url("job board", "id/7").unwrap();
        assert_eq!(url.path(), "/api/jobs/external/job%20board/id%2F7");
    }

    #[test]
    fn post_request_serializes_body() {
        let c = client();
        let payload = build_company(&sample_job());
        let req = c.build_post("companies", &payload).unwrap();
        assert_eq!(req.method(), reqwest::Method::POST);
        assert_eq!(req.url().as_str(), "http://api:3000/api/companies");
        assert_eq!(
            req.headers().get("content-type").unwrap(),
            "application/json"
        );
        let body: Value =
            serde_json::from_slice(req.body().unwrap().as_bytes().unwrap()).unwrap();
        assert_eq!(body["name"], "Island Tech");
        assert_eq!(body["logoUrl"], "");
    }

    #[test]
    fn company_payload_is_enriched() {
        let company = build_company(&sample_job());
        assert_eq!(company.location, "Kingston");
        assert_eq!(company.description, "Employer in Kingston");
        assert_eq!(company.industry, "Information Technology");
    }

    #[test]
    fn job_payload_applies_defaults() {
        let job = build_job(&sample_job(), &RemoteId::from("c-1"));
        let body = serde_json::to_value(&job).unwrap();
        assert_eq!(body["companyId"], "c-1");
        assert_eq!(body["location"], "Kingston");
        assert_eq!(body["jobType"], "CONTRACT");
        assert_eq!(body["salaryCurrency"], "JMD");
        assert_eq!(body["experienceLevel"], "MID_LEVEL");
        assert_eq!(body["educationLevel"], "BACHELORS");
        assert_eq!(body["externalSource"], "caribbeanjobs");
        assert_eq!(body["isActive"], true);
        assert_eq!(body["salaryMin"], Value::Null);
        assert!(body["skills"]
            .as_array()
            .unwrap()
            .contains(&json!("PostgreSQL")));
        assert_eq!(body["estimatedSalary"]["currency"], "JMD");
    }

    #[test]
    fn provided_values_win_over_defaults() {
        let raw = RawJobRecord {
            skills: Some(vec!["Excel".into()]),
            salary_min: Some(2_000_000.0),
            salary_currency: Some("usd".into()),
            experience: Some("SENIOR".into()),
            ..sample_job()
        };
        let job = build_job(&raw, &RemoteId::from("c-1"));
        assert_eq!(job.skills, vec!["Excel".to_string()]);
        assert_eq!(job.salary_currency, "USD");
        assert_eq!(job.experience_level, "SENIOR");
        assert!(job.estimated_salary.is_none());
        let body = serde_json::to_value(&job).unwrap();
        assert!(body.get("estimatedSalary").is_none());
    }

    #[test]
    fn remote_ids_accept_numbers() {
        let company: Company = serde_json::from_value(json!({"id": 17, "name": "Acme"})).unwrap();
        assert_eq!(company.id, RemoteId::from("17"));
        let job: RemoteJob = serde_json::from_value(json!({})).unwrap();
        assert!(job.id.is_none());
    }

    #[test]
    fn retry_classification() {
        assert_eq!(
            classify_status(StatusCode::TOO_MANY_REQUESTS),
            RetryDisposition::Retryable
        );
        assert_eq!(
            classify_status(StatusCode::BAD_GATEWAY),
            RetryDisposition::Retryable
        );
        assert_eq!(
            classify_status(StatusCode::NOT_FOUND),
            RetryDisposition::NonRetryable
        );
    }

    #[test]
    fn backoff_is_capped() {
        let policy = BackoffPolicy::default();
        assert_eq!(policy.delay_for_attempt(0), Duration::from_millis(250));
        assert_eq!(policy.delay_for_attempt(2), Duration::from_secs(1));
        assert_eq!(policy.delay_for_attempt(10), Duration::from_secs(4));
        assert_eq!(BackoffPolicy::none().max_retries, 0);
    }
}
