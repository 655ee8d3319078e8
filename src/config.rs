//! Configuration loader and validator for the ingestion and sync pipeline.
use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

pub const TOKEN_ENV: &str = "JOBBOARD_API_TOKEN";
pub const DATABASE_URL_ENV: &str = "DATABASE_URL";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML parse error: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(&'static str),
}

/// Root configuration struct mirroring the YAML schema.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Config {
    pub app: App,
    pub platform: Platform,
    #[serde(default)]
    pub sync: SyncSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct App {
    pub data_dir: String,
    /// Label recorded on scrape runs when a batch mixes several sources.
    #[serde(default = "default_source")]
    pub default_source: String,
}

/// Downstream job-board API settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Platform {
    pub base_url: String,
    #[serde(default)]
    pub token: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SyncSettings {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    /// Upper bound on staged rows pushed per sync pass. 0 means unlimited.
    #[serde(default = "default_batch_limit")]
    pub batch_limit: usize,
}

impl SyncSettings {
    /// Rows to fetch per sync pass; `None` when `batch_limit` is 0.
    pub fn limit(&self) -> Option<usize> {
        (self.batch_limit > 0).then_some(self.batch_limit)
    }
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            concurrency: default_concurrency(),
            batch_limit: default_batch_limit(),
        }
    }
}

fn default_source() -> String {
    "combined".into()
}

fn default_timeout_secs() -> u64 {
    10
}

fn default_user_agent() -> String {
    format!("jobsync/{}", env!("CARGO_PKG_VERSION"))
}

fn default_true() -> bool {
    true
}

fn default_concurrency() -> usize {
    1
}

fn default_batch_limit() -> usize {
    500
}

impl Config {
    /// Ensure required directories exist (creates `app.data_dir` if missing).
    pub fn ensure_dirs(&self) -> Result<(), std::io::Error> {
        fs::create_dir_all(&self.app.data_dir)
    }

    /// `DATABASE_URL` wins; otherwise a SQLite file inside `app.data_dir`.
    pub fn database_url(&self) -> String {
        std::env::var(DATABASE_URL_ENV)
            .unwrap_or_else(|_| format!("sqlite://{}/jobsync.db", self.app.data_dir))
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.platform.timeout_secs)
    }
}

/// Load configuration from a YAML file and validate it.
/// - If `path` is None, uses `config.yaml` in the current working directory.
/// - A non-empty `JOBBOARD_API_TOKEN` replaces `platform.token`.
pub fn load(path: Option<&Path>) -> Result<Config, ConfigError> {
    let path = path.unwrap_or_else(|| Path::new("config.yaml"));
    let content = fs::read_to_string(path)?;
    let mut cfg: Config = serde_yaml::from_str(&content)?;
    if let Ok(token) = std::env::var(TOKEN_ENV) {
        if !token.trim().is_empty() {
            cfg.platform.token = token;
        }
    }
    validate(&cfg)?;
    Ok(cfg)
}

/// The token is not checked here: commands that never talk to the platform
/// run without one. The platform client refuses to work without it.
fn validate(cfg: &Config) -> Result<(), ConfigError> {
    if cfg.app.data_dir.trim().is_empty() {
        return Err(ConfigError::Invalid("app.data_dir must be non-empty"));
    }
    if cfg.app.default_source.trim().is_empty() {
        return Err(ConfigError::Invalid("app.default_source must be non-empty"));
    }

    let base = Url::parse(&cfg.platform.base_url)
        .map_err(|_| ConfigError::Invalid("platform.base_url must be an absolute URL"))?;
    if base.cannot_be_a_base() {
        return Err(ConfigError::Invalid("platform.base_url must be an absolute URL"));
    }
    if cfg.platform.timeout_secs == 0 {
        return Err(ConfigError::Invalid("platform.timeout_secs must be > 0"));
    }

    if cfg.sync.concurrency == 0 {
        return Err(ConfigError::Invalid("sync.concurrency must be > 0"));
    }

    Ok(())
}

/// Returns an example configuration file.
pub fn example() -> &'static str {
    r#"app:
  data_dir: "./data"
  default_source: "combined"

platform:
  base_url: "http://api:3000/api/"
  token: "YOUR_JOBBOARD_API_TOKEN"
  timeout_secs: 10
  user_agent: "jobsync/0.1"

sync:
  enabled: true
  concurrency: 1
  batch_limit: 500
"#
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn sample() -> Config {
        serde_yaml::from_str(example()).unwrap()
    }

    #[test]
    fn parse_example_ok() {
        let cfg = sample();
        validate(&cfg).unwrap();
        assert_eq!(cfg.platform.timeout_secs, 10);
        assert_eq!(cfg.sync.concurrency, 1);
        assert_eq!(cfg.sync.limit(), Some(500));
    }

    #[test]
    fn sync_section_is_optional() {
        let yaml = r#"
app:
  data_dir: "./data"
platform:
  base_url: "https://jobs.example.com/api/"
"#;
        let cfg: Config = serde_yaml::from_str(yaml).unwrap();
        validate(&cfg).unwrap();
        assert_eq!(cfg.app.default_source, "combined");
        assert_eq!(cfg.sync, SyncSettings::default());
        assert!(cfg.platform.token.is_empty());
        assert!(cfg.platform.user_agent.starts_with("jobsync/"));
    }

    #[test]
    fn invalid_base_url() {
        let mut cfg = sample();
        cfg.platform.base_url = "not a url".into();
        match validate(&cfg).unwrap_err() {
            ConfigError::Invalid(msg) => assert!(msg.contains("platform.base_url")),
            _ => panic!("wrong error"),
        }
    }

    #[test]
    fn zero_values_rejected() {
        let mut cfg = sample();
        cfg.platform.timeout_secs = 0;
        assert!(matches!(validate(&cfg), Err(ConfigError::Invalid(m)) if m.contains("timeout")));

        let mut cfg = sample();
        cfg.sync.concurrency = 0;
        assert!(matches!(validate(&cfg), Err(ConfigError::Invalid(m)) if m.contains("concurrency")));

        let mut cfg = sample();
        cfg.app.data_dir = "  ".into();
        assert!(matches!(validate(&cfg), Err(ConfigError::Invalid(m)) if m.contains("data_dir")));
    }

    #[test]
    fn zero_batch_limit_means_unlimited() {
        let mut cfg = sample();
        cfg.sync.batch_limit = 0;
        assert_eq!(cfg.sync.limit(), None);
    }

    #[test]
    fn ensure_dirs_creates_data_dir() {
        let td = tempdir().unwrap();
        let data_path = td.path().join("data");
        let mut cfg = sample();
        cfg.app.data_dir = data_path.to_string_lossy().to_string();
        cfg.ensure_dirs().unwrap();
        assert!(data_path.exists());
    }

    #[test]
    fn load_from_file_ok() {
        let td = tempdir().unwrap();
        let p = td.path().join("config.yaml");
        fs::write(&p, example()).unwrap();
        let cfg = load(Some(&p)).unwrap();
        assert_eq!(cfg.platform.base_url, "http://api:3000/api/");
    }

    #[test]
    fn load_missing_file_is_io_error() {
        let td = tempdir().unwrap();
        let err = load(Some(&td.path().join("absent.yaml"))).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
