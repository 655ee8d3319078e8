use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A job posting as handed over by a scraper. Never mutated by the pipeline;
/// validation works on a copy.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawJobRecord {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub company_name: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub job_type: Option<String>,
    #[serde(default)]
    pub salary_min: Option<f64>,
    #[serde(default)]
    pub salary_max: Option<f64>,
    #[serde(default)]
    pub salary_currency: Option<String>,
    #[serde(default)]
    pub skills: Option<Vec<String>>,
    #[serde(default)]
    pub experience: Option<String>,
    #[serde(default)]
    pub education: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub external_id: String,
    #[serde(default)]
    pub source: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Running,
    Completed,
    Error,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Running => "running",
            RunStatus::Completed => "completed",
            RunStatus::Error => "error",
        }
    }

    pub fn parse_status(s: &str) -> Option<Self> {
        match s {
            "running" => Some(RunStatus::Running),
            "completed" => Some(RunStatus::Completed),
            "error" => Some(RunStatus::Error),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Currency {
    #[serde(rename = "JMD")]
    Jmd,
    #[serde(rename = "USD")]
    Usd,
}

impl Currency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Currency::Jmd => "JMD",
            Currency::Usd => "USD",
        }
    }

    /// Unknown codes yield `None`; callers skip currency-specific checks for them.
    pub fn parse_code(s: &str) -> Option<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "JMD" => Some(Currency::Jmd),
            "USD" => Some(Currency::Usd),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobType {
    FullTime,
    PartTime,
    Contract,
    Internship,
    Temporary,
}

impl JobType {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobType::FullTime => "FULL_TIME",
            JobType::PartTime => "PART_TIME",
            JobType::Contract => "CONTRACT",
            JobType::Internship => "INTERNSHIP",
            JobType::Temporary => "TEMPORARY",
        }
    }
}

/// Industry labels understood by the downstream platform. Declaration order
/// matters: it breaks ties when classifying.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Industry {
    TourismHospitality,
    Agriculture,
    BankingFinance,
    InformationTechnology,
    Telecommunications,
    Manufacturing,
    RetailSales,
    Construction,
    Education,
    Healthcare,
    MiningResources,
    Government,
    ShippingLogistics,
    Bpo,
    CreativeIndustries,
    EnergyUtilities,
    Other,
}

impl Industry {
    pub fn label(&self) -> &'static str {
        match self {
            Industry::TourismHospitality => "Tourism & Hospitality",
            Industry::Agriculture => "Agriculture & Farming",
            Industry::BankingFinance => "Banking & Finance",
            Industry::InformationTechnology => "Information Technology",
            Industry::Telecommunications => "Telecommunications",
            Industry::Manufacturing => "Manufacturing",
            Industry::RetailSales => "Retail & Sales",
            Industry::Construction => "Construction",
            Industry::Education => "Education",
            Industry::Healthcare => "Healthcare",
            Industry::MiningResources => "Mining & Resources",
            Industry::Government => "Government & Public Service",
            Industry::ShippingLogistics => "Shipping & Logistics",
            Industry::Bpo => "Business Process Outsourcing (BPO)",
            Industry::CreativeIndustries => "Creative Industries",
            Industry::EnergyUtilities => "Energy & Utilities",
            Industry::Other => "Other",
        }
    }
}

/// Bookkeeping row for one ingestion batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrapeRun {
    pub id: i64,
    pub source: String,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub jobs_found: i64,
    pub jobs_imported: i64,
    pub status: RunStatus,
    pub error: Option<String>,
}

/// Durable copy of a posting in the staging table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StagedJob {
    pub id: i64,
    pub external_id: String,
    pub source: String,
    pub title: String,
    pub description: Option<String>,
    pub company_name: Option<String>,
    pub location: Option<String>,
    pub job_type: Option<String>,
    pub salary_min: Option<f64>,
    pub salary_max: Option<f64>,
    pub salary_currency: Option<String>,
    pub skills: Option<Vec<String>>,
    pub experience: Option<String>,
    pub education: Option<String>,
    pub url: Option<String>,
    pub imported: bool,
    /// Failed pushes so far.
    pub sync_attempts: i64,
    pub last_sync_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl StagedJob {
    /// Rebuild the raw record shape so a staged row can be validated again before sync.
    pub fn to_record(&self) -> RawJobRecord {
        RawJobRecord {
            title: self.title.clone(),
            description: self.description.clone().unwrap_or_default(),
            company_name: self.company_name.clone().unwrap_or_default(),
            location: self.location.clone().unwrap_or_default(),
            job_type: self.job_type.clone(),
            salary_min: self.salary_min,
            salary_max: self.salary_max,
            salary_currency: self.salary_currency.clone(),
            skills: self.skills.clone(),
            experience: self.experience.clone(),
            education: self.education.clone(),
            url: self.url.clone(),
            external_id: self.external_id.clone(),
            source: self.source.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_status_round_trips_through_text() {
        for status in [RunStatus::Running, RunStatus::Completed, RunStatus::Error] {
            assert_eq!(RunStatus::parse_status(status.as_str()), Some(status));
        }
        assert_eq!(RunStatus::parse_status("paused"), None);
    }

    #[test]
    fn currency_codes_are_case_insensitive() {
        assert_eq!(Currency::parse_code(" jmd "), Some(Currency::Jmd));
        assert_eq!(Currency::parse_code("USD"), Some(Currency::Usd));
        assert_eq!(Currency::parse_code("EUR"), None);
    }

    #[test]
    fn raw_record_reads_camel_case_json() {
        let json = r#"{
            "title": "Accountant",
            "companyName": "Acme Ltd",
            "salaryMin": 1200000,
            "externalId": "cj-1",
            "source": "caribbeanjobs"
        }"#;
        let rec: RawJobRecord = serde_json::from_str(json).unwrap();
        assert_eq!(rec.company_name, "Acme Ltd");
        assert_eq!(rec.salary_min, Some(1_200_000.0));
        assert_eq!(rec.salary_max, None);
        assert!(rec.description.is_empty());
        assert!(rec.skills.is_none());
    }
}
