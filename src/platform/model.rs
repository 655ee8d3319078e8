use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

use crate::enrich::SalaryEstimate;

/// Identifier assigned by the platform. Accepts JSON strings and numbers.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct RemoteId(pub String);

impl<'de> Deserialize<'de> for RemoteId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Text(String),
            Number(i64),
        }
        Ok(match Repr::deserialize(deserializer)? {
            Repr::Text(s) => RemoteId(s),
            Repr::Number(n) => RemoteId(n.to_string()),
        })
    }
}

impl fmt::Display for RemoteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RemoteId {
    fn from(s: &str) -> Self {
        RemoteId(s.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Company {
    pub id: RemoteId,
    #[serde(default)]
    pub name: String,
}

/// A job as the platform reports it. Only the id matters to the pipeline.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RemoteJob {
    #[serde(default)]
    pub id: Option<RemoteId>,
    #[serde(default)]
    pub title: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewCompany {
    pub name: String,
    pub description: String,
    pub website: String,
    pub location: String,
    pub logo_url: String,
    pub industry: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewJob {
    pub title: String,
    pub description: String,
    pub company_id: RemoteId,
    pub location: String,
    pub job_type: String,
    pub salary_min: Option<f64>,
    pub salary_max: Option<f64>,
    pub salary_currency: String,
    pub skills: Vec<String>,
    pub experience_level: String,
    pub education_level: String,
    pub application_url: String,
    pub external_id: String,
    pub external_source: String,
    pub is_active: bool,
    pub industry: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub estimated_salary: Option<SalaryEstimate>,
}
