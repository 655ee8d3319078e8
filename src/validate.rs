//! Record-level validation: sanitizes a copy of each raw posting and sorts it
//! into valid, valid-with-warnings or invalid.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::model::{Currency, RawJobRecord};

pub const MAX_TITLE_CHARS: usize = 100;
pub const MIN_TITLE_CHARS: usize = 5;
pub const MIN_DESCRIPTION_CHARS: usize = 100;
pub const MAX_SKILLS: usize = 20;

const SPAM_INDICATORS: &[&str] = &["urgent", "immediate", "apply now", "!!!", "$$$"];

/// Place names accepted as "in Jamaica" without a warning.
const KNOWN_PLACES: &[&str] = &[
    "kingston", "montego bay", "spanish town", "portmore", "mandeville",
    "may pen", "old harbour", "ocho rios", "port antonio", "negril",
    "st. andrew", "st andrew", "st. catherine", "st catherine",
    "st. james", "st james", "manchester", "clarendon", "westmoreland",
    "hanover", "st. elizabeth", "st elizabeth", "st. mary", "st mary",
    "st. ann", "st ann", "portland", "st. thomas", "st thomas",
    "trelawny", "jamaica",
];

static RE_JAVASCRIPT_URI: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)javascript:").expect("javascript marker is a valid pattern")
});

/// Plausibility bounds per currency: (lowest sensible min, highest sensible max).
fn salary_bounds(currency: Currency) -> (f64, f64) {
    match currency {
        Currency::Jmd => (100_000.0, 10_000_000.0),
        Currency::Usd => (1_000.0, 300_000.0),
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ValidationResult {
    pub job: RawJobRecord,
    pub is_valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ValidationResult {
    fn new(job: &RawJobRecord) -> Self {
        Self {
            job: job.clone(),
            is_valid: true,
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }

    fn fail(&mut self, msg: impl Into<String>) {
        self.is_valid = false;
        self.errors.push(msg.into());
    }

    fn warn(&mut self, msg: impl Into<String>) {
        self.warnings.push(msg.into());
    }
}

pub fn validate(job: &RawJobRecord) -> ValidationResult {
    let mut result = ValidationResult::new(job);

    for (name, value) in [
        ("title", &job.title),
        ("description", &job.description),
        ("companyName", &job.company_name),
        ("location", &job.location),
    ] {
        if value.trim().is_empty() {
            result.fail(format!("Missing required field: {}", name));
        }
    }

    check_title(job, &mut result);
    check_description(job, &mut result);

    if !job.location.is_empty() && !is_known_place(&job.location) {
        result.warn("Location may not be in Jamaica");
    }

    check_salary(&mut result);

    if let Some(skills) = &job.skills {
        if skills.len() > MAX_SKILLS {
            result.job.skills = Some(skills[..MAX_SKILLS].to_vec());
            result.warn(format!("Limited skills to {} items", MAX_SKILLS));
        }
    }

    if !result.is_valid {
        warn!(title = %job.title, errors = %result.errors.join(", "), "job validation failed");
    } else if !result.warnings.is_empty() {
        info!(title = %job.title, warnings = %result.warnings.join(", "), "job validated with warnings");
    } else {
        debug!(title = %job.title, "job validated");
    }

    result
}

fn check_title(job: &RawJobRecord, result: &mut ValidationResult) {
    if job.title.is_empty() {
        return;
    }
    let lower = job.title.to_lowercase();
    for keyword in SPAM_INDICATORS {
        if lower.contains(keyword) {
            result.warn(format!("Title contains potential spam keyword: {}", keyword));
        }
    }

    let len = job.title.chars().count();
    if len < MIN_TITLE_CHARS {
        result.warn("Title is too short");
    }
    if len > MAX_TITLE_CHARS {
        result.job.title = job.title.chars().take(MAX_TITLE_CHARS).collect();
        result.warn(format!("Title was truncated to {} characters", MAX_TITLE_CHARS));
    }
}

fn check_description(job: &RawJobRecord, result: &mut ValidationResult) {
    if job.description.is_empty() {
        return;
    }
    if job.description.chars().count() < MIN_DESCRIPTION_CHARS {
        result.warn("Description is too short");
    }
    if job.description.to_lowercase().contains("<script") {
        result.fail("Description contains script tags");
    }
    if RE_JAVASCRIPT_URI.is_match(&job.description) {
        result.job.description = RE_JAVASCRIPT_URI
            .replace_all(&job.description, "")
            .into_owned();
        result.warn("Removed javascript: from description");
    }
}

fn check_salary(result: &mut ValidationResult) {
    if let (Some(min), Some(max)) = (result.job.salary_min, result.job.salary_max) {
        if min > max {
            result.job.salary_min = Some(max);
            result.job.salary_max = Some(min);
            result.warn("Salary min/max were swapped (min was greater than max)");
        }
    }

    let Some(currency) = result
        .job
        .salary_currency
        .as_deref()
        .and_then(Currency::parse_code)
    else {
        return;
    };
    let (low, high) = salary_bounds(currency);
    if let Some(min) = result.job.salary_min {
        if min < low {
            result.warn(format!("Salary minimum seems too low for {}", currency.as_str()));
        }
    }
    if let Some(max) = result.job.salary_max {
        if max > high {
            result.warn(format!("Salary maximum seems too high for {}", currency.as_str()));
        }
    }
}

pub fn is_known_place(location: &str) -> bool {
    let lower = location.to_lowercase();
    KNOWN_PLACES.iter().any(|place| lower.contains(place))
}

#[derive(Debug, Clone, Serialize)]
pub struct WarnedJob {
    pub job: RawJobRecord,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct InvalidJob {
    /// The record as received, not the partially corrected copy.
    pub job: RawJobRecord,
    pub errors: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ValidationReport {
    pub valid: Vec<RawJobRecord>,
    pub warned: Vec<WarnedJob>,
    pub invalid: Vec<InvalidJob>,
}

impl ValidationReport {
    /// Records that may be imported: clean ones followed by warned ones.
    pub fn usable(&self) -> Vec<RawJobRecord> {
        self.valid
            .iter()
            .cloned()
            .chain(self.warned.iter().map(|w| w.job.clone()))
            .collect()
    }
}

pub fn validate_all(jobs: &[RawJobRecord]) -> ValidationReport {
    let mut report = ValidationReport::default();
    for job in jobs {
        let result = validate(job);
        if !result.is_valid {
            report.invalid.push(InvalidJob {
                job: job.clone(),
                errors: result.errors,
            });
        } else if !result.warnings.is_empty() {
            report.warned.push(WarnedJob {
                job: result.job,
                warnings: result.warnings,
            });
        } else {
            report.valid.push(result.job);
        }
    }
    info!(
        valid = report.valid.len(),
        warned = report.warned.len(),
        invalid = report.invalid.len(),
        "job validation complete"
    );
    report
}
