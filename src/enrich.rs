//! Pure helpers that enrich postings with Jamaica-specific knowledge: industry
//! classification, location normalization, skill extraction and salary hints.
//!
//! Everything here is deterministic and side-effect free.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

use crate::model::{Currency, Industry, JobType};

pub const PARISHES: &[&str] = &[
    "Kingston",
    "St. Andrew",
    "St. Catherine",
    "Clarendon",
    "Manchester",
    "St. Elizabeth",
    "Westmoreland",
    "Hanover",
    "St. James",
    "Trelawny",
    "St. Ann",
    "St. Mary",
    "Portland",
    "St. Thomas",
];

pub const CITIES: &[&str] = &[
    "Kingston",
    "Montego Bay",
    "Spanish Town",
    "Portmore",
    "Mandeville",
    "May Pen",
    "Old Harbour",
    "Ocho Rios",
    "Port Antonio",
    "Negril",
    "Savanna-la-Mar",
    "Linstead",
    "Half Way Tree",
    "Morant Bay",
    "Falmouth",
    "Black River",
    "Lucea",
];

pub const COUNTRY: &str = "Jamaica";

pub const SKILL_VOCABULARY: &[&str] = &[
    "Tourism Management",
    "Hospitality Services",
    "Agricultural Science",
    "Food Processing",
    "Banking Operations",
    "Financial Analysis",
    "Software Development",
    "Web Development",
    "Mobile App Development",
    "Network Administration",
    "Customer Service",
    "Call Center Operations",
    "Sales",
    "Marketing",
    "Construction Management",
    "Teaching",
    "Healthcare Administration",
    "Nursing",
    "Mining Operations",
    "Public Administration",
    "Logistics Management",
    "Shipping Operations",
    "Content Creation",
    "Graphic Design",
    "Digital Marketing",
    "Energy Management",
    "Renewable Energy",
    "Patois Fluency",
    "Cultural Tourism",
    "Reggae Music Production",
];

const INDUSTRY_KEYWORDS: &[(Industry, &[&str])] = &[
    (
        Industry::TourismHospitality,
        &["hotel", "resort", "tourism", "hospitality", "restaurant", "chef", "bartender", "waiter", "waitress", "front desk"],
    ),
    (
        Industry::Agriculture,
        &["farm", "agriculture", "crop", "livestock", "plantation", "harvest", "cultivat"],
    ),
    (
        Industry::BankingFinance,
        &["bank", "finance", "accounting", "accountant", "financial", "investment", "loan", "credit", "audit"],
    ),
    (
        Industry::InformationTechnology,
        &["software", "developer", "programming", "it ", "computer", "tech", "web", "app", "data", "system administrator", "network"],
    ),
    (
        Industry::Telecommunications,
        &["telecom", "network", "communication", "cellular", "mobile", "phone", "broadband"],
    ),
    (
        Industry::Manufacturing,
        &["manufacturing", "factory", "production", "assembly", "quality control", "warehouse", "inventory"],
    ),
    (
        Industry::RetailSales,
        &["retail", "sales", "store", "shop", "customer", "cashier", "merchandis", "buyer"],
    ),
    (
        Industry::Construction,
        &["construction", "builder", "architect", "engineer", "project manager", "foreman", "carpenter", "plumber", "electrician"],
    ),
    (
        Industry::Education,
        &["education", "teacher", "school", "university", "college", "professor", "lecturer", "tutor", "academic"],
    ),
    (
        Industry::Healthcare,
        &["health", "medical", "doctor", "nurse", "hospital", "clinic", "patient", "pharmacy", "dental"],
    ),
    (
        Industry::MiningResources,
        &["mining", "bauxite", "alumina", "resource", "extraction", "mineral"],
    ),
    (
        Industry::Government,
        &["government", "public service", "civil servant", "ministry", "agency", "administration", "policy"],
    ),
    (
        Industry::ShippingLogistics,
        &["shipping", "logistics", "transport", "freight", "cargo", "supply chain", "warehouse", "distribution", "import", "export"],
    ),
    (
        Industry::Bpo,
        &["bpo", "call center", "customer service", "outsourcing", "contact center", "support"],
    ),
    (
        Industry::CreativeIndustries,
        &["creative", "design", "media", "art", "music", "film", "entertainment", "reggae", "production", "content"],
    ),
    (
        Industry::EnergyUtilities,
        &["energy", "utility", "power", "electricity", "water", "gas", "renewable", "solar"],
    ),
];

static INDUSTRY_PATTERNS: Lazy<Vec<(Industry, Vec<Regex>)>> = Lazy::new(|| {
    INDUSTRY_KEYWORDS
        .iter()
        .map(|(industry, keywords)| {
            let patterns = keywords
                .iter()
                .map(|kw| {
                    Regex::new(&format!("(?i){}", regex::escape(kw)))
                        .expect("industry keyword is a valid pattern")
                })
                .collect();
            (*industry, patterns)
        })
        .collect()
});

static RE_KGN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\bKgn\b").expect("location alias is a valid pattern")
});
static RE_MOBAY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\bMoBay\b").expect("location alias is a valid pattern")
});
static RE_SPAN_TOWN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\bSpan Town\b").expect("location alias is a valid pattern")
});
static RE_SAINT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\bSt\.\s*([a-z])").expect("location alias is a valid pattern")
});

static SKILL_PHRASES: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"(?i)proficient in\s+([^.,;]+)",
        r"(?i)experience with\s+([^.,;]+)",
        r"(?i)knowledge of\s+([^.,;]+)",
        r"(?i)skilled in\s+([^.,;]+)",
        r"(?i)expertise in\s+([^.,;]+)",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("skill phrase is a valid pattern"))
    .collect()
});

/// Pick the industry whose keywords occur most often in title + description.
/// Ties resolve to the industry declared first; no hits at all yields `Other`.
pub fn classify_industry(title: &str, description: &str) -> Industry {
    let combined = format!("{} {}", title, description).to_lowercase();

    let mut best = Industry::Other;
    let mut highest = 0usize;
    for (industry, patterns) in INDUSTRY_PATTERNS.iter() {
        let score: usize = patterns
            .iter()
            .map(|re| re.find_iter(&combined).count())
            .sum();
        if score > highest {
            highest = score;
            best = *industry;
        }
    }
    best
}

/// Map free-text locations onto a canonical parish or city name.
///
/// Unknown places are kept (cleaned) with the country appended, so the result
/// is never empty.
pub fn normalize_location(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return COUNTRY.to_string();
    }

    let normalized = RE_KGN.replace(trimmed, "Kingston");
    let normalized = RE_MOBAY.replace(&normalized, "Montego Bay");
    let normalized = RE_SPAN_TOWN.replace(&normalized, "Spanish Town");
    let normalized = RE_SAINT.replace_all(&normalized, "St. ${1}").into_owned();
    let lower = normalized.to_lowercase();

    if let Some(parish) = PARISHES.iter().find(|p| lower.contains(&p.to_lowercase())) {
        return parish.to_string();
    }
    if let Some(city) = CITIES.iter().find(|c| lower.contains(&c.to_lowercase())) {
        return city.to_string();
    }

    if lower.contains("jamaica") {
        normalized
    } else {
        format!("{}, {}", normalized, COUNTRY)
    }
}

/// Skills mentioned in a description: vocabulary hits first, then phrases such
/// as "experience with X". Deduplicated, first-seen order.
pub fn extract_skills(description: &str) -> Vec<String> {
    let mut skills: Vec<String> = Vec::new();
    if description.trim().is_empty() {
        return skills;
    }

    let lower = description.to_lowercase();
    for skill in SKILL_VOCABULARY {
        if lower.contains(&skill.to_lowercase()) {
            push_unique(&mut skills, skill.to_string());
        }
    }

    for re in SKILL_PHRASES.iter() {
        for caps in re.captures_iter(description) {
            let Some(m) = caps.get(1) else { continue };
            let len = m.as_str().chars().count();
            if len > 3 && len < 50 {
                push_unique(&mut skills, m.as_str().trim().to_string());
            }
        }
    }

    skills
}

fn push_unique(out: &mut Vec<String>, value: String) {
    if !out.contains(&value) {
        out.push(value);
    }
}

/// Map free-text job types onto the platform's job type, full-time by default.
pub fn convert_job_type(raw: Option<&str>) -> JobType {
    let Some(raw) = raw else {
        return JobType::FullTime;
    };
    let upper = raw.to_uppercase();
    if upper.contains("FULL") && upper.contains("TIME") {
        JobType::FullTime
    } else if upper.contains("PART") && upper.contains("TIME") {
        JobType::PartTime
    } else if upper.contains("CONTRACT") {
        JobType::Contract
    } else if upper.contains("INTERN") {
        JobType::Internship
    } else if upper.contains("TEMP") {
        JobType::Temporary
    } else {
        JobType::FullTime
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SalaryEstimate {
    pub min: f64,
    pub max: f64,
    pub currency: Currency,
}

/// Annual base range per industry, in JMD.
fn industry_base_salary(industry: Industry) -> (f64, f64) {
    match industry {
        Industry::TourismHospitality => (800_000.0, 2_500_000.0),
        Industry::Agriculture => (700_000.0, 2_000_000.0),
        Industry::BankingFinance => (1_200_000.0, 5_000_000.0),
        Industry::InformationTechnology => (1_500_000.0, 6_000_000.0),
        Industry::Telecommunications => (1_200_000.0, 4_000_000.0),
        Industry::Manufacturing => (800_000.0, 3_000_000.0),
        Industry::RetailSales => (700_000.0, 2_500_000.0),
        Industry::Construction => (900_000.0, 4_000_000.0),
        Industry::Education => (1_000_000.0, 3_500_000.0),
        Industry::Healthcare => (1_200_000.0, 5_000_000.0),
        Industry::MiningResources => (1_000_000.0, 4_500_000.0),
        Industry::Government => (1_000_000.0, 3_000_000.0),
        Industry::ShippingLogistics => (900_000.0, 3_500_000.0),
        Industry::Bpo => (800_000.0, 2_500_000.0),
        Industry::CreativeIndustries => (800_000.0, 3_000_000.0),
        Industry::EnergyUtilities => (1_000_000.0, 4_000_000.0),
        Industry::Other => (800_000.0, 3_000_000.0),
    }
}

const LEVEL_MODIFIERS: &[(&str, f64)] = &[
    ("entry", 0.7),
    ("junior", 0.8),
    ("mid", 1.0),
    ("senior", 1.5),
    ("manager", 1.8),
    ("director", 2.2),
    ("executive", 3.0),
];

/// Rough JMD salary range for a posting that carries none.
pub fn estimate_salary(title: &str, industry: Industry) -> SalaryEstimate {
    let lower = title.to_lowercase();

    let mut modifier = LEVEL_MODIFIERS
        .iter()
        .find(|(level, _)| lower.contains(level))
        .map(|(_, m)| *m)
        .unwrap_or(1.0);
    if ["ceo", "cto", "cfo", "chief"].iter().any(|c| lower.contains(c)) {
        modifier = 3.5;
    }

    let (min, max) = industry_base_salary(industry);
    SalaryEstimate {
        min: (min * modifier).round(),
        max: (max * modifier).round(),
        currency: Currency::Jmd,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_by_keyword_frequency() {
        let industry = classify_industry(
            "Front Desk Agent",
            "Busy resort hotel seeks a friendly agent for the front desk.",
        );
        assert_eq!(industry, Industry::TourismHospitality);

        let industry = classify_industry("Staff Nurse", "Hospital ward, patient care, clinic rotation.");
        assert_eq!(industry, Industry::Healthcare);
    }

    #[test]
    fn classification_falls_back_to_other() {
        assert_eq!(classify_industry("Zzz", "qqq"), Industry::Other);
        assert_eq!(classify_industry("", ""), Industry::Other);
    }

    #[test]
    fn classification_ties_go_to_first_declared_industry() {
        // "network" scores once for both IT and Telecommunications.
        assert_eq!(
            classify_industry("network", ""),
            Industry::InformationTechnology
        );
    }

    #[test]
    fn classification_is_deterministic() {
        let a = classify_industry("Software Developer", "Build web apps with data teams");
        let b = classify_industry("Software Developer", "Build web apps with data teams");
        assert_eq!(a, b);
        assert_eq!(a, Industry::InformationTechnology);
    }

    #[test]
    fn normalizes_abbreviations_and_known_places() {
        assert_eq!(normalize_location("  Kgn 10 "), "Kingston");
        assert_eq!(normalize_location("MoBay, St. James"), "St. James");
        assert_eq!(normalize_location("MoBay"), "Montego Bay");
        assert_eq!(normalize_location("span town"), "Spanish Town");
        assert_eq!(normalize_location("st.andrew"), "St. Andrew");
        assert_eq!(normalize_location("Ocho Rios"), "Ocho Rios");
    }

    #[test]
    fn parishes_win_over_cities() {
        assert_eq!(normalize_location("Half Way Tree, St. Andrew"), "St. Andrew");
        assert_eq!(normalize_location("Portmore, St. Catherine"), "St. Catherine");
    }

    #[test]
    fn unknown_location_gets_country_suffix() {
        assert_eq!(normalize_location("somewhereville"), "somewhereville, Jamaica");
        assert_eq!(normalize_location("Remote - Jamaica"), "Remote - Jamaica");
        assert_eq!(normalize_location("   "), "Jamaica");
    }

    #[test]
    fn extracts_vocabulary_and_phrase_skills() {
        let skills = extract_skills(
            "We need Customer Service and digital marketing. Experience with Salesforce CRM, \
             knowledge of QuickBooks; proficient in SQL.",
        );
        assert!(skills.contains(&"Customer Service".to_string()));
        assert!(skills.contains(&"Digital Marketing".to_string()));
        assert!(skills.contains(&"Marketing".to_string()));
        assert!(skills.contains(&"Salesforce CRM".to_string()));
        assert!(skills.contains(&"QuickBooks".to_string()));
        // "SQL" is only three characters long.
        assert!(!skills.contains(&"SQL".to_string()));
    }

    #[test]
    fn skill_phrases_are_length_bounded_and_deduplicated() {
        let long = "x".repeat(60);
        let text = format!(
            "Experience with Excel. Experience with Excel. Knowledge of {}.",
            long
        );
        let skills = extract_skills(&text);
        assert_eq!(skills, vec!["Excel".to_string()]);
        assert!(extract_skills("").is_empty());
    }

    #[test]
    fn converts_job_types() {
        assert_eq!(convert_job_type(None), JobType::FullTime);
        assert_eq!(convert_job_type(Some("Part-time")), JobType::PartTime);
        assert_eq!(convert_job_type(Some("full time")), JobType::FullTime);
        assert_eq!(convert_job_type(Some("Contract (6 months)")), JobType::Contract);
        assert_eq!(convert_job_type(Some("Summer internship")), JobType::Internship);
        assert_eq!(convert_job_type(Some("Temp")), JobType::Temporary);
        assert_eq!(convert_job_type(Some("whatever")), JobType::FullTime);
    }

    #[test]
    fn salary_estimate_scales_with_seniority() {
        let base = estimate_salary("Accountant", Industry::BankingFinance);
        assert_eq!(base.min, 1_200_000.0);
        assert_eq!(base.max, 5_000_000.0);
        assert_eq!(base.currency, Currency::Jmd);

        let senior = estimate_salary("Senior Accountant", Industry::BankingFinance);
        assert_eq!(senior.min, 1_800_000.0);

        let chief = estimate_salary("Chief Financial Officer", Industry::BankingFinance);
        assert_eq!(chief.max, 17_500_000.0);
    }
}
