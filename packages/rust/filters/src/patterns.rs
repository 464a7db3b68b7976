//! Title and description heuristics (compiled once).

use std::sync::LazyLock;

use regex::Regex;

/// Seniority and leadership words that disqualify a title.
static TITLE_EXCLUDE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(senior|sr\.?|lead|principal|architect|manager|head|director)\b")
        .expect("title exclude regex")
});

/// "5+ years of experience" and longer, up to 39.
static EXPERIENCE_YEARS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(?:[5-9]|1\d|2\d|3\d)\s*(?:\+|-\s*\d+)?\s*(?:years?|yrs?)\s*(?:of\s+)?(?:experience|exp)\b",
    )
    .expect("experience regex")
});

/// Residency, citizenship, clearance, and sponsorship restrictions.
static WORK_RIGHTS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"(?i)\b(?:",
        r"permanent\s+resident|permanent\s+residency|PR\s*(?:only|required)?|",
        r"citizen|citizenship|australian\s+citizen|au\s+citizen|nz\s+citizen|",
        r"baseline\s+clearance|NV1|NV2|security\s+clearance|",
        r"must\s+have\s+(?:full\s+)?work(?:ing)?\s+rights|",
        r"sponsorship\s+not\s+available|no\s+sponsorship",
        r")\b",
    ))
    .expect("work rights regex")
});

/// Whether a title names a seniority/leadership level we skip.
pub fn title_excluded(title: &str) -> bool {
    TITLE_EXCLUDE_RE.is_match(title)
}

/// Whether a description asks for 5+ years or restricts work rights.
pub fn description_excluded(description: &str) -> bool {
    EXPERIENCE_YEARS_RE.is_match(description) || WORK_RIGHTS_RE.is_match(description)
}

/// Lowercased query phrases with surrounding quotes stripped, for title matching.
pub fn query_phrases(queries: &[String]) -> Vec<String> {
    queries
        .iter()
        .map(|q| q.trim().trim_matches('"').trim_matches('\'').to_lowercase())
        .filter(|q| !q.is_empty())
        .collect()
}
