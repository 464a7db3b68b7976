//! Maps loosely-shaped backend rows onto [`ListingRecord`].

use std::collections::HashMap;

use jobflow_shared::{ListingRecord, RawListing};
use sha2::{Digest, Sha256};

/// Canonical field name and the raw keys it is read from, in priority order.
pub const REQUIRED_FIELDS: &[(&str, &[&str])] = &[
    ("id", &["id"]),
    ("site", &["site"]),
    ("job_url", &["job_url"]),
    ("title", &["title"]),
    ("company", &["company"]),
    ("location", &["location"]),
    ("job_type", &["job_type", "employment_type"]),
    ("job_level", &["job_level", "seniority_level"]),
    ("description", &["description"]),
];

const SOURCE_QUERY_KEY: &str = "source_query";

/// Normalizes every listing in the batch. Order is preserved.
pub fn normalize_fields(batch: Vec<RawListing>) -> Vec<ListingRecord> {
    batch.iter().map(normalize_listing).collect()
}

/// Fills the required fields, falling back to alias keys and synthesizing a
/// missing `id` from the job URL.
pub fn normalize_listing(raw: &RawListing) -> ListingRecord {
    let mut values: HashMap<&str, String> = REQUIRED_FIELDS
        .iter()
        .map(|(name, sources)| (*name, first_present(raw, sources)))
        .collect();
    let mut take = |name: &str| values.remove(name).unwrap_or_default();

    let job_url = take("job_url");
    let mut id = take("id");
    if id.is_empty() && !job_url.is_empty() {
        id = synthesize_id(&job_url);
    }

    ListingRecord {
        id,
        site: take("site"),
        title: take("title"),
        company: take("company"),
        location: take("location"),
        job_type: take("job_type"),
        job_level: take("job_level"),
        description: take("description"),
        source_query: raw.text(SOURCE_QUERY_KEY).unwrap_or_default(),
        job_url,
    }
}

/// Stable identifier derived from a job URL (hex SHA-256).
pub fn synthesize_id(job_url: &str) -> String {
    let digest = Sha256::digest(job_url.as_bytes());
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

fn first_present(raw: &RawListing, sources: &[&str]) -> String {
    sources
        .iter()
        .filter_map(|key| raw.text(key))
        .find(|value| !value.is_empty())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn raw(value: serde_json::Value) -> RawListing {
        RawListing::from_json(value).unwrap()
    }

    #[test]
    fn fills_missing_fields_with_empty_strings() {
        let record = normalize_listing(&raw(json!({
            "id": "li-1",
            "title": "Junior Developer",
            "job_url": "https://example.com/jobs/1"
        })));
        assert_eq!(record.id, "li-1");
        assert_eq!(record.title, "Junior Developer");
        assert_eq!(record.company, "");
        assert_eq!(record.description, "");
        assert_eq!(record.source_query, "");
    }

    #[test]
    fn alias_fields_fill_job_type_and_level() {
        let record = normalize_listing(&raw(json!({
            "id": "li-2",
            "employment_type": "Full-time",
            "seniority_level": "Entry level"
        })));
        assert_eq!(record.job_type, "Full-time");
        assert_eq!(record.job_level, "Entry level");
    }

    #[test]
    fn primary_field_wins_over_alias() {
        let record = normalize_listing(&raw(json!({
            "job_type": "fulltime",
            "employment_type": "Full-time",
            "job_level": null,
            "seniority_level": "Associate"
        })));
        assert_eq!(record.job_type, "fulltime");
        assert_eq!(record.job_level, "Associate");
    }

    #[test]
    fn synthesizes_id_from_url() {
        let url = "https://example.com/jobs/9";
        let record = normalize_listing(&raw(json!({ "job_url": url })));
        assert_eq!(record.id, synthesize_id(url));
        assert_eq!(record.id.len(), 64);

        let again = normalize_listing(&raw(json!({ "job_url": url })));
        assert_eq!(record.id, again.id);
    }

    #[test]
    fn no_id_without_url() {
        let record = normalize_listing(&raw(json!({ "title": "Support Analyst" })));
        assert_eq!(record.id, "");
    }

    #[test]
    fn numeric_values_are_stringified() {
        let record = normalize_listing(&raw(json!({
            "id": 4012,
            "source_query": "\"IT Support\""
        })));
        assert_eq!(record.id, "4012");
        assert_eq!(record.source_query, "\"IT Support\"");
    }
}
