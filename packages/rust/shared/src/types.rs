//! Core domain types for jobflow listings and pipeline results.

use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};

use crate::url_key::normalize_url;

// ---------------------------------------------------------------------------
// RawListing
// ---------------------------------------------------------------------------

/// One listing exactly as the source returned it: a loosely-typed JSON object.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawListing(pub Map<String, Value>);

impl RawListing {
    /// Build from a JSON value. Returns `None` unless the value is an object.
    pub fn from_json(value: Value) -> Option<Self> {
        match value {
            Value::Object(map) => Some(Self(map)),
            _ => None,
        }
    }

    /// Field value as text. `None` when the field is missing or null;
    /// numbers and booleans are stringified.
    pub fn text(&self, key: &str) -> Option<String> {
        match self.0.get(key)? {
            Value::Null => None,
            Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    /// The listing title, or empty.
    pub fn title(&self) -> String {
        self.text("title").unwrap_or_default()
    }

    /// Whether the field is missing or null.
    pub fn is_null(&self, key: &str) -> bool {
        matches!(self.0.get(key), None | Some(Value::Null))
    }

    /// Set a field, replacing any previous value.
    pub fn set(&mut self, key: &str, value: impl Into<Value>) {
        self.0.insert(key.to_string(), value.into());
    }

    /// Remove a field.
    pub fn remove(&mut self, key: &str) {
        self.0.remove(key);
    }

    /// Field names present on this listing.
    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.0.keys()
    }
}

// ---------------------------------------------------------------------------
// ListingRecord
// ---------------------------------------------------------------------------

/// A listing after field normalization. Every field is present; absent values are empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListingRecord {
    /// Source identifier, or a SHA-256 of the URL when the source had none.
    pub id: String,
    /// Source site tag.
    pub site: String,
    /// Canonical posting URL.
    pub job_url: String,
    /// Posting title.
    pub title: String,
    /// Hiring company.
    pub company: String,
    /// Posting location.
    pub location: String,
    /// Employment type (full-time, contract, ...).
    pub job_type: String,
    /// Seniority level.
    pub job_level: String,
    /// Free-text description.
    pub description: String,
    /// Search phrase that produced this listing.
    pub source_query: String,
}

impl ListingRecord {
    /// The stable dedupe key for this record (see [`normalize_url`]).
    pub fn url_key(&self) -> String {
        normalize_url(&self.job_url)
    }
}

/// The subset of a record reported to callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobItem {
    pub job_url: String,
    pub title: String,
    pub company: String,
    pub location: String,
    pub job_type: String,
    pub job_level: String,
    pub description: String,
}

impl From<&ListingRecord> for JobItem {
    fn from(record: &ListingRecord) -> Self {
        Self {
            job_url: record.job_url.clone(),
            title: record.title.clone(),
            company: record.company.clone(),
            location: record.location.clone(),
            job_type: record.job_type.clone(),
            job_level: record.job_level.clone(),
            description: record.description.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// SinkStatus
// ---------------------------------------------------------------------------

/// Outcome of a sink append. Serialized as `skip`, `no_new`, `added_<n>`, or `error`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkStatus {
    /// Sink not configured, no credentials, or nothing to append.
    Skip,
    /// Every record was already present in the destination.
    NoNew,
    /// This many rows were appended.
    Added(usize),
    /// The sink call failed; seen keys were still persisted.
    Error,
}

impl std::fmt::Display for SinkStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Skip => f.write_str("skip"),
            Self::NoNew => f.write_str("no_new"),
            Self::Added(n) => write!(f, "added_{n}"),
            Self::Error => f.write_str("error"),
        }
    }
}

impl Serialize for SinkStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

// ---------------------------------------------------------------------------
// PipelineResult
// ---------------------------------------------------------------------------

/// Per-stage record counts for one run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunMeta {
    pub fetched_raw: usize,
    pub after_title_filter: usize,
    pub after_row_dedupe: usize,
    pub after_description_filter: usize,
    pub new_after_seen: usize,
    pub include_from_queries: bool,
    pub description_filter_applied: bool,
    /// Query phrases whose retrieval call failed.
    pub queries_failed: usize,
}

/// The payload returned by every pipeline run, including empty ones.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineResult {
    pub new_count: usize,
    /// `None` when the sink was not invoked.
    pub sheet_result: Option<SinkStatus>,
    pub items: Vec<JobItem>,
    pub meta: RunMeta,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub queries: Option<Vec<String>>,
}

impl PipelineResult {
    /// A result with no new items.
    pub fn empty(meta: RunMeta, queries: Option<Vec<String>>) -> Self {
        Self {
            new_count: 0,
            sheet_result: None,
            items: Vec::new(),
            meta,
            queries,
        }
    }
}
