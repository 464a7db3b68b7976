//! Listing filter chain.
//!
//! Stages run in this order inside the pipeline:
//! title exclusion, optional title inclusion, field normalization,
//! in-batch dedupe, then optional description exclusion.
//! Every stage keeps the relative order of surviving records.

pub mod fields;
pub mod patterns;

use std::collections::HashSet;

use jobflow_shared::{ListingRecord, RawListing, normalize_url};
use tracing::debug;

pub use fields::{REQUIRED_FIELDS, normalize_fields, normalize_listing, synthesize_id};
pub use patterns::{description_excluded, query_phrases, title_excluded};

/// Drops listings whose title names a seniority or leadership level.
/// Listings without a title are kept.
pub fn exclude_titles(batch: Vec<RawListing>) -> Vec<RawListing> {
    let before = batch.len();
    let kept: Vec<RawListing> = batch
        .into_iter()
        .filter(|listing| !title_excluded(&listing.title()))
        .collect();
    debug!(before, after = kept.len(), "title exclusion");
    kept
}

/// Keeps listings whose lowercased title contains at least one query phrase.
/// With no usable phrases every listing is kept.
pub fn include_titles(batch: Vec<RawListing>, queries: &[String]) -> Vec<RawListing> {
    let phrases = query_phrases(queries);
    if phrases.is_empty() {
        return batch;
    }
    let before = batch.len();
    let kept: Vec<RawListing> = batch
        .into_iter()
        .filter(|listing| {
            let title = listing.title().to_lowercase();
            phrases.iter().any(|p| title.contains(p.as_str()))
        })
        .collect();
    debug!(before, after = kept.len(), phrases = phrases.len(), "title inclusion");
    kept
}

/// Title exclusion, followed by inclusion when `enforce_include` is set.
pub fn filter_titles(
    batch: Vec<RawListing>,
    queries: &[String],
    enforce_include: bool,
) -> Vec<RawListing> {
    let batch = exclude_titles(batch);
    if enforce_include {
        include_titles(batch, queries)
    } else {
        batch
    }
}

/// Removes records that repeat an earlier `(url key, id)` pair. The first
/// occurrence wins.
pub fn dedupe_batch(records: Vec<ListingRecord>) -> Vec<ListingRecord> {
    let before = records.len();
    let mut seen: HashSet<(String, String)> = HashSet::with_capacity(before);
    let kept: Vec<ListingRecord> = records
        .into_iter()
        .filter(|record| seen.insert((normalize_url(&record.job_url), record.id.clone())))
        .collect();
    debug!(before, after = kept.len(), "batch dedupe");
    kept
}

/// Drops records whose description asks for 5+ years of experience or
/// restricts work rights. Empty descriptions are kept.
pub fn exclude_descriptions(records: Vec<ListingRecord>) -> Vec<ListingRecord> {
    let before = records.len();
    let kept: Vec<ListingRecord> = records
        .into_iter()
        .filter(|record| !description_excluded(&record.description))
        .collect();
    debug!(before, after = kept.len(), "description exclusion");
    kept
}
