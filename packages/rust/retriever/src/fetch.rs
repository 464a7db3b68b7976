//! Sequential multi-query fetch with per-phrase failure tolerance.

use std::collections::BTreeSet;
use std::time::{Duration, Instant};

use serde_json::{Map, Value};
use tracing::{debug, error, info, instrument};

use jobflow_shared::RawListing;

use crate::source::{ListingSource, SearchRequest};

/// Field added to every listing naming the phrase that found it.
pub const SOURCE_QUERY_FIELD: &str = "source_query";

/// What to fetch from one site.
#[derive(Debug, Clone)]
pub struct SiteQuery<'a> {
    pub site: &'a str,
    pub location: &'a str,
    pub queries: &'a [String],
    pub extra: &'a Map<String, Value>,
    pub hours_old: u32,
    pub results_wanted: u32,
}

/// Summary of a completed multi-query fetch.
#[derive(Debug, Clone, Default)]
pub struct FetchResult {
    /// Concatenated listings from every successful call, tagged with their phrase.
    pub listings: Vec<RawListing>,
    /// Failed calls (phrase, error message).
    pub errors: Vec<(String, String)>,
    /// Total duration of the fetch.
    pub duration: Duration,
}

/// Per-phrase progress callback.
pub trait FetchProgress: Send + Sync {
    /// Called after each phrase, successful or not.
    fn query_fetched(&self, term: &str, current: usize, total: usize, rows: usize);
}

/// No-op progress for headless/test usage.
pub struct NoFetchProgress;

impl FetchProgress for NoFetchProgress {
    fn query_fetched(&self, _term: &str, _current: usize, _total: usize, _rows: usize) {}
}

/// Run every query phrase against `source`, one call per phrase, in order.
///
/// Failed calls are logged and skipped; when all fail the result is simply empty.
/// Results are not deduplicated here.
#[instrument(
    skip_all,
    fields(site = query.site, source = source.name(), queries = query.queries.len())
)]
pub async fn fetch_site(
    source: &dyn ListingSource,
    query: &SiteQuery<'_>,
    progress: &dyn FetchProgress,
) -> FetchResult {
    let start = Instant::now();
    let total = query.queries.len();
    let mut result = FetchResult::default();

    for (i, term) in query.queries.iter().enumerate() {
        let request = SearchRequest {
            site: query.site,
            search_term: term,
            location: query.location,
            hours_old: query.hours_old,
            results_wanted: query.results_wanted,
            extra: query.extra,
        };

        let mut batch = match source.search(&request).await {
            Ok(batch) => batch,
            Err(e) => {
                error!(term = %term, site = query.site, error = %e, "search failed");
                result.errors.push((term.clone(), e.to_string()));
                progress.query_fetched(term, i + 1, total, 0);
                continue;
            }
        };

        progress.query_fetched(term, i + 1, total, batch.len());
        if batch.is_empty() {
            debug!(term = %term, "no listings");
            continue;
        }

        drop_empty_fields(&mut batch);
        for listing in &mut batch {
            listing.set(SOURCE_QUERY_FIELD, term.as_str());
        }

        debug!(term = %term, rows = batch.len(), "listings fetched");
        result.listings.append(&mut batch);
    }

    result.duration = start.elapsed();

    info!(
        listings = result.listings.len(),
        failed = result.errors.len(),
        duration_ms = result.duration.as_millis(),
        "fetch completed"
    );

    result
}

/// Remove fields that are missing or null on every listing of one batch.
pub fn drop_empty_fields(batch: &mut [RawListing]) {
    let all_keys: BTreeSet<String> = batch
        .iter()
        .flat_map(|listing| listing.keys().cloned())
        .collect();

    let empty: Vec<String> = all_keys
        .into_iter()
        .filter(|key| batch.iter().all(|listing| listing.is_null(key)))
        .collect();

    for listing in batch.iter_mut() {
        for key in &empty {
            listing.remove(key);
        }
    }
}
