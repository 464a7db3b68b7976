//! End-to-end fetch pipeline: queries → fetch → filter → dedupe → seen gate → sink.

use std::time::Instant;

use tracing::{error, info, instrument};

use jobflow_filters::{dedupe_batch, exclude_descriptions, filter_titles, normalize_fields};
use jobflow_retriever::{FetchProgress, ListingSource, SiteQuery, fetch_site};
use jobflow_shared::{JobItem, PipelineResult, RunConfig, RunMeta, SinkStatus};
use jobflow_sink::ListingSink;
use jobflow_storage::SeenStore;

use crate::queries::{QuerySources, resolve_queries};

/// Progress callback for reporting pipeline status.
pub trait ProgressReporter: Send + Sync {
    /// Called when entering a new phase.
    fn phase(&self, name: &str);
    /// Called after each query phrase is fetched.
    fn query_fetched(&self, term: &str, current: usize, total: usize, rows: usize);
    /// Called when the run completes, including early exits.
    fn done(&self, result: &PipelineResult);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn query_fetched(&self, _term: &str, _current: usize, _total: usize, _rows: usize) {}
    fn done(&self, _result: &PipelineResult) {}
}

/// Run one pipeline pass.
///
/// 1. Resolve queries (and reset the seen set if asked)
/// 2. Fetch every phrase from the source
/// 3. Title filter, field normalization, batch dedupe, description filter
/// 4. Drop listings already seen, persist the new keys
/// 5. Append to the sink when `update_sheet` is set
///
/// A stage that leaves nothing ends the run with an empty result; counts of
/// stages not reached stay 0. Failures of the seen store and the sink are
/// logged and never abort the run.
#[instrument(skip_all, fields(site = %config.site, location = %config.location))]
pub async fn run(
    config: &RunConfig,
    source: &dyn ListingSource,
    sink: &dyn ListingSink,
    progress: &dyn ProgressReporter,
) -> PipelineResult {
    let start = Instant::now();

    // --- Phase 1: Queries ---
    progress.phase("Resolving queries");
    let queries = resolve_queries(&QuerySources::from(config));
    let echoed = config.return_queries.then(|| queries.clone());
    let mut meta = RunMeta {
        include_from_queries: config.include_from_queries,
        description_filter_applied: config.filter_description,
        ..RunMeta::default()
    };

    let store = SeenStore::new(&config.seen_path);
    if config.reset_seen {
        progress.phase("Resetting seen listings");
        store.reset().await;
    }

    info!(
        queries = queries.len(),
        location = %config.location,
        hours_old = config.hours_old,
        results_wanted = config.results_wanted,
        include = config.include_from_queries,
        desc_filter = config.filter_description,
        "fetching listings"
    );

    // --- Phase 2: Fetch ---
    progress.phase("Fetching listings");
    let site_query = SiteQuery {
        site: &config.site,
        location: &config.location,
        queries: &queries,
        extra: &config.extra_options,
        hours_old: config.hours_old,
        results_wanted: config.results_wanted,
    };
    let fetch_progress = PipelineFetchProgress { inner: progress };
    let fetched = fetch_site(source, &site_query, &fetch_progress).await;
    meta.queries_failed = fetched.errors.len();
    meta.fetched_raw = fetched.listings.len();
    if fetched.listings.is_empty() {
        return finish(PipelineResult::empty(meta, echoed), start, progress);
    }

    // --- Phase 3: Filter ---
    progress.phase("Filtering listings");
    let titled = filter_titles(fetched.listings, &queries, config.include_from_queries);
    meta.after_title_filter = titled.len();
    if titled.is_empty() {
        return finish(PipelineResult::empty(meta, echoed), start, progress);
    }

    let records = dedupe_batch(normalize_fields(titled));
    meta.after_row_dedupe = records.len();

    let records = if config.filter_description {
        exclude_descriptions(records)
    } else {
        records
    };
    meta.after_description_filter = records.len();
    if records.is_empty() {
        return finish(PipelineResult::empty(meta, echoed), start, progress);
    }

    // --- Phase 4: Seen gate ---
    progress.phase("Checking seen listings");
    let mut seen = store.load().await;
    let fresh = seen.retain_unseen(records);
    meta.new_after_seen = fresh.len();
    if fresh.is_empty() {
        info!(
            title_filtered = meta.after_title_filter,
            deduped = meta.after_row_dedupe,
            desc_filtered = meta.after_description_filter,
            "no new listings"
        );
        return finish(PipelineResult::empty(meta, echoed), start, progress);
    }

    // Persist before delivery so a failing sink never causes re-delivery
    if seen.mark_delivered(&fresh) > 0 {
        if let Err(e) = store.save(&seen).await {
            error!(path = %store.path().display(), error = %e, "failed to save seen set");
        }
    }

    // --- Phase 5: Sink ---
    let sheet_result = if config.update_sheet {
        progress.phase("Updating sheet");
        let status = match sink.append(&fresh, &config.sheet).await {
            Ok(status) => status,
            Err(e) => {
                error!(sink = sink.name(), error = %e, "sheet update failed");
                SinkStatus::Error
            }
        };
        Some(status)
    } else {
        None
    };

    let result = PipelineResult {
        new_count: fresh.len(),
        sheet_result,
        items: fresh.iter().map(JobItem::from).collect(),
        meta,
        queries: echoed,
    };
    finish(result, start, progress)
}

fn finish(
    result: PipelineResult,
    start: Instant,
    progress: &dyn ProgressReporter,
) -> PipelineResult {
    progress.done(&result);
    let sheet = result
        .sheet_result
        .map_or_else(|| "none".to_string(), |s| s.to_string());
    info!(
        new = result.new_count,
        fetched = result.meta.fetched_raw,
        sheet = %sheet,
        elapsed_ms = start.elapsed().as_millis(),
        "pipeline complete"
    );
    result
}

// ---------------------------------------------------------------------------
// Fetch progress adapter
// ---------------------------------------------------------------------------

/// Adapts a `ProgressReporter` to the `FetchProgress` interface.
struct PipelineFetchProgress<'a> {
    inner: &'a dyn ProgressReporter,
}

impl FetchProgress for PipelineFetchProgress<'_> {
    fn query_fetched(&self, term: &str, current: usize, total: usize, rows: usize) {
        self.inner.query_fetched(term, current, total, rows);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::path::{Path, PathBuf};
    use std::sync::Mutex;

    use async_trait::async_trait;
    use jobflow_retriever::SearchRequest;
    use jobflow_shared::{
        AppConfig, FetchOptions, JobflowError, ListingRecord, RawListing, Result, SheetTarget,
    };
    use serde_json::{Value, json};
    use uuid::Uuid;

    /// Answers each phrase from a fixed table; unknown phrases fail.
    struct TableSource {
        rows: HashMap<String, Vec<Value>>,
        calls: Mutex<Vec<String>>,
    }

    impl TableSource {
        fn new(entries: &[(&str, Vec<Value>)]) -> Self {
            Self {
                rows: entries
                    .iter()
                    .map(|(term, rows)| (term.to_string(), rows.clone()))
                    .collect(),
                calls: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl ListingSource for TableSource {
        async fn search(&self, request: &SearchRequest<'_>) -> Result<Vec<RawListing>> {
            self.calls.lock().unwrap().push(request.search_term.to_string());
            self.rows
                .get(request.search_term)
                .map(|rows| rows.iter().cloned().filter_map(RawListing::from_json).collect())
                .ok_or_else(|| JobflowError::Network("backend unavailable".into()))
        }

        fn name(&self) -> &str {
            "table"
        }
    }

    /// Records every append; fails when `fail` is set.
    #[derive(Default)]
    struct RecordingSink {
        fail: bool,
        appended: Mutex<Vec<Vec<ListingRecord>>>,
    }

    #[async_trait]
    impl ListingSink for RecordingSink {
        async fn append(
            &self,
            records: &[ListingRecord],
            _target: &SheetTarget,
        ) -> Result<SinkStatus> {
            self.appended.lock().unwrap().push(records.to_vec());
            if self.fail {
                return Err(JobflowError::Sink("quota exceeded".into()));
            }
            Ok(SinkStatus::Added(records.len()))
        }

        fn name(&self) -> &str {
            "recording"
        }
    }

    fn seen_path() -> PathBuf {
        std::env::temp_dir()
            .join(format!("jobflow_pipeline_{}", Uuid::now_v7()))
            .join("seen.json")
    }

    fn config(queries: &[&str], opts: FetchOptions, seen_path: &Path) -> RunConfig {
        let opts = FetchOptions {
            queries: Some(queries.iter().map(|q| q.to_string()).collect()),
            ..opts
        };
        let mut config = RunConfig::resolve(&AppConfig::default(), &opts);
        config.seen_path = seen_path.to_path_buf();
        config
    }

    fn scenario_rows() -> Vec<Value> {
        vec![
            json!({
                "id": "li-1",
                "title": "Senior Software Engineer",
                "job_url": "https://jobs.example.com/1",
                "description": "Lead a team."
            }),
            json!({
                "id": "li-2",
                "title": "Software Engineer",
                "job_url": "https://jobs.example.com/2",
                "description": "5 years of experience required"
            }),
            json!({
                "id": "li-3",
                "title": "Junior Developer",
                "job_url": "https://jobs.example.com/3",
                "description": "Mentoring and training provided."
            }),
        ]
    }

    fn urls(result: &PipelineResult) -> Vec<&str> {
        result.items.iter().map(|i| i.job_url.as_str()).collect()
    }

    #[tokio::test]
    async fn filters_then_suppresses_on_second_run() {
        let source = TableSource::new(&[("engineer", scenario_rows())]);
        let sink = RecordingSink::default();
        let seen = seen_path();
        let config = config(&["engineer"], FetchOptions::default(), &seen);

        let first = run(&config, &source, &sink, &SilentProgress).await;
        assert_eq!(first.new_count, 1);
        assert_eq!(urls(&first), vec!["https://jobs.example.com/3"]);
        assert_eq!(first.sheet_result, None);
        assert_eq!(first.meta.fetched_raw, 3);
        assert_eq!(first.meta.after_title_filter, 2);
        assert_eq!(first.meta.after_row_dedupe, 2);
        assert_eq!(first.meta.after_description_filter, 1);
        assert_eq!(first.meta.new_after_seen, 1);
        assert!(first.meta.description_filter_applied);
        assert!(first.queries.is_none());

        let second = run(&config, &source, &sink, &SilentProgress).await;
        assert_eq!(second.new_count, 0);
        assert!(second.items.is_empty());
        assert_eq!(second.meta.after_description_filter, 1);
        assert_eq!(second.meta.new_after_seen, 0);
        assert!(sink.appended.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn description_filter_off_keeps_experienced_role() {
        let source = TableSource::new(&[("engineer", scenario_rows())]);
        let opts = FetchOptions {
            filter_description: Some(false),
            ..Default::default()
        };
        let config = config(&["engineer"], opts, &seen_path());

        let result = run(&config, &source, &RecordingSink::default(), &SilentProgress).await;
        assert_eq!(
            urls(&result),
            vec!["https://jobs.example.com/2", "https://jobs.example.com/3"]
        );
        assert!(!result.meta.description_filter_applied);
        assert_eq!(result.meta.after_description_filter, result.meta.after_row_dedupe);
    }

    #[tokio::test]
    async fn failed_phrase_is_skipped() {
        let rows = vec![
            json!({ "id": "b-1", "title": "Graduate Developer", "job_url": "https://b/1" }),
            json!({ "id": "b-2", "title": "IT Support Officer", "job_url": "https://b/2" }),
        ];
        let source = TableSource::new(&[("B", rows)]);
        let opts = FetchOptions {
            return_queries: true,
            ..Default::default()
        };
        let config = config(&["A", "B"], opts, &seen_path());

        let result = run(&config, &source, &RecordingSink::default(), &SilentProgress).await;
        assert_eq!(*source.calls.lock().unwrap(), vec!["A", "B"]);
        assert_eq!(result.meta.fetched_raw, 2);
        assert_eq!(result.meta.queries_failed, 1);
        assert_eq!(result.new_count, 2);
        assert_eq!(result.queries, Some(vec!["A".to_string(), "B".to_string()]));
    }

    #[tokio::test]
    async fn tracking_parameters_do_not_defeat_seen_set() {
        let seen = seen_path();
        let sink = RecordingSink::default();

        let first_source = TableSource::new(&[(
            "developer",
            vec![json!({
                "id": "1",
                "title": "Developer",
                "job_url": "https://jobs.example.com/7"
            })],
        )]);
        let config = config(&["developer"], FetchOptions::default(), &seen);
        assert_eq!(run(&config, &first_source, &sink, &SilentProgress).await.new_count, 1);

        let second_source = TableSource::new(&[(
            "developer",
            vec![json!({
                "id": "2",
                "title": "Developer",
                "job_url": "https://jobs.example.com/7?utm_campaign=x"
            })],
        )]);
        let second = run(&config, &second_source, &sink, &SilentProgress).await;
        assert_eq!(second.new_count, 0);
        assert_eq!(second.meta.after_row_dedupe, 1);
    }

    #[tokio::test]
    async fn all_phrases_failing_gives_empty_result() {
        let source = TableSource::new(&[]);
        let opts = FetchOptions {
            update_sheet: true,
            ..Default::default()
        };
        let config = config(&["A"], opts, &seen_path());

        let result = run(&config, &source, &RecordingSink::default(), &SilentProgress).await;
        assert_eq!(result.new_count, 0);
        assert_eq!(result.sheet_result, None);
        let expected = RunMeta {
            queries_failed: 1,
            include_from_queries: false,
            description_filter_applied: true,
            ..RunMeta::default()
        };
        assert_eq!(result.meta, expected);
    }

    #[tokio::test]
    async fn sink_failure_still_persists_seen() {
        let seen = seen_path();
        let source = TableSource::new(&[("engineer", scenario_rows())]);
        let failing = RecordingSink {
            fail: true,
            ..Default::default()
        };
        let opts = FetchOptions {
            update_sheet: true,
            ..Default::default()
        };
        let config = config(&["engineer"], opts, &seen);

        let first = run(&config, &source, &failing, &SilentProgress).await;
        assert_eq!(first.sheet_result, Some(SinkStatus::Error));
        assert_eq!(first.new_count, 1);
        assert!(seen.exists());

        let second = run(&config, &source, &failing, &SilentProgress).await;
        assert_eq!(second.new_count, 0);
        assert_eq!(failing.appended.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn sink_receives_new_records() {
        let source = TableSource::new(&[("engineer", scenario_rows())]);
        let sink = RecordingSink::default();
        let opts = FetchOptions {
            update_sheet: true,
            ..Default::default()
        };
        let config = config(&["engineer"], opts, &seen_path());

        let result = run(&config, &source, &sink, &SilentProgress).await;
        assert_eq!(result.sheet_result, Some(SinkStatus::Added(1)));
        let appended = sink.appended.lock().unwrap();
        assert_eq!(appended[0][0].source_query, "engineer");
        assert_eq!(appended[0][0].id, "li-3");
    }

    #[tokio::test]
    async fn include_from_queries_restricts_titles() {
        let source = TableSource::new(&[("\"junior developer\"", scenario_rows())]);
        let opts = FetchOptions {
            include_from_queries: Some(true),
            filter_description: Some(false),
            ..Default::default()
        };
        let config = config(&["\"junior developer\""], opts, &seen_path());

        let result = run(&config, &source, &RecordingSink::default(), &SilentProgress).await;
        assert_eq!(result.meta.after_title_filter, 1);
        assert_eq!(urls(&result), vec!["https://jobs.example.com/3"]);
        assert!(result.meta.include_from_queries);
    }

    #[tokio::test]
    async fn reset_seen_allows_redelivery() {
        let seen = seen_path();
        let source = TableSource::new(&[("engineer", scenario_rows())]);
        let sink = RecordingSink::default();
        let config = config(&["engineer"], FetchOptions::default(), &seen);
        assert_eq!(run(&config, &source, &sink, &SilentProgress).await.new_count, 1);

        let mut again = config.clone();
        again.reset_seen = true;
        assert_eq!(run(&again, &source, &sink, &SilentProgress).await.new_count, 1);
    }
}
