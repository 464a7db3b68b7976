//! Routes and handlers for the jobflow HTTP service.

use std::path::Path;
use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{RawQuery, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{Value, json};
use tokio::sync::Mutex;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use jobflow_core::pipeline::{SilentProgress, run};
use jobflow_retriever::ListingSource;
use jobflow_shared::{AppConfig, FetchOptions, JobflowError, PipelineResult, RunConfig};
use jobflow_sink::ListingSink;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub source: Arc<dyn ListingSource>,
    pub sink: Arc<dyn ListingSink>,
    /// Held for the duration of a pipeline run; runs never overlap.
    run_lock: Arc<Mutex<()>>,
}

impl AppState {
    pub fn new(
        config: AppConfig,
        source: Arc<dyn ListingSource>,
        sink: Arc<dyn ListingSink>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            source,
            sink,
            run_lock: Arc::new(Mutex::new(())),
        }
    }
}

/// Build the service router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/debug/env", get(debug_env))
        .route("/fetch", get(fetch_get).post(fetch_post))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// A rejected request, rendered as `400 {"error": "..."}`.
#[derive(Debug)]
pub struct BadRequest(pub String);

impl IntoResponse for BadRequest {
    fn into_response(self) -> Response {
        warn!(error = %self.0, "rejected request");
        (StatusCode::BAD_REQUEST, Json(json!({ "error": self.0 }))).into_response()
    }
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

/// Effective sink settings, with the sheet id masked.
async fn debug_env(State(state): State<AppState>) -> Json<Value> {
    let sheet = &state.config.sheet;
    let cwd = std::env::current_dir()
        .map(|p| p.display().to_string())
        .unwrap_or_default();
    Json(json!({
        "sheet_id": mask(&sheet.sheet_id),
        "worksheet": sheet.worksheet,
        "credentials_path": sheet.credentials_path,
        "credentials_exists": Path::new(&sheet.credentials_path).is_file(),
        "seen_path": state.config.seen.path,
        "cwd": cwd,
    }))
}

async fn fetch_get(
    State(state): State<AppState>,
    RawQuery(query): RawQuery,
) -> Result<Json<PipelineResult>, BadRequest> {
    let opts = parse_fetch_query(query.as_deref().unwrap_or_default())
        .map_err(|e| BadRequest(e.to_string()))?;
    Ok(Json(run_fetch(&state, opts).await))
}

async fn fetch_post(
    State(state): State<AppState>,
    body: Result<Json<FetchOptions>, JsonRejection>,
) -> Result<Json<PipelineResult>, BadRequest> {
    let Json(opts) = body.map_err(|e| BadRequest(e.body_text()))?;
    Ok(Json(run_fetch(&state, opts).await))
}

async fn run_fetch(state: &AppState, mut opts: FetchOptions) -> PipelineResult {
    // Query files are read from the server's own disk; only the operator's
    // configured file may be used over HTTP.
    if opts.queries_file.take().is_some() {
        warn!("ignoring queries_file supplied over HTTP");
    }
    let _guard = state.run_lock.lock().await;
    let run_config = RunConfig::resolve(&state.config, &opts);
    info!(
        update_sheet = run_config.update_sheet,
        explicit_queries = run_config.explicit_queries.len(),
        "fetch requested"
    );
    run(
        &run_config,
        state.source.as_ref(),
        state.sink.as_ref(),
        &SilentProgress,
    )
    .await
}

// ---------------------------------------------------------------------------
// Query parsing
// ---------------------------------------------------------------------------

/// Parse `GET /fetch` parameters. `query` may repeat; empty values and unknown
/// keys (including `queries_file`) are ignored.
pub fn parse_fetch_query(raw: &str) -> Result<FetchOptions, JobflowError> {
    let mut opts = FetchOptions::default();
    let mut queries: Vec<String> = Vec::new();

    for (key, value) in url::form_urlencoded::parse(raw.as_bytes()) {
        if value.trim().is_empty() {
            continue;
        }
        match key.as_ref() {
            "query" => queries.push(value.into_owned()),
            "location" => opts.location = Some(value.into_owned()),
            "hours_old" => opts.hours_old = Some(parse_number(&key, &value)?),
            "results_wanted" => opts.results_wanted = Some(parse_number(&key, &value)?),
            "update_sheet" => opts.update_sheet = parse_bool(&key, &value)?,
            "reset_seen" => opts.reset_seen = parse_bool(&key, &value)?,
            "return_queries" => opts.return_queries = parse_bool(&key, &value)?,
            "include_from_queries" => {
                opts.include_from_queries = Some(parse_bool(&key, &value)?);
            }
            "filter_description" => opts.filter_description = Some(parse_bool(&key, &value)?),
            _ => {}
        }
    }

    if !queries.is_empty() {
        opts.queries = Some(queries);
    }
    Ok(opts)
}

fn parse_number(key: &str, value: &str) -> Result<u32, JobflowError> {
    value.trim().parse().map_err(|_| {
        JobflowError::validation(format!(
            "{key}: expected a non-negative integer, got '{value}'"
        ))
    })
}

fn parse_bool(key: &str, value: &str) -> Result<bool, JobflowError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(JobflowError::validation(format!(
            "{key}: expected a boolean, got '{value}'"
        ))),
    }
}

/// `abcd***wxyz` for long ids, `***` for short ones.
fn mask(value: &str) -> String {
    let chars: Vec<char> = value.chars().collect();
    match chars.len() {
        0 => String::new(),
        n if n > 8 => {
            let head: String = chars[..4].iter().collect();
            let tail: String = chars[n - 4..].iter().collect();
            format!("{head}***{tail}")
        }
        _ => "***".to_string(),
    }
}
