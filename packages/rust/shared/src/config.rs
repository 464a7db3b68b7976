//! Application configuration for jobflow.
//!
//! User config lives at `~/.jobflow/jobflow.toml`.
//! Environment variables override config file values, per-run options
//! (CLI flags or HTTP parameters) override both.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{JobflowError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "jobflow.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".jobflow";

// ---------------------------------------------------------------------------
// Config structs (matching jobflow.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Search defaults.
    #[serde(default)]
    pub search: SearchConfig,

    /// Filter toggles.
    #[serde(default)]
    pub filters: FiltersConfig,

    /// Spreadsheet sink settings.
    #[serde(default)]
    pub sheet: SheetConfig,

    /// Seen-store location.
    #[serde(default)]
    pub seen: SeenConfig,

    /// Listing source endpoint.
    #[serde(default)]
    pub backend: BackendConfig,

    /// HTTP adapter settings.
    #[serde(default)]
    pub server: ServerConfig,
}

/// `[search]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Listing site to query.
    #[serde(default = "default_site")]
    pub site: String,

    /// Target location passed with every query.
    #[serde(default = "default_location")]
    pub location: String,

    /// Only postings newer than this many hours.
    #[serde(default = "default_hours_old")]
    pub hours_old: u32,

    /// Results requested per query phrase.
    #[serde(default = "default_results_wanted")]
    pub results_wanted: u32,

    /// Ask the source to fetch full descriptions (slower, needed by the description filter).
    #[serde(default = "default_true")]
    pub fetch_description: bool,

    /// Bulk query list, split on `|` then `,`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub queries: Option<String>,

    /// Fallback queries file (`.json` array or line-based text).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub queries_file: Option<String>,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            site: default_site(),
            location: default_location(),
            hours_old: default_hours_old(),
            results_wanted: default_results_wanted(),
            fetch_description: true,
            queries: None,
            queries_file: None,
        }
    }
}

fn default_site() -> String {
    "linkedin".into()
}
fn default_location() -> String {
    "Sydney, New South Wales, Australia".into()
}
fn default_hours_old() -> u32 {
    48
}
fn default_results_wanted() -> u32 {
    120
}
fn default_true() -> bool {
    true
}

/// `[filters]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FiltersConfig {
    /// Require the title to contain one of the query phrases.
    #[serde(default)]
    pub title_include_from_queries: bool,

    /// Drop postings whose description asks for 5+ years or residency/clearance.
    #[serde(default = "default_true")]
    pub filter_description: bool,
}

impl Default for FiltersConfig {
    fn default() -> Self {
        Self {
            title_include_from_queries: false,
            filter_description: true,
        }
    }
}

/// `[sheet]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SheetConfig {
    /// Spreadsheet key. Empty disables the sink.
    #[serde(default)]
    pub sheet_id: String,

    /// Worksheet (tab) title.
    #[serde(default = "default_worksheet")]
    pub worksheet: String,

    /// Service-account key or access-token JSON file.
    #[serde(default = "default_credentials_path")]
    pub credentials_path: String,
}

impl Default for SheetConfig {
    fn default() -> Self {
        Self {
            sheet_id: String::new(),
            worksheet: default_worksheet(),
            credentials_path: default_credentials_path(),
        }
    }
}

fn default_worksheet() -> String {
    "jobflow".into()
}
fn default_credentials_path() -> String {
    "./credentials.json".into()
}

/// `[seen]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeenConfig {
    /// JSON file holding delivered URL keys.
    #[serde(default = "default_seen_path")]
    pub path: String,
}

impl Default for SeenConfig {
    fn default() -> Self {
        Self {
            path: default_seen_path(),
        }
    }
}

fn default_seen_path() -> String {
    "./history/seen.json".into()
}

/// `[backend]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Scraper endpoint accepting JSON search requests.
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_endpoint() -> String {
    "http://127.0.0.1:8000/scrape".into()
}
fn default_timeout_secs() -> u64 {
    300
}

/// `[server]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Socket address for `jobflow-server`.
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
        }
    }
}

fn default_listen_addr() -> String {
    "127.0.0.1:8080".into()
}

// ---------------------------------------------------------------------------
// Environment overrides
// ---------------------------------------------------------------------------

/// Interpret an environment-style boolean (`1`, `true`, `yes`, `on`).
pub fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

fn parse_number<T>(key: &str, value: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| JobflowError::config(format!("{key}={value:?} is not a valid number: {e}")))
}

impl AppConfig {
    /// Apply overrides from the process environment.
    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary key lookup. Empty values are ignored.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = get("HOURS_OLD") {
            self.search.hours_old = parse_number("HOURS_OLD", &v)?;
        }
        if let Some(v) = get("RESULTS_WANTED") {
            self.search.results_wanted = parse_number("RESULTS_WANTED", &v)?;
        }
        if let Some(v) = get("LINKEDIN_LOCATION") {
            self.search.location = v;
        }
        if let Some(v) = get("QUERIES") {
            self.search.queries = Some(v);
        }
        if let Some(v) = get("QUERIES_FILE") {
            self.search.queries_file = Some(v);
        }
        if let Some(v) = get("TITLE_INCLUDE_FROM_QUERIES") {
            self.filters.title_include_from_queries = parse_flag(&v);
        }
        if let Some(v) = get("FILTER_DESCRIPTION") {
            self.filters.filter_description = parse_flag(&v);
        }
        if let Some(v) = get("SHEET_ID") {
            self.sheet.sheet_id = v;
        }
        if let Some(v) = get("WORKSHEET") {
            self.sheet.worksheet = v;
        }
        if let Some(v) = get("GOOGLE_CREDS_PATH") {
            self.sheet.credentials_path = v;
        }
        if let Some(v) = get("SEEN_PATH") {
            self.seen.path = v;
        }
        if let Some(v) = get("SCRAPER_URL") {
            self.backend.endpoint = v;
        }
        if let Some(v) = get("SCRAPER_TIMEOUT_SECS") {
            self.backend.timeout_secs = parse_number("SCRAPER_TIMEOUT_SECS", &v)?;
        }
        if let Some(v) = get("LISTEN_ADDR") {
            self.server.listen_addr = v;
        }

        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Per-run options and runtime config
// ---------------------------------------------------------------------------

/// Options for a single pipeline run, as supplied by the CLI or an HTTP request.
/// Unset fields fall back to the loaded [`AppConfig`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchOptions {
    /// Append new postings to the spreadsheet.
    pub update_sheet: bool,
    /// Explicit query phrases (highest priority).
    pub queries: Option<Vec<String>>,
    /// Explicit queries file.
    pub queries_file: Option<String>,
    /// Location override.
    pub location: Option<String>,
    /// Time window override in hours.
    pub hours_old: Option<u32>,
    /// Results-per-query override.
    pub results_wanted: Option<u32>,
    /// Delete the seen file before fetching.
    pub reset_seen: bool,
    /// Echo the resolved query list in the result.
    pub return_queries: bool,
    /// Override `filters.title_include_from_queries`.
    pub include_from_queries: Option<bool>,
    /// Override `filters.filter_description`.
    pub filter_description: Option<bool>,
}

/// Where the sink writes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SheetTarget {
    /// Spreadsheet key.
    pub sheet_id: String,
    /// Worksheet title.
    pub worksheet: String,
    /// Credentials JSON file.
    pub credentials_path: PathBuf,
}

impl From<&SheetConfig> for SheetTarget {
    fn from(config: &SheetConfig) -> Self {
        Self {
            sheet_id: config.sheet_id.clone(),
            worksheet: config.worksheet.clone(),
            credentials_path: PathBuf::from(&config.credentials_path),
        }
    }
}

/// Runtime pipeline configuration, merged from config file, env, and per-run options.
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Listing site tag.
    pub site: String,
    /// Target location.
    pub location: String,
    /// Time window in hours.
    pub hours_old: u32,
    /// Results requested per query.
    pub results_wanted: u32,
    /// Explicit query phrases (tier 1).
    pub explicit_queries: Vec<String>,
    /// Explicit queries file (tier 2).
    pub queries_file: Option<PathBuf>,
    /// Bulk query string (tier 3).
    pub bulk_queries: Option<String>,
    /// Fallback queries file (tier 4).
    pub fallback_queries_file: Option<PathBuf>,
    /// Title must contain a query phrase.
    pub include_from_queries: bool,
    /// Apply description exclusion.
    pub filter_description: bool,
    /// Delete the seen file before fetching.
    pub reset_seen: bool,
    /// Echo queries in the result.
    pub return_queries: bool,
    /// Invoke the sink.
    pub update_sheet: bool,
    /// Seen-store file.
    pub seen_path: PathBuf,
    /// Sink destination.
    pub sheet: SheetTarget,
    /// Source-specific options forwarded with every search call.
    pub extra_options: serde_json::Map<String, serde_json::Value>,
}

impl RunConfig {
    /// Merge per-run options over the loaded application config.
    pub fn resolve(app: &AppConfig, opts: &FetchOptions) -> Self {
        let mut extra_options = serde_json::Map::new();
        if app.search.fetch_description && app.search.site == "linkedin" {
            extra_options.insert(
                "linkedin_fetch_description".into(),
                serde_json::Value::Bool(true),
            );
        }

        let non_empty = |s: &Option<String>| s.as_ref().filter(|v| !v.trim().is_empty()).cloned();

        Self {
            site: app.search.site.clone(),
            location: non_empty(&opts.location).unwrap_or_else(|| app.search.location.clone()),
            hours_old: opts.hours_old.unwrap_or(app.search.hours_old),
            results_wanted: opts.results_wanted.unwrap_or(app.search.results_wanted),
            explicit_queries: opts.queries.clone().unwrap_or_default(),
            queries_file: non_empty(&opts.queries_file).map(PathBuf::from),
            bulk_queries: non_empty(&app.search.queries),
            fallback_queries_file: non_empty(&app.search.queries_file).map(PathBuf::from),
            include_from_queries: opts
                .include_from_queries
                .unwrap_or(app.filters.title_include_from_queries),
            filter_description: opts
                .filter_description
                .unwrap_or(app.filters.filter_description),
            reset_seen: opts.reset_seen,
            return_queries: opts.return_queries,
            update_sheet: opts.update_sheet,
            seen_path: PathBuf::from(&app.seen.path),
            sheet: SheetTarget::from(&app.sheet),
            extra_options,
        }
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.jobflow/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| JobflowError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.jobflow/jobflow.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| JobflowError::io(path, e))?;

    toml::from_str(&content)
        .map_err(|e| JobflowError::config(format!("failed to parse {}: {e}", path.display())))
}

/// Load the config file (an explicit path, else the default location) and
/// apply environment overrides on top.
pub fn load_layered(path: Option<&Path>) -> Result<AppConfig> {
    let mut config = match path {
        Some(path) => load_config_from(path)?,
        None => load_config()?,
    };
    config.apply_env()?;
    Ok(config)
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| JobflowError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| JobflowError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| JobflowError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}
