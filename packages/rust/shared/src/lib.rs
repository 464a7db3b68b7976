//! Shared types, error model, and configuration for jobflow.
//!
//! This crate is the foundation depended on by all other jobflow crates.
//! It provides:
//! - [`JobflowError`], the unified error type
//! - Domain types ([`RawListing`], [`ListingRecord`], [`PipelineResult`], [`SinkStatus`])
//! - Configuration ([`AppConfig`], [`RunConfig`], config loading)
//! - [`normalize_url`], the stable dedupe key for a listing URL

pub mod config;
pub mod error;
pub mod types;
pub mod url_key;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, BackendConfig, FetchOptions, FiltersConfig, RunConfig, SearchConfig, SeenConfig,
    ServerConfig, SheetConfig, SheetTarget, config_dir, config_file_path, init_config,
    load_config, load_config_from, load_layered, parse_flag,
};
pub use error::{JobflowError, Result};
pub use types::{JobItem, ListingRecord, PipelineResult, RawListing, RunMeta, SinkStatus};
pub use url_key::normalize_url;
