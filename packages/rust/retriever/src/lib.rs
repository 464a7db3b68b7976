//! Listing retrieval: the source seam and the multi-query fetch loop.
//!
//! This crate provides:
//! - [`ListingSource`]: one search call against an external listing backend
//! - [`HttpListingSource`]: a JSON-over-HTTP implementation for a scraper service
//! - [`fetch_site`]: runs every query phrase against a source, tolerating failures

pub mod fetch;
pub mod source;

pub use fetch::{
    FetchProgress, FetchResult, NoFetchProgress, SOURCE_QUERY_FIELD, SiteQuery, drop_empty_fields,
    fetch_site,
};
pub use source::{HttpListingSource, ListingSource, SearchRequest};
