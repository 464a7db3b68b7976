//! The listing-source seam and its HTTP implementation.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::debug;
use url::Url;

use jobflow_shared::{JobflowError, RawListing, Result};

/// User-Agent string for source requests.
const USER_AGENT: &str = concat!("jobflow/", env!("CARGO_PKG_VERSION"));

/// Maximum number of redirects to follow.
const MAX_REDIRECTS: usize = 5;

/// One search call: a phrase against a site, location, and time window.
#[derive(Debug, Clone)]
pub struct SearchRequest<'a> {
    pub site: &'a str,
    pub search_term: &'a str,
    pub location: &'a str,
    pub hours_old: u32,
    pub results_wanted: u32,
    /// Source-specific options, forwarded verbatim.
    pub extra: &'a Map<String, Value>,
}

/// An external backend that returns raw listings for one search phrase.
#[async_trait]
pub trait ListingSource: Send + Sync {
    /// Run one search. Errors are treated by callers as soft, per-phrase failures.
    async fn search(&self, request: &SearchRequest<'_>) -> Result<Vec<RawListing>>;

    /// Human-readable source name for tracing.
    fn name(&self) -> &str;
}

// ---------------------------------------------------------------------------
// HttpListingSource
// ---------------------------------------------------------------------------

/// Talks to a scraper service that accepts a JSON search body and answers
/// with a JSON array of listing objects (or `{"jobs": [...]}`).
pub struct HttpListingSource {
    client: Client,
    endpoint: Url,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum SearchResponse {
    Rows(Vec<Value>),
    Wrapped { jobs: Vec<Value> },
}

impl HttpListingSource {
    /// Build a source for `endpoint` with the given per-request timeout.
    pub fn new(endpoint: &str, timeout_secs: u64) -> Result<Self> {
        let endpoint = Url::parse(endpoint).map_err(|e| {
            JobflowError::config(format!("invalid scraper endpoint '{endpoint}': {e}"))
        })?;

        let client = Client::builder()
            .user_agent(USER_AGENT)
            .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| JobflowError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { client, endpoint })
    }

    fn request_body(request: &SearchRequest<'_>) -> Value {
        let mut body = Map::new();
        body.insert("site_name".into(), Value::from(vec![request.site]));
        body.insert("search_term".into(), Value::from(request.search_term));
        body.insert("location".into(), Value::from(request.location));
        body.insert("hours_old".into(), Value::from(request.hours_old));
        body.insert("results_wanted".into(), Value::from(request.results_wanted));
        body.insert("verbose".into(), Value::from(0));
        for (key, value) in request.extra {
            body.insert(key.clone(), value.clone());
        }
        Value::Object(body)
    }
}

#[async_trait]
impl ListingSource for HttpListingSource {
    async fn search(&self, request: &SearchRequest<'_>) -> Result<Vec<RawListing>> {
        let url = &self.endpoint;
        debug!(%url, term = request.search_term, "searching listings");

        let response = self
            .client
            .post(url.as_str())
            .json(&Self::request_body(request))
            .send()
            .await
            .map_err(|e| JobflowError::Network(format!("{url}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(JobflowError::Network(format!("{url}: HTTP {status}: {body}")));
        }

        let body = response
            .text()
            .await
            .map_err(|e| JobflowError::Network(format!("{url}: failed to read body: {e}")))?;

        let rows = match serde_json::from_str::<SearchResponse>(&body)
            .map_err(|e| JobflowError::parse(format!("{url}: unexpected response: {e}")))?
        {
            SearchResponse::Rows(rows) | SearchResponse::Wrapped { jobs: rows } => rows,
        };

        // Non-object rows carry no fields to filter on
        Ok(rows.into_iter().filter_map(RawListing::from_json).collect())
    }

    fn name(&self) -> &str {
        "http"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn request<'a>(term: &'a str, extra: &'a Map<String, Value>) -> SearchRequest<'a> {
        SearchRequest {
            site: "linkedin",
            search_term: term,
            location: "Sydney, New South Wales, Australia",
            hours_old: 48,
            results_wanted: 20,
            extra,
        }
    }

    #[test]
    fn invalid_endpoint_is_config_error() {
        let err = HttpListingSource::new("not a url", 5).err().expect("error");
        assert!(err.to_string().contains("invalid scraper endpoint"));
    }

    #[tokio::test]
    async fn posts_search_body_and_parses_rows() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/scrape"))
            .and(body_partial_json(json!({
                "site_name": ["linkedin"],
                "search_term": "\"software engineer\"",
                "hours_old": 48,
                "results_wanted": 20,
                "linkedin_fetch_description": true,
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"title": "Software Engineer", "job_url": "https://example.com/1"},
                {"title": "Graduate Developer", "job_url": "https://example.com/2"},
                "not an object",
            ])))
            .mount(&server)
            .await;

        let mut extra = Map::new();
        extra.insert("linkedin_fetch_description".into(), Value::Bool(true));

        let source = HttpListingSource::new(&format!("{}/scrape", server.uri()), 5).unwrap();
        let rows = source
            .search(&request("\"software engineer\"", &extra))
            .await
            .unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].title(), "Software Engineer");
    }

    #[tokio::test]
    async fn accepts_wrapped_response() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "jobs": [{"title": "IT Support Officer"}]
            })))
            .mount(&server)
            .await;

        let extra = Map::new();
        let source = HttpListingSource::new(&server.uri(), 5).unwrap();
        let rows = source.search(&request("it support", &extra)).await.unwrap();
        assert_eq!(rows.len(), 1);
    }

    #[tokio::test]
    async fn server_error_is_network_error() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_string("rate limited"))
            .mount(&server)
            .await;

        let extra = Map::new();
        let source = HttpListingSource::new(&server.uri(), 5).unwrap();
        let err = source
            .search(&request("java developer", &extra))
            .await
            .unwrap_err();
        assert!(matches!(err, JobflowError::Network(_)));
        assert!(err.to_string().contains("500"));
    }

    #[tokio::test]
    async fn garbage_body_is_parse_error() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
            .mount(&server)
            .await;

        let extra = Map::new();
        let source = HttpListingSource::new(&server.uri(), 5).unwrap();
        let err = source
            .search(&request("devops engineer", &extra))
            .await
            .unwrap_err();
        assert!(matches!(err, JobflowError::Parse { .. }));
    }
}
