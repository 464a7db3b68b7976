//! URL normalization for cross-run deduplication.

use url::Url;

/// Exact-match tracking parameters (compared lowercased).
const TRACKING_PARAMS: &[&str] = &["fbclid", "gclid"];

fn is_tracking_param(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    lower.starts_with("utm_") || TRACKING_PARAMS.contains(&lower.as_str())
}

/// Canonicalize a listing URL into a stable dedupe key.
///
/// Lowercases the host, strips `utm_*`/`fbclid`/`gclid` query parameters
/// (keeping the rest in order), drops the fragment, and removes one trailing `/`.
/// Empty input yields an empty key, which callers treat as unkeyable.
pub fn normalize_url(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return String::new();
    }

    let Ok(mut url) = Url::parse(trimmed) else {
        return strip_one_slash(trimmed.to_string());
    };

    if url.query().is_some() {
        let kept: Vec<(String, String)> = url
            .query_pairs()
            .filter(|(name, _)| !is_tracking_param(name))
            .map(|(name, value)| (name.into_owned(), value.into_owned()))
            .collect();

        if kept.is_empty() {
            url.set_query(None);
        } else {
            url.query_pairs_mut().clear().extend_pairs(kept);
        }
    }

    url.set_fragment(None);
    strip_one_slash(url.into())
}

fn strip_one_slash(mut s: String) -> String {
    if s.ends_with('/') {
        s.pop();
    }
    s
}
