//! Search phrase resolution.
//!
//! Phrases come from the first source tier that yields anything: explicit
//! phrases, an explicit file, the bulk setting, the fallback file setting, and
//! finally the built-in defaults.

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::{debug, warn};

use jobflow_shared::{JobflowError, Result, RunConfig};

/// Built-in phrases used when no other source provides any.
pub const DEFAULT_QUERIES: [&str; 9] = [
    "\"junior software engineer\"",
    "\"software engineer\"",
    "\"software developer\"",
    "\"java developer\"",
    "\"devops engineer\"",
    "\"devops developer\"",
    "\"it support\"",
    "\"full stack developer\"",
    "\"full stack engineer\"",
];

/// Every place a run can take its phrases from.
#[derive(Debug, Clone, Default)]
pub struct QuerySources {
    /// Phrases given directly on the command line or in a request.
    pub explicit: Vec<String>,
    /// File given directly on the command line or in a request.
    pub file: Option<PathBuf>,
    /// `|`/`,` separated phrases from the environment or config.
    pub bulk: Option<String>,
    /// File named in the environment or config.
    pub fallback_file: Option<PathBuf>,
}

impl From<&RunConfig> for QuerySources {
    fn from(config: &RunConfig) -> Self {
        Self {
            explicit: config.explicit_queries.clone(),
            file: config.queries_file.clone(),
            bulk: config.bulk_queries.clone(),
            fallback_file: config.fallback_queries_file.clone(),
        }
    }
}

type Provider = fn(&QuerySources) -> Option<Vec<String>>;

/// Source tiers in priority order.
const PROVIDERS: [(&str, Provider); 5] = [
    ("explicit", explicit_tier),
    ("file", file_tier),
    ("bulk", bulk_tier),
    ("fallback_file", fallback_file_tier),
    ("default", default_tier),
];

/// Resolve the phrases for a run. Never empty.
pub fn resolve_queries(sources: &QuerySources) -> Vec<String> {
    for (tier, provider) in PROVIDERS {
        let Some(phrases) = provider(sources).map(dedupe_phrases) else {
            continue;
        };
        if !phrases.is_empty() {
            debug!(tier, count = phrases.len(), "resolved queries");
            return phrases;
        }
    }
    dedupe_phrases(DEFAULT_QUERIES.iter().map(|q| q.to_string()).collect())
}

/// Trim, drop empties, and remove repeats keeping the first occurrence.
pub fn dedupe_phrases(phrases: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(phrases.len());
    for phrase in phrases {
        let phrase = phrase.trim();
        if !phrase.is_empty() && !out.iter().any(|p| p == phrase) {
            out.push(phrase.to_string());
        }
    }
    out
}

/// Split a bulk setting on `|`, then on `,`.
pub fn split_bulk(raw: &str) -> Vec<String> {
    raw.split('|')
        .flat_map(|chunk| chunk.split(','))
        .map(str::to_string)
        .collect()
}

/// Read phrases from a file: a JSON array for `.json` paths, otherwise one
/// phrase per line with blank and `#` lines skipped.
pub fn read_queries_file(path: &Path) -> Result<Vec<String>> {
    let content = std::fs::read_to_string(path).map_err(|e| JobflowError::io(path, e))?;

    let is_json = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));

    if !is_json {
        return Ok(content
            .lines()
            .filter(|line| {
                let line = line.trim();
                !line.is_empty() && !line.starts_with('#')
            })
            .map(str::to_string)
            .collect());
    }

    match serde_json::from_str::<Value>(&content) {
        Ok(Value::Array(items)) => Ok(items
            .into_iter()
            .map(|item| match item {
                Value::String(s) => s,
                other => other.to_string(),
            })
            .collect()),
        Ok(_) => Err(JobflowError::parse(format!(
            "{}: expected a JSON array of phrases",
            path.display()
        ))),
        Err(e) => Err(JobflowError::parse(format!("{}: {e}", path.display()))),
    }
}

fn explicit_tier(sources: &QuerySources) -> Option<Vec<String>> {
    (!sources.explicit.is_empty()).then(|| sources.explicit.clone())
}

fn file_tier(sources: &QuerySources) -> Option<Vec<String>> {
    sources.file.as_deref().and_then(file_phrases)
}

fn bulk_tier(sources: &QuerySources) -> Option<Vec<String>> {
    sources.bulk.as_deref().map(split_bulk)
}

fn fallback_file_tier(sources: &QuerySources) -> Option<Vec<String>> {
    sources.fallback_file.as_deref().and_then(file_phrases)
}

fn default_tier(_sources: &QuerySources) -> Option<Vec<String>> {
    Some(DEFAULT_QUERIES.iter().map(|q| q.to_string()).collect())
}

fn file_phrases(path: &Path) -> Option<Vec<String>> {
    match read_queries_file(path) {
        Ok(phrases) => Some(phrases),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "failed to read queries file");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn temp_file(name: &str, content: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("jobflow_queries_{}", Uuid::now_v7()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join(name);
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn defaults_when_nothing_given() {
        let queries = resolve_queries(&QuerySources::default());
        assert_eq!(queries.len(), 9);
        assert_eq!(queries[0], "\"junior software engineer\"");
        assert_eq!(queries[8], "\"full stack engineer\"");
    }

    #[test]
    fn explicit_list_beats_file() {
        let file = temp_file("queries.txt", "rust developer\n");
        let sources = QuerySources {
            explicit: vec![" data analyst ".into(), "".into(), "data analyst".into()],
            file: Some(file),
            bulk: Some("ignored".into()),
            ..Default::default()
        };
        assert_eq!(resolve_queries(&sources), vec!["data analyst"]);
    }

    #[test]
    fn line_file_skips_comments_and_blanks() {
        let file = temp_file(
            "queries.txt",
            "# roles\n\"it support\"\n\n   \n  # indented comment\nhelp desk\n\"it support\"\n",
        );
        let sources = QuerySources {
            file: Some(file),
            ..Default::default()
        };
        assert_eq!(resolve_queries(&sources), vec!["\"it support\"", "help desk"]);
    }

    #[test]
    fn json_file_stringifies_elements() {
        let file = temp_file("queries.JSON", r#"["cloud engineer", 42, "cloud engineer"]"#);
        let sources = QuerySources {
            file: Some(file),
            ..Default::default()
        };
        assert_eq!(resolve_queries(&sources), vec!["cloud engineer", "42"]);
    }

    #[test]
    fn bad_json_falls_through_to_next_tier() {
        let file = temp_file("queries.json", r#"{"not": "a list"}"#);
        let sources = QuerySources {
            file: Some(file),
            bulk: Some("qa engineer|test analyst, sdet".into()),
            ..Default::default()
        };
        assert_eq!(
            resolve_queries(&sources),
            vec!["qa engineer", "test analyst", "sdet"]
        );
    }

    #[test]
    fn missing_file_falls_through_to_fallback_file() {
        let fallback = temp_file("fallback.txt", "network engineer\n");
        let sources = QuerySources {
            file: Some(PathBuf::from("/nonexistent/jobflow/queries.txt")),
            fallback_file: Some(fallback),
            ..Default::default()
        };
        assert_eq!(resolve_queries(&sources), vec!["network engineer"]);
    }

    #[test]
    fn blank_bulk_uses_defaults() {
        let sources = QuerySources {
            bulk: Some(" | , ".into()),
            ..Default::default()
        };
        assert_eq!(resolve_queries(&sources).len(), DEFAULT_QUERIES.len());
    }

    #[test]
    fn resolution_is_deterministic() {
        let sources = QuerySources {
            bulk: Some("a,b|c,a".into()),
            ..Default::default()
        };
        assert_eq!(resolve_queries(&sources), resolve_queries(&sources));
        assert_eq!(resolve_queries(&sources), vec!["a", "b", "c"]);
    }
}
