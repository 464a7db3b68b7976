//! Persistent seen set.
//!
//! The [`SeenStore`] keeps the normalized URL keys of every listing already
//! delivered, as a sorted JSON array on disk. A [`SeenSet`] is loaded at the
//! start of a run, gates the batch, and is written back only when new keys
//! were added.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use jobflow_shared::{JobflowError, ListingRecord, Result};
use tracing::{debug, info, warn};

// ---------------------------------------------------------------------------
// SeenSet
// ---------------------------------------------------------------------------

/// Ordered set of non-empty normalized URL keys.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SeenSet(BTreeSet<String>);

impl SeenSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `key` was delivered before. The empty key never matches.
    pub fn contains(&self, key: &str) -> bool {
        !key.is_empty() && self.0.contains(key)
    }

    /// Adds a key. Empty keys are ignored. Returns true when newly added.
    pub fn insert(&mut self, key: impl Into<String>) -> bool {
        let key = key.into();
        !key.is_empty() && self.0.insert(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    /// Drops records already delivered, preserving order.
    pub fn retain_unseen(&self, records: Vec<ListingRecord>) -> Vec<ListingRecord> {
        records
            .into_iter()
            .filter(|record| !self.contains(&record.url_key()))
            .collect()
    }

    /// Records every non-empty key in `records`. Returns how many were new.
    pub fn mark_delivered(&mut self, records: &[ListingRecord]) -> usize {
        records
            .iter()
            .filter(|record| self.insert(record.url_key()))
            .count()
    }
}

impl FromIterator<String> for SeenSet {
    fn from_iter<I: IntoIterator<Item = String>>(iter: I) -> Self {
        let mut set = Self::new();
        for key in iter {
            set.insert(key);
        }
        set
    }
}

// ---------------------------------------------------------------------------
// SeenStore
// ---------------------------------------------------------------------------

/// JSON file holding a [`SeenSet`].
#[derive(Debug, Clone)]
pub struct SeenStore {
    path: PathBuf,
}

impl SeenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads the set. Missing, unreadable, or corrupt files yield an empty set.
    pub async fn load(&self) -> SeenSet {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "no seen file yet");
                return SeenSet::new();
            }
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "failed to read seen file");
                return SeenSet::new();
            }
        };

        match serde_json::from_str::<Vec<String>>(&content) {
            Ok(keys) => {
                let set: SeenSet = keys.into_iter().collect();
                debug!(path = %self.path.display(), keys = set.len(), "loaded seen set");
                set
            }
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "corrupt seen file, starting empty");
                SeenSet::new()
            }
        }
    }

    /// Writes the sorted keys as a pretty JSON array, atomically.
    pub async fn save(&self, set: &SeenSet) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| JobflowError::io(parent, e))?;
        }

        let keys: Vec<&str> = set.iter().collect();
        let json = serde_json::to_string_pretty(&keys)
            .map_err(|e| JobflowError::Storage(format!("serialize seen set: {e}")))?;

        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json)
            .await
            .map_err(|e| JobflowError::io(&tmp, e))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| JobflowError::io(&self.path, e))?;

        debug!(path = %self.path.display(), keys = set.len(), "saved seen set");
        Ok(())
    }

    /// Deletes the seen file. Returns true when a file was removed.
    pub async fn reset(&self) -> bool {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => {
                info!(path = %self.path.display(), "seen set reset");
                true
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!(path = %self.path.display(), "seen set already empty");
                false
            }
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "failed to reset seen set");
                false
            }
        }
    }
}
