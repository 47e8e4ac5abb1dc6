//! Persistent JSON cache for backup logs
//!
//! Logs of finished tasks never change, so they are fetched once and kept in
//! a file mapping task UPID to `[starttime, log]`. Entries older than the
//! cutoff are dropped when the file is loaded.

use std::collections::BTreeMap;
use std::future::Future;
use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::error::Result;

pub const LOG_CACHE_FILE: &str = "upid.log.cache.json";

pub struct JsonCache {
    path: PathBuf,
    entries: BTreeMap<String, (i64, Value)>,
    dirty: bool,
}

impl JsonCache {
    /// Load the cache file, dropping entries with a timestamp before `cutoff`
    ///
    /// A missing or unreadable file yields an empty cache.
    pub fn load(path: impl Into<PathBuf>, cutoff: i64) -> Self {
        let path = path.into();
        let mut entries: BTreeMap<String, (i64, Value)> = match std::fs::read_to_string(&path) {
            Ok(text) => serde_json::from_str(&text).unwrap_or_else(|e| {
                warn!("Ignoring corrupt cache file {}: {}", path.display(), e);
                BTreeMap::new()
            }),
            Err(_) => BTreeMap::new(),
        };

        let before = entries.len();
        entries.retain(|_, (timestamp, _)| *timestamp >= cutoff);
        let dirty = entries.len() != before;
        if dirty {
            debug!("Pruned {} outdated cache entries", before - entries.len());
        }

        Self {
            path,
            entries,
            dirty,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.get(key).map(|(_, value)| value)
    }

    pub fn insert(&mut self, key: impl Into<String>, timestamp: i64, value: Value) {
        self.entries.insert(key.into(), (timestamp, value));
        self.dirty = true;
    }

    /// Cached value for `key`, calling `fetch` and storing its result on a miss
    pub async fn get_or_fetch<F, Fut>(&mut self, key: &str, timestamp: i64, fetch: F) -> Result<Value>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Value>>,
    {
        if let Some(value) = self.get(key) {
            return Ok(value.clone());
        }
        let value = fetch().await?;
        self.insert(key, timestamp, value.clone());
        Ok(value)
    }

    /// Write the cache back if anything changed since it was loaded
    pub fn save(&mut self) -> Result<()> {
        if !self.dirty {
            return Ok(());
        }
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, serde_json::to_string(&self.entries)?)?;
        info!("Wrote {} entries to {}", self.entries.len(), self.path.display());
        self.dirty = false;
        Ok(())
    }
}
