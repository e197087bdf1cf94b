//! Content-addressed findings cache.
//!
//! Entries are keyed by virtual path and validated against the content
//! hash, the compiled rule version, and an age ceiling. A corpus change
//! therefore invalidates every prior entry. Load failures silently reset
//! the cache; save failures are logged and never fatal.

use crate::rules::types::Finding;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::PathBuf;
use tracing::{debug, warn};

/// Default entry lifetime: seven days.
pub const DEFAULT_TTL_SECS: i64 = 7 * 24 * 60 * 60;

const CACHE_FILENAME: &str = "scan-cache.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    pub content_hash: String,
    pub rule_version: String,
    /// Unix seconds.
    pub created_at: i64,
    pub findings: Vec<Finding>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct CacheFile {
    entries: FxHashMap<String, CacheEntry>,
}

#[derive(Debug)]
pub struct ScanCache {
    path: Option<PathBuf>,
    ttl_secs: i64,
    entries: FxHashMap<String, CacheEntry>,
    dirty: bool,
}

impl ScanCache {
    /// Load the cache from a file, resetting silently when the file is
    /// missing or unreadable.
    pub fn open(path: PathBuf, ttl_secs: i64) -> Self {
        let entries = match fs::read_to_string(&path) {
            Ok(text) => match serde_json::from_str::<CacheFile>(&text) {
                Ok(file) => file.entries,
                Err(e) => {
                    debug!(path = %path.display(), error = %e, "Resetting unreadable cache");
                    FxHashMap::default()
                }
            },
            Err(_) => FxHashMap::default(),
        };

        Self {
            path: Some(path),
            ttl_secs,
            entries,
            dirty: false,
        }
    }

    /// A cache that never persists; for tests and --no-cache runs that
    /// still want hit semantics within one process.
    pub fn ephemeral(ttl_secs: i64) -> Self {
        Self {
            path: None,
            ttl_secs,
            entries: FxHashMap::default(),
            dirty: false,
        }
    }

    /// Platform cache location, `<cache_dir>/skillscan/scan-cache.json`.
    pub fn default_path() -> Option<PathBuf> {
        dirs::cache_dir().map(|d| d.join("skillscan").join(CACHE_FILENAME))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Cached findings for a path, or a miss. Entries failing any
    /// validity check are evicted on the way.
    pub fn lookup(
        &mut self,
        virtual_path: &str,
        content_hash: &str,
        rule_version: &str,
        now: i64,
    ) -> Option<Vec<Finding>> {
        let entry = self.entries.get(virtual_path)?;

        if entry.rule_version != rule_version
            || now - entry.created_at > self.ttl_secs
            || entry.content_hash != content_hash
        {
            self.entries.remove(virtual_path);
            self.dirty = true;
            return None;
        }

        Some(self.entries[virtual_path].findings.clone())
    }

    pub fn store(
        &mut self,
        virtual_path: &str,
        content_hash: String,
        rule_version: String,
        findings: Vec<Finding>,
        now: i64,
    ) {
        self.entries.insert(
            virtual_path.to_string(),
            CacheEntry {
                content_hash,
                rule_version,
                created_at: now,
                findings,
            },
        );
        self.dirty = true;
    }

    /// Write the cache back if anything changed. Errors are logged, not
    /// propagated.
    pub fn flush(&mut self) {
        if !self.dirty {
            return;
        }
        let path = match &self.path {
            Some(path) => path.clone(),
            None => return,
        };

        if let Some(parent) = path.parent() {
            if let Err(e) = fs::create_dir_all(parent) {
                warn!(path = %parent.display(), error = %e, "Failed to create cache directory");
                return;
            }
        }

        let file = CacheFile {
            entries: self.entries.clone(),
        };
        match serde_json::to_string(&file) {
            Ok(json) => {
                if let Err(e) = fs::write(&path, json) {
                    warn!(path = %path.display(), error = %e, "Failed to write cache");
                } else {
                    self.dirty = false;
                }
            }
            Err(e) => warn!(error = %e, "Failed to serialize cache"),
        }
    }

    pub fn hash_content(content: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(content.as_bytes());
        format!("{:x}", hasher.finalize())
    }
}
