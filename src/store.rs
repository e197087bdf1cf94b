//! Scan history: persisted results, retention, and differential
//! comparison between two scans.

use crate::error::{Result, ScanError};
use crate::orchestrator::ScanResult;
use crate::rules::types::{Finding, Severity};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use tracing::debug;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredScan {
    pub id: String,
    pub created_at: String,
    pub result: ScanResult,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeverityChange {
    pub finding: Finding,
    pub previous: Severity,
    pub current: Severity,
}

/// Partition of two scans' findings by fingerprint.
#[derive(Debug, Serialize, Deserialize)]
pub struct ScanComparison {
    pub added: Vec<Finding>,
    pub removed: Vec<Finding>,
    pub unchanged: usize,
    pub severity_changed: Vec<SeverityChange>,
}

pub struct ResultStore {
    dir: PathBuf,
}

impl ResultStore {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    /// Platform data location, `<data_dir>/skillscan/history`.
    pub fn default_dir() -> Option<PathBuf> {
        dirs::data_dir().map(|d| d.join("skillscan").join("history"))
    }

    /// Persist a result under a generated id (millisecond timestamp plus
    /// a random suffix) and return the id.
    pub fn save(&self, result: &ScanResult) -> Result<String> {
        fs::create_dir_all(&self.dir).map_err(|e| ScanError::Io {
            path: self.dir.display().to_string(),
            source: e,
        })?;

        let suffix = uuid::Uuid::new_v4().simple().to_string();
        let id = format!("{}-{}", chrono::Utc::now().timestamp_millis(), &suffix[..8]);
        let stored = StoredScan {
            id: id.clone(),
            created_at: chrono::Utc::now().to_rfc3339(),
            result: result.clone(),
        };

        let path = self.scan_path(&id);
        let json = serde_json::to_string_pretty(&stored)?;
        fs::write(&path, json).map_err(|e| ScanError::Io {
            path: path.display().to_string(),
            source: e,
        })?;
        debug!(id = %id, "Saved scan");
        Ok(id)
    }

    pub fn load(&self, id: &str) -> Result<StoredScan> {
        let path = self.scan_path(id);
        if !path.exists() {
            return Err(ScanError::ScanNotFound(id.to_string()));
        }
        let content = fs::read_to_string(&path).map_err(|e| ScanError::Io {
            path: path.display().to_string(),
            source: e,
        })?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Ids of stored scans, newest first. The millisecond prefix makes
    /// the lexicographic sort chronological.
    pub fn list(&self) -> Vec<String> {
        let mut ids: Vec<String> = fs::read_dir(&self.dir)
            .into_iter()
            .flatten()
            .filter_map(|e| e.ok())
            .filter_map(|e| {
                e.file_name()
                    .to_str()
                    .and_then(|n| n.strip_suffix(".json"))
                    .map(str::to_string)
            })
            .collect();
        ids.sort_by(|a, b| b.cmp(a));
        ids
    }

    /// Drop the oldest scans above the ceiling.
    pub fn enforce_retention(&self, max_scans: usize) -> Result<usize> {
        let ids = self.list();
        let mut dropped = 0;
        for id in ids.iter().skip(max_scans) {
            let path = self.scan_path(id);
            fs::remove_file(&path).map_err(|e| ScanError::Io {
                path: path.display().to_string(),
                source: e,
            })?;
            dropped += 1;
        }
        Ok(dropped)
    }

    /// Compare two stored scans, baseline against current.
    pub fn compare(&self, baseline_id: &str, current_id: &str) -> Result<ScanComparison> {
        let baseline = self.load(baseline_id)?;
        let current = self.load(current_id)?;
        Ok(compare_findings(
            &baseline.result.findings,
            &current.result.findings,
        ))
    }

    fn scan_path(&self, id: &str) -> PathBuf {
        self.dir.join(format!("{}.json", id))
    }
}

/// Fingerprint-keyed diff. A fingerprint present on both sides with a
/// different severity lands in `severity_changed`.
pub fn compare_findings(baseline: &[Finding], current: &[Finding]) -> ScanComparison {
    let baseline_map: FxHashMap<String, &Finding> = baseline
        .iter()
        .map(|f| (f.fingerprint(), f))
        .collect();
    let current_map: FxHashMap<String, &Finding> =
        current.iter().map(|f| (f.fingerprint(), f)).collect();

    let mut added = Vec::new();
    let mut severity_changed = Vec::new();
    let mut unchanged = 0;

    for finding in current {
        match baseline_map.get(&finding.fingerprint()) {
            None => added.push(finding.clone()),
            Some(old) if old.severity != finding.severity => {
                severity_changed.push(SeverityChange {
                    finding: finding.clone(),
                    previous: old.severity,
                    current: finding.severity,
                });
            }
            Some(_) => unchanged += 1,
        }
    }

    let removed = baseline
        .iter()
        .filter(|f| !current_map.contains_key(&f.fingerprint()))
        .cloned()
        .collect();

    ScanComparison {
        added,
        removed,
        unchanged,
        severity_changed,
    }
}
