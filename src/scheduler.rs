//! Parallel scan of one content plan.
//!
//! Workers pull items off a bounded pool; each item is served from the
//! cache when possible and otherwise run through the signature matcher
//! and the behavioral analyzers. Per-item failures are swallowed. A
//! cancel signal stops new items from being picked up while in-flight
//! items finish and keep their findings.

use crate::cache::ScanCache;
use crate::content::{ContentItem, ContentPlan};
use crate::heuristics;
use crate::progress::{ProgressEvent, ProgressSink};
use crate::rules::matcher::SignatureMatcher;
use crate::rules::types::Finding;
use rayon::prelude::*;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use tracing::debug;

/// Worker bound: half the cores, at least 4, at most 32.
pub fn worker_count() -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4);
    (cores / 2).clamp(4, 32)
}

#[derive(Debug, Default, Clone, Copy)]
pub struct ScanStats {
    pub scanned: usize,
    pub cache_hits: usize,
}

pub struct Scheduler {
    pool: rayon::ThreadPool,
    use_behavioral: bool,
}

impl Scheduler {
    pub fn new(use_behavioral: bool) -> Self {
        Self::with_workers(worker_count(), use_behavioral)
    }

    pub fn with_workers(workers: usize, use_behavioral: bool) -> Self {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("scan-{}", i))
            .build()
            .expect("scan pool");
        Self {
            pool,
            use_behavioral,
        }
    }

    /// Scan every item in the plan. Findings come back as a stable
    /// concatenation in item order; ordering within an item is the
    /// matcher's deterministic order.
    pub fn scan_plan(
        &self,
        plan: &ContentPlan,
        matcher: &SignatureMatcher,
        cache: Option<&Mutex<ScanCache>>,
        progress: &ProgressSink,
        cancel: &AtomicBool,
        now: i64,
    ) -> (Vec<Finding>, ScanStats) {
        let hits = AtomicUsize::new(0);
        let scanned = AtomicUsize::new(0);

        let per_item: Vec<Vec<Finding>> = self.pool.install(|| {
            plan.items
                .par_iter()
                .map(|item| {
                    if cancel.load(Ordering::Relaxed) {
                        return Vec::new();
                    }
                    scanned.fetch_add(1, Ordering::Relaxed);
                    let (findings, cached) = self.scan_item(item, matcher, cache, now);
                    if cached {
                        hits.fetch_add(1, Ordering::Relaxed);
                    }

                    progress.emit(ProgressEvent::ItemScanned {
                        path: item.virtual_path.clone(),
                        cached,
                    });
                    if !findings.is_empty() {
                        progress.emit(ProgressEvent::Findings {
                            path: item.virtual_path.clone(),
                            count: findings.len(),
                        });
                    }
                    findings
                })
                .collect()
        });

        let findings = per_item.into_iter().flatten().collect();
        (
            findings,
            ScanStats {
                scanned: scanned.load(Ordering::Relaxed),
                cache_hits: hits.load(Ordering::Relaxed),
            },
        )
    }

    fn scan_item(
        &self,
        item: &ContentItem,
        matcher: &SignatureMatcher,
        cache: Option<&Mutex<ScanCache>>,
        now: i64,
    ) -> (Vec<Finding>, bool) {
        let hash = ScanCache::hash_content(&item.content);
        let rule_version = matcher.rule_version().to_string();

        if let Some(cache) = cache {
            let mut guard = cache.lock().expect("cache lock poisoned");
            if let Some(findings) = guard.lookup(&item.virtual_path, &hash, &rule_version, now) {
                debug!(path = %item.virtual_path, "Cache hit");
                return (findings, true);
            }
        }

        let mut findings = matcher.match_content(&item.content, &item.virtual_path, item.file_type);
        if self.use_behavioral {
            findings.extend(heuristics::analyze(item));
        }

        if let Some(cache) = cache {
            let mut guard = cache.lock().expect("cache lock poisoned");
            guard.store(&item.virtual_path, hash, rule_version, findings.clone(), now);
        }

        (findings, false)
    }
}
