//! Stable JSON report shape.

use crate::content::{Target, TargetKind};
use crate::orchestrator::ScanResult;
use crate::reporter::Reporter;
use crate::rules::types::{Finding, Severity, Source};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub struct JsonReporter;

impl JsonReporter {
    pub fn new() -> Self {
        Self
    }
}

impl Default for JsonReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl Reporter for JsonReporter {
    fn report(&self, result: &ScanResult) -> String {
        let report = JsonReport::from_scan_result(result);
        serde_json::to_string_pretty(&report)
            .unwrap_or_else(|e| format!(r#"{{"error": "Failed to serialize report: {}"}}"#, e))
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct JsonReport {
    pub summary: ReportSummary,
    pub detected: Detected,
    pub targets: Vec<Target>,
    pub findings: Vec<Finding>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ReportSummary {
    pub scanned_files: usize,
    pub elapsed_ms: u64,
    pub finding_count: usize,
    pub severities: SeverityCounts,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SeverityCounts {
    #[serde(rename = "LOW")]
    pub low: usize,
    #[serde(rename = "MEDIUM")]
    pub medium: usize,
    #[serde(rename = "HIGH")]
    pub high: usize,
    #[serde(rename = "CRITICAL")]
    pub critical: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Detected {
    pub target_kinds: Vec<String>,
    pub sources: Vec<String>,
    pub rules: Vec<RuleCount>,
    pub categories: Vec<CategoryCount>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mcp: Option<McpSummary>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RuleCount {
    pub rule_id: String,
    pub severity: Severity,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<Source>,
    pub count: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CategoryCount {
    pub category: String,
    pub count: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct McpSummary {
    pub servers: usize,
    pub objects: McpObjectCounts,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct McpObjectCounts {
    pub tools: usize,
    pub prompts: usize,
    pub resources: usize,
    pub instructions: usize,
}

impl JsonReport {
    pub fn from_scan_result(result: &ScanResult) -> Self {
        let findings = &result.findings;

        let severities = SeverityCounts {
            low: count_severity(findings, Severity::Low),
            medium: count_severity(findings, Severity::Medium),
            high: count_severity(findings, Severity::High),
            critical: count_severity(findings, Severity::Critical),
        };

        let mut target_kinds: Vec<String> = result
            .targets
            .iter()
            .map(|t| t.kind.as_str().to_string())
            .collect();
        target_kinds.sort();
        target_kinds.dedup();

        let mut sources: Vec<String> = findings
            .iter()
            .map(|f| f.source.as_str().to_string())
            .collect();
        sources.sort();
        sources.dedup();

        // Rule tallies, keyed by id, in first-seen order.
        let mut rules: Vec<RuleCount> = Vec::new();
        for finding in findings {
            match rules.iter_mut().find(|r| r.rule_id == finding.rule_id) {
                Some(entry) => entry.count += 1,
                None => rules.push(RuleCount {
                    rule_id: finding.rule_id.clone(),
                    severity: finding.severity,
                    category: finding.category.clone(),
                    source: Some(finding.source),
                    count: 1,
                }),
            }
        }

        let mut category_counts: BTreeMap<String, usize> = BTreeMap::new();
        for finding in findings {
            if let Some(category) = &finding.category {
                *category_counts.entry(category.clone()).or_default() += 1;
            }
        }
        let categories = category_counts
            .into_iter()
            .map(|(category, count)| CategoryCount { category, count })
            .collect();

        Self {
            summary: ReportSummary {
                scanned_files: result.scanned_files,
                elapsed_ms: result.elapsed_ms,
                finding_count: findings.len(),
                severities,
            },
            detected: Detected {
                target_kinds,
                sources,
                rules,
                categories,
                mcp: mcp_summary(&result.targets),
            },
            targets: result.targets.clone(),
            findings: findings.clone(),
        }
    }
}

fn count_severity(findings: &[Finding], severity: Severity) -> usize {
    findings.iter().filter(|f| f.severity == severity).count()
}

fn mcp_summary(targets: &[Target]) -> Option<McpSummary> {
    let servers: Vec<&Target> = targets
        .iter()
        .filter(|t| t.kind == TargetKind::Mcp)
        .collect();
    if servers.is_empty() {
        return None;
    }

    let count_meta = |key: &str| {
        servers
            .iter()
            .filter_map(|t| t.meta.get(key))
            .filter_map(|v| v.parse::<usize>().ok())
            .sum()
    };

    Some(McpSummary {
        servers: servers.len(),
        objects: McpObjectCounts {
            tools: count_meta("tools"),
            prompts: count_meta("prompts"),
            resources: count_meta("resources"),
            instructions: count_meta("instructions"),
        },
    })
}
