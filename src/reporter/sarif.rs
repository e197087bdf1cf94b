//! SARIF 2.1.0 output for code-scanning integrations.

use crate::orchestrator::ScanResult;
use crate::reporter::Reporter;
use crate::rules::types::Severity;
use serde::Serialize;
use std::collections::HashSet;

pub struct SarifReporter;

impl SarifReporter {
    pub fn new() -> Self {
        Self
    }
}

impl Default for SarifReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl Reporter for SarifReporter {
    fn report(&self, result: &ScanResult) -> String {
        let sarif = SarifReport::from_scan_result(result);
        serde_json::to_string_pretty(&sarif)
            .unwrap_or_else(|e| format!(r#"{{"error": "Failed to serialize SARIF: {}"}}"#, e))
    }
}

#[derive(Debug, Serialize)]
pub struct SarifReport {
    #[serde(rename = "$schema")]
    pub schema: String,
    pub version: String,
    pub runs: Vec<SarifRun>,
}

#[derive(Debug, Serialize)]
pub struct SarifRun {
    pub tool: SarifTool,
    pub results: Vec<SarifResult>,
}

#[derive(Debug, Serialize)]
pub struct SarifTool {
    pub driver: SarifDriver,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SarifDriver {
    pub name: String,
    pub version: String,
    pub information_uri: String,
    pub rules: Vec<SarifRule>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SarifRule {
    pub id: String,
    pub short_description: SarifMessage,
}

#[derive(Debug, Serialize)]
pub struct SarifResult {
    #[serde(rename = "ruleId")]
    pub rule_id: String,
    pub level: String,
    pub message: SarifMessage,
    pub locations: Vec<SarifLocation>,
}

#[derive(Debug, Serialize)]
pub struct SarifMessage {
    pub text: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SarifLocation {
    pub physical_location: SarifPhysicalLocation,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SarifPhysicalLocation {
    pub artifact_location: SarifArtifactLocation,
    pub region: SarifRegion,
}

#[derive(Debug, Serialize)]
pub struct SarifArtifactLocation {
    pub uri: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SarifRegion {
    pub start_line: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_column: Option<usize>,
}

impl SarifReport {
    pub fn from_scan_result(result: &ScanResult) -> Self {
        let mut seen: HashSet<&str> = HashSet::new();
        let mut rules = Vec::new();
        for finding in &result.findings {
            if seen.insert(&finding.rule_id) {
                rules.push(SarifRule {
                    id: finding.rule_id.clone(),
                    short_description: SarifMessage {
                        text: finding.message.clone(),
                    },
                });
            }
        }

        let results = result
            .findings
            .iter()
            .map(|f| SarifResult {
                rule_id: f.rule_id.clone(),
                level: severity_to_level(f.severity).to_string(),
                message: SarifMessage {
                    text: match &f.remediation {
                        Some(remediation) => format!("{}\n\n{}", f.message, remediation),
                        None => f.message.clone(),
                    },
                },
                locations: vec![SarifLocation {
                    physical_location: SarifPhysicalLocation {
                        artifact_location: SarifArtifactLocation {
                            uri: f.file.clone(),
                        },
                        region: SarifRegion {
                            start_line: f.line.unwrap_or(1),
                            start_column: f.column,
                        },
                    },
                }],
            })
            .collect();

        Self {
            schema: "https://raw.githubusercontent.com/oasis-tcs/sarif-spec/master/Schemata/sarif-schema-2.1.0.json".to_string(),
            version: "2.1.0".to_string(),
            runs: vec![SarifRun {
                tool: SarifTool {
                    driver: SarifDriver {
                        name: "skillscan".to_string(),
                        version: env!("CARGO_PKG_VERSION").to_string(),
                        information_uri: "https://github.com/skillscan/skillscan".to_string(),
                        rules,
                    },
                },
                results,
            }],
        }
    }
}

fn severity_to_level(severity: Severity) -> &'static str {
    match severity {
        Severity::Low => "note",
        Severity::Medium => "warning",
        Severity::High | Severity::Critical => "error",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::types::{Finding, Source};

    fn finding(rule_id: &str, severity: Severity, line: Option<usize>) -> Finding {
        Finding {
            rule_id: rule_id.to_string(),
            severity,
            category: None,
            source: Source::Signature,
            message: "detected".to_string(),
            remediation: Some("fix it".to_string()),
            file: "mcp://host/tools/exec".to_string(),
            line,
            column: Some(3),
            confidence: None,
            snippet: String::new(),
            in_comment: false,
            entropy: None,
        }
    }

    fn result(findings: Vec<Finding>) -> ScanResult {
        ScanResult {
            targets: vec![],
            findings,
            scanned_files: 1,
            elapsed_ms: 1,
        }
    }

    #[test]
    fn test_sarif_envelope() {
        let reporter = SarifReporter::new();
        let text = reporter.report(&result(vec![finding("A", Severity::High, Some(2))]));
        let parsed: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed["version"], "2.1.0");
        assert_eq!(parsed["runs"][0]["tool"]["driver"]["name"], "skillscan");
    }

    #[test]
    fn test_result_location() {
        let report = SarifReport::from_scan_result(&result(vec![finding(
            "A",
            Severity::High,
            Some(7),
        )]));
        let sarif_result = &report.runs[0].results[0];
        assert_eq!(sarif_result.rule_id, "A");
        assert_eq!(sarif_result.level, "error");
        let location = &sarif_result.locations[0].physical_location;
        assert_eq!(location.artifact_location.uri, "mcp://host/tools/exec");
        assert_eq!(location.region.start_line, 7);
    }

    #[test]
    fn test_severity_levels() {
        assert_eq!(severity_to_level(Severity::Low), "note");
        assert_eq!(severity_to_level(Severity::Medium), "warning");
        assert_eq!(severity_to_level(Severity::High), "error");
        assert_eq!(severity_to_level(Severity::Critical), "error");
    }

    #[test]
    fn test_missing_line_defaults_to_one() {
        let report =
            SarifReport::from_scan_result(&result(vec![finding("A", Severity::Low, None)]));
        assert_eq!(report.runs[0].results[0].locations[0].physical_location.region.start_line, 1);
    }

    #[test]
    fn test_driver_rules_deduplicated() {
        let report = SarifReport::from_scan_result(&result(vec![
            finding("A", Severity::High, Some(1)),
            finding("A", Severity::High, Some(2)),
            finding("B", Severity::Low, Some(3)),
        ]));
        assert_eq!(report.runs[0].tool.driver.rules.len(), 2);
        assert_eq!(report.runs[0].results.len(), 3);
    }
}
