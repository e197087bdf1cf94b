//! Human-readable terminal report.

use crate::orchestrator::ScanResult;
use crate::reporter::Reporter;
use crate::rules::types::{Finding, Severity, Summary};
use colored::Colorize;

pub struct TerminalReporter {
    verbose: bool,
}

impl TerminalReporter {
    pub fn new(verbose: bool) -> Self {
        Self { verbose }
    }

    fn severity_label(severity: Severity) -> String {
        let text = format!("{:<8}", severity.to_string());
        match severity {
            Severity::Critical => text.red().bold().to_string(),
            Severity::High => text.red().to_string(),
            Severity::Medium => text.yellow().to_string(),
            Severity::Low => text.blue().to_string(),
        }
    }

    fn format_finding(&self, finding: &Finding) -> String {
        let location = match finding.line {
            Some(line) => format!("{}:{}", finding.file, line),
            None => finding.file.clone(),
        };

        let mut out = format!(
            "  {} {} {} ({})",
            Self::severity_label(finding.severity),
            finding.rule_id.bold(),
            finding.message,
            location.dimmed(),
        );

        if let Some(confidence) = finding.confidence {
            out.push_str(&format!(" [{:.0}%]", confidence * 100.0));
        }

        if self.verbose {
            if !finding.snippet.is_empty() {
                out.push_str(&format!("\n           {}", finding.snippet.dimmed()));
            }
            if let Some(remediation) = &finding.remediation {
                out.push_str(&format!("\n           → {}", remediation));
            }
        }

        out
    }
}

impl Default for TerminalReporter {
    fn default() -> Self {
        Self::new(false)
    }
}

impl Reporter for TerminalReporter {
    fn report(&self, result: &ScanResult) -> String {
        let mut lines = Vec::new();

        let target_names: Vec<&str> = result.targets.iter().map(|t| t.name.as_str()).collect();
        lines.push(format!(
            "{} {} ({} files, {} ms)",
            "Scanned".bold(),
            target_names.join(", "),
            result.scanned_files,
            result.elapsed_ms,
        ));

        for target in &result.targets {
            if let Some(error) = target.meta.get("error") {
                lines.push(format!(
                    "  {} {}: {}",
                    "unreachable".red(),
                    target.name,
                    error
                ));
            }
        }

        if result.findings.is_empty() {
            lines.push(format!("\n{}", "No findings.".green().bold()));
            return lines.join("\n");
        }

        // Highest severity first; stable within a bucket.
        let mut ordered: Vec<&Finding> = result.findings.iter().collect();
        ordered.sort_by(|a, b| b.severity.cmp(&a.severity));

        lines.push(String::new());
        for finding in ordered {
            lines.push(self.format_finding(finding));
        }

        let summary = Summary::from_findings(&result.findings);
        lines.push(format!(
            "\n{}: {} critical, {} high, {} medium, {} low",
            "Findings".bold(),
            summary.critical.to_string().red().bold(),
            summary.high.to_string().red(),
            summary.medium.to_string().yellow(),
            summary.low.to_string().blue(),
        ));

        lines.join("\n")
    }
}
