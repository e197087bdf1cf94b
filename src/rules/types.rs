use crate::filetype::FileType;
use regex::Regex;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.to_lowercase().as_str() {
            "low" => Some(Severity::Low),
            "medium" => Some(Severity::Medium),
            "high" => Some(Severity::High),
            "critical" => Some(Severity::Critical),
            _ => None,
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str().to_uppercase())
    }
}

/// Which subsystem produced a finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    Signature,
    Heuristic,
}

impl Source {
    pub fn as_str(&self) -> &'static str {
        match self {
            Source::Signature => "signature",
            Source::Heuristic => "heuristic",
        }
    }
}

impl std::fmt::Display for Source {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A rule compiled from its YAML source form. Patterns are already
/// normalized (inline `(?i)` stripped into a case-insensitive flag).
#[derive(Debug, Clone)]
pub struct CompiledRule {
    pub id: String,
    pub category: String,
    pub severity: Severity,
    pub patterns: Vec<Regex>,
    pub file_types: Vec<FileType>,
    /// Rule listed `"any"` among its file types and applies to every type.
    pub any_type: bool,
    pub exclude: Vec<Regex>,
    pub description: String,
    pub remediation: String,
}

fn is_false(value: &bool) -> bool {
    !*value
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Finding {
    pub rule_id: String,
    pub severity: Severity,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    pub source: Source,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remediation: Option<String>,
    /// Originating virtual path.
    pub file: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    /// The matched text (signature) or offending excerpt (heuristic).
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub snippet: String,
    /// The match sits on a commented-out line. Feeds confidence scoring.
    #[serde(default, skip_serializing_if = "is_false")]
    pub in_comment: bool,
    /// Shannon entropy of the matched token, for entropy findings only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entropy: Option<f64>,
}

impl Finding {
    pub fn from_rule(rule: &CompiledRule, file: &str, line: usize, column: usize) -> Self {
        Self {
            rule_id: rule.id.clone(),
            severity: rule.severity,
            category: Some(rule.category.clone()),
            source: Source::Signature,
            message: rule.description.clone(),
            remediation: if rule.remediation.is_empty() {
                None
            } else {
                Some(rule.remediation.clone())
            },
            file: file.to_string(),
            line: Some(line),
            column: Some(column),
            confidence: None,
            snippet: String::new(),
            in_comment: false,
            entropy: None,
        }
    }

    /// Identity used for de-duplication and scan comparison.
    pub fn fingerprint(&self) -> String {
        let line = self.line.map(|l| l.to_string()).unwrap_or_default();
        format!("{}|{}|{}|{}", self.rule_id, self.file, line, self.message)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Summary {
    pub critical: usize,
    pub high: usize,
    pub medium: usize,
    pub low: usize,
}

impl Summary {
    pub fn from_findings(findings: &[Finding]) -> Self {
        let (critical, high, medium, low) =
            findings
                .iter()
                .fold((0, 0, 0, 0), |(c, h, m, l), f| match f.severity {
                    Severity::Critical => (c + 1, h, m, l),
                    Severity::High => (c, h + 1, m, l),
                    Severity::Medium => (c, h, m + 1, l),
                    Severity::Low => (c, h, m, l + 1),
                });

        Self {
            critical,
            high,
            medium,
            low,
        }
    }
}
