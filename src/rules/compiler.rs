//! Compiles YAML rule corpora into the matcher's internal form.
//!
//! The corpus is a top-level YAML sequence of rule records. Malformed
//! records and invalid patterns are dropped with a diagnostic rather than
//! failing the whole corpus; only an unparseable document is an error.

use crate::filetype::FileType;
use crate::rules::types::{CompiledRule, Severity};
use regex::{Regex, RegexBuilder};
use serde::Deserialize;
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::warn;

/// The built-in corpus shipped with the scanner.
pub const DEFAULT_RULES: &str = include_str!("../../rules/default.yaml");

#[derive(Error, Debug)]
pub enum RuleError {
    #[error("Failed to read rules file: {path}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse rules YAML: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("Rules document must be a top-level sequence")]
    NotASequence,
}

/// The immutable output of compilation: every surviving rule plus a
/// version digest derived from the source text. The digest participates
/// in cache-entry validity so a corpus change invalidates cached findings.
#[derive(Debug)]
pub struct RuleSet {
    pub rules: Vec<CompiledRule>,
    pub version: String,
}

impl RuleSet {
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&CompiledRule> {
        self.rules.iter().find(|r| r.id == id)
    }
}

#[derive(Debug, Deserialize)]
struct RawRule {
    id: String,
    category: String,
    severity: String,
    patterns: Vec<String>,
    file_types: Vec<String>,
    #[serde(default)]
    description: String,
    #[serde(default)]
    remediation: String,
    #[serde(default)]
    exclude_patterns: Vec<String>,
}

pub struct RuleCompiler;

impl RuleCompiler {
    /// Compile the built-in corpus.
    pub fn compile_default() -> Result<RuleSet, RuleError> {
        Self::compile_sources(&[DEFAULT_RULES])
    }

    /// Compile the built-in corpus plus an extra user-supplied document.
    pub fn compile_with_extra(extra: &str) -> Result<RuleSet, RuleError> {
        Self::compile_sources(&[DEFAULT_RULES, extra])
    }

    /// Compile one or more YAML documents into a single rule set. Rules
    /// keep the order they appear in, across documents.
    pub fn compile_sources(sources: &[&str]) -> Result<RuleSet, RuleError> {
        let mut rules = Vec::new();
        let mut hasher = Sha256::new();

        for source in sources {
            hasher.update(source.as_bytes());
            rules.extend(Self::compile_document(source)?);
        }

        let digest = hasher.finalize();
        let version = format!("{:x}", digest)[..16].to_string();

        Ok(RuleSet { rules, version })
    }

    fn compile_document(source: &str) -> Result<Vec<CompiledRule>, RuleError> {
        let doc: serde_yaml::Value = serde_yaml::from_str(source)?;
        let records = match doc {
            serde_yaml::Value::Sequence(seq) => seq,
            serde_yaml::Value::Null => Vec::new(),
            _ => return Err(RuleError::NotASequence),
        };

        let mut rules = Vec::new();
        for record in records {
            let raw: RawRule = match serde_yaml::from_value(record) {
                Ok(raw) => raw,
                Err(e) => {
                    warn!(error = %e, "Skipping malformed rule record");
                    continue;
                }
            };
            if let Some(rule) = Self::compile_rule(raw) {
                rules.push(rule);
            }
        }
        Ok(rules)
    }

    fn compile_rule(raw: RawRule) -> Option<CompiledRule> {
        let severity = match Severity::parse(&raw.severity) {
            Some(s) => s,
            None => {
                warn!(rule = %raw.id, severity = %raw.severity, "Skipping rule with unknown severity");
                return None;
            }
        };

        let mut any_type = false;
        let mut file_types = Vec::new();
        for ft in &raw.file_types {
            if ft.eq_ignore_ascii_case("any") {
                any_type = true;
            } else if let Some(parsed) = FileType::parse(ft) {
                file_types.push(parsed);
            } else {
                warn!(rule = %raw.id, file_type = %ft, "Ignoring unknown file type");
            }
        }
        if !any_type && file_types.is_empty() {
            warn!(rule = %raw.id, "Skipping rule with no usable file types");
            return None;
        }

        let patterns: Vec<Regex> = raw
            .patterns
            .iter()
            .filter_map(|p| match compile_pattern(p) {
                Ok(re) => Some(re),
                Err(e) => {
                    warn!(rule = %raw.id, pattern = %p, error = %e, "Dropping invalid pattern");
                    None
                }
            })
            .collect();
        if patterns.is_empty() {
            warn!(rule = %raw.id, "Skipping rule with no valid patterns");
            return None;
        }

        let exclude: Vec<Regex> = raw
            .exclude_patterns
            .iter()
            .filter_map(|p| match compile_pattern(p) {
                Ok(re) => Some(re),
                Err(e) => {
                    warn!(rule = %raw.id, pattern = %p, error = %e, "Dropping invalid exclude pattern");
                    None
                }
            })
            .collect();

        Some(CompiledRule {
            id: raw.id,
            category: raw.category,
            severity,
            patterns,
            file_types,
            any_type,
            exclude,
            description: raw.description,
            remediation: raw.remediation,
        })
    }
}

/// Compile a pattern, normalizing the PCRE-style inline `(?i)` token into
/// the engine's case-insensitive flag. Every occurrence of the token is
/// stripped; everything else reaches the regex engine verbatim.
pub fn compile_pattern(source: &str) -> Result<Regex, regex::Error> {
    let case_insensitive = source.contains("(?i)");
    let cleaned;
    let pattern = if case_insensitive {
        cleaned = source.replace("(?i)", "");
        cleaned.as_str()
    } else {
        source
    };
    RegexBuilder::new(pattern)
        .case_insensitive(case_insensitive)
        .build()
}
