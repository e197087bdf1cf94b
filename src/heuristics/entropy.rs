//! High-entropy token detection for embedded secrets.

use crate::rules::matcher::LineIndex;
use crate::rules::types::{Finding, Severity, Source};
use regex::Regex;
use std::sync::LazyLock;

pub const RULE_ID: &str = "HEURISTIC_HIGH_ENTROPY_SECRET";

/// Bits per character above which a token is flagged.
pub const ENTROPY_THRESHOLD: f64 = 4.2;

/// Minimum token length considered.
const MIN_TOKEN_LEN: usize = 20;

/// Candidate extraction stops after this many tokens per file.
const MAX_CANDIDATES: usize = 2000;

/// At most this many findings per file.
const MAX_FINDINGS: usize = 10;

static TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[A-Za-z0-9+/_=\-]{20,}").expect("token pattern"));

pub fn analyze(content: &str, virtual_path: &str) -> Vec<Finding> {
    let index = LineIndex::new(content);
    let mut findings = Vec::new();

    for (seen, m) in TOKEN.find_iter(content).enumerate() {
        if seen >= MAX_CANDIDATES || findings.len() >= MAX_FINDINGS {
            break;
        }

        let token = m.as_str();
        debug_assert!(token.len() >= MIN_TOKEN_LEN);

        let entropy = shannon_entropy(token);
        if entropy < ENTROPY_THRESHOLD {
            continue;
        }

        let (line, column) = index.locate(m.start());
        findings.push(Finding {
            rule_id: RULE_ID.to_string(),
            severity: Severity::High,
            category: Some("secret-leak".to_string()),
            source: Source::Heuristic,
            message: format!(
                "High-entropy token ({:.2} bits/char) looks like an embedded secret",
                entropy
            ),
            remediation: Some(
                "Move the value out of the artifact and load it from the environment".to_string(),
            ),
            file: virtual_path.to_string(),
            line: Some(line),
            column: Some(column),
            confidence: None,
            snippet: mask(token),
            in_comment: index.in_comment(content, m.start()),
            entropy: Some(entropy),
        });
    }

    findings
}

/// Shannon entropy in bits per character over the token's byte histogram.
pub fn shannon_entropy(token: &str) -> f64 {
    let bytes = token.as_bytes();
    let mut counts = [0usize; 256];
    for &b in bytes {
        counts[b as usize] += 1;
    }

    let len = bytes.len() as f64;
    counts
        .iter()
        .filter(|&&c| c > 0)
        .map(|&c| {
            let p = c as f64 / len;
            -p * p.log2()
        })
        .sum()
}

/// Keep the head and tail for recognizability without reproducing the
/// full candidate secret in reports.
fn mask(token: &str) -> String {
    if token.len() <= 12 {
        return token.to_string();
    }
    format!("{}…{}", &token[..6], &token[token.len() - 4..])
}
