//! De-duplication and confidence scoring over raw findings.

use crate::rules::types::{Finding, Severity, Source};
use rustc_hash::FxHashSet;

/// Base confidence by producing subsystem.
const BASE_SIGNATURE: f64 = 0.80;
const BASE_HEURISTIC: f64 = 0.55;

/// Path fragments that mark test or example material.
const TEST_PATH_MARKERS: &[&str] = &["test", "spec", "fixture", "mock", "example"];

/// Drop findings sharing a fingerprint, keeping the first occurrence in
/// input order. Idempotent.
pub fn dedupe(findings: Vec<Finding>) -> Vec<Finding> {
    let mut seen = FxHashSet::default();
    findings
        .into_iter()
        .filter(|f| seen.insert(f.fingerprint()))
        .collect()
}

/// Assign a confidence score to every finding.
pub fn score(findings: &mut [Finding]) {
    for finding in findings.iter_mut() {
        finding.confidence = Some(score_one(finding));
    }
}

/// Remove findings below the threshold. Findings without a score are
/// kept; filtering only makes sense after scoring.
pub fn apply_min_confidence(findings: Vec<Finding>, min: f64) -> Vec<Finding> {
    findings
        .into_iter()
        .filter(|f| f.confidence.map(|c| c >= min).unwrap_or(true))
        .collect()
}

fn score_one(finding: &Finding) -> f64 {
    let mut confidence = match finding.source {
        Source::Signature => BASE_SIGNATURE,
        Source::Heuristic => BASE_HEURISTIC,
    };

    let path = finding.file.to_lowercase();
    if TEST_PATH_MARKERS.iter().any(|m| path.contains(m)) {
        confidence *= 0.6;
    }

    if finding.in_comment {
        confidence *= 0.7;
    }

    if let Some(entropy) = finding.entropy {
        // Entropy well above the threshold pushes confidence toward 1.
        let t = ((entropy - 4.2) / 1.8).clamp(0.0, 1.0);
        confidence += (1.0 - confidence) * t;
    }

    if finding.source == Source::Signature {
        let len = finding.snippet.len() as f64;
        confidence += 0.10 * (len / 40.0).min(1.0);
    }

    match finding.severity {
        Severity::Critical => confidence += 0.05,
        Severity::Low => confidence -= 0.10,
        _ => {}
    }

    confidence.clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn finding(rule_id: &str, file: &str, line: Option<usize>, message: &str) -> Finding {
        Finding {
            rule_id: rule_id.to_string(),
            severity: Severity::Medium,
            category: None,
            source: Source::Signature,
            message: message.to_string(),
            remediation: None,
            file: file.to_string(),
            line,
            column: None,
            confidence: None,
            snippet: String::new(),
            in_comment: false,
            entropy: None,
        }
    }

    #[test]
    fn test_dedupe_removes_exact_duplicates() {
        let findings = vec![
            finding("A", "f", Some(1), "m"),
            finding("A", "f", Some(1), "m"),
            finding("A", "f", Some(2), "m"),
        ];
        let deduped = dedupe(findings);
        assert_eq!(deduped.len(), 2);
    }

    #[test]
    fn test_dedupe_keeps_first_occurrence() {
        let mut a = finding("A", "f", Some(1), "m");
        a.snippet = "first".to_string();
        let mut b = finding("A", "f", Some(1), "m");
        b.snippet = "second".to_string();

        let deduped = dedupe(vec![a, b]);
        assert_eq!(deduped[0].snippet, "first");
    }

    #[test]
    fn test_dedupe_idempotent() {
        let findings = vec![
            finding("A", "f", Some(1), "m"),
            finding("A", "f", Some(1), "m"),
            finding("B", "g", None, "n"),
        ];
        let once = dedupe(findings);
        let twice = dedupe(once.clone());
        assert_eq!(once, twice);
    }

    #[test]
    fn test_signature_base_with_length_bonus() {
        let mut f = finding("A", "src/main.py", Some(1), "m");
        f.snippet = "x".repeat(40);
        score(std::slice::from_mut(&mut f));
        // 0.80 base + full 0.10 length bonus.
        assert!((f.confidence.unwrap() - 0.90).abs() < 1e-9);
    }

    #[test]
    fn test_heuristic_base() {
        let mut f = finding("A", "src/main.py", Some(1), "m");
        f.source = Source::Heuristic;
        score(std::slice::from_mut(&mut f));
        assert!((f.confidence.unwrap() - 0.55).abs() < 1e-9);
    }

    #[test]
    fn test_test_path_discount() {
        let mut f = finding("A", "tests/data.py", Some(1), "m");
        score(std::slice::from_mut(&mut f));
        // 0.80 * 0.6 = 0.48, no snippet bonus.
        assert!((f.confidence.unwrap() - 0.48).abs() < 1e-9);
    }

    #[test]
    fn test_test_path_markers_case_insensitive() {
        for file in ["a/TEST/x.py", "a/Fixtures/x.py", "MOCKS/x.py", "Examples/x"] {
            let mut f = finding("A", file, Some(1), "m");
            score(std::slice::from_mut(&mut f));
            assert!(f.confidence.unwrap() < 0.80, "no discount for {}", file);
        }
    }

    #[test]
    fn test_comment_discount() {
        let mut f = finding("A", "src/main.py", Some(1), "m");
        f.in_comment = true;
        score(std::slice::from_mut(&mut f));
        assert!((f.confidence.unwrap() - 0.56).abs() < 1e-9);
    }

    #[test]
    fn test_entropy_scales_toward_one() {
        let mut low = finding("E", "src/cfg.py", Some(1), "m");
        low.source = Source::Heuristic;
        low.entropy = Some(4.2);
        let mut high = low.clone();
        high.entropy = Some(6.0);

        score(std::slice::from_mut(&mut low));
        score(std::slice::from_mut(&mut high));

        assert!((low.confidence.unwrap() - 0.55).abs() < 1e-9);
        // (6.0 - 4.2) / 1.8 = 1.0 → pinned to 1.0.
        assert!((high.confidence.unwrap() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_severity_adjustments() {
        let mut critical = finding("A", "src/x", Some(1), "m");
        critical.severity = Severity::Critical;
        score(std::slice::from_mut(&mut critical));
        assert!((critical.confidence.unwrap() - 0.85).abs() < 1e-9);

        let mut low = finding("A", "src/x", Some(1), "m");
        low.severity = Severity::Low;
        score(std::slice::from_mut(&mut low));
        assert!((low.confidence.unwrap() - 0.70).abs() < 1e-9);
    }

    #[test]
    fn test_confidence_clamped() {
        let mut f = finding("A", "src/x", Some(1), "m");
        f.severity = Severity::Critical;
        f.entropy = Some(10.0);
        f.snippet = "x".repeat(100);
        score(std::slice::from_mut(&mut f));
        assert!(f.confidence.unwrap() <= 1.0);
    }

    #[test]
    fn test_min_confidence_filter() {
        let mut a = finding("A", "src/x", Some(1), "m");
        a.confidence = Some(0.9);
        let mut b = finding("B", "src/x", Some(2), "m");
        b.confidence = Some(0.3);

        let kept = apply_min_confidence(vec![a, b], 0.5);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].rule_id, "A");
    }

    #[test]
    fn test_min_confidence_keeps_unscored() {
        let f = finding("A", "src/x", Some(1), "m");
        let kept = apply_min_confidence(vec![f], 0.5);
        assert_eq!(kept.len(), 1);
    }
}
