//! Browser-extension manifest risk analysis.

use crate::rules::matcher::LineIndex;
use crate::rules::types::{Finding, Severity, Source};

pub const BROAD_HOST_PERMISSIONS: &str = "EXT_BROAD_HOST_PERMISSIONS";
pub const RISKY_PERMISSION: &str = "EXT_RISKY_PERMISSION";
pub const CONTENT_SCRIPT_ALL_URLS: &str = "EXT_CONTENT_SCRIPT_ALL_URLS";
pub const UNSAFE_CSP: &str = "EXT_UNSAFE_CSP";

/// Permissions that grant capabilities far beyond a typical extension.
const RISKY_PERMISSIONS: &[(&str, Severity)] = &[
    ("debugger", Severity::High),
    ("proxy", Severity::High),
    ("nativeMessaging", Severity::High),
    ("webRequest", Severity::Medium),
    ("webRequestBlocking", Severity::Medium),
    ("cookies", Severity::Medium),
    ("history", Severity::Medium),
    ("clipboardRead", Severity::Medium),
    ("management", Severity::Medium),
    ("privacy", Severity::Medium),
];

const BROAD_HOST_PATTERNS: &[&str] = &["<all_urls>", "*://*/*", "http://*/*", "https://*/*"];

/// Analyze a manifest.json. Returns nothing when the content is not
/// parseable JSON.
pub fn analyze(content: &str, virtual_path: &str) -> Vec<Finding> {
    let doc: serde_json::Value = match serde_json::from_str(content) {
        Ok(doc) => doc,
        Err(_) => return Vec::new(),
    };

    let index = LineIndex::new(content);
    let mut findings = Vec::new();

    let declared = collect_strings(&doc, &["permissions", "optional_permissions"]);
    let hosts = collect_strings(
        &doc,
        &[
            "permissions",
            "host_permissions",
            "optional_host_permissions",
        ],
    );

    for host in &hosts {
        if BROAD_HOST_PATTERNS.contains(&host.as_str()) {
            findings.push(finding(
                BROAD_HOST_PERMISSIONS,
                Severity::High,
                format!("Extension requests access to all sites via \"{}\"", host),
                "Scope host permissions to the sites the extension needs",
                virtual_path,
                line_of(content, &index, host),
                host,
            ));
        }
    }

    for (permission, severity) in RISKY_PERMISSIONS {
        if declared.iter().any(|p| p == permission) {
            findings.push(finding(
                RISKY_PERMISSION,
                *severity,
                format!("Extension requests the \"{}\" permission", permission),
                "Drop permissions the extension does not strictly need",
                virtual_path,
                line_of(content, &index, permission),
                permission,
            ));
        }
    }

    if let Some(scripts) = doc.get("content_scripts").and_then(|v| v.as_array()) {
        for script in scripts {
            let matches = script
                .get("matches")
                .and_then(|m| m.as_array())
                .map(|m| {
                    m.iter()
                        .filter_map(|v| v.as_str())
                        .map(str::to_string)
                        .collect::<Vec<_>>()
                })
                .unwrap_or_default();
            if let Some(broad) = matches
                .iter()
                .find(|m| BROAD_HOST_PATTERNS.contains(&m.as_str()))
            {
                findings.push(finding(
                    CONTENT_SCRIPT_ALL_URLS,
                    Severity::High,
                    "Content script is injected into every page".to_string(),
                    "Restrict content_scripts matches to required origins",
                    virtual_path,
                    line_of(content, &index, broad),
                    broad,
                ));
            }
        }
    }

    if csp_is_unsafe(&doc) {
        findings.push(finding(
            UNSAFE_CSP,
            Severity::High,
            "Content security policy permits eval or plaintext sources".to_string(),
            "Remove unsafe-eval and http: sources from the CSP",
            virtual_path,
            line_of(content, &index, "content_security_policy"),
            "content_security_policy",
        ));
    }

    findings
}

fn collect_strings(doc: &serde_json::Value, keys: &[&str]) -> Vec<String> {
    let mut out = Vec::new();
    for key in keys {
        if let Some(values) = doc.get(*key).and_then(|v| v.as_array()) {
            out.extend(values.iter().filter_map(|v| v.as_str()).map(str::to_string));
        }
    }
    out
}

fn csp_is_unsafe(doc: &serde_json::Value) -> bool {
    let csp = match doc.get("content_security_policy") {
        Some(csp) => csp,
        None => return false,
    };
    let texts: Vec<&str> = match csp {
        serde_json::Value::String(s) => vec![s.as_str()],
        serde_json::Value::Object(map) => map.values().filter_map(|v| v.as_str()).collect(),
        _ => return false,
    };
    texts
        .iter()
        .any(|t| t.contains("unsafe-eval") || t.contains("http://"))
}

fn line_of(content: &str, index: &LineIndex, needle: &str) -> Option<usize> {
    content.find(needle).map(|off| index.locate(off).0)
}

fn finding(
    rule_id: &str,
    severity: Severity,
    message: String,
    remediation: &str,
    file: &str,
    line: Option<usize>,
    snippet: &str,
) -> Finding {
    Finding {
        rule_id: rule_id.to_string(),
        severity,
        category: Some("overpermission".to_string()),
        source: Source::Heuristic,
        message,
        remediation: Some(remediation.to_string()),
        file: file.to_string(),
        line,
        column: None,
        confidence: None,
        snippet: snippet.to_string(),
        in_comment: false,
        entropy: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(findings: &[Finding]) -> Vec<&str> {
        findings.iter().map(|f| f.rule_id.as_str()).collect()
    }

    #[test]
    fn test_broad_host_permission() {
        let content = r#"{"permissions": ["<all_urls>", "storage"]}"#;
        let findings = analyze(content, "manifest.json");
        assert_eq!(ids(&findings), vec![BROAD_HOST_PERMISSIONS]);
        assert_eq!(findings[0].severity, Severity::High);
    }

    #[test]
    fn test_host_permissions_key_mv3() {
        let content = r#"{"host_permissions": ["*://*/*"]}"#;
        let findings = analyze(content, "manifest.json");
        assert!(ids(&findings).contains(&BROAD_HOST_PERMISSIONS));
    }

    #[test]
    fn test_risky_permission_severities() {
        let content = r#"{"permissions": ["debugger", "cookies"]}"#;
        let findings = analyze(content, "manifest.json");
        assert_eq!(findings.len(), 2);
        let sev = |snippet: &str| {
            findings
                .iter()
                .find(|f| f.snippet == snippet)
                .unwrap()
                .severity
        };
        assert_eq!(sev("debugger"), Severity::High);
        assert_eq!(sev("cookies"), Severity::Medium);
    }

    #[test]
    fn test_benign_permissions_pass() {
        let content = r#"{"permissions": ["storage", "alarms", "activeTab"]}"#;
        assert!(analyze(content, "manifest.json").is_empty());
    }

    #[test]
    fn test_content_script_all_urls() {
        let content = r#"{"content_scripts": [{"matches": ["<all_urls>"], "js": ["inject.js"]}]}"#;
        let findings = analyze(content, "manifest.json");
        assert_eq!(ids(&findings), vec![CONTENT_SCRIPT_ALL_URLS]);
    }

    #[test]
    fn test_scoped_content_script_passes() {
        let content =
            r#"{"content_scripts": [{"matches": ["https://example.com/*"], "js": ["a.js"]}]}"#;
        assert!(analyze(content, "manifest.json").is_empty());
    }

    #[test]
    fn test_unsafe_csp_string() {
        let content = r#"{"content_security_policy": "script-src 'self' 'unsafe-eval'"}"#;
        let findings = analyze(content, "manifest.json");
        assert_eq!(ids(&findings), vec![UNSAFE_CSP]);
    }

    #[test]
    fn test_unsafe_csp_mv3_object() {
        let content = r#"{"content_security_policy": {"extension_pages": "script-src 'self' http://cdn.example.com"}}"#;
        let findings = analyze(content, "manifest.json");
        assert_eq!(ids(&findings), vec![UNSAFE_CSP]);
    }

    #[test]
    fn test_invalid_json_yields_nothing() {
        assert!(analyze("not json at all", "manifest.json").is_empty());
    }

    #[test]
    fn test_source_is_heuristic() {
        let content = r#"{"permissions": ["debugger"]}"#;
        let findings = analyze(content, "manifest.json");
        assert!(findings.iter().all(|f| f.source == Source::Heuristic));
    }
}
