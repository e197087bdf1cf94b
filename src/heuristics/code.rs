//! Cross-cutting code-smell detectors for script content. Independent of
//! the YAML corpus; each detector carries its own fixed id.

use crate::filetype::FileType;
use crate::rules::matcher::LineIndex;
use crate::rules::types::{Finding, Severity, Source};
use regex::Regex;
use std::sync::LazyLock;

const MAX_PER_DETECTOR: usize = 20;

struct Detector {
    id: &'static str,
    severity: Severity,
    applies: &'static [FileType],
    pattern: Regex,
    message: &'static str,
    remediation: &'static str,
}

const SCRIPT_TYPES: &[FileType] = &[
    FileType::Javascript,
    FileType::Typescript,
    FileType::Python,
    FileType::Bash,
];

const JS_TYPES: &[FileType] = &[FileType::Javascript, FileType::Typescript];
const PY_TYPES: &[FileType] = &[FileType::Python];
const BASH_TYPES: &[FileType] = &[FileType::Bash];

static DETECTORS: LazyLock<Vec<Detector>> = LazyLock::new(|| {
    vec![
        Detector {
            id: "HEURISTIC_DYNAMIC_EVAL",
            severity: Severity::High,
            applies: SCRIPT_TYPES,
            pattern: Regex::new(r"\beval\s*\(").expect("eval pattern"),
            message: "Dynamic evaluation of constructed code",
            remediation: "Replace eval with explicit logic over parsed data",
        },
        Detector {
            id: "HEURISTIC_DYNAMIC_EVAL",
            severity: Severity::High,
            applies: JS_TYPES,
            pattern: Regex::new(r"\bnew\s+Function\s*\(").expect("function pattern"),
            message: "Code construction via the Function constructor",
            remediation: "Replace constructed functions with static definitions",
        },
        Detector {
            id: "HEURISTIC_DYNAMIC_EVAL",
            severity: Severity::High,
            applies: BASH_TYPES,
            pattern: Regex::new(r#"\beval\s+["$]"#).expect("bash eval pattern"),
            message: "Shell eval over variable content",
            remediation: "Avoid eval; invoke commands with explicit arguments",
        },
        Detector {
            id: "HEURISTIC_DYNAMIC_IMPORT",
            severity: Severity::Medium,
            applies: PY_TYPES,
            pattern: Regex::new(r"__import__\s*\(|importlib\.import_module\s*\(")
                .expect("py import pattern"),
            message: "Module loaded dynamically by name",
            remediation: "Import modules statically so they can be audited",
        },
        Detector {
            id: "HEURISTIC_DYNAMIC_IMPORT",
            severity: Severity::Medium,
            applies: JS_TYPES,
            pattern: Regex::new(r"require\s*\(\s*[A-Za-z_$][\w$]*\s*\)")
                .expect("js require pattern"),
            message: "require() with a computed module name",
            remediation: "Require modules by string literal",
        },
        Detector {
            id: "HEURISTIC_SHELL_EXEC",
            severity: Severity::High,
            applies: JS_TYPES,
            pattern: Regex::new(r#"child_process|\bexecSync\s*\(|\bspawnSync\s*\("#)
                .expect("js exec pattern"),
            message: "Child-process execution from extension or skill code",
            remediation: "Confirm the command surface; remove shell access if unneeded",
        },
        Detector {
            id: "HEURISTIC_SHELL_EXEC",
            severity: Severity::High,
            applies: PY_TYPES,
            pattern: Regex::new(r"os\.system\s*\(|subprocess\.(run|call|check_output|Popen)")
                .expect("py exec pattern"),
            message: "Subprocess execution from scanned code",
            remediation: "Confirm the command surface; prefer library calls over shells",
        },
        Detector {
            id: "HEURISTIC_SHELL_TRUE",
            severity: Severity::High,
            applies: PY_TYPES,
            pattern: Regex::new(r"shell\s*=\s*True").expect("shell true pattern"),
            message: "Subprocess invoked through the shell",
            remediation: "Pass an argument vector instead of shell=True",
        },
        Detector {
            id: "HEURISTIC_COMMAND_CONCAT",
            severity: Severity::High,
            applies: SCRIPT_TYPES,
            pattern: Regex::new(r#"(system|exec|execSync|popen|spawn)\s*\([^)]*["'][^)]*\+"#)
                .expect("concat pattern"),
            message: "Command line assembled by string concatenation",
            remediation: "Build commands from fixed argument lists, not concatenation",
        },
    ]
});

pub fn analyze(content: &str, virtual_path: &str, file_type: FileType) -> Vec<Finding> {
    let index = LineIndex::new(content);
    let mut findings = Vec::new();

    for detector in DETECTORS.iter() {
        if !detector.applies.contains(&file_type) {
            continue;
        }
        for (count, m) in detector.pattern.find_iter(content).enumerate() {
            if count >= MAX_PER_DETECTOR {
                break;
            }
            let (line, column) = index.locate(m.start());
            findings.push(Finding {
                rule_id: detector.id.to_string(),
                severity: detector.severity,
                category: Some("code-smell".to_string()),
                source: Source::Heuristic,
                message: detector.message.to_string(),
                remediation: Some(detector.remediation.to_string()),
                file: virtual_path.to_string(),
                line: Some(line),
                column: Some(column),
                confidence: None,
                snippet: m.as_str().to_string(),
                in_comment: index.in_comment(content, m.start()),
                entropy: None,
            });
        }
    }

    findings
}
