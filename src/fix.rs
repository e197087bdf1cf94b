//! Narrow fix mode: comment out lines flagged by signature findings.
//!
//! Only file types with a sane line-comment form are touched; JSON has
//! none and is excluded. Heuristic findings are never auto-fixed, and a
//! line is edited at most once no matter how many findings land on it.

use crate::error::{Result, ScanError};
use crate::rules::types::{Finding, Source};
use rustc_hash::FxHashMap;
use std::collections::BTreeSet;
use std::fs;
use std::path::Path;
use tracing::info;

#[derive(Debug, Default)]
pub struct FixOutcome {
    pub edited_files: usize,
    pub edited_lines: usize,
    pub skipped: usize,
}

enum CommentStyle {
    /// Prefix the line, e.g. `# ` or `// `.
    Prefix(&'static str),
    /// Wrap the line, for markdown.
    Wrap(&'static str, &'static str),
}

fn comment_style(path: &str) -> Option<CommentStyle> {
    let ext = Path::new(path)
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or_default()
        .to_lowercase();
    match ext.as_str() {
        "sh" | "bash" | "py" | "yaml" | "yml" | "toml" | "ini" | "cfg" | "conf" | "txt" => {
            Some(CommentStyle::Prefix("# "))
        }
        "js" | "mjs" | "cjs" | "jsx" | "ts" | "tsx" => Some(CommentStyle::Prefix("// ")),
        "md" | "mdx" | "rst" => Some(CommentStyle::Wrap("<!-- ", " -->")),
        _ => None,
    }
}

/// Comment out every line carrying a signature finding. With `dry_run`
/// the files are left untouched and only the outcome is computed.
pub fn apply_fixes(findings: &[Finding], dry_run: bool) -> Result<FixOutcome> {
    // One edit per line: collapse findings to (file → line set) first.
    let mut by_file: FxHashMap<&str, BTreeSet<usize>> = FxHashMap::default();
    let mut outcome = FixOutcome::default();

    for finding in findings {
        if finding.source != Source::Signature {
            outcome.skipped += 1;
            continue;
        }
        let line = match finding.line {
            Some(line) => line,
            None => {
                outcome.skipped += 1;
                continue;
            }
        };
        if comment_style(&finding.file).is_none() {
            outcome.skipped += 1;
            continue;
        }
        by_file.entry(&finding.file).or_default().insert(line);
    }

    let mut files: Vec<_> = by_file.into_iter().collect();
    files.sort_by(|a, b| a.0.cmp(b.0));

    for (file, lines) in files {
        let style = comment_style(file).expect("style checked above");
        let content = fs::read_to_string(file).map_err(|e| ScanError::Io {
            path: file.to_string(),
            source: e,
        })?;

        let mut edited = 0;
        let fixed: Vec<String> = content
            .lines()
            .enumerate()
            .map(|(idx, line)| {
                if lines.contains(&(idx + 1)) && !line.trim().is_empty() {
                    edited += 1;
                    match &style {
                        CommentStyle::Prefix(prefix) => format!("{}{}", prefix, line),
                        CommentStyle::Wrap(open, close) => format!("{}{}{}", open, line, close),
                    }
                } else {
                    line.to_string()
                }
            })
            .collect();

        if edited == 0 {
            continue;
        }

        if !dry_run {
            let mut output = fixed.join("\n");
            if content.ends_with('\n') {
                output.push('\n');
            }
            fs::write(file, output).map_err(|e| ScanError::Io {
                path: file.to_string(),
                source: e,
            })?;
        }
        info!(file, lines = edited, dry_run, "Commented out flagged lines");
        outcome.edited_files += 1;
        outcome.edited_lines += edited;
    }

    Ok(outcome)
}
