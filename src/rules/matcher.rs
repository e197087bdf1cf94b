//! Applies compiled signature rules to content.

use crate::filetype::FileType;
use crate::rules::engine::IndexedRuleEngine;
use crate::rules::types::{CompiledRule, Finding};
use std::sync::atomic::{AtomicUsize, Ordering};

/// Per-file, per-rule ceiling on emitted findings. Further matches for
/// the same rule in the same file are dropped.
pub const MAX_FINDINGS_PER_RULE: usize = 20;

pub struct SignatureMatcher {
    engine: IndexedRuleEngine,
    files_matched: AtomicUsize,
}

impl SignatureMatcher {
    pub fn new(engine: IndexedRuleEngine) -> Self {
        Self {
            engine,
            files_matched: AtomicUsize::new(0),
        }
    }

    pub fn engine(&self) -> &IndexedRuleEngine {
        &self.engine
    }

    pub fn rule_version(&self) -> &str {
        self.engine.rule_version()
    }

    /// Number of contents this matcher has actually run regexes over.
    /// Cache hits bypass the matcher entirely, so the counter lets tests
    /// verify that cached files cost no regex work.
    pub fn files_matched(&self) -> usize {
        self.files_matched.load(Ordering::Relaxed)
    }

    /// Match all applicable rules against one content string. Findings
    /// are ordered by (rule order, match offset) and therefore
    /// deterministic for a given input.
    pub fn match_content(
        &self,
        content: &str,
        virtual_path: &str,
        file_type: FileType,
    ) -> Vec<Finding> {
        self.files_matched.fetch_add(1, Ordering::Relaxed);

        let index = LineIndex::new(content);
        let mut findings = Vec::new();

        for rule in self.engine.rules_for(file_type) {
            self.match_rule(rule, content, virtual_path, &index, &mut findings);
        }

        findings
    }

    fn match_rule(
        &self,
        rule: &CompiledRule,
        content: &str,
        virtual_path: &str,
        index: &LineIndex,
        findings: &mut Vec<Finding>,
    ) {
        let mut emitted = 0;

        'patterns: for pattern in &rule.patterns {
            for m in pattern.find_iter(content) {
                // Zero-width matches carry no evidence; find_iter already
                // advances past them so just skip.
                if m.as_str().is_empty() {
                    continue;
                }
                if rule.exclude.iter().any(|e| e.is_match(m.as_str())) {
                    continue;
                }

                let (line, column) = index.locate(m.start());
                let mut finding = Finding::from_rule(rule, virtual_path, line, column);
                finding.snippet = truncate(m.as_str(), 200);
                finding.in_comment = index.in_comment(content, m.start());
                findings.push(finding);

                emitted += 1;
                if emitted >= MAX_FINDINGS_PER_RULE {
                    break 'patterns;
                }
            }
        }
    }
}

/// Byte offsets of line starts, for offset → (line, column) resolution
/// via binary search. Lines are 1-indexed.
pub struct LineIndex {
    starts: Vec<usize>,
    block_comments: Vec<(usize, usize)>,
}

impl LineIndex {
    pub fn new(content: &str) -> Self {
        let mut starts = vec![0];
        for (i, b) in content.bytes().enumerate() {
            if b == b'\n' {
                starts.push(i + 1);
            }
        }

        Self {
            starts,
            block_comments: block_comment_spans(content),
        }
    }

    pub fn line_count(&self) -> usize {
        self.starts.len()
    }

    /// 1-indexed (line, column) for a byte offset.
    pub fn locate(&self, offset: usize) -> (usize, usize) {
        let line = self.starts.partition_point(|&s| s <= offset);
        let start = self.starts[line - 1];
        (line, offset - start + 1)
    }

    /// True when the offset sits on a line whose first token marks a
    /// comment, or inside a `/* ... */` block.
    pub fn in_comment(&self, content: &str, offset: usize) -> bool {
        if self
            .block_comments
            .iter()
            .any(|&(start, end)| offset >= start && offset < end)
        {
            return true;
        }

        let (line, _) = self.locate(offset);
        let start = self.starts[line - 1];
        let end = self
            .starts
            .get(line)
            .map(|&s| s - 1)
            .unwrap_or(content.len());
        let trimmed = content[start..end].trim_start();
        trimmed.starts_with("//") || trimmed.starts_with('#') || trimmed.starts_with('*')
    }
}

fn block_comment_spans(content: &str) -> Vec<(usize, usize)> {
    let mut spans = Vec::new();
    let mut cursor = 0;
    while let Some(rel) = content[cursor..].find("/*") {
        let start = cursor + rel;
        match content[start + 2..].find("*/") {
            Some(rel_end) => {
                let end = start + 2 + rel_end + 2;
                spans.push((start, end));
                cursor = end;
            }
            None => {
                spans.push((start, content.len()));
                break;
            }
        }
    }
    spans
}

fn truncate(text: &str, max: usize) -> String {
    if text.len() <= max {
        return text.to_string();
    }
    let mut end = max;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    text[..end].to_string()
}
