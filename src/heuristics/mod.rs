//! Behavioral analyzers that run alongside signature matching. All
//! findings carry `source = heuristic` and fixed ids, independent of the
//! YAML corpus.

pub mod code;
pub mod entropy;
pub mod manifest;
pub mod supply_chain;

use crate::content::ContentItem;
use crate::filetype::FileType;
use crate::rules::types::Finding;
use std::path::Path;

/// Run every analyzer applicable to the item.
pub fn analyze(item: &ContentItem) -> Vec<Finding> {
    if item.file_type == FileType::Binary {
        return Vec::new();
    }

    let basename = Path::new(&item.virtual_path)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default()
        .to_lowercase();

    let mut findings = entropy::analyze(&item.content, &item.virtual_path);

    if basename == "package.json" {
        findings.extend(supply_chain::analyze(&item.content, &item.virtual_path));
    }
    if basename == "manifest.json" {
        findings.extend(manifest::analyze(&item.content, &item.virtual_path));
    }
    if matches!(
        item.file_type,
        FileType::Javascript | FileType::Typescript | FileType::Python | FileType::Bash
    ) {
        findings.extend(code::analyze(
            &item.content,
            &item.virtual_path,
            item.file_type,
        ));
    }

    findings
}
