//! File-type index over a compiled rule set.
//!
//! Lookup for a type returns the rules naming that type followed by the
//! rules declared for `any`, in corpus order. The index is built once and
//! shared read-only across workers.

use crate::filetype::FileType;
use crate::rules::compiler::RuleSet;
use crate::rules::types::CompiledRule;
use rustc_hash::FxHashMap;
use std::sync::Arc;

pub struct IndexedRuleEngine {
    rules: Arc<RuleSet>,
    by_type: FxHashMap<FileType, Vec<usize>>,
    any: Vec<usize>,
}

impl IndexedRuleEngine {
    pub fn new(rules: Arc<RuleSet>) -> Self {
        let mut by_type: FxHashMap<FileType, Vec<usize>> = FxHashMap::default();
        let mut any = Vec::new();

        for (idx, rule) in rules.rules.iter().enumerate() {
            if rule.any_type {
                any.push(idx);
                continue;
            }
            for ft in &rule.file_types {
                by_type.entry(*ft).or_default().push(idx);
            }
        }

        Self {
            rules,
            by_type,
            any,
        }
    }

    /// Rules applicable to a file type, in stable corpus order.
    pub fn rules_for(&self, file_type: FileType) -> Vec<&CompiledRule> {
        let typed = self.by_type.get(&file_type).map(Vec::as_slice).unwrap_or(&[]);
        typed
            .iter()
            .chain(self.any.iter())
            .map(|&idx| &self.rules.rules[idx])
            .collect()
    }

    pub fn rule_set(&self) -> &RuleSet {
        &self.rules
    }

    pub fn rule_version(&self) -> &str {
        &self.rules.version
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::compiler::RuleCompiler;

    fn engine(yaml: &str) -> IndexedRuleEngine {
        let set = RuleCompiler::compile_sources(&[yaml]).unwrap();
        IndexedRuleEngine::new(Arc::new(set))
    }

    const CORPUS: &str = r#"
- id: BASH-ONLY
  category: c
  severity: high
  patterns: ['x']
  file_types: [bash]
- id: MULTI
  category: c
  severity: low
  patterns: ['x']
  file_types: [markdown, json]
- id: ANY
  category: c
  severity: low
  patterns: ['x']
  file_types: [any]
"#;

    #[test]
    fn test_lookup_by_type() {
        let engine = engine(CORPUS);
        let bash = engine.rules_for(FileType::Bash);
        let ids: Vec<_> = bash.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["BASH-ONLY", "ANY"]);
    }

    #[test]
    fn test_rule_indexed_under_every_named_type() {
        let engine = engine(CORPUS);
        for ft in [FileType::Markdown, FileType::Json] {
            let ids: Vec<_> = engine
                .rules_for(ft)
                .iter()
                .map(|r| r.id.as_str())
                .collect();
            assert!(ids.contains(&"MULTI"));
        }
    }

    #[test]
    fn test_any_bucket_applies_everywhere() {
        let engine = engine(CORPUS);
        for ft in FileType::all() {
            let ids: Vec<_> = engine
                .rules_for(ft)
                .iter()
                .map(|r| r.id.as_str())
                .collect();
            assert!(ids.contains(&"ANY"), "missing ANY for {}", ft);
        }
    }

    #[test]
    fn test_unindexed_type_returns_only_any() {
        let engine = engine(CORPUS);
        let binary = engine.rules_for(FileType::Binary);
        let ids: Vec<_> = binary.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["ANY"]);
    }

    #[test]
    fn test_lookup_stable_across_calls() {
        let engine = engine(CORPUS);
        let first: Vec<_> = engine
            .rules_for(FileType::Markdown)
            .iter()
            .map(|r| r.id.clone())
            .collect();
        let second: Vec<_> = engine
            .rules_for(FileType::Markdown)
            .iter()
            .map(|r| r.id.clone())
            .collect();
        assert_eq!(first, second);
    }
}
