pub mod compiler;
pub mod engine;
pub mod matcher;
pub mod types;

pub use compiler::{RuleCompiler, RuleError, RuleSet, DEFAULT_RULES};
pub use engine::IndexedRuleEngine;
pub use matcher::{LineIndex, SignatureMatcher, MAX_FINDINGS_PER_RULE};
pub use types::{CompiledRule, Finding, Severity, Source, Summary};
