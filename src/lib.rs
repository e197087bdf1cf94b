pub mod cache;
pub mod cli;
pub mod content;
pub mod error;
pub mod filetype;
pub mod fix;
pub mod heuristics;
pub mod mcp;
pub mod meta;
pub mod orchestrator;
pub mod progress;
pub mod reporter;
pub mod rules;
pub mod scheduler;
pub mod store;
pub mod watch;

pub use cache::{CacheEntry, ScanCache, DEFAULT_TTL_SECS};
pub use cli::{Cli, OutputFormat};
pub use content::{ContentItem, ContentPlan, Target, TargetKind, MAX_FILE_BYTES};
pub use error::{Result, ScanError};
pub use filetype::FileType;
pub use fix::{apply_fixes, FixOutcome};
pub use mcp::{McpCategory, McpClient, McpError, McpOptions};
pub use orchestrator::{exit_code, Orchestrator, ScanOptions, ScanResult};
pub use progress::{ProgressEvent, ProgressSink};
pub use reporter::{
    json::JsonReporter, sarif::SarifReporter, terminal::TerminalReporter, Reporter,
};
pub use rules::{
    CompiledRule, Finding, IndexedRuleEngine, RuleCompiler, RuleError, RuleSet, Severity,
    SignatureMatcher, Source, Summary,
};
pub use scheduler::{worker_count, ScanStats, Scheduler};
pub use store::{compare_findings, ResultStore, ScanComparison, StoredScan};
pub use watch::FileWatcher;
