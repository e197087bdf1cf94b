use crate::content::TargetKind;
use crate::rules::Severity;
use clap::{Parser, ValueEnum};
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, ValueEnum, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Terminal,
    Json,
    Sarif,
}

#[derive(Debug, Clone, Copy, ValueEnum, Default, PartialEq, Eq)]
pub enum TargetKindArg {
    Skill,
    Extension,
    IdeExtension,
    #[default]
    Path,
}

impl From<TargetKindArg> for TargetKind {
    fn from(kind: TargetKindArg) -> Self {
        match kind {
            TargetKindArg::Skill => TargetKind::Skill,
            TargetKindArg::Extension => TargetKind::Extension,
            TargetKindArg::IdeExtension => TargetKind::IdeExtension,
            TargetKindArg::Path => TargetKind::Path,
        }
    }
}

fn parse_severity(value: &str) -> Result<Severity, String> {
    Severity::parse(value)
        .ok_or_else(|| format!("invalid severity '{}', expected low|medium|high|critical", value))
}

#[derive(Debug, Clone, Parser)]
#[command(
    name = "skillscan",
    version,
    about = "Static security scanner for agent skills, extensions, and MCP servers"
)]
pub struct Cli {
    /// Local directories or files to scan.
    pub paths: Vec<PathBuf>,

    /// How to tag local targets in reports.
    #[arg(long, value_enum, default_value_t = TargetKindArg::Path)]
    pub kind: TargetKindArg,

    /// Remote MCP server URLs to scan (repeatable).
    #[arg(long = "mcp-url")]
    pub mcp_urls: Vec<String>,

    #[arg(short, long, value_enum, default_value_t = OutputFormat::Terminal)]
    pub format: OutputFormat,

    /// Extra YAML rule corpus merged after the built-in rules.
    #[arg(short, long)]
    pub rules: Option<PathBuf>,

    /// Exit with code 2 when a finding meets this severity.
    #[arg(long, value_parser = parse_severity)]
    pub fail_on: Option<Severity>,

    /// Assign confidence scores to findings.
    #[arg(long)]
    pub confidence: bool,

    /// Drop findings scored below this threshold (implies --confidence).
    #[arg(long)]
    pub min_confidence: Option<f64>,

    /// Disable the findings cache.
    #[arg(long)]
    pub no_cache: bool,

    /// Disable the behavioral analyzers.
    #[arg(long)]
    pub no_behavioral: bool,

    /// Comment out lines flagged by signature findings.
    #[arg(long)]
    pub fix: bool,

    /// Compute fixes without touching files.
    #[arg(long)]
    pub fix_dry_run: bool,

    /// Fetch MCP resource bodies (subject to MIME and size limits).
    #[arg(long)]
    pub read_resources: bool,

    /// Bearer token for MCP requests.
    #[arg(long)]
    pub bearer_token: Option<String>,

    /// Per-request MCP timeout in seconds.
    #[arg(long, default_value_t = 30)]
    pub timeout: u64,

    /// Show snippets and remediation in terminal output.
    #[arg(short, long)]
    pub verbose: bool,

    /// Re-scan when watched paths change.
    #[arg(long)]
    pub watch: bool,

    /// Persist this scan to the history store.
    #[arg(long)]
    pub save: bool,

    /// List stored scan ids and exit.
    #[arg(long)]
    pub history: bool,

    /// Compare two stored scans by id and exit.
    #[arg(long, num_args = 2, value_names = ["BASELINE", "CURRENT"])]
    pub diff: Option<Vec<String>>,

    /// Retention ceiling for stored scans.
    #[arg(long, default_value_t = 50)]
    pub max_history: usize,
}

impl Default for Cli {
    fn default() -> Self {
        Self {
            paths: Vec::new(),
            kind: TargetKindArg::Path,
            mcp_urls: Vec::new(),
            format: OutputFormat::Terminal,
            rules: None,
            fail_on: None,
            confidence: false,
            min_confidence: None,
            no_cache: false,
            no_behavioral: false,
            fix: false,
            fix_dry_run: false,
            read_resources: false,
            bearer_token: None,
            timeout: 30,
            verbose: false,
            watch: false,
            save: false,
            history: false,
            diff: None,
            max_history: 50,
        }
    }
}
