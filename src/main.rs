use clap::Parser;
use colored::Colorize;
use skillscan::cli::{Cli, OutputFormat};
use skillscan::mcp::McpOptions;
use skillscan::progress::ProgressSink;
use skillscan::reporter::{
    json::JsonReporter, progress, sarif::SarifReporter, terminal::TerminalReporter, Reporter,
};
use skillscan::store::ResultStore;
use skillscan::watch::FileWatcher;
use skillscan::{exit_code, Orchestrator, ScanError, ScanOptions, ScanResult, Target};
use std::io::IsTerminal;
use std::process::ExitCode;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if cli.history {
        return run_history(&cli);
    }
    if cli.diff.is_some() {
        return run_diff(&cli);
    }

    let targets = build_targets(&cli);
    if targets.is_empty() {
        eprintln!("{} No targets found", "Error:".red());
        return ExitCode::from(1);
    }

    let options = scan_options(&cli);
    let fail_on = options.fail_on;
    let orchestrator = match Orchestrator::new(options) {
        Ok(orchestrator) => orchestrator,
        Err(e) => {
            eprintln!("{} {}", "Error:".red(), e);
            return ExitCode::from(1);
        }
    };

    if cli.watch {
        return run_watch(&cli, &orchestrator, &targets);
    }

    let result = match run_once(&cli, &orchestrator, &targets) {
        Ok(result) => result,
        Err(e) => {
            eprintln!("{} {}", "Error:".red(), e);
            return ExitCode::from(1);
        }
    };

    if cli.fix || cli.fix_dry_run {
        match skillscan::apply_fixes(&result.findings, cli.fix_dry_run) {
            Ok(outcome) => eprintln!(
                "Fixed {} line(s) across {} file(s)",
                outcome.edited_lines, outcome.edited_files
            ),
            Err(e) => eprintln!("{} {}", "Fix failed:".red(), e),
        }
    }

    if cli.save {
        save_to_history(&cli, &result);
    }

    println!("{}", render_report(&cli, &result));
    ExitCode::from(exit_code(&result, fail_on))
}

fn run_once(
    cli: &Cli,
    orchestrator: &Orchestrator,
    targets: &[Target],
) -> Result<ScanResult, ScanError> {
    let show_progress = cli.format == OutputFormat::Terminal && std::io::stderr().is_terminal();
    if !show_progress {
        return orchestrator.run(targets, &ProgressSink::disabled());
    }

    let (sink, rx) = ProgressSink::channel();
    let renderer = std::thread::spawn(move || progress::render(rx, true));
    let result = orchestrator.run(targets, &sink);
    drop(sink);
    let _ = renderer.join();
    result
}

fn run_watch(cli: &Cli, orchestrator: &Orchestrator, targets: &[Target]) -> ExitCode {
    let mut watcher = match FileWatcher::new() {
        Ok(watcher) => watcher,
        Err(e) => {
            eprintln!("{} Failed to start watcher: {}", "Error:".red(), e);
            return ExitCode::from(1);
        }
    };
    for target in targets {
        if target.kind != skillscan::TargetKind::Mcp {
            if let Err(e) = watcher.watch(std::path::Path::new(&target.path)) {
                eprintln!("{} Cannot watch {}: {}", "Error:".red(), target.path, e);
            }
        }
    }

    loop {
        match run_once(cli, orchestrator, targets) {
            Ok(result) => println!("{}", render_report(cli, &result)),
            Err(e) => eprintln!("{} {}", "Error:".red(), e),
        }
        eprintln!("{}", "Watching for changes…".dimmed());
        if !watcher.wait_for_change() {
            return ExitCode::SUCCESS;
        }
    }
}

fn run_history(cli: &Cli) -> ExitCode {
    let store = match history_store() {
        Some(store) => store,
        None => return ExitCode::from(1),
    };
    for id in store.list().into_iter().take(cli.max_history) {
        println!("{}", id);
    }
    ExitCode::SUCCESS
}

fn run_diff(cli: &Cli) -> ExitCode {
    let ids = cli.diff.as_ref().expect("diff ids checked by caller");
    let store = match history_store() {
        Some(store) => store,
        None => return ExitCode::from(1),
    };
    match store.compare(&ids[0], &ids[1]) {
        Ok(diff) => {
            match serde_json::to_string_pretty(&diff) {
                Ok(json) => println!("{}", json),
                Err(e) => {
                    eprintln!("{} {}", "Error:".red(), e);
                    return ExitCode::from(1);
                }
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("{} {}", "Error:".red(), e);
            ExitCode::from(1)
        }
    }
}

fn history_store() -> Option<ResultStore> {
    match ResultStore::default_dir() {
        Some(dir) => Some(ResultStore::new(dir)),
        None => {
            eprintln!("{} No data directory available", "Error:".red());
            None
        }
    }
}

fn save_to_history(cli: &Cli, result: &ScanResult) {
    let store = match history_store() {
        Some(store) => store,
        None => return,
    };
    match store.save(result) {
        Ok(id) => {
            eprintln!("Saved scan {}", id);
            if let Err(e) = store.enforce_retention(cli.max_history) {
                eprintln!("{} {}", "Retention failed:".red(), e);
            }
        }
        Err(e) => eprintln!("{} {}", "Save failed:".red(), e),
    }
}

fn build_targets(cli: &Cli) -> Vec<Target> {
    let mut targets = Vec::new();
    for path in &cli.paths {
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("target")
            .to_string();
        targets.push(Target::local(
            cli.kind.into(),
            name,
            path.display().to_string(),
        ));
    }
    for url in &cli.mcp_urls {
        targets.push(Target::mcp(url.clone()));
    }
    targets
}

fn scan_options(cli: &Cli) -> ScanOptions {
    let mut mcp = McpOptions {
        read_resources: cli.read_resources,
        bearer_token: cli.bearer_token.clone(),
        timeout: Duration::from_secs(cli.timeout),
        ..Default::default()
    };
    if cli.read_resources {
        mcp.categories.push(skillscan::McpCategory::Resources);
    }

    ScanOptions {
        use_behavioral: !cli.no_behavioral,
        use_cache: !cli.no_cache,
        rules_file: cli.rules.clone(),
        score_confidence: cli.confidence || cli.min_confidence.is_some(),
        min_confidence: cli.min_confidence,
        fail_on: cli.fail_on,
        mcp,
        ..Default::default()
    }
}

fn render_report(cli: &Cli, result: &ScanResult) -> String {
    match cli.format {
        OutputFormat::Terminal => TerminalReporter::new(cli.verbose).report(result),
        OutputFormat::Json => JsonReporter::new().report(result),
        OutputFormat::Sarif => SarifReporter::new().report(result),
    }
}
