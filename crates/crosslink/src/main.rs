use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{ArgAction, Parser};
use crosslink_core::annotate::{FileOutcome, FileReport, RunMode, RunPlan, RunReport, annotate};
use crosslink_core::config::Settings;
use crosslink_core::runtime::{PathOverrides, ResolutionContext, ResolvedPaths, resolve_runtime};
use tracing_subscriber::EnvFilter;

const FATAL_EXIT_CODE: u8 = 2;

#[derive(Debug, Parser)]
#[command(
    name = "crosslink",
    version,
    about = "Insert topic-based internal links into site page files"
)]
struct Cli {
    #[arg(long, help = "Report what would change without writing any file")]
    dry_run: bool,
    #[arg(long, value_name = "PATH")]
    project_root: Option<PathBuf>,
    #[arg(long, value_name = "PATH", help = "Directory holding the page tree (default: app)")]
    content_dir: Option<PathBuf>,
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
    #[arg(long, help = "Print the run report as JSON")]
    json: bool,
    #[arg(long, help = "Print a unified diff for every updated page")]
    diff: bool,
    #[arg(long, help = "Print resolved runtime diagnostics")]
    diagnostics: bool,
    #[arg(short, long, action = ArgAction::Count, help = "Increase log verbosity (-v, -vv)")]
    verbose: u8,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(&cli) {
        Ok(code) => ExitCode::from(code),
        Err(error) => {
            eprintln!("error: {error:#}");
            ExitCode::from(FATAL_EXIT_CODE)
        }
    }
}

/// Log level for a `-v` count. `CROSSLINK_LOG`, when set, overrides it.
const fn verbosity_to_directive(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
}

fn init_logging(verbosity: u8) {
    let filter = EnvFilter::try_from_env("CROSSLINK_LOG")
        .unwrap_or_else(|_| EnvFilter::new(verbosity_to_directive(verbosity)));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(verbosity >= 2)
        .with_writer(std::io::stderr)
        .try_init();
}

fn run(cli: &Cli) -> Result<u8> {
    let (paths, settings) = resolve_settings(cli)?;
    let mode = if cli.dry_run {
        RunMode::DryRun
    } else {
        RunMode::Live
    };

    if !cli.json {
        println!("{}", banner(mode));
        if cli.diagnostics {
            println!("[diagnostics]\n{}\n", paths.diagnostics());
        }
    }

    let report = annotate(&RunPlan {
        content_dir: &paths.content_dir,
        mode,
        settings: &settings,
        include_diffs: cli.diff,
    })?;

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report, &settings);
    }
    Ok(report.exit_code())
}

fn resolve_settings(cli: &Cli) -> Result<(ResolvedPaths, Settings)> {
    dotenvy::dotenv().ok();

    let context = ResolutionContext::from_process()?;
    let overrides = PathOverrides {
        project_root: cli.project_root.clone(),
        content_dir: cli.content_dir.clone(),
        config: cli.config.clone(),
    };

    let initial = resolve_runtime(&context, &overrides)?;
    let project_env = initial.paths.project_root.join(".env");
    let runtime = if project_env.exists() {
        let _ = dotenvy::from_path_override(&project_env);
        resolve_runtime(&context, &overrides)?
    } else {
        initial
    };

    let settings = Settings::from_config(&runtime.config)?;
    Ok((runtime.paths, settings))
}

fn banner(mode: RunMode) -> &'static str {
    match mode {
        RunMode::DryRun => "crosslink: DRY RUN (no files will be modified)",
        RunMode::Live => "crosslink: LIVE (files will be modified)",
    }
}

fn print_report(report: &RunReport, settings: &Settings) {
    println!("content_dir: {}", report.content_dir);
    println!();

    for file in &report.files {
        if let Some((path, reason)) = error_of(file) {
            println!("✗ {path}: {reason}");
            continue;
        }
        if let Some(topic) = topic_of(file) {
            println!("✓ {} [{topic}]", file.relative_path);
            if let Some(diff) = &file.diff {
                print!("{diff}");
            }
        }
    }

    let stats = &report.stats;
    println!();
    println!("Summary");
    println!("  Total files: {}", stats.total);
    match report.mode {
        RunMode::DryRun => println!("  Updated (would be): {}", stats.updated),
        RunMode::Live => println!("  Updated: {}", stats.updated),
    }
    println!("  Already has links: {}", stats.already_has_links);
    println!("  Special pages: {}", stats.special);
    println!("  No export found: {}", stats.no_export);
    println!("  Errors: {}", stats.errors);
    println!("  By topic:");
    for topic in settings.catalog.topic_names() {
        let count = stats.by_topic.get(topic).copied().unwrap_or(0);
        println!("    {topic}: {count}");
    }

    if report.has_errors() {
        println!();
        println!("Errors:");
        for (path, reason) in report.errors() {
            println!("  {path}: {reason}");
        }
    }
    if report.mode == RunMode::DryRun && stats.updated > 0 {
        println!();
        println!(
            "Run without --dry-run to update {} {}.",
            stats.updated,
            if stats.updated == 1 { "file" } else { "files" }
        );
    }
}

fn error_of(file: &FileReport) -> Option<(&str, &str)> {
    match &file.outcome {
        FileOutcome::Error { reason } => Some((file.relative_path.as_str(), reason.as_str())),
        _ => None,
    }
}

fn topic_of(file: &FileReport) -> Option<&str> {
    match &file.outcome {
        FileOutcome::Updated { topic, .. } => Some(topic.as_str()),
        _ => None,
    }
}
