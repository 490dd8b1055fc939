//! Top-level CLI definition and dispatch.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use colored::{Colorize, control};
use serde_json::json;

use scene_sentinel::core::config::Config;
use scene_sentinel::core::errors::Result;
use scene_sentinel::defender::{Defender, DefenderMode};
use scene_sentinel::logger::activity::{ActivityLoggerHandle, spawn_logger};
use scene_sentinel::logger::jsonl::JsonlConfig;
use scene_sentinel::scanner::BatchScanner;
use scene_sentinel::scene::SceneApi;
use scene_sentinel::scene::headless::{HeadlessScene, SceneDirs};
use scene_sentinel::signature::catalog::{SignatureCatalog, SignatureScope};
use scene_sentinel::signature::matcher::{self, FileAction};

/// Scene Sentinel — malware detection and remediation for scene files.
#[derive(Debug, Parser)]
#[command(
    name = "ssn",
    author,
    version,
    about = "Scene Sentinel - scene file malware defense",
    long_about = None,
    arg_required_else_help = true
)]
pub struct Cli {
    /// Override config file path.
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,
    /// Force JSON output mode.
    #[arg(long, global = true)]
    json: bool,
    /// Disable colored output.
    #[arg(long, global = true)]
    no_color: bool,
    /// Subcommand to execute.
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Subcommand)]
enum Command {
    /// List the built-in signature catalog.
    Signatures,
    /// Check files for signature matches without modifying them.
    Check(CheckArgs),
    /// Strip signature matches from files in place.
    Sanitize(SanitizeArgs),
    /// Batch-scan scene files, fixing what is found.
    Scan(ScanArgs),
    /// Collect and report issues for one scene file, read-only.
    Report(ReportArgs),
}

#[derive(Debug, Clone, Args)]
struct CheckArgs {
    /// Files to check.
    #[arg(required = true, value_name = "PATH")]
    paths: Vec<PathBuf>,
}

#[derive(Debug, Clone, Args)]
struct SanitizeArgs {
    /// Files to sanitize.
    #[arg(required = true, value_name = "PATH")]
    paths: Vec<PathBuf>,
}

#[derive(Debug, Clone, Args, Default)]
struct SceneDirArgs {
    /// User application directory probed by the detectors.
    #[arg(long, value_name = "DIR")]
    app_dir: Option<PathBuf>,
    /// User script directory probed by the detectors.
    #[arg(long, value_name = "DIR")]
    script_dir: Option<PathBuf>,
    /// Host installation root probed by the detectors.
    #[arg(long, value_name = "DIR")]
    install_root: Option<PathBuf>,
}

#[derive(Debug, Clone, Args)]
struct ScanArgs {
    /// Scene files to scan.
    #[arg(value_name = "PATH")]
    paths: Vec<PathBuf>,
    /// Glob pattern of scene files to scan.
    #[arg(long, value_name = "GLOB", conflicts_with = "list")]
    pattern: Option<String>,
    /// Newline-delimited file of scan targets.
    #[arg(long, value_name = "PATH")]
    list: Option<PathBuf>,
    /// Collect and report only; never modify anything.
    #[arg(long)]
    report_only: bool,
    #[command(flatten)]
    dirs: SceneDirArgs,
}

#[derive(Debug, Clone, Args)]
struct ReportArgs {
    /// Scene file to inspect.
    #[arg(value_name = "PATH")]
    scene: PathBuf,
    #[command(flatten)]
    dirs: SceneDirArgs,
}

pub fn run(cli: &Cli) -> Result<()> {
    if cli.no_color {
        control::set_override(false);
    }
    let config = Config::load(cli.config.as_deref())?;

    let (log, join) = spawn_logger(JsonlConfig {
        path: config.logging.log_file(),
        fallback_path: config.logging.fallback_path.clone(),
        ..JsonlConfig::default()
    })?;

    let outcome = dispatch(cli, &config, &log);

    log.shutdown();
    let _ = join.join();
    outcome
}

fn dispatch(cli: &Cli, config: &Config, log: &ActivityLoggerHandle) -> Result<()> {
    match &cli.command {
        Command::Signatures => cmd_signatures(cli.json),
        Command::Check(args) => cmd_check(args, cli.json),
        Command::Sanitize(args) => cmd_sanitize(args, config, cli.json),
        Command::Scan(args) => cmd_scan(args, config, log, cli.json),
        Command::Report(args) => cmd_report(args, config, log, cli.json),
    }
}

fn cmd_signatures(as_json: bool) -> Result<()> {
    let catalog = SignatureCatalog::builtin()?;
    if as_json {
        let entries: Vec<_> = catalog
            .iter()
            .map(|s| {
                json!({
                    "family": s.family(),
                    "scope": match s.scope() {
                        SignatureScope::Content => "content",
                        SignatureScope::Job => "job",
                    },
                    "pattern": s.raw(),
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }
    for sig in catalog.iter() {
        let scope = match sig.scope() {
            SignatureScope::Content => "content",
            SignatureScope::Job => "job    ",
        };
        println!("{}  {}  {}", sig.family().cyan(), scope.dimmed(), sig.raw());
    }
    Ok(())
}

fn cmd_check(args: &CheckArgs, as_json: bool) -> Result<()> {
    let catalog = SignatureCatalog::builtin()?;
    let mut results = Vec::new();
    for path in &args.paths {
        let infected = matcher::check_file(path, &catalog)?;
        results.push((path, infected));
    }
    if as_json {
        let entries: Vec<_> = results
            .iter()
            .map(|(path, infected)| json!({ "path": path, "infected": infected }))
            .collect();
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }
    for (path, infected) in results {
        if infected {
            println!("{}  {}", "INFECTED".red().bold(), path.display());
        } else {
            println!("{}  {}", "clean".green(), path.display());
        }
    }
    Ok(())
}

fn cmd_sanitize(args: &SanitizeArgs, config: &Config, as_json: bool) -> Result<()> {
    let catalog = SignatureCatalog::builtin()?;
    let threshold = config.matcher.empty_threshold_bytes;
    let mut results = Vec::new();
    for path in &args.paths {
        let action = matcher::sanitize_file(path, &catalog, threshold)?;
        results.push((path, action));
    }
    if as_json {
        let entries: Vec<_> = results
            .iter()
            .map(|(path, action)| {
                json!({
                    "path": path,
                    "action": match action {
                        FileAction::Clean => "clean",
                        FileAction::Rewritten => "rewritten",
                        FileAction::Deleted => "deleted",
                    },
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }
    for (path, action) in results {
        let label = match action {
            FileAction::Clean => "clean    ".green(),
            FileAction::Rewritten => "rewritten".yellow(),
            FileAction::Deleted => "deleted  ".red(),
        };
        println!("{label}  {}", path.display());
    }
    Ok(())
}

fn scene_dirs(args: &SceneDirArgs) -> SceneDirs {
    let home = std::env::var_os("HOME").map_or_else(std::env::temp_dir, PathBuf::from);
    let app = args
        .app_dir
        .clone()
        .unwrap_or_else(|| home.join(".scene-sentinel"));
    SceneDirs {
        user_script_dir: args
            .script_dir
            .clone()
            .unwrap_or_else(|| app.join("scripts")),
        install_root: args
            .install_root
            .clone()
            .unwrap_or_else(|| app.join("install")),
        user_app_dir: app,
    }
}

fn cmd_scan(
    args: &ScanArgs,
    config: &Config,
    log: &ActivityLoggerHandle,
    as_json: bool,
) -> Result<()> {
    let scene = Arc::new(HeadlessScene::new(scene_dirs(&args.dirs)));
    scene.set_activity_log(log.clone());
    let mode = if args.report_only {
        DefenderMode::ReportOnly
    } else {
        DefenderMode::AutoFix
    };
    let scanner = BatchScanner::new(scene, mode, config.clone(), log.clone())?;

    let report = if let Some(pattern) = &args.pattern {
        scanner.scan_pattern(pattern)?
    } else if let Some(list) = &args.list {
        scanner.scan_list_file(list)?
    } else {
        scanner.scan_paths(args.paths.clone())
    };

    if as_json {
        println!(
            "{}",
            serde_json::to_string_pretty(&json!({
                "visited": report.visited(),
                "fixed": report.fixed(),
                "failed": report
                    .failed()
                    .iter()
                    .map(|(path, reason)| json!({ "path": path, "reason": reason }))
                    .collect::<Vec<_>>(),
            }))?
        );
        return Ok(());
    }

    println!(
        "visited {}, fixed {}, failed {}",
        report.visited(),
        report.fixed().len().to_string().green(),
        report.failed().len().to_string().red()
    );
    for path in report.fixed() {
        println!("{}  {}", "fixed ".green(), path.display());
    }
    for (path, reason) in report.failed() {
        println!("{}  {}  {reason}", "failed".red(), path.display());
    }
    Ok(())
}

fn cmd_report(
    args: &ReportArgs,
    config: &Config,
    log: &ActivityLoggerHandle,
    as_json: bool,
) -> Result<()> {
    let scene = Arc::new(HeadlessScene::new(scene_dirs(&args.dirs)));
    scene.set_activity_log(log.clone());
    scene.open_scene(&args.scene, config.scan.suppress_prompts)?;

    let defender = Defender::new(
        scene,
        config.clone(),
        DefenderMode::ReportOnly,
        log.clone(),
    )?;
    defender.collect();
    defender.report();

    defender.with_ledger(|ledger| {
        if as_json {
            let rendered = serde_json::to_string_pretty(&json!({
                "scene": args.scene,
                "malicious_files": ledger.malicious_files(),
                "infected_files": ledger.infected_files(),
                "infected_nodes": ledger.infected_nodes(),
                "infected_script_jobs": ledger.infected_script_jobs(),
                "infected_reference_files": ledger.infected_reference_files(),
            }))?;
            println!("{rendered}");
            return Ok(());
        }

        if !ledger.have_issues() {
            println!("{}  {}", "clean".green(), args.scene.display());
            return Ok(());
        }
        println!("{}  {}", "INFECTED".red().bold(), args.scene.display());
        print_category("malicious files", &paths_to_strings(&ledger.malicious_files()));
        print_category("infected files", &paths_to_strings(&ledger.infected_files()));
        print_category("infected nodes", &ledger.infected_nodes());
        print_category("infected script jobs", &ledger.infected_script_jobs());
        print_category(
            "infected reference files",
            &paths_to_strings(&ledger.infected_reference_files()),
        );
        Ok(())
    })
}

fn paths_to_strings(paths: &[PathBuf]) -> Vec<String> {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect()
}

fn print_category(label: &str, items: &[String]) {
    if items.is_empty() {
        return;
    }
    println!("  {}:", label.yellow());
    for item in items {
        println!("    {item}");
    }
}
