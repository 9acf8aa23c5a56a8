//! magikcompose - reconciliation preview CLI
//!
//! Plans a manifest against an observed-state snapshot using the
//! in-memory runtime backend and prints what a run would change.
//!
//! ## Usage
//!
//! ```sh
//! magikcompose plan compose.yml --state observed.json
//! magikcompose plan compose.yml --state observed.json --remove-all --json
//! magikcompose validate compose.yml
//! ```
//!
//! The snapshot is a JSON array of observed containers, as produced by a
//! runtime client's `list_containers`. Log verbosity follows `RUST_LOG`.

use magikcompose::{
    Compose, ComposeConfig, ExecutionPlan, Manifest, MemoryRuntime, ObservedContainer, Planner,
    RunSummary, RuntimeRegistry,
};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

// =============================================================================
// CLI Parsing
// =============================================================================

#[derive(Debug)]
enum Command {
    Plan {
        manifest: PathBuf,
        state: Option<PathBuf>,
        json: bool,
        remove_all: bool,
        recover: bool,
    },
    Validate {
        manifest: PathBuf,
    },
    Version,
    Help,
}

fn parse_args() -> Result<Command, String> {
    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 {
        return Ok(Command::Help);
    }

    match args[1].as_str() {
        "plan" => {
            if args.len() < 3 {
                return Err("plan requires <manifest>".to_string());
            }
            let manifest = PathBuf::from(&args[2]);
            let mut state = None;
            let mut json = false;
            let mut remove_all = false;
            let mut recover = false;
            let mut i = 3;
            while i < args.len() {
                match args[i].as_str() {
                    "--state" | "-s" => {
                        if i + 1 < args.len() {
                            state = Some(PathBuf::from(&args[i + 1]));
                            i += 2;
                        } else {
                            return Err("--state requires a path".to_string());
                        }
                    }
                    "--json" => {
                        json = true;
                        i += 1;
                    }
                    "--remove-all" | "--rm" => {
                        remove_all = true;
                        i += 1;
                    }
                    "--recover" => {
                        recover = true;
                        i += 1;
                    }
                    unknown => return Err(format!("unknown option: {}", unknown)),
                }
            }
            Ok(Command::Plan {
                manifest,
                state,
                json,
                remove_all,
                recover,
            })
        }
        "validate" => {
            if args.len() < 3 {
                return Err("validate requires <manifest>".to_string());
            }
            Ok(Command::Validate {
                manifest: PathBuf::from(&args[2]),
            })
        }
        "version" | "--version" | "-v" => Ok(Command::Version),
        "help" | "--help" | "-h" => Ok(Command::Help),
        unknown => Err(format!("unknown command: {}", unknown)),
    }
}

// =============================================================================
// Commands
// =============================================================================

#[derive(serde::Serialize)]
struct PlanOutput<'a> {
    plan: &'a ExecutionPlan,
    summary: &'a RunSummary,
}

fn load_snapshot(path: Option<&PathBuf>) -> Result<Vec<ObservedContainer>, String> {
    let Some(path) = path else {
        return Ok(Vec::new());
    };
    let bytes = std::fs::read(path).map_err(|e| format!("reading {}: {}", path.display(), e))?;
    serde_json::from_slice(&bytes).map_err(|e| format!("parsing {}: {}", path.display(), e))
}

fn cmd_plan(
    manifest: PathBuf,
    state: Option<PathBuf>,
    json: bool,
    remove_all: bool,
    recover: bool,
) -> Result<(), String> {
    let manifest = Manifest::from_file(&manifest).map_err(|e| e.to_string())?;
    let snapshot = load_snapshot(state.as_ref())?;

    let mut registry = RuntimeRegistry::new();
    registry.register(Arc::new(
        MemoryRuntime::from_snapshot(snapshot).map_err(|e| e.to_string())?,
    ));
    let client = registry.get("memory").map_err(|e| e.to_string())?;

    let mut config = ComposeConfig::default().dry_run(true);
    config.remove_all = remove_all;
    config.recover = recover;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| format!("failed to start async runtime: {}", e))?;

    let mut compose = Compose::new(manifest, config, client);
    runtime
        .block_on(compose.execute())
        .map_err(|e| e.to_string())?;

    let plan = compose.execution_plan().cloned().unwrap_or_default();
    let summary = compose.summary();

    if json {
        let out = PlanOutput {
            plan: &plan,
            summary: &summary,
        };
        let text = serde_json::to_string_pretty(&out).map_err(|e| e.to_string())?;
        println!("{}", text);
    } else {
        print!("{}", plan);
        println!(
            "\n{} to create, {} to remove, changed: {}",
            summary.created.len(),
            summary.removed.len(),
            summary.changed
        );
    }
    Ok(())
}

fn cmd_validate(manifest: PathBuf) -> Result<(), String> {
    let parsed = Manifest::from_file(&manifest).map_err(|e| e.to_string())?;
    Planner::new(parsed.namespace())
        .plan(parsed.containers(), &[])
        .map_err(|e| e.to_string())?;
    println!(
        "{}: namespace '{}', {} containers, {} images",
        manifest.display(),
        parsed.namespace(),
        parsed.containers().len(),
        parsed.images().len()
    );
    Ok(())
}

fn cmd_version() {
    println!("magikcompose version {}", env!("CARGO_PKG_VERSION"));
}

fn cmd_help() {
    println!(
        r#"magikcompose - idempotent container composition

USAGE:
    magikcompose <command> [options]

COMMANDS:
    plan <manifest>        Show the actions a run would take
    validate <manifest>    Check a manifest and its dependency graph
    version                Show version info
    help                   Show this help

OPTIONS:
    --state, -s <path>     Observed containers (JSON array), default none
    --remove-all, --rm     Plan removal of every container in the namespace
    --recover              Plan a recover run from the observed state
    --json                 Print plan and summary as JSON

EXAMPLES:
    magikcompose validate compose.yml
    magikcompose plan compose.yml --state observed.json
    RUST_LOG=debug magikcompose plan compose.yml --json
"#
    );
}

// =============================================================================
// Main
// =============================================================================

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    match parse_args() {
        Ok(cmd) => {
            let result = match cmd {
                Command::Plan {
                    manifest,
                    state,
                    json,
                    remove_all,
                    recover,
                } => cmd_plan(manifest, state, json, remove_all, recover),
                Command::Validate { manifest } => cmd_validate(manifest),
                Command::Version => {
                    cmd_version();
                    Ok(())
                }
                Command::Help => {
                    cmd_help();
                    Ok(())
                }
            };

            match result {
                Ok(()) => ExitCode::SUCCESS,
                Err(e) => {
                    eprintln!("error: {}", e);
                    ExitCode::FAILURE
                }
            }
        }
        Err(e) => {
            eprintln!("error: {}", e);
            cmd_help();
            ExitCode::FAILURE
        }
    }
}
