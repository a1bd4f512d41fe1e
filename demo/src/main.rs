//! WARDEN — Demo CLI
//!
//! Runs the scripted scenarios against the bundled project policy, or decides
//! a single event against any policy file.
//!
//! Usage:
//!   cargo run -p demo -- run-all
//!   cargo run -p demo -- directory-guard
//!   cargo run -p demo -- staleness
//!   cargo run -p demo -- check --kind file-write --phase pre --path test_foo.py

mod handler;
mod scenarios;

use std::path::PathBuf;

use chrono::Utc;
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

use warden_contracts::{
    error::WardenResult,
    event::{Event, EventKind, Phase},
};
use warden_policy::PolicyConfig;

// ── CLI definition ────────────────────────────────────────────────────────────

/// WARDEN — rule gate for automated edits and commands.
#[derive(Parser)]
#[command(
    name = "demo",
    about = "WARDEN rule engine demo",
    long_about = "Runs WARDEN scenarios showing pre-phase gating, post-phase\n\
                  staleness detection, severity-grouped alerts and action dispatch."
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run every scenario in sequence.
    RunAll,
    /// Scenario 1: path, content and command gating before the action.
    DirectoryGuard,
    /// Scenario 2: status document staleness after the action.
    Staleness,
    /// Decide one event and print the decision as JSON.
    Check(CheckArgs),
}

#[derive(clap::Args)]
struct CheckArgs {
    /// Policy file; the bundled project policy when omitted.
    #[arg(long)]
    policy: Option<PathBuf>,
    #[arg(long, value_enum)]
    kind: KindArg,
    #[arg(long, value_enum, default_value = "pre")]
    phase: PhaseArg,
    /// Target path for file-write / file-edit.
    #[arg(long)]
    path: Option<String>,
    /// Command text for command events.
    #[arg(long)]
    command: Option<String>,
    /// Content being written (file-write / file-edit only).
    #[arg(long)]
    content: Option<String>,
}

#[derive(Clone, Copy, ValueEnum)]
enum KindArg {
    FileWrite,
    FileEdit,
    Command,
    TaskUpdate,
}

impl From<KindArg> for EventKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::FileWrite => EventKind::FileWrite,
            KindArg::FileEdit => EventKind::FileEdit,
            KindArg::Command => EventKind::Command,
            KindArg::TaskUpdate => EventKind::TaskUpdate,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum PhaseArg {
    Pre,
    Post,
}

impl From<PhaseArg> for Phase {
    fn from(phase: PhaseArg) -> Self {
        match phase {
            PhaseArg::Pre => Phase::Pre,
            PhaseArg::Post => Phase::Post,
        }
    }
}

// ── Entry point ───────────────────────────────────────────────────────────────

fn main() {
    // Initialize structured logging.  Set RUST_LOG=debug for verbose output.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_target(false)
        .compact()
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Command::RunAll => run_all(),
        Command::DirectoryGuard => scenarios::run_directory_guard().map(|_| false),
        Command::Staleness => scenarios::run_staleness().map(|_| false),
        Command::Check(args) => run_check(args),
    };

    match result {
        Ok(blocked) => {
            if blocked {
                std::process::exit(2);
            }
        }
        Err(e) => {
            eprintln!("Demo error: {}", e);
            std::process::exit(1);
        }
    }
}

// ── Command dispatch ──────────────────────────────────────────────────────────

fn run_all() -> WardenResult<bool> {
    print_banner();
    scenarios::run_directory_guard()?;
    scenarios::run_staleness()?;
    println!("All scenarios completed.");
    Ok(false)
}

/// Returns `true` when the event was blocked, so the exit code can say so.
fn run_check(args: CheckArgs) -> WardenResult<bool> {
    let policy = match &args.policy {
        Some(path) => PolicyConfig::from_file(path)?,
        None => PolicyConfig::from_toml_str(scenarios::PROJECT_POLICY)?,
    };

    let mut event = Event::new(
        args.kind.into(),
        args.phase.into(),
        args.path,
        args.command,
        Utc::now(),
    )?;
    if let Some(content) = args.content {
        event = event.with_content(content)?;
    }

    let handled = scenarios::run_check(&policy, event)?;
    let json = serde_json::json!({
        "decision": handled.decision,
        "alerts": handled.alerts,
        "dispatch": handled.dispatch,
    });
    println!(
        "{}",
        serde_json::to_string_pretty(&json).unwrap_or_else(|_| json.to_string())
    );
    Ok(handled.decision.is_blocked())
}

// ── Banner ────────────────────────────────────────────────────────────────────

fn print_banner() {
    println!();
    println!("WARDEN — rule gate for automated edits");
    println!("======================================");
    println!();
    println!("Per intercepted event:");
    println!("  [1] Snapshot watched-resource ages and recent history");
    println!("  [2] Evaluate every rule registered for (kind, phase)");
    println!("  [3] Reduce verdicts: Block > Warn > Allow");
    println!("  [4] Group findings by severity: Critical, Warning, Info");
    println!("  [5] Dispatch attached actions once per event");
    println!();
}
