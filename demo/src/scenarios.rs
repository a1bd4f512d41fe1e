//! Scripted scenarios run against the bundled project policy.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};

use warden_contracts::{
    error::WardenResult,
    event::{Event, Phase},
};
use warden_core::{traits::Clock, Handled, ManualClock, Warden};
use warden_policy::{build_warden, PolicyConfig};

use crate::handler::ConsoleHandler;

/// The policy shipped with the demo.
pub const PROJECT_POLICY: &str = include_str!("../policies/project.toml");

fn demo_warden(clock: Arc<ManualClock>) -> WardenResult<Warden> {
    let config = PolicyConfig::from_toml_str(PROJECT_POLICY)?;
    build_warden(&config, Box::new(ConsoleHandler::new()), Box::new(clock))
}

fn start() -> DateTime<Utc> {
    Utc::now()
}

/// Print one handled event the way a host tool would surface it.
pub fn report(label: &str, handled: &Handled) {
    println!("  {label}");
    println!("    verdict: {}", handled.decision.verdict);
    if !handled.alerts.is_empty() {
        for line in handled.alerts.to_string().lines() {
            println!("    {line}");
        }
    }
    if !handled.dispatch.outcomes.is_empty() {
        println!(
            "    actions: {} succeeded, {} failed",
            handled.dispatch.succeeded(),
            handled.dispatch.failed()
        );
    }
}

/// Scenario 1: test files written outside `tests/` are blocked before they land.
pub fn run_directory_guard() -> WardenResult<()> {
    println!("Scenario 1: directory guard");
    let clock = Arc::new(ManualClock::new(start()));
    let warden = demo_warden(Arc::clone(&clock))?;

    let stray = warden.handle(Event::file_write(Phase::Pre, "test_foo.py", clock.now())?);
    report("write test_foo.py (pre)", &stray);

    let placed = warden.handle(Event::file_write(Phase::Pre, "tests/test_foo.py", clock.now())?);
    report("write tests/test_foo.py (pre)", &placed);

    let todo = warden.handle(
        Event::file_edit(Phase::Pre, "src/lib.rs", clock.now())?.with_content("// TODO tidy up\n")?,
    );
    report("edit src/lib.rs with bare TODO (pre)", &todo);

    let push = warden.handle(Event::command(Phase::Pre, "git push --force origin main", clock.now())?);
    report("git push --force (pre)", &push);

    println!();
    Ok(())
}

/// Scenario 2: the status document goes stale after an hour without edits.
pub fn run_staleness() -> WardenResult<()> {
    println!("Scenario 2: status document staleness");
    let clock = Arc::new(ManualClock::new(start()));
    let warden = demo_warden(Arc::clone(&clock))?;

    let touched = warden.handle(Event::file_edit(Phase::Post, "docs/STATUS.md", clock.now())?);
    report("edit docs/STATUS.md (post)", &touched);

    clock.advance(Duration::minutes(30));
    let fresh = warden.handle(Event::command(Phase::Post, "cargo test", clock.now())?);
    report("cargo test at +30min (post)", &fresh);

    clock.advance(Duration::minutes(60));
    let stale = warden.handle(Event::command(Phase::Post, "cargo test", clock.now())?);
    report("cargo test at +90min (post)", &stale);

    let retry = warden.retry_dispatch(&stale.decision);
    println!(
        "  retry dispatch: {} succeeded, {} failed (no duplicate effects)",
        retry.succeeded(),
        retry.failed()
    );

    println!();
    Ok(())
}

/// Decide a single event against `policy` at the current wall-clock time.
pub fn run_check(policy: &PolicyConfig, event: Event) -> WardenResult<Handled> {
    let clock = Arc::new(ManualClock::new(event.timestamp()));
    let warden = build_warden(policy, Box::new(ConsoleHandler::new()), Box::new(clock))?;
    Ok(warden.handle(event))
}
