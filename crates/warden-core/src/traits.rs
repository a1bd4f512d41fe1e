//! Core trait definitions for the WARDEN pipeline.
//!
//! These three traits define the seams between the engine and everything it
//! does not own:
//!
//! - `Rule`              — a compliance check (pure; may be written by anyone)
//! - `SideEffectHandler` — the host's effector (the only place I/O happens)
//! - `Clock`             — the time source for staleness computation
//!
//! The engine itself never performs I/O and never reads the wall clock.

use chrono::{DateTime, Utc};

use warden_contracts::{
    action::Action,
    error::WardenResult,
    event::Event,
    scope::Scope,
    snapshot::StateSnapshot,
    verdict::RuleOutcome,
};

/// A compliance check evaluated against intercepted events.
///
/// Implementations must be pure with respect to `(event, snapshot)`: anything
/// time- or history-dependent comes through the `StateSnapshot`, never from
/// the ambient environment. Evaluation must return promptly; a rule that
/// does slow work owns its own deadline and degrades to `Warn`/`Block`.
pub trait Rule: Send + Sync {
    /// Stable, unique identifier used in decisions, alerts and logs.
    fn id(&self) -> &str;

    /// The (kind, phase) pairs this rule applies to. Must be non-empty.
    fn applies_to(&self) -> &Scope;

    /// Names of watched resources whose age this rule reads from the snapshot.
    ///
    /// The host builds each snapshot with the union of these across the
    /// registry.
    fn watched_resources(&self) -> Vec<String> {
        Vec::new()
    }

    /// Judge `event`.
    ///
    /// Returning `Err` (or panicking) does not fail the decision: the engine
    /// substitutes a `Block` for pre-phase events and a critical `Warn` for
    /// post-phase events.
    fn evaluate(&self, event: &Event, snapshot: &StateSnapshot) -> WardenResult<RuleOutcome>;
}

/// The host's effector: performs the concrete side effect an `Action` describes.
///
/// Examples: spawn a documentation generator, print to the operator's
/// console, append a staleness alert to a log.
pub trait SideEffectHandler: Send + Sync {
    /// Carry out `action`. Return `Err(ActionDispatchFailed)` on failure.
    fn handle(&self, action: &Action) -> WardenResult<()>;
}

/// Source of the current instant.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}
