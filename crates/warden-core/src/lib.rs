//! # warden-core
//!
//! The deterministic rule-evaluation and alert-dispatch engine for WARDEN.
//!
//! This crate provides:
//! - The three seam traits (`Rule`, `SideEffectHandler`, `Clock`)
//! - `RuleRegistry`, assembled once at startup
//! - `DecisionEngine`, the pure decide step
//! - `StalenessTracker` and `EventHistory`, the inputs to each `StateSnapshot`
//! - `classify`, the severity grouping of a decision's findings
//! - `ActionDispatcher`, the isolated, retry-safe dispatch step
//! - `Warden`, which wires all of the above for a host
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use warden_core::{DecisionEngine, RuleRegistry, StalenessTracker};
//!
//! let registry = Arc::new(RuleRegistry::from_rules(rules)?);
//! let engine = DecisionEngine::new(registry);
//! let tracker = StalenessTracker::new();
//! let snapshot = tracker.snapshot(&["status-doc"], clock.now(), history.recent());
//! let decision = engine.decide(&event, &snapshot);
//! ```

pub mod alert;
pub mod clock;
pub mod dispatch;
pub mod engine;
pub mod history;
pub mod pipeline;
pub mod registry;
pub mod staleness;
pub mod traits;

pub use alert::classify;
pub use clock::{ManualClock, SystemClock};
pub use dispatch::{ActionDispatcher, ActionOutcome, DispatchReport, DispatchStatus};
pub use engine::DecisionEngine;
pub use history::EventHistory;
pub use pipeline::{Handled, Warden};
pub use registry::RuleRegistry;
pub use staleness::StalenessTracker;

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use chrono::{Duration, TimeZone, Utc};

    use warden_contracts::{
        action::{Action, ActionEffect},
        error::{WardenError, WardenResult},
        event::{Event, EventKind, Phase},
        scope::Scope,
        snapshot::StateSnapshot,
        verdict::{RuleOutcome, Severity, Verdict},
    };

    use crate::{
        traits::{Clock, Rule, SideEffectHandler},
        ActionDispatcher, DecisionEngine, EventHistory, ManualClock, RuleRegistry,
        StalenessTracker, Warden,
    };

    // ── Helpers ───────────────────────────────────────────────────────────────

    struct NamedRule {
        id: &'static str,
        scope: Scope,
    }

    impl Rule for NamedRule {
        fn id(&self) -> &str {
            self.id
        }

        fn applies_to(&self) -> &Scope {
            &self.scope
        }

        fn evaluate(&self, _event: &Event, _snapshot: &StateSnapshot) -> WardenResult<RuleOutcome> {
            Ok(RuleOutcome::allow())
        }
    }

    fn named(id: &'static str, scope: Scope) -> Box<dyn Rule> {
        Box::new(NamedRule { id, scope })
    }

    /// Warns critical when `status-doc` is older than one hour.
    struct StatusDocRule {
        scope: Scope,
    }

    impl Rule for StatusDocRule {
        fn id(&self) -> &str {
            "status-doc-fresh"
        }

        fn applies_to(&self) -> &Scope {
            &self.scope
        }

        fn watched_resources(&self) -> Vec<String> {
            vec!["status-doc".to_string()]
        }

        fn evaluate(&self, _event: &Event, snapshot: &StateSnapshot) -> WardenResult<RuleOutcome> {
            if snapshot.age_of("status-doc").exceeds(Duration::hours(1)) {
                return Ok(RuleOutcome::warn(Severity::Critical, "status document stale")
                    .with_action(Action::new(
                        "stale:status-doc",
                        ActionEffect::RaiseStalenessAlert,
                        serde_json::json!({ "resource": "status-doc" }),
                    )));
            }
            Ok(RuleOutcome::allow())
        }
    }

    struct CountingHandler {
        handled: Arc<Mutex<Vec<String>>>,
    }

    impl SideEffectHandler for CountingHandler {
        fn handle(&self, action: &Action) -> WardenResult<()> {
            self.handled.lock().unwrap().push(action.id.clone());
            Ok(())
        }
    }

    fn t0() -> chrono::DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 1, 9, 0, 0).unwrap()
    }

    // ── Registry ──────────────────────────────────────────────────────────────

    #[test]
    fn test_registry_rejects_duplicate_id_and_stays_unchanged() {
        let mut registry = RuleRegistry::new();
        registry
            .register(named("tests-dir", Scope::both_phases(EventKind::FileWrite)))
            .unwrap();

        let err = registry
            .register(named("tests-dir", Scope::both_phases(EventKind::Command)))
            .unwrap_err();
        assert_eq!(
            err,
            WardenError::DuplicateRuleId {
                rule_id: "tests-dir".to_string()
            }
        );
        assert_eq!(registry.len(), 1);
        assert!(registry.lookup(EventKind::Command, Phase::Pre).is_empty());
        assert_eq!(registry.lookup(EventKind::FileWrite, Phase::Pre).len(), 1);
    }

    #[test]
    fn test_registry_rejects_empty_scope() {
        let mut registry = RuleRegistry::new();
        let err = registry.register(named("nothing", Scope::new())).unwrap_err();
        assert!(matches!(err, WardenError::EmptyScope { .. }));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_from_rules_is_all_or_nothing() {
        let result = RuleRegistry::from_rules(vec![
            named("a", Scope::both_phases(EventKind::FileEdit)),
            named("b", Scope::both_phases(EventKind::FileEdit)),
            named("a", Scope::both_phases(EventKind::FileEdit)),
        ]);
        assert!(matches!(result, Err(WardenError::DuplicateRuleId { .. })));
    }

    #[test]
    fn test_lookup_preserves_registration_order() {
        let registry = RuleRegistry::from_rules(vec![
            named("z-last-alphabetically", Scope::new().with(EventKind::FileEdit, Phase::Pre)),
            named("only-post", Scope::new().with(EventKind::FileEdit, Phase::Post)),
            named("a-first-alphabetically", Scope::both_phases(EventKind::FileEdit)),
        ])
        .unwrap();

        let ids: Vec<&str> = registry
            .lookup(EventKind::FileEdit, Phase::Pre)
            .iter()
            .map(|r| r.id())
            .collect();
        assert_eq!(ids, vec!["z-last-alphabetically", "a-first-alphabetically"]);
    }

    #[test]
    fn test_watched_resources_are_unioned() {
        let registry = RuleRegistry::from_rules(vec![
            Box::new(StatusDocRule {
                scope: Scope::both_phases(EventKind::Command),
            }) as Box<dyn Rule>,
            named("plain", Scope::both_phases(EventKind::Command)),
        ])
        .unwrap();
        assert_eq!(registry.watched_resources(), vec!["status-doc"]);
    }

    // ── Staleness through the engine ──────────────────────────────────────────

    #[test]
    fn test_staleness_rule_warns_after_threshold() {
        let registry = Arc::new(
            RuleRegistry::from_rules(vec![Box::new(StatusDocRule {
                scope: Scope::new().with(EventKind::Command, Phase::Post),
            }) as Box<dyn Rule>])
            .unwrap(),
        );
        let engine = DecisionEngine::new(Arc::clone(&registry));
        let tracker = StalenessTracker::new();
        tracker.touch("status-doc", t0());

        let resources = registry.watched_resources();

        let late = t0() + Duration::minutes(90);
        let event = Event::command(Phase::Post, "cargo test", late).unwrap();
        let decision = engine.decide(&event, &tracker.snapshot(&resources, late, vec![]));
        assert_eq!(
            decision.verdict,
            Verdict::warn(Severity::Critical, "status document stale")
        );

        let early = t0() + Duration::minutes(30);
        let event = Event::command(Phase::Post, "cargo test", early).unwrap();
        let decision = engine.decide(&event, &tracker.snapshot(&resources, early, vec![]));
        assert_eq!(decision.verdict, Verdict::Allow);
    }

    // ── Warden pipeline ───────────────────────────────────────────────────────

    fn warden(clock: Arc<ManualClock>) -> (Warden, Arc<Mutex<Vec<String>>>) {
        let registry = Arc::new(
            RuleRegistry::from_rules(vec![Box::new(StatusDocRule {
                scope: Scope::new().with(EventKind::Command, Phase::Post),
            }) as Box<dyn Rule>])
            .unwrap(),
        );
        let handled = Arc::new(Mutex::new(Vec::new()));
        let warden = Warden::new(
            DecisionEngine::new(registry),
            Arc::new(StalenessTracker::new()),
            EventHistory::new(5),
            ActionDispatcher::new(Box::new(CountingHandler {
                handled: Arc::clone(&handled),
            })),
            Box::new(clock),
        )
        .watch_path("status-doc", "docs/STATUS.md");
        (warden, handled)
    }

    #[test]
    fn test_pipeline_touches_watched_path_and_dispatches_alert() {
        let clock = Arc::new(ManualClock::new(t0()));
        let (warden, handled) = warden(Arc::clone(&clock));

        let edit = Event::file_edit(Phase::Post, "docs/STATUS.md", t0()).unwrap();
        warden.handle(edit);
        assert_eq!(warden.tracker().last_update("status-doc"), Some(t0()));

        clock.advance(Duration::minutes(30));
        let fresh = warden.handle(Event::command(Phase::Post, "make", clock.now()).unwrap());
        assert_eq!(fresh.decision.verdict, Verdict::Allow);
        assert!(fresh.alerts.is_empty());

        clock.advance(Duration::minutes(60));
        let stale = warden.handle(Event::command(Phase::Post, "make", clock.now()).unwrap());
        assert_eq!(stale.alerts.highest(), Some(Severity::Critical));
        assert_eq!(stale.dispatch.succeeded(), 1);
        assert_eq!(*handled.lock().unwrap(), vec!["stale:status-doc"]);

        let retry = warden.retry_dispatch(&stale.decision);
        assert_eq!(retry.succeeded(), 1);
        assert_eq!(handled.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_pre_phase_edit_does_not_touch_tracker() {
        let clock = Arc::new(ManualClock::new(t0()));
        let (warden, _) = warden(clock);

        warden.handle(Event::file_edit(Phase::Pre, "docs/STATUS.md", t0()).unwrap());
        assert_eq!(warden.tracker().last_update("status-doc"), None);
    }

    #[test]
    fn test_snapshot_carries_recent_history() {
        let clock = Arc::new(ManualClock::new(t0()));
        let (warden, _) = warden(clock);

        warden.handle(Event::task_update(Phase::Post, t0()).unwrap());
        warden.handle(Event::command(Phase::Pre, "ls", t0()).unwrap());

        let snapshot = warden.snapshot();
        assert_eq!(snapshot.recent_events.len(), 2);
        assert_eq!(snapshot.recent_events[0].kind(), EventKind::TaskUpdate);
        assert!(snapshot.watched_resource_ages.contains_key("status-doc"));
    }
}
