//! The WARDEN host pipeline: one call per intercepted event.
//!
//! `Warden` wires the trusted components together in a fixed order:
//!
//!   Snapshot → Decide → Classify → Dispatch → Record history → Touch tracker
//!
//! The snapshot is frozen before any rule runs, so nothing a rule sees can
//! change mid-cycle. Tracker and history are only updated after the decision
//! is final.

use std::{collections::HashMap, sync::Arc};

use tracing::{debug, info};

use warden_contracts::{
    alert::AlertSummary,
    decision::Decision,
    event::{Event, EventId, Phase},
    snapshot::StateSnapshot,
};

use crate::{
    alert::classify,
    dispatch::{ActionDispatcher, DispatchReport},
    engine::DecisionEngine,
    history::EventHistory,
    staleness::StalenessTracker,
    traits::Clock,
};

/// Everything the host needs to act on one event.
#[derive(Debug, Clone)]
pub struct Handled {
    /// Honor `decision.is_blocked()` by refusing the action.
    pub decision: Decision,
    /// Severity-grouped messages to surface to the operator.
    pub alerts: AlertSummary,
    /// Per-action side-effect outcomes.
    pub dispatch: DispatchReport,
}

/// Process-scoped runtime state plus the engine and dispatcher.
///
/// Construct once at startup. All methods take `&self`.
pub struct Warden {
    engine: DecisionEngine,
    tracker: Arc<StalenessTracker>,
    history: EventHistory,
    dispatcher: ActionDispatcher,
    clock: Box<dyn Clock>,
    /// target path → watched resource name
    watched_paths: HashMap<String, String>,
}

impl Warden {
    pub fn new(
        engine: DecisionEngine,
        tracker: Arc<StalenessTracker>,
        history: EventHistory,
        dispatcher: ActionDispatcher,
        clock: Box<dyn Clock>,
    ) -> Self {
        Self {
            engine,
            tracker,
            history,
            dispatcher,
            clock,
            watched_paths: HashMap::new(),
        }
    }

    /// Treat completed writes/edits of `path` as updates of `resource`.
    pub fn watch_path(mut self, resource: impl Into<String>, path: impl Into<String>) -> Self {
        self.watched_paths.insert(path.into(), resource.into());
        self
    }

    pub fn tracker(&self) -> &StalenessTracker {
        &self.tracker
    }

    pub fn engine(&self) -> &DecisionEngine {
        &self.engine
    }

    /// Freeze the state every registered rule may read, as of now.
    pub fn snapshot(&self) -> StateSnapshot {
        let resources = self.engine.registry().watched_resources();
        self.tracker
            .snapshot(&resources, self.clock.now(), self.history.recent())
    }

    /// Decide, classify, and dispatch `event`.
    pub fn handle(&self, event: Event) -> Handled {
        let snapshot = self.snapshot();
        let decision = self.engine.decide(&event, &snapshot);
        let alerts = classify(&decision);
        let dispatch = self.dispatcher.dispatch(&decision);

        if !alerts.is_empty() {
            info!(
                event_id = %event.id(),
                highest = ?alerts.highest(),
                alerts = alerts.total(),
                "alerts raised"
            );
        }

        self.observe(&event);
        self.history.record(event);

        Handled {
            decision,
            alerts,
            dispatch,
        }
    }

    /// Re-run the actions of an earlier decision. Already-succeeded actions
    /// are not repeated.
    pub fn retry_dispatch(&self, decision: &Decision) -> DispatchReport {
        self.dispatcher.dispatch(decision)
    }

    /// Release the dispatch ledger entries of `event_id`. Call once the host
    /// will no longer retry that event; the ledger is bounded either way.
    pub fn forget(&self, event_id: EventId) {
        self.dispatcher.forget(event_id);
    }

    pub fn dispatcher(&self) -> &ActionDispatcher {
        &self.dispatcher
    }

    /// Touch the tracker when a post-phase file change lands on a watched path.
    fn observe(&self, event: &Event) {
        if event.phase() != Phase::Post || !event.kind().is_file_change() {
            return;
        }
        let Some(path) = event.target_path() else {
            return;
        };
        if let Some(resource) = self.watched_paths.get(path) {
            debug!(resource = %resource, path = %path, "watched path updated");
            self.tracker.touch(resource, event.timestamp());
        }
    }
}

impl std::fmt::Debug for Warden {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Warden")
            .field("engine", &self.engine)
            .field("history", &self.history.len())
            .field("watched_paths", &self.watched_paths)
            .finish()
    }
}
