//! The action dispatcher: the dispatch half of decide-then-dispatch.
//!
//! `ActionDispatcher` hands each `Action` of a decision to the injected
//! `SideEffectHandler`. Failures are isolated per action, and a success is
//! remembered per (event, action id) so retrying a decision never repeats an
//! external effect that already happened.
//!
//! Ledger protocol, per (event, action id):
//!
//!   absent  → reserve as Pending under the lock, run the handler unlocked
//!   Pending → another caller is running it; wait until it settles
//!   Done    → report Succeeded without calling the handler
//!
//! A failed run removes the reservation so a later retry runs it again. The
//! ledger remembers at most `ledger_capacity` events; the oldest event's
//! entries are evicted first.

use std::{
    collections::{HashMap, HashSet, VecDeque},
    panic::{self, AssertUnwindSafe},
    sync::{Condvar, Mutex, MutexGuard},
};

use serde::Serialize;
use tracing::{debug, info, warn};

use warden_contracts::{
    action::{Action, ActionEffect},
    decision::Decision,
    error::WardenError,
    event::EventId,
};

use crate::traits::SideEffectHandler;

/// Events remembered by a dispatcher built with [`ActionDispatcher::new`].
pub const DEFAULT_LEDGER_CAPACITY: usize = 256;

/// What happened to one action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DispatchStatus {
    Succeeded,
    Failed { reason: String },
}

/// Per-action result inside a `DispatchReport`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActionOutcome {
    pub action_id: String,
    pub effect: ActionEffect,
    pub status: DispatchStatus,
}

/// Outcomes for every distinct action of one dispatch call, in input order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DispatchReport {
    pub event_id: EventId,
    pub outcomes: Vec<ActionOutcome>,
}

impl DispatchReport {
    pub fn succeeded(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| o.status == DispatchStatus::Succeeded)
            .count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.succeeded()
    }

    pub fn all_succeeded(&self) -> bool {
        self.failed() == 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LedgerState {
    Pending,
    Done,
}

type LedgerKey = (EventId, String);

/// Bounded per-event record of reserved and completed actions.
#[derive(Debug)]
struct Ledger {
    capacity: usize,
    entries: HashMap<LedgerKey, LedgerState>,
    /// Events with at least one entry, oldest first.
    events: VecDeque<EventId>,
}

impl Ledger {
    fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: HashMap::new(),
            events: VecDeque::new(),
        }
    }

    fn reserve(&mut self, key: LedgerKey) {
        let event_id = key.0;
        if !self.events.contains(&event_id) {
            while self.events.len() >= self.capacity {
                if let Some(oldest) = self.events.pop_front() {
                    self.drop_event(oldest);
                }
            }
            self.events.push_back(event_id);
        }
        self.entries.insert(key, LedgerState::Pending);
    }

    /// Mark `key` done, or release it after a failure. A key evicted while
    /// running stays evicted.
    fn settle(&mut self, key: &LedgerKey, succeeded: bool) {
        if succeeded {
            if let Some(state) = self.entries.get_mut(key) {
                *state = LedgerState::Done;
            }
        } else {
            self.entries.remove(key);
        }
    }

    fn drop_event(&mut self, event_id: EventId) {
        self.entries.retain(|(id, _), _| *id != event_id);
    }

    fn forget(&mut self, event_id: EventId) {
        self.drop_event(event_id);
        self.events.retain(|id| *id != event_id);
    }
}

/// Executes declarative actions through a host-supplied handler.
pub struct ActionDispatcher {
    handler: Box<dyn SideEffectHandler>,
    ledger: Mutex<Ledger>,
    settled: Condvar,
}

impl ActionDispatcher {
    pub fn new(handler: Box<dyn SideEffectHandler>) -> Self {
        Self::with_ledger_capacity(handler, DEFAULT_LEDGER_CAPACITY)
    }

    /// A dispatcher that remembers successes for at most `capacity` events
    /// (minimum 1).
    pub fn with_ledger_capacity(handler: Box<dyn SideEffectHandler>, capacity: usize) -> Self {
        Self {
            handler,
            ledger: Mutex::new(Ledger::new(capacity)),
            settled: Condvar::new(),
        }
    }

    /// Dispatch every triggered action of `decision`.
    pub fn dispatch(&self, decision: &Decision) -> DispatchReport {
        self.dispatch_actions(decision.event_id, &decision.triggered_actions)
    }

    /// Dispatch `actions` on behalf of `event_id`.
    ///
    /// Guarantees:
    /// - each distinct `Action::id` is attempted at most once per call;
    /// - one action failing (by error or panic) does not stop the rest;
    /// - an action that already succeeded for `event_id` is reported
    ///   `Succeeded` without calling the handler again; failed ones are retried;
    /// - concurrent calls for the same event never run one action twice.
    pub fn dispatch_actions(&self, event_id: EventId, actions: &[Action]) -> DispatchReport {
        let mut seen = HashSet::new();
        let mut outcomes = Vec::with_capacity(actions.len());

        for action in actions {
            if !seen.insert(action.id.as_str()) {
                debug!(action_id = %action.id, "skipping duplicate action id");
                continue;
            }

            let key = (event_id, action.id.clone());
            if !self.reserve(&key) {
                debug!(
                    event_id = %event_id,
                    action_id = %action.id,
                    "action already dispatched for this event"
                );
                outcomes.push(ActionOutcome {
                    action_id: action.id.clone(),
                    effect: action.effect,
                    status: DispatchStatus::Succeeded,
                });
                continue;
            }

            let result = self.run(action);
            self.settle(&key, result.is_ok());

            let status = match result {
                Ok(()) => {
                    info!(
                        event_id = %event_id,
                        action_id = %action.id,
                        effect = %action.effect,
                        "action dispatched"
                    );
                    DispatchStatus::Succeeded
                }
                Err(err) => {
                    warn!(
                        event_id = %event_id,
                        action_id = %action.id,
                        effect = %action.effect,
                        error = %err,
                        "action dispatch failed"
                    );
                    DispatchStatus::Failed {
                        reason: err.to_string(),
                    }
                }
            };

            outcomes.push(ActionOutcome {
                action_id: action.id.clone(),
                effect: action.effect,
                status,
            });
        }

        DispatchReport { event_id, outcomes }
    }

    /// Drop the success ledger for `event_id` once the host is done with it.
    pub fn forget(&self, event_id: EventId) {
        self.lock_ledger().forget(event_id);
    }

    /// Number of events the ledger currently remembers.
    pub fn remembered_events(&self) -> usize {
        self.lock_ledger().events.len()
    }

    pub fn ledger_capacity(&self) -> usize {
        self.lock_ledger().capacity
    }

    /// Returns `true` if the caller now owns `key` and must run it, `false`
    /// if it already succeeded. Blocks while another caller is running it.
    fn reserve(&self, key: &LedgerKey) -> bool {
        let mut ledger = self.lock_ledger();
        loop {
            match ledger.entries.get(key).copied() {
                Some(LedgerState::Done) => return false,
                Some(LedgerState::Pending) => {
                    ledger = self
                        .settled
                        .wait(ledger)
                        .unwrap_or_else(|e| e.into_inner());
                }
                None => {
                    ledger.reserve(key.clone());
                    return true;
                }
            }
        }
    }

    fn settle(&self, key: &LedgerKey, succeeded: bool) {
        self.lock_ledger().settle(key, succeeded);
        self.settled.notify_all();
    }

    fn run(&self, action: &Action) -> Result<(), WardenError> {
        match panic::catch_unwind(AssertUnwindSafe(|| self.handler.handle(action))) {
            Ok(result) => result,
            Err(_) => Err(WardenError::ActionDispatchFailed {
                action_id: action.id.clone(),
                reason: "side-effect handler panicked".to_string(),
            }),
        }
    }

    fn lock_ledger(&self) -> MutexGuard<'_, Ledger> {
        self.ledger.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl std::fmt::Debug for ActionDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let ledger = self.lock_ledger();
        f.debug_struct("ActionDispatcher")
            .field("remembered_events", &ledger.events.len())
            .field("ledger_capacity", &ledger.capacity)
            .finish()
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::{
        sync::{Arc, Barrier, Mutex},
        thread,
        time::Duration,
    };

    use warden_contracts::{
        action::{Action, ActionEffect},
        decision::Decision,
        error::{WardenError, WardenResult},
        event::{EventId, Phase},
        verdict::Verdict,
    };

    use crate::traits::SideEffectHandler;

    use super::{ActionDispatcher, DispatchStatus};

    /// Records every handled action id; fails ids listed in `failing`,
    /// panics on ids listed in `panicking`.
    struct RecordingHandler {
        handled: Arc<Mutex<Vec<String>>>,
        failing: Vec<String>,
        panicking: Vec<String>,
        delay: Option<Duration>,
    }

    impl SideEffectHandler for RecordingHandler {
        fn handle(&self, action: &Action) -> WardenResult<()> {
            if let Some(delay) = self.delay {
                thread::sleep(delay);
            }
            if self.panicking.contains(&action.id) {
                panic!("handler exploded");
            }
            self.handled.lock().unwrap().push(action.id.clone());
            if self.failing.contains(&action.id) {
                return Err(WardenError::ActionDispatchFailed {
                    action_id: action.id.clone(),
                    reason: "generator exited with status 1".to_string(),
                });
            }
            Ok(())
        }
    }

    fn dispatcher(failing: &[&str], panicking: &[&str]) -> (ActionDispatcher, Arc<Mutex<Vec<String>>>) {
        let handled = Arc::new(Mutex::new(Vec::new()));
        let handler = RecordingHandler {
            handled: Arc::clone(&handled),
            failing: failing.iter().map(|s| s.to_string()).collect(),
            panicking: panicking.iter().map(|s| s.to_string()).collect(),
            delay: None,
        };
        (ActionDispatcher::new(Box::new(handler)), handled)
    }

    fn slow_dispatcher(failing: &[&str]) -> (Arc<ActionDispatcher>, Arc<Mutex<Vec<String>>>) {
        let handled = Arc::new(Mutex::new(Vec::new()));
        let handler = RecordingHandler {
            handled: Arc::clone(&handled),
            failing: failing.iter().map(|s| s.to_string()).collect(),
            panicking: Vec::new(),
            delay: Some(Duration::from_millis(50)),
        };
        (Arc::new(ActionDispatcher::new(Box::new(handler))), handled)
    }

    fn race(dispatcher: &Arc<ActionDispatcher>, event_id: EventId, id: &str) -> Vec<DispatchStatus> {
        let barrier = Arc::new(Barrier::new(2));
        let workers: Vec<_> = (0..2)
            .map(|_| {
                let dispatcher = Arc::clone(dispatcher);
                let barrier = Arc::clone(&barrier);
                let actions = vec![action(id)];
                thread::spawn(move || {
                    barrier.wait();
                    dispatcher.dispatch_actions(event_id, &actions).outcomes[0].status.clone()
                })
            })
            .collect();
        workers.into_iter().map(|w| w.join().unwrap()).collect()
    }

    fn action(id: &str) -> Action {
        Action::new(id, ActionEffect::InvokeExternalGenerator, serde_json::Value::Null)
    }

    fn decision_with(actions: Vec<Action>) -> Decision {
        Decision {
            verdict: Verdict::block("x"),
            triggered_actions: actions,
            ..Decision::allow(EventId::new(), Phase::Post)
        }
    }

    #[test]
    fn test_empty_action_list_yields_empty_report() {
        let (dispatcher, handled) = dispatcher(&[], &[]);
        let report = dispatcher.dispatch(&Decision::allow(EventId::new(), Phase::Pre));
        assert!(report.outcomes.is_empty());
        assert!(report.all_succeeded());
        assert!(handled.lock().unwrap().is_empty());
    }

    #[test]
    fn test_failure_is_isolated_per_action() {
        let (dispatcher, handled) = dispatcher(&["docs"], &["boom"]);
        let decision = decision_with(vec![action("docs"), action("boom"), action("notify")]);

        let report = dispatcher.dispatch(&decision);
        assert_eq!(report.outcomes.len(), 3);
        assert!(matches!(report.outcomes[0].status, DispatchStatus::Failed { .. }));
        match &report.outcomes[1].status {
            DispatchStatus::Failed { reason } => assert!(reason.contains("panicked")),
            other => panic!("expected Failed, got {:?}", other),
        }
        assert_eq!(report.outcomes[2].status, DispatchStatus::Succeeded);
        assert_eq!(report.succeeded(), 1);
        assert_eq!(report.failed(), 2);
        assert_eq!(*handled.lock().unwrap(), vec!["docs", "notify"]);
    }

    #[test]
    fn test_duplicate_ids_dispatched_once() {
        let (dispatcher, handled) = dispatcher(&[], &[]);
        let report = dispatcher.dispatch_actions(
            EventId::new(),
            &[action("regen"), action("regen"), action("notify")],
        );
        assert_eq!(report.outcomes.len(), 2);
        assert_eq!(*handled.lock().unwrap(), vec!["regen", "notify"]);
    }

    #[test]
    fn test_retry_is_idempotent_and_retries_failures() {
        let (dispatcher, handled) = dispatcher(&["flaky"], &[]);
        let decision = decision_with(vec![action("regen"), action("flaky")]);

        let first = dispatcher.dispatch(&decision);
        let second = dispatcher.dispatch(&decision);

        assert_eq!(first.succeeded(), second.succeeded());
        assert_eq!(first.failed(), second.failed());
        // "regen" ran once; "flaky" was retried.
        assert_eq!(*handled.lock().unwrap(), vec!["regen", "flaky", "flaky"]);
    }

    #[test]
    fn test_ledger_is_per_event_and_forgettable() {
        let (dispatcher, handled) = dispatcher(&[], &[]);
        let a = decision_with(vec![action("regen")]);
        let b = decision_with(vec![action("regen")]);

        dispatcher.dispatch(&a);
        dispatcher.dispatch(&b);
        dispatcher.dispatch(&a);
        assert_eq!(handled.lock().unwrap().len(), 2);

        dispatcher.forget(a.event_id);
        dispatcher.dispatch(&a);
        assert_eq!(handled.lock().unwrap().len(), 3);
    }

    // ── Concurrency ───────────────────────────────────────────────────────────

    #[test]
    fn test_concurrent_dispatch_runs_action_once() {
        let (dispatcher, handled) = slow_dispatcher(&[]);
        let event_id = EventId::new();

        let statuses = race(&dispatcher, event_id, "regen");

        assert_eq!(statuses, vec![DispatchStatus::Succeeded, DispatchStatus::Succeeded]);
        assert_eq!(*handled.lock().unwrap(), vec!["regen"]);
    }

    #[test]
    fn test_concurrent_failure_releases_reservation() {
        let (dispatcher, handled) = slow_dispatcher(&["flaky"]);
        let event_id = EventId::new();

        let statuses = race(&dispatcher, event_id, "flaky");

        // The waiter retries after the first run fails and releases the key.
        assert!(statuses.iter().all(|s| matches!(s, DispatchStatus::Failed { .. })));
        assert_eq!(handled.lock().unwrap().len(), 2);
        assert_eq!(dispatcher.remembered_events(), 1);
    }

    // ── Ledger bounds ─────────────────────────────────────────────────────────

    #[test]
    fn test_ledger_evicts_oldest_event_at_capacity() {
        let handled = Arc::new(Mutex::new(Vec::new()));
        let handler = RecordingHandler {
            handled: Arc::clone(&handled),
            failing: Vec::new(),
            panicking: Vec::new(),
            delay: None,
        };
        let dispatcher = ActionDispatcher::with_ledger_capacity(Box::new(handler), 3);

        let decisions: Vec<Decision> = (0..10).map(|_| decision_with(vec![action("regen")])).collect();
        for decision in &decisions {
            dispatcher.dispatch(decision);
            assert!(dispatcher.remembered_events() <= 3);
        }
        assert_eq!(dispatcher.remembered_events(), 3);

        // Newest events are still deduplicated; the evicted oldest is not.
        dispatcher.dispatch(&decisions[9]);
        assert_eq!(handled.lock().unwrap().len(), 10);
        dispatcher.dispatch(&decisions[0]);
        assert_eq!(handled.lock().unwrap().len(), 11);
    }

    #[test]
    fn test_forget_releases_ledger_slot() {
        let (dispatcher, _handled) = dispatcher(&[], &[]);
        let decision = decision_with(vec![action("regen"), action("notify")]);
        dispatcher.dispatch(&decision);
        assert_eq!(dispatcher.remembered_events(), 1);

        dispatcher.forget(decision.event_id);
        assert_eq!(dispatcher.remembered_events(), 0);
        assert_eq!(dispatcher.ledger_capacity(), super::DEFAULT_LEDGER_CAPACITY);
    }
}
