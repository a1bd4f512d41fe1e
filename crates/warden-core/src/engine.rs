//! The WARDEN decision engine.
//!
//! The engine enforces the decide half of the decide-then-dispatch model:
//!
//!   Event → Registry lookup → evaluate every rule → reduce → Decision
//!
//! `decide()` is effect-free and infallible. A rule that errors or panics is
//! never allowed to silently permit an event: in the pre phase it becomes a
//! `Block`, in the post phase (where the edit already happened and nothing
//! can be undone) it becomes a critical `Warn`.

use std::{
    any::Any,
    collections::HashSet,
    panic::{self, AssertUnwindSafe},
    sync::Arc,
};

use rayon::prelude::*;
use tracing::{debug, error, info, warn};

use warden_contracts::{
    decision::{Decision, RuleFinding},
    error::WardenError,
    event::{Event, Phase},
    snapshot::StateSnapshot,
    verdict::{RuleOutcome, Severity, Verdict},
};

use crate::{registry::RuleRegistry, traits::Rule};

/// Runs every applicable rule for an event and combines the verdicts.
///
/// Construct once at startup with the shared registry; `decide()` takes
/// `&self` and may be called from many threads.
#[derive(Debug, Clone)]
pub struct DecisionEngine {
    registry: Arc<RuleRegistry>,
    parallel: bool,
}

impl DecisionEngine {
    /// Create an engine that evaluates rules sequentially.
    pub fn new(registry: Arc<RuleRegistry>) -> Self {
        Self {
            registry,
            parallel: false,
        }
    }

    /// Evaluate applicable rules on the rayon pool instead of in a loop.
    ///
    /// Results are collected in registration order either way, so the
    /// decision is identical.
    pub fn with_parallel_evaluation(mut self, enabled: bool) -> Self {
        self.parallel = enabled;
        self
    }

    pub fn registry(&self) -> &RuleRegistry {
        &self.registry
    }

    /// Decide `event` against `snapshot`.
    ///
    /// # Algorithm
    ///
    /// 1. Look up rules for `(event.kind, event.phase)`.
    /// 2. Evaluate each one; failures become `Block` (pre) or critical `Warn` (post).
    /// 3. Reduce: `Block > Warn > Allow`. Between two warnings the higher
    ///    severity wins. Remaining ties keep the earlier-registered rule.
    /// 4. Collect actions from every non-`Allow` outcome in registration
    ///    order, keeping the first occurrence of each action id.
    pub fn decide(&self, event: &Event, snapshot: &StateSnapshot) -> Decision {
        let rules = self.registry.lookup(event.kind(), event.phase());

        debug!(
            event_id = %event.id(),
            kind = %event.kind(),
            phase = %event.phase(),
            rule_count = rules.len(),
            "decision cycle starting"
        );

        if rules.is_empty() {
            return Decision::allow(event.id(), event.phase());
        }

        let outcomes: Vec<RuleOutcome> = if self.parallel {
            rules
                .par_iter()
                .map(|rule| evaluate_rule(*rule, event, snapshot))
                .collect()
        } else {
            rules
                .iter()
                .map(|rule| evaluate_rule(*rule, event, snapshot))
                .collect()
        };

        let decision = reduce(event, &rules, outcomes);

        match &decision.verdict {
            Verdict::Allow => debug!(event_id = %event.id(), "event allowed"),
            Verdict::Warn { severity, message } => info!(
                event_id = %event.id(),
                severity = %severity,
                message = %message,
                "event allowed with warning"
            ),
            Verdict::Block { message } => warn!(
                event_id = %event.id(),
                phase = %event.phase(),
                message = %message,
                "event blocked"
            ),
        }

        decision
    }
}

/// Fold per-rule outcomes (in registration order) into one `Decision`.
fn reduce(event: &Event, rules: &[&dyn Rule], outcomes: Vec<RuleOutcome>) -> Decision {
    let mut verdict = Verdict::Allow;
    let mut findings = Vec::new();
    let mut triggered_actions = Vec::new();
    let mut seen_actions = HashSet::new();

    for (rule, outcome) in rules.iter().zip(outcomes) {
        if outcome.verdict.is_allow() {
            continue;
        }
        if outcome.verdict.outranks(&verdict) {
            verdict = outcome.verdict.clone();
        }

        findings.push(RuleFinding {
            rule_id: rule.id().to_string(),
            verdict: outcome.verdict,
            action_ids: outcome.actions.iter().map(|a| a.id.clone()).collect(),
        });

        for action in outcome.actions {
            if seen_actions.insert(action.id.clone()) {
                triggered_actions.push(action);
            } else {
                debug!(
                    rule_id = %rule.id(),
                    action_id = %action.id,
                    "duplicate action collapsed"
                );
            }
        }
    }

    Decision {
        event_id: event.id(),
        phase: event.phase(),
        verdict,
        triggered_actions,
        evaluated_rule_ids: rules.iter().map(|r| r.id().to_string()).collect(),
        findings,
    }
}

/// Evaluate one rule, converting errors and panics into a fail-safe outcome.
fn evaluate_rule(rule: &dyn Rule, event: &Event, snapshot: &StateSnapshot) -> RuleOutcome {
    let result = panic::catch_unwind(AssertUnwindSafe(|| rule.evaluate(event, snapshot)));

    let failure = match result {
        Ok(Ok(outcome)) => return outcome,
        Ok(Err(err)) => err,
        Err(payload) => WardenError::RuleEvaluationFailed {
            rule_id: rule.id().to_string(),
            reason: format!("panicked: {}", panic_message(payload.as_ref())),
        },
    };

    error!(
        rule_id = %rule.id(),
        event_id = %event.id(),
        phase = %event.phase(),
        error = %failure,
        "rule evaluation failed"
    );
    failure_outcome(rule.id(), event.phase())
}

/// Pre phase fails closed; post phase fails visible.
fn failure_outcome(rule_id: &str, phase: Phase) -> RuleOutcome {
    let message = format!("rule evaluation failed: {rule_id}");
    match phase {
        Phase::Pre => RuleOutcome::block(message),
        Phase::Post => RuleOutcome::warn(Severity::Critical, message),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────
