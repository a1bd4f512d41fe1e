//! The engine's final answer for one event.
//!
//! `Decision` is what `DecisionEngine::decide()` returns to the caller. It is
//! built once and never mutated; the caller persists it or drops it.

use serde::Serialize;

use crate::{
    action::Action,
    event::{EventId, Phase},
    verdict::Verdict,
};

/// One rule's non-`Allow` contribution to a decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RuleFinding {
    /// The rule that produced the verdict.
    pub rule_id: String,
    /// The rule's own verdict (never `Allow`).
    pub verdict: Verdict,
    /// Ids of the actions this rule attached, in the order it attached them.
    pub action_ids: Vec<String>,
}

/// The combined outcome of every rule applicable to an event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Decision {
    /// The event this decision answers.
    pub event_id: EventId,
    /// The phase the event was intercepted in.
    pub phase: Phase,
    /// Precedence-maximum of all rule verdicts, or `Allow` if none fired.
    pub verdict: Verdict,
    /// Actions from every non-`Allow` outcome, in registration order,
    /// deduplicated by `Action::id` (first occurrence kept).
    pub triggered_actions: Vec<Action>,
    /// Every rule that was evaluated, in registration order.
    pub evaluated_rule_ids: Vec<String>,
    /// Every non-`Allow` rule verdict, in registration order.
    pub findings: Vec<RuleFinding>,
}

impl Decision {
    /// A decision for an event no rule applied to.
    pub fn allow(event_id: EventId, phase: Phase) -> Self {
        Self {
            event_id,
            phase,
            verdict: Verdict::Allow,
            triggered_actions: Vec::new(),
            evaluated_rule_ids: Vec::new(),
            findings: Vec::new(),
        }
    }

    /// True when the host must refuse to perform the action.
    pub fn is_blocked(&self) -> bool {
        self.verdict.is_block()
    }
}
