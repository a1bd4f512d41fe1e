//! The rule registry.
//!
//! Assembled once at startup and immutable afterwards; the engine holds it
//! behind an `Arc`. Registration order is significant: it is the order rules
//! are evaluated in and the tie-break when two verdicts are otherwise equal.

use std::collections::{BTreeSet, HashSet};

use tracing::{debug, warn};

use warden_contracts::{
    error::{WardenError, WardenResult},
    event::{EventKind, Phase},
};

use crate::traits::Rule;

/// Ordered, id-unique collection of rules.
#[derive(Default)]
pub struct RuleRegistry {
    rules: Vec<Box<dyn Rule>>,
    ids: HashSet<String>,
}

impl RuleRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from `rules`, all or nothing.
    ///
    /// The first registration error is returned and no registry is produced.
    pub fn from_rules(rules: impl IntoIterator<Item = Box<dyn Rule>>) -> WardenResult<Self> {
        let mut registry = Self::new();
        for rule in rules {
            registry.register(rule)?;
        }
        Ok(registry)
    }

    /// Append `rule`.
    ///
    /// Fails with `EmptyScope` if the rule applies to nothing and with
    /// `DuplicateRuleId` if its id is taken. A failed call leaves the
    /// registry unchanged.
    pub fn register(&mut self, rule: Box<dyn Rule>) -> WardenResult<()> {
        let rule_id = rule.id().to_string();

        if rule.applies_to().is_empty() {
            warn!(rule_id = %rule_id, "rejecting rule with empty scope");
            return Err(WardenError::EmptyScope { rule_id });
        }
        if self.ids.contains(&rule_id) {
            warn!(rule_id = %rule_id, "rejecting duplicate rule id");
            return Err(WardenError::DuplicateRuleId { rule_id });
        }

        debug!(
            rule_id = %rule_id,
            triggers = rule.applies_to().iter().count(),
            position = self.rules.len(),
            "rule registered"
        );
        self.ids.insert(rule_id);
        self.rules.push(rule);
        Ok(())
    }

    /// Rules applicable to `(kind, phase)`, in registration order.
    pub fn lookup(&self, kind: EventKind, phase: Phase) -> Vec<&dyn Rule> {
        self.rules
            .iter()
            .filter(|rule| rule.applies_to().contains(kind, phase))
            .map(|rule| rule.as_ref())
            .collect()
    }

    /// Every watched resource any registered rule reads, sorted and unique.
    pub fn watched_resources(&self) -> Vec<String> {
        self.rules
            .iter()
            .flat_map(|rule| rule.watched_resources())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    pub fn contains(&self, rule_id: &str) -> bool {
        self.ids.contains(rule_id)
    }

    /// Rule ids in registration order.
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.rules.iter().map(|rule| rule.id())
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

impl std::fmt::Debug for RuleRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuleRegistry")
            .field("rules", &self.ids().collect::<Vec<_>>())
            .finish()
    }
}
