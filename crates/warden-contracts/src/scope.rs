//! The (kind, phase) pairs a rule applies to.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::event::{EventKind, Phase};

/// A single (event kind, phase) pair.
///
/// In TOML: `{ kind = "file-write", phase = "pre" }`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Trigger {
    pub kind: EventKind,
    pub phase: Phase,
}

impl Trigger {
    pub fn new(kind: EventKind, phase: Phase) -> Self {
        Self { kind, phase }
    }
}

/// The set of triggers a rule applies to.
///
/// The registry rejects rules whose scope is empty.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Scope {
    triggers: BTreeSet<Trigger>,
}

impl Scope {
    pub fn new() -> Self {
        Self::default()
    }

    /// A scope covering `kind` in both phases.
    pub fn both_phases(kind: EventKind) -> Self {
        [Trigger::new(kind, Phase::Pre), Trigger::new(kind, Phase::Post)]
            .into_iter()
            .collect()
    }

    pub fn with(mut self, kind: EventKind, phase: Phase) -> Self {
        self.triggers.insert(Trigger::new(kind, phase));
        self
    }

    pub fn contains(&self, kind: EventKind, phase: Phase) -> bool {
        self.triggers.contains(&Trigger::new(kind, phase))
    }

    pub fn is_empty(&self) -> bool {
        self.triggers.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Trigger> {
        self.triggers.iter()
    }
}

impl FromIterator<Trigger> for Scope {
    fn from_iter<I: IntoIterator<Item = Trigger>>(iter: I) -> Self {
        Self {
            triggers: iter.into_iter().collect(),
        }
    }
}
