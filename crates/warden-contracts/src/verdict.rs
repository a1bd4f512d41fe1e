//! Verdicts, severities, and per-rule outcomes.
//!
//! A rule answers every event with a `RuleOutcome`: a `Verdict` plus the
//! declarative actions it wants fired when that verdict is not `Allow`.
//! Verdicts combine by precedence, `Block > Warn > Allow`.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::action::Action;

/// Alert severity tier.
///
/// Ordered from least to most severe so that `max()` picks the most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Critical,
}

impl Severity {
    /// Presentation order: Critical first.
    pub const DESCENDING: [Severity; 3] = [Severity::Critical, Severity::Warning, Severity::Info];

    pub fn label(self) -> &'static str {
        match self {
            Severity::Critical => "CRITICAL",
            Severity::Warning => "WARNING",
            Severity::Info => "INFO",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// The answer a single rule (or the whole engine) gives for one event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "verdict", rename_all = "snake_case")]
pub enum Verdict {
    /// The event may proceed silently.
    Allow,

    /// The event may proceed but the operator must see `message`.
    Warn {
        message: String,
        severity: Severity,
    },

    /// The event must not proceed (pre-phase) or is flagged as a violation
    /// that already happened (post-phase).
    Block { message: String },
}

impl Verdict {
    pub fn warn(severity: Severity, message: impl Into<String>) -> Self {
        Verdict::Warn {
            message: message.into(),
            severity,
        }
    }

    pub fn block(message: impl Into<String>) -> Self {
        Verdict::Block {
            message: message.into(),
        }
    }

    pub fn is_allow(&self) -> bool {
        matches!(self, Verdict::Allow)
    }

    pub fn is_block(&self) -> bool {
        matches!(self, Verdict::Block { .. })
    }

    /// Precedence rank: `Allow` 0, `Warn` 1, `Block` 2.
    pub fn precedence(&self) -> u8 {
        match self {
            Verdict::Allow => 0,
            Verdict::Warn { .. } => 1,
            Verdict::Block { .. } => 2,
        }
    }

    /// Severity tier of this verdict; `Block` is always critical.
    pub fn severity(&self) -> Option<Severity> {
        match self {
            Verdict::Allow => None,
            Verdict::Warn { severity, .. } => Some(*severity),
            Verdict::Block { .. } => Some(Severity::Critical),
        }
    }

    pub fn message(&self) -> Option<&str> {
        match self {
            Verdict::Allow => None,
            Verdict::Warn { message, .. } | Verdict::Block { message } => Some(message),
        }
    }

    /// True if `self` must replace an earlier-registered `other` when reducing.
    ///
    /// Strictly higher precedence wins; between two warnings a strictly
    /// higher severity wins. Anything else keeps the earlier verdict.
    pub fn outranks(&self, other: &Verdict) -> bool {
        match (self, other) {
            (Verdict::Warn { severity: a, .. }, Verdict::Warn { severity: b, .. }) => a > b,
            _ => self.precedence() > other.precedence(),
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::Allow => f.write_str("ALLOW"),
            Verdict::Warn { message, severity } => write!(f, "WARN [{severity}] {message}"),
            Verdict::Block { message } => write!(f, "BLOCK {message}"),
        }
    }
}

/// What a rule returns: its verdict and the actions attached to it.
///
/// Actions on an `Allow` outcome are ignored by the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleOutcome {
    pub verdict: Verdict,
    pub actions: Vec<Action>,
}

impl RuleOutcome {
    pub fn allow() -> Self {
        Self::from(Verdict::Allow)
    }

    pub fn warn(severity: Severity, message: impl Into<String>) -> Self {
        Self::from(Verdict::warn(severity, message))
    }

    pub fn block(message: impl Into<String>) -> Self {
        Self::from(Verdict::block(message))
    }

    pub fn with_action(mut self, action: Action) -> Self {
        self.actions.push(action);
        self
    }

    pub fn with_actions(mut self, actions: impl IntoIterator<Item = Action>) -> Self {
        self.actions.extend(actions);
        self
    }
}

impl From<Verdict> for RuleOutcome {
    fn from(verdict: Verdict) -> Self {
        Self {
            verdict,
            actions: Vec::new(),
        }
    }
}
