//! Severity-grouped alert summaries.
//!
//! The alert classifier turns a `Decision` into an `AlertSummary`: findings
//! grouped by severity, Critical first. The summary serializes to JSON for
//! machines and renders as plain text for operators.

use std::fmt;

use serde::Serialize;

use crate::verdict::Severity;

/// One triggered item in an alert summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AlertItem {
    pub rule_id: String,
    pub message: String,
    /// True when the underlying verdict was a `Block`.
    pub blocking: bool,
    /// Ids of the actions the rule attached.
    pub action_ids: Vec<String>,
}

/// All items sharing one severity, in engine order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AlertGroup {
    pub severity: Severity,
    pub items: Vec<AlertItem>,
}

/// Alerts for one decision, grouped Critical → Warning → Info.
///
/// Empty groups are omitted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AlertSummary {
    pub groups: Vec<AlertGroup>,
}

impl AlertSummary {
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// The most severe tier present, if any.
    pub fn highest(&self) -> Option<Severity> {
        self.groups.first().map(|g| g.severity)
    }

    pub fn count(&self, severity: Severity) -> usize {
        self.groups
            .iter()
            .find(|g| g.severity == severity)
            .map_or(0, |g| g.items.len())
    }

    pub fn total(&self) -> usize {
        self.groups.iter().map(|g| g.items.len()).sum()
    }
}

impl fmt::Display for AlertSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.groups.is_empty() {
            return f.write_str("no alerts");
        }
        for (i, group) in self.groups.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{} ({})", group.severity, group.items.len())?;
            for item in &group.items {
                write!(f, "\n  [{}] {}", item.rule_id, item.message)?;
                if item.blocking {
                    f.write_str(" (blocked)")?;
                }
                if !item.action_ids.is_empty() {
                    write!(f, " -> {}", item.action_ids.join(", "))?;
                }
            }
        }
        Ok(())
    }
}
