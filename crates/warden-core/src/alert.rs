//! Alert classification.
//!
//! Maps each finding in a `Decision` to a severity tier and groups them,
//! Critical first, preserving the engine's registration order inside each
//! group. `Block` is always Critical; `Warn` carries the severity its rule
//! author chose; `Allow` produces nothing.

use warden_contracts::{
    alert::{AlertGroup, AlertItem, AlertSummary},
    decision::Decision,
    verdict::{Severity, Verdict},
};

/// Severity of a single verdict, or `None` for `Allow`.
pub fn severity_of(verdict: &Verdict) -> Option<Severity> {
    verdict.severity()
}

/// Build the severity-grouped summary for `decision`.
pub fn classify(decision: &Decision) -> AlertSummary {
    let groups = Severity::DESCENDING
        .iter()
        .filter_map(|&severity| {
            let items: Vec<AlertItem> = decision
                .findings
                .iter()
                .filter(|f| severity_of(&f.verdict) == Some(severity))
                .map(|f| AlertItem {
                    rule_id: f.rule_id.clone(),
                    message: f.verdict.message().unwrap_or_default().to_string(),
                    blocking: f.verdict.is_block(),
                    action_ids: f.action_ids.clone(),
                })
                .collect();
            (!items.is_empty()).then_some(AlertGroup { severity, items })
        })
        .collect();

    AlertSummary { groups }
}
