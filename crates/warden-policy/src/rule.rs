//! Configurable compliance checks.
//!
//! Every configured rule becomes a `PolicyRule`: an id, a scope, the actions
//! configured for it, and one compiled `Check`. Regexes are compiled once
//! when the rule is built, so evaluation never fails on a bad pattern.

use std::path::{Component, Path};

use chrono::Duration;
use regex::Regex;
use serde_json::json;
use tracing::trace;

use warden_contracts::{
    action::{Action, ActionEffect},
    error::{WardenError, WardenResult},
    event::{Event, EventKind, Phase},
    scope::Scope,
    snapshot::{ResourceAge, StateSnapshot},
    verdict::{RuleOutcome, Severity},
};
use warden_core::traits::Rule;

use crate::config::MatchVerdict;

/// A compiled check, evaluated by the `PolicyRule` that owns it.
#[derive(Debug)]
pub enum Check {
    PathRestriction {
        file_pattern: Regex,
        /// Directory components that must appear, in order, among the
        /// file's parents.
        required_dir: Vec<String>,
        message: String,
    },
    Staleness {
        resource: String,
        threshold: Duration,
        severity: Severity,
        message: String,
        warn_when_untracked: bool,
    },
    CommandPattern {
        pattern: Regex,
        verdict: MatchVerdict,
        severity: Severity,
        message: String,
    },
    ContentPattern {
        pattern: Regex,
        verdict: MatchVerdict,
        severity: Severity,
        message: String,
    },
    DocTrigger {
        path_pattern: Regex,
        generator: String,
        args: Vec<String>,
        severity: Severity,
        message: Option<String>,
    },
    TaskReminder {
        window: usize,
        min_edits: usize,
        severity: Severity,
        message: String,
    },
}

/// A rule built from configuration.
#[derive(Debug)]
pub struct PolicyRule {
    id: String,
    description: String,
    scope: Scope,
    actions: Vec<Action>,
    check: Check,
}

impl PolicyRule {
    pub fn new(
        id: impl Into<String>,
        description: impl Into<String>,
        scope: Scope,
        actions: Vec<Action>,
        check: Check,
    ) -> Self {
        Self {
            id: id.into(),
            description: description.into(),
            scope,
            actions,
            check,
        }
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn check(&self) -> &Check {
        &self.check
    }

    fn missing(&self, field: &str, event: &Event) -> WardenError {
        WardenError::RuleEvaluationFailed {
            rule_id: self.id.clone(),
            reason: format!("{} event carries no {}", event.kind(), field),
        }
    }

    fn run_check(&self, event: &Event, snapshot: &StateSnapshot) -> WardenResult<RuleOutcome> {
        match &self.check {
            Check::PathRestriction {
                file_pattern,
                required_dir,
                message,
            } => {
                let path = event
                    .target_path()
                    .ok_or_else(|| self.missing("target path", event))?;
                let path = Path::new(path);
                let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
                    return Ok(RuleOutcome::allow());
                };
                if !file_pattern.is_match(file_name) || under_dir(path, required_dir) {
                    return Ok(RuleOutcome::allow());
                }
                Ok(RuleOutcome::block(message.clone()))
            }

            Check::Staleness {
                resource,
                threshold,
                severity,
                message,
                warn_when_untracked,
            } => match snapshot.age_of(resource) {
                ResourceAge::Known(age) if age > *threshold => {
                    Ok(RuleOutcome::warn(*severity, message.clone()).with_action(Action::new(
                        format!("stale:{resource}"),
                        ActionEffect::RaiseStalenessAlert,
                        json!({
                            "resource": resource,
                            "age_minutes": age.num_minutes(),
                            "threshold_minutes": threshold.num_minutes(),
                        }),
                    )))
                }
                ResourceAge::Unknown if *warn_when_untracked => Ok(RuleOutcome::warn(
                    Severity::Warning,
                    format!("{resource} has never been updated"),
                )),
                _ => Ok(RuleOutcome::allow()),
            },

            Check::CommandPattern {
                pattern,
                verdict,
                severity,
                message,
            } => {
                let command = event
                    .command_text()
                    .ok_or_else(|| self.missing("command text", event))?;
                Ok(match_outcome(pattern.is_match(command), *verdict, *severity, message))
            }

            Check::ContentPattern {
                pattern,
                verdict,
                severity,
                message,
            } => {
                let Some(content) = event.content() else {
                    return Ok(RuleOutcome::allow());
                };
                Ok(match_outcome(pattern.is_match(content), *verdict, *severity, message))
            }

            Check::DocTrigger {
                path_pattern,
                generator,
                args,
                severity,
                message,
            } => {
                let path = event
                    .target_path()
                    .ok_or_else(|| self.missing("target path", event))?;
                if !path_pattern.is_match(path) {
                    return Ok(RuleOutcome::allow());
                }
                let message = message
                    .clone()
                    .unwrap_or_else(|| format!("{path} changed; running {generator}"));
                Ok(RuleOutcome::warn(*severity, message).with_action(Action::new(
                    format!("generate:{}", self.id),
                    ActionEffect::InvokeExternalGenerator,
                    json!({ "generator": generator, "args": args, "path": path }),
                )))
            }

            Check::TaskReminder {
                window,
                min_edits,
                severity,
                message,
            } => {
                if event.kind() == EventKind::TaskUpdate {
                    return Ok(RuleOutcome::allow());
                }
                // Only completed events count, so a change decided at both
                // Pre and Post is one edit.
                let completed: Vec<&Event> = snapshot
                    .recent_events
                    .iter()
                    .filter(|e| e.phase() == Phase::Post)
                    .collect();
                let start = completed.len().saturating_sub(*window);
                let mut edits =
                    usize::from(event.phase() == Phase::Post && event.kind().is_file_change());
                for past in &completed[start..] {
                    match past.kind() {
                        EventKind::TaskUpdate => return Ok(RuleOutcome::allow()),
                        kind if kind.is_file_change() => edits += 1,
                        _ => {}
                    }
                }
                trace!(rule_id = %self.id, edits, "task reminder window scanned");
                if edits >= *min_edits {
                    Ok(RuleOutcome::warn(*severity, message.clone()))
                } else {
                    Ok(RuleOutcome::allow())
                }
            }
        }
    }
}

impl Rule for PolicyRule {
    fn id(&self) -> &str {
        &self.id
    }

    fn applies_to(&self) -> &Scope {
        &self.scope
    }

    fn watched_resources(&self) -> Vec<String> {
        match &self.check {
            Check::Staleness { resource, .. } => vec![resource.clone()],
            _ => Vec::new(),
        }
    }

    fn evaluate(&self, event: &Event, snapshot: &StateSnapshot) -> WardenResult<RuleOutcome> {
        let outcome = self.run_check(event, snapshot)?;
        if outcome.verdict.is_allow() || self.actions.is_empty() {
            return Ok(outcome);
        }
        Ok(outcome.with_actions(self.actions.iter().cloned()))
    }
}

fn match_outcome(
    matched: bool,
    verdict: MatchVerdict,
    severity: Severity,
    message: &str,
) -> RuleOutcome {
    match (matched, verdict) {
        (false, _) => RuleOutcome::allow(),
        (true, MatchVerdict::Block) => RuleOutcome::block(message),
        (true, MatchVerdict::Warn) => RuleOutcome::warn(severity, message),
    }
}

/// True if the components of `dir` appear as a contiguous run among the
/// parent directories of `path`.
fn under_dir(path: &Path, dir: &[String]) -> bool {
    let Some(parent) = path.parent() else {
        return false;
    };
    let parents: Vec<&std::ffi::OsStr> = parent
        .components()
        .filter_map(|c| match c {
            Component::Normal(name) => Some(name),
            _ => None,
        })
        .collect();
    !dir.is_empty()
        && parents
            .windows(dir.len())
            .any(|run| run.iter().zip(dir).all(|(have, want)| *have == want.as_str()))
}
