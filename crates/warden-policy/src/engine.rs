//! Turning a `PolicyConfig` into a running engine.
//!
//! Build algorithm:
//!
//! 1. For each `RuleConfig`, in file order:
//!    a. Resolve its scope: the configured triggers, or the check type's
//!       default scope when none are given.
//!    b. Reject triggers the check cannot handle (a command pattern on a
//!       file write, say) with `ConfigError`.
//!    c. Compile its regexes; a bad pattern is a `ConfigError`.
//! 2. Register every rule. The first registration error aborts the build and
//!    no registry is produced.

use std::{
    path::{Component, Path},
    sync::Arc,
};

use chrono::Duration;
use regex::Regex;
use tracing::{debug, info};

use warden_contracts::{
    error::{WardenError, WardenResult},
    event::{EventKind, Phase},
    scope::Scope,
};
use warden_core::{
    traits::{Clock, Rule, SideEffectHandler},
    ActionDispatcher, DecisionEngine, EventHistory, RuleRegistry, StalenessTracker, Warden,
};

use crate::{
    config::{CheckConfig, PolicyConfig, RuleConfig},
    rule::{Check, PolicyRule},
};

/// Build the rule registry described by `config`. All or nothing.
pub fn build_registry(config: &PolicyConfig) -> WardenResult<RuleRegistry> {
    let rules = config
        .rules
        .iter()
        .map(|rc| compile_rule(rc).map(|rule| Box::new(rule) as Box<dyn Rule>))
        .collect::<WardenResult<Vec<_>>>()?;

    let registry = RuleRegistry::from_rules(rules)?;
    info!(rules = registry.len(), "rule registry built");
    Ok(registry)
}

/// Build a `DecisionEngine` over a fresh registry, honoring `settings`.
pub fn build_engine(config: &PolicyConfig) -> WardenResult<DecisionEngine> {
    let registry = Arc::new(build_registry(config)?);
    Ok(DecisionEngine::new(registry).with_parallel_evaluation(config.settings.parallel_evaluation))
}

/// Build the full host pipeline: engine, fresh tracker and history, the
/// given side-effect handler and clock, and the configured watched paths.
pub fn build_warden(
    config: &PolicyConfig,
    handler: Box<dyn SideEffectHandler>,
    clock: Box<dyn Clock>,
) -> WardenResult<Warden> {
    let engine = build_engine(config)?;
    let mut warden = Warden::new(
        engine,
        Arc::new(StalenessTracker::new()),
        EventHistory::new(config.settings.history_limit),
        ActionDispatcher::with_ledger_capacity(handler, config.settings.dispatch_ledger_limit),
        clock,
    );
    for watched in &config.watched {
        if let Some(path) = &watched.path {
            warden = warden.watch_path(watched.name.clone(), path.clone());
        }
    }
    Ok(warden)
}

/// Compile one configured rule.
pub fn compile_rule(config: &RuleConfig) -> WardenResult<PolicyRule> {
    let scope = match &config.triggers {
        Some(triggers) => triggers.iter().copied().collect(),
        None => default_scope(&config.check),
    };

    for trigger in scope.iter() {
        if !supports(&config.check, trigger.kind) {
            return Err(config_error(
                &config.id,
                format!(
                    "{} check cannot apply to {} events",
                    config.check.type_name(),
                    trigger.kind
                ),
            ));
        }
    }

    let check = compile_check(&config.id, &config.check)?;

    debug!(
        rule_id = %config.id,
        check = config.check.type_name(),
        "rule compiled"
    );

    Ok(PolicyRule::new(
        config.id.clone(),
        config.description.clone(),
        scope,
        config.actions.clone(),
        check,
    ))
}

/// The scope a check gets when the rule lists no triggers.
pub fn default_scope(check: &CheckConfig) -> Scope {
    let file_changes = |phase| {
        Scope::new()
            .with(EventKind::FileWrite, phase)
            .with(EventKind::FileEdit, phase)
    };
    match check {
        CheckConfig::PathRestriction { .. } | CheckConfig::ContentPattern { .. } => {
            file_changes(Phase::Pre)
        }
        CheckConfig::DocTrigger { .. } | CheckConfig::TaskReminder { .. } => {
            file_changes(Phase::Post)
        }
        CheckConfig::CommandPattern { .. } => Scope::new().with(EventKind::Command, Phase::Pre),
        CheckConfig::Staleness { .. } => Scope::new().with(EventKind::Command, Phase::Post),
    }
}

/// Whether `check` can be evaluated against events of `kind`.
fn supports(check: &CheckConfig, kind: EventKind) -> bool {
    match check {
        CheckConfig::PathRestriction { .. }
        | CheckConfig::ContentPattern { .. }
        | CheckConfig::DocTrigger { .. } => kind.is_file_change(),
        CheckConfig::CommandPattern { .. } => kind == EventKind::Command,
        CheckConfig::Staleness { .. } | CheckConfig::TaskReminder { .. } => true,
    }
}

fn compile_check(rule_id: &str, check: &CheckConfig) -> WardenResult<Check> {
    let regex = |pattern: &str| {
        Regex::new(pattern).map_err(|e| {
            config_error(rule_id, format!("invalid pattern '{}': {}", pattern, e))
        })
    };

    let compiled = match check {
        CheckConfig::PathRestriction {
            file_pattern,
            required_dir,
            message,
        } => Check::PathRestriction {
            file_pattern: regex(file_pattern)?,
            required_dir: dir_components(rule_id, required_dir)?,
            message: message
                .clone()
                .unwrap_or_else(|| format!("files matching '{file_pattern}' must be under {required_dir}/")),
        },

        CheckConfig::Staleness {
            resource,
            threshold_minutes,
            severity,
            message,
            warn_when_untracked,
        } => {
            let minutes = i64::try_from(*threshold_minutes)
                .ok()
                .and_then(Duration::try_minutes)
                .ok_or_else(|| config_error(rule_id, "threshold_minutes out of range"))?;
            Check::Staleness {
                resource: resource.clone(),
                threshold: minutes,
                severity: *severity,
                message: message.clone().unwrap_or_else(|| {
                    format!("{resource} not updated in over {threshold_minutes} minutes")
                }),
                warn_when_untracked: *warn_when_untracked,
            }
        }

        CheckConfig::CommandPattern {
            pattern,
            verdict,
            severity,
            message,
        } => Check::CommandPattern {
            pattern: regex(pattern)?,
            verdict: *verdict,
            severity: *severity,
            message: message
                .clone()
                .unwrap_or_else(|| format!("command matches restricted pattern '{pattern}'")),
        },

        CheckConfig::ContentPattern {
            pattern,
            verdict,
            severity,
            message,
        } => Check::ContentPattern {
            pattern: regex(pattern)?,
            verdict: *verdict,
            severity: *severity,
            message: message
                .clone()
                .unwrap_or_else(|| format!("content matches restricted pattern '{pattern}'")),
        },

        CheckConfig::DocTrigger {
            path_pattern,
            generator,
            args,
            severity,
            message,
        } => {
            if generator.trim().is_empty() {
                return Err(config_error(rule_id, "doc-trigger requires a generator"));
            }
            Check::DocTrigger {
                path_pattern: regex(path_pattern)?,
                generator: generator.clone(),
                args: args.clone(),
                severity: *severity,
                message: message.clone(),
            }
        }

        CheckConfig::TaskReminder {
            window,
            min_edits,
            severity,
            message,
        } => {
            if *min_edits == 0 {
                return Err(config_error(rule_id, "task-reminder min_edits must be at least 1"));
            }
            Check::TaskReminder {
                window: *window,
                min_edits: *min_edits,
                severity: *severity,
                message: message.clone().unwrap_or_else(|| {
                    format!("{min_edits} or more file changes without a task list update")
                }),
            }
        }
    };

    Ok(compiled)
}

/// Split `required_dir` into plain directory names. `tests/unit` and
/// `tests/unit/` both give `["tests", "unit"]`.
fn dir_components(rule_id: &str, required_dir: &str) -> WardenResult<Vec<String>> {
    let path = Path::new(required_dir);
    let mut components = Vec::new();
    for component in path.components() {
        match component {
            Component::Normal(name) => components.push(name.to_string_lossy().into_owned()),
            Component::CurDir => {}
            _ => {
                return Err(config_error(
                    rule_id,
                    format!("required_dir '{required_dir}' must be a relative directory without '..'"),
                ))
            }
        }
    }
    if components.is_empty() {
        return Err(config_error(rule_id, "required_dir must not be empty"));
    }
    Ok(components)
}

fn config_error(rule_id: &str, reason: impl std::fmt::Display) -> WardenError {
    WardenError::ConfigError {
        reason: format!("rule '{}': {}", rule_id, reason),
    }
}
