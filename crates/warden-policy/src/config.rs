//! Policy configuration schema.
//!
//! A `PolicyConfig` is deserialized from TOML and holds engine settings, the
//! watched resources, and an ordered list of `RuleConfig`s. Rule order in
//! the file is registration order: it decides evaluation order and breaks
//! ties between otherwise-equal verdicts.
//!
//! Example:
//! ```toml
//! [settings]
//! history_limit = 20
//!
//! [[watched]]
//! name = "status-doc"
//! path = "docs/STATUS.md"
//!
//! [[rules]]
//! id = "tests-dir"
//! description = "Test files live under tests/"
//! triggers = [{ kind = "file-write", phase = "pre" }]
//!
//! [rules.check]
//! type = "path-restriction"
//! file_pattern = '^test_.*\.py$'
//! required_dir = "tests"
//! message = "test files must be under tests/"
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use warden_contracts::{
    action::Action,
    error::{WardenError, WardenResult},
    scope::Trigger,
    verdict::Severity,
};
use warden_core::dispatch::DEFAULT_LEDGER_CAPACITY;

/// Engine-wide settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// How many recent events each snapshot carries.
    pub history_limit: usize,
    /// Evaluate applicable rules on the rayon pool.
    pub parallel_evaluation: bool,
    /// How many events the dispatcher remembers successful actions for.
    pub dispatch_ledger_limit: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            history_limit: 20,
            parallel_evaluation: false,
            dispatch_ledger_limit: DEFAULT_LEDGER_CAPACITY,
        }
    }
}

/// A named resource whose last-update time is tracked.
///
/// When `path` is set, a completed write or edit of that path counts as an
/// update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatchedResource {
    pub name: String,
    pub path: Option<String>,
}

/// Which verdict a pattern check produces on a match.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MatchVerdict {
    Block,
    #[default]
    Warn,
}

fn critical() -> Severity {
    Severity::Critical
}

fn warning() -> Severity {
    Severity::Warning
}

fn info() -> Severity {
    Severity::Info
}

/// The check a configured rule performs.
///
/// Expressed in TOML as a `[rules.check]` table whose `type` selects the
/// variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum CheckConfig {
    /// Files whose name matches `file_pattern` must sit under `required_dir`,
    /// which may span several components (`tests/unit`).
    PathRestriction {
        file_pattern: String,
        required_dir: String,
        message: Option<String>,
    },

    /// Warn when `resource` has not been updated for `threshold_minutes`.
    Staleness {
        resource: String,
        threshold_minutes: u64,
        #[serde(default = "critical")]
        severity: Severity,
        message: Option<String>,
        /// Also warn when the resource has never been updated.
        #[serde(default)]
        warn_when_untracked: bool,
    },

    /// Flag commands matching `pattern`.
    CommandPattern {
        pattern: String,
        #[serde(default)]
        verdict: MatchVerdict,
        #[serde(default = "warning")]
        severity: Severity,
        message: Option<String>,
    },

    /// Flag written content matching `pattern` (comment policy and the like).
    ContentPattern {
        pattern: String,
        #[serde(default)]
        verdict: MatchVerdict,
        #[serde(default = "warning")]
        severity: Severity,
        message: Option<String>,
    },

    /// Schedule an external generator when a matching path changes.
    DocTrigger {
        path_pattern: String,
        generator: String,
        #[serde(default)]
        args: Vec<String>,
        #[serde(default = "info")]
        severity: Severity,
        message: Option<String>,
    },

    /// Remind the operator to update the task list after a run of edits.
    /// `window` counts completed (post-phase) events only.
    TaskReminder {
        window: usize,
        min_edits: usize,
        #[serde(default = "warning")]
        severity: Severity,
        message: Option<String>,
    },
}

impl CheckConfig {
    /// Kebab-case name of the check type, for logs and errors.
    pub fn type_name(&self) -> &'static str {
        match self {
            CheckConfig::PathRestriction { .. } => "path-restriction",
            CheckConfig::Staleness { .. } => "staleness",
            CheckConfig::CommandPattern { .. } => "command-pattern",
            CheckConfig::ContentPattern { .. } => "content-pattern",
            CheckConfig::DocTrigger { .. } => "doc-trigger",
            CheckConfig::TaskReminder { .. } => "task-reminder",
        }
    }
}

/// A single rule loaded from TOML.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleConfig {
    /// Stable identifier used in decisions, alerts and logs.
    pub id: String,

    /// Human-readable explanation of what this rule enforces.
    #[serde(default)]
    pub description: String,

    /// (kind, phase) pairs the rule applies to. When omitted, the check
    /// type's default scope is used; an explicit empty list is rejected.
    pub triggers: Option<Vec<Trigger>>,

    /// Extra actions attached to every non-`Allow` outcome of this rule.
    #[serde(default)]
    pub actions: Vec<Action>,

    pub check: CheckConfig,
}

/// The top-level structure deserialized from a TOML policy file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyConfig {
    #[serde(default)]
    pub settings: Settings,

    #[serde(default)]
    pub watched: Vec<WatchedResource>,

    /// Ordered list of rules. Order is registration order.
    #[serde(default)]
    pub rules: Vec<RuleConfig>,
}

impl PolicyConfig {
    /// Parse `s` as TOML.
    ///
    /// Returns `WardenError::ConfigError` if the TOML is malformed or does
    /// not match the schema.
    pub fn from_toml_str(s: &str) -> WardenResult<Self> {
        toml::from_str(s).map_err(|e| WardenError::ConfigError {
            reason: format!("failed to parse policy TOML: {}", e),
        })
    }

    /// Read and parse the policy file at `path`.
    pub fn from_file(path: &Path) -> WardenResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| WardenError::ConfigError {
            reason: format!("failed to read policy file '{}': {}", path.display(), e),
        })?;
        Self::from_toml_str(&contents)
    }
}
