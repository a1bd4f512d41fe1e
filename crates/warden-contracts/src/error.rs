//! Error types for the WARDEN rule engine.
//!
//! All fallible operations return `WardenResult<T>`. Configuration errors are
//! fatal at startup; per-event errors are folded into a `Decision` by the
//! engine and never escape `decide`.

use thiserror::Error;

/// The unified error type for the WARDEN runtime.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WardenError {
    /// An event violated its construction contract and was rejected at the boundary.
    #[error("malformed event: {reason}")]
    MalformedEvent { reason: String },

    /// A rule with this id is already registered.
    #[error("duplicate rule id '{rule_id}'")]
    DuplicateRuleId { rule_id: String },

    /// A rule declared no (kind, phase) pairs it applies to.
    #[error("rule '{rule_id}' has an empty scope")]
    EmptyScope { rule_id: String },

    /// A rule's predicate failed while evaluating an event.
    ///
    /// The engine converts this into a `Block` (pre-phase) or a critical
    /// `Warn` (post-phase); callers of `decide` never see it.
    #[error("rule '{rule_id}' failed to evaluate: {reason}")]
    RuleEvaluationFailed { rule_id: String, reason: String },

    /// A side-effect handler could not carry out an action.
    #[error("action '{action_id}' dispatch failed: {reason}")]
    ActionDispatchFailed { action_id: String, reason: String },

    /// A policy file is missing, unreadable, or invalid.
    #[error("configuration error: {reason}")]
    ConfigError { reason: String },
}

/// Convenience alias used throughout the WARDEN crates.
pub type WardenResult<T> = Result<T, WardenError>;
