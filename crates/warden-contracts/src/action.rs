//! Declarative follow-up actions.
//!
//! Rules never perform side effects. They describe what should happen as an
//! `Action`, and the dispatcher hands each one to the host's side-effect
//! handler after the decision is final.

use std::fmt;

use serde::{Deserialize, Serialize};

/// The kind of side effect an action requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ActionEffect {
    /// Write a message to an operator-facing channel.
    EmitMessage,
    /// Run an external generator (e.g. documentation or status report).
    InvokeExternalGenerator,
    /// Record that a watched resource has gone stale.
    RaiseStalenessAlert,
}

impl fmt::Display for ActionEffect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ActionEffect::EmitMessage => "emit-message",
            ActionEffect::InvokeExternalGenerator => "invoke-external-generator",
            ActionEffect::RaiseStalenessAlert => "raise-staleness-alert",
        })
    }
}

/// A side effect to perform once a decision is made.
///
/// `id` is the deduplication key: within one decision, two actions with the
/// same id are the same action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Action {
    pub id: String,
    pub effect: ActionEffect,
    /// Effect-specific arguments, opaque to the engine.
    #[serde(default)]
    pub payload: serde_json::Value,
}

impl Action {
    pub fn new(id: impl Into<String>, effect: ActionEffect, payload: serde_json::Value) -> Self {
        Self {
            id: id.into(),
            effect,
            payload,
        }
    }

    /// An `EmitMessage` action whose payload is `{ "message": ... }`.
    pub fn emit_message(id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(
            id,
            ActionEffect::EmitMessage,
            serde_json::json!({ "message": message.into() }),
        )
    }
}
