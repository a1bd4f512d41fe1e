//! Intercepted tool-invocation events.
//!
//! An `Event` is the engine's only view of what the host tool is about to do
//! (pre-phase) or has just done (post-phase). Events are validated at
//! construction and immutable afterwards: fields are private and exposed
//! through accessors only.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{WardenError, WardenResult};

/// Unique identifier for a single intercepted event.
///
/// Keys dispatch idempotence: the dispatcher never re-runs an action that
/// already succeeded for the same `EventId`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EventId(pub uuid::Uuid);

impl EventId {
    /// Create a new, unique event ID.
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }
}

impl Default for EventId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// The kind of tool action being intercepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EventKind {
    FileWrite,
    FileEdit,
    Command,
    TaskUpdate,
}

impl EventKind {
    /// Every kind, in declaration order.
    pub const ALL: [EventKind; 4] = [
        EventKind::FileWrite,
        EventKind::FileEdit,
        EventKind::Command,
        EventKind::TaskUpdate,
    ];

    /// True for kinds that carry a target path.
    pub fn is_file_change(self) -> bool {
        matches!(self, EventKind::FileWrite | EventKind::FileEdit)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            EventKind::FileWrite => "file-write",
            EventKind::FileEdit => "file-edit",
            EventKind::Command => "command",
            EventKind::TaskUpdate => "task-update",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether the event is intercepted before or after the action takes effect.
///
/// Pre-phase decisions gate the action; post-phase decisions can only detect
/// and report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Phase {
    Pre,
    Post,
}

impl Phase {
    pub fn as_str(self) -> &'static str {
        match self {
            Phase::Pre => "pre",
            Phase::Post => "post",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A validated, immutable tool-invocation event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Event {
    id: EventId,
    kind: EventKind,
    phase: Phase,
    target_path: Option<String>,
    command_text: Option<String>,
    content: Option<String>,
    timestamp: DateTime<Utc>,
}

impl Event {
    /// Build an event, enforcing the per-kind field contract.
    ///
    /// - `FileWrite` / `FileEdit` require `target_path` and forbid `command_text`.
    /// - `Command` requires `command_text` and forbids `target_path`.
    /// - `TaskUpdate` forbids both.
    ///
    /// Present strings must be non-empty. Violations return
    /// `WardenError::MalformedEvent`.
    pub fn new(
        kind: EventKind,
        phase: Phase,
        target_path: Option<String>,
        command_text: Option<String>,
        timestamp: DateTime<Utc>,
    ) -> WardenResult<Self> {
        let malformed = |reason: String| Err(WardenError::MalformedEvent { reason });

        if target_path.as_deref().is_some_and(str::is_empty) {
            return malformed(format!("{kind} event has an empty target path"));
        }
        if command_text.as_deref().is_some_and(|c| c.trim().is_empty()) {
            return malformed(format!("{kind} event has an empty command"));
        }

        match kind {
            EventKind::FileWrite | EventKind::FileEdit => {
                if target_path.is_none() {
                    return malformed(format!("{kind} event requires a target path"));
                }
                if command_text.is_some() {
                    return malformed(format!("{kind} event must not carry command text"));
                }
            }
            EventKind::Command => {
                if command_text.is_none() {
                    return malformed("command event requires command text".to_string());
                }
                if target_path.is_some() {
                    return malformed("command event must not carry a target path".to_string());
                }
            }
            EventKind::TaskUpdate => {
                if target_path.is_some() || command_text.is_some() {
                    return malformed(
                        "task-update event must not carry a target path or command text"
                            .to_string(),
                    );
                }
            }
        }

        Ok(Self {
            id: EventId::new(),
            kind,
            phase,
            target_path,
            command_text,
            content: None,
            timestamp,
        })
    }

    /// Shorthand for a `FileWrite` event.
    pub fn file_write(phase: Phase, path: impl Into<String>, at: DateTime<Utc>) -> WardenResult<Self> {
        Self::new(EventKind::FileWrite, phase, Some(path.into()), None, at)
    }

    /// Shorthand for a `FileEdit` event.
    pub fn file_edit(phase: Phase, path: impl Into<String>, at: DateTime<Utc>) -> WardenResult<Self> {
        Self::new(EventKind::FileEdit, phase, Some(path.into()), None, at)
    }

    /// Shorthand for a `Command` event.
    pub fn command(phase: Phase, command: impl Into<String>, at: DateTime<Utc>) -> WardenResult<Self> {
        Self::new(EventKind::Command, phase, None, Some(command.into()), at)
    }

    /// Shorthand for a `TaskUpdate` event.
    pub fn task_update(phase: Phase, at: DateTime<Utc>) -> WardenResult<Self> {
        Self::new(EventKind::TaskUpdate, phase, None, None, at)
    }

    /// Attach the text being written. Only valid on file changes.
    pub fn with_content(mut self, content: impl Into<String>) -> WardenResult<Self> {
        if !self.kind.is_file_change() {
            return Err(WardenError::MalformedEvent {
                reason: format!("{} event must not carry file content", self.kind),
            });
        }
        self.content = Some(content.into());
        Ok(self)
    }

    pub fn id(&self) -> EventId {
        self.id
    }

    pub fn kind(&self) -> EventKind {
        self.kind
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn target_path(&self) -> Option<&str> {
        self.target_path.as_deref()
    }

    pub fn command_text(&self) -> Option<&str> {
        self.command_text.as_deref()
    }

    pub fn content(&self) -> Option<&str> {
        self.content.as_deref()
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}
