//! Read-only state handed to rules for one decision cycle.

use std::collections::BTreeMap;

use chrono::Duration;
use serde::Serialize;

use crate::event::Event;

/// Time since a watched resource was last updated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceAge {
    /// Elapsed time since the last recorded update.
    Known(#[serde(with = "duration_secs")] Duration),
    /// The resource has never been touched.
    Unknown,
}

impl ResourceAge {
    pub fn known(&self) -> Option<Duration> {
        match self {
            ResourceAge::Known(age) => Some(*age),
            ResourceAge::Unknown => None,
        }
    }

    /// True only when the age is known and strictly greater than `threshold`.
    pub fn exceeds(&self, threshold: Duration) -> bool {
        self.known().is_some_and(|age| age > threshold)
    }
}

/// Everything a rule may consult besides the event itself.
///
/// Built by the host before the decision cycle starts and never mutated by
/// rules, so no rule can observe another rule's output.
#[derive(Debug, Clone, Default, Serialize)]
pub struct StateSnapshot {
    /// Age of every watched resource a registered rule declared interest in.
    pub watched_resource_ages: BTreeMap<String, ResourceAge>,
    /// The most recent events, oldest first. Excludes the event being decided.
    pub recent_events: Vec<Event>,
}

impl StateSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_age(mut self, resource: impl Into<String>, age: ResourceAge) -> Self {
        self.watched_resource_ages.insert(resource.into(), age);
        self
    }

    pub fn with_recent_events(mut self, events: Vec<Event>) -> Self {
        self.recent_events = events;
        self
    }

    /// Age of `resource`; resources absent from the snapshot are `Unknown`.
    pub fn age_of(&self, resource: &str) -> ResourceAge {
        self.watched_resource_ages
            .get(resource)
            .copied()
            .unwrap_or(ResourceAge::Unknown)
    }
}

mod duration_secs {
    use chrono::Duration;
    use serde::Serializer;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_i64(d.num_seconds())
    }
}
