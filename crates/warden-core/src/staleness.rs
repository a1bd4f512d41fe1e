//! Last-update tracking for named watched resources.
//!
//! The tracker is the only mutable state the engine's inputs depend on. It
//! is never read during a decision: the host calls `snapshot()` first and
//! hands the frozen ages to the engine.

use std::{collections::HashMap, sync::RwLock};

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, trace};

use warden_contracts::{
    event::Event,
    snapshot::{ResourceAge, StateSnapshot},
};

/// Records, per resource name, the instant of the last observed update.
///
/// Shared across threads behind `&self`. Touches on different names never
/// interfere; racing touches on the same name resolve to the latest
/// timestamp, not the latest call.
#[derive(Debug, Default)]
pub struct StalenessTracker {
    last_update: RwLock<HashMap<String, DateTime<Utc>>>,
}

impl StalenessTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `resource` was updated at `at`.
    ///
    /// Returns `false` if a later update was already recorded; the stored
    /// instant only ever moves forward.
    pub fn touch(&self, resource: &str, at: DateTime<Utc>) -> bool {
        let mut map = self.last_update.write().unwrap_or_else(|e| e.into_inner());
        match map.get(resource) {
            Some(existing) if *existing > at => {
                trace!(
                    resource = %resource,
                    recorded = %existing,
                    attempted = %at,
                    "ignoring out-of-order touch"
                );
                false
            }
            _ => {
                debug!(resource = %resource, at = %at, "watched resource touched");
                map.insert(resource.to_string(), at);
                true
            }
        }
    }

    /// Elapsed time since `resource` was last touched, as seen at `now`.
    ///
    /// `Unknown` if never touched. A `now` earlier than the last update
    /// yields a zero age.
    pub fn age_of(&self, resource: &str, now: DateTime<Utc>) -> ResourceAge {
        let map = self.last_update.read().unwrap_or_else(|e| e.into_inner());
        match map.get(resource) {
            Some(last) => ResourceAge::Known((now - *last).max(Duration::zero())),
            None => ResourceAge::Unknown,
        }
    }

    /// Instant of the last recorded update, if any.
    pub fn last_update(&self, resource: &str) -> Option<DateTime<Utc>> {
        let map = self.last_update.read().unwrap_or_else(|e| e.into_inner());
        map.get(resource).copied()
    }

    /// Freeze the ages of `resources` at `now` together with `recent_events`.
    pub fn snapshot<S: AsRef<str>>(
        &self,
        resources: &[S],
        now: DateTime<Utc>,
        recent_events: Vec<Event>,
    ) -> StateSnapshot {
        let watched_resource_ages = resources
            .iter()
            .map(|name| {
                let name = name.as_ref();
                (name.to_string(), self.age_of(name, now))
            })
            .collect();

        StateSnapshot {
            watched_resource_ages,
            recent_events,
        }
    }
}
