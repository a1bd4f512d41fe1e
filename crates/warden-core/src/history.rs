//! Bounded history of recently decided events.

use std::{collections::VecDeque, sync::Mutex};

use warden_contracts::event::Event;

/// Keeps the last `capacity` events, oldest first.
#[derive(Debug)]
pub struct EventHistory {
    capacity: usize,
    events: Mutex<VecDeque<Event>>,
}

impl EventHistory {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            events: Mutex::new(VecDeque::with_capacity(capacity)),
        }
    }

    /// Append `event`, evicting the oldest when full.
    pub fn record(&self, event: Event) {
        if self.capacity == 0 {
            return;
        }
        let mut events = self.events.lock().unwrap_or_else(|e| e.into_inner());
        while events.len() >= self.capacity {
            events.pop_front();
        }
        events.push_back(event);
    }

    /// A copy of the retained events, oldest first.
    pub fn recent(&self) -> Vec<Event> {
        let events = self.events.lock().unwrap_or_else(|e| e.into_inner());
        events.iter().cloned().collect()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.events.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};

    use warden_contracts::event::{Event, Phase};

    use super::EventHistory;

    #[test]
    fn test_keeps_last_n_oldest_first() {
        let history = EventHistory::new(3);
        let t0 = Utc.with_ymd_and_hms(2026, 2, 2, 0, 0, 0).unwrap();
        let events: Vec<Event> = (0..5)
            .map(|i| Event::command(Phase::Post, format!("step {i}"), t0 + Duration::seconds(i)).unwrap())
            .collect();
        for event in &events {
            history.record(event.clone());
        }

        let recent = history.recent();
        assert_eq!(recent.len(), 3);
        assert_eq!(recent[0].command_text(), Some("step 2"));
        assert_eq!(recent[2].command_text(), Some("step 4"));
    }

    #[test]
    fn test_zero_capacity_retains_nothing() {
        let history = EventHistory::new(0);
        let t0 = Utc.with_ymd_and_hms(2026, 2, 2, 0, 0, 0).unwrap();
        history.record(Event::task_update(Phase::Pre, t0).unwrap());
        assert!(history.is_empty());
    }
}
