//! Client-side tracking of the pads shown as playing.
//!
//! The backend does not report when a sound ends, so every successful play
//! is recorded with a deadline. The set is only a UI hint and can drift from
//! what the backend is actually doing.

use std::collections::HashMap;
use std::time::Instant;

#[derive(Debug, Clone, Default)]
pub struct PlayingSet {
    deadlines: HashMap<String, Instant>,
}

impl PlayingSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks `id` as playing until `deadline`. Marking it again moves the
    /// deadline, so an older timeout never clears a newer play.
    pub fn mark(&mut self, id: &str, deadline: Instant) {
        self.deadlines.insert(id.to_string(), deadline);
    }

    pub fn contains(&self, id: &str) -> bool {
        self.deadlines.contains_key(id)
    }

    /// Returns true if `id` was marked.
    pub fn remove(&mut self, id: &str) -> bool {
        self.deadlines.remove(id).is_some()
    }

    /// Empties the set and returns the ids that were marked, sorted.
    pub fn clear(&mut self) -> Vec<String> {
        let mut ids: Vec<String> = self.deadlines.drain().map(|(id, _)| id).collect();
        ids.sort();
        ids
    }

    /// Drops every id whose deadline is at or before `now`, sorted.
    pub fn expire(&mut self, now: Instant) -> Vec<String> {
        let mut expired: Vec<String> = self
            .deadlines
            .iter()
            .filter(|(_, deadline)| **deadline <= now)
            .map(|(id, _)| id.clone())
            .collect();
        for id in &expired {
            self.deadlines.remove(id);
        }
        expired.sort();
        expired
    }
}
