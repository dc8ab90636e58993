//! Process-wide scale cooldown registry
//!
//! The `TimeoutTracker` records which groups are cooling down after a failed
//! or stalled scale. It is written by the external node-lifecycle
//! collaborator; the decision core only queries it. This is a separate
//! signal from the group-local `timed_out_until` deadline; either one
//! suppresses growth for a group.

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;

use crate::group::ScaleGroup;

/// Map from group name to cooldown deadline
#[derive(Debug, Default)]
pub struct TimeoutTracker {
    cooldowns: DashMap<String, DateTime<Utc>>,
}

impl TimeoutTracker {
    /// Create an empty tracker
    pub fn new() -> Self {
        Self::default()
    }

    /// Put a group on cooldown for `cooldown` from now
    pub fn mark_timed_out(&self, group_name: &str, cooldown: Duration) {
        self.mark_timed_out_until(group_name, Utc::now() + cooldown);
    }

    /// Put a group on cooldown until an explicit deadline
    pub fn mark_timed_out_until(&self, group_name: &str, deadline: DateTime<Utc>) {
        self.cooldowns.insert(group_name.to_string(), deadline);
    }

    /// Remove a group's cooldown
    pub fn clear(&self, group_name: &str) {
        self.cooldowns.remove(group_name);
    }

    /// True while the group's cooldown deadline is in the future.
    ///
    /// Expired entries are dropped on read.
    pub fn is_timed_out(&self, group: &ScaleGroup) -> bool {
        // copy the deadline out so the map guard is released before remove
        let deadline = self.cooldowns.get(&group.name).map(|d| *d);
        if let Some(deadline) = deadline {
            if Utc::now() < deadline {
                return true;
            }
            self.cooldowns.remove(&group.name);
        }
        false
    }
}
