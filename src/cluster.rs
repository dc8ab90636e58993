//! Cluster facade consumed by the scaling policies
//!
//! `ClusterContext` bundles what a policy needs from the surrounding
//! cluster: the over-provision setting, the process-wide timeout tracker,
//! the scale provider, the notifier, and the group selection/prioritization
//! rules. It is built by the embedding process and passed into `apply` each
//! cycle; the policies consume it, they do not own it.

use std::sync::Arc;

use crate::group::ScaleGroup;
use crate::operations::{ScaleNotifier, ScaleProvider};
use crate::pod::Pod;
use crate::timeouts::TimeoutTracker;

/// What the policies see of the cluster
pub struct ClusterContext {
    /// Slack units added on top of every computed need
    pub over_provision: u32,

    /// Process-wide scale cooldown registry
    pub timeouts: Arc<TimeoutTracker>,

    /// Cloud-side capacity entry point
    pub provider: Arc<dyn ScaleProvider>,

    /// Scale-up notification sink
    pub notifier: Arc<dyn ScaleNotifier>,
}

impl ClusterContext {
    /// Create a context with no over-provisioning and a fresh tracker
    pub fn new(provider: Arc<dyn ScaleProvider>, notifier: Arc<dyn ScaleNotifier>) -> Self {
        Self {
            over_provision: 0,
            timeouts: Arc::new(TimeoutTracker::new()),
            provider,
            notifier,
        }
    }

    /// Set the over-provision buffer
    pub fn with_over_provision(mut self, units: u32) -> Self {
        self.over_provision = units;
        self
    }

    /// Share an externally owned timeout tracker
    pub fn with_timeouts(mut self, timeouts: Arc<TimeoutTracker>) -> Self {
        self.timeouts = timeouts;
        self
    }

    /// Candidate groups for one group key's pods.
    ///
    /// All pods under a key share the same selector map, so the first pod is
    /// representative. A group is a candidate when the selectors are a
    /// subset of its labels.
    pub fn groups_for_key<'a>(
        &self,
        groups: &'a [ScaleGroup],
        pods: &[Pod],
    ) -> Vec<&'a ScaleGroup> {
        let Some(pod) = pods.first() else {
            return Vec::new();
        };
        groups
            .iter()
            .filter(|g| g.matches_selectors(&pod.selectors))
            .collect()
    }

    /// Order candidates for the per-group decision loop.
    ///
    /// Stable sort on `(priority, name)`: lower priority value wins, name
    /// breaks ties deterministically.
    pub fn prioritize_groups<'a>(&self, mut groups: Vec<&'a ScaleGroup>) -> Vec<&'a ScaleGroup> {
        groups.sort_by(|a, b| a.priority.cmp(&b.priority).then_with(|| a.name.cmp(&b.name)));
        groups
    }
}
