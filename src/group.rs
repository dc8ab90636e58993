//! Scalable node groups
//!
//! A `ScaleGroup` models one scalable collection of identical instances (a
//! scale set / autoscaling group): the capacity of one fresh unit, the
//! current/desired/max instance counts, the labels that match pod selectors,
//! and the taints a hosted pod must tolerate. Groups are owned by the
//! external cluster facade; the decision core reads their fields and issues
//! scale operations against them.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::pod::Pod;
use crate::resources::ResourceVector;

/// A scalable node group
///
/// The policy works to preserve `actual_capacity <= desired_capacity <=
/// max_size`: it never requests a capacity below `actual_capacity` and never
/// one above `max_size`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScaleGroup {
    /// Group name (also the provider-side identity)
    pub name: String,

    /// Instance type of the group's units (keys the cost table)
    #[serde(rename = "instanceType")]
    pub instance_type: String,

    /// Scheduling priority; lower is preferred
    #[serde(default)]
    pub priority: i32,

    /// Resource footprint of one fresh unit
    #[serde(rename = "unitCapacity")]
    pub unit_capacity: ResourceVector,

    /// Instances currently running
    #[serde(rename = "actualCapacity", default)]
    pub actual_capacity: u32,

    /// Instances requested from the provider (may exceed actual while booting)
    #[serde(rename = "desiredCapacity", default)]
    pub desired_capacity: u32,

    /// Hard ceiling on instances
    #[serde(rename = "maxSize")]
    pub max_size: u32,

    /// Labels matched against pod selectors
    #[serde(default)]
    pub labels: BTreeMap<String, String>,

    /// Taint keys a hosted pod must tolerate
    #[serde(default)]
    pub taints: BTreeSet<String>,

    /// Whether the group currently has unschedulable (cordoned) nodes
    #[serde(rename = "unschedulableNodes", default)]
    pub unschedulable_nodes: bool,

    /// Group-local cooldown deadline after a slow or failed scale.
    ///
    /// This is the group's own signal, distinct from the process-wide
    /// [`TimeoutTracker`](crate::timeouts::TimeoutTracker).
    #[serde(rename = "timedOutUntil")]
    #[serde(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timed_out_until: Option<DateTime<Utc>>,
}

impl ScaleGroup {
    /// Create a group with empty labels/taints and zero capacity
    pub fn new(
        name: impl Into<String>,
        instance_type: impl Into<String>,
        unit_capacity: ResourceVector,
        max_size: u32,
    ) -> Self {
        Self {
            name: name.into(),
            instance_type: instance_type.into(),
            priority: 0,
            unit_capacity,
            actual_capacity: 0,
            desired_capacity: 0,
            max_size,
            labels: BTreeMap::new(),
            taints: BTreeSet::new(),
            unschedulable_nodes: false,
            timed_out_until: None,
        }
    }

    /// Set current and requested instance counts
    pub fn with_capacity(mut self, actual: u32, desired: u32) -> Self {
        self.actual_capacity = actual;
        self.desired_capacity = desired;
        self
    }

    /// Set the scheduling priority (lower is preferred)
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Add a label
    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }

    /// Add a taint key
    pub fn with_taint(mut self, taint: impl Into<String>) -> Self {
        self.taints.insert(taint.into());
        self
    }

    /// True while the group-local cooldown deadline is in the future
    pub fn is_timed_out(&self) -> bool {
        self.timed_out_until
            .map(|until| Utc::now() < until)
            .unwrap_or(false)
    }

    /// True if the pod tolerates every taint on this group
    pub fn tolerates_taints(&self, pod: &Pod) -> bool {
        self.taints.iter().all(|t| pod.tolerations.contains(t))
    }

    /// True if the selector map is a subset of this group's labels
    pub fn matches_selectors(&self, selectors: &BTreeMap<String, String>) -> bool {
        selectors
            .iter()
            .all(|(k, v)| self.labels.get(k) == Some(v))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn make_group() -> ScaleGroup {
        ScaleGroup::new(
            "general-a",
            "m5.large",
            ResourceVector::cpu_memory(2.0, 8.0),
            10,
        )
    }

    #[test]
    fn test_group_builder() {
        let group = make_group()
            .with_capacity(2, 3)
            .with_priority(5)
            .with_label("pool", "general")
            .with_taint("dedicated");

        assert_eq!(group.actual_capacity, 2);
        assert_eq!(group.desired_capacity, 3);
        assert_eq!(group.priority, 5);
        assert!(group.labels.contains_key("pool"));
        assert!(group.taints.contains("dedicated"));
    }

    #[test]
    fn test_timed_out_deadline() {
        let mut group = make_group();
        assert!(!group.is_timed_out());

        group.timed_out_until = Some(Utc::now() + Duration::minutes(5));
        assert!(group.is_timed_out());

        group.timed_out_until = Some(Utc::now() - Duration::minutes(5));
        assert!(!group.is_timed_out());
    }

    #[test]
    fn test_tolerates_taints() {
        let group = make_group().with_taint("gpu-only");
        let plain = Pod::new("plain", ResourceVector::new());
        let tolerant = Pod::new("tolerant", ResourceVector::new()).with_toleration("gpu-only");

        assert!(!group.tolerates_taints(&plain));
        assert!(group.tolerates_taints(&tolerant));

        // no taints tolerates everything
        assert!(make_group().tolerates_taints(&plain));
    }

    #[test]
    fn test_matches_selectors_is_subset_match() {
        let group = make_group()
            .with_label("pool", "general")
            .with_label("zone", "east");

        let mut selectors = BTreeMap::new();
        selectors.insert("pool".to_string(), "general".to_string());
        assert!(group.matches_selectors(&selectors));

        selectors.insert("zone".to_string(), "west".to_string());
        assert!(!group.matches_selectors(&selectors));

        // empty selectors match any group
        assert!(group.matches_selectors(&BTreeMap::new()));
    }
}
