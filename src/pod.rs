//! Workload units and their grouping key
//!
//! A `Pod` is a pending (unschedulable) workload unit as observed by the
//! external cluster-state collector: its resource request, its scheduling
//! selectors, and the taint keys it tolerates. Pods are immutable once
//! observed; the decision core only reads them.
//!
//! Pods with identical selectors can be hosted by the same set of groups, so
//! the decision cycle partitions them by `GroupKey`, a stable hash of the
//! selector map.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::resources::ResourceVector;

/// Identifier derived from a pod's scheduling selectors.
///
/// Pods sharing a key are schedulable on the same candidate groups. The key
/// is the first 8 bytes of a SHA-256 over the canonical `key=value`
/// rendering of the selector map, so it is stable across processes and runs.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct GroupKey(u64);

impl fmt::Display for GroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

/// A pending workload unit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pod {
    /// Pod name (for logs and notifications)
    pub name: String,

    /// Requested resources
    pub resources: ResourceVector,

    /// Scheduling selectors; determine which groups can host this pod
    #[serde(default)]
    pub selectors: BTreeMap<String, String>,

    /// Taint keys this pod tolerates
    #[serde(default)]
    pub tolerations: BTreeSet<String>,
}

impl Pod {
    /// Create a pod with no selectors or tolerations
    pub fn new(name: impl Into<String>, resources: ResourceVector) -> Self {
        Self {
            name: name.into(),
            resources,
            selectors: BTreeMap::new(),
            tolerations: BTreeSet::new(),
        }
    }

    /// Add a scheduling selector
    pub fn with_selector(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.selectors.insert(key.into(), value.into());
        self
    }

    /// Add a tolerated taint key
    pub fn with_toleration(mut self, taint: impl Into<String>) -> Self {
        self.tolerations.insert(taint.into());
        self
    }

    /// The grouping key for this pod's selectors
    pub fn group_key(&self) -> GroupKey {
        let mut hasher = Sha256::new();
        for (key, value) in &self.selectors {
            hasher.update(key.as_bytes());
            hasher.update(b"=");
            hasher.update(value.as_bytes());
            hasher.update(b";");
        }
        let digest = hasher.finalize();
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(&digest[..8]);
        GroupKey(u64::from_be_bytes(bytes))
    }
}

/// Pending pods partitioned by group key.
///
/// Key iteration is ordered (deterministic cycles); insertion order within a
/// key is preserved, which the first-fit allocator depends on for
/// reproducible packings.
pub type PendingPods = BTreeMap<GroupKey, Vec<Pod>>;

/// Partition pods by their group key, preserving input order within a key
pub fn group_pending_pods(pods: impl IntoIterator<Item = Pod>) -> PendingPods {
    let mut pending: PendingPods = BTreeMap::new();
    for pod in pods {
        pending.entry(pod.group_key()).or_default().push(pod);
    }
    pending
}
