//! Scaling policies and the shared decision procedure
//!
//! Three interchangeable policies drive the decision cycle:
//!
//! - **Basic**: provision for the current pending set every cycle.
//! - **CostConstrained**: basic, plus a budget gate that caps each group's
//!   request to what the hourly budget still affords.
//! - **GrowthTriggered**: only provision after sustained consecutive growth
//!   in the pending-pod count, trading responsiveness for stability.
//!
//! The decision procedure itself is a free function shared by all variants
//! rather than inherited behavior: partition pending pods by group key,
//! select and prioritize candidate groups per key, run the bin-packing
//! allocator, translate the bin count into a capacity request that honors
//! ceilings and timeouts, and issue the async scale operations.

use chrono::Utc;
use tracing::{debug, info};

use crate::cluster::ClusterContext;
use crate::cost::CostState;
use crate::group::ScaleGroup;
use crate::growth::GrowthState;
use crate::operations::{create_operation, fulfill_requests, ScaleOperation};
use crate::packing::pack_pods;
use crate::pod::{GroupKey, PendingPods, Pod};

/// A scaling policy variant.
///
/// Policies own their cross-cycle state (cost counters, growth triggers);
/// the caller holds the policy across cycles and serializes `apply` calls;
/// at most one cycle runs at a time.
pub enum ScalingPolicy {
    /// Provision immediately, every cycle
    Basic,

    /// Provision immediately, capped by an hourly cost budget
    CostConstrained(CostState),

    /// Provision only after sustained pending-pod growth
    GrowthTriggered(GrowthState),
}

impl ScalingPolicy {
    /// Run one decision cycle.
    ///
    /// Issues scale operations for every group key with provisionable
    /// pending pods and blocks until each operation resolves. Never fails:
    /// provider errors are logged by fulfillment and abandoned until the
    /// next cycle.
    pub async fn apply(
        &mut self,
        pending_pods: &PendingPods,
        groups: &[ScaleGroup],
        cluster: &ClusterContext,
    ) {
        match self {
            ScalingPolicy::Basic => {
                let operations = decide_all(pending_pods, groups, cluster, None);
                fulfill_requests(cluster, operations).await;
            }
            ScalingPolicy::CostConstrained(cost) => {
                cost.roll_hour(Utc::now());
                info!(
                    "cost policy: hour={} budget/h={} spent={:.2} avg-lifetime={:.2}h",
                    cost.hour_index(),
                    cost.max_cost_per_hour,
                    cost.spent_this_hour(),
                    cost.avg_hours_per_instance()
                );
                let operations = decide_all(pending_pods, groups, cluster, Some(&*cost));
                fulfill_requests(cluster, operations).await;
            }
            ScalingPolicy::GrowthTriggered(growth) => {
                let num_pending: usize = pending_pods.values().map(Vec::len).sum();
                info!(
                    "growth policy: triggers={}/{} factor={} last={} pending={}",
                    growth.trigger_count(),
                    growth.triggers_to_provision,
                    growth.growth_factor,
                    growth.last_pending_count(),
                    num_pending
                );
                if growth.observe(num_pending) {
                    info!("sustained growth confirmed, provisioning");
                    let operations = decide_all(pending_pods, groups, cluster, None);
                    fulfill_requests(cluster, operations).await;
                }
            }
        }
    }
}

/// Decide every group key exactly once and collect the cycle's operations
fn decide_all(
    pending_pods: &PendingPods,
    groups: &[ScaleGroup],
    cluster: &ClusterContext,
    cost: Option<&CostState>,
) -> Vec<ScaleOperation> {
    let mut operations = Vec::new();
    for (key, pods) in pending_pods {
        decide_num_instances(cluster, *key, pods, groups, cost, &mut operations);
    }
    operations
}

/// Decide capacity requests for one group key's pending pods.
///
/// Walks the key's candidate groups in priority order. A group is skipped
/// while it is timed out (tracker or group-local signal) or already at its
/// ceiling, unless it has unschedulable nodes, which overrides the skip
/// because the group needs attention regardless of nominal ceiling state.
/// The request per group is clamped so the new capacity never drops below
/// the group's actual capacity nor exceeds its max size.
///
/// Pods may be counted for more than one candidate group within a cycle; the
/// estimate is deliberately conservative in favor of responsiveness.
pub fn decide_num_instances(
    cluster: &ClusterContext,
    key: GroupKey,
    pods: &[Pod],
    groups: &[ScaleGroup],
    cost: Option<&CostState>,
    operations: &mut Vec<ScaleOperation>,
) {
    let candidates = cluster.prioritize_groups(cluster.groups_for_key(groups, pods));
    if candidates.is_empty() {
        debug!("no candidate groups for key {}", key);
        return;
    }

    for group in candidates {
        let timed_out = cluster.timeouts.is_timed_out(group) || group.is_timed_out();
        let at_ceiling = group.desired_capacity == group.max_size;
        if (timed_out || at_ceiling) && !group.unschedulable_nodes {
            debug!(
                "skipping group {}: timed_out={} at_ceiling={}",
                group.name, timed_out, at_ceiling
            );
            continue;
        }

        let allocation = pack_pods(&group.unit_capacity, pods, group);
        let mut units_needed = allocation.units_needed() as u32;
        if units_needed == 0 {
            debug!(
                "no pending pod for key {} fits a unit of group {}",
                key, group.name
            );
            continue;
        }
        units_needed += cluster.over_provision;

        // a timed-out group cannot grow past what is already committed;
        // otherwise the hard ceiling bounds the request
        let headroom = if timed_out {
            group.desired_capacity.saturating_sub(group.actual_capacity)
        } else {
            group.max_size.saturating_sub(group.actual_capacity)
        };
        let unavailable_units = units_needed.saturating_sub(headroom);
        let mut units_requested = units_needed - unavailable_units;

        if let Some(cost) = cost {
            let capped = cost.cap_units(units_requested, &group.instance_type);
            if capped < units_requested {
                info!(
                    "budget gate capped group {} request from {} to {} unit(s)",
                    group.name, units_requested, capped
                );
            }
            units_requested = capped;
        }

        if units_requested == 0 {
            debug!("nothing requestable for group {}", group.name);
            continue;
        }

        let new_capacity = group.actual_capacity + units_requested;
        info!(
            "requesting capacity {} for group {} ({} unit(s), {} bin(s), key {})",
            new_capacity,
            group.name,
            units_requested,
            allocation.units_needed(),
            key
        );
        operations.push(create_operation(
            cluster,
            group,
            allocation.assigned,
            new_capacity,
            units_requested,
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operations::{DryRunProvider, LogNotifier, ScaleProvider};
    use crate::pod::group_pending_pods;
    use crate::resources::ResourceVector;
    use crate::timeouts::TimeoutTracker;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct RecordingProvider {
        calls: Mutex<Vec<(String, u32)>>,
    }

    #[async_trait]
    impl ScaleProvider for RecordingProvider {
        async fn set_capacity(
            &self,
            group_name: &str,
            new_capacity: u32,
        ) -> Result<(), crate::operations::ProviderError> {
            self.calls
                .lock()
                .unwrap()
                .push((group_name.to_string(), new_capacity));
            Ok(())
        }
    }

    fn make_cluster() -> ClusterContext {
        ClusterContext::new(Arc::new(DryRunProvider), Arc::new(LogNotifier))
    }

    fn recording_cluster() -> (ClusterContext, Arc<RecordingProvider>) {
        let provider = Arc::new(RecordingProvider::default());
        let cluster = ClusterContext::new(provider.clone(), Arc::new(LogNotifier));
        (cluster, provider)
    }

    fn make_group(name: &str, unit_cpu: f64, actual: u32, max_size: u32) -> ScaleGroup {
        ScaleGroup::new(
            name,
            "m5.large",
            ResourceVector::new().with("cpu", unit_cpu),
            max_size,
        )
        .with_capacity(actual, actual)
    }

    fn cpu_pods(count: usize, cpu: f64) -> Vec<Pod> {
        (0..count)
            .map(|i| Pod::new(format!("p{}", i), ResourceVector::new().with("cpu", cpu)))
            .collect()
    }

    fn decide(
        cluster: &ClusterContext,
        pods: &[Pod],
        groups: &[ScaleGroup],
        cost: Option<&CostState>,
    ) -> Vec<ScaleOperation> {
        let mut operations = Vec::new();
        let key = pods.first().map(Pod::group_key).unwrap_or_else(|| {
            Pod::new("probe", ResourceVector::new()).group_key()
        });
        decide_num_instances(cluster, key, pods, groups, cost, &mut operations);
        operations
    }

    #[tokio::test]
    async fn test_three_pods_two_bins_capacity_two() {
        let cluster = make_cluster();
        let groups = vec![make_group("general-a", 2.0, 0, 10)];
        let pods = cpu_pods(3, 1.0);

        let operations = decide(&cluster, &pods, &groups, None);

        assert_eq!(operations.len(), 1);
        assert_eq!(operations[0].new_capacity, 2);
        assert_eq!(operations[0].units_requested, 2);
        assert_eq!(operations[0].assigned_pods.len(), 2);
        assert_eq!(operations[0].assigned_pods[0].len(), 2);
        assert_eq!(operations[0].assigned_pods[1].len(), 1);
    }

    #[tokio::test]
    async fn test_request_never_exceeds_max_size() {
        let cluster = make_cluster();
        let groups = vec![make_group("small", 1.0, 2, 4)];
        let pods = cpu_pods(10, 1.0); // would need 10 units

        let operations = decide(&cluster, &pods, &groups, None);

        assert_eq!(operations.len(), 1);
        assert_eq!(operations[0].new_capacity, 4);
        assert!(operations[0].new_capacity >= groups[0].actual_capacity);
    }

    #[tokio::test]
    async fn test_over_provision_adds_headroom_units() {
        let cluster = make_cluster().with_over_provision(2);
        let groups = vec![make_group("general-a", 2.0, 0, 10)];
        let pods = cpu_pods(3, 1.0);

        let operations = decide(&cluster, &pods, &groups, None);

        assert_eq!(operations[0].units_requested, 4); // 2 bins + 2 slack
    }

    #[tokio::test]
    async fn test_timed_out_group_is_skipped() {
        let cluster = make_cluster();
        let tracker = Arc::new(TimeoutTracker::new());
        tracker.mark_timed_out("general-a", chrono::Duration::minutes(10));
        let cluster = cluster.with_timeouts(tracker);

        let groups = vec![make_group("general-a", 2.0, 0, 10)];
        let operations = decide(&cluster, &cpu_pods(3, 1.0), &groups, None);

        assert!(operations.is_empty());
    }

    #[tokio::test]
    async fn test_timed_out_group_with_unschedulable_nodes_caps_at_desired() {
        let cluster = make_cluster();
        let tracker = Arc::new(TimeoutTracker::new());
        tracker.mark_timed_out("general-a", chrono::Duration::minutes(10));
        let cluster = cluster.with_timeouts(tracker);

        // 1 running, 3 already committed; unschedulable nodes override the skip
        let mut group = make_group("general-a", 2.0, 1, 10).with_capacity(1, 3);
        group.unschedulable_nodes = true;
        let groups = vec![group];

        let operations = decide(&cluster, &cpu_pods(10, 1.0), &groups, None);

        // only the committed-but-not-running capacity is requestable
        assert_eq!(operations.len(), 1);
        assert_eq!(operations[0].units_requested, 2);
        assert_eq!(operations[0].new_capacity, 3);
    }

    #[tokio::test]
    async fn test_group_at_ceiling_is_skipped() {
        let cluster = make_cluster();
        let groups = vec![make_group("full", 2.0, 5, 5).with_capacity(5, 5)];

        let operations = decide(&cluster, &cpu_pods(3, 1.0), &groups, None);

        assert!(operations.is_empty());
    }

    #[tokio::test]
    async fn test_no_fit_means_no_operation() {
        let cluster = make_cluster();
        // every pod is larger than one fresh unit
        let groups = vec![make_group("small-units", 1.0, 0, 10)];

        let operations = decide(&cluster, &cpu_pods(3, 2.0), &groups, None);

        assert!(operations.is_empty());
    }

    #[tokio::test]
    async fn test_priority_order_decides_first_group() {
        let (cluster, provider) = recording_cluster();
        let groups = vec![
            make_group("fallback", 2.0, 0, 10).with_priority(1),
            make_group("preferred", 2.0, 0, 10).with_priority(0),
        ];
        let pods = cpu_pods(2, 1.0);

        let operations = decide(&cluster, &pods, &groups, None);
        fulfill_requests(&cluster, operations).await;

        let calls = provider.calls.lock().unwrap();
        assert_eq!(calls.len(), 2);
        // both groups are provisioned for (conservative double-count), the
        // preferred group first
        assert_eq!(calls[0].0, "preferred");
        assert_eq!(calls[1].0, "fallback");
    }

    #[tokio::test]
    async fn test_cost_gate_caps_request() {
        let cluster = make_cluster();
        let mut costs = HashMap::new();
        costs.insert("m5.large".to_string(), 2.0);
        let cost = CostState::with_costs(10.0, "us-east-1", costs, Utc::now());

        let groups = vec![make_group("general-a", 1.0, 0, 100)];
        let pods = cpu_pods(40, 1.0); // wants 40 units, budget affords 15

        let operations = decide(&cluster, &pods, &groups, Some(&cost));

        assert_eq!(operations.len(), 1);
        assert_eq!(operations[0].units_requested, 15);
        assert_eq!(operations[0].new_capacity, 15);
    }

    #[tokio::test]
    async fn test_cost_gate_to_zero_issues_nothing() {
        let cluster = make_cluster();
        let mut costs = HashMap::new();
        costs.insert("m5.large".to_string(), 100.0);
        let cost = CostState::with_costs(10.0, "us-east-1", costs, Utc::now());

        let groups = vec![make_group("general-a", 1.0, 0, 100)];
        let operations = decide(&cluster, &cpu_pods(5, 1.0), &groups, Some(&cost));

        assert!(operations.is_empty());
    }

    #[tokio::test]
    async fn test_growth_policy_gates_provisioning() {
        let (cluster, provider) = recording_cluster();
        let groups = vec![make_group("general-a", 2.0, 0, 10)];
        let mut policy = ScalingPolicy::GrowthTriggered(GrowthState::new(2.0, 3));

        // pending counts 1, 3, 7, 15: only the 4th cycle provisions
        for count in [1usize, 3, 7] {
            let pending = group_pending_pods(cpu_pods(count, 1.0));
            policy.apply(&pending, &groups, &cluster).await;
            assert!(provider.calls.lock().unwrap().is_empty());
        }

        let pending = group_pending_pods(cpu_pods(15, 1.0));
        policy.apply(&pending, &groups, &cluster).await;
        let calls = provider.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0], ("general-a".to_string(), 8)); // ceil(15/2)
    }

    #[tokio::test]
    async fn test_basic_policy_decides_each_key_once() {
        let (cluster, provider) = recording_cluster();
        let groups = vec![
            make_group("general", 2.0, 0, 10).with_label("pool", "general"),
            make_group("gpu", 2.0, 0, 10).with_label("pool", "gpu"),
        ];
        let mut pods = cpu_pods(2, 1.0);
        for pod in &mut pods {
            pod.selectors.insert("pool".to_string(), "general".to_string());
        }
        pods.push(
            Pod::new("g0", ResourceVector::new().with("cpu", 1.0))
                .with_selector("pool", "gpu"),
        );

        let pending = group_pending_pods(pods);
        let mut policy = ScalingPolicy::Basic;
        policy.apply(&pending, &groups, &cluster).await;

        let mut calls = provider.calls.lock().unwrap().clone();
        calls.sort();
        assert_eq!(
            calls,
            vec![("general".to_string(), 1), ("gpu".to_string(), 1)]
        );
    }
}
