//! Bin-packing allocator
//!
//! Pure estimation step of the decision cycle: pack one group key's pending
//! pods into the fewest fresh capacity units a group would need to host
//! them. Greedy first-fit in input order, an upper-bound heuristic, not an
//! optimal packing (no sorting, so this is first-fit, not
//! first-fit-decreasing).
//!
//! A pod that cannot fit a fresh unit on its own, or whose tolerations do
//! not cover the group's taints, is skipped entirely: creating capacity that
//! still could not host the pod would be pure waste, so it stays pending for
//! a later cycle.

use crate::group::ScaleGroup;
use crate::pod::Pod;
use crate::resources::ResourceVector;

/// Result of packing one group key's pods against one group.
///
/// `bins` and `assigned` are index-parallel: `bins[i]` is the residual
/// capacity of provisional unit `i` and `assigned[i]` the pods placed on it.
#[derive(Debug, Clone, Default)]
pub struct Allocation {
    /// Residual capacity per provisional unit
    pub bins: Vec<ResourceVector>,

    /// Pods assigned to each provisional unit
    pub assigned: Vec<Vec<Pod>>,
}

impl Allocation {
    /// Number of additional capacity units estimated necessary
    pub fn units_needed(&self) -> usize {
        self.bins.len()
    }

    /// All assigned pods in bin order, flattened for notification
    pub fn flatten_pods(&self) -> Vec<Pod> {
        self.assigned.iter().flatten().cloned().collect()
    }
}

/// Pack pods into provisional capacity units of `unit_capacity`.
///
/// Zero bins means nothing fit (resource or taint mismatch for every pod);
/// the caller treats that as "do nothing for this group", not an error.
pub fn pack_pods(unit_capacity: &ResourceVector, pods: &[Pod], group: &ScaleGroup) -> Allocation {
    let mut allocation = Allocation::default();

    for pod in pods {
        if !unit_capacity.subtract(&pod.resources).is_feasible()
            || !group.tolerates_taints(pod)
        {
            continue;
        }

        let mut placed = false;
        for (i, bin) in allocation.bins.iter_mut().enumerate() {
            let residual = bin.subtract(&pod.resources);
            if residual.is_feasible() {
                *bin = residual;
                allocation.assigned[i].push(pod.clone());
                placed = true;
                break;
            }
        }

        if !placed {
            allocation
                .bins
                .push(unit_capacity.subtract(&pod.resources));
            allocation.assigned.push(vec![pod.clone()]);
        }
    }

    allocation
}
