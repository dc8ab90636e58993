//! # nodescale
//!
//! The decision core of a cluster autoscaler: given the pending
//! (unschedulable) pods observed this cycle and the scalable node groups
//! that could host them, decide how many additional capacity units each
//! group needs and issue the resulting scale-up operations.
//!
//! ## What the core does
//!
//! 1. **Partition** pending pods by group key (a stable hash of their
//!    scheduling selectors).
//! 2. **Select** candidate groups per key and order them by the cluster's
//!    priority rule.
//! 3. **Pack** each key's pods into provisional capacity units with a
//!    greedy first-fit allocator, respecting resource and taint
//!    feasibility.
//! 4. **Clamp** the resulting unit count against per-group ceilings,
//!    cooldowns, and (in the cost-constrained policy) an hourly budget.
//! 5. **Issue** one concurrent scale operation per touched group and wait
//!    for the batch, logging failures and notifying on success.
//!
//! ## What it deliberately does not do
//!
//! - Talk to a real cloud API: providers implement
//!   [`ScaleProvider`](operations::ScaleProvider) outside this crate.
//! - Retry failed scale calls: the next decision cycle is the retry.
//! - Detect node terminations: the lifecycle collaborator reports them via
//!   [`CostState::node_terminated`](cost::CostState::node_terminated).
//! - Run cycles concurrently: the caller serializes `apply`.
//!
//! ## Policies
//!
//! [`ScalingPolicy`](policy::ScalingPolicy) is a closed set of variants
//! sharing one decision procedure: `Basic` provisions every cycle,
//! `CostConstrained` adds a soft hourly budget gate, and `GrowthTriggered`
//! waits for sustained pending-pod growth before provisioning at all.

pub mod cli;
pub mod cluster;
pub mod config;
pub mod cost;
pub mod group;
pub mod growth;
pub mod operations;
pub mod packing;
pub mod pod;
pub mod policy;
pub mod resources;
pub mod timeouts;

pub use cluster::ClusterContext;
pub use config::{load_cost_table, load_snapshot_file, ClusterSnapshot, ConfigError, Settings};
pub use cost::{CostError, CostState, CostTable};
pub use group::ScaleGroup;
pub use growth::GrowthState;
pub use operations::{
    create_operation, fulfill_requests, DryRunProvider, LogNotifier, ProviderError,
    ScaleNotifier, ScaleOperation, ScaleProvider,
};
pub use packing::{pack_pods, Allocation};
pub use pod::{group_pending_pods, GroupKey, PendingPods, Pod};
pub use policy::{decide_num_instances, ScalingPolicy};
pub use resources::ResourceVector;
pub use timeouts::TimeoutTracker;
