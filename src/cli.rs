use clap::{ArgAction, Parser, ValueEnum};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "nodescale")]
#[command(about = "Scaling decision core for cluster node-group autoscaling")]
#[command(version)]
pub struct Args {
    /// Path to the cluster snapshot file (YAML: groups + pending pods)
    #[arg(required = true)]
    pub snapshot_file: PathBuf,

    /// Enable verbose logging output (-v, -vv, -vvv)
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,

    /// Scaling policy to run
    #[arg(long, value_enum, default_value = "basic")]
    pub policy: PolicyKind,

    /// Region whose cost table applies (cost policy)
    #[arg(long, value_name = "REGION", default_value = "us-east-1")]
    pub region: String,

    /// Hourly cost budget (cost policy)
    #[arg(long, value_name = "DOLLARS", default_value = "10.0")]
    pub max_cost_per_hour: f64,

    /// Override the COST_DATA path to the cost reference table
    #[arg(long, value_name = "FILE")]
    pub cost_data: Option<PathBuf>,

    /// Override the OVER_PROVISION slack units
    #[arg(long, value_name = "UNITS")]
    pub over_provision: Option<u32>,

    /// Growth ratio one cycle must exceed to count as a trigger (growth policy)
    #[arg(long, default_value = "2.0")]
    pub growth_factor: f64,

    /// Consecutive triggers required before provisioning (growth policy)
    #[arg(long, default_value = "3")]
    pub triggers_to_provision: u32,

    /// Re-run a decision cycle every N seconds, reloading the snapshot (0 = one cycle)
    #[arg(long, value_name = "SECS", default_value = "0")]
    pub interval: u64,

    /// Path to a .env file for loading settings
    #[arg(long, value_name = "FILE")]
    pub env_file: Option<PathBuf>,
}

/// Policy selector for the CLI
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum PolicyKind {
    /// Provision immediately, every cycle
    Basic,
    /// Provision immediately, capped by an hourly cost budget
    Cost,
    /// Provision only after sustained pending-pod growth
    Growth,
}

// ============================================================================
// Pure display logic (no I/O - returns formatted strings)
// ============================================================================

use crate::config::ClusterSnapshot;
use crate::pod::group_pending_pods;

/// Format a snapshot summary printed before the first cycle.
/// Pure function - returns a formatted string.
pub fn format_snapshot_summary(snapshot: &ClusterSnapshot) -> String {
    let mut output = String::new();

    let pending = group_pending_pods(snapshot.pods.iter().cloned());

    output.push_str(&format!(
        "Cluster snapshot: {} group(s), {} pending pod(s) in {} key(s)\n",
        snapshot.groups.len(),
        snapshot.pods.len(),
        pending.len()
    ));

    for group in &snapshot.groups {
        output.push_str(&format!(
            "  group {} [{}] capacity {}/{} max {} unit {}\n",
            group.name,
            group.instance_type,
            group.actual_capacity,
            group.desired_capacity,
            group.max_size,
            group.unit_capacity
        ));
    }

    for (key, pods) in &pending {
        output.push_str(&format!("  key {}: {} pod(s)\n", key, pods.len()));
    }

    output
}
