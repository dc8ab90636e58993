//! Cost accounting for the budget-gated policy
//!
//! `CostState` keeps the rolling picture the cost-constrained policy gates
//! on: what was spent in the current wall-clock hour, and the observed
//! average instance lifetime. Spend is attributed when the external node
//! lifecycle collaborator reports a termination; the decision core never
//! detects terminations itself, so accounting accuracy depends on that
//! collaborator calling [`CostState::node_terminated`] on every removal.
//!
//! All clock-dependent transitions take `now` as a parameter; callers pass
//! `Utc::now()` at the boundary.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use thiserror::Error;
use tracing::warn;

/// Assumed instance lifetime before any termination has been observed
pub const DEFAULT_AVG_HOURS_PER_INSTANCE: f64 = 0.25;

/// Fraction of the hourly budget the gate provisions up to.
///
/// A soft ceiling: actual spend depends on real instance lifetimes, not the
/// rolling average the prediction uses.
pub const BUDGET_HEADROOM: f64 = 0.75;

/// Cost reference table, JSON keyed by region id
#[derive(Debug, Clone, Deserialize)]
#[serde(transparent)]
pub struct CostTable(pub HashMap<String, RegionCosts>);

/// One region's entry in the cost table
#[derive(Debug, Clone, Deserialize)]
pub struct RegionCosts {
    /// Human region name, matched against the configured region
    pub name: String,

    /// Per-instance-type hourly cost
    #[serde(rename = "costs-per-hour")]
    pub costs_per_hour: HashMap<String, InstanceCost>,
}

/// Hourly cost of one instance type
#[derive(Debug, Clone, Deserialize)]
pub struct InstanceCost {
    #[serde(rename = "cost-per-hour")]
    pub cost_per_hour: f64,
}

/// Errors constructing cost state from reference data
#[derive(Error, Debug)]
pub enum CostError {
    #[error("region '{0}' not present in cost data")]
    UnknownRegion(String),
}

/// Rolling cost accounting owned by the cost-constrained policy
#[derive(Debug, Clone)]
pub struct CostState {
    /// Hourly budget the gate protects
    pub max_cost_per_hour: f64,

    /// Region whose cost table is in effect
    pub region: String,

    started_at: DateTime<Utc>,
    hour_index: u32,
    spent_this_hour: f64,
    seconds_instances_used: f64,
    instances_tracked: u64,
    costs_per_hour: HashMap<String, f64>,
}

impl CostState {
    /// Build state for `region` from a loaded cost table.
    ///
    /// Fails when no region entry carries the requested name.
    pub fn new(
        max_cost_per_hour: f64,
        region: impl Into<String>,
        table: &CostTable,
        now: DateTime<Utc>,
    ) -> Result<Self, CostError> {
        let region = region.into();
        let costs = table
            .0
            .values()
            .find(|r| r.name == region)
            .ok_or_else(|| CostError::UnknownRegion(region.clone()))?;

        let costs_per_hour = costs
            .costs_per_hour
            .iter()
            .map(|(instance_type, c)| (instance_type.clone(), c.cost_per_hour))
            .collect();

        Ok(Self {
            max_cost_per_hour,
            region,
            started_at: now,
            hour_index: 0,
            spent_this_hour: 0.0,
            seconds_instances_used: 0.0,
            instances_tracked: 0,
            costs_per_hour,
        })
    }

    /// Build state from an explicit instance-type cost map (tests, embedders
    /// that load costs elsewhere)
    pub fn with_costs(
        max_cost_per_hour: f64,
        region: impl Into<String>,
        costs_per_hour: HashMap<String, f64>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            max_cost_per_hour,
            region: region.into(),
            started_at: now,
            hour_index: 0,
            spent_this_hour: 0.0,
            seconds_instances_used: 0.0,
            instances_tracked: 0,
            costs_per_hour,
        }
    }

    /// Spend attributed to the current hour so far
    pub fn spent_this_hour(&self) -> f64 {
        self.spent_this_hour
    }

    /// Completed hours the state has rolled through
    pub fn hour_index(&self) -> u32 {
        self.hour_index
    }

    /// Observed average instance lifetime in hours.
    ///
    /// Falls back to [`DEFAULT_AVG_HOURS_PER_INSTANCE`] until a termination
    /// has been tracked.
    pub fn avg_hours_per_instance(&self) -> f64 {
        if self.instances_tracked > 0 {
            self.seconds_instances_used / self.instances_tracked as f64 / 3600.0
        } else {
            DEFAULT_AVG_HOURS_PER_INSTANCE
        }
    }

    /// Hourly cost for an instance type.
    ///
    /// Unknown types log a warning and read as zero: degraded accounting
    /// must not abort a decision cycle.
    pub fn cost_per_hour(&self, instance_type: &str) -> f64 {
        match self.costs_per_hour.get(instance_type) {
            Some(cost) => *cost,
            None => {
                warn!(
                    "instance type {} missing from cost data for region {}",
                    instance_type, self.region
                );
                0.0
            }
        }
    }

    /// Roll into a new accounting hour when one has elapsed.
    ///
    /// When the whole hours elapsed since construction exceed the tracked
    /// hour index, bump the index and zero the hourly spend.
    pub fn roll_hour(&mut self, now: DateTime<Utc>) {
        let elapsed_hours = (now - self.started_at).num_hours();
        if elapsed_hours > self.hour_index as i64 {
            self.hour_index += 1;
            self.spent_this_hour = 0.0;
        }
    }

    /// Record a node termination reported by the lifecycle collaborator.
    ///
    /// Accumulates the instance's lifetime into the averages and charges
    /// `lifetime_hours * cost_per_hour` to the current hour.
    pub fn node_terminated(
        &mut self,
        creation_time: DateTime<Utc>,
        instance_type: &str,
        now: DateTime<Utc>,
    ) {
        let lifetime_seconds = ((now - creation_time).num_milliseconds() as f64 / 1000.0).max(0.0);
        self.seconds_instances_used += lifetime_seconds;
        self.instances_tracked += 1;
        self.spent_this_hour += self.cost_per_hour(instance_type) * (lifetime_seconds / 3600.0);
    }

    /// Cap a unit request to what the hourly budget still affords.
    ///
    /// Returns the largest count `n <= units_requested` whose predicted cost
    /// `spent + n * avg_lifetime * cost` stays within
    /// [`BUDGET_HEADROOM`] of the hourly budget.
    pub fn cap_units(&self, units_requested: u32, instance_type: &str) -> u32 {
        let cost = self.cost_per_hour(instance_type);
        let avg_hours = self.avg_hours_per_instance();
        let budget = self.max_cost_per_hour * BUDGET_HEADROOM;

        for i in 0..units_requested {
            let predicted = self.spent_this_hour + (i + 1) as f64 * avg_hours * cost;
            if predicted > budget {
                return i;
            }
        }
        units_requested
    }
}
