//! Trigger accounting for the growth-gated policy
//!
//! The growth-triggered policy does not scale every cycle: it waits for the
//! pending-pod count to grow past a configured factor for several
//! consecutive observations before provisioning at all. `GrowthState` holds
//! the counters that implement that hysteresis: single-cycle spikes are
//! filtered out, sustained growth fires, and receding demand forgets the
//! accumulated signal.

use tracing::debug;

/// Fraction of the last observed pending count below which the growth
/// signal is considered receded and forgotten
pub const RECESSION_FACTOR: f64 = 0.75;

/// Consecutive-growth counters owned by the growth-triggered policy
#[derive(Debug, Clone)]
pub struct GrowthState {
    /// Growth ratio one observation must exceed to count as a trigger
    pub growth_factor: f64,

    /// Triggers required before a provisioning cycle runs
    pub triggers_to_provision: u32,

    trigger_count: u32,
    last_pending_count: usize,
}

impl GrowthState {
    /// Create state with zeroed counters
    pub fn new(growth_factor: f64, triggers_to_provision: u32) -> Self {
        Self {
            growth_factor,
            triggers_to_provision,
            trigger_count: 0,
            last_pending_count: 0,
        }
    }

    /// Triggers accumulated so far
    pub fn trigger_count(&self) -> u32 {
        self.trigger_count
    }

    /// Pending count at the last counted observation
    pub fn last_pending_count(&self) -> usize {
        self.last_pending_count
    }

    /// Record one cycle's pending-pod count; returns whether this cycle
    /// should provision.
    ///
    /// The first non-zero observation only primes the baseline; growth is
    /// measured against a previously observed count, never against zero.
    /// When provisioning fires, both counters reset so the next burst has
    /// to build up again from scratch.
    pub fn observe(&mut self, num_pending: usize) -> bool {
        if self.last_pending_count == 0 {
            self.last_pending_count = num_pending;
        } else if num_pending as f64 > self.growth_factor * self.last_pending_count as f64 {
            self.trigger_count += 1;
            self.last_pending_count = num_pending;
            debug!(
                "growth trigger {}/{}: pending {} exceeded {}x previous",
                self.trigger_count, self.triggers_to_provision, num_pending, self.growth_factor
            );
        } else if (num_pending as f64) < RECESSION_FACTOR * self.last_pending_count as f64 {
            debug!(
                "pending count {} receded below {}x of {}, resetting triggers",
                num_pending, RECESSION_FACTOR, self.last_pending_count
            );
            self.trigger_count = 0;
            self.last_pending_count = 0;
        }

        if self.trigger_count >= self.triggers_to_provision {
            self.trigger_count = 0;
            self.last_pending_count = 0;
            true
        } else {
            false
        }
    }
}
