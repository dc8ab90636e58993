//! Multi-dimensional resource vectors
//!
//! A `ResourceVector` is the capacity/requirement value the allocator and
//! the scaling policies do arithmetic on: an ordered set of named numeric
//! dimensions (cpu, memory, ...). Subtraction is component-wise over the
//! union of dimension names and may go negative; feasibility is the pure
//! predicate "no component is negative".

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Named numeric capacity or requirement dimensions.
///
/// Backed by an ordered map so iteration, display, and serialization are
/// deterministic. A dimension that is absent reads as zero.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceVector {
    dimensions: BTreeMap<String, f64>,
}

impl ResourceVector {
    /// Create an empty vector (all dimensions zero)
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a dimension
    pub fn with(mut self, name: impl Into<String>, amount: f64) -> Self {
        self.dimensions.insert(name.into(), amount);
        self
    }

    /// Convenience constructor for the common cpu/memory pair
    pub fn cpu_memory(cpu: f64, memory: f64) -> Self {
        Self::new().with("cpu", cpu).with("memory", memory)
    }

    /// Amount of a dimension, zero if absent
    pub fn get(&self, name: &str) -> f64 {
        self.dimensions.get(name).copied().unwrap_or(0.0)
    }

    /// Iterate dimensions in name order
    pub fn dimensions(&self) -> impl Iterator<Item = (&str, f64)> {
        self.dimensions.iter().map(|(k, v)| (k.as_str(), *v))
    }

    /// True if no dimension is set
    pub fn is_empty(&self) -> bool {
        self.dimensions.is_empty()
    }

    /// Component-wise subtraction over the union of dimension names.
    ///
    /// Returns a new vector; components may go negative. Use
    /// [`is_feasible`](Self::is_feasible) on the result to test whether the
    /// subtracted requirement actually fits.
    pub fn subtract(&self, other: &ResourceVector) -> ResourceVector {
        let mut dimensions = self.dimensions.clone();
        for (name, amount) in &other.dimensions {
            *dimensions.entry(name.clone()).or_insert(0.0) -= amount;
        }
        ResourceVector { dimensions }
    }

    /// True iff every component is non-negative
    pub fn is_feasible(&self) -> bool {
        self.dimensions.values().all(|v| *v >= 0.0)
    }
}

impl fmt::Display for ResourceVector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (name, amount) in &self.dimensions {
            if !first {
                write!(f, ",")?;
            }
            write!(f, "{}={}", name, amount)?;
            first = false;
        }
        Ok(())
    }
}
