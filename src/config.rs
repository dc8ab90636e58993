//! Process configuration and reference-data loading
//!
//! Settings come from the environment (overridable per-run from the CLI),
//! mirroring the deployment surface the autoscaler runs under:
//!
//! - `COST_DATA`: path to the cost reference table (default `data/costs.json`)
//! - `OVER_PROVISION`: slack units added to every computed need (default 0)
//!
//! File loading here is the I/O boundary: reading is thin, parsing is pure
//! and tested on its own.

use std::env;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::cost::CostTable;
use crate::group::ScaleGroup;
use crate::pod::Pod;

/// Default location of the cost reference table
pub const DEFAULT_COST_DATA: &str = "data/costs.json";

/// Environment-derived settings
#[derive(Debug, Clone)]
pub struct Settings {
    /// Path to the cost reference table
    pub cost_data: PathBuf,

    /// Slack units added on top of every computed need
    pub over_provision: u32,
}

impl Settings {
    /// Read settings from the environment, falling back to defaults
    pub fn from_env() -> Self {
        Self {
            cost_data: env::var("COST_DATA")
                .unwrap_or_else(|_| DEFAULT_COST_DATA.to_string())
                .into(),
            over_provision: env::var("OVER_PROVISION")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(0),
        }
    }
}

/// Errors loading configuration or reference data
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid cluster snapshot: {0}")]
    Snapshot(#[from] serde_yaml::Error),

    #[error("Invalid cost data: {0}")]
    CostData(#[from] serde_json::Error),
}

/// One observed cluster state: the groups and the pending pods.
///
/// The production collaborator builds this by polling the cluster; the CLI
/// loads it from a YAML file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClusterSnapshot {
    /// Scalable node groups
    #[serde(default)]
    pub groups: Vec<ScaleGroup>,

    /// Pending (unschedulable) pods
    #[serde(default)]
    pub pods: Vec<Pod>,
}

impl ClusterSnapshot {
    /// Parse a snapshot from YAML text
    pub fn from_str(content: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(content)?)
    }
}

/// Load and parse a cluster snapshot file
pub fn load_snapshot_file(path: &Path) -> Result<ClusterSnapshot, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    ClusterSnapshot::from_str(&content)
}

/// Load and parse the cost reference table
pub fn load_cost_table(path: &Path) -> Result<CostTable, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_temp_file(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    const SNAPSHOT: &str = r#"
groups:
  - name: general-a
    instanceType: m5.large
    priority: 0
    unitCapacity:
      cpu: 2
      memory: 8
    actualCapacity: 1
    desiredCapacity: 1
    maxSize: 10
    labels:
      pool: general
pods:
  - name: web-1
    resources:
      cpu: 1
      memory: 2
    selectors:
      pool: general
  - name: web-2
    resources:
      cpu: 1
      memory: 2
    selectors:
      pool: general
"#;

    #[test]
    fn test_parse_snapshot() {
        let snapshot = ClusterSnapshot::from_str(SNAPSHOT).unwrap();

        assert_eq!(snapshot.groups.len(), 1);
        assert_eq!(snapshot.pods.len(), 2);

        let group = &snapshot.groups[0];
        assert_eq!(group.name, "general-a");
        assert_eq!(group.unit_capacity.get("cpu"), 2.0);
        assert_eq!(group.max_size, 10);

        // both pods share one group key
        assert_eq!(snapshot.pods[0].group_key(), snapshot.pods[1].group_key());
    }

    #[test]
    fn test_load_snapshot_file() {
        let file = create_temp_file(SNAPSHOT);
        let snapshot = load_snapshot_file(file.path()).unwrap();
        assert_eq!(snapshot.groups[0].instance_type, "m5.large");
    }

    #[test]
    fn test_invalid_snapshot_is_an_error() {
        let file = create_temp_file("groups: {not: [a, list}");
        assert!(load_snapshot_file(file.path()).is_err());
    }

    #[test]
    fn test_load_cost_table() {
        let file = create_temp_file(
            r#"{
                "useast1": {
                    "name": "us-east-1",
                    "costs-per-hour": {
                        "m5.large": {"cost-per-hour": 0.096}
                    }
                }
            }"#,
        );

        let table = load_cost_table(file.path()).unwrap();
        assert_eq!(table.0.len(), 1);
        assert_eq!(table.0["useast1"].name, "us-east-1");
    }

    #[test]
    fn test_settings_defaults() {
        // scoped to names nothing else reads
        let settings = Settings::from_env();
        if env::var("COST_DATA").is_err() {
            assert_eq!(settings.cost_data, PathBuf::from(DEFAULT_COST_DATA));
        }
        if env::var("OVER_PROVISION").is_err() {
            assert_eq!(settings.over_provision, 0);
        }
    }
}
