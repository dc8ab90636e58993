//! Async scale operations and their fulfillment
//!
//! Issuing a scale request is fire-and-forget within a cycle: the provider
//! call is spawned immediately and runs concurrently with the rest of the
//! decision pass, and `fulfill_requests` blocks the cycle until every
//! operation of the batch has resolved. Failures and timeouts are logged and
//! abandoned; the next decision cycle is the retry mechanism.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::cluster::ClusterContext;
use crate::group::ScaleGroup;
use crate::pod::Pod;

/// Errors surfaced by a scale provider call
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("provider API error: {message}")]
    Api { message: String },

    #[error("provider call timed out")]
    Timeout,
}

/// The cloud-side entry point for changing a group's capacity.
///
/// Implementations live outside this crate; the decision core only issues
/// `set_capacity` calls and observes their outcome. It never retries.
#[async_trait]
pub trait ScaleProvider: Send + Sync {
    /// Request that the group's capacity be set to `new_capacity`
    async fn set_capacity(&self, group_name: &str, new_capacity: u32)
        -> Result<(), ProviderError>;
}

/// Receives a notification for every successfully issued scale-up
#[async_trait]
pub trait ScaleNotifier: Send + Sync {
    /// Called after the provider accepted the scale request, with the pods
    /// the requested units were packed for
    async fn notify_scale(&self, group_name: &str, units_requested: u32, pods: &[Pod]);
}

/// Provider that accepts every request without touching anything.
///
/// Used by the CLI's planning mode and by tests.
#[derive(Debug, Default)]
pub struct DryRunProvider;

#[async_trait]
impl ScaleProvider for DryRunProvider {
    async fn set_capacity(
        &self,
        group_name: &str,
        new_capacity: u32,
    ) -> Result<(), ProviderError> {
        info!(
            "dry-run: would set capacity of group {} to {}",
            group_name, new_capacity
        );
        Ok(())
    }
}

/// Notifier that only writes to the log
#[derive(Debug, Default)]
pub struct LogNotifier;

#[async_trait]
impl ScaleNotifier for LogNotifier {
    async fn notify_scale(&self, group_name: &str, units_requested: u32, pods: &[Pod]) {
        info!(
            "scaled group {} by {} unit(s) for {} pod(s)",
            group_name,
            units_requested,
            pods.len()
        );
    }
}

/// An in-flight scale call.
///
/// Exists only for the duration of one decision cycle; the provider task is
/// already running when the handle is returned.
pub struct ScaleOperation {
    /// Operation id for log correlation
    pub id: Uuid,

    /// Group being scaled
    pub group_name: String,

    /// Capacity requested from the provider
    pub new_capacity: u32,

    /// Units added on top of the group's actual capacity
    pub units_requested: u32,

    /// Pods assigned per provisional unit, for the success notification
    pub assigned_pods: Vec<Vec<Pod>>,

    handle: JoinHandle<Result<(), ProviderError>>,
}

/// Issue a scale request for `group` and return its tracking handle.
///
/// The provider call starts immediately on the runtime; operations issued in
/// one cycle run concurrently, unbounded.
pub fn create_operation(
    cluster: &ClusterContext,
    group: &ScaleGroup,
    assigned_pods: Vec<Vec<Pod>>,
    new_capacity: u32,
    units_requested: u32,
) -> ScaleOperation {
    let id = Uuid::new_v4();
    let provider = Arc::clone(&cluster.provider);
    let group_name = group.name.clone();

    debug!(
        "issuing scale operation {}: group {} -> capacity {}",
        id, group_name, new_capacity
    );

    let task_group = group_name.clone();
    let handle =
        tokio::spawn(async move { provider.set_capacity(&task_group, new_capacity).await });

    ScaleOperation {
        id,
        group_name,
        new_capacity,
        units_requested,
        assigned_pods,
        handle,
    }
}

/// Wait for every operation of a cycle to resolve.
///
/// Success fires the cluster's notifier with the flattened pod assignment;
/// provider errors and timeouts are logged as warnings and abandoned. No
/// failure propagates out of this function and none aborts the other
/// operations of the batch.
pub async fn fulfill_requests(cluster: &ClusterContext, operations: Vec<ScaleOperation>) {
    let waits = operations.into_iter().map(|op| async move {
        let ScaleOperation {
            id,
            group_name,
            new_capacity: _,
            units_requested,
            assigned_pods,
            handle,
        } = op;
        let outcome = handle.await;
        (id, group_name, units_requested, assigned_pods, outcome)
    });

    for (id, group_name, units_requested, assigned_pods, outcome) in
        futures::future::join_all(waits).await
    {
        match outcome {
            Ok(Ok(())) => {
                let flat_pods: Vec<Pod> =
                    assigned_pods.into_iter().flatten().collect();
                cluster
                    .notifier
                    .notify_scale(&group_name, units_requested, &flat_pods)
                    .await;
                debug!("scale operation {} for group {} succeeded", id, group_name);
            }
            Ok(Err(ProviderError::Timeout)) => {
                warn!("timeout while scaling group {}", group_name);
            }
            Ok(Err(e)) => {
                warn!("error while scaling group {}: {}", group_name, e);
            }
            Err(e) => {
                warn!(
                    "scale task for group {} did not complete: {}",
                    group_name, e
                );
            }
        }
    }
}
