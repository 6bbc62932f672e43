//! Concurrent batch dispatch across a resolved inventory.
//!
//! The runner resolves device ids or filters into per-host profiles, then
//! dispatches one concurrently-scheduled unit of work per device with
//! gather-and-wait semantics. Per-host isolation is structural: a failure
//! (or panic) in one host's task lands in the failure map and never
//! cancels or delays the others.

use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::Arc;

use futures::future::join_all;
use indexmap::IndexMap;
use log::info;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::NetError;
use crate::inventory::{DeviceFilters, DeviceProfile, DeviceStore, HostSummary, InventoryBuilder};
use crate::tasks::{TaskContext, TaskFn, TaskResult, named_task};

/// Batch results partitioned into per-host success and failure maps,
/// keyed by host name in resolved-inventory order.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct BatchOutcome {
    pub success: IndexMap<String, TaskResult>,
    pub failed: IndexMap<String, String>,
}

impl BatchOutcome {
    pub fn total(&self) -> usize {
        self.success.len() + self.failed.len()
    }
}

/// Summary of a resolved inventory, for debugging and validation.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct InventorySummary {
    pub total_devices: usize,
    pub devices: IndexMap<String, HostSummary>,
}

/// Dispatches a task concurrently across device fleets.
pub struct TaskRunner<S: DeviceStore> {
    inventory: InventoryBuilder<S>,
    max_workers: NonZeroUsize,
}

impl<S: DeviceStore> TaskRunner<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self {
            inventory: InventoryBuilder::new(store),
            max_workers: NonZeroUsize::new(50).expect("nonzero literal"),
        }
    }

    /// Runs `task` once per device id.
    pub async fn run_on_devices(
        &self,
        task: TaskFn,
        device_ids: &[String],
        password: Option<&str>,
        kwargs: HashMap<String, String>,
    ) -> Result<BatchOutcome, NetError> {
        let profiles = self
            .inventory
            .build_from_device_ids(device_ids, password)
            .await?;
        Ok(Self::dispatch(task, profiles, kwargs).await)
    }

    /// Runs `task` once per device matching the filters.
    pub async fn run_on_filters(
        &self,
        task: TaskFn,
        filters: &DeviceFilters,
        password: Option<&str>,
        kwargs: HashMap<String, String>,
    ) -> Result<BatchOutcome, NetError> {
        let profiles = self.inventory.build_from_filters(filters, password).await?;
        Ok(Self::dispatch(task, profiles, kwargs).await)
    }

    /// Runs a registry task by name against device ids.
    pub async fn run_named(
        &self,
        task_name: &str,
        device_ids: &[String],
        password: Option<&str>,
        kwargs: HashMap<String, String>,
    ) -> Result<BatchOutcome, NetError> {
        self.run_on_devices(named_task(task_name), device_ids, password, kwargs)
            .await
    }

    /// Resolved connection parameters per host, without credentials.
    pub async fn device_summary(
        &self,
        device_ids: &[String],
    ) -> Result<InventorySummary, NetError> {
        let profiles = self.inventory.build_from_device_ids(device_ids, None).await?;
        let devices: IndexMap<String, HostSummary> = profiles
            .iter()
            .map(|p| (p.name.clone(), HostSummary::from(p)))
            .collect();
        Ok(InventorySummary {
            total_devices: devices.len(),
            devices,
        })
    }

    /// Stored fan-out ceiling. Currently informational: dispatch schedules
    /// every host at once and the ceiling is not applied as a bound.
    pub fn max_workers(&self) -> usize {
        self.max_workers.get()
    }

    pub fn set_max_workers(&mut self, max_workers: NonZeroUsize) {
        self.max_workers = max_workers;
    }

    async fn dispatch(
        task: TaskFn,
        profiles: Vec<DeviceProfile>,
        kwargs: HashMap<String, String>,
    ) -> BatchOutcome {
        let mut handles = Vec::with_capacity(profiles.len());
        for profile in &profiles {
            let ctx = TaskContext::new(profile, kwargs.clone());
            let task = task.clone();
            handles.push(tokio::spawn(async move { task(ctx).await }));
        }

        let joined = join_all(handles).await;

        let mut outcome = BatchOutcome::default();
        for (profile, result) in profiles.iter().zip(joined) {
            match result {
                Ok(result) if result.success => {
                    outcome.success.insert(profile.name.clone(), result);
                }
                Ok(result) => {
                    let error = result
                        .error
                        .unwrap_or_else(|| "task failed".to_string());
                    outcome.failed.insert(profile.name.clone(), error);
                }
                Err(join_error) => {
                    outcome
                        .failed
                        .insert(profile.name.clone(), format!("task panicked: {join_error}"));
                }
            }
        }

        info!(
            "batch dispatch finished: {} ok, {} failed",
            outcome.success.len(),
            outcome.failed.len()
        );
        outcome
    }
}
