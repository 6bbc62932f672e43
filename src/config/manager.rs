//! Unified configuration management over the device store.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::future::join_all;
use log::{error, info, warn};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::sync::RwLock;

use super::{
    ConfigBackupResult, ConfigDeployResult, ConfigDiff, ConfigOperation, ConfigOperationType,
    ConfigStatus, tasks,
};
use crate::error::NetError;
use crate::inventory::{DeviceProfile, DeviceStore};

/// Per-device failure entry of a batched backup.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct BackupFailure {
    pub device_id: String,
    pub error: String,
}

/// Aggregated result of a batched backup run.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct BatchBackupReport {
    pub total: usize,
    pub success: usize,
    pub failed: usize,
    pub results: Vec<ConfigBackupResult>,
    pub errors: Vec<BackupFailure>,
}

/// One on-disk backup file.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct BackupFileInfo {
    pub filename: String,
    pub path: String,
    pub hostname: String,
    pub size: u64,
    pub modified_time: DateTime<Utc>,
}

/// Configuration management facade: resolves devices, runs the pipeline
/// operations and tracks every invocation in an in-memory operation map.
pub struct ConfigManager<S: DeviceStore> {
    store: Arc<S>,
    backup_dir: PathBuf,
    operations: RwLock<HashMap<String, ConfigOperation>>,
}

impl<S: DeviceStore> ConfigManager<S> {
    pub fn new(store: Arc<S>, backup_dir: impl Into<PathBuf>) -> Self {
        Self {
            store,
            backup_dir: backup_dir.into(),
            operations: RwLock::new(HashMap::new()),
        }
    }

    pub fn backup_dir(&self) -> &PathBuf {
        &self.backup_dir
    }

    /// Backs up one device's running configuration.
    pub async fn backup_device_config(
        &self,
        device_id: &str,
    ) -> Result<ConfigBackupResult, NetError> {
        let profile = self.resolve_profile(device_id).await?;
        let operation_id = self
            .begin_operation(device_id, ConfigOperationType::Backup)
            .await;

        match tasks::backup_config(&profile, &self.backup_dir, Some("backup")).await {
            Ok(result) => {
                let backup_path = result.backup_path.clone();
                let metadata = vec![
                    ("file_size".to_string(), json!(result.file_size)),
                    ("checksum".to_string(), json!(result.checksum)),
                ];
                self.update_operation(&operation_id, |op| {
                    op.status = ConfigStatus::Success;
                    op.backup_path = Some(backup_path.clone());
                    op.completed_at = Some(Utc::now());
                    op.metadata.extend(metadata.clone());
                })
                .await;
                info!("backup of device {device_id} finished: {}", result.backup_path);
                Ok(result)
            }
            Err(err) => {
                self.fail_operation(&operation_id, &err).await;
                error!("backup of device {device_id} failed: {err}");
                Err(err)
            }
        }
    }

    /// Backs up many devices concurrently, aggregating per-device
    /// results and failures. One device's failure never affects the
    /// others.
    pub async fn backup_multiple_devices(&self, device_ids: &[String]) -> BatchBackupReport {
        info!("starting batched backup of {} devices", device_ids.len());

        let futures = device_ids
            .iter()
            .map(|device_id| self.backup_device_config(device_id));
        let outcomes = join_all(futures).await;

        let mut results = Vec::new();
        let mut errors = Vec::new();
        for (device_id, outcome) in device_ids.iter().zip(outcomes) {
            match outcome {
                Ok(result) => results.push(result),
                Err(err) => errors.push(BackupFailure {
                    device_id: device_id.clone(),
                    error: err.to_string(),
                }),
            }
        }

        info!(
            "batched backup finished: {} ok, {} failed",
            results.len(),
            errors.len()
        );
        BatchBackupReport {
            total: device_ids.len(),
            success: results.len(),
            failed: errors.len(),
            results,
            errors,
        }
    }

    /// Deploys a candidate configuration to a device.
    pub async fn deploy_config(
        &self,
        device_id: &str,
        config_content: &str,
        dry_run: bool,
    ) -> Result<ConfigDeployResult, NetError> {
        let profile = self.resolve_profile(device_id).await?;
        let operation_id = self
            .begin_operation(device_id, ConfigOperationType::Deploy)
            .await;
        self.update_operation(&operation_id, |op| {
            op.config_content = Some(config_content.to_string());
        })
        .await;

        match tasks::deploy_config(&profile, config_content, &self.backup_dir, dry_run).await {
            Ok(result) => {
                let status = if result.success {
                    ConfigStatus::Success
                } else {
                    ConfigStatus::Failed
                };
                let error_message = (!result.success)
                    .then(|| format!("{:?}", result.error_details));
                let metadata = vec![
                    (
                        "deployed_commands".to_string(),
                        json!(result.deployed_commands.len()),
                    ),
                    (
                        "failed_commands".to_string(),
                        json!(result.failed_commands.len()),
                    ),
                    ("dry_run".to_string(), json!(dry_run)),
                ];
                self.update_operation(&operation_id, |op| {
                    op.status = status;
                    op.error_message = error_message.clone();
                    op.completed_at = Some(Utc::now());
                    op.metadata.extend(metadata.clone());
                })
                .await;
                info!(
                    "deploy to device {device_id}{} finished: success={}",
                    if dry_run { " (dry run)" } else { "" },
                    result.success
                );
                Ok(result)
            }
            Err(err) => {
                self.fail_operation(&operation_id, &err).await;
                error!("deploy to device {device_id} failed: {err}");
                Err(err)
            }
        }
    }

    /// Compares the device's current configuration against a target.
    pub async fn compare_config(
        &self,
        device_id: &str,
        target_config: &str,
    ) -> Result<ConfigDiff, NetError> {
        let profile = self.resolve_profile(device_id).await?;
        let operation_id = self
            .begin_operation(device_id, ConfigOperationType::Diff)
            .await;
        self.update_operation(&operation_id, |op| {
            op.config_content = Some(target_config.to_string());
        })
        .await;

        match tasks::diff_config(&profile, target_config, &self.backup_dir).await {
            Ok(diff) => {
                let metadata = vec![
                    ("additions".to_string(), json!(diff.additions.len())),
                    ("deletions".to_string(), json!(diff.deletions.len())),
                ];
                self.update_operation(&operation_id, |op| {
                    op.status = ConfigStatus::Success;
                    op.completed_at = Some(Utc::now());
                    op.metadata.extend(metadata.clone());
                })
                .await;
                Ok(diff)
            }
            Err(err) => {
                self.fail_operation(&operation_id, &err).await;
                error!("diff for device {device_id} failed: {err}");
                Err(err)
            }
        }
    }

    /// Rolls the device back to a previous backup file.
    pub async fn rollback_config(
        &self,
        device_id: &str,
        backup_path: &str,
    ) -> Result<ConfigDeployResult, NetError> {
        let profile = self.resolve_profile(device_id).await?;
        let operation_id = self
            .begin_operation(device_id, ConfigOperationType::Rollback)
            .await;
        self.update_operation(&operation_id, |op| {
            op.backup_path = Some(backup_path.to_string());
        })
        .await;

        match tasks::rollback_config(
            &profile,
            std::path::Path::new(backup_path),
            &self.backup_dir,
        )
        .await
        {
            Ok(result) => {
                let status = if result.success {
                    ConfigStatus::Success
                } else {
                    ConfigStatus::Failed
                };
                let error_message = (!result.success)
                    .then(|| format!("{:?}", result.error_details));
                self.update_operation(&operation_id, |op| {
                    op.status = status;
                    op.error_message = error_message.clone();
                    op.completed_at = Some(Utc::now());
                })
                .await;
                info!(
                    "rollback of device {device_id} finished: success={}",
                    result.success
                );
                Ok(result)
            }
            Err(err) => {
                self.fail_operation(&operation_id, &err).await;
                error!("rollback of device {device_id} failed: {err}");
                Err(err)
            }
        }
    }

    /// Snapshot of one tracked operation.
    pub async fn operation_status(&self, operation_id: &str) -> Option<ConfigOperation> {
        let operations = self.operations.read().await;
        operations.get(operation_id).cloned()
    }

    /// Tracked operations, newest first, optionally filtered by device.
    pub async fn list_operations(&self, device_id: Option<&str>) -> Vec<ConfigOperation> {
        let operations = self.operations.read().await;
        let mut listed: Vec<ConfigOperation> = operations
            .values()
            .filter(|op| device_id.is_none_or(|id| op.device_id == id))
            .cloned()
            .collect();
        listed.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        listed
    }

    /// Best-effort scan of the backup directory, newest first.
    pub async fn list_backups(&self) -> Vec<BackupFileInfo> {
        let mut backups = Vec::new();
        let mut entries = match tokio::fs::read_dir(&self.backup_dir).await {
            Ok(entries) => entries,
            Err(err) => {
                warn!(
                    "cannot scan backup directory {}: {err}",
                    self.backup_dir.display()
                );
                return backups;
            }
        };

        while let Ok(Some(entry)) = entries.next_entry().await {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("cfg") {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            // Filename scheme: hostname_timestamp[_suffix].cfg
            let parts: Vec<&str> = stem.split('_').collect();
            if parts.len() < 2 {
                continue;
            }
            let Ok(metadata) = entry.metadata().await else {
                warn!("cannot stat backup file {}", path.display());
                continue;
            };
            let modified_time = metadata
                .modified()
                .map(DateTime::<Utc>::from)
                .unwrap_or_else(|_| Utc::now());

            backups.push(BackupFileInfo {
                filename: entry.file_name().to_string_lossy().to_string(),
                path: path.display().to_string(),
                hostname: parts[0].to_string(),
                size: metadata.len(),
                modified_time,
            });
        }

        backups.sort_by(|a, b| b.modified_time.cmp(&a.modified_time));
        backups
    }

    async fn resolve_profile(&self, device_id: &str) -> Result<DeviceProfile, NetError> {
        match self.store.get_device(device_id).await? {
            Some(record) => Ok(DeviceProfile::from_record(&record, None)),
            None => Err(NetError::DeviceNotFound(device_id.to_string())),
        }
    }

    async fn begin_operation(&self, device_id: &str, kind: ConfigOperationType) -> String {
        let operation_id = format!(
            "{}_{}_{}",
            kind.as_str(),
            device_id,
            Utc::now().timestamp_millis()
        );
        let mut operation =
            ConfigOperation::new(operation_id.clone(), device_id.to_string(), kind);
        operation.status = ConfigStatus::Running;

        let mut operations = self.operations.write().await;
        operations.insert(operation_id.clone(), operation);
        operation_id
    }

    async fn update_operation(
        &self,
        operation_id: &str,
        mutate: impl FnOnce(&mut ConfigOperation),
    ) {
        let mut operations = self.operations.write().await;
        if let Some(operation) = operations.get_mut(operation_id) {
            mutate(operation);
        }
    }

    async fn fail_operation(&self, operation_id: &str, err: &NetError) {
        let message = err.to_string();
        self.update_operation(operation_id, |op| {
            op.status = ConfigStatus::Failed;
            op.error_message = Some(message.clone());
            op.completed_at = Some(Utc::now());
        })
        .await;
    }
}
