//! Config pipeline operations against one device.
//!
//! Deploy order is fixed: backup, validate, then (unless dry-run) push.
//! The pre-change backup also runs for dry runs.

use std::collections::HashMap;
use std::path::Path;

use chrono::Local;
use log::{info, warn};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use super::{
    ConfigBackupResult, ConfigDeployResult, ConfigDiff, generate_diff, normalize_config,
    validate_syntax,
};
use crate::adapter::{ActionParams, actions, adapter_for};
use crate::error::NetError;
use crate::inventory::DeviceProfile;
use crate::transport::{Connection, ConnectionSettings};

/// `{hostname}_{yyyyMMdd_HHmmss}[_{suffix}].cfg`
fn backup_filename(hostname: &str, suffix: Option<&str>) -> String {
    let timestamp = Local::now().format("%Y%m%d_%H%M%S");
    match suffix {
        Some(suffix) => format!("{hostname}_{timestamp}_{suffix}.cfg"),
        None => format!("{hostname}_{timestamp}.cfg"),
    }
}

fn checksum(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    hasher
        .finalize()
        .iter()
        .map(|byte| format!("{byte:02x}"))
        .collect()
}

/// Fetches the running configuration, normalizes it and writes a
/// checksummed snapshot into `backup_dir`.
pub async fn backup_config(
    profile: &DeviceProfile,
    backup_dir: &Path,
    suffix: Option<&str>,
) -> Result<ConfigBackupResult, NetError> {
    let adapter = adapter_for(profile.vendor);
    let command = adapter.get_command(actions::SHOW_RUNNING, &ActionParams::new())?;

    let mut connection = Connection::open(profile, ConnectionSettings::ephemeral()).await?;
    let outcome = connection.execute_command(&command).await;
    connection.disconnect().await;

    if !outcome.success {
        return Err(NetError::Transport(format!(
            "fetching running configuration failed: {}",
            outcome.error.unwrap_or_default()
        )));
    }
    if outcome.output.trim().is_empty() {
        return Err(NetError::Transport(
            "device returned an empty running configuration".to_string(),
        ));
    }

    let normalized = normalize_config(&outcome.output);

    tokio::fs::create_dir_all(backup_dir).await?;
    let backup_path = backup_dir.join(backup_filename(&profile.name, suffix));
    tokio::fs::write(&backup_path, &normalized).await?;
    let file_size = tokio::fs::metadata(&backup_path).await?.len();

    info!(
        "backed up configuration of {} to {}",
        profile.name,
        backup_path.display()
    );
    Ok(ConfigBackupResult {
        device_id: profile.device_id.clone(),
        backup_path: backup_path.display().to_string(),
        config_content: normalized.clone(),
        backup_time: chrono::Utc::now(),
        file_size,
        checksum: checksum(&normalized),
    })
}

/// Deploys a candidate configuration, backing up the current one first.
///
/// Validation errors abort with [`NetError::ConfigValidation`]; warnings
/// are logged only. A dry run stops after validation and reports the
/// would-be command list without contacting the device again. Load or
/// commit failures never escape as errors: they produce a failed
/// [`ConfigDeployResult`] carrying the untouched command list.
pub async fn deploy_config(
    profile: &DeviceProfile,
    config_content: &str,
    backup_dir: &Path,
    dry_run: bool,
) -> Result<ConfigDeployResult, NetError> {
    let operation_id = Uuid::new_v4().to_string();

    let backup = backup_config(profile, backup_dir, Some("pre_deploy")).await?;
    info!(
        "pre-change backup for {}: {}",
        profile.name, backup.backup_path
    );

    let validation = validate_syntax(&profile.device_id, config_content, profile.platform());
    if !validation.is_valid {
        return Err(NetError::ConfigValidation(
            validation.syntax_errors.join("; "),
        ));
    }
    for warning in &validation.warnings {
        warn!("config validation warning for {}: {warning}", profile.name);
    }

    let commands: Vec<String> = config_content.lines().map(str::to_string).collect();

    if dry_run {
        return Ok(ConfigDeployResult {
            device_id: profile.device_id.clone(),
            operation_id,
            success: true,
            deployed_commands: commands,
            failed_commands: Vec::new(),
            error_details: HashMap::new(),
            deploy_time: chrono::Utc::now(),
            dry_run: true,
        });
    }

    let mut connection = match Connection::open(profile, ConnectionSettings::ephemeral()).await {
        Ok(connection) => connection,
        Err(err) => {
            return Ok(failed_deploy(
                profile,
                operation_id,
                commands,
                "connect",
                err.to_string(),
            ));
        }
    };
    let push = connection.send_configuration(&commands).await;
    connection.disconnect().await;

    if push.success {
        info!("deployed {} config lines to {}", commands.len(), profile.name);
        Ok(ConfigDeployResult {
            device_id: profile.device_id.clone(),
            operation_id,
            success: true,
            deployed_commands: commands,
            failed_commands: Vec::new(),
            error_details: HashMap::new(),
            deploy_time: chrono::Utc::now(),
            dry_run: false,
        })
    } else {
        Ok(failed_deploy(
            profile,
            operation_id,
            commands,
            "error",
            push.error.unwrap_or_else(|| "configuration push failed".to_string()),
        ))
    }
}

fn failed_deploy(
    profile: &DeviceProfile,
    operation_id: String,
    commands: Vec<String>,
    key: &str,
    error: String,
) -> ConfigDeployResult {
    let mut error_details = HashMap::new();
    error_details.insert(key.to_string(), error);
    ConfigDeployResult {
        device_id: profile.device_id.clone(),
        operation_id,
        success: false,
        deployed_commands: Vec::new(),
        failed_commands: commands,
        error_details,
        deploy_time: chrono::Utc::now(),
        dry_run: false,
    }
}

/// Backs up the current configuration and computes the line-set
/// difference against `target_config`.
pub async fn diff_config(
    profile: &DeviceProfile,
    target_config: &str,
    backup_dir: &Path,
) -> Result<ConfigDiff, NetError> {
    let backup = backup_config(profile, backup_dir, Some("diff")).await?;
    Ok(generate_diff(
        &profile.device_id,
        &backup.config_content,
        target_config,
    ))
}

/// Re-deploys a previous backup.
///
/// Fails with [`NetError::BackupNotFound`] before any connection attempt
/// when the path does not exist. The deploy it delegates to takes its own
/// pre-change backup.
pub async fn rollback_config(
    profile: &DeviceProfile,
    backup_path: &Path,
    backup_dir: &Path,
) -> Result<ConfigDeployResult, NetError> {
    if !tokio::fs::try_exists(backup_path).await.unwrap_or(false) {
        return Err(NetError::BackupNotFound(backup_path.display().to_string()));
    }

    let backup_content = tokio::fs::read_to_string(backup_path).await?;
    info!(
        "rolling back {} to {}",
        profile.name,
        backup_path.display()
    );
    deploy_config(profile, &backup_content, backup_dir, false).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::Vendor;
    use crate::inventory::test_record;

    fn profile() -> DeviceProfile {
        DeviceProfile::from_record(&test_record("sw1", Vendor::H3c), None)
    }

    #[test]
    fn backup_filenames_carry_hostname_timestamp_and_suffix() {
        let plain = backup_filename("core-sw1", None);
        assert!(plain.starts_with("core-sw1_"));
        assert!(plain.ends_with(".cfg"));

        let suffixed = backup_filename("core-sw1", Some("pre_deploy"));
        assert!(suffixed.ends_with("_pre_deploy.cfg"));
    }

    #[test]
    fn checksum_is_stable_hex_sha256() {
        let a = checksum("interface GE1/0/1");
        let b = checksum("interface GE1/0/1");
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[tokio::test]
    async fn rollback_against_missing_backup_fails_without_connecting() {
        let dir = tempfile::tempdir().expect("tempdir");
        let missing = dir.path().join("no-such-backup.cfg");
        let err = rollback_config(&profile(), &missing, dir.path())
            .await
            .expect_err("missing backup");
        assert!(matches!(err, NetError::BackupNotFound(_)));
    }
}
