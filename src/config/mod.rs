//! Configuration management: backup, deploy, diff and rollback.
//!
//! Every change goes through a backup-before-write safety net. The
//! [`ConfigManager`] tracks each invocation as a [`ConfigOperation`]
//! moving through Pending → Running → Success | Failed in an in-memory
//! map.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

mod manager;
mod tasks;

pub use manager::{BackupFailure, BackupFileInfo, BatchBackupReport, ConfigManager};
pub use tasks::{backup_config, deploy_config, diff_config, rollback_config};

/// Lifecycle state of one configuration operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ConfigStatus {
    Pending,
    Running,
    Success,
    Failed,
}

/// Kind of configuration operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ConfigOperationType {
    Backup,
    Deploy,
    Diff,
    Rollback,
}

impl ConfigOperationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConfigOperationType::Backup => "backup",
            ConfigOperationType::Deploy => "deploy",
            ConfigOperationType::Diff => "diff",
            ConfigOperationType::Rollback => "rollback",
        }
    }
}

/// One tracked configuration operation.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ConfigOperation {
    pub operation_id: String,
    pub device_id: String,
    pub operation_type: ConfigOperationType,
    pub status: ConfigStatus,
    pub config_content: Option<String>,
    pub backup_path: Option<String>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub metadata: HashMap<String, Value>,
}

impl ConfigOperation {
    pub fn new(
        operation_id: String,
        device_id: String,
        operation_type: ConfigOperationType,
    ) -> Self {
        Self {
            operation_id,
            device_id,
            operation_type,
            status: ConfigStatus::Pending,
            config_content: None,
            backup_path: None,
            error_message: None,
            created_at: Utc::now(),
            completed_at: None,
            metadata: HashMap::new(),
        }
    }
}

/// Line-level difference between two configurations.
///
/// Additions and deletions are computed as a set difference: line order
/// and duplicates do not participate.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ConfigDiff {
    pub device_id: String,
    pub current_config: String,
    pub target_config: String,
    pub diff_lines: Vec<String>,
    pub additions: Vec<String>,
    pub deletions: Vec<String>,
}

/// Result of one device backup.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ConfigBackupResult {
    pub device_id: String,
    pub backup_path: String,
    pub config_content: String,
    pub backup_time: DateTime<Utc>,
    pub file_size: u64,
    pub checksum: String,
}

/// Result of a deploy or rollback.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ConfigDeployResult {
    pub device_id: String,
    pub operation_id: String,
    pub success: bool,
    pub deployed_commands: Vec<String>,
    pub failed_commands: Vec<String>,
    pub error_details: HashMap<String, String>,
    pub deploy_time: DateTime<Utc>,
    pub dry_run: bool,
}

/// Result of candidate-config syntax validation.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ConfigValidationResult {
    pub device_id: String,
    pub is_valid: bool,
    pub syntax_errors: Vec<String>,
    pub warnings: Vec<String>,
    pub validation_time: DateTime<Utc>,
}

/// Strips trailing whitespace and drops blank and comment lines.
pub fn normalize_config(config_content: &str) -> String {
    config_content
        .lines()
        .map(str::trim_end)
        .filter(|line| !line.is_empty())
        .filter(|line| {
            let trimmed = line.trim_start();
            !trimmed.starts_with('#') && !trimmed.starts_with('!')
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Computes the set difference of lines between two configurations.
pub fn generate_diff(device_id: &str, current: &str, target: &str) -> ConfigDiff {
    let current_set: std::collections::HashSet<&str> = current.lines().collect();
    let target_set: std::collections::HashSet<&str> = target.lines().collect();

    let mut additions: Vec<String> = target_set
        .difference(&current_set)
        .map(|s| s.to_string())
        .collect();
    let mut deletions: Vec<String> = current_set
        .difference(&target_set)
        .map(|s| s.to_string())
        .collect();
    additions.sort();
    deletions.sort();

    let mut diff_lines = Vec::with_capacity(additions.len() + deletions.len());
    for line in &deletions {
        diff_lines.push(format!("- {line}"));
    }
    for line in &additions {
        diff_lines.push(format!("+ {line}"));
    }

    ConfigDiff {
        device_id: device_id.to_string(),
        current_config: current.to_string(),
        target_config: target.to_string(),
        diff_lines,
        additions,
        deletions,
    }
}

/// Validates minimal per-platform syntax rules.
///
/// Warnings never abort a deploy; only syntax errors do.
pub fn validate_syntax(device_id: &str, config_content: &str, platform: &str) -> ConfigValidationResult {
    let mut syntax_errors = Vec::new();
    let mut warnings = Vec::new();

    for (number, raw_line) in config_content.lines().enumerate() {
        let line = raw_line.trim_start();
        let number = number + 1;
        if line.is_empty() || line.starts_with('#') || line.starts_with('!') {
            continue;
        }

        if raw_line.ends_with(' ') {
            warnings.push(format!("Line {number}: trailing whitespace"));
        }

        if matches!(platform, "hp_comware" | "huawei_vrp")
            && line.trim_end() == "interface"
        {
            syntax_errors.push(format!("Line {number}: interface name missing"));
        }
    }

    ConfigValidationResult {
        device_id: device_id.to_string(),
        is_valid: syntax_errors.is_empty(),
        syntax_errors,
        warnings,
        validation_time: Utc::now(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_strips_blank_and_comment_lines() {
        let raw = "interface GE1/0/1   \n\n# comment\n! banner\n ip address 10.0.0.1\n";
        let normalized = normalize_config(raw);
        assert_eq!(normalized, "interface GE1/0/1\n ip address 10.0.0.1");
    }

    #[test]
    fn diff_of_identical_content_is_empty() {
        let config = "vlan 10\nvlan 20\n";
        let diff = generate_diff("dev-001", config, config);
        assert!(diff.additions.is_empty());
        assert!(diff.deletions.is_empty());
        assert!(diff.diff_lines.is_empty());
    }

    #[test]
    fn diff_partitions_into_additions_and_deletions() {
        let diff = generate_diff("dev-001", "x\ny", "y\nz");
        assert_eq!(diff.additions, vec!["z".to_string()]);
        assert_eq!(diff.deletions, vec!["x".to_string()]);
        assert_eq!(diff.diff_lines, vec!["- x".to_string(), "+ z".to_string()]);
    }

    #[test]
    fn diff_ignores_order_and_duplicates() {
        let diff = generate_diff("dev-001", "a\nb\na", "b\na");
        assert!(diff.additions.is_empty());
        assert!(diff.deletions.is_empty());
    }

    #[test]
    fn bare_interface_line_is_a_syntax_error_on_comware() {
        let result = validate_syntax("dev-001", "interface\n vlan 10", "hp_comware");
        assert!(!result.is_valid);
        assert_eq!(result.syntax_errors.len(), 1);
        assert!(result.syntax_errors[0].contains("Line 1"));
    }

    #[test]
    fn trailing_whitespace_is_a_warning_not_an_error() {
        let result = validate_syntax("dev-001", "vlan 10 \n", "cisco_iosxe");
        assert!(result.is_valid);
        assert_eq!(result.warnings.len(), 1);
    }

    #[test]
    fn comment_lines_are_not_validated() {
        let result = validate_syntax("dev-001", "# interface\n! interface", "hp_comware");
        assert!(result.is_valid);
        assert!(result.warnings.is_empty());
    }
}
