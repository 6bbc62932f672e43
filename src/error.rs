//! Error types for device automation, transport and configuration management.
//!
//! The crate uses a single error enum. Transport failures inside
//! `execute_*` calls are converted to structured outcomes at the
//! [`crate::transport::Connection`] boundary and never surface as errors;
//! the variants here cover everything that can still fail before or around
//! command execution.

use thiserror::Error;

/// Errors that can occur across adapters, inventory resolution, sessions
/// and the configuration pipeline.
#[derive(Error, Debug)]
pub enum NetError {
    /// The requested action is not in the vendor's supported set.
    #[error("{vendor} adapter does not support action: {action}")]
    UnsupportedAction { vendor: String, action: String },

    /// Command generation failed (missing parameter, malformed MAC, bad
    /// template placeholder).
    #[error("command build failed: {0}")]
    Command(String),

    /// Structured output parsing failed in a way that cannot be expressed
    /// as a best-effort fallback result.
    #[error("output parse failed: {0}")]
    Parse(String),

    /// The TCP/SSH connection could not be established.
    #[error("connect failed: {0}")]
    ConnectFailed(String),

    /// The connection attempt exceeded the socket-phase timeout.
    #[error("connect timed out after {0}s")]
    ConnectTimeout(u64),

    /// A transport-level failure surfaced through the config pipeline.
    #[error("transport failure: {0}")]
    Transport(String),

    /// Batch dispatch was asked to run against an empty device id list.
    #[error("device id list must not be empty")]
    EmptyDeviceList,

    /// The persistence collaborator failed while resolving devices.
    #[error("persistence failure: {0}")]
    Persistence(String),

    /// The device id does not resolve to a known device.
    #[error("device not found: {0}")]
    DeviceNotFound(String),

    /// Candidate configuration failed platform syntax validation.
    #[error("configuration validation failed: {0}")]
    ConfigValidation(String),

    /// The referenced backup file does not exist.
    #[error("backup file not found: {0}")]
    BackupNotFound(String),

    /// The session id is unknown, closed or expired.
    #[error("session not found or expired: {0}")]
    SessionNotFound(String),

    /// An error occurred in the async-ssh2-tokio library.
    #[error("ssh error: {0}")]
    Ssh(#[from] async_ssh2_tokio::Error),

    /// An error occurred in the russh library.
    #[error("russh error: {0}")]
    Russh(#[from] russh::Error),

    /// Filesystem failure (backup directory, backup files).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Invariant violation that callers cannot act on.
    #[error("internal error: {0}")]
    Internal(String),
}
