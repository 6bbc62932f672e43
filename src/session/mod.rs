//! Long-lived CLI sessions with pooling, quotas and expiry.
//!
//! A [`Session`] binds one exclusively-owned [`Connection`] to one device
//! for reuse across commands. The [`SessionManager`] pools sessions by id,
//! enforces per-user quotas, refreshes activity only on access, and sweeps
//! expired sessions from a cancellable background task.
//!
//! # Main Components
//!
//! - [`SessionManager`] - session pool, quotas, sweep lifecycle
//! - [`Session`] - one session's state and connection
//! - [`SessionSnapshot`] / [`SessionStatistics`] - introspection surface

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use log::{debug, error, info, warn};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, RwLock, mpsc, watch};
use tokio::task::JoinHandle;

use crate::error::NetError;
use crate::inventory::DeviceProfile;
use crate::transport::{
    CommandChunk, CommandOutcome, ConfigPushOutcome, Connection, ConnectionSettings,
};

mod manager;

/// Session pool tuning.
#[derive(Debug, Clone, Copy)]
pub struct SessionSettings {
    /// Maximum concurrently open sessions per user.
    pub max_sessions_per_user: usize,
    /// Inactivity window after which a session expires.
    pub session_timeout: Duration,
    /// Interval between expiry sweeps.
    pub sweep_interval: Duration,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            max_sessions_per_user: 5,
            session_timeout: Duration::from_secs(30 * 60),
            sweep_interval: Duration::from_secs(60),
        }
    }
}

/// One long-lived session bound to a device.
pub struct Session {
    pub session_id: String,
    pub user_id: Option<String>,
    pub device_id: String,
    pub device_name: String,
    pub connection: Connection,
    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
    pub is_active: bool,
}

impl Session {
    fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            session_id: self.session_id.clone(),
            user_id: self.user_id.clone(),
            device_id: self.device_id.clone(),
            device_name: self.device_name.clone(),
            created_at: self.created_at,
            last_activity: self.last_activity,
            is_connected: self.connection.is_connected(),
        }
    }
}

/// Serializable view of one session.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SessionSnapshot {
    pub session_id: String,
    pub user_id: Option<String>,
    pub device_id: String,
    pub device_name: String,
    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
    pub is_connected: bool,
}

/// Aggregate pool statistics.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SessionStatistics {
    pub total_sessions: usize,
    pub users_count: usize,
    pub devices_count: usize,
    pub sessions_by_user: HashMap<String, usize>,
    pub sessions_by_device: HashMap<String, usize>,
}

/// Pool indices: id map plus user and device reverse indices. Mutated
/// only behind one lock so the indices never disagree.
#[derive(Default)]
struct SessionTable {
    sessions: HashMap<String, Arc<RwLock<Session>>>,
    by_user: HashMap<String, HashSet<String>>,
    by_device: HashMap<String, HashSet<String>>,
}

struct SweeperHandle {
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

/// Session pool manager. Create one per process and share it via `Arc`;
/// lifecycle is explicit through [`SessionManager::start`] and
/// [`SessionManager::stop`].
pub struct SessionManager {
    settings: SessionSettings,
    table: Arc<RwLock<SessionTable>>,
    sweeper: Mutex<Option<SweeperHandle>>,
}
