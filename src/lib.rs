//! # netpilot - Multi-vendor Network Device Automation Core
//!
//! `netpilot` automates command execution and configuration change across
//! heterogeneous network devices (switches, routers, firewalls) from
//! multiple vendors over a CLI transport. It normalizes vendor dialects
//! into one action set, manages pooled sessions with quotas and expiry,
//! dispatches tasks concurrently across device fleets with per-host
//! failure isolation, and drives configuration changes through a
//! backup-before-write pipeline with diffing and rollback.
//!
//! ## Features
//!
//! - **Vendor Adapters**: Cisco IOS-XE, Huawei VRP and H3C Comware command
//!   generation and two-stage output parsing (row templates + fallback)
//! - **Session Pooling**: long-lived connections keyed by session id, with
//!   per-user quotas and timer-swept expiry
//! - **Batch Dispatch**: one concurrent unit of work per device, failures
//!   isolated per host
//! - **Config Pipeline**: backup, deploy (with dry-run), diff and rollback,
//!   every change preceded by a checksummed backup
//! - **Maximum Compatibility**: broad SSH algorithm support for legacy
//!   devices
//! - **Async/Await**: built on Tokio for cooperative, single-process
//!   scheduling
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::collections::HashMap;
//! use std::sync::Arc;
//!
//! use netpilot::adapter::Vendor;
//! use netpilot::inventory::{DeviceRecord, MemoryDeviceStore};
//! use netpilot::runner::TaskRunner;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), netpilot::NetError> {
//!     let store = Arc::new(MemoryDeviceStore::new());
//!     store
//!         .insert(DeviceRecord {
//!             id: "sw-01".to_string(),
//!             name: "core-sw-01".to_string(),
//!             hostname: None,
//!             management_ip: "192.168.1.1".to_string(),
//!             port: 22,
//!             username: "admin".to_string(),
//!             password: "secret".to_string(),
//!             vendor: Vendor::H3c,
//!             model: None,
//!             area: None,
//!             group: None,
//!             is_active: true,
//!             description: None,
//!         })
//!         .await;
//!
//!     let runner = TaskRunner::new(store);
//!     let outcome = runner
//!         .run_named(
//!             "get_version",
//!             &["sw-01".to_string()],
//!             None,
//!             HashMap::new(),
//!         )
//!         .await?;
//!
//!     for (host, result) in &outcome.success {
//!         println!("{host}: {:?}", result.parsed_data);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Main Components
//!
//! - [`adapter`] - vendor command/output translation
//! - [`transport::Connection`] - one CLI transport per device
//! - [`session::SessionManager`] - session pool, quotas and expiry
//! - [`runner::TaskRunner`] - concurrent batch dispatch
//! - [`tasks`] - named task registry
//! - [`config::ConfigManager`] - backup/deploy/diff/rollback pipeline
//! - [`error::NetError`] - error taxonomy

pub mod adapter;
pub mod config;
pub mod error;
pub mod inventory;
pub mod runner;
pub mod session;
pub mod ssh;
pub mod tasks;
pub mod transport;

pub use error::NetError;
