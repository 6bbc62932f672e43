//! Named network tasks executed over ephemeral connections.
//!
//! A task is one named unit of work against one device: resolve the
//! vendor adapter, render the command, open a scoped ephemeral
//! [`Connection`], run the vendor post-connect sequence, execute, parse,
//! and produce a [`TaskResult`]. No error crosses this boundary: adapter
//! failures, connect failures, transport failures, unknown task names and
//! missing parameters all degrade to a failed result.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use log::debug;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::adapter::{ParsedOutput, Vendor, adapter_for};
use crate::inventory::DeviceProfile;
use crate::transport::{Connection, ConnectionSettings};

/// Ephemeral invocation context, created fresh per task run and never
/// shared.
#[derive(Debug, Clone)]
pub struct TaskContext {
    pub device_id: String,
    pub host: String,
    pub port: u16,
    pub vendor: Vendor,
    pub username: String,
    pub password: String,
    pub task_id: String,
    pub timestamp: DateTime<Utc>,
    pub extra_params: HashMap<String, String>,
}

impl TaskContext {
    pub fn new(profile: &DeviceProfile, extra_params: HashMap<String, String>) -> Self {
        Self {
            device_id: profile.device_id.clone(),
            host: profile.host.clone(),
            port: profile.port,
            vendor: profile.vendor,
            username: profile.username.clone(),
            password: profile.password.clone(),
            task_id: Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            extra_params,
        }
    }

    /// Connection profile for the ephemeral task connection.
    fn connection_profile(&self) -> DeviceProfile {
        let adapter = adapter_for(self.vendor);
        DeviceProfile {
            device_id: self.device_id.clone(),
            name: self.device_id.clone(),
            host: self.host.clone(),
            port: self.port,
            username: self.username.clone(),
            password: self.password.clone(),
            vendor: self.vendor,
            on_open: adapter
                .connection_extras()
                .iter()
                .map(|s| s.to_string())
                .collect(),
            description: None,
        }
    }
}

/// Immutable outcome of one task invocation.
///
/// A failed result always carries an error; a successful one always
/// carries raw output.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct TaskResult {
    pub success: bool,
    pub command: String,
    pub raw_output: Option<String>,
    pub parsed_data: Option<ParsedOutput>,
    pub execution_time: f64,
    pub error: Option<String>,
    pub task_id: String,
    pub device_id: String,
}

impl TaskResult {
    pub fn ok(
        ctx: &TaskContext,
        command: &str,
        raw_output: String,
        parsed_data: ParsedOutput,
        execution_time: f64,
    ) -> Self {
        Self {
            success: true,
            command: command.to_string(),
            raw_output: Some(raw_output),
            parsed_data: Some(parsed_data),
            execution_time: execution_time.max(0.0),
            error: None,
            task_id: ctx.task_id.clone(),
            device_id: ctx.device_id.clone(),
        }
    }

    pub fn failure(
        ctx: &TaskContext,
        command: &str,
        error: impl Into<String>,
        execution_time: f64,
    ) -> Self {
        Self {
            success: false,
            command: command.to_string(),
            raw_output: None,
            parsed_data: None,
            execution_time: execution_time.max(0.0),
            error: Some(error.into()),
            task_id: ctx.task_id.clone(),
            device_id: ctx.device_id.clone(),
        }
    }
}

/// Future returned by a task function.
pub type TaskFuture = BoxFuture<'static, TaskResult>;

/// A dispatchable task: owns its context, returns its result.
pub type TaskFn = Arc<dyn Fn(TaskContext) -> TaskFuture + Send + Sync>;

/// (task name, adapter action, required context params).
static TASK_DEFS: &[(&str, &str, &[&str])] = &[
    ("get_version", crate::adapter::actions::GET_VERSION, &[]),
    ("get_interfaces", crate::adapter::actions::GET_INTERFACES, &[]),
    (
        "get_interface_detail",
        crate::adapter::actions::GET_INTERFACE_DETAIL,
        &["interface"],
    ),
    (
        "find_mac",
        crate::adapter::actions::FIND_MAC,
        &["mac_address"],
    ),
    ("get_mac_table", crate::adapter::actions::GET_MAC_TABLE, &[]),
    ("get_arp_table", crate::adapter::actions::GET_ARP_TABLE, &[]),
    (
        "find_arp",
        crate::adapter::actions::FIND_ARP,
        &["ip_address"],
    ),
    ("get_vlan", crate::adapter::actions::GET_VLAN, &[]),
    ("ping", crate::adapter::actions::PING, &["target"]),
    (
        "traceroute",
        crate::adapter::actions::TRACEROUTE,
        &["target"],
    ),
];

/// Names of all registered tasks, in registry order.
pub fn available_tasks() -> Vec<&'static str> {
    TASK_DEFS.iter().map(|(name, ..)| *name).collect()
}

/// Wraps a registry task for batch dispatch. Unknown names degrade to a
/// failed result at invocation time.
pub fn named_task(task_name: &str) -> TaskFn {
    let task_name = task_name.to_string();
    Arc::new(move |ctx| {
        let task_name = task_name.clone();
        Box::pin(async move { execute_network_task(&task_name, ctx, HashMap::new()).await })
    })
}

/// Executes a registry task by name.
///
/// `kwargs` are merged over the context's extra params. An unknown name
/// or missing required parameters produce a failed [`TaskResult`]
/// describing what was required versus supplied.
pub async fn execute_network_task(
    task_name: &str,
    mut ctx: TaskContext,
    kwargs: HashMap<String, String>,
) -> TaskResult {
    ctx.extra_params.extend(kwargs);

    let Some((_, action, required)) = TASK_DEFS
        .iter()
        .copied()
        .find(|(name, ..)| *name == task_name)
    else {
        return TaskResult::failure(
            &ctx,
            &format!("unknown_task:{task_name}"),
            format!(
                "unknown task '{task_name}', available tasks: {}",
                available_tasks().join(", ")
            ),
            0.0,
        );
    };

    let missing: Vec<&str> = required
        .iter()
        .filter(|key| !ctx.extra_params.contains_key(**key))
        .copied()
        .collect();
    if !missing.is_empty() {
        let supplied: Vec<&str> = ctx.extra_params.keys().map(String::as_str).collect();
        return TaskResult::failure(
            &ctx,
            task_name,
            format!(
                "task '{task_name}' requires params [{}], supplied [{}]",
                required.join(", "),
                supplied.join(", ")
            ),
            0.0,
        );
    }

    run_action(&ctx, action).await
}

/// Runs one adapter action over a scoped ephemeral connection.
///
/// The connection is released on every exit path.
async fn run_action(ctx: &TaskContext, action: &str) -> TaskResult {
    let adapter = adapter_for(ctx.vendor);

    let command = match adapter.get_command(action, &ctx.extra_params) {
        Ok(command) => command,
        Err(err) => return TaskResult::failure(ctx, action, err.to_string(), 0.0),
    };

    let started = Instant::now();
    let mut connection =
        match Connection::open(&ctx.connection_profile(), ConnectionSettings::ephemeral()).await {
            Ok(connection) => connection,
            Err(err) => {
                return TaskResult::failure(
                    ctx,
                    &command,
                    err.to_string(),
                    started.elapsed().as_secs_f64(),
                );
            }
        };

    let outcome = connection.execute_command(&command).await;
    connection.disconnect().await;
    let elapsed = started.elapsed().as_secs_f64();

    if !outcome.success {
        return TaskResult::failure(
            ctx,
            &command,
            outcome.error.unwrap_or_else(|| "command failed".to_string()),
            elapsed,
        );
    }

    debug!(
        "task {} action {action} on {} finished in {elapsed:.2}s",
        ctx.task_id, ctx.device_id
    );
    let parsed = adapter.parse_output(action, &outcome.output);
    TaskResult::ok(ctx, &command, outcome.output, parsed, elapsed)
}
