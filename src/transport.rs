//! CLI transport: one SSH connection per device.
//!
//! A [`Connection`] owns exactly one transport to one device. Command
//! execution never propagates transport errors past this boundary; every
//! failure is converted into a structured outcome. Connect, transport
//! inactivity and per-command operations each have an independent timeout
//! ([`ConnectTimeouts`]): long-lived session connections use 30s for each
//! phase, ephemeral task connections 15/20/30s.

use std::time::{Duration, Instant};

use async_ssh2_tokio::client::{AuthMethod, Client};
use async_ssh2_tokio::{Config, ServerCheckMethod};
use chrono::{DateTime, Utc};
use log::{debug, info};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::time::timeout;

use crate::error::NetError;
use crate::inventory::DeviceProfile;
use crate::ssh;

/// Independent timeouts for the connect, transport and operation phases.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectTimeouts {
    /// TCP/SSH establishment deadline.
    pub socket: Duration,
    /// Transport inactivity deadline.
    pub transport: Duration,
    /// Per-command execution deadline.
    pub ops: Duration,
}

impl ConnectTimeouts {
    /// Timeouts for pooled session connections.
    pub fn persistent() -> Self {
        Self {
            socket: Duration::from_secs(30),
            transport: Duration::from_secs(30),
            ops: Duration::from_secs(30),
        }
    }

    /// Timeouts for single-task ephemeral connections.
    pub fn ephemeral() -> Self {
        Self {
            socket: Duration::from_secs(15),
            transport: Duration::from_secs(20),
            ops: Duration::from_secs(30),
        }
    }
}

/// Connection tuning: phase timeouts plus the pacing delay between
/// interactive output chunks.
#[derive(Debug, Clone, Copy)]
pub struct ConnectionSettings {
    pub timeouts: ConnectTimeouts,
    pub chunk_delay: Duration,
}

impl ConnectionSettings {
    pub fn persistent() -> Self {
        Self {
            timeouts: ConnectTimeouts::persistent(),
            chunk_delay: Duration::from_millis(100),
        }
    }

    pub fn ephemeral() -> Self {
        Self {
            timeouts: ConnectTimeouts::ephemeral(),
            chunk_delay: Duration::from_millis(100),
        }
    }

    pub fn with_chunk_delay(mut self, delay: Duration) -> Self {
        self.chunk_delay = delay;
        self
    }
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self::persistent()
    }
}

/// Result of one command execution.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CommandOutcome {
    pub success: bool,
    pub command: String,
    pub output: String,
    pub error: Option<String>,
    pub elapsed_secs: f64,
    pub timestamp: DateTime<Utc>,
}

impl CommandOutcome {
    pub fn ok(command: &str, output: String, elapsed: Duration) -> Self {
        Self {
            success: true,
            command: command.to_string(),
            output,
            error: None,
            elapsed_secs: elapsed.as_secs_f64(),
            timestamp: Utc::now(),
        }
    }

    pub fn failure(command: &str, error: impl Into<String>) -> Self {
        Self {
            success: false,
            command: command.to_string(),
            output: String::new(),
            error: Some(error.into()),
            elapsed_secs: 0.0,
            timestamp: Utc::now(),
        }
    }
}

/// Kind of a streamed output chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ChunkKind {
    Stdout,
    Error,
}

/// One line-tagged chunk of interactive command output.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CommandChunk {
    pub success: bool,
    pub command: String,
    pub output: String,
    pub kind: ChunkKind,
    pub line_number: usize,
    pub is_final: bool,
    pub timestamp: DateTime<Utc>,
}

impl CommandChunk {
    pub(crate) fn error(command: &str, error: String) -> Self {
        Self {
            success: false,
            command: command.to_string(),
            output: error,
            kind: ChunkKind::Error,
            line_number: 0,
            is_final: true,
            timestamp: Utc::now(),
        }
    }
}

/// Result of pushing a configuration batch.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ConfigPushOutcome {
    pub success: bool,
    pub config_lines: Vec<String>,
    pub output: Option<String>,
    pub error: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// One CLI transport to one device.
pub struct Connection {
    device_id: String,
    name: String,
    host: String,
    port: u16,
    platform: &'static str,
    settings: ConnectionSettings,
    client: Option<Client>,
    connected: bool,
    last_activity: DateTime<Utc>,
}

impl Connection {
    /// Opens a connection and runs the vendor post-connect sequence.
    /// Strict host key checking is disabled.
    pub async fn open(
        profile: &DeviceProfile,
        settings: ConnectionSettings,
    ) -> Result<Self, NetError> {
        let config = Config {
            preferred: ssh::compat_preferred(),
            inactivity_timeout: Some(settings.timeouts.transport),
            ..Default::default()
        };

        let connect = Client::connect_with_config(
            (profile.host.clone(), profile.port),
            &profile.username,
            AuthMethod::with_password(&profile.password),
            ServerCheckMethod::NoCheck,
            config,
        );
        let client = match timeout(settings.timeouts.socket, connect).await {
            Ok(Ok(client)) => client,
            Ok(Err(err)) => {
                return Err(NetError::ConnectFailed(format!(
                    "{}:{}: {err}",
                    profile.host, profile.port
                )));
            }
            Err(_) => {
                return Err(NetError::ConnectTimeout(settings.timeouts.socket.as_secs()));
            }
        };

        let mut connection = Self {
            device_id: profile.device_id.clone(),
            name: profile.name.clone(),
            host: profile.host.clone(),
            port: profile.port,
            platform: profile.platform(),
            settings,
            client: Some(client),
            connected: true,
            last_activity: Utc::now(),
        };

        for command in &profile.on_open {
            let outcome = connection.execute_command(command).await;
            if !outcome.success {
                connection.disconnect().await;
                return Err(NetError::ConnectFailed(format!(
                    "post-connect command '{command}' failed: {}",
                    outcome.error.unwrap_or_default()
                )));
            }
        }

        info!(
            "connected to {} ({}:{})",
            connection.name, connection.host, connection.port
        );
        Ok(connection)
    }

    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// Last command/connect activity, used by session expiry.
    pub fn last_activity(&self) -> DateTime<Utc> {
        self.last_activity
    }

    /// True when activity happened within `window`.
    pub fn is_active(&self, window: Duration) -> bool {
        if !self.connected {
            return false;
        }
        let cutoff = Utc::now()
            - chrono::Duration::from_std(window).unwrap_or_else(|_| chrono::Duration::seconds(0));
        self.last_activity > cutoff
    }

    /// Executes one command. Transport failures and timeouts are converted
    /// into a failed outcome; this method never returns an error.
    pub async fn execute_command(&mut self, command: &str) -> CommandOutcome {
        let Some(client) = self.client.as_ref() else {
            return CommandOutcome::failure(command, "device not connected");
        };
        if !self.connected {
            return CommandOutcome::failure(command, "device not connected");
        }

        self.last_activity = Utc::now();
        let started = Instant::now();
        match timeout(self.settings.timeouts.ops, client.execute(command)).await {
            Ok(Ok(result)) => {
                let output = if result.stdout.is_empty() && !result.stderr.is_empty() {
                    result.stderr
                } else {
                    result.stdout
                };
                CommandOutcome::ok(command, output, started.elapsed())
            }
            Ok(Err(err)) => {
                debug!("command '{command}' failed on {}: {err}", self.host);
                CommandOutcome::failure(command, err.to_string())
            }
            Err(_) => CommandOutcome::failure(
                command,
                format!(
                    "command timed out after {}s",
                    self.settings.timeouts.ops.as_secs()
                ),
            ),
        }
    }

    /// Executes a command and streams its output as a finite sequence of
    /// line-tagged chunks, paced by the configured chunk delay. The
    /// returned receiver is exhausted once the final chunk is delivered
    /// and cannot be restarted.
    pub async fn execute_interactive_command(
        &mut self,
        command: &str,
    ) -> mpsc::Receiver<CommandChunk> {
        let (tx, rx) = mpsc::channel(32);
        let outcome = self.execute_command(command).await;
        let delay = self.settings.chunk_delay;
        let command = command.to_string();

        tokio::spawn(async move {
            if !outcome.success {
                let error = outcome
                    .error
                    .unwrap_or_else(|| "command failed".to_string());
                let _ = tx.send(CommandChunk::error(&command, error)).await;
                return;
            }

            let lines: Vec<String> = outcome.output.split('\n').map(str::to_string).collect();
            let total = lines.len();
            for (index, line) in lines.into_iter().enumerate() {
                let chunk = CommandChunk {
                    success: true,
                    command: command.clone(),
                    output: line,
                    kind: ChunkKind::Stdout,
                    line_number: index + 1,
                    is_final: index + 1 == total,
                    timestamp: Utc::now(),
                };
                if tx.send(chunk).await.is_err() {
                    break;
                }
                if index + 1 < total {
                    tokio::time::sleep(delay).await;
                }
            }
        });

        rx
    }

    /// Applies a configuration batch as one logical unit.
    pub async fn send_configuration(&mut self, config_lines: &[String]) -> ConfigPushOutcome {
        if !self.connected || self.client.is_none() {
            return ConfigPushOutcome {
                success: false,
                config_lines: config_lines.to_vec(),
                output: None,
                error: Some("device not connected".to_string()),
                timestamp: Utc::now(),
            };
        }

        let script = config_lines.join("\n");
        let outcome = self.execute_command(&script).await;
        ConfigPushOutcome {
            success: outcome.success,
            config_lines: config_lines.to_vec(),
            output: outcome.success.then_some(outcome.output),
            error: outcome.error,
            timestamp: Utc::now(),
        }
    }

    /// Closes the transport. Safe to call repeatedly.
    pub async fn disconnect(&mut self) {
        if let Some(client) = self.client.take() {
            if self.connected {
                if let Err(err) = client.disconnect().await {
                    debug!("error closing connection to {}: {err}", self.host);
                }
                info!("disconnected from {} ({})", self.name, self.host);
            }
        }
        self.connected = false;
    }

    /// Probes the device with the platform clock command.
    pub async fn keep_alive(&mut self) -> bool {
        let probe = match self.platform {
            "cisco_iosxe" => "show clock",
            _ => "display clock",
        };
        self.execute_command(probe).await.success
    }

    /// Detached connection for exercising session bookkeeping without a
    /// transport. Commands fail with "device not connected".
    #[cfg(test)]
    pub(crate) fn stub(device_id: &str, name: &str) -> Self {
        Self {
            device_id: device_id.to_string(),
            name: name.to_string(),
            host: "192.0.2.1".to_string(),
            port: 22,
            platform: "hp_comware",
            settings: ConnectionSettings::persistent(),
            client: None,
            connected: true,
            last_activity: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn persistent_and_ephemeral_timeouts_differ_in_connect_phases() {
        let persistent = ConnectTimeouts::persistent();
        assert_eq!(persistent.socket, Duration::from_secs(30));
        assert_eq!(persistent.transport, Duration::from_secs(30));
        assert_eq!(persistent.ops, Duration::from_secs(30));

        let ephemeral = ConnectTimeouts::ephemeral();
        assert_eq!(ephemeral.socket, Duration::from_secs(15));
        assert_eq!(ephemeral.transport, Duration::from_secs(20));
        assert_eq!(ephemeral.ops, Duration::from_secs(30));
    }

    #[test]
    fn chunk_delay_is_configurable() {
        let settings =
            ConnectionSettings::ephemeral().with_chunk_delay(Duration::from_millis(5));
        assert_eq!(settings.chunk_delay, Duration::from_millis(5));
    }

    #[tokio::test]
    async fn execute_on_detached_connection_fails_structurally() {
        let mut connection = Connection::stub("dev-001", "sw1");
        let outcome = connection.execute_command("display clock").await;
        assert!(!outcome.success);
        assert_eq!(outcome.error.as_deref(), Some("device not connected"));
        assert_eq!(outcome.command, "display clock");
    }

    #[tokio::test]
    async fn interactive_stream_reports_failure_as_single_error_chunk() {
        let mut connection = Connection::stub("dev-001", "sw1");
        let mut rx = connection
            .execute_interactive_command("display version")
            .await;
        let chunk = rx.recv().await.expect("error chunk");
        assert!(!chunk.success);
        assert_eq!(chunk.kind, ChunkKind::Error);
        assert!(chunk.is_final);
        assert!(rx.recv().await.is_none(), "stream must be finite");
    }

    #[tokio::test]
    async fn disconnect_is_idempotent() {
        let mut connection = Connection::stub("dev-001", "sw1");
        connection.disconnect().await;
        assert!(!connection.is_connected());
        connection.disconnect().await;
        assert!(!connection.is_connected());
    }

    #[tokio::test]
    async fn keep_alive_fails_on_detached_connection() {
        let mut connection = Connection::stub("dev-001", "sw1");
        connection.disconnect().await;
        assert!(!connection.keep_alive().await);
    }

    #[test]
    fn activity_window_classifies_recent_connections_as_active() {
        let connection = Connection::stub("dev-001", "sw1");
        assert!(connection.is_active(Duration::from_secs(60)));
    }
}
