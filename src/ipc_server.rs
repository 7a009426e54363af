//! Control socket for the reference host.
//!
//! Clients send newline-delimited JSON commands over a Unix domain socket.
//! The controller lives on the render loop, so the server never touches it:
//! every command is forwarded over an mpsc channel and the render loop
//! answers through a oneshot.

use crate::config_store::ConfigManager;
use adaptive_quality::{
    AdjustmentReport, ControllerConfig, GameSettings, GpuCapabilities, PartialConfig,
    PerformanceMetrics, QualityController, QualityLevel, RenderEngine,
};
use adaptive_quality::error::IpcError;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::sync::{mpsc, oneshot};
use tracing::{info, warn};

#[cfg(unix)]
use std::path::{Path, PathBuf};
#[cfg(unix)]
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
#[cfg(unix)]
use tokio::net::{UnixListener, UnixStream};

pub const DEFAULT_SOCKET_PATH: &str = "/tmp/adaptive-quality.sock";

/// Pending commands the render loop may hold before senders wait.
pub const COMMAND_QUEUE_DEPTH: usize = 32;

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(tag = "command")]
pub enum IpcCommand {
    GetMetrics,
    SetQuality { level: String },
    Unlock,
    Configure { config: PartialConfig },
    SyncSettings { settings: GameSettings },
}

/// Reply to `GetMetrics`.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct StatusResponse {
    pub metrics: PerformanceMetrics,
    pub adjustments: AdjustmentReport,
    pub capabilities: GpuCapabilities,
    pub config: ControllerConfig,
}

/// A command on its way to the render loop.
pub struct ControlRequest {
    pub command: IpcCommand,
    pub reply: oneshot::Sender<serde_json::Value>,
}

/// Cloneable sending side used by connection tasks.
#[derive(Clone)]
pub struct ControlHandle {
    tx: mpsc::Sender<ControlRequest>,
}

impl ControlHandle {
    pub fn channel() -> (Self, mpsc::Receiver<ControlRequest>) {
        let (tx, rx) = mpsc::channel(COMMAND_QUEUE_DEPTH);
        (Self { tx }, rx)
    }

    /// Forward `command` and wait for the render loop's answer.
    pub async fn request(&self, command: IpcCommand) -> Result<serde_json::Value, IpcError> {
        let (reply, response) = oneshot::channel();
        self.tx
            .send(ControlRequest { command, reply })
            .await
            .map_err(|_| IpcError::LoopClosed)?;
        response.await.map_err(|_| IpcError::LoopClosed)
    }
}

fn failure(message: impl std::fmt::Display) -> serde_json::Value {
    json!({ "success": false, "error": message.to_string() })
}

/// Execute one command against the controller. Runs on the render loop.
///
/// Successful configuration changes are persisted through `config_manager`.
/// Caps from a settings sync stay in memory only.
pub fn handle_command<E: RenderEngine>(
    controller: &mut QualityController<E>,
    config_manager: Option<&ConfigManager>,
    command: IpcCommand,
) -> serde_json::Value {
    match command {
        IpcCommand::GetMetrics => {
            let status = StatusResponse {
                metrics: controller.metrics(),
                adjustments: controller.adjustments(),
                capabilities: *controller.capabilities(),
                config: controller.config().clone(),
            };
            serde_json::to_value(status)
                .unwrap_or_else(|e| json!({ "error": format!("Failed to serialize status: {}", e) }))
        }

        IpcCommand::SetQuality { level } => match level.parse::<QualityLevel>() {
            Ok(level) => {
                controller.set_quality(level, true);
                info!(level = %level, "Quality set via IPC");
                json!({ "success": true, "level": level })
            }
            Err(e) => failure(e),
        },

        IpcCommand::Unlock => {
            controller.unlock_quality();
            json!({ "success": true, "message": "Quality unlocked" })
        }

        IpcCommand::Configure { config } => match controller.configure(config) {
            Ok(()) => persist(controller, config_manager),
            Err(e) => {
                warn!("Rejected configuration via IPC: {}", e);
                failure(e)
            }
        },

        IpcCommand::SyncSettings { settings } => match controller.sync_with_game_settings(&settings) {
            Ok(()) => persist(controller, config_manager),
            Err(e) => {
                warn!("Rejected game settings via IPC: {}", e);
                failure(e)
            }
        },
    }
}

fn persist<E: RenderEngine>(
    controller: &QualityController<E>,
    config_manager: Option<&ConfigManager>,
) -> serde_json::Value {
    let Some(manager) = config_manager else {
        return json!({ "success": true, "message": "Configuration updated" });
    };
    match manager.update(controller.base_config().clone()) {
        Ok(()) => json!({ "success": true, "message": "Configuration updated" }),
        Err(e) => {
            warn!("Configuration applied but not saved: {}", e);
            json!({ "success": true, "message": "Configuration updated", "warning": e.to_string() })
        }
    }
}

/// Unix domain socket server.
#[cfg(unix)]
pub struct IpcServer {
    socket_path: PathBuf,
    listener: UnixListener,
}

#[cfg(unix)]
impl IpcServer {
    /// Bind at `path`, replacing a stale socket file.
    pub async fn new(path: &str) -> Result<Self, IpcError> {
        let socket_path = PathBuf::from(path);
        Self::cleanup_socket(&socket_path)?;

        let listener = UnixListener::bind(&socket_path).map_err(|e| IpcError::SocketBindFailed {
            path: path.to_string(),
            source: e,
        })?;

        Ok(Self {
            socket_path,
            listener,
        })
    }

    pub async fn new_default() -> Result<Self, IpcError> {
        Self::new(DEFAULT_SOCKET_PATH).await
    }

    fn cleanup_socket(path: &Path) -> Result<(), IpcError> {
        if path.exists() {
            std::fs::remove_file(path).map_err(|e| IpcError::SocketBindFailed {
                path: path.display().to_string(),
                source: e,
            })?;
        }
        Ok(())
    }

    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    /// Accept connections forever, one task per client.
    pub async fn run(&self, handle: ControlHandle) -> Result<(), IpcError> {
        loop {
            match self.listener.accept().await {
                Ok((stream, _addr)) => {
                    let handle = handle.clone();
                    tokio::spawn(async move {
                        if let Err(e) = Self::handle_connection(stream, handle).await {
                            warn!("Error handling IPC connection: {}", e);
                        }
                    });
                }
                Err(e) => {
                    tracing::error!("Error accepting IPC connection: {}", e);
                }
            }
        }
    }

    async fn handle_connection(stream: UnixStream, handle: ControlHandle) -> Result<(), IpcError> {
        let (reader, mut writer) = stream.into_split();
        let mut reader = BufReader::new(reader);
        let mut line = String::new();

        while reader.read_line(&mut line).await? > 0 {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                line.clear();
                continue;
            }

            let response = match serde_json::from_str::<IpcCommand>(trimmed) {
                Ok(command) => handle.request(command).await?,
                Err(e) => json!({ "error": format!("Invalid command: {}", e) }),
            };

            let response_str = serde_json::to_string(&response)?;
            writer.write_all(response_str.as_bytes()).await?;
            writer.write_all(b"\n").await?;
            writer.flush().await?;

            line.clear();
        }

        Ok(())
    }
}

#[cfg(unix)]
impl Drop for IpcServer {
    fn drop(&mut self) {
        if self.socket_path.exists() {
            let _ = std::fs::remove_file(&self.socket_path);
        }
    }
}
