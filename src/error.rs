//! Error types for the adaptive quality controller.
//!
//! The control loop itself never fails: every computation has a safe
//! fallback. Errors only surface from configuration handling, name parsing
//! and the host plumbing around the controller.

use thiserror::Error;

/// Errors related to configuration management.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration file not found at '{0}'")]
    FileNotFound(String),

    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),

    #[error("Failed to write configuration: {0}")]
    WriteError(#[from] std::io::Error),

    #[error(transparent)]
    Quality(#[from] QualityError),
}

/// Errors related to parsing quality names coming from outside the crate.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QualityError {
    #[error("Unknown quality level '{0}', expected one of: potato, low, medium, high, ultra")]
    UnknownLevel(String),

    #[error("Unknown quality tier '{0}', expected one of: low, medium, high")]
    UnknownTier(String),

    #[error("Unknown device class '{0}', expected one of: phone, tablet, desktop")]
    UnknownDeviceClass(String),
}

/// Errors related to the host's control socket.
#[derive(Error, Debug)]
pub enum IpcError {
    #[error("Failed to bind socket at '{path}': {source}")]
    SocketBindFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Render loop is no longer accepting commands")]
    LoopClosed,

    #[error("Invalid command received: {0}")]
    InvalidCommand(String),

    #[error("Failed to serialize response: {0}")]
    SerializationFailed(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Top-level errors of the reference host.
#[derive(Error, Debug)]
pub enum HostError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("IPC error: {0}")]
    Ipc(#[from] IpcError),

    #[error("Logging setup failed: {0}")]
    Logging(String),

    #[error("Runtime error: {0}")]
    Runtime(String),
}
