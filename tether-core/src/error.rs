//! Error types for the tether connection manager
//!
//! This module defines all error types used throughout the application,
//! providing consistent error handling and user-friendly error messages.

use crate::session::LegKind;
use thiserror::Error;

/// Main error type for the tether application
#[derive(Error, Debug)]
pub enum TetherError {
    /// Errors related to configuration loading/parsing
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Errors raised by the platform adapter when invoking OS tools
    #[error("Platform error: {0}")]
    Adapter(#[from] AdapterError),

    /// Errors surfaced by the connection orchestrator
    #[error("Connection error: {0}")]
    Session(#[from] SessionError),

    /// Errors installing the process shutdown handler
    #[error("Shutdown error: {0}")]
    Shutdown(#[from] ShutdownError),

    /// Generic I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-related errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file '{path}': {source}")]
    ReadFailed {
        path: String,
        source: std::io::Error,
    },

    #[error("failed to parse config file '{path}': {source}")]
    ParseFailed {
        path: String,
        source: toml::de::Error,
    },

    #[error("failed to write config file '{path}': {source}")]
    WriteFailed {
        path: String,
        source: std::io::Error,
    },

    #[error("no servers defined in configuration file")]
    NoServers,

    #[error("duplicate server name: {name}")]
    DuplicateName { name: String },

    #[error("server '{name}': {message}")]
    InvalidServer { name: String, message: String },

    #[error("server index {index} out of range (1-{count})")]
    IndexOutOfRange { index: usize, count: usize },

    #[error("server '{selector}' not found")]
    UnknownServer { selector: String },

    #[error("invalid connection type '{value}' (use 'rdp', 'ssh' or 'both')")]
    InvalidConnectionType { value: String },

    #[error("{kind} connections are not available for server '{name}'")]
    UnsupportedConnectionType { kind: String, name: String },
}

/// Platform adapter errors raised when invoking OS-level tools
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AdapterError {
    #[error("command not found: {command}")]
    CommandNotFound { command: String },

    #[error("failed to launch {command}: {message}")]
    LaunchFailed { command: String, message: String },

    #[error("VPN profile '{name}' is not configured on this system")]
    ProfileNotConfigured { name: String },

    #[error("no supported {client} client is installed")]
    ClientUnavailable { client: &'static str },
}

/// Connection orchestration errors surfaced through session state
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("VPN connection failed: {reason}")]
    VpnConnectFailed { reason: String },

    #[error("host {host} unreachable after {attempts} attempts")]
    HostUnreachable { host: String, attempts: u32 },

    #[error("{leg} client launch failed: {source}")]
    ClientLaunchFailed { leg: LegKind, source: AdapterError },

    #[error("invalid configuration: {0}")]
    ConfigInvalid(String),
}

/// Errors installing the process-wide shutdown handler
#[derive(Error, Debug)]
pub enum ShutdownError {
    #[error("shutdown handler already installed")]
    AlreadyInstalled,

    #[error("failed to install shutdown handler: {0}")]
    Handler(#[from] ctrlc::Error),
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, TetherError>;
