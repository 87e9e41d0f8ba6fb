//! Session state model
//!
//! Shared data types for the connection state machine: connection types,
//! per-leg status, session states and the snapshots shipped to the UI.

pub mod orchestrator;

use crate::config::ServerDefinition;
use crate::error::{ConfigError, SessionError};
use std::time::{Duration, Instant};

/// Connection type options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionType {
    Rdp,
    Ssh,
    Both,
}

impl ConnectionType {
    /// Get the display name of the connection type.
    pub fn name(&self) -> &'static str {
        match self {
            ConnectionType::Rdp => "RDP",
            ConnectionType::Ssh => "SSH",
            ConnectionType::Both => "Both",
        }
    }

    /// Get all connection types.
    pub fn all() -> &'static [ConnectionType] {
        &[
            ConnectionType::Rdp,
            ConnectionType::Ssh,
            ConnectionType::Both,
        ]
    }

    /// Connection types a server can actually serve.
    pub fn available_for(server: &ServerDefinition) -> Vec<ConnectionType> {
        Self::all()
            .iter()
            .copied()
            .filter(|kind| server.supports(*kind))
            .collect()
    }
}

impl std::str::FromStr for ConnectionType {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_lowercase().as_str() {
            "rdp" => Ok(ConnectionType::Rdp),
            "ssh" => Ok(ConnectionType::Ssh),
            "both" => Ok(ConnectionType::Both),
            _ => Err(ConfigError::InvalidConnectionType {
                value: value.to_string(),
            }),
        }
    }
}

/// One of the sub-connections composing a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LegKind {
    Rdp,
    Ssh,
}

impl LegKind {
    /// The other leg of a `Both` session.
    pub fn other(&self) -> LegKind {
        match self {
            LegKind::Rdp => LegKind::Ssh,
            LegKind::Ssh => LegKind::Rdp,
        }
    }
}

impl std::fmt::Display for LegKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LegKind::Rdp => write!(f, "RDP"),
            LegKind::Ssh => write!(f, "SSH"),
        }
    }
}

/// Status of a single session leg.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LegStatus {
    /// Not part of this session's connection type.
    Unused,
    /// Will be launched once reachability is established.
    Pending,
    /// Client process is running.
    Active,
    /// Client failed to launch.
    Failed(String),
    /// Client process has exited.
    Exited,
}

impl std::fmt::Display for LegStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LegStatus::Unused => write!(f, "unused"),
            LegStatus::Pending => write!(f, "pending"),
            LegStatus::Active => write!(f, "active"),
            LegStatus::Failed(reason) => write!(f, "failed: {}", reason),
            LegStatus::Exited => write!(f, "exited"),
        }
    }
}

/// Session states; exactly one session exists process-wide at a time.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionState {
    Idle,
    ConnectingVpn,
    ProbingReachability { attempt: u32 },
    LaunchingClients,
    Active { since: Instant },
    Disconnecting,
    Failed(SessionError),
}

impl SessionState {
    /// Short machine-friendly phase name, stable across state payloads.
    pub fn phase(&self) -> &'static str {
        match self {
            SessionState::Idle => "idle",
            SessionState::ConnectingVpn => "connecting-vpn",
            SessionState::ProbingReachability { .. } => "probing",
            SessionState::LaunchingClients => "launching",
            SessionState::Active { .. } => "active",
            SessionState::Disconnecting => "disconnecting",
            SessionState::Failed(_) => "failed",
        }
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionState::Idle => write!(f, "idle"),
            SessionState::ConnectingVpn => write!(f, "connecting VPN"),
            SessionState::ProbingReachability { attempt } => {
                write!(f, "probing reachability (attempt {})", attempt)
            }
            SessionState::LaunchingClients => write!(f, "launching clients"),
            SessionState::Active { .. } => write!(f, "active"),
            SessionState::Disconnecting => write!(f, "disconnecting"),
            SessionState::Failed(reason) => write!(f, "failed: {}", reason),
        }
    }
}

/// Point-in-time view of the active session, shipped to the UI over a
/// channel; no shared mutable state crosses the boundary.
#[derive(Debug, Clone)]
pub struct SessionSnapshot {
    pub server: String,
    pub state: SessionState,
    pub rdp: LegStatus,
    pub ssh: LegStatus,
    pub elapsed: Duration,
}

/// Terminal result of one session.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionOutcome {
    /// Session ended normally (client exit or explicit disconnect).
    Completed,
    /// Session was cancelled before or during its lifetime.
    Cancelled,
    /// Session failed; teardown was still attempted.
    Failed(SessionError),
}

/// Format a duration as HH:MM:SS (or MM:SS when under an hour).
pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    let hours = secs / 3600;
    let mins = (secs % 3600) / 60;
    let secs = secs % 60;

    if hours > 0 {
        format!("{:02}:{:02}:{:02}", hours, mins, secs)
    } else {
        format!("{:02}:{:02}", mins, secs)
    }
}
