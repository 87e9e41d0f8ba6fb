//! Platform abstraction for VPN, RDP and SSH tooling
//!
//! The orchestrator never invokes OS tools directly; everything goes through
//! the [`PlatformAdapter`] capability set, with one concrete implementation
//! per platform selected once at startup.

#[cfg(windows)]
mod windows;

#[cfg(not(windows))]
mod unix;

use crate::error::AdapterError;
use std::process::Child;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Result of polling a spawned client process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessStatus {
    Running,
    Exited(Option<i32>),
}

/// Polled handle to a spawned client process.
///
/// Abstracts over OS wait primitives so the state machine can monitor and
/// terminate clients without touching `std::process` directly.
pub trait ProcessHandle: Send {
    /// Check the process without blocking.
    fn poll(&mut self) -> ProcessStatus;

    /// Forcibly terminate the process and reap it. Best effort.
    fn terminate(&mut self);
}

/// [`ProcessHandle`] backed by a real child process.
pub struct ChildHandle(Child);

impl ChildHandle {
    pub fn new(child: Child) -> Self {
        Self(child)
    }
}

impl ProcessHandle for ChildHandle {
    fn poll(&mut self) -> ProcessStatus {
        match self.0.try_wait() {
            Ok(Some(status)) => ProcessStatus::Exited(status.code()),
            Ok(None) => ProcessStatus::Running,
            Err(e) => {
                debug!("failed to poll client process: {}", e);
                ProcessStatus::Exited(None)
            }
        }
    }

    fn terminate(&mut self) {
        if let Err(e) = self.0.kill() {
            debug!("failed to kill client process: {}", e);
        }
        let _ = self.0.wait();
    }
}

/// Capability set over the OS-native remote-access tooling.
///
/// Two variants exist (Windows and Unix); the right one is chosen once by
/// [`native_adapter`], never per call.
pub trait PlatformAdapter: Send + Sync {
    /// Dial a VPN profile by name. Blocks until the tool reports a result.
    fn vpn_connect(&self, name: &str) -> Result<(), AdapterError>;

    /// Hang up a VPN profile by name. Must be safe to call when the profile
    /// is already down.
    fn vpn_disconnect(&self, name: &str) -> Result<(), AdapterError>;

    /// Launch an RDP client against the given address.
    fn launch_rdp(&self, address: &str) -> Result<Box<dyn ProcessHandle>, AdapterError>;

    /// Launch an SSH client against the given `user@host` target.
    fn launch_ssh(&self, target: &str) -> Result<Box<dyn ProcessHandle>, AdapterError>;

    /// Network-layer liveness check for a host.
    fn probe_host(&self, address: &str, timeout: Duration) -> bool;
}

/// Build the platform adapter for the running OS.
#[cfg(windows)]
pub fn native_adapter() -> Arc<dyn PlatformAdapter> {
    Arc::new(windows::WindowsAdapter::new())
}

/// Build the platform adapter for the running OS.
#[cfg(not(windows))]
pub fn native_adapter() -> Arc<dyn PlatformAdapter> {
    Arc::new(unix::UnixAdapter::new())
}

/// Map a spawn error to the adapter taxonomy.
fn spawn_error(command: &str, error: &std::io::Error) -> AdapterError {
    if error.kind() == std::io::ErrorKind::NotFound {
        AdapterError::CommandNotFound {
            command: command.to_string(),
        }
    } else {
        debug!("{} failed to start: {}", command, error);
        AdapterError::LaunchFailed {
            command: command.to_string(),
            message: error.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Error, ErrorKind};

    #[test]
    fn test_spawn_error_mapping() {
        let not_found = Error::new(ErrorKind::NotFound, "no such file");
        assert_eq!(
            spawn_error("xfreerdp", &not_found),
            AdapterError::CommandNotFound {
                command: "xfreerdp".to_string(),
            }
        );

        let denied = Error::new(ErrorKind::PermissionDenied, "permission denied");
        match spawn_error("xfreerdp", &denied) {
            AdapterError::LaunchFailed { command, message } => {
                assert_eq!(command, "xfreerdp");
                assert!(message.contains("permission denied"));
            }
            other => panic!("unexpected mapping: {other:?}"),
        }
    }
}
