//! Windows adapter: rasphone dial-up profiles, mstsc.exe, OpenSSH.

use super::{spawn_error, ChildHandle, PlatformAdapter, ProcessHandle};
use crate::error::AdapterError;
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::time::Duration;
use tracing::{debug, warn};

pub struct WindowsAdapter {
    ssh_client: Option<PathBuf>,
}

impl WindowsAdapter {
    pub fn new() -> Self {
        // mstsc.exe ships with Windows; only ssh needs discovery
        let ssh_client = which::which("ssh").ok();
        if ssh_client.is_none() {
            warn!("ssh not found in PATH; SSH sessions will be unavailable");
        }

        Self { ssh_client }
    }
}

impl Default for WindowsAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl PlatformAdapter for WindowsAdapter {
    fn vpn_connect(&self, name: &str) -> Result<(), AdapterError> {
        debug!("Executing: rasphone -d {}", name);

        Command::new("rasphone")
            .args(["-d", name])
            .spawn()
            .map_err(|e| spawn_error("rasphone", &e))?;

        Ok(())
    }

    fn vpn_disconnect(&self, name: &str) -> Result<(), AdapterError> {
        debug!("Executing: rasphone -h {}", name);

        // Hanging up an already-down profile is a no-op for rasphone
        Command::new("rasphone")
            .args(["-h", name])
            .spawn()
            .map_err(|e| spawn_error("rasphone", &e))?;

        Ok(())
    }

    fn launch_rdp(&self, address: &str) -> Result<Box<dyn ProcessHandle>, AdapterError> {
        debug!("Executing: mstsc.exe /v:{}", address);

        let child = Command::new("mstsc.exe")
            .arg(format!("/v:{}", address))
            .spawn()
            .map_err(|e| spawn_error("mstsc.exe", &e))?;

        Ok(Box::new(ChildHandle::new(child)))
    }

    fn launch_ssh(&self, target: &str) -> Result<Box<dyn ProcessHandle>, AdapterError> {
        let client = self
            .ssh_client
            .as_deref()
            .ok_or(AdapterError::ClientUnavailable { client: "SSH" })?;

        debug!("Executing: ssh {}", target);

        let child = Command::new(client)
            .arg(target)
            .spawn()
            .map_err(|e| spawn_error("ssh", &e))?;

        Ok(Box::new(ChildHandle::new(child)))
    }

    fn probe_host(&self, address: &str, timeout: Duration) -> bool {
        let timeout_ms = timeout.as_millis().max(1);

        debug!("Executing: ping -n 1 -w {} {}", timeout_ms, address);

        let result = Command::new("ping")
            .args(["-n", "1", "-w", &timeout_ms.to_string(), address])
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status();

        match result {
            Ok(status) => status.success(),
            Err(e) => {
                debug!("Ping failed: {}", e);
                false
            }
        }
    }
}
