//! Unix/Linux adapter: NetworkManager VPN profiles, xfreerdp/rdesktop, ssh.

use super::{spawn_error, ChildHandle, PlatformAdapter, ProcessHandle};
use crate::error::AdapterError;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::Duration;
use tracing::{debug, warn};

/// RDP client binaries in preference order.
const RDP_CANDIDATES: &[&str] = &["xfreerdp", "xfreerdp3", "rdesktop"];

pub struct UnixAdapter {
    rdp_client: Option<PathBuf>,
    ssh_client: Option<PathBuf>,
}

impl UnixAdapter {
    /// Resolve client binaries once; missing clients are reported here and
    /// block launches of that protocol only.
    pub fn new() -> Self {
        let rdp_client = RDP_CANDIDATES
            .iter()
            .find_map(|candidate| which::which(candidate).ok());

        match &rdp_client {
            Some(path) => debug!("using RDP client: {}", path.display()),
            None => warn!(
                "no RDP client found (tried {}); RDP sessions will be unavailable",
                RDP_CANDIDATES.join(", ")
            ),
        }

        let ssh_client = which::which("ssh").ok();
        if ssh_client.is_none() {
            warn!("ssh not found in PATH; SSH sessions will be unavailable");
        }

        Self {
            rdp_client,
            ssh_client,
        }
    }
}

impl Default for UnixAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl PlatformAdapter for UnixAdapter {
    fn vpn_connect(&self, name: &str) -> Result<(), AdapterError> {
        debug!("Executing: nmcli connection up {}", name);

        let status = Command::new("nmcli")
            .args(["connection", "up", name])
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map_err(|e| spawn_error("nmcli", &e))?;

        if status.success() {
            debug!("VPN connected via nmcli");
            Ok(())
        } else {
            warn!("nmcli connection up failed, VPN '{}' may not exist", name);
            Err(AdapterError::ProfileNotConfigured {
                name: name.to_string(),
            })
        }
    }

    fn vpn_disconnect(&self, name: &str) -> Result<(), AdapterError> {
        debug!("Executing: nmcli connection down {}", name);

        let status = Command::new("nmcli")
            .args(["connection", "down", name])
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map_err(|e| spawn_error("nmcli", &e))?;

        if !status.success() {
            // Profile already down; treat as success
            debug!("nmcli connection down returned non-zero for '{}'", name);
        }

        Ok(())
    }

    fn launch_rdp(&self, address: &str) -> Result<Box<dyn ProcessHandle>, AdapterError> {
        let client = self
            .rdp_client
            .as_deref()
            .ok_or(AdapterError::ClientUnavailable { client: "RDP" })?;

        debug!("Launching RDP client {} for {}", client.display(), address);

        let mut command = Command::new(client);
        if is_freerdp(client) {
            command.args([
                &format!("/v:{}", address),
                "/cert:ignore",
                "/dynamic-resolution",
            ]);
        } else {
            command.arg(address);
        }

        let child = command
            .spawn()
            .map_err(|e| spawn_error(&client.display().to_string(), &e))?;

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
        // Linux ping takes -W in whole seconds
        let timeout_secs = timeout.as_secs().max(1);

        debug!("Executing: ping -c 1 -W {} {}", timeout_secs, address);

        let result = Command::new("ping")
            .args(["-c", "1", "-W", &timeout_secs.to_string(), address])
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

fn is_freerdp(client: &Path) -> bool {
    client
        .file_name()
        .and_then(|name| name.to_str())
        .map(|name| name.starts_with("xfreerdp"))
        .unwrap_or(false)
}
