//! Configuration loading for server definitions and settings
//!
//! Handles loading and validating the TOML server registry from the user's
//! configuration directory, plus sample generation for `init`.

use crate::error::ConfigError;
use crate::session::ConnectionType;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Application configuration containing server definitions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// List of servers available for connection.
    #[serde(default)]
    pub servers: Vec<ServerDefinition>,

    /// Global settings.
    #[serde(default)]
    pub settings: Settings,
}

/// Global application settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// Timeout in seconds for VPN connection attempts.
    #[serde(default = "default_vpn_timeout")]
    pub vpn_timeout_secs: u64,

    /// Timeout in milliseconds for a single reachability probe.
    #[serde(default = "default_ping_timeout")]
    pub ping_timeout_ms: u32,

    /// Number of probe retries after the first attempt.
    #[serde(default = "default_ping_retries")]
    pub ping_retries: u32,
}

fn default_vpn_timeout() -> u64 {
    30
}

fn default_ping_timeout() -> u32 {
    3000
}

fn default_ping_retries() -> u32 {
    3
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            vpn_timeout_secs: default_vpn_timeout(),
            ping_timeout_ms: default_ping_timeout(),
            ping_retries: default_ping_retries(),
        }
    }
}

/// Server definition with connection details.
///
/// Immutable once loaded; at least one of `rdp`/`ssh` must be present.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerDefinition {
    /// Display name of the server (unique key).
    pub name: String,

    /// SSH connection string (e.g., "root@192.168.0.98").
    #[serde(default)]
    pub ssh: Option<String>,

    /// RDP address (IP or hostname).
    #[serde(default)]
    pub rdp: Option<String>,

    /// VPN profile name as configured in the system, if a tunnel is needed.
    #[serde(default)]
    pub vpn: Option<String>,
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|s| !s.is_empty())
}

impl ServerDefinition {
    /// Check if SSH is available for this server.
    pub fn has_ssh(&self) -> bool {
        self.ssh_target().is_some()
    }

    /// Check if RDP is available for this server.
    pub fn has_rdp(&self) -> bool {
        self.rdp_address().is_some()
    }

    /// Get the SSH connection string if available.
    pub fn ssh_target(&self) -> Option<&str> {
        non_empty(&self.ssh)
    }

    /// Get the RDP address if available.
    pub fn rdp_address(&self) -> Option<&str> {
        non_empty(&self.rdp)
    }

    /// Get the VPN profile name, if this server needs a tunnel.
    pub fn vpn_profile(&self) -> Option<&str> {
        non_empty(&self.vpn)
    }

    /// Extract the host part from the SSH connection string.
    pub fn ssh_host(&self) -> Option<&str> {
        self.ssh_target().and_then(|ssh| ssh.split('@').nth(1))
    }

    /// Host used for reachability probing: the RDP address when present,
    /// otherwise the SSH host.
    pub fn probe_target(&self) -> Option<&str> {
        self.rdp_address().or_else(|| self.ssh_host())
    }

    /// Check whether a connection type can be served by this definition.
    pub fn supports(&self, kind: ConnectionType) -> bool {
        match kind {
            ConnectionType::Rdp => self.has_rdp(),
            ConnectionType::Ssh => self.has_ssh(),
            ConnectionType::Both => self.has_rdp() && self.has_ssh(),
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |message: String| ConfigError::InvalidServer {
            name: self.name.clone(),
            message,
        };

        if self.name.trim().is_empty() {
            return Err(ConfigError::InvalidServer {
                name: "<unnamed>".to_string(),
                message: "server name must not be empty".to_string(),
            });
        }

        if !self.has_rdp() && !self.has_ssh() {
            return Err(invalid(
                "at least one of 'rdp' or 'ssh' must be set".to_string(),
            ));
        }

        if let Some(ssh) = self.ssh_target() {
            let mut parts = ssh.splitn(2, '@');
            let user = parts.next().unwrap_or_default();
            let host = parts.next().unwrap_or_default();
            if user.is_empty() || host.is_empty() {
                return Err(invalid(format!(
                    "ssh target '{ssh}' must have the form user@host"
                )));
            }
        }

        Ok(())
    }
}

impl Config {
    /// Load configuration from a TOML file and validate it.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        info!("Loading configuration from: {}", path.display());

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFailed {
            path: path.display().to_string(),
            source: e,
        })?;

        let config: Config = toml::from_str(&content).map_err(|e| ConfigError::ParseFailed {
            path: path.display().to_string(),
            source: e,
        })?;

        config.validate()?;

        debug!("Loaded {} servers from config", config.servers.len());
        Ok(config)
    }

    /// Validate the whole registry: non-empty, unique names, valid servers.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.servers.is_empty() {
            return Err(ConfigError::NoServers);
        }

        for (i, server) in self.servers.iter().enumerate() {
            server.validate()?;

            let duplicate = self.servers[..i]
                .iter()
                .any(|other| other.name.eq_ignore_ascii_case(&server.name));
            if duplicate {
                return Err(ConfigError::DuplicateName {
                    name: server.name.clone(),
                });
            }
        }

        Ok(())
    }

    /// Resolve a server by case-insensitive name or 1-based index.
    pub fn resolve(&self, selector: &str) -> Result<&ServerDefinition, ConfigError> {
        if let Ok(index) = selector.trim().parse::<usize>() {
            if index < 1 || index > self.servers.len() {
                return Err(ConfigError::IndexOutOfRange {
                    index,
                    count: self.servers.len(),
                });
            }
            return Ok(&self.servers[index - 1]);
        }

        self.servers
            .iter()
            .find(|s| s.name.eq_ignore_ascii_case(selector))
            .ok_or_else(|| ConfigError::UnknownServer {
                selector: selector.to_string(),
            })
    }

    /// Get the default configuration file path.
    pub fn default_path() -> PathBuf {
        // Prefer the user config directory when a file exists there
        if let Some(config_dir) = dirs::config_dir() {
            let app_config = config_dir.join("tether").join("servers.toml");
            if app_config.exists() {
                return app_config;
            }
        }

        PathBuf::from("servers.toml")
    }

    /// Path where a fresh configuration file should be written.
    pub fn init_path() -> PathBuf {
        match dirs::config_dir() {
            Some(config_dir) => config_dir.join("tether").join("servers.toml"),
            None => PathBuf::from("servers.toml"),
        }
    }

    /// Create a default configuration with example servers.
    pub fn default_config() -> Self {
        Config {
            servers: vec![
                ServerDefinition {
                    name: "Ilmatex".to_string(),
                    ssh: Some("root@192.168.0.98".to_string()),
                    rdp: Some("192.168.0.99".to_string()),
                    vpn: Some("ILMATEX".to_string()),
                },
                ServerDefinition {
                    name: "Frodexim".to_string(),
                    ssh: None,
                    rdp: Some("192.168.50.20".to_string()),
                    vpn: Some("FRODEXIM".to_string()),
                },
                ServerDefinition {
                    name: "Industrial Technic".to_string(),
                    ssh: Some("root@192.168.100.10".to_string()),
                    rdp: Some("192.168.100.20".to_string()),
                    vpn: Some("Industrial Technik".to_string()),
                },
                ServerDefinition {
                    name: "BG Nova".to_string(),
                    ssh: None,
                    rdp: Some("192.168.100.20".to_string()),
                    vpn: Some("Industrial Technik".to_string()),
                },
            ],
            settings: Settings::default(),
        }
    }

    /// Generate a sample configuration file content.
    pub fn sample_toml() -> String {
        let config = Self::default_config();
        toml::to_string_pretty(&config)
            .unwrap_or_else(|_| String::from("# Failed to generate sample"))
    }
}
