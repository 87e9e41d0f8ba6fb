//! CLI command implementations
//!
//! This module contains the implementation of all CLI subcommands plus the
//! interactive menu shown when no subcommand is given.

pub mod connect;
pub mod init;
pub mod interactive;
pub mod list;

use crate::ui;
use std::path::Path;
use tether_core::config::Config;
use tether_core::error::TetherError;

/// Load the configuration, falling back to the built-in default servers
/// when no file exists at the path. Broken or invalid files stay errors.
pub fn load_config(path: &Path) -> Result<Config, TetherError> {
    if path.exists() {
        return Ok(Config::load(path)?);
    }

    ui::print_warning(&format!(
        "no configuration found at {}; using built-in defaults (run 'tether init' to create one)",
        path.display()
    ));
    Ok(Config::default_config())
}
