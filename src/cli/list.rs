//! Server listing command

use crate::ui;
use std::path::Path;
use tether_core::error::TetherError;

/// Run the list command: show all configured servers.
pub fn run_list(config_path: &Path) -> Result<(), TetherError> {
    let config = super::load_config(config_path)?;
    ui::print_server_table(&config.servers);
    Ok(())
}
