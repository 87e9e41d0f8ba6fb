//! Sample configuration generation

use std::path::Path;
use tether_core::config::Config;
use tether_core::error::{ConfigError, TetherError};
use tracing::info;

/// Run the init command: write a sample configuration file.
pub fn run_init(target: Option<&Path>) -> Result<(), TetherError> {
    let path = target
        .map(Path::to_path_buf)
        .unwrap_or_else(Config::init_path);

    if path.exists() {
        println!("Configuration already exists at {}", path.display());
        let answer = crate::ui::prompt("Overwrite it with the sample? [y/N]: ")?;
        let overwrite = answer
            .as_deref()
            .map(|a| a.trim().eq_ignore_ascii_case("y"))
            .unwrap_or(false);
        if !overwrite {
            println!("Keeping the existing configuration.");
            return Ok(());
        }
    }

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::WriteFailed {
                path: path.display().to_string(),
                source: e,
            })?;
        }
    }

    std::fs::write(&path, Config::sample_toml()).map_err(|e| ConfigError::WriteFailed {
        path: path.display().to_string(),
        source: e,
    })?;

    info!("Wrote sample configuration to {}", path.display());
    println!("Created sample configuration at {}", path.display());
    println!("Edit it to match your servers, then run 'tether list'.");
    Ok(())
}
