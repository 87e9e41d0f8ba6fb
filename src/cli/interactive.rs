//! Interactive server selection menu
//!
//! Entered when no subcommand is given: pick a server, pick a connection
//! type, run the session, return to the menu when it ends.

use crate::cli::connect::drive_session;
use crate::ui;
use std::path::Path;
use tether_core::config::ServerDefinition;
use tether_core::error::TetherError;
use tether_core::platform::native_adapter;
use tether_core::session::orchestrator::ConnectionOrchestrator;
use tether_core::session::{ConnectionType, SessionOutcome};
use tether_core::shutdown::ShutdownCoordinator;

pub fn run_interactive(config_path: &Path) -> Result<(), TetherError> {
    let config = super::load_config(config_path)?;
    let coordinator = ShutdownCoordinator::install()?;
    let orchestrator = ConnectionOrchestrator::new(native_adapter(), config.settings.clone());

    ui::print_banner();

    loop {
        if coordinator.token().is_cancelled() {
            break;
        }

        ui::print_server_table(&config.servers);

        let Some(line) = ui::prompt("Select a server (number or name, 'q' to quit): ")? else {
            break;
        };
        let selector = line.trim();
        if selector.is_empty() {
            continue;
        }
        if selector.eq_ignore_ascii_case("q") || selector.eq_ignore_ascii_case("quit") {
            break;
        }

        let server = match config.resolve(selector) {
            Ok(server) => server.clone(),
            Err(e) => {
                ui::print_error(&e.to_string());
                continue;
            }
        };

        let Some(kind) = select_connection_type(&server)? else {
            continue;
        };

        let outcome = drive_session(&orchestrator, &server, kind, coordinator.token())?;
        if outcome == SessionOutcome::Cancelled {
            break;
        }
        println!();
    }

    println!("Goodbye!");
    Ok(())
}

/// Ask for the connection type; servers with a single usable protocol skip
/// the question. `None` sends the user back to the server menu.
fn select_connection_type(
    server: &ServerDefinition,
) -> Result<Option<ConnectionType>, TetherError> {
    let available = ConnectionType::available_for(server);

    if available.len() == 1 {
        println!("Using {} (only option for this server).", available[0].name());
        return Ok(Some(available[0]));
    }

    println!("Connection types for {}:", server.name);
    for (i, kind) in available.iter().enumerate() {
        println!("  {}. {}", i + 1, kind.name());
    }

    let Some(line) = ui::prompt("Select a connection type: ")? else {
        return Ok(None);
    };
    let choice = line.trim();

    if let Ok(index) = choice.parse::<usize>() {
        if index >= 1 && index <= available.len() {
            return Ok(Some(available[index - 1]));
        }
    }
    if let Ok(kind) = choice.parse::<ConnectionType>() {
        if available.contains(&kind) {
            return Ok(Some(kind));
        }
    }

    ui::print_error(&format!("invalid choice '{}'", choice));
    Ok(None)
}
