//! Direct connection command and shared session driver

use crate::ui;
use std::path::Path;
use std::time::Duration;
use tether_core::config::ServerDefinition;
use tether_core::error::{ConfigError, TetherError};
use tether_core::platform::native_adapter;
use tether_core::session::orchestrator::ConnectionOrchestrator;
use tether_core::session::{format_duration, ConnectionType, SessionOutcome};
use tether_core::shutdown::{CancelToken, ShutdownCoordinator};

/// How long to wait for a session worker to finish teardown.
const TEARDOWN_GRACE: Duration = Duration::from_secs(10);

/// Run the connect command: one session against a named server, then exit.
pub fn run_connect(config_path: &Path, selector: &str, kind: &str) -> Result<(), TetherError> {
    let config = super::load_config(config_path)?;
    let server = config.resolve(selector)?.clone();
    let kind: ConnectionType = kind.parse()?;

    if !server.supports(kind) {
        return Err(ConfigError::UnsupportedConnectionType {
            kind: kind.name().to_string(),
            name: server.name.clone(),
        }
        .into());
    }

    let coordinator = ShutdownCoordinator::install()?;
    let orchestrator = ConnectionOrchestrator::new(native_adapter(), config.settings.clone());

    match drive_session(&orchestrator, &server, kind, coordinator.token())? {
        SessionOutcome::Failed(e) => Err(e.into()),
        SessionOutcome::Completed | SessionOutcome::Cancelled => Ok(()),
    }
}

/// Run one session to completion, rendering state changes as they arrive.
pub fn drive_session(
    orchestrator: &ConnectionOrchestrator,
    server: &ServerDefinition,
    kind: ConnectionType,
    cancel: CancelToken,
) -> Result<SessionOutcome, TetherError> {
    ui::print_session_header(server, kind);

    let mut handle = orchestrator.spawn_session(server, kind, cancel)?;

    let mut last_phase = "";
    let mut elapsed = Duration::ZERO;

    // The channel closes once the worker finishes teardown
    while let Ok(snapshot) = handle.snapshots().recv() {
        elapsed = snapshot.elapsed;
        if snapshot.state.phase() != last_phase {
            last_phase = snapshot.state.phase();
            ui::print_phase(&snapshot);
        }
    }

    // Give teardown a bounded window rather than blocking exit forever
    let outcome = match handle.join_within(TEARDOWN_GRACE) {
        Some(outcome) => outcome,
        None => {
            ui::print_error("session teardown did not finish in time");
            SessionOutcome::Cancelled
        }
    };
    match &outcome {
        SessionOutcome::Completed => {
            ui::print_success(&format!("Session ended after {}", format_duration(elapsed)));
        }
        SessionOutcome::Cancelled => {
            println!("Session cancelled.");
        }
        SessionOutcome::Failed(e) => {
            ui::print_error(&e.to_string());
        }
    }

    Ok(outcome)
}
