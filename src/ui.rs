//! Terminal output helpers
//!
//! All user-facing printing lives here; colors are disabled globally by the
//! `--simple` flag before any of these run.

use colored::Colorize;
use std::io::{self, Write};
use tether_core::config::ServerDefinition;
use tether_core::session::{ConnectionType, LegStatus, SessionSnapshot, SessionState};

pub fn print_banner() {
    println!("{}", "tether - layered remote-access sessions".bold());
    println!();
}

pub fn print_server_table(servers: &[ServerDefinition]) {
    println!("{}", "Available servers:".bold());
    for (i, server) in servers.iter().enumerate() {
        let mut modes = Vec::new();
        if server.has_rdp() {
            modes.push("RDP");
        }
        if server.has_ssh() {
            modes.push("SSH");
        }
        let vpn = server
            .vpn_profile()
            .map(|profile| format!(" via VPN '{}'", profile))
            .unwrap_or_default();

        println!(
            "  {}. {} [{}]{}",
            (i + 1).to_string().cyan(),
            server.name.green(),
            modes.join("/"),
            vpn.dimmed()
        );
    }
    println!();
}

pub fn print_session_header(server: &ServerDefinition, kind: ConnectionType) {
    println!(
        "Connecting to {} ({})...",
        server.name.green().bold(),
        kind.name()
    );
}

/// Print a line for a session state change.
pub fn print_phase(snapshot: &SessionSnapshot) {
    match &snapshot.state {
        SessionState::ConnectingVpn => {
            println!("{} Connecting VPN...", "->".cyan());
        }
        SessionState::ProbingReachability { .. } => {
            println!("{} Checking host reachability...", "->".cyan());
        }
        SessionState::LaunchingClients => {
            println!("{} Launching clients...", "->".cyan());
        }
        SessionState::Active { .. } => {
            println!(
                "{} Session active. Press Ctrl+C to disconnect.",
                "OK".green().bold()
            );
            print_leg("RDP", &snapshot.rdp);
            print_leg("SSH", &snapshot.ssh);
        }
        SessionState::Disconnecting => {
            println!("{} Disconnecting...", "->".cyan());
        }
        SessionState::Idle | SessionState::Failed(_) => {}
    }
}

fn print_leg(label: &str, status: &LegStatus) {
    match status {
        LegStatus::Unused => {}
        LegStatus::Failed(reason) => {
            println!("   {} {}: failed ({})", "!".yellow(), label, reason);
        }
        status => {
            println!("   {} {}: {}", "*".green(), label, status);
        }
    }
}

pub fn print_success(message: &str) {
    println!("{} {}", "OK".green().bold(), message);
}

pub fn print_warning(message: &str) {
    eprintln!("{} {}", "Warning:".yellow().bold(), message);
}

pub fn print_error(message: &str) {
    eprintln!("{} {}", "Error:".red().bold(), message);
}

/// Print a prompt and read one line; `None` on end of input.
pub fn prompt(message: &str) -> io::Result<Option<String>> {
    print!("{}", message);
    io::stdout().flush()?;

    let mut line = String::new();
    if io::stdin().read_line(&mut line)? == 0 {
        return Ok(None);
    }
    Ok(Some(line))
}
