//! tether - layered remote-access session launcher
//!
//! Brings up a VPN tunnel, verifies host reachability and launches RDP
//! and/or SSH clients as one supervised session with guaranteed teardown.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tether_core::config::Config;
use tether_core::error::TetherError;
use tether_core::init_logging;

mod cli;
mod ui;

#[derive(Parser)]
#[command(name = "tether", version)]
#[command(about = "Layered remote-access sessions over VPN, RDP and SSH")]
struct Cli {
    /// Path to the server configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Plain output without colors
    #[arg(long, global = true)]
    simple: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a sample configuration file
    Init {
        /// Destination path (defaults to the user config directory)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// List configured servers
    List,
    /// Connect to a server by name or 1-based index
    Connect {
        /// Server name or index as shown by 'list'
        server: String,

        /// Connection type: rdp, ssh or both
        #[arg(short = 't', long = "connection-type", default_value = "rdp")]
        connection_type: String,
    },
}

fn main() {
    let cli = Cli::parse();

    if cli.simple {
        colored::control::set_override(false);
    }

    if let Err(e) = init_logging(cli.verbose) {
        eprintln!("Failed to initialize logging: {}", e);
        std::process::exit(2);
    }

    let config_path = cli.config.clone().unwrap_or_else(Config::default_path);

    let result = match cli.command {
        Some(Commands::Init { output }) => cli::init::run_init(output.or(cli.config).as_deref()),
        Some(Commands::List) => cli::list::run_list(&config_path),
        Some(Commands::Connect {
            server,
            connection_type,
        }) => cli::connect::run_connect(&config_path, &server, &connection_type),
        None => cli::interactive::run_interactive(&config_path),
    };

    match result {
        Ok(()) => std::process::exit(0),
        Err(e) => {
            let exit_code = match e {
                // Configuration errors (exit code 2)
                TetherError::Config(_) => 2,
                // Connection and runtime errors (exit code 1)
                TetherError::Adapter(_)
                | TetherError::Session(_)
                | TetherError::Shutdown(_)
                | TetherError::Io(_) => 1,
            };

            eprintln!("{}", e);
            std::process::exit(exit_code);
        }
    }
}
