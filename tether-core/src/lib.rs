//! Core library for the tether connection manager
//!
//! This crate provides the connection orchestration engine: the platform
//! adapter over OS-level VPN/RDP/SSH tooling, the reachability prober, the
//! session state machine and the shutdown coordinator.

pub mod config;
pub mod error;
pub mod platform;
pub mod probe;
pub mod session;
pub mod shutdown;

/// Initialize logging infrastructure
///
/// Uses systemd journal logging when running under systemd. Otherwise logs
/// to stderr with a level filter derived from the CLI verbosity count.
pub fn init_logging(verbosity: u8) -> Result<(), Box<dyn std::error::Error>> {
    use tracing::Level;
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    // Try to use systemd journal logging if available
    #[cfg(target_os = "linux")]
    {
        if std::env::var("JOURNAL_STREAM").is_ok() {
            let journal_layer = tracing_journald::layer()?;
            tracing_subscriber::registry()
                .with(journal_layer)
                .with(tracing_subscriber::filter::LevelFilter::INFO)
                .init();
            return Ok(());
        }
    }

    let level = match verbosity {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };

    let filter = EnvFilter::from_default_env().add_directive(level.into());

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .with(filter)
        .init();

    Ok(())
}
