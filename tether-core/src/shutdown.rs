//! Process-wide shutdown coordination
//!
//! Provides an explicit cancellation token shared between the interruption
//! handler and whichever session is active, instead of ambient global state.

use crate::error::ShutdownError;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

/// Cloneable cancellation token; all clones observe the same flag.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    /// Create a new, untripped token.
    pub fn new() -> Self {
        Self::default()
    }

    /// Trip the token. Idempotent.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Check whether cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

static HANDLER_INSTALLED: AtomicBool = AtomicBool::new(false);

/// Process-wide shutdown coordinator, initialized exactly once at startup.
///
/// Installs the interruption handler and owns the cancellation token that is
/// forwarded into the active session. Repeated interruption signals are
/// no-ops; the first one trips the token and the session's own teardown
/// guard ensures the VPN is disconnected at most once.
pub struct ShutdownCoordinator {
    token: CancelToken,
}

impl ShutdownCoordinator {
    /// Install the interruption handler. Fails if called a second time.
    pub fn install() -> Result<Self, ShutdownError> {
        if HANDLER_INSTALLED.swap(true, Ordering::SeqCst) {
            return Err(ShutdownError::AlreadyInstalled);
        }

        let token = CancelToken::new();
        let handler_token = token.clone();

        ctrlc::set_handler(move || {
            if handler_token.is_cancelled() {
                debug!("repeated interrupt ignored, teardown already in progress");
            } else {
                info!("interrupt received, cancelling active session");
                handler_token.cancel();
            }
        })?;

        Ok(Self { token })
    }

    /// Get a clone of the shared cancellation token.
    pub fn token(&self) -> CancelToken {
        self.token.clone()
    }
}
