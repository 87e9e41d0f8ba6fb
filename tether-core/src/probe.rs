//! Host reachability probing with retry and exponential backoff
//!
//! Runs before client launch so a client never hangs against a dead host.
//! Only network-layer liveness is checked, not the protocol service itself.

use crate::config::Settings;
use crate::platform::PlatformAdapter;
use crate::shutdown::CancelToken;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Upper bound for any single backoff delay.
const BACKOFF_CAP: Duration = Duration::from_secs(8);

/// Clamp range for the backoff base derived from the probe timeout.
const BASE_FLOOR_MS: u64 = 100;
const BASE_CEILING_MS: u64 = 2_000;

/// Retries a liveness probe against a host with exponential backoff.
#[derive(Debug, Clone)]
pub struct ReachabilityProber {
    timeout: Duration,
    retries: u32,
}

impl ReachabilityProber {
    pub fn new(timeout_ms: u32, retries: u32) -> Self {
        Self {
            timeout: Duration::from_millis(u64::from(timeout_ms)),
            retries,
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(settings.ping_timeout_ms, settings.ping_retries)
    }

    /// Total number of attempts: the first probe plus the retries.
    pub fn attempts(&self) -> u32 {
        self.retries + 1
    }

    /// Delay before retry `attempt` (0-based): `min(cap, base * 2^attempt)`,
    /// with the base derived from the per-attempt timeout.
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let base_ms = (self.timeout.as_millis() as u64).clamp(BASE_FLOOR_MS, BASE_CEILING_MS);
        let delay_ms = base_ms.saturating_mul(1u64 << attempt.min(16));
        Duration::from_millis(delay_ms).min(BACKOFF_CAP)
    }

    /// Probe `host` until it answers or all attempts are exhausted.
    ///
    /// Cancellation is honored before each attempt. `on_attempt` is invoked
    /// with the 1-based attempt number before the probe runs, letting the
    /// caller publish progress.
    pub fn probe(
        &self,
        adapter: &dyn PlatformAdapter,
        host: &str,
        cancel: &CancelToken,
        mut on_attempt: impl FnMut(u32),
    ) -> bool {
        let attempts = self.attempts();

        for attempt in 0..attempts {
            if cancel.is_cancelled() {
                debug!("reachability probe cancelled");
                return false;
            }

            on_attempt(attempt + 1);
            debug!("Probe attempt {} of {} for {}", attempt + 1, attempts, host);

            if adapter.probe_host(host, self.timeout) {
                info!("Host {} is reachable", host);
                return true;
            }

            if attempt + 1 < attempts {
                let backoff = self.backoff_delay(attempt);
                debug!("Waiting {:?} before retry...", backoff);
                std::thread::sleep(backoff);
            }
        }

        warn!("Host {} is not reachable after {} attempts", host, attempts);
        false
    }
}
