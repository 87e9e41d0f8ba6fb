//! Connection orchestration state machine
//!
//! Sequences VPN bring-up, reachability probing, client launch, session
//! monitoring and guaranteed teardown for one session at a time. All phases
//! are blocking calls into external tools, so a session runs on a dedicated
//! worker thread and talks to the UI purely through channels.

use crate::config::{ServerDefinition, Settings};
use crate::error::{AdapterError, SessionError};
use crate::platform::{PlatformAdapter, ProcessHandle, ProcessStatus};
use crate::probe::ReachabilityProber;
use crate::session::{
    ConnectionType, LegKind, LegStatus, SessionOutcome, SessionSnapshot, SessionState,
};
use crate::shutdown::CancelToken;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Fixed wait after VPN establishment in `Both` mode, letting routing
/// stabilize before the shared reachability probe.
const SETTLE_DELAY: Duration = Duration::from_secs(2);

/// Poll interval for the monitored client process while `Active`.
const MONITOR_INTERVAL: Duration = Duration::from_millis(200);

/// How often an `Active` snapshot is refreshed with the elapsed duration.
const SNAPSHOT_REFRESH: Duration = Duration::from_secs(1);

/// Intents flowing into an active session: cancellation (shared with the
/// shutdown coordinator) and explicit disconnect.
#[derive(Clone, Debug)]
pub struct SessionControl {
    cancel: CancelToken,
    disconnect: Arc<AtomicBool>,
}

impl SessionControl {
    pub fn new(cancel: CancelToken) -> Self {
        Self {
            cancel,
            disconnect: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Ask the session to tear down gracefully.
    pub fn request_disconnect(&self) {
        self.disconnect.store(true, Ordering::SeqCst);
    }

    /// Trip the shared cancellation token.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    fn cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    fn disconnect_requested(&self) -> bool {
        self.disconnect.load(Ordering::SeqCst)
    }
}

/// Guards the VPN profile brought up for a session.
///
/// `disconnect` reaches the adapter at most once, no matter how often it is
/// called or whether the guard is dropped afterwards. When the session gives
/// up on a slow dial it marks the guard abandoned; the dial worker and the
/// session each set their flag first and then read the other's, so at least
/// one side observes both `connected` and `abandoned` and performs the
/// single hang-up.
struct VpnGuard {
    adapter: Arc<dyn PlatformAdapter>,
    profile: String,
    connected: AtomicBool,
    abandoned: AtomicBool,
}

impl VpnGuard {
    fn new(adapter: Arc<dyn PlatformAdapter>, profile: String) -> Self {
        Self {
            adapter,
            profile,
            connected: AtomicBool::new(false),
            abandoned: AtomicBool::new(false),
        }
    }

    fn dial(&self) -> Result<(), AdapterError> {
        self.adapter.vpn_connect(&self.profile)
    }

    fn mark_connected(&self) {
        self.connected.store(true, Ordering::SeqCst);
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn abandon(&self) {
        self.abandoned.store(true, Ordering::SeqCst);
    }

    fn is_abandoned(&self) -> bool {
        self.abandoned.load(Ordering::SeqCst)
    }

    fn disconnect(&self) {
        if self.connected.swap(false, Ordering::SeqCst) {
            info!("Disconnecting VPN: {}", self.profile);
            if let Err(e) = self.adapter.vpn_disconnect(&self.profile) {
                // Teardown is never blocked by its own failure
                warn!("Failed to disconnect VPN '{}': {}", self.profile, e);
            }
        }
    }
}

impl Drop for VpnGuard {
    fn drop(&mut self) {
        self.disconnect();
    }
}

/// Per-protocol sub-state of a session, owning the client handle.
struct LegSlot {
    status: LegStatus,
    handle: Option<Box<dyn ProcessHandle>>,
}

impl LegSlot {
    fn new(used: bool) -> Self {
        Self {
            status: if used {
                LegStatus::Pending
            } else {
                LegStatus::Unused
            },
            handle: None,
        }
    }

    fn is_active(&self) -> bool {
        matches!(self.status, LegStatus::Active)
    }

    fn terminate(&mut self) {
        if let Some(mut handle) = self.handle.take() {
            handle.terminate();
            self.status = LegStatus::Exited;
        }
    }
}

enum Phase {
    Continue,
    Cancelled,
}

/// The core state machine; drives one session at a time.
#[derive(Clone)]
pub struct ConnectionOrchestrator {
    adapter: Arc<dyn PlatformAdapter>,
    settings: Settings,
}

impl ConnectionOrchestrator {
    pub fn new(adapter: Arc<dyn PlatformAdapter>, settings: Settings) -> Self {
        Self { adapter, settings }
    }

    /// Run one session to completion on the calling thread, publishing
    /// snapshots for every state change.
    pub fn run_session(
        &self,
        server: &ServerDefinition,
        kind: ConnectionType,
        control: &SessionControl,
        snapshots: &Sender<SessionSnapshot>,
    ) -> SessionOutcome {
        let run = SessionRun {
            adapter: Arc::clone(&self.adapter),
            settings: self.settings.clone(),
            control: control.clone(),
            tx: snapshots.clone(),
            server: server.clone(),
            kind,
            state: SessionState::Idle,
            rdp: LegSlot::new(matches!(kind, ConnectionType::Rdp | ConnectionType::Both)),
            ssh: LegSlot::new(matches!(kind, ConnectionType::Ssh | ConnectionType::Both)),
            vpn: None,
            started: Instant::now(),
        };
        run.run()
    }

    /// Handle a connect intent: run the session on a dedicated worker so the
    /// caller's render/input loop is never blocked.
    pub fn spawn_session(
        &self,
        server: &ServerDefinition,
        kind: ConnectionType,
        cancel: CancelToken,
    ) -> std::io::Result<SessionHandle> {
        let (tx, rx) = mpsc::channel();
        let control = SessionControl::new(cancel);
        let orchestrator = self.clone();
        let worker_control = control.clone();
        let server = server.clone();

        let worker = thread::Builder::new()
            .name("session-worker".to_string())
            .spawn(move || orchestrator.run_session(&server, kind, &worker_control, &tx))?;

        Ok(SessionHandle {
            control,
            snapshots: rx,
            worker: Some(worker),
        })
    }
}

/// Handle to a running session worker.
pub struct SessionHandle {
    control: SessionControl,
    snapshots: Receiver<SessionSnapshot>,
    worker: Option<JoinHandle<SessionOutcome>>,
}

impl SessionHandle {
    /// Stream of state snapshots; closes when the session is discarded.
    pub fn snapshots(&self) -> &Receiver<SessionSnapshot> {
        &self.snapshots
    }

    /// Disconnect intent: graceful teardown from `Active`.
    pub fn disconnect(&self) {
        self.control.request_disconnect();
    }

    /// Cancel intent: honored cooperatively at phase boundaries.
    pub fn cancel(&self) {
        self.control.cancel();
    }

    /// Wait for the session to end and return its outcome.
    pub fn wait(mut self) -> SessionOutcome {
        match self.worker.take() {
            Some(worker) => worker.join().unwrap_or_else(|_| {
                error!("session worker panicked");
                SessionOutcome::Cancelled
            }),
            None => SessionOutcome::Cancelled,
        }
    }

    /// Wait up to `bound` for the session to end. Returns `None` if the
    /// worker is still tearing down when the bound elapses.
    pub fn join_within(&mut self, bound: Duration) -> Option<SessionOutcome> {
        let deadline = Instant::now() + bound;
        let worker = self.worker.take()?;

        while !worker.is_finished() {
            if Instant::now() >= deadline {
                self.worker = Some(worker);
                return None;
            }
            thread::sleep(Duration::from_millis(50));
        }

        Some(worker.join().unwrap_or_else(|_| {
            error!("session worker panicked");
            SessionOutcome::Cancelled
        }))
    }
}

/// State for a single in-flight session; exclusively owns the leg handles
/// and the VPN guard for the session's lifetime.
struct SessionRun {
    adapter: Arc<dyn PlatformAdapter>,
    settings: Settings,
    control: SessionControl,
    tx: Sender<SessionSnapshot>,
    server: ServerDefinition,
    kind: ConnectionType,
    state: SessionState,
    rdp: LegSlot,
    ssh: LegSlot,
    vpn: Option<Arc<VpnGuard>>,
    started: Instant,
}

impl SessionRun {
    fn run(mut self) -> SessionOutcome {
        info!(
            "Starting {} session to '{}'",
            self.kind.name(),
            self.server.name
        );
        self.publish();

        if !self.server.supports(self.kind) {
            return self.fail(SessionError::ConfigInvalid(format!(
                "{} connections are not available for server '{}'",
                self.kind.name(),
                self.server.name
            )));
        }

        match self.connect_vpn() {
            Ok(Phase::Continue) => {}
            Ok(Phase::Cancelled) => return self.cancel_out(),
            Err(e) => return self.fail(e),
        }

        match self.probe_reachability() {
            Ok(Phase::Continue) => {}
            Ok(Phase::Cancelled) => return self.cancel_out(),
            Err(e) => return self.fail(e),
        }

        match self.launch_clients() {
            Ok(Phase::Continue) => {}
            Ok(Phase::Cancelled) => return self.cancel_out(),
            Err(e) => return self.fail(e),
        }

        let outcome = self.monitor();
        self.transition(SessionState::Disconnecting);
        self.teardown();
        info!("Session to '{}' ended", self.server.name);
        outcome
    }

    /// Bring up the VPN profile, bounded by `vpn_timeout_secs`. Skipped when
    /// the server has no profile configured.
    fn connect_vpn(&mut self) -> Result<Phase, SessionError> {
        if self.control.cancelled() {
            return Ok(Phase::Cancelled);
        }

        let Some(profile) = self.server.vpn_profile().map(str::to_string) else {
            debug!(
                "Server '{}' has no VPN profile, skipping VPN phase",
                self.server.name
            );
            return Ok(Phase::Continue);
        };

        self.transition(SessionState::ConnectingVpn);
        info!("Connecting to VPN: {}", profile);

        let guard = Arc::new(VpnGuard::new(Arc::clone(&self.adapter), profile));
        let timeout = Duration::from_secs(self.settings.vpn_timeout_secs);

        // The dial blocks for as long as the external tool takes; run it on
        // a helper thread so the timeout can be enforced. The worker shares
        // the guard so a tunnel that comes up after the session has given up
        // is hung up by the worker itself, never raced by the session.
        let (done_tx, done_rx) = mpsc::channel();
        let worker_guard = Arc::clone(&guard);
        thread::Builder::new()
            .name("vpn-dial".to_string())
            .spawn(move || {
                let result = worker_guard.dial();
                if result.is_ok() {
                    worker_guard.mark_connected();
                    if worker_guard.is_abandoned() {
                        worker_guard.disconnect();
                    }
                }
                let _ = done_tx.send(result);
            })
            .map_err(|e| SessionError::VpnConnectFailed {
                reason: format!("failed to spawn dial worker: {e}"),
            })?;

        match done_rx.recv_timeout(timeout) {
            Ok(Ok(())) => {
                info!("VPN connection established");
                self.vpn = Some(guard);
                Ok(Phase::Continue)
            }
            Ok(Err(e)) => Err(SessionError::VpnConnectFailed {
                reason: e.to_string(),
            }),
            Err(RecvTimeoutError::Timeout) => {
                self.abandon_dial(&guard);
                Err(SessionError::VpnConnectFailed {
                    reason: format!("timed out after {}s", timeout.as_secs()),
                })
            }
            Err(RecvTimeoutError::Disconnected) => {
                self.abandon_dial(&guard);
                Err(SessionError::VpnConnectFailed {
                    reason: "dial worker exited unexpectedly".to_string(),
                })
            }
        }
    }

    /// Give up on an in-flight dial. If the tunnel already came up the
    /// session hangs it up here; otherwise the dial worker will on a late
    /// success.
    fn abandon_dial(&self, guard: &VpnGuard) {
        guard.abandon();
        if guard.is_connected() {
            guard.disconnect();
        }
    }

    /// One shared probe feeds all legs; in `Both` mode a settle delay
    /// elapses first so the fresh tunnel has routes in place.
    fn probe_reachability(&mut self) -> Result<Phase, SessionError> {
        if self.control.cancelled() {
            return Ok(Phase::Cancelled);
        }

        if self.kind == ConnectionType::Both && self.vpn.is_some() {
            debug!("Waiting {:?} for the tunnel to settle", SETTLE_DELAY);
            thread::sleep(SETTLE_DELAY);
            if self.control.cancelled() {
                return Ok(Phase::Cancelled);
            }
        }

        let host = match self.server.probe_target() {
            Some(host) => host.to_string(),
            None => {
                return Err(SessionError::ConfigInvalid(format!(
                    "server '{}' has no probe target",
                    self.server.name
                )))
            }
        };

        let prober = ReachabilityProber::from_settings(&self.settings);
        let adapter = Arc::clone(&self.adapter);
        let cancel = self.control.cancel_token();

        let reachable = prober.probe(adapter.as_ref(), &host, &cancel, |attempt| {
            self.transition(SessionState::ProbingReachability { attempt });
        });

        if self.control.cancelled() {
            return Ok(Phase::Cancelled);
        }

        if !reachable {
            return Err(SessionError::HostUnreachable {
                host,
                attempts: prober.attempts(),
            });
        }

        Ok(Phase::Continue)
    }

    /// Launch the required leg(s). In `Both` mode the legs are independent:
    /// one failed launch leaves the session partial-`Active`, only both
    /// failing fails the session.
    fn launch_clients(&mut self) -> Result<Phase, SessionError> {
        if self.control.cancelled() {
            return Ok(Phase::Cancelled);
        }

        self.transition(SessionState::LaunchingClients);

        match self.kind {
            ConnectionType::Rdp => self.launch_leg(LegKind::Rdp)?,
            ConnectionType::Ssh => self.launch_leg(LegKind::Ssh)?,
            ConnectionType::Both => {
                let rdp = self.launch_leg(LegKind::Rdp);
                if self.control.cancelled() {
                    return Ok(Phase::Cancelled);
                }
                let ssh = self.launch_leg(LegKind::Ssh);

                if let (Err(rdp_err), Err(ssh_err)) = (&rdp, &ssh) {
                    warn!("Both legs failed to launch (SSH: {})", ssh_err);
                    return Err(rdp_err.clone());
                }
            }
        }

        self.transition(SessionState::Active {
            since: Instant::now(),
        });
        Ok(Phase::Continue)
    }

    fn launch_leg(&mut self, kind: LegKind) -> Result<(), SessionError> {
        let target = match kind {
            LegKind::Rdp => self.server.rdp_address().map(str::to_string),
            LegKind::Ssh => self.server.ssh_target().map(str::to_string),
        };
        let Some(target) = target else {
            return Err(SessionError::ConfigInvalid(format!(
                "server '{}' has no {} endpoint",
                self.server.name, kind
            )));
        };

        info!("Starting {} session to {}...", kind, target);
        let launched = match kind {
            LegKind::Rdp => self.adapter.launch_rdp(&target),
            LegKind::Ssh => self.adapter.launch_ssh(&target),
        };

        match launched {
            Ok(handle) => {
                let slot = self.leg_mut(kind);
                slot.status = LegStatus::Active;
                slot.handle = Some(handle);
                self.publish();
                Ok(())
            }
            Err(e) => {
                warn!("Failed to start {} client: {}", kind, e);
                self.leg_mut(kind).status = LegStatus::Failed(e.to_string());
                self.publish();
                Err(SessionError::ClientLaunchFailed {
                    leg: kind,
                    source: e,
                })
            }
        }
    }

    /// Watch the primary leg (RDP for Rdp/Both, SSH otherwise; the surviving
    /// leg when the primary failed to launch) until it exits or an intent
    /// arrives.
    fn monitor(&mut self) -> SessionOutcome {
        let primary = match self.kind {
            ConnectionType::Rdp | ConnectionType::Both => LegKind::Rdp,
            ConnectionType::Ssh => LegKind::Ssh,
        };
        let watched = if self.leg(primary).is_active() {
            primary
        } else {
            primary.other()
        };

        info!("Session active; monitoring {} client", watched);
        let mut last_refresh = Instant::now();

        loop {
            if self.control.cancelled() {
                info!("Session cancelled, tearing down");
                return SessionOutcome::Cancelled;
            }
            if self.control.disconnect_requested() {
                info!("Disconnect requested, tearing down");
                return SessionOutcome::Completed;
            }

            let exited = {
                let slot = self.leg_mut(watched);
                match slot.handle.as_mut() {
                    Some(handle) => match handle.poll() {
                        ProcessStatus::Exited(code) => {
                            debug!("{} client exited with status {:?}", watched, code);
                            slot.status = LegStatus::Exited;
                            slot.handle = None;
                            true
                        }
                        ProcessStatus::Running => false,
                    },
                    None => true,
                }
            };

            if exited {
                self.publish();
                info!("{} client exited, disconnecting", watched);
                return SessionOutcome::Completed;
            }

            if last_refresh.elapsed() >= SNAPSHOT_REFRESH {
                self.publish();
                last_refresh = Instant::now();
            }

            thread::sleep(MONITOR_INTERVAL);
        }
    }

    fn cancel_out(&mut self) -> SessionOutcome {
        self.transition(SessionState::Disconnecting);
        self.teardown();
        SessionOutcome::Cancelled
    }

    fn fail(&mut self, err: SessionError) -> SessionOutcome {
        error!("Session failed: {}", err);
        self.terminate_legs();
        if let Some(vpn) = &self.vpn {
            vpn.disconnect();
        }
        self.transition(SessionState::Failed(err.clone()));
        SessionOutcome::Failed(err)
    }

    /// Tear the session down: terminate remaining clients, hang up the VPN
    /// (at most once), and discard the session back to idle.
    fn teardown(&mut self) {
        self.terminate_legs();
        if let Some(vpn) = &self.vpn {
            vpn.disconnect();
        }
        self.transition(SessionState::Idle);
    }

    fn terminate_legs(&mut self) {
        self.rdp.terminate();
        self.ssh.terminate();
    }

    fn leg(&self, kind: LegKind) -> &LegSlot {
        match kind {
            LegKind::Rdp => &self.rdp,
            LegKind::Ssh => &self.ssh,
        }
    }

    fn leg_mut(&mut self, kind: LegKind) -> &mut LegSlot {
        match kind {
            LegKind::Rdp => &mut self.rdp,
            LegKind::Ssh => &mut self.ssh,
        }
    }

    fn transition(&mut self, state: SessionState) {
        debug!(
            "Session '{}': {} -> {}",
            self.server.name,
            self.state.phase(),
            state.phase()
        );
        self.state = state;
        self.publish();
    }

    fn publish(&self) {
        // The receiver may be gone during shutdown; snapshots are best effort
        let _ = self.tx.send(SessionSnapshot {
            server: self.server.name.clone(),
            state: self.state.clone(),
            rdp: self.rdp.status.clone(),
            ssh: self.ssh.status.clone(),
            elapsed: self.started.elapsed(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_control_flags() {
        let control = SessionControl::new(CancelToken::new());
        assert!(!control.cancelled());
        assert!(!control.disconnect_requested());

        control.request_disconnect();
        assert!(control.disconnect_requested());

        let clone = control.clone();
        clone.cancel();
        assert!(control.cancelled());
        assert!(control.cancel_token().is_cancelled());
    }
}
