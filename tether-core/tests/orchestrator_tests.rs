//! End-to-end tests for the session state machine against a mock platform
//! adapter, covering phase sequencing, failure teardown and intents.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use tether_core::config::{ServerDefinition, Settings};
use tether_core::error::{AdapterError, SessionError};
use tether_core::platform::{PlatformAdapter, ProcessHandle, ProcessStatus};
use tether_core::session::orchestrator::{ConnectionOrchestrator, SessionControl, SessionHandle};
use tether_core::session::{
    ConnectionType, LegKind, LegStatus, SessionOutcome, SessionSnapshot,
};
use tether_core::shutdown::CancelToken;

struct MockBehavior {
    vpn_fails: bool,
    vpn_delay: Option<Duration>,
    unreachable: bool,
    /// Probe attempts answer starting at this 1-based attempt.
    reachable_after: u32,
    fail_rdp: bool,
    fail_ssh: bool,
    /// Monitor polls a client survives before exiting; `u32::MAX` never exits.
    client_polls: u32,
}

impl Default for MockBehavior {
    fn default() -> Self {
        Self {
            vpn_fails: false,
            vpn_delay: None,
            unreachable: false,
            reachable_after: 1,
            fail_rdp: false,
            fail_ssh: false,
            client_polls: 2,
        }
    }
}

struct MockAdapter {
    behavior: MockBehavior,
    calls: Arc<Mutex<Vec<String>>>,
    probes: AtomicU32,
}

impl MockAdapter {
    fn new(behavior: MockBehavior) -> Arc<Self> {
        Arc::new(Self {
            behavior,
            calls: Arc::new(Mutex::new(Vec::new())),
            probes: AtomicU32::new(0),
        })
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }

    fn count(&self, prefix: &str) -> usize {
        self.calls()
            .iter()
            .filter(|call| call.starts_with(prefix))
            .count()
    }

    fn handle(&self, label: &'static str) -> Box<dyn ProcessHandle> {
        Box::new(MockHandle {
            label,
            remaining: self.behavior.client_polls,
            calls: Arc::clone(&self.calls),
        })
    }
}

impl PlatformAdapter for MockAdapter {
    fn vpn_connect(&self, name: &str) -> Result<(), AdapterError> {
        self.record(format!("vpn_connect:{name}"));
        if let Some(delay) = self.behavior.vpn_delay {
            thread::sleep(delay);
            // A slow dial marks the moment the tunnel actually comes up
            self.record(format!("vpn_established:{name}"));
        }
        if self.behavior.vpn_fails {
            return Err(AdapterError::ProfileNotConfigured {
                name: name.to_string(),
            });
        }
        Ok(())
    }

    fn vpn_disconnect(&self, name: &str) -> Result<(), AdapterError> {
        self.record(format!("vpn_disconnect:{name}"));
        Ok(())
    }

    fn launch_rdp(&self, address: &str) -> Result<Box<dyn ProcessHandle>, AdapterError> {
        self.record(format!("launch_rdp:{address}"));
        if self.behavior.fail_rdp {
            return Err(AdapterError::ClientUnavailable { client: "RDP" });
        }
        Ok(self.handle("rdp"))
    }

    fn launch_ssh(&self, target: &str) -> Result<Box<dyn ProcessHandle>, AdapterError> {
        self.record(format!("launch_ssh:{target}"));
        if self.behavior.fail_ssh {
            return Err(AdapterError::ClientUnavailable { client: "SSH" });
        }
        Ok(self.handle("ssh"))
    }

    fn probe_host(&self, address: &str, _timeout: Duration) -> bool {
        self.record(format!("probe:{address}"));
        let attempt = self.probes.fetch_add(1, Ordering::SeqCst) + 1;
        !self.behavior.unreachable && attempt >= self.behavior.reachable_after
    }
}

struct MockHandle {
    label: &'static str,
    remaining: u32,
    calls: Arc<Mutex<Vec<String>>>,
}

impl ProcessHandle for MockHandle {
    fn poll(&mut self) -> ProcessStatus {
        if self.remaining == u32::MAX {
            return ProcessStatus::Running;
        }
        if self.remaining == 0 {
            ProcessStatus::Exited(Some(0))
        } else {
            self.remaining -= 1;
            ProcessStatus::Running
        }
    }

    fn terminate(&mut self) {
        self.calls
            .lock()
            .unwrap()
            .push(format!("terminate:{}", self.label));
    }
}

fn server(vpn: Option<&str>) -> ServerDefinition {
    ServerDefinition {
        name: "Testbed".to_string(),
        ssh: Some("root@192.168.0.98".to_string()),
        rdp: Some("192.168.0.99".to_string()),
        vpn: vpn.map(str::to_string),
    }
}

/// Short timeouts so failure paths resolve in well under a second.
fn fast_settings() -> Settings {
    Settings {
        vpn_timeout_secs: 1,
        ping_timeout_ms: 1,
        ping_retries: 1,
    }
}

fn run(
    adapter: Arc<MockAdapter>,
    server: &ServerDefinition,
    kind: ConnectionType,
    cancel: CancelToken,
) -> (SessionOutcome, Vec<SessionSnapshot>) {
    let orchestrator = ConnectionOrchestrator::new(adapter, fast_settings());
    let control = SessionControl::new(cancel);
    let (tx, rx) = mpsc::channel();
    let outcome = orchestrator.run_session(server, kind, &control, &tx);
    drop(tx);
    (outcome, rx.try_iter().collect())
}

/// Block until the session reports itself active.
fn wait_for_active(handle: &SessionHandle) {
    loop {
        let snapshot = handle
            .snapshots()
            .recv_timeout(Duration::from_secs(5))
            .expect("session stalled before going active");
        if snapshot.state.phase() == "active" {
            break;
        }
    }
}

/// Phase names in observed order, with consecutive duplicates collapsed.
fn phases(snapshots: &[SessionSnapshot]) -> Vec<&'static str> {
    let mut out: Vec<&'static str> = Vec::new();
    for snapshot in snapshots {
        let phase = snapshot.state.phase();
        if out.last() != Some(&phase) {
            out.push(phase);
        }
    }
    out
}

#[test]
fn test_rdp_session_happy_path() {
    let adapter = MockAdapter::new(MockBehavior::default());
    let (outcome, snapshots) = run(
        Arc::clone(&adapter),
        &server(Some("CORP")),
        ConnectionType::Rdp,
        CancelToken::new(),
    );

    assert_eq!(outcome, SessionOutcome::Completed);
    assert_eq!(
        phases(&snapshots),
        vec![
            "idle",
            "connecting-vpn",
            "probing",
            "launching",
            "active",
            "disconnecting",
            "idle",
        ]
    );

    let calls = adapter.calls();
    assert_eq!(calls[0], "vpn_connect:CORP");
    assert_eq!(calls[1], "probe:192.168.0.99");
    assert_eq!(calls[2], "launch_rdp:192.168.0.99");
    assert!(!calls.iter().any(|c| c.starts_with("launch_ssh")));
    // VPN is hung up exactly once, after the client exits
    assert_eq!(adapter.count("vpn_disconnect"), 1);
    assert_eq!(*calls.last().unwrap(), "vpn_disconnect:CORP");
}

#[test]
fn test_vpn_failure_stops_before_probing() {
    let adapter = MockAdapter::new(MockBehavior {
        vpn_fails: true,
        ..MockBehavior::default()
    });
    let (outcome, snapshots) = run(
        Arc::clone(&adapter),
        &server(Some("CORP")),
        ConnectionType::Rdp,
        CancelToken::new(),
    );

    assert!(matches!(
        outcome,
        SessionOutcome::Failed(SessionError::VpnConnectFailed { .. })
    ));
    assert_eq!(adapter.calls(), vec!["vpn_connect:CORP"]);
    assert_eq!(snapshots.last().unwrap().state.phase(), "failed");
}

#[test]
fn test_vpn_timeout_hangs_up_late_tunnel() {
    let adapter = MockAdapter::new(MockBehavior {
        vpn_delay: Some(Duration::from_millis(1500)),
        ..MockBehavior::default()
    });
    let (outcome, _) = run(
        Arc::clone(&adapter),
        &server(Some("CORP")),
        ConnectionType::Rdp,
        CancelToken::new(),
    );

    match outcome {
        SessionOutcome::Failed(SessionError::VpnConnectFailed { reason }) => {
            assert!(reason.contains("timed out"), "reason: {reason}");
        }
        other => panic!("unexpected outcome: {other:?}"),
    }
    assert_eq!(adapter.count("probe"), 0);

    // The dial completes after the deadline; the late tunnel must still be
    // hung up, and only after it actually came up
    let deadline = Instant::now() + Duration::from_secs(3);
    while adapter.count("vpn_disconnect") == 0 {
        assert!(Instant::now() < deadline, "late tunnel was never hung up");
        thread::sleep(Duration::from_millis(50));
    }

    let calls = adapter.calls();
    let up = calls
        .iter()
        .position(|c| c == "vpn_established:CORP")
        .unwrap();
    let down = calls
        .iter()
        .position(|c| c == "vpn_disconnect:CORP")
        .unwrap();
    assert!(up < down, "hang-up must not race the dial: {calls:?}");
    assert_eq!(adapter.count("vpn_disconnect"), 1);
}

#[test]
fn test_unreachable_host_tears_down_vpn() {
    let adapter = MockAdapter::new(MockBehavior {
        unreachable: true,
        ..MockBehavior::default()
    });
    let (outcome, _) = run(
        Arc::clone(&adapter),
        &server(Some("CORP")),
        ConnectionType::Rdp,
        CancelToken::new(),
    );

    assert_eq!(
        outcome,
        SessionOutcome::Failed(SessionError::HostUnreachable {
            host: "192.168.0.99".to_string(),
            attempts: 2,
        })
    );

    assert_eq!(adapter.count("probe"), 2);
    assert_eq!(adapter.count("launch_rdp"), 0);
    assert_eq!(adapter.count("vpn_disconnect"), 1);
}

#[test]
fn test_probe_retries_until_host_answers() {
    let adapter = MockAdapter::new(MockBehavior {
        reachable_after: 2,
        ..MockBehavior::default()
    });
    let (outcome, snapshots) = run(
        Arc::clone(&adapter),
        &server(None),
        ConnectionType::Ssh,
        CancelToken::new(),
    );

    assert_eq!(outcome, SessionOutcome::Completed);
    assert_eq!(adapter.count("probe"), 2);

    let max_attempt = snapshots
        .iter()
        .filter_map(|s| match s.state {
            tether_core::session::SessionState::ProbingReachability { attempt } => Some(attempt),
            _ => None,
        })
        .max();
    assert_eq!(max_attempt, Some(2));
}

#[test]
fn test_no_vpn_profile_skips_vpn_phase() {
    let adapter = MockAdapter::new(MockBehavior::default());
    let (outcome, snapshots) = run(
        Arc::clone(&adapter),
        &server(None),
        ConnectionType::Ssh,
        CancelToken::new(),
    );

    assert_eq!(outcome, SessionOutcome::Completed);
    assert!(!phases(&snapshots).contains(&"connecting-vpn"));

    let calls = adapter.calls();
    assert!(!calls.iter().any(|c| c.starts_with("vpn_")));
    // SSH-only servers are probed via the host part of the ssh target
    assert_eq!(calls[0], "probe:192.168.0.98");
    assert_eq!(calls[1], "launch_ssh:root@192.168.0.98");
}

#[test]
fn test_both_mode_launches_legs_independently() {
    let adapter = MockAdapter::new(MockBehavior {
        fail_rdp: true,
        ..MockBehavior::default()
    });
    let (outcome, snapshots) = run(
        Arc::clone(&adapter),
        &server(None),
        ConnectionType::Both,
        CancelToken::new(),
    );

    // One failed leg leaves the session running on the other; the monitor
    // falls back to the surviving SSH leg
    assert_eq!(outcome, SessionOutcome::Completed);
    assert_eq!(adapter.count("launch_rdp"), 1);
    assert_eq!(adapter.count("launch_ssh"), 1);

    let active = snapshots
        .iter()
        .find(|s| s.state.phase() == "active")
        .unwrap();
    assert!(matches!(active.rdp, LegStatus::Failed(_)));
    assert_eq!(active.ssh, LegStatus::Active);
}

#[test]
fn test_both_mode_fails_when_both_legs_fail() {
    let adapter = MockAdapter::new(MockBehavior {
        fail_rdp: true,
        fail_ssh: true,
        ..MockBehavior::default()
    });
    let (outcome, _) = run(
        Arc::clone(&adapter),
        &server(None),
        ConnectionType::Both,
        CancelToken::new(),
    );

    assert!(matches!(
        outcome,
        SessionOutcome::Failed(SessionError::ClientLaunchFailed {
            leg: LegKind::Rdp,
            ..
        })
    ));
}

#[test]
fn test_unsupported_connection_type_is_rejected() {
    let adapter = MockAdapter::new(MockBehavior::default());
    let rdp_only = ServerDefinition {
        name: "RdpOnly".to_string(),
        ssh: None,
        rdp: Some("192.168.0.99".to_string()),
        vpn: None,
    };
    let (outcome, _) = run(
        Arc::clone(&adapter),
        &rdp_only,
        ConnectionType::Ssh,
        CancelToken::new(),
    );

    assert!(matches!(
        outcome,
        SessionOutcome::Failed(SessionError::ConfigInvalid(_))
    ));
    assert!(adapter.calls().is_empty());
}

#[test]
fn test_cancelled_token_short_circuits_session() {
    let adapter = MockAdapter::new(MockBehavior::default());
    let cancel = CancelToken::new();
    cancel.cancel();

    let (outcome, _) = run(
        Arc::clone(&adapter),
        &server(Some("CORP")),
        ConnectionType::Rdp,
        cancel,
    );

    assert_eq!(outcome, SessionOutcome::Cancelled);
    assert!(adapter.calls().is_empty());
}

#[test]
fn test_disconnect_intent_ends_active_session() {
    let adapter = MockAdapter::new(MockBehavior {
        client_polls: u32::MAX,
        ..MockBehavior::default()
    });
    let trait_adapter: Arc<dyn PlatformAdapter> = adapter.clone();
    let orchestrator = ConnectionOrchestrator::new(trait_adapter, fast_settings());

    let handle = orchestrator
        .spawn_session(&server(Some("CORP")), ConnectionType::Rdp, CancelToken::new())
        .unwrap();

    wait_for_active(&handle);
    handle.disconnect();

    assert_eq!(handle.wait(), SessionOutcome::Completed);

    let calls = adapter.calls();
    assert!(calls.contains(&"terminate:rdp".to_string()));
    assert_eq!(adapter.count("vpn_disconnect"), 1);
}

#[test]
fn test_cancel_during_active_terminates_clients() {
    let adapter = MockAdapter::new(MockBehavior {
        client_polls: u32::MAX,
        ..MockBehavior::default()
    });
    let trait_adapter: Arc<dyn PlatformAdapter> = adapter.clone();
    let orchestrator = ConnectionOrchestrator::new(trait_adapter, fast_settings());
    let cancel = CancelToken::new();

    let handle = orchestrator
        .spawn_session(&server(None), ConnectionType::Ssh, cancel.clone())
        .unwrap();

    wait_for_active(&handle);
    cancel.cancel();

    assert_eq!(handle.wait(), SessionOutcome::Cancelled);
    assert!(adapter.calls().contains(&"terminate:ssh".to_string()));
}

#[test]
fn test_double_disconnect_hangs_up_once() {
    let adapter = MockAdapter::new(MockBehavior {
        client_polls: u32::MAX,
        ..MockBehavior::default()
    });
    let trait_adapter: Arc<dyn PlatformAdapter> = adapter.clone();
    let orchestrator = ConnectionOrchestrator::new(trait_adapter, fast_settings());

    let handle = orchestrator
        .spawn_session(&server(Some("CORP")), ConnectionType::Rdp, CancelToken::new())
        .unwrap();

    wait_for_active(&handle);
    handle.disconnect();
    handle.disconnect();

    assert_eq!(handle.wait(), SessionOutcome::Completed);
    assert_eq!(adapter.count("vpn_disconnect"), 1);
}

#[test]
fn test_cancel_racing_completion_hangs_up_once() {
    // The client exits on its own after a couple of polls; tripping the
    // token right after activation races cancellation against completion
    let adapter = MockAdapter::new(MockBehavior::default());
    let trait_adapter: Arc<dyn PlatformAdapter> = adapter.clone();
    let orchestrator = ConnectionOrchestrator::new(trait_adapter, fast_settings());
    let cancel = CancelToken::new();

    let handle = orchestrator
        .spawn_session(&server(Some("CORP")), ConnectionType::Rdp, cancel.clone())
        .unwrap();

    wait_for_active(&handle);
    cancel.cancel();

    let outcome = handle.wait();
    assert!(matches!(
        outcome,
        SessionOutcome::Completed | SessionOutcome::Cancelled
    ));
    assert_eq!(adapter.count("vpn_disconnect"), 1);
}
