use crate::config::ProcessKind;
use crate::health::HealthChannel;
use crate::state::LifecycleState;
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Transition the watchdog asks the orchestrator to apply. The watchdog never
/// mutates lifecycle state itself; the orchestrator's event loop stays the
/// single writer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionRequest {
    /// A `Starting` process published its ready flag in time.
    MarkOperational(ProcessKind),
    /// A `Starting` process missed its startup deadline.
    StartupTimedOut(ProcessKind),
    /// A `Stopping` process missed its shutdown deadline.
    ShutdownTimedOut(ProcessKind),
    /// An `Operational` process stopped advancing its heartbeat. Treated
    /// exactly like a crash.
    HeartbeatStalled(ProcessKind, u64),
}

/// Per-process view the orchestrator hands to each scan.
#[derive(Debug, Clone, Copy)]
pub struct WatchItem {
    pub kind: ProcessKind,
    pub state: LifecycleState,
    /// When the process entered its current state.
    pub since: Instant,
    pub startup_timeout: Duration,
    pub stop_timeout: Duration,
}

#[derive(Debug)]
pub struct Watchdog {
    heartbeat_grace: Duration,
    /// Last heartbeat value seen per process, and when it last changed.
    last_beats: HashMap<ProcessKind, (u64, Instant)>,
}

impl Watchdog {
    pub fn new(heartbeat_grace: Duration) -> Self {
        Self {
            heartbeat_grace,
            last_beats: HashMap::new(),
        }
    }

    /// One poll over all managed processes. Readiness is checked before the
    /// startup deadline so a report that lands on the same tick wins.
    pub fn scan(
        &mut self,
        items: &[WatchItem],
        channel: &HealthChannel,
        now: Instant,
    ) -> Vec<TransitionRequest> {
        let mut requests = Vec::new();
        for item in items {
            match item.state {
                LifecycleState::Starting => {
                    if channel.is_ready(item.kind) {
                        requests.push(TransitionRequest::MarkOperational(item.kind));
                    } else if now.duration_since(item.since) > item.startup_timeout {
                        requests.push(TransitionRequest::StartupTimedOut(item.kind));
                    }
                }
                LifecycleState::Stopping => {
                    if now.duration_since(item.since) > item.stop_timeout {
                        requests.push(TransitionRequest::ShutdownTimedOut(item.kind));
                    }
                }
                LifecycleState::Operational => {
                    let beat = channel.heartbeat(item.kind);
                    match self.last_beats.get(&item.kind) {
                        Some(&(seen, at)) if seen == beat => {
                            if now.duration_since(at) > self.heartbeat_grace {
                                requests.push(TransitionRequest::HeartbeatStalled(item.kind, beat));
                            }
                        }
                        _ => {
                            self.last_beats.insert(item.kind, (beat, now));
                        }
                    }
                }
                _ => {}
            }
        }
        requests
    }

    /// Forget heartbeat history, e.g. before a respawn.
    pub fn forget(&mut self, kind: ProcessKind) {
        self.last_beats.remove(&kind);
    }
}
