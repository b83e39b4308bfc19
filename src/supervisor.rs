use crate::command::ManagedProcessSpec;
use crate::config::{ProcessKind, SupervisorConfig};
use crate::error::SupervisorError;
use crate::health::{self, HealthChannel};
use crate::process::ManagedProcess;
use crate::restart::RestartBudget;
use crate::state::LifecycleState;
use crate::watchdog::{TransitionRequest, WatchItem, Watchdog};
use log::{debug, error, info, warn};
use std::collections::BTreeMap;
use std::fmt;
use std::process::ExitStatus;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, watch};
use tokio::time::MissedTickBehavior;

/// System-wide state, derived from the per-process lifecycle states on every
/// relevant transition. Never cached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SystemState {
    /// Startup in progress; no failures so far.
    Starting,
    /// Every managed process is operational.
    AllOperational,
    /// At least one process failed but automatic restart is still possible.
    Degraded,
    /// Shutdown in progress.
    Stopping,
    /// Every process stopped cleanly.
    Stopped,
    /// Terminal: a non-restartable process failed, a restart budget ran out,
    /// or shutdown left unclean stragglers.
    Failed,
}

impl fmt::Display for SystemState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SystemState::Starting => write!(f, "starting"),
            SystemState::AllOperational => write!(f, "operational"),
            SystemState::Degraded => write!(f, "degraded"),
            SystemState::Stopping => write!(f, "stopping"),
            SystemState::Stopped => write!(f, "stopped"),
            SystemState::Failed => write!(f, "failed"),
        }
    }
}

/// Pure reduction of per-process states into one system state.
pub fn aggregate(
    states: impl IntoIterator<Item = LifecycleState>,
    terminal_failure: bool,
) -> SystemState {
    let states: Vec<LifecycleState> = states.into_iter().collect();
    if terminal_failure {
        return SystemState::Failed;
    }
    if !states.is_empty() && states.iter().all(|s| *s == LifecycleState::Operational) {
        return SystemState::AllOperational;
    }
    if states.iter().all(|s| s.is_terminal()) {
        return if states.iter().any(|s| *s == LifecycleState::Failed) {
            SystemState::Failed
        } else {
            SystemState::Stopped
        };
    }
    if states
        .iter()
        .any(|s| matches!(s, LifecycleState::Failed | LifecycleState::Restarting))
    {
        return SystemState::Degraded;
    }
    if states
        .iter()
        .any(|s| matches!(s, LifecycleState::Stopping | LifecycleState::Stopped))
    {
        return SystemState::Stopping;
    }
    SystemState::Starting
}

/// Whether an exit observed during a stop counts as clean. Death by our own
/// graceful signal has no exit code and counts as clean; an explicit non-zero
/// code does not, and neither does an exit whose status could not be
/// observed at all.
fn is_clean_exit(result: &std::io::Result<ExitStatus>) -> bool {
    match result {
        Ok(status) => status.code().is_none_or(|c| c == 0),
        Err(_) => false,
    }
}

/// Point-in-time view published to observers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SystemSnapshot {
    pub system: SystemState,
    pub processes: BTreeMap<ProcessKind, LifecycleState>,
}

enum Command {
    Stop,
    Restart(ProcessKind),
}

enum Event {
    Exited {
        kind: ProcessKind,
        /// Spawn generation the exit belongs to. An exit from a replaced
        /// instance must never be charged to its successor.
        generation: u64,
        result: std::io::Result<ExitStatus>,
    },
    Command(Command),
}

/// Mutable supervision record for one process. Owned exclusively by the
/// supervisor's event loop; nothing else writes lifecycle state.
#[derive(Debug)]
struct Managed {
    state: LifecycleState,
    since: Instant,
    handle: Option<ManagedProcess>,
    /// Incremented on every spawn; exit events carry the generation they
    /// were spawned with.
    generation: u64,
    exit_status: Option<ExitStatus>,
    restart_count: u32,
    restart_after_stop: bool,
    last_error: Option<String>,
}

impl Managed {
    fn new() -> Self {
        Self {
            state: LifecycleState::Pending,
            since: Instant::now(),
            handle: None,
            generation: 0,
            exit_status: None,
            restart_count: 0,
            restart_after_stop: false,
            last_error: None,
        }
    }
}

/// Clonable front door to a running supervisor. Start happens when the
/// supervisor's `run` future is driven; stop and restart are requests queued
/// onto the event loop, never direct mutations.
#[derive(Clone)]
pub struct SupervisorHandle {
    events: mpsc::UnboundedSender<Event>,
    snapshot: watch::Receiver<SystemSnapshot>,
}

impl SupervisorHandle {
    /// Request a full shutdown. Idempotent; safe to call while startup is
    /// still in progress.
    pub fn stop(&self) {
        let _ = self.events.send(Event::Command(Command::Stop));
    }

    /// Request a restart of one process. Honored only from `Operational` or
    /// `Failed`.
    pub fn restart(&self, kind: ProcessKind) {
        let _ = self.events.send(Event::Command(Command::Restart(kind)));
    }

    pub fn snapshot(&self) -> SystemSnapshot {
        self.snapshot.borrow().clone()
    }

    pub fn system_state(&self) -> SystemState {
        self.snapshot.borrow().system
    }

    pub fn process_state(&self, kind: ProcessKind) -> Option<LifecycleState> {
        self.snapshot.borrow().processes.get(&kind).copied()
    }

    /// Wait until the published snapshot satisfies `predicate`. Returns the
    /// last snapshot if the supervisor terminates first.
    pub async fn wait_until<F>(&mut self, mut predicate: F) -> SystemSnapshot
    where
        F: FnMut(&SystemSnapshot) -> bool,
    {
        loop {
            {
                let current = self.snapshot.borrow_and_update();
                if predicate(&current) {
                    return current.clone();
                }
            }
            if self.snapshot.changed().await.is_err() {
                return self.snapshot.borrow().clone();
            }
        }
    }
}

/// The orchestrator. Owns every lifecycle state machine and the dependency
/// graph; all transition requests — child exits, watchdog deadlines, operator
/// commands — funnel through its single event loop.
#[derive(Debug)]
pub struct Supervisor {
    specs: BTreeMap<ProcessKind, ManagedProcessSpec>,
    order: Vec<ProcessKind>,
    procs: BTreeMap<ProcessKind, Managed>,
    budgets: BTreeMap<ProcessKind, RestartBudget>,
    channel: HealthChannel,
    watchdog: Watchdog,
    watchdog_interval: Duration,
    global_stop_timeout: Duration,
    events_tx: mpsc::UnboundedSender<Event>,
    events_rx: Option<mpsc::UnboundedReceiver<Event>>,
    snapshot_tx: watch::Sender<SystemSnapshot>,
    shutting_down: bool,
    stop_queue: Vec<ProcessKind>,
    stop_deadline: Option<Instant>,
    terminal_failure: Option<SupervisorError>,
}

impl Supervisor {
    /// Validate configuration and prepare the health channel. Fails before
    /// any process is spawned: dependency cycles, undeclared dependencies and
    /// malformed launch options are all rejected here.
    pub fn new(config: SupervisorConfig) -> Result<Self, SupervisorError> {
        let order = config.start_order()?;

        let mut specs = BTreeMap::new();
        for kind in &order {
            specs.insert(*kind, ManagedProcessSpec::from_config(*kind, &config)?);
        }

        std::fs::create_dir_all(&config.run_dir)?;
        let channel = HealthChannel::create(&health::channel_path(&config.run_dir))?;

        let procs: BTreeMap<ProcessKind, Managed> =
            order.iter().map(|k| (*k, Managed::new())).collect();
        let budgets = order
            .iter()
            .map(|k| (*k, RestartBudget::from_config(&config.restart_budget)))
            .collect();

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (snapshot_tx, _) = watch::channel(SystemSnapshot {
            system: SystemState::Starting,
            processes: procs.iter().map(|(k, m)| (*k, m.state)).collect(),
        });

        Ok(Self {
            specs,
            order,
            procs,
            budgets,
            channel,
            watchdog: Watchdog::new(config.heartbeat_grace()),
            watchdog_interval: config.watchdog_interval(),
            global_stop_timeout: config.global_stop_timeout(),
            events_tx,
            events_rx: Some(events_rx),
            snapshot_tx,
            shutting_down: false,
            stop_queue: Vec::new(),
            stop_deadline: None,
            terminal_failure: None,
        })
    }

    pub fn handle(&self) -> SupervisorHandle {
        SupervisorHandle {
            events: self.events_tx.clone(),
            snapshot: self.snapshot_tx.subscribe(),
        }
    }

    /// Drive the system: start everything in dependency order, then supervise
    /// until shutdown completes. Returns the final system state, or the
    /// terminal failure that forced the shutdown.
    pub async fn run(mut self) -> Result<SystemState, SupervisorError> {
        let mut events = self.events_rx.take().expect("run() called twice");
        info!(
            "starting managed processes in order: {}",
            self.order
                .iter()
                .map(|k| k.to_string())
                .collect::<Vec<_>>()
                .join(", ")
        );
        self.start_eligible();
        self.publish();

        let mut tick = tokio::time::interval(self.watchdog_interval);
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                Some(event) = events.recv() => self.handle_event(event),
                _ = tick.tick() => self.on_tick(),
            }
            self.publish();
            if self.finished() {
                break;
            }
        }

        let final_state = self.reduce();
        info!("supervisor finished ({final_state})");
        match self.terminal_failure.take() {
            Some(err) => Err(err),
            None => Ok(final_state),
        }
    }

    fn handle_event(&mut self, event: Event) {
        match event {
            Event::Exited {
                kind,
                generation,
                result,
            } => self.on_exited(kind, generation, result),
            Event::Command(Command::Stop) => self.initiate_stop(),
            Event::Command(Command::Restart(kind)) => self.on_restart_request(kind),
        }
    }

    /// Apply one lifecycle transition. Rejects anything the state machine
    /// does not allow; states are never skipped.
    fn transition(&mut self, kind: ProcessKind, next: LifecycleState) {
        let managed = self.procs.get_mut(&kind).expect("unknown process");
        if !managed.state.can_transition_to(next) {
            warn!(
                "[{kind}] illegal transition {} -> {next}, ignored",
                managed.state
            );
            return;
        }
        info!("[{kind}] {} -> {next}", managed.state);
        managed.state = next;
        managed.since = Instant::now();
    }

    /// Start every process whose dependencies are all operational. A
    /// dependent is only ever spawned after its dependency's transition to
    /// `Operational` has been applied here, on this same loop.
    fn start_eligible(&mut self) {
        if self.shutting_down {
            return;
        }
        for kind in self.order.clone() {
            let state = self.procs[&kind].state;
            if !matches!(state, LifecycleState::Pending | LifecycleState::Restarting) {
                continue;
            }
            let deps_operational = self.specs[&kind]
                .depends_on
                .iter()
                .all(|dep| self.procs[dep].state == LifecycleState::Operational);
            if deps_operational {
                self.spawn_process(kind);
            }
        }
    }

    fn spawn_process(&mut self, kind: ProcessKind) {
        self.channel.reset_slot(kind);
        self.watchdog.forget(kind);
        let command = self.specs[&kind].command.clone();
        match ManagedProcess::spawn(kind, &command) {
            Ok(mut handle) => {
                let child = handle.take_child();
                let generation = {
                    let managed = self.procs.get_mut(&kind).expect("unknown process");
                    managed.handle = Some(handle);
                    managed.exit_status = None;
                    managed.generation += 1;
                    managed.generation
                };
                self.transition(kind, LifecycleState::Starting);
                if let Some(mut child) = child {
                    let events = self.events_tx.clone();
                    tokio::spawn(async move {
                        let result = child.wait().await;
                        let _ = events.send(Event::Exited {
                            kind,
                            generation,
                            result,
                        });
                    });
                }
            }
            Err(err) => self.handle_failure(kind, err),
        }
    }

    fn on_exited(&mut self, kind: ProcessKind, generation: u64, result: std::io::Result<ExitStatus>) {
        if self.procs[&kind].generation != generation {
            // Exit of an instance that has already been replaced; the
            // current instance is unaffected.
            debug!("[{kind}] ignoring exit of a replaced instance");
            return;
        }
        let (state, restart_after_stop, status_text, clean_exit) = {
            let managed = self.procs.get_mut(&kind).expect("unknown process");
            managed.handle = None;
            let status_text = match &result {
                Ok(status) => {
                    if managed.exit_status.is_none() {
                        managed.exit_status = Some(*status);
                    }
                    info!("[{kind}] exited with {status}");
                    status.to_string()
                }
                Err(e) => {
                    warn!("[{kind}] wait failed: {e}");
                    format!("unknown status ({e})")
                }
            };
            (managed.state, managed.restart_after_stop, status_text, is_clean_exit(&result))
        };

        match state {
            LifecycleState::Stopping if !clean_exit => {
                self.watchdog.forget(kind);
                warn!("[{kind}] unclean stop ({status_text})");
                self.transition(kind, LifecycleState::Failed);
                {
                    let managed = self.procs.get_mut(&kind).expect("unknown process");
                    managed.last_error = Some(format!("unclean stop ({status_text})"));
                    managed.restart_after_stop = false;
                }
                if self.shutting_down {
                    self.advance_stop();
                }
            }
            LifecycleState::Stopping => {
                self.transition(kind, LifecycleState::Stopped);
                self.watchdog.forget(kind);
                if restart_after_stop && !self.shutting_down {
                    self.procs.get_mut(&kind).expect("unknown process").restart_after_stop = false;
                    self.transition(kind, LifecycleState::Restarting);
                    self.start_eligible();
                } else if self.shutting_down {
                    self.advance_stop();
                }
            }
            LifecycleState::Operational => {
                self.watchdog.forget(kind);
                self.handle_failure(
                    kind,
                    SupervisorError::Crash {
                        name: kind,
                        reason: format!("exited unexpectedly while operational ({status_text})"),
                    },
                );
            }
            LifecycleState::Starting => {
                self.handle_failure(
                    kind,
                    SupervisorError::Crash {
                        name: kind,
                        reason: format!("exited before reporting ready ({status_text})"),
                    },
                );
            }
            _ => {
                // Late exit after a forced kill; the state is already terminal.
                if self.shutting_down {
                    self.advance_stop();
                }
            }
        }
    }

    /// Drive one process to `Failed` and decide what happens next: automatic
    /// restart within the budget, or terminal escalation and full shutdown.
    fn handle_failure(&mut self, kind: ProcessKind, err: SupervisorError) {
        let prior = self.procs[&kind].state;
        error!("{err} (state was {prior})");
        self.transition(kind, LifecycleState::Failed);
        {
            let managed = self.procs.get_mut(&kind).expect("unknown process");
            managed.last_error = Some(err.to_string());
            managed.restart_after_stop = false;
        }

        if self.shutting_down {
            self.advance_stop();
            return;
        }

        if self.specs[&kind].restart {
            let budget = self.budgets.get_mut(&kind).expect("unknown process");
            if budget.try_consume(Instant::now()) {
                let managed = self.procs.get_mut(&kind).expect("unknown process");
                managed.restart_count += 1;
                warn!("[{kind}] automatic restart #{}", managed.restart_count);
                self.transition(kind, LifecycleState::Restarting);
                self.start_eligible();
                return;
            }
            let (max, window) = (budget.max_restarts(), budget.window());
            self.fail_system(SupervisorError::RestartBudgetExhausted {
                name: kind,
                max,
                window,
            });
        } else {
            self.fail_system(err);
        }
    }

    fn fail_system(&mut self, err: SupervisorError) {
        error!("terminal failure: {err}; stopping all processes");
        if self.terminal_failure.is_none() {
            self.terminal_failure = Some(err);
        }
        self.initiate_stop();
    }

    /// Begin full shutdown. Idempotent: a second call while a stop is in
    /// flight changes nothing.
    fn initiate_stop(&mut self) {
        if self.shutting_down {
            debug!("stop already in progress");
            return;
        }
        info!("stopping all processes in reverse dependency order");
        self.shutting_down = true;
        self.stop_deadline = Some(Instant::now() + self.global_stop_timeout);
        self.stop_queue = self.order.iter().rev().copied().collect();
        self.advance_stop();
    }

    /// Walk the reverse-order stop queue. A dependency is only asked to stop
    /// once every process depending on it has fully drained; an in-flight
    /// `Starting` process is left to finish starting and is stopped when it
    /// reaches the head of the queue.
    fn advance_stop(&mut self) {
        if !self.shutting_down {
            return;
        }
        while let Some(&kind) = self.stop_queue.first() {
            match self.procs[&kind].state {
                LifecycleState::Operational => {
                    self.request_stop_process(kind);
                    break;
                }
                LifecycleState::Starting | LifecycleState::Stopping => break,
                LifecycleState::Pending | LifecycleState::Restarting => {
                    self.transition(kind, LifecycleState::Stopped);
                    self.stop_queue.remove(0);
                }
                LifecycleState::Stopped | LifecycleState::Failed => {
                    self.stop_queue.remove(0);
                }
            }
        }
    }

    /// Ask one operational process to stop: stop-request flag on the health
    /// channel first, then a graceful signal, then the shutdown timer.
    fn request_stop_process(&mut self, kind: ProcessKind) {
        self.channel.request_stop(kind);
        if let Some(handle) = &self.procs[&kind].handle {
            handle.terminate(true);
        }
        self.transition(kind, LifecycleState::Stopping);
    }

    fn on_restart_request(&mut self, kind: ProcessKind) {
        if self.shutting_down {
            warn!("[{kind}] restart ignored during shutdown");
            return;
        }
        match self.procs[&kind].state {
            LifecycleState::Operational => {
                info!("[{kind}] restart requested");
                self.procs.get_mut(&kind).expect("unknown process").restart_after_stop = true;
                self.request_stop_process(kind);
            }
            LifecycleState::Failed => {
                info!("[{kind}] restart requested");
                self.transition(kind, LifecycleState::Restarting);
                self.start_eligible();
            }
            other => warn!("[{kind}] restart ignored in state {other}"),
        }
    }

    fn on_tick(&mut self) {
        let now = Instant::now();
        let items: Vec<WatchItem> = self
            .order
            .iter()
            .map(|kind| {
                let managed = &self.procs[kind];
                let spec = &self.specs[kind];
                WatchItem {
                    kind: *kind,
                    state: managed.state,
                    since: managed.since,
                    startup_timeout: spec.startup_timeout,
                    stop_timeout: spec.stop_timeout,
                }
            })
            .collect();
        for request in self.watchdog.scan(&items, &self.channel, now) {
            self.apply_request(request);
        }
        if self.shutting_down {
            if let Some(deadline) = self.stop_deadline
                && now >= deadline
                && !self.procs.values().all(|m| m.state.is_terminal())
            {
                self.force_stop_all();
            }
            self.advance_stop();
        }
    }

    /// Apply a watchdog request, re-checking the state it was computed
    /// against; a stale request is dropped.
    fn apply_request(&mut self, request: TransitionRequest) {
        match request {
            TransitionRequest::MarkOperational(kind) => {
                if self.procs[&kind].state != LifecycleState::Starting {
                    return;
                }
                self.transition(kind, LifecycleState::Operational);
                if self.shutting_down {
                    self.advance_stop();
                } else {
                    self.start_eligible();
                }
            }
            TransitionRequest::StartupTimedOut(kind) => {
                if self.procs[&kind].state != LifecycleState::Starting {
                    return;
                }
                if let Some(handle) = &self.procs[&kind].handle {
                    handle.terminate(false);
                }
                let timeout = self.specs[&kind].startup_timeout;
                self.handle_failure(kind, SupervisorError::StartupTimeout { name: kind, timeout });
            }
            TransitionRequest::ShutdownTimedOut(kind) => {
                if self.procs[&kind].state != LifecycleState::Stopping {
                    return;
                }
                if let Some(handle) = &self.procs[&kind].handle {
                    handle.terminate(false);
                }
                let timeout = self.specs[&kind].stop_timeout;
                self.handle_failure(kind, SupervisorError::ShutdownTimeout { name: kind, timeout });
            }
            TransitionRequest::HeartbeatStalled(kind, beat) => {
                if self.procs[&kind].state != LifecycleState::Operational {
                    return;
                }
                if let Some(handle) = &self.procs[&kind].handle {
                    handle.terminate(false);
                }
                self.watchdog.forget(kind);
                self.handle_failure(
                    kind,
                    SupervisorError::Crash {
                        name: kind,
                        reason: format!("heartbeat stalled at {beat}"),
                    },
                );
            }
        }
    }

    /// Global deadline expired: kill everything still alive and record the
    /// stragglers as unclean.
    fn force_stop_all(&mut self) {
        warn!(
            "global shutdown deadline ({}s) reached, forcing termination",
            self.global_stop_timeout.as_secs()
        );
        self.stop_deadline = None;
        for kind in self.order.clone().into_iter().rev() {
            match self.procs[&kind].state {
                LifecycleState::Starting
                | LifecycleState::Operational
                | LifecycleState::Stopping => {
                    if let Some(handle) = &self.procs[&kind].handle {
                        handle.terminate(false);
                    }
                    // Unclean stop is recorded as Failed, never Stopped.
                    if self.procs[&kind].state == LifecycleState::Operational {
                        self.transition(kind, LifecycleState::Stopping);
                    }
                    self.transition(kind, LifecycleState::Failed);
                }
                LifecycleState::Pending | LifecycleState::Restarting => {
                    self.transition(kind, LifecycleState::Stopped);
                }
                _ => {}
            }
        }
        self.stop_queue.clear();
    }

    fn reduce(&self) -> SystemState {
        aggregate(
            self.procs.values().map(|m| m.state),
            self.terminal_failure.is_some(),
        )
    }

    fn publish(&mut self) {
        let snapshot = SystemSnapshot {
            system: self.reduce(),
            processes: self.procs.iter().map(|(k, m)| (*k, m.state)).collect(),
        };
        self.snapshot_tx.send_if_modified(|current| {
            if *current == snapshot {
                return false;
            }
            if current.system != snapshot.system {
                info!("system state: {} -> {}", current.system, snapshot.system);
            }
            *current = snapshot;
            true
        });
    }

    fn finished(&self) -> bool {
        self.shutting_down && self.procs.values().all(|m| m.state.is_terminal())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use LifecycleState::*;

    #[test]
    fn test_aggregate_all_operational() {
        assert_eq!(
            aggregate([Operational, Operational, Operational], false),
            SystemState::AllOperational
        );
    }

    #[test]
    fn test_aggregate_starting_mix() {
        assert_eq!(
            aggregate([Operational, Starting, Pending], false),
            SystemState::Starting
        );
    }

    #[test]
    fn test_aggregate_degraded_while_restart_possible() {
        assert_eq!(
            aggregate([Operational, Failed, Operational], false),
            SystemState::Degraded
        );
        assert_eq!(
            aggregate([Operational, Restarting, Operational], false),
            SystemState::Degraded
        );
    }

    #[test]
    fn test_aggregate_terminal_failure_wins() {
        assert_eq!(
            aggregate([Operational, Operational, Operational], true),
            SystemState::Failed
        );
    }

    #[test]
    fn test_aggregate_all_stopped() {
        assert_eq!(
            aggregate([Stopped, Stopped, Stopped], false),
            SystemState::Stopped
        );
    }

    #[test]
    fn test_aggregate_unclean_shutdown_is_failed() {
        assert_eq!(
            aggregate([Stopped, Failed, Stopped], false),
            SystemState::Failed
        );
    }

    #[test]
    fn test_aggregate_mid_shutdown() {
        assert_eq!(
            aggregate([Operational, Stopping, Stopped], false),
            SystemState::Stopping
        );
    }

    #[test]
    fn test_clean_exit_classification() {
        use std::os::unix::process::ExitStatusExt;

        // Exit code 0.
        assert!(is_clean_exit(&Ok(ExitStatus::from_raw(0))));
        // Killed by a signal (no exit code): normal outcome of our SIGTERM.
        assert!(is_clean_exit(&Ok(ExitStatus::from_raw(15))));
        // Explicit non-zero exit code.
        assert!(!is_clean_exit(&Ok(ExitStatus::from_raw(1 << 8))));
        // Status could not be observed: never silently count it as clean.
        assert!(!is_clean_exit(&Err(std::io::Error::other("wait failed"))));
    }

    #[test]
    fn test_new_rejects_cycle_before_spawning() {
        let yaml = concat!(
            "processes:\n",
            "  search:\n    command: /bin/sleep\n    depends_on: [web]\n",
            "  web:\n    command: /bin/sleep\n    depends_on: [search]\n",
        );
        let config: SupervisorConfig = serde_yaml::from_str(yaml).unwrap();
        let err = Supervisor::new(config).unwrap_err();
        assert!(matches!(err, SupervisorError::Configuration(_)));
    }

    #[test]
    fn test_new_rejects_bad_heap_before_spawning() {
        let dir = tempfile::tempdir().unwrap();
        let yaml = format!(
            "run_dir: {}\nprocesses:\n  web:\n    command: /bin/sleep\n    heap: notasize\n",
            dir.path().display()
        );
        let config: SupervisorConfig = serde_yaml::from_str(&yaml).unwrap();
        let err = Supervisor::new(config).unwrap_err();
        assert!(matches!(err, SupervisorError::Configuration(_)));
    }
}
