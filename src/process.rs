use crate::command::LaunchCommand;
use crate::config::ProcessKind;
use crate::error::SupervisorError;
use log::{info, warn};
use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;
use std::process::Stdio;
use tokio::process::{Child, Command};

/// Handle to one spawned OS process. Immutable after spawn except for its
/// exit status, which the supervisor records exactly once.
#[derive(Debug)]
pub struct ManagedProcess {
    pub kind: ProcessKind,
    pid: Option<u32>,
    child: Option<Child>,
}

impl ManagedProcess {
    /// Spawn the process described by `command`. The child gets exactly the
    /// configured environment, nothing inherited from the supervisor.
    pub fn spawn(kind: ProcessKind, command: &LaunchCommand) -> Result<Self, SupervisorError> {
        let mut cmd = Command::new(&command.program);
        cmd.args(&command.args);
        cmd.env_clear();
        cmd.envs(&command.env);
        if let Some(ref dir) = command.working_dir {
            cmd.current_dir(dir);
        }
        cmd.stdout(stdio_from_str(&command.stdout));
        cmd.stderr(stdio_from_str(&command.stderr));

        let child = cmd
            .spawn()
            .map_err(|source| SupervisorError::Spawn { name: kind, source })?;

        let pid = child.id();
        info!(
            "[{kind}] spawned (pid={}, cmd={})",
            pid.unwrap_or(0),
            command.program.display()
        );
        Ok(Self {
            kind,
            pid,
            child: Some(child),
        })
    }

    /// Move the child out so a dedicated task can block on its exit. The
    /// handle keeps the PID for signalling.
    pub fn take_child(&mut self) -> Option<Child> {
        self.child.take()
    }

    /// SIGTERM when graceful, SIGKILL otherwise.
    pub fn terminate(&self, graceful: bool) {
        let sig = if graceful {
            Signal::SIGTERM
        } else {
            Signal::SIGKILL
        };
        self.send_signal(sig);
    }

    pub fn send_signal(&self, sig: Signal) {
        if let Some(pid) = self.pid
            && let Err(e) = signal::kill(Pid::from_raw(pid as i32), sig)
        {
            warn!("[{}] failed to send {sig}: {e}", self.kind);
        }
    }
}

fn stdio_from_str(s: &str) -> Stdio {
    match s {
        "null" => Stdio::null(),
        _ => Stdio::inherit(),
    }
}
