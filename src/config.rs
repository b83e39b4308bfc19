use crate::error::SupervisorError;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

const DEFAULT_CONFIG_PATH: &str = "/etc/cq/supervisor.yaml";

/// The closed set of processes this supervisor manages. Adding a kind is a
/// compile-time change, never a configuration one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessKind {
    Search,
    Web,
    Compute,
}

impl ProcessKind {
    pub const ALL: [ProcessKind; 3] = [ProcessKind::Search, ProcessKind::Web, ProcessKind::Compute];

    /// Fixed health-channel slot index; part of the channel layout contract.
    pub fn slot(self) -> usize {
        match self {
            ProcessKind::Search => 0,
            ProcessKind::Web => 1,
            ProcessKind::Compute => 2,
        }
    }
}

impl fmt::Display for ProcessKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProcessKind::Search => write!(f, "search"),
            ProcessKind::Web => write!(f, "web"),
            ProcessKind::Compute => write!(f, "compute"),
        }
    }
}

fn default_inherit() -> String {
    "inherit".to_string()
}

fn default_startup_timeout_secs() -> u64 {
    120
}

fn default_stop_timeout_secs() -> u64 {
    30
}

/// Launch parameters for one managed process.
#[derive(Debug, Clone, Deserialize)]
pub struct ProcessConfig {
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub env: BTreeMap<String, String>,
    pub working_dir: Option<String>,
    /// JVM heap size, e.g. "512m" or "2g". Presence marks the child as a JVM
    /// process and enables the per-kind mandatory JVM options.
    pub heap: Option<String>,
    #[serde(default)]
    pub java_opts: Vec<String>,
    #[serde(default = "default_startup_timeout_secs")]
    pub startup_timeout_secs: u64,
    #[serde(default = "default_stop_timeout_secs")]
    pub stop_timeout_secs: u64,
    /// Whether this process may be restarted automatically after a failure.
    #[serde(default)]
    pub restart: bool,
    #[serde(default)]
    pub depends_on: Vec<ProcessKind>,
    #[serde(default = "default_inherit")]
    pub stdout: String,
    #[serde(default = "default_inherit")]
    pub stderr: String,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct RestartBudgetConfig {
    pub max_restarts: u32,
    pub window_secs: u64,
}

impl Default for RestartBudgetConfig {
    fn default() -> Self {
        // Few restarts per minute; anything noisier is a restart storm.
        Self {
            max_restarts: 2,
            window_secs: 60,
        }
    }
}

fn default_run_dir() -> PathBuf {
    PathBuf::from("/var/run/cq")
}

fn default_watchdog_interval_ms() -> u64 {
    500
}

fn default_heartbeat_grace_secs() -> u64 {
    3
}

fn default_global_stop_timeout_secs() -> u64 {
    90
}

#[derive(Debug, Clone, Deserialize)]
pub struct SupervisorConfig {
    #[serde(default = "default_run_dir")]
    pub run_dir: PathBuf,
    #[serde(default = "default_watchdog_interval_ms")]
    pub watchdog_interval_ms: u64,
    #[serde(default = "default_heartbeat_grace_secs")]
    pub heartbeat_grace_secs: u64,
    #[serde(default = "default_global_stop_timeout_secs")]
    pub global_stop_timeout_secs: u64,
    #[serde(default)]
    pub restart_budget: RestartBudgetConfig,
    pub processes: BTreeMap<ProcessKind, ProcessConfig>,
}

impl SupervisorConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        let config: SupervisorConfig =
            serde_yaml::from_str(&contents).with_context(|| format!("parsing {}", path.display()))?;
        config.start_order()?;
        Ok(config)
    }

    pub fn watchdog_interval(&self) -> Duration {
        Duration::from_millis(self.watchdog_interval_ms)
    }

    pub fn heartbeat_grace(&self) -> Duration {
        Duration::from_secs(self.heartbeat_grace_secs)
    }

    pub fn global_stop_timeout(&self) -> Duration {
        Duration::from_secs(self.global_stop_timeout_secs)
    }

    /// Topological start order over `depends_on`. Fails on an undeclared
    /// dependency or a cycle, before anything is spawned.
    pub fn start_order(&self) -> Result<Vec<ProcessKind>, SupervisorError> {
        if self.processes.is_empty() {
            return Err(SupervisorError::Configuration(
                "no processes configured".to_string(),
            ));
        }

        for (kind, proc) in &self.processes {
            for dep in &proc.depends_on {
                if *dep == *kind {
                    return Err(SupervisorError::Configuration(format!(
                        "{kind} depends on itself"
                    )));
                }
                if !self.processes.contains_key(dep) {
                    return Err(SupervisorError::Configuration(format!(
                        "{kind} depends on undeclared process {dep}"
                    )));
                }
            }
        }

        // Kahn's algorithm, iterating in the fixed kind order for determinism.
        let declared: Vec<ProcessKind> = ProcessKind::ALL
            .into_iter()
            .filter(|k| self.processes.contains_key(k))
            .collect();
        let mut in_degree: BTreeMap<ProcessKind, usize> = declared
            .iter()
            .map(|k| (*k, self.processes[k].depends_on.len()))
            .collect();

        let mut order = Vec::with_capacity(declared.len());
        while order.len() < declared.len() {
            let next = declared
                .iter()
                .find(|k| in_degree.get(k) == Some(&0))
                .copied();
            let Some(kind) = next else {
                let stuck: Vec<String> = in_degree
                    .iter()
                    .filter(|(_, d)| **d > 0)
                    .map(|(k, _)| k.to_string())
                    .collect();
                return Err(SupervisorError::Configuration(format!(
                    "dependency cycle among: {}",
                    stuck.join(", ")
                )));
            };
            in_degree.remove(&kind);
            order.push(kind);
            for (k, proc) in &self.processes {
                if proc.depends_on.contains(&kind)
                    && let Some(d) = in_degree.get_mut(k)
                {
                    *d -= 1;
                }
            }
        }
        Ok(order)
    }
}

pub fn config_path() -> PathBuf {
    std::env::var("CQ_SUPERVISOR_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH))
}
