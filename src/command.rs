use crate::config::{ProcessKind, SupervisorConfig};
use crate::error::SupervisorError;
use crate::health;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

/// Concrete OS-level invocation for one managed process. Built once per
/// (re)start from configuration; identical configuration always yields an
/// identical command, which is what makes restarts idempotent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchCommand {
    pub program: PathBuf,
    pub args: Vec<String>,
    pub env: BTreeMap<String, String>,
    pub working_dir: Option<PathBuf>,
    pub stdout: String,
    pub stderr: String,
}

/// Immutable description of one managed process: the launch command plus the
/// ordering and supervision parameters the orchestrator needs.
#[derive(Debug, Clone)]
pub struct ManagedProcessSpec {
    pub kind: ProcessKind,
    pub depends_on: Vec<ProcessKind>,
    pub command: LaunchCommand,
    pub startup_timeout: Duration,
    pub stop_timeout: Duration,
    pub restart: bool,
}

impl ManagedProcessSpec {
    pub fn from_config(
        kind: ProcessKind,
        config: &SupervisorConfig,
    ) -> Result<Self, SupervisorError> {
        let proc = config.processes.get(&kind).ok_or_else(|| {
            SupervisorError::Configuration(format!("no configuration for process {kind}"))
        })?;
        Ok(Self {
            kind,
            depends_on: proc.depends_on.clone(),
            command: build(kind, config)?,
            startup_timeout: Duration::from_secs(proc.startup_timeout_secs),
            stop_timeout: Duration::from_secs(proc.stop_timeout_secs),
            restart: proc.restart,
        })
    }
}

/// Build the launch command for `kind`. Pure: reads configuration only, no
/// filesystem access, deterministic argument order.
pub fn build(kind: ProcessKind, config: &SupervisorConfig) -> Result<LaunchCommand, SupervisorError> {
    let proc = config.processes.get(&kind).ok_or_else(|| {
        SupervisorError::Configuration(format!("no configuration for process {kind}"))
    })?;
    if proc.command.is_empty() {
        return Err(SupervisorError::Configuration(format!(
            "{kind}: command must not be empty"
        )));
    }

    let mut args = Vec::new();
    // JVM argument synthesis applies only to children configured as JVM
    // processes (heap or java_opts present).
    if proc.heap.is_some() || !proc.java_opts.is_empty() {
        args.extend(mandatory_java_opts(kind, config));
        if let Some(ref heap) = proc.heap {
            let heap = parse_heap(kind, heap)?;
            args.push(format!("-Xms{heap}"));
            args.push(format!("-Xmx{heap}"));
        }
        args.extend(proc.java_opts.iter().cloned());
    }
    args.extend(proc.args.iter().cloned());

    let mut env = proc.env.clone();
    env.insert(
        health::HEALTH_FILE_ENV.to_string(),
        health::channel_path(&config.run_dir).display().to_string(),
    );
    env.insert(health::HEALTH_SLOT_ENV.to_string(), kind.slot().to_string());

    Ok(LaunchCommand {
        program: PathBuf::from(&proc.command),
        args,
        env,
        working_dir: proc.working_dir.as_ref().map(PathBuf::from),
        stdout: proc.stdout.clone(),
        stderr: proc.stderr.clone(),
    })
}

/// Mandatory JVM options per kind, in fixed order. The search engine gets the
/// options its bundled distribution expects; web and compute share a minimal
/// headless set.
fn mandatory_java_opts(kind: ProcessKind, config: &SupervisorConfig) -> Vec<String> {
    match kind {
        ProcessKind::Search => vec![
            "-XX:+UseG1GC".to_string(),
            format!("-Djava.io.tmpdir={}", config.run_dir.join("tmp").display()),
            "-XX:-OmitStackTraceInFastThrow".to_string(),
            "-Djava.awt.headless=true".to_string(),
            "-Dfile.encoding=UTF-8".to_string(),
        ],
        ProcessKind::Web | ProcessKind::Compute => vec![
            "-Djava.awt.headless=true".to_string(),
            "-Dfile.encoding=UTF-8".to_string(),
        ],
    }
}

/// Validate a heap size such as "512m" or "2g": digits plus an optional
/// single k/m/g suffix.
fn parse_heap(kind: ProcessKind, raw: &str) -> Result<String, SupervisorError> {
    let bad = || {
        SupervisorError::Configuration(format!(
            "{kind}: invalid heap size '{raw}' (expected e.g. 512m or 2g)"
        ))
    };
    let digits = raw.trim_end_matches(['k', 'K', 'm', 'M', 'g', 'G']);
    if digits.is_empty() || raw.len() - digits.len() > 1 {
        return Err(bad());
    }
    if !digits.chars().all(|c| c.is_ascii_digit()) {
        return Err(bad());
    }
    Ok(raw.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ProcessConfig, RestartBudgetConfig};

    fn config_with(processes: Vec<(ProcessKind, ProcessConfig)>) -> SupervisorConfig {
        SupervisorConfig {
            run_dir: PathBuf::from("/var/run/cq"),
            watchdog_interval_ms: 500,
            heartbeat_grace_secs: 3,
            global_stop_timeout_secs: 90,
            restart_budget: RestartBudgetConfig::default(),
            processes: processes.into_iter().collect(),
        }
    }

    fn plain(command: &str) -> ProcessConfig {
        crate::config::tests::process(command, vec![])
    }

    #[test]
    fn test_build_is_deterministic() {
        let mut cfg = plain("/opt/cq/search/bin/search-server");
        cfg.heap = Some("512m".to_string());
        cfg.java_opts = vec!["-Des.enforce.bootstrap.checks=true".to_string()];
        let config = config_with(vec![(ProcessKind::Search, cfg)]);

        let a = build(ProcessKind::Search, &config).unwrap();
        let b = build(ProcessKind::Search, &config).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_jvm_argument_order() {
        let mut cfg = plain("/opt/cq/search/bin/search-server");
        cfg.heap = Some("512m".to_string());
        cfg.java_opts = vec!["-Dextra=1".to_string()];
        cfg.args = vec!["--cluster-name".to_string(), "cq".to_string()];
        let config = config_with(vec![(ProcessKind::Search, cfg)]);

        let cmd = build(ProcessKind::Search, &config).unwrap();
        // Mandatory options first, then heap, then extra opts, then user args.
        assert_eq!(cmd.args[0], "-XX:+UseG1GC");
        let xms = cmd.args.iter().position(|a| a == "-Xms512m").unwrap();
        let xmx = cmd.args.iter().position(|a| a == "-Xmx512m").unwrap();
        let extra = cmd.args.iter().position(|a| a == "-Dextra=1").unwrap();
        let user = cmd.args.iter().position(|a| a == "--cluster-name").unwrap();
        assert!(xms < xmx && xmx < extra && extra < user);
        assert_eq!(cmd.args.last().unwrap(), "cq");
    }

    #[test]
    fn test_non_jvm_child_gets_no_jvm_args() {
        let config = config_with(vec![(ProcessKind::Web, plain("/bin/sleep"))]);
        let cmd = build(ProcessKind::Web, &config).unwrap();
        assert!(cmd.args.iter().all(|a| !a.starts_with("-X") && !a.starts_with("-D")));
    }

    #[test]
    fn test_invalid_heap_rejected() {
        for bad in ["abc", "12q", "m", "", "512mm"] {
            let mut cfg = plain("/bin/true");
            cfg.heap = Some(bad.to_string());
            let config = config_with(vec![(ProcessKind::Web, cfg)]);
            let err = build(ProcessKind::Web, &config).unwrap_err();
            assert!(
                err.to_string().contains("invalid heap size"),
                "expected heap error for {bad:?}, got: {err}"
            );
        }
    }

    #[test]
    fn test_valid_heap_sizes() {
        for good in ["512m", "2g", "1024K", "777"] {
            let mut cfg = plain("/bin/true");
            cfg.heap = Some(good.to_string());
            let config = config_with(vec![(ProcessKind::Compute, cfg)]);
            build(ProcessKind::Compute, &config).unwrap();
        }
    }

    #[test]
    fn test_health_env_injected() {
        let config = config_with(vec![(ProcessKind::Compute, plain("/bin/true"))]);
        let cmd = build(ProcessKind::Compute, &config).unwrap();
        assert!(
            cmd.env[health::HEALTH_FILE_ENV].ends_with(health::CHANNEL_FILE_NAME),
            "health file env should point into the run dir"
        );
        assert_eq!(cmd.env[health::HEALTH_SLOT_ENV], "2");
    }

    #[test]
    fn test_missing_process_is_configuration_error() {
        let config = config_with(vec![(ProcessKind::Web, plain("/bin/true"))]);
        let err = build(ProcessKind::Search, &config).unwrap_err();
        assert!(matches!(err, SupervisorError::Configuration(_)));
    }

    #[test]
    fn test_empty_command_rejected() {
        let config = config_with(vec![(ProcessKind::Web, plain(""))]);
        assert!(build(ProcessKind::Web, &config).is_err());
    }

    #[test]
    fn test_spec_from_config() {
        let mut cfg = plain("/bin/sleep");
        cfg.restart = true;
        cfg.startup_timeout_secs = 7;
        cfg.depends_on = vec![ProcessKind::Search];
        let config = config_with(vec![
            (ProcessKind::Search, plain("/bin/sleep")),
            (ProcessKind::Web, cfg),
        ]);

        let spec = ManagedProcessSpec::from_config(ProcessKind::Web, &config).unwrap();
        assert_eq!(spec.kind, ProcessKind::Web);
        assert_eq!(spec.depends_on, vec![ProcessKind::Search]);
        assert_eq!(spec.startup_timeout, Duration::from_secs(7));
        assert!(spec.restart);
    }
}
