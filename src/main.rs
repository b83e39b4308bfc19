use anyhow::{Context, Result};
use cq_supervisord::config::{self, SupervisorConfig};
use cq_supervisord::supervisor::{Supervisor, SystemState};
use log::{error, info};
use tokio::signal::unix::{SignalKind, signal};

#[tokio::main]
async fn main() -> Result<()> {
    simple_logger::init_with_level(log::Level::Info)?;
    info!(
        "cq-supervisord starting (version {})",
        env!("CARGO_PKG_VERSION")
    );

    let config_path = config::config_path();
    let config = SupervisorConfig::load(&config_path)
        .with_context(|| format!("loading {}", config_path.display()))?;
    let supervisor = Supervisor::new(config)?;
    let handle = supervisor.handle();

    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;
    tokio::spawn(async move {
        tokio::select! {
            _ = sigterm.recv() => info!("received SIGTERM"),
            _ = sigint.recv() => info!("received SIGINT"),
        }
        handle.stop();
    });

    match supervisor.run().await {
        Ok(SystemState::Stopped) => {
            info!("cq-supervisord shut down cleanly");
            Ok(())
        }
        Ok(state) => {
            error!("cq-supervisord shut down uncleanly ({state})");
            std::process::exit(1);
        }
        Err(err) => {
            error!("terminal failure: {err}");
            std::process::exit(1);
        }
    }
}
