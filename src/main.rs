//! Main entry point for the supervisor binary
//!
//! Wires the real services (process launcher, HTTP probe) into the
//! supervisor, forwards its events to the log, and shuts down cleanly on
//! ctrl-c. Also hosts the one-shot admin mode, which shares the launch
//! primitive but never starts a health loop.

use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use tokio::sync::broadcast::error::RecvError;

use supervisor::services::{AdminTask, HttpHealthProbe, RealBackendLauncher};
use supervisor::{logging, BackendPaths, Supervisor, SupervisorConfig, SupervisorEvent};

/// Supervises a local backend server: launch, health monitoring, restart
#[derive(Parser)]
#[command(name = "supervisor")]
#[command(about = "Launches and supervises the local backend server")]
struct Args {
    /// Settings file (JSON); flags below override individual values
    #[arg(long)]
    config: Option<PathBuf>,

    /// Runtime executable used to run the server archive
    #[arg(long)]
    runtime: Option<PathBuf>,

    /// Server archive handed to the runtime
    #[arg(long)]
    archive: Option<PathBuf>,

    /// Persistent data file the server opens on boot
    #[arg(long)]
    data_file: Option<PathBuf>,

    /// Directory the server scans for plugins
    #[arg(long)]
    plugins_dir: Option<PathBuf>,

    /// Preferred port; an ephemeral port is used when it is taken
    #[arg(long)]
    port: Option<u16>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,

    /// One-shot mode: reset the password for this account and print the
    /// reset token, then exit
    #[arg(long)]
    reset_password: Option<String>,
}

fn build_config(args: &Args) -> anyhow::Result<SupervisorConfig> {
    let mut config = match &args.config {
        Some(path) => SupervisorConfig::from_file(path)
            .with_context(|| format!("reading settings file {}", path.display()))?,
        None => {
            let paths = BackendPaths {
                runtime: args
                    .runtime
                    .clone()
                    .context("--runtime is required without --config")?,
                archive: args
                    .archive
                    .clone()
                    .context("--archive is required without --config")?,
                data_file: args
                    .data_file
                    .clone()
                    .context("--data-file is required without --config")?,
                plugins_dir: args
                    .plugins_dir
                    .clone()
                    .context("--plugins-dir is required without --config")?,
            };
            SupervisorConfig::with_paths(paths)
        }
    };

    // CLI flags win over the settings file
    if let Some(runtime) = &args.runtime {
        config.paths.runtime = runtime.clone();
    }
    if let Some(archive) = &args.archive {
        config.paths.archive = archive.clone();
    }
    if let Some(data_file) = &args.data_file {
        config.paths.data_file = data_file.clone();
    }
    if let Some(plugins_dir) = &args.plugins_dir {
        config.paths.plugins_dir = plugins_dir.clone();
    }
    if let Some(port) = args.port {
        config.preferred_port = port;
    }

    config.validate()?;
    Ok(config)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    logging::init_tracing(Some(&args.log_level));

    let config = build_config(&args)?;

    if let Some(email) = &args.reset_password {
        let task = AdminTask::new(config.paths.clone());
        let token = task.reset_password(email).await?;
        println!("{token}");
        return Ok(());
    }

    let probe = HttpHealthProbe::new(&config.health_path, config.monitor.probe_timeout())?;
    let launcher = RealBackendLauncher::new(&config);
    let supervisor = Supervisor::new(config, launcher, probe);

    let mut events = supervisor.subscribe();
    supervisor.start().await?;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("ctrl-c received; shutting down");
                break;
            }
            event = events.recv() => match event {
                Ok(SupervisorEvent::PersistentFailure { attempts }) => {
                    tracing::error!(attempts, "backend could not be kept alive; shutting down");
                    break;
                }
                Ok(event) => tracing::debug!(?event, "supervisor event"),
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "event observer lagged");
                }
                Err(RecvError::Closed) => break,
            }
        }
    }

    supervisor.stop().await;
    Ok(())
}
