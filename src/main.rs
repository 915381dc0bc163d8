use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info, warn};

mod alert;
mod api;
mod capabilities;
mod config;
mod display;
mod engine;
mod models;
mod notify;
mod probes;
mod remediation;
mod scheduler;

use crate::capabilities::{Probe, Remediator};
use crate::config::{MonitorConfig, ProbeKind};
use crate::display::DisplayBoard;
use crate::engine::{Capabilities, Monitor};
use crate::probes::{PingProbe, SshProbe, SshRestart, SshServiceProbe, TcpProbe};

fn host_probe(config: &MonitorConfig) -> Result<Arc<dyn Probe>> {
    let timeout = config.probe_timeout();
    Ok(match config.probe.kind {
        ProbeKind::Ssh => Arc::new(SshProbe::new(timeout)),
        ProbeKind::Tcp { port } => Arc::new(TcpProbe::new(port, timeout)),
        ProbeKind::Ping => Arc::new(PingProbe::new(timeout)?),
    })
}

fn build_capabilities(config: &MonitorConfig, board: &DisplayBoard) -> Result<Capabilities> {
    let service = &config.service;
    let service_probe: Option<Arc<dyn Probe>> = service
        .enabled
        .then(|| Arc::new(SshServiceProbe::new(&service.name, config.probe_timeout())) as Arc<dyn Probe>);
    let remediator: Option<Arc<dyn Remediator>> = (service.enabled && service.restart.enabled)
        .then(|| Arc::new(SshRestart::new(&service.name, config.probe_timeout())) as Arc<dyn Remediator>);

    Ok(Capabilities {
        host_probe: host_probe(config)?,
        service_probe,
        remediator,
        notifier: notify::from_config(config.notify.as_ref()),
        display: Arc::new(board.clone()),
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env()
            .add_directive(tracing::Level::INFO.into()))
        .with_ansi(true)
        .init();

    let config_path = std::env::args().nth(1).unwrap_or_else(|| "config.json".into());
    let config_content = std::fs::read_to_string(&config_path)
        .with_context(|| format!("Failed to read {}", config_path))?;
    let config: MonitorConfig = serde_json::from_str(&config_content)
        .with_context(|| "Failed to parse config")?;

    let board = DisplayBoard::new();
    let capabilities = build_capabilities(&config, &board)?;
    let api_port = config.api_port;
    let monitor = Monitor::new(config, capabilities);
    if !monitor.is_enabled() {
        warn!("Monitoring disabled by configuration error; status API still serving");
    }

    let api_state = api::ApiState { status: monitor.status(), board };
    tokio::spawn(async move {
        if let Err(e) = api::start_server(api_port, api_state).await {
            error!("Status API failed: {:#}", e);
        }
    });

    tokio::spawn(monitor.run());

    signal::ctrl_c().await?;
    info!("Shutdown signal received. Stopping hostwatch...");

    Ok(())
}
