use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use hickory_resolver::config::ResolverConfig;
use hickory_resolver::name_server::TokioConnectionProvider;
use hickory_resolver::TokioResolver;
use std::net::IpAddr;
use std::process::Stdio;
use std::time::Duration;
use surge_ping::{Client as PingClient, Config as PingConfig, PingIdentifier, PingSequence};
use tokio::net::TcpStream;
use tokio::process::Command;
use tracing::debug;

use crate::capabilities::{Probe, Remediator};
use crate::config::Target;

/// `ssh` invocation that never prompts and gives up after `timeout`.
/// Requires key based auth for `user@host`.
fn ssh_command(target: &Target, timeout: Duration, remote: &str) -> Command {
    let mut cmd = Command::new("ssh");
    cmd.args(["-o", "BatchMode=yes"])
        .arg("-o")
        .arg(format!("ConnectTimeout={}", timeout.as_secs().max(1)))
        .args(["-o", "ConnectionAttempts=1"])
        .args(["-o", "ServerAliveInterval=2"])
        .args(["-o", "ServerAliveCountMax=1"])
        .arg(format!("{}@{}", target.user, target.address))
        .arg(remote)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .kill_on_drop(true);
    cmd
}

async fn run_ssh(target: &Target, timeout: Duration, remote: &str) -> Result<bool> {
    let status = ssh_command(target, timeout, remote)
        .status()
        .await
        .context("Failed to spawn ssh")?;
    debug!(remote, code = ?status.code(), "ssh finished");
    Ok(status.success())
}

/// Host is up when `ssh user@host "echo ok"` exits 0.
pub struct SshProbe {
    timeout: Duration,
}

impl SshProbe {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

#[async_trait]
impl Probe for SshProbe {
    async fn check(&self, target: &Target) -> Result<bool> {
        run_ssh(target, self.timeout, "echo ok").await
    }
}

/// Service is up when `systemctl is-active` succeeds on the host.
pub struct SshServiceProbe {
    service: String,
    timeout: Duration,
}

impl SshServiceProbe {
    pub fn new(service: &str, timeout: Duration) -> Self {
        Self { service: service.to_string(), timeout }
    }
}

#[async_trait]
impl Probe for SshServiceProbe {
    async fn check(&self, target: &Target) -> Result<bool> {
        let remote = format!("systemctl is-active --quiet {}", self.service);
        run_ssh(target, self.timeout, &remote).await
    }
}

/// Restarts the service through passwordless sudo.
pub struct SshRestart {
    service: String,
    connect_timeout: Duration,
}

impl SshRestart {
    pub fn new(service: &str, connect_timeout: Duration) -> Self {
        Self { service: service.to_string(), connect_timeout }
    }
}

#[async_trait]
impl Remediator for SshRestart {
    async fn remediate(&self, target: &Target) -> Result<()> {
        let remote = format!("sudo -n systemctl restart {}", self.service);
        if !run_ssh(target, self.connect_timeout, &remote).await? {
            bail!("restart of {} exited non-zero", self.service);
        }
        Ok(())
    }
}

fn cloudflare_resolver() -> TokioResolver {
    TokioResolver::builder_with_config(
        ResolverConfig::cloudflare(),
        TokioConnectionProvider::default(),
    )
    .build()
}

async fn resolve(resolver: &TokioResolver, address: &str) -> Result<IpAddr> {
    if let Ok(ip) = address.parse::<IpAddr>() {
        return Ok(ip);
    }
    let lookup = resolver
        .lookup_ip(address)
        .await
        .with_context(|| format!("DNS resolution failed for {}", address))?;
    lookup.iter().next().ok_or_else(|| anyhow!("No IP address found for {}", address))
}

/// Host is up when a TCP handshake on `port` completes.
pub struct TcpProbe {
    port: u16,
    timeout: Duration,
    resolver: TokioResolver,
}

impl TcpProbe {
    pub fn new(port: u16, timeout: Duration) -> Self {
        Self { port, timeout, resolver: cloudflare_resolver() }
    }
}

#[async_trait]
impl Probe for TcpProbe {
    async fn check(&self, target: &Target) -> Result<bool> {
        let ip = resolve(&self.resolver, &target.address).await?;
        match tokio::time::timeout(self.timeout, TcpStream::connect((ip, self.port))).await {
            Ok(Ok(_)) => Ok(true),
            Ok(Err(e)) => {
                debug!(%ip, port = self.port, error = %e, "connection refused");
                Ok(false)
            }
            Err(_) => Ok(false),
        }
    }
}

/// Host is up when it answers one ICMP echo. Needs raw socket privileges.
pub struct PingProbe {
    client: PingClient,
    timeout: Duration,
    resolver: TokioResolver,
}

impl PingProbe {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = PingClient::new(&PingConfig::default()).context("Failed to create Ping Client")?;
        Ok(Self { client, timeout, resolver: cloudflare_resolver() })
    }
}

#[async_trait]
impl Probe for PingProbe {
    async fn check(&self, target: &Target) -> Result<bool> {
        let ip = resolve(&self.resolver, &target.address).await?;
        let payload = [0u8; 56];
        let mut pinger = self.client.pinger(ip, PingIdentifier(rand::random())).await;
        pinger.timeout(self.timeout);

        match pinger.ping(PingSequence(0), &payload).await {
            Ok((_, latency)) => {
                debug!(%ip, latency_ms = latency.as_secs_f64() * 1000.0, "echo reply");
                Ok(true)
            }
            Err(e) => {
                debug!(%ip, error = %e, "no echo reply");
                Ok(false)
            }
        }
    }
}
