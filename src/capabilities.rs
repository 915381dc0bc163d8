//! Collaborators the engine drives but does not implement.
//!
//! Everything here is injected into [`crate::engine::Monitor`] so checks,
//! alerts and restarts can be swapped for fakes without spawning processes.

use anyhow::Result;
use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::Target;
use crate::models::{DisplayValue, Signal};

/// One liveness check attempt against the target.
#[async_trait]
pub trait Probe: Send + Sync {
    async fn check(&self, target: &Target) -> Result<bool>;
}

/// Best-effort delivery of a human readable alert.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, text: &str) -> Result<()>;
}

/// Corrective action for a failed service. The outcome is not consulted.
#[async_trait]
pub trait Remediator: Send + Sync {
    async fn remediate(&self, target: &Target) -> Result<()>;
}

/// Persistent, externally visible per-signal state.
#[async_trait]
pub trait SignalDisplay: Send + Sync {
    async fn current(&self, signal: Signal) -> Option<DisplayValue>;
    async fn set(&self, signal: Signal, value: DisplayValue);
}

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub timeout: Duration,
    pub delay: Duration,
}

/// Runs `probe` up to `policy.attempts` times, stopping at the first success.
///
/// Errors and timeouts count as a failed attempt. Worst case duration is
/// `attempts * (timeout + delay)`.
pub async fn probe_with_retry(
    probe: &dyn Probe,
    signal: Signal,
    target: &Target,
    policy: RetryPolicy,
) -> bool {
    for attempt in 1..=policy.attempts {
        match tokio::time::timeout(policy.timeout, probe.check(target)).await {
            Ok(Ok(true)) => return true,
            Ok(Ok(false)) => {
                debug!(%signal, attempt, target = %target.address, "probe attempt failed");
            }
            Ok(Err(e)) => {
                warn!(%signal, attempt, target = %target.address, error = %e, "probe error");
            }
            Err(_) => {
                debug!(%signal, attempt, target = %target.address, "probe attempt timed out");
            }
        }
        if attempt < policy.attempts {
            tokio::time::sleep(policy.delay).await;
        }
    }
    false
}
