use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::time::MissedTickBehavior;
use tracing::{error, info, warn};

use crate::alert::AlertPolicy;
use crate::capabilities::{
    probe_with_retry, Notifier, Probe, Remediator, RetryPolicy, SignalDisplay,
};
use crate::config::{self, MonitorConfig};
use crate::models::{
    AlertCategory, DisplayValue, DownTracker, HostState, ServiceState, Signal, StatusSnapshot,
};
use crate::remediation::RemediationPolicy;
use crate::scheduler::CheckSchedule;

/// External collaborators handed to the monitor at construction.
pub struct Capabilities {
    pub host_probe: Arc<dyn Probe>,
    pub service_probe: Option<Arc<dyn Probe>>,
    pub remediator: Option<Arc<dyn Remediator>>,
    pub notifier: Option<Arc<dyn Notifier>>,
    pub display: Arc<dyn SignalDisplay>,
}

/// What a single tick did.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TickReport {
    pub host_checked: bool,
    pub service_checked: bool,
}

struct ServiceWatch {
    name: String,
    probe: Arc<dyn Probe>,
    schedule: CheckSchedule,
}

/// Owns all liveness state. Every transition happens inside [`Monitor::tick`].
pub struct Monitor {
    config: MonitorConfig,
    enabled: bool,
    host_probe: Arc<dyn Probe>,
    display: Arc<dyn SignalDisplay>,
    retry: RetryPolicy,
    down_threshold: Duration,
    host_schedule: CheckSchedule,
    host: HostState,
    down: DownTracker,
    service_watch: Option<ServiceWatch>,
    service: ServiceState,
    alerts: AlertPolicy,
    remediation: RemediationPolicy,
    status: Arc<Mutex<StatusSnapshot>>,
    last_tick: Option<DateTime<Utc>>,
}

impl Monitor {
    pub fn new(config: MonitorConfig, caps: Capabilities) -> Self {
        let enabled = match config.validate() {
            Ok(()) => true,
            Err(e) => {
                error!("configuration error: {}; monitoring disabled", e);
                false
            }
        };

        let service_watch = match (&caps.service_probe, config.service.enabled) {
            (Some(probe), true) => Some(ServiceWatch {
                name: config.service.name.clone(),
                probe: Arc::clone(probe),
                schedule: CheckSchedule::new(config.service.interval_secs),
            }),
            _ => None,
        };
        let remediator = if config.service.restart.enabled { caps.remediator } else { None };

        let retry = RetryPolicy {
            attempts: config.probe.retries,
            timeout: config.attempt_timeout(),
            delay: config.retry_delay(),
        };
        let mut status = StatusSnapshot::disabled(&config.target.address);
        status.enabled = enabled;

        Self {
            enabled,
            host_probe: caps.host_probe,
            display: caps.display,
            retry,
            down_threshold: config::seconds(config.schedule.down_alarm_threshold_secs),
            host_schedule: CheckSchedule::new(config.schedule.host_interval_secs),
            host: HostState::Unknown,
            down: DownTracker::default(),
            service_watch,
            service: ServiceState::Unknown,
            alerts: AlertPolicy::new(caps.notifier, config.notify_cooldown_secs),
            remediation: RemediationPolicy::new(remediator, &config.service.restart),
            status: Arc::new(Mutex::new(status)),
            last_tick: None,
            config,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn status(&self) -> Arc<Mutex<StatusSnapshot>> {
        Arc::clone(&self.status)
    }

    /// Drives [`Monitor::tick`] from the heartbeat interval. Returns only when disabled.
    pub async fn run(mut self) {
        if !self.enabled {
            return;
        }

        let target = &self.config.target;
        info!(
            "Monitoring {}@{} ({}), retries={}, timeout={}s, service={}, notify={}",
            target.user,
            target.address,
            target.label(),
            self.config.probe.retries,
            self.config.probe.timeout_secs,
            self.service_watch.as_ref().map_or("off", |w| w.name.as_str()),
            if self.alerts.is_configured() { "on" } else { "off" },
        );

        let mut heartbeat =
            tokio::time::interval(std::time::Duration::from_secs(self.config.schedule.heartbeat_secs.max(1)));
        heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            heartbeat.tick().await;
            self.tick(Utc::now()).await;
        }
    }

    /// One heartbeat. The host is checked when due; the service only when
    /// this tick checked the host and found it up.
    pub async fn tick(&mut self, now: DateTime<Utc>) -> TickReport {
        let mut report = TickReport::default();
        if !self.enabled {
            return report;
        }
        self.last_tick = Some(now);
        let tick_started = std::time::Instant::now();

        if self.host_schedule.is_due(now) {
            self.host_schedule.mark_started(now);
            let ok = probe_with_retry(
                self.host_probe.as_ref(),
                Signal::Host,
                &self.config.target,
                self.retry,
            )
            .await;
            report.host_checked = true;

            self.show(Signal::Host, ok.into()).await;
            self.apply_host_result(now, ok).await;

            if self.service_watch.is_some() {
                if self.host == HostState::Up {
                    // The service probe starts once the host probe is done.
                    let service_start = now + config::seconds(tick_started.elapsed().as_secs());
                    report.service_checked = self.check_service(now, service_start).await;
                } else {
                    self.suspend_service().await;
                }
            }
        }

        self.publish().await;
        report
    }

    async fn apply_host_result(&mut self, now: DateTime<Utc>, ok: bool) {
        let target = &self.config.target;
        if ok {
            self.down.clear();
            if self.host == HostState::Down {
                info!(target = %target.address, "host reachable again");
                self.alerts
                    .notify(now, AlertCategory::Recovery, target, "reachable again", true)
                    .await;
            }
            self.host = HostState::Up;
            return;
        }

        if self.host != HostState::Down {
            warn!(target = %target.address, "host not reachable");
        }
        let down_for = self.down.observe_down(now);
        if down_for >= self.down_threshold && !self.down.alarm_sent {
            let detail = format!("not reachable for {}s", down_for.num_seconds());
            self.alerts.notify(now, AlertCategory::Alarm, target, &detail, true).await;
            self.down.alarm_sent = true;
        }
        self.host = HostState::Down;
    }

    /// Returns whether the service was probed.
    async fn check_service(&mut self, now: DateTime<Utc>, started: DateTime<Utc>) -> bool {
        let Some(watch) = self.service_watch.as_mut() else {
            return false;
        };
        if !watch.schedule.is_due(started) {
            return false;
        }
        watch.schedule.mark_started(started);
        let name = watch.name.clone();
        let probe = Arc::clone(&watch.probe);

        let ok = probe_with_retry(probe.as_ref(), Signal::Service, &self.config.target, self.retry).await;
        self.show(Signal::Service, ok.into()).await;

        let observed = ServiceState::from_probe(ok);
        let previous = std::mem::replace(&mut self.service, observed);
        let target = &self.config.target;

        if previous.is_observed() && previous != observed {
            match observed {
                ServiceState::Up => {
                    info!(service = %name, "service active again");
                    let detail = format!("service {name} is active again");
                    self.alerts.notify(now, AlertCategory::ServiceUp, target, &detail, true).await;
                    self.remediation.reset();
                }
                _ => {
                    warn!(service = %name, "service went down");
                    let detail = format!("service {name} is not active");
                    self.alerts.notify(now, AlertCategory::ServiceDown, target, &detail, true).await;
                }
            }
        }

        if observed == ServiceState::Down {
            self.remediation.on_service_down(now, target, &name, &mut self.alerts).await;
        }
        true
    }

    /// Host down: the service is not probed and its state is not guessed.
    async fn suspend_service(&mut self) {
        self.service = ServiceState::NotApplicable;
        self.remediation.reset();
        self.show(Signal::Service, DisplayValue::NotApplicable).await;
    }

    async fn show(&self, signal: Signal, value: DisplayValue) {
        if self.display.current(signal).await != Some(value) {
            self.display.set(signal, value).await;
        }
    }

    async fn publish(&self) {
        let mut status = self.status.lock().await;
        status.enabled = self.enabled;
        status.host = self.host;
        status.service = self.service_watch.as_ref().map(|_| self.service);
        status.down_since = self.down.down_since;
        status.alarm_sent = self.down.alarm_sent;
        status.restart_attempts = self.remediation.attempts();
        status.last_alert = self.alerts.last_alert();
        status.last_tick = self.last_tick;
        status.next_host_check = self.host_schedule.next_due();
    }
}
