use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::alert::AlertPolicy;
use crate::capabilities::Remediator;
use crate::config::{self, RestartConfig, Target};
use crate::models::AlertCategory;

/// Bounded, interval-spaced restart attempts for one service-down episode.
pub struct RemediationPolicy {
    remediator: Option<Arc<dyn Remediator>>,
    max_attempts: u32,
    min_interval: Duration,
    timeout: std::time::Duration,
    attempts: u32,
    next_allowed: Option<DateTime<Utc>>,
}

impl RemediationPolicy {
    pub fn new(remediator: Option<Arc<dyn Remediator>>, config: &RestartConfig) -> Self {
        Self {
            remediator,
            max_attempts: config.max_attempts,
            min_interval: config::seconds(config.min_interval_secs),
            timeout: std::time::Duration::from_secs(config.timeout_secs),
            attempts: 0,
            next_allowed: None,
        }
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Re-arms the policy for the next episode.
    pub fn reset(&mut self) {
        self.attempts = 0;
        self.next_allowed = None;
    }

    fn allowed(&self, now: DateTime<Utc>) -> bool {
        self.attempts < self.max_attempts && self.next_allowed.is_none_or(|at| now >= at)
    }

    /// Called for every service check that reports down while the host is up,
    /// starting with the down-transition.
    ///
    /// Returns whether an attempt was made. Exhausted or throttled calls do
    /// nothing and send nothing.
    pub async fn on_service_down(
        &mut self,
        now: DateTime<Utc>,
        target: &Target,
        service: &str,
        alerts: &mut AlertPolicy,
    ) -> bool {
        let Some(remediator) = self.remediator.clone() else {
            return false;
        };
        if !self.allowed(now) {
            debug!(
                service,
                attempts = self.attempts,
                max = self.max_attempts,
                "restart skipped (exhausted or throttled)"
            );
            return false;
        }

        let attempt = self.attempts + 1;
        let detail = format!("restarting {service} (attempt {attempt}/{})", self.max_attempts);
        alerts.notify(now, AlertCategory::RemediationAttempt, target, &detail, true).await;

        match tokio::time::timeout(self.timeout, remediator.remediate(target)).await {
            Ok(Ok(())) => info!(service, attempt, "restart issued"),
            Ok(Err(e)) => warn!(service, attempt, error = %e, "restart command failed"),
            Err(_) => warn!(service, attempt, "restart command timed out"),
        }

        self.attempts = attempt;
        self.next_allowed = Some(now + self.min_interval);
        true
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::alert::tests::RecordingNotifier;
    use async_trait::async_trait;
    use chrono::TimeZone;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[derive(Default)]
    pub(crate) struct CountingRemediator {
        pub calls: AtomicU32,
        pub fail: bool,
    }

    impl CountingRemediator {
        pub fn count(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Remediator for CountingRemediator {
        async fn remediate(&self, _target: &Target) -> anyhow::Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                anyhow::bail!("sudo: a password is required");
            }
            Ok(())
        }
    }

    fn t(secs: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 5, 1, 0, 0, 0).unwrap() + Duration::seconds(secs)
    }

    fn restart(max_attempts: u32, min_interval_secs: u64) -> RestartConfig {
        RestartConfig { max_attempts, min_interval_secs, ..RestartConfig::default() }
    }

    #[tokio::test]
    async fn attempts_are_bounded_and_spaced() {
        let remediator = Arc::new(CountingRemediator::default());
        let notifier = Arc::new(RecordingNotifier::default());
        let mut alerts = AlertPolicy::new(Some(notifier.clone()), 1800);
        let mut policy = RemediationPolicy::new(Some(remediator.clone()), &restart(2, 100));
        let target = Target { address: "h".into(), ..Target::default() };

        assert!(policy.on_service_down(t(0), &target, "mosquitto", &mut alerts).await);
        assert!(!policy.on_service_down(t(50), &target, "mosquitto", &mut alerts).await);
        assert!(policy.on_service_down(t(100), &target, "mosquitto", &mut alerts).await);
        assert!(!policy.on_service_down(t(500), &target, "mosquitto", &mut alerts).await);

        assert_eq!(remediator.count(), 2);
        assert_eq!(policy.attempts(), 2);
        // Attempt notices bypass the cooldown.
        assert_eq!(notifier.messages().len(), 2);
        assert!(notifier.messages()[1].contains("attempt 2/2"));
    }

    #[tokio::test]
    async fn reset_rearms_the_budget() {
        let remediator = Arc::new(CountingRemediator::default());
        let mut alerts = AlertPolicy::new(None, 1800);
        let mut policy = RemediationPolicy::new(Some(remediator.clone()), &restart(1, 1000));
        let target = Target { address: "h".into(), ..Target::default() };

        assert!(policy.on_service_down(t(0), &target, "svc", &mut alerts).await);
        assert!(!policy.on_service_down(t(5000), &target, "svc", &mut alerts).await);
        policy.reset();
        assert!(policy.on_service_down(t(5001), &target, "svc", &mut alerts).await);
        assert_eq!(remediator.count(), 2);
    }

    #[tokio::test]
    async fn failing_remediation_still_counts() {
        let remediator = Arc::new(CountingRemediator { fail: true, ..Default::default() });
        let mut alerts = AlertPolicy::new(None, 1800);
        let mut policy = RemediationPolicy::new(Some(remediator.clone()), &restart(2, 0));
        let target = Target { address: "h".into(), ..Target::default() };

        assert!(policy.on_service_down(t(0), &target, "svc", &mut alerts).await);
        assert_eq!(policy.attempts(), 1);
    }
}
