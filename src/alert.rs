use chrono::{DateTime, Duration, Local, Utc};
use std::sync::Arc;
use tracing::{debug, error, info};

use crate::capabilities::Notifier;
use crate::config::{self, Target};
use crate::models::AlertCategory;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertOutcome {
    /// No notifier configured.
    Disabled,
    /// Inside the cooldown window.
    Suppressed,
    Sent,
    /// Dispatched but the transport reported an error.
    Failed,
}

/// Cooldown-gated alert dispatch.
///
/// A single cooldown timestamp is shared by every category. Bypassing alerts
/// ignore it but still refresh it.
pub struct AlertPolicy {
    notifier: Option<Arc<dyn Notifier>>,
    cooldown: Duration,
    last_alert: Option<DateTime<Utc>>,
}

impl AlertPolicy {
    pub fn new(notifier: Option<Arc<dyn Notifier>>, cooldown_secs: u64) -> Self {
        Self {
            notifier,
            cooldown: config::seconds(cooldown_secs),
            last_alert: None,
        }
    }

    pub fn last_alert(&self) -> Option<DateTime<Utc>> {
        self.last_alert
    }

    pub fn is_configured(&self) -> bool {
        self.notifier.is_some()
    }

    pub async fn notify(
        &mut self,
        now: DateTime<Utc>,
        category: AlertCategory,
        target: &Target,
        detail: &str,
        bypass_cooldown: bool,
    ) -> AlertOutcome {
        let Some(notifier) = self.notifier.as_ref() else {
            return AlertOutcome::Disabled;
        };

        if !bypass_cooldown {
            if let Some(last) = self.last_alert {
                if now - last < self.cooldown {
                    debug!(?category, "alert suppressed by cooldown");
                    return AlertOutcome::Suppressed;
                }
            }
        }

        let text = format_message(category, target, detail, now);
        self.last_alert = Some(now);

        match notifier.send(&text).await {
            Ok(()) => {
                info!(?category, target = %target.address, "alert sent");
                AlertOutcome::Sent
            }
            Err(e) => {
                error!(?category, error = %e, "alert delivery failed");
                AlertOutcome::Failed
            }
        }
    }
}

pub fn format_message(
    category: AlertCategory,
    target: &Target,
    detail: &str,
    now: DateTime<Utc>,
) -> String {
    format!(
        "{}\n{} ({}): {}\nTime: {}",
        category.headline(),
        target.label(),
        target.address,
        detail,
        now.with_timezone(&Local).format("%d.%m.%Y %H:%M:%S"),
    )
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::TimeZone;
    use std::sync::Mutex;

    /// Records every message; optionally fails delivery.
    #[derive(Default)]
    pub(crate) struct RecordingNotifier {
        pub sent: Mutex<Vec<String>>,
        pub fail: bool,
    }

    impl RecordingNotifier {
        pub fn messages(&self) -> Vec<String> {
            self.sent.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        async fn send(&self, text: &str) -> anyhow::Result<()> {
            self.sent.lock().unwrap().push(text.to_string());
            if self.fail {
                anyhow::bail!("telegram unreachable");
            }
            Ok(())
        }
    }

    fn t(secs: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 5, 1, 0, 0, 0).unwrap() + Duration::seconds(secs)
    }

    fn target() -> Target {
        Target { address: "192.168.178.50".into(), name: Some("Garden Pi".into()), ..Target::default() }
    }

    #[tokio::test]
    async fn cooldown_drops_second_regular_alert() {
        let notifier = Arc::new(RecordingNotifier::default());
        let mut policy = AlertPolicy::new(Some(notifier.clone()), 1800);

        let first = policy.notify(t(0), AlertCategory::Alarm, &target(), "first", false).await;
        let second = policy.notify(t(5), AlertCategory::Alarm, &target(), "second", false).await;

        assert_eq!(first, AlertOutcome::Sent);
        assert_eq!(second, AlertOutcome::Suppressed);
        assert_eq!(notifier.messages().len(), 1);
        assert!(notifier.messages()[0].contains("first"));
    }

    #[tokio::test]
    async fn bypass_ignores_cooldown_but_refreshes_it() {
        let notifier = Arc::new(RecordingNotifier::default());
        let mut policy = AlertPolicy::new(Some(notifier.clone()), 1800);

        policy.notify(t(0), AlertCategory::Alarm, &target(), "a", false).await;
        let recovered = policy.notify(t(10), AlertCategory::Recovery, &target(), "b", true).await;
        assert_eq!(recovered, AlertOutcome::Sent);
        assert_eq!(policy.last_alert(), Some(t(10)));

        // 1805s after the first alert, but only 1795s after the bypassing one.
        let regular = policy.notify(t(1805), AlertCategory::Alarm, &target(), "c", false).await;
        assert_eq!(regular, AlertOutcome::Suppressed);

        let later = policy.notify(t(1810), AlertCategory::Alarm, &target(), "d", false).await;
        assert_eq!(later, AlertOutcome::Sent);
        assert_eq!(notifier.messages().len(), 3);
    }

    #[tokio::test]
    async fn failed_delivery_still_starts_cooldown() {
        let notifier = Arc::new(RecordingNotifier { fail: true, ..Default::default() });
        let mut policy = AlertPolicy::new(Some(notifier.clone()), 60);

        let outcome = policy.notify(t(0), AlertCategory::ServiceDown, &target(), "x", false).await;
        assert_eq!(outcome, AlertOutcome::Failed);
        assert_eq!(policy.last_alert(), Some(t(0)));
        assert_eq!(
            policy.notify(t(30), AlertCategory::ServiceDown, &target(), "y", false).await,
            AlertOutcome::Suppressed
        );
    }

    #[tokio::test]
    async fn no_notifier_is_a_no_op() {
        let mut policy = AlertPolicy::new(None, 60);
        let outcome = policy.notify(t(0), AlertCategory::Recovery, &target(), "x", true).await;
        assert_eq!(outcome, AlertOutcome::Disabled);
        assert!(policy.last_alert().is_none());
    }

    #[test]
    fn message_carries_category_target_and_time() {
        let text = format_message(AlertCategory::Alarm, &target(), "not answering", t(0));
        assert!(text.starts_with(AlertCategory::Alarm.headline()));
        assert!(text.contains("Garden Pi (192.168.178.50)"));
        assert!(text.contains("not answering"));
        assert!(text.contains("Time: "));
    }
}
