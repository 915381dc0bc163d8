use chrono::{DateTime, Duration, Utc};

use crate::config;

/// Fixed-interval cadence for one signal.
///
/// A fresh schedule is due immediately. Rescheduling counts from the start of
/// the check, so the interval is a lower bound on the gap between checks.
#[derive(Debug, Clone)]
pub struct CheckSchedule {
    interval: Duration,
    next_due: Option<DateTime<Utc>>,
}

impl CheckSchedule {
    pub fn new(interval_secs: u64) -> Self {
        Self {
            interval: config::seconds(interval_secs),
            next_due: None,
        }
    }

    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.next_due.is_none_or(|due| now >= due)
    }

    pub fn mark_started(&mut self, started: DateTime<Utc>) {
        self.next_due = Some(started + self.interval);
    }

    pub fn next_due(&self) -> Option<DateTime<Utc>> {
        self.next_due
    }
}
