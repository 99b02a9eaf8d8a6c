//! Prometheus metrics.
//!
//! A small in-process registry with the counters and gauge infralog exposes,
//! rendered in the Prometheus text exposition format by [`Metrics::render`]
//! and served by [`MetricsServer`].

mod server;

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use chrono::Utc;

pub use server::MetricsServer;

/// Polling stage that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum PollStage {
    /// Downloading the state.
    Fetch,
    /// Parsing the state.
    Parse,
    /// Comparing snapshots.
    Compare,
}

impl PollStage {
    /// Label value.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Fetch => "fetch",
            Self::Parse => "parse",
            Self::Compare => "compare",
        }
    }
}

#[derive(Debug, Default)]
struct Registry {
    changes: BTreeMap<(String, String), u64>,
    poll_errors: BTreeMap<PollStage, u64>,
    last_successful_poll: f64,
    notifications_sent: BTreeMap<String, u64>,
    notification_errors: BTreeMap<String, u64>,
}

/// Metric registry shared between the poller and the HTTP endpoint.
#[derive(Debug, Default)]
pub struct Metrics {
    registry: Mutex<Registry>,
}

impl Metrics {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn registry(&self) -> MutexGuard<'_, Registry> {
        // A panic while holding the lock cannot leave a counter half-written.
        self.registry
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Count one detected change.
    pub fn record_change(&self, change_type: &str, resource_type: &str) {
        *self
            .registry()
            .changes
            .entry((change_type.to_string(), resource_type.to_string()))
            .or_default() += 1;
    }

    /// Count a failed poll.
    pub fn record_poll_error(&self, stage: PollStage) {
        *self.registry().poll_errors.entry(stage).or_default() += 1;
    }

    /// Set the last successful poll to now.
    pub fn record_poll_success(&self) {
        #[allow(clippy::cast_precision_loss)]
        let now = Utc::now().timestamp_millis() as f64 / 1000.0;
        self.registry().last_successful_poll = now;
    }

    /// Count a delivered notification.
    pub fn record_notification_sent(&self, target: &str) {
        *self
            .registry()
            .notifications_sent
            .entry(target.to_string())
            .or_default() += 1;
    }

    /// Count a failed notification.
    pub fn record_notification_error(&self, target: &str) {
        *self
            .registry()
            .notification_errors
            .entry(target.to_string())
            .or_default() += 1;
    }

    /// Current value of `infralog_changes_total`.
    #[must_use]
    pub fn changes_total(&self, change_type: &str, resource_type: &str) -> u64 {
        self.registry()
            .changes
            .get(&(change_type.to_string(), resource_type.to_string()))
            .copied()
            .unwrap_or(0)
    }

    /// Current value of `infralog_poll_errors_total`.
    #[must_use]
    pub fn poll_errors(&self, stage: PollStage) -> u64 {
        self.registry()
            .poll_errors
            .get(&stage)
            .copied()
            .unwrap_or(0)
    }

    /// Current value of `infralog_notifications_sent_total`.
    #[must_use]
    pub fn notifications_sent(&self, target: &str) -> u64 {
        self.registry()
            .notifications_sent
            .get(target)
            .copied()
            .unwrap_or(0)
    }

    /// Current value of `infralog_notification_errors_total`.
    #[must_use]
    pub fn notification_errors(&self, target: &str) -> u64 {
        self.registry()
            .notification_errors
            .get(target)
            .copied()
            .unwrap_or(0)
    }

    /// Unix timestamp of the last successful poll, 0 before the first.
    #[must_use]
    pub fn last_successful_poll(&self) -> f64 {
        self.registry().last_successful_poll
    }

    /// Render all metrics in the Prometheus text format.
    #[must_use]
    pub fn render(&self) -> String {
        let reg = self.registry();
        let mut out = String::new();

        out.push_str(&family(
            "infralog_changes_total",
            "Total number of infrastructure changes detected",
            "counter",
        ));
        for ((change_type, resource_type), value) in &reg.changes {
            out.push_str(&sample(
                "infralog_changes_total",
                &[("resource_type", resource_type), ("type", change_type)],
                *value,
            ));
        }

        out.push_str(&family(
            "infralog_last_successful_poll_timestamp",
            "Unix timestamp of the last successful poll",
            "gauge",
        ));
        out.push_str(&format!(
            "infralog_last_successful_poll_timestamp {}\n",
            reg.last_successful_poll
        ));

        out.push_str(&family(
            "infralog_notification_errors_total",
            "Total number of notification errors",
            "counter",
        ));
        for (target, value) in &reg.notification_errors {
            out.push_str(&sample(
                "infralog_notification_errors_total",
                &[("target", target)],
                *value,
            ));
        }

        out.push_str(&family(
            "infralog_notifications_sent_total",
            "Total number of notifications sent successfully",
            "counter",
        ));
        for (target, value) in &reg.notifications_sent {
            out.push_str(&sample(
                "infralog_notifications_sent_total",
                &[("target", target)],
                *value,
            ));
        }

        out.push_str(&family(
            "infralog_poll_errors_total",
            "Total number of polling errors",
            "counter",
        ));
        for (stage, value) in &reg.poll_errors {
            out.push_str(&sample(
                "infralog_poll_errors_total",
                &[("stage", stage.as_str())],
                *value,
            ));
        }

        out
    }
}

fn family(name: &str, help: &str, kind: &str) -> String {
    format!("# HELP {name} {help}\n# TYPE {name} {kind}\n")
}

fn sample(name: &str, labels: &[(&str, &str)], value: u64) -> String {
    let labels = labels
        .iter()
        .map(|(k, v)| format!("{k}=\"{}\"", escape_label(v)))
        .collect::<Vec<_>>()
        .join(",");
    format!("{name}{{{labels}}} {value}\n")
}

fn escape_label(value: &str) -> String {
    value
        .replace('\\', r"\\")
        .replace('"', "\\\"")
        .replace('\n', r"\n")
}
