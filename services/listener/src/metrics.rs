//! Listener metrics and Prometheus text exposition.
//!
//! Values are plain atomics written by the listener task and read by the
//! telemetry server.

use std::fmt::Write;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};

/// Labels attached to every series.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetricLabels {
    /// Runner set name.
    pub name: String,

    /// Runner set namespace.
    pub namespace: String,

    /// Scale set name as registered upstream.
    pub scale_set_name: String,
}

impl MetricLabels {
    fn render(&self) -> String {
        format!(
            "name=\"{}\",namespace=\"{}\",runner_scale_set=\"{}\"",
            escape(&self.name),
            escape(&self.namespace),
            escape(&self.scale_set_name)
        )
    }
}

fn escape(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
}

/// Gauges and counters exported by the listener.
#[derive(Debug, Default)]
pub struct ListenerMetrics {
    labels: MetricLabels,
    min_runners: AtomicI64,
    max_runners: AtomicI64,
    assigned_jobs: AtomicI64,
    desired_runners: AtomicI64,
    started_jobs_total: AtomicU64,
    completed_jobs_total: AtomicU64,
}

impl ListenerMetrics {
    pub fn new(labels: MetricLabels) -> Self {
        Self {
            labels,
            ..Default::default()
        }
    }

    /// Record the configured bounds, once at startup.
    pub fn record_static(&self, min_runners: i32, max_runners: i32) {
        self.min_runners
            .store(i64::from(min_runners), Ordering::Relaxed);
        self.max_runners
            .store(i64::from(max_runners), Ordering::Relaxed);
    }

    pub fn record_job_started(&self) {
        self.started_jobs_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_job_completed(&self) {
        self.completed_jobs_total.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a desired-count evaluation and the target that was applied.
    pub fn record_desired_count(&self, assigned_jobs: u32, desired_runners: i32) {
        self.assigned_jobs
            .store(i64::from(assigned_jobs), Ordering::Relaxed);
        self.desired_runners
            .store(i64::from(desired_runners), Ordering::Relaxed);
    }

    pub fn started_jobs_total(&self) -> u64 {
        self.started_jobs_total.load(Ordering::Relaxed)
    }

    pub fn completed_jobs_total(&self) -> u64 {
        self.completed_jobs_total.load(Ordering::Relaxed)
    }

    pub fn desired_runners(&self) -> i64 {
        self.desired_runners.load(Ordering::Relaxed)
    }

    /// Render all series in the Prometheus text format.
    pub fn render(&self) -> String {
        let labels = self.labels.render();
        let mut out = String::new();

        let series: [(&str, &str, &str, String); 6] = [
            (
                "poolscale_min_runners",
                "gauge",
                "Configured minimum number of runners.",
                self.min_runners.load(Ordering::Relaxed).to_string(),
            ),
            (
                "poolscale_max_runners",
                "gauge",
                "Configured maximum number of runners.",
                self.max_runners.load(Ordering::Relaxed).to_string(),
            ),
            (
                "poolscale_assigned_jobs",
                "gauge",
                "Jobs currently asking for a runner, as last reported by the session.",
                self.assigned_jobs.load(Ordering::Relaxed).to_string(),
            ),
            (
                "poolscale_desired_runners",
                "gauge",
                "Replica target last applied to the runner set.",
                self.desired_runners.load(Ordering::Relaxed).to_string(),
            ),
            (
                "poolscale_started_jobs_total",
                "counter",
                "Jobs started on runners of this pool.",
                self.started_jobs_total().to_string(),
            ),
            (
                "poolscale_completed_jobs_total",
                "counter",
                "Jobs completed on runners of this pool.",
                self.completed_jobs_total().to_string(),
            ),
        ];

        for (name, kind, help, value) in series {
            // Writing to a String cannot fail.
            let _ = writeln!(out, "# HELP {name} {help}");
            let _ = writeln!(out, "# TYPE {name} {kind}");
            let _ = writeln!(out, "{name}{{{labels}}} {value}");
        }

        out
    }
}
