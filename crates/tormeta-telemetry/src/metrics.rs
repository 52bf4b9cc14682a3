//! Prometheus-backed metrics registry.
//!
//! # Design
//! - Collectors are registered once at construction; handles are cheap clones.
//! - Label sets stay small and bounded (route templates, fixed outcomes).

use std::sync::Arc;

use prometheus::{Encoder, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};
use serde::Serialize;

use crate::error::{Result, TelemetryError};

/// Outcome label for one broadcaster cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// A changed snapshot was broadcast.
    Broadcast,
    /// The snapshot matched the previous one.
    Unchanged,
    /// Nobody was subscribed.
    Idle,
    /// A cycle was still in flight when the tick fired.
    Skipped,
    /// The daemon or store failed.
    Failed,
}

impl CycleOutcome {
    const fn label(self) -> &'static str {
        match self {
            Self::Broadcast => "broadcast",
            Self::Unchanged => "unchanged",
            Self::Idle => "idle",
            Self::Skipped => "skipped",
            Self::Failed => "failed",
        }
    }
}

/// Shared metrics handle.
#[derive(Clone)]
pub struct Metrics {
    inner: Arc<MetricsInner>,
}

struct MetricsInner {
    registry: Registry,
    http_requests_total: IntCounterVec,
    broadcast_cycles_total: IntCounterVec,
    snapshots_broadcast_total: IntCounter,
    subscribers_dropped_total: IntCounter,
    live_subscribers: IntGauge,
    daemon_failures_total: IntCounter,
    consecutive_failures: IntGauge,
}

/// Point-in-time view of the live feed gauges and counters.
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    /// Connected live feed subscribers.
    pub live_subscribers: i64,
    /// Consecutive failed broadcaster cycles.
    pub consecutive_failures: i64,
    /// Snapshots broadcast since start.
    pub snapshots_broadcast_total: u64,
    /// Failed broadcaster cycles since start.
    pub daemon_failures_total: u64,
}

fn counter_vec(name: &'static str, help: &str, labels: &[&str]) -> Result<IntCounterVec> {
    IntCounterVec::new(Opts::new(name, help), labels)
        .map_err(|source| TelemetryError::MetricsCollector { name, source })
}

fn counter(name: &'static str, help: &str) -> Result<IntCounter> {
    IntCounter::with_opts(Opts::new(name, help))
        .map_err(|source| TelemetryError::MetricsCollector { name, source })
}

fn gauge(name: &'static str, help: &str) -> Result<IntGauge> {
    IntGauge::with_opts(Opts::new(name, help))
        .map_err(|source| TelemetryError::MetricsCollector { name, source })
}

fn register<C>(registry: &Registry, name: &'static str, collector: &C) -> Result<()>
where
    C: prometheus::core::Collector + Clone + 'static,
{
    registry
        .register(Box::new(collector.clone()))
        .map_err(|source| TelemetryError::MetricsRegister { name, source })
}

impl Metrics {
    /// Build a registry with every collector registered.
    ///
    /// # Errors
    ///
    /// Returns an error if a collector cannot be built or registered.
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let http_requests_total = counter_vec(
            "http_requests_total",
            "Total HTTP requests received",
            &["route", "code"],
        )?;
        let broadcast_cycles_total = counter_vec(
            "broadcast_cycles_total",
            "Live feed cycles by outcome",
            &["outcome"],
        )?;
        let snapshots_broadcast_total =
            counter("snapshots_broadcast_total", "Snapshots fanned out to subscribers")?;
        let subscribers_dropped_total = counter(
            "subscribers_dropped_total",
            "Subscribers removed after a failed send",
        )?;
        let live_subscribers = gauge("live_subscribers", "Connected live feed subscribers")?;
        let daemon_failures_total =
            counter("daemon_failures_total", "Broadcaster cycles failed by daemon or store")?;
        let consecutive_failures = gauge(
            "broadcast_consecutive_failures",
            "Consecutive failed broadcaster cycles",
        )?;

        register(&registry, "http_requests_total", &http_requests_total)?;
        register(&registry, "broadcast_cycles_total", &broadcast_cycles_total)?;
        register(&registry, "snapshots_broadcast_total", &snapshots_broadcast_total)?;
        register(&registry, "subscribers_dropped_total", &subscribers_dropped_total)?;
        register(&registry, "live_subscribers", &live_subscribers)?;
        register(&registry, "daemon_failures_total", &daemon_failures_total)?;
        register(&registry, "broadcast_consecutive_failures", &consecutive_failures)?;

        Ok(Self {
            inner: Arc::new(MetricsInner {
                registry,
                http_requests_total,
                broadcast_cycles_total,
                snapshots_broadcast_total,
                subscribers_dropped_total,
                live_subscribers,
                daemon_failures_total,
                consecutive_failures,
            }),
        })
    }

    /// Count an HTTP request by route template and status code.
    pub fn inc_http_request(&self, route: &str, status: u16) {
        self.inner
            .http_requests_total
            .with_label_values(&[route, &status.to_string()])
            .inc();
    }

    /// Count a broadcaster cycle.
    pub fn inc_cycle(&self, outcome: CycleOutcome) {
        self.inner
            .broadcast_cycles_total
            .with_label_values(&[outcome.label()])
            .inc();
    }

    /// Record a completed broadcast and the subscribers it dropped.
    pub fn record_broadcast(&self, dropped: usize) {
        self.inner.snapshots_broadcast_total.inc();
        self.inner
            .subscribers_dropped_total
            .inc_by(u64::try_from(dropped).unwrap_or(u64::MAX));
    }

    /// Set the connected subscriber gauge.
    pub fn set_live_subscribers(&self, count: usize) {
        self.inner
            .live_subscribers
            .set(i64::try_from(count).unwrap_or(i64::MAX));
    }

    /// Record a failed cycle and the current failure streak.
    pub fn record_daemon_failure(&self, consecutive: u32) {
        self.inner.daemon_failures_total.inc();
        self.inner.consecutive_failures.set(i64::from(consecutive));
    }

    /// Clear the failure streak after a successful cycle.
    pub fn reset_consecutive_failures(&self) {
        self.inner.consecutive_failures.set(0);
    }

    /// Render the registry in the Prometheus text exposition format.
    ///
    /// # Errors
    ///
    /// Returns an error if encoding fails or the output is not UTF-8.
    pub fn render(&self) -> Result<String> {
        let mut buffer = Vec::new();
        TextEncoder::new()
            .encode(&self.inner.registry.gather(), &mut buffer)
            .map_err(|source| TelemetryError::MetricsEncode { source })?;
        String::from_utf8(buffer).map_err(|source| TelemetryError::MetricsUtf8 { source })
    }

    /// Snapshot of the live feed gauges and counters.
    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            live_subscribers: self.inner.live_subscribers.get(),
            consecutive_failures: self.inner.consecutive_failures.get(),
            snapshots_broadcast_total: self.inner.snapshots_broadcast_total.get(),
            daemon_failures_total: self.inner.daemon_failures_total.get(),
        }
    }
}
