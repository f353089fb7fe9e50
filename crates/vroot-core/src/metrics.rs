use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::Serialize;

use crate::verdict::{DenyReason, Verdict};

/// Counters for interception decisions.
///
/// Every counter is a relaxed atomic so recording on the decision path
/// never takes a lock. Only hydration latency, which is recorded after a
/// provider round trip, uses a mutex.
#[derive(Debug, Default)]
pub struct ArbiterMetrics {
    pub decisions: AtomicU64,
    pub allowed: AtomicU64,
    pub denied: AtomicU64,

    /// Allowed without reading past the root-membership flag.
    pub fast_path: AtomicU64,

    pub crawler_denials: AtomicU64,
    pub offline_denials: AtomicU64,

    pub hydration_requests: AtomicU64,
    pub hydration_failures: AtomicU64,
    pub shutdown_denials: AtomicU64,
    pub transport_failures: AtomicU64,
    pub integrity_violations: AtomicU64,

    latencies: Mutex<LatencyTracker>,
}

#[derive(Debug, Default)]
struct LatencyTracker {
    samples: Vec<Duration>,
    max_samples: usize,
}

impl LatencyTracker {
    fn new(max_samples: usize) -> Self {
        LatencyTracker {
            samples: Vec::with_capacity(max_samples),
            max_samples,
        }
    }

    fn record(&mut self, duration: Duration) {
        if self.samples.len() >= self.max_samples {
            self.samples.remove(0);
        }
        self.samples.push(duration);
    }

    fn avg(&self) -> Option<Duration> {
        if self.samples.is_empty() {
            None
        } else {
            let total: Duration = self.samples.iter().sum();
            Some(total / self.samples.len() as u32)
        }
    }

    fn p99(&self) -> Option<Duration> {
        if self.samples.is_empty() {
            return None;
        }
        let mut sorted = self.samples.clone();
        sorted.sort();
        let idx = (sorted.len() * 99 / 100).min(sorted.len() - 1);
        Some(sorted[idx])
    }
}

impl ArbiterMetrics {
    pub fn new() -> Self {
        ArbiterMetrics {
            latencies: Mutex::new(LatencyTracker::new(1000)),
            ..Default::default()
        }
    }

    pub fn record_fast_path(&self) {
        self.fast_path.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_hydration_request(&self) {
        self.hydration_requests.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_transport_failure(&self) {
        self.transport_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_integrity_violation(&self) {
        self.decisions.fetch_add(1, Ordering::Relaxed);
        self.integrity_violations.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_hydration_latency(&self, duration: Duration) {
        self.latencies.lock().record(duration);
    }

    /// Count a final verdict.
    pub fn record_verdict(&self, verdict: Verdict) {
        self.decisions.fetch_add(1, Ordering::Relaxed);
        let reason = match verdict {
            Verdict::Allow => {
                self.allowed.fetch_add(1, Ordering::Relaxed);
                return;
            }
            Verdict::Deny(reason) => reason,
        };

        self.denied.fetch_add(1, Ordering::Relaxed);
        let counter = match reason {
            DenyReason::Crawler => &self.crawler_denials,
            DenyReason::OfflineWrite | DenyReason::OfflinePlaceholder => &self.offline_denials,
            DenyReason::HydrationFailed => &self.hydration_failures,
            DenyReason::ShuttingDown => &self.shutdown_denials,
            DenyReason::PathUnresolved | DenyReason::ProviderUnreachable => return,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let latencies = self.latencies.lock();
        MetricsSnapshot {
            decisions: self.decisions.load(Ordering::Relaxed),
            allowed: self.allowed.load(Ordering::Relaxed),
            denied: self.denied.load(Ordering::Relaxed),
            fast_path: self.fast_path.load(Ordering::Relaxed),
            crawler_denials: self.crawler_denials.load(Ordering::Relaxed),
            offline_denials: self.offline_denials.load(Ordering::Relaxed),
            hydration_requests: self.hydration_requests.load(Ordering::Relaxed),
            hydration_failures: self.hydration_failures.load(Ordering::Relaxed),
            shutdown_denials: self.shutdown_denials.load(Ordering::Relaxed),
            transport_failures: self.transport_failures.load(Ordering::Relaxed),
            integrity_violations: self.integrity_violations.load(Ordering::Relaxed),
            hydration_avg_ms: latencies.avg().map(|d| d.as_secs_f64() * 1000.0),
            hydration_p99_ms: latencies.p99().map(|d| d.as_secs_f64() * 1000.0),
        }
    }
}

/// Point-in-time copy of [`ArbiterMetrics`].
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub decisions: u64,
    pub allowed: u64,
    pub denied: u64,
    pub fast_path: u64,
    pub crawler_denials: u64,
    pub offline_denials: u64,
    pub hydration_requests: u64,
    pub hydration_failures: u64,
    pub shutdown_denials: u64,
    pub transport_failures: u64,
    pub integrity_violations: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hydration_avg_ms: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hydration_p99_ms: Option<f64>,
}

impl MetricsSnapshot {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

/// Thread-safe metrics handle.
pub type SharedMetrics = Arc<ArbiterMetrics>;

pub fn create_metrics() -> SharedMetrics {
    Arc::new(ArbiterMetrics::new())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_verdicts() {
        let metrics = ArbiterMetrics::new();
        metrics.record_verdict(Verdict::Allow);
        metrics.record_verdict(Verdict::Deny(DenyReason::Crawler));
        metrics.record_verdict(Verdict::Deny(DenyReason::OfflineWrite));
        metrics.record_verdict(Verdict::Deny(DenyReason::OfflinePlaceholder));
        metrics.record_verdict(Verdict::Deny(DenyReason::PathUnresolved));

        let snap = metrics.snapshot();
        assert_eq!(snap.decisions, 5);
        assert_eq!(snap.allowed, 1);
        assert_eq!(snap.denied, 4);
        assert_eq!(snap.crawler_denials, 1);
        assert_eq!(snap.offline_denials, 2);
    }

    #[test]
    fn test_latency_stats() {
        let metrics = ArbiterMetrics::new();
        assert!(metrics.snapshot().hydration_avg_ms.is_none());

        for ms in [10, 20, 30] {
            metrics.record_hydration_latency(Duration::from_millis(ms));
        }
        let snap = metrics.snapshot();
        let avg = snap.hydration_avg_ms.unwrap();
        assert!((avg - 20.0).abs() < 0.001);
        assert!((snap.hydration_p99_ms.unwrap() - 30.0).abs() < 0.001);
    }

    #[test]
    fn test_latency_window_is_bounded() {
        let mut tracker = LatencyTracker::new(3);
        for ms in [100, 1, 1, 1] {
            tracker.record(Duration::from_millis(ms));
        }
        assert_eq!(tracker.samples.len(), 3);
        assert_eq!(tracker.avg(), Some(Duration::from_millis(1)));
    }

    #[test]
    fn test_snapshot_json() {
        let metrics = create_metrics();
        metrics.record_fast_path();
        metrics.record_verdict(Verdict::Allow);
        let json = metrics.snapshot().to_json().unwrap();
        assert!(json.contains("\"fast_path\": 1"));
        assert!(!json.contains("hydration_avg_ms"));
    }
}
