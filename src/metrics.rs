// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

/**
 * Bountyy Oy - Metrics Collection & Monitoring
 * Process-wide counters with tracing integration
 *
 * @copyright 2026 Bountyy Oy
 * @license Proprietary
 */

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::errors::ScannerError;

/// Counters shared by crawler, worker and scheduler
#[derive(Debug, Clone)]
pub struct MetricsCollector {
    enabled: bool,
    pages_fetched: Arc<AtomicU64>,
    fetch_failures: Arc<AtomicU64>,
    rate_limited: Arc<AtomicU64>,
    findings: Arc<AtomicU64>,
    analyzer_errors: Arc<AtomicU64>,
    store_errors: Arc<AtomicU64>,
    scans_completed: Arc<AtomicU64>,
    scans_failed: Arc<AtomicU64>,
    ticks_run: Arc<AtomicU64>,
    ticks_skipped: Arc<AtomicU64>,
}

impl MetricsCollector {
    /// Create a new metrics collector
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            pages_fetched: Arc::new(AtomicU64::new(0)),
            fetch_failures: Arc::new(AtomicU64::new(0)),
            rate_limited: Arc::new(AtomicU64::new(0)),
            findings: Arc::new(AtomicU64::new(0)),
            analyzer_errors: Arc::new(AtomicU64::new(0)),
            store_errors: Arc::new(AtomicU64::new(0)),
            scans_completed: Arc::new(AtomicU64::new(0)),
            scans_failed: Arc::new(AtomicU64::new(0)),
            ticks_run: Arc::new(AtomicU64::new(0)),
            ticks_skipped: Arc::new(AtomicU64::new(0)),
        }
    }

    fn bump(&self, counter: &AtomicU64, by: u64) {
        if self.enabled {
            counter.fetch_add(by, Ordering::Relaxed);
        }
    }

    /// Record a page fetch that produced an HTTP response
    pub fn record_page(&self, status_code: u16, duration: Duration) {
        self.bump(&self.pages_fetched, 1);
        if status_code == 429 || status_code == 503 {
            self.bump(&self.rate_limited, 1);
        }
        debug!(
            status_code = status_code,
            duration_ms = duration.as_millis() as u64,
            "Page fetched"
        );
    }

    /// Record a transport-level fetch failure
    pub fn record_fetch_failure(&self, error: &ScannerError) {
        self.bump(&self.fetch_failures, 1);
        debug!(error_kind = error.kind(), "Page fetch failed");
    }

    pub fn record_findings(&self, count: usize) {
        self.bump(&self.findings, count as u64);
    }

    pub fn record_analyzer_error(&self, analyzer: &str) {
        self.bump(&self.analyzer_errors, 1);
        debug!(analyzer = analyzer, "Analyzer error");
    }

    pub fn record_store_error(&self) {
        self.bump(&self.store_errors, 1);
    }

    pub fn record_scan_completed(&self) {
        self.bump(&self.scans_completed, 1);
    }

    pub fn record_scan_failed(&self) {
        self.bump(&self.scans_failed, 1);
    }

    pub fn record_tick(&self, skipped: bool) {
        if skipped {
            self.bump(&self.ticks_skipped, 1);
        } else {
            self.bump(&self.ticks_run, 1);
        }
    }

    /// Point-in-time copy of every counter
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            pages_fetched: self.pages_fetched.load(Ordering::Relaxed),
            fetch_failures: self.fetch_failures.load(Ordering::Relaxed),
            rate_limited: self.rate_limited.load(Ordering::Relaxed),
            findings: self.findings.load(Ordering::Relaxed),
            analyzer_errors: self.analyzer_errors.load(Ordering::Relaxed),
            store_errors: self.store_errors.load(Ordering::Relaxed),
            scans_completed: self.scans_completed.load(Ordering::Relaxed),
            scans_failed: self.scans_failed.load(Ordering::Relaxed),
            ticks_run: self.ticks_run.load(Ordering::Relaxed),
            ticks_skipped: self.ticks_skipped.load(Ordering::Relaxed),
        }
    }

    /// Log a summary line every `interval` until `shutdown` fires
    pub async fn report_periodically(self: Arc<Self>, interval: Duration, shutdown: CancellationToken) {
        let mut ticker = tokio::time::interval(interval);
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    let s = self.snapshot();
                    info!(
                        pages = s.pages_fetched,
                        fetch_failures = s.fetch_failures,
                        findings = s.findings,
                        scans_completed = s.scans_completed,
                        scans_failed = s.scans_failed,
                        ticks = s.ticks_run,
                        "[Metrics] Summary"
                    );
                }
            }
        }
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new(true)
    }
}

/// Metrics summary for reporting
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MetricsSnapshot {
    pub pages_fetched: u64,
    pub fetch_failures: u64,
    pub rate_limited: u64,
    pub findings: u64,
    pub analyzer_errors: u64,
    pub store_errors: u64,
    pub scans_completed: u64,
    pub scans_failed: u64,
    pub ticks_run: u64,
    pub ticks_skipped: u64,
}

/// Timer for measuring operation duration
pub struct Timer {
    start: Instant,
    operation: &'static str,
}

impl Timer {
    pub fn start(operation: &'static str) -> Self {
        Self {
            start: Instant::now(),
            operation,
        }
    }

    /// Stop the timer and log the duration
    pub fn stop(self) -> Duration {
        let duration = self.start.elapsed();
        debug!(
            operation = self.operation,
            duration_ms = duration.as_millis() as u64,
            "Operation completed"
        );
        duration
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_recording() {
        let metrics = MetricsCollector::new(true);

        metrics.record_page(200, Duration::from_millis(100));
        metrics.record_page(429, Duration::from_millis(10));
        metrics.record_fetch_failure(&ScannerError::General("x".to_string()));
        metrics.record_findings(3);
        metrics.record_tick(false);
        metrics.record_tick(true);

        let s = metrics.snapshot();
        assert_eq!(s.pages_fetched, 2);
        assert_eq!(s.rate_limited, 1);
        assert_eq!(s.fetch_failures, 1);
        assert_eq!(s.findings, 3);
        assert_eq!(s.ticks_run, 1);
        assert_eq!(s.ticks_skipped, 1);
    }

    #[test]
    fn test_disabled_collector_counts_nothing() {
        let metrics = MetricsCollector::new(false);
        metrics.record_scan_completed();
        metrics.record_findings(5);
        assert_eq!(metrics.snapshot(), MetricsSnapshot::default());
    }

    #[test]
    fn test_clones_share_counters() {
        let metrics = MetricsCollector::new(true);
        let clone = metrics.clone();
        clone.record_scan_failed();
        assert_eq!(metrics.snapshot().scans_failed, 1);
    }

    #[test]
    fn test_timer() {
        let timer = Timer::start("test_operation");
        std::thread::sleep(Duration::from_millis(10));
        assert!(timer.stop() >= Duration::from_millis(10));
    }
}
