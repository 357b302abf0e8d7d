//! Run metrics

use std::sync::atomic::{AtomicU64, Ordering};

/// Counters for one export run
#[derive(Debug, Default)]
pub struct Metrics {
    sites_seen: AtomicU64,
    dates_seen: AtomicU64,
    reports_written: AtomicU64,
    reports_skipped: AtomicU64,
    bytes_written: AtomicU64,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn site_seen(&self) {
        self.sites_seen.fetch_add(1, Ordering::Relaxed);
    }

    pub fn date_seen(&self) {
        self.dates_seen.fetch_add(1, Ordering::Relaxed);
    }

    pub fn report_written(&self, bytes: u64) {
        self.reports_written.fetch_add(1, Ordering::Relaxed);
        self.bytes_written.fetch_add(bytes, Ordering::Relaxed);
        tracing::debug!(counter = "reports_written", "Metric incremented");
    }

    pub fn report_skipped(&self) {
        self.reports_skipped.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(counter = "reports_skipped", "Metric incremented");
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            sites_seen: self.sites_seen.load(Ordering::Relaxed),
            dates_seen: self.dates_seen.load(Ordering::Relaxed),
            reports_written: self.reports_written.load(Ordering::Relaxed),
            reports_skipped: self.reports_skipped.load(Ordering::Relaxed),
            bytes_written: self.bytes_written.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone)]
pub struct MetricsSnapshot {
    pub sites_seen: u64,
    pub dates_seen: u64,
    pub reports_written: u64,
    pub reports_skipped: u64,
    pub bytes_written: u64,
}
