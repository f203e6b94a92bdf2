use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Pipeline counters, updated lock-free from any worker thread.
#[derive(Debug, Default)]
pub struct PipelineStats {
    received: AtomicU64,
    rejected: AtomicU64,
    unmatched: AtomicU64,
    detections: AtomicU64,
    anomalies: AtomicU64,
}

/// Point-in-time copy of [`PipelineStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    /// Samples handed to the pipeline.
    pub received: u64,
    /// Samples dropped for a non-finite value.
    pub rejected: u64,
    /// Samples no rule matched.
    pub unmatched: u64,
    /// (sample, rule) evaluations performed.
    pub detections: u64,
    /// Evaluations classified as anomalous.
    pub anomalies: u64,
}

impl PipelineStats {
    pub fn record_received(&self) {
        self.received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_rejected(&self) {
        self.rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_unmatched(&self) {
        self.unmatched.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_detection(&self, anomalous: bool) {
        self.detections.fetch_add(1, Ordering::Relaxed);
        if anomalous {
            self.anomalies.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            received: self.received.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            unmatched: self.unmatched.load(Ordering::Relaxed),
            detections: self.detections.load(Ordering::Relaxed),
            anomalies: self.anomalies.load(Ordering::Relaxed),
        }
    }
}
