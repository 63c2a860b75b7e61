//! Run counters for the pipeline.
//!
//! Counters are additive observability: per-record errors never surface to
//! the pipeline caller, but the totals are available once a run finishes.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Counters shared by every pipeline stage.
#[derive(Debug, Default)]
pub struct PipelineMetrics {
    /// Records successfully decoded from the input stream
    pub decoded: AtomicU64,

    /// Records that passed the whole transform chain
    pub accepted: AtomicU64,

    /// Records dropped by a rejecting transform
    pub rejected: AtomicU64,

    /// Decode failures (each one also terminates the decode stage)
    pub decode_failures: AtomicU64,

    /// Records that failed to serialize or write
    pub encode_failures: AtomicU64,

    /// Records written to the output stream
    pub written: AtomicU64,
}

impl PipelineMetrics {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn add_decoded(&self) {
        self.decoded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_accepted(&self) {
        self.accepted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_rejected(&self) {
        self.rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_decode_failure(&self) {
        self.decode_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_encode_failure(&self) {
        self.encode_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_written(&self) {
        self.written.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> PipelineStats {
        PipelineStats {
            decoded: self.decoded.load(Ordering::Relaxed),
            accepted: self.accepted.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            decode_failures: self.decode_failures.load(Ordering::Relaxed),
            encode_failures: self.encode_failures.load(Ordering::Relaxed),
            written: self.written.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of the run counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipelineStats {
    pub decoded: u64,
    pub accepted: u64,
    pub rejected: u64,
    pub decode_failures: u64,
    pub encode_failures: u64,
    pub written: u64,
}

impl fmt::Display for PipelineStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Decoded: {} | Accepted: {} | Rejected: {} | Written: {} | \
             Decode failures: {} | Encode failures: {}",
            self.decoded,
            self.accepted,
            self.rejected,
            self.written,
            self.decode_failures,
            self.encode_failures,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_increment() {
        let metrics = PipelineMetrics::new();

        metrics.add_decoded();
        metrics.add_decoded();
        metrics.add_rejected();

        assert_eq!(metrics.decoded.load(Ordering::Relaxed), 2);
        assert_eq!(metrics.rejected.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_metrics_snapshot() {
        let metrics = PipelineMetrics::new();

        metrics.add_decoded();
        metrics.add_accepted();
        metrics.add_written();
        metrics.add_decode_failure();
        metrics.add_encode_failure();
        metrics.add_rejected();

        let stats = metrics.snapshot();
        assert_eq!(stats.decoded, 1);
        assert_eq!(stats.accepted, 1);
        assert_eq!(stats.written, 1);
        assert_eq!(stats.decode_failures, 1);
        assert_eq!(stats.encode_failures, 1);
        assert_eq!(stats.rejected, 1);
    }

    #[test]
    fn test_stats_display() {
        let stats = PipelineStats {
            decoded: 10,
            accepted: 7,
            rejected: 3,
            decode_failures: 1,
            encode_failures: 0,
            written: 7,
        };

        let display = stats.to_string();
        assert!(display.contains("Decoded: 10"));
        assert!(display.contains("Accepted: 7"));
        assert!(display.contains("Rejected: 3"));
        assert!(display.contains("Written: 7"));
    }
}
