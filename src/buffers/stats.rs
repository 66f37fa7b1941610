//! Buffer pool statistics tracking

use std::fmt::Write as _;

use serde::Serialize;

/// Per-capacity histogram counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BucketStats {
    /// Buffers of this capacity ever allocated
    pub created: u64,
    /// Buffers of this capacity currently Free
    pub cached: u64,
    /// Acquisitions served at this capacity (hits and creations)
    pub acquired: u64,
    /// Free buffers taken out to satisfy an acquire
    pub removed: u64,
    /// Free buffers dropped by the flush that last reset this row
    pub cleared: u64,
}

/// Pool-wide counters, updated under the pool lock
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BufferPoolStats {
    /// Buffers allocated by the pool
    pub total_created: u64,
    /// Successful acquisitions
    pub total_acquired: u64,
    /// Releases accepted (cached or dropped by the cache bound)
    pub total_returned: u64,
    /// Acquisitions refused by the acquire bound
    pub total_denied: u64,
    /// Releases dropped by the cache bound
    pub total_dropped: u64,
    /// Releases rejected because the capacity was not granular
    pub total_unmanaged: u64,
    /// Releases rejected because the buffer was already Free
    pub total_duplicates: u64,
    /// Buffers currently loaned out
    pub current_acquired_count: u64,
    /// Bytes currently loaned out
    pub current_acquired_bytes: usize,
    /// Highest value of `current_acquired_bytes`
    pub peak_acquired_bytes: usize,
    /// Bytes held as Free buffers
    pub total_cached_bytes: usize,
    /// Free buffers dropped by every flush so far
    pub total_cleared: u64,
}

impl BufferPoolStats {
    /// Create new statistics instance
    pub fn new() -> Self {
        Default::default()
    }

    /// Fraction of acquisitions served from the cache
    pub fn hit_rate(&self) -> f64 {
        if self.total_acquired == 0 {
            return 0.0;
        }
        let hits = self.total_acquired.saturating_sub(self.total_created);
        hits as f64 / self.total_acquired as f64
    }

    /// Leak oracle: every acquire matched by a release and nothing outstanding
    pub fn is_balanced(&self) -> bool {
        self.total_acquired == self.total_returned && self.current_acquired_count == 0
    }

    pub(crate) fn record_acquire(&mut self, capacity: usize, created: bool) {
        self.total_acquired += 1;
        if created {
            self.total_created += 1;
        }
        self.current_acquired_count += 1;
        self.current_acquired_bytes += capacity;
        if self.current_acquired_bytes > self.peak_acquired_bytes {
            self.peak_acquired_bytes = self.current_acquired_bytes;
        }
    }

    pub(crate) fn record_return(&mut self, capacity: usize) {
        self.total_returned += 1;
        self.current_acquired_count = self.current_acquired_count.saturating_sub(1);
        self.current_acquired_bytes = self.current_acquired_bytes.saturating_sub(capacity);
    }

    /// Get a summary string of the statistics
    pub fn summary(&self) -> String {
        format!(
            "BufferPoolStats {{ created: {}, acquired: {}, returned: {}, denied: {}, \
             dropped: {}, cleared: {}, outstanding: {} ({} bytes, peak {}), cached: {} bytes, \
             hit_rate: {:.2}% }}",
            self.total_created,
            self.total_acquired,
            self.total_returned,
            self.total_denied,
            self.total_dropped,
            self.total_cleared,
            self.current_acquired_count,
            self.current_acquired_bytes,
            self.peak_acquired_bytes,
            self.total_cached_bytes,
            self.hit_rate() * 100.0
        )
    }
}

/// Render per-capacity counters as a fixed-width table
pub fn format_histogram(rows: &[(usize, BucketStats)]) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{:>10} {:>10} {:>10} {:>10} {:>10} {:>10}",
        "capacity", "created", "cached", "acquired", "removed", "cleared"
    );
    for (capacity, stats) in rows {
        let _ = writeln!(
            out,
            "{:>10} {:>10} {:>10} {:>10} {:>10} {:>10}",
            capacity, stats.created, stats.cached, stats.acquired, stats.removed, stats.cleared
        );
    }
    out
}

/// Helper for generating buffer sequence numbers
pub fn next_buffer_sequence() -> u64 {
    static SEQUENCE_COUNTER: std::sync::atomic::AtomicU64 = std::sync::atomic::AtomicU64::new(1);
    SEQUENCE_COUNTER.fetch_add(1, std::sync::atomic::Ordering::Relaxed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_acquire_return_accounting() {
        let mut stats = BufferPoolStats::new();
        stats.record_acquire(256, true);
        stats.record_acquire(128, false);
        assert_eq!(stats.current_acquired_bytes, 384);
        assert_eq!(stats.peak_acquired_bytes, 384);
        assert!(!stats.is_balanced());

        stats.record_return(256);
        stats.record_return(128);
        assert_eq!(stats.current_acquired_bytes, 0);
        assert_eq!(stats.peak_acquired_bytes, 384);
        assert!(stats.is_balanced());
        assert!((stats.hit_rate() - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_histogram_layout() {
        let rows = vec![(
            128,
            BucketStats {
                created: 2,
                cached: 1,
                acquired: 5,
                removed: 3,
                cleared: 0,
            },
        )];
        let report = format_histogram(&rows);
        let lines: Vec<&str> = report.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("capacity"));
        assert!(lines[1].trim_start().starts_with("128"));
    }
}
