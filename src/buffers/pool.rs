//! Granular buffer pool with byte-count bounds

use std::{backtrace::Backtrace, collections::HashMap};

use log::{debug, error, warn};
use parking_lot::Mutex;

use crate::error::{PayloadError, Result};

use super::{
    bucket::Bucket,
    buffer::Buffer,
    config::BufferPoolConfig,
    stats::{format_histogram, BucketStats, BufferPoolStats},
};

/// What happened to a buffer handed to [`BufferPool::release`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use]
pub enum ReleaseOutcome {
    /// Stored as Free for reuse
    Cached,
    /// Accepted, but dropped because the cache bound was reached
    Dropped,
    /// Already Free in its bucket; pool state untouched
    Duplicate,
    /// Capacity is not a multiple of the granularity; discarded
    Unmanaged,
}

#[derive(Debug, Default)]
struct PoolState {
    buckets: HashMap<usize, Bucket>,
    stats: BufferPoolStats,
    overflow_warned: bool,
}

/// Pool of byte buffers whose capacities are multiples of a fixed granularity.
///
/// Free buffers are grouped into buckets keyed by exact capacity. One lock
/// guards the bucket table, every bucket and all counters, so statistics are
/// never observed mid-update.
#[derive(Debug)]
pub struct BufferPool {
    config: BufferPoolConfig,
    state: Mutex<PoolState>,
}

impl BufferPool {
    /// Create a new buffer pool
    pub fn new(config: BufferPoolConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            state: Mutex::new(PoolState::default()),
        })
    }

    /// Get a buffer of at least `requested` bytes.
    ///
    /// The capacity is `requested` rounded up to the granularity. A Free
    /// buffer of that capacity is reused when one exists; otherwise a new one
    /// is allocated.
    ///
    /// Fails with [`PayloadError::PoolDenied`] when the acquire bound would
    /// be exceeded. The bound counts every loaned-out byte, so a request is
    /// refused even when a Free buffer of the right capacity is waiting in
    /// the cache. Fails with [`PayloadError::InvalidParameter`] when the
    /// rounded capacity cannot be allocated at all; the pool is untouched.
    pub fn acquire(&self, requested: usize) -> Result<Buffer> {
        let capacity = self.config.round_up(requested).ok_or_else(|| {
            PayloadError::invalid_parameter(
                "requested",
                format!(
                    "{} bytes cannot be rounded to granularity {}",
                    requested, self.config.granularity
                ),
            )
        })?;
        let mut guard = self.state.lock();
        let state = &mut *guard;

        if let Some(limit) = self.config.max_acquired_bytes {
            let acquired_bytes = state.stats.current_acquired_bytes;
            if acquired_bytes
                .checked_add(capacity)
                .map_or(true, |total| total > limit)
            {
                state.stats.total_denied += 1;
                let denials = state.stats.total_denied;
                drop(guard);

                if self.should_log_denial(denials) {
                    warn!(
                        "pool '{}' denied {} bytes ({} acquired, limit {}, {} denials so far)",
                        self.config.name, capacity, acquired_bytes, limit, denials
                    );
                }
                return Err(PayloadError::pool_denied(capacity, acquired_bytes, limit));
            }
        }

        let bucket = state.buckets.entry(capacity).or_insert_with(|| {
            debug!("pool '{}' opened bucket for {} bytes", self.config.name, capacity);
            Bucket::new(capacity)
        });

        let (buffer, created) = match bucket.take() {
            Some(buffer) => {
                state.stats.total_cached_bytes -= capacity;
                (buffer, false)
            }
            None => {
                let buffer = Buffer::try_with_capacity(capacity)?;
                bucket.record_created();
                (buffer, true)
            }
        };
        bucket.record_acquired();
        state.stats.record_acquire(capacity, created);

        Ok(buffer)
    }

    /// Return a buffer to the pool.
    ///
    /// Integrity problems are logged and counted, never raised: a buffer
    /// whose capacity this pool could not have produced is discarded, and a
    /// buffer already Free in its bucket leaves the pool untouched.
    pub fn release(&self, mut buffer: Buffer) -> ReleaseOutcome {
        let capacity = buffer.capacity();
        let granularity = self.config.granularity;

        if capacity == 0 || capacity % granularity != 0 {
            self.state.lock().stats.total_unmanaged += 1;
            error!(
                "pool '{}': {}",
                self.config.name,
                PayloadError::UnmanagedBuffer {
                    capacity,
                    granularity
                }
            );
            return ReleaseOutcome::Unmanaged;
        }

        buffer.clear();
        let id = buffer.id();

        let mut guard = self.state.lock();
        let state = &mut *guard;

        if state
            .buckets
            .get(&capacity)
            .is_some_and(|bucket| bucket.contains(id))
        {
            state.stats.total_duplicates += 1;
            drop(guard);
            error!(
                "pool '{}': {}\n{}",
                self.config.name,
                PayloadError::DuplicateRelease {
                    id: id.get(),
                    capacity
                },
                Backtrace::force_capture()
            );
            return ReleaseOutcome::Duplicate;
        }

        state.stats.record_return(capacity);

        if let Some(limit) = self.config.max_cached_bytes {
            if state.stats.total_cached_bytes + capacity > limit {
                state.stats.total_dropped += 1;
                if !state.overflow_warned {
                    state.overflow_warned = true;
                    warn!(
                        "pool '{}' cache full ({} of {} bytes); dropping returned buffers",
                        self.config.name, state.stats.total_cached_bytes, limit
                    );
                }
                return ReleaseOutcome::Dropped;
            }
        }

        let bucket = state
            .buckets
            .entry(capacity)
            .or_insert_with(|| Bucket::new(capacity));
        let inserted = bucket.insert(buffer).is_ok();
        debug_assert!(inserted, "identity checked under the same lock");

        state.stats.total_cached_bytes += capacity;
        state.overflow_warned = false;
        ReleaseOutcome::Cached
    }

    /// Like [`release`](Self::release), but report integrity problems as errors
    pub fn release_checked(&self, buffer: Buffer) -> Result<()> {
        let id = buffer.id().get();
        let capacity = buffer.capacity();
        match self.release(buffer) {
            ReleaseOutcome::Cached | ReleaseOutcome::Dropped => Ok(()),
            ReleaseOutcome::Duplicate => Err(PayloadError::DuplicateRelease { id, capacity }),
            ReleaseOutcome::Unmanaged => Err(PayloadError::UnmanagedBuffer {
                capacity,
                granularity: self.config.granularity,
            }),
        }
    }

    /// Drop every Free buffer and reset the per-capacity histogram.
    ///
    /// Loaned-out buffers and the pool-wide counters are unaffected, apart
    /// from the cached-bytes gauge and [`BufferPoolStats::total_cleared`].
    pub fn flush(&self) {
        let mut guard = self.state.lock();
        let state = &mut *guard;

        let mut dropped = 0;
        for bucket in state.buckets.values_mut() {
            dropped += bucket.clear();
        }
        let freed = state.stats.total_cached_bytes;
        state.stats.total_cached_bytes = 0;
        state.stats.total_cleared += dropped as u64;
        state.overflow_warned = false;

        debug!(
            "pool '{}' flushed {} buffers ({} bytes)",
            self.config.name, dropped, freed
        );
    }

    /// True when every acquired buffer has been returned
    pub fn is_balanced(&self) -> bool {
        self.state.lock().stats.is_balanced()
    }

    /// Snapshot of the pool-wide counters
    pub fn stats(&self) -> BufferPoolStats {
        self.state.lock().stats.clone()
    }

    /// Buffers allocated by the pool
    pub fn total_created(&self) -> u64 {
        self.state.lock().stats.total_created
    }

    /// Successful acquisitions
    pub fn total_acquired(&self) -> u64 {
        self.state.lock().stats.total_acquired
    }

    /// Releases accepted
    pub fn total_returned(&self) -> u64 {
        self.state.lock().stats.total_returned
    }

    /// Buffers currently loaned out
    pub fn current_acquired_count(&self) -> u64 {
        self.state.lock().stats.current_acquired_count
    }

    /// Bytes currently loaned out
    pub fn current_acquired_bytes(&self) -> usize {
        self.state.lock().stats.current_acquired_bytes
    }

    /// Bytes held as Free buffers
    pub fn total_cached_bytes(&self) -> usize {
        self.state.lock().stats.total_cached_bytes
    }

    /// Number of Free buffers of exactly `capacity` bytes
    pub fn free_count(&self, capacity: usize) -> usize {
        self.state
            .lock()
            .buckets
            .get(&capacity)
            .map_or(0, Bucket::len)
    }

    /// Per-capacity counters, sorted by capacity
    pub fn bucket_stats(&self) -> Vec<(usize, BucketStats)> {
        let state = self.state.lock();
        let mut rows: Vec<_> = state
            .buckets
            .values()
            .map(|bucket| (bucket.capacity(), bucket.stats()))
            .collect();
        rows.sort_unstable_by_key(|(capacity, _)| *capacity);
        rows
    }

    /// Per-capacity counters as a printable table
    pub fn histogram_report(&self) -> String {
        format!(
            "pool '{}' (granularity {})\n{}",
            self.config.name,
            self.config.granularity,
            format_histogram(&self.bucket_stats())
        )
    }

    /// Get pool configuration
    pub fn config(&self) -> &BufferPoolConfig {
        &self.config
    }

    fn should_log_denial(&self, denials: u64) -> bool {
        let burst = self.config.denial_log_burst;
        denials <= burst || (denials - burst) % self.config.denial_log_interval == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pool(granularity: usize) -> BufferPool {
        BufferPool::new(BufferPoolConfig::new("unit").with_granularity(granularity)).unwrap()
    }

    #[test]
    fn test_duplicate_release_leaves_state_unchanged() {
        let pool = pool(64);
        let buffer = pool.acquire(10).unwrap();
        let twin = buffer.forge_duplicate();

        assert_eq!(pool.release(buffer), ReleaseOutcome::Cached);
        let before = pool.stats();

        assert_eq!(pool.release(twin), ReleaseOutcome::Duplicate);
        let after = pool.stats();
        assert_eq!(after.total_cached_bytes, before.total_cached_bytes);
        assert_eq!(after.total_returned, before.total_returned);
        assert_eq!(after.total_duplicates, 1);
        assert_eq!(pool.free_count(64), 1);
        assert!(pool.is_balanced());
    }

    #[test]
    fn test_denial_log_rate_limit() {
        let config = BufferPoolConfig::new("quiet")
            .with_granularity(8)
            .with_denial_logging(3, 5);
        let pool = BufferPool::new(config).unwrap();

        let logged: Vec<u64> = (1..=20).filter(|&n| pool.should_log_denial(n)).collect();
        assert_eq!(logged, vec![1, 2, 3, 8, 13, 18]);
    }

    #[test]
    fn test_overflow_warning_rearms_after_cache() {
        let config = BufferPoolConfig::new("bounded")
            .with_granularity(16)
            .with_max_cached_bytes(Some(16));
        let pool = BufferPool::new(config).unwrap();

        let a = pool.acquire(16).unwrap();
        let b = pool.acquire(16).unwrap();
        assert_eq!(pool.release(a), ReleaseOutcome::Cached);
        assert_eq!(pool.release(b), ReleaseOutcome::Dropped);
        assert!(pool.state.lock().overflow_warned);

        let c = pool.acquire(16).unwrap();
        assert_eq!(pool.release(c), ReleaseOutcome::Cached);
        assert!(!pool.state.lock().overflow_warned);
    }

    #[test]
    fn test_release_checked_reports_integrity_errors() {
        let _ = env_logger::builder().is_test(true).try_init();
        let pool = pool(32);

        let buffer = pool.acquire(1).unwrap();
        let twin = buffer.forge_duplicate();
        pool.release_checked(buffer).unwrap();
        assert!(matches!(
            pool.release_checked(twin),
            Err(PayloadError::DuplicateRelease { capacity: 32, .. })
        ));
        assert!(matches!(
            pool.release_checked(Buffer::from_vec(vec![0; 33])),
            Err(PayloadError::UnmanagedBuffer {
                capacity: 33,
                granularity: 32
            })
        ));
    }
}
