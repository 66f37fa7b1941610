//! Free buffers sharing one exact capacity

use std::collections::HashSet;

use super::{
    buffer::{Buffer, BufferId},
    stats::BucketStats,
};

/// Free list for a single capacity; membership is tracked by identity
#[derive(Debug)]
pub struct Bucket {
    capacity: usize,
    free: Vec<Buffer>,
    members: HashSet<BufferId>,
    stats: BucketStats,
}

impl Bucket {
    /// Create an empty bucket
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            free: Vec::new(),
            members: HashSet::new(),
            stats: BucketStats::default(),
        }
    }

    /// Capacity of every member
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of Free buffers
    pub fn len(&self) -> usize {
        self.free.len()
    }

    /// True when no Free buffer is held
    pub fn is_empty(&self) -> bool {
        self.free.is_empty()
    }

    /// Whether a buffer with this identity is already Free here
    pub fn contains(&self, id: BufferId) -> bool {
        self.members.contains(&id)
    }

    /// Histogram counters
    pub fn stats(&self) -> BucketStats {
        self.stats
    }

    /// Take any Free buffer, counting it as a bucket hit
    pub fn take(&mut self) -> Option<Buffer> {
        let buffer = self.free.pop()?;
        self.members.remove(&buffer.id());
        self.stats.removed += 1;
        self.stats.cached -= 1;
        Some(buffer)
    }

    /// Insert a Free buffer; hands it back if the identity is already present
    pub fn insert(&mut self, buffer: Buffer) -> Result<(), Buffer> {
        debug_assert_eq!(buffer.capacity(), self.capacity);
        if !self.members.insert(buffer.id()) {
            return Err(buffer);
        }
        self.free.push(buffer);
        self.stats.cached += 1;
        Ok(())
    }

    pub(crate) fn record_created(&mut self) {
        self.stats.created += 1;
    }

    pub(crate) fn record_acquired(&mut self) {
        self.stats.acquired += 1;
    }

    /// Drop every Free buffer and start the histogram row over.
    ///
    /// Returns how many buffers were dropped; the fresh row records that
    /// number as `cleared`.
    pub fn clear(&mut self) -> usize {
        let dropped = self.free.len();
        self.free.clear();
        self.members.clear();
        self.stats = BucketStats {
            cleared: dropped as u64,
            ..BucketStats::default()
        };
        dropped
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_take_and_identity() {
        let mut bucket = Bucket::new(64);
        let buffer = Buffer::with_capacity(64);
        let id = buffer.id();

        bucket.insert(buffer).unwrap();
        assert!(bucket.contains(id));
        assert_eq!(bucket.stats().cached, 1);

        let taken = bucket.take().unwrap();
        assert_eq!(taken.id(), id);
        assert!(!bucket.contains(id));
        assert_eq!(bucket.stats().removed, 1);
        assert_eq!(bucket.stats().cached, 0);
        assert!(bucket.take().is_none());
    }

    #[test]
    fn test_duplicate_insert_is_refused() {
        let mut bucket = Bucket::new(32);
        let buffer = Buffer::with_capacity(32);
        let twin = buffer.forge_duplicate();

        bucket.insert(buffer).unwrap();
        let refused = bucket.insert(twin).unwrap_err();
        assert_eq!(refused.capacity(), 32);
        assert_eq!(bucket.len(), 1);
        assert_eq!(bucket.stats().cached, 1);
    }

    #[test]
    fn test_clear_resets_histogram() {
        let mut bucket = Bucket::new(16);
        bucket.record_created();
        bucket.record_acquired();
        bucket.insert(Buffer::with_capacity(16)).unwrap();
        bucket.insert(Buffer::with_capacity(16)).unwrap();
        bucket.take().unwrap();

        assert_eq!(bucket.clear(), 1);
        assert!(bucket.is_empty());
        assert_eq!(
            bucket.stats(),
            BucketStats {
                cleared: 1,
                ..BucketStats::default()
            }
        );

        assert_eq!(bucket.clear(), 0);
        assert_eq!(bucket.stats(), BucketStats::default());
    }
}
