//! Move-only byte buffer handed out by the pool

use std::{fmt, time::SystemTime};

use crate::error::{PayloadError, Result};

use super::stats::next_buffer_sequence;

/// Process-unique identity of a buffer, stable across pool round trips
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BufferId(u64);

impl BufferId {
    fn next() -> Self {
        Self(next_buffer_sequence())
    }

    /// Raw sequence number
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for BufferId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Fixed-capacity byte region with a write cursor (`len`) and a read
/// cursor (`position`).
///
/// Buffers are deliberately not `Clone`: handing one back to
/// [`BufferPool::release`](super::BufferPool::release) moves it, so a
/// released buffer cannot be touched again.
///
/// ```compile_fail
/// use daq_payload::buffers::{BufferPool, BufferPoolConfig};
///
/// let pool = BufferPool::new(BufferPoolConfig::default()).unwrap();
/// let buffer = pool.acquire(100).unwrap();
/// pool.release(buffer);
/// pool.release(buffer);
/// ```
pub struct Buffer {
    data: Box<[u8]>,
    len: usize,
    position: usize,
    id: BufferId,
    allocated_at: SystemTime,
}

impl Buffer {
    /// Allocate a zeroed buffer of exactly `capacity` bytes
    pub fn with_capacity(capacity: usize) -> Self {
        Self::from_storage(vec![0u8; capacity].into_boxed_slice(), 0)
    }

    /// Like [`with_capacity`](Self::with_capacity), but report an allocation
    /// failure instead of aborting
    pub fn try_with_capacity(capacity: usize) -> Result<Self> {
        let mut data = Vec::new();
        data.try_reserve_exact(capacity).map_err(|e| {
            PayloadError::invalid_parameter(
                "capacity",
                format!("cannot allocate {} bytes: {}", capacity, e),
            )
        })?;
        data.resize(capacity, 0);
        Ok(Self::from_storage(data.into_boxed_slice(), 0))
    }

    /// Adopt caller-owned storage; the whole vector counts as written data
    pub fn from_vec(data: Vec<u8>) -> Self {
        let len = data.len();
        Self::from_storage(data.into_boxed_slice(), len)
    }

    fn from_storage(data: Box<[u8]>, len: usize) -> Self {
        Self {
            data,
            len,
            position: 0,
            id: BufferId::next(),
            allocated_at: SystemTime::now(),
        }
    }

    /// Identity used by the pool to detect double insertion
    pub fn id(&self) -> BufferId {
        self.id
    }

    /// Fixed capacity in bytes
    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// Number of bytes written
    pub fn len(&self) -> usize {
        self.len
    }

    /// True when nothing has been written
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Current read cursor
    pub fn position(&self) -> usize {
        self.position
    }

    /// Bytes written but not yet read
    pub fn remaining(&self) -> usize {
        self.len - self.position
    }

    /// Creation time of the underlying storage
    pub fn allocated_at(&self) -> SystemTime {
        self.allocated_at
    }

    /// Written bytes
    pub fn as_slice(&self) -> &[u8] {
        &self.data[..self.len]
    }

    /// Written bytes, mutably
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.data[..self.len]
    }

    /// Reset both cursors; contents are left as-is
    pub fn clear(&mut self) {
        self.len = 0;
        self.position = 0;
    }

    /// Set the write cursor, exposing `len` bytes of the backing storage
    pub fn set_len(&mut self, len: usize) -> Result<()> {
        if len > self.capacity() {
            return Err(PayloadError::invalid_parameter(
                "len",
                format!("{} exceeds capacity {}", len, self.capacity()),
            ));
        }
        self.len = len;
        self.position = self.position.min(len);
        Ok(())
    }

    /// Write `data` at `offset`, extending the write cursor if needed
    pub fn write(&mut self, offset: usize, data: &[u8]) -> Result<()> {
        let end = offset
            .checked_add(data.len())
            .filter(|&end| end <= self.capacity())
            .ok_or_else(|| {
                PayloadError::truncated(offset, data.len(), self.capacity().saturating_sub(offset))
            })?;

        self.data[offset..end].copy_from_slice(data);
        if end > self.len {
            self.len = end;
        }
        Ok(())
    }

    /// Append at the write cursor
    pub fn extend_from_slice(&mut self, data: &[u8]) -> Result<()> {
        self.write(self.len, data)
    }

    /// Copy the next `dest.len()` unread bytes into `dest`
    pub fn read_exact(&mut self, dest: &mut [u8]) -> Result<()> {
        if dest.len() > self.remaining() {
            return Err(PayloadError::truncated(
                self.position,
                dest.len(),
                self.remaining(),
            ));
        }
        let start = self.position;
        dest.copy_from_slice(&self.data[start..start + dest.len()]);
        self.position += dest.len();
        Ok(())
    }

    /// Full backing storage, independent of the cursors
    pub(crate) fn storage_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Give up the storage, truncated to the written length
    pub fn into_vec(self) -> Vec<u8> {
        let mut data = self.data.into_vec();
        data.truncate(self.len);
        data
    }

    #[cfg(test)]
    pub(crate) fn forge_duplicate(&self) -> Self {
        Self {
            data: vec![0u8; self.capacity()].into_boxed_slice(),
            len: 0,
            position: 0,
            id: self.id,
            allocated_at: self.allocated_at,
        }
    }
}

impl fmt::Debug for Buffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Buffer")
            .field("id", &self.id)
            .field("capacity", &self.capacity())
            .field("len", &self.len)
            .field("position", &self.position)
            .finish()
    }
}

impl AsRef<[u8]> for Buffer {
    fn as_ref(&self) -> &[u8] {
        self.as_slice()
    }
}

impl AsMut<[u8]> for Buffer {
    fn as_mut(&mut self) -> &mut [u8] {
        self.as_mut_slice()
    }
}
