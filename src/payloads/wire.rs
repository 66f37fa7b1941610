//! Big-endian cursor helpers shared by the record codecs

use crate::error::{PayloadError, Result};

/// Bounds-checked big-endian reader over a byte slice
pub(crate) struct WireReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> WireReader<'a> {
    pub(crate) fn new(data: &'a [u8], pos: usize) -> Self {
        Self { data, pos }
    }

    pub(crate) fn position(&self) -> usize {
        self.pos
    }

    fn take<const N: usize>(&mut self) -> Result<[u8; N]> {
        let end = self
            .pos
            .checked_add(N)
            .filter(|&end| end <= self.data.len())
            .ok_or_else(|| {
                PayloadError::truncated(self.pos, N, self.data.len().saturating_sub(self.pos))
            })?;
        let mut out = [0u8; N];
        out.copy_from_slice(&self.data[self.pos..end]);
        self.pos = end;
        Ok(out)
    }

    pub(crate) fn u16(&mut self) -> Result<u16> {
        self.take().map(u16::from_be_bytes)
    }

    pub(crate) fn i16(&mut self) -> Result<i16> {
        self.take().map(i16::from_be_bytes)
    }

    pub(crate) fn u32(&mut self) -> Result<u32> {
        self.take().map(u32::from_be_bytes)
    }

    pub(crate) fn i32(&mut self) -> Result<i32> {
        self.take().map(i32::from_be_bytes)
    }

    pub(crate) fn u64(&mut self) -> Result<u64> {
        self.take().map(u64::from_be_bytes)
    }

    pub(crate) fn i64(&mut self) -> Result<i64> {
        self.take().map(i64::from_be_bytes)
    }
}

/// Bounds-checked big-endian writer over a mutable byte slice
pub(crate) struct WireWriter<'a> {
    data: &'a mut [u8],
    pos: usize,
}

impl<'a> WireWriter<'a> {
    pub(crate) fn new(data: &'a mut [u8], pos: usize) -> Self {
        Self { data, pos }
    }

    #[cfg(test)]
    pub(crate) fn position(&self) -> usize {
        self.pos
    }

    fn put<const N: usize>(&mut self, bytes: [u8; N]) -> Result<()> {
        let end = self
            .pos
            .checked_add(N)
            .filter(|&end| end <= self.data.len())
            .ok_or_else(|| {
                PayloadError::truncated(self.pos, N, self.data.len().saturating_sub(self.pos))
            })?;
        self.data[self.pos..end].copy_from_slice(&bytes);
        self.pos = end;
        Ok(())
    }

    pub(crate) fn u16(&mut self, value: u16) -> Result<()> {
        self.put(value.to_be_bytes())
    }

    pub(crate) fn i16(&mut self, value: i16) -> Result<()> {
        self.put(value.to_be_bytes())
    }

    pub(crate) fn u32(&mut self, value: u32) -> Result<()> {
        self.put(value.to_be_bytes())
    }

    pub(crate) fn i32(&mut self, value: i32) -> Result<()> {
        self.put(value.to_be_bytes())
    }

    pub(crate) fn u64(&mut self, value: u64) -> Result<()> {
        self.put(value.to_be_bytes())
    }

    pub(crate) fn i64(&mut self, value: i64) -> Result<()> {
        self.put(value.to_be_bytes())
    }
}
