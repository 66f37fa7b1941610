//! Record reader over any byte source

use std::{
    io::{ErrorKind, Read},
    sync::Arc,
};

use log::debug;

use crate::{
    buffers::{Buffer, BufferPool},
    error::{PayloadError, Result},
    payloads::{Dispatcher, Payload, ENVELOPE_LEN, STOP_MARKER_LEN},
};

/// Largest record a reader accepts unless told otherwise (64 MiB)
pub const DEFAULT_MAX_RECORD_LEN: usize = 64 * 1024 * 1024;

/// Splits a byte stream into whole records, one buffer per record.
///
/// Reading ends at the stop marker or at a clean end of input on a record
/// boundary. A record cut short is a format error, and so is a length
/// prefix above the reader's record limit; nothing is allocated for it.
#[derive(Debug)]
pub struct RecordReader<R> {
    inner: R,
    pool: Option<Arc<BufferPool>>,
    max_record_len: usize,
    records_read: u64,
    bytes_read: u64,
    finished: bool,
}

impl<R: Read> RecordReader<R> {
    /// Reader allocating record buffers directly
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            pool: None,
            max_record_len: DEFAULT_MAX_RECORD_LEN,
            records_read: 0,
            bytes_read: 0,
            finished: false,
        }
    }

    /// Take record buffers from `pool`
    pub fn with_pool(mut self, pool: Arc<BufferPool>) -> Self {
        self.pool = Some(pool);
        self
    }

    /// Refuse records longer than `len` bytes
    pub fn with_max_record_len(mut self, len: usize) -> Self {
        self.max_record_len = len;
        self
    }

    /// Longest record this reader accepts
    pub fn max_record_len(&self) -> usize {
        self.max_record_len
    }

    /// Records returned so far
    pub fn records_read(&self) -> u64 {
        self.records_read
    }

    /// Bytes consumed so far, stop marker excluded
    pub fn bytes_read(&self) -> u64 {
        self.bytes_read
    }

    /// Whether the end of the stream has been reached
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Read the next whole record
    pub fn next_record(&mut self) -> Result<Option<Buffer>> {
        if self.finished {
            return Ok(None);
        }

        let mut prefix = [0u8; 4];
        match read_full(&mut self.inner, &mut prefix)? {
            0 => {
                self.finished = true;
                return Ok(None);
            }
            4 => {}
            n => {
                self.finished = true;
                return Err(PayloadError::truncated(self.bytes_read as usize, 4, n));
            }
        }

        let length = u32::from_be_bytes(prefix);
        if length == STOP_MARKER_LEN {
            debug!("stop marker after {} records", self.records_read);
            self.finished = true;
            return Ok(None);
        }

        let len = length as usize;
        if len < ENVELOPE_LEN {
            self.finished = true;
            return Err(PayloadError::format(
                self.bytes_read as usize,
                format!("record length {} is shorter than the envelope", length),
            ));
        }

        if len > self.max_record_len {
            self.finished = true;
            return Err(PayloadError::format(
                self.bytes_read as usize,
                format!(
                    "record length {} exceeds the {} byte limit",
                    length, self.max_record_len
                ),
            ));
        }

        let mut buffer = match &self.pool {
            Some(pool) => pool.acquire(len)?,
            None => Buffer::try_with_capacity(len)?,
        };
        if let Err(e) = self.fill(&mut buffer, prefix, len) {
            self.finished = true;
            if let Some(pool) = &self.pool {
                let _ = pool.release(buffer);
            }
            return Err(e);
        }

        self.records_read += 1;
        self.bytes_read += len as u64;
        Ok(Some(buffer))
    }

    /// Read the next record and decode it with `dispatcher`; the payload
    /// keeps the record buffer
    pub fn next_payload(&mut self, dispatcher: &Dispatcher) -> Result<Option<Payload>> {
        match self.next_record()? {
            Some(buffer) => dispatcher.decode_buffer(buffer),
            None => Ok(None),
        }
    }

    /// Give up the underlying source
    pub fn into_inner(self) -> R {
        self.inner
    }

    fn fill(&mut self, buffer: &mut Buffer, prefix: [u8; 4], len: usize) -> Result<()> {
        buffer.set_len(len)?;
        let record = buffer.as_mut_slice();
        record[..4].copy_from_slice(&prefix);

        let got = read_full(&mut self.inner, &mut record[4..])?;
        if got + 4 < len {
            return Err(PayloadError::truncated(self.bytes_read as usize, len, got + 4));
        }
        Ok(())
    }
}

impl<R: Read> Iterator for RecordReader<R> {
    type Item = Result<Buffer>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_record().transpose()
    }
}

/// Read until `buf` is full or the source is exhausted
fn read_full<R: Read>(reader: &mut R, buf: &mut [u8]) -> Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(PayloadError::from_io(e, "reading record stream")),
        }
    }
    Ok(filled)
}
