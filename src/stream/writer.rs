//! Record writer over any byte sink

use std::io::Write;

use crate::{
    error::{PayloadError, Result},
    payloads::{read_record_length, Dispatcher, Payload, STOP_MARKER_LEN},
};

/// Writes framed records and terminates the stream with the stop marker
#[derive(Debug)]
pub struct RecordWriter<W: Write> {
    inner: W,
    records_written: u64,
    bytes_written: u64,
}

impl<W: Write> RecordWriter<W> {
    /// Wrap a sink
    pub fn new(inner: W) -> Self {
        Self {
            inner,
            records_written: 0,
            bytes_written: 0,
        }
    }

    /// Records written so far
    pub fn records_written(&self) -> u64 {
        self.records_written
    }

    /// Bytes written so far, stop marker excluded
    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    /// Write one already-encoded record; its length prefix must match
    pub fn write_record(&mut self, record: &[u8]) -> Result<()> {
        let declared = read_record_length(record, 0)? as usize;
        if declared != record.len() {
            return Err(PayloadError::invalid_parameter(
                "record",
                format!("length prefix {} but {} bytes given", declared, record.len()),
            ));
        }

        self.inner
            .write_all(record)
            .map_err(|e| PayloadError::from_io(e, "writing record"))?;
        self.records_written += 1;
        self.bytes_written += record.len() as u64;
        Ok(())
    }

    /// Encode `payload` through `dispatcher` and write it
    pub fn write_payload(&mut self, dispatcher: &Dispatcher, payload: &Payload) -> Result<()> {
        let buffer = dispatcher.encode_to_buffer(payload)?;
        let written = self.write_record(buffer.as_slice());
        if let Some(pool) = dispatcher.pool() {
            let _ = pool.release(buffer);
        }
        written
    }

    /// Write the stop marker, flush and return the sink
    pub fn finish(mut self) -> Result<W> {
        self.inner
            .write_all(&STOP_MARKER_LEN.to_be_bytes())
            .and_then(|_| self.inner.flush())
            .map_err(|e| PayloadError::from_io(e, "finishing record stream"))?;
        Ok(self.inner)
    }
}
