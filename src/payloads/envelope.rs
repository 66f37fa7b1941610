//! Fixed 16-byte record preamble
//!
//! ```text
//! 0        4        8                16
//! +--------+--------+----------------+----------------
//! | length |  type  |   timestamp    |  body ...
//! +--------+--------+----------------+----------------
//! ```
//!
//! All fields are big-endian. `length` counts the whole record, preamble
//! included. A bare `length` of 4 marks the end of a stream.

use crate::error::{PayloadError, Result};

use super::wire::{WireReader, WireWriter};

/// Size of the preamble in bytes
pub const ENVELOPE_LEN: usize = 16;

/// Reserved record length signalling end of stream
pub const STOP_MARKER_LEN: u32 = 4;

/// Record preamble: length, type code and detector-clock timestamp
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Envelope {
    /// Whole record length including these 16 bytes
    pub length: u32,
    /// Type code resolved through the registry
    pub type_code: i32,
    /// Detector-clock ticks
    pub timestamp: u64,
}

impl Envelope {
    /// Create an envelope
    pub fn new(length: u32, type_code: i32, timestamp: u64) -> Self {
        Self {
            length,
            type_code,
            timestamp,
        }
    }

    /// Parse the preamble at `offset`; needs 16 bytes
    pub fn read(source: &[u8], offset: usize) -> Result<Self> {
        let available = source.len().saturating_sub(offset);
        if available < ENVELOPE_LEN {
            return Err(PayloadError::truncated(offset, ENVELOPE_LEN, available));
        }

        let mut reader = WireReader::new(source, offset);
        Ok(Self {
            length: reader.u32()?,
            type_code: reader.i32()?,
            timestamp: reader.u64()?,
        })
    }

    /// Write the preamble at `offset`, returning the bytes written
    pub fn write(&self, dest: &mut [u8], offset: usize) -> Result<usize> {
        let mut writer = WireWriter::new(dest, offset);
        writer.u32(self.length)?;
        writer.i32(self.type_code)?;
        writer.u64(self.timestamp)?;
        Ok(ENVELOPE_LEN)
    }

    /// True for the end-of-stream marker
    pub fn is_stop_marker(&self) -> bool {
        self.length == STOP_MARKER_LEN
    }

    /// Declared body length, zero when the declared length is too short
    pub fn body_len(&self) -> usize {
        (self.length as usize).saturating_sub(ENVELOPE_LEN)
    }
}

/// Parse only the length field at `offset`
pub fn read_record_length(source: &[u8], offset: usize) -> Result<u32> {
    WireReader::new(source, offset).u32()
}

/// Write the 4-byte end-of-stream marker
pub fn write_stop_marker(dest: &mut [u8], offset: usize) -> Result<usize> {
    WireWriter::new(dest, offset).u32(STOP_MARKER_LEN)?;
    Ok(STOP_MARKER_LEN as usize)
}
