//! Record streams over files and sockets
//!
//! Readers split a byte stream into whole records using only the length
//! prefix; writers frame encoded payloads and close the stream with the
//! 4-byte stop marker.

pub mod reader;
pub mod writer;

pub use reader::{RecordReader, DEFAULT_MAX_RECORD_LEN};
pub use writer::RecordWriter;
