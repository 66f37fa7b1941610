//! Binary record framing and type dispatch
//!
//! Every record starts with a 16-byte [`Envelope`]. The envelope's type
//! code selects a [`PayloadFactory`] from the [`TypeRegistry`], and the
//! [`Dispatcher`] ties envelope parsing, buffer ownership and factory
//! decoding together. Composite records nest further envelopes and are
//! walked recursively with per-element failure reporting.

pub mod composite;
pub mod dispatcher;
pub mod envelope;
pub mod raw;
pub mod registry;
pub mod standard;
pub mod traits;
mod wire;

pub use composite::{
    Composite, CompositeHeader, ElementFailure, COMPOSITE_HEADER_LEN, MAX_NESTING_DEPTH,
};
pub use dispatcher::{Dispatcher, DispatcherConfig};
pub use envelope::{
    read_record_length, write_stop_marker, Envelope, ENVELOPE_LEN, STOP_MARKER_LEN,
};
pub use raw::RawFactory;
pub use registry::TypeRegistry;
pub use standard::{EventRecord, SimpleHit, TriggerRequest};
pub use traits::PayloadFactory;

use crate::buffers::{Buffer, BufferPool, ReleaseOutcome};

/// Type codes of the standard catalog
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum PayloadType {
    /// Single detector hit
    SimpleHit = 1,
    /// Trigger decision with contributing records
    TriggerRequest = 9,
    /// Bare composite of nested records
    Composite = 11,
    /// Built event
    Event = 21,
}

impl PayloadType {
    /// Every standard type
    pub const ALL: [PayloadType; 4] = [
        PayloadType::SimpleHit,
        PayloadType::TriggerRequest,
        PayloadType::Composite,
        PayloadType::Event,
    ];

    /// Map a wire code to a standard type
    pub fn from_code(code: i32) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.code() == code)
    }

    /// Wire code
    pub fn code(self) -> i32 {
        self as i32
    }

    /// Get type name for debugging/logging
    pub fn name(self) -> &'static str {
        match self {
            PayloadType::SimpleHit => "SimpleHit",
            PayloadType::TriggerRequest => "TriggerRequest",
            PayloadType::Composite => "Composite",
            PayloadType::Event => "Event",
        }
    }
}

/// Decoded record body
#[derive(Debug)]
pub enum PayloadBody {
    SimpleHit(SimpleHit),
    TriggerRequest(TriggerRequest),
    Composite(Composite),
    Event(EventRecord),
    /// Body bytes of a custom type, kept verbatim
    Opaque(Vec<u8>),
}

impl PayloadBody {
    /// Short name of the variant
    pub fn kind_name(&self) -> &'static str {
        match self {
            PayloadBody::SimpleHit(_) => "SimpleHit",
            PayloadBody::TriggerRequest(_) => "TriggerRequest",
            PayloadBody::Composite(_) => "Composite",
            PayloadBody::Event(_) => "Event",
            PayloadBody::Opaque(_) => "Opaque",
        }
    }

    /// Nested records carried by this body, if any
    pub fn composite(&self) -> Option<&Composite> {
        match self {
            PayloadBody::TriggerRequest(request) => Some(&request.contents),
            PayloadBody::Composite(composite) => Some(composite),
            PayloadBody::Event(event) => Some(&event.contents),
            PayloadBody::SimpleHit(_) | PayloadBody::Opaque(_) => None,
        }
    }

    /// Element failures anywhere below this body
    pub fn failure_count(&self) -> usize {
        self.composite().map_or(0, |composite| {
            composite.failures.len()
                + composite
                    .elements
                    .iter()
                    .map(|element| element.body().failure_count())
                    .sum::<usize>()
        })
    }
}

/// Decoded record, optionally owning the buffer it was decoded from
#[derive(Debug)]
pub struct Payload {
    envelope: Envelope,
    body: PayloadBody,
    buffer: Option<Buffer>,
}

impl Payload {
    /// Pair a decoded body with its envelope
    pub fn new(envelope: Envelope, body: PayloadBody) -> Self {
        Self {
            envelope,
            body,
            buffer: None,
        }
    }

    /// Payload built in memory; the length is filled in when encoded
    pub fn from_body(type_code: i32, timestamp: u64, body: PayloadBody) -> Self {
        Self::new(Envelope::new(0, type_code, timestamp), body)
    }

    pub(crate) fn with_buffer(mut self, buffer: Buffer) -> Self {
        self.buffer = Some(buffer);
        self
    }

    /// Envelope as read from the wire
    pub fn envelope(&self) -> &Envelope {
        &self.envelope
    }

    /// Type code
    pub fn type_code(&self) -> i32 {
        self.envelope.type_code
    }

    /// Standard type, if the code is part of the catalog
    pub fn payload_type(&self) -> Option<PayloadType> {
        PayloadType::from_code(self.envelope.type_code)
    }

    /// Detector-clock timestamp
    pub fn timestamp(&self) -> u64 {
        self.envelope.timestamp
    }

    /// Declared record length; zero for payloads built in memory
    pub fn length(&self) -> u32 {
        self.envelope.length
    }

    /// Decoded body
    pub fn body(&self) -> &PayloadBody {
        &self.body
    }

    /// Give up the body
    pub fn into_body(self) -> PayloadBody {
        self.body
    }

    /// Record bytes, when the payload owns a private copy
    pub fn record_bytes(&self) -> Option<&[u8]> {
        self.buffer.as_ref().map(Buffer::as_slice)
    }

    /// Detach the private buffer, if any
    pub fn take_buffer(&mut self) -> Option<Buffer> {
        self.buffer.take()
    }

    /// Drop the decoded body, keeping only the private buffer
    pub fn into_buffer(mut self) -> Option<Buffer> {
        self.buffer.take()
    }

    /// Hand the private buffer back to `pool`
    pub fn recycle(mut self, pool: &BufferPool) -> Option<ReleaseOutcome> {
        self.take_buffer().map(|buffer| pool.release(buffer))
    }
}
