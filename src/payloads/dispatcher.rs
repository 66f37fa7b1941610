//! Envelope-driven decode and encode

use std::sync::Arc;

use log::warn;

use crate::{
    buffers::{Buffer, BufferPool},
    error::{PayloadError, Result},
};

use super::{
    envelope::{read_record_length, Envelope, ENVELOPE_LEN, STOP_MARKER_LEN},
    registry::TypeRegistry,
    traits::PayloadFactory,
    Payload, PayloadBody,
};

/// Dispatcher behaviour switches
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatcherConfig {
    /// Reject records with any nested element failure instead of keeping
    /// the partial result
    pub strict_composites: bool,
}

/// Decodes framed records by type code, optionally into pool-owned copies
#[derive(Debug, Clone)]
pub struct Dispatcher {
    registry: Arc<TypeRegistry>,
    pool: Option<Arc<BufferPool>>,
    config: DispatcherConfig,
}

impl Dispatcher {
    /// Dispatcher without a pool; private copies are allocated directly
    pub fn new(registry: Arc<TypeRegistry>) -> Self {
        Self {
            registry,
            pool: None,
            config: DispatcherConfig::default(),
        }
    }

    /// Take private copies from `pool`
    pub fn with_pool(mut self, pool: Arc<BufferPool>) -> Self {
        self.pool = Some(pool);
        self
    }

    /// Replace the configuration
    pub fn with_config(mut self, config: DispatcherConfig) -> Self {
        self.config = config;
        self
    }

    /// Registry used for lookups
    pub fn registry(&self) -> &Arc<TypeRegistry> {
        &self.registry
    }

    /// Pool used for private copies, if any
    pub fn pool(&self) -> Option<&Arc<BufferPool>> {
        self.pool.as_ref()
    }

    /// Parse only the length field; cheap enough for cursor advancing
    pub fn read_record_length(source: &[u8], offset: usize) -> Result<u32> {
        read_record_length(source, offset)
    }

    /// Decode the record at `offset`.
    ///
    /// Returns `Ok(None)` for the end-of-stream marker. With
    /// `copy_to_own_buffer` the record is copied into a private buffer that
    /// the returned payload owns; otherwise the factory reads `source`
    /// directly and nothing is retained.
    pub fn decode(
        &self,
        source: &[u8],
        offset: usize,
        copy_to_own_buffer: bool,
    ) -> Result<Option<Payload>> {
        let Some((envelope, factory)) = self.resolve(source, offset)? else {
            return Ok(None);
        };
        let record = &source[offset..offset + envelope.length as usize];

        if !copy_to_own_buffer {
            let body = self.build(factory.as_ref(), record, offset)?;
            return Ok(Some(Payload::new(envelope, body)));
        }

        let mut buffer = self.allocate(record.len())?;
        if let Err(e) = buffer.extend_from_slice(record) {
            self.discard(buffer);
            return Err(e);
        }
        match self.build(factory.as_ref(), buffer.as_slice(), offset) {
            Ok(body) => Ok(Some(Payload::new(envelope, body).with_buffer(buffer))),
            Err(e) => {
                self.discard(buffer);
                Err(e)
            }
        }
    }

    /// Decode a buffer holding exactly one record, keeping the buffer with
    /// the payload. On failure the buffer goes back to the pool.
    pub fn decode_buffer(&self, buffer: Buffer) -> Result<Option<Payload>> {
        let resolved = match self.resolve(buffer.as_slice(), 0) {
            Ok(resolved) => resolved,
            Err(e) => {
                self.discard(buffer);
                return Err(e);
            }
        };
        let Some((envelope, factory)) = resolved else {
            self.discard(buffer);
            return Ok(None);
        };

        let record = &buffer.as_slice()[..envelope.length as usize];
        match self.build(factory.as_ref(), record, 0) {
            Ok(body) => Ok(Some(Payload::new(envelope, body).with_buffer(buffer))),
            Err(e) => {
                self.discard(buffer);
                Err(e)
            }
        }
    }

    /// Encoded size of `payload`
    pub fn encoded_len(&self, payload: &Payload) -> Result<usize> {
        self.registry
            .get(payload.type_code())?
            .encoded_len(payload.body(), &self.registry)
    }

    /// Encode `payload` at `offset`, returning the bytes written
    pub fn encode(&self, payload: &Payload, dest: &mut [u8], offset: usize) -> Result<usize> {
        self.registry
            .get(payload.type_code())?
            .encode(payload, dest, offset, &self.registry)
    }

    /// Encode `payload` into a fresh buffer sized to fit
    pub fn encode_to_buffer(&self, payload: &Payload) -> Result<Buffer> {
        let factory = self.registry.get(payload.type_code())?;
        let len = factory.encoded_len(payload.body(), &self.registry)?;

        let mut buffer = self.allocate(len)?;
        let written = buffer
            .set_len(len)
            .and_then(|_| factory.encode(payload, buffer.storage_mut(), 0, &self.registry));
        match written {
            Ok(_) => Ok(buffer),
            Err(e) => {
                self.discard(buffer);
                Err(e)
            }
        }
    }

    /// Validate the framing at `offset` and find the factory.
    /// `None` means the stop marker.
    fn resolve(
        &self,
        source: &[u8],
        offset: usize,
    ) -> Result<Option<(Envelope, &Arc<dyn PayloadFactory>)>> {
        let length = read_record_length(source, offset)?;
        if length == STOP_MARKER_LEN {
            return Ok(None);
        }

        let envelope = Envelope::read(source, offset)?;
        let len = length as usize;
        if len < ENVELOPE_LEN {
            return Err(PayloadError::format(
                offset,
                format!("record length {} is shorter than the envelope", length),
            ));
        }
        let available = source.len() - offset;
        if len > available {
            return Err(PayloadError::truncated(offset, len, available));
        }

        let factory = self.registry.get(envelope.type_code).map_err(|e| {
            warn!("no factory for type code {} at offset {}", envelope.type_code, offset);
            e
        })?;
        Ok(Some((envelope, factory)))
    }

    /// Run the factory, normalising its failures to format errors located
    /// relative to `base` in the caller's source
    fn build(&self, factory: &dyn PayloadFactory, record: &[u8], base: usize) -> Result<PayloadBody> {
        let body = factory
            .decode(record, &self.registry)
            .map_err(|e| match e {
                PayloadError::Format { offset, message } => {
                    PayloadError::format(base + offset, format!("{}: {}", factory.name(), message))
                }
                other => PayloadError::format(base, format!("{}: {}", factory.name(), other)),
            })?;

        if self.config.strict_composites {
            let failures = body.failure_count();
            if failures > 0 {
                return Err(PayloadError::format(
                    base,
                    format!("{} has {} undecodable nested records", factory.name(), failures),
                ));
            }
        }
        Ok(body)
    }

    fn allocate(&self, len: usize) -> Result<Buffer> {
        match &self.pool {
            Some(pool) => pool.acquire(len),
            None => Buffer::try_with_capacity(len),
        }
    }

    fn discard(&self, buffer: Buffer) {
        if let Some(pool) = &self.pool {
            let _ = pool.release(buffer);
        }
    }
}
