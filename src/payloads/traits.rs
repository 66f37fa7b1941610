//! Factory contract implemented by every payload type

use crate::error::{PayloadError, Result};

use super::{
    envelope::{Envelope, ENVELOPE_LEN},
    registry::TypeRegistry,
    Payload, PayloadBody,
};

/// Decoder (and optionally encoder) for one record type.
///
/// A single instance is shared by every decode call through the registry,
/// so implementations must not keep per-call mutable state. The record
/// slice is only borrowed for the duration of the call.
pub trait PayloadFactory: Send + Sync {
    /// Type code this factory is registered under
    fn type_code(&self) -> i32;

    /// Human-readable name for logs and dumps
    fn name(&self) -> &str;

    /// Decode a whole record, envelope included.
    ///
    /// `registry` resolves nested records inside composite bodies.
    fn decode(&self, record: &[u8], registry: &TypeRegistry) -> Result<PayloadBody>;

    /// Whether `encode` is implemented
    fn supports_encode(&self) -> bool {
        false
    }

    /// Encoded body size, excluding the envelope
    fn body_len(&self, _body: &PayloadBody, _registry: &TypeRegistry) -> Result<usize> {
        Err(PayloadError::unsupported(format!("encode {}", self.name())))
    }

    /// Write the body into `dest`, which is exactly `body_len` bytes
    fn encode_body(
        &self,
        _body: &PayloadBody,
        _dest: &mut [u8],
        _registry: &TypeRegistry,
    ) -> Result<()> {
        Err(PayloadError::unsupported(format!("encode {}", self.name())))
    }

    /// Whole encoded record size
    fn encoded_len(&self, body: &PayloadBody, registry: &TypeRegistry) -> Result<usize> {
        Ok(ENVELOPE_LEN + self.body_len(body, registry)?)
    }

    /// Encode `payload` at `offset`, returning the bytes written.
    ///
    /// The envelope length is recomputed from the body; type code and
    /// timestamp come from the payload.
    fn encode(
        &self,
        payload: &Payload,
        dest: &mut [u8],
        offset: usize,
        registry: &TypeRegistry,
    ) -> Result<usize> {
        let len = self.encoded_len(payload.body(), registry)?;
        let end = offset
            .checked_add(len)
            .filter(|&end| end <= dest.len())
            .ok_or_else(|| {
                PayloadError::truncated(offset, len, dest.len().saturating_sub(offset))
            })?;
        let length = u32::try_from(len).map_err(|_| {
            PayloadError::invalid_parameter("length", format!("{} bytes exceeds u32", len))
        })?;

        Envelope::new(length, payload.type_code(), payload.timestamp()).write(dest, offset)?;
        self.encode_body(payload.body(), &mut dest[offset + ENVELOPE_LEN..end], registry)?;
        Ok(len)
    }
}

/// Body of a record, after the envelope
pub(crate) fn record_body(record: &[u8]) -> Result<&[u8]> {
    record
        .get(ENVELOPE_LEN..)
        .ok_or_else(|| PayloadError::truncated(0, ENVELOPE_LEN, record.len()))
}

/// Error for a body handed to the wrong factory
pub(crate) fn body_mismatch(factory: &str, body: &PayloadBody) -> PayloadError {
    PayloadError::invalid_parameter(
        "body",
        format!("{} factory cannot encode a {} body", factory, body.kind_name()),
    )
}
