//! Standard payload catalog
//!
//! Fixed-layout hit records plus the composite-bearing trigger request and
//! event records. Every field is big-endian and follows the envelope.

use crate::error::{PayloadError, Result};

use super::{
    composite::{composite_len, decode_composite, encode_composite, Composite},
    envelope::ENVELOPE_LEN,
    registry::TypeRegistry,
    traits::{body_mismatch, record_body, PayloadFactory},
    wire::{WireReader, WireWriter},
    PayloadBody, PayloadType,
};

/// Single detector hit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SimpleHit {
    pub trigger_type: i32,
    pub config_id: i32,
    pub source_id: i32,
    pub dom_id: i64,
    pub trigger_mode: i16,
}

impl SimpleHit {
    /// Body size in bytes
    pub const BODY_LEN: usize = 22;
}

/// Trigger decision with the records that contributed to it
#[derive(Debug, Default)]
pub struct TriggerRequest {
    pub uid: i32,
    pub trigger_type: i32,
    pub config_id: i32,
    pub source_id: i32,
    pub first_time: u64,
    pub last_time: u64,
    pub contents: Composite,
}

impl TriggerRequest {
    /// Fixed fields ahead of the composite body
    pub const PREFIX_LEN: usize = 32;
}

/// Built event grouping readout and trigger records
#[derive(Debug, Default)]
pub struct EventRecord {
    pub uid: u32,
    pub run_number: u32,
    pub subrun_number: i32,
    pub first_time: u64,
    pub last_time: u64,
    pub contents: Composite,
}

impl EventRecord {
    /// Fixed fields ahead of the composite body
    pub const PREFIX_LEN: usize = 28;
}

fn expect_exact(body: &[u8], expected: usize, name: &str) -> Result<()> {
    if body.len() != expected {
        return Err(PayloadError::format(
            0,
            format!("{} body is {} bytes, expected {}", name, body.len(), expected),
        ));
    }
    Ok(())
}

/// Decode a composite that must run to the end of the record
fn decode_trailing_composite(
    record: &[u8],
    offset: usize,
    registry: &TypeRegistry,
) -> Result<Composite> {
    let (composite, span) = decode_composite(record, offset, registry)?;
    if offset + span != record.len() {
        return Err(PayloadError::format(
            offset,
            format!(
                "composite spans {} bytes but record leaves {}",
                span,
                record.len() - offset
            ),
        ));
    }
    Ok(composite)
}

/// Factory for [`SimpleHit`]
#[derive(Debug, Default, Clone, Copy)]
pub struct SimpleHitFactory;

impl PayloadFactory for SimpleHitFactory {
    fn type_code(&self) -> i32 {
        PayloadType::SimpleHit.code()
    }

    fn name(&self) -> &str {
        PayloadType::SimpleHit.name()
    }

    fn decode(&self, record: &[u8], _registry: &TypeRegistry) -> Result<PayloadBody> {
        expect_exact(record_body(record)?, SimpleHit::BODY_LEN, self.name())?;
        let mut reader = WireReader::new(record, ENVELOPE_LEN);
        Ok(PayloadBody::SimpleHit(SimpleHit {
            trigger_type: reader.i32()?,
            config_id: reader.i32()?,
            source_id: reader.i32()?,
            dom_id: reader.i64()?,
            trigger_mode: reader.i16()?,
        }))
    }

    fn supports_encode(&self) -> bool {
        true
    }

    fn body_len(&self, body: &PayloadBody, _registry: &TypeRegistry) -> Result<usize> {
        match body {
            PayloadBody::SimpleHit(_) => Ok(SimpleHit::BODY_LEN),
            other => Err(body_mismatch(self.name(), other)),
        }
    }

    fn encode_body(
        &self,
        body: &PayloadBody,
        dest: &mut [u8],
        _registry: &TypeRegistry,
    ) -> Result<()> {
        let PayloadBody::SimpleHit(hit) = body else {
            return Err(body_mismatch(self.name(), body));
        };
        let mut writer = WireWriter::new(dest, 0);
        writer.i32(hit.trigger_type)?;
        writer.i32(hit.config_id)?;
        writer.i32(hit.source_id)?;
        writer.i64(hit.dom_id)?;
        writer.i16(hit.trigger_mode)
    }
}

/// Factory for bare composite records
#[derive(Debug, Default, Clone, Copy)]
pub struct CompositeFactory;

impl PayloadFactory for CompositeFactory {
    fn type_code(&self) -> i32 {
        PayloadType::Composite.code()
    }

    fn name(&self) -> &str {
        PayloadType::Composite.name()
    }

    fn decode(&self, record: &[u8], registry: &TypeRegistry) -> Result<PayloadBody> {
        decode_trailing_composite(record, ENVELOPE_LEN, registry).map(PayloadBody::Composite)
    }

    fn supports_encode(&self) -> bool {
        true
    }

    fn body_len(&self, body: &PayloadBody, registry: &TypeRegistry) -> Result<usize> {
        match body {
            PayloadBody::Composite(composite) => composite_len(composite, registry),
            other => Err(body_mismatch(self.name(), other)),
        }
    }

    fn encode_body(&self, body: &PayloadBody, dest: &mut [u8], registry: &TypeRegistry) -> Result<()> {
        let PayloadBody::Composite(composite) = body else {
            return Err(body_mismatch(self.name(), body));
        };
        encode_composite(composite, dest, 0, registry).map(|_| ())
    }
}

/// Factory for [`TriggerRequest`]
#[derive(Debug, Default, Clone, Copy)]
pub struct TriggerRequestFactory;

impl PayloadFactory for TriggerRequestFactory {
    fn type_code(&self) -> i32 {
        PayloadType::TriggerRequest.code()
    }

    fn name(&self) -> &str {
        PayloadType::TriggerRequest.name()
    }

    fn decode(&self, record: &[u8], registry: &TypeRegistry) -> Result<PayloadBody> {
        let mut reader = WireReader::new(record, ENVELOPE_LEN);
        let uid = reader.i32()?;
        let trigger_type = reader.i32()?;
        let config_id = reader.i32()?;
        let source_id = reader.i32()?;
        let first_time = reader.u64()?;
        let last_time = reader.u64()?;
        let contents = decode_trailing_composite(record, reader.position(), registry)?;

        Ok(PayloadBody::TriggerRequest(TriggerRequest {
            uid,
            trigger_type,
            config_id,
            source_id,
            first_time,
            last_time,
            contents,
        }))
    }

    fn supports_encode(&self) -> bool {
        true
    }

    fn body_len(&self, body: &PayloadBody, registry: &TypeRegistry) -> Result<usize> {
        match body {
            PayloadBody::TriggerRequest(request) => {
                Ok(TriggerRequest::PREFIX_LEN + composite_len(&request.contents, registry)?)
            }
            other => Err(body_mismatch(self.name(), other)),
        }
    }

    fn encode_body(&self, body: &PayloadBody, dest: &mut [u8], registry: &TypeRegistry) -> Result<()> {
        let PayloadBody::TriggerRequest(request) = body else {
            return Err(body_mismatch(self.name(), body));
        };
        let mut writer = WireWriter::new(dest, 0);
        writer.i32(request.uid)?;
        writer.i32(request.trigger_type)?;
        writer.i32(request.config_id)?;
        writer.i32(request.source_id)?;
        writer.u64(request.first_time)?;
        writer.u64(request.last_time)?;
        encode_composite(&request.contents, dest, TriggerRequest::PREFIX_LEN, registry).map(|_| ())
    }
}

/// Factory for [`EventRecord`]
#[derive(Debug, Default, Clone, Copy)]
pub struct EventFactory;

impl PayloadFactory for EventFactory {
    fn type_code(&self) -> i32 {
        PayloadType::Event.code()
    }

    fn name(&self) -> &str {
        PayloadType::Event.name()
    }

    fn decode(&self, record: &[u8], registry: &TypeRegistry) -> Result<PayloadBody> {
        let mut reader = WireReader::new(record, ENVELOPE_LEN);
        let uid = reader.u32()?;
        let run_number = reader.u32()?;
        let subrun_number = reader.i32()?;
        let first_time = reader.u64()?;
        let last_time = reader.u64()?;
        let contents = decode_trailing_composite(record, reader.position(), registry)?;

        Ok(PayloadBody::Event(EventRecord {
            uid,
            run_number,
            subrun_number,
            first_time,
            last_time,
            contents,
        }))
    }

    fn supports_encode(&self) -> bool {
        true
    }

    fn body_len(&self, body: &PayloadBody, registry: &TypeRegistry) -> Result<usize> {
        match body {
            PayloadBody::Event(event) => {
                Ok(EventRecord::PREFIX_LEN + composite_len(&event.contents, registry)?)
            }
            other => Err(body_mismatch(self.name(), other)),
        }
    }

    fn encode_body(&self, body: &PayloadBody, dest: &mut [u8], registry: &TypeRegistry) -> Result<()> {
        let PayloadBody::Event(event) = body else {
            return Err(body_mismatch(self.name(), body));
        };
        let mut writer = WireWriter::new(dest, 0);
        writer.u32(event.uid)?;
        writer.u32(event.run_number)?;
        writer.i32(event.subrun_number)?;
        writer.u64(event.first_time)?;
        writer.u64(event.last_time)?;
        encode_composite(&event.contents, dest, EventRecord::PREFIX_LEN, registry).map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payloads::{Envelope, Payload};

    fn hit_record() -> Vec<u8> {
        let mut bytes = vec![0u8; 38];
        Envelope::new(38, 1, 99).write(&mut bytes, 0).unwrap();
        let mut writer = WireWriter::new(&mut bytes, 16);
        writer.i32(2).unwrap();
        writer.i32(3).unwrap();
        writer.i32(4000).unwrap();
        writer.i64(0x1234_5678_9abc).unwrap();
        writer.i16(-1).unwrap();
        bytes
    }

    #[test]
    fn test_simple_hit_decode_encode() {
        let registry = TypeRegistry::standard();
        let record = hit_record();

        let body = SimpleHitFactory.decode(&record, &registry).unwrap();
        let PayloadBody::SimpleHit(hit) = &body else {
            panic!("expected a hit, got {:?}", body);
        };
        assert_eq!(hit.source_id, 4000);
        assert_eq!(hit.dom_id, 0x1234_5678_9abc);
        assert_eq!(hit.trigger_mode, -1);

        let payload = Payload::new(Envelope::read(&record, 0).unwrap(), body);
        let mut out = vec![0u8; 38];
        assert_eq!(SimpleHitFactory.encode(&payload, &mut out, 0, &registry).unwrap(), 38);
        assert_eq!(out, record);
    }

    #[test]
    fn test_simple_hit_wrong_size() {
        let registry = TypeRegistry::standard();
        let mut record = hit_record();
        record.push(0);
        assert!(matches!(
            SimpleHitFactory.decode(&record, &registry),
            Err(PayloadError::Format { .. })
        ));
        assert!(SimpleHitFactory.decode(&record[..30], &registry).is_err());
    }

    #[test]
    fn test_body_mismatch_on_encode() {
        let registry = TypeRegistry::standard();
        let payload = Payload::from_body(
            PayloadType::SimpleHit.code(),
            0,
            PayloadBody::Composite(Composite::default()),
        );
        let mut out = vec![0u8; 64];
        assert!(matches!(
            SimpleHitFactory.encode(&payload, &mut out, 0, &registry),
            Err(PayloadError::InvalidParameter { .. })
        ));
    }
}
