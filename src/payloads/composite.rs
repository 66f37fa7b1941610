//! Composite bodies: a sub-header followed by nested, self-framed records
//!
//! ```text
//! +------------+------+-------+---------------------------------
//! | totalBytes | kind | count | record 0 | record 1 | ...
//! |    u32     | u16  |  u16  | (16-byte envelope + body each)
//! +------------+------+-------+---------------------------------
//! ```
//!
//! `totalBytes` covers the 8-byte sub-header and every nested record.

use std::cell::Cell;

use log::warn;

use crate::error::{PayloadError, Result};

use super::{
    envelope::{read_record_length, Envelope, ENVELOPE_LEN, STOP_MARKER_LEN},
    registry::TypeRegistry,
    wire::{WireReader, WireWriter},
    Payload,
};

/// Size of the composite sub-header
pub const COMPOSITE_HEADER_LEN: usize = 8;

/// Deepest chain of composites nested inside one another that a decode
/// will follow
pub const MAX_NESTING_DEPTH: usize = 32;

thread_local! {
    static NESTING_DEPTH: Cell<usize> = const { Cell::new(0) };
}

/// Marks one composite walk as open on this thread until dropped
struct NestingGuard;

impl NestingGuard {
    fn enter(offset: usize) -> Result<Self> {
        NESTING_DEPTH.with(|depth| {
            let level = depth.get() + 1;
            if level > MAX_NESTING_DEPTH {
                return Err(PayloadError::format(
                    offset,
                    format!("composites nested deeper than {} levels", MAX_NESTING_DEPTH),
                ));
            }
            depth.set(level);
            Ok(NestingGuard)
        })
    }
}

impl Drop for NestingGuard {
    fn drop(&mut self) {
        NESTING_DEPTH.with(|depth| depth.set(depth.get() - 1));
    }
}

/// Composite sub-header as read from the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompositeHeader {
    /// Sub-header plus all nested records
    pub total_bytes: u32,
    /// Caller-defined grouping kind
    pub kind: u16,
    /// Declared number of nested records
    pub element_count: u16,
}

impl CompositeHeader {
    /// Parse the sub-header at `offset`
    pub fn read(source: &[u8], offset: usize) -> Result<Self> {
        let mut reader = WireReader::new(source, offset);
        Ok(Self {
            total_bytes: reader.u32()?,
            kind: reader.u16()?,
            element_count: reader.u16()?,
        })
    }

    fn write(&self, dest: &mut [u8], offset: usize) -> Result<()> {
        let mut writer = WireWriter::new(dest, offset);
        writer.u32(self.total_bytes)?;
        writer.u16(self.kind)?;
        writer.u16(self.element_count)
    }
}

/// A nested record that could not be decoded
#[derive(Debug)]
pub struct ElementFailure {
    /// Position in the declared element sequence
    pub index: u16,
    /// Offset of the element within the enclosing record
    pub offset: usize,
    /// Element type code, when the envelope could be read
    pub type_code: Option<i32>,
    /// Why it was skipped
    pub error: PayloadError,
}

/// Decoded composite: the elements that made it and the ones that did not
#[derive(Debug, Default)]
pub struct Composite {
    /// Grouping kind from the sub-header
    pub kind: u16,
    /// Element count declared on the wire
    pub declared_count: u16,
    /// Successfully decoded elements, in wire order
    pub elements: Vec<Payload>,
    /// Per-element failures, in wire order
    pub failures: Vec<ElementFailure>,
}

impl Composite {
    /// Composite built in memory for encoding
    pub fn new(kind: u16, elements: Vec<Payload>) -> Self {
        Self {
            kind,
            declared_count: elements.len().min(u16::MAX as usize) as u16,
            elements,
            failures: Vec::new(),
        }
    }

    /// True when every declared element decoded
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Walk the composite body that starts at `offset` inside `record`.
///
/// Fails only when the sub-header itself is unusable. Nested records are
/// handled one at a time: an unknown type code or a body its factory
/// rejects is skipped, while a nested length that cannot be trusted ends
/// the walk. Either way the elements decoded so far are kept and the
/// failure is recorded in [`Composite::failures`].
///
/// A composite more than [`MAX_NESTING_DEPTH`] levels below the outermost
/// one is refused with a format error, which the enclosing walk records as
/// a skipped element.
///
/// Returns the composite and the number of bytes it spans.
pub fn decode_composite(
    record: &[u8],
    offset: usize,
    registry: &TypeRegistry,
) -> Result<(Composite, usize)> {
    let _nesting = NestingGuard::enter(offset)?;
    let header = CompositeHeader::read(record, offset)?;
    let total = header.total_bytes as usize;
    let available = record.len() - offset;
    if total < COMPOSITE_HEADER_LEN || total > available {
        return Err(PayloadError::format(
            offset,
            format!(
                "composite declares {} bytes, {} available",
                header.total_bytes, available
            ),
        ));
    }

    let end = offset + total;
    let region = &record[..end];
    let mut composite = Composite {
        kind: header.kind,
        declared_count: header.element_count,
        ..Default::default()
    };
    let mut cursor = offset + COMPOSITE_HEADER_LEN;

    for index in 0..header.element_count {
        let element_len = match read_record_length(region, cursor) {
            Ok(len) => len as usize,
            Err(_) => {
                composite.failures.push(ElementFailure {
                    index,
                    offset: cursor,
                    type_code: None,
                    error: PayloadError::format(
                        cursor,
                        format!(
                            "composite ended after {} of {} elements",
                            index, header.element_count
                        ),
                    ),
                });
                break;
            }
        };

        let remaining = end - cursor;
        if element_len == STOP_MARKER_LEN as usize
            || element_len < ENVELOPE_LEN
            || element_len > remaining
        {
            let error = PayloadError::format(
                cursor,
                format!(
                    "element {} declares {} bytes, {} remain",
                    index, element_len, remaining
                ),
            );
            warn!("abandoning composite walk: {}", error);
            composite.failures.push(ElementFailure {
                index,
                offset: cursor,
                type_code: None,
                error,
            });
            break;
        }

        let element = &region[cursor..cursor + element_len];
        let envelope = Envelope::read(element, 0)?;
        let decoded = registry
            .get(envelope.type_code)
            .and_then(|factory| factory.decode(element, registry));

        match decoded {
            Ok(body) => composite.elements.push(Payload::new(envelope, body)),
            Err(error) => {
                match &error {
                    PayloadError::UnknownType { type_code } => warn!(
                        "skipping composite element {} at offset {}: no factory for type {}",
                        index, cursor, type_code
                    ),
                    other => warn!(
                        "skipping composite element {} at offset {}: {}",
                        index, cursor, other
                    ),
                }
                composite.failures.push(ElementFailure {
                    index,
                    offset: cursor,
                    type_code: Some(envelope.type_code),
                    error,
                });
            }
        }

        cursor += element_len;
    }

    if cursor < end && composite.failures.is_empty() {
        composite.failures.push(ElementFailure {
            index: header.element_count,
            offset: cursor,
            type_code: None,
            error: PayloadError::format(
                cursor,
                format!("{} trailing bytes after last element", end - cursor),
            ),
        });
    }

    Ok((composite, total))
}

/// Encoded size of a composite body
pub fn composite_len(composite: &Composite, registry: &TypeRegistry) -> Result<usize> {
    composite
        .elements
        .iter()
        .try_fold(COMPOSITE_HEADER_LEN, |acc, element| {
            let factory = registry.get(element.type_code())?;
            Ok(acc + factory.encoded_len(element.body(), registry)?)
        })
}

/// Encode a composite body at `offset`, returning the bytes written.
///
/// Total size, element count and every nested length are recomputed.
pub fn encode_composite(
    composite: &Composite,
    dest: &mut [u8],
    offset: usize,
    registry: &TypeRegistry,
) -> Result<usize> {
    let total = composite_len(composite, registry)?;
    let header = CompositeHeader {
        total_bytes: u32::try_from(total).map_err(|_| {
            PayloadError::invalid_parameter("composite", format!("{} bytes exceeds u32", total))
        })?,
        kind: composite.kind,
        element_count: u16::try_from(composite.elements.len()).map_err(|_| {
            PayloadError::invalid_parameter("composite", "more than 65535 elements")
        })?,
    };
    header.write(dest, offset)?;

    let mut cursor = offset + COMPOSITE_HEADER_LEN;
    for element in &composite.elements {
        let factory = registry.get(element.type_code())?;
        cursor += factory.encode(element, dest, cursor, registry)?;
    }
    Ok(cursor - offset)
}
