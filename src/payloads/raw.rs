//! Pass-through factory for late-bound record types

use crate::error::Result;

use super::{
    registry::TypeRegistry,
    traits::{body_mismatch, record_body, PayloadFactory},
    PayloadBody,
};

/// Keeps the body bytes of a custom type code verbatim
#[derive(Debug, Clone)]
pub struct RawFactory {
    type_code: i32,
    name: String,
}

impl RawFactory {
    /// Create a factory for `type_code`
    pub fn new(type_code: i32, name: impl Into<String>) -> Self {
        Self {
            type_code,
            name: name.into(),
        }
    }
}

impl PayloadFactory for RawFactory {
    fn type_code(&self) -> i32 {
        self.type_code
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn decode(&self, record: &[u8], _registry: &TypeRegistry) -> Result<PayloadBody> {
        Ok(PayloadBody::Opaque(record_body(record)?.to_vec()))
    }

    fn supports_encode(&self) -> bool {
        true
    }

    fn body_len(&self, body: &PayloadBody, _registry: &TypeRegistry) -> Result<usize> {
        match body {
            PayloadBody::Opaque(bytes) => Ok(bytes.len()),
            other => Err(body_mismatch(&self.name, other)),
        }
    }

    fn encode_body(
        &self,
        body: &PayloadBody,
        dest: &mut [u8],
        _registry: &TypeRegistry,
    ) -> Result<()> {
        match body {
            PayloadBody::Opaque(bytes) => {
                dest.copy_from_slice(bytes);
                Ok(())
            }
            other => Err(body_mismatch(&self.name, other)),
        }
    }
}
