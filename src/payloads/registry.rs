//! Type code to factory table
//!
//! Built once at startup and shared read-only (usually behind an `Arc`)
//! with every [`Dispatcher`](super::Dispatcher).

use std::{collections::HashMap, fmt, sync::Arc};

use log::debug;

use crate::error::{PayloadError, Result};

use super::{
    standard::{CompositeFactory, EventFactory, SimpleHitFactory, TriggerRequestFactory},
    traits::PayloadFactory,
};

/// Registry of payload factories keyed by type code
#[derive(Default)]
pub struct TypeRegistry {
    factories: HashMap<i32, Arc<dyn PayloadFactory>>,
}

impl TypeRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry holding the standard catalog
    pub fn standard() -> Self {
        let mut registry = Self::new();
        registry.register_standard_types();
        registry
    }

    fn register_standard_types(&mut self) {
        let standard: [Arc<dyn PayloadFactory>; 4] = [
            Arc::new(SimpleHitFactory),
            Arc::new(TriggerRequestFactory),
            Arc::new(CompositeFactory),
            Arc::new(EventFactory),
        ];
        for factory in standard {
            self.factories.insert(factory.type_code(), factory);
        }
    }

    /// Register a factory under its type code; a code can only be taken once
    pub fn register(&mut self, factory: Arc<dyn PayloadFactory>) -> Result<()> {
        let type_code = factory.type_code();
        if let Some(existing) = self.factories.get(&type_code) {
            return Err(PayloadError::invalid_parameter(
                "type_code",
                format!("type code {} already registered to {}", type_code, existing.name()),
            ));
        }

        debug!("registered payload factory {} for type code {}", factory.name(), type_code);
        self.factories.insert(type_code, factory);
        Ok(())
    }

    /// Look up the factory for a type code
    pub fn get(&self, type_code: i32) -> Result<&Arc<dyn PayloadFactory>> {
        self.factories
            .get(&type_code)
            .ok_or_else(|| PayloadError::unknown_type(type_code))
    }

    /// Whether a type code has a factory
    pub fn contains(&self, type_code: i32) -> bool {
        self.factories.contains_key(&type_code)
    }

    /// Name of the factory for a type code
    pub fn name_of(&self, type_code: i32) -> Option<&str> {
        self.factories.get(&type_code).map(|factory| factory.name())
    }

    /// Registered type codes in ascending order
    pub fn type_codes(&self) -> Vec<i32> {
        let mut codes: Vec<i32> = self.factories.keys().copied().collect();
        codes.sort_unstable();
        codes
    }

    /// Number of registered factories
    pub fn len(&self) -> usize {
        self.factories.len()
    }

    /// True when nothing is registered
    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }
}

impl fmt::Debug for TypeRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for code in self.type_codes() {
            map.entry(&code, &self.name_of(code).unwrap_or("?"));
        }
        map.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payloads::{raw::RawFactory, PayloadType};

    #[test]
    fn test_standard_catalog() {
        let registry = TypeRegistry::standard();
        assert_eq!(registry.len(), 4);
        for payload_type in PayloadType::ALL {
            assert!(registry.contains(payload_type.code()));
            assert_eq!(registry.name_of(payload_type.code()), Some(payload_type.name()));
        }
        assert_eq!(registry.type_codes(), vec![1, 9, 11, 21]);
    }

    #[test]
    fn test_unknown_type() {
        let registry = TypeRegistry::new();
        assert!(registry.is_empty());
        assert!(matches!(
            registry.get(42),
            Err(PayloadError::UnknownType { type_code: 42 })
        ));
    }

    #[test]
    fn test_duplicate_registration_rejected() {
        let mut registry = TypeRegistry::standard();
        registry
            .register(Arc::new(RawFactory::new(500, "readout-data")))
            .unwrap();

        let err = registry
            .register(Arc::new(RawFactory::new(500, "other")))
            .unwrap_err();
        assert!(matches!(err, PayloadError::InvalidParameter { .. }));
        assert!(registry
            .register(Arc::new(RawFactory::new(PayloadType::SimpleHit.code(), "hit")))
            .is_err());
        assert_eq!(registry.name_of(500), Some("readout-data"));
    }
}
