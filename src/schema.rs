use crate::core::{DbError, Result, SchemaVersion};
use crate::storage::StoreContext;
use std::fmt;
use std::sync::Arc;

/// An immutable, versioned record shape.
///
/// `insert_mocks` seeds one deterministic record of this version; migration tests
/// use it to prepare a store before opening it against a newer schema.
pub trait VersionedSchema: Send + Sync {
    fn version(&self) -> SchemaVersion;

    /// Collections (record types) governed by this version.
    fn models(&self) -> &'static [&'static str];

    fn insert_mocks(&self, context: &mut StoreContext) -> Result<()>;
}

impl fmt::Debug for dyn VersionedSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VersionedSchema")
            .field("version", &self.version())
            .field("models", &self.models())
            .finish()
    }
}

/// Schema versions in strictly ascending order.
#[derive(Debug, Clone)]
pub struct SchemaRegistry {
    schemas: Vec<Arc<dyn VersionedSchema>>,
}

impl SchemaRegistry {
    pub fn new(schemas: Vec<Arc<dyn VersionedSchema>>) -> Result<Self> {
        if schemas.is_empty() {
            return Err(DbError::Configuration(
                "Schema registry must list at least one version".to_string(),
            ));
        }
        for pair in schemas.windows(2) {
            let (previous, next) = (pair[0].version(), pair[1].version());
            if next <= previous {
                return Err(DbError::Configuration(format!(
                    "Schema versions must be strictly ascending: {} is listed after {}",
                    next, previous
                )));
            }
        }
        Ok(Self { schemas })
    }

    pub fn versions(&self) -> Vec<SchemaVersion> {
        self.schemas.iter().map(|schema| schema.version()).collect()
    }

    pub fn schemas(&self) -> &[Arc<dyn VersionedSchema>] {
        &self.schemas
    }

    pub fn get(&self, version: SchemaVersion) -> Option<&Arc<dyn VersionedSchema>> {
        self.schemas.iter().find(|schema| schema.version() == version)
    }

    pub(crate) fn position(&self, version: SchemaVersion) -> Option<usize> {
        self.schemas
            .iter()
            .position(|schema| schema.version() == version)
    }

    pub fn latest(&self) -> &Arc<dyn VersionedSchema> {
        // `new` rejects empty registries
        &self.schemas[self.schemas.len() - 1]
    }

    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) struct BareSchema(pub SchemaVersion);

    impl VersionedSchema for BareSchema {
        fn version(&self) -> SchemaVersion {
            self.0
        }

        fn models(&self) -> &'static [&'static str] {
            &[]
        }

        fn insert_mocks(&self, _context: &mut StoreContext) -> Result<()> {
            Ok(())
        }
    }

    fn bare(major: u32, minor: u32, patch: u32) -> Arc<dyn VersionedSchema> {
        Arc::new(BareSchema(SchemaVersion::new(major, minor, patch)))
    }

    #[test]
    fn test_registry_accepts_ascending_versions() {
        let registry = SchemaRegistry::new(vec![bare(1, 0, 0), bare(1, 1, 0), bare(2, 0, 0)]).unwrap();
        assert_eq!(registry.len(), 3);
        assert_eq!(registry.latest().version(), SchemaVersion::new(2, 0, 0));
        assert!(registry.get(SchemaVersion::new(1, 1, 0)).is_some());
        assert!(registry.get(SchemaVersion::new(1, 2, 0)).is_none());
    }

    #[test]
    fn test_registry_rejects_out_of_order_and_duplicates() {
        let err = SchemaRegistry::new(vec![bare(1, 1, 0), bare(1, 0, 0)]).unwrap_err();
        assert!(matches!(err, DbError::Configuration(_)));

        let err = SchemaRegistry::new(vec![bare(1, 0, 0), bare(1, 0, 0)]).unwrap_err();
        assert!(matches!(err, DbError::Configuration(_)));

        assert!(SchemaRegistry::new(Vec::new()).is_err());
    }
}
