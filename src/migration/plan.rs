use super::stage::MigrationStage;
use crate::core::{DbError, Result, SchemaVersion};
use crate::schema::{SchemaRegistry, VersionedSchema};
use std::sync::Arc;

/// Ordered schema versions plus the stages connecting each consecutive pair.
#[derive(Debug, Clone)]
pub struct MigrationPlan {
    registry: SchemaRegistry,
    stages: Vec<Arc<dyn MigrationStage>>,
}

impl MigrationPlan {
    /// Builds and validates a plan.
    ///
    /// Checks for:
    /// - strictly ascending schema versions,
    /// - exactly one stage per consecutive version pair,
    /// - stage endpoints matching the pair they sit between.
    pub fn new(
        schemas: Vec<Arc<dyn VersionedSchema>>,
        stages: Vec<Arc<dyn MigrationStage>>,
    ) -> Result<Self> {
        let plan = Self {
            registry: SchemaRegistry::new(schemas)?,
            stages,
        };
        plan.validate()?;
        Ok(plan)
    }

    pub fn registry(&self) -> &SchemaRegistry {
        &self.registry
    }

    pub fn versions(&self) -> Vec<SchemaVersion> {
        self.registry.versions()
    }

    pub fn stages(&self) -> &[Arc<dyn MigrationStage>] {
        &self.stages
    }

    pub fn current_version(&self) -> SchemaVersion {
        self.registry.latest().version()
    }

    pub fn validate(&self) -> Result<()> {
        let versions = self.registry.versions();
        let expected = versions.len() - 1;
        if self.stages.len() != expected {
            return Err(DbError::Configuration(format!(
                "Migration plan lists {} versions and needs {} stages, got {}",
                versions.len(),
                expected,
                self.stages.len()
            )));
        }

        for (index, stage) in self.stages.iter().enumerate() {
            let (from, to) = (versions[index], versions[index + 1]);
            if stage.from_version() != from || stage.to_version() != to {
                return Err(DbError::Configuration(format!(
                    "Migration stage #{} is {} -> {}, expected {} -> {}",
                    index,
                    stage.from_version(),
                    stage.to_version(),
                    from,
                    to
                )));
            }
        }

        Ok(())
    }

    /// Resolves the ordered stages leading from `from_version` to `to_version`.
    pub fn resolve_chain(
        &self,
        from_version: SchemaVersion,
        to_version: SchemaVersion,
    ) -> Result<Vec<Arc<dyn MigrationStage>>> {
        if from_version > to_version {
            return Err(DbError::Configuration(format!(
                "Cannot migrate down from schema version {} to {}",
                from_version, to_version
            )));
        }

        let start = self.registry.position(from_version).ok_or_else(|| {
            DbError::Configuration(format!(
                "Schema version {} is not listed in the migration plan",
                from_version
            ))
        })?;
        let end = self.registry.position(to_version).ok_or_else(|| {
            DbError::Configuration(format!(
                "Schema version {} is not listed in the migration plan",
                to_version
            ))
        })?;

        Ok(self.stages[start..end].to_vec())
    }
}
