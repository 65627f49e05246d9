use super::config::{ContainerConfig, StoreLocation};
use crate::collection::DbCollection;
use crate::core::{DbError, Result, SchemaVersion};
use crate::document::{CollectionDocument, SendableDocument};
use crate::migration::{MigrationPlan, MigrationReport, MigrationRunner};
use crate::schema::VersionedSchema;
use crate::storage::context::{SharedStore, SharedStoreHandle};
use crate::storage::{
    CollectionInfo, FileEngine, MemoryEngine, SaveMode, StoreContext, StoreEngine, StoreStats,
};
use std::sync::Arc;
use tracing::{Level, event, info_span};
use uuid::Uuid;

/// An opened store, migrated to one target schema, handing out collection actors.
///
/// Cloning is cheap; clones share the engine and the session.
#[derive(Clone)]
pub struct Container {
    shared: SharedStoreHandle,
    session: Uuid,
    config: ContainerConfig,
    schema: Arc<dyn VersionedSchema>,
    migration_report: MigrationReport,
}

impl std::fmt::Debug for Container {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Container")
            .field("session", &self.session)
            .field("location", &self.config.location)
            .field("schema_version", &self.schema.version())
            .finish()
    }
}

impl Container {
    /// Opens the configured store and brings it to `schema`'s version.
    ///
    /// A fresh store is tagged with the target version. An older store is migrated
    /// with `plan`. A store tagged with a newer version is refused.
    pub async fn open(
        config: ContainerConfig,
        schema: Arc<dyn VersionedSchema>,
        plan: Option<MigrationPlan>,
    ) -> Result<Self> {
        let engine: Box<dyn StoreEngine> = match &config.location {
            StoreLocation::InMemory => Box::new(MemoryEngine::new()),
            StoreLocation::File(path) => Box::new(FileEngine::open(path).await?),
        };
        Self::open_with_engine(engine, config, schema, plan)
    }

    /// Same as [`open`](Self::open) over a caller-supplied engine. `config.location` is ignored.
    pub fn open_with_engine(
        engine: Box<dyn StoreEngine>,
        config: ContainerConfig,
        schema: Arc<dyn VersionedSchema>,
        plan: Option<MigrationPlan>,
    ) -> Result<Self> {
        let target = schema.version();
        let span = info_span!("container_open", target = %target);
        let _entered = span.enter();

        let shared = SharedStore::new_handle(engine);
        let (session, persisted) = {
            let store = shared.lock()?;
            (store.session(), store.engine().schema_version()?)
        };

        let migration_report = match persisted {
            None => {
                StoreContext::new(Arc::clone(&shared), SaveMode::Deferred)?.commit(Some(target))?;
                event!(Level::INFO, "fresh store tagged");
                MigrationReport::default()
            }
            Some(current) if current == target => MigrationReport::default(),
            Some(current) if current > target => {
                return Err(DbError::Configuration(format!(
                    "Store is at schema version {}, newer than the requested {}",
                    current, target
                )));
            }
            Some(current) => {
                let plan = plan.as_ref().ok_or_else(|| {
                    DbError::Configuration(format!(
                        "Store is at schema version {} and needs a migration plan to reach {}",
                        current, target
                    ))
                })?;
                let report = MigrationRunner::new(&shared, plan).run(current, target)?;
                event!(
                    Level::INFO,
                    from = %current,
                    stages = report.stages.len(),
                    records = report.migrated_records(),
                    "store migrated"
                );
                report
            }
        };

        Ok(Self {
            shared,
            session,
            config,
            schema,
            migration_report,
        })
    }

    /// A new actor over records of type `T`, with its own context.
    ///
    /// `T` must belong to the container's schema version and be one of its models.
    pub fn collection<T>(&self) -> Result<DbCollection<T>>
    where
        T: CollectionDocument + SendableDocument,
    {
        if T::SCHEMA_VERSION != self.schema.version() {
            return Err(DbError::Configuration(format!(
                "Record type {}@{} does not belong to schema version {}",
                T::COLLECTION,
                T::SCHEMA_VERSION,
                self.schema.version()
            )));
        }
        if !self.schema.models().contains(&T::COLLECTION) {
            return Err(DbError::Configuration(format!(
                "Collection '{}' is not part of schema version {}",
                T::COLLECTION,
                self.schema.version()
            )));
        }

        Ok(DbCollection::new(
            self.context()?,
            self.config.save_debounce,
            self.config.fetch_cache_capacity,
        ))
    }

    /// A fresh context that commits on every `save()`.
    pub fn context(&self) -> Result<StoreContext> {
        StoreContext::new(Arc::clone(&self.shared), SaveMode::Immediate)
    }

    pub fn schema(&self) -> &Arc<dyn VersionedSchema> {
        &self.schema
    }

    pub fn schema_version(&self) -> SchemaVersion {
        self.schema.version()
    }

    /// Schema tag currently stored by the engine.
    pub fn persisted_schema_version(&self) -> Result<Option<SchemaVersion>> {
        self.shared.lock()?.engine().schema_version()
    }

    pub fn session_id(&self) -> Uuid {
        self.session
    }

    pub fn config(&self) -> &ContainerConfig {
        &self.config
    }

    pub fn stats(&self) -> Result<StoreStats> {
        Ok(self.shared.lock()?.stats())
    }

    pub fn collections(&self) -> Result<Vec<CollectionInfo>> {
        self.shared.lock()?.engine().collections()
    }

    /// Stages applied while opening, empty when no migration ran.
    pub fn migration_report(&self) -> &MigrationReport {
        &self.migration_report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::tests::BareSchema;

    #[tokio::test]
    async fn test_fresh_store_is_tagged_with_target() {
        let schema: Arc<dyn VersionedSchema> = Arc::new(BareSchema(SchemaVersion::new(1, 0, 0)));
        let container = Container::open(ContainerConfig::in_memory(), schema, None)
            .await
            .unwrap();

        assert_eq!(
            container.persisted_schema_version().unwrap(),
            Some(SchemaVersion::new(1, 0, 0))
        );
        assert!(container.migration_report().is_empty());
        assert_eq!(container.stats().unwrap().commits, 1);
    }

    #[test]
    fn test_older_store_without_plan_is_rejected() {
        let mut engine = MemoryEngine::new();
        engine
            .commit(crate::storage::CommitBatch {
                writes: Vec::new(),
                schema_version: Some(SchemaVersion::new(1, 0, 0)),
            })
            .unwrap();

        let schema: Arc<dyn VersionedSchema> = Arc::new(BareSchema(SchemaVersion::new(1, 1, 0)));
        let err = Container::open_with_engine(
            Box::new(engine),
            ContainerConfig::in_memory(),
            schema,
            None,
        )
        .unwrap_err();
        assert!(matches!(err, DbError::Configuration(_)));
    }
}
