// ============================================================================
// QuillDB Library
// ============================================================================
//
// Serialized single-writer document collections over a pluggable store, with
// versioned record shapes and staged migrations between them.

pub mod collection;
pub mod core;
pub mod document;
pub mod facade;
pub mod migration;
pub mod schema;
pub mod storage;
pub mod todo;

// Re-export main types for convenience
pub use collection::{DbCollection, SaveScheduler};
pub use crate::core::{DbError, InternalId, RecordKey, Result, SchemaVersion};
pub use document::{CollectionDocument, SendableDocument};
pub use facade::{Container, ContainerConfig, StoreLocation};
pub use migration::{
    MigrationPlan, MigrationReport, MigrationRunner, MigrationStage, ReshapeStage, Retainer,
    StageReport, StageState,
};
pub use schema::{SchemaRegistry, VersionedSchema};
pub use storage::{
    FetchDescriptor, FileEngine, MemoryEngine, SaveMode, SortDescriptor, StoreContext,
    StoreEngine, StoreStats,
};
