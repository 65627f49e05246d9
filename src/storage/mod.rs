pub mod context;
pub mod engine;
pub mod memory;
pub mod persistence;
pub mod query;

pub use context::{SaveMode, StoreContext, StoreStats};
pub use engine::{
    CollectionInfo, CommitBatch, DocumentKey, StoreEngine, StoredDocument, WriteOp,
};
pub use memory::MemoryEngine;
pub use persistence::FileEngine;
pub use query::{FetchDescriptor, Predicate, SortDescriptor, SortOrder};
