use crate::core::{DbError, Result, SchemaVersion};
use crate::document::CollectionDocument;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identity of a stored document: one `uid` inside one `(collection, schema_version)` partition.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DocumentKey {
    pub collection: String,
    pub schema_version: SchemaVersion,
    pub uid: Uuid,
}

impl DocumentKey {
    pub fn of<T: CollectionDocument>(uid: Uuid) -> Self {
        Self {
            collection: T::COLLECTION.to_string(),
            schema_version: T::SCHEMA_VERSION,
            uid,
        }
    }

    pub fn is_partition(&self, collection: &str, schema_version: SchemaVersion) -> bool {
        self.collection == collection && self.schema_version == schema_version
    }
}

/// Engine-level envelope of a record: partition tags plus the serialized body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredDocument {
    pub collection: String,
    pub schema_version: SchemaVersion,
    pub uid: Uuid,
    pub body: serde_json::Value,
}

impl StoredDocument {
    pub fn encode<T: CollectionDocument>(record: &T) -> Result<Self> {
        Ok(Self {
            collection: T::COLLECTION.to_string(),
            schema_version: T::SCHEMA_VERSION,
            uid: record.uid(),
            body: serde_json::to_value(record)?,
        })
    }

    pub fn decode<T: CollectionDocument>(&self) -> Result<T> {
        if !self.key().is_partition(T::COLLECTION, T::SCHEMA_VERSION) {
            return Err(DbError::Persistence(format!(
                "Document '{}' belongs to {}@{}, not {}@{}",
                self.uid,
                self.collection,
                self.schema_version,
                T::COLLECTION,
                T::SCHEMA_VERSION
            )));
        }
        let record: T = serde_json::from_value(self.body.clone())?;
        if record.uid() != self.uid {
            return Err(DbError::Persistence(format!(
                "Document '{}' body carries mismatching uid '{}'",
                self.uid,
                record.uid()
            )));
        }
        Ok(record)
    }

    pub fn key(&self) -> DocumentKey {
        DocumentKey {
            collection: self.collection.clone(),
            schema_version: self.schema_version,
            uid: self.uid,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum WriteOp {
    Upsert(StoredDocument),
    Delete(DocumentKey),
}

/// Changes applied by one [`StoreEngine::commit`] call, all or nothing.
#[derive(Debug, Clone, Default)]
pub struct CommitBatch {
    pub writes: Vec<WriteOp>,
    /// New schema tag of the whole store, written in the same commit.
    pub schema_version: Option<SchemaVersion>,
}

impl CommitBatch {
    pub fn is_empty(&self) -> bool {
        self.writes.is_empty() && self.schema_version.is_none()
    }
}

/// Record count of one `(collection, schema_version)` partition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionInfo {
    pub collection: String,
    pub schema_version: SchemaVersion,
    pub record_count: usize,
}

/// Durable storage collaborator - allows pluggable storage backends.
///
/// Engines store opaque documents; shapes, identity rules and migrations live
/// above this trait.
pub trait StoreEngine: Send {
    /// Schema version the stored data was last tagged with, `None` for a fresh store.
    fn schema_version(&self) -> Result<Option<SchemaVersion>>;

    /// Look up one document.
    fn get(&self, key: &DocumentKey) -> Result<Option<StoredDocument>>;

    /// All documents in one partition, ordered by `uid`.
    fn scan(&self, collection: &str, schema_version: SchemaVersion) -> Result<Vec<StoredDocument>>;

    /// Partitions currently holding data.
    fn collections(&self) -> Result<Vec<CollectionInfo>>;

    /// Durably apply a batch. Either every write lands or none does.
    fn commit(&mut self, batch: CommitBatch) -> Result<()>;
}
