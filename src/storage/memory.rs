use super::engine::{
    CollectionInfo, CommitBatch, DocumentKey, StoreEngine, StoredDocument, WriteOp,
};
use crate::core::{Result, SchemaVersion};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Plain document map shared by the in-memory and file engines.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub(crate) struct EngineState {
    pub(crate) schema_version: Option<SchemaVersion>,
    pub(crate) documents: BTreeMap<DocumentKey, StoredDocument>,
}

impl EngineState {
    pub(crate) fn get(&self, key: &DocumentKey) -> Option<StoredDocument> {
        self.documents.get(key).cloned()
    }

    pub(crate) fn scan(&self, collection: &str, schema_version: SchemaVersion) -> Vec<StoredDocument> {
        self.documents
            .iter()
            .filter(|(key, _)| key.is_partition(collection, schema_version))
            .map(|(_, doc)| doc.clone())
            .collect()
    }

    pub(crate) fn collections(&self) -> Vec<CollectionInfo> {
        let mut counts = BTreeMap::<(String, SchemaVersion), usize>::new();
        for key in self.documents.keys() {
            *counts
                .entry((key.collection.clone(), key.schema_version))
                .or_default() += 1;
        }
        counts
            .into_iter()
            .map(|((collection, schema_version), record_count)| CollectionInfo {
                collection,
                schema_version,
                record_count,
            })
            .collect()
    }

    pub(crate) fn apply(&mut self, batch: CommitBatch) {
        for write in batch.writes {
            match write {
                WriteOp::Upsert(doc) => {
                    self.documents.insert(doc.key(), doc);
                }
                WriteOp::Delete(key) => {
                    self.documents.remove(&key);
                }
            }
        }
        if let Some(version) = batch.schema_version {
            self.schema_version = Some(version);
        }
    }
}

/// Volatile engine: data lives as long as the process.
#[derive(Debug, Default)]
pub struct MemoryEngine {
    state: EngineState,
}

impl MemoryEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.state.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.documents.is_empty()
    }
}

impl StoreEngine for MemoryEngine {
    fn schema_version(&self) -> Result<Option<SchemaVersion>> {
        Ok(self.state.schema_version)
    }

    fn get(&self, key: &DocumentKey) -> Result<Option<StoredDocument>> {
        Ok(self.state.get(key))
    }

    fn scan(&self, collection: &str, schema_version: SchemaVersion) -> Result<Vec<StoredDocument>> {
        Ok(self.state.scan(collection, schema_version))
    }

    fn collections(&self) -> Result<Vec<CollectionInfo>> {
        Ok(self.state.collections())
    }

    fn commit(&mut self, batch: CommitBatch) -> Result<()> {
        self.state.apply(batch);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use uuid::Uuid;

    fn doc(collection: &str, version: SchemaVersion, uid: Uuid) -> StoredDocument {
        StoredDocument {
            collection: collection.to_string(),
            schema_version: version,
            uid,
            body: json!({ "uid": uid }),
        }
    }

    #[test]
    fn test_commit_applies_upserts_deletes_and_tag() {
        let v1 = SchemaVersion::new(1, 0, 0);
        let mut engine = MemoryEngine::new();
        let a = doc("Item", v1, Uuid::new_v4());
        let b = doc("Item", v1, Uuid::new_v4());

        engine
            .commit(CommitBatch {
                writes: vec![WriteOp::Upsert(a.clone()), WriteOp::Upsert(b.clone())],
                schema_version: Some(v1),
            })
            .unwrap();
        assert_eq!(engine.len(), 2);
        assert_eq!(engine.schema_version().unwrap(), Some(v1));

        engine
            .commit(CommitBatch {
                writes: vec![WriteOp::Delete(a.key())],
                schema_version: None,
            })
            .unwrap();
        assert_eq!(engine.get(&a.key()).unwrap(), None);
        assert_eq!(engine.get(&b.key()).unwrap(), Some(b));
        assert_eq!(engine.schema_version().unwrap(), Some(v1));
    }

    #[test]
    fn test_scan_is_partitioned_by_version() {
        let v1 = SchemaVersion::new(1, 0, 0);
        let v2 = SchemaVersion::new(1, 1, 0);
        let mut engine = MemoryEngine::new();
        engine
            .commit(CommitBatch {
                writes: vec![
                    WriteOp::Upsert(doc("Item", v1, Uuid::new_v4())),
                    WriteOp::Upsert(doc("Item", v2, Uuid::new_v4())),
                    WriteOp::Upsert(doc("Item", v2, Uuid::new_v4())),
                    WriteOp::Upsert(doc("Other", v2, Uuid::new_v4())),
                ],
                schema_version: None,
            })
            .unwrap();

        assert_eq!(engine.scan("Item", v1).unwrap().len(), 1);
        assert_eq!(engine.scan("Item", v2).unwrap().len(), 2);

        let infos = engine.collections().unwrap();
        assert_eq!(infos.len(), 3);
        assert!(infos.iter().any(|info| info.collection == "Item"
            && info.schema_version == v2
            && info.record_count == 2));
    }
}
