use super::engine::{CommitBatch, DocumentKey, StoreEngine, StoredDocument, WriteOp};
use super::query::FetchDescriptor;
use crate::core::{DbError, InternalId, Result, SchemaVersion};
use crate::document::CollectionDocument;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};
use tracing::{Level, event};
use uuid::Uuid;

// ============================================================================
// Shared Store
// ============================================================================

/// Counters of physical engine commits issued through any context of a store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreStats {
    pub commits: u64,
    pub failed_commits: u64,
}

/// Session-scoped slot numbers, one per live document key seen in this session.
///
/// A slot is released once a delete of its key commits, so the registry never
/// holds more than the keys read or written since the session started.
#[derive(Debug, Default)]
struct IdRegistry {
    next_slot: u64,
    slots: HashMap<DocumentKey, u64>,
    keys: HashMap<u64, DocumentKey>,
}

impl IdRegistry {
    fn slot_for(&mut self, key: &DocumentKey) -> u64 {
        if let Some(slot) = self.slots.get(key) {
            return *slot;
        }
        self.next_slot += 1;
        let slot = self.next_slot;
        self.slots.insert(key.clone(), slot);
        self.keys.insert(slot, key.clone());
        slot
    }

    fn key_for(&self, slot: u64) -> Option<&DocumentKey> {
        self.keys.get(&slot)
    }

    fn release(&mut self, key: &DocumentKey) {
        if let Some(slot) = self.slots.remove(key) {
            self.keys.remove(&slot);
        }
    }

    fn len(&self) -> usize {
        self.slots.len()
    }
}

/// Engine plus per-session bookkeeping, shared by every context of one container.
pub(crate) struct SharedStore {
    engine: Box<dyn StoreEngine>,
    session: Uuid,
    ids: IdRegistry,
    stats: StoreStats,
}

pub(crate) type SharedStoreHandle = Arc<Mutex<SharedStore>>;

impl SharedStore {
    pub(crate) fn new_handle(engine: Box<dyn StoreEngine>) -> SharedStoreHandle {
        Arc::new(Mutex::new(Self {
            engine,
            session: Uuid::new_v4(),
            ids: IdRegistry::default(),
            stats: StoreStats::default(),
        }))
    }

    pub(crate) fn engine(&self) -> &dyn StoreEngine {
        self.engine.as_ref()
    }

    pub(crate) fn session(&self) -> Uuid {
        self.session
    }

    pub(crate) fn stats(&self) -> StoreStats {
        self.stats
    }

    fn id_for(&mut self, key: &DocumentKey) -> InternalId {
        InternalId {
            session: self.session,
            slot: self.ids.slot_for(key),
        }
    }
}

// ============================================================================
// Store Context
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveMode {
    /// `save()` commits staged changes to the engine.
    Immediate,
    /// `save()` is a checkpoint only; the owner commits once at the end.
    Deferred,
}

#[derive(Debug, Clone)]
enum Pending {
    Upsert(StoredDocument),
    Delete,
}

/// The staged change one key had before an operation replaced it.
///
/// Taken with [`StoreContext::checkpoint`] and put back with [`StoreContext::undo`]
/// when the operation's save fails.
#[derive(Debug)]
pub(crate) struct StagedUndo {
    key: DocumentKey,
    previous: Option<Pending>,
}

/// Staging layer over the shared engine, owned by exactly one actor or migration stage.
///
/// Reads see the engine state with this context's uncommitted changes applied.
/// Nothing reaches the engine before [`save`](Self::save).
pub struct StoreContext {
    shared: SharedStoreHandle,
    session: Uuid,
    pending: BTreeMap<DocumentKey, Pending>,
    save_mode: SaveMode,
}

impl StoreContext {
    pub(crate) fn new(shared: SharedStoreHandle, save_mode: SaveMode) -> Result<Self> {
        let session = shared.lock()?.session();
        Ok(Self {
            shared,
            session,
            pending: BTreeMap::new(),
            save_mode,
        })
    }

    pub fn session_id(&self) -> Uuid {
        self.session
    }

    pub fn save_mode(&self) -> SaveMode {
        self.save_mode
    }

    pub fn has_changes(&self) -> bool {
        !self.pending.is_empty()
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub(crate) fn checkpoint(&self, key: &DocumentKey) -> StagedUndo {
        StagedUndo {
            key: key.clone(),
            previous: self.pending.get(key).cloned(),
        }
    }

    /// Restores the staged change recorded by `undo`, discarding whatever replaced it.
    pub(crate) fn undo(&mut self, undo: StagedUndo) {
        match undo.previous {
            Some(previous) => {
                self.pending.insert(undo.key, previous);
            }
            None => {
                self.pending.remove(&undo.key);
            }
        }
    }

    // ------------------------------------------------------------------------
    // Untyped documents
    // ------------------------------------------------------------------------

    pub fn get_document(&self, key: &DocumentKey) -> Result<Option<(InternalId, StoredDocument)>> {
        let staged = match self.pending.get(key) {
            Some(Pending::Delete) => return Ok(None),
            Some(Pending::Upsert(doc)) => Some(doc.clone()),
            None => None,
        };

        let mut shared = self.shared.lock()?;
        let doc = match staged {
            Some(doc) => doc,
            None => match shared.engine.get(key)? {
                Some(doc) => doc,
                None => return Ok(None),
            },
        };
        Ok(Some((shared.id_for(key), doc)))
    }

    /// All documents of one partition, ordered by `uid`.
    pub fn scan_documents(
        &self,
        collection: &str,
        schema_version: SchemaVersion,
    ) -> Result<Vec<(InternalId, StoredDocument)>> {
        let mut shared = self.shared.lock()?;
        let mut docs: BTreeMap<Uuid, StoredDocument> = shared
            .engine
            .scan(collection, schema_version)?
            .into_iter()
            .map(|doc| (doc.uid, doc))
            .collect();

        for (key, pending) in &self.pending {
            if !key.is_partition(collection, schema_version) {
                continue;
            }
            match pending {
                Pending::Upsert(doc) => {
                    docs.insert(key.uid, doc.clone());
                }
                Pending::Delete => {
                    docs.remove(&key.uid);
                }
            }
        }

        Ok(docs
            .into_values()
            .map(|doc| (shared.id_for(&doc.key()), doc))
            .collect())
    }

    pub fn lookup_document(&self, id: InternalId) -> Result<Option<(InternalId, StoredDocument)>> {
        if id.session != self.session {
            return Ok(None);
        }
        let key = {
            let shared = self.shared.lock()?;
            match shared.ids.key_for(id.slot) {
                Some(key) => key.clone(),
                None => return Ok(None),
            }
        };
        self.get_document(&key)
    }

    pub fn insert_document(&mut self, doc: StoredDocument) -> Result<InternalId> {
        let key = doc.key();
        if self.get_document(&key)?.is_some() {
            return Err(DbError::Persistence(format!(
                "Record '{}' already exists in {}@{}",
                key.uid, key.collection, key.schema_version
            )));
        }
        let id = self.shared.lock()?.id_for(&key);
        self.pending.insert(key, Pending::Upsert(doc));
        Ok(id)
    }

    pub fn update_document(&mut self, doc: StoredDocument) -> Result<InternalId> {
        let key = doc.key();
        let id = self.shared.lock()?.id_for(&key);
        self.pending.insert(key, Pending::Upsert(doc));
        Ok(id)
    }

    /// Stages a delete. Returns `false` when the document does not exist.
    pub fn delete_document(&mut self, key: &DocumentKey) -> Result<bool> {
        if self.get_document(key)?.is_none() {
            return Ok(false);
        }
        self.pending.insert(key.clone(), Pending::Delete);
        Ok(true)
    }

    // ------------------------------------------------------------------------
    // Typed records
    // ------------------------------------------------------------------------

    pub fn fetch<T: CollectionDocument>(
        &self,
        descriptor: &FetchDescriptor<T>,
    ) -> Result<Vec<(InternalId, T)>> {
        let rows = self
            .scan_documents(T::COLLECTION, T::SCHEMA_VERSION)?
            .into_iter()
            .map(|(id, doc)| Ok((id, doc.decode::<T>()?)))
            .collect::<Result<Vec<_>>>()?;
        Ok(descriptor.apply(rows))
    }

    pub fn fetch_all<T: CollectionDocument>(&self) -> Result<Vec<(InternalId, T)>> {
        self.fetch(&FetchDescriptor::new())
    }

    pub fn fetch_count<T: CollectionDocument>(&self, descriptor: &FetchDescriptor<T>) -> Result<usize> {
        Ok(self.fetch(descriptor)?.len())
    }

    pub fn get<T: CollectionDocument>(&self, uid: Uuid) -> Result<Option<(InternalId, T)>> {
        match self.get_document(&DocumentKey::of::<T>(uid))? {
            Some((id, doc)) => Ok(Some((id, doc.decode()?))),
            None => Ok(None),
        }
    }

    /// Resolves an internal id. Ids of other sessions or other record types resolve to `None`.
    pub fn lookup<T: CollectionDocument>(&self, id: InternalId) -> Result<Option<T>> {
        match self.lookup_document(id)? {
            Some((_, doc)) if doc.key().is_partition(T::COLLECTION, T::SCHEMA_VERSION) => {
                Ok(Some(doc.decode()?))
            }
            _ => Ok(None),
        }
    }

    pub fn insert<T: CollectionDocument>(&mut self, record: &T) -> Result<InternalId> {
        self.insert_document(StoredDocument::encode(record)?)
    }

    pub fn update<T: CollectionDocument>(&mut self, record: &T) -> Result<InternalId> {
        self.update_document(StoredDocument::encode(record)?)
    }

    pub fn delete<T: CollectionDocument>(&mut self, uid: Uuid) -> Result<bool> {
        self.delete_document(&DocumentKey::of::<T>(uid))
    }

    // ------------------------------------------------------------------------
    // Persistence
    // ------------------------------------------------------------------------

    pub fn save(&mut self) -> Result<()> {
        match self.save_mode {
            SaveMode::Immediate => self.commit(None),
            SaveMode::Deferred => {
                event!(
                    Level::TRACE,
                    pending = self.pending.len(),
                    "deferred save checkpoint"
                );
                Ok(())
            }
        }
    }

    /// Writes every staged change, and optionally a new schema tag, in one engine commit.
    ///
    /// On failure the staged changes are kept; callers that must not leave an
    /// operation behind take a [`checkpoint`](Self::checkpoint) first.
    pub(crate) fn commit(&mut self, schema_version: Option<SchemaVersion>) -> Result<()> {
        if self.pending.is_empty() && schema_version.is_none() {
            return Ok(());
        }

        let batch = CommitBatch {
            writes: self
                .pending
                .iter()
                .map(|(key, pending)| match pending {
                    Pending::Upsert(doc) => WriteOp::Upsert(doc.clone()),
                    Pending::Delete => WriteOp::Delete(key.clone()),
                })
                .collect(),
            schema_version,
        };
        let writes = batch.writes.len();
        let deleted: Vec<DocumentKey> = self
            .pending
            .iter()
            .filter(|(_, pending)| matches!(pending, Pending::Delete))
            .map(|(key, _)| key.clone())
            .collect();

        let mut shared = self.shared.lock()?;
        match shared.engine.commit(batch) {
            Ok(()) => {
                shared.stats.commits += 1;
                for key in &deleted {
                    shared.ids.release(key);
                }
                drop(shared);
                self.pending.clear();
                event!(Level::DEBUG, writes, "store context committed");
                Ok(())
            }
            Err(err) => {
                shared.stats.failed_commits += 1;
                event!(Level::WARN, error = %err, writes, "store context commit failed");
                Err(match err {
                    DbError::Persistence(message) => DbError::Persistence(message),
                    other => DbError::Persistence(format!("Save failed: {}", other)),
                })
            }
        }
    }

    /// Drops every staged change.
    pub fn rollback(&mut self) {
        self.pending.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::memory::MemoryEngine;
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Note {
        uid: Uuid,
        date_updated: DateTime<Utc>,
        text: String,
    }

    impl CollectionDocument for Note {
        const COLLECTION: &'static str = "Note";
        const SCHEMA_VERSION: SchemaVersion = SchemaVersion::new(1, 0, 0);

        fn uid(&self) -> Uuid {
            self.uid
        }

        fn date_updated(&self) -> DateTime<Utc> {
            self.date_updated
        }

        fn set_date_updated(&mut self, at: DateTime<Utc>) {
            self.date_updated = at;
        }
    }

    fn note(text: &str) -> Note {
        Note {
            uid: Uuid::new_v4(),
            date_updated: Utc::now(),
            text: text.to_string(),
        }
    }

    fn context() -> (SharedStoreHandle, StoreContext) {
        let shared = SharedStore::new_handle(Box::new(MemoryEngine::new()));
        let ctx = StoreContext::new(shared.clone(), SaveMode::Immediate).unwrap();
        (shared, ctx)
    }

    #[test]
    fn test_staged_changes_are_invisible_to_other_contexts_until_saved() {
        let (shared, mut writer) = context();
        let reader = StoreContext::new(shared.clone(), SaveMode::Immediate).unwrap();
        let record = note("staged");

        writer.insert(&record).unwrap();
        assert_eq!(writer.fetch_all::<Note>().unwrap().len(), 1);
        assert!(reader.fetch_all::<Note>().unwrap().is_empty());

        writer.save().unwrap();
        assert!(!writer.has_changes());
        assert_eq!(reader.get::<Note>(record.uid).unwrap().unwrap().1, record);
        assert_eq!(shared.lock().unwrap().stats().commits, 1);
    }

    #[test]
    fn test_duplicate_uid_is_rejected() {
        let (_shared, mut ctx) = context();
        let record = note("once");
        ctx.insert(&record).unwrap();
        ctx.save().unwrap();

        let err = ctx.insert(&record).unwrap_err();
        assert!(matches!(err, DbError::Persistence(_)));
        assert_eq!(ctx.fetch_all::<Note>().unwrap().len(), 1);
    }

    #[test]
    fn test_internal_id_lookup_is_session_scoped() {
        let (_shared, mut ctx) = context();
        let record = note("slot");
        let id = ctx.insert(&record).unwrap();
        ctx.save().unwrap();

        assert_eq!(ctx.lookup::<Note>(id).unwrap(), Some(record.clone()));

        let foreign = InternalId {
            session: Uuid::new_v4(),
            slot: id.slot(),
        };
        assert_eq!(ctx.lookup::<Note>(foreign).unwrap(), None);

        assert!(ctx.delete::<Note>(record.uid).unwrap());
        ctx.save().unwrap();
        assert_eq!(ctx.lookup::<Note>(id).unwrap(), None);
    }

    #[test]
    fn test_deferred_mode_never_reaches_engine_on_save() {
        let shared = SharedStore::new_handle(Box::new(MemoryEngine::new()));
        let mut ctx = StoreContext::new(shared.clone(), SaveMode::Deferred).unwrap();
        ctx.insert(&note("deferred")).unwrap();
        ctx.save().unwrap();

        assert!(ctx.has_changes());
        assert_eq!(shared.lock().unwrap().stats().commits, 0);

        ctx.commit(Some(Note::SCHEMA_VERSION)).unwrap();
        let shared = shared.lock().unwrap();
        assert_eq!(shared.stats().commits, 1);
        assert_eq!(
            shared.engine().schema_version().unwrap(),
            Some(Note::SCHEMA_VERSION)
        );
    }

    #[test]
    fn test_committed_delete_releases_slot() {
        let (shared, mut ctx) = context();
        let kept = note("kept");
        let dropped = note("dropped");
        ctx.insert(&kept).unwrap();
        let dropped_id = ctx.insert(&dropped).unwrap();
        ctx.save().unwrap();
        assert_eq!(shared.lock().unwrap().ids.len(), 2);

        ctx.delete::<Note>(dropped.uid).unwrap();
        assert_eq!(shared.lock().unwrap().ids.len(), 2);
        ctx.save().unwrap();
        assert_eq!(shared.lock().unwrap().ids.len(), 1);

        // A re-insert of the same uid gets a fresh slot.
        assert_eq!(ctx.lookup::<Note>(dropped_id).unwrap(), None);
        let new_id = ctx.insert(&dropped).unwrap();
        assert_ne!(dropped_id, new_id);
        assert_eq!(shared.lock().unwrap().ids.len(), 2);
    }

    #[test]
    fn test_undo_restores_previous_staged_change() {
        let (_shared, mut ctx) = context();
        let mut record = note("first");
        ctx.insert(&record).unwrap();

        let undo = ctx.checkpoint(&DocumentKey::of::<Note>(record.uid));
        record.text = "second".to_string();
        ctx.update(&record).unwrap();
        ctx.undo(undo);
        assert_eq!(ctx.get::<Note>(record.uid).unwrap().unwrap().1.text, "first");

        let fresh = note("fresh");
        let undo = ctx.checkpoint(&DocumentKey::of::<Note>(fresh.uid));
        ctx.insert(&fresh).unwrap();
        ctx.undo(undo);
        assert!(ctx.get::<Note>(fresh.uid).unwrap().is_none());
        assert_eq!(ctx.pending_len(), 1);
    }

    #[test]
    fn test_delete_missing_record_is_noop() {
        let (shared, mut ctx) = context();
        assert!(!ctx.delete::<Note>(Uuid::new_v4()).unwrap());
        assert!(!ctx.has_changes());
        ctx.save().unwrap();
        assert_eq!(shared.lock().unwrap().stats().commits, 0);
    }
}
