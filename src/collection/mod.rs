pub mod scheduler;

pub use scheduler::{DEFAULT_SAVE_DEBOUNCE, SaveScheduler};

use crate::core::{DbError, InternalId, RecordKey, Result};
use crate::document::{CollectionDocument, SendableDocument};
use crate::storage::context::StagedUndo;
use crate::storage::{DocumentKey, FetchDescriptor, StoreContext};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use lru::LruCache;
use std::fmt;
use std::marker::PhantomData;
use std::num::NonZeroUsize;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{Level, event, warn};
use uuid::Uuid;

/// Serialized single-writer access to one collection of `T` records.
///
/// Clones share the same state. Every operation takes the state lock, so two
/// operations of one collection never overlap and run in the order the lock is
/// granted. Callers only ever see snapshots; live records stay inside.
pub struct DbCollection<T>
where
    T: CollectionDocument + SendableDocument,
{
    inner: Arc<Mutex<CollectionState<T>>>,
}

impl<T> Clone for DbCollection<T>
where
    T: CollectionDocument + SendableDocument,
{
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> fmt::Debug for DbCollection<T>
where
    T: CollectionDocument + SendableDocument,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DbCollection")
            .field("collection", &T::COLLECTION)
            .field("schema_version", &T::SCHEMA_VERSION)
            .finish()
    }
}

struct CollectionState<T>
where
    T: CollectionDocument + SendableDocument,
{
    context: StoreContext,
    fetch_cache: Option<LruCache<Uuid, InternalId>>,
    scheduler: SaveScheduler,
    _records: PhantomData<fn() -> T>,
}

impl<T> CollectionState<T>
where
    T: CollectionDocument + SendableDocument,
{
    fn resolve(&mut self, key: RecordKey) -> Result<Option<(InternalId, T)>> {
        match key {
            RecordKey::Uid(uid) => {
                let cached = self.fetch_cache.as_mut().and_then(|cache| cache.get(&uid).copied());
                if let Some(id) = cached {
                    // Slot ids only; the record itself is always read fresh.
                    if let Some(record) = self.context.lookup::<T>(id)? {
                        return Ok(Some((id, record)));
                    }
                    self.forget(uid);
                }
                let found = self.context.get::<T>(uid)?;
                if let Some((id, _)) = &found {
                    self.remember(uid, *id);
                }
                Ok(found)
            }
            RecordKey::Id(id) => {
                let found = self.context.lookup::<T>(id)?;
                if let Some(record) = &found {
                    self.remember(record.uid(), id);
                }
                Ok(found.map(|record| (id, record)))
            }
        }
    }

    fn remember(&mut self, uid: Uuid, id: InternalId) {
        if let Some(cache) = self.fetch_cache.as_mut() {
            cache.put(uid, id);
        }
    }

    fn forget(&mut self, uid: Uuid) {
        if let Some(cache) = self.fetch_cache.as_mut() {
            cache.pop(&uid);
        }
    }

    /// Applies `mutator` to the live record, stamps `date_updated` and stages the result.
    fn apply_update<F, R>(&mut self, key: RecordKey, mutator: F) -> Result<Option<(R, StagedUndo)>>
    where
        F: FnOnce(&mut T) -> R,
    {
        let Some((_, mut record)) = self.resolve(key)? else {
            return Ok(None);
        };
        let uid = record.uid();
        let previous = record.date_updated();

        let result = mutator(&mut record);
        if record.uid() != uid {
            return Err(DbError::Persistence(format!(
                "Update of record '{}' must not change its uid",
                uid
            )));
        }
        record.set_date_updated(next_timestamp(previous));

        let undo = self.context.checkpoint(&DocumentKey::of::<T>(uid));
        self.context.update(&record)?;
        self.forget(uid);
        Ok(Some((result, undo)))
    }

    fn save(&mut self) -> Result<()> {
        self.context.save()?;
        self.scheduler.cancel();
        Ok(())
    }

    /// Saves, or takes back the one operation recorded in `undo` if the save fails.
    ///
    /// Other staged changes, such as those of a failed debounced save, stay staged.
    fn save_or_undo(&mut self, undo: StagedUndo) -> Result<()> {
        if let Err(err) = self.save() {
            self.context.undo(undo);
            return Err(err);
        }
        Ok(())
    }
}

impl<T> Drop for CollectionState<T>
where
    T: CollectionDocument + SendableDocument,
{
    fn drop(&mut self) {
        if !self.context.has_changes() {
            return;
        }
        self.scheduler.cancel();
        match self.context.save() {
            Ok(()) => event!(Level::DEBUG, collection = T::COLLECTION, "staged changes saved on drop"),
            Err(err) => warn!(
                collection = T::COLLECTION,
                error = %err,
                "save on drop failed; staged changes are lost"
            ),
        }
    }
}

/// `now`, or just past `previous` when the clock has not moved beyond it.
fn next_timestamp(previous: DateTime<Utc>) -> DateTime<Utc> {
    let now = Utc::now();
    if now > previous {
        now
    } else {
        previous + ChronoDuration::microseconds(1)
    }
}

impl<T> DbCollection<T>
where
    T: CollectionDocument + SendableDocument,
{
    pub(crate) fn new(context: StoreContext, save_debounce: Duration, fetch_cache_capacity: usize) -> Self {
        let state = CollectionState {
            context,
            fetch_cache: NonZeroUsize::new(fetch_cache_capacity).map(LruCache::new),
            scheduler: SaveScheduler::new(save_debounce),
            _records: PhantomData,
        };
        Self {
            inner: Arc::new(Mutex::new(state)),
        }
    }

    pub fn name(&self) -> &'static str {
        T::COLLECTION
    }

    /// Builds a record from `snapshot`, adds it and saves.
    pub async fn insert(&self, snapshot: T::Snapshot) -> Result<InternalId> {
        let mut state = self.inner.lock().await;
        let record = T::from_snapshot(snapshot);
        let uid = record.uid();
        let undo = state.context.checkpoint(&DocumentKey::of::<T>(uid));
        let id = state.context.insert(&record)?;
        state.save_or_undo(undo)?;
        event!(Level::DEBUG, collection = T::COLLECTION, uid = %uid, "record inserted");
        Ok(id)
    }

    /// Returns the record's snapshot, `None` if it does not exist.
    pub async fn fetch(&self, key: impl Into<RecordKey>) -> Result<Option<T::Snapshot>> {
        let mut state = self.inner.lock().await;
        Ok(state
            .resolve(key.into())?
            .map(|(_, record)| record.to_snapshot()))
    }

    /// Returns the record's internal id, `None` if it does not exist.
    pub async fn id_of(&self, uid: Uuid) -> Result<Option<InternalId>> {
        let mut state = self.inner.lock().await;
        Ok(state.resolve(RecordKey::Uid(uid))?.map(|(id, _)| id))
    }

    pub async fn fetch_all(&self) -> Result<Vec<T::Snapshot>> {
        self.query(FetchDescriptor::new()).await
    }

    pub async fn query(&self, descriptor: FetchDescriptor<T>) -> Result<Vec<T::Snapshot>> {
        let state = self.inner.lock().await;
        Ok(state
            .context
            .fetch(&descriptor)?
            .into_iter()
            .map(|(_, record)| record.to_snapshot())
            .collect())
    }

    pub async fn count(&self) -> Result<usize> {
        let state = self.inner.lock().await;
        state.context.fetch_count(&FetchDescriptor::<T>::new())
    }

    /// Removes the record and saves. Does nothing if it does not exist.
    ///
    /// If the save fails the record stays in place.
    pub async fn delete(&self, key: impl Into<RecordKey>) -> Result<()> {
        let mut state = self.inner.lock().await;
        let Some((_, record)) = state.resolve(key.into())? else {
            return Ok(());
        };
        let uid = record.uid();
        state.forget(uid);
        let undo = state.context.checkpoint(&DocumentKey::of::<T>(uid));
        state.context.delete::<T>(uid)?;
        state.save_or_undo(undo)?;
        event!(Level::DEBUG, collection = T::COLLECTION, uid = %uid, "record deleted");
        Ok(())
    }

    /// Mutates the live record in place and saves before returning.
    ///
    /// Returns `None` without side effects if the record does not exist, otherwise
    /// the mutator's result. `date_updated` is stamped after the mutator runs.
    /// If the save fails the record keeps its previous state.
    pub async fn update<F, R>(&self, key: impl Into<RecordKey>, mutator: F) -> Result<Option<R>>
    where
        F: FnOnce(&mut T) -> R + Send,
        R: Send,
    {
        let mut state = self.inner.lock().await;
        let Some((result, undo)) = state.apply_update(key.into(), mutator)? else {
            return Ok(None);
        };
        state.save_or_undo(undo)?;
        Ok(Some(result))
    }

    /// Same contract as [`update`](Self::update), but persistence is left to the
    /// debounced scheduler. The change is visible to this collection right away.
    pub async fn update_and_save_later<F, R>(
        &self,
        key: impl Into<RecordKey>,
        mutator: F,
    ) -> Result<Option<R>>
    where
        F: FnOnce(&mut T) -> R + Send,
        R: Send,
    {
        let mut state = self.inner.lock().await;
        let Some((result, _)) = state.apply_update(key.into(), mutator)? else {
            return Ok(None);
        };
        let weak = Arc::downgrade(&self.inner);
        state
            .scheduler
            .schedule(move |generation| debounced_save(weak, generation));
        Ok(Some(result))
    }

    /// Cancels any pending debounced save and saves now.
    pub async fn save_now(&self) -> Result<()> {
        let mut state = self.inner.lock().await;
        state.save()
    }

    pub async fn has_pending_save(&self) -> bool {
        let state = self.inner.lock().await;
        state.scheduler.is_pending()
    }

    pub async fn has_unsaved_changes(&self) -> bool {
        let state = self.inner.lock().await;
        state.context.has_changes()
    }
}

async fn debounced_save<T>(weak: Weak<Mutex<CollectionState<T>>>, generation: u64)
where
    T: CollectionDocument + SendableDocument,
{
    let Some(inner) = weak.upgrade() else {
        return;
    };
    let mut state = inner.lock().await;
    if !state.scheduler.fire(generation) {
        return;
    }
    match state.context.save() {
        Ok(()) => event!(Level::DEBUG, collection = T::COLLECTION, "debounced save completed"),
        Err(err) => warn!(
            collection = T::COLLECTION,
            error = %err,
            "debounced save failed; next mutation will re-arm it"
        ),
    }
}
