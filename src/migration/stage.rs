use crate::core::{DbError, Result, SchemaVersion};
use crate::document::CollectionDocument;
use crate::storage::{StoreContext, StoredDocument};
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

/// Old-shape records held in memory between the before and after phase of one stage.
///
/// Produced by [`MigrationStage::will_migrate`] and consumed by
/// [`MigrationStage::did_migrate`]; it never outlives the stage.
#[derive(Debug, Default)]
pub struct Retainer {
    documents: Vec<StoredDocument>,
}

impl Retainer {
    pub fn new(documents: Vec<StoredDocument>) -> Self {
        Self { documents }
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    pub fn documents(&self) -> &[StoredDocument] {
        &self.documents
    }

    pub fn into_documents(self) -> Vec<StoredDocument> {
        self.documents
    }
}

/// A directed edge between two consecutive schema versions.
///
/// A plan holds one stage per edge, so a schema with several collections moves
/// all of them in that one stage. The runner retags the store once the stage
/// commits; collections the stage leaves behind stay under the old version.
pub trait MigrationStage: Send + Sync {
    fn from_version(&self) -> SchemaVersion;
    fn to_version(&self) -> SchemaVersion;

    /// Before phase, runs while old-shape data still exists.
    ///
    /// Fetches every old-shape record, retains it, and deletes it from the context.
    fn will_migrate(&self, context: &mut StoreContext) -> Result<Retainer>;

    /// After phase, runs once the new shape is in effect.
    ///
    /// Re-inserts every retained record in the new shape and returns how many it inserted.
    fn did_migrate(&self, context: &mut StoreContext, retained: Retainer) -> Result<usize>;
}

impl fmt::Debug for dyn MigrationStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MigrationStage")
            .field("from_version", &self.from_version())
            .field("to_version", &self.to_version())
            .finish()
    }
}

pub type ReshapeFn<Old, New> = Arc<dyn Fn(Old) -> New + Send + Sync>;

/// Custom stage moving one collection from record shape `Old` to `New`.
///
/// The reshape function copies every field both shapes share and sets explicit
/// defaults for the fields only `New` has. It must keep the `uid`.
pub struct ReshapeStage<Old, New> {
    reshape: ReshapeFn<Old, New>,
    _shapes: PhantomData<fn(Old) -> New>,
}

impl<Old, New> ReshapeStage<Old, New>
where
    Old: CollectionDocument,
    New: CollectionDocument,
{
    pub fn custom<F>(reshape: F) -> Self
    where
        F: Fn(Old) -> New + Send + Sync + 'static,
    {
        Self {
            reshape: Arc::new(reshape),
            _shapes: PhantomData,
        }
    }

    /// Applies the reshape function to one record.
    pub fn reshape(&self, old: Old) -> New {
        (self.reshape)(old)
    }
}

impl<Old, New> MigrationStage for ReshapeStage<Old, New>
where
    Old: CollectionDocument,
    New: CollectionDocument,
{
    fn from_version(&self) -> SchemaVersion {
        Old::SCHEMA_VERSION
    }

    fn to_version(&self) -> SchemaVersion {
        New::SCHEMA_VERSION
    }

    fn will_migrate(&self, context: &mut StoreContext) -> Result<Retainer> {
        let documents: Vec<StoredDocument> = context
            .scan_documents(Old::COLLECTION, Old::SCHEMA_VERSION)?
            .into_iter()
            .map(|(_, doc)| doc)
            .collect();

        // Refuse to delete anything the after phase could not decode.
        for doc in &documents {
            doc.decode::<Old>()?;
        }
        for doc in &documents {
            context.delete_document(&doc.key())?;
        }
        context.save()?;

        Ok(Retainer::new(documents))
    }

    fn did_migrate(&self, context: &mut StoreContext, retained: Retainer) -> Result<usize> {
        let mut inserted = 0;
        for doc in retained.into_documents() {
            let old: Old = doc.decode()?;
            let reshaped = self.reshape(old);
            if reshaped.uid() != doc.uid {
                return Err(DbError::Persistence(format!(
                    "Reshape of record '{}' changed its uid to '{}'",
                    doc.uid,
                    reshaped.uid()
                )));
            }
            context.insert(&reshaped)?;
            inserted += 1;
        }
        context.save()?;
        Ok(inserted)
    }
}
