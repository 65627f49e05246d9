use crate::core::SchemaVersion;
use chrono::{DateTime, Utc};
use serde::{Serialize, de::DeserializeOwned};
use uuid::Uuid;

/// A record type stored in a collection under one schema version.
///
/// Every record carries a `uid` that survives migrations and restarts. The
/// storage-internal [`InternalId`](crate::InternalId) does not.
pub trait CollectionDocument: Serialize + DeserializeOwned + Send + 'static {
    /// Logical collection the record belongs to. Stays the same across schema versions.
    const COLLECTION: &'static str;
    /// Schema version this record shape belongs to.
    const SCHEMA_VERSION: SchemaVersion;

    fn uid(&self) -> Uuid;
    fn date_updated(&self) -> DateTime<Utc>;
    fn set_date_updated(&mut self, at: DateTime<Utc>);
}

/// Conversion between a live record and a plain value that may cross task boundaries.
///
/// Implementations must satisfy `to_snapshot(from_snapshot(s)) == s`.
pub trait SendableDocument: Sized {
    type Snapshot: Clone + Send + Sync + 'static;

    fn from_snapshot(snapshot: Self::Snapshot) -> Self;
    fn to_snapshot(&self) -> Self::Snapshot;
}
