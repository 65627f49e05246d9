use super::{DbError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Three-part schema version identifier, ordered by `major`, `minor`, `patch`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SchemaVersion {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl SchemaVersion {
    pub const fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }
}

impl fmt::Display for SchemaVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

impl FromStr for SchemaVersion {
    type Err = DbError;

    fn from_str(s: &str) -> Result<Self> {
        let parts = s
            .trim()
            .split('.')
            .map(|part| part.parse::<u32>())
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|err| {
                DbError::Configuration(format!("Invalid schema version '{}': {}", s, err))
            })?;

        match parts.as_slice() {
            [major, minor, patch] => Ok(Self::new(*major, *minor, *patch)),
            _ => Err(DbError::Configuration(format!(
                "Invalid schema version '{}': expected MAJOR.MINOR.PATCH",
                s
            ))),
        }
    }
}

/// Storage-internal identifier of a record.
///
/// Only valid within the store session that issued it. Never persist it and never
/// compare it across restarts; use the record `uid` for that.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InternalId {
    pub(crate) session: Uuid,
    pub(crate) slot: u64,
}

impl InternalId {
    pub fn session(&self) -> Uuid {
        self.session
    }

    pub fn slot(&self) -> u64 {
        self.slot
    }
}

impl fmt::Display for InternalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.session, self.slot)
    }
}

/// Key accepted by every keyed collection operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKey {
    /// Stable caller-visible identifier, looked up by field.
    Uid(Uuid),
    /// Session-scoped identifier, looked up by slot.
    Id(InternalId),
}

impl From<Uuid> for RecordKey {
    fn from(uid: Uuid) -> Self {
        Self::Uid(uid)
    }
}

impl From<InternalId> for RecordKey {
    fn from(id: InternalId) -> Self {
        Self::Id(id)
    }
}

impl From<&InternalId> for RecordKey {
    fn from(id: &InternalId) -> Self {
        Self::Id(*id)
    }
}
