//! Adds the `v` version tag to every item and writes edit-history keys as
//! explicit RFC 3339 strings.

use super::{COLLECTION, MOCK_SUMMARY, mock_timestamp, mock_uid};
use crate::core::{Result, SchemaVersion};
use crate::document::CollectionDocument;
use crate::schema::VersionedSchema;
use crate::storage::StoreContext;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

pub const VERSION: SchemaVersion = SchemaVersion::new(1, 2, 0);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub summary: String,
    pub is_checked: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EditHistory {
    #[serde(with = "rfc3339_keys")]
    pub history: BTreeMap<DateTime<Utc>, HistoryEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TodoItem {
    /// Schema version the record was written with, e.g. `"1.2.0"`.
    pub v: String,
    pub uid: Uuid,
    pub date_created: DateTime<Utc>,
    pub date_updated: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_checked: Option<DateTime<Utc>>,
    pub summary: String,
    pub is_checked: bool,
    pub edit_history: EditHistory,
}

impl CollectionDocument for TodoItem {
    const COLLECTION: &'static str = COLLECTION;
    const SCHEMA_VERSION: SchemaVersion = VERSION;

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

#[derive(Debug, Clone, Copy, Default)]
pub struct Schema;

impl VersionedSchema for Schema {
    fn version(&self) -> SchemaVersion {
        VERSION
    }

    fn models(&self) -> &'static [&'static str] {
        &[COLLECTION]
    }

    fn insert_mocks(&self, context: &mut StoreContext) -> Result<()> {
        let at = mock_timestamp();
        context.insert(&TodoItem {
            v: VERSION.to_string(),
            uid: mock_uid(),
            date_created: at,
            date_updated: at,
            date_checked: None,
            summary: MOCK_SUMMARY.to_string(),
            is_checked: false,
            edit_history: EditHistory::default(),
        })?;
        context.save()
    }
}

mod rfc3339_keys {
    use super::HistoryEntry;
    use chrono::{DateTime, SecondsFormat, Utc};
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serializer};
    use std::collections::BTreeMap;

    pub fn serialize<S>(
        history: &BTreeMap<DateTime<Utc>, HistoryEntry>,
        serializer: S,
    ) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_map(
            history
                .iter()
                .map(|(at, entry)| (at.to_rfc3339_opts(SecondsFormat::AutoSi, true), entry)),
        )
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<BTreeMap<DateTime<Utc>, HistoryEntry>, D::Error>
    where
        D: Deserializer<'de>,
    {
        BTreeMap::<String, HistoryEntry>::deserialize(deserializer)?
            .into_iter()
            .map(|(key, entry)| {
                DateTime::parse_from_rfc3339(&key)
                    .map(|at| (at.with_timezone(&Utc), entry))
                    .map_err(|err| D::Error::custom(format!("invalid history key '{}': {}", key, err)))
            })
            .collect()
    }
}
