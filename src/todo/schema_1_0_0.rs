//! First released Todo shape.

use super::{COLLECTION, MOCK_SUMMARY, mock_timestamp, mock_uid};
use crate::core::{Result, SchemaVersion};
use crate::document::CollectionDocument;
use crate::schema::VersionedSchema;
use crate::storage::StoreContext;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const VERSION: SchemaVersion = SchemaVersion::new(1, 0, 0);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TodoItem {
    pub uid: Uuid,
    pub date_created: DateTime<Utc>,
    pub date_updated: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_checked: Option<DateTime<Utc>>,
    pub summary: String,
    pub is_checked: bool,
}

impl TodoItem {
    pub fn new(summary: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            uid: Uuid::new_v4(),
            date_created: now,
            date_updated: now,
            date_checked: None,
            summary: summary.into(),
            is_checked: false,
        }
    }
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
            uid: mock_uid(),
            date_created: at,
            date_updated: at,
            date_checked: None,
            summary: MOCK_SUMMARY.to_string(),
            is_checked: false,
        })?;
        context.save()
    }
}
