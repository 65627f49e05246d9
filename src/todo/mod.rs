//! Todo list records, their schema history and the plan migrating between them.

pub mod history;
pub mod item;
pub mod plan;
pub mod schema_1_0_0;
pub mod schema_1_1_0;
pub mod schema_1_2_0;

pub use history::{EditHistory, HistoryEntry};
pub use item::{TodoItem, TodoItemSnapshot};
pub use plan::{latest_schema, migrate_to_1_1_0, migrate_to_1_2_0, migration_plan, schemas};

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Collection name shared by every Todo schema version.
pub const COLLECTION: &str = "TodoItem";

pub(crate) const MOCK_SUMMARY: &str = "test";
const MOCK_UID: u128 = 0x7d1c_5a0e_9b3f_4c21_8e6d_2f4a_b8c0_1e57;
const MOCK_TIMESTAMP_SECS: i64 = 1_700_000_000;

/// `uid` of the record every schema's `insert_mocks` seeds.
pub fn mock_uid() -> Uuid {
    Uuid::from_u128(MOCK_UID)
}

pub(crate) fn mock_timestamp() -> DateTime<Utc> {
    DateTime::from_timestamp(MOCK_TIMESTAMP_SECS, 0).unwrap_or_default()
}
