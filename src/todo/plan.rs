use super::{schema_1_0_0, schema_1_1_0, schema_1_2_0};
use crate::core::Result;
use crate::migration::{MigrationPlan, MigrationStage, ReshapeStage};
use crate::schema::VersionedSchema;
use std::sync::Arc;

/// Every Todo schema version, oldest first.
pub fn schemas() -> Vec<Arc<dyn VersionedSchema>> {
    vec![
        Arc::new(schema_1_0_0::Schema),
        Arc::new(schema_1_1_0::Schema),
        Arc::new(schema_1_2_0::Schema),
    ]
}

pub fn latest_schema() -> Arc<dyn VersionedSchema> {
    Arc::new(schema_1_2_0::Schema)
}

/// 1.0.0 -> 1.1.0: every item starts with an empty edit history.
pub fn migrate_to_1_1_0() -> ReshapeStage<schema_1_0_0::TodoItem, schema_1_1_0::TodoItem> {
    ReshapeStage::custom(|old: schema_1_0_0::TodoItem| schema_1_1_0::TodoItem {
        uid: old.uid,
        date_created: old.date_created,
        date_updated: old.date_updated,
        date_checked: old.date_checked,
        summary: old.summary,
        is_checked: old.is_checked,
        edit_history: schema_1_1_0::EditHistory::default(),
    })
}

/// 1.1.0 -> 1.2.0: tags every item with `v` and carries its edit history over.
pub fn migrate_to_1_2_0() -> ReshapeStage<schema_1_1_0::TodoItem, schema_1_2_0::TodoItem> {
    ReshapeStage::custom(|old: schema_1_1_0::TodoItem| schema_1_2_0::TodoItem {
        v: schema_1_2_0::VERSION.to_string(),
        uid: old.uid,
        date_created: old.date_created,
        date_updated: old.date_updated,
        date_checked: old.date_checked,
        summary: old.summary,
        is_checked: old.is_checked,
        edit_history: schema_1_2_0::EditHistory {
            history: old
                .edit_history
                .history
                .into_iter()
                .map(|(at, entry)| {
                    let entry = schema_1_2_0::HistoryEntry {
                        summary: entry.summary,
                        is_checked: entry.is_checked,
                    };
                    (at, entry)
                })
                .collect(),
        },
    })
}

/// The full Todo migration plan, 1.0.0 through 1.2.0.
pub fn migration_plan() -> Result<MigrationPlan> {
    let stages: Vec<Arc<dyn MigrationStage>> =
        vec![Arc::new(migrate_to_1_1_0()), Arc::new(migrate_to_1_2_0())];
    MigrationPlan::new(schemas(), stages)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::SchemaVersion;
    use chrono::Utc;
    use uuid::Uuid;

    #[test]
    fn test_plan_covers_every_version() {
        let plan = migration_plan().unwrap();
        assert_eq!(
            plan.versions(),
            vec![
                SchemaVersion::new(1, 0, 0),
                SchemaVersion::new(1, 1, 0),
                SchemaVersion::new(1, 2, 0)
            ]
        );
        assert_eq!(plan.current_version(), latest_schema().version());
    }

    #[test]
    fn test_reshape_to_1_2_0_keeps_history() {
        let now = Utc::now();
        let mut history = schema_1_1_0::EditHistory::default();
        history.history.insert(
            now,
            schema_1_1_0::HistoryEntry {
                summary: "before".to_string(),
                is_checked: false,
            },
        );
        let old = schema_1_1_0::TodoItem {
            uid: Uuid::new_v4(),
            date_created: now,
            date_updated: now,
            date_checked: None,
            summary: "after".to_string(),
            is_checked: false,
            edit_history: history,
        };

        let stage = migrate_to_1_2_0();
        let migrated = stage.reshape(old.clone());
        assert_eq!(migrated.uid, old.uid);
        assert_eq!(migrated.v, "1.2.0");
        assert_eq!(migrated.edit_history.history[&now].summary, "before");
    }
}
