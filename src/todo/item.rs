use super::history::EditHistory;
use super::schema_1_2_0;
use crate::document::{CollectionDocument, SendableDocument};
use crate::storage::{FetchDescriptor, SortDescriptor};
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// The Todo item shape of the latest schema.
pub type TodoItem = schema_1_2_0::TodoItem;

/// Value copy of a [`TodoItem`], safe to hand across tasks.
#[derive(Debug, Clone, PartialEq)]
pub struct TodoItemSnapshot {
    pub v: String,
    pub uid: Uuid,
    pub date_created: DateTime<Utc>,
    pub date_updated: DateTime<Utc>,
    pub date_checked: Option<DateTime<Utc>>,
    pub summary: String,
    pub is_checked: bool,
    pub edit_history: EditHistory,
}

impl TodoItemSnapshot {
    /// A new, unchecked item with a fresh `uid`.
    pub fn new(summary: impl Into<String>) -> Self {
        TodoItem::new(summary).to_snapshot()
    }
}

impl TodoItem {
    pub fn new(summary: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            v: Self::SCHEMA_VERSION.to_string(),
            uid: Uuid::new_v4(),
            date_created: now,
            date_updated: now,
            date_checked: None,
            summary: summary.into(),
            is_checked: false,
            edit_history: EditHistory::default(),
        }
    }

    /// Items whose summary contains `search_text` (case-insensitive), newest first.
    ///
    /// An empty `search_text` matches every item. With `show_checked == false`
    /// checked items are left out.
    pub fn query(search_text: &str, show_checked: bool) -> FetchDescriptor<TodoItem> {
        let needle = search_text.trim().to_lowercase();
        let descriptor = FetchDescriptor::new()
            .sort_by(SortDescriptor::by_key(|item: &TodoItem| item.date_created).reverse());

        if needle.is_empty() && show_checked {
            return descriptor;
        }
        descriptor.filter(move |item: &TodoItem| {
            (show_checked || !item.is_checked)
                && (needle.is_empty() || item.summary.to_lowercase().contains(&needle))
        })
    }

    /// Flips `is_checked`, setting or clearing `date_checked` with it.
    pub fn toggle_checked(&mut self) {
        self.is_checked = !self.is_checked;
        self.date_checked = self.is_checked.then(Utc::now);
    }
}

impl SendableDocument for TodoItem {
    type Snapshot = TodoItemSnapshot;

    fn from_snapshot(snapshot: TodoItemSnapshot) -> Self {
        Self {
            v: snapshot.v,
            uid: snapshot.uid,
            date_created: snapshot.date_created,
            date_updated: snapshot.date_updated,
            date_checked: snapshot.date_checked,
            summary: snapshot.summary,
            is_checked: snapshot.is_checked,
            edit_history: snapshot.edit_history,
        }
    }

    fn to_snapshot(&self) -> TodoItemSnapshot {
        TodoItemSnapshot {
            v: self.v.clone(),
            uid: self.uid,
            date_created: self.date_created,
            date_updated: self.date_updated,
            date_checked: self.date_checked,
            summary: self.summary.clone(),
            is_checked: self.is_checked,
            edit_history: self.edit_history.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(summary: &str, checked: bool) -> TodoItem {
        let mut item = TodoItem::new(summary);
        if checked {
            item.toggle_checked();
        }
        item
    }

    #[test]
    fn test_snapshot_round_trip_is_identity() {
        let mut snapshot = TodoItemSnapshot::new("buy milk");
        let live = TodoItem::from_snapshot(snapshot.clone());
        snapshot.edit_history.add_entry(&live);

        let back = TodoItem::from_snapshot(snapshot.clone()).to_snapshot();
        assert_eq!(back, snapshot);
        assert_eq!(back.v, "1.2.0");
    }

    #[test]
    fn test_toggle_checked_sets_and_clears_date() {
        let mut todo = TodoItem::new("walk");
        todo.toggle_checked();
        assert!(todo.is_checked);
        assert!(todo.date_checked.is_some());

        todo.toggle_checked();
        assert!(!todo.is_checked);
        assert!(todo.date_checked.is_none());
    }

    #[test]
    fn test_query_filters_by_text_and_checked_state() {
        let items = [
            item("Buy MILK", false),
            item("milk the cow", true),
            item("walk", false),
        ];

        let everything = TodoItem::query("", true);
        assert!(items.iter().all(|todo| everything.matches(todo)));

        let milk = TodoItem::query("milk", true);
        assert_eq!(items.iter().filter(|todo| milk.matches(todo)).count(), 2);

        let open_milk = TodoItem::query("Milk", false);
        let matched: Vec<_> = items.iter().filter(|todo| open_milk.matches(todo)).collect();
        assert_eq!(matched.len(), 1);
        assert_eq!(matched[0].summary, "Buy MILK");

        let open = TodoItem::query("", false);
        assert_eq!(items.iter().filter(|todo| open.matches(todo)).count(), 2);
    }
}
