use super::item::TodoItem;
use super::schema_1_2_0;

pub type EditHistory = schema_1_2_0::EditHistory;
pub type HistoryEntry = schema_1_2_0::HistoryEntry;

impl EditHistory {
    /// Records the item's current `summary` and `is_checked` under its `date_updated`.
    ///
    /// A second entry for the same timestamp replaces the first.
    pub fn add_entry(&mut self, item: &TodoItem) {
        self.history.insert(item.date_updated, HistoryEntry::from(item));
    }

    pub fn len(&self) -> usize {
        self.history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }

    /// Entry with the latest timestamp.
    pub fn latest(&self) -> Option<&HistoryEntry> {
        self.history.values().next_back()
    }
}

impl From<&TodoItem> for HistoryEntry {
    fn from(item: &TodoItem) -> Self {
        Self {
            summary: item.summary.clone(),
            is_checked: item.is_checked,
        }
    }
}
