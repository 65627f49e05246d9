use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

pub type Predicate<T> = Arc<dyn Fn(&T) -> bool + Send + Sync>;
type Comparator<T> = Arc<dyn Fn(&T, &T) -> Ordering + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Forward,
    Reverse,
}

/// One sort key of a fetch. Descriptors are applied in order, later ones break ties.
pub struct SortDescriptor<T> {
    compare: Comparator<T>,
    order: SortOrder,
}

impl<T> SortDescriptor<T> {
    pub fn by<F>(compare: F) -> Self
    where
        F: Fn(&T, &T) -> Ordering + Send + Sync + 'static,
    {
        Self {
            compare: Arc::new(compare),
            order: SortOrder::Forward,
        }
    }

    pub fn by_key<K, F>(key: F) -> Self
    where
        K: Ord,
        F: Fn(&T) -> K + Send + Sync + 'static,
    {
        Self::by(move |a, b| key(a).cmp(&key(b)))
    }

    pub fn reverse(mut self) -> Self {
        self.order = match self.order {
            SortOrder::Forward => SortOrder::Reverse,
            SortOrder::Reverse => SortOrder::Forward,
        };
        self
    }

    pub fn order(&self) -> SortOrder {
        self.order
    }

    fn compare(&self, a: &T, b: &T) -> Ordering {
        let ordering = (self.compare)(a, b);
        match self.order {
            SortOrder::Forward => ordering,
            SortOrder::Reverse => ordering.reverse(),
        }
    }
}

impl<T> Clone for SortDescriptor<T> {
    fn clone(&self) -> Self {
        Self {
            compare: Arc::clone(&self.compare),
            order: self.order,
        }
    }
}

/// Predicate, sort and limit of a typed fetch.
pub struct FetchDescriptor<T> {
    predicate: Option<Predicate<T>>,
    sort_by: Vec<SortDescriptor<T>>,
    fetch_limit: Option<usize>,
}

impl<T> Default for FetchDescriptor<T> {
    fn default() -> Self {
        Self {
            predicate: None,
            sort_by: Vec::new(),
            fetch_limit: None,
        }
    }
}

impl<T> Clone for FetchDescriptor<T> {
    fn clone(&self) -> Self {
        Self {
            predicate: self.predicate.clone(),
            sort_by: self.sort_by.clone(),
            fetch_limit: self.fetch_limit,
        }
    }
}

impl<T> fmt::Debug for FetchDescriptor<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FetchDescriptor")
            .field("has_predicate", &self.predicate.is_some())
            .field("sort_keys", &self.sort_by.len())
            .field("fetch_limit", &self.fetch_limit)
            .finish()
    }
}

impl<T> FetchDescriptor<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filter<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&T) -> bool + Send + Sync + 'static,
    {
        self.predicate = Some(Arc::new(predicate));
        self
    }

    pub fn sort_by(mut self, descriptor: SortDescriptor<T>) -> Self {
        self.sort_by.push(descriptor);
        self
    }

    pub fn limit(mut self, fetch_limit: usize) -> Self {
        self.fetch_limit = Some(fetch_limit);
        self
    }

    pub fn fetch_limit(&self) -> Option<usize> {
        self.fetch_limit
    }

    pub fn matches(&self, record: &T) -> bool {
        self.predicate
            .as_ref()
            .map(|predicate| predicate(record))
            .unwrap_or(true)
    }

    /// Filters, sorts (stable) and truncates `rows` whose record sits at `.1`.
    pub(crate) fn apply<I>(&self, rows: Vec<(I, T)>) -> Vec<(I, T)> {
        let mut rows: Vec<(I, T)> = rows
            .into_iter()
            .filter(|(_, record)| self.matches(record))
            .collect();

        if !self.sort_by.is_empty() {
            rows.sort_by(|(_, a), (_, b)| {
                self.sort_by
                    .iter()
                    .map(|descriptor| descriptor.compare(a, b))
                    .find(|ordering| *ordering != Ordering::Equal)
                    .unwrap_or(Ordering::Equal)
            });
        }

        if let Some(limit) = self.fetch_limit {
            rows.truncate(limit);
        }
        rows
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Row {
        name: &'static str,
        rank: u32,
    }

    fn rows() -> Vec<((), Row)> {
        vec![
            ((), Row { name: "b", rank: 2 }),
            ((), Row { name: "a", rank: 2 }),
            ((), Row { name: "c", rank: 1 }),
            ((), Row { name: "d", rank: 3 }),
        ]
    }

    fn names(rows: Vec<((), Row)>) -> Vec<&'static str> {
        rows.into_iter().map(|(_, row)| row.name).collect()
    }

    #[test]
    fn test_multi_key_sort_with_reverse() {
        let descriptor = FetchDescriptor::<Row>::new()
            .sort_by(SortDescriptor::by_key(|row: &Row| row.rank).reverse())
            .sort_by(SortDescriptor::by_key(|row: &Row| row.name));

        assert_eq!(names(descriptor.apply(rows())), vec!["d", "a", "b", "c"]);
    }

    #[test]
    fn test_filter_then_limit() {
        let descriptor = FetchDescriptor::<Row>::new()
            .filter(|row| row.rank >= 2)
            .sort_by(SortDescriptor::by_key(|row: &Row| row.name))
            .limit(2);

        assert_eq!(names(descriptor.apply(rows())), vec!["a", "b"]);
    }
}
