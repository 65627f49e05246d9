/// Collection actor tests
///
/// Single-task behaviour of `DbCollection`: CRUD, keys, queries and the fetch cache.
/// Run with: cargo test --test collection_tests

use quilldb::todo::{self, TodoItem, TodoItemSnapshot};
use quilldb::{Container, ContainerConfig, DbCollection, DbError, RecordKey};
use uuid::Uuid;

async fn open(config: ContainerConfig) -> (Container, DbCollection<TodoItem>) {
    let container = Container::open(config, todo::latest_schema(), None)
        .await
        .unwrap();
    let items = container.collection::<TodoItem>().unwrap();
    (container, items)
}

#[tokio::test]
async fn test_update_then_fetch() {
    let (_container, items) = open(ContainerConfig::in_memory()).await;
    let snapshot = TodoItemSnapshot::new("A");
    let uid = snapshot.uid;
    let inserted_at = snapshot.date_updated;
    items.insert(snapshot).await.unwrap();

    let result = items
        .update(uid, |item| {
            item.summary = "B".to_string();
            item.summary.len()
        })
        .await
        .unwrap();
    assert_eq!(result, Some(1));

    let fetched = items.fetch(uid).await.unwrap().unwrap();
    assert_eq!(fetched.summary, "B");
    assert!(fetched.date_updated > inserted_at);
}

#[tokio::test]
async fn test_repeated_updates_keep_date_updated_increasing() {
    let (_container, items) = open(ContainerConfig::in_memory()).await;
    let snapshot = TodoItemSnapshot::new("tick");
    let uid = snapshot.uid;
    items.insert(snapshot).await.unwrap();

    let mut previous = items.fetch(uid).await.unwrap().unwrap().date_updated;
    for _ in 0..10 {
        items.update(uid, |item| item.toggle_checked()).await.unwrap();
        let current = items.fetch(uid).await.unwrap().unwrap().date_updated;
        assert!(current > previous);
        previous = current;
    }
}

#[tokio::test]
async fn test_delete_not_found_is_noop() {
    let (container, items) = open(ContainerConfig::in_memory()).await;
    items.insert(TodoItemSnapshot::new("keep")).await.unwrap();
    let commits = container.stats().unwrap().commits;

    items.delete(Uuid::new_v4()).await.unwrap();

    assert_eq!(items.count().await.unwrap(), 1);
    assert_eq!(container.stats().unwrap().commits, commits);
}

#[tokio::test]
async fn test_update_missing_record_skips_mutator() {
    let (_container, items) = open(ContainerConfig::in_memory()).await;
    let mut called = false;

    let result = items
        .update(Uuid::new_v4(), |_| {
            called = true;
        })
        .await
        .unwrap();

    assert!(result.is_none());
    assert!(!called);
}

#[tokio::test]
async fn test_duplicate_insert_is_rejected() {
    let (_container, items) = open(ContainerConfig::in_memory()).await;
    let snapshot = TodoItemSnapshot::new("once");
    items.insert(snapshot.clone()).await.unwrap();

    let err = items.insert(snapshot).await.unwrap_err();
    assert!(matches!(err, DbError::Persistence(_)));
    assert_eq!(items.count().await.unwrap(), 1);
    assert!(!items.has_unsaved_changes().await);
}

#[tokio::test]
async fn test_mutator_cannot_change_uid() {
    let (_container, items) = open(ContainerConfig::in_memory()).await;
    let snapshot = TodoItemSnapshot::new("stable");
    let uid = snapshot.uid;
    items.insert(snapshot).await.unwrap();

    let err = items
        .update(uid, |item| item.uid = Uuid::new_v4())
        .await
        .unwrap_err();
    assert!(matches!(err, DbError::Persistence(_)));
    assert_eq!(items.fetch(uid).await.unwrap().unwrap().summary, "stable");
}

#[tokio::test]
async fn test_internal_id_and_uid_address_the_same_record() {
    let (_container, items) = open(ContainerConfig::in_memory()).await;
    let snapshot = TodoItemSnapshot::new("both keys");
    let uid = snapshot.uid;
    let id = items.insert(snapshot).await.unwrap();

    assert_eq!(items.id_of(uid).await.unwrap(), Some(id));
    let by_id = items.fetch(RecordKey::Id(id)).await.unwrap().unwrap();
    assert_eq!(by_id.uid, uid);

    items.delete(id).await.unwrap();
    assert!(items.fetch(uid).await.unwrap().is_none());
    assert!(items.fetch(id).await.unwrap().is_none());
}

#[tokio::test]
async fn test_fetch_never_returns_stale_cached_record() {
    for capacity in [0, 1, 16] {
        let (_container, items) =
            open(ContainerConfig::in_memory().fetch_cache_capacity(capacity)).await;
        let first = TodoItemSnapshot::new("first");
        let second = TodoItemSnapshot::new("second");
        let (a, b) = (first.uid, second.uid);
        items.insert(first).await.unwrap();
        items.insert(second).await.unwrap();

        assert_eq!(items.fetch(a).await.unwrap().unwrap().summary, "first");
        items.update(a, |item| item.summary = "changed".to_string()).await.unwrap();
        assert_eq!(items.fetch(a).await.unwrap().unwrap().summary, "changed");

        assert_eq!(items.fetch(b).await.unwrap().unwrap().summary, "second");
        items.delete(b).await.unwrap();
        assert!(items.fetch(b).await.unwrap().is_none());
        assert_eq!(items.fetch(a).await.unwrap().unwrap().summary, "changed");
    }
}

#[tokio::test]
async fn test_query_filters_sorts_and_limits() {
    let (_container, items) = open(ContainerConfig::in_memory()).await;
    for summary in ["buy milk", "milk the cow", "walk the dog", "Milkshake"] {
        items.insert(TodoItemSnapshot::new(summary)).await.unwrap();
    }
    let cow = items
        .query(TodoItem::query("cow", true))
        .await
        .unwrap()
        .remove(0);
    items.update(cow.uid, |item| item.toggle_checked()).await.unwrap();

    let milk = items.query(TodoItem::query("MILK", true)).await.unwrap();
    assert_eq!(milk.len(), 3);
    assert!(milk.windows(2).all(|pair| pair[0].date_created >= pair[1].date_created));

    let open_milk = items.query(TodoItem::query("milk", false)).await.unwrap();
    assert_eq!(open_milk.len(), 2);
    assert!(open_milk.iter().all(|item| !item.is_checked));

    let limited = items.query(TodoItem::query("", true).limit(2)).await.unwrap();
    assert_eq!(limited.len(), 2);
    assert_eq!(items.fetch_all().await.unwrap().len(), 4);
}

#[tokio::test]
async fn test_collections_share_committed_state() {
    let (container, writer) = open(ContainerConfig::in_memory()).await;
    let reader = container.collection::<TodoItem>().unwrap();
    let snapshot = TodoItemSnapshot::new("shared");
    let uid = snapshot.uid;

    writer.insert(snapshot).await.unwrap();

    assert_eq!(reader.fetch(uid).await.unwrap().unwrap().summary, "shared");
    let infos = container.collections().unwrap();
    assert_eq!(infos.len(), 1);
    assert_eq!(infos[0].collection, todo::COLLECTION);
    assert_eq!(infos[0].record_count, 1);
}

#[tokio::test]
async fn test_edit_history_round_trips_through_the_store() {
    let (_container, items) = open(ContainerConfig::in_memory()).await;
    let snapshot = TodoItemSnapshot::new("draft");
    let uid = snapshot.uid;
    items.insert(snapshot).await.unwrap();

    items
        .update(uid, |item| {
            let before = item.clone();
            item.edit_history.add_entry(&before);
            item.summary = "final".to_string();
        })
        .await
        .unwrap();

    let fetched = items.fetch(uid).await.unwrap().unwrap();
    assert_eq!(fetched.summary, "final");
    assert_eq!(fetched.edit_history.len(), 1);
    assert_eq!(
        fetched.edit_history.latest().map(|entry| entry.summary.as_str()),
        Some("draft")
    );
}
