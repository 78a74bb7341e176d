use orchestrator_db::{
    Dependency, DependencyType, ItemFilter, Kind, NewWorkItem, Priority, Role, SortSpec, Store,
    Trigger, TransitionRecord, UpdateWorkItem,
};
use std::sync::Arc;

/// Contract every [`Store`] implementation must satisfy, exercised here
/// against [`orchestrator_db::SqliteStore`] but written against the trait so
/// a future backend can reuse it.
#[allow(dead_code)]
pub async fn test_store_contract<S: Store + 'static>(store: Arc<S>) {
    test_health_check(store.clone()).await;
    test_create_and_get(store.clone()).await;
    test_update_is_partial(store.clone()).await;
    test_delete_missing_is_not_found(store.clone()).await;
    test_notes_enforce_unique_key(store.clone()).await;
    test_dependencies_round_trip(store.clone()).await;
    test_search_filters_combine(store.clone()).await;
}

fn new_item(title: &str, tag: &str) -> NewWorkItem {
    NewWorkItem {
        parent_id: None,
        kind: Kind::Task,
        title: title.to_string(),
        summary: None,
        description: None,
        status: "pending".to_string(),
        priority: Priority::Medium,
        complexity: None,
        tags: vec![tag.to_string()],
        requires_verification: false,
    }
}

async fn test_health_check<S: Store>(store: Arc<S>) {
    assert!(store.health_check().await.is_ok());
}

async fn test_create_and_get<S: Store>(store: Arc<S>) {
    let created = store.create_item(new_item("Contract create", "task-impl"), 0).await.unwrap();
    assert_eq!(created.role, Role::Queue);
    assert!(created.previous_role.is_none());

    let fetched = store.get_item(created.id).await.unwrap();
    assert_eq!(fetched.id, created.id);
    assert_eq!(fetched.title, "Contract create");

    let missing = store.get_item(uuid::Uuid::new_v4()).await;
    assert!(missing.is_err());
}

async fn test_update_is_partial<S: Store>(store: Arc<S>) {
    let created = store.create_item(new_item("Original", "task-impl"), 0).await.unwrap();

    let updated = store
        .update_item(
            created.id,
            UpdateWorkItem { title: Some("Updated".to_string()), ..Default::default() },
        )
        .await
        .unwrap();
    assert_eq!(updated.title, "Updated");
    assert_eq!(updated.summary, created.summary);

    let untouched = store.update_item(created.id, UpdateWorkItem::default()).await.unwrap();
    assert_eq!(untouched.title, "Updated");
}

async fn test_delete_missing_is_not_found<S: Store>(store: Arc<S>) {
    let result = store.delete_item(uuid::Uuid::new_v4()).await;
    assert!(result.is_err());
    assert_eq!(result.unwrap_err().code(), "RESOURCE_NOT_FOUND");
}

async fn test_notes_enforce_unique_key<S: Store>(store: Arc<S>) {
    let item = store.create_item(new_item("Note holder", "task-impl"), 0).await.unwrap();
    let note = orchestrator_core::models::Note {
        id: uuid::Uuid::new_v4(),
        item_id: item.id,
        key: "requirements".to_string(),
        role: Role::Queue,
        body: "first".to_string(),
    };
    store.add_note(note.clone()).await.unwrap();

    // Re-adding under the same key overwrites rather than duplicating.
    let overwritten = orchestrator_core::models::Note { body: "second".to_string(), ..note };
    store.add_note(overwritten).await.unwrap();

    let notes = store.notes_for_item(item.id).await.unwrap();
    assert_eq!(notes.len(), 1);
    assert_eq!(notes[0].body, "second");
}

async fn test_dependencies_round_trip<S: Store>(store: Arc<S>) {
    let a = store.create_item(new_item("Blocker", "task-impl"), 0).await.unwrap();
    let b = store.create_item(new_item("Dependent", "task-impl"), 0).await.unwrap();

    let dep = Dependency {
        id: uuid::Uuid::new_v4(),
        from_item_id: a.id,
        to_item_id: b.id,
        dependency_type: DependencyType::Blocks,
        unblock_at: Some(Role::Review),
        created_at: chrono::Utc::now(),
    };
    store.add_dependencies(vec![dep.clone()]).await.unwrap();

    let edges = store.dependencies_for_item(b.id).await.unwrap();
    assert_eq!(edges.len(), 1);
    assert_eq!(edges[0].effective_threshold(), Role::Review);

    store.remove_dependency(dep.id).await.unwrap();
    assert!(store.dependencies_for_item(b.id).await.unwrap().is_empty());
}

async fn test_search_filters_combine<S: Store>(store: Arc<S>) {
    let tagged = store.create_item(new_item("Tagged item", "task-search-tag"), 0).await.unwrap();
    store.create_item(new_item("Other item", "task-other-tag"), 0).await.unwrap();

    let filter = ItemFilter {
        tags_any: vec!["task-search-tag".to_string()],
        ..Default::default()
    };
    let results = store.search_items(&filter, &SortSpec::default(), 50, 0).await.unwrap();
    assert!(results.iter().any(|i| i.id == tagged.id));
    assert!(results.iter().all(|i| i.tags.iter().any(|t| t == "task-search-tag")));
}

async fn make_sqlite_store() -> orchestrator_db::SqliteStore {
    let timestamp = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    let db_name = format!(":memory:contract_{timestamp}");
    let store = orchestrator_db::SqliteStore::new(&db_name).await.unwrap();
    store.migrate().await.unwrap();
    store
}

#[tokio::test]
async fn sqlite_store_satisfies_the_contract() {
    let store = make_sqlite_store().await;
    test_store_contract(Arc::new(store)).await;
}

#[tokio::test]
async fn transitions_append_only_log_is_queryable() {
    let store = make_sqlite_store().await;
    let item = store.create_item(new_item("Transition target", "task-impl"), 0).await.unwrap();
    store
        .append_transition(TransitionRecord {
            id: uuid::Uuid::new_v4(),
            item_id: item.id,
            previous_role: Role::Queue,
            new_role: Role::Work,
            trigger: Trigger::Start,
            at: chrono::Utc::now(),
            summary: Some("started".to_string()),
        })
        .await
        .unwrap();

    let log = store.transitions_for_item(item.id).await.unwrap();
    assert_eq!(log.len(), 1);
    assert_eq!(log[0].trigger, Trigger::Start);
}
