use orchestrator_db::{ItemFilter, Kind, NewWorkItem, Priority, Role, SortSpec, SqliteStore, Store, UpdateWorkItem};

async fn test_store() -> SqliteStore {
    let store = SqliteStore::new(":memory:").await.unwrap();
    store.migrate().await.unwrap();
    store
}

fn sample_item(title: &str, tag: &str) -> NewWorkItem {
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

#[tokio::test]
async fn health_check_passes_on_fresh_database() {
    let store = test_store().await;
    assert!(store.health_check().await.is_ok());
}

#[tokio::test]
async fn create_and_fetch_item() {
    let store = test_store().await;
    let created = store.create_item(sample_item("Design schema", "task-design"), 0).await.unwrap();
    assert_eq!(created.depth, 0);
    assert_eq!(created.role, Role::Queue);

    let fetched = store.get_item(created.id).await.unwrap();
    assert_eq!(fetched.title, "Design schema");
}

#[tokio::test]
async fn children_of_lists_only_direct_descendants() {
    let store = test_store().await;
    let root = store.create_item(sample_item("Root", "project"), 0).await.unwrap();
    let mut child = sample_item("Child", "task-impl");
    child.parent_id = Some(root.id);
    let child = store.create_item(child, 1).await.unwrap();
    let mut grandchild = sample_item("Grandchild", "task-impl");
    grandchild.parent_id = Some(child.id);
    store.create_item(grandchild, 2).await.unwrap();

    let children = store.children_of(root.id).await.unwrap();
    assert_eq!(children.len(), 1);
    assert_eq!(children[0].id, child.id);
}

#[tokio::test]
async fn search_items_filters_by_role_and_text() {
    let store = test_store().await;
    store.create_item(sample_item("Implement parser", "task-impl"), 0).await.unwrap();
    store.create_item(sample_item("Write docs", "task-docs"), 0).await.unwrap();

    let filter = ItemFilter {
        text: Some("parser".to_string()),
        ..Default::default()
    };
    let results = store.search_items(&filter, &SortSpec::default(), 50, 0).await.unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].title, "Implement parser");

    let by_role = store
        .search_items(&ItemFilter { role: Some(Role::Queue), ..Default::default() }, &SortSpec::default(), 50, 0)
        .await
        .unwrap();
    assert_eq!(by_role.len(), 2);
}

#[tokio::test]
async fn update_item_persists_partial_patch() {
    let store = test_store().await;
    let created = store.create_item(sample_item("Draft", "task-impl"), 0).await.unwrap();
    let updated = store
        .update_item(
            created.id,
            UpdateWorkItem { title: Some("Final".to_string()), ..Default::default() },
        )
        .await
        .unwrap();
    assert_eq!(updated.title, "Final");
    assert_eq!(updated.status, created.status);
    assert!(updated.modified_at >= created.modified_at);
}

#[tokio::test]
async fn notes_round_trip_and_delete() {
    let store = test_store().await;
    let item = store.create_item(sample_item("Task", "task-impl"), 0).await.unwrap();
    let note = orchestrator_db::Note {
        id: uuid::Uuid::new_v4(),
        item_id: item.id,
        key: "requirements".to_string(),
        role: Role::Queue,
        body: "draft".to_string(),
    };
    store.add_note(note).await.unwrap();
    assert_eq!(store.notes_for_item(item.id).await.unwrap().len(), 1);

    store.delete_note(item.id, "requirements").await.unwrap();
    assert!(store.notes_for_item(item.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn transitions_are_appended_and_ordered() {
    let store = test_store().await;
    let item = store.create_item(sample_item("Task", "task-impl"), 0).await.unwrap();
    for trigger in [orchestrator_db::Trigger::Start, orchestrator_db::Trigger::Complete] {
        store
            .append_transition(orchestrator_db::TransitionRecord {
                id: uuid::Uuid::new_v4(),
                item_id: item.id,
                previous_role: Role::Queue,
                new_role: Role::Work,
                trigger,
                at: chrono::Utc::now(),
                summary: None,
            })
            .await
            .unwrap();
    }
    let log = store.transitions_for_item(item.id).await.unwrap();
    assert_eq!(log.len(), 2);
    assert!(log[0].at <= log[1].at);
}

#[tokio::test]
async fn delete_item_cascades_to_children_via_foreign_key() {
    let store = test_store().await;
    let root = store.create_item(sample_item("Root", "project"), 0).await.unwrap();
    let mut child = sample_item("Child", "task-impl");
    child.parent_id = Some(root.id);
    let child = store.create_item(child, 1).await.unwrap();

    store.delete_item(root.id).await.unwrap();
    assert!(store.get_item(child.id).await.is_err());
}
