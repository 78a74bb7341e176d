use crate::common::{
    build_filter_query, dependency_type_to_string, kind_to_string, priority_to_string,
    role_to_string, row_to_dependency, row_to_note, row_to_transition, row_to_work_item,
    sqlx_error_to_orchestrator_error, trigger_to_string,
};
use async_trait::async_trait;
use chrono::Utc;
use orchestrator_core::error::{OrchestratorError, Result};
use orchestrator_core::models::{
    Dependency, ItemFilter, Note, NewWorkItem, ParentPatch, SortSpec, TransitionRecord,
    UpdateWorkItem, WorkItem,
};
use orchestrator_core::store::Store;
use sqlx::{migrate::MigrateDatabase, Row, Sqlite, SqlitePool};
use uuid::Uuid;

/// SQLite-backed implementation of [`Store`].
///
/// Connections use WAL journaling and a short busy-timeout, matching the
/// concurrency model's "single writer, many readers" shape: `sqlx`'s pool
/// serializes writers, and WAL lets readers proceed without blocking on an
/// in-flight write.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub async fn new(database_url: &str) -> Result<Self> {
        let db_url = if database_url.starts_with(":memory:") || database_url.starts_with("sqlite://") {
            database_url.to_string()
        } else {
            format!("sqlite://{database_url}")
        };

        if !db_url.contains(":memory:") && !Sqlite::database_exists(&db_url).await.unwrap_or(false) {
            Sqlite::create_database(&db_url)
                .await
                .map_err(|e| OrchestratorError::Database(format!("failed to create database: {e}")))?;
        }

        let connect_options = if db_url.contains(":memory:") {
            sqlx::sqlite::SqliteConnectOptions::new()
                .filename(&db_url)
                .create_if_missing(true)
                .journal_mode(sqlx::sqlite::SqliteJournalMode::Memory)
                .busy_timeout(std::time::Duration::from_secs(5))
                .foreign_keys(true)
        } else {
            sqlx::sqlite::SqliteConnectOptions::new()
                .filename(db_url.replace("sqlite://", ""))
                .create_if_missing(true)
                .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
                .busy_timeout(std::time::Duration::from_secs(5))
                .foreign_keys(true)
        };

        let pool = SqlitePool::connect_with(connect_options)
            .await
            .map_err(sqlx_error_to_orchestrator_error)?;

        Ok(Self { pool })
    }

    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| OrchestratorError::Database(format!("migration failed: {e}")))?;
        tracing::info!("database migrations completed successfully");
        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn fetch_item(&self, id: Uuid) -> Result<WorkItem> {
        let row = sqlx::query(
            "SELECT id, parent_id, depth, kind, title, summary, description, role, previous_role, \
             status, status_label, priority, complexity, tags, requires_verification, created_at, \
             modified_at, role_changed_at FROM work_items WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(sqlx_error_to_orchestrator_error)?
        .ok_or_else(|| OrchestratorError::not_found_item(id))?;
        row_to_work_item(&row)
    }
}

#[async_trait]
impl Store for SqliteStore {
    async fn create_item(&self, new_item: NewWorkItem, depth: u8) -> Result<WorkItem> {
        let now = Utc::now();
        let id = Uuid::new_v4();
        let tags_json = serde_json::to_string(&new_item.tags).unwrap_or_else(|_| "[]".to_string());

        sqlx::query(
            "INSERT INTO work_items (id, parent_id, depth, kind, title, summary, description, \
             role, previous_role, status, status_label, priority, complexity, tags, \
             requires_verification, created_at, modified_at, role_changed_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, 'QUEUE', NULL, ?, NULL, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(id)
        .bind(new_item.parent_id)
        .bind(depth as i64)
        .bind(kind_to_string(new_item.kind))
        .bind(&new_item.title)
        .bind(&new_item.summary)
        .bind(&new_item.description)
        .bind(&new_item.status)
        .bind(priority_to_string(new_item.priority))
        .bind(new_item.complexity.map(|c| c as i64))
        .bind(tags_json)
        .bind(new_item.requires_verification as i64)
        .bind(now)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(sqlx_error_to_orchestrator_error)?;

        self.fetch_item(id).await
    }

    async fn get_item(&self, id: Uuid) -> Result<WorkItem> {
        self.fetch_item(id).await
    }

    async fn update_item(&self, id: Uuid, patch: UpdateWorkItem) -> Result<WorkItem> {
        let mut qb: sqlx::QueryBuilder<sqlx::Sqlite> = sqlx::QueryBuilder::new("UPDATE work_items SET ");
        let mut first = true;
        macro_rules! set {
            ($col:expr, $val:expr) => {{
                if !first {
                    qb.push(", ");
                }
                first = false;
                qb.push($col);
                qb.push(" = ");
                qb.push_bind($val);
            }};
        }

        match &patch.parent_id {
            Some(ParentPatch::Set(parent)) => set!("parent_id", Some(*parent)),
            Some(ParentPatch::ToRoot) => set!("parent_id", Option::<Uuid>::None),
            None => {}
        }
        if let Some(title) = &patch.title {
            set!("title", title.clone());
        }
        if let Some(summary) = &patch.summary {
            set!("summary", Some(summary.clone()));
        }
        if let Some(description) = &patch.description {
            set!("description", Some(description.clone()));
        }
        if let Some(status) = &patch.status {
            set!("status", status.clone());
        }
        if let Some(label) = &patch.status_label {
            set!("status_label", Some(label.clone()));
        }
        if let Some(priority) = patch.priority {
            set!("priority", priority_to_string(priority));
        }
        if let Some(complexity) = patch.complexity {
            set!("complexity", Some(complexity as i64));
        }
        if let Some(tags) = &patch.tags {
            set!("tags", serde_json::to_string(tags).unwrap_or_else(|_| "[]".to_string()));
        }
        if let Some(flag) = patch.requires_verification {
            set!("requires_verification", flag as i64);
        }

        if first {
            return self.fetch_item(id).await;
        }

        qb.push(", modified_at = ");
        qb.push_bind(Utc::now());
        qb.push(" WHERE id = ");
        qb.push_bind(id);

        let result = qb
            .build()
            .execute(&self.pool)
            .await
            .map_err(sqlx_error_to_orchestrator_error)?;
        if result.rows_affected() == 0 {
            return Err(OrchestratorError::not_found_item(id));
        }
        self.fetch_item(id).await
    }

    async fn delete_item(&self, id: Uuid) -> Result<()> {
        let result = sqlx::query("DELETE FROM work_items WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(sqlx_error_to_orchestrator_error)?;
        if result.rows_affected() == 0 {
            return Err(OrchestratorError::not_found_item(id));
        }
        Ok(())
    }

    async fn search_items(
        &self,
        filter: &ItemFilter,
        sort: &SortSpec,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<WorkItem>> {
        let mut qb = build_filter_query(filter, sort, limit, offset);
        let rows = qb
            .build()
            .fetch_all(&self.pool)
            .await
            .map_err(sqlx_error_to_orchestrator_error)?;
        rows.iter().map(row_to_work_item).collect()
    }

    async fn children_of(&self, parent_id: Uuid) -> Result<Vec<WorkItem>> {
        let rows = sqlx::query(
            "SELECT id, parent_id, depth, kind, title, summary, description, role, previous_role, \
             status, status_label, priority, complexity, tags, requires_verification, created_at, \
             modified_at, role_changed_at FROM work_items WHERE parent_id = ? ORDER BY created_at ASC",
        )
        .bind(parent_id)
        .fetch_all(&self.pool)
        .await
        .map_err(sqlx_error_to_orchestrator_error)?;
        rows.iter().map(row_to_work_item).collect()
    }

    async fn add_note(&self, note: Note) -> Result<Note> {
        sqlx::query(
            "INSERT INTO notes (id, item_id, key, role, body) VALUES (?, ?, ?, ?, ?) \
             ON CONFLICT(item_id, key) DO UPDATE SET body = excluded.body, role = excluded.role",
        )
        .bind(note.id)
        .bind(note.item_id)
        .bind(&note.key)
        .bind(role_to_string(note.role))
        .bind(&note.body)
        .execute(&self.pool)
        .await
        .map_err(sqlx_error_to_orchestrator_error)?;

        let row = sqlx::query("SELECT id, item_id, key, role, body FROM notes WHERE item_id = ? AND key = ?")
            .bind(note.item_id)
            .bind(&note.key)
            .fetch_one(&self.pool)
            .await
            .map_err(sqlx_error_to_orchestrator_error)?;
        row_to_note(&row)
    }

    async fn update_note(&self, item_id: Uuid, key: &str, body: String) -> Result<Note> {
        let result = sqlx::query("UPDATE notes SET body = ? WHERE item_id = ? AND key = ?")
            .bind(&body)
            .bind(item_id)
            .bind(key)
            .execute(&self.pool)
            .await
            .map_err(sqlx_error_to_orchestrator_error)?;
        if result.rows_affected() == 0 {
            return Err(OrchestratorError::not_found_note(item_id, key));
        }
        let row = sqlx::query("SELECT id, item_id, key, role, body FROM notes WHERE item_id = ? AND key = ?")
            .bind(item_id)
            .bind(key)
            .fetch_one(&self.pool)
            .await
            .map_err(sqlx_error_to_orchestrator_error)?;
        row_to_note(&row)
    }

    async fn notes_for_item(&self, item_id: Uuid) -> Result<Vec<Note>> {
        let rows = sqlx::query("SELECT id, item_id, key, role, body FROM notes WHERE item_id = ?")
            .bind(item_id)
            .fetch_all(&self.pool)
            .await
            .map_err(sqlx_error_to_orchestrator_error)?;
        rows.iter().map(row_to_note).collect()
    }

    async fn delete_note(&self, item_id: Uuid, key: &str) -> Result<()> {
        let result = sqlx::query("DELETE FROM notes WHERE item_id = ? AND key = ?")
            .bind(item_id)
            .bind(key)
            .execute(&self.pool)
            .await
            .map_err(sqlx_error_to_orchestrator_error)?;
        if result.rows_affected() == 0 {
            return Err(OrchestratorError::not_found_note(item_id, key));
        }
        Ok(())
    }

    async fn add_dependencies(&self, deps: Vec<Dependency>) -> Result<Vec<Dependency>> {
        let mut tx = self.pool.begin().await.map_err(sqlx_error_to_orchestrator_error)?;
        for dep in &deps {
            sqlx::query(
                "INSERT INTO dependencies (id, from_item_id, to_item_id, dependency_type, unblock_at, created_at) \
                 VALUES (?, ?, ?, ?, ?, ?)",
            )
            .bind(dep.id)
            .bind(dep.from_item_id)
            .bind(dep.to_item_id)
            .bind(dependency_type_to_string(dep.dependency_type))
            .bind(dep.unblock_at.map(role_to_string))
            .bind(dep.created_at)
            .execute(&mut *tx)
            .await
            .map_err(sqlx_error_to_orchestrator_error)?;
        }
        tx.commit().await.map_err(sqlx_error_to_orchestrator_error)?;
        Ok(deps)
    }

    async fn remove_dependency(&self, id: Uuid) -> Result<()> {
        let result = sqlx::query("DELETE FROM dependencies WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(sqlx_error_to_orchestrator_error)?;
        if result.rows_affected() == 0 {
            return Err(OrchestratorError::NotFound(format!("dependency {id} not found")));
        }
        Ok(())
    }

    async fn dependencies_for_item(&self, item_id: Uuid) -> Result<Vec<Dependency>> {
        let rows = sqlx::query(
            "SELECT id, from_item_id, to_item_id, dependency_type, unblock_at, created_at \
             FROM dependencies WHERE from_item_id = ? OR to_item_id = ?",
        )
        .bind(item_id)
        .bind(item_id)
        .fetch_all(&self.pool)
        .await
        .map_err(sqlx_error_to_orchestrator_error)?;
        rows.iter().map(row_to_dependency).collect()
    }

    async fn all_dependencies(&self) -> Result<Vec<Dependency>> {
        let rows = sqlx::query("SELECT id, from_item_id, to_item_id, dependency_type, unblock_at, created_at FROM dependencies")
            .fetch_all(&self.pool)
            .await
            .map_err(sqlx_error_to_orchestrator_error)?;
        rows.iter().map(row_to_dependency).collect()
    }

    async fn append_transition(&self, record: TransitionRecord) -> Result<()> {
        sqlx::query(
            "INSERT INTO transitions (id, item_id, previous_role, new_role, trigger, at, summary) \
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(record.id)
        .bind(record.item_id)
        .bind(role_to_string(record.previous_role))
        .bind(role_to_string(record.new_role))
        .bind(trigger_to_string(record.trigger))
        .bind(record.at)
        .bind(&record.summary)
        .execute(&self.pool)
        .await
        .map_err(sqlx_error_to_orchestrator_error)?;
        Ok(())
    }

    async fn transitions_for_item(&self, item_id: Uuid) -> Result<Vec<TransitionRecord>> {
        let rows = sqlx::query(
            "SELECT id, item_id, previous_role, new_role, trigger, at, summary FROM transitions \
             WHERE item_id = ? ORDER BY at ASC",
        )
        .bind(item_id)
        .fetch_all(&self.pool)
        .await
        .map_err(sqlx_error_to_orchestrator_error)?;
        rows.iter().map(row_to_transition).collect()
    }

    async fn health_check(&self) -> Result<()> {
        sqlx::query("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .map_err(sqlx_error_to_orchestrator_error)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use orchestrator_core::models::{Kind, Priority};

    async fn test_store() -> SqliteStore {
        let store = SqliteStore::new(":memory:").await.unwrap();
        store.migrate().await.unwrap();
        store
    }

    fn sample_item(title: &str) -> NewWorkItem {
        NewWorkItem {
            parent_id: None,
            kind: Kind::Task,
            title: title.to_string(),
            summary: None,
            description: None,
            status: "pending".to_string(),
            priority: Priority::Medium,
            complexity: None,
            tags: vec!["task-impl".to_string()],
            requires_verification: false,
        }
    }

    #[tokio::test]
    async fn create_then_fetch_round_trips() {
        let store = test_store().await;
        let created = store.create_item(sample_item("Implement parser"), 0).await.unwrap();
        let fetched = store.get_item(created.id).await.unwrap();
        assert_eq!(fetched.title, "Implement parser");
        assert_eq!(fetched.tags, vec!["task-impl".to_string()]);
    }

    #[tokio::test]
    async fn update_item_applies_partial_patch() {
        let store = test_store().await;
        let created = store.create_item(sample_item("Draft"), 0).await.unwrap();
        let patch = UpdateWorkItem {
            title: Some("Final".to_string()),
            ..Default::default()
        };
        let updated = store.update_item(created.id, patch).await.unwrap();
        assert_eq!(updated.title, "Final");
        assert_eq!(updated.status, created.status);
    }

    #[tokio::test]
    async fn delete_missing_item_is_not_found() {
        let store = test_store().await;
        let err = store.delete_item(Uuid::new_v4()).await.unwrap_err();
        assert_eq!(err.code(), "RESOURCE_NOT_FOUND");
    }

    #[tokio::test]
    async fn note_upsert_then_update() {
        let store = test_store().await;
        let item = store.create_item(sample_item("Task"), 0).await.unwrap();
        let note = Note {
            id: Uuid::new_v4(),
            item_id: item.id,
            key: "requirements".to_string(),
            role: orchestrator_core::models::Role::Queue,
            body: "first draft".to_string(),
        };
        store.add_note(note).await.unwrap();
        let updated = store.update_note(item.id, "requirements", "final draft".to_string()).await.unwrap();
        assert_eq!(updated.body, "final draft");
    }

    #[tokio::test]
    async fn dependencies_round_trip() {
        let store = test_store().await;
        let a = store.create_item(sample_item("A"), 0).await.unwrap();
        let b = store.create_item(sample_item("B"), 0).await.unwrap();
        let dep = Dependency {
            id: Uuid::new_v4(),
            from_item_id: a.id,
            to_item_id: b.id,
            dependency_type: orchestrator_core::models::DependencyType::Blocks,
            unblock_at: None,
            created_at: Utc::now(),
        };
        store.add_dependencies(vec![dep.clone()]).await.unwrap();
        let for_b = store.dependencies_for_item(b.id).await.unwrap();
        assert_eq!(for_b.len(), 1);
        assert_eq!(for_b[0].id, dep.id);
    }

    #[tokio::test]
    async fn health_check_succeeds() {
        let store = test_store().await;
        assert!(store.health_check().await.is_ok());
    }
}
