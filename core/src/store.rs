//! Persistence contract. `Orchestrator<S: Store>` is generic over this
//! trait; `orchestrator-db` provides the concrete SQLite implementation.
//! Every method is `async` and returns `crate::error::Result` so storage
//! failures surface uniformly as `OrchestratorError::Database`.

use crate::models::{Dependency, ItemFilter, Note, NewWorkItem, SortSpec, TransitionRecord, UpdateWorkItem, WorkItem};
use async_trait::async_trait;
use uuid::Uuid;

#[async_trait]
pub trait Store: Send + Sync {
    async fn create_item(&self, new_item: NewWorkItem, depth: u8) -> crate::error::Result<WorkItem>;
    async fn get_item(&self, id: Uuid) -> crate::error::Result<WorkItem>;
    async fn update_item(&self, id: Uuid, patch: UpdateWorkItem) -> crate::error::Result<WorkItem>;
    async fn delete_item(&self, id: Uuid) -> crate::error::Result<()>;
    async fn search_items(
        &self,
        filter: &ItemFilter,
        sort: &SortSpec,
        limit: u32,
        offset: u32,
    ) -> crate::error::Result<Vec<WorkItem>>;
    async fn children_of(&self, parent_id: Uuid) -> crate::error::Result<Vec<WorkItem>>;

    async fn add_note(&self, note: Note) -> crate::error::Result<Note>;
    async fn update_note(&self, item_id: Uuid, key: &str, body: String) -> crate::error::Result<Note>;
    async fn notes_for_item(&self, item_id: Uuid) -> crate::error::Result<Vec<Note>>;
    async fn delete_note(&self, item_id: Uuid, key: &str) -> crate::error::Result<()>;

    async fn add_dependencies(&self, deps: Vec<Dependency>) -> crate::error::Result<Vec<Dependency>>;
    async fn remove_dependency(&self, id: Uuid) -> crate::error::Result<()>;
    async fn dependencies_for_item(&self, item_id: Uuid) -> crate::error::Result<Vec<Dependency>>;
    async fn all_dependencies(&self) -> crate::error::Result<Vec<Dependency>>;

    async fn append_transition(&self, record: TransitionRecord) -> crate::error::Result<()>;
    async fn transitions_for_item(&self, item_id: Uuid) -> crate::error::Result<Vec<TransitionRecord>>;

    async fn health_check(&self) -> crate::error::Result<()>;
}
