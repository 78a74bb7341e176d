//! SQLite persistence for the orchestration domain.
//!
//! Provides [`SqliteStore`], the concrete [`orchestrator_core::store::Store`]
//! implementation: WAL-mode connection pooling, embedded migrations, and
//! dynamic filter-query construction for `search_items`.
//!
//! ```no_run
//! use orchestrator_db::SqliteStore;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let store = SqliteStore::new(":memory:").await?;
//! store.migrate().await?;
//! store.health_check().await?;
//! # Ok(())
//! # }
//! ```

mod common;
mod sqlite;

pub use sqlite::SqliteStore;

pub use orchestrator_core::{
    error::{OrchestratorError, Result},
    models::{
        Dependency, DependencyType, ItemFilter, Kind, NewWorkItem, Note, Priority, Role, SortSpec,
        TransitionRecord, Trigger, UpdateWorkItem, WorkItem,
    },
    store::Store,
};
