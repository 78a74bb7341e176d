//! Orchestrator core library.
//!
//! Domain model, persistence contract, and the pure decision engines behind
//! the task-orchestration surface. `orchestrator-db` and `orchestrator-
//! protocol` both depend on this crate and nothing else for the domain
//! layer; neither knows about SQLite or MCP.
//!
//! - [`models`] — `WorkItem`, `Note`, `Dependency`, `Lock`, and their
//!   supporting enums.
//! - [`error`] — `OrchestratorError`, the seven-kind error surface.
//! - [`store`] — the `Store` persistence trait.
//! - [`workflow_config`] — loads and caches the YAML workflow definition.
//! - [`validation`] — field-level input validation.
//! - [`dependency_engine`] — cycle prevention, blocking queries, graph
//!   analysis.
//! - [`role_machine`] — trigger evaluation and the resulting role/status
//!   transition.
//! - [`note_gate`] — required-note and verification-criteria gating.
//! - [`cascade_engine`] — automatic parent progression.
//! - [`lock_manager`] — short-TTL advisory entity locks.
//! - [`orchestrator`] — composes all of the above into the operation
//!   surface.
//!
//! ```rust
//! use orchestrator_core::{
//!     models::{NewWorkItem, Kind, Priority},
//!     validation::ItemValidator,
//! };
//!
//! let new_item = NewWorkItem {
//!     parent_id: None,
//!     kind: Kind::Task,
//!     title: "Implement parser".to_string(),
//!     summary: None,
//!     description: None,
//!     status: "pending".to_string(),
//!     priority: Priority::High,
//!     complexity: Some(3),
//!     tags: vec!["task-impl".to_string()],
//!     requires_verification: false,
//! };
//!
//! ItemValidator::validate_new_item(&new_item).unwrap();
//! ```

pub mod cascade_engine;
pub mod dependency_engine;
pub mod error;
pub mod lock_manager;
pub mod models;
pub mod note_gate;
pub mod orchestrator;
pub mod role_machine;
pub mod store;
pub mod validation;
pub mod workflow_config;

pub use error::{OrchestratorError, Result};
pub use models::{
    Dependency, DependencyType, ItemFilter, Kind, Lock, NewWorkItem, Note, OperationKind, Priority,
    Role, SortSpec, TransitionRecord, Trigger, UpdateWorkItem, WorkItem, MAX_DEPTH,
};
pub use orchestrator::Orchestrator;
pub use store::Store;
pub use workflow_config::{WorkflowConfig, WorkflowConfigData};

/// Current version of the core crate.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Current crate name.
pub const CRATE_NAME: &str = env!("CARGO_PKG_NAME");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crate_constants_are_set() {
        assert!(!VERSION.is_empty());
        assert_eq!(CRATE_NAME, "orchestrator-core");
    }

    #[test]
    fn re_exports_resolve() {
        let err = OrchestratorError::not_found_item(uuid::Uuid::new_v4());
        assert!(err.is_not_found());
    }
}
