use thiserror::Error;
use serde::Serialize;
use serde_json::Value;

/// Result type alias used throughout the orchestrator.
pub type Result<T> = std::result::Result<T, OrchestratorError>;

/// The seven error kinds the orchestration surface can report.
///
/// Every operation returns one of these rather than aborting the process;
/// batch operations report per-item failures and continue (`createDependencies`
/// is the one exception — a cycle or duplicate rejects the whole batch).
#[derive(Error, Debug, Clone, PartialEq)]
pub enum OrchestratorError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("resource not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("gate failure: {0}")]
    GateFailure(String),

    #[error("state error: {0}")]
    StateError(String),

    #[error("database error: {0}")]
    Database(String),

    #[error("internal error: {0}")]
    Internal(String),
}

/// Machine-readable detail bundle attached to a user-visible error response.
///
/// `blockers`/`missing_notes` are populated only for `GATE_FAILURE`.
#[derive(Debug, Clone, Serialize, Default)]
pub struct ErrorDetails {
    pub blockers: Vec<String>,
    pub missing_notes: Vec<String>,
    pub extra: Option<Value>,
}

impl OrchestratorError {
    pub fn not_found_item(id: impl std::fmt::Display) -> Self {
        Self::NotFound(format!("work item {id} not found"))
    }

    pub fn not_found_note(item_id: impl std::fmt::Display, key: &str) -> Self {
        Self::NotFound(format!("note '{key}' on item {item_id} not found"))
    }

    pub fn self_dependency(id: impl std::fmt::Display) -> Self {
        Self::Validation(format!("dependency from {id} to itself is not allowed"))
    }

    pub fn depth_exceeded(depth: u8) -> Self {
        Self::Validation(format!("depth {depth} exceeds the maximum of 3"))
    }

    pub fn empty_field(field: &str) -> Self {
        Self::Validation(format!("field '{field}' cannot be empty"))
    }

    pub fn cycle_detected() -> Self {
        Self::Conflict("dependency batch rejected: would introduce a cycle".to_string())
    }

    pub fn invalid_trigger(role: &str, trigger: &str) -> Self {
        Self::StateError(format!("trigger '{trigger}' is not valid from role '{role}'"))
    }

    /// The machine-readable code named in the orchestration error-kind table.
    pub fn code(&self) -> &'static str {
        match self {
            OrchestratorError::Validation(_) => "VALIDATION_ERROR",
            OrchestratorError::NotFound(_) => "RESOURCE_NOT_FOUND",
            OrchestratorError::Conflict(_) => "CONFLICT",
            OrchestratorError::GateFailure(_) => "GATE_FAILURE",
            OrchestratorError::StateError(_) => "STATE_ERROR",
            OrchestratorError::Database(_) => "DATABASE_ERROR",
            OrchestratorError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Internal severity/retryability signal. The transport is MCP, not HTTP,
    /// but callers still find it useful to classify severity numerically.
    pub fn status_code(&self) -> u16 {
        match self {
            OrchestratorError::Validation(_) => 400,
            OrchestratorError::NotFound(_) => 404,
            OrchestratorError::Conflict(_) => 409,
            OrchestratorError::GateFailure(_) => 422,
            OrchestratorError::StateError(_) => 422,
            OrchestratorError::Database(_) => 500,
            OrchestratorError::Internal(_) => 500,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, OrchestratorError::NotFound(_))
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, OrchestratorError::Database(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_formats_id() {
        let err = OrchestratorError::not_found_item(42);
        assert_eq!(err.code(), "RESOURCE_NOT_FOUND");
        assert_eq!(err.status_code(), 404);
        assert!(err.is_not_found());
    }

    #[test]
    fn gate_failure_maps_to_422() {
        let err = OrchestratorError::GateFailure("missing notes: requirements".into());
        assert_eq!(err.status_code(), 422);
        assert_eq!(err.code(), "GATE_FAILURE");
    }

    #[test]
    fn database_error_is_retryable() {
        let err = OrchestratorError::Database("pool exhausted".into());
        assert!(err.is_retryable());
        assert!(!OrchestratorError::Validation("x".into()).is_retryable());
    }
}
