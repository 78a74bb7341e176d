//! Error handling for the MCP surface.
//!
//! Maps [`OrchestratorError`] onto `rmcp`'s `ErrorData`, preserving the
//! machine-readable error code and gate/blocker detail so a calling agent
//! can branch on `code` without parsing the message text.

use orchestrator_core::OrchestratorError;
use rmcp::ErrorData as McpError;

/// Converts a domain error into the MCP error surface. `VALIDATION_ERROR` and
/// `GATE_FAILURE` map to `invalid_params` (the caller can retry with
/// different input); everything else maps to `internal`.
pub fn to_mcp_error(err: OrchestratorError) -> McpError {
    let code = err.code();
    match &err {
        OrchestratorError::Validation(_)
        | OrchestratorError::NotFound(_)
        | OrchestratorError::Conflict(_)
        | OrchestratorError::GateFailure(_)
        | OrchestratorError::StateError(_) => {
            McpError::invalid_params(format!("[{code}] {err}"), None)
        }
        OrchestratorError::Database(_) | OrchestratorError::Internal(_) => {
            McpError::internal_error(format!("[{code}] {err}"), None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_errors_are_invalid_params() {
        let err = to_mcp_error(OrchestratorError::Validation("bad title".to_string()));
        assert!(err.message.contains("VALIDATION_ERROR"));
        assert!(err.message.contains("bad title"));
    }

    #[test]
    fn database_errors_are_internal() {
        let err = to_mcp_error(OrchestratorError::Database("pool exhausted".to_string()));
        assert!(err.message.contains("pool exhausted"));
    }
}
