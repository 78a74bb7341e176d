//! MCP protocol surface for the orchestration server.
//!
//! Thin on purpose: [`rmcp_handler`] maps the thirteen orchestration
//! operations onto `rmcp`'s `#[tool]` macros for the default stdio
//! transport, [`http_transport`] exposes the same operations over an
//! optional HTTP/SSE transport for clients that want a long-lived
//! connection, [`serialization`] shapes the outgoing JSON shared by both,
//! and [`error`] maps [`orchestrator_core::OrchestratorError`] onto `rmcp`'s
//! error type. Nothing here knows about SQLite; it depends on
//! `orchestrator-core`'s `Store` trait and `Orchestrator<S>`, not a concrete
//! backend.
//!
//! ```no_run
//! use orchestrator_core::{Orchestrator, WorkflowConfig};
//! use orchestrator_db::SqliteStore;
//! use orchestrator_protocol::rmcp_handler::OrchestratorMcpHandler;
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! # async fn setup() -> anyhow::Result<()> {
//! let store = Arc::new(SqliteStore::new(":memory:").await?);
//! store.migrate().await?;
//! let config = Arc::new(WorkflowConfig::load(Path::new(".")));
//! let orchestrator = Arc::new(Orchestrator::new(store, config));
//! let _handler = OrchestratorMcpHandler::new(orchestrator);
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod http_transport;
pub mod rmcp_handler;
pub mod serialization;

pub use error::to_mcp_error;
pub use http_transport::HttpTransport;
pub use rmcp_handler::OrchestratorMcpHandler;
