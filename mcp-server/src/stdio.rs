//! Default transport: MCP-over-stdio via `rmcp`'s own `transport-io`
//! feature. The hand-rolled JSON-RPC/initialize handshake this module used
//! to implement is unnecessary now that `OrchestratorMcpHandler` is a real
//! `rmcp` `ServerHandler` - the SDK owns the wire framing and the
//! initialize/initialized handshake; this module just starts it.

use anyhow::{Context, Result};
use orchestrator_db::SqliteStore;
use orchestrator_protocol::OrchestratorMcpHandler;
use rmcp::{transport::io::stdio, ServiceExt};
use tracing::info;

/// Serves `handler` over stdin/stdout until the peer disconnects or the
/// process is signaled to stop.
pub async fn serve_stdio(handler: OrchestratorMcpHandler<SqliteStore>) -> Result<()> {
    info!("starting stdio MCP transport");
    let service = handler
        .serve(stdio())
        .await
        .context("failed to start stdio transport")?;
    service
        .waiting()
        .await
        .context("stdio transport exited with an error")?;
    Ok(())
}
