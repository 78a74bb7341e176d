//! HTTP/SSE transport for clients that prefer a long-lived connection over
//! the default stdio transport. Exposes the same thirteen operations as
//! [`crate::rmcp_handler`] through a JSON-RPC envelope; both transports call
//! the same `dispatch_*` methods on [`OrchestratorMcpHandler`], so behavior
//! never drifts between them.

use crate::error::to_mcp_error;
use crate::rmcp_handler::*;
use axum::{
    extract::State,
    http::StatusCode,
    response::Sse,
    routing::{get, post},
    Json, Router,
};
use orchestrator_core::store::Store;
use rmcp::ErrorData as McpError;
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::info;

/// HTTP/SSE frontend over an [`OrchestratorMcpHandler`].
pub struct HttpTransport<S: Store> {
    handler: Arc<OrchestratorMcpHandler<S>>,
}

impl<S: Store + Send + Sync + 'static> HttpTransport<S> {
    pub fn new(handler: Arc<OrchestratorMcpHandler<S>>) -> Self {
        Self { handler }
    }

    /// Binds `addr` and serves until the process is signaled to stop.
    pub async fn serve(self, addr: &str) -> Result<(), Box<dyn std::error::Error>> {
        let app = self.create_router();
        info!("starting HTTP/SSE MCP transport on {addr}");
        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, app).await?;
        Ok(())
    }

    fn create_router(self) -> Router {
        Router::new()
            .route("/mcp/v1", get(sse_handler::<S>))
            .route("/mcp/v1/rpc", post(rpc_handler::<S>))
            .route("/health", get(health_handler))
            .with_state(self.handler)
    }
}

async fn execute_method<S: Store + Send + Sync + 'static>(
    handler: &OrchestratorMcpHandler<S>,
    method: &str,
    params: Value,
) -> Result<Value, McpError> {
    fn parse<T: serde::de::DeserializeOwned>(p: Value) -> Result<T, McpError> {
        serde_json::from_value(p).map_err(|e| McpError::invalid_params(format!("bad params: {e}"), None))
    }
    match method {
        "manage_items" => handler.dispatch_manage_items(parse(params)?).await,
        "query_items" => handler.dispatch_query_items(parse(params)?).await,
        "create_work_tree" => handler.dispatch_create_work_tree(parse(params)?).await,
        "complete_tree" => handler.dispatch_complete_tree(parse(params)?).await,
        "manage_notes" => handler.dispatch_manage_notes(parse(params)?).await,
        "query_notes" => handler.dispatch_query_notes(parse(params)?).await,
        "manage_dependencies" => handler.dispatch_manage_dependencies(parse(params)?).await,
        "query_dependencies" => handler.dispatch_query_dependencies(parse(params)?).await,
        "advance_item" => handler.dispatch_advance_item(parse(params)?).await,
        "get_next_status" => handler.dispatch_get_next_status(parse(params)?).await,
        "get_context" => handler.dispatch_get_context(parse(params)?).await,
        "get_next_item" => handler.dispatch_get_next_item(parse(params)?).await,
        "get_blocked_items" => handler.dispatch_get_blocked_items().await,
        other => Err(McpError::invalid_params(format!("unknown method '{other}'"), None)),
    }
}

async fn route_method<S: Store + Send + Sync + 'static>(
    handler: &OrchestratorMcpHandler<S>,
    method: &str,
    params: Value,
    id: Option<Value>,
) -> Value {
    match execute_method(handler, method, params).await {
        Ok(result) => json!({ "jsonrpc": "2.0", "id": id, "result": result }),
        Err(err) => json!({ "jsonrpc": "2.0", "id": id, "error": { "message": err.message } }),
    }
}

const TOOL_NAMES: [&str; 13] = [
    "manage_items",
    "query_items",
    "create_work_tree",
    "complete_tree",
    "manage_notes",
    "query_notes",
    "manage_dependencies",
    "query_dependencies",
    "advance_item",
    "get_next_status",
    "get_context",
    "get_next_item",
    "get_blocked_items",
];

async fn sse_handler<S: Store + Send + Sync + 'static>(
    State(_handler): State<Arc<OrchestratorMcpHandler<S>>>,
) -> Result<Sse<UnboundedReceiverStream<Result<axum::response::sse::Event, axum::Error>>>, StatusCode> {
    let (tx, rx) = mpsc::unbounded_channel();

    let welcome = axum::response::sse::Event::default().data(
        json!({
            "jsonrpc": "2.0",
            "method": "connection_established",
            "params": {
                "server": "task-orchestrator",
                "version": env!("CARGO_PKG_VERSION"),
                "capabilities": TOOL_NAMES,
            }
        })
        .to_string(),
    );
    if tx.send(Ok(welcome)).is_err() {
        return Err(StatusCode::INTERNAL_SERVER_ERROR);
    }

    let heartbeat_tx = tx.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(std::time::Duration::from_secs(30));
        loop {
            interval.tick().await;
            let heartbeat = axum::response::sse::Event::default().event("heartbeat").data("ping");
            if heartbeat_tx.send(Ok(heartbeat)).is_err() {
                break;
            }
        }
    });

    Ok(Sse::new(UnboundedReceiverStream::new(rx)))
}

async fn rpc_handler<S: Store + Send + Sync + 'static>(
    State(handler): State<Arc<OrchestratorMcpHandler<S>>>,
    Json(request): Json<Value>,
) -> Json<Value> {
    let id = request.get("id").cloned();
    let method = match request.get("method").and_then(Value::as_str) {
        Some(method) => method.to_string(),
        None => {
            let err = to_mcp_error(orchestrator_core::OrchestratorError::Validation(
                "missing or invalid 'method' field in JSON-RPC request".to_string(),
            ));
            return Json(json!({ "jsonrpc": "2.0", "id": id, "error": { "message": err.message } }));
        }
    };
    let params = request.get("params").cloned().unwrap_or(Value::Null);
    Json(route_method(&handler, &method, params, id).await)
}

async fn health_handler() -> &'static str {
    "OK"
}
