//! RMCP-based MCP handler for the orchestration surface.
//!
//! Uses the official RMCP SDK's `#[tool]` macros. Each operation takes a
//! single request struct (derives `JsonSchema` so `rmcp` can publish its
//! input schema) rather than a grab-bag of scalar arguments, since several
//! operations here are inherently batch/nested shaped.
//!
//! Each tool method is a thin wrapper over a `dispatch_*` method returning
//! plain `serde_json::Value`; [`crate::http_transport`] calls the same
//! `dispatch_*` methods directly so the stdio (rmcp) and HTTP/SSE transports
//! never drift apart on behavior.

use crate::error::to_mcp_error;
use crate::serialization::*;
use std::future::Future;
use orchestrator_core::dependency_engine::{self, Direction, ProposedDependency};
use orchestrator_core::models::{
    DependencyType, ItemFilter, Kind, NewWorkItem, ParentPatch, Priority, Role, SortSpec, Trigger,
    UpdateWorkItem,
};
use orchestrator_core::orchestrator::{
    CreateWorkTreeRequest as CoreCreateWorkTreeRequest, Orchestrator, TreeChild,
};
use orchestrator_core::store::Store;
use rmcp::schemars::JsonSchema;
use rmcp::{model::*, tool, tool_handler, tool_router, ErrorData as McpError, ServerHandler};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

fn default_limit() -> u32 {
    10
}

// ---- manage_items -------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ItemInput {
    #[schemars(description = "Item id; required for update, ignored for create")]
    pub id: Option<Uuid>,
    pub parent_id: Option<Uuid>,
    pub kind: Option<Kind>,
    pub title: Option<String>,
    pub summary: Option<String>,
    pub description: Option<String>,
    pub status: Option<String>,
    pub status_label: Option<String>,
    pub priority: Option<Priority>,
    pub complexity: Option<u8>,
    pub tags: Option<Vec<String>>,
    pub requires_verification: Option<bool>,
    #[schemars(description = "On update, moves the item to root regardless of parentId")]
    #[serde(default)]
    pub clear_parent: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ManageItemsRequest {
    #[schemars(description = "\"create\", \"update\", or \"delete\"")]
    pub operation: String,
    #[serde(default)]
    pub items: Vec<ItemInput>,
    #[schemars(description = "Item ids for the delete operation")]
    #[serde(default)]
    pub ids: Vec<Uuid>,
    #[schemars(description = "Shared parent for a create batch missing their own parentId")]
    pub parent_id: Option<Uuid>,
    #[schemars(description = "Delete: also delete descendants instead of rejecting")]
    #[serde(default)]
    pub recursive: bool,
}

// ---- query_items ---------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct QueryItemsRequest {
    #[schemars(description = "\"get\", \"search\", or \"overview\"")]
    pub mode: String,
    #[schemars(description = "get: the item id; overview: the root item id")]
    pub id: Option<Uuid>,
    pub parent_id: Option<Uuid>,
    pub depth: Option<u8>,
    pub role: Option<Role>,
    pub priority: Option<Priority>,
    #[serde(default)]
    pub tags_any: Vec<String>,
    pub text: Option<String>,
    pub created_after: Option<chrono::DateTime<chrono::Utc>>,
    pub created_before: Option<chrono::DateTime<chrono::Utc>>,
    pub modified_after: Option<chrono::DateTime<chrono::Utc>>,
    pub modified_before: Option<chrono::DateTime<chrono::Utc>>,
    pub sort_field: Option<String>,
    #[serde(default)]
    pub sort_descending: bool,
    #[serde(default = "default_limit")]
    pub limit: u32,
    #[serde(default)]
    pub offset: u32,
}

// ---- create_work_tree -----------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct NoteInput {
    pub key: String,
    pub body: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct NewItemInput {
    pub kind: Kind,
    pub title: String,
    pub summary: Option<String>,
    pub description: Option<String>,
    #[serde(default = "default_status")]
    pub status: String,
    #[serde(default)]
    pub priority: Priority,
    pub complexity: Option<u8>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub requires_verification: bool,
}

fn default_status() -> String {
    "pending".to_string()
}

impl NewItemInput {
    fn into_new_work_item(self, parent_id: Option<Uuid>) -> NewWorkItem {
        NewWorkItem {
            parent_id,
            kind: self.kind,
            title: self.title,
            summary: self.summary,
            description: self.description,
            status: self.status,
            priority: self.priority,
            complexity: self.complexity,
            tags: self.tags,
            requires_verification: self.requires_verification,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct TreeChildInput {
    #[schemars(description = "Local identifier other children's blocksRefs can reference")]
    #[serde(rename = "ref")]
    pub local_ref: String,
    #[serde(flatten)]
    pub item: NewItemInput,
    #[schemars(description = "Refs of sibling children this one BLOCKS")]
    #[serde(default)]
    pub blocks_refs: Vec<String>,
    #[serde(default)]
    pub notes: Vec<NoteInput>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CreateWorkTreeRequest {
    pub root: NewItemInput,
    #[serde(default)]
    pub root_notes: Vec<NoteInput>,
    #[serde(default)]
    pub children: Vec<TreeChildInput>,
}

// ---- complete_tree ---------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CompleteTreeRequest {
    pub root_id: Uuid,
    #[schemars(description = "Cancel the tree instead of completing it")]
    #[serde(default)]
    pub cancel: bool,
}

// ---- manage_notes ----------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ManageNotesRequest {
    #[schemars(description = "\"upsert\" or \"delete\"")]
    pub operation: String,
    pub item_id: Uuid,
    #[schemars(description = "Delete without a key removes every note on itemId")]
    pub key: Option<String>,
    #[schemars(description = "Required for upsert")]
    pub body: Option<String>,
    #[schemars(description = "Phase the note is attached at; required for upsert")]
    pub role: Option<Role>,
}

// ---- query_notes ------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct QueryNotesRequest {
    pub item_id: Uuid,
    #[schemars(description = "Return only the note matching this note id")]
    pub note_id: Option<Uuid>,
    pub role: Option<Role>,
    #[schemars(description = "When false, omits note bodies from the response")]
    #[serde(default = "default_true")]
    pub include_body: bool,
}

fn default_true() -> bool {
    true
}

// ---- manage_dependencies -----------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct DependencyInput {
    pub from_item_id: Uuid,
    pub to_item_id: Uuid,
    #[serde(rename = "type")]
    pub dependency_type: DependencyType,
    pub unblock_at: Option<Role>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ManageDependenciesRequest {
    #[schemars(description = "\"create\" or \"delete\"")]
    pub operation: String,
    #[schemars(description = "Create: explicit batch of edges")]
    #[serde(default)]
    pub dependencies: Vec<DependencyInput>,
    #[schemars(
        description = "Create: \"linear\", \"fan_out\", or \"fan_in\" instead of an explicit batch"
    )]
    pub pattern: Option<String>,
    #[schemars(description = "Pattern operands: the chain for linear, the fan targets/sources otherwise")]
    #[serde(default)]
    pub item_ids: Vec<Uuid>,
    #[schemars(description = "Pattern operand: the single source (fan_out) or target (fan_in)")]
    pub anchor_id: Option<Uuid>,
    pub unblock_at: Option<Role>,
    #[schemars(description = "Delete: a single dependency id")]
    pub id: Option<Uuid>,
    #[schemars(description = "Delete: every dependency touching this item")]
    pub delete_all_item_id: Option<Uuid>,
}

// ---- query_dependencies --------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct QueryDependenciesRequest {
    pub item_id: Uuid,
    #[schemars(description = "\"incoming\", \"outgoing\", or \"all\"")]
    #[serde(default = "default_direction")]
    pub direction: String,
    #[serde(rename = "type")]
    pub type_filter: Option<DependencyType>,
    #[schemars(description = "When false, runs full-graph analysis instead of just itemId's direct edges")]
    #[serde(default = "default_true")]
    pub neighbors_only: bool,
}

fn default_direction() -> String {
    "all".to_string()
}

// ---- advance_item -----------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct AdvanceItemEntry {
    pub item_id: Uuid,
    pub trigger: Trigger,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct AdvanceItemRequest {
    pub items: Vec<AdvanceItemEntry>,
}

// ---- get_next_status ----------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct GetNextStatusRequest {
    pub item_id: Uuid,
}

// ---- get_context ----------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct GetContextRequest {
    #[schemars(description = "\"item\", \"session_resume\", or \"health_check\"")]
    pub mode: String,
    #[schemars(description = "Required for mode \"item\"")]
    pub item_id: Option<Uuid>,
    #[schemars(description = "Required for mode \"session_resume\"")]
    pub since: Option<chrono::DateTime<chrono::Utc>>,
}

// ---- get_next_item ----------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct GetNextItemRequest {
    #[serde(default = "default_limit")]
    pub limit: u32,
}

/// MCP tool surface over an [`Orchestrator`]. Generic over `Store` the same
/// way the orchestrator itself is; `orchestrator-server` fixes `S` to
/// `orchestrator_db::SqliteStore` when it builds the real handler.
#[derive(Clone)]
pub struct OrchestratorMcpHandler<S: Store> {
    orchestrator: Arc<Orchestrator<S>>,
    tool_router: rmcp::handler::server::router::tool::ToolRouter<Self>,
}

impl<S: Store + Send + Sync + 'static> OrchestratorMcpHandler<S> {
    pub fn new(orchestrator: Arc<Orchestrator<S>>) -> Self {
        Self {
            orchestrator,
            tool_router: Self::tool_router(),
        }
    }

    /// The wrapped orchestrator, shared with `http_transport` so both
    /// transports dispatch through identical `Orchestrator` method calls.
    pub fn orchestrator(&self) -> &Arc<Orchestrator<S>> {
        &self.orchestrator
    }

    pub(crate) async fn dispatch_manage_items(
        &self,
        request: ManageItemsRequest,
    ) -> Result<serde_json::Value, McpError> {
        match request.operation.as_str() {
            "create" => {
                let mut created = Vec::with_capacity(request.items.len());
                for input in request.items {
                    let parent_id = input.parent_id.or(request.parent_id);
                    let new_item = NewWorkItem {
                        parent_id,
                        kind: input.kind.unwrap_or(Kind::Task),
                        title: input.title.unwrap_or_default(),
                        summary: input.summary,
                        description: input.description,
                        status: input.status.unwrap_or_else(default_status),
                        priority: input.priority.unwrap_or_default(),
                        complexity: input.complexity,
                        tags: input.tags.unwrap_or_default(),
                        requires_verification: input.requires_verification.unwrap_or(false),
                    };
                    let item = self.orchestrator.create_item(new_item).await.map_err(to_mcp_error)?;
                    let (_, expected) = self
                        .orchestrator
                        .get_context_for_item(item.id)
                        .await
                        .map_err(to_mcp_error)?;
                    created.push(json!({
                        "item": item_to_json(&item),
                        "expectedNotes": expected.iter().map(expected_note_to_json).collect::<Vec<_>>(),
                    }));
                }
                Ok(json!({ "items": created }))
            }
            "update" => {
                let mut updated = Vec::with_capacity(request.items.len());
                for input in request.items {
                    let Some(id) = input.id else {
                        return Err(McpError::invalid_params("update requires items[].id".to_string(), None));
                    };
                    let patch = UpdateWorkItem {
                        parent_id: if input.clear_parent {
                            Some(ParentPatch::ToRoot)
                        } else {
                            input.parent_id.map(ParentPatch::Set)
                        },
                        title: input.title,
                        summary: input.summary,
                        description: input.description,
                        status: input.status,
                        status_label: input.status_label,
                        priority: input.priority,
                        complexity: input.complexity,
                        tags: input.tags,
                        requires_verification: input.requires_verification,
                    };
                    let item = self.orchestrator.update_item(id, patch).await.map_err(to_mcp_error)?;
                    updated.push(item_to_json(&item));
                }
                Ok(json!({ "items": updated }))
            }
            "delete" => {
                for id in &request.ids {
                    self.orchestrator.delete_item(*id, request.recursive).await.map_err(to_mcp_error)?;
                }
                Ok(json!({ "deleted": request.ids }))
            }
            other => Err(McpError::invalid_params(format!("unknown manage_items operation '{other}'"), None)),
        }
    }

    pub(crate) async fn dispatch_query_items(
        &self,
        request: QueryItemsRequest,
    ) -> Result<serde_json::Value, McpError> {
        match request.mode.as_str() {
            "get" => {
                let id = request.id.ok_or_else(|| McpError::invalid_params("get requires id".to_string(), None))?;
                let item = self.orchestrator.get_item(id).await.map_err(to_mcp_error)?;
                Ok(item_to_json(&item))
            }
            "search" => {
                let filter = ItemFilter {
                    parent_id: request.parent_id,
                    depth: request.depth,
                    role: request.role,
                    priority: request.priority,
                    tags_any: request.tags_any,
                    text: request.text,
                    created_after: request.created_after,
                    created_before: request.created_before,
                    modified_after: request.modified_after,
                    modified_before: request.modified_before,
                    role_changed_after: None,
                    role_changed_before: None,
                };
                let sort = SortSpec { field: request.sort_field, descending: request.sort_descending };
                let items = self
                    .orchestrator
                    .search_items(filter, sort, request.limit, request.offset)
                    .await
                    .map_err(to_mcp_error)?;
                Ok(json!({ "items": items.iter().map(item_to_json).collect::<Vec<_>>() }))
            }
            "overview" => {
                let root_id = request.id.ok_or_else(|| McpError::invalid_params("overview requires id".to_string(), None))?;
                let counts = self.orchestrator.child_counts(root_id).await.map_err(to_mcp_error)?;
                let mut child_counts = serde_json::Map::new();
                for (role, count) in counts {
                    child_counts.insert(role.to_string(), json!(count));
                }
                Ok(json!({ "rootId": root_id, "childCounts": child_counts }))
            }
            other => Err(McpError::invalid_params(format!("unknown query_items mode '{other}'"), None)),
        }
    }

    pub(crate) async fn dispatch_create_work_tree(
        &self,
        request: CreateWorkTreeRequest,
    ) -> Result<serde_json::Value, McpError> {
        let root = request.root.into_new_work_item(None);
        let root_notes = request.root_notes.into_iter().map(|n| (n.key, n.body)).collect();
        let children = request
            .children
            .into_iter()
            .map(|c| TreeChild {
                local_ref: c.local_ref,
                new_item: c.item.into_new_work_item(None),
                blocks_refs: c.blocks_refs,
                notes: c.notes.into_iter().map(|n| (n.key, n.body)).collect(),
            })
            .collect();
        let result = self
            .orchestrator
            .create_work_tree(CoreCreateWorkTreeRequest { root, root_notes, children })
            .await
            .map_err(to_mcp_error)?;
        Ok(work_tree_result_to_json(&result))
    }

    pub(crate) async fn dispatch_complete_tree(
        &self,
        request: CompleteTreeRequest,
    ) -> Result<serde_json::Value, McpError> {
        let results = self
            .orchestrator
            .complete_tree(request.root_id, request.cancel)
            .await
            .map_err(to_mcp_error)?;
        Ok(json!({
            "results": results.iter().map(tree_completion_result_to_json).collect::<Vec<_>>()
        }))
    }

    pub(crate) async fn dispatch_manage_notes(
        &self,
        request: ManageNotesRequest,
    ) -> Result<serde_json::Value, McpError> {
        match request.operation.as_str() {
            "upsert" => {
                let key = request.key.ok_or_else(|| McpError::invalid_params("upsert requires key".to_string(), None))?;
                let body = request.body.ok_or_else(|| McpError::invalid_params("upsert requires body".to_string(), None))?;
                let role = request.role.ok_or_else(|| McpError::invalid_params("upsert requires role".to_string(), None))?;
                let note = self
                    .orchestrator
                    .add_note(request.item_id, key, body, role)
                    .await
                    .map_err(to_mcp_error)?;
                Ok(note_to_json(&note))
            }
            "delete" => {
                match request.key {
                    Some(key) => self.orchestrator.delete_note(request.item_id, key).await.map_err(to_mcp_error)?,
                    None => {
                        let notes = self
                            .orchestrator
                            .notes_for_item(request.item_id, None)
                            .await
                            .map_err(to_mcp_error)?;
                        for note in notes {
                            self.orchestrator.delete_note(request.item_id, note.key).await.map_err(to_mcp_error)?;
                        }
                    }
                }
                Ok(json!({ "itemId": request.item_id }))
            }
            other => Err(McpError::invalid_params(format!("unknown manage_notes operation '{other}'"), None)),
        }
    }

    pub(crate) async fn dispatch_query_notes(
        &self,
        request: QueryNotesRequest,
    ) -> Result<serde_json::Value, McpError> {
        let notes = self
            .orchestrator
            .notes_for_item(request.item_id, request.role)
            .await
            .map_err(to_mcp_error)?;
        let notes: Vec<_> = notes
            .iter()
            .filter(|n| request.note_id.map(|id| id == n.id).unwrap_or(true))
            .map(|n| {
                let mut value = note_to_json(n);
                if !request.include_body {
                    value.as_object_mut().unwrap().remove("body");
                }
                value
            })
            .collect();
        Ok(json!({ "notes": notes }))
    }

    pub(crate) async fn dispatch_manage_dependencies(
        &self,
        request: ManageDependenciesRequest,
    ) -> Result<serde_json::Value, McpError> {
        match request.operation.as_str() {
            "create" => {
                let proposed = if let Some(pattern) = request.pattern.as_deref() {
                    match pattern {
                        "linear" => dependency_engine::linear(&request.item_ids, request.unblock_at),
                        "fan_out" => {
                            let anchor = request
                                .anchor_id
                                .ok_or_else(|| McpError::invalid_params("fan_out requires anchorId".to_string(), None))?;
                            dependency_engine::fan_out(anchor, &request.item_ids, request.unblock_at)
                        }
                        "fan_in" => {
                            let anchor = request
                                .anchor_id
                                .ok_or_else(|| McpError::invalid_params("fan_in requires anchorId".to_string(), None))?;
                            dependency_engine::fan_in(&request.item_ids, anchor, request.unblock_at)
                        }
                        other => {
                            return Err(McpError::invalid_params(format!("unknown dependency pattern '{other}'"), None))
                        }
                    }
                } else {
                    request
                        .dependencies
                        .into_iter()
                        .map(|d| ProposedDependency {
                            from_item_id: d.from_item_id,
                            to_item_id: d.to_item_id,
                            dependency_type: d.dependency_type,
                            unblock_at: d.unblock_at,
                        })
                        .collect()
                };
                let created = self.orchestrator.create_dependencies(proposed).await.map_err(to_mcp_error)?;
                Ok(json!({
                    "dependencies": created.iter().map(dependency_to_json).collect::<Vec<_>>()
                }))
            }
            "delete" => {
                if let Some(id) = request.id {
                    self.orchestrator.remove_dependency(id).await.map_err(to_mcp_error)?;
                    Ok(json!({ "deleted": [id] }))
                } else if let Some(item_id) = request.delete_all_item_id {
                    let count = self.orchestrator.remove_all_dependencies(item_id).await.map_err(to_mcp_error)?;
                    Ok(json!({ "deletedCount": count }))
                } else {
                    Err(McpError::invalid_params("delete requires id or deleteAllItemId".to_string(), None))
                }
            }
            other => Err(McpError::invalid_params(format!("unknown manage_dependencies operation '{other}'"), None)),
        }
    }

    pub(crate) async fn dispatch_query_dependencies(
        &self,
        request: QueryDependenciesRequest,
    ) -> Result<serde_json::Value, McpError> {
        let direction = match request.direction.as_str() {
            "incoming" => Direction::Incoming,
            "outgoing" => Direction::Outgoing,
            "all" => Direction::All,
            other => return Err(McpError::invalid_params(format!("unknown direction '{other}'"), None)),
        };
        let analysis = self
            .orchestrator
            .query_dependencies(request.item_id, direction, request.type_filter, request.neighbors_only)
            .await
            .map_err(to_mcp_error)?;
        Ok(graph_analysis_to_json(&analysis))
    }

    pub(crate) async fn dispatch_advance_item(
        &self,
        request: AdvanceItemRequest,
    ) -> Result<serde_json::Value, McpError> {
        let items = request.items.into_iter().map(|e| (e.item_id, e.trigger)).collect();
        let outcomes = self.orchestrator.advance_items(items).await.map_err(to_mcp_error)?;
        Ok(json!({
            "outcomes": outcomes.iter().map(advance_outcome_to_json).collect::<Vec<_>>()
        }))
    }

    pub(crate) async fn dispatch_get_next_status(
        &self,
        request: GetNextStatusRequest,
    ) -> Result<serde_json::Value, McpError> {
        let report = self.orchestrator.get_next_status(request.item_id).await.map_err(to_mcp_error)?;
        Ok(next_status_report_to_json(&report))
    }

    pub(crate) async fn dispatch_get_context(
        &self,
        request: GetContextRequest,
    ) -> Result<serde_json::Value, McpError> {
        match request.mode.as_str() {
            "item" => {
                let item_id = request.item_id.ok_or_else(|| McpError::invalid_params("mode item requires itemId".to_string(), None))?;
                let (item, expected) = self.orchestrator.get_context_for_item(item_id).await.map_err(to_mcp_error)?;
                Ok(json!({
                    "item": item_to_json(&item),
                    "expectedNotes": expected.iter().map(expected_note_to_json).collect::<Vec<_>>(),
                }))
            }
            "session_resume" => {
                let since = request
                    .since
                    .ok_or_else(|| McpError::invalid_params("mode session_resume requires since".to_string(), None))?;
                let items = self.orchestrator.activity_since(since).await.map_err(to_mcp_error)?;
                Ok(json!({ "items": items.iter().map(item_to_json).collect::<Vec<_>>() }))
            }
            "health_check" => {
                let health = self.orchestrator.health_overview().await.map_err(to_mcp_error)?;
                Ok(container_health_to_json(&health))
            }
            other => Err(McpError::invalid_params(format!("unknown get_context mode '{other}'"), None)),
        }
    }

    pub(crate) async fn dispatch_get_next_item(
        &self,
        request: GetNextItemRequest,
    ) -> Result<serde_json::Value, McpError> {
        let items = self.orchestrator.get_next_item(request.limit).await.map_err(to_mcp_error)?;
        Ok(json!({ "items": items.iter().map(item_to_json).collect::<Vec<_>>() }))
    }

    pub(crate) async fn dispatch_get_blocked_items(&self) -> Result<serde_json::Value, McpError> {
        let reports = self.orchestrator.get_blocked_items().await.map_err(to_mcp_error)?;
        Ok(json!({
            "items": reports.iter().map(blocked_item_report_to_json).collect::<Vec<_>>()
        }))
    }
}

#[tool_router]
impl<S: Store + Send + Sync + 'static> OrchestratorMcpHandler<S> {
    #[tool(description = "Create, update, or delete WorkItems")]
    async fn manage_items(&self, request: rmcp::handler::server::tool::Parameters<ManageItemsRequest>) -> Result<CallToolResult, McpError> {
        Ok(success(&self.dispatch_manage_items(request.0).await?))
    }

    #[tool(description = "Fetch a single item, search by filters, or get a root's child-role overview")]
    async fn query_items(&self, request: rmcp::handler::server::tool::Parameters<QueryItemsRequest>) -> Result<CallToolResult, McpError> {
        Ok(success(&self.dispatch_query_items(request.0).await?))
    }

    #[tool(description = "Atomically create a root item, its children, their BLOCKS edges, and any notes")]
    async fn create_work_tree(&self, request: rmcp::handler::server::tool::Parameters<CreateWorkTreeRequest>) -> Result<CallToolResult, McpError> {
        Ok(success(&self.dispatch_create_work_tree(request.0).await?))
    }

    #[tool(description = "Batch-complete or batch-cancel a root item and every descendant")]
    async fn complete_tree(&self, request: rmcp::handler::server::tool::Parameters<CompleteTreeRequest>) -> Result<CallToolResult, McpError> {
        Ok(success(&self.dispatch_complete_tree(request.0).await?))
    }

    #[tool(description = "Upsert or delete notes attached to a WorkItem")]
    async fn manage_notes(&self, request: rmcp::handler::server::tool::Parameters<ManageNotesRequest>) -> Result<CallToolResult, McpError> {
        Ok(success(&self.dispatch_manage_notes(request.0).await?))
    }

    #[tool(description = "List notes on an item, optionally filtered by role or a single note id")]
    async fn query_notes(&self, request: rmcp::handler::server::tool::Parameters<QueryNotesRequest>) -> Result<CallToolResult, McpError> {
        Ok(success(&self.dispatch_query_notes(request.0).await?))
    }

    #[tool(description = "Create or delete dependency edges, including linear/fan-out/fan-in batch patterns")]
    async fn manage_dependencies(&self, request: rmcp::handler::server::tool::Parameters<ManageDependenciesRequest>) -> Result<CallToolResult, McpError> {
        Ok(success(&self.dispatch_manage_dependencies(request.0).await?))
    }

    #[tool(description = "Query an item's dependency edges, or run full-graph analysis")]
    async fn query_dependencies(&self, request: rmcp::handler::server::tool::Parameters<QueryDependenciesRequest>) -> Result<CallToolResult, McpError> {
        Ok(success(&self.dispatch_query_dependencies(request.0).await?))
    }

    #[tool(description = "Apply a trigger to one or more items, including ancestor cascades")]
    async fn advance_item(&self, request: rmcp::handler::server::tool::Parameters<AdvanceItemRequest>) -> Result<CallToolResult, McpError> {
        Ok(success(&self.dispatch_advance_item(request.0).await?))
    }

    #[tool(description = "Report whether an item is ready to start, blocked, or terminal")]
    async fn get_next_status(&self, request: rmcp::handler::server::tool::Parameters<GetNextStatusRequest>) -> Result<CallToolResult, McpError> {
        Ok(success(&self.dispatch_get_next_status(request.0).await?))
    }

    #[tool(description = "Fetch item+schema context, recent activity since a timestamp, or a container health overview")]
    async fn get_context(&self, request: rmcp::handler::server::tool::Parameters<GetContextRequest>) -> Result<CallToolResult, McpError> {
        Ok(success(&self.dispatch_get_context(request.0).await?))
    }

    #[tool(description = "List priority-ranked QUEUE items whose blockers are satisfied")]
    async fn get_next_item(&self, request: rmcp::handler::server::tool::Parameters<GetNextItemRequest>) -> Result<CallToolResult, McpError> {
        Ok(success(&self.dispatch_get_next_item(request.0).await?))
    }

    #[tool(description = "List every non-terminal item that is blocked or has an unsatisfied blocker")]
    async fn get_blocked_items(&self) -> Result<CallToolResult, McpError> {
        Ok(success(&self.dispatch_get_blocked_items().await?))
    }
}

#[tool_handler]
impl<S: Store + Send + Sync + 'static> ServerHandler for OrchestratorMcpHandler<S> {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::default(),
            server_info: Implementation::default(),
            instructions: Some(
                "An MCP server for AI-agent task orchestration: a bounded-depth DAG of \
                 WorkItems with role-based state transitions, typed dependencies, \
                 note-schema gating, and automatic parent cascades. Thirteen tools cover \
                 item/note/dependency CRUD, batch tree creation and completion, state \
                 advancement, and queue/blocker queries."
                    .into(),
            ),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
        }
    }
}
