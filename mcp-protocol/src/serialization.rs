//! JSON shaping for MCP tool responses.
//!
//! `rmcp`'s tool macros handle argument deserialization directly into typed
//! function parameters; this module only shapes outgoing `CallToolResult`
//! content, so a response's field names match the operation surface rather
//! than `WorkItem`'s internal `Serialize` derive verbatim.

use orchestrator_core::dependency_engine::{Blocker, GraphAnalysis};
use orchestrator_core::models::{Dependency, Note, WorkItem};
use orchestrator_core::note_gate::ExpectedNote;
use orchestrator_core::orchestrator::{
    AdvanceOutcome, BlockedItemReport, CascadeEventReport, ContainerHealth, NextStatusReport,
    ReadinessState, TreeCompletionResult, WorkTreeResult,
};
use rmcp::model::{CallToolResult, Content};
use serde::Serialize;
use serde_json::{json, Value};

pub fn item_to_json(item: &WorkItem) -> Value {
    json!({
        "id": item.id,
        "parentId": item.parent_id,
        "depth": item.depth,
        "kind": item.kind,
        "title": item.title,
        "summary": item.summary,
        "description": item.description,
        "role": item.role,
        "previousRole": item.previous_role,
        "status": item.status,
        "statusLabel": item.status_label,
        "priority": item.priority,
        "complexity": item.complexity,
        "tags": item.tags,
        "requiresVerification": item.requires_verification,
        "createdAt": item.created_at.to_rfc3339(),
        "modifiedAt": item.modified_at.to_rfc3339(),
        "roleChangedAt": item.role_changed_at.to_rfc3339(),
    })
}

pub fn note_to_json(note: &Note) -> Value {
    json!({
        "id": note.id,
        "itemId": note.item_id,
        "key": note.key,
        "role": note.role,
        "body": note.body,
    })
}

pub fn dependency_to_json(dep: &Dependency) -> Value {
    json!({
        "id": dep.id,
        "fromItemId": dep.from_item_id,
        "toItemId": dep.to_item_id,
        "type": dep.dependency_type,
        "unblockAt": dep.unblock_at,
        "createdAt": dep.created_at.to_rfc3339(),
    })
}

pub fn blocker_to_json(blocker: &Blocker) -> Value {
    json!({
        "blockerId": blocker.blocker_id,
        "requiredRole": blocker.required_role,
        "blockerRole": blocker.blocker_role,
    })
}

pub fn expected_note_to_json(note: &ExpectedNote) -> Value {
    json!({
        "key": note.key,
        "role": note.role,
        "required": note.required,
        "description": note.description,
        "exists": note.exists,
        "filled": note.filled,
    })
}

pub fn cascade_event_to_json(event: &CascadeEventReport) -> Value {
    json!({
        "itemId": event.item_id,
        "fromRole": event.from_role,
        "toRole": event.to_role,
        "applied": event.applied,
    })
}

pub fn advance_outcome_to_json(outcome: &AdvanceOutcome) -> Value {
    json!({
        "itemId": outcome.item_id,
        "applied": outcome.applied,
        "previousRole": outcome.previous_role,
        "newRole": outcome.new_role,
        "error": outcome.error,
        "blockers": outcome.blockers.iter().map(blocker_to_json).collect::<Vec<_>>(),
        "cascadeEvents": outcome.cascade_events.iter().map(cascade_event_to_json).collect::<Vec<_>>(),
        "unblockedItems": outcome.unblocked_items,
        "expectedNotes": outcome.expected_notes.iter().map(expected_note_to_json).collect::<Vec<_>>(),
    })
}

pub fn next_status_report_to_json(report: &NextStatusReport) -> Value {
    let state = match report.state {
        ReadinessState::Ready => "READY",
        ReadinessState::Blocked => "BLOCKED",
        ReadinessState::Terminal => "TERMINAL",
    };
    json!({
        "itemId": report.item_id,
        "state": state,
        "blockers": report.blockers.iter().map(blocker_to_json).collect::<Vec<_>>(),
    })
}

pub fn graph_analysis_to_json(analysis: &GraphAnalysis) -> Value {
    json!({
        "nodes": analysis.nodes,
        "topoOrder": analysis.topo_order,
        "hasCycle": analysis.has_cycle,
        "depthMap": analysis.depth_map.iter().map(|(k, v)| (k.to_string(), v)).collect::<std::collections::HashMap<_, _>>(),
        "criticalPath": analysis.critical_path,
        "bottlenecks": analysis.bottlenecks.iter().map(|(id, count)| json!({"itemId": id, "outgoingCount": count})).collect::<Vec<_>>(),
        "parallelGroups": analysis.parallel_groups,
    })
}

pub fn blocked_item_report_to_json(report: &BlockedItemReport) -> Value {
    json!({
        "item": item_to_json(&report.item),
        "blockers": report.blockers.iter().map(blocker_to_json).collect::<Vec<_>>(),
    })
}

pub fn work_tree_result_to_json(result: &WorkTreeResult) -> Value {
    json!({
        "root": item_to_json(&result.root),
        "children": result.children.iter().map(item_to_json).collect::<Vec<_>>(),
    })
}

pub fn tree_completion_result_to_json(result: &TreeCompletionResult) -> Value {
    json!({
        "itemId": result.item_id,
        "applied": result.applied,
        "gateErrors": result.gate_errors,
        "skippedReason": result.skipped_reason,
    })
}

pub fn container_health_to_json(health: &ContainerHealth) -> Value {
    json!({
        "active": health.active,
        "blocked": health.blocked,
        "stalled": health.stalled,
    })
}

/// Wraps any serializable payload as a single pretty-printed text content
/// block, the shape every tool in [`crate::rmcp_handler`] returns.
pub fn success<T: Serialize>(payload: &T) -> CallToolResult {
    let text = serde_json::to_string_pretty(payload)
        .unwrap_or_else(|e| json!({ "serializationError": e.to_string() }).to_string());
    CallToolResult::success(vec![Content::text(text)])
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use orchestrator_core::models::{Kind, Priority, Role};
    use uuid::Uuid;

    #[test]
    fn item_to_json_uses_camel_case_keys() {
        let item = WorkItem {
            id: Uuid::new_v4(),
            parent_id: None,
            depth: 0,
            kind: Kind::Task,
            title: "Implement parser".to_string(),
            summary: None,
            description: None,
            role: Role::Queue,
            previous_role: None,
            status: "pending".to_string(),
            status_label: None,
            priority: Priority::Medium,
            complexity: None,
            tags: vec![],
            requires_verification: false,
            created_at: Utc::now(),
            modified_at: Utc::now(),
            role_changed_at: Utc::now(),
        };
        let json = item_to_json(&item);
        assert_eq!(json["title"], "Implement parser");
        assert!(json.get("parentId").is_some());
        assert!(json.get("parent_id").is_none());
    }

    #[test]
    fn success_wraps_payload_as_text_content() {
        let result = success(&json!({ "ok": true }));
        assert!(format!("{result:?}").contains("ok"));
    }
}
