//! Exercises the response-shaping helpers against the richer report types
//! `serialization.rs`'s own inline tests don't cover, and checks every
//! `OrchestratorError` kind maps to the right `rmcp` error bucket.

use chrono::Utc;
use orchestrator_core::dependency_engine::{Blocker, GraphAnalysis};
use orchestrator_core::models::{DependencyType, Role};
use orchestrator_core::orchestrator::{AdvanceOutcome, NextStatusReport, ReadinessState};
use orchestrator_core::OrchestratorError;
use orchestrator_protocol::serialization::{
    advance_outcome_to_json, graph_analysis_to_json, next_status_report_to_json,
};
use orchestrator_protocol::to_mcp_error;
use std::collections::HashMap;
use uuid::Uuid;

#[test]
fn next_status_report_renders_readiness_as_screaming_case() {
    let blocker_id = Uuid::new_v4();
    let report = NextStatusReport {
        item_id: Uuid::new_v4(),
        state: ReadinessState::Blocked,
        blockers: vec![Blocker {
            blocker_id,
            required_role: Role::Review,
            blocker_role: Role::Work,
        }],
    };
    let json = next_status_report_to_json(&report);
    assert_eq!(json["state"], "BLOCKED");
    assert_eq!(json["blockers"][0]["blockerId"], blocker_id.to_string());
    assert_eq!(json["blockers"][0]["requiredRole"], "REVIEW");
}

#[test]
fn advance_outcome_carries_cascade_and_blocker_detail() {
    let item_id = Uuid::new_v4();
    let outcome = AdvanceOutcome {
        item_id,
        applied: false,
        previous_role: Some(Role::Work),
        new_role: Some(Role::Work),
        error: Some("blocked".to_string()),
        blockers: vec![Blocker {
            blocker_id: Uuid::new_v4(),
            required_role: Role::Review,
            blocker_role: Role::Queue,
        }],
        cascade_events: vec![],
        unblocked_items: vec![],
        expected_notes: vec![],
    };
    let json = advance_outcome_to_json(&outcome);
    assert_eq!(json["applied"], false);
    assert_eq!(json["error"], "blocked");
    assert_eq!(json["blockers"].as_array().unwrap().len(), 1);
}

#[test]
fn graph_analysis_stringifies_uuid_keyed_depth_map() {
    let a = Uuid::new_v4();
    let b = Uuid::new_v4();
    let mut depth_map = HashMap::new();
    depth_map.insert(a, 0);
    depth_map.insert(b, 1);
    let analysis = GraphAnalysis {
        nodes: vec![a, b],
        topo_order: vec![a, b],
        has_cycle: false,
        depth_map,
        critical_path: vec![a, b],
        bottlenecks: vec![(a, 2)],
        parallel_groups: vec![vec![a], vec![b]],
    };
    let json = graph_analysis_to_json(&analysis);
    assert_eq!(json["hasCycle"], false);
    assert_eq!(json["depthMap"][a.to_string()], 0);
    assert_eq!(json["bottlenecks"][0]["outgoingCount"], 2);
}

#[test]
fn dependency_type_round_trips_through_json_as_screaming_snake_case() {
    let dep = DependencyType::Blocks;
    let value = serde_json::to_value(dep).unwrap();
    assert_eq!(value, "BLOCKS");
}

#[test]
fn every_error_kind_maps_to_a_retry_eligible_rmcp_bucket() {
    let retry_eligible = [
        OrchestratorError::Validation("bad input".into()),
        OrchestratorError::NotFound("missing".into()),
        OrchestratorError::Conflict("cycle".into()),
        OrchestratorError::GateFailure("missing notes".into()),
        OrchestratorError::StateError("bad trigger".into()),
    ];
    for err in retry_eligible {
        let code = err.code();
        let mcp_err = to_mcp_error(err);
        assert!(
            mcp_err.message.contains(code),
            "expected message to embed {code}, got {}",
            mcp_err.message
        );
    }

    let internal_only = [
        OrchestratorError::Database("pool exhausted".into()),
        OrchestratorError::Internal("unexpected".into()),
    ];
    for err in internal_only {
        let code = err.code();
        let mcp_err = to_mcp_error(err);
        assert!(mcp_err.message.contains(code));
    }
}

#[test]
fn timestamps_in_reports_are_rfc3339() {
    let now = Utc::now();
    assert!(now.to_rfc3339().contains('T'));
}
