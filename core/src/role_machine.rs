//! Evaluates a trigger against an item's current role and active flow to
//! compute the next role; enforces note-schema gates, the dependency policy,
//! and the verification policy. All role logic is this one pattern-match —
//! status labels and cascades stay in `WorkflowConfig`, never hardcoded here.

use crate::dependency_engine::Blocker;
use crate::error::{OrchestratorError, Result};
use crate::models::{Kind, Role, Trigger, WorkItem};
use crate::note_gate;
use crate::workflow_config::WorkflowConfigData;
use chrono::Utc;

/// Everything the RoleMachine needs to decide and apply one transition.
pub struct TransitionInput<'a> {
    pub item: &'a WorkItem,
    pub trigger: Trigger,
    pub flow_name: &'a str,
    pub config: &'a WorkflowConfigData,
    pub missing_notes_for_gate: Vec<String>,
    pub blockers: Vec<Blocker>,
    pub verification_ok: bool,
}

/// Emitted on a successful transition; consumed by `CascadeEngine` and
/// written to the transition log.
#[derive(Debug, Clone)]
pub struct TransitionEvent {
    pub item_id: uuid::Uuid,
    pub previous_role: Role,
    pub new_role: Role,
    pub new_status: String,
    pub trigger: Trigger,
    pub new_status_label: Option<String>,
}

/// Phases that must be gated for a given trigger: `start` gates the current
/// phase only, `complete` gates every phase, `cancel` bypasses the gate
/// entirely (signalled by an empty slice — callers should skip the note
/// lookup for `Cancel` rather than call this).
pub fn gated_phases(current_role: Role, trigger: Trigger) -> Vec<Role> {
    match trigger {
        Trigger::Start => vec![current_role],
        Trigger::Complete => vec![Role::Queue, Role::Work, Role::Review],
        _ => Vec::new(),
    }
}

/// Validates and computes the outcome of applying `input.trigger` to
/// `input.item`. Returns the event to apply, or a structured error
/// (`STATE_ERROR` for an invalid trigger, `GATE_FAILURE` for missing notes /
/// unsatisfied blockers / failed verification).
pub fn evaluate(input: &TransitionInput) -> Result<TransitionEvent> {
    let item = input.item;
    let role = item.role;

    if !input.missing_notes_for_gate.is_empty() {
        return Err(OrchestratorError::GateFailure(format!(
            "missing required notes: {}",
            input.missing_notes_for_gate.join(", ")
        )));
    }

    if input.trigger == Trigger::Start && role == Role::Queue && !input.blockers.is_empty() {
        let names: Vec<String> = input.blockers.iter().map(|b| b.blocker_id.to_string()).collect();
        return Err(OrchestratorError::GateFailure(format!(
            "blocked by: {}",
            names.join(", ")
        )));
    }

    let requires_verification_phase = matches!(input.trigger, Trigger::Complete)
        || (input.trigger == Trigger::Start && role == Role::Review);
    if item.requires_verification && requires_verification_phase && !input.verification_ok {
        return Err(OrchestratorError::GateFailure(
            "verification required: a 'Verification' note with at least one passing criterion is needed"
                .to_string(),
        ));
    }

    let new_role = match input.trigger {
        Trigger::Start => match role {
            Role::Queue => {
                if input.config.has_work_phase(item.kind, input.flow_name) {
                    Role::Work
                } else {
                    Role::Terminal
                }
            }
            Role::Work => {
                if input.config.has_review_phase(item.kind, input.flow_name) {
                    Role::Review
                } else {
                    Role::Terminal
                }
            }
            Role::Review => Role::Terminal,
            _ => return Err(OrchestratorError::invalid_trigger(&role.to_string(), "start")),
        },
        Trigger::Complete => {
            if role == Role::Terminal || role == Role::Blocked {
                return Err(OrchestratorError::invalid_trigger(&role.to_string(), "complete"));
            }
            Role::Terminal
        }
        Trigger::Block | Trigger::Hold => {
            if role == Role::Terminal {
                return Err(OrchestratorError::invalid_trigger(&role.to_string(), "block"));
            }
            Role::Blocked
        }
        Trigger::Resume => {
            if role != Role::Blocked {
                return Err(OrchestratorError::invalid_trigger(&role.to_string(), "resume"));
            }
            item.previous_role
                .ok_or_else(|| OrchestratorError::Internal("blocked item missing previous_role".into()))?
        }
        Trigger::Cancel => {
            if role == Role::Terminal {
                return Err(OrchestratorError::invalid_trigger(&role.to_string(), "cancel"));
            }
            Role::Terminal
        }
    };

    let new_status = input
        .config
        .status_for_role(new_role, item.kind, input.flow_name)
        .unwrap_or_else(|| new_role.to_string());

    let new_status_label = match input.trigger {
        Trigger::Cancel => Some("cancelled".to_string()),
        _ if new_role == Role::Blocked => item.status_label.clone(),
        _ => None,
    };

    Ok(TransitionEvent {
        item_id: item.id,
        previous_role: role,
        new_role,
        new_status,
        trigger: input.trigger,
        new_status_label,
    })
}

/// Applies a computed event to an owned copy of the item, updating
/// `previous_role`/timestamps per the BLOCKED invariant.
pub fn apply(item: &WorkItem, event: &TransitionEvent) -> WorkItem {
    let mut updated = item.clone();
    let now = Utc::now();
    updated.previous_role = if event.new_role == Role::Blocked {
        Some(event.previous_role)
    } else {
        None
    };
    updated.role = event.new_role;
    updated.status = event.new_status.clone();
    if let Some(label) = &event.new_status_label {
        updated.status_label = Some(label.clone());
    }
    updated.modified_at = now;
    updated.role_changed_at = now;
    updated
}

/// Convenience used by `NoteGate`-aware callers to skip the gate lookup
/// entirely on `cancel`, matching the spec's "cancel bypasses NoteGate" rule.
pub fn gate_applies(trigger: Trigger) -> bool {
    !matches!(trigger, Trigger::Cancel)
}

pub fn missing_notes_for_trigger(
    config: &WorkflowConfigData,
    item: &WorkItem,
    notes: &[crate::models::Note],
    trigger: Trigger,
) -> Vec<String> {
    if !gate_applies(trigger) {
        return Vec::new();
    }
    let schema = config.note_schema_for_tags(&item.tags);
    if schema.is_empty() {
        return Vec::new();
    }
    let phases = gated_phases(item.role, trigger);
    if phases.is_empty() {
        return Vec::new();
    }
    note_gate::missing_required(&schema, notes, &phases)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{normalize, Priority};
    use crate::workflow_config::WorkflowConfigData;
    use uuid::Uuid;

    fn item(role: Role) -> WorkItem {
        let now = Utc::now();
        WorkItem {
            id: Uuid::new_v4(),
            parent_id: None,
            depth: 0,
            kind: Kind::Task,
            title: "t".into(),
            summary: None,
            description: None,
            role,
            previous_role: if role == Role::Blocked { Some(Role::Queue) } else { None },
            status: normalize("pending"),
            status_label: None,
            priority: Priority::Medium,
            complexity: None,
            tags: Vec::new(),
            requires_verification: false,
            created_at: now,
            modified_at: now,
            role_changed_at: now,
        }
    }

    fn input<'a>(item: &'a WorkItem, trigger: Trigger, config: &'a WorkflowConfigData) -> TransitionInput<'a> {
        TransitionInput {
            item,
            trigger,
            flow_name: "default",
            config,
            missing_notes_for_gate: Vec::new(),
            blockers: Vec::new(),
            verification_ok: true,
        }
    }

    #[test]
    fn start_from_queue_moves_to_work() {
        let config = WorkflowConfigData::defaults();
        let it = item(Role::Queue);
        let event = evaluate(&input(&it, Trigger::Start, &config)).unwrap();
        assert_eq!(event.new_role, Role::Work);
    }

    #[test]
    fn complete_always_goes_terminal() {
        let config = WorkflowConfigData::defaults();
        let it = item(Role::Work);
        let event = evaluate(&input(&it, Trigger::Complete, &config)).unwrap();
        assert_eq!(event.new_role, Role::Terminal);
    }

    #[test]
    fn resume_restores_previous_role() {
        let config = WorkflowConfigData::defaults();
        let it = item(Role::Blocked);
        let event = evaluate(&input(&it, Trigger::Resume, &config)).unwrap();
        assert_eq!(event.new_role, Role::Queue);
    }

    #[test]
    fn resume_from_non_blocked_is_state_error() {
        let config = WorkflowConfigData::defaults();
        let it = item(Role::Queue);
        let err = evaluate(&input(&it, Trigger::Resume, &config)).unwrap_err();
        assert_eq!(err.code(), "STATE_ERROR");
    }

    #[test]
    fn cancel_sets_terminal_and_label() {
        let config = WorkflowConfigData::defaults();
        let it = item(Role::Work);
        let event = evaluate(&input(&it, Trigger::Cancel, &config)).unwrap();
        assert_eq!(event.new_role, Role::Terminal);
        assert_eq!(event.new_status_label.as_deref(), Some("cancelled"));
    }

    #[test]
    fn missing_notes_block_transition() {
        let config = WorkflowConfigData::defaults();
        let it = item(Role::Queue);
        let mut inp = input(&it, Trigger::Start, &config);
        inp.missing_notes_for_gate = vec!["requirements".into()];
        let err = evaluate(&inp).unwrap_err();
        assert_eq!(err.code(), "GATE_FAILURE");
    }

    #[test]
    fn apply_sets_previous_role_when_blocking() {
        let it = item(Role::Work);
        let event = TransitionEvent {
            item_id: it.id,
            previous_role: Role::Work,
            new_role: Role::Blocked,
            new_status: "blocked".into(),
            trigger: Trigger::Block,
            new_status_label: None,
        };
        let updated = apply(&it, &event);
        assert_eq!(updated.previous_role, Some(Role::Work));
        assert!(updated.blocked_invariant_holds());
    }
}
