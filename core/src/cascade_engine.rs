//! Automatic parent progression: when a child's role changes, decides
//! whether the parent should also move, without re-entering `RoleMachine`'s
//! gates (a cascade is a derived consequence of children, not a gated
//! trigger in its own right).

use crate::models::{Role, Trigger, WorkItem};
use std::collections::HashSet;

/// A parent-level consequence of a child transition, to be applied by the
/// caller (who owns persistence) exactly once.
#[derive(Debug, Clone, PartialEq)]
pub enum CascadeAction {
    /// First child left QUEUE: move the parent out of QUEUE into WORK if it
    /// is still sitting idle.
    StartParent { parent_id: uuid::Uuid },
    /// Every child reached a terminal role: complete the parent.
    CompleteParent { parent_id: uuid::Uuid },
}

/// Evaluates whether `child_event`'s transition should cascade to `parent`,
/// given the full up-to-date set of the parent's children. Returns at most
/// one action — a cascade recurses by the caller re-invoking this function
/// one level up with the parent's own *resulting* role, never by this
/// function walking the tree itself.
pub fn evaluate(
    parent: &WorkItem,
    children: &[WorkItem],
    child_previous_role: Role,
    child_new_role: Role,
) -> Option<CascadeAction> {
    if children.is_empty() {
        return None;
    }

    let first_child_started = child_previous_role == Role::Queue
        && child_new_role != Role::Queue
        && parent.role == Role::Queue
        && children
            .iter()
            .filter(|c| c.role != Role::Queue)
            .count()
            == 1;
    if first_child_started {
        return Some(CascadeAction::StartParent { parent_id: parent.id });
    }

    let all_children_terminal = children.iter().all(WorkItem::is_terminal);
    if all_children_terminal && !parent.is_terminal() && child_new_role == Role::Terminal {
        return Some(CascadeAction::CompleteParent { parent_id: parent.id });
    }

    None
}

/// Trigger `RoleMachine` should apply to the parent for a given action.
/// Cascades never emit `Block`/`Hold`/`Cancel` — those stay operator-driven.
pub fn trigger_for(action: &CascadeAction) -> Trigger {
    match action {
        CascadeAction::StartParent { .. } => Trigger::Start,
        CascadeAction::CompleteParent { .. } => Trigger::Complete,
    }
}

/// Guards against re-processing the same parent twice within one cascade
/// walk (a single child event should cascade through each ancestor at most
/// once).
#[derive(Debug, Default)]
pub struct CascadeGuard {
    visited: HashSet<uuid::Uuid>,
}

impl CascadeGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` the first time `parent_id` is seen, `false` after.
    pub fn visit(&mut self, parent_id: uuid::Uuid) -> bool {
        self.visited.insert(parent_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Kind, Priority};
    use chrono::Utc;
    use uuid::Uuid;

    fn work_item(role: Role) -> WorkItem {
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
            previous_role: None,
            status: "pending".into(),
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

    #[test]
    fn first_child_start_moves_parent_to_work() {
        let parent = work_item(Role::Queue);
        let children = vec![work_item(Role::Work), work_item(Role::Queue)];
        let action = evaluate(&parent, &children, Role::Queue, Role::Work);
        assert_eq!(action, Some(CascadeAction::StartParent { parent_id: parent.id }));
    }

    #[test]
    fn second_child_start_does_not_recascade() {
        let parent = work_item(Role::Work);
        let children = vec![work_item(Role::Work), work_item(Role::Work)];
        let action = evaluate(&parent, &children, Role::Queue, Role::Work);
        assert_eq!(action, None);
    }

    #[test]
    fn all_children_terminal_completes_parent() {
        let parent = work_item(Role::Work);
        let children = vec![work_item(Role::Terminal), work_item(Role::Terminal)];
        let action = evaluate(&parent, &children, Role::Review, Role::Terminal);
        assert_eq!(action, Some(CascadeAction::CompleteParent { parent_id: parent.id }));
    }

    #[test]
    fn one_non_terminal_child_blocks_completion() {
        let parent = work_item(Role::Work);
        let children = vec![work_item(Role::Terminal), work_item(Role::Work)];
        let action = evaluate(&parent, &children, Role::Review, Role::Terminal);
        assert_eq!(action, None);
    }

    #[test]
    fn guard_fires_once_per_parent() {
        let mut guard = CascadeGuard::new();
        let id = Uuid::new_v4();
        assert!(guard.visit(id));
        assert!(!guard.visit(id));
    }

    #[test]
    fn leaf_with_no_children_never_cascades() {
        let parent = work_item(Role::Queue);
        let action = evaluate(&parent, &[], Role::Queue, Role::Work);
        assert_eq!(action, None);
    }
}
