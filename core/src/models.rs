use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use uuid::Uuid;

/// Maximum allowed `WorkItem.depth`. Root items are depth 0.
pub const MAX_DEPTH: u8 = 3;

/// Default lock time-to-live, per the locking contract.
pub const DEFAULT_LOCK_TTL_SECONDS: i64 = 120;

/// Coarse lifecycle phase of a [`WorkItem`]. Status labels are plain strings
/// mapped to a `Role` by `WorkflowConfig`; no role logic outside `RoleMachine`
/// should branch on status strings directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
    Queue,
    Work,
    Review,
    Blocked,
    Terminal,
}

impl Role {
    /// Position in the QUEUE < WORK < REVIEW < TERMINAL threshold ordering.
    /// `Blocked` has no rank: it never satisfies a dependency threshold.
    pub fn rank(self) -> Option<u8> {
        match self {
            Role::Queue => Some(0),
            Role::Work => Some(1),
            Role::Review => Some(2),
            Role::Terminal => Some(3),
            Role::Blocked => None,
        }
    }

    /// Whether `self` satisfies an unblock threshold of `required`.
    pub fn satisfies(self, required: Role) -> bool {
        match (self.rank(), required.rank()) {
            (Some(have), Some(need)) => have >= need,
            _ => false,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Role::Queue => "queue",
            Role::Work => "work",
            Role::Review => "review",
            Role::Blocked => "blocked",
            Role::Terminal => "terminal",
        };
        write!(f, "{s}")
    }
}

/// Container type, used to select which flow table and note schema apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Kind {
    Task,
    Feature,
    Project,
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Kind::Task => "task",
            Kind::Feature => "feature",
            Kind::Project => "project",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum Priority {
    High,
    Medium,
    Low,
}

impl Default for Priority {
    fn default() -> Self {
        Priority::Medium
    }
}

impl Priority {
    /// Lower sorts first: used for `getNextItem`'s priority-desc ordering.
    pub fn rank(self) -> u8 {
        match self {
            Priority::High => 0,
            Priority::Medium => 1,
            Priority::Low => 2,
        }
    }
}

/// An instruction to the [`crate::role_machine::RoleMachine`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Trigger {
    Start,
    Complete,
    Block,
    Hold,
    Resume,
    Cancel,
}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Trigger::Start => "start",
            Trigger::Complete => "complete",
            Trigger::Block => "block",
            Trigger::Hold => "hold",
            Trigger::Resume => "resume",
            Trigger::Cancel => "cancel",
        };
        write!(f, "{s}")
    }
}

/// The single unit of work; a node in the project graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkItem {
    pub id: Uuid,
    pub parent_id: Option<Uuid>,
    pub depth: u8,
    pub kind: Kind,
    pub title: String,
    pub summary: Option<String>,
    pub description: Option<String>,
    pub role: Role,
    pub previous_role: Option<Role>,
    /// Fine-grained status label; maps to `role` via `WorkflowConfig`.
    pub status: String,
    pub status_label: Option<String>,
    pub priority: Priority,
    pub complexity: Option<u8>,
    pub tags: Vec<String>,
    pub requires_verification: bool,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
    pub role_changed_at: DateTime<Utc>,
}

impl WorkItem {
    /// `role == BLOCKED` iff `previous_role` is set.
    pub fn blocked_invariant_holds(&self) -> bool {
        (self.role == Role::Blocked) == self.previous_role.is_some()
    }

    pub fn is_terminal(&self) -> bool {
        self.role == Role::Terminal
    }
}

/// Input for item creation; `id`/timestamps are assigned by the store.
#[derive(Debug, Clone, Deserialize)]
pub struct NewWorkItem {
    pub parent_id: Option<Uuid>,
    pub kind: Kind,
    pub title: String,
    pub summary: Option<String>,
    pub description: Option<String>,
    pub status: String,
    pub priority: Priority,
    pub complexity: Option<u8>,
    pub tags: Vec<String>,
    pub requires_verification: bool,
}

/// Partial update. Omitted fields (`None`) retain their existing value.
/// Setting `parent_id` to `Some(ParentPatch::ToRoot)` moves the item to root.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateWorkItem {
    pub parent_id: Option<ParentPatch>,
    pub title: Option<String>,
    pub summary: Option<String>,
    pub description: Option<String>,
    pub status: Option<String>,
    pub status_label: Option<String>,
    pub priority: Option<Priority>,
    pub complexity: Option<u8>,
    pub tags: Option<Vec<String>>,
    pub requires_verification: Option<bool>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParentPatch {
    Set(Uuid),
    ToRoot,
}

/// Keyed text attached to a `WorkItem`. `(item_id, key)` is jointly unique.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Note {
    pub id: Uuid,
    pub item_id: Uuid,
    pub key: String,
    pub role: Role,
    pub body: String,
}

impl Note {
    /// Empty/whitespace-only bodies are treated as "unfilled" for gating.
    pub fn is_filled(&self) -> bool {
        !self.body.trim().is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DependencyType {
    Blocks,
    IsBlockedBy,
    RelatesTo,
}

/// Directed edge between two `WorkItem`s.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dependency {
    pub id: Uuid,
    pub from_item_id: Uuid,
    pub to_item_id: Uuid,
    #[serde(rename = "type")]
    pub dependency_type: DependencyType,
    pub unblock_at: Option<Role>,
    pub created_at: DateTime<Utc>,
}

impl Dependency {
    /// Normalizes `IS_BLOCKED_BY` so the returned pair always reads
    /// "`blocker` BLOCKS `dependent`", matching the direction the
    /// DependencyEngine's cycle check and blocking query both assume.
    pub fn normalized_blocks_pair(&self) -> Option<(Uuid, Uuid)> {
        match self.dependency_type {
            DependencyType::Blocks => Some((self.from_item_id, self.to_item_id)),
            DependencyType::IsBlockedBy => Some((self.to_item_id, self.from_item_id)),
            DependencyType::RelatesTo => None,
        }
    }

    pub fn effective_threshold(&self) -> Role {
        self.unblock_at.unwrap_or(Role::Terminal)
    }
}

/// Append-only log entry written on every applied role change.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransitionRecord {
    pub id: Uuid,
    pub item_id: Uuid,
    pub previous_role: Role,
    pub new_role: Role,
    pub trigger: Trigger,
    pub at: DateTime<Utc>,
    pub summary: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OperationKind {
    Read,
    Write,
    Create,
    Delete,
    SectionEdit,
    StructureChange,
}

/// Short-lived admission token returned by `LockManager::acquire`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Lock {
    pub id: Uuid,
    pub operation_kind: OperationKind,
    pub entity_ids: HashSet<Uuid>,
    pub acquired_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub session_id: String,
}

impl Lock {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at < now
    }
}

/// Filter accepted by `Store::search_items`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ItemFilter {
    pub parent_id: Option<Uuid>,
    pub depth: Option<u8>,
    pub role: Option<Role>,
    pub priority: Option<Priority>,
    /// Matches if the item has any of these tags (logical OR).
    pub tags_any: Vec<String>,
    pub text: Option<String>,
    pub created_after: Option<DateTime<Utc>>,
    pub created_before: Option<DateTime<Utc>>,
    pub modified_after: Option<DateTime<Utc>>,
    pub modified_before: Option<DateTime<Utc>>,
    pub role_changed_after: Option<DateTime<Utc>>,
    pub role_changed_before: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SortSpec {
    pub field: Option<String>,
    pub descending: bool,
}

/// Normalizes a status or tag string: lowercase, underscores to dashes.
/// Every component assumes its inputs are already normalized; this is the
/// single boundary function that performs the normalization.
pub fn normalize(raw: &str) -> String {
    raw.trim().to_lowercase().replace('_', "-")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_rank_orders_queue_through_terminal() {
        assert!(Role::Terminal.satisfies(Role::Queue));
        assert!(Role::Work.satisfies(Role::Work));
        assert!(!Role::Queue.satisfies(Role::Work));
    }

    #[test]
    fn blocked_never_satisfies_a_threshold() {
        assert!(!Role::Blocked.satisfies(Role::Queue));
    }

    #[test]
    fn dependency_normalizes_is_blocked_by() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let dep = Dependency {
            id: Uuid::new_v4(),
            from_item_id: a,
            to_item_id: b,
            dependency_type: DependencyType::IsBlockedBy,
            unblock_at: None,
            created_at: Utc::now(),
        };
        // a IS_BLOCKED_BY b means b blocks a.
        assert_eq!(dep.normalized_blocks_pair(), Some((b, a)));
    }

    #[test]
    fn relates_to_never_blocks() {
        let dep = Dependency {
            id: Uuid::new_v4(),
            from_item_id: Uuid::new_v4(),
            to_item_id: Uuid::new_v4(),
            dependency_type: DependencyType::RelatesTo,
            unblock_at: None,
            created_at: Utc::now(),
        };
        assert_eq!(dep.normalized_blocks_pair(), None);
    }

    #[test]
    fn normalize_lowercases_and_dashes() {
        assert_eq!(normalize("In_Progress"), "in-progress");
        assert_eq!(normalize("  Done "), "done");
    }

    #[test]
    fn note_empty_body_is_unfilled() {
        let note = Note {
            id: Uuid::new_v4(),
            item_id: Uuid::new_v4(),
            key: "requirements".into(),
            role: Role::Queue,
            body: "   ".into(),
        };
        assert!(!note.is_filled());
    }
}
