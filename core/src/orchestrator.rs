//! Composes `WorkflowConfig`, `DependencyEngine`, `RoleMachine`, `NoteGate`,
//! `CascadeEngine`, and `LockManager` over a `Store` into the thirteen
//! operations the MCP surface exposes. One method per operation; each
//! acquires whatever locks it needs, loads state, runs the pure engines,
//! and persists the result.

use crate::cascade_engine::{self, CascadeAction};
use crate::dependency_engine::{self, Blocker, Direction, GraphAnalysis, ProposedDependency};
use crate::error::{OrchestratorError, Result};
use crate::lock_manager::LockManager;
use crate::models::{
    Dependency, DependencyType, ItemFilter, NewWorkItem, Note, OperationKind, ParentPatch, Role,
    SortSpec, TransitionRecord, Trigger, UpdateWorkItem, WorkItem, MAX_DEPTH,
};
use crate::note_gate;
use crate::role_machine::TransitionInput;
use crate::store::Store;
use crate::validation::{ItemValidator, NoteValidator};
use crate::workflow_config::WorkflowConfig;
use chrono::Utc;
use std::collections::HashSet;
use std::sync::Arc;
use uuid::Uuid;

/// A single item-level outcome of `advance_item`.
#[derive(Debug, Clone)]
pub struct AdvanceOutcome {
    pub item_id: Uuid,
    pub applied: bool,
    pub previous_role: Option<Role>,
    pub new_role: Option<Role>,
    pub error: Option<String>,
    pub blockers: Vec<Blocker>,
    pub cascade_events: Vec<CascadeEventReport>,
    pub unblocked_items: Vec<Uuid>,
    pub expected_notes: Vec<note_gate::ExpectedNote>,
}

#[derive(Debug, Clone)]
pub struct CascadeEventReport {
    pub item_id: Uuid,
    pub from_role: Role,
    pub to_role: Role,
    pub applied: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadinessState {
    Ready,
    Blocked,
    Terminal,
}

#[derive(Debug, Clone)]
pub struct NextStatusReport {
    pub item_id: Uuid,
    pub state: ReadinessState,
    pub blockers: Vec<Blocker>,
}

#[derive(Debug, Clone)]
pub struct TreeChild {
    pub local_ref: String,
    pub new_item: NewWorkItem,
    pub blocks_refs: Vec<String>,
    pub notes: Vec<(String, String)>,
}

#[derive(Debug, Clone)]
pub struct CreateWorkTreeRequest {
    pub root: NewWorkItem,
    pub root_notes: Vec<(String, String)>,
    pub children: Vec<TreeChild>,
}

#[derive(Debug, Clone)]
pub struct WorkTreeResult {
    pub root: WorkItem,
    pub children: Vec<WorkItem>,
}

#[derive(Debug, Clone)]
pub struct TreeCompletionResult {
    pub item_id: Uuid,
    pub applied: bool,
    pub gate_errors: Vec<String>,
    pub skipped_reason: Option<String>,
}

#[derive(Debug, Clone)]
pub struct BlockedItemReport {
    pub item: WorkItem,
    pub blockers: Vec<Blocker>,
}

#[derive(Debug, Clone, Default)]
pub struct ContainerHealth {
    pub active: Vec<Uuid>,
    pub blocked: Vec<Uuid>,
    pub stalled: Vec<Uuid>,
}

/// Releases its held lock on drop, including when a caller's `?` short-circuits
/// out of the holding scope.
struct LockGuard<'a> {
    locks: &'a LockManager,
    lock: Option<crate::models::Lock>,
}

impl Drop for LockGuard<'_> {
    fn drop(&mut self) {
        if let Some(lock) = self.lock.take() {
            self.locks.release(lock.id);
        }
    }
}

/// Top-level composition root. Cloning the `Arc` handles is cheap; this is
/// the type `orchestrator-protocol`'s tool handler wraps in its own `Arc`.
pub struct Orchestrator<S: Store> {
    store: Arc<S>,
    config: Arc<WorkflowConfig>,
    locks: Arc<LockManager>,
}

impl<S: Store> Orchestrator<S> {
    pub fn new(store: Arc<S>, config: Arc<WorkflowConfig>) -> Self {
        Self {
            store,
            config,
            locks: Arc::new(LockManager::new()),
        }
    }

    /// Acquires a lock of the given operation class over `ids`, releasing it
    /// automatically when the returned guard drops (including on an early
    /// `?` return), per §4.8 step 2/7.
    fn lock_for(&self, kind: OperationKind, ids: HashSet<Uuid>, session: &str) -> Result<LockGuard<'_>> {
        let lock = self.locks.acquire(kind, ids, session.to_string())?;
        Ok(LockGuard { locks: &self.locks, lock: Some(lock) })
    }

    async fn incoming_blockers(&self, item_id: Uuid, all_edges: &[Dependency]) -> Result<Vec<Blocker>> {
        let mut incoming = Vec::new();
        for dep in all_edges {
            if dep.dependency_type == DependencyType::RelatesTo {
                continue;
            }
            if let Some((blocker, dependent)) = dep.normalized_blocks_pair() {
                if dependent == item_id {
                    let blocker_item = self.store.get_item(blocker).await?;
                    incoming.push((blocker, dep.effective_threshold(), blocker_item.role));
                }
            }
        }
        Ok(dependency_engine::unsatisfied_blockers(&incoming))
    }

    // ---- manage_items ---------------------------------------------------

    pub async fn create_item(&self, new_item: NewWorkItem) -> Result<WorkItem> {
        ItemValidator::validate_new_item(&new_item)?;
        let _lock = match new_item.parent_id {
            Some(parent_id) => Some(self.lock_for(OperationKind::Create, HashSet::from([parent_id]), "manage_items")?),
            None => None,
        };
        let parent_depth = match new_item.parent_id {
            Some(id) => Some(self.store.get_item(id).await?.depth),
            None => None,
        };
        let depth = ItemValidator::validate_depth(parent_depth)?;
        self.store.create_item(new_item, depth).await
    }

    pub async fn update_item(&self, id: Uuid, patch: UpdateWorkItem) -> Result<WorkItem> {
        ItemValidator::validate_update(&patch)?;
        let _lock = self.lock_for(OperationKind::Write, HashSet::from([id]), "manage_items")?;
        if let Some(ParentPatch::Set(new_parent)) = &patch.parent_id {
            let parent = self.store.get_item(*new_parent).await?;
            if parent.depth + 1 > MAX_DEPTH {
                return Err(OrchestratorError::depth_exceeded(parent.depth + 1));
            }
        }
        self.store.update_item(id, patch).await
    }

    pub async fn delete_item(&self, id: Uuid, recursive: bool) -> Result<()> {
        let children = self.store.children_of(id).await?;
        if !children.is_empty() && !recursive {
            return Err(OrchestratorError::Conflict(
                "item has children; pass recursive=true to delete the subtree".to_string(),
            ));
        }
        let kind = if recursive { OperationKind::StructureChange } else { OperationKind::Delete };
        let _lock = self.lock_for(kind, HashSet::from([id]), "manage_items")?;
        if recursive {
            for child in children {
                Box::pin(self.delete_item(child.id, true)).await?;
            }
        }
        self.store.delete_item(id).await
    }

    // ---- query_items ------------------------------------------------------

    pub async fn get_item(&self, id: Uuid) -> Result<WorkItem> {
        let _lock = self.lock_for(OperationKind::Read, HashSet::from([id]), "query_items")?;
        self.store.get_item(id).await
    }

    pub async fn search_items(
        &self,
        filter: ItemFilter,
        sort: SortSpec,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<WorkItem>> {
        self.store.search_items(&filter, &sort, limit, offset).await
    }

    /// `childCounts` overview for a root item, bucketed by role.
    pub async fn child_counts(&self, root_id: Uuid) -> Result<[(Role, usize); 5]> {
        let _lock = self.lock_for(OperationKind::Read, HashSet::from([root_id]), "query_items")?;
        let children = self.store.children_of(root_id).await?;
        let count = |r: Role| children.iter().filter(|c| c.role == r).count();
        Ok([
            (Role::Queue, count(Role::Queue)),
            (Role::Work, count(Role::Work)),
            (Role::Review, count(Role::Review)),
            (Role::Blocked, count(Role::Blocked)),
            (Role::Terminal, count(Role::Terminal)),
        ])
    }

    // ---- create_work_tree ---------------------------------------------

    /// Creates a root item, its children (each referencing siblings via a
    /// local `ref` string), any notes, and the BLOCKS edges described by
    /// `blocks_refs` — all validated as one unit before anything persists.
    pub async fn create_work_tree(&self, request: CreateWorkTreeRequest) -> Result<WorkTreeResult> {
        ItemValidator::validate_new_item(&request.root)?;
        for child in &request.children {
            ItemValidator::validate_new_item(&child.new_item)?;
        }
        if request.children.len() + 1 > 200 {
            return Err(OrchestratorError::Validation(
                "a work tree may contain at most 200 items".to_string(),
            ));
        }
        let refs: HashSet<&str> = request.children.iter().map(|c| c.local_ref.as_str()).collect();
        if refs.len() != request.children.len() {
            return Err(OrchestratorError::Validation(
                "child refs must be unique within a work tree".to_string(),
            ));
        }
        for child in &request.children {
            for target in &child.blocks_refs {
                if !refs.contains(target.as_str()) {
                    return Err(OrchestratorError::Validation(format!(
                        "unknown child ref '{target}' in blocks_refs"
                    )));
                }
            }
        }

        let _lock = match request.root.parent_id {
            Some(parent_id) => {
                Some(self.lock_for(OperationKind::StructureChange, HashSet::from([parent_id]), "create_work_tree")?)
            }
            None => None,
        };

        let root = self.store.create_item(request.root, 0).await?;
        for (key, body) in request.root_notes {
            self.add_note(root.id, key, body, Role::Queue).await?;
        }

        let mut created: Vec<WorkItem> = Vec::with_capacity(request.children.len());
        let mut ref_to_id: std::collections::HashMap<String, Uuid> = std::collections::HashMap::new();
        for child in &request.children {
            let mut new_item = child.new_item.clone();
            new_item.parent_id = Some(root.id);
            let item = self.store.create_item(new_item, 1).await?;
            ref_to_id.insert(child.local_ref.clone(), item.id);
            created.push(item);
        }

        let mut proposed = Vec::new();
        for child in &request.children {
            let from_id = ref_to_id[&child.local_ref];
            for target_ref in &child.blocks_refs {
                proposed.push(ProposedDependency {
                    from_item_id: from_id,
                    to_item_id: ref_to_id[target_ref],
                    dependency_type: DependencyType::Blocks,
                    unblock_at: None,
                });
            }
        }
        if !proposed.is_empty() {
            let existing = self.store.all_dependencies().await?;
            dependency_engine::validate_batch(&existing, &proposed)?;
            let now = Utc::now();
            let deps: Vec<Dependency> = proposed
                .into_iter()
                .map(|p| Dependency {
                    id: Uuid::new_v4(),
                    from_item_id: p.from_item_id,
                    to_item_id: p.to_item_id,
                    dependency_type: p.dependency_type,
                    unblock_at: p.unblock_at,
                    created_at: now,
                })
                .collect();
            self.store.add_dependencies(deps).await?;
        }

        for (i, child) in request.children.iter().enumerate() {
            for (key, body) in &child.notes {
                self.add_note(created[i].id, key.clone(), body.clone(), Role::Queue).await?;
            }
        }

        Ok(WorkTreeResult { root, children: created })
    }

    // ---- complete_tree --------------------------------------------------

    /// Batch-completes (or cancels) every descendant of `root_id`, deepest
    /// first, so a parent's all-children-terminal cascade observes already
    /// up-to-date children.
    pub async fn complete_tree(&self, root_id: Uuid, cancel: bool) -> Result<Vec<TreeCompletionResult>> {
        let mut all = vec![self.store.get_item(root_id).await?];
        let mut frontier = vec![root_id];
        while let Some(id) = frontier.pop() {
            let children = self.store.children_of(id).await?;
            for child in children {
                frontier.push(child.id);
                all.push(child);
            }
        }
        all.sort_by_key(|i| std::cmp::Reverse(i.depth));

        let ids: HashSet<Uuid> = all.iter().map(|i| i.id).collect();
        let _lock = self.lock_for(OperationKind::StructureChange, ids, "complete_tree")?;

        let trigger = if cancel { Trigger::Cancel } else { Trigger::Complete };
        let mut results = Vec::with_capacity(all.len());
        for item in all {
            if item.is_terminal() {
                results.push(TreeCompletionResult {
                    item_id: item.id,
                    applied: false,
                    gate_errors: Vec::new(),
                    skipped_reason: Some("already terminal".to_string()),
                });
                continue;
            }
            match self.advance_core(item.id, trigger).await {
                Ok(outcome) if outcome.applied => results.push(TreeCompletionResult {
                    item_id: item.id,
                    applied: true,
                    gate_errors: Vec::new(),
                    skipped_reason: None,
                }),
                Ok(outcome) => results.push(TreeCompletionResult {
                    item_id: item.id,
                    applied: false,
                    gate_errors: outcome.error.into_iter().collect(),
                    skipped_reason: None,
                }),
                Err(e) => results.push(TreeCompletionResult {
                    item_id: item.id,
                    applied: false,
                    gate_errors: vec![e.to_string()],
                    skipped_reason: None,
                }),
            }
        }
        Ok(results)
    }

    // ---- manage_notes -----------------------------------------------------

    pub async fn add_note(&self, item_id: Uuid, key: String, body: String, role: Role) -> Result<Note> {
        NoteValidator::validate_key(&key)?;
        NoteValidator::validate_body(&body)?;
        let _lock = self.lock_for(OperationKind::SectionEdit, HashSet::from([item_id]), "manage_notes")?;
        self.store.get_item(item_id).await?;
        self.store
            .add_note(Note {
                id: Uuid::new_v4(),
                item_id,
                key,
                role,
                body,
            })
            .await
    }

    pub async fn update_note(&self, item_id: Uuid, key: String, body: String) -> Result<Note> {
        NoteValidator::validate_key(&key)?;
        NoteValidator::validate_body(&body)?;
        let _lock = self.lock_for(OperationKind::SectionEdit, HashSet::from([item_id]), "manage_notes")?;
        self.store.update_note(item_id, &key, body).await
    }

    pub async fn delete_note(&self, item_id: Uuid, key: String) -> Result<()> {
        let _lock = self.lock_for(OperationKind::SectionEdit, HashSet::from([item_id]), "manage_notes")?;
        self.store.delete_note(item_id, &key).await
    }

    // ---- query_notes --------------------------------------------------

    pub async fn notes_for_item(&self, item_id: Uuid, role: Option<Role>) -> Result<Vec<Note>> {
        let _lock = self.lock_for(OperationKind::Read, HashSet::from([item_id]), "query_notes")?;
        let notes = self.store.notes_for_item(item_id).await?;
        Ok(match role {
            Some(r) => notes.into_iter().filter(|n| n.role == r).collect(),
            None => notes,
        })
    }

    // ---- manage_dependencies --------------------------------------------

    pub async fn create_dependencies(&self, proposed: Vec<ProposedDependency>) -> Result<Vec<Dependency>> {
        if proposed.is_empty() {
            return Ok(Vec::new());
        }
        let ids: HashSet<Uuid> = proposed.iter().flat_map(|p| [p.from_item_id, p.to_item_id]).collect();
        let _lock = self.lock_for(OperationKind::StructureChange, ids, "manage_dependencies")?;
        let existing = self.store.all_dependencies().await?;
        dependency_engine::validate_batch(&existing, &proposed)?;
        let now = Utc::now();
        let deps: Vec<Dependency> = proposed
            .into_iter()
            .map(|p| Dependency {
                id: Uuid::new_v4(),
                from_item_id: p.from_item_id,
                to_item_id: p.to_item_id,
                dependency_type: p.dependency_type,
                unblock_at: p.unblock_at,
                created_at: now,
            })
            .collect();
        self.store.add_dependencies(deps).await
    }

    pub async fn remove_dependency(&self, id: Uuid) -> Result<()> {
        let edges = self.store.all_dependencies().await?;
        let ids = match edges.iter().find(|e| e.id == id) {
            Some(edge) => HashSet::from([edge.from_item_id, edge.to_item_id]),
            None => return Err(OrchestratorError::NotFound(format!("dependency {id} not found"))),
        };
        let _lock = self.lock_for(OperationKind::StructureChange, ids, "manage_dependencies")?;
        self.store.remove_dependency(id).await
    }

    pub async fn remove_all_dependencies(&self, item_id: Uuid) -> Result<usize> {
        let _lock = self.lock_for(OperationKind::StructureChange, HashSet::from([item_id]), "manage_dependencies")?;
        let edges = self.store.dependencies_for_item(item_id).await?;
        let count = edges.len();
        for edge in edges {
            self.store.remove_dependency(edge.id).await?;
        }
        Ok(count)
    }

    // ---- query_dependencies ---------------------------------------------

    pub async fn query_dependencies(
        &self,
        item_id: Uuid,
        direction: Direction,
        type_filter: Option<DependencyType>,
        neighbors_only: bool,
    ) -> Result<GraphAnalysis> {
        let _lock = self.lock_for(OperationKind::Read, HashSet::from([item_id]), "query_dependencies")?;
        let edges = if neighbors_only {
            self.store.dependencies_for_item(item_id).await?
        } else {
            self.store.all_dependencies().await?
        };
        Ok(dependency_engine::analyze(item_id, direction, type_filter, &edges))
    }

    // ---- advance_item -----------------------------------------------------

    /// Evaluates and applies one trigger on one item, including the cascade
    /// walk up the ancestor chain. Never returns `Err` for a gate/blocker
    /// rejection — those surface as `applied: false` with `error` set, per
    /// the batch-tolerant contract; `Err` is reserved for infrastructure
    /// failures (missing item, database error).
    pub async fn advance_one(&self, item_id: Uuid, trigger: Trigger) -> Result<AdvanceOutcome> {
        let _lock = self.lock_for(OperationKind::Write, HashSet::from([item_id]), "advance_item")?;
        self.advance_core(item_id, trigger).await
    }

    /// The transition logic proper, without lock acquisition. Called by
    /// `advance_one` under a fresh `Write` lock, by `complete_tree` under an
    /// already-held `StructureChange` lock spanning the whole subtree, and by
    /// `cascade_up` for ancestors reached while a descendant's lock is held.
    fn advance_core<'a>(
        &'a self,
        item_id: Uuid,
        trigger: Trigger,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<AdvanceOutcome>> + Send + 'a>> {
        Box::pin(async move {
        let item = self.store.get_item(item_id).await?;
        let config = self.config.snapshot();
        let flow_name = config.flow_for_tags(&item.tags, item.kind);

        let notes = self.store.notes_for_item(item_id).await?;
        let missing_notes = crate::role_machine::missing_notes_for_trigger(&config, &item, &notes, trigger);
        let all_edges = self.store.all_dependencies().await?;
        let blockers = if trigger == Trigger::Start && item.role == Role::Queue {
            self.incoming_blockers(item_id, &all_edges).await?
        } else {
            Vec::new()
        };
        let verification_ok = note_gate::verification_satisfied(&notes);

        let input = TransitionInput {
            item: &item,
            trigger,
            flow_name: &flow_name,
            config: &config,
            missing_notes_for_gate: missing_notes,
            blockers: blockers.clone(),
            verification_ok,
        };

        let event = match crate::role_machine::evaluate(&input) {
            Ok(e) => e,
            Err(err) => {
                let expected = note_gate::expected_notes_report(&config.note_schema_for_tags(&item.tags), &notes);
                return Ok(AdvanceOutcome {
                    item_id,
                    applied: false,
                    previous_role: Some(item.role),
                    new_role: None,
                    error: Some(err.to_string()),
                    blockers,
                    cascade_events: Vec::new(),
                    unblocked_items: Vec::new(),
                    expected_notes: expected,
                });
            }
        };

        let updated = crate::role_machine::apply(&item, &event);
        self.persist_transition(&item, &updated, &event).await?;

        let unblocked = self.newly_unblocked(item_id, event.new_role, &all_edges).await?;
        let cascades = self.cascade_up(&updated, event.previous_role, event.new_role).await?;

        let refreshed_notes = self.store.notes_for_item(item_id).await?;
        let expected = note_gate::expected_notes_report(&config.note_schema_for_tags(&updated.tags), &refreshed_notes);

        Ok(AdvanceOutcome {
            item_id,
            applied: true,
            previous_role: Some(event.previous_role),
            new_role: Some(event.new_role),
            error: None,
            blockers: Vec::new(),
            cascade_events: cascades,
            unblocked_items: unblocked,
            expected_notes: expected,
        })
        })
    }

    pub async fn advance_items(&self, items: Vec<(Uuid, Trigger)>) -> Result<Vec<AdvanceOutcome>> {
        let mut out = Vec::with_capacity(items.len());
        for (id, trigger) in items {
            out.push(self.advance_one(id, trigger).await?);
        }
        Ok(out)
    }

    async fn persist_transition(
        &self,
        before: &WorkItem,
        after: &WorkItem,
        event: &crate::role_machine::TransitionEvent,
    ) -> Result<()> {
        let patch = UpdateWorkItem {
            status: Some(after.status.clone()),
            status_label: after.status_label.clone(),
            ..Default::default()
        };
        self.store.update_item(after.id, patch).await?;
        self.store
            .append_transition(TransitionRecord {
                id: Uuid::new_v4(),
                item_id: after.id,
                previous_role: before.role,
                new_role: event.new_role,
                trigger: event.trigger,
                at: Utc::now(),
                summary: None,
            })
            .await
    }

    /// Items that depended on `item_id` and whose threshold is now met,
    /// reported back on the triggering item's response per the contract.
    async fn newly_unblocked(&self, item_id: Uuid, new_role: Role, all_edges: &[Dependency]) -> Result<Vec<Uuid>> {
        let mut unblocked = Vec::new();
        for dep in all_edges {
            if dep.dependency_type == DependencyType::RelatesTo {
                continue;
            }
            if let Some((blocker, dependent)) = dep.normalized_blocks_pair() {
                if blocker == item_id && new_role.satisfies(dep.effective_threshold()) {
                    let all_for_dependent = self.store.dependencies_for_item(dependent).await?;
                    let mut incoming = Vec::new();
                    for d in &all_for_dependent {
                        if d.dependency_type == DependencyType::RelatesTo {
                            continue;
                        }
                        if let Some((b, dep_target)) = d.normalized_blocks_pair() {
                            if dep_target == dependent {
                                let role = if b == item_id {
                                    new_role
                                } else {
                                    self.store.get_item(b).await?.role
                                };
                                incoming.push((b, d.effective_threshold(), role));
                            }
                        }
                    }
                    if dependency_engine::unsatisfied_blockers(&incoming).is_empty() {
                        unblocked.push(dependent);
                    }
                }
            }
        }
        Ok(unblocked)
    }

    /// Walks cascades up the ancestor chain starting from `child`'s
    /// transition, applying at most one action per ancestor.
    async fn cascade_up(
        &self,
        child: &WorkItem,
        child_previous_role: Role,
        child_new_role: Role,
    ) -> Result<Vec<CascadeEventReport>> {
        let mut reports = Vec::new();
        let mut guard = cascade_engine::CascadeGuard::new();
        let mut current_child = child.clone();
        let mut prev_role = child_previous_role;
        let mut new_role = child_new_role;

        while let Some(parent_id) = current_child.parent_id {
            if !guard.visit(parent_id) {
                break;
            }
            let parent = self.store.get_item(parent_id).await?;
            let siblings = self.store.children_of(parent_id).await?;
            let Some(action) = cascade_engine::evaluate(&parent, &siblings, prev_role, new_role) else {
                break;
            };
            let trigger = cascade_engine::trigger_for(&action);
            let outcome = self.advance_core(parent_id, trigger).await?;
            let applied = outcome.applied;
            let from_role = outcome.previous_role.unwrap_or(parent.role);
            let to_role = outcome.new_role.unwrap_or(parent.role);
            reports.push(CascadeEventReport {
                item_id: parent_id,
                from_role,
                to_role,
                applied,
            });
            match action {
                CascadeAction::StartParent { .. } | CascadeAction::CompleteParent { .. } if applied => {
                    current_child = self.store.get_item(parent_id).await?;
                    prev_role = from_role;
                    new_role = to_role;
                }
                _ => break,
            }
        }
        Ok(reports)
    }

    // ---- get_next_status --------------------------------------------------

    pub async fn get_next_status(&self, item_id: Uuid) -> Result<NextStatusReport> {
        let _lock = self.lock_for(OperationKind::Read, HashSet::from([item_id]), "get_next_status")?;
        let item = self.store.get_item(item_id).await?;
        if item.is_terminal() {
            return Ok(NextStatusReport {
                item_id,
                state: ReadinessState::Terminal,
                blockers: Vec::new(),
            });
        }
        if item.role == Role::Blocked {
            return Ok(NextStatusReport {
                item_id,
                state: ReadinessState::Blocked,
                blockers: Vec::new(),
            });
        }
        let all_edges = self.store.all_dependencies().await?;
        let blockers = self.incoming_blockers(item_id, &all_edges).await?;
        let state = if blockers.is_empty() { ReadinessState::Ready } else { ReadinessState::Blocked };
        Ok(NextStatusReport { item_id, state, blockers })
    }

    // ---- get_context -------------------------------------------------------

    pub async fn get_context_for_item(&self, item_id: Uuid) -> Result<(WorkItem, Vec<note_gate::ExpectedNote>)> {
        let _lock = self.lock_for(OperationKind::Read, HashSet::from([item_id]), "get_context")?;
        let item = self.store.get_item(item_id).await?;
        let config = self.config.snapshot();
        let notes = self.store.notes_for_item(item_id).await?;
        let schema = config.note_schema_for_tags(&item.tags);
        Ok((item, note_gate::expected_notes_report(&schema, &notes)))
    }

    pub async fn activity_since(&self, since: chrono::DateTime<Utc>) -> Result<Vec<WorkItem>> {
        let filter = ItemFilter {
            modified_after: Some(since),
            ..Default::default()
        };
        self.store.search_items(&filter, &SortSpec::default(), 500, 0).await
    }

    pub async fn health_overview(&self) -> Result<ContainerHealth> {
        let stalled_cutoff = Utc::now() - chrono::Duration::hours(24);
        let all = self
            .store
            .search_items(&ItemFilter::default(), &SortSpec::default(), 10_000, 0)
            .await?;
        let mut health = ContainerHealth::default();
        for item in all {
            match item.role {
                Role::Blocked => health.blocked.push(item.id),
                Role::Terminal => {}
                _ if item.modified_at < stalled_cutoff => health.stalled.push(item.id),
                _ => health.active.push(item.id),
            }
        }
        Ok(health)
    }

    // ---- get_next_item ----------------------------------------------------

    /// Priority-ranked QUEUE items whose blockers are satisfied, highest
    /// priority (then oldest `created_at`) first.
    pub async fn get_next_item(&self, limit: u32) -> Result<Vec<WorkItem>> {
        let filter = ItemFilter {
            role: Some(Role::Queue),
            ..Default::default()
        };
        let mut candidates = self.store.search_items(&filter, &SortSpec::default(), 1000, 0).await?;
        let all_edges = self.store.all_dependencies().await?;

        let mut ready = Vec::new();
        for item in candidates.drain(..) {
            let blockers = self.incoming_blockers(item.id, &all_edges).await?;
            if blockers.is_empty() {
                ready.push(item);
            }
        }
        ready.sort_by(|a, b| a.priority.rank().cmp(&b.priority.rank()).then(a.created_at.cmp(&b.created_at)));
        ready.truncate(limit as usize);
        Ok(ready)
    }

    // ---- get_blocked_items --------------------------------------------

    pub async fn get_blocked_items(&self) -> Result<Vec<BlockedItemReport>> {
        let filter = ItemFilter::default();
        let all = self.store.search_items(&filter, &SortSpec::default(), 10_000, 0).await?;
        let all_edges = self.store.all_dependencies().await?;
        let mut reports = Vec::new();
        for item in all {
            if item.is_terminal() {
                continue;
            }
            let blockers = self.incoming_blockers(item.id, &all_edges).await?;
            if !blockers.is_empty() || item.role == Role::Blocked {
                reports.push(BlockedItemReport { item, blockers });
            }
        }
        Ok(reports)
    }
}
