//! In-memory advisory locking over `WorkItem` ids: short-TTL admission
//! tokens that prevent two sessions from concurrently applying conflicting
//! operations to the same entities. Locks expire on their own; nothing here
//! blocks a caller — `acquire` either returns a token or a `CONFLICT` error.

use crate::error::{OrchestratorError, Result};
use crate::models::{Lock, OperationKind, DEFAULT_LOCK_TTL_SECONDS};
use chrono::{DateTime, Duration, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use uuid::Uuid;

/// Whether two operation kinds may simultaneously hold locks on the same
/// entity. Symmetric. `Delete` and `StructureChange` conflict with every
/// kind including themselves; `Write` and `Create` only conflict with an
/// identical kind; `Read` and `SectionEdit` never conflict with `Read`,
/// `Write`, `Create`, or each other.
pub fn conflicts(a: OperationKind, b: OperationKind) -> bool {
    use OperationKind::*;
    match (a, b) {
        (Delete, _) | (_, Delete) => true,
        (StructureChange, _) | (_, StructureChange) => true,
        (Write, Write) => true,
        (Create, Create) => true,
        _ => false,
    }
}

struct Entry {
    lock: Lock,
}

/// Holds all currently-live locks. Expired entries are swept lazily on
/// every `acquire`/`release` call rather than by a background task.
pub struct LockManager {
    ttl: Duration,
    entries: Mutex<HashMap<Uuid, Entry>>,
}

impl LockManager {
    pub fn new() -> Self {
        Self {
            ttl: Duration::seconds(DEFAULT_LOCK_TTL_SECONDS),
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_ttl_seconds(ttl_seconds: i64) -> Self {
        Self {
            ttl: Duration::seconds(ttl_seconds),
            entries: Mutex::new(HashMap::new()),
        }
    }

    fn sweep(&self, guard: &mut HashMap<Uuid, Entry>, now: DateTime<Utc>) {
        guard.retain(|_, e| !e.lock.is_expired(now));
    }

    /// Attempts to admit a lock over `entity_ids` for `operation_kind`.
    /// Fails with `CONFLICT` naming the first colliding lock if any live,
    /// non-expired lock over an overlapping entity set conflicts with this
    /// operation kind.
    pub fn acquire(
        &self,
        operation_kind: OperationKind,
        entity_ids: HashSet<Uuid>,
        session_id: String,
    ) -> Result<Lock> {
        if entity_ids.is_empty() {
            return Err(OrchestratorError::Validation("lock requires at least one entity id".into()));
        }
        let now = Utc::now();
        let mut guard = self.entries.lock().expect("lock manager mutex poisoned");
        self.sweep(&mut guard, now);

        for existing in guard.values() {
            let overlaps = existing.lock.entity_ids.intersection(&entity_ids).next().is_some();
            if overlaps && conflicts(existing.lock.operation_kind, operation_kind) {
                return Err(OrchestratorError::Conflict(format!(
                    "entity locked by an in-progress {} operation",
                    existing.lock.operation_kind_label()
                )));
            }
        }

        let lock = Lock {
            id: Uuid::new_v4(),
            operation_kind,
            entity_ids,
            acquired_at: now,
            expires_at: now + self.ttl,
            session_id,
        };
        guard.insert(lock.id, Entry { lock: lock.clone() });
        Ok(lock)
    }

    /// Releases a lock early. A no-op (not an error) if it already expired.
    pub fn release(&self, lock_id: Uuid) {
        let mut guard = self.entries.lock().expect("lock manager mutex poisoned");
        guard.remove(&lock_id);
    }

    /// Extends an active lock's expiry by another TTL window, used by
    /// long-running operations to avoid losing the lock mid-flight.
    pub fn renew(&self, lock_id: Uuid) -> Result<Lock> {
        let now = Utc::now();
        let mut guard = self.entries.lock().expect("lock manager mutex poisoned");
        self.sweep(&mut guard, now);
        let entry = guard
            .get_mut(&lock_id)
            .ok_or_else(|| OrchestratorError::NotFound(format!("lock {lock_id} not found or expired")))?;
        entry.lock.expires_at = now + self.ttl;
        Ok(entry.lock.clone())
    }

    /// Count of currently live (non-expired) locks, for diagnostics.
    pub fn live_count(&self) -> usize {
        let now = Utc::now();
        let mut guard = self.entries.lock().expect("lock manager mutex poisoned");
        self.sweep(&mut guard, now);
        guard.len()
    }
}

impl Default for LockManager {
    fn default() -> Self {
        Self::new()
    }
}

trait OperationKindLabel {
    fn operation_kind_label(&self) -> &'static str;
}

impl OperationKindLabel for Lock {
    fn operation_kind_label(&self) -> &'static str {
        match self.operation_kind {
            OperationKind::Read => "read",
            OperationKind::Write => "write",
            OperationKind::Create => "create",
            OperationKind::Delete => "delete",
            OperationKind::SectionEdit => "section-edit",
            OperationKind::StructureChange => "structure-change",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(n: usize) -> HashSet<Uuid> {
        (0..n).map(|_| Uuid::new_v4()).collect()
    }

    #[test]
    fn two_reads_never_conflict() {
        let mgr = LockManager::new();
        let entity: HashSet<Uuid> = ids(1);
        let a = mgr.acquire(OperationKind::Read, entity.clone(), "s1".into()).unwrap();
        let b = mgr.acquire(OperationKind::Read, entity, "s2".into()).unwrap();
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn write_conflicts_with_write_on_same_entity() {
        let mgr = LockManager::new();
        let entity = ids(1);
        mgr.acquire(OperationKind::Write, entity.clone(), "s1".into()).unwrap();
        let err = mgr.acquire(OperationKind::Write, entity, "s2".into()).unwrap_err();
        assert_eq!(err.code(), "CONFLICT");
    }

    #[test]
    fn disjoint_entities_never_conflict() {
        let mgr = LockManager::new();
        mgr.acquire(OperationKind::Write, ids(1), "s1".into()).unwrap();
        let b = mgr.acquire(OperationKind::Write, ids(1), "s2".into());
        assert!(b.is_ok());
    }

    #[test]
    fn release_frees_the_slot() {
        let mgr = LockManager::new();
        let entity = ids(1);
        let lock = mgr.acquire(OperationKind::StructureChange, entity.clone(), "s1".into()).unwrap();
        mgr.release(lock.id);
        assert!(mgr.acquire(OperationKind::StructureChange, entity, "s2".into()).is_ok());
    }

    #[test]
    fn expired_lock_is_swept_on_acquire() {
        let mgr = LockManager::with_ttl_seconds(-1);
        let entity = ids(1);
        mgr.acquire(OperationKind::Write, entity.clone(), "s1".into()).unwrap();
        assert!(mgr.acquire(OperationKind::Write, entity, "s2".into()).is_ok());
    }

    #[test]
    fn renew_extends_expiry() {
        let mgr = LockManager::new();
        let lock = mgr.acquire(OperationKind::Write, ids(1), "s1".into()).unwrap();
        let renewed = mgr.renew(lock.id).unwrap();
        assert!(renewed.expires_at >= lock.expires_at);
    }

    #[test]
    fn read_overlaps_with_write_create_and_section_edit() {
        use OperationKind::*;
        assert!(!conflicts(Read, Write));
        assert!(!conflicts(Read, Create));
        assert!(!conflicts(Read, SectionEdit));
        assert!(!conflicts(Read, Read));
    }

    #[test]
    fn write_and_create_only_conflict_with_themselves() {
        use OperationKind::*;
        assert!(conflicts(Write, Write));
        assert!(conflicts(Create, Create));
        assert!(!conflicts(Write, Create));
        assert!(!conflicts(Write, SectionEdit));
        assert!(!conflicts(Create, SectionEdit));
        assert!(!conflicts(SectionEdit, SectionEdit));
    }

    #[test]
    fn delete_and_structure_change_conflict_with_everything() {
        use OperationKind::*;
        for kind in [Read, Write, Create, Delete, SectionEdit, StructureChange] {
            assert!(conflicts(Delete, kind));
            assert!(conflicts(kind, Delete));
            assert!(conflicts(StructureChange, kind));
            assert!(conflicts(kind, StructureChange));
        }
    }

    #[test]
    fn reads_overlap_in_the_manager_not_just_the_matrix() {
        let mgr = LockManager::new();
        let entity = ids(1);
        mgr.acquire(OperationKind::Read, entity.clone(), "s1".into()).unwrap();
        assert!(mgr.acquire(OperationKind::Write, entity.clone(), "s2".into()).is_ok());
        assert!(mgr.acquire(OperationKind::SectionEdit, entity, "s3".into()).is_ok());
    }
}
