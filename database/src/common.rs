use chrono::{DateTime, Utc};
use orchestrator_core::error::{OrchestratorError, Result};
use orchestrator_core::models::{
    Dependency, DependencyType, ItemFilter, Kind, Note, Priority, Role, SortSpec, TransitionRecord,
    Trigger, WorkItem,
};
use sqlx::{sqlite::SqliteRow, Row};
use uuid::Uuid;

pub fn role_to_string(role: Role) -> &'static str {
    match role {
        Role::Queue => "QUEUE",
        Role::Work => "WORK",
        Role::Review => "REVIEW",
        Role::Blocked => "BLOCKED",
        Role::Terminal => "TERMINAL",
    }
}

pub fn string_to_role(s: &str) -> Result<Role> {
    match s {
        "QUEUE" => Ok(Role::Queue),
        "WORK" => Ok(Role::Work),
        "REVIEW" => Ok(Role::Review),
        "BLOCKED" => Ok(Role::Blocked),
        "TERMINAL" => Ok(Role::Terminal),
        other => Err(OrchestratorError::Database(format!("invalid role in database: {other}"))),
    }
}

pub fn kind_to_string(kind: Kind) -> &'static str {
    match kind {
        Kind::Task => "task",
        Kind::Feature => "feature",
        Kind::Project => "project",
    }
}

pub fn string_to_kind(s: &str) -> Result<Kind> {
    match s {
        "task" => Ok(Kind::Task),
        "feature" => Ok(Kind::Feature),
        "project" => Ok(Kind::Project),
        other => Err(OrchestratorError::Database(format!("invalid kind in database: {other}"))),
    }
}

pub fn priority_to_string(priority: Priority) -> &'static str {
    match priority {
        Priority::High => "HIGH",
        Priority::Medium => "MEDIUM",
        Priority::Low => "LOW",
    }
}

pub fn string_to_priority(s: &str) -> Result<Priority> {
    match s {
        "HIGH" => Ok(Priority::High),
        "MEDIUM" => Ok(Priority::Medium),
        "LOW" => Ok(Priority::Low),
        other => Err(OrchestratorError::Database(format!("invalid priority in database: {other}"))),
    }
}

pub fn dependency_type_to_string(t: DependencyType) -> &'static str {
    match t {
        DependencyType::Blocks => "BLOCKS",
        DependencyType::IsBlockedBy => "IS_BLOCKED_BY",
        DependencyType::RelatesTo => "RELATES_TO",
    }
}

pub fn string_to_dependency_type(s: &str) -> Result<DependencyType> {
    match s {
        "BLOCKS" => Ok(DependencyType::Blocks),
        "IS_BLOCKED_BY" => Ok(DependencyType::IsBlockedBy),
        "RELATES_TO" => Ok(DependencyType::RelatesTo),
        other => Err(OrchestratorError::Database(format!(
            "invalid dependency type in database: {other}"
        ))),
    }
}

pub fn trigger_to_string(t: Trigger) -> &'static str {
    match t {
        Trigger::Start => "start",
        Trigger::Complete => "complete",
        Trigger::Block => "block",
        Trigger::Hold => "hold",
        Trigger::Resume => "resume",
        Trigger::Cancel => "cancel",
    }
}

pub fn string_to_trigger(s: &str) -> Result<Trigger> {
    match s {
        "start" => Ok(Trigger::Start),
        "complete" => Ok(Trigger::Complete),
        "block" => Ok(Trigger::Block),
        "hold" => Ok(Trigger::Hold),
        "resume" => Ok(Trigger::Resume),
        "cancel" => Ok(Trigger::Cancel),
        other => Err(OrchestratorError::Database(format!("invalid trigger in database: {other}"))),
    }
}

pub fn row_to_work_item(row: &SqliteRow) -> Result<WorkItem> {
    let role: String = row.get("role");
    let kind: String = row.get("kind");
    let priority: String = row.get("priority");
    let previous_role: Option<String> = row.try_get("previous_role").ok().flatten();
    let tags_json: Option<String> = row.try_get("tags").ok().flatten();

    Ok(WorkItem {
        id: row.get("id"),
        parent_id: row.try_get("parent_id").ok().flatten(),
        depth: row.get::<i64, _>("depth") as u8,
        kind: string_to_kind(&kind)?,
        title: row.get("title"),
        summary: row.try_get("summary").ok().flatten(),
        description: row.try_get("description").ok().flatten(),
        role: string_to_role(&role)?,
        previous_role: previous_role.as_deref().map(string_to_role).transpose()?,
        status: row.get("status"),
        status_label: row.try_get("status_label").ok().flatten(),
        priority: string_to_priority(&priority)?,
        complexity: row.try_get::<Option<i64>, _>("complexity").ok().flatten().map(|c| c as u8),
        tags: tags_json
            .and_then(|t| serde_json::from_str(&t).ok())
            .unwrap_or_default(),
        requires_verification: row.get::<i64, _>("requires_verification") != 0,
        created_at: row.get::<DateTime<Utc>, _>("created_at"),
        modified_at: row.get::<DateTime<Utc>, _>("modified_at"),
        role_changed_at: row.get::<DateTime<Utc>, _>("role_changed_at"),
    })
}

pub fn row_to_note(row: &SqliteRow) -> Result<Note> {
    let role: String = row.get("role");
    Ok(Note {
        id: row.get("id"),
        item_id: row.get("item_id"),
        key: row.get("key"),
        role: string_to_role(&role)?,
        body: row.get("body"),
    })
}

pub fn row_to_dependency(row: &SqliteRow) -> Result<Dependency> {
    let dependency_type: String = row.get("dependency_type");
    let unblock_at: Option<String> = row.try_get("unblock_at").ok().flatten();
    Ok(Dependency {
        id: row.get("id"),
        from_item_id: row.get("from_item_id"),
        to_item_id: row.get("to_item_id"),
        dependency_type: string_to_dependency_type(&dependency_type)?,
        unblock_at: unblock_at.as_deref().map(string_to_role).transpose()?,
        created_at: row.get::<DateTime<Utc>, _>("created_at"),
    })
}

pub fn row_to_transition(row: &SqliteRow) -> Result<TransitionRecord> {
    let previous_role: String = row.get("previous_role");
    let new_role: String = row.get("new_role");
    let trigger: String = row.get("trigger");
    Ok(TransitionRecord {
        id: row.get("id"),
        item_id: row.get("item_id"),
        previous_role: string_to_role(&previous_role)?,
        new_role: string_to_role(&new_role)?,
        trigger: string_to_trigger(&trigger)?,
        at: row.get::<DateTime<Utc>, _>("at"),
        summary: row.try_get("summary").ok().flatten(),
    })
}

/// Maps a raw `sqlx::Error` into the orchestrator's error surface. Unique
/// constraint violations on `(item_id, key)` surface as `CONFLICT`;
/// everything else as `DATABASE_ERROR`.
pub fn sqlx_error_to_orchestrator_error(err: sqlx::Error) -> OrchestratorError {
    match &err {
        sqlx::Error::Database(db_err) => {
            let message = db_err.message();
            if message.contains("UNIQUE constraint failed") {
                OrchestratorError::Conflict(format!("unique constraint violated: {message}"))
            } else {
                OrchestratorError::Database(format!("database constraint error: {message}"))
            }
        }
        sqlx::Error::RowNotFound => OrchestratorError::Internal("unexpected RowNotFound".to_string()),
        sqlx::Error::PoolTimedOut => OrchestratorError::Database("connection pool timeout".to_string()),
        sqlx::Error::Io(io_err) => OrchestratorError::Database(format!("database I/O error: {io_err}")),
        _ => OrchestratorError::Database(format!("database operation failed: {err}")),
    }
}

/// Builds the dynamic `SELECT ... FROM work_items WHERE ...` for
/// `search_items`, matching every field of [`ItemFilter`].
pub fn build_filter_query<'a>(
    filter: &'a ItemFilter,
    sort: &'a SortSpec,
    limit: u32,
    offset: u32,
) -> sqlx::QueryBuilder<'a, sqlx::Sqlite> {
    let mut qb: sqlx::QueryBuilder<sqlx::Sqlite> = sqlx::QueryBuilder::new(
        "SELECT id, parent_id, depth, kind, title, summary, description, role, previous_role, \
         status, status_label, priority, complexity, tags, requires_verification, created_at, \
         modified_at, role_changed_at FROM work_items",
    );

    let mut has_conditions = false;
    macro_rules! clause {
        () => {
            if has_conditions {
                qb.push(" AND ");
            } else {
                qb.push(" WHERE ");
                has_conditions = true;
            }
        };
    }

    if let Some(parent_id) = filter.parent_id {
        clause!();
        qb.push("parent_id = ");
        qb.push_bind(parent_id);
    }
    if let Some(depth) = filter.depth {
        clause!();
        qb.push("depth = ");
        qb.push_bind(depth as i64);
    }
    if let Some(role) = filter.role {
        clause!();
        qb.push("role = ");
        qb.push_bind(role_to_string(role));
    }
    if let Some(priority) = filter.priority {
        clause!();
        qb.push("priority = ");
        qb.push_bind(priority_to_string(priority));
    }
    if let Some(text) = &filter.text {
        clause!();
        qb.push("(title LIKE ");
        qb.push_bind(format!("%{text}%"));
        qb.push(" OR summary LIKE ");
        qb.push_bind(format!("%{text}%"));
        qb.push(")");
    }
    if let Some(after) = filter.created_after {
        clause!();
        qb.push("created_at >= ");
        qb.push_bind(after);
    }
    if let Some(before) = filter.created_before {
        clause!();
        qb.push("created_at <= ");
        qb.push_bind(before);
    }
    if let Some(after) = filter.modified_after {
        clause!();
        qb.push("modified_at >= ");
        qb.push_bind(after);
    }
    if let Some(before) = filter.modified_before {
        clause!();
        qb.push("modified_at <= ");
        qb.push_bind(before);
    }
    if let Some(after) = filter.role_changed_after {
        clause!();
        qb.push("role_changed_at >= ");
        qb.push_bind(after);
    }
    if let Some(before) = filter.role_changed_before {
        clause!();
        qb.push("role_changed_at <= ");
        qb.push_bind(before);
    }
    if !filter.tags_any.is_empty() {
        clause!();
        qb.push("(");
        for (i, tag) in filter.tags_any.iter().enumerate() {
            if i > 0 {
                qb.push(" OR ");
            }
            qb.push("tags LIKE ");
            qb.push_bind(format!("%\"{tag}\"%"));
        }
        qb.push(")");
    }

    let order_field = match sort.field.as_deref() {
        Some("title") => "title",
        Some("priority") => "priority",
        Some("depth") => "depth",
        Some("role_changed_at") => "role_changed_at",
        _ => "created_at",
    };
    qb.push(" ORDER BY ");
    qb.push(order_field);
    qb.push(if sort.descending { " DESC" } else { " ASC" });

    qb.push(" LIMIT ");
    qb.push_bind(limit as i64);
    qb.push(" OFFSET ");
    qb.push_bind(offset as i64);

    qb
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::Execute;

    #[test]
    fn role_round_trips() {
        for role in [Role::Queue, Role::Work, Role::Review, Role::Blocked, Role::Terminal] {
            assert_eq!(string_to_role(role_to_string(role)).unwrap(), role);
        }
    }

    #[test]
    fn filter_query_includes_requested_conditions() {
        let filter = ItemFilter {
            role: Some(Role::Queue),
            text: Some("parser".to_string()),
            tags_any: vec!["task-impl".to_string()],
            ..Default::default()
        };
        let sort = SortSpec::default();
        let mut qb = build_filter_query(&filter, &sort, 50, 0);
        let query = qb.build();
        let sql = query.sql();
        assert!(sql.contains("WHERE role = "));
        assert!(sql.contains("AND (title LIKE "));
        assert!(sql.contains("AND (tags LIKE "));
        assert!(sql.contains("ORDER BY created_at ASC"));
        assert!(sql.contains("LIMIT "));
    }

    #[test]
    fn unknown_role_string_is_database_error() {
        let err = string_to_role("NOPE").unwrap_err();
        assert_eq!(err.code(), "DATABASE_ERROR");
    }
}
