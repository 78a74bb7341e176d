//! Tag-driven per-phase documentation requirements: given an item's note
//! schema and its current notes, reports which required notes are missing.

use crate::models::{Note, Role};
use crate::workflow_config::NoteSpec;
use serde::Serialize;
use serde_json::Value;

/// One row of the `expectedNotes` report returned alongside item/advance
/// responses.
#[derive(Debug, Clone, Serialize)]
pub struct ExpectedNote {
    pub key: String,
    pub role: Role,
    pub required: bool,
    pub description: Option<String>,
    pub exists: bool,
    pub filled: bool,
}

/// Returns every `required` spec in `phases` for which no note exists, or
/// whose body is empty/whitespace-only. The caller decides whether to reject
/// the transition on a non-empty result.
pub fn missing_required(schema: &[NoteSpec], notes: &[Note], phases: &[Role]) -> Vec<String> {
    schema
        .iter()
        .filter(|spec| spec.required && phases.contains(&spec.role))
        .filter(|spec| {
            let existing = notes.iter().find(|n| n.key.eq_ignore_ascii_case(&spec.key));
            !matches!(existing, Some(n) if n.is_filled())
        })
        .map(|spec| spec.key.clone())
        .collect()
}

/// Full `expectedNotes` report across the whole schema, independent of which
/// phase is currently being gated.
pub fn expected_notes_report(schema: &[NoteSpec], notes: &[Note]) -> Vec<ExpectedNote> {
    schema
        .iter()
        .map(|spec| {
            let existing = notes.iter().find(|n| n.key.eq_ignore_ascii_case(&spec.key));
            ExpectedNote {
                key: spec.key.clone(),
                role: spec.role,
                required: spec.required,
                description: spec.description.clone(),
                exists: existing.is_some(),
                filled: existing.map(Note::is_filled).unwrap_or(false),
            }
        })
        .collect()
}

/// `requiresVerification` gate: a note keyed "Verification" (case
/// insensitive) whose body parses as a non-empty JSON array of criteria, all
/// of which passed.
pub fn verification_satisfied(notes: &[Note]) -> bool {
    let Some(note) = notes.iter().find(|n| n.key.eq_ignore_ascii_case("verification")) else {
        return false;
    };
    let Ok(value) = serde_json::from_str::<Value>(&note.body) else {
        return false;
    };
    let Some(array) = value.as_array() else {
        return false;
    };
    if array.is_empty() {
        return false;
    }
    array.iter().all(|entry| {
        entry
            .get("pass")
            .and_then(Value::as_bool)
            .unwrap_or(false)
            && entry.get("criteria").and_then(Value::as_str).is_some()
    })
}
