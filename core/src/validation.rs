//! Field-level validation for item/note/dependency inputs, separate from the
//! role/gate logic in `role_machine`. Keeps rejections (`VALIDATION_ERROR`)
//! distinct from state conflicts (`STATE_ERROR`/`GATE_FAILURE`).

use crate::error::{OrchestratorError, Result};
use crate::models::{NewWorkItem, UpdateWorkItem, MAX_DEPTH};

pub struct ItemValidator;

impl ItemValidator {
    /// Titles must be 1-200 characters of non-whitespace content.
    pub fn validate_title(title: &str) -> Result<()> {
        let trimmed = title.trim();
        if trimmed.is_empty() {
            return Err(OrchestratorError::empty_field("title"));
        }
        if trimmed.chars().count() > 200 {
            return Err(OrchestratorError::Validation(
                "title must be at most 200 characters long".to_string(),
            ));
        }
        Ok(())
    }

    /// Descriptions are optional, but when present must not exceed 4000
    /// characters (notes carry the bulk of per-phase detail, not this field).
    pub fn validate_description(description: &Option<String>) -> Result<()> {
        match description {
            Some(text) if text.chars().count() > 4000 => Err(OrchestratorError::Validation(
                "description must be at most 4000 characters long".to_string(),
            )),
            _ => Ok(()),
        }
    }

    /// Tags must be lowercase-dash-normalized already and at most 32
    /// characters each; an item may carry at most 10.
    pub fn validate_tags(tags: &[String]) -> Result<()> {
        if tags.len() > 10 {
            return Err(OrchestratorError::Validation(
                "an item may carry at most 10 tags".to_string(),
            ));
        }
        for tag in tags {
            if tag.is_empty() || tag.chars().count() > 32 {
                return Err(OrchestratorError::Validation(format!(
                    "tag '{tag}' must be 1-32 characters long"
                )));
            }
            if !tag.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-') {
                return Err(OrchestratorError::Validation(format!(
                    "tag '{tag}' may only contain lowercase letters, digits, and hyphens"
                )));
            }
        }
        Ok(())
    }

    /// `complexity` is an optional 1-5 difficulty estimate.
    pub fn validate_complexity(complexity: Option<u8>) -> Result<()> {
        match complexity {
            Some(c) if !(1..=5).contains(&c) => Err(OrchestratorError::Validation(
                "complexity must be between 1 and 5".to_string(),
            )),
            _ => Ok(()),
        }
    }

    /// A child's depth is its parent's depth plus one; rejects anything that
    /// would exceed [`MAX_DEPTH`].
    pub fn validate_depth(parent_depth: Option<u8>) -> Result<u8> {
        let depth = parent_depth.map(|d| d + 1).unwrap_or(0);
        if depth > MAX_DEPTH {
            return Err(OrchestratorError::depth_exceeded(depth));
        }
        Ok(depth)
    }

    pub fn validate_new_item(item: &NewWorkItem) -> Result<()> {
        Self::validate_title(&item.title)?;
        Self::validate_description(&item.description)?;
        Self::validate_tags(&item.tags)?;
        Self::validate_complexity(item.complexity)?;
        if item.status.trim().is_empty() {
            return Err(OrchestratorError::empty_field("status"));
        }
        Ok(())
    }

    pub fn validate_update(patch: &UpdateWorkItem) -> Result<()> {
        if let Some(title) = &patch.title {
            Self::validate_title(title)?;
        }
        if patch.description.is_some() {
            Self::validate_description(&patch.description)?;
        }
        if let Some(tags) = &patch.tags {
            Self::validate_tags(tags)?;
        }
        if let Some(complexity) = patch.complexity {
            Self::validate_complexity(Some(complexity))?;
        }
        if let Some(status) = &patch.status {
            if status.trim().is_empty() {
                return Err(OrchestratorError::empty_field("status"));
            }
        }
        Ok(())
    }
}

pub struct NoteValidator;

impl NoteValidator {
    /// Note keys identify a schema entry; short, non-empty, no stray
    /// whitespace.
    pub fn validate_key(key: &str) -> Result<()> {
        let trimmed = key.trim();
        if trimmed.is_empty() {
            return Err(OrchestratorError::empty_field("key"));
        }
        if trimmed.chars().count() > 64 {
            return Err(OrchestratorError::Validation(
                "note key must be at most 64 characters long".to_string(),
            ));
        }
        Ok(())
    }

    /// Bodies may be empty (an unfilled required note is a gate failure, not
    /// a validation error) but are capped to guard against runaway payloads.
    pub fn validate_body(body: &str) -> Result<()> {
        if body.chars().count() > 20_000 {
            return Err(OrchestratorError::Validation(
                "note body must be at most 20000 characters long".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Kind, Priority};

    fn new_item(title: &str) -> NewWorkItem {
        NewWorkItem {
            parent_id: None,
            kind: Kind::Task,
            title: title.to_string(),
            summary: None,
            description: None,
            status: "pending".to_string(),
            priority: Priority::Medium,
            complexity: None,
            tags: Vec::new(),
            requires_verification: false,
        }
    }

    #[test]
    fn empty_title_is_rejected() {
        assert!(ItemValidator::validate_title("").is_err());
        assert!(ItemValidator::validate_title("   ").is_err());
    }

    #[test]
    fn oversized_title_is_rejected() {
        assert!(ItemValidator::validate_title(&"a".repeat(201)).is_err());
    }

    #[test]
    fn tags_must_be_normalized_form() {
        assert!(ItemValidator::validate_tags(&["task-impl".to_string()]).is_ok());
        assert!(ItemValidator::validate_tags(&["Task_Impl".to_string()]).is_err());
    }

    #[test]
    fn complexity_out_of_range_is_rejected() {
        assert!(ItemValidator::validate_complexity(Some(0)).is_err());
        assert!(ItemValidator::validate_complexity(Some(6)).is_err());
        assert!(ItemValidator::validate_complexity(Some(3)).is_ok());
    }

    #[test]
    fn depth_beyond_max_is_rejected() {
        assert!(ItemValidator::validate_depth(Some(MAX_DEPTH)).is_err());
        assert_eq!(ItemValidator::validate_depth(Some(MAX_DEPTH - 1)).unwrap(), MAX_DEPTH);
        assert_eq!(ItemValidator::validate_depth(None).unwrap(), 0);
    }

    #[test]
    fn valid_new_item_passes() {
        assert!(ItemValidator::validate_new_item(&new_item("Implement parser")).is_ok());
    }

    #[test]
    fn invalid_new_item_fails() {
        assert!(ItemValidator::validate_new_item(&new_item("")).is_err());
    }
}
