//! Loads, caches, and validates the workflow definition: roles per tag,
//! status labels, cascade rules, note schemas. Mirrors the "shared snapshot
//! reference, atomic swap on reload" shape: readers take a cheap `Arc` clone,
//! a reload swaps the pointer under a short-lived write lock.

use crate::error::{OrchestratorError, Result};
use crate::models::{normalize, Kind, Role};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use std::time::{Duration, SystemTime};

/// Minimum interval between mtime rechecks, per the concurrency model.
pub const RECHECK_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NoteSpec {
    pub key: String,
    pub role: Role,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub guidance: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct FlowMappingRaw {
    tags: Vec<String>,
    flow: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct ContainerFlowRaw {
    #[serde(default)]
    default_flow: Vec<String>,
    #[serde(default)]
    terminal_statuses: Vec<String>,
    #[serde(default)]
    emergency_transitions: Vec<String>,
    #[serde(default)]
    flow_mappings: Vec<FlowMappingRaw>,
    #[serde(flatten)]
    named_flows: HashMap<String, serde_yaml::Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct CascadeRuleRaw {
    from: String,
    to: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct FlowOverridesRaw {
    #[serde(default)]
    event_overrides: HashMap<String, CascadeRuleRaw>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct CompletionCleanupRaw {
    #[serde(default)]
    enabled: bool,
    #[serde(default)]
    retain_tags: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct RawConfig {
    #[serde(default)]
    status_progression: HashMap<String, ContainerFlowRaw>,
    #[serde(default)]
    note_schemas: HashMap<String, Vec<NoteSpec>>,
    #[serde(default)]
    completion_cleanup: CompletionCleanupRaw,
    #[serde(default)]
    cascade_rules: HashMap<String, CascadeRuleRaw>,
    #[serde(default)]
    flows: HashMap<String, FlowOverridesRaw>,
}

#[derive(Debug, Clone)]
pub struct CascadeRule {
    pub from: String,
    pub to: String,
}

#[derive(Debug, Clone)]
struct ContainerFlows {
    flows: HashMap<String, Vec<String>>,
    default_flow: String,
    terminal_statuses: HashSet<String>,
    emergency_transitions: HashSet<String>,
    flow_mappings: Vec<(Vec<String>, String)>,
}

#[derive(Debug, Clone)]
pub struct CompletionCleanup {
    pub enabled: bool,
    pub retain_tags: HashSet<String>,
}

/// The parsed, normalized snapshot handed out to readers.
#[derive(Debug, Clone)]
pub struct WorkflowConfigData {
    containers: HashMap<Kind, ContainerFlows>,
    note_schemas: HashMap<String, Vec<NoteSpec>>,
    pub completion_cleanup: CompletionCleanup,
    global_cascade_rules: HashMap<String, CascadeRule>,
    flow_overrides: HashMap<String, HashMap<String, CascadeRule>>,
}

const DEFAULT_FLOW_NAME: &str = "default";

impl WorkflowConfigData {
    /// Hardcoded fallback used when no config file is present.
    pub fn defaults() -> Self {
        let mut containers = HashMap::new();

        let task_flows = ContainerFlows {
            flows: HashMap::from([(
                DEFAULT_FLOW_NAME.to_string(),
                vec!["pending".to_string(), "in-progress".to_string(), "testing".to_string()],
            )]),
            default_flow: DEFAULT_FLOW_NAME.to_string(),
            terminal_statuses: HashSet::from(["completed".to_string(), "cancelled".to_string()]),
            emergency_transitions: HashSet::from(["blocked".to_string(), "on-hold".to_string()]),
            flow_mappings: Vec::new(),
        };
        containers.insert(Kind::Task, task_flows);

        let feature_flows = ContainerFlows {
            flows: HashMap::from([(
                DEFAULT_FLOW_NAME.to_string(),
                vec!["pending".to_string(), "in-development".to_string(), "testing".to_string()],
            )]),
            default_flow: DEFAULT_FLOW_NAME.to_string(),
            terminal_statuses: HashSet::from(["completed".to_string(), "archived".to_string()]),
            emergency_transitions: HashSet::from(["blocked".to_string(), "on-hold".to_string()]),
            flow_mappings: Vec::new(),
        };
        containers.insert(Kind::Feature, feature_flows.clone());
        containers.insert(Kind::Project, feature_flows);

        Self {
            containers,
            note_schemas: HashMap::new(),
            completion_cleanup: CompletionCleanup {
                enabled: false,
                retain_tags: HashSet::new(),
            },
            global_cascade_rules: HashMap::new(),
            flow_overrides: HashMap::new(),
        }
    }

    fn from_raw(raw: RawConfig) -> Result<Self> {
        let mut containers = HashMap::new();
        for (kind_name, raw_flow) in raw.status_progression {
            let kind = parse_kind(&kind_name)?;

            let mut flows = HashMap::new();
            flows.insert(
                DEFAULT_FLOW_NAME.to_string(),
                raw_flow.default_flow.iter().map(|s| normalize(s)).collect(),
            );
            for (key, value) in &raw_flow.named_flows {
                if let Some(name) = key.strip_suffix("_flow") {
                    if let Ok(list) = serde_yaml::from_value::<Vec<String>>(value.clone()) {
                        flows.insert(name.to_string(), list.iter().map(|s| normalize(s)).collect());
                    }
                }
            }

            containers.insert(
                kind,
                ContainerFlows {
                    flows,
                    default_flow: DEFAULT_FLOW_NAME.to_string(),
                    terminal_statuses: raw_flow
                        .terminal_statuses
                        .iter()
                        .map(|s| normalize(s))
                        .collect(),
                    emergency_transitions: raw_flow
                        .emergency_transitions
                        .iter()
                        .map(|s| normalize(s))
                        .collect(),
                    flow_mappings: raw_flow
                        .flow_mappings
                        .into_iter()
                        .map(|m| (m.tags.iter().map(|t| normalize(t)).collect(), m.flow))
                        .collect(),
                },
            );
        }

        let note_schemas = raw
            .note_schemas
            .into_iter()
            .map(|(k, v)| (normalize(&k), v))
            .collect();

        let global_cascade_rules = raw
            .cascade_rules
            .into_iter()
            .map(|(event, rule)| {
                (
                    event,
                    CascadeRule {
                        from: normalize(&rule.from),
                        to: normalize(&rule.to),
                    },
                )
            })
            .collect();

        let flow_overrides = raw
            .flows
            .into_iter()
            .map(|(flow_name, overrides)| {
                let events = overrides
                    .event_overrides
                    .into_iter()
                    .map(|(event, rule)| {
                        (
                            event,
                            CascadeRule {
                                from: normalize(&rule.from),
                                to: normalize(&rule.to),
                            },
                        )
                    })
                    .collect();
                (flow_name, events)
            })
            .collect();

        Ok(Self {
            containers,
            note_schemas,
            completion_cleanup: CompletionCleanup {
                enabled: raw.completion_cleanup.enabled,
                retain_tags: raw
                    .completion_cleanup
                    .retain_tags
                    .iter()
                    .map(|s| normalize(s))
                    .collect(),
            },
            global_cascade_rules,
            flow_overrides,
        })
    }

    fn container(&self, kind: Kind) -> Option<&ContainerFlows> {
        self.containers.get(&kind)
    }

    pub fn flow_for_tags(&self, tags: &[String], kind: Kind) -> String {
        let Some(container) = self.container(kind) else {
            return DEFAULT_FLOW_NAME.to_string();
        };
        let normalized: HashSet<String> = tags.iter().map(|t| normalize(t)).collect();
        for (mapping_tags, flow) in &container.flow_mappings {
            if mapping_tags.iter().any(|t| normalized.contains(t)) {
                return flow.clone();
            }
        }
        container.default_flow.clone()
    }

    pub fn statuses_for_flow(&self, kind: Kind, flow_name: &str) -> Vec<String> {
        self.container(kind)
            .and_then(|c| c.flows.get(flow_name))
            .cloned()
            .unwrap_or_default()
    }

    pub fn terminal_statuses(&self, kind: Kind) -> HashSet<String> {
        self.container(kind)
            .map(|c| c.terminal_statuses.clone())
            .unwrap_or_default()
    }

    fn emergency_statuses(&self, kind: Kind) -> HashSet<String> {
        self.container(kind)
            .map(|c| c.emergency_transitions.clone())
            .unwrap_or_default()
    }

    pub fn note_schema_for_tags(&self, tags: &[String]) -> Vec<NoteSpec> {
        for tag in tags {
            let key = normalize(tag);
            if let Some(specs) = self.note_schemas.get(&key) {
                return specs.clone();
            }
        }
        Vec::new()
    }

    /// Returns a rewrite rule for `event` under `flow_name`, preferring a
    /// per-flow override over the global table.
    pub fn cascade_rule(&self, event: &str, flow_name: &str) -> Option<CascadeRule> {
        if let Some(overrides) = self.flow_overrides.get(flow_name) {
            if let Some(rule) = overrides.get(event) {
                return Some(rule.clone());
            }
        }
        self.global_cascade_rules.get(event).cloned()
    }

    /// Maps a status label to its semantic role, derived from the status's
    /// position in the flow rather than a hardcoded table: index 0 is QUEUE,
    /// index 1 is WORK, any later index is REVIEW. A flow shorter than 2
    /// entries has no WORK phase; shorter than 3 has no REVIEW phase.
    pub fn role_for_status(&self, status: &str, kind: Kind, flow_name: &str) -> Role {
        let status = normalize(status);
        if self.terminal_statuses(kind).contains(&status) {
            return Role::Terminal;
        }
        if self.emergency_statuses(kind).contains(&status) {
            return Role::Blocked;
        }
        let flow = self.statuses_for_flow(kind, flow_name);
        match flow.iter().position(|s| s == &status) {
            Some(0) => Role::Queue,
            Some(1) => Role::Work,
            Some(_) => Role::Review,
            None => Role::Queue,
        }
    }

    pub fn has_work_phase(&self, kind: Kind, flow_name: &str) -> bool {
        self.statuses_for_flow(kind, flow_name).len() >= 2
    }

    pub fn has_review_phase(&self, kind: Kind, flow_name: &str) -> bool {
        self.statuses_for_flow(kind, flow_name).len() >= 3
    }

    /// First status in the flow whose role is `role`, used to synthesize a
    /// status label when the RoleMachine advances an item's role.
    pub fn status_for_role(&self, role: Role, kind: Kind, flow_name: &str) -> Option<String> {
        match role {
            Role::Terminal => self.terminal_statuses(kind).into_iter().next(),
            Role::Blocked => self.emergency_statuses(kind).into_iter().next(),
            _ => {
                let flow = self.statuses_for_flow(kind, flow_name);
                let index = match role {
                    Role::Queue => 0,
                    Role::Work => 1,
                    Role::Review => 2,
                    _ => unreachable!(),
                };
                flow.get(index).cloned()
            }
        }
    }
}

fn parse_kind(raw: &str) -> Result<Kind> {
    match raw {
        "tasks" | "task" => Ok(Kind::Task),
        "features" | "feature" => Ok(Kind::Feature),
        "projects" | "project" => Ok(Kind::Project),
        other => Err(OrchestratorError::Validation(format!(
            "unknown container type in workflow config: '{other}'"
        ))),
    }
}

/// Owns the cached snapshot and the reload policy. Cheap to clone: readers
/// call `snapshot()` and hold the returned `Arc` for the duration of one
/// operation.
pub struct WorkflowConfig {
    path: Option<PathBuf>,
    data: RwLock<Arc<WorkflowConfigData>>,
    last_mtime: RwLock<Option<SystemTime>>,
    last_checked: RwLock<Option<DateTime<Utc>>>,
}

impl WorkflowConfig {
    /// Loads from `<config_root>/.taskorchestrator/config.yaml`, falling back
    /// to hardcoded defaults if the file is absent or fails to parse (the
    /// previous config, or the defaults on first load, remain active).
    pub fn load(config_root: &Path) -> Self {
        let path = config_root.join(".taskorchestrator").join("config.yaml");
        let data = Self::read_file(&path).unwrap_or_else(|| Arc::new(WorkflowConfigData::defaults()));
        let mtime = std::fs::metadata(&path).ok().and_then(|m| m.modified().ok());
        Self {
            path: Some(path),
            data: RwLock::new(data),
            last_mtime: RwLock::new(mtime),
            last_checked: RwLock::new(Some(Utc::now())),
        }
    }

    pub fn in_memory(data: WorkflowConfigData) -> Self {
        Self {
            path: None,
            data: RwLock::new(Arc::new(data)),
            last_mtime: RwLock::new(None),
            last_checked: RwLock::new(None),
        }
    }

    fn read_file(path: &Path) -> Option<Arc<WorkflowConfigData>> {
        let contents = std::fs::read_to_string(path).ok()?;
        let raw: RawConfig = serde_yaml::from_str(&contents)
            .map_err(|e| tracing::warn!(error = %e, "failed to parse workflow config, keeping previous"))
            .ok()?;
        WorkflowConfigData::from_raw(raw)
            .map_err(|e| tracing::warn!(error = %e, "invalid workflow config, keeping previous"))
            .ok()
            .map(Arc::new)
    }

    /// Returns the current snapshot, reloading from disk if the backing
    /// file's mtime has advanced and at least `RECHECK_INTERVAL` has passed
    /// since the last check.
    pub fn snapshot(&self) -> Arc<WorkflowConfigData> {
        let Some(path) = &self.path else {
            return self.data.read().unwrap().clone();
        };

        let should_check = {
            let last = *self.last_checked.read().unwrap();
            match last {
                Some(t) => Utc::now() - t >= chrono::Duration::from_std(RECHECK_INTERVAL).unwrap(),
                None => true,
            }
        };

        if should_check {
            *self.last_checked.write().unwrap() = Some(Utc::now());
            let current_mtime = std::fs::metadata(path).ok().and_then(|m| m.modified().ok());
            let advanced = match (current_mtime, *self.last_mtime.read().unwrap()) {
                (Some(current), Some(prev)) => current > prev,
                (Some(_), None) => true,
                _ => false,
            };
            if advanced {
                if let Some(fresh) = Self::read_file(path) {
                    *self.data.write().unwrap() = fresh;
                    *self.last_mtime.write().unwrap() = current_mtime;
                }
            }
        }

        self.data.read().unwrap().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_map_task_statuses_to_roles() {
        let data = WorkflowConfigData::defaults();
        assert_eq!(data.role_for_status("pending", Kind::Task, "default"), Role::Queue);
        assert_eq!(data.role_for_status("in-progress", Kind::Task, "default"), Role::Work);
        assert_eq!(data.role_for_status("testing", Kind::Task, "default"), Role::Review);
        assert_eq!(data.role_for_status("completed", Kind::Task, "default"), Role::Terminal);
        assert_eq!(data.role_for_status("cancelled", Kind::Task, "default"), Role::Terminal);
        assert_eq!(data.role_for_status("blocked", Kind::Task, "default"), Role::Blocked);
    }

    #[test]
    fn flow_mapping_picks_override_flow() {
        let yaml = r#"
status_progression:
  tasks:
    default_flow: [pending, in-progress, testing]
    quick_flow: [pending, in-progress]
    terminal_statuses: [completed, cancelled]
    emergency_transitions: [blocked]
    flow_mappings:
      - tags: [quick]
        flow: quick
"#;
        let raw: RawConfig = serde_yaml::from_str(yaml).unwrap();
        let data = WorkflowConfigData::from_raw(raw).unwrap();
        let flow = data.flow_for_tags(&["quick".to_string()], Kind::Task);
        assert_eq!(flow, "quick");
        assert!(!data.has_review_phase(Kind::Task, &flow));
        assert!(data.has_review_phase(Kind::Task, "default"));
    }

    #[test]
    fn cascade_rule_prefers_flow_override() {
        let yaml = r#"
status_progression:
  features:
    default_flow: [pending, in-development, testing]
    terminal_statuses: [completed]
cascade_rules:
  all_tasks_complete:
    from: in-development
    to: testing
flows:
  default:
    event_overrides:
      all_tasks_complete:
        from: pending
        to: in-development
"#;
        let raw: RawConfig = serde_yaml::from_str(yaml).unwrap();
        let data = WorkflowConfigData::from_raw(raw).unwrap();
        let rule = data.cascade_rule("all_tasks_complete", "default").unwrap();
        assert_eq!(rule.from, "pending");
        let fallback = data.cascade_rule("all_tasks_complete", "other-flow").unwrap();
        assert_eq!(fallback.from, "in-development");
    }

    #[test]
    fn note_schema_matches_first_tag() {
        let yaml = r#"
note_schemas:
  task-impl:
    - key: requirements
      role: QUEUE
      required: true
"#;
        let raw: RawConfig = serde_yaml::from_str(yaml).unwrap();
        let data = WorkflowConfigData::from_raw(raw).unwrap();
        let specs = data.note_schema_for_tags(&["other".to_string(), "task-impl".to_string()]);
        assert_eq!(specs.len(), 1);
        assert_eq!(specs[0].key, "requirements");
    }
}
