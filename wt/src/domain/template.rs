//! TemplateSet aggregate
//!
//! A TemplateSet owns its phases, disciplines, tasks, dependency edges and
//! presets. It is mutable while a draft and frozen once `is_active` is set by
//! a successful publish; later changes go into a new version.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;
use uuid::Uuid;
use wbsstore::{IndexValue, Record, now_ms};

use super::filter::ProjectionFilter;

/// Generate a fresh, time-ordered identifier
pub fn generate_id() -> String {
    Uuid::now_v7().to_string()
}

/// Visibility of a template set
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum TemplateScope {
    /// Shared by every tenant
    #[default]
    Global,
    /// Owned by a single tenant
    Tenant(String),
}

/// Construction stage grouping (e.g. concept, design)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Phase {
    pub id: String,
    pub set_id: String,
    pub code: String,
    pub name: String,
    pub order_index: i32,
}

/// Engineering trade grouping (e.g. architecture, MEP)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Discipline {
    pub id: String,
    pub set_id: String,
    pub code: String,
    pub name: String,
    #[serde(default)]
    pub color: Option<String>,
    pub order_index: i32,
}

/// A reusable unit of work
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateTask {
    pub id: String,
    pub set_id: String,
    pub phase_id: String,
    pub discipline_id: String,

    /// Unique within the set
    pub code: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub est_duration_days: u32,

    /// Symbolic role, resolved to an assignee at instantiation
    #[serde(default)]
    pub role_key: Option<String>,
    #[serde(default)]
    pub deliverable_type: Option<String>,
    pub order_index: i32,

    /// Informational only; does not affect projection
    #[serde(default)]
    pub is_optional: bool,
}

/// Directed edge: `task_id` may not start before `depends_on_task_id` completes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateTaskDependency {
    pub set_id: String,
    pub task_id: String,
    pub depends_on_task_id: String,
}

/// Named, stored projection filter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Preset {
    pub id: String,
    pub set_id: String,
    pub code: String,
    pub name: String,
    #[serde(default)]
    pub filters: ProjectionFilter,
}

/// Versioned WBS template aggregate
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateSet {
    /// Unique identifier of this version
    pub id: String,

    /// Stable key shared by every version
    pub code: String,

    pub name: String,

    /// Monotonic per code
    pub version: u32,

    /// Published flag; structural content is frozen once true
    pub is_active: bool,

    /// Shared across tenants (false means tenant-scoped)
    pub is_global: bool,

    #[serde(default)]
    pub tenant_id: Option<String>,

    /// Authoring actor
    pub created_by: String,

    #[serde(default)]
    pub phases: Vec<Phase>,
    #[serde(default)]
    pub disciplines: Vec<Discipline>,
    #[serde(default)]
    pub tasks: Vec<TemplateTask>,
    #[serde(default)]
    pub dependencies: Vec<TemplateTaskDependency>,
    #[serde(default)]
    pub presets: Vec<Preset>,

    /// Creation timestamp (Unix milliseconds)
    pub created_at: i64,

    /// Last update timestamp (Unix milliseconds)
    pub updated_at: i64,

    /// Publish timestamp (Unix milliseconds)
    #[serde(default)]
    pub published_at: Option<i64>,
}

impl TemplateSet {
    /// Create an empty draft
    pub fn new(
        code: impl Into<String>,
        name: impl Into<String>,
        version: u32,
        scope: TemplateScope,
        created_by: impl Into<String>,
    ) -> Self {
        let now = now_ms();
        let (is_global, tenant_id) = match scope {
            TemplateScope::Global => (true, None),
            TemplateScope::Tenant(tenant) => (false, Some(tenant)),
        };
        Self {
            id: generate_id(),
            code: code.into(),
            name: name.into(),
            version,
            is_active: false,
            is_global,
            tenant_id,
            created_by: created_by.into(),
            phases: Vec::new(),
            disciplines: Vec::new(),
            tasks: Vec::new(),
            dependencies: Vec::new(),
            presets: Vec::new(),
            created_at: now,
            updated_at: now,
            published_at: None,
        }
    }

    pub fn scope(&self) -> TemplateScope {
        match (&self.tenant_id, self.is_global) {
            (Some(tenant), false) => TemplateScope::Tenant(tenant.clone()),
            _ => TemplateScope::Global,
        }
    }

    /// Append a phase and return its id
    pub fn add_phase(&mut self, code: impl Into<String>, name: impl Into<String>, order_index: i32) -> String {
        let id = generate_id();
        self.phases.push(Phase {
            id: id.clone(),
            set_id: self.id.clone(),
            code: code.into(),
            name: name.into(),
            order_index,
        });
        id
    }

    /// Append a discipline and return its id
    pub fn add_discipline(
        &mut self,
        code: impl Into<String>,
        name: impl Into<String>,
        color: Option<String>,
        order_index: i32,
    ) -> String {
        let id = generate_id();
        self.disciplines.push(Discipline {
            id: id.clone(),
            set_id: self.id.clone(),
            code: code.into(),
            name: name.into(),
            color,
            order_index,
        });
        id
    }

    /// Append a task under the given phase and discipline ids; returns the task for further edits
    pub fn add_task(
        &mut self,
        phase_id: impl Into<String>,
        discipline_id: impl Into<String>,
        code: impl Into<String>,
        est_duration_days: u32,
    ) -> &mut TemplateTask {
        let code = code.into();
        let order_index = i32::try_from(self.tasks.len()).unwrap_or(i32::MAX);
        self.tasks.push(TemplateTask {
            id: generate_id(),
            set_id: self.id.clone(),
            phase_id: phase_id.into(),
            discipline_id: discipline_id.into(),
            name: code.clone(),
            code,
            description: None,
            est_duration_days,
            role_key: None,
            deliverable_type: None,
            order_index,
            is_optional: false,
        });
        let last = self.tasks.len() - 1;
        &mut self.tasks[last]
    }

    /// Add a dependency edge between two task ids
    pub fn add_dependency(&mut self, task_id: impl Into<String>, depends_on_task_id: impl Into<String>) {
        self.dependencies.push(TemplateTaskDependency {
            set_id: self.id.clone(),
            task_id: task_id.into(),
            depends_on_task_id: depends_on_task_id.into(),
        });
    }

    /// Add a dependency edge by task codes; unknown codes are kept as raw references
    pub fn add_dependency_by_code(&mut self, task_code: &str, depends_on_code: &str) {
        let task_id = self
            .task_by_code(task_code)
            .map_or_else(|| task_code.to_string(), |t| t.id.clone());
        let depends_on_id = self
            .task_by_code(depends_on_code)
            .map_or_else(|| depends_on_code.to_string(), |t| t.id.clone());
        self.add_dependency(task_id, depends_on_id);
    }

    /// Append a preset and return its id
    pub fn add_preset(&mut self, code: impl Into<String>, name: impl Into<String>, filters: ProjectionFilter) -> String {
        let id = generate_id();
        self.presets.push(Preset {
            id: id.clone(),
            set_id: self.id.clone(),
            code: code.into(),
            name: name.into(),
            filters,
        });
        id
    }

    pub fn task_by_code(&self, code: &str) -> Option<&TemplateTask> {
        self.tasks.iter().find(|t| t.code == code)
    }

    pub fn task(&self, id: &str) -> Option<&TemplateTask> {
        self.tasks.iter().find(|t| t.id == id)
    }

    pub fn phase(&self, id: &str) -> Option<&Phase> {
        self.phases.iter().find(|p| p.id == id)
    }

    pub fn phase_by_code(&self, code: &str) -> Option<&Phase> {
        self.phases.iter().find(|p| p.code == code)
    }

    pub fn discipline(&self, id: &str) -> Option<&Discipline> {
        self.disciplines.iter().find(|d| d.id == id)
    }

    pub fn discipline_by_code(&self, code: &str) -> Option<&Discipline> {
        self.disciplines.iter().find(|d| d.code == code)
    }

    pub fn preset(&self, code: &str) -> Option<&Preset> {
        self.presets.iter().find(|p| p.code == code)
    }

    /// Check if the set is published (and therefore immutable)
    pub fn is_published(&self) -> bool {
        self.is_active
    }

    /// Mark published; the caller is responsible for validation
    pub fn mark_published(&mut self) {
        debug!(code = %self.code, version = self.version, "mark_published: called");
        let now = now_ms().max(self.updated_at + 1);
        self.is_active = true;
        self.published_at = Some(now);
        self.updated_at = now;
    }

    /// Refresh the update stamp after a draft edit
    pub fn touch(&mut self) {
        self.updated_at = now_ms().max(self.updated_at + 1);
    }
}

impl Record for TemplateSet {
    fn id(&self) -> &str {
        &self.id
    }

    fn updated_at(&self) -> i64 {
        self.updated_at
    }

    fn collection_name() -> &'static str {
        "template_sets"
    }

    fn indexed_fields(&self) -> HashMap<String, IndexValue> {
        let mut fields = HashMap::new();
        fields.insert("code".to_string(), IndexValue::String(self.code.clone()));
        fields.insert("version".to_string(), IndexValue::Int(i64::from(self.version)));
        fields.insert("is_active".to_string(), IndexValue::Bool(self.is_active));
        fields.insert("is_global".to_string(), IndexValue::Bool(self.is_global));
        if let Some(tenant) = &self.tenant_id {
            fields.insert("tenant_id".to_string(), IndexValue::String(tenant.clone()));
        }
        fields
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_set() -> TemplateSet {
        let mut set = TemplateSet::new("HOUSE", "House", 1, TemplateScope::Global, "author-1");
        let concept = set.add_phase("C", "Concept", 1);
        let arc = set.add_discipline("ARC", "Architecture", Some("#336699".to_string()), 1);
        set.add_task(concept.clone(), arc.clone(), "ARC-C01", 3);
        set.add_task(concept, arc, "ARC-C02", 5).role_key = Some("architect".to_string());
        set.add_dependency_by_code("ARC-C02", "ARC-C01");
        set
    }

    #[test]
    fn test_new_draft() {
        let set = TemplateSet::new("HOUSE", "House", 1, TemplateScope::Tenant("t-1".to_string()), "author-1");
        assert!(!set.is_published());
        assert!(!set.is_global);
        assert_eq!(set.tenant_id.as_deref(), Some("t-1"));
        assert_eq!(set.scope(), TemplateScope::Tenant("t-1".to_string()));
    }

    #[test]
    fn test_builders_link_to_set() {
        let set = small_set();
        assert!(set.tasks.iter().all(|t| t.set_id == set.id));
        assert_eq!(set.tasks[1].order_index, 1);
        assert_eq!(set.tasks[1].role_key.as_deref(), Some("architect"));

        let edge = &set.dependencies[0];
        assert_eq!(edge.task_id, set.task_by_code("ARC-C02").unwrap().id);
        assert_eq!(edge.depends_on_task_id, set.task_by_code("ARC-C01").unwrap().id);
    }

    #[test]
    fn test_dependency_by_unknown_code_keeps_raw_reference() {
        let mut set = small_set();
        set.add_dependency_by_code("ARC-C02", "NOPE");
        assert_eq!(set.dependencies[1].depends_on_task_id, "NOPE");
    }

    #[test]
    fn test_mark_published_advances_stamp() {
        let mut set = small_set();
        let before = set.updated_at;
        set.mark_published();
        assert!(set.is_published());
        assert!(set.updated_at > before);
        assert_eq!(set.published_at, Some(set.updated_at));
    }

    #[test]
    fn test_indexed_fields() {
        let set = small_set();
        let fields = set.indexed_fields();
        assert_eq!(fields.get("code"), Some(&IndexValue::String("HOUSE".to_string())));
        assert_eq!(fields.get("version"), Some(&IndexValue::Int(1)));
        assert_eq!(fields.get("is_active"), Some(&IndexValue::Bool(false)));
        assert!(!fields.contains_key("tenant_id"));
    }
}
