//! Template definition exchange format
//!
//! The nested, code-keyed document used to author and exchange template sets:
//!
//! ```yaml
//! set: { code: HOUSE, name: Single family house, version: 1 }
//! phases:
//!   - { code: C, name: Concept, order_index: 1 }
//! disciplines:
//!   - { code: ARC, name: Architecture, color: "#336699", order_index: 1 }
//! tasks:
//!   - { code: ARC-C01, phase_code: C, discipline_code: ARC, est_duration_days: 3 }
//! dependencies:
//!   - { task_code: ARC-C02, depends_on_code: ARC-C01 }
//! presets:
//!   - { code: HOUSE, name: House, filters: { disciplines: [ARC, MEP], exclude: [LND-PANO] } }
//! ```
//!
//! Conversion assigns ids and resolves codes. Dependencies on unknown task
//! codes are carried through as raw references so that validation reports
//! them as dangling edges.

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use tracing::debug;

use crate::domain::{ProjectionFilter, TemplateScope, TemplateSet};
use crate::error::{CodeKind, DefinitionError};

fn default_version() -> u32 {
    1
}

/// Set header
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetHeader {
    pub code: String,
    pub name: String,
    #[serde(default = "default_version")]
    pub version: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseDef {
    pub code: String,
    pub name: String,
    pub order_index: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisciplineDef {
    pub code: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    pub order_index: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskDef {
    pub code: String,
    /// Defaults to the code
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub phase_code: String,
    pub discipline_code: String,
    #[serde(default)]
    pub est_duration_days: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deliverable_type: Option<String>,
    #[serde(default)]
    pub order_index: i32,
    #[serde(default)]
    pub is_optional: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyDef {
    pub task_code: String,
    pub depends_on_code: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresetDef {
    pub code: String,
    pub name: String,
    #[serde(default)]
    pub filters: ProjectionFilter,
}

/// Complete exchange document for one template set version
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateDefinition {
    pub set: SetHeader,
    #[serde(default)]
    pub phases: Vec<PhaseDef>,
    #[serde(default)]
    pub disciplines: Vec<DisciplineDef>,
    #[serde(default)]
    pub tasks: Vec<TaskDef>,
    #[serde(default)]
    pub dependencies: Vec<DependencyDef>,
    #[serde(default)]
    pub presets: Vec<PresetDef>,
}

impl TemplateDefinition {
    /// Load from a file; `.json` is parsed as JSON, anything else as YAML
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        debug!(path = %path.display(), "load: called");
        let content =
            fs::read_to_string(path).context(format!("Failed to read template definition {}", path.display()))?;
        let is_json = path.extension().is_some_and(|e| e.eq_ignore_ascii_case("json"));
        let definition = if is_json {
            Self::from_json_str(&content)
        } else {
            Self::from_yaml_str(&content)
        };
        definition.context(format!("Invalid template definition {}", path.display()))
    }

    pub fn from_yaml_str(content: &str) -> Result<Self, DefinitionError> {
        serde_yaml::from_str(content).map_err(|e| DefinitionError::Parse(e.to_string()))
    }

    pub fn from_json_str(content: &str) -> Result<Self, DefinitionError> {
        serde_json::from_str(content).map_err(|e| DefinitionError::Parse(e.to_string()))
    }

    pub fn to_yaml(&self) -> Result<String, DefinitionError> {
        serde_yaml::to_string(self).map_err(|e| DefinitionError::Parse(e.to_string()))
    }

    pub fn to_json(&self) -> Result<String, DefinitionError> {
        serde_json::to_string_pretty(self).map_err(|e| DefinitionError::Parse(e.to_string()))
    }

    /// Build a draft TemplateSet with fresh ids
    pub fn into_template_set(
        self,
        scope: TemplateScope,
        created_by: impl Into<String>,
    ) -> Result<TemplateSet, DefinitionError> {
        debug!(code = %self.set.code, version = self.set.version, "into_template_set: called");
        check_unique(CodeKind::Phase, self.phases.iter().map(|p| p.code.as_str()))?;
        check_unique(CodeKind::Discipline, self.disciplines.iter().map(|d| d.code.as_str()))?;
        check_unique(CodeKind::Task, self.tasks.iter().map(|t| t.code.as_str()))?;
        check_unique(CodeKind::Preset, self.presets.iter().map(|p| p.code.as_str()))?;

        let mut set = TemplateSet::new(self.set.code, self.set.name, self.set.version, scope, created_by);

        for phase in self.phases {
            set.add_phase(phase.code, phase.name, phase.order_index);
        }
        for discipline in self.disciplines {
            set.add_discipline(discipline.code, discipline.name, discipline.color, discipline.order_index);
        }

        for task in self.tasks {
            let phase_id = set
                .phase_by_code(&task.phase_code)
                .map(|p| p.id.clone())
                .ok_or_else(|| DefinitionError::UnknownPhase {
                    task: task.code.clone(),
                    phase_code: task.phase_code.clone(),
                })?;
            let discipline_id = set
                .discipline_by_code(&task.discipline_code)
                .map(|d| d.id.clone())
                .ok_or_else(|| DefinitionError::UnknownDiscipline {
                    task: task.code.clone(),
                    discipline_code: task.discipline_code.clone(),
                })?;

            let created = set.add_task(phase_id, discipline_id, task.code.clone(), task.est_duration_days);
            created.name = task.name.unwrap_or(task.code);
            created.description = task.description;
            created.role_key = task.role_key;
            created.deliverable_type = task.deliverable_type;
            created.order_index = task.order_index;
            created.is_optional = task.is_optional;
        }

        for dep in self.dependencies {
            set.add_dependency_by_code(&dep.task_code, &dep.depends_on_code);
        }

        for preset in self.presets {
            set.add_preset(preset.code, preset.name, preset.filters);
        }

        Ok(set)
    }
}

fn check_unique<'a>(kind: CodeKind, codes: impl Iterator<Item = &'a str>) -> Result<(), DefinitionError> {
    let mut seen = HashSet::new();
    for code in codes {
        if !seen.insert(code) {
            return Err(DefinitionError::DuplicateCode {
                kind,
                code: code.to_string(),
            });
        }
    }
    Ok(())
}

impl TemplateSet {
    /// Export to the exchange format
    ///
    /// Edges whose endpoints are not tasks of this set are written with the raw reference.
    pub fn to_definition(&self) -> TemplateDefinition {
        let code_of = |id: &str| self.task(id).map_or_else(|| id.to_string(), |t| t.code.clone());
        let phase_code = |id: &str| self.phase(id).map_or_else(|| id.to_string(), |p| p.code.clone());
        let discipline_code = |id: &str| self.discipline(id).map_or_else(|| id.to_string(), |d| d.code.clone());

        TemplateDefinition {
            set: SetHeader {
                code: self.code.clone(),
                name: self.name.clone(),
                version: self.version,
            },
            phases: self
                .phases
                .iter()
                .map(|p| PhaseDef {
                    code: p.code.clone(),
                    name: p.name.clone(),
                    order_index: p.order_index,
                })
                .collect(),
            disciplines: self
                .disciplines
                .iter()
                .map(|d| DisciplineDef {
                    code: d.code.clone(),
                    name: d.name.clone(),
                    color: d.color.clone(),
                    order_index: d.order_index,
                })
                .collect(),
            tasks: self
                .tasks
                .iter()
                .map(|t| TaskDef {
                    code: t.code.clone(),
                    name: Some(t.name.clone()),
                    description: t.description.clone(),
                    phase_code: phase_code(&t.phase_id),
                    discipline_code: discipline_code(&t.discipline_id),
                    est_duration_days: t.est_duration_days,
                    role_key: t.role_key.clone(),
                    deliverable_type: t.deliverable_type.clone(),
                    order_index: t.order_index,
                    is_optional: t.is_optional,
                })
                .collect(),
            dependencies: self
                .dependencies
                .iter()
                .map(|d| DependencyDef {
                    task_code: code_of(&d.task_id),
                    depends_on_code: code_of(&d.depends_on_task_id),
                })
                .collect(),
            presets: self
                .presets
                .iter()
                .map(|p| PresetDef {
                    code: p.code.clone(),
                    name: p.name.clone(),
                    filters: p.filters.clone(),
                })
                .collect(),
        }
    }

    /// Copy into a new draft version with fresh ids
    pub fn revise(&self, created_by: impl Into<String>) -> Result<TemplateSet, DefinitionError> {
        let mut definition = self.to_definition();
        definition.set.version = self
            .version
            .checked_add(1)
            .ok_or_else(|| DefinitionError::VersionOverflow {
                code: self.code.clone(),
                version: self.version,
            })?;
        definition.into_template_set(self.scope(), created_by)
    }
}
