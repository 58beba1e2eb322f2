//! Projection of a template set through a filter

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, info};

use super::closure;
use crate::domain::{ClosurePolicy, ProjectionFilter, Selection, TemplateSet};
use crate::error::{ProjectionError, StructuralError, UnresolvedDependency};
use crate::graph::{TaskGraph, check_groupings};

/// A template task selected by a projection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectedTask {
    pub code: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub phase_code: String,
    pub discipline_code: String,
    pub est_duration_days: u32,
    #[serde(default)]
    pub role_key: Option<String>,
    #[serde(default)]
    pub deliverable_type: Option<String>,
    pub order_index: i32,
    pub is_optional: bool,

    /// Codes of the projected tasks this one waits for, sorted
    pub depends_on: Vec<String>,
}

/// Ordered, dependency-closed task list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Projection {
    pub set_id: String,
    pub set_code: String,
    pub version: u32,
    pub policy: ClosurePolicy,

    /// Topological order, dependencies first
    pub tasks: Vec<ProjectedTask>,

    /// Codes pulled in by Expand that the filter did not select
    pub added_by_closure: Vec<String>,
}

impl Projection {
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn codes(&self) -> Vec<&str> {
        self.tasks.iter().map(|t| t.code.as_str()).collect()
    }

    pub fn task(&self, code: &str) -> Option<&ProjectedTask> {
        self.tasks.iter().find(|t| t.code == code)
    }

    pub fn position(&self, code: &str) -> Option<usize> {
        self.tasks.iter().position(|t| t.code == code)
    }
}

/// Project through a stored preset or an ad-hoc filter
pub fn project_selection(
    set: &TemplateSet,
    selection: &Selection,
    policy: ClosurePolicy,
) -> Result<Projection, ProjectionError> {
    match selection {
        Selection::Preset(code) => {
            let preset = set
                .preset(code)
                .ok_or_else(|| ProjectionError::UnknownPresetCode(code.clone()))?;
            debug!(preset = %code, "project_selection: resolved preset");
            project(set, &preset.filters, policy)
        }
        Selection::Filter(filters) => project(set, filters, policy),
    }
}

/// Project a template set through `filters` under `policy`
///
/// Tasks are included when their phase and discipline pass the allow-lists
/// and their code is not excluded. Dependencies leaving the selection are
/// then handled by the closure policy. The result is topologically sorted
/// with ties broken by (phase order, discipline order, task order, code).
pub fn project(
    set: &TemplateSet,
    filters: &ProjectionFilter,
    policy: ClosurePolicy,
) -> Result<Projection, ProjectionError> {
    debug!(code = %set.code, version = set.version, ?filters, %policy, "project: called");

    let graph = TaskGraph::build(set)?;
    check_groupings(set)?;
    if let Some(cycle) = graph.find_cycle() {
        return Err(StructuralError::CycleDetected {
            path: cycle.iter().map(|&i| set.tasks[i].code.clone()).collect(),
        }
        .into());
    }

    let lookup = GroupLookup::new(set);
    let mut included: Vec<bool> = set
        .tasks
        .iter()
        .map(|t| filters.matches(lookup.phase_code(&t.phase_id), lookup.discipline_code(&t.discipline_id), &t.code))
        .collect();

    if !included.iter().any(|&i| i) {
        debug!("project: filters selected nothing");
        return Err(ProjectionError::EmptyProjection);
    }

    let added = closure::close(&graph, &mut included, policy).map_err(|boundary| {
        let mut unresolved: Vec<UnresolvedDependency> = boundary
            .into_iter()
            .map(|(task, dep)| UnresolvedDependency {
                task: set.tasks[task].code.clone(),
                missing_dependency: set.tasks[dep].code.clone(),
            })
            .collect();
        unresolved.sort();
        debug!(count = unresolved.len(), "project: unresolved dependencies under strict");
        ProjectionError::UnresolvedDependencies(unresolved)
    })?;

    let rank = tie_break_rank(set, &lookup);
    let order = graph.topological_order(&included, &rank);

    let tasks: Vec<ProjectedTask> = order
        .iter()
        .map(|&i| {
            let task = &set.tasks[i];
            let mut depends_on: Vec<String> = graph
                .deps(i)
                .iter()
                .filter(|&&d| included[d])
                .map(|&d| set.tasks[d].code.clone())
                .collect();
            depends_on.sort();
            ProjectedTask {
                code: task.code.clone(),
                name: task.name.clone(),
                description: task.description.clone(),
                phase_code: lookup.phase_code(&task.phase_id).to_string(),
                discipline_code: lookup.discipline_code(&task.discipline_id).to_string(),
                est_duration_days: task.est_duration_days,
                role_key: task.role_key.clone(),
                deliverable_type: task.deliverable_type.clone(),
                order_index: task.order_index,
                is_optional: task.is_optional,
                depends_on,
            }
        })
        .collect();

    let mut added_ranked: Vec<usize> = added;
    added_ranked.sort_by_key(|&i| order.iter().position(|&o| o == i));
    let added_by_closure = added_ranked.iter().map(|&i| set.tasks[i].code.clone()).collect();

    info!(
        code = %set.code,
        version = set.version,
        %policy,
        tasks = tasks.len(),
        "Projection computed"
    );

    Ok(Projection {
        set_id: set.id.clone(),
        set_code: set.code.clone(),
        version: set.version,
        policy,
        tasks,
        added_by_closure,
    })
}

/// Phase/discipline code and order lookups by id
struct GroupLookup<'a> {
    phases: HashMap<&'a str, (&'a str, i32)>,
    disciplines: HashMap<&'a str, (&'a str, i32)>,
}

impl<'a> GroupLookup<'a> {
    fn new(set: &'a TemplateSet) -> Self {
        Self {
            phases: set
                .phases
                .iter()
                .map(|p| (p.id.as_str(), (p.code.as_str(), p.order_index)))
                .collect(),
            disciplines: set
                .disciplines
                .iter()
                .map(|d| (d.id.as_str(), (d.code.as_str(), d.order_index)))
                .collect(),
        }
    }

    // Groupings are checked before lookups, so misses only happen on unchecked input
    fn phase_code(&self, id: &str) -> &'a str {
        self.phases.get(id).map_or("", |p| p.0)
    }

    fn discipline_code(&self, id: &str) -> &'a str {
        self.disciplines.get(id).map_or("", |d| d.0)
    }

    fn phase_order(&self, id: &str) -> i32 {
        self.phases.get(id).map_or(i32::MAX, |p| p.1)
    }

    fn discipline_order(&self, id: &str) -> i32 {
        self.disciplines.get(id).map_or(i32::MAX, |d| d.1)
    }
}

/// Rank of every task under (phase order, discipline order, task order, code)
fn tie_break_rank(set: &TemplateSet, lookup: &GroupLookup<'_>) -> Vec<usize> {
    let mut by_key: Vec<usize> = (0..set.tasks.len()).collect();
    by_key.sort_by(|&a, &b| {
        let (ta, tb) = (&set.tasks[a], &set.tasks[b]);
        (
            lookup.phase_order(&ta.phase_id),
            lookup.discipline_order(&ta.discipline_id),
            ta.order_index,
            ta.code.as_str(),
        )
            .cmp(&(
                lookup.phase_order(&tb.phase_id),
                lookup.discipline_order(&tb.discipline_id),
                tb.order_index,
                tb.code.as_str(),
            ))
    });

    let mut rank = vec![0; set.tasks.len()];
    for (position, &task) in by_key.iter().enumerate() {
        rank[task] = position;
    }
    rank
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::residential;

    fn unresolved(task: &str, dep: &str) -> UnresolvedDependency {
        UnresolvedDependency {
            task: task.to_string(),
            missing_dependency: dep.to_string(),
        }
    }

    #[test]
    fn test_house_preset_strict() {
        let set = residential();
        let projection = project_selection(&set, &Selection::preset("HOUSE"), ClosurePolicy::Strict).unwrap();

        assert_eq!(projection.codes(), vec!["ARC-C01", "ARC-C02", "MEP-C01", "ARC-D01"]);
        assert!(projection.task("LND-PANO").is_none());
        assert!(projection.added_by_closure.is_empty());
        assert_eq!(projection.policy, ClosurePolicy::Strict);
        assert_eq!(projection.version, 1);
        assert_eq!(projection.task("ARC-D01").unwrap().depends_on, vec!["ARC-C02".to_string()]);
    }

    #[test]
    fn test_excluded_dependency_fails_strict() {
        let set = residential();
        let err = project_selection(&set, &Selection::preset("ARC-NO-SURVEY"), ClosurePolicy::Strict).unwrap_err();
        assert_eq!(
            err,
            ProjectionError::UnresolvedDependencies(vec![unresolved("ARC-C02", "ARC-C01")])
        );
    }

    #[test]
    fn test_excluded_dependency_restored_by_expand() {
        let set = residential();
        let projection =
            project_selection(&set, &Selection::preset("ARC-NO-SURVEY"), ClosurePolicy::Expand).unwrap();
        assert_eq!(projection.codes(), vec!["ARC-C01", "ARC-C02", "ARC-D01"]);
        assert_eq!(projection.added_by_closure, vec!["ARC-C01".to_string()]);
    }

    #[test]
    fn test_expand_pulls_transitive_dependencies() {
        let set = residential();
        let projection = project_selection(&set, &Selection::preset("LANDSCAPE"), ClosurePolicy::Expand).unwrap();
        assert_eq!(projection.codes(), vec!["ARC-C01", "ARC-C02", "ARC-D01", "LND-PANO"]);
        assert_eq!(projection.added_by_closure, vec!["ARC-C01", "ARC-C02", "ARC-D01"]);
    }

    #[test]
    fn test_unknown_preset() {
        let set = residential();
        assert_eq!(
            project_selection(&set, &Selection::preset("MANSION"), ClosurePolicy::Strict),
            Err(ProjectionError::UnknownPresetCode("MANSION".to_string()))
        );
    }

    #[test]
    fn test_empty_projection() {
        let set = residential();
        let filters = ProjectionFilter::default().with_phases(["C"]).with_disciplines(["LND"]);
        assert_eq!(
            project(&set, &filters, ClosurePolicy::Expand),
            Err(ProjectionError::EmptyProjection)
        );
    }

    #[test]
    fn test_unrestricted_projection_includes_optional_tasks() {
        let set = residential();
        let projection = project(&set, &ProjectionFilter::unrestricted(), ClosurePolicy::Strict).unwrap();
        assert_eq!(projection.len(), 5);
        assert!(projection.task("LND-PANO").unwrap().is_optional);
        assert_eq!(projection.position("LND-PANO"), Some(4));
    }

    #[test]
    fn test_tie_break_uses_phase_then_discipline_then_order_then_code() {
        let mut set = residential();
        // Without dependencies order is purely the tie-break key
        set.dependencies.clear();
        let projection = project(&set, &ProjectionFilter::unrestricted(), ClosurePolicy::Strict).unwrap();
        assert_eq!(
            projection.codes(),
            vec!["ARC-C01", "ARC-C02", "MEP-C01", "ARC-D01", "LND-PANO"]
        );

        // Equal order_index falls back to code
        for task in &mut set.tasks {
            task.order_index = 0;
        }
        let discipline = set.tasks[0].discipline_id.clone();
        set.tasks[1].discipline_id = discipline;
        set.tasks[0].code = "ARC-Z99".to_string();
        let projection = project(&set, &ProjectionFilter::unrestricted(), ClosurePolicy::Strict).unwrap();
        assert_eq!(projection.codes()[..2], ["ARC-C02", "ARC-Z99"]);
    }

    #[test]
    fn test_projection_is_deterministic() {
        let set = residential();
        let first = project_selection(&set, &Selection::preset("HOUSE"), ClosurePolicy::Strict).unwrap();
        let second = project_selection(&set, &Selection::preset("HOUSE"), ClosurePolicy::Strict).unwrap();
        assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&second).unwrap()
        );
    }

    #[test]
    fn test_cyclic_template_rejected() {
        let mut set = residential();
        set.add_dependency_by_code("ARC-C01", "ARC-D01");
        let err = project(&set, &ProjectionFilter::unrestricted(), ClosurePolicy::Expand).unwrap_err();
        assert!(matches!(
            err,
            ProjectionError::InvalidTemplate(StructuralError::CycleDetected { .. })
        ));
    }

    #[test]
    fn test_exclude_only_filter_keeps_other_axes_open() {
        let set = residential();
        let filters = ProjectionFilter::default().with_exclude(["LND-PANO"]);
        let projection = project(&set, &filters, ClosurePolicy::Strict).unwrap();
        assert_eq!(projection.len(), 4);
    }
}
