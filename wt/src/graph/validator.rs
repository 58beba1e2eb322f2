//! Structural validation of a template set
//!
//! Checks run in a fixed order and `validate` stops at the first failing one:
//!
//! 1. dependency edges (and task phase/discipline references) resolve inside the set
//! 2. the dependency graph is acyclic
//! 3. phase and discipline order_index values are unique
//! 4. task, phase, discipline and preset codes are unique
//! 5. presets only name codes that exist

use std::collections::{HashMap, HashSet};
use tracing::{debug, info};

use super::arena::TaskGraph;
use crate::domain::TemplateSet;
use crate::error::{CodeKind, OrderAxis, StructuralError};

/// Validate a template set, returning the first structural error
pub fn validate(set: &TemplateSet) -> Result<(), StructuralError> {
    debug!(code = %set.code, version = set.version, "validate: called");

    let graph = TaskGraph::build(set)?;
    check_groupings(set)?;

    if let Some(cycle) = graph.find_cycle() {
        return Err(cycle_error(set, &cycle));
    }

    first(check_order(set))?;
    first(check_codes(set))?;
    first(check_presets(set))?;

    info!(code = %set.code, version = set.version, tasks = set.tasks.len(), "Template validated");
    Ok(())
}

/// Collect every structural issue (authoring diagnostics), in check order
pub fn validate_all(set: &TemplateSet) -> Vec<StructuralError> {
    debug!(code = %set.code, version = set.version, "validate_all: called");
    let (graph, mut issues) = TaskGraph::build_lenient(set);
    issues.extend(grouping_issues(set));
    if let Some(cycle) = graph.find_cycle() {
        issues.push(cycle_error(set, &cycle));
    }
    issues.extend(check_order(set));
    issues.extend(check_codes(set));
    issues.extend(check_presets(set));
    issues
}

/// Every task must reference a phase and discipline of the same set
pub fn check_groupings(set: &TemplateSet) -> Result<(), StructuralError> {
    first(grouping_issues(set))
}

fn first(issues: Vec<StructuralError>) -> Result<(), StructuralError> {
    match issues.into_iter().next() {
        Some(issue) => Err(issue),
        None => Ok(()),
    }
}

fn cycle_error(set: &TemplateSet, cycle: &[usize]) -> StructuralError {
    StructuralError::CycleDetected {
        path: cycle.iter().map(|&i| set.tasks[i].code.clone()).collect(),
    }
}

fn grouping_issues(set: &TemplateSet) -> Vec<StructuralError> {
    let phases: HashSet<&str> = set.phases.iter().map(|p| p.id.as_str()).collect();
    let disciplines: HashSet<&str> = set.disciplines.iter().map(|d| d.id.as_str()).collect();
    let mut issues = Vec::new();

    for task in &set.tasks {
        if !phases.contains(task.phase_id.as_str()) {
            issues.push(StructuralError::DanglingGrouping {
                task: task.code.clone(),
                axis: OrderAxis::Phase,
                missing_ref: task.phase_id.clone(),
            });
        }
        if !disciplines.contains(task.discipline_id.as_str()) {
            issues.push(StructuralError::DanglingGrouping {
                task: task.code.clone(),
                axis: OrderAxis::Discipline,
                missing_ref: task.discipline_id.clone(),
            });
        }
    }
    issues
}

fn check_order(set: &TemplateSet) -> Vec<StructuralError> {
    let mut issues = duplicate_orders(
        OrderAxis::Phase,
        set.phases.iter().map(|p| (p.order_index, p.code.as_str())),
    );
    issues.extend(duplicate_orders(
        OrderAxis::Discipline,
        set.disciplines.iter().map(|d| (d.order_index, d.code.as_str())),
    ));
    issues
}

fn duplicate_orders<'a>(axis: OrderAxis, entries: impl Iterator<Item = (i32, &'a str)>) -> Vec<StructuralError> {
    let mut seen: HashMap<i32, &str> = HashMap::new();
    let mut issues = Vec::new();
    for (order_index, code) in entries {
        match seen.get(&order_index) {
            Some(first) => issues.push(StructuralError::DuplicateOrder {
                axis,
                order_index,
                first: first.to_string(),
                second: code.to_string(),
            }),
            None => {
                seen.insert(order_index, code);
            }
        }
    }
    issues
}

fn check_codes(set: &TemplateSet) -> Vec<StructuralError> {
    let mut issues = duplicate_codes(CodeKind::Task, set.tasks.iter().map(|t| t.code.as_str()));
    issues.extend(duplicate_codes(CodeKind::Phase, set.phases.iter().map(|p| p.code.as_str())));
    issues.extend(duplicate_codes(
        CodeKind::Discipline,
        set.disciplines.iter().map(|d| d.code.as_str()),
    ));
    issues.extend(duplicate_codes(CodeKind::Preset, set.presets.iter().map(|p| p.code.as_str())));
    issues
}

fn duplicate_codes<'a>(kind: CodeKind, codes: impl Iterator<Item = &'a str>) -> Vec<StructuralError> {
    let mut seen = HashSet::new();
    codes
        .filter(|code| !seen.insert(*code))
        .map(|code| StructuralError::DuplicateCode {
            kind,
            code: code.to_string(),
        })
        .collect()
}

fn check_presets(set: &TemplateSet) -> Vec<StructuralError> {
    let phases: HashSet<&str> = set.phases.iter().map(|p| p.code.as_str()).collect();
    let disciplines: HashSet<&str> = set.disciplines.iter().map(|d| d.code.as_str()).collect();
    let tasks: HashSet<&str> = set.tasks.iter().map(|t| t.code.as_str()).collect();
    let mut issues = Vec::new();

    for preset in &set.presets {
        let filters = &preset.filters;
        let lists = [
            (CodeKind::Phase, &filters.phases, &phases),
            (CodeKind::Discipline, &filters.disciplines, &disciplines),
            (CodeKind::Task, &filters.exclude, &tasks),
        ];
        for (kind, list, known) in lists {
            for code in list.iter().flatten() {
                if !known.contains(code.as_str()) {
                    issues.push(StructuralError::UnknownPresetReference {
                        preset: preset.code.clone(),
                        kind,
                        code: code.clone(),
                    });
                }
            }
        }
    }
    issues
}
