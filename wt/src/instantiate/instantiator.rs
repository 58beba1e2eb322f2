//! Materialise a projection into a project

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, info, warn};

use super::collab::RoleResolver;
use super::schedule::schedule;
use super::store::{NewProjectTask, ProjectTaskStore, TaskBatch, TaskLink};
use crate::domain::{Provenance, generate_id};
use crate::error::InstantiationError;
use crate::projection::Projection;

/// Where and by whom a projection is instantiated
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstantiationRequest {
    pub project_id: String,
    pub start_date: NaiveDate,
    pub actor_id: String,
}

impl InstantiationRequest {
    pub fn new(project_id: impl Into<String>, start_date: NaiveDate, actor_id: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            start_date,
            actor_id: actor_id.into(),
        }
    }
}

/// Outcome of a committed instantiation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstantiationSummary {
    pub batch_id: String,
    pub project_id: String,
    pub task_count: usize,

    /// Tasks created without an assignee
    pub unresolved_assignee_count: usize,
    pub created_task_ids: Vec<String>,
    pub start_date: NaiveDate,

    /// Latest exclusive end date in the batch
    pub finish_date: NaiveDate,
}

/// Schedule the projection and write it to `store` as one batch
///
/// Unresolved roles never fail the call. Any store failure leaves the
/// project untouched and is reported as `InstantiationFailed`.
pub fn instantiate(
    projection: &Projection,
    request: &InstantiationRequest,
    roles: &dyn RoleResolver,
    store: &mut dyn ProjectTaskStore,
) -> Result<InstantiationSummary, InstantiationError> {
    debug!(
        set = %projection.set_code,
        version = projection.version,
        project_id = %request.project_id,
        start_date = %request.start_date,
        "instantiate: called"
    );

    let scheduled = schedule(projection, request.start_date)?;
    let position: HashMap<&str, usize> = projection
        .tasks
        .iter()
        .enumerate()
        .map(|(i, t)| (t.code.as_str(), i))
        .collect();

    let mut tasks = Vec::with_capacity(projection.len());
    let mut links = Vec::new();
    let mut unresolved_assignee_count = 0;

    for (i, (task, dates)) in projection.tasks.iter().zip(&scheduled).enumerate() {
        let assignee = task.role_key.as_deref().and_then(|role| roles.resolve(role));
        if assignee.is_none() {
            unresolved_assignee_count += 1;
            warn!(task = %task.code, role_key = ?task.role_key, "Role not resolved, task left unassigned");
        }

        for dep in &task.depends_on {
            if let Some(&depends_on) = position.get(dep.as_str()) {
                links.push(TaskLink { task: i, depends_on });
            }
        }

        tasks.push(NewProjectTask {
            name: task.name.clone(),
            description: task.description.clone(),
            deliverable_type: task.deliverable_type.clone(),
            role_key: task.role_key.clone(),
            assignee,
            start_date: dates.start_date,
            end_date: dates.end_date,
            duration_days: task.est_duration_days,
            provenance: Provenance {
                set_id: projection.set_id.clone(),
                set_code: projection.set_code.clone(),
                version: projection.version,
                template_task_code: task.code.clone(),
            },
        });
    }

    let finish_date = scheduled
        .iter()
        .map(|s| s.end_date)
        .max()
        .unwrap_or(request.start_date);

    let batch = TaskBatch {
        batch_id: generate_id(),
        project_id: request.project_id.clone(),
        actor_id: request.actor_id.clone(),
        tasks,
        links,
    };

    let created_task_ids = store
        .create_batch(&batch)
        .map_err(|e| InstantiationError::failed(format!("{e:#}")))?;

    info!(
        batch_id = %batch.batch_id,
        project_id = %request.project_id,
        tasks = created_task_ids.len(),
        unresolved_assignee_count,
        %finish_date,
        "Instantiated template {} v{}",
        projection.set_code,
        projection.version
    );

    Ok(InstantiationSummary {
        batch_id: batch.batch_id,
        project_id: request.project_id.clone(),
        task_count: created_task_ids.len(),
        unresolved_assignee_count,
        created_task_ids,
        start_date: request.start_date,
        finish_date,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ClosurePolicy, Selection};
    use crate::fixtures::residential;
    use crate::instantiate::{MapRoleResolver, SqliteProjectStore};
    use crate::projection::project_selection;
    use wbsstore::Store;

    /// Records batches in memory, optionally failing every write
    #[derive(Default)]
    struct RecordingStore {
        batches: Vec<TaskBatch>,
        fail: bool,
    }

    impl ProjectTaskStore for RecordingStore {
        fn create_batch(&mut self, batch: &TaskBatch) -> eyre::Result<Vec<String>> {
            if self.fail {
                eyre::bail!("disk full");
            }
            self.batches.push(batch.clone());
            Ok((0..batch.tasks.len()).map(|i| format!("task-{i}")).collect())
        }
    }

    fn house() -> Projection {
        project_selection(&residential(), &Selection::preset("HOUSE"), ClosurePolicy::Strict).unwrap()
    }

    fn request() -> InstantiationRequest {
        InstantiationRequest::new("project-1", NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(), "actor-1")
    }

    #[test]
    fn test_summary_counts_unresolved_roles() {
        let roles = MapRoleResolver::default().with_role("architect", "user-17");
        let mut store = RecordingStore::default();
        let summary = instantiate(&house(), &request(), &roles, &mut store).unwrap();

        assert_eq!(summary.task_count, 4);
        assert_eq!(summary.unresolved_assignee_count, 1);
        assert_eq!(summary.created_task_ids.len(), 4);
        assert_eq!(summary.finish_date, NaiveDate::from_ymd_opt(2025, 1, 19).unwrap());

        let batch = &store.batches[0];
        assert_eq!(batch.batch_id, summary.batch_id);
        assert_eq!(batch.tasks[0].assignee.as_deref(), Some("user-17"));
        assert_eq!(batch.tasks[2].provenance.template_task_code, "MEP-C01");
        assert!(batch.tasks[2].assignee.is_none());
    }

    #[test]
    fn test_links_follow_projection_dependencies() {
        let mut store = RecordingStore::default();
        let no_roles = |_: &str| -> Option<String> { None };
        instantiate(&house(), &request(), &no_roles, &mut store).unwrap();

        let links = &store.batches[0].links;
        // ARC-C02 -> ARC-C01, MEP-C01 -> ARC-C01, ARC-D01 -> ARC-C02
        assert_eq!(
            links,
            &vec![
                TaskLink { task: 1, depends_on: 0 },
                TaskLink { task: 2, depends_on: 0 },
                TaskLink { task: 3, depends_on: 1 },
            ]
        );
    }

    #[test]
    fn test_store_failure_is_instantiation_failed() {
        let mut store = RecordingStore {
            fail: true,
            ..Default::default()
        };
        let err = instantiate(&house(), &request(), &MapRoleResolver::default(), &mut store).unwrap_err();
        assert_eq!(err, InstantiationError::failed("disk full"));
    }

    #[test]
    fn test_each_call_is_a_new_batch() {
        let mut store = SqliteProjectStore::from_store(Store::open_in_memory().unwrap());
        let roles = MapRoleResolver::default();
        let first = instantiate(&house(), &request(), &roles, &mut store).unwrap();
        let second = instantiate(&house(), &request(), &roles, &mut store).unwrap();

        assert_ne!(first.batch_id, second.batch_id);
        assert_eq!(store.tasks_for_project("project-1").unwrap().len(), 8);
    }
}
