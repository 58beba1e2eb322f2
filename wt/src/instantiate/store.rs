//! Project task store boundary and its SQLite implementation

use chrono::NaiveDate;
use eyre::{Context, Result};
use std::path::Path;
use tracing::{debug, info};
use wbsstore::{Filter, IndexValue, Store};

use crate::domain::{ProjectTask, ProjectTaskLink, Provenance, generate_id, now_ms};

/// A project task ready to be written
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewProjectTask {
    pub name: String,
    pub description: Option<String>,
    pub deliverable_type: Option<String>,
    pub role_key: Option<String>,
    pub assignee: Option<String>,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub duration_days: u32,
    pub provenance: Provenance,
}

/// Dependency between two tasks of the same batch, by position in `TaskBatch::tasks`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskLink {
    pub task: usize,
    pub depends_on: usize,
}

/// Everything one instantiation writes
#[derive(Debug, Clone)]
pub struct TaskBatch {
    pub batch_id: String,
    pub project_id: String,
    pub actor_id: String,
    pub tasks: Vec<NewProjectTask>,
    pub links: Vec<TaskLink>,
}

impl TaskBatch {
    /// Assign ids and build the records to persist
    ///
    /// Links pointing outside `tasks` are dropped.
    pub fn to_records(&self) -> (Vec<ProjectTask>, Vec<ProjectTaskLink>) {
        let now = now_ms();
        let tasks: Vec<ProjectTask> = self
            .tasks
            .iter()
            .map(|t| ProjectTask {
                id: generate_id(),
                project_id: self.project_id.clone(),
                batch_id: self.batch_id.clone(),
                name: t.name.clone(),
                description: t.description.clone(),
                deliverable_type: t.deliverable_type.clone(),
                role_key: t.role_key.clone(),
                assignee: t.assignee.clone(),
                start_date: t.start_date,
                end_date: t.end_date,
                duration_days: t.duration_days,
                provenance: t.provenance.clone(),
                created_by: self.actor_id.clone(),
                created_at: now,
                updated_at: now,
            })
            .collect();

        let links = self
            .links
            .iter()
            .filter_map(|link| {
                let task = tasks.get(link.task)?;
                let dep = tasks.get(link.depends_on)?;
                Some(ProjectTaskLink {
                    id: generate_id(),
                    project_id: self.project_id.clone(),
                    batch_id: self.batch_id.clone(),
                    task_id: task.id.clone(),
                    depends_on_task_id: dep.id.clone(),
                    created_at: now,
                })
            })
            .collect();

        (tasks, links)
    }
}

/// External project task store
///
/// `create_batch` must be atomic: either every task and link of the batch
/// is committed and the task ids are returned in batch order, or nothing is.
pub trait ProjectTaskStore {
    fn create_batch(&mut self, batch: &TaskBatch) -> Result<Vec<String>>;
}

/// Project task store over a wbsstore database
pub struct SqliteProjectStore {
    store: Store,
}

impl SqliteProjectStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self {
            store: Store::open(path).context("Failed to open project store")?,
        })
    }

    pub fn from_store(store: Store) -> Self {
        Self { store }
    }

    pub fn into_store(self) -> Store {
        self.store
    }

    /// Tasks of a project, ordered by start date then name
    pub fn tasks_for_project(&self, project_id: &str) -> Result<Vec<ProjectTask>> {
        debug!(%project_id, "tasks_for_project: called");
        let mut tasks: Vec<ProjectTask> = self
            .store
            .list(&[Filter::eq("project_id", IndexValue::String(project_id.to_string()))])?;
        tasks.sort_by(|a, b| (a.start_date, &a.name).cmp(&(b.start_date, &b.name)));
        Ok(tasks)
    }

    pub fn links_for_project(&self, project_id: &str) -> Result<Vec<ProjectTaskLink>> {
        self.store
            .list(&[Filter::eq("project_id", IndexValue::String(project_id.to_string()))])
    }

    pub fn tasks_for_batch(&self, batch_id: &str) -> Result<Vec<ProjectTask>> {
        self.store
            .list(&[Filter::eq("batch_id", IndexValue::String(batch_id.to_string()))])
    }

    /// Compensating delete of one instantiation; returns the number of tasks removed
    pub fn delete_batch(&mut self, batch_id: &str) -> Result<usize> {
        debug!(%batch_id, "delete_batch: called");
        let filter = [Filter::eq("batch_id", IndexValue::String(batch_id.to_string()))];
        let removed = self.store.batch(|b| {
            let links: Vec<ProjectTaskLink> = b.list(&filter)?;
            for link in &links {
                b.delete::<ProjectTaskLink>(&link.id)?;
            }
            let tasks: Vec<ProjectTask> = b.list(&filter)?;
            for task in &tasks {
                b.delete::<ProjectTask>(&task.id)?;
            }
            Ok(tasks.len())
        })?;
        info!(%batch_id, removed, "Batch deleted");
        Ok(removed)
    }
}

impl ProjectTaskStore for SqliteProjectStore {
    fn create_batch(&mut self, batch: &TaskBatch) -> Result<Vec<String>> {
        debug!(
            batch_id = %batch.batch_id,
            project_id = %batch.project_id,
            tasks = batch.tasks.len(),
            links = batch.links.len(),
            "create_batch: called"
        );
        let (tasks, links) = batch.to_records();
        self.store
            .batch(|b| {
                for task in &tasks {
                    b.create(task)?;
                }
                for link in &links {
                    b.create(link)?;
                }
                Ok(())
            })
            .context(format!("Failed to write batch {}", batch.batch_id))?;
        Ok(tasks.into_iter().map(|t| t.id).collect())
    }
}
