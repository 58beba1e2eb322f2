//! Materialised project tasks
//!
//! Written by instantiation; each carries provenance back to the template
//! task and version it came from.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use wbsstore::{IndexValue, Record};

/// Traceability link from a project task to its template origin
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Provenance {
    pub set_id: String,
    pub set_code: String,
    pub version: u32,
    pub template_task_code: String,
}

/// A concrete, scheduled task in a live project
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectTask {
    pub id: String,
    pub project_id: String,

    /// Instantiation this task was created by
    pub batch_id: String,

    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub deliverable_type: Option<String>,
    #[serde(default)]
    pub role_key: Option<String>,

    /// None when the role could not be resolved
    #[serde(default)]
    pub assignee: Option<String>,

    pub start_date: NaiveDate,

    /// Exclusive end date
    pub end_date: NaiveDate,
    pub duration_days: u32,

    pub provenance: Provenance,
    pub created_by: String,

    /// Creation timestamp (Unix milliseconds)
    pub created_at: i64,

    /// Last update timestamp (Unix milliseconds)
    pub updated_at: i64,
}

impl Record for ProjectTask {
    fn id(&self) -> &str {
        &self.id
    }

    fn updated_at(&self) -> i64 {
        self.updated_at
    }

    fn collection_name() -> &'static str {
        "project_tasks"
    }

    fn indexed_fields(&self) -> HashMap<String, IndexValue> {
        let mut fields = HashMap::new();
        fields.insert("project_id".to_string(), IndexValue::String(self.project_id.clone()));
        fields.insert("batch_id".to_string(), IndexValue::String(self.batch_id.clone()));
        fields.insert(
            "template_task_code".to_string(),
            IndexValue::String(self.provenance.template_task_code.clone()),
        );
        fields
    }
}

/// Dependency link between two materialised tasks
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectTaskLink {
    pub id: String,
    pub project_id: String,
    pub batch_id: String,
    pub task_id: String,
    pub depends_on_task_id: String,
    pub created_at: i64,
}

impl Record for ProjectTaskLink {
    fn id(&self) -> &str {
        &self.id
    }

    fn updated_at(&self) -> i64 {
        self.created_at
    }

    fn collection_name() -> &'static str {
        "project_task_links"
    }

    fn indexed_fields(&self) -> HashMap<String, IndexValue> {
        let mut fields = HashMap::new();
        fields.insert("project_id".to_string(), IndexValue::String(self.project_id.clone()));
        fields.insert("batch_id".to_string(), IndexValue::String(self.batch_id.clone()));
        fields
    }
}
