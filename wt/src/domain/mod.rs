//! Domain types for WbsTemplate
//!
//! Template sets are stored aggregates (phases, disciplines, tasks, dependency
//! edges, presets); project tasks are what instantiation materialises.
//! Both implement the Record trait for WbsStore persistence.

mod filter;
mod project_task;
mod template;

pub use filter::{ClosurePolicy, ProjectionFilter, Selection};
pub use project_task::{ProjectTask, ProjectTaskLink, Provenance};
pub use template::{
    Discipline, Phase, Preset, TemplateScope, TemplateSet, TemplateTask, TemplateTaskDependency, generate_id,
};

// Re-export wbsstore types for convenience
pub use wbsstore::{Filter, FilterOp, IndexValue, Record, Store, now_ms};
