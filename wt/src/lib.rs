//! WbsTemplate - work-breakdown-structure template engine
//!
//! Canonical libraries of phases, disciplines, tasks and task dependencies are
//! stored as versioned template sets. A set is validated once when published,
//! then projected through a preset (or an ad-hoc filter) into a
//! dependency-consistent, deterministically ordered task list, which is
//! scheduled and written into a project in one atomic batch.
//!
//! # Flow
//!
//! ```text
//! TemplateCatalog --publish--> graph::validate
//!        |
//!        +--fetch--> projection::project --> instantiate::instantiate --> ProjectTaskStore
//! ```
//!
//! # Modules
//!
//! - [`domain`] - template sets, filters, materialised project tasks
//! - [`definition`] - nested YAML/JSON exchange format
//! - [`graph`] - dependency arena and structural validation
//! - [`projection`] - preset/filter projection with closure policies
//! - [`instantiate`] - forward scheduling and materialisation
//! - [`catalog`] - versioned template storage with optimistic publish
//! - [`service`] - the exposed operations bound to a catalog
//! - [`config`] - configuration types and loading
//! - [`cli`] - command-line interface

pub mod catalog;
pub mod cli;
pub mod config;
pub mod definition;
pub mod domain;
pub mod error;
pub mod graph;
pub mod instantiate;
pub mod projection;
pub mod service;

#[cfg(test)]
pub(crate) mod fixtures;

// Re-export commonly used types
pub use catalog::{SqliteCatalog, TemplateAuthoring, TemplateCatalog};
pub use config::Config;
pub use definition::TemplateDefinition;
pub use domain::{
    ClosurePolicy, Discipline, Phase, Preset, ProjectTask, ProjectTaskLink, ProjectionFilter, Provenance, Selection,
    TemplateScope, TemplateSet, TemplateTask, TemplateTaskDependency,
};
pub use error::{
    CatalogError, CodeKind, DefinitionError, InstantiationError, OrderAxis, ProjectionError, StructuralError,
    UnresolvedDependency, WbsError,
};
pub use graph::{TaskGraph, validate, validate_all};
pub use instantiate::{
    Clock, FixedClock, InstantiationRequest, InstantiationSummary, MapRoleResolver, NewProjectTask, ProjectTaskStore,
    RoleResolver, ScheduledTask, SqliteProjectStore, SystemClock, TaskBatch, TaskLink, instantiate, schedule,
};
pub use projection::{ProjectedTask, Projection, project, project_selection};
pub use service::{ProjectionQuery, TemplateService};
