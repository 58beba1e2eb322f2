//! Error taxonomy
//!
//! - [`StructuralError`]: the template itself is broken; blocks publish.
//! - [`ProjectionError`]: the selection cannot be satisfied; caller adjusts filters or policy.
//! - [`InstantiationError`]: the project store write failed; nothing was committed.
//! - [`CatalogError`]: storage-boundary rules (versions, immutability, lookups).
//! - [`DefinitionError`]: the exchange document could not be turned into a template set.

use std::fmt;
use thiserror::Error;

/// Ordering axis checked for unique order_index values
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderAxis {
    Phase,
    Discipline,
}

impl fmt::Display for OrderAxis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Phase => write!(f, "phase"),
            Self::Discipline => write!(f, "discipline"),
        }
    }
}

/// Kind of code-keyed entity within a template set
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodeKind {
    Task,
    Phase,
    Discipline,
    Preset,
}

impl fmt::Display for CodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Task => write!(f, "task"),
            Self::Phase => write!(f, "phase"),
            Self::Discipline => write!(f, "discipline"),
            Self::Preset => write!(f, "preset"),
        }
    }
}

/// Structural defects in a template set
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StructuralError {
    #[error("Dependency of task {task} references missing task {missing_ref}")]
    DanglingEdge { task: String, missing_ref: String },

    #[error("Task {task} references missing {axis} {missing_ref}")]
    DanglingGrouping {
        task: String,
        axis: OrderAxis,
        missing_ref: String,
    },

    #[error("Dependency cycle detected: {}", .path.join(" -> "))]
    CycleDetected { path: Vec<String> },

    #[error("Duplicate {axis} order_index {order_index}: {first} and {second}")]
    DuplicateOrder {
        axis: OrderAxis,
        order_index: i32,
        first: String,
        second: String,
    },

    #[error("Duplicate {kind} code: {code}")]
    DuplicateCode { kind: CodeKind, code: String },

    #[error("Preset {preset} references unknown {kind} {code}")]
    UnknownPresetReference { preset: String, kind: CodeKind, code: String },
}

/// An included task whose dependency was left outside the projection
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, serde::Serialize)]
pub struct UnresolvedDependency {
    pub task: String,
    pub missing_dependency: String,
}

impl fmt::Display for UnresolvedDependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} needs {}", self.task, self.missing_dependency)
    }
}

fn join_unresolved(unresolved: &[UnresolvedDependency]) -> String {
    unresolved.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ")
}

/// Projection failures; recoverable by changing filters or policy
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProjectionError {
    #[error("Unknown preset code: {0}")]
    UnknownPresetCode(String),

    #[error("Projection selected no tasks")]
    EmptyProjection,

    #[error("Unresolved dependencies: {}", join_unresolved(.0))]
    UnresolvedDependencies(Vec<UnresolvedDependency>),

    #[error("Template is structurally invalid: {0}")]
    InvalidTemplate(#[from] StructuralError),
}

/// Instantiation failure; the project store holds none of the batch
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InstantiationError {
    #[error("Instantiation failed: {reason}")]
    InstantiationFailed { reason: String },
}

impl InstantiationError {
    pub fn failed(reason: impl Into<String>) -> Self {
        Self::InstantiationFailed { reason: reason.into() }
    }
}

/// Catalog (storage boundary) failures
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Template not found: {0}")]
    NotFound(String),

    #[error("Template {code} v{version} is not published")]
    NotPublished { code: String, version: u32 },

    #[error("Template {code} v{version} is published and immutable; create a new version")]
    Immutable { code: String, version: u32 },

    #[error("Template {code} v{version} is already published")]
    AlreadyPublished { code: String, version: u32 },

    #[error("Template {code} v{version} already exists")]
    DuplicateVersion { code: String, version: u32 },

    #[error("Template {code} already has an unpublished draft v{version}")]
    DraftExists { code: String, version: u32 },

    #[error("Template {code} v{requested} is stale; current version is v{current}")]
    StaleVersion { code: String, requested: u32, current: u32 },

    #[error("Template failed validation: {0}")]
    Invalid(#[from] StructuralError),

    #[error("Template definition error: {0}")]
    Definition(#[from] DefinitionError),

    #[error("Store error: {0}")]
    StoreError(String),
}

/// Failures turning an exchange document into a template set
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DefinitionError {
    #[error("Failed to parse template definition: {0}")]
    Parse(String),

    #[error("Task {task} references unknown phase {phase_code}")]
    UnknownPhase { task: String, phase_code: String },

    #[error("Task {task} references unknown discipline {discipline_code}")]
    UnknownDiscipline { task: String, discipline_code: String },

    #[error("Duplicate {kind} code: {code}")]
    DuplicateCode { kind: CodeKind, code: String },

    #[error("Template {code} v{version} cannot be revised; no higher version number exists")]
    VersionOverflow { code: String, version: u32 },
}

/// Errors surfaced by the service operations
#[derive(Debug, Error)]
pub enum WbsError {
    #[error(transparent)]
    Structural(#[from] StructuralError),

    #[error(transparent)]
    Projection(#[from] ProjectionError),

    #[error(transparent)]
    Instantiation(#[from] InstantiationError),

    #[error(transparent)]
    Catalog(#[from] CatalogError),
}
