//! Preset projection
//!
//! Selects an induced, dependency-closed subgraph of a template set and
//! returns it in deterministic topological order. Pure: repeated previews of
//! the same input produce identical output.

mod closure;
mod projector;

pub use projector::{ProjectedTask, Projection, project, project_selection};
