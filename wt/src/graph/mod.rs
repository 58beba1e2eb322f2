//! Task dependency graph and structural validation
//!
//! Tasks live in a flat arena indexed by their position in
//! `TemplateSet::tasks`; edges are index pairs. Validation runs once at
//! publish time and is pure, so it is safe to re-run.

mod arena;
mod validator;

pub use arena::TaskGraph;
pub use validator::{check_groupings, validate, validate_all};
