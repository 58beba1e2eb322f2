//! Instantiation: schedule a projection and write it into a project
//!
//! Scheduling is a pure forward pass ([`schedule`]); materialisation builds
//! one [`TaskBatch`] and hands it to a [`ProjectTaskStore`] which commits it
//! atomically.

mod collab;
mod instantiator;
mod schedule;
mod store;

pub use collab::{Clock, FixedClock, MapRoleResolver, RoleResolver, SystemClock};
pub use instantiator::{InstantiationRequest, InstantiationSummary, instantiate};
pub use schedule::{ScheduledTask, schedule};
pub use store::{NewProjectTask, ProjectTaskStore, SqliteProjectStore, TaskBatch, TaskLink};
