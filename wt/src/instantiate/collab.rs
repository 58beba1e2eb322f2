//! Collaborators consumed by instantiation: role resolution and the clock

use chrono::{NaiveDate, Utc};
use std::collections::HashMap;
use tracing::debug;

/// Maps a template role key to a concrete assignee
///
/// Returning None is not an error: the task is created unassigned and
/// counted in the instantiation summary.
pub trait RoleResolver {
    fn resolve(&self, role_key: &str) -> Option<String>;
}

impl<F> RoleResolver for F
where
    F: Fn(&str) -> Option<String>,
{
    fn resolve(&self, role_key: &str) -> Option<String> {
        self(role_key)
    }
}

/// Role resolver backed by a fixed role_key -> assignee map
#[derive(Debug, Clone, Default)]
pub struct MapRoleResolver {
    roles: HashMap<String, String>,
}

impl MapRoleResolver {
    pub fn new(roles: HashMap<String, String>) -> Self {
        debug!(roles = roles.len(), "MapRoleResolver::new: called");
        Self { roles }
    }

    pub fn with_role(mut self, role_key: impl Into<String>, assignee: impl Into<String>) -> Self {
        self.roles.insert(role_key.into(), assignee.into());
        self
    }
}

impl RoleResolver for MapRoleResolver {
    fn resolve(&self, role_key: &str) -> Option<String> {
        self.roles.get(role_key).cloned()
    }
}

/// Source of "today" for callers that do not pass a start date
pub trait Clock {
    fn today(&self) -> NaiveDate;
}

/// Current UTC date
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn today(&self) -> NaiveDate {
        Utc::now().date_naive()
    }
}

/// Clock pinned to one date
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub NaiveDate);

impl Clock for FixedClock {
    fn today(&self) -> NaiveDate {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_closure_resolver() {
        let resolver = |role: &str| (role == "architect").then(|| "user-17".to_string());
        assert_eq!(resolver.resolve("architect"), Some("user-17".to_string()));
        assert_eq!(resolver.resolve("surveyor"), None);
    }

    #[test]
    fn test_map_resolver() {
        let resolver = MapRoleResolver::default().with_role("architect", "user-17");
        assert_eq!(resolver.resolve("architect").as_deref(), Some("user-17"));
        assert!(resolver.resolve("mep_engineer").is_none());
    }

    #[test]
    fn test_fixed_clock() {
        let day = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
        assert_eq!(FixedClock(day).today(), day);
    }
}
