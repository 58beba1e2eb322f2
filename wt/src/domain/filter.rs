//! Projection filters, selections and closure policies

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Filter shape shared by presets and ad-hoc projections
///
/// Absent lists are unrestricted. When both `phases` and `disciplines` are
/// given a task must match both (AND of allow-lists). A present but empty
/// allow-list allows nothing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectionFilter {
    /// Allowed phase codes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phases: Option<Vec<String>>,

    /// Allowed discipline codes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disciplines: Option<Vec<String>>,

    /// Task codes removed after the allow-lists are applied
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exclude: Option<Vec<String>>,
}

impl ProjectionFilter {
    /// Filter that selects every task
    pub fn unrestricted() -> Self {
        Self::default()
    }

    pub fn with_phases<I, S>(mut self, phases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.phases = Some(phases.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_disciplines<I, S>(mut self, disciplines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.disciplines = Some(disciplines.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_exclude<I, S>(mut self, exclude: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exclude = Some(exclude.into_iter().map(Into::into).collect());
        self
    }

    /// Whether a task with these codes passes the filter
    pub fn matches(&self, phase_code: &str, discipline_code: &str, task_code: &str) -> bool {
        allows(&self.phases, phase_code) && allows(&self.disciplines, discipline_code) && !self.excludes(task_code)
    }

    pub fn excludes(&self, task_code: &str) -> bool {
        self.exclude
            .as_ref()
            .is_some_and(|codes| codes.iter().any(|c| c == task_code))
    }

    pub fn is_unrestricted(&self) -> bool {
        self.phases.is_none() && self.disciplines.is_none() && self.exclude.as_ref().is_none_or(|e| e.is_empty())
    }
}

fn allows(list: &Option<Vec<String>>, code: &str) -> bool {
    match list {
        Some(codes) => codes.iter().any(|c| c == code),
        None => true,
    }
}

/// How a projection is chosen: a stored preset or an ad-hoc filter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Selection {
    Preset(String),
    Filter(ProjectionFilter),
}

impl Selection {
    pub fn preset(code: impl Into<String>) -> Self {
        Self::Preset(code.into())
    }

    pub fn all() -> Self {
        Self::Filter(ProjectionFilter::unrestricted())
    }
}

/// What to do with dependencies that fall outside the selected tasks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClosurePolicy {
    /// Refuse the projection and list the missing dependencies
    #[default]
    Strict,
    /// Pull missing dependencies in until the selection is closed
    Expand,
}

impl fmt::Display for ClosurePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Strict => write!(f, "strict"),
            Self::Expand => write!(f, "expand"),
        }
    }
}

impl FromStr for ClosurePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "strict" => Ok(Self::Strict),
            "expand" => Ok(Self::Expand),
            other => Err(format!("Unknown closure policy '{}' (expected strict or expand)", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unrestricted_matches_everything() {
        let filter = ProjectionFilter::unrestricted();
        assert!(filter.matches("C", "ARC", "ARC-C01"));
        assert!(filter.is_unrestricted());
    }

    #[test]
    fn test_phases_and_disciplines_are_and_combined() {
        let filter = ProjectionFilter::default()
            .with_phases(["C"])
            .with_disciplines(["ARC", "MEP"]);

        assert!(filter.matches("C", "ARC", "ARC-C01"));
        assert!(filter.matches("C", "MEP", "MEP-C01"));
        assert!(!filter.matches("D", "ARC", "ARC-D01"));
        assert!(!filter.matches("C", "LND", "LND-C01"));
    }

    #[test]
    fn test_exclude_removes_task() {
        let filter = ProjectionFilter::default()
            .with_disciplines(["LND"])
            .with_exclude(["LND-PANO"]);
        assert!(!filter.matches("D", "LND", "LND-PANO"));
        assert!(filter.matches("D", "LND", "LND-PLAN"));
        assert!(!filter.is_unrestricted());
    }

    #[test]
    fn test_empty_allow_list_allows_nothing() {
        let filter = ProjectionFilter {
            phases: Some(vec![]),
            ..Default::default()
        };
        assert!(!filter.matches("C", "ARC", "ARC-C01"));
    }

    #[test]
    fn test_filter_yaml_omits_absent_lists() {
        let filter = ProjectionFilter::default().with_disciplines(["ARC"]);
        let yaml = serde_yaml::to_string(&filter).unwrap();
        assert!(yaml.contains("disciplines"));
        assert!(!yaml.contains("phases"));

        let parsed: ProjectionFilter = serde_yaml::from_str("exclude: [LND-PANO]").unwrap();
        assert_eq!(parsed.exclude, Some(vec!["LND-PANO".to_string()]));
        assert!(parsed.phases.is_none());
    }

    #[test]
    fn test_closure_policy_parse() {
        assert_eq!("strict".parse::<ClosurePolicy>().unwrap(), ClosurePolicy::Strict);
        assert_eq!("EXPAND".parse::<ClosurePolicy>().unwrap(), ClosurePolicy::Expand);
        assert!("widen".parse::<ClosurePolicy>().is_err());
        assert_eq!(ClosurePolicy::default(), ClosurePolicy::Strict);
    }
}
