//! Forward scheduling over a projection's topological order

use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

use crate::error::InstantiationError;
use crate::projection::Projection;

/// Dates computed for one projected task
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduledTask {
    pub code: String,
    pub start_date: NaiveDate,

    /// Exclusive
    pub end_date: NaiveDate,
}

/// Single forward pass: each task starts at the later of `start_date` and
/// the latest end of its dependencies, and ends `est_duration_days` later.
///
/// The projection must already be topologically ordered; a dependency that
/// has not been scheduled by the time its dependent is reached is an error.
pub fn schedule(projection: &Projection, start_date: NaiveDate) -> Result<Vec<ScheduledTask>, InstantiationError> {
    debug!(set = %projection.set_code, tasks = projection.len(), %start_date, "schedule: called");
    let mut ends: HashMap<&str, NaiveDate> = HashMap::with_capacity(projection.len());
    let mut scheduled = Vec::with_capacity(projection.len());

    for task in &projection.tasks {
        let mut start = start_date;
        for dep in &task.depends_on {
            let dep_end = ends.get(dep.as_str()).copied().ok_or_else(|| {
                InstantiationError::failed(format!("{} is scheduled before its dependency {}", task.code, dep))
            })?;
            start = start.max(dep_end);
        }

        let end = start
            .checked_add_days(Days::new(u64::from(task.est_duration_days)))
            .ok_or_else(|| InstantiationError::failed(format!("end date of {} is out of range", task.code)))?;

        ends.insert(task.code.as_str(), end);
        scheduled.push(ScheduledTask {
            code: task.code.clone(),
            start_date: start,
            end_date: end,
        });
    }

    Ok(scheduled)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ClosurePolicy, Selection};
    use crate::fixtures::residential;
    use crate::projection::project_selection;

    fn day(m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, m, d).unwrap()
    }

    #[test]
    fn test_house_schedule() {
        let projection =
            project_selection(&residential(), &Selection::preset("HOUSE"), ClosurePolicy::Strict).unwrap();
        let schedule = schedule(&projection, day(1, 1)).unwrap();

        let dates: Vec<(&str, NaiveDate, NaiveDate)> = schedule
            .iter()
            .map(|s| (s.code.as_str(), s.start_date, s.end_date))
            .collect();
        assert_eq!(
            dates,
            vec![
                ("ARC-C01", day(1, 1), day(1, 4)),
                ("ARC-C02", day(1, 4), day(1, 9)),
                ("MEP-C01", day(1, 4), day(1, 6)),
                ("ARC-D01", day(1, 9), day(1, 19)),
            ]
        );
    }

    #[test]
    fn test_zero_duration_task() {
        let mut projection =
            project_selection(&residential(), &Selection::preset("HOUSE"), ClosurePolicy::Strict).unwrap();
        projection.tasks[0].est_duration_days = 0;
        let schedule = schedule(&projection, day(1, 1)).unwrap();
        assert_eq!(schedule[0].start_date, schedule[0].end_date);
        assert_eq!(schedule[1].start_date, day(1, 1));
    }

    #[test]
    fn test_out_of_order_projection_fails() {
        let mut projection =
            project_selection(&residential(), &Selection::preset("HOUSE"), ClosurePolicy::Strict).unwrap();
        projection.tasks.swap(0, 1);
        assert!(matches!(
            schedule(&projection, day(1, 1)),
            Err(InstantiationError::InstantiationFailed { .. })
        ));
    }

    #[test]
    fn test_date_overflow_fails() {
        let projection =
            project_selection(&residential(), &Selection::preset("HOUSE"), ClosurePolicy::Strict).unwrap();
        assert!(schedule(&projection, NaiveDate::MAX).is_err());
    }
}
