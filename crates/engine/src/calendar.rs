//! Read-only day, week and month views over committed assignments.

use std::collections::HashMap;

use chrono::{Datelike, NaiveDate};
use serde::Serialize;

use crate::model::{Assignment, Job, JobStatus, Priority, StaffMember};
use crate::time::{Interval, TimePoint};

/// An assignment enriched with job and staff details for display.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarEntry {
    pub job_id: String,
    pub staff_id: String,
    pub start: TimePoint,
    pub end: TimePoint,
    pub duration_mins: u32,
    pub job_title: Option<String>,
    pub customer: Option<String>,
    pub priority: Option<Priority>,
    pub status: Option<JobStatus>,
    pub staff_name: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DaySchedule {
    pub date: NaiveDate,
    pub entries: Vec<CalendarEntry>,
}

/// Projection over a borrowed assignment set. Never mutates anything.
pub struct CalendarProjection<'a> {
    assignments: &'a [Assignment],
    jobs: HashMap<&'a str, &'a Job>,
    staff: HashMap<&'a str, &'a StaffMember>,
}

impl<'a> CalendarProjection<'a> {
    pub fn new(assignments: &'a [Assignment], jobs: &'a [Job], staff: &'a [StaffMember]) -> Self {
        CalendarProjection {
            assignments,
            jobs: jobs.iter().map(|j| (j.id.as_str(), j)).collect(),
            staff: staff.iter().map(|s| (s.id.as_str(), s)).collect(),
        }
    }

    /// Assignments touching `date`, sorted by start time.
    pub fn for_day(&self, date: NaiveDate) -> Vec<CalendarEntry> {
        let day = Interval::new(
            TimePoint::from_date(date),
            TimePoint::from_date(date + chrono::Duration::days(1)),
        );

        let mut hits: Vec<&Assignment> = self
            .assignments
            .iter()
            .filter(|a| a.interval().overlaps(&day))
            .collect();
        hits.sort_by(|a, b| (a.start, &a.staff_id, &a.job_id).cmp(&(b.start, &b.staff_id, &b.job_id)));

        hits.into_iter().map(|a| self.enrich(a)).collect()
    }

    /// Seven consecutive days starting at `week_start`.
    pub fn for_week(&self, week_start: NaiveDate) -> Vec<DaySchedule> {
        week_start
            .iter_days()
            .take(7)
            .map(|date| self.day_schedule(date))
            .collect()
    }

    /// Every day of the month containing `month_start`, from the 1st.
    pub fn for_month(&self, month_start: NaiveDate) -> Vec<DaySchedule> {
        let first = month_start - chrono::Duration::days(i64::from(month_start.day0()));
        first
            .iter_days()
            .take_while(|d| d.month() == first.month())
            .map(|date| self.day_schedule(date))
            .collect()
    }

    fn day_schedule(&self, date: NaiveDate) -> DaySchedule {
        DaySchedule {
            date,
            entries: self.for_day(date),
        }
    }

    fn enrich(&self, a: &Assignment) -> CalendarEntry {
        let job = self.jobs.get(a.job_id.as_str());
        let staff = self.staff.get(a.staff_id.as_str());
        CalendarEntry {
            job_id: a.job_id.clone(),
            staff_id: a.staff_id.clone(),
            start: a.start,
            end: a.end,
            duration_mins: a.duration_mins(),
            job_title: job.map(|j| j.title.clone()),
            customer: job.map(|j| j.customer.clone()),
            priority: job.map(|j| j.priority),
            status: job.map(|j| j.status),
            staff_name: staff.map(|s| s.name.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tp(s: &str) -> TimePoint {
        TimePoint::parse(s).unwrap()
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn assignment(job: &str, staff: &str, start: &str, end: &str) -> Assignment {
        Assignment {
            job_id: job.to_string(),
            staff_id: staff.to_string(),
            start: tp(start),
            end: tp(end),
        }
    }

    fn fixture() -> (Vec<Assignment>, Vec<Job>, Vec<StaffMember>) {
        let assignments = vec![
            assignment("late", "s1", "2024-03-04T14:00", "2024-03-04T15:00"),
            assignment("early", "s2", "2024-03-04T09:00", "2024-03-04T10:00"),
            assignment("tue", "s1", "2024-03-05T09:00", "2024-03-05T10:00"),
            assignment("april", "s1", "2024-04-01T09:00", "2024-04-01T10:00"),
        ];
        let jobs = vec![Job {
            title: "Business cards".to_string(),
            customer: "Acme".to_string(),
            priority: Priority::High,
            ..Job::new("early")
        }];
        let staff = vec![StaffMember {
            name: "Jane Smith".to_string(),
            ..StaffMember::new("s2")
        }];
        (assignments, jobs, staff)
    }

    #[test]
    fn test_day_is_sorted_and_enriched() {
        let (assignments, jobs, staff) = fixture();
        let projection = CalendarProjection::new(&assignments, &jobs, &staff);
        let day = projection.for_day(date(2024, 3, 4));
        let ids: Vec<&str> = day.iter().map(|e| e.job_id.as_str()).collect();
        assert_eq!(ids, vec!["early", "late"]);
        assert_eq!(day[0].job_title.as_deref(), Some("Business cards"));
        assert_eq!(day[0].staff_name.as_deref(), Some("Jane Smith"));
        assert_eq!(day[0].priority, Some(Priority::High));
        assert_eq!(day[1].job_title, None);
        assert_eq!(day[1].duration_mins, 60);
    }

    #[test]
    fn test_week_has_seven_days() {
        let (assignments, jobs, staff) = fixture();
        let projection = CalendarProjection::new(&assignments, &jobs, &staff);
        let week = projection.for_week(date(2024, 3, 4));
        assert_eq!(week.len(), 7);
        assert_eq!(week[0].entries.len(), 2);
        assert_eq!(week[1].entries.len(), 1);
        assert!(week[2..].iter().all(|d| d.entries.is_empty()));
    }

    #[test]
    fn test_month_groups_by_day() {
        let (assignments, jobs, staff) = fixture();
        let projection = CalendarProjection::new(&assignments, &jobs, &staff);
        let march = projection.for_month(date(2024, 3, 15));
        assert_eq!(march.len(), 31);
        assert_eq!(march[0].date, date(2024, 3, 1));
        let total: usize = march.iter().map(|d| d.entries.len()).sum();
        assert_eq!(total, 3);

        let april = projection.for_month(date(2024, 4, 1));
        assert_eq!(april.len(), 30);
        assert_eq!(april[0].entries[0].job_id, "april");
    }
}
