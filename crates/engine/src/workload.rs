//! Staff utilization over a day or a week.

use chrono::NaiveDate;
use serde::Serialize;

use crate::availability::AvailabilityIndex;
use crate::model::{Assignment, StaffMember};

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StaffWorkload {
    pub staff_id: String,
    pub staff_name: String,
    pub assigned_mins: u32,
    /// Workable minutes in the period: the daily capacity, capped by the
    /// free time left after blocked intervals, summed over working days.
    pub capacity_mins: u32,
    pub remaining_mins: u32,
    pub utilization_pct: f64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WorkloadReport {
    pub from: NaiveDate,
    pub days: u32,
    pub staff: Vec<StaffWorkload>,
    pub total_assigned_mins: u32,
    pub total_capacity_mins: u32,
    pub utilization_pct: f64,
}

fn percent(part: u32, whole: u32) -> f64 {
    if whole == 0 {
        return 0.0;
    }
    (f64::from(part) * 1000.0 / f64::from(whole)).round() / 10.0
}

/// Utilization of every active staff member over `days` days from `from`.
pub fn workload(
    assignments: &[Assignment],
    staff: &[StaffMember],
    index: &AvailabilityIndex,
    from: NaiveDate,
    days: u32,
) -> WorkloadReport {
    let dates: Vec<NaiveDate> = from.iter_days().take(days as usize).collect();

    let rows: Vec<StaffWorkload> = staff
        .iter()
        .filter(|s| s.active)
        .map(|member| {
            let capacity_mins: u32 = dates
                .iter()
                .map(|d| {
                    let free: u32 = index
                        .free_intervals(&member.id, *d)
                        .iter()
                        .map(|iv| iv.duration_mins())
                        .sum();
                    free.min(index.daily_capacity_mins(&member.id))
                })
                .sum();
            let assigned_mins: u32 = assignments
                .iter()
                .filter(|a| a.staff_id == member.id && dates.contains(&a.start.date()))
                .map(Assignment::duration_mins)
                .sum();

            StaffWorkload {
                staff_id: member.id.clone(),
                staff_name: member.name.clone(),
                assigned_mins,
                capacity_mins,
                remaining_mins: capacity_mins.saturating_sub(assigned_mins),
                utilization_pct: percent(assigned_mins, capacity_mins),
            }
        })
        .collect();

    let total_assigned_mins = rows.iter().map(|r| r.assigned_mins).sum();
    let total_capacity_mins = rows.iter().map(|r| r.capacity_mins).sum();

    WorkloadReport {
        from,
        days,
        staff: rows,
        total_assigned_mins,
        total_capacity_mins,
        utilization_pct: percent(total_assigned_mins, total_capacity_mins),
    }
}
