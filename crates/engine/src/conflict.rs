//! Conflict detection over a set of assignments.
//!
//! `validate` is the pre-commit check the allocator runs for a single slot.
//! `audit_all` and `audit` scan a whole assignment set, e.g. after loading
//! persisted state or after manual edits. Findings are reported only; nothing
//! here moves or removes an assignment.

use std::collections::{BTreeMap, HashMap};

use chrono::NaiveDate;
use serde::Serialize;

use crate::availability::AvailabilityIndex;
use crate::duration::required_minutes;
use crate::model::{Assignment, Job};
use crate::time::{Interval, TimePoint};

// ---------------------------------------------------------------------------
// Result types
// ---------------------------------------------------------------------------

/// The proposed slot collides with an existing assignment of the same staff
/// member.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SlotTaken {
    pub staff_id: String,
    pub overlapping_job_id: String,
}

/// A problem found by an audit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum Conflict {
    /// Two assignments of one staff member share time.
    Overlap {
        staff_id: String,
        job_id: String,
        overlapping_job_id: String,
        start: TimePoint,
        end: TimePoint,
    },
    /// A staff member's bookings on one day exceed their daily capacity.
    OverCapacity {
        staff_id: String,
        date: NaiveDate,
        booked_mins: u32,
        capacity_mins: u32,
    },
    /// The assignment finishes after the job is due.
    DueDateViolation {
        job_id: String,
        staff_id: String,
        end: TimePoint,
        due_date: TimePoint,
    },
    /// The assignment is shorter or longer than the job requires.
    DurationMismatch {
        job_id: String,
        required_mins: u32,
        assigned_mins: u32,
    },
}

impl Conflict {
    pub fn describe(&self) -> String {
        match self {
            Conflict::Overlap {
                staff_id,
                job_id,
                overlapping_job_id,
                start,
                end,
            } => format!(
                "Jobs '{}' and '{}' overlap for staff member '{}' between {} and {}",
                overlapping_job_id, job_id, staff_id, start, end
            ),
            Conflict::OverCapacity {
                staff_id,
                date,
                booked_mins,
                capacity_mins,
            } => format!(
                "Staff member '{}' is booked {} minutes on {} but can work {}",
                staff_id, booked_mins, date, capacity_mins
            ),
            Conflict::DueDateViolation {
                job_id,
                end,
                due_date,
                ..
            } => format!(
                "Job '{}' finishes at {} but is due {}",
                job_id, end, due_date
            ),
            Conflict::DurationMismatch {
                job_id,
                required_mins,
                assigned_mins,
            } => format!(
                "Job '{}' needs {} minutes but is assigned {}",
                job_id, required_mins, assigned_mins
            ),
        }
    }
}

// ---------------------------------------------------------------------------
// Single-slot check
// ---------------------------------------------------------------------------

/// Check `proposed` for `staff_id` against `existing`.
///
/// Only same-staff overlap counts; other staff members' assignments are
/// ignored. `ignore_job` excludes one job's own assignment, for reschedules.
pub fn validate<'a, I>(
    staff_id: &str,
    proposed: &Interval,
    existing: I,
    ignore_job: Option<&str>,
) -> Result<(), SlotTaken>
where
    I: IntoIterator<Item = &'a Assignment>,
{
    let hit = existing.into_iter().find(|a| {
        a.staff_id == staff_id
            && Some(a.job_id.as_str()) != ignore_job
            && a.interval().overlaps(proposed)
    });
    match hit {
        Some(a) => Err(SlotTaken {
            staff_id: staff_id.to_string(),
            overlapping_job_id: a.job_id.clone(),
        }),
        None => Ok(()),
    }
}

// ---------------------------------------------------------------------------
// Whole-set audits
// ---------------------------------------------------------------------------

/// Same-staff overlaps across the whole set.
///
/// Assignments are grouped per staff member and sorted by start, so each
/// group is scanned once against the furthest-reaching assignment seen so far.
pub fn audit_all<'a, I>(assignments: I) -> Vec<Conflict>
where
    I: IntoIterator<Item = &'a Assignment>,
{
    let mut by_staff: BTreeMap<&str, Vec<&Assignment>> = BTreeMap::new();
    for a in assignments {
        by_staff.entry(a.staff_id.as_str()).or_default().push(a);
    }

    let mut conflicts = Vec::new();
    for (staff_id, mut list) in by_staff {
        list.sort_by(|a, b| (a.start, a.end, &a.job_id).cmp(&(b.start, b.end, &b.job_id)));

        let mut reach: Option<&Assignment> = None;
        for a in list {
            if let Some(r) = reach {
                if a.start < r.end {
                    conflicts.push(Conflict::Overlap {
                        staff_id: staff_id.to_string(),
                        job_id: a.job_id.clone(),
                        overlapping_job_id: r.job_id.clone(),
                        start: a.start,
                        end: a.end.min(r.end),
                    });
                }
                if a.end > r.end {
                    reach = Some(a);
                }
            } else {
                reach = Some(a);
            }
        }
    }
    conflicts
}

/// What a full audit may check assignments against.
#[derive(Debug, Clone, Copy)]
pub struct AuditContext<'a> {
    /// Enables the daily-capacity check.
    pub index: Option<&'a AvailabilityIndex>,
    /// Enables the due-date and duration checks for the jobs listed.
    pub jobs: &'a [Job],
    pub granularity: u32,
}

/// Overlaps plus, where context allows, capacity, due-date and duration
/// checks.
pub fn audit(assignments: &[Assignment], ctx: &AuditContext<'_>) -> Vec<Conflict> {
    let mut conflicts = audit_all(assignments);

    if let Some(index) = ctx.index {
        let mut booked: BTreeMap<(&str, NaiveDate), u32> = BTreeMap::new();
        for a in assignments {
            *booked
                .entry((a.staff_id.as_str(), a.start.date()))
                .or_default() += a.duration_mins();
        }
        for ((staff_id, date), booked_mins) in booked {
            if !index.contains(staff_id) {
                continue;
            }
            let capacity_mins = index.daily_capacity_mins(staff_id);
            if booked_mins > capacity_mins {
                conflicts.push(Conflict::OverCapacity {
                    staff_id: staff_id.to_string(),
                    date,
                    booked_mins,
                    capacity_mins,
                });
            }
        }
    }

    if !ctx.jobs.is_empty() {
        let jobs: HashMap<&str, &Job> = ctx.jobs.iter().map(|j| (j.id.as_str(), j)).collect();
        for a in assignments {
            let Some(job) = jobs.get(a.job_id.as_str()) else {
                continue;
            };
            if let Some(due) = job.due_date {
                if a.end > due {
                    conflicts.push(Conflict::DueDateViolation {
                        job_id: a.job_id.clone(),
                        staff_id: a.staff_id.clone(),
                        end: a.end,
                        due_date: due,
                    });
                }
            }
            if let Ok(required) = required_minutes(job, ctx.granularity) {
                if required != a.duration_mins() {
                    conflicts.push(Conflict::DurationMismatch {
                        job_id: a.job_id.clone(),
                        required_mins: required,
                        assigned_mins: a.duration_mins(),
                    });
                }
            }
        }
    }

    conflicts
}
