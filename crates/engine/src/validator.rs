use std::collections::HashSet;

use serde::Serialize;

use crate::availability::AvailabilityIndex;
use crate::config::SchedulerConfig;
use crate::duration::required_minutes;
use crate::model::{Job, StaffMember};
use crate::time::format_duration;

// ---------------------------------------------------------------------------
// Validation result types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct ValidationResult {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ValidationResult {
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Validate implementation
// ---------------------------------------------------------------------------

/// Validate a roster and a set of jobs at the hand-off boundary, returning
/// errors (block scheduling) and warnings (advisory). Errors are listed
/// before warnings.
pub fn validate(staff: &[StaffMember], jobs: &[Job], config: &SchedulerConfig) -> ValidationResult {
    let mut errors: Vec<String> = Vec::new();
    let mut warnings: Vec<String> = Vec::new();

    if let Err(e) = config.validate() {
        errors.push(format!("Invalid configuration -- {}", e));
        return ValidationResult { errors, warnings };
    }

    // -----------------------------------------------------------------------
    // Error: duplicate IDs
    // -----------------------------------------------------------------------
    {
        let mut seen: HashSet<&str> = HashSet::new();
        for member in staff {
            if !seen.insert(member.id.as_str()) {
                errors.push(format!(
                    "Duplicate staff ID '{}' -- each staff member must have a unique ID",
                    member.id
                ));
            }
        }

        let mut seen: HashSet<&str> = HashSet::new();
        for job in jobs {
            if !seen.insert(job.id.as_str()) {
                errors.push(format!(
                    "Duplicate job ID '{}' -- each job must have a unique ID",
                    job.id
                ));
            }
        }
    }

    // -----------------------------------------------------------------------
    // Per-staff errors
    // -----------------------------------------------------------------------
    for member in staff {
        if let Some(windows) = &member.working_windows {
            for (day, window) in windows {
                if window.end <= window.start {
                    errors.push(format!(
                        "Staff member '{}' works {}-{} on {} -- the window must end after it starts",
                        member.id, window.start, window.end, day
                    ));
                }
            }
        }
        for blocked in &member.blocked_intervals {
            if blocked.is_empty() {
                errors.push(format!(
                    "Staff member '{}' has a blocked interval ending before it starts ({} - {})",
                    member.id, blocked.start, blocked.end
                ));
            }
        }
    }

    // -----------------------------------------------------------------------
    // Per-job errors
    // -----------------------------------------------------------------------
    for job in jobs {
        if let Err(e) = required_minutes(job, config.granularity_mins) {
            errors.push(format!("{} -- add product times or an estimate", e));
        }
    }

    // -----------------------------------------------------------------------
    // Warnings
    // -----------------------------------------------------------------------
    let index = AvailabilityIndex::build(staff, config);
    warnings.extend(
        index
            .warnings()
            .iter()
            .filter(|w| w.contains("merged"))
            .cloned(),
    );

    let active: Vec<&StaffMember> = staff.iter().filter(|s| s.active).collect();
    if active.is_empty() {
        warnings.push("No active staff members -- nothing can be scheduled".to_string());
    }

    let longest_day = active
        .iter()
        .map(|s| {
            index
                .longest_window_mins(&s.id)
                .min(index.daily_capacity_mins(&s.id))
        })
        .max()
        .unwrap_or(0);

    for job in jobs {
        if !job.status.is_schedulable() {
            warnings.push(format!(
                "Job '{}' is {:?} -- it will not be scheduled",
                job.id, job.status
            ));
        }

        if let Some(preferred) = &job.preferred_staff_id {
            if !index.is_active(preferred) {
                warnings.push(format!(
                    "Job '{}' prefers staff member '{}' who is not on the active roster",
                    job.id, preferred
                ));
            }
        }

        if let Ok(required) = required_minutes(job, config.granularity_mins) {
            if !active.is_empty() && required > longest_day {
                warnings.push(format!(
                    "Job '{}' needs {} but no staff member can work that long in one day -- it can never be placed",
                    job.id,
                    format_duration(required)
                ));
            }
        }
    }

    ValidationResult { errors, warnings }
}
