//! Derives how long a job occupies a staff member.

use crate::model::{Job, JobPhaseBreakdown};
use crate::time::ceil_to_granularity;

#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum DurationError {
    #[error("Job '{0}' has no product phases and no time estimate")]
    NotDerivable(String),
    #[error("Job '{0}' adds up to zero minutes of work")]
    Zero(String),
    #[error("Job '{0}' needs more minutes than can be scheduled")]
    TooLong(String),
}

/// Sum of all phases of all lines, rounded up to `granularity`. `None` on
/// overflow.
pub fn phases_total_mins(phases: &[JobPhaseBreakdown], granularity: u32) -> Option<u32> {
    let raw = phases.iter().try_fold(0u32, |acc, p| {
        acc.checked_add(p.setup_mins)?
            .checked_add(p.production_mins)?
            .checked_add(p.finishing_mins)
    })?;
    ceil_to_granularity(raw, granularity)
}

/// Required minutes for `job`: always a positive multiple of `granularity`.
///
/// Product phases win; the manual estimate is only consulted when the job has
/// no product lines.
pub fn required_minutes(job: &Job, granularity: u32) -> Result<u32, DurationError> {
    let mins = if !job.products.is_empty() {
        phases_total_mins(&job.products, granularity)
    } else {
        match job.estimated_mins {
            Some(estimate) => ceil_to_granularity(estimate, granularity),
            None => return Err(DurationError::NotDerivable(job.id.clone())),
        }
    }
    .ok_or_else(|| DurationError::TooLong(job.id.clone()))?;

    if mins == 0 {
        return Err(DurationError::Zero(job.id.clone()));
    }
    Ok(mins)
}
