use std::cmp::Ordering;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use chrono::NaiveDate;

use crate::availability::AvailabilityIndex;
use crate::config::{ConfigError, SchedulerConfig};
use crate::conflict::{self, Conflict};
use crate::duration::{required_minutes, DurationError};
use crate::model::{Assignment, BatchResult, Job, JobFailure, JobStatus, Placement, StaffMember};
use crate::time::{subtract_all, Interval, TimePoint};

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Every variant is recoverable by the caller; a failed call leaves the
/// assignment set untouched.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SchedulingError {
    #[error("{0}")]
    InvalidDuration(#[from] DurationError),
    #[error("No staff member has {required_mins} free minutes for job '{job_id}' within {horizon_days} days")]
    NoCapacity {
        job_id: String,
        required_mins: u32,
        horizon_days: u32,
    },
    #[error("Slot for job '{job_id}' was taken by job '{overlapping_job_id}' on staff member '{staff_id}' -- schedule again")]
    Conflict {
        job_id: String,
        staff_id: String,
        overlapping_job_id: String,
    },
    #[error("Job '{0}' already has an assignment -- reschedule it instead")]
    AlreadyAssigned(String),
    #[error("Job '{job_id}' is {status:?} and cannot be scheduled")]
    NotSchedulable { job_id: String, status: JobStatus },
    #[error("Placement for job '{job_id}' is not valid: {reason}")]
    InvalidPlacement { job_id: String, reason: String },
}

impl SchedulingError {
    /// Stable machine-readable name of the variant.
    pub fn kind(&self) -> &'static str {
        match self {
            SchedulingError::InvalidDuration(_) => "invalidDuration",
            SchedulingError::NoCapacity { .. } => "noCapacity",
            SchedulingError::Conflict { .. } => "conflict",
            SchedulingError::AlreadyAssigned(_) => "alreadyAssigned",
            SchedulingError::NotSchedulable { .. } => "notSchedulable",
            SchedulingError::InvalidPlacement { .. } => "invalidPlacement",
        }
    }
}

// ---------------------------------------------------------------------------
// Clock
// ---------------------------------------------------------------------------

/// Source of "now" for the start of every search.
pub trait Clock: Send + Sync {
    fn now(&self) -> TimePoint;
}

/// Host wall clock, local time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> TimePoint {
        TimePoint::from_datetime(chrono::Local::now().naive_local())
    }
}

/// A clock stuck at one instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub TimePoint);

impl Clock for FixedClock {
    fn now(&self) -> TimePoint {
        self.0
    }
}

// ---------------------------------------------------------------------------
// Batch ordering
// ---------------------------------------------------------------------------

/// Order in which a batch of unscheduled jobs is offered to the allocator:
/// High before Medium before Low, then earliest due date, jobs without a due
/// date last. The sort is stable, so equal jobs keep their input order.
pub fn order_batch(jobs: &[Job]) -> Vec<&Job> {
    let mut ordered: Vec<&Job> = jobs.iter().collect();
    ordered.sort_by(|a, b| {
        b.priority
            .cmp(&a.priority)
            .then_with(|| match (a.due_date, b.due_date) {
                (Some(x), Some(y)) => x.cmp(&y),
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (None, None) => Ordering::Equal,
            })
    });
    ordered
}

// ---------------------------------------------------------------------------
// Scheduler
// ---------------------------------------------------------------------------

/// Owns the committed assignment set and places jobs against staff
/// availability.
///
/// Placement is earliest-fit: each candidate staff member is scanned forward
/// day by day from `max(as_of, now)`, and the first free slot long enough for
/// the job wins. Across candidates the earliest start wins, ties going to the
/// least-loaded staff member.
pub struct Scheduler {
    config: SchedulerConfig,
    index: AvailabilityIndex,
    /// Keyed by job id: a job holds at most one assignment.
    assignments: BTreeMap<String, Assignment>,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field("config", &self.config)
            .field("assignments", &self.assignments.len())
            .finish()
    }
}

impl Scheduler {
    pub fn new(staff: &[StaffMember], config: SchedulerConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let index = AvailabilityIndex::build(staff, &config);
        Ok(Scheduler {
            config,
            index,
            assignments: BTreeMap::new(),
            clock: Arc::new(SystemClock),
        })
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    pub fn index(&self) -> &AvailabilityIndex {
        &self.index
    }

    /// Replace the roster. Availability is recomputed from scratch; committed
    /// assignments are kept as they are.
    pub fn set_staff(&mut self, staff: &[StaffMember]) {
        self.index = AvailabilityIndex::build(staff, &self.config);
    }

    /// Bulk-load previously committed assignments, e.g. from the assignment
    /// log. Nothing is rejected; the overlaps found are returned for the
    /// caller to report.
    pub fn load_assignments<I>(&mut self, assignments: I) -> Vec<Conflict>
    where
        I: IntoIterator<Item = Assignment>,
    {
        for a in assignments {
            self.assignments.insert(a.job_id.clone(), a);
        }
        conflict::audit_all(self.assignments.values())
    }

    pub fn assignments(&self) -> impl Iterator<Item = &Assignment> {
        self.assignments.values()
    }

    pub fn assignment_for(&self, job_id: &str) -> Option<&Assignment> {
        self.assignments.get(job_id)
    }

    /// Owned copy of the committed set, ordered by job id.
    pub fn snapshot(&self) -> Vec<Assignment> {
        self.assignments.values().cloned().collect()
    }

    /// Total committed minutes for `staff_id`.
    pub fn booked_mins(&self, staff_id: &str) -> u32 {
        self.booked_mins_excluding(staff_id, None)
    }

    fn booked_mins_excluding(&self, staff_id: &str, ignore_job: Option<&str>) -> u32 {
        self.assignments
            .values()
            .filter(|a| a.staff_id == staff_id && Some(a.job_id.as_str()) != ignore_job)
            .map(Assignment::duration_mins)
            .sum()
    }

    // -----------------------------------------------------------------------
    // Planning (read-only)
    // -----------------------------------------------------------------------

    /// Find a slot for `job` without committing it.
    ///
    /// `candidates` restricts the pool; an empty slice means the whole
    /// active roster. A preferred staff member present in the roster narrows
    /// the pool to just them. The job's own current assignment, if any, is
    /// treated as free time so the same call serves reschedules.
    pub fn plan(
        &self,
        job: &Job,
        candidates: &[String],
        as_of: TimePoint,
    ) -> Result<Placement, SchedulingError> {
        if !job.status.is_schedulable() {
            return Err(SchedulingError::NotSchedulable {
                job_id: job.id.clone(),
                status: job.status,
            });
        }
        let required = required_minutes(job, self.config.granularity_mins)?;

        let from = as_of
            .max(self.clock.now())
            .ceil_to(self.config.granularity_mins);
        let first_day = from.date();
        let no_capacity = || SchedulingError::NoCapacity {
            job_id: job.id.clone(),
            required_mins: required,
            horizon_days: self.config.horizon_days,
        };
        let horizon_end = first_day
            .checked_add_signed(chrono::Duration::days(i64::from(self.config.horizon_days)))
            .ok_or_else(no_capacity)?;

        let mut best: Option<(TimePoint, &str)> = None;
        for staff_id in self.rank_candidates(job, candidates) {
            // A later candidate only matters if it can start strictly earlier.
            let limit = best.map(|(start, _)| start);
            if let Some(start) =
                self.earliest_fit(staff_id, &job.id, required, from, horizon_end, limit)
            {
                best = Some((start, staff_id));
            }
        }

        let Some((start, staff_id)) = best else {
            return Err(no_capacity());
        };

        let end = start.add_minutes(i64::from(required));
        let status = match job.status {
            JobStatus::NotStarted => JobStatus::Pending,
            other => other,
        };
        Ok(Placement {
            assignment: Assignment {
                job_id: job.id.clone(),
                staff_id: staff_id.to_string(),
                start,
                end,
            },
            due_date_at_risk: job.due_date.is_some_and(|due| end > due),
            status,
        })
    }

    /// Candidate staff for `job`, least-loaded first, roster order breaking
    /// ties.
    fn rank_candidates<'a>(&'a self, job: &Job, candidates: &'a [String]) -> Vec<&'a str> {
        if let Some(preferred) = job.preferred_staff_id.as_deref() {
            if self.index.is_active(preferred) {
                if let Some(id) = self.index.staff_ids().find(|id| *id == preferred) {
                    return vec![id];
                }
            }
        }

        let mut pool: Vec<&str> = if candidates.is_empty() {
            self.index.staff_ids().collect()
        } else {
            candidates.iter().map(String::as_str).collect()
        };
        let mut seen: HashSet<&str> = HashSet::new();
        pool.retain(|id| self.index.is_active(id) && seen.insert(*id));

        let mut ranked: Vec<(u32, usize, &str)> = pool
            .into_iter()
            .map(|id| {
                (
                    self.booked_mins_excluding(id, Some(job.id.as_str())),
                    self.index.roster_position(id).unwrap_or(usize::MAX),
                    id,
                )
            })
            .collect();
        ranked.sort();
        ranked.into_iter().map(|(_, _, id)| id).collect()
    }

    /// Earliest start for `required` minutes on `staff_id` at or after
    /// `from`, before `horizon_end`. With `limit`, only starts strictly
    /// earlier than it are of interest.
    fn earliest_fit(
        &self,
        staff_id: &str,
        job_id: &str,
        required: u32,
        from: TimePoint,
        horizon_end: NaiveDate,
        limit: Option<TimePoint>,
    ) -> Option<TimePoint> {
        let granularity = self.config.granularity_mins;
        let capacity = self.index.daily_capacity_mins(staff_id);
        let booked: Vec<Interval> = self
            .assignments
            .values()
            .filter(|a| a.staff_id == staff_id && a.job_id != job_id)
            .map(Assignment::interval)
            .collect();

        for date in from.date().iter_days().take_while(|d| *d < horizon_end) {
            if limit.is_some_and(|l| TimePoint::from_date(date) >= l) {
                return None;
            }

            if !self.config.allow_overbooking {
                let day_booked: u32 = booked
                    .iter()
                    .filter(|iv| iv.start.date() == date)
                    .map(Interval::duration_mins)
                    .sum();
                if day_booked.saturating_add(required) > capacity {
                    continue;
                }
            }

            for free in self.index.free_intervals(staff_id, date) {
                let Some(free) = free.intersect(&Interval::new(from, free.end)) else {
                    continue;
                };
                for piece in subtract_all(free, &booked) {
                    let Some(piece) = piece.snap_inward(granularity) else {
                        continue;
                    };
                    if piece.duration_mins() >= required {
                        return match limit {
                            Some(l) if piece.start >= l => None,
                            _ => Some(piece.start),
                        };
                    }
                }
            }
        }
        None
    }

    // -----------------------------------------------------------------------
    // Mutation
    // -----------------------------------------------------------------------

    /// Re-check a planned slot against the current set and insert it,
    /// replacing any earlier assignment of the same job.
    ///
    /// Placements are expected to come from `plan`. Anything else is only
    /// checked for shape: an active staff member and a non-empty slot on the
    /// granularity grid. Fails with `Conflict` if the slot was taken after
    /// the plan was made.
    pub fn commit(&mut self, placement: &Placement) -> Result<Assignment, SchedulingError> {
        let proposed = &placement.assignment;
        self.check_shape(proposed)?;
        conflict::validate(
            &proposed.staff_id,
            &proposed.interval(),
            self.assignments.values(),
            Some(proposed.job_id.as_str()),
        )
        .map_err(|taken| SchedulingError::Conflict {
            job_id: proposed.job_id.clone(),
            staff_id: taken.staff_id,
            overlapping_job_id: taken.overlapping_job_id,
        })?;

        self.assignments
            .insert(proposed.job_id.clone(), proposed.clone());
        Ok(proposed.clone())
    }

    fn check_shape(&self, proposed: &Assignment) -> Result<(), SchedulingError> {
        let invalid = |reason: String| SchedulingError::InvalidPlacement {
            job_id: proposed.job_id.clone(),
            reason,
        };
        let g = self.config.granularity_mins;

        if !self.index.is_active(&proposed.staff_id) {
            return Err(invalid(format!(
                "staff member '{}' is not on the active roster",
                proposed.staff_id
            )));
        }
        if proposed.end <= proposed.start {
            return Err(invalid(format!(
                "slot {} - {} is empty",
                proposed.start, proposed.end
            )));
        }
        if proposed.start.ceil_to(g) != proposed.start || proposed.duration_mins() % g != 0 {
            return Err(invalid(format!(
                "slot {} - {} is off the {}-minute grid",
                proposed.start, proposed.end, g
            )));
        }
        Ok(())
    }

    /// Place a job that has no assignment yet.
    pub fn schedule(
        &mut self,
        job: &Job,
        candidates: &[String],
        as_of: TimePoint,
    ) -> Result<Placement, SchedulingError> {
        if self.assignments.contains_key(&job.id) {
            return Err(SchedulingError::AlreadyAssigned(job.id.clone()));
        }
        let placement = self.plan(job, candidates, as_of)?;
        self.commit(&placement)?;
        Ok(placement)
    }

    /// Move a job to a freshly computed slot. The old assignment is replaced
    /// only if a new slot is found; on failure it stays where it was.
    pub fn reschedule(
        &mut self,
        job: &Job,
        candidates: &[String],
        as_of: TimePoint,
    ) -> Result<Placement, SchedulingError> {
        let placement = self.plan(job, candidates, as_of)?;
        self.commit(&placement)?;
        Ok(placement)
    }

    /// Drop the job's assignment. Cancelling an unassigned job is a no-op.
    pub fn cancel(&mut self, job_id: &str) -> Option<Assignment> {
        self.assignments.remove(job_id)
    }

    /// Schedule every job in `jobs` that has no assignment yet, in batch
    /// order (see `order_batch`).
    pub fn schedule_batch(&mut self, jobs: &[Job], as_of: TimePoint) -> BatchResult {
        let mut result = BatchResult::default();

        for job in order_batch(jobs) {
            if self.assignments.contains_key(&job.id) {
                result.warnings.push(format!(
                    "Job '{}' already has an assignment -- left in place",
                    job.id
                ));
                continue;
            }
            if let Some(preferred) = job.preferred_staff_id.as_deref() {
                if !self.index.is_active(preferred) {
                    result.warnings.push(format!(
                        "Job '{}' prefers staff member '{}' who is not on the active roster -- assigning from all staff",
                        job.id, preferred
                    ));
                }
            }

            match self.schedule(job, &[], as_of) {
                Ok(placement) => {
                    if placement.due_date_at_risk {
                        result.warnings.push(format!(
                            "Job '{}' finishes at {} which is after its due date",
                            job.id, placement.assignment.end
                        ));
                    }
                    result.placed.push(placement);
                }
                Err(e) => result.failed.push(JobFailure {
                    job_id: job.id.clone(),
                    kind: e.kind().to_string(),
                    error: e.to_string(),
                }),
            }
        }

        result
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
