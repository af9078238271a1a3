//! Thread-safe front for a `Scheduler`.
//!
//! Writers (`commit`, `schedule`, `reschedule`, `cancel`) are serialized by a
//! write lock. Readers (`plan`, `snapshot`, `audit`) share a read lock and
//! always see a consistent assignment set. A plan made under the read lock
//! may go stale before it is committed; `commit` re-checks it and reports
//! `SchedulingError::Conflict` instead of double-booking.

use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::allocator::{Scheduler, SchedulingError};
use crate::conflict::{self, Conflict};
use crate::model::{Assignment, Job, Placement};
use crate::time::TimePoint;

#[derive(Debug)]
pub struct SchedulingService {
    inner: RwLock<Scheduler>,
}

impl SchedulingService {
    pub fn new(scheduler: Scheduler) -> Self {
        SchedulingService {
            inner: RwLock::new(scheduler),
        }
    }

    // The scheduler only mutates after every check has passed, so a panic
    // while holding the lock cannot leave a half-applied change behind.
    fn read(&self) -> RwLockReadGuard<'_, Scheduler> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Scheduler> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run `f` against a consistent view of the scheduler.
    pub fn with_scheduler<R>(&self, f: impl FnOnce(&Scheduler) -> R) -> R {
        f(&self.read())
    }

    pub fn plan(
        &self,
        job: &Job,
        candidates: &[String],
        as_of: TimePoint,
    ) -> Result<Placement, SchedulingError> {
        self.read().plan(job, candidates, as_of)
    }

    pub fn commit(&self, placement: &Placement) -> Result<Assignment, SchedulingError> {
        self.write().commit(placement)
    }

    pub fn schedule(
        &self,
        job: &Job,
        candidates: &[String],
        as_of: TimePoint,
    ) -> Result<Placement, SchedulingError> {
        self.write().schedule(job, candidates, as_of)
    }

    pub fn reschedule(
        &self,
        job: &Job,
        candidates: &[String],
        as_of: TimePoint,
    ) -> Result<Placement, SchedulingError> {
        self.write().reschedule(job, candidates, as_of)
    }

    pub fn cancel(&self, job_id: &str) -> Option<Assignment> {
        self.write().cancel(job_id)
    }

    pub fn snapshot(&self) -> Vec<Assignment> {
        self.read().snapshot()
    }

    /// Overlap audit of the current set. Works on a copy so the lock is not
    /// held for the scan.
    pub fn audit(&self) -> Vec<Conflict> {
        let snapshot = self.snapshot();
        conflict::audit_all(&snapshot)
    }

    pub fn into_inner(self) -> Scheduler {
        self.inner.into_inner().unwrap_or_else(PoisonError::into_inner)
    }
}
