/// End-to-end allocation scenarios against the library API.
///
/// Every scenario pins the clock to Monday 2024-03-04 00:00 so results do
/// not depend on when the tests run.
use std::collections::HashMap;
use std::sync::Arc;

use chrono::Weekday;

use pressroom_engine::allocator::{FixedClock, Scheduler, SchedulingError};
use pressroom_engine::config::SchedulerConfig;
use pressroom_engine::conflict;
use pressroom_engine::duration::required_minutes;
use pressroom_engine::model::{Assignment, Job, JobPhaseBreakdown, Priority, StaffMember, WorkWindow};
use pressroom_engine::time::{Interval, TimeOfDay, TimePoint};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

const MONDAY: &str = "2024-03-04T00:00";

fn tp(s: &str) -> TimePoint {
    TimePoint::parse(s).unwrap()
}

fn hours(start: u32, end: u32) -> WorkWindow {
    WorkWindow {
        start: TimeOfDay::new(start, 0).unwrap(),
        end: TimeOfDay::new(end, 0).unwrap(),
    }
}

fn make_staff(id: &str, days: &[Weekday], window: WorkWindow) -> StaffMember {
    let windows: HashMap<Weekday, WorkWindow> = days.iter().map(|d| (*d, window)).collect();
    StaffMember {
        working_windows: Some(windows),
        ..StaffMember::new(id)
    }
}

fn weekdays() -> Vec<Weekday> {
    vec![Weekday::Mon, Weekday::Tue, Weekday::Wed, Weekday::Thu, Weekday::Fri]
}

fn make_job(id: &str, mins: u32) -> Job {
    Job {
        products: vec![JobPhaseBreakdown {
            production_mins: mins,
            quantity: 1,
            ..JobPhaseBreakdown::default()
        }],
        ..Job::new(id)
    }
}

fn make_scheduler(staff: &[StaffMember], config: SchedulerConfig) -> Scheduler {
    Scheduler::new(staff, config)
        .unwrap()
        .with_clock(Arc::new(FixedClock(tp(MONDAY))))
}

fn assert_no_overlaps(assignments: &[Assignment]) {
    let conflicts = conflict::audit_all(assignments);
    assert!(conflicts.is_empty(), "overlapping assignments: {:?}", conflicts);
}

// ---------------------------------------------------------------------------
// Scenario A: a preferred staff member gets the first slot of the day
// ---------------------------------------------------------------------------

#[test]
fn preferred_staff_first_slot() {
    let staff = vec![
        make_staff("other", &weekdays(), hours(9, 17)),
        make_staff("s", &weekdays(), hours(9, 17)),
    ];
    let mut scheduler = make_scheduler(&staff, SchedulerConfig::default());
    let job = Job {
        preferred_staff_id: Some("s".to_string()),
        ..make_job("j", 120)
    };

    let placement = scheduler.schedule(&job, &[], tp(MONDAY)).unwrap();
    assert_eq!(placement.assignment.staff_id, "s");
    assert_eq!(placement.assignment.start, tp("2024-03-04T09:00"));
    assert_eq!(placement.assignment.end, tp("2024-03-04T11:00"));
}

// ---------------------------------------------------------------------------
// Scenario B: blocked time pushes the start back
// ---------------------------------------------------------------------------

#[test]
fn blocked_interval_delays_start() {
    let staff = vec![StaffMember {
        blocked_intervals: vec![Interval::new(tp("2024-03-04T09:00"), tp("2024-03-04T10:00"))],
        ..make_staff("s", &weekdays(), hours(9, 17))
    }];
    let mut scheduler = make_scheduler(&staff, SchedulerConfig::default());

    let placement = scheduler.schedule(&make_job("j", 90), &[], tp(MONDAY)).unwrap();
    assert_eq!(placement.assignment.start, tp("2024-03-04T10:00"));
    assert_eq!(placement.assignment.end, tp("2024-03-04T11:30"));
}

// ---------------------------------------------------------------------------
// Scenario C: a fully booked week leaves no capacity within the horizon
// ---------------------------------------------------------------------------

#[test]
fn full_week_is_no_capacity() {
    let staff = vec![make_staff("s", &weekdays(), hours(9, 17))];
    let config = SchedulerConfig {
        horizon_days: 7,
        ..SchedulerConfig::default()
    };
    let mut scheduler = make_scheduler(&staff, config);

    for day in 4..9 {
        let job = make_job(&format!("day-{}", day), 480);
        let placement = scheduler.schedule(&job, &[], tp(MONDAY)).unwrap();
        assert_eq!(
            placement.assignment.start,
            tp(&format!("2024-03-{:02}T09:00", day))
        );
    }

    let err = scheduler
        .schedule(&make_job("late", 60), &[], tp(MONDAY))
        .unwrap_err();
    assert!(matches!(err, SchedulingError::NoCapacity { horizon_days: 7, .. }));
    assert_eq!(scheduler.snapshot().len(), 5);
}

// ---------------------------------------------------------------------------
// Scenario D: High priority is offered the earlier slot
// ---------------------------------------------------------------------------

#[test]
fn high_priority_goes_first() {
    let staff = vec![make_staff("s", &weekdays(), hours(9, 11))];
    let mut scheduler = make_scheduler(&staff, SchedulerConfig::default());
    // J1 is due today, J2 in ten days.
    let jobs = vec![
        Job {
            priority: Priority::Low,
            due_date: Some(tp("2024-03-14T17:00")),
            ..make_job("j2", 120)
        },
        Job {
            priority: Priority::High,
            due_date: Some(tp("2024-03-04T17:00")),
            ..make_job("j1", 120)
        },
    ];

    let result = scheduler.schedule_batch(&jobs, tp(MONDAY));
    assert!(result.failed.is_empty());
    assert!(result.placed.iter().all(|p| !p.due_date_at_risk));
    assert!(result.warnings.is_empty());
    let j1 = scheduler.assignment_for("j1").unwrap();
    let j2 = scheduler.assignment_for("j2").unwrap();
    assert_eq!(j1.start, tp("2024-03-04T09:00"));
    assert_eq!(j2.start, tp("2024-03-05T09:00"));
}

// ---------------------------------------------------------------------------
// Scenario E: a plan overtaken by another commit is rejected
// ---------------------------------------------------------------------------

#[test]
fn stale_plan_is_rejected() {
    let staff = vec![make_staff("s", &weekdays(), hours(9, 17))];
    let mut scheduler = make_scheduler(&staff, SchedulerConfig::default());

    let first = scheduler.plan(&make_job("a", 60), &[], tp(MONDAY)).unwrap();
    let second = scheduler.plan(&make_job("b", 60), &[], tp(MONDAY)).unwrap();
    assert_eq!(first.assignment.start, second.assignment.start);

    scheduler.commit(&first).unwrap();
    let err = scheduler.commit(&second).unwrap_err();
    assert_eq!(
        err,
        SchedulingError::Conflict {
            job_id: "b".to_string(),
            staff_id: "s".to_string(),
            overlapping_job_id: "a".to_string(),
        }
    );
    assert_eq!(scheduler.snapshot(), vec![first.assignment]);
}

// ---------------------------------------------------------------------------
// Invariants over a busy batch
// ---------------------------------------------------------------------------

fn busy_batch() -> Vec<Job> {
    (0..24)
        .map(|i| Job {
            priority: match i % 3 {
                0 => Priority::High,
                1 => Priority::Medium,
                _ => Priority::Low,
            },
            ..make_job(&format!("job-{:02}", i), 25 + (i % 7) * 35)
        })
        .collect()
}

#[test]
fn batch_never_double_books() {
    let staff = vec![
        make_staff("a", &weekdays(), hours(8, 16)),
        make_staff("b", &weekdays(), hours(10, 18)),
        StaffMember {
            blocked_intervals: vec![Interval::new(
                tp("2024-03-05T00:00"),
                tp("2024-03-07T00:00"),
            )],
            ..make_staff("c", &weekdays(), hours(9, 17))
        },
    ];
    let mut scheduler = make_scheduler(&staff, SchedulerConfig::default());
    let jobs = busy_batch();

    let result = scheduler.schedule_batch(&jobs, tp(MONDAY));
    assert!(result.failed.is_empty(), "unexpected failures: {:?}", result.failed);
    assert_eq!(result.placed.len(), jobs.len());

    let snapshot = scheduler.snapshot();
    assert_no_overlaps(&snapshot);

    for a in &snapshot {
        let job = jobs.iter().find(|j| j.id == a.job_id).unwrap();
        let required = required_minutes(job, 30).unwrap();
        assert_eq!(a.duration_mins(), required);
        assert_eq!(required % 30, 0);
        assert!(a.start >= tp(MONDAY));
        // Staff c is away Tuesday and Wednesday.
        if a.staff_id == "c" {
            let day = a.start.date().format("%a").to_string();
            assert!(day != "Tue" && day != "Wed", "c booked on {}", day);
        }
    }
}

#[test]
fn cancel_and_reschedule_keep_the_set_consistent() {
    let staff = vec![
        make_staff("a", &weekdays(), hours(9, 17)),
        make_staff("b", &weekdays(), hours(9, 17)),
    ];
    let mut scheduler = make_scheduler(&staff, SchedulerConfig::default());
    let jobs = busy_batch();
    scheduler.schedule_batch(&jobs, tp(MONDAY));
    let before = scheduler.snapshot().len();

    // Cancelling twice removes once.
    assert!(scheduler.cancel("job-03").is_some());
    assert!(scheduler.cancel("job-03").is_none());
    assert_eq!(scheduler.snapshot().len(), before - 1);

    // A rescheduled job keeps exactly one assignment.
    let moved = jobs.iter().find(|j| j.id == "job-05").unwrap();
    scheduler
        .reschedule(moved, &[], tp("2024-03-06T00:00"))
        .unwrap();
    let count = scheduler
        .assignments()
        .filter(|a| a.job_id == "job-05")
        .count();
    assert_eq!(count, 1);
    assert!(scheduler.assignment_for("job-05").unwrap().start >= tp("2024-03-06T00:00"));
    assert_no_overlaps(&scheduler.snapshot());

    // Reschedule then cancel leaves nothing behind.
    scheduler.cancel("job-05");
    assert!(scheduler.assignment_for("job-05").is_none());
    assert_no_overlaps(&scheduler.snapshot());
}

#[test]
fn rejected_job_changes_nothing() {
    let staff = vec![make_staff("s", &weekdays(), hours(9, 12))];
    let mut scheduler = make_scheduler(&staff, SchedulerConfig::default());
    scheduler
        .schedule(&make_job("kept", 60), &[], tp(MONDAY))
        .unwrap();
    let before = scheduler.snapshot();

    // Longer than the working window on any day.
    assert!(scheduler
        .schedule(&make_job("too-long", 240), &[], tp(MONDAY))
        .is_err());
    assert!(scheduler.schedule(&Job::new("no-time"), &[], tp(MONDAY)).is_err());
    assert_eq!(scheduler.snapshot(), before);
}
