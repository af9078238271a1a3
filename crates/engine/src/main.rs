use std::io::{self, Read, Write};
use std::sync::Arc;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use pressroom_engine::allocator::{Clock, FixedClock, Scheduler, SystemClock};
use pressroom_engine::calendar::{CalendarProjection, DaySchedule};
use pressroom_engine::config::SchedulerConfig;
use pressroom_engine::conflict::{self, AuditContext, Conflict};
use pressroom_engine::model::{Assignment, BatchResult, Job, Placement, StaffMember};
use pressroom_engine::store::AssignmentLog;
use pressroom_engine::time::{week_start_of, TimePoint};
use pressroom_engine::{validator, workload};

// ---------------------------------------------------------------------------
// Request / Response types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Request {
    #[serde(flatten)]
    command: Command,
    #[serde(default)]
    staff: Vec<StaffMember>,
    #[serde(default)]
    jobs: Vec<Job>,
    /// Assignments already committed by the caller.
    #[serde(default)]
    assignments: Vec<Assignment>,
    /// Earliest instant a new assignment may start. Defaults to now.
    as_of: Option<TimePoint>,
    /// Pins the clock. The host clock is used when absent.
    now: Option<TimePoint>,
    #[serde(default)]
    config: SchedulerConfig,
    /// JSON-lines assignment log to replay before and append to after.
    log_path: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "command", rename_all = "camelCase", rename_all_fields = "camelCase")]
enum Command {
    Schedule,
    Reschedule {
        job_id: String,
    },
    Cancel {
        job_id: String,
    },
    Audit,
    Calendar {
        view: CalendarView,
        date: NaiveDate,
    },
    Workload {
        date: NaiveDate,
        #[serde(default)]
        period: Period,
    },
    Validate,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
enum CalendarView {
    Day,
    Week,
    Month,
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
enum Period {
    #[default]
    Day,
    Week,
}

#[derive(Debug, Serialize)]
struct OkResponse<T: Serialize> {
    ok: bool,
    data: T,
}

#[derive(Debug, Serialize)]
struct ErrResponse {
    ok: bool,
    error: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ScheduleData {
    #[serde(flatten)]
    result: BatchResult,
    assignments: Vec<Assignment>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RescheduleData {
    placement: Placement,
    assignments: Vec<Assignment>,
    warnings: Vec<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CancelData {
    /// The removed assignment, or null when the job had none.
    cancelled: Option<Assignment>,
    assignments: Vec<Assignment>,
    warnings: Vec<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AuditData {
    conflicts: Vec<Conflict>,
    messages: Vec<String>,
    warnings: Vec<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CalendarData {
    view: CalendarView,
    days: Vec<DaySchedule>,
}

// ---------------------------------------------------------------------------
// Session setup
// ---------------------------------------------------------------------------

/// A scheduler loaded with everything the request knows about, plus the
/// log to record changes in.
struct Session {
    scheduler: Scheduler,
    log: Option<AssignmentLog>,
    as_of: TimePoint,
    warnings: Vec<String>,
}

impl Session {
    fn open(request: &Request) -> Result<Session, String> {
        let clock: Arc<dyn Clock> = match request.now {
            Some(now) => Arc::new(FixedClock(now)),
            None => Arc::new(SystemClock),
        };
        let as_of = request.as_of.unwrap_or_else(|| clock.now());

        let mut scheduler = Scheduler::new(&request.staff, request.config.clone())
            .map_err(|e| format!("Invalid configuration: {}", e))?
            .with_clock(clock);
        let mut warnings: Vec<String> = scheduler.index().warnings().to_vec();

        let mut existing = request.assignments.clone();
        let log = request.log_path.as_ref().map(AssignmentLog::new);
        if let Some(log) = &log {
            let loaded = log.load().map_err(|e| e.to_string())?;
            warnings.extend(loaded.warnings);
            existing.extend(loaded.assignments);
        }

        for c in scheduler.load_assignments(existing) {
            warnings.push(format!("Existing assignments conflict: {}", c.describe()));
        }

        Ok(Session {
            scheduler,
            log,
            as_of,
            warnings,
        })
    }

    fn record_put(&self, assignment: &Assignment) -> Result<(), String> {
        self.record_puts(std::slice::from_ref(assignment))
    }

    /// All or nothing: the log gets the whole batch in one write.
    fn record_puts(&self, assignments: &[Assignment]) -> Result<(), String> {
        match &self.log {
            Some(log) => log.append_puts(assignments).map_err(|e| {
                format!("{} -- no assignments from this run were recorded", e)
            }),
            None => Ok(()),
        }
    }

    fn record_remove(&self, job_id: &str) -> Result<(), String> {
        match &self.log {
            Some(log) => log.append_remove(job_id).map_err(|e| e.to_string()),
            None => Ok(()),
        }
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn write_ok<T: Serialize>(data: T) {
    let resp = OkResponse { ok: true, data };
    let json = serde_json::to_string(&resp).unwrap_or_else(|e| {
        format!("{{\"ok\":false,\"error\":\"serialization error: {}\"}}", e)
    });
    println!("{}", json);
    let _ = io::stdout().flush();
}

fn write_err(msg: impl std::fmt::Display) -> ! {
    let resp = ErrResponse {
        ok: false,
        error: msg.to_string(),
    };
    let json = serde_json::to_string(&resp).unwrap_or_else(|_| {
        "{\"ok\":false,\"error\":\"double serialization error\"}".to_string()
    });
    println!("{}", json);
    let _ = io::stdout().flush();
    std::process::exit(1);
}

fn open_session(request: &Request) -> Session {
    match Session::open(request) {
        Ok(session) => session,
        Err(e) => write_err(e),
    }
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

fn main() {
    // Read all of stdin
    let mut input = String::new();
    if let Err(e) = io::stdin().read_to_string(&mut input) {
        write_err(format!("Failed to read stdin: {}", e));
    }

    // Parse request
    let request: Request = match serde_json::from_str(&input) {
        Ok(r) => r,
        Err(e) => write_err(format!("Invalid JSON input: {}", e)),
    };

    match &request.command {
        Command::Schedule => {
            let mut session = open_session(&request);
            let mut result = session
                .scheduler
                .schedule_batch(&request.jobs, session.as_of);
            let placed: Vec<Assignment> = result
                .placed
                .iter()
                .map(|p| p.assignment.clone())
                .collect();
            if let Err(e) = session.record_puts(&placed) {
                write_err(e);
            }
            session.warnings.append(&mut result.warnings);
            result.warnings = session.warnings;
            write_ok(ScheduleData {
                result,
                assignments: session.scheduler.snapshot(),
            });
        }
        Command::Reschedule { job_id } => {
            let Some(job) = request.jobs.iter().find(|j| &j.id == job_id) else {
                write_err(format!("Unknown job '{}' -- include it in \"jobs\"", job_id));
            };
            let mut session = open_session(&request);
            let placement = match session.scheduler.reschedule(job, &[], session.as_of) {
                Ok(p) => p,
                Err(e) => write_err(e),
            };
            if let Err(e) = session.record_put(&placement.assignment) {
                write_err(e);
            }
            write_ok(RescheduleData {
                placement,
                assignments: session.scheduler.snapshot(),
                warnings: session.warnings,
            });
        }
        Command::Cancel { job_id } => {
            let mut session = open_session(&request);
            let cancelled = session.scheduler.cancel(job_id);
            if cancelled.is_some() {
                if let Err(e) = session.record_remove(job_id) {
                    write_err(e);
                }
            }
            write_ok(CancelData {
                cancelled,
                assignments: session.scheduler.snapshot(),
                warnings: session.warnings,
            });
        }
        Command::Audit => {
            let session = open_session(&request);
            let snapshot = session.scheduler.snapshot();
            let ctx = AuditContext {
                index: Some(session.scheduler.index()),
                jobs: &request.jobs,
                granularity: session.scheduler.config().granularity_mins,
            };
            let conflicts = conflict::audit(&snapshot, &ctx);
            let messages = conflicts.iter().map(Conflict::describe).collect();
            // Overlaps already show up as conflicts.
            let warnings = session
                .warnings
                .into_iter()
                .filter(|w| !w.starts_with("Existing assignments conflict"))
                .collect();
            write_ok(AuditData {
                conflicts,
                messages,
                warnings,
            });
        }
        Command::Calendar { view, date } => {
            let session = open_session(&request);
            let snapshot = session.scheduler.snapshot();
            let projection = CalendarProjection::new(&snapshot, &request.jobs, &request.staff);
            let days = match view {
                CalendarView::Day => vec![DaySchedule {
                    date: *date,
                    entries: projection.for_day(*date),
                }],
                CalendarView::Week => projection.for_week(week_start_of(*date)),
                CalendarView::Month => projection.for_month(*date),
            };
            write_ok(CalendarData { view: *view, days });
        }
        Command::Workload { date, period } => {
            let session = open_session(&request);
            let (from, days) = match period {
                Period::Day => (*date, 1),
                Period::Week => (week_start_of(*date), 7),
            };
            let report = workload::workload(
                &session.scheduler.snapshot(),
                &request.staff,
                session.scheduler.index(),
                from,
                days,
            );
            write_ok(report);
        }
        Command::Validate => {
            let result = validator::validate(&request.staff, &request.jobs, &request.config);
            write_ok(result);
        }
    }
}
