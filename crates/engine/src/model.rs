use std::collections::HashMap;

use chrono::Weekday;
use serde::{Deserialize, Serialize};

use crate::time::{Interval, TimeOfDay, TimePoint};

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// Job priority. Only affects the order in which a batch is offered to the
/// allocator; it never preempts committed assignments.
#[derive(
    Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash,
)]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
}

/// Production status of a job as tracked by the job-entry side.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum JobStatus {
    #[default]
    #[serde(rename = "Not Started", alias = "NotStarted")]
    NotStarted,
    Pending,
    #[serde(rename = "In Production", alias = "InProduction")]
    InProduction,
    Completed,
    Delivered,
}

impl JobStatus {
    /// Finished work is never placed on the calendar.
    pub fn is_schedulable(self) -> bool {
        matches!(
            self,
            JobStatus::NotStarted | JobStatus::Pending | JobStatus::InProduction
        )
    }
}

/// Print process family, as used by the product catalog.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum JobType {
    #[serde(rename = "Digital Printing", alias = "DigitalPrinting")]
    DigitalPrinting,
    #[serde(rename = "Wide Format", alias = "WideFormat")]
    WideFormat,
    #[serde(rename = "Screen Printing", alias = "ScreenPrinting")]
    ScreenPrinting,
    #[serde(rename = "DTF", alias = "Dtf")]
    Dtf,
    Embroidery,
}

// ---------------------------------------------------------------------------
// Product catalog
// ---------------------------------------------------------------------------

/// A catalog entry. Times are per job line, not per unit.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: String,
    pub name: String,
    pub job_type: JobType,
    pub production_mins: u32,
    #[serde(default)]
    pub setup_mins: Option<u32>,
    #[serde(default)]
    pub finishing_mins: Option<u32>,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Setup, production and finishing time for one product line of a job.
///
/// Quantity multipliers are already folded into `production_mins` by the
/// job-entry side; `quantity` is informational only.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct JobPhaseBreakdown {
    #[serde(default)]
    pub product_id: Option<String>,
    #[serde(default = "default_quantity")]
    pub quantity: u32,
    #[serde(default)]
    pub setup_mins: u32,
    #[serde(default)]
    pub production_mins: u32,
    #[serde(default)]
    pub finishing_mins: u32,
}

fn default_quantity() -> u32 {
    1
}

impl JobPhaseBreakdown {
    /// Build a job line from a catalog entry.
    pub fn from_product(product: &Product, quantity: u32) -> Self {
        JobPhaseBreakdown {
            product_id: Some(product.id.clone()),
            quantity,
            setup_mins: product.setup_mins.unwrap_or(0),
            production_mins: product.production_mins,
            finishing_mins: product.finishing_mins.unwrap_or(0),
        }
    }

    /// Unrounded sum of the three phases.
    pub fn total_mins(&self) -> u32 {
        self.setup_mins
            .saturating_add(self.production_mins)
            .saturating_add(self.finishing_mins)
    }
}

// ---------------------------------------------------------------------------
// Jobs and staff
// ---------------------------------------------------------------------------

/// A print job as handed over by the job-entry side.
///
/// Jobs are re-submitted, never edited in place, whenever their duration,
/// due date or priority changes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub customer: String,
    #[serde(default)]
    pub job_type: Option<JobType>,
    /// Product lines; the required time is derived from these.
    #[serde(default)]
    pub products: Vec<JobPhaseBreakdown>,
    /// Manual estimate, used only when `products` is empty.
    #[serde(default)]
    pub estimated_mins: Option<u32>,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub due_date: Option<TimePoint>,
    #[serde(default)]
    pub preferred_staff_id: Option<String>,
    #[serde(default)]
    pub status: JobStatus,
}

impl Job {
    pub fn new(id: impl Into<String>) -> Self {
        Job {
            id: id.into(),
            title: String::new(),
            customer: String::new(),
            job_type: None,
            products: Vec::new(),
            estimated_mins: None,
            priority: Priority::default(),
            due_date: None,
            preferred_staff_id: None,
            status: JobStatus::default(),
        }
    }
}

/// Working hours for one weekday.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct WorkWindow {
    pub start: TimeOfDay,
    pub end: TimeOfDay,
}

/// A member of the production staff.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StaffMember {
    pub id: String,
    #[serde(default)]
    pub name: String,
    /// Falls back to the shop default capacity when `None`.
    #[serde(default)]
    pub daily_capacity_mins: Option<u32>,
    /// Weekday -> hours. A missing weekday is a day off. `None` means the
    /// shop default hours apply.
    #[serde(default)]
    pub working_windows: Option<HashMap<Weekday, WorkWindow>>,
    /// Meetings, time off and similar absences.
    #[serde(default)]
    pub blocked_intervals: Vec<Interval>,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

impl StaffMember {
    pub fn new(id: impl Into<String>) -> Self {
        StaffMember {
            id: id.into(),
            name: String::new(),
            daily_capacity_mins: None,
            working_windows: None,
            blocked_intervals: Vec::new(),
            active: true,
        }
    }
}

// ---------------------------------------------------------------------------
// Assignments
// ---------------------------------------------------------------------------

/// A committed placement of a job on a staff member's time.
/// `end - start` always equals the job's required minutes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Assignment {
    pub job_id: String,
    pub staff_id: String,
    pub start: TimePoint,
    pub end: TimePoint,
}

impl Assignment {
    pub fn interval(&self) -> Interval {
        Interval::new(self.start, self.end)
    }

    pub fn duration_mins(&self) -> u32 {
        self.interval().duration_mins()
    }
}

// ---------------------------------------------------------------------------
// Allocator output types
// ---------------------------------------------------------------------------

/// A slot found by the allocator, before or after commit.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Placement {
    pub assignment: Assignment,
    /// The slot ends after the job's due date. Placement still happens.
    pub due_date_at_risk: bool,
    /// Status the job should move to once the placement is committed.
    pub status: JobStatus,
}

/// Why a job in a batch could not be placed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobFailure {
    pub job_id: String,
    pub kind: String,
    pub error: String,
}

/// Output of a batch scheduling run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchResult {
    pub placed: Vec<Placement>,
    pub failed: Vec<JobFailure>,
    /// Human-readable advisories (due dates at risk, ignored preferences).
    pub warnings: Vec<String>,
}
