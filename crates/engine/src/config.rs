use chrono::Weekday;
use serde::{Deserialize, Serialize};

use crate::model::WorkWindow;
use crate::time::{TimeOfDay, DEFAULT_GRANULARITY_MINS, MINUTES_PER_DAY};

pub const DEFAULT_HORIZON_DAYS: u32 = 90;
/// Ten years.
pub const MAX_HORIZON_DAYS: u32 = 3660;
pub const DEFAULT_DAILY_CAPACITY_MINS: u32 = 480;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Granularity must be a positive divisor of 1440 minutes, got {0}")]
    InvalidGranularity(u32),
    #[error("Search horizon must be at least one day")]
    EmptyHorizon,
    #[error("Search horizon of {0} days exceeds the maximum of {max} days", max = MAX_HORIZON_DAYS)]
    HorizonTooLarge(u32),
    #[error("Default working hours end ({end}) before they start ({start})")]
    InvertedWorkingHours { start: TimeOfDay, end: TimeOfDay },
}

/// Shop-wide scheduling settings. Fixed for the duration of a scheduling run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct SchedulerConfig {
    pub granularity_mins: u32,
    /// How many days forward the allocator searches before giving up.
    pub horizon_days: u32,
    pub default_daily_capacity_mins: u32,
    /// Hours for staff members that declare no working windows.
    pub default_working_hours: WorkWindow,
    pub default_working_days: Vec<Weekday>,
    /// Permit a day's bookings to exceed a staff member's daily capacity.
    pub allow_overbooking: bool,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        SchedulerConfig {
            granularity_mins: DEFAULT_GRANULARITY_MINS,
            horizon_days: DEFAULT_HORIZON_DAYS,
            default_daily_capacity_mins: DEFAULT_DAILY_CAPACITY_MINS,
            default_working_hours: WorkWindow {
                start: TimeOfDay::new(8, 0).unwrap_or(TimeOfDay::MIDNIGHT),
                end: TimeOfDay::new(17, 0).unwrap_or(TimeOfDay::END_OF_DAY),
            },
            default_working_days: vec![
                Weekday::Mon,
                Weekday::Tue,
                Weekday::Wed,
                Weekday::Thu,
                Weekday::Fri,
                Weekday::Sat,
            ],
            allow_overbooking: false,
        }
    }
}

impl SchedulerConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let g = self.granularity_mins;
        if g == 0 || MINUTES_PER_DAY % i64::from(g) != 0 {
            return Err(ConfigError::InvalidGranularity(g));
        }
        if self.horizon_days == 0 {
            return Err(ConfigError::EmptyHorizon);
        }
        if self.horizon_days > MAX_HORIZON_DAYS {
            return Err(ConfigError::HorizonTooLarge(self.horizon_days));
        }
        let hours = self.default_working_hours;
        if hours.end < hours.start {
            return Err(ConfigError::InvertedWorkingHours {
                start: hours.start,
                end: hours.end,
            });
        }
        Ok(())
    }
}
