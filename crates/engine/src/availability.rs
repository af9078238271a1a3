//! Per-staff, per-day free time.
//!
//! Working windows and blocked intervals are resolved once per staff member
//! when the index is built. Free intervals for a particular day are computed
//! on demand and never cached, so the index stays small however far ahead
//! callers look, and roster changes only require a rebuild.

use std::collections::HashMap;

use chrono::{Datelike, NaiveDate, Weekday};

use crate::config::SchedulerConfig;
use crate::model::{StaffMember, WorkWindow};
use crate::time::{subtract_all, Interval, TimePoint};

const WEEK: [Weekday; 7] = [
    Weekday::Mon,
    Weekday::Tue,
    Weekday::Wed,
    Weekday::Thu,
    Weekday::Fri,
    Weekday::Sat,
    Weekday::Sun,
];

/// Resolved calendar for one staff member.
#[derive(Debug, Clone)]
struct StaffCalendar {
    /// Indexed by `Weekday::num_days_from_monday`.
    windows: [Option<WorkWindow>; 7],
    /// Sorted by start, pairwise disjoint.
    blocked: Vec<Interval>,
    daily_capacity_mins: u32,
    active: bool,
}

#[derive(Debug, Clone)]
pub struct AvailabilityIndex {
    granularity: u32,
    calendars: HashMap<String, StaffCalendar>,
    /// Roster order, used as the final tie-break wherever staff are ranked.
    order: Vec<String>,
    warnings: Vec<String>,
}

impl AvailabilityIndex {
    /// Resolve every staff member's calendar against the shop defaults.
    ///
    /// Overlapping blocked intervals are merged and inverted ones dropped;
    /// each such repair is reported in `warnings()`.
    pub fn build(staff: &[StaffMember], config: &SchedulerConfig) -> Self {
        let mut calendars = HashMap::with_capacity(staff.len());
        let mut order = Vec::with_capacity(staff.len());
        let mut warnings = Vec::new();

        for member in staff {
            let calendar = resolve_calendar(member, config, &mut warnings);
            if calendars.insert(member.id.clone(), calendar).is_some() {
                warnings.push(format!(
                    "Staff member '{}' is listed more than once -- the last entry wins",
                    member.id
                ));
            } else {
                order.push(member.id.clone());
            }
        }

        AvailabilityIndex {
            granularity: config.granularity_mins,
            calendars,
            order,
            warnings,
        }
    }

    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    pub fn contains(&self, staff_id: &str) -> bool {
        self.calendars.contains_key(staff_id)
    }

    pub fn is_active(&self, staff_id: &str) -> bool {
        self.calendars.get(staff_id).is_some_and(|c| c.active)
    }

    /// Staff ids in roster order.
    pub fn staff_ids(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    /// Position of `staff_id` in the roster, if known.
    pub fn roster_position(&self, staff_id: &str) -> Option<usize> {
        self.order.iter().position(|id| id == staff_id)
    }

    /// Zero for unknown staff.
    pub fn daily_capacity_mins(&self, staff_id: &str) -> u32 {
        self.calendars
            .get(staff_id)
            .map(|c| c.daily_capacity_mins)
            .unwrap_or(0)
    }

    pub fn window(&self, staff_id: &str, weekday: Weekday) -> Option<WorkWindow> {
        self.calendars
            .get(staff_id)
            .and_then(|c| c.windows[weekday.num_days_from_monday() as usize])
    }

    /// Length of the staff member's longest working day, before blocks.
    pub fn longest_window_mins(&self, staff_id: &str) -> u32 {
        WEEK.iter()
            .filter_map(|d| self.window(staff_id, *d))
            .map(|w| w.end.minutes().saturating_sub(w.start.minutes()))
            .max()
            .unwrap_or(0)
    }

    /// Free sub-intervals of `date`'s working window after blocked time is
    /// removed, in chronological order, snapped inward to the granularity.
    ///
    /// Unknown staff and days off yield an empty list.
    pub fn free_intervals(&self, staff_id: &str, date: NaiveDate) -> Vec<Interval> {
        let Some(calendar) = self.calendars.get(staff_id) else {
            return Vec::new();
        };
        let Some(window) = calendar.windows[date.weekday().num_days_from_monday() as usize] else {
            return Vec::new();
        };

        let day = Interval::new(
            TimePoint::at(date, window.start),
            TimePoint::at(date, window.end),
        );
        if day.is_empty() {
            return Vec::new();
        }

        subtract_all(day, &calendar.blocked)
            .into_iter()
            .filter_map(|iv| iv.snap_inward(self.granularity))
            .collect()
    }
}

fn resolve_calendar(
    member: &StaffMember,
    config: &SchedulerConfig,
    warnings: &mut Vec<String>,
) -> StaffCalendar {
    let mut windows: [Option<WorkWindow>; 7] = [None; 7];
    match &member.working_windows {
        Some(map) => {
            for (day, window) in map {
                if window.end <= window.start {
                    warnings.push(format!(
                        "Staff member '{}' has an empty or inverted window on {} ({}-{}) -- treated as a day off",
                        member.id, day, window.start, window.end
                    ));
                    continue;
                }
                windows[day.num_days_from_monday() as usize] = Some(*window);
            }
        }
        None => {
            for day in &config.default_working_days {
                windows[day.num_days_from_monday() as usize] = Some(config.default_working_hours);
            }
        }
    }

    StaffCalendar {
        windows,
        blocked: normalize_blocked(&member.id, &member.blocked_intervals, warnings),
        daily_capacity_mins: member
            .daily_capacity_mins
            .unwrap_or(config.default_daily_capacity_mins),
        active: member.active,
    }
}

/// Sort, drop inverted entries and merge overlaps.
fn normalize_blocked(
    staff_id: &str,
    blocked: &[Interval],
    warnings: &mut Vec<String>,
) -> Vec<Interval> {
    let mut sorted: Vec<Interval> = Vec::with_capacity(blocked.len());
    for iv in blocked {
        if iv.is_empty() {
            warnings.push(format!(
                "Staff member '{}' has an empty blocked interval {} - {} -- ignored",
                staff_id, iv.start, iv.end
            ));
        } else {
            sorted.push(*iv);
        }
    }
    sorted.sort();

    let mut merged: Vec<Interval> = Vec::with_capacity(sorted.len());
    for iv in sorted {
        match merged.last_mut() {
            Some(last) if iv.start <= last.end => {
                if iv.start < last.end {
                    warnings.push(format!(
                        "Staff member '{}' has overlapping blocked intervals around {} -- merged",
                        staff_id, iv.start
                    ));
                }
                last.end = last.end.max(iv.end);
            }
            _ => merged.push(iv),
        }
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::TimeOfDay;

    fn tp(s: &str) -> TimePoint {
        TimePoint::parse(s).unwrap()
    }

    fn monday() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 4).unwrap()
    }

    fn window(start: &str, end: &str) -> WorkWindow {
        WorkWindow {
            start: TimeOfDay::parse(start).unwrap(),
            end: TimeOfDay::parse(end).unwrap(),
        }
    }

    fn weekday_staff(id: &str, blocked: Vec<Interval>) -> StaffMember {
        let windows = [Weekday::Mon, Weekday::Tue, Weekday::Wed, Weekday::Thu, Weekday::Fri]
            .into_iter()
            .map(|d| (d, window("09:00", "17:00")))
            .collect();
        StaffMember {
            working_windows: Some(windows),
            blocked_intervals: blocked,
            ..StaffMember::new(id)
        }
    }

    #[test]
    fn test_full_day_free() {
        let index = AvailabilityIndex::build(&[weekday_staff("s", vec![])], &SchedulerConfig::default());
        let free = index.free_intervals("s", monday());
        assert_eq!(free, vec![Interval::new(tp("2024-03-04T09:00"), tp("2024-03-04T17:00"))]);
    }

    #[test]
    fn test_blocked_splits_window() {
        let staff = weekday_staff(
            "s",
            vec![Interval::new(tp("2024-03-04T12:00"), tp("2024-03-04T13:00"))],
        );
        let index = AvailabilityIndex::build(&[staff], &SchedulerConfig::default());
        let free = index.free_intervals("s", monday());
        assert_eq!(free.len(), 2);
        assert_eq!(free[0].end, tp("2024-03-04T12:00"));
        assert_eq!(free[1].start, tp("2024-03-04T13:00"));
    }

    #[test]
    fn test_off_grid_block_trims_inward() {
        let staff = weekday_staff(
            "s",
            vec![Interval::new(tp("2024-03-04T09:00"), tp("2024-03-04T10:10"))],
        );
        let index = AvailabilityIndex::build(&[staff], &SchedulerConfig::default());
        let free = index.free_intervals("s", monday());
        assert_eq!(free[0].start, tp("2024-03-04T10:30"));
    }

    #[test]
    fn test_day_off_and_unknown_staff() {
        let index = AvailabilityIndex::build(&[weekday_staff("s", vec![])], &SchedulerConfig::default());
        let saturday = NaiveDate::from_ymd_opt(2024, 3, 9).unwrap();
        assert!(index.free_intervals("s", saturday).is_empty());
        assert!(index.free_intervals("nobody", monday()).is_empty());
    }

    #[test]
    fn test_shop_defaults_apply() {
        let index = AvailabilityIndex::build(&[StaffMember::new("d")], &SchedulerConfig::default());
        let free = index.free_intervals("d", monday());
        assert_eq!(free, vec![Interval::new(tp("2024-03-04T08:00"), tp("2024-03-04T17:00"))]);
        let sunday = NaiveDate::from_ymd_opt(2024, 3, 10).unwrap();
        assert!(index.free_intervals("d", sunday).is_empty());
        assert_eq!(index.daily_capacity_mins("d"), 480);
    }

    #[test]
    fn test_overlapping_blocks_are_merged() {
        let staff = weekday_staff(
            "s",
            vec![
                Interval::new(tp("2024-03-04T11:00"), tp("2024-03-04T13:00")),
                Interval::new(tp("2024-03-04T10:00"), tp("2024-03-04T12:00")),
            ],
        );
        let index = AvailabilityIndex::build(&[staff], &SchedulerConfig::default());
        assert_eq!(index.warnings().len(), 1);
        assert!(index.warnings()[0].contains("merged"));
        let free = index.free_intervals("s", monday());
        assert_eq!(
            free,
            vec![
                Interval::new(tp("2024-03-04T09:00"), tp("2024-03-04T10:00")),
                Interval::new(tp("2024-03-04T13:00"), tp("2024-03-04T17:00")),
            ]
        );
    }

    #[test]
    fn test_multi_day_block() {
        let staff = weekday_staff(
            "s",
            vec![Interval::new(tp("2024-03-03T00:00"), tp("2024-03-05T12:00"))],
        );
        let index = AvailabilityIndex::build(&[staff], &SchedulerConfig::default());
        assert!(index.free_intervals("s", monday()).is_empty());
        let tuesday = NaiveDate::from_ymd_opt(2024, 3, 5).unwrap();
        assert_eq!(index.free_intervals("s", tuesday)[0].start, tp("2024-03-05T12:00"));
    }

    #[test]
    fn test_inverted_window_is_day_off() {
        let mut staff = weekday_staff("s", vec![]);
        if let Some(map) = staff.working_windows.as_mut() {
            map.insert(Weekday::Mon, window("17:00", "09:00"));
        }
        let index = AvailabilityIndex::build(&[staff], &SchedulerConfig::default());
        assert!(index.free_intervals("s", monday()).is_empty());
        assert_eq!(index.warnings().len(), 1);
        assert_eq!(index.longest_window_mins("s"), 480);
    }
}
