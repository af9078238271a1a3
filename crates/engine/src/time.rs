//! Canonical time representation for the scheduler.
//!
//! All instants are timezone-naive minute offsets from 1970-01-01T00:00.
//! Presentation layers apply a display timezone on their own; nothing in
//! this crate looks at the host timezone except `SystemClock`.

use std::fmt;

use chrono::{Datelike, NaiveDate, NaiveDateTime, Weekday};
use serde::{Deserialize, Serialize};

pub const MINUTES_PER_DAY: i64 = 24 * 60;

/// Default scheduling granularity in minutes.
pub const DEFAULT_GRANULARITY_MINS: u32 = 30;

/// 0001-01-01T00:00, the earliest accepted instant.
pub const MIN_EPOCH_MINUTES: i64 = -719_162 * MINUTES_PER_DAY;
/// 9999-12-31T23:59, the latest accepted instant.
pub const MAX_EPOCH_MINUTES: i64 = 2_932_897 * MINUTES_PER_DAY - 1;

// ---------------------------------------------------------------------------
// ISO 8601 parsing helpers
// ---------------------------------------------------------------------------

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
];

fn parse_datetime(s: &str) -> Option<NaiveDateTime> {
    // Strip trailing Z or timezone offset; times are naive.
    let s = s.trim().trim_end_matches('Z');
    let s = match s.rfind('+') {
        Some(pos) if pos > 10 => &s[..pos],
        _ => s,
    };
    let s = if s.len() > 19 && s.chars().nth(19) == Some('-') {
        &s[..19]
    } else {
        s
    };

    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt);
        }
    }
    None
}

// ---------------------------------------------------------------------------
// TimePoint
// ---------------------------------------------------------------------------

/// An absolute instant with minute precision.
///
/// On the wire a `TimePoint` is an ISO 8601 local datetime string. Integer
/// epoch minutes are accepted on input as well.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "TimePointRepr", into = "String")]
pub struct TimePoint(i64);

#[derive(Deserialize)]
#[serde(untagged)]
enum TimePointRepr {
    Minutes(i64),
    Text(String),
}

impl TryFrom<TimePointRepr> for TimePoint {
    type Error = String;

    fn try_from(repr: TimePointRepr) -> Result<Self, Self::Error> {
        match repr {
            TimePointRepr::Minutes(m) => TimePoint::checked_from_epoch_minutes(m)
                .ok_or_else(|| format!("epoch minutes {} out of range", m)),
            TimePointRepr::Text(s) => {
                TimePoint::parse(&s).ok_or_else(|| format!("invalid datetime '{}'", s))
            }
        }
    }
}

impl From<TimePoint> for String {
    fn from(t: TimePoint) -> Self {
        t.to_string()
    }
}

impl fmt::Display for TimePoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_datetime().format("%Y-%m-%dT%H:%M:%S"))
    }
}

impl TimePoint {
    pub const fn from_epoch_minutes(minutes: i64) -> Self {
        TimePoint(minutes)
    }

    /// `None` outside years 1 through 9999.
    pub fn checked_from_epoch_minutes(minutes: i64) -> Option<Self> {
        (MIN_EPOCH_MINUTES..=MAX_EPOCH_MINUTES)
            .contains(&minutes)
            .then_some(TimePoint(minutes))
    }

    pub const fn epoch_minutes(self) -> i64 {
        self.0
    }

    /// Seconds are truncated.
    pub fn from_datetime(dt: NaiveDateTime) -> Self {
        TimePoint((dt - NaiveDateTime::default()).num_minutes())
    }

    /// Saturates at chrono's bounds instead of panicking.
    pub fn to_datetime(self) -> NaiveDateTime {
        chrono::Duration::try_minutes(self.0)
            .and_then(|d| NaiveDateTime::default().checked_add_signed(d))
            .unwrap_or(if self.0 < 0 {
                NaiveDateTime::MIN
            } else {
                NaiveDateTime::MAX
            })
    }

    /// Midnight at the start of `date`.
    pub fn from_date(date: NaiveDate) -> Self {
        TimePoint((date - NaiveDate::default()).num_days() * MINUTES_PER_DAY)
    }

    /// `date` at the given time of day.
    pub fn at(date: NaiveDate, time: TimeOfDay) -> Self {
        Self::from_date(date).add_minutes(i64::from(time.minutes()))
    }

    /// Parse an ISO 8601 datetime, or a bare `YYYY-MM-DD` date (midnight).
    pub fn parse(s: &str) -> Option<Self> {
        let t = match parse_datetime(s) {
            Some(dt) => Self::from_datetime(dt),
            None => NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
                .ok()
                .map(Self::from_date)?,
        };
        Self::checked_from_epoch_minutes(t.0)
    }

    pub fn add_minutes(self, minutes: i64) -> Self {
        TimePoint(self.0.saturating_add(minutes))
    }

    /// Signed minutes from `earlier` to `self`.
    pub fn minutes_since(self, earlier: TimePoint) -> i64 {
        self.0.saturating_sub(earlier.0)
    }

    pub fn date(self) -> NaiveDate {
        self.to_datetime().date()
    }

    pub fn weekday(self) -> Weekday {
        self.date().weekday()
    }

    pub fn start_of_day(self) -> Self {
        TimePoint(self.0 - self.0.rem_euclid(MINUTES_PER_DAY))
    }

    /// Round up to the next multiple of `granularity` (relative to midnight).
    pub fn ceil_to(self, granularity: u32) -> Self {
        let g = i64::from(granularity.max(1));
        let rem = self.0.rem_euclid(g);
        if rem == 0 {
            self
        } else {
            TimePoint(self.0.saturating_add(g - rem))
        }
    }

    /// Round down to the previous multiple of `granularity`.
    pub fn floor_to(self, granularity: u32) -> Self {
        let g = i64::from(granularity.max(1));
        TimePoint(self.0 - self.0.rem_euclid(g))
    }
}

pub fn add_minutes(t: TimePoint, minutes: i64) -> TimePoint {
    t.add_minutes(minutes)
}

pub fn weekday_of(t: TimePoint) -> Weekday {
    t.weekday()
}

pub fn start_of_day(t: TimePoint) -> TimePoint {
    t.start_of_day()
}

/// Half-open overlap test: `[a.start, a.end)` and `[b.start, b.end)`.
pub fn overlaps(a: &Interval, b: &Interval) -> bool {
    a.start < b.end && b.start < a.end
}

/// Monday of the week containing `date`.
pub fn week_start_of(date: NaiveDate) -> NaiveDate {
    date - chrono::Duration::days(i64::from(date.weekday().num_days_from_monday()))
}

// ---------------------------------------------------------------------------
// Interval
// ---------------------------------------------------------------------------

/// A half-open time range `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Interval {
    pub start: TimePoint,
    pub end: TimePoint,
}

impl Interval {
    pub fn new(start: TimePoint, end: TimePoint) -> Self {
        Interval { start, end }
    }

    /// Zero for empty or inverted intervals.
    pub fn duration_mins(&self) -> u32 {
        u32::try_from(self.end.minutes_since(self.start).max(0)).unwrap_or(u32::MAX)
    }

    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }

    pub fn overlaps(&self, other: &Interval) -> bool {
        overlaps(self, other)
    }

    pub fn contains(&self, other: &Interval) -> bool {
        self.start <= other.start && other.end <= self.end
    }

    pub fn intersect(&self, other: &Interval) -> Option<Interval> {
        let iv = Interval::new(self.start.max(other.start), self.end.min(other.end));
        if iv.is_empty() {
            None
        } else {
            Some(iv)
        }
    }

    /// Shrink to granularity boundaries. Never expands.
    pub fn snap_inward(&self, granularity: u32) -> Option<Interval> {
        let iv = Interval::new(self.start.ceil_to(granularity), self.end.floor_to(granularity));
        if iv.is_empty() {
            None
        } else {
            Some(iv)
        }
    }
}

/// Remove every `cut` from `base`, returning the remaining pieces in order.
/// `cuts` need not be sorted.
pub fn subtract_all(base: Interval, cuts: &[Interval]) -> Vec<Interval> {
    let mut sorted: Vec<&Interval> = cuts.iter().filter(|c| c.overlaps(&base)).collect();
    sorted.sort_by_key(|c| c.start);

    let mut pieces = Vec::new();
    let mut cursor = base.start;
    for cut in sorted {
        if cut.start > cursor {
            pieces.push(Interval::new(cursor, cut.start.min(base.end)));
        }
        cursor = cursor.max(cut.end);
        if cursor >= base.end {
            break;
        }
    }
    if cursor < base.end {
        pieces.push(Interval::new(cursor, base.end));
    }
    pieces
}

// ---------------------------------------------------------------------------
// TimeOfDay
// ---------------------------------------------------------------------------

/// Minutes since midnight, `00:00` through `24:00` inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TimeOfDay(u32);

impl TimeOfDay {
    pub const MIDNIGHT: TimeOfDay = TimeOfDay(0);
    pub const END_OF_DAY: TimeOfDay = TimeOfDay(MINUTES_PER_DAY as u32);

    pub fn new(hour: u32, minute: u32) -> Option<Self> {
        let total = hour.checked_mul(60)?.checked_add(minute)?;
        if minute < 60 && total <= MINUTES_PER_DAY as u32 {
            Some(TimeOfDay(total))
        } else {
            None
        }
    }

    pub fn minutes(self) -> u32 {
        self.0
    }

    /// Accepts `HH:MM` and `HH:MM:SS` (seconds ignored).
    pub fn parse(s: &str) -> Option<Self> {
        let mut parts = s.trim().split(':');
        let hour = parts.next()?.parse::<u32>().ok()?;
        let minute = parts.next()?.parse::<u32>().ok()?;
        if let Some(sec) = parts.next() {
            sec.parse::<u32>().ok().filter(|s| *s < 60)?;
        }
        if parts.next().is_some() {
            return None;
        }
        Self::new(hour, minute)
    }
}

impl TryFrom<String> for TimeOfDay {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        TimeOfDay::parse(&s).ok_or_else(|| format!("invalid time of day '{}'", s))
    }
}

impl From<TimeOfDay> for String {
    fn from(t: TimeOfDay) -> Self {
        t.to_string()
    }
}

impl fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.0 / 60, self.0 % 60)
    }
}

// ---------------------------------------------------------------------------
// Durations
// ---------------------------------------------------------------------------

/// Round `minutes` up to the next multiple of `granularity`. `None` when the
/// rounded value does not fit in a `u32`.
pub fn ceil_to_granularity(minutes: u32, granularity: u32) -> Option<u32> {
    let g = granularity.max(1);
    minutes.div_ceil(g).checked_mul(g)
}

/// Human-readable duration, e.g. "2 hours 30 minutes".
pub fn format_duration(minutes: u32) -> String {
    let hours = minutes / 60;
    let rest = minutes % 60;
    let plural = if hours == 1 { "" } else { "s" };

    match (hours, rest) {
        (0, m) => format!("{} minutes", m),
        (h, 0) => format!("{} hour{}", h, plural),
        (h, m) => format!("{} hour{} {} minutes", h, plural, m),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
