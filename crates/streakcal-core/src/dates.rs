//! Local day boundaries.
//!
//! All-day calendar entries are addressed by local date, while calendar
//! queries need instants. [`DayBounds`] carries both: the inclusive first
//! date, the exclusive end date, and the UTC instants of local midnight at
//! each end.

use chrono::{DateTime, Datelike, Duration, Local, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// A half-open range of local calendar days.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayBounds {
    /// First day in range.
    pub first_day: NaiveDate,
    /// Day after the last day in range.
    pub end_day: NaiveDate,
    /// Local midnight at the start of `first_day`.
    pub start: DateTime<Utc>,
    /// Local midnight at the start of `end_day`.
    pub end: DateTime<Utc>,
}

impl DayBounds {
    /// Bounds of `days` consecutive days starting at `first_day`, in timezone `tz`.
    pub fn span_in<Tz: TimeZone>(tz: &Tz, first_day: NaiveDate, days: i64) -> Self {
        let end_day = first_day + Duration::days(days);
        Self {
            first_day,
            end_day,
            start: local_midnight(tz, first_day),
            end: local_midnight(tz, end_day),
        }
    }

    /// A single day in timezone `tz`.
    pub fn day_in<Tz: TimeZone>(tz: &Tz, day: NaiveDate) -> Self {
        Self::span_in(tz, day, 1)
    }

    /// A single day in UTC.
    pub fn utc_day(day: NaiveDate) -> Self {
        Self::day_in(&Utc, day)
    }

    /// Seven days starting at `monday`, in timezone `tz`.
    pub fn week_starting<Tz: TimeZone>(tz: &Tz, monday: NaiveDate) -> Self {
        Self::span_in(tz, monday, 7)
    }

    /// The Monday-to-Monday week before the week containing `today`, in UTC.
    pub fn utc_previous_week(today: NaiveDate) -> Self {
        Self::week_starting(&Utc, previous_week_start(today))
    }

    /// Number of days covered.
    pub fn len_days(&self) -> i64 {
        (self.end_day - self.first_day).num_days()
    }

    pub fn contains_day(&self, day: NaiveDate) -> bool {
        day >= self.first_day && day < self.end_day
    }

    /// Days in range, in order.
    pub fn days(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        self.first_day
            .iter_days()
            .take_while(move |d| *d < self.end_day)
    }

    /// Last day in range (inclusive).
    pub fn last_day(&self) -> NaiveDate {
        self.end_day - Duration::days(1)
    }
}

/// UTC instant of local midnight on `day`.
///
/// When midnight does not exist locally (a DST gap) the first instant of
/// the day after the gap is used.
fn local_midnight<Tz: TimeZone>(tz: &Tz, day: NaiveDate) -> DateTime<Utc> {
    let midnight = day.and_hms_opt(0, 0, 0).unwrap_or_default();
    let mut probe = midnight;
    for _ in 0..4 {
        if let Some(dt) = tz.from_local_datetime(&probe).earliest() {
            return dt.with_timezone(&Utc);
        }
        probe += Duration::minutes(30);
    }
    Utc.from_utc_datetime(&midnight)
}

/// Monday of the week before the one containing `today`.
pub fn previous_week_start(today: NaiveDate) -> NaiveDate {
    let since_monday = i64::from(today.weekday().num_days_from_monday());
    today - Duration::days(since_monday + 7)
}

/// Local bounds of the full week before the one containing `today`.
pub fn previous_week(today: NaiveDate) -> DayBounds {
    DayBounds::week_starting(&Local, previous_week_start(today))
}

/// Source of "today" and day boundaries.
pub trait DayProvider {
    fn today(&self) -> NaiveDate;

    /// Bounds of the day `offset` days from today.
    fn day(&self, offset: i64) -> DayBounds;

    /// Bounds of the full week before the current one.
    fn previous_week(&self) -> DayBounds;
}

/// Day provider for the system local timezone.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalDays;

impl DayProvider for LocalDays {
    fn today(&self) -> NaiveDate {
        Local::now().date_naive()
    }

    fn day(&self, offset: i64) -> DayBounds {
        DayBounds::day_in(&Local, self.today() + Duration::days(offset))
    }

    fn previous_week(&self) -> DayBounds {
        previous_week(self.today())
    }
}

/// Day provider pinned to a fixed date, in the local timezone.
#[derive(Debug, Clone, Copy)]
pub struct FixedDays {
    today: NaiveDate,
}

impl FixedDays {
    pub fn new(today: NaiveDate) -> Self {
        Self { today }
    }
}

impl DayProvider for FixedDays {
    fn today(&self) -> NaiveDate {
        self.today
    }

    fn day(&self, offset: i64) -> DayBounds {
        DayBounds::day_in(&Local, self.today + Duration::days(offset))
    }

    fn previous_week(&self) -> DayBounds {
        previous_week(self.today)
    }
}

/// Parse a `YYYY-MM-DD` date.
pub fn parse_date(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::FixedOffset;

    fn date(s: &str) -> NaiveDate {
        parse_date(s).unwrap()
    }

    #[test]
    fn utc_day_spans_24_hours() {
        let b = DayBounds::utc_day(date("2026-10-19"));
        assert_eq!(b.end - b.start, Duration::hours(24));
        assert_eq!(b.end_day, date("2026-10-20"));
        assert_eq!(b.len_days(), 1);
    }

    #[test]
    fn offset_timezone_shifts_instants() {
        let tz = FixedOffset::east_opt(2 * 3600).unwrap();
        let b = DayBounds::day_in(&tz, date("2026-10-19"));
        assert_eq!(b.start.to_rfc3339(), "2026-10-18T22:00:00+00:00");
    }

    #[test]
    fn previous_week_starts_on_monday() {
        // 2026-10-19 is a Monday
        assert_eq!(previous_week_start(date("2026-10-19")), date("2026-10-12"));
        // Sunday still belongs to the week starting 2026-10-12
        assert_eq!(previous_week_start(date("2026-10-25")), date("2026-10-12"));
        assert_eq!(previous_week_start(date("2026-10-21")), date("2026-10-12"));
    }

    #[test]
    fn week_bounds_cover_seven_days() {
        let week = DayBounds::utc_previous_week(date("2026-10-21"));
        assert_eq!(week.len_days(), 7);
        assert_eq!(week.last_day(), date("2026-10-18"));
        assert_eq!(week.days().count(), 7);
        assert!(week.contains_day(date("2026-10-12")));
        assert!(!week.contains_day(date("2026-10-19")));
    }

    #[test]
    fn fixed_days_offsets() {
        let days = FixedDays::new(date("2026-10-19"));
        assert_eq!(days.day(-1).first_day, date("2026-10-18"));
        assert_eq!(days.day(0).first_day, date("2026-10-19"));
    }
}
