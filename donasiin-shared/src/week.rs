//! Fundraising week arithmetic.
//!
//! A fundraising week ends on a Friday. The window for any given day runs from
//! six days before the same-or-next Friday up to and including that Friday.

use chrono::{DateTime, Datelike, Days, NaiveDate, NaiveTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

const FRIDAY_FROM_SUNDAY: u32 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeekWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl WeekWindow {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        WeekWindow { start, end }
    }

    /// Window whose Friday is `day` itself or the next Friday after it.
    pub fn containing(day: NaiveDate) -> Self {
        let weekday = day.weekday().num_days_from_sunday();
        let until_friday = (FRIDAY_FROM_SUNDAY + 7 - weekday) % 7;
        let end = day + Days::new(u64::from(until_friday));
        let start = end - Days::new(6);
        WeekWindow { start, end }
    }

    /// Half-open UTC range `[start 00:00, end + 1 day 00:00)` in the given zone.
    pub fn utc_bounds<Tz: TimeZone>(&self, tz: &Tz) -> (DateTime<Utc>, DateTime<Utc>) {
        (
            start_of_day(tz, self.start),
            start_of_day(tz, self.end + Days::new(1)),
        )
    }
}

/// UTC instant of local midnight on `date`. Falls back to UTC midnight when
/// the zone skips that local time.
pub fn start_of_day<Tz: TimeZone>(tz: &Tz, date: NaiveDate) -> DateTime<Utc> {
    let midnight = date.and_time(NaiveTime::MIN);
    tz.from_local_datetime(&midnight)
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|| midnight.and_utc())
}

pub fn local_date<Tz: TimeZone>(tz: &Tz, at: DateTime<Utc>) -> NaiveDate {
    at.with_timezone(tz).date_naive()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{FixedOffset, Weekday};

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn friday_maps_to_itself() {
        let w = WeekWindow::containing(date("2026-10-16"));
        assert_eq!(w.end, date("2026-10-16"));
        assert_eq!(w.start, date("2026-10-10"));
    }

    #[test]
    fn saturday_rolls_to_next_friday() {
        let w = WeekWindow::containing(date("2026-10-17"));
        assert_eq!(w.end, date("2026-10-23"));
        assert_eq!(w.start, date("2026-10-17"));
    }

    #[test]
    fn every_day_lands_within_six_days_of_friday() {
        let mut day = date("2026-01-01");
        for _ in 0..400 {
            let w = WeekWindow::containing(day);
            assert_eq!(w.end.weekday(), Weekday::Fri);
            let ahead = (w.end - day).num_days();
            assert!((0..=6).contains(&ahead), "{day}: {ahead}");
            assert_eq!((w.end - w.start).num_days(), 6);
            assert!(w.start <= day && day <= w.end);
            day = day + Days::new(1);
        }
    }

    #[test]
    fn utc_bounds_use_local_midnight() {
        let jakarta = FixedOffset::east_opt(7 * 3600).unwrap();
        let w = WeekWindow::new(date("2026-10-10"), date("2026-10-16"));
        let (start, end) = w.utc_bounds(&jakarta);
        assert_eq!(start.to_rfc3339(), "2026-10-09T17:00:00+00:00");
        assert_eq!(end.to_rfc3339(), "2026-10-16T17:00:00+00:00");
    }

    #[test]
    fn local_date_respects_offset() {
        let jakarta = FixedOffset::east_opt(7 * 3600).unwrap();
        let at = DateTime::parse_from_rfc3339("2026-10-15T20:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        assert_eq!(local_date(&jakarta, at), date("2026-10-16"));
        assert_eq!(local_date(&Utc, at), date("2026-10-15"));
    }
}
