//! Calendar arithmetic: weekends, holidays, PTO and season windows.

use chrono::{Datelike, Days, Months, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};

use crate::request::SeasonHint;

/// Day breakdown of a trip, inclusive of both endpoints.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TripStatistics {
    pub trip_days: u32,
    pub weekend_days: u32,
    pub holiday_days: u32,
    pub weekday_days: u32,
}

pub fn is_weekend(date: NaiveDate) -> bool {
    matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

/// Count weekend, holiday and working days in `[start, end]`.
///
/// A holiday that falls on a weekend counts as a weekend day only.
pub fn trip_statistics(start: NaiveDate, end: NaiveDate, holidays: &[NaiveDate]) -> TripStatistics {
    if end < start {
        return TripStatistics::default();
    }

    let mut stats = TripStatistics::default();
    for date in start.iter_days().take_while(|d| *d <= end) {
        stats.trip_days += 1;
        if is_weekend(date) {
            stats.weekend_days += 1;
        } else if holidays.contains(&date) {
            stats.holiday_days += 1;
        }
    }
    stats.weekday_days = stats.trip_days - stats.weekend_days - stats.holiday_days;
    stats
}

/// Working days a trip from `start` to `end` consumes.
pub fn pto_days(start: NaiveDate, end: NaiveDate, holidays: &[NaiveDate]) -> u32 {
    trip_statistics(start, end, holidays).weekday_days
}

fn month_start(year: i32, month: u32) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(year, month, 1)
}

/// `[first day of start_month, last day of start_month + span - 1]`.
fn month_span(year: i32, start_month: u32, span: u32) -> Option<(NaiveDate, NaiveDate)> {
    let start = month_start(year, start_month)?;
    let end = start.checked_add_months(Months::new(span))?.pred_opt()?;
    Some((start, end))
}

/// Resolve a season hint into a departure window that lies strictly after
/// `reference`.
///
/// A season already under way is clipped to start the day after
/// `reference`; a season already over rolls to the next year.
pub fn season_window(hint: SeasonHint, reference: NaiveDate) -> Option<(NaiveDate, NaiveDate)> {
    let tomorrow = reference.checked_add_days(Days::new(1))?;

    let (start_month, span) = match hint {
        SeasonHint::NextWeeks { weeks } => {
            let end = reference.checked_add_days(Days::new(u64::from(weeks.max(1)) * 7))?;
            return Some((tomorrow, end));
        }
        SeasonHint::Month { month } => (month, 1),
        SeasonHint::Spring => (3, 3),
        SeasonHint::Summer => (6, 3),
        SeasonHint::Fall => (9, 3),
        SeasonHint::Winter => (12, 3),
    };

    let (mut start, mut end) = month_span(reference.year(), start_month, span)?;
    // Winter that started last December may still be running.
    if start_month == 12 && reference.month() <= 2 {
        (start, end) = month_span(reference.year() - 1, start_month, span)?;
    }
    if end <= reference {
        (start, end) = month_span(start.year() + 1, start_month, span)?;
    }
    Some((start.max(tomorrow), end))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_full_week_has_two_weekend_days() {
        // Monday 2026-05-04 through Sunday 2026-05-10
        let stats = trip_statistics(date(2026, 5, 4), date(2026, 5, 10), &[]);
        assert_eq!(stats.trip_days, 7);
        assert_eq!(stats.weekend_days, 2);
        assert_eq!(stats.weekday_days, 5);
    }

    #[test]
    fn test_holidays_reduce_pto() {
        let holidays = [date(2026, 5, 18)]; // Victoria Day, a Monday
        let pto = pto_days(date(2026, 5, 16), date(2026, 5, 19), &holidays);
        assert_eq!(pto, 1);
    }

    #[test]
    fn test_weekend_holiday_counts_once() {
        let holidays = [date(2026, 5, 16)]; // Saturday
        let stats = trip_statistics(date(2026, 5, 16), date(2026, 5, 16), &holidays);
        assert_eq!(stats.weekend_days, 1);
        assert_eq!(stats.holiday_days, 0);
    }

    #[test]
    fn test_inverted_range_is_empty() {
        assert_eq!(pto_days(date(2026, 5, 10), date(2026, 5, 1), &[]), 0);
    }

    #[test]
    fn test_month_window_rolls_to_next_year() {
        let (start, end) = season_window(SeasonHint::Month { month: 3 }, date(2026, 10, 19)).unwrap();
        assert_eq!(start, date(2027, 3, 1));
        assert_eq!(end, date(2027, 3, 31));
    }

    #[test]
    fn test_season_under_way_is_clipped() {
        let (start, end) = season_window(SeasonHint::Summer, date(2026, 7, 10)).unwrap();
        assert_eq!(start, date(2026, 7, 11));
        assert_eq!(end, date(2026, 8, 31));
    }

    #[test]
    fn test_winter_spans_new_year() {
        let (start, end) = season_window(SeasonHint::Winter, date(2026, 10, 19)).unwrap();
        assert_eq!(start, date(2026, 12, 1));
        assert_eq!(end, date(2027, 2, 28));

        let (start, _) = season_window(SeasonHint::Winter, date(2027, 1, 10)).unwrap();
        assert_eq!(start, date(2027, 1, 11));
    }

    #[test]
    fn test_next_weeks() {
        let (start, end) = season_window(SeasonHint::NextWeeks { weeks: 2 }, date(2026, 10, 19)).unwrap();
        assert_eq!(start, date(2026, 10, 20));
        assert_eq!(end, date(2026, 11, 2));
    }
}
