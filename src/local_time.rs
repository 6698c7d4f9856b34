// src/local_time.rs
//! UTC to local time with the European summer-time rule
//!
//! Summer time runs from 01:00 UTC on the last Sunday of March to 01:00 UTC on
//! the last Sunday of October. The standard offset is configurable; summer
//! time adds one hour to it.

use serde::Serialize;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LocalTime {
    pub hour: u8,
    pub minute: u8,
    pub dst: bool,
    pub valid: bool,
}

impl LocalTime {
    /// `HH:MM`, or `--:--` without a valid time
    pub fn display(&self) -> String {
        if self.valid {
            format!("{:02}:{:02}", self.hour, self.minute)
        } else {
            "--:--".to_string()
        }
    }
}

/// Day of month of the last Sunday in March (`month == 3`) or October (`month == 10`).
/// Valid for 1901-2099.
pub fn last_sunday(year: i32, month: u32) -> u32 {
    let offset = if month == 3 { 4 } else { 1 };
    31 - ((5 * year / 4 + offset).rem_euclid(7)) as u32
}

/// Whether summer time is in effect at `hour` UTC on the given date
pub fn is_dst(year: i32, month: u32, day: u32, hour: u8) -> bool {
    match month {
        4..=9 => true,
        3 => {
            let last = last_sunday(year, 3);
            day > last || (day == last && hour >= 1)
        }
        10 => {
            let last = last_sunday(year, 10);
            day < last || (day == last && hour < 1)
        }
        _ => false,
    }
}

/// Convert a UTC wall-clock time; returns `(hour, minute, dst)`.
///
/// Only the hour moves, wrapping within the day; the date itself is not adjusted.
pub fn to_local(
    utc_hour: u8,
    utc_minute: u8,
    year: i32,
    month: u32,
    day: u32,
    standard_offset_hours: i32,
) -> (u8, u8, bool) {
    let dst = is_dst(year, month, day, utc_hour);
    let offset = standard_offset_hours + i32::from(dst);
    let hour = (i32::from(utc_hour) + offset).rem_euclid(24) as u8;
    (hour, utc_minute, dst)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Duration, NaiveDate, Weekday};

    fn calendar_last_sunday(year: i32, month: u32) -> u32 {
        let mut date = NaiveDate::from_ymd_opt(year, month, 31).unwrap();
        while date.weekday() != Weekday::Sun {
            date -= Duration::days(1);
        }
        date.day()
    }

    #[test]
    fn test_last_sunday_matches_calendar() {
        for year in 2000..=2099 {
            assert_eq!(last_sunday(year, 3), calendar_last_sunday(year, 3), "March {}", year);
            assert_eq!(last_sunday(year, 10), calendar_last_sunday(year, 10), "October {}", year);
        }
    }

    #[test]
    fn test_whole_months() {
        for month in [1, 2, 11, 12] {
            assert!(!is_dst(2025, month, 15, 12));
        }
        for month in 4..=9 {
            assert!(is_dst(2025, month, 15, 12));
        }
    }

    #[test]
    fn test_march_transition_on_the_31st() {
        // 31 March 2024 was the last Sunday
        assert_eq!(last_sunday(2024, 3), 31);
        assert!(!is_dst(2024, 3, 30, 23));
        assert!(!is_dst(2024, 3, 31, 0));
        assert!(is_dst(2024, 3, 31, 1));
    }

    #[test]
    fn test_october_transition() {
        // 27 October 2024
        assert!(is_dst(2024, 10, 26, 23));
        assert!(is_dst(2024, 10, 27, 0));
        assert!(!is_dst(2024, 10, 27, 1));
        assert!(!is_dst(2024, 10, 28, 0));
    }

    #[test]
    fn test_to_local_offsets() {
        assert_eq!(to_local(0, 30, 2024, 3, 31, 1), (1, 30, false));
        assert_eq!(to_local(1, 30, 2024, 3, 31, 1), (3, 30, true));
        assert_eq!(to_local(12, 5, 2024, 1, 10, 0), (12, 5, false));
        assert_eq!(to_local(12, 5, 2024, 7, 10, 0), (13, 5, true));
    }

    #[test]
    fn test_to_local_wraps_midnight() {
        assert_eq!(to_local(23, 59, 2024, 7, 1, 1), (1, 59, true));
        assert_eq!(to_local(22, 0, 2024, 12, 1, 2), (0, 0, false));
        assert_eq!(to_local(0, 0, 2024, 12, 1, -5), (19, 0, false));
    }

    #[test]
    fn test_display() {
        let time = LocalTime {
            hour: 7,
            minute: 4,
            dst: true,
            valid: true,
        };
        assert_eq!(time.display(), "07:04");
        assert_eq!(LocalTime::default().display(), "--:--");
    }
}
